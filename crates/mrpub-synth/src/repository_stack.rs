//! Per-region package repository stack: one domain and one repository.

use mrpub_core::{Region, RepositoryCoordinates};
use serde_json::json;

use crate::template::{get_att, Output, Resource, Template};

pub const DOMAIN_LOGICAL_ID: &str = "CodeArtifactDomain";
pub const REPOSITORY_LOGICAL_ID: &str = "CodeArtifactRepo";
pub const REPOSITORY_ARN_EXPORT: &str = "CodeArtifactRepoArn";
pub const DOMAIN_ARN_EXPORT: &str = "CodeArtifactDomainArn";

/// Stack name for the repository replica in `region`.
pub fn stack_name(region: &Region) -> String {
    format!("CodeArtifactStack-{region}")
}

/// Template creating the domain and the repository inside it.
///
/// The repository waits for the domain; both ARNs are exported.
pub fn repository_template(coordinates: &RepositoryCoordinates, region: &Region) -> Template {
    let mut template = Template::new(format!(
        "Package repository {} in domain {} ({region})",
        coordinates.repository_name(),
        coordinates.domain_name()
    ));

    template.add_resource(
        DOMAIN_LOGICAL_ID,
        Resource::new(
            "AWS::CodeArtifact::Domain",
            json!({ "DomainName": coordinates.domain_name() }),
        ),
    );
    template.add_resource(
        REPOSITORY_LOGICAL_ID,
        Resource::new(
            "AWS::CodeArtifact::Repository",
            json!({
                "DomainName": get_att(DOMAIN_LOGICAL_ID, "Name"),
                "RepositoryName": coordinates.repository_name(),
            }),
        )
        .depends_on(DOMAIN_LOGICAL_ID),
    );

    template.add_output(
        REPOSITORY_ARN_EXPORT,
        Output::exported(get_att(REPOSITORY_LOGICAL_ID, "Arn"), REPOSITORY_ARN_EXPORT),
    );
    template.add_output(
        DOMAIN_ARN_EXPORT,
        Output::exported(get_att(DOMAIN_LOGICAL_ID, "Arn"), DOMAIN_ARN_EXPORT),
    );
    template
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_template() {
        let coords =
            RepositoryCoordinates::new("custom-package-domain", "package-artifact-repo", "123456789012")
                .unwrap();
        let region = Region::parse("region", "us-west-2").unwrap();
        let template = repository_template(&coords, &region);

        assert_eq!(stack_name(&region), "CodeArtifactStack-us-west-2");
        let repo = template.resource(REPOSITORY_LOGICAL_ID).unwrap();
        assert_eq!(repo.depends_on, vec![DOMAIN_LOGICAL_ID.to_string()]);
        assert_eq!(repo.properties["RepositoryName"], "package-artifact-repo");
        let domain = template.resource(DOMAIN_LOGICAL_ID).unwrap();
        assert_eq!(domain.properties["DomainName"], "custom-package-domain");
        assert_eq!(template.outputs.len(), 2);
    }
}
