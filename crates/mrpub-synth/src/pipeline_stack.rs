//! Pipeline stack: artifact store, source mirror, container projects, the
//! publish role's access grant and the Source -> Build -> Publish pipeline.
//!
//! All multi-region logic comes from `mrpub-core`; this module only wires the
//! planned topology into resources.

use std::collections::BTreeMap;

use mrpub_core::{
    AccessGrant, AccessPolicyBuilder, ActionKind, BuildAction, ExecutionRole, Pipeline,
    PipelineAction, PipelineAssembler, Region, SourceAction, SourceBundle, Stage, Topology,
    TopologyPlanner, ValidatedConfig,
};
use serde_json::{json, Value};

use crate::error::SynthResult;
use crate::project::{BuiltinProject, ProjectConfig};
use crate::suppressions;
use crate::template::{get_att, reference, Output, Resource, Template};

pub const STACK_NAME: &str = "PackagePublishingPipelineStack";

pub const KEY_LOGICAL_ID: &str = "PipelineArtifactsEncryptionKey";
pub const BUCKET_LOGICAL_ID: &str = "PipelineArtifactsBucket";
pub const BUCKET_POLICY_LOGICAL_ID: &str = "PipelineArtifactsBucketPolicy";
pub const SOURCE_REPO_LOGICAL_ID: &str = "PackageSourceRepository";
pub const PIPELINE_LOGICAL_ID: &str = "PackagePipeline";
pub const PIPELINE_ROLE_LOGICAL_ID: &str = "PackagePipelineRole";
pub const ACCESS_POLICY_LOGICAL_ID: &str = "CodeArtifactAccessPolicy";
pub const SOURCE_EVENT_RULE_LOGICAL_ID: &str = "PackageSourceEventRule";
pub const SOURCE_EVENT_ROLE_LOGICAL_ID: &str = "PackageSourceEventRole";
pub const URL_OUTPUT: &str = "CodePipelineURL";

/// Name of the mirrored source repository.
pub const SOURCE_REPOSITORY_NAME: &str = "PackageSourceCode";

/// Prefix for server access logs in the artifact bucket.
pub const ACCESS_LOGS_PREFIX: &str = "access-logs/";

/// A fully wired pipeline stack plus the plan it was built from.
#[derive(Debug, Clone)]
pub struct PipelineStack {
    pub name: String,
    /// Home region of the stack (the primary region).
    pub region: Region,
    pub topology: Topology,
    pub pipeline: Pipeline,
    pub grant: AccessGrant,
    pub console_url: String,
    pub template: Template,
}

impl PipelineStack {
    /// Plan, assemble, authorize and render the pipeline stack.
    pub fn synthesize(config: &ValidatedConfig) -> SynthResult<Self> {
        let topology = TopologyPlanner::new(config.partition.clone())
            .plan(&config.coordinates, &config.regions)?;

        let pipeline = PipelineAssembler::new(config.pipeline_name.clone())
            .with_publish_project(BuiltinProject::Publish.logical_id())
            .assemble(
                SourceAction::new(SOURCE_REPOSITORY_NAME, config.source_branch.clone()),
                BuildAction::new(BuiltinProject::Build.logical_id()),
                &topology.actions,
            )?;

        let grant = AccessPolicyBuilder::build(
            &topology.identifiers,
            &ExecutionRole::new(BuiltinProject::Publish.role_logical_id()),
        )?;

        let region = config.regions.primary().clone();
        let console_url = pipeline.console_url(&region);

        let build_project = ProjectConfig::build();
        let publish_project = ProjectConfig::publish(&config.coordinates, &config.regions);

        let mut template = Template::new(format!(
            "Multi-region publishing pipeline {} ({} regions)",
            pipeline.name,
            config.regions.len()
        ));

        add_artifact_store(&mut template, config.coordinates.owner_account_id(), &config.partition);
        template.add_resource(
            SOURCE_REPO_LOGICAL_ID,
            Resource::new(
                "AWS::CodeCommit::Repository",
                source_repository_properties(
                    &config.source_branch,
                    config.source_bundle.as_ref(),
                ),
            ),
        );

        template.add_resource(
            &build_project.role_logical_id,
            service_role(
                "codebuild.amazonaws.com",
                ARTIFACTS_POLICY_NAME,
                build_role_statements(),
            ),
        );
        template.add_resource(
            &publish_project.role_logical_id,
            service_role(
                "codebuild.amazonaws.com",
                ARTIFACTS_POLICY_NAME,
                publish_role_statements(),
            ),
        );
        for project in [&build_project, &publish_project] {
            template.add_resource(
                &project.logical_id,
                Resource::new("AWS::CodeBuild::Project", project.properties(KEY_LOGICAL_ID)?),
            );
        }

        template.add_resource(
            ACCESS_POLICY_LOGICAL_ID,
            Resource::new(
                "AWS::IAM::Policy",
                json!({
                    "PolicyName": grant.policy_name,
                    "PolicyDocument": grant.policy_document(),
                    "Roles": [reference(&grant.role.name)],
                }),
            ),
        );

        template.add_resource(
            PIPELINE_ROLE_LOGICAL_ID,
            service_role(
                "codepipeline.amazonaws.com",
                ARTIFACTS_POLICY_NAME,
                pipeline_role_statements(&[&build_project, &publish_project]),
            ),
        );
        template.add_resource(
            PIPELINE_LOGICAL_ID,
            Resource::new("AWS::CodePipeline::Pipeline", pipeline_properties(&pipeline)?)
                .depends_on(PIPELINE_ROLE_LOGICAL_ID),
        );

        let pipeline_arn = format!(
            "arn:{}:codepipeline:{region}:{}:{}",
            config.partition,
            config.coordinates.owner_account_id(),
            pipeline.name
        );
        add_source_trigger(&mut template, &config.source_branch, &pipeline_arn);

        template.add_output(URL_OUTPUT, Output::value(Value::String(console_url.clone())));

        let missing = suppressions::apply(&mut template, &suppressions::pipeline_suppressions());
        if !missing.is_empty() {
            tracing::warn!(
                event = "synth.suppression_unmatched",
                logical_ids = ?missing,
            );
        }

        Ok(Self {
            name: STACK_NAME.to_string(),
            region,
            topology,
            pipeline,
            grant,
            console_url,
            template,
        })
    }
}

fn add_artifact_store(template: &mut Template, account_id: &str, partition: &str) {
    template.add_resource(
        KEY_LOGICAL_ID,
        Resource::new(
            "AWS::KMS::Key",
            json!({
                "EnableKeyRotation": true,
                "KeyPolicy": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "AWS": format!("arn:{partition}:iam::{account_id}:root") },
                        "Action": "kms:*",
                        "Resource": "*",
                    }],
                },
            }),
        ),
    );

    template.add_resource(
        BUCKET_LOGICAL_ID,
        Resource::new(
            "AWS::S3::Bucket",
            json!({
                "BucketEncryption": {
                    "ServerSideEncryptionConfiguration": [{
                        "ServerSideEncryptionByDefault": {
                            "SSEAlgorithm": "aws:kms",
                            "KMSMasterKeyID": get_att(KEY_LOGICAL_ID, "Arn"),
                        },
                    }],
                },
                "LoggingConfiguration": { "LogFilePrefix": ACCESS_LOGS_PREFIX },
                "PublicAccessBlockConfiguration": {
                    "BlockPublicAcls": true,
                    "BlockPublicPolicy": true,
                    "IgnorePublicAcls": true,
                    "RestrictPublicBuckets": true,
                },
            }),
        ),
    );

    template.add_resource(
        BUCKET_POLICY_LOGICAL_ID,
        Resource::new(
            "AWS::S3::BucketPolicy",
            json!({
                "Bucket": reference(BUCKET_LOGICAL_ID),
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Deny",
                        "Principal": { "AWS": "*" },
                        "Action": "s3:*",
                        "Resource": [bucket_arn(), bucket_objects_arn()],
                        "Condition": { "Bool": { "aws:SecureTransport": "false" } },
                    }],
                },
            }),
        ),
    );
}

fn bucket_arn() -> Value {
    get_att(BUCKET_LOGICAL_ID, "Arn")
}

fn bucket_objects_arn() -> Value {
    json!({ "Fn::Join": ["", [bucket_arn(), "/*"]] })
}

const ARTIFACTS_POLICY_NAME: &str = "PipelineArtifactsAccess";

/// Empty repository, or one whose first commit on `branch` is `bundle`.
fn source_repository_properties(branch: &str, bundle: Option<&SourceBundle>) -> Value {
    let mut properties = json!({ "RepositoryName": SOURCE_REPOSITORY_NAME });
    if let Some(bundle) = bundle {
        properties["Code"] = json!({
            "BranchName": branch,
            "S3": { "Bucket": bundle.bucket, "Key": bundle.key },
        });
    }
    properties
}

/// Start the pipeline when `branch` of the source repository changes.
fn add_source_trigger(template: &mut Template, branch: &str, pipeline_arn: &str) {
    template.add_resource(
        SOURCE_EVENT_ROLE_LOGICAL_ID,
        service_role(
            "events.amazonaws.com",
            "StartPackagePipeline",
            vec![json!({
                "Effect": "Allow",
                "Action": ["codepipeline:StartPipelineExecution"],
                "Resource": [pipeline_arn],
            })],
        ),
    );
    template.add_resource(
        SOURCE_EVENT_RULE_LOGICAL_ID,
        Resource::new(
            "AWS::Events::Rule",
            json!({
                "State": "ENABLED",
                "EventPattern": {
                    "source": ["aws.codecommit"],
                    "detail-type": ["CodeCommit Repository State Change"],
                    "resources": [get_att(SOURCE_REPO_LOGICAL_ID, "Arn")],
                    "detail": {
                        "event": ["referenceCreated", "referenceUpdated"],
                        "referenceType": ["branch"],
                        "referenceName": [branch],
                    },
                },
                "Targets": [{
                    "Id": "Target0",
                    "Arn": pipeline_arn,
                    "RoleArn": get_att(SOURCE_EVENT_ROLE_LOGICAL_ID, "Arn"),
                }],
            }),
        )
        .depends_on(PIPELINE_LOGICAL_ID),
    );
}

fn service_role(service_principal: &str, policy_name: &str, statements: Vec<Value>) -> Resource {
    Resource::new(
        "AWS::IAM::Role",
        json!({
            "AssumeRolePolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "Service": service_principal },
                    "Action": "sts:AssumeRole",
                }],
            },
            "Policies": [{
                "PolicyName": policy_name,
                "PolicyDocument": { "Version": "2012-10-17", "Statement": statements },
            }],
        }),
    )
}

fn logs_statement() -> Value {
    json!({
        "Effect": "Allow",
        "Action": ["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
        "Resource": "*",
    })
}

fn artifact_statement(actions: &[&str]) -> Value {
    json!({
        "Effect": "Allow",
        "Action": actions,
        "Resource": [bucket_arn(), bucket_objects_arn()],
    })
}

fn key_statement(actions: &[&str]) -> Value {
    json!({
        "Effect": "Allow",
        "Action": actions,
        "Resource": [get_att(KEY_LOGICAL_ID, "Arn")],
    })
}

/// The build stage writes the artifact once.
fn build_role_statements() -> Vec<Value> {
    vec![
        logs_statement(),
        artifact_statement(&["s3:GetObject*", "s3:GetBucket*", "s3:List*", "s3:PutObject"]),
        key_statement(&["kms:Decrypt", "kms:Encrypt", "kms:GenerateDataKey*"]),
    ]
}

/// Publish actions only read the artifact.
fn publish_role_statements() -> Vec<Value> {
    vec![
        logs_statement(),
        artifact_statement(&["s3:GetObject*", "s3:GetBucket*", "s3:List*"]),
        key_statement(&["kms:Decrypt", "kms:DescribeKey"]),
    ]
}

fn pipeline_role_statements(projects: &[&ProjectConfig]) -> Vec<Value> {
    let project_arns: Vec<Value> = projects
        .iter()
        .map(|p| get_att(&p.logical_id, "Arn"))
        .collect();
    vec![
        artifact_statement(&["s3:GetObject*", "s3:GetBucket*", "s3:List*", "s3:PutObject"]),
        key_statement(&["kms:Decrypt", "kms:Encrypt", "kms:GenerateDataKey*"]),
        json!({
            "Effect": "Allow",
            "Action": [
                "codecommit:GetBranch",
                "codecommit:GetCommit",
                "codecommit:UploadArchive",
                "codecommit:GetUploadArchiveStatus",
            ],
            "Resource": [get_att(SOURCE_REPO_LOGICAL_ID, "Arn")],
        }),
        json!({
            "Effect": "Allow",
            "Action": ["codebuild:StartBuild", "codebuild:BatchGetBuilds"],
            "Resource": project_arns,
        }),
    ]
}

fn pipeline_properties(pipeline: &Pipeline) -> SynthResult<Value> {
    let stages = pipeline
        .stages
        .iter()
        .map(stage_properties)
        .collect::<SynthResult<Vec<_>>>()?;

    Ok(json!({
        "Name": pipeline.name,
        "RoleArn": get_att(PIPELINE_ROLE_LOGICAL_ID, "Arn"),
        "ArtifactStore": {
            "Type": "S3",
            "Location": reference(BUCKET_LOGICAL_ID),
            "EncryptionKey": { "Id": get_att(KEY_LOGICAL_ID, "Arn"), "Type": "KMS" },
        },
        "Stages": stages,
    }))
}

fn stage_properties(stage: &Stage) -> SynthResult<Value> {
    let actions = stage
        .actions
        .iter()
        .map(action_properties)
        .collect::<SynthResult<Vec<_>>>()?;
    Ok(json!({ "Name": stage.name, "Actions": actions }))
}

fn action_properties(action: &PipelineAction) -> SynthResult<Value> {
    let (category, provider, configuration) = match &action.kind {
        ActionKind::Source {
            repository_name: _,
            branch,
        } => (
            "Source",
            "CodeCommit",
            json!({
                "RepositoryName": get_att(SOURCE_REPO_LOGICAL_ID, "Name"),
                "BranchName": branch,
                "PollForSourceChanges": false,
            }),
        ),
        ActionKind::Build { project } => (
            "Build",
            "CodeBuild",
            json!({ "ProjectName": reference(project) }),
        ),
        ActionKind::Publish {
            project,
            parameters,
            ..
        } => (
            "Build",
            "CodeBuild",
            json!({
                "ProjectName": reference(project),
                "EnvironmentVariables": action_environment(parameters)?,
            }),
        ),
    };

    Ok(json!({
        "Name": action.name,
        "ActionTypeId": {
            "Category": category,
            "Owner": "AWS",
            "Provider": provider,
            "Version": "1",
        },
        "Configuration": configuration,
        "InputArtifacts": action.inputs.iter().map(|n| json!({ "Name": n })).collect::<Vec<_>>(),
        "OutputArtifacts": action.outputs.iter().map(|n| json!({ "Name": n })).collect::<Vec<_>>(),
        "RunOrder": action.run_order,
    }))
}

/// Action-level environment overrides, encoded the way the pipeline service
/// expects them: a JSON string holding a list of `{name, type, value}`.
fn action_environment(parameters: &BTreeMap<String, String>) -> SynthResult<String> {
    let vars: Vec<Value> = parameters
        .iter()
        .map(|(name, value)| json!({ "name": name, "type": "PLAINTEXT", "value": value }))
        .collect();
    Ok(serde_json::to_string(&vars)?)
}
