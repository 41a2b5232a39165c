//! mrpub - multi-region package publishing pipeline planner
//!
//! ## Commands
//!
//! - `plan`: print the regional resource identifiers and publish actions
//! - `policy`: print the publish role's access policy document
//! - `synth`: write every stack template and the manifest to a directory
//! - `url`: print the pipeline console URL
//!
//! Parameters come from an optional TOML file, then `MRPUB_*` environment
//! variables, then command-line flags; later sources win. The variable names
//! are the `ENV_*` constants in `mrpub_core::config`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use mrpub_core::{
    config, AccessPolicyBuilder, ExecutionRole, PublishActionDescriptor, PublishingConfig, Region,
    SourceBundle, TopologyPlanner,
};
use mrpub_synth::{write_assembly, BuiltinProject, CloudAssembly};

#[derive(Parser)]
#[command(name = "mrpub")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-region package publishing pipeline planner", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    params: ParamArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Publishing parameters. Each flag falls back to its environment variable.
#[derive(Args, Debug, Default)]
struct ParamArgs {
    /// TOML file with publishing parameters
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Package repository domain name
    #[arg(long, global = true, env = config::ENV_DOMAIN_NAME)]
    domain_name: Option<String>,

    /// Package repository name
    #[arg(long, global = true, env = config::ENV_REPOSITORY_NAME)]
    repository_name: Option<String>,

    /// Region hosting the pipeline
    #[arg(long, global = true, env = config::ENV_PRIMARY_REGION)]
    primary_region: Option<String>,

    /// Comma-separated replica regions
    #[arg(long, global = true, env = config::ENV_REPLICA_REGIONS, value_delimiter = ',')]
    replica_regions: Option<Vec<String>>,

    /// Owning account id
    #[arg(long, global = true, env = config::ENV_ACCOUNT_ID)]
    account_id: Option<String>,

    /// Resource name partition
    #[arg(long, global = true, env = config::ENV_PARTITION)]
    partition: Option<String>,

    /// Pipeline name
    #[arg(long, global = true)]
    pipeline_name: Option<String>,

    /// Source branch that triggers the pipeline
    #[arg(long, global = true)]
    source_branch: Option<String>,

    /// Bucket holding the archive that seeds the source repository
    #[arg(long, global = true, requires = "source_bundle_key")]
    source_bundle_bucket: Option<String>,

    /// Object key of the seed archive
    #[arg(long, global = true, requires = "source_bundle_bucket")]
    source_bundle_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the planned identifiers and publish actions as JSON
    Plan,

    /// Print the access policy document for the publish role
    Policy,

    /// Write stack templates and the manifest
    Synth {
        /// Output directory
        #[arg(short, long, default_value = "cdk.out")]
        out: PathBuf,
    },

    /// Print the pipeline console URL
    Url,
}

#[derive(Serialize)]
struct PlanOutput {
    digest: String,
    identifiers: Vec<String>,
    regions: Vec<RegionPlan>,
    actions: Vec<PublishActionDescriptor>,
}

#[derive(Serialize)]
struct RegionPlan {
    region: Region,
    is_primary: bool,
    identifiers: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    mrpub_core::init_tracing(cli.json, level);

    let config = load_config(&cli.params)?;

    let output = match cli.command {
        Commands::Plan => cmd_plan(&config)?,
        Commands::Policy => cmd_policy(&config)?,
        Commands::Synth { out } => cmd_synth(&config, &out)?,
        Commands::Url => cmd_url(&config)?,
    };
    println!("{output}");
    Ok(())
}

/// File values first, then every flag or environment value that is set.
fn load_config(params: &ParamArgs) -> Result<PublishingConfig> {
    let mut config = match &params.config {
        Some(path) => PublishingConfig::from_file(path)
            .with_context(|| format!("Failed to load config file: {:?}", path))?,
        None => PublishingConfig::default(),
    };

    let overrides = [
        (&params.domain_name, &mut config.domain_name),
        (&params.repository_name, &mut config.repository_name),
        (&params.primary_region, &mut config.primary_region),
        (&params.account_id, &mut config.account_id),
        (&params.partition, &mut config.partition),
        (&params.pipeline_name, &mut config.pipeline_name),
        (&params.source_branch, &mut config.source_branch),
    ];
    for (value, field) in overrides {
        if let Some(value) = value {
            *field = value.clone();
        }
    }
    if let Some(replicas) = &params.replica_regions {
        config.replica_regions = replicas.clone();
    }
    if let (Some(bucket), Some(key)) = (&params.source_bundle_bucket, &params.source_bundle_key) {
        config.source_bundle = Some(SourceBundle {
            bucket: bucket.clone(),
            key: key.clone(),
        });
    }
    Ok(config)
}

fn cmd_plan(config: &PublishingConfig) -> Result<String> {
    let topology = TopologyPlanner::plan_config(config).context("Failed to plan topology")?;
    let regions = topology
        .actions
        .iter()
        .map(|action| RegionPlan {
            region: action.region.clone(),
            is_primary: action.is_primary,
            identifiers: topology
                .identifiers_for(&action.region)
                .map(ToString::to_string)
                .collect(),
        })
        .collect();
    let output = PlanOutput {
        digest: topology.digest()?,
        identifiers: topology.identifier_strings(),
        regions,
        actions: topology.actions,
    };
    Ok(serde_json::to_string_pretty(&output)?)
}

fn cmd_policy(config: &PublishingConfig) -> Result<String> {
    let topology = TopologyPlanner::plan_config(config).context("Failed to plan topology")?;
    let grant = AccessPolicyBuilder::build(
        &topology.identifiers,
        &ExecutionRole::new(BuiltinProject::Publish.role_logical_id()),
    )
    .context("Failed to build access policy")?;
    Ok(serde_json::to_string_pretty(&grant.policy_document())?)
}

fn cmd_synth(config: &PublishingConfig, out: &Path) -> Result<String> {
    let assembly = write_assembly(config, out)
        .with_context(|| format!("Failed to synthesize assembly into {:?}", out))?;
    info!(
        stacks = assembly.stacks.len(),
        out = %out.display(),
        "assembly written"
    );
    Ok(assembly
        .stacks
        .iter()
        .map(|s| out.join(s.template_file()).display().to_string())
        .collect::<Vec<_>>()
        .join("\n"))
}

fn cmd_url(config: &PublishingConfig) -> Result<String> {
    let assembly = CloudAssembly::synthesize(config).context("Failed to plan pipeline")?;
    Ok(assembly.pipeline.console_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ParamArgs {
        ParamArgs {
            domain_name: Some("custom-package-domain".to_string()),
            repository_name: Some("package-artifact-repo".to_string()),
            primary_region: Some("us-east-1".to_string()),
            replica_regions: Some(vec!["us-west-2".to_string(), "us-east-2".to_string()]),
            account_id: Some("111122223333".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mrpub.toml");
        std::fs::write(
            &path,
            r#"
domain_name = "file-domain"
repository_name = "file-repo"
primary_region = "eu-west-1"
account_id = "123456789012"
"#,
        )
        .unwrap();

        let args = ParamArgs {
            config: Some(path),
            primary_region: Some("us-east-1".to_string()),
            ..Default::default()
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.domain_name, "file-domain");
        assert_eq!(config.primary_region, "us-east-1");
        assert!(config.replica_regions.is_empty());
    }

    #[test]
    fn test_missing_config_file_is_reported() {
        let args = ParamArgs {
            config: Some(PathBuf::from("/nonexistent/mrpub.toml")),
            ..Default::default()
        };
        let err = load_config(&args).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to load config file"));
    }

    #[test]
    fn test_cmd_plan_outputs_identifiers_and_actions() {
        let config = load_config(&params()).unwrap();
        let out: serde_json::Value = serde_json::from_str(&cmd_plan(&config).unwrap()).unwrap();
        assert_eq!(out["identifiers"].as_array().unwrap().len(), 12);
        assert_eq!(out["actions"].as_array().unwrap().len(), 3);
        assert_eq!(out["digest"].as_str().unwrap().len(), 64);

        let regions = out["regions"].as_array().unwrap();
        let names: Vec<&str> = regions.iter().map(|r| r["region"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["us-west-2", "us-east-2", "us-east-1"]);
        assert_eq!(regions[2]["is_primary"], true);
        for region in regions {
            let ids = region["identifiers"].as_array().unwrap();
            assert_eq!(ids.len(), 4);
            let name = region["region"].as_str().unwrap();
            assert!(ids.iter().all(|id| id.as_str().unwrap().contains(name)));
        }
    }

    #[test]
    fn test_env_fallbacks_match_core_names() {
        use clap::CommandFactory;

        let command = Cli::command();
        let expected = [
            ("domain_name", config::ENV_DOMAIN_NAME),
            ("repository_name", config::ENV_REPOSITORY_NAME),
            ("primary_region", config::ENV_PRIMARY_REGION),
            ("replica_regions", config::ENV_REPLICA_REGIONS),
            ("account_id", config::ENV_ACCOUNT_ID),
            ("partition", config::ENV_PARTITION),
        ];
        for (id, env) in expected {
            let arg = command
                .get_arguments()
                .find(|a| a.get_id() == id)
                .unwrap_or_else(|| panic!("missing argument {id}"));
            assert_eq!(arg.get_env(), Some(std::ffi::OsStr::new(env)), "{id}");
        }
    }

    #[test]
    fn test_source_bundle_flags_seed_repository() {
        let cli = Cli::try_parse_from([
            "mrpub",
            "--source-bundle-bucket",
            "seed-bucket",
            "--source-bundle-key",
            "package-source.zip",
            "url",
        ])
        .unwrap();
        let config = load_config(&cli.params).unwrap();
        let bundle = config.source_bundle.unwrap();
        assert_eq!(bundle.bucket, "seed-bucket");
        assert_eq!(bundle.key, "package-source.zip");

        let partial = Cli::try_parse_from(["mrpub", "--source-bundle-bucket", "seed-bucket", "url"]);
        assert!(partial.is_err());
    }

    #[test]
    fn test_padded_replica_flag_rejected() {
        let cli = Cli::try_parse_from([
            "mrpub",
            "--domain-name",
            "custom-package-domain",
            "--repository-name",
            "package-artifact-repo",
            "--primary-region",
            "us-east-1",
            "--account-id",
            "111122223333",
            "--replica-regions",
            "us-west-2, us-east-2",
            "plan",
        ])
        .unwrap();
        let config = load_config(&cli.params).unwrap();
        assert_eq!(config.replica_regions, vec!["us-west-2", " us-east-2"]);
        let err = cmd_plan(&config).unwrap_err();
        assert!(format!("{err:#}").contains(" us-east-2"));
    }

    #[test]
    fn test_cmd_policy_scopes_to_plan() {
        let config = load_config(&params()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&cmd_policy(&config).unwrap()).unwrap();
        assert_eq!(doc["Statement"][0]["Resource"].as_array().unwrap().len(), 12);
    }

    #[test]
    fn test_cmd_plan_rejects_duplicate_region() {
        let mut args = params();
        args.replica_regions = Some(vec!["us-east-1".to_string()]);
        let config = load_config(&args).unwrap();
        let err = cmd_plan(&config).unwrap_err();
        assert!(format!("{err:#}").contains("us-east-1"));
    }

    #[test]
    fn test_cmd_synth_writes_templates() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&params()).unwrap();
        let listing = cmd_synth(&config, dir.path()).unwrap();
        assert_eq!(listing.lines().count(), 4);
        assert!(dir.path().join("manifest.json").exists());
    }

    #[test]
    fn test_cmd_url() {
        let config = load_config(&params()).unwrap();
        assert_eq!(
            cmd_url(&config).unwrap(),
            "https://us-east-1.console.aws.amazon.com/codesuite/codepipeline/pipelines/packagePipeline/view"
        );
    }
}
