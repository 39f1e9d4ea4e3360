use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use trainflow_core::fraud::{self, REGISTER_STAGE};
use trainflow_core::{inject, RunOptions, RunRequest, StageId};
use trainflow_sdk::{PipelineClient, RunHandle};

mod config;
mod credentials;

use config::CliConfig;
use credentials::BackendCredentials;

#[derive(Parser, Debug)]
#[command(name = "trainflow")]
#[command(about = "Compile and submit the fraud detection training pipeline", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "trainflow.toml", env = "TRAINFLOW_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile the run request without submitting it
    Compile {
        #[command(flatten)]
        run: RunArgs,

        /// Write the request here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compile the run request and submit it once
    Submit {
        #[command(flatten)]
        run: RunArgs,

        /// Backend endpoint, overriding the one derived from the pod namespace
        #[arg(long, env = "TRAINFLOW_ENDPOINT")]
        endpoint: Option<String>,

        /// Give up on the request after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// Version the model is published under
    #[arg(long, env = "TRAINFLOW_MODEL_VERSION")]
    model_version: Option<String>,

    /// Namespace the run is started in
    #[arg(long)]
    namespace: Option<String>,

    #[arg(long)]
    run_name: Option<String>,

    /// Disable step caching for this run
    #[arg(long)]
    no_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so a compiled request on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trainflow=info,trainflow_core=info,trainflow_sdk=info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    let args = Args::parse();
    let config = CliConfig::load(&args.config)?;

    match args.command {
        Command::Compile { run, output } => {
            let request = prepare(&config, &run)?;
            let body = request.to_json_pretty()?;

            match output {
                Some(path) => {
                    std::fs::write(&path, body)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    tracing::info!("Run request written to {}", path.display());
                }
                None => println!("{}", body),
            }
        }
        Command::Submit {
            run,
            endpoint,
            timeout_secs,
        } => {
            let handle = submit(&config, &run, endpoint.as_deref(), timeout_secs).await?;
            println!("{}", serde_json::to_string_pretty(&handle)?);
        }
    }

    Ok(())
}

/// Compile the run request and submit it once with the mounted credentials
async fn submit(
    config: &CliConfig,
    run: &RunArgs,
    endpoint: Option<&str>,
    timeout_secs: Option<u64>,
) -> Result<RunHandle> {
    let request = prepare(config, run)?;
    let creds = BackendCredentials::load(&config.backend, endpoint)?;

    let mut builder = PipelineClient::builder().endpoint(creds.endpoint);
    if let Some(token) = creds.bearer_token {
        builder = builder.bearer_token(token);
    }
    if let Some(anchor) = creds.trust_anchor {
        builder = builder.trust_anchor(anchor);
    }
    if let Some(secs) = timeout_secs.or(config.backend.timeout_secs) {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    let client = builder.build()?;
    tracing::info!("Connecting to pipeline backend at {}", client.endpoint());

    Ok(client.submit(&request).await?)
}

/// Build the fraud training graph, attach the registry secret and compile
/// a run request from the configuration and command-line overrides.
fn prepare(config: &CliConfig, run: &RunArgs) -> Result<RunRequest> {
    let mut graph = fraud::fraud_training_pipeline(fraud::parameters()?)?;
    inject(
        &mut graph,
        &StageId::new(REGISTER_STAGE),
        &config.registry_secret.binding(),
    )?;

    let mut arguments = config.arguments();
    if let Some(version) = &run.model_version {
        arguments.insert("version".to_string(), json!(version));
    }

    let namespace = run.namespace.as_ref().unwrap_or(&config.run.namespace);
    let mut options = RunOptions::new(&config.run.experiment_name, namespace)
        .enable_caching(config.run.enable_caching && !run.no_cache);
    if let Some(run_name) = run.run_name.as_ref().or(config.run.run_name.as_ref()) {
        options = options.run_name(run_name);
    }

    let request = RunRequest::compile(&graph, &arguments, options)
        .context("Failed to compile the training pipeline")?;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use trainflow_sdk::SubmitError;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CA_PEM: &str = include_str!("../../sdk/testdata/ca.pem");

    fn run_args(version: &str) -> RunArgs {
        RunArgs {
            model_version: Some(version.to_string()),
            ..RunArgs::default()
        }
    }

    #[test]
    fn test_prepare_with_defaults() {
        let request = prepare(&CliConfig::default(), &run_args("7")).unwrap();

        assert_eq!(request.experiment_name, "fraud-training");
        assert_eq!(request.namespace, "mlops-dev-zone");
        assert_eq!(request.run_name, fraud::PIPELINE_NAME);
        assert!(request.enable_caching);
        assert_eq!(request.parameters["version"], json!("7"));
        assert_eq!(request.parameters["hyperparameters"], json!({"epochs": 2}));
        assert_eq!(request.pipeline.nodes.len(), 8);

        let register = request
            .pipeline
            .nodes
            .iter()
            .find(|n| n.id.as_str() == REGISTER_STAGE)
            .unwrap();
        assert_eq!(register.context.secret_env.len(), 4);
    }

    #[test]
    fn test_prepare_applies_overrides() {
        let run = RunArgs {
            model_version: Some("8".to_string()),
            namespace: Some("mlops-prod".to_string()),
            run_name: Some("nightly".to_string()),
            no_cache: true,
        };
        let request = prepare(&CliConfig::default(), &run).unwrap();

        assert_eq!(request.namespace, "mlops-prod");
        assert_eq!(request.run_name, "nightly");
        assert!(!request.enable_caching);
    }

    #[test]
    fn test_prepare_without_version_fails() {
        assert!(prepare(&CliConfig::default(), &RunArgs::default()).is_err());
    }

    #[test]
    fn test_cli_parses_submit() {
        let args = Args::try_parse_from([
            "trainflow",
            "submit",
            "--model-version",
            "2",
            "--endpoint",
            "https://pipelines.example.com",
            "--no-cache",
        ])
        .unwrap();

        match args.command {
            Command::Submit { run, endpoint, .. } => {
                assert_eq!(run.model_version.as_deref(), Some("2"));
                assert!(run.no_cache);
                assert_eq!(endpoint.as_deref(), Some("https://pipelines.example.com"));
            }
            other => panic!("Expected submit, got {:?}", other),
        }
    }

    /// Config whose credential files live in a temp dir
    fn mounted_config(dir: &TempDir, with_token: bool) -> CliConfig {
        if with_token {
            std::fs::write(dir.path().join("token"), "sa-token\n").unwrap();
        }
        std::fs::write(dir.path().join("service-ca.crt"), CA_PEM).unwrap();

        let mut config = CliConfig::default();
        config.backend.namespace_file = dir.path().join("namespace");
        config.backend.token_file = dir.path().join("token");
        config.backend.ca_cert_file = dir.path().join("service-ca.crt");
        config
    }

    #[tokio::test]
    async fn test_submit_with_mounted_credentials() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/apis/v2beta1/runs"))
            .and(header("Authorization", "Bearer sa-token"))
            .and(body_partial_json(json!({
                "namespace": "mlops-dev-zone",
                "enable_caching": false,
                "parameters": {"version": "5"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "run_id": "run-99",
                "state": "PENDING"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = mounted_config(&dir, true);
        let run = RunArgs {
            no_cache: true,
            ..run_args("5")
        };

        let handle = submit(&config, &run, Some(&server.uri()), Some(30))
            .await
            .unwrap();
        assert_eq!(handle.run_id, "run-99");
        assert_eq!(handle.namespace, "mlops-dev-zone");
    }

    #[tokio::test]
    async fn test_submit_without_token_is_authentication_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"run_id": "never"})))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = mounted_config(&dir, false);

        let err = submit(&config, &run_args("5"), Some(&server.uri()), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SubmitError>(),
            Some(SubmitError::Authentication(_))
        ));
    }
}
