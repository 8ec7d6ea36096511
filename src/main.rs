use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use apiservice_operator::crd::APIServiceOperator;
use apiservice_operator::telemetry::{self, LogFormat};
use apiservice_operator::{controller, Error};
use clap::{Parser, Subcommand};
use kube::CustomResourceExt;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the operator
    Run(RunArgs),
    /// Show version information
    Version,
    /// Print the APIServiceOperator CRD as YAML
    Crdgen,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Namespace holding the Services that back the APIServices
    #[arg(long, env = "OPERAND_NAMESPACE", default_value = "default")]
    namespace: String,

    /// Name of the cluster-scoped APIServiceOperator object
    #[arg(long, env = "OPERATOR_NAME", default_value = "cluster")]
    operator_name: String,

    /// YAML manifest listing the APIServices this operator owns
    #[arg(long, env = "APISERVICE_MANIFEST")]
    manifest: PathBuf,

    /// Seconds between unconditional syncs
    #[arg(long, env = "RESYNC_SECONDS", default_value_t = controller::DEFAULT_RESYNC_PERIOD.as_secs())]
    resync_seconds: u64,

    /// Port for the health and metrics endpoint
    #[arg(long, env = "METRICS_PORT", default_value_t = 8080)]
    metrics_port: u16,

    /// Console log format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!("APIService Operator v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Crdgen => {
            let crd = serde_yaml::to_string(&APIServiceOperator::crd())?;
            print!("{}", crd);
            Ok(())
        }
        Commands::Run(run_args) => run_operator(run_args).await,
    }
}

async fn run_operator(args: RunArgs) -> Result<(), Error> {
    // Only enable OTEL if an endpoint is provided
    let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();
    telemetry::init_tracing(args.log_format, otlp_endpoint.as_deref())?;
    if otlp_endpoint.is_some() {
        info!("OpenTelemetry tracing initialized");
    } else {
        info!("OpenTelemetry tracing disabled (OTEL_EXPORTER_OTLP_ENDPOINT not set)");
    }

    info!(
        "Starting APIService Operator v{}",
        env!("CARGO_PKG_VERSION")
    );

    if args.resync_seconds == 0 {
        return Err(Error::ConfigError(
            "--resync-seconds must be greater than zero".to_string(),
        ));
    }

    // Initialize Kubernetes client
    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;

    info!("Connected to Kubernetes cluster");

    let (shutdown_trigger, shutdown) = controller::shutdown_channel();
    tokio::spawn(async move {
        wait_for_signal().await;
        warn!("Shutdown requested, suppressing condition updates from in-flight syncs");
        shutdown_trigger.trigger();
    });

    let state = Arc::new(controller::ControllerState {
        client,
        operator_name: args.operator_name,
        operand_namespace: args.namespace,
        manifest_path: args.manifest,
        resync_period: Duration::from_secs(args.resync_seconds),
        shutdown,
    });

    #[cfg(feature = "rest-api")]
    {
        let api_state = state.clone();
        let port = args.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = apiservice_operator::rest_api::run_server(api_state, port).await {
                tracing::error!("REST API server error: {:?}", e);
            }
        });
    }
    #[cfg(not(feature = "rest-api"))]
    let _ = args.metrics_port;

    // Run the main controller loop
    let result = controller::run_controller(state).await;

    // Flush any remaining traces
    telemetry::shutdown_telemetry();

    result
}

/// Resolves on Ctrl-C or SIGTERM
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
