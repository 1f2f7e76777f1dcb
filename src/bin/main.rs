//! external-mdns binary entry point.

use clap::Parser;
use external_mdns::{telemetry, Config, MdnsServer};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Advertise Kubernetes Services and Ingresses over multicast DNS.
#[derive(Parser, Debug)]
#[command(name = "external-mdns")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML). Optional.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Resource types to publish records for; repeat for several.
    #[arg(long = "source", value_parser = ["service", "ingress"])]
    sources: Vec<String>,

    /// Publish every Service, including those without annotations.
    #[arg(long)]
    publish_all: bool,

    /// Limit sources to a namespace (default: all namespaces).
    #[arg(long)]
    namespace: Option<String>,

    /// DNS record time-to-live in seconds.
    #[arg(long)]
    record_ttl: Option<u32>,

    /// Publish ClusterIP Services with their cluster address.
    #[arg(long)]
    publish_internal: bool,

    /// Path to a kubeconfig file.
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// URL of the Kubernetes API server.
    #[arg(long)]
    master: Option<String>,

    /// Testing mode: publish a fixed record without contacting Kubernetes.
    #[arg(long)]
    test: bool,
}

fn load_config(args: &Args) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();

    builder = match &args.config {
        Some(path) => builder.add_source(config::File::from(path.clone())),
        None => builder.add_source(config::File::with_name("external-mdns").required(false)),
    };

    builder
        .add_source(
            config::Environment::with_prefix("EXTERNAL_MDNS")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("sync.sources")
                .try_parsing(true),
        )
        .set_override_option(
            "sync.sources",
            (!args.sources.is_empty()).then(|| args.sources.clone()),
        )?
        .set_override_option("sync.publish_all", args.publish_all.then_some(true))?
        .set_override_option("sync.namespace", args.namespace.clone())?
        .set_override_option("sync.record_ttl", args.record_ttl.map(i64::from))?
        .set_override_option("sync.publish_internal", args.publish_internal.then_some(true))?
        .set_override_option(
            "kubernetes.kubeconfig",
            args.kubeconfig
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        )?
        .set_override_option("kubernetes.master", args.master.clone())?
        .build()?
        .try_deserialize()
}

/// Cancel the token on Ctrl-C or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
    token.cancel();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args)?;

    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    let token = CancellationToken::new();
    tokio::spawn(shutdown_signal(token.clone()));

    let result = if args.test {
        MdnsServer::new(config).run_test(token).await
    } else {
        if let Err(e) = config.validate() {
            telemetry::shutdown();
            return Err(e.into());
        }
        info!(
            config_file = ?args.config,
            sources = ?config.sync.sources,
            responder = ?config.responder.as_ref().map(|r| r.listen_addr),
            "app.config"
        );
        MdnsServer::new(config).run(token).await
    };

    telemetry::shutdown();

    if let Err(e) = result {
        error!("external-mdns error: {}", e);
        return Err(e.into());
    }

    info!("external-mdns shutdown complete");
    Ok(())
}
