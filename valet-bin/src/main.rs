use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use valet_behavior::{BehaviorContext, BehaviorRegistry, HotReloadLoader};
use valet_config::ConfigLoader;
use valet_link::{BladeCommandHub, HttpStore, RemoteStateSynchronizer, RemoteStore};
use valet_runtime::{
    ControlBehavior, JanitorBehavior, ServiceLifecycle, install_builtin_builders,
};

#[derive(Parser)]
#[command(name = "valet", version, about = "Pluggable personal-assistant service runtime")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the service in the foreground until ctrl-c or a --kill command.
    Run {
        /// Path to valet.toml. Falls back to VALET_CONFIG, then ~/.valet/valet.toml.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Load, validate, and print the resolved configuration.
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run { config } => run(config).await,
        Command::CheckConfig { config } => check_config(config),
    };
    if let Err(e) = result {
        eprintln!("❌ Error: {e}");
        std::process::exit(1);
    }
}

async fn run(config_path: Option<PathBuf>) -> valet_core::Result<()> {
    let config = ConfigLoader::load(config_path.as_deref())?.get();
    init_tracing(&config.logging.level);

    let store: Arc<dyn RemoteStore> = Arc::new(HttpStore::new(
        &config.link.base_url,
        Duration::from_secs(config.link.timeout_secs),
    )?);
    let hub = Arc::new(BladeCommandHub::new());
    let sync = Arc::new(RemoteStateSynchronizer::new(Arc::clone(&store), hub));
    let registry = Arc::new(BehaviorRegistry::new());
    let unit_loader = Arc::new(HotReloadLoader::new(Arc::clone(&registry)));
    install_builtin_builders(&unit_loader);

    let shutdown = CancellationToken::new();
    let cx = BehaviorContext::new(store, sync, registry, unit_loader, shutdown.clone());
    cx.registry().register(Arc::new(ControlBehavior::new(
        config.blades.join_token.clone(),
    )));
    cx.registry().register(Arc::new(JanitorBehavior));

    info!(link = %config.link.base_url, "starting valet");
    let lifecycle = ServiceLifecycle::new(config, cx);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, stopping");
            shutdown.cancel();
        }
    });

    lifecycle.run_until_stopped().await;
    Ok(())
}

fn check_config(config_path: Option<PathBuf>) -> valet_core::Result<()> {
    let loader = ConfigLoader::load(config_path.as_deref())?;
    let rendered = toml::to_string_pretty(&loader.get())
        .map_err(|e| valet_core::ValetError::Config(e.to_string()))?;
    println!("# resolved from {}", loader.path().display());
    print!("{rendered}");
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
