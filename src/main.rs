use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use tokio::runtime::Builder;
use tokio::sync::mpsc;

use nlsrd::route::LoggingFib;
use nlsrd::sync::LoggingPublisher;
use nlsrd::{Router, RouterConfig};

#[derive(Parser)]
#[command(name = "nlsrd", about = "Link-state routing daemon for named-data networks")]
struct Cli {
    /// JSON router configuration
    #[arg(long)]
    config: PathBuf,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level.as_str())).init();

    let config = RouterConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    info!("Loaded configuration for {}", config.router_prefix());

    // Routing state lives in Rc/RefCell and never leaves this thread.
    let rt = Builder::new_current_thread().enable_all().build()?;

    rt.block_on(async {
        // Collaborators (hello, sync, face monitor) hold clones of the sender.
        let (_commands, rx) = mpsc::channel(256);
        let mut router = Router::new(config, Box::new(LoggingPublisher), Box::new(LoggingFib));
        router.start();
        router.run(rx).await
    })
}
