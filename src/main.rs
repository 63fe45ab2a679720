use std::{error::Error, path::PathBuf, sync::Arc};

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use crate::lib::{
    config::types::SupervisorConfig,
    containers::types::{DockerDriver, TimeoutDriver},
    supervisor::types::{Supervisor, SupervisorServer},
};

mod lib {
    pub mod config;
    pub mod containers;
    pub mod plugins;
    pub mod supervisor;
    pub mod worker;
}

#[derive(Parser, Debug)]
#[command(name = "runtime-supervisor", version, about = "Brokers container-hosted plugin workers")]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when it is absent.
    #[arg(short, long, default_value = "supervisor.toml")]
    config: PathBuf,

    /// Override `server.port`.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_found = cli.config.exists();
    let mut config = if config_found {
        SupervisorConfig::load(&cli.config)?
    } else {
        SupervisorConfig::default()
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.init_logging();

    if !config_found {
        warn!(path = %cli.config.display(), "config file not found, using defaults");
    }

    let runtime = &config.runtime;
    let docker = DockerDriver::connect(runtime.stop_grace_secs as i64)?;
    let driver = TimeoutDriver::new(
        docker,
        runtime.start_timeout(),
        runtime.stop_timeout(),
        runtime.ping_timeout(),
    );

    let supervisor = Arc::new(Supervisor::new(&config, Arc::new(driver)));
    info!(
        instance_id = %supervisor.instance_id,
        plugins = supervisor.resolver.len(),
        max_workers = config.admission.max_workers,
        "runtime supervisor starting"
    );

    supervisor.reconcile().await;

    let server = SupervisorServer::new(
        supervisor.clone(),
        &config.server.address,
        config.server.port,
    );
    server
        .start_server(async {
            if let Err(e) = signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    if config.runtime.stop_workers_on_shutdown {
        let released = supervisor.shutdown().await;
        info!(released, "released workers on shutdown");
    }

    info!("runtime supervisor stopped");
    Ok(())
}
