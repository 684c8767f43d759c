use clap::{Parser, Subcommand};
use pod_checkpoint::app::{self, AppConfig};
use pod_checkpoint::config::{load_config, DaemonConfig};
use std::path::PathBuf;
use tracing::debug;

/// Checkpoint coordinator for running pods
#[derive(Parser)]
#[command(name = "pod-checkpointd")]
#[command(about = "Coordinates pod checkpoints with the container runtime", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the checkpoint API (default command)
    Serve {
        /// Address to listen on, overrides the configuration file
        #[arg(long)]
        listen: Option<String>,

        /// Node root directory, overrides the configuration file
        #[arg(long)]
        root_dir: Option<PathBuf>,
    },
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let app_config = AppConfig::new(cli.verbose).with_config_path(cli.config);
    app::init_logging(&app_config);

    let result = run(cli.command, &app_config).await;

    if let Err(e) = result {
        app::handle_fatal_error(e, app_config.verbose);
    }
}

async fn run(command: Option<Commands>, app_config: &AppConfig) -> anyhow::Result<()> {
    let mut config = load_config(app_config.config_path.as_deref()).await?;

    match command.unwrap_or(Commands::Serve {
        listen: None,
        root_dir: None,
    }) {
        Commands::Serve { listen, root_dir } => {
            apply_cli_overrides(&mut config, listen, root_dir);
            config.validate()?;
            debug!("Effective configuration: {:?}", config);
            app::run_server(config).await
        }
        Commands::ShowConfig => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn apply_cli_overrides(config: &mut DaemonConfig, listen: Option<String>, root_dir: Option<PathBuf>) {
    if let Some(listen) = listen {
        config.server.listen_addr = listen;
    }
    if let Some(root_dir) = root_dir {
        config.checkpoint.root_dir = root_dir;
    }
}
