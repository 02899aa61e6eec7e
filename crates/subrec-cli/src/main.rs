use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "subrec")]
#[command(about = "Subscription entitlement reconciler CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Report config keys a surface does not consume
    ConfigCheck {
        /// Surface to check against (DAEMON | CLI)
        #[arg(long)]
        surface: String,

        /// Exit non-zero when unused keys exist
        #[arg(long, default_value_t = false)]
        fail: bool,

        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Print persisted entitlement tier and mismatch flag
    Status {
        #[command(flatten)]
        target: StateTarget,
    },

    /// Print the latest pending-payment record per category
    Pending {
        #[command(flatten)]
        target: StateTarget,
    },
}

/// Where to read state from and which categories to show.
///
/// Explicit flags win over config; config wins over defaults.
#[derive(clap::Args)]
struct StateTarget {
    /// State directory (overrides state.dir from --config)
    #[arg(long = "state-dir")]
    state_dir: Option<PathBuf>,

    /// Single category (backup | donation); default = configured categories
    #[arg(long)]
    category: Option<String>,

    /// Layered config paths in merge order
    #[arg(long = "config")]
    config_paths: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => commands::config::config_hash(&paths)?,

        Commands::ConfigCheck {
            surface,
            fail,
            paths,
        } => commands::config::config_check(&surface, fail, &paths)?,

        Commands::Status { target } => {
            let resolved = commands::resolve_target(
                target.state_dir,
                target.category.as_deref(),
                &target.config_paths,
            )?;
            commands::state::status(&resolved).await?;
        }

        Commands::Pending { target } => {
            let resolved = commands::resolve_target(
                target.state_dir,
                target.category.as_deref(),
                &target.config_paths,
            )?;
            commands::state::pending(&resolved).await?;
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
