//! vtopoctl: administer a vtopo topology store.
//!
//! # Usage
//!
//! ```text
//! vtopoctl --store /var/lib/vtopo/topo.redb tablet create nyc-0000000042 --payload '{}'
//! vtopoctl --config vtopo.toml action wait /zk/nyc/vt/tablets/0000000042/action/0000000000
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vtopo::{TopoConfig, Topology};

mod commands;

#[derive(Parser)]
#[command(
    name = "vtopoctl",
    about = "vtopo: tablet registry, serving graph, and remote actions",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to a vtopo.toml configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store file; overrides [store].path from the configuration.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register, read, and remove tablet records
    Tablet {
        #[command(subcommand)]
        action: commands::tablet::TabletAction,
    },
    /// Inspect and publish serving graph endpoints
    Serving {
        #[command(subcommand)]
        action: commands::serving::ServingAction,
    },
    /// Queue, wait on, and purge remote tablet actions
    Action {
        #[command(subcommand)]
        action: commands::action::ActionCommand,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<TopoConfig> {
    let mut config = match &cli.config {
        Some(path) => TopoConfig::from_file(path)?,
        None => TopoConfig::default(),
    };
    if let Some(store) = &cli.store {
        config.store.path = Some(store.clone());
    }
    if config.store.path.is_none() {
        anyhow::bail!("no store file configured: pass --store <path> or set [store].path in --config");
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vtopo=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let topo = Topology::open(&config)?;

    match cli.command {
        Commands::Tablet { action } => commands::tablet::run(&topo, action),
        Commands::Serving { action } => commands::serving::run(&topo, action),
        Commands::Action { action } => commands::action::run(&topo, &config, action).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_path_is_required() {
        let cli = Cli::try_parse_from(["vtopoctl", "tablet", "list", "nyc"]).unwrap();
        let err = load_config(&cli).unwrap_err();
        assert!(err.to_string().contains("--store"));
    }

    #[test]
    fn store_flag_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("vtopo.toml");
        std::fs::write(&config_path, "[store]\npath = \"/var/lib/vtopo/topo.redb\"\n").unwrap();

        let cli = Cli::try_parse_from([
            "vtopoctl",
            "--config",
            config_path.to_str().unwrap(),
            "--store",
            "/tmp/other.redb",
            "tablet",
            "list",
            "nyc",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.store.path, Some(PathBuf::from("/tmp/other.redb")));
    }

    #[test]
    fn config_file_store_path_is_enough() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("vtopo.toml");
        std::fs::write(&config_path, "[store]\npath = \"/var/lib/vtopo/topo.redb\"\n").unwrap();

        let cli = Cli::try_parse_from([
            "vtopoctl",
            "--config",
            config_path.to_str().unwrap(),
            "tablet",
            "list",
            "nyc",
        ])
        .unwrap();
        assert!(load_config(&cli).is_ok());
    }
}
