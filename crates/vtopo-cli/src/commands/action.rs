use clap::Subcommand;
use tokio::sync::watch;
use tracing::info;
use vtopo::{TopoConfig, Topology, config::parse_duration};

use super::parse_alias;

#[derive(Subcommand)]
pub enum ActionCommand {
    /// Queue an action for a tablet and print its path
    Write {
        alias: String,
        #[arg(short, long)]
        payload: String,
    },
    /// Wait for a queued action to complete and print its result
    Wait {
        /// Path returned by `action write`
        action_path: String,
        /// Overrides [actions].wait_timeout, e.g. `90s` or `2m`
        #[arg(short, long)]
        timeout: Option<String>,
    },
    /// Delete completed action records
    Purge {
        alias: String,
        /// Only delete records whose result equals this text
        #[arg(long, conflicts_with = "all")]
        result: Option<String>,
        /// Delete every completed record
        #[arg(long)]
        all: bool,
    },
}

pub async fn run(topo: &Topology, config: &TopoConfig, command: ActionCommand) -> anyhow::Result<()> {
    match command {
        ActionCommand::Write { alias, payload } => {
            let alias = parse_alias(&alias)?;
            let path = topo.actions.write_tablet_action(&alias, payload.as_bytes())?;
            println!("{path}");
        }
        ActionCommand::Wait {
            action_path,
            timeout,
        } => {
            let timeout = match timeout {
                Some(t) => parse_duration(&t)?,
                None => config.wait_timeout()?,
            };

            let (cancel_tx, cancel_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received, abandoning wait");
                    let _ = cancel_tx.send(true);
                }
            });

            let result = topo
                .actions
                .wait_for_tablet_action(&action_path, timeout, cancel_rx)
                .await?;
            println!("{}", String::from_utf8_lossy(&result));
        }
        ActionCommand::Purge { alias, result, all } => {
            let alias = parse_alias(&alias)?;
            if !all && result.is_none() {
                anyhow::bail!("purge needs --all or --result <text>");
            }
            let purged = topo.actions.purge_tablet_actions(&alias, |data| {
                all || result.as_deref().is_some_and(|r| r.as_bytes() == data)
            })?;
            println!("✓ Purged {purged} action record(s) for {alias}");
        }
    }
    Ok(())
}
