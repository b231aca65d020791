use clap::Subcommand;
use vtopo::Topology;

use super::parse_alias;

#[derive(Subcommand)]
pub enum TabletAction {
    /// Register a tablet with its action queues
    Create {
        /// Tablet alias, `<cell>-<uid>`
        alias: String,
        /// Opaque tablet record
        #[arg(short, long, default_value = "")]
        payload: String,
    },
    /// Print a tablet record and its version
    Get { alias: String },
    /// List the tablets registered in a cell
    List { cell: String },
    /// Replace a tablet record, conditional on its current version
    Update {
        alias: String,
        #[arg(short, long)]
        payload: String,
        /// Version returned by `tablet get`
        #[arg(short, long)]
        version: i32,
    },
    /// Remove a tablet and everything under it
    Delete { alias: String },
    /// Check that a tablet's action queues exist
    Validate { alias: String },
}

pub fn run(topo: &Topology, action: TabletAction) -> anyhow::Result<()> {
    match action {
        TabletAction::Create { alias, payload } => {
            let alias = parse_alias(&alias)?;
            topo.tablets.create_tablet(&alias, payload.as_bytes())?;
            println!("✓ Created tablet {alias}");
        }
        TabletAction::Get { alias } => {
            let alias = parse_alias(&alias)?;
            let record = topo.tablets.get_tablet(&alias)?;
            println!("version: {}", record.version);
            println!("{}", String::from_utf8_lossy(&record.value));
        }
        TabletAction::List { cell } => {
            for alias in topo.tablets.get_tablets_by_cell(&cell)? {
                println!("{alias}");
            }
        }
        TabletAction::Update {
            alias,
            payload,
            version,
        } => {
            let alias = parse_alias(&alias)?;
            let new_version = topo
                .tablets
                .update_tablet(&alias, payload.as_bytes(), version)?;
            println!("✓ Updated tablet {alias} (version {new_version})");
        }
        TabletAction::Delete { alias } => {
            let alias = parse_alias(&alias)?;
            topo.tablets.delete_tablet(&alias)?;
            println!("✓ Deleted tablet {alias}");
        }
        TabletAction::Validate { alias } => {
            let alias = parse_alias(&alias)?;
            topo.tablets.validate_tablet(&alias)?;
            println!("✓ Tablet {alias} is consistent");
        }
    }
    Ok(())
}
