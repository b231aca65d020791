use clap::Subcommand;
use vtopo::{EndpointUpdate, TabletType, Topology, VtnsAddr, VtnsAddrs};

#[derive(Subcommand)]
pub enum ServingAction {
    /// Print a shard's endpoint list for one tablet type, or the published
    /// types when `--type` is omitted
    Get {
        cell: String,
        keyspace: String,
        shard: String,
        #[arg(short = 't', long = "type")]
        tablet_type: Option<String>,
    },
    /// Create or replace the whole endpoint list for a tablet type
    Publish {
        cell: String,
        keyspace: String,
        shard: String,
        tablet_type: String,
        /// Endpoint as `uid@host:port`; repeatable, none publishes an empty list
        #[arg(long = "endpoint")]
        endpoints: Vec<String>,
    },
    /// Merge one tablet's endpoint into an existing endpoint list
    PublishEndpoint {
        cell: String,
        keyspace: String,
        shard: String,
        tablet_type: String,
        #[arg(long)]
        uid: u32,
        #[arg(long)]
        host: String,
        #[arg(long)]
        port: u16,
        /// Additional named port, `name=port`; repeatable
        #[arg(long = "named-port")]
        named_ports: Vec<String>,
    },
    /// Remove the endpoint list for a tablet type
    Delete {
        cell: String,
        keyspace: String,
        shard: String,
        tablet_type: String,
    },
}

fn parse_named_port(s: &str) -> anyhow::Result<(String, u16)> {
    let (name, port) = s
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("named port must be name=port, got {s:?}"))?;
    Ok((name.to_string(), port.parse()?))
}

fn parse_endpoint(s: &str) -> anyhow::Result<VtnsAddr> {
    let (uid, addr) = s
        .split_once('@')
        .ok_or_else(|| anyhow::anyhow!("endpoint must be uid@host:port, got {s:?}"))?;
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow::anyhow!("endpoint must be uid@host:port, got {s:?}"))?;
    if host.is_empty() {
        anyhow::bail!("endpoint {s:?} has no host");
    }
    Ok(VtnsAddr::new(uid.parse()?, host, port.parse()?))
}

pub fn run(topo: &Topology, action: ServingAction) -> anyhow::Result<()> {
    match action {
        ServingAction::Get {
            cell,
            keyspace,
            shard,
            tablet_type,
        } => match tablet_type {
            Some(t) => {
                let tablet_type: TabletType = t.parse()?;
                let addrs = topo
                    .serving
                    .get_srv_tablet_type(&cell, &keyspace, &shard, tablet_type)?;
                println!("version: {}", addrs.version);
                println!("{}", serde_json::to_string_pretty(&addrs.value)?);
            }
            None => {
                for t in topo
                    .serving
                    .get_srv_tablet_types_per_shard(&cell, &keyspace, &shard)?
                {
                    println!("{t}");
                }
            }
        },
        ServingAction::Publish {
            cell,
            keyspace,
            shard,
            tablet_type,
            endpoints,
        } => {
            let tablet_type: TabletType = tablet_type.parse()?;
            let mut addrs = VtnsAddrs::default();
            for spec in &endpoints {
                addrs.upsert(&parse_endpoint(spec)?);
            }
            topo.serving
                .update_srv_tablet_type(&cell, &keyspace, &shard, tablet_type, &addrs)?;
            println!(
                "✓ Published {} {tablet_type} endpoint(s) for {keyspace}/{shard}",
                addrs.entries.len()
            );
        }
        ServingAction::PublishEndpoint {
            cell,
            keyspace,
            shard,
            tablet_type,
            uid,
            host,
            port,
            named_ports,
        } => {
            let tablet_type: TabletType = tablet_type.parse()?;
            let mut addr = VtnsAddr::new(uid, host, port);
            for spec in &named_ports {
                let (name, port) = parse_named_port(spec)?;
                addr = addr.with_named_port(name, port);
            }
            match topo
                .serving
                .update_tablet_endpoint(&cell, &keyspace, &shard, tablet_type, &addr)?
            {
                EndpointUpdate::Updated => println!("✓ Published endpoint for uid {uid}"),
                EndpointUpdate::Skipped => {
                    println!("No {tablet_type} endpoint list for {keyspace}/{shard} yet; nothing published")
                }
            }
        }
        ServingAction::Delete {
            cell,
            keyspace,
            shard,
            tablet_type,
        } => {
            let tablet_type: TabletType = tablet_type.parse()?;
            topo.serving
                .delete_srv_tablet_type(&cell, &keyspace, &shard, tablet_type)?;
            println!("✓ Deleted {tablet_type} endpoints for {keyspace}/{shard}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_port_parsing() {
        assert_eq!(parse_named_port("grpc=15991").unwrap(), ("grpc".to_string(), 15991));
        assert!(parse_named_port("grpc").is_err());
        assert!(parse_named_port("grpc=http").is_err());
    }

    #[test]
    fn endpoint_parsing() {
        let addr = parse_endpoint("3@db3.example:6700").unwrap();
        assert_eq!(addr, VtnsAddr::new(3, "db3.example", 6700));
        assert!(parse_endpoint("db3:6700").is_err());
        assert!(parse_endpoint("3@db3").is_err());
        assert!(parse_endpoint("3@:6700").is_err());
    }

    #[test]
    fn publish_creates_list_that_endpoints_merge_into() {
        let topo = Topology::open(&vtopo::TopoConfig::default()).unwrap();
        run(
            &topo,
            ServingAction::Publish {
                cell: "nyc".into(),
                keyspace: "user".into(),
                shard: "0".into(),
                tablet_type: "replica".into(),
                endpoints: vec!["1@db1:6700".into()],
            },
        )
        .unwrap();

        let merged = topo
            .serving
            .update_tablet_endpoint("nyc", "user", "0", TabletType::Replica, &VtnsAddr::new(2, "db2", 6700))
            .unwrap();
        assert_eq!(merged, EndpointUpdate::Updated);
        let addrs = topo
            .serving
            .get_srv_tablet_type("nyc", "user", "0", TabletType::Replica)
            .unwrap()
            .value;
        assert_eq!(addrs.entries.len(), 2);
    }
}
