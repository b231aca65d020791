pub mod action;
pub mod serving;
pub mod tablet;

use vtopo::TabletAlias;

/// Parse a `cell-uid` alias argument.
pub fn parse_alias(s: &str) -> anyhow::Result<TabletAlias> {
    s.parse()
        .map_err(|e| anyhow::anyhow!("invalid tablet alias {s:?}: {e}"))
}
