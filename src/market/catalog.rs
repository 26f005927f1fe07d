//! Static asset catalog

use serde::{Deserialize, Serialize};

/// Catalog entry for a tracked asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Symbol code without market prefix (e.g., "BTC")
    pub id: String,
    /// Display name
    pub name: String,
    /// Pinned to the top of the board
    #[serde(default)]
    pub starred: bool,
}

impl AssetInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, starred: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            starred,
        }
    }
}

/// Built-in Upbit KRW presets
pub fn default_catalog() -> Vec<AssetInfo> {
    vec![
        AssetInfo::new("BTC", "비트코인", true),
        AssetInfo::new("ETH", "이더리움", true),
        AssetInfo::new("XRP", "리플", false),
        AssetInfo::new("SOL", "솔라나", false),
        AssetInfo::new("ADA", "에이다", false),
        AssetInfo::new("DOGE", "도지코인", false),
    ]
}

/// Default tracked asset ids, in catalog order
pub fn default_asset_ids() -> Vec<String> {
    default_catalog().into_iter().map(|a| a.id).collect()
}

/// Find an entry by id
pub fn lookup<'a>(catalog: &'a [AssetInfo], id: &str) -> Option<&'a AssetInfo> {
    catalog.iter().find(|a| a.id == id)
}
