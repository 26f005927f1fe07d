//! Paper portfolio module
//!
//! Cash plus user-entered positions valued against live prices, with
//! key-value persistence.

mod ledger;
mod store;
mod types;

pub use ledger::PortfolioLedger;
pub use store::{
    last_live_key, load_json, save_json, JsonFileStore, KeyValueStore, MemoryStore,
    PortfolioStore, CASH_KEY, HOLDINGS_KEY,
};
pub use types::{
    HoldingPosition, LedgerError, PortfolioSummary, PositionPatch, PositionValuation,
    QuickAddPreset,
};
