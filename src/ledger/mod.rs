pub mod error;
pub mod store;
pub mod types;

pub use error::{LedgerError, LedgerResult};
pub use store::SyncLedger;
pub use types::{LedgerEntry, SyncCheck};
