//! The two cooperating state machines: [`PredictionLedger`] stores requests,
//! fees and the treasury; [`OracleAuthority`] decides who may answer and
//! relays verified answers into the ledger.
//!
//! Neither component knows the other at construction time. Create both, then
//! call [`link`] once before accepting traffic.

pub mod authority;
pub mod bootstrap;
pub mod ledger;

pub use authority::{AuthorityState, FulfillmentLedger, OracleAuthority};
pub use bootstrap::link;
pub use ledger::{LedgerMeta, PredictionLedger};

pub use predict_core::{OracleError, Receipt, Result};
