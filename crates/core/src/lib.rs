//! Records, events and errors shared by the prediction ledger and the
//! oracle authority.

pub mod context;
pub mod deployment;
pub mod error;
pub mod event;
pub mod model;
pub mod request;

pub use context::{CallContext, Clock, ManualClock, SystemClock};
pub use deployment::DeploymentInfo;
pub use error::{OracleError, Result, Role};
pub use event::{EventRecord, LedgerEvent, Receipt};
pub use model::{FeeConfig, ModelState};
pub use request::{checked_confidence, fulfill, PredictionRequest, RequestStatus, MAX_CONFIDENCE, RESULT_SCALE};
