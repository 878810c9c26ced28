//! Remote Operations
//!
//! Per-view wrappers that execute a descriptor through the shared
//! [`Transport`](crate::transport::Transport) and expose its lifecycle:
//!
//! ```text
//! Idle ──execute──► Pending ──ok──► Fulfilled
//!  ▲                   │    ──err─► Rejected
//!  └──────reset────────┴──── (from any state)
//! ```

mod remote;
mod state;

pub use remote::{OverlapPolicy, RemoteOperation};
pub use state::{OperationState, Phase};
