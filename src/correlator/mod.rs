//! Request/response correlation.
//!
//! Couples outbound request ids to awaiting consumers and resolves them
//! when the matching response arrives, the timeout fires, or the request
//! is cancelled.

mod tracker;

pub use tracker::{
    BilateralPending, PendingResponse, ResponseTracker, TrackerConfig, TrackerStats,
    DEFAULT_MAX_PENDING, DEFAULT_SWEEP_INTERVAL,
};
