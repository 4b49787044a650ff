//! Recognition client
//!
//! Orchestrates image upload, inference and history persistence against a
//! recognition backend, and provides a paginated, filterable view over the
//! saved history.

pub mod backend;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod gate;
pub mod history;
pub mod metrics;
pub mod telemetry;
pub mod workflow;

pub use backend::{HttpBackend, RecognitionBackend};
pub use catalog::ModelCatalog;
pub use client::RecognitionClient;
pub use config::ClientConfig;
pub use error::{RecognitionError, Result};
pub use gate::{GatePermit, RequestGate};
pub use history::{FilterParams, HistoryQueryEngine, PaginationParams};
pub use workflow::{NormalizedResult, RecognitionWorkflow};
