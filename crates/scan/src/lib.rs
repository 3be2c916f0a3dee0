#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`ScannerError`)
//! - [`adapter`]: Scanner adapters (`Scanner`, `GrypeScanner`, `TrivyScanner`)
//! - [`merge`]: Cross-tool result merging (`merge_results`)
//! - [`policy`]: Severity threshold enforcement (`PolicyEnforcer`)
//! - [`runner`]: Concurrent fan-out orchestrator (`ScanRunner`)
//!
//! # Architecture
//!
//! ```text
//! image ref --> ScanRunner
//!                  |
//!         +--------+--------+          (concurrent fan-out)
//!         |                 |
//!    GrypeScanner      TrivyScanner
//!         |                 |
//!     ScanResult        ScanResult
//!         +--------+--------+
//!                  |
//!            merge_results            (dedup by id, keep highest severity)
//!                  |
//!            PolicyEnforcer           (fail_on / warn_on floors)
//!                  |
//!          Ok(merged) | PolicyError
//! ```

pub mod adapter;
pub mod error;
pub mod merge;
pub mod policy;
pub mod runner;

// --- Public API Re-exports ---

// Runner (main orchestrator)
pub use runner::{ScanRunner, ScanRunnerBuilder};

// Adapters
pub use adapter::{GrypeScanner, Scanner, ScannerAdapter, TrivyScanner};

// Merge
pub use merge::merge_results;

// Policy
pub use policy::PolicyEnforcer;

// Error
pub use error::ScannerError;
