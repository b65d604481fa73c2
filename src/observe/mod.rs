//! # Observability
//!
//! Structured diagnostics for pipeline runs, built on `tracing`.
//!
//! Everything in the library reports through `tracing` events: stage
//! boundaries at `debug!`, per-day outcomes and search convergence at
//! `info!`, recoverable acquisition faults at `warn!`. The library never
//! installs a subscriber on its own; a binary opts in by calling
//! [`init_logging`] once at startup.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use magpipe::observe::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development());
//!
//! tracing::info!(station = "LRE", "starting run");
//! ```

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
