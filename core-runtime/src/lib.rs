//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the lottery results core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Sync-status and data-change event channels
//!
//! ## Overview
//!
//! Other crates depend on this one for the shared event payloads
//! ([`events::LottoData`], [`events::SyncStatus`]), the logging conventions and
//! the validated [`config::LottoConfig`].

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
