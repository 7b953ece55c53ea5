//! # Supabase Provider
//!
//! Implements `RemoteResultSource` over the Supabase PostgREST API.
//!
//! ## Overview
//!
//! This module provides:
//! - Exact counts via `HEAD` requests with `Prefer: count=exact`
//! - Offset/limit paginated reads ordered newest first
//! - Translation of query conditions into PostgREST filters
//! - Environment-driven configuration with redacted credentials

pub mod config;
pub mod error;
pub mod source;

pub use config::{SupabaseConfig, DEFAULT_TABLE};
pub use error::{Result, SupabaseError};
pub use source::SupabaseResultSource;
