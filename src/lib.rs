//! Workspace placeholder crate.
//!
//! This crate exposes the feature flags that map onto the individual workspace
//! crates. Host applications can depend on `lotto-workspace`, enable
//! `desktop-shims` and/or `supabase`, and reach the service façade through the
//! re-export below without wiring every crate by hand.

#[cfg(any(feature = "desktop-shims", feature = "supabase"))]
pub use core_service;
