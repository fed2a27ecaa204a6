//! Mortgage application lifecycle with role-scoped access, single-decision
//! enforcement, and best-effort event announcements over a primary stream with
//! queue fallback.

pub mod config;
pub mod error;
pub mod lending;
pub mod telemetry;
