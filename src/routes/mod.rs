//! Route definitions for the Rampart API.

pub mod health;
pub mod ingest;
pub mod intel;
pub mod metrics;
pub mod responses;
pub mod threats;
