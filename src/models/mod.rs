//! Database models and DTOs for all domain entities.

pub mod event;
pub mod metrics;
pub mod pagination;
pub mod reputation;
pub mod response;
pub mod score;
