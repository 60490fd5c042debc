//! Business logic services.

pub mod aggregator;
pub mod ai;
pub mod enforcement;
pub mod events;
pub mod frequency;
pub mod pipeline;
pub mod reputation;
pub mod response;
pub mod scoring;
