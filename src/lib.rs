//! VTuber Tracker - talent roster and video feed tracking pipeline
//!
//! Periodically discovers the talent rosters of two agency sites, resolves
//! each talent's channel identifier, follows their published video feeds,
//! and reconciles everything into a local SQLite store that presentation
//! layers read.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

// Re-export the collaborator-facing surface
pub use application::UpdateOrchestrator;
pub use domain::{ChannelId, Group, Member, Video};
pub use infrastructure::{
    AppConfig, DatabaseConnection, HttpClient, HttpClientConfig, TrackerRepository, init_logging,
};
