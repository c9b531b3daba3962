//! Infrastructure layer for database access, HTTP, and site extraction
//!
//! This module provides the SQLite connection and repository, the throttled
//! HTTP client, roster/feed extraction, and the logging/config plumbing.

pub mod config;
pub mod database_connection;
pub mod extraction;
pub mod http_client;
pub mod logging;
pub mod tracker_repository;

pub use config::{AppConfig, LoggingConfig, UpdateConfig, sites};
pub use database_connection::DatabaseConnection;
pub use extraction::{
    ChannelIdResolver, ExtractionError, ExtractionResult, HololiveExtractor, NijisanjiExtractor,
    RosterExtractor, TalentCandidate,
};
pub use http_client::{HttpClient, HttpClientConfig};
pub use logging::init_logging;
pub use tracker_repository::TrackerRepository;
