//! Domain module - Core entities and domain logic
//!
//! This module contains the entities tracked by the pipeline (members and
//! their published videos), the channel identifier value object, and the
//! collaboration detection heuristic.

pub mod collab;
pub mod member;
pub mod video;

// Re-export commonly used items for convenience
pub use collab::is_collaboration;
pub use member::{ChannelId, Group, Member};
pub use video::Video;
