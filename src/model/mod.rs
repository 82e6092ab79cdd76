//! Value types shared by both reader phases: log positions, checkpoint tags,
//! and the event record shapes exchanged with the environment.

pub mod position;
pub mod records;

pub use position::{CheckpointTag, LogPosition, TagPosition};
pub use records::{EventRecord, PendingEvent, ResolvedEvent};
