//! Run Monitoring Module
//!
//! Timing of jobs and steps during a workflow run.

pub mod timeline;

pub use timeline::{EntryKind, EventType, ExecutionTimeline, TimelineEntry, TimelineEvent};
