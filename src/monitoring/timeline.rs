//! Execution Timeline
//!
//! Records when jobs and steps start and finish, for the run summary and
//! its ASCII chart.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Started,
    Completed,
    Failed,
    /// Not executed (resumed from an earlier run)
    Skipped,
}

impl EventType {
    fn is_terminal(self) -> bool {
        !matches!(self, Self::Started)
    }
}

/// Whether an entry is a whole job or a step inside one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Job,
    Step,
}

/// A single event in the execution timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    /// `job` or `job/step`
    pub label: String,
    pub kind: EntryKind,
    pub event_type: EventType,
    pub timestamp: Instant,
}

/// Timing of one job or step, derived from its events.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub label: String,
    pub kind: EntryKind,
    /// Offset from the start of the run
    pub start: Duration,
    pub end: Option<Duration>,
    pub outcome: EventType,
}

impl TimelineEntry {
    pub fn duration(&self) -> Option<Duration> {
        self.end.map(|end| end.saturating_sub(self.start))
    }
}

/// Tracks the execution timeline of a workflow run.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    start_time: Instant,
}

impl ExecutionTimeline {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn job_event(&mut self, job_id: &str, event_type: EventType) {
        self.push(job_id.to_string(), EntryKind::Job, event_type);
    }

    pub fn step_event(&mut self, job_id: &str, step: &str, event_type: EventType) {
        self.push(format!("{}/{}", job_id, step), EntryKind::Step, event_type);
    }

    fn push(&mut self, label: String, kind: EntryKind, event_type: EventType) {
        self.events.push(TimelineEvent {
            label,
            kind,
            event_type,
            timestamp: Instant::now(),
        });
    }

    /// Returns the total elapsed time since timeline creation.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Entries in the order they started.
    pub fn entries(&self) -> Vec<TimelineEntry> {
        let mut entries: Vec<TimelineEntry> = Vec::new();
        let mut open: HashMap<&str, usize> = HashMap::new();

        for event in &self.events {
            let offset = event.timestamp.duration_since(self.start_time);

            match event.event_type {
                EventType::Started => {
                    open.insert(event.label.as_str(), entries.len());
                    entries.push(TimelineEntry {
                        label: event.label.clone(),
                        kind: event.kind,
                        start: offset,
                        end: None,
                        outcome: EventType::Started,
                    });
                }
                terminal => match open.remove(event.label.as_str()) {
                    Some(index) => {
                        entries[index].end = Some(offset);
                        entries[index].outcome = terminal;
                    }
                    // Skipped entries never start
                    None => entries.push(TimelineEntry {
                        label: event.label.clone(),
                        kind: event.kind,
                        start: offset,
                        end: Some(offset),
                        outcome: terminal,
                    }),
                },
            }
        }

        entries
    }

    /// Durations of finished jobs and steps, in milliseconds.
    pub fn get_durations(&self) -> HashMap<String, u128> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.outcome.is_terminal() && entry.outcome != EventType::Skipped)
            .filter_map(|entry| entry.duration().map(|d| (entry.label, d.as_millis())))
            .collect()
    }

    /// Renders an ASCII chart of the run, one row per job and step.
    pub fn chart(&self) -> String {
        let mut output = String::from("\nExecution Timeline:\n\n");

        let entries = self.entries();
        let total = entries
            .iter()
            .filter_map(|e| e.end)
            .max()
            .unwrap_or_default()
            .as_millis()
            .max(1);

        let scale = 40.0 / total as f64;

        for entry in &entries {
            let label = match entry.kind {
                EntryKind::Job => truncate(&entry.label, 24),
                EntryKind::Step => truncate(&format!("  {}", entry.label), 24),
            };

            let (bar, note) = match (entry.outcome, entry.duration()) {
                (EventType::Skipped, _) => (String::new(), "skipped".to_string()),
                (_, None) => (String::new(), "unfinished".to_string()),
                (outcome, Some(duration)) => {
                    let start_pos = (entry.start.as_millis() as f64 * scale) as usize;
                    let width = (duration.as_millis() as f64 * scale).max(1.0) as usize;
                    let fill = if outcome == EventType::Failed { "x" } else { "#" };
                    let mut bar = " ".repeat(start_pos);
                    bar.push_str(&fill.repeat(width));
                    (bar, format!("{} ms", duration.as_millis()))
                }
            };

            output.push_str(&format!("{} |{:40}| {}\n", label, bar, note));
        }

        output.push_str(&format!("\nTotal: {} ms\n", self.elapsed().as_millis()));
        output
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Pads or shortens a label to exactly `width` characters.
fn truncate(s: &str, width: usize) -> String {
    let count = s.chars().count();
    if count <= width {
        format!("{:width$}", s, width = width)
    } else {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
