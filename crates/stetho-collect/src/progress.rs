//! Typed progress events for the collection run.
//!
//! Consumers receive structured events only; the interactive renderer and
//! the plain-log consumer both subscribe to the same channel.

use std::collections::BTreeMap;

use serde::Serialize;

/// Lifecycle state of one collector in the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorPhase {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// One event on the progress stream. Events are totally ordered: the
/// scheduler is the only producer while a collector runs.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub current_name: String,
    pub current_status: CollectorPhase,
    pub completed: usize,
    pub total: usize,
    /// Per-collector status snapshot at the time of the event.
    pub collectors: BTreeMap<String, CollectorPhase>,
    /// Attached warning, e.g. a redactor that had to be skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub type ProgressSender = tokio::sync::mpsc::UnboundedSender<ProgressEvent>;
pub type ProgressReceiver = tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>;

/// Create an unbounded progress channel.
#[must_use]
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// Tracks per-collector state and publishes snapshots.
#[derive(Debug)]
pub struct ProgressTracker {
    sender: ProgressSender,
    statuses: BTreeMap<String, CollectorPhase>,
    total: usize,
    completed: usize,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(sender: ProgressSender, titles: &[String]) -> Self {
        let statuses = titles
            .iter()
            .map(|t| (t.clone(), CollectorPhase::Pending))
            .collect();
        Self {
            sender,
            statuses,
            total: titles.len(),
            completed: 0,
        }
    }

    pub fn update(&mut self, title: &str, phase: CollectorPhase) {
        self.update_with_message(title, phase, None);
    }

    pub fn update_with_message(
        &mut self,
        title: &str,
        phase: CollectorPhase,
        message: Option<String>,
    ) {
        self.statuses.insert(title.to_string(), phase);
        if matches!(
            phase,
            CollectorPhase::Completed | CollectorPhase::Failed | CollectorPhase::Skipped
        ) {
            self.completed += 1;
        }
        // A closed receiver just means nobody is rendering progress.
        let _ = self.sender.send(ProgressEvent {
            current_name: title.to_string(),
            current_status: phase,
            completed: self.completed,
            total: self.total,
            collectors: self.statuses.clone(),
            message,
        });
    }

    pub fn warn(&mut self, title: &str, message: String) {
        let phase = self
            .statuses
            .get(title)
            .copied()
            .unwrap_or(CollectorPhase::Running);
        let _ = self.sender.send(ProgressEvent {
            current_name: title.to_string(),
            current_status: phase,
            completed: self.completed,
            total: self.total,
            collectors: self.statuses.clone(),
            message: Some(message),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_counts_terminal_states_once() {
        let (tx, mut rx) = channel();
        let titles = vec!["a".to_string(), "b".to_string()];
        let mut tracker = ProgressTracker::new(tx, &titles);

        tracker.update("a", CollectorPhase::Running);
        tracker.update("a", CollectorPhase::Completed);
        tracker.update("b", CollectorPhase::Skipped);

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        let last = last.unwrap();
        assert_eq!(last.completed, 2);
        assert_eq!(last.total, 2);
        assert_eq!(last.collectors["a"], CollectorPhase::Completed);
        assert_eq!(last.collectors["b"], CollectorPhase::Skipped);
    }
}
