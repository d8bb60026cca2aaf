//! Fire-and-forget notification of task transitions to observers.
//!
//! Sinks are called synchronously from the scheduler, sometimes while its state
//! lock is held, so `emit` must never block or call back into the scheduler.

use std::sync::Arc;

use crate::model::{DownloadStatistics, DownloadTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Submitted,
    Started,
    Progress,
    Paused,
    Resumed,
    /// Failed with a retryable error; back in Queued once the backoff elapses.
    Retrying,
    Completed,
    Failed,
    Cancelled,
    Deleted,
    StatisticsUpdated,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Submitted => "submitted",
            EventKind::Started => "started",
            EventKind::Progress => "progress",
            EventKind::Paused => "paused",
            EventKind::Resumed => "resumed",
            EventKind::Retrying => "retrying",
            EventKind::Completed => "completed",
            EventKind::Failed => "failed",
            EventKind::Cancelled => "cancelled",
            EventKind::Deleted => "deleted",
            EventKind::StatisticsUpdated => "statistics_updated",
        }
    }
}

/// One notification. Task events carry a snapshot of the task after the transition.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    Task {
        kind: EventKind,
        task: DownloadTask,
    },
    Statistics(DownloadStatistics),
}

impl SchedulerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SchedulerEvent::Task { kind, .. } => *kind,
            SchedulerEvent::Statistics(_) => EventKind::StatisticsUpdated,
        }
    }

    pub fn task(&self) -> Option<&DownloadTask> {
        match self {
            SchedulerEvent::Task { task, .. } => Some(task),
            SchedulerEvent::Statistics(_) => None,
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &SchedulerEvent);
}

/// Logs every transition; progress and statistics only at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &SchedulerEvent) {
        match event {
            SchedulerEvent::Task { kind, task } => match kind {
                EventKind::Progress => tracing::trace!(
                    task = %task.id,
                    bytes = task.downloaded_bytes,
                    speed = task.speed_bps,
                    "progress"
                ),
                EventKind::Retrying => tracing::info!(
                    task = %task.id,
                    retry = task.retry_count,
                    error = ?task.last_error.as_ref().map(|e| &e.message),
                    "task will retry"
                ),
                EventKind::Failed => tracing::warn!(
                    task = %task.id,
                    error = ?task.last_error.as_ref().map(|e| &e.message),
                    "task failed"
                ),
                _ => tracing::info!(
                    task = %task.id,
                    status = task.status.as_str(),
                    "task {}",
                    kind.as_str()
                ),
            },
            SchedulerEvent::Statistics(s) => tracing::trace!(
                active = s.active,
                queued = s.queued,
                speed = s.current_speed_bps,
                "statistics updated"
            ),
        }
    }
}

/// Forwards events into a bounded tokio channel. Drops events when the channel is full.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: tokio::sync::mpsc::Sender<SchedulerEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, tokio::sync::mpsc::Receiver<SchedulerEvent>) {
        let (tx, rx) = tokio::sync::mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &SchedulerEvent) {
        let _ = self.tx.try_send(event.clone());
    }
}

/// Fans events out to every registered sink.
#[derive(Clone, Default)]
pub struct EventPublisher {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn task(&self, kind: EventKind, task: &DownloadTask) {
        if self.sinks.is_empty() {
            return;
        }
        let event = SchedulerEvent::Task {
            kind,
            task: task.clone(),
        };
        self.emit(&event);
    }

    pub fn statistics(&self, stats: DownloadStatistics) {
        if self.sinks.is_empty() {
            return;
        }
        self.emit(&SchedulerEvent::Statistics(stats));
    }

    fn emit(&self, event: &SchedulerEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_receives_and_drops_when_full() {
        let (sink, mut rx) = ChannelSink::new(1);
        let publisher = EventPublisher::new().with_sink(Arc::new(sink));
        publisher.statistics(DownloadStatistics::default());
        publisher.statistics(DownloadStatistics {
            active: 9,
            ..DownloadStatistics::default()
        });
        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind(), EventKind::StatisticsUpdated);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn publisher_without_sinks_is_noop() {
        EventPublisher::new().statistics(DownloadStatistics::default());
    }
}
