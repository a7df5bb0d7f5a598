use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

/// One HTTP round-trip made by the workflow.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEvent {
    pub operation: String,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    pub status: u16,
}

impl RequestEvent {
    pub fn duration_seconds(&self) -> f64 {
        (self.finished_at - self.started_at)
            .as_seconds_f64()
            .max(0.0)
    }
}

#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub total_requests: usize,
    pub total_duration_seconds: f64,
    pub by_operation: HashMap<String, SummaryBucket>,
}

#[derive(Debug, Default, Serialize)]
pub struct SummaryBucket {
    pub requests: usize,
    pub total_duration_seconds: f64,
}

/// Shared recorder threaded through the client; one event per request.
#[derive(Clone, Default)]
pub struct RunMonitor {
    inner: Arc<Mutex<Vec<RequestEvent>>>,
}

impl RunMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: RequestEvent) {
        self.inner.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<RequestEvent> {
        self.inner.lock().unwrap().clone()
    }

    pub fn summarize(&self) -> RunSummary {
        let events = self.inner.lock().unwrap();
        let mut summary = RunSummary {
            total_requests: events.len(),
            ..RunSummary::default()
        };
        for event in events.iter() {
            let duration = event.duration_seconds();
            summary.total_duration_seconds += duration;
            let bucket = summary
                .by_operation
                .entry(event.operation.clone())
                .or_default();
            bucket.requests += 1;
            bucket.total_duration_seconds += duration;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn summarizes_by_operation() {
        let monitor = RunMonitor::new();
        let now = OffsetDateTime::now_utc();
        for operation in ["files.get", "files.get", "generateContent"] {
            monitor.record(RequestEvent {
                operation: operation.to_string(),
                started_at: now,
                finished_at: now + Duration::seconds(1),
                status: 200,
            });
        }
        let summary = monitor.summarize();
        assert_eq!(summary.total_requests, 3);
        assert_eq!(summary.by_operation["files.get"].requests, 2);
        assert_eq!(summary.by_operation["generateContent"].requests, 1);
        assert!((summary.total_duration_seconds - 3.0).abs() < 1e-9);
    }
}
