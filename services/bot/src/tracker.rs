//! Bounded in-memory history of handled requests, served by /status.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::pipeline::Stage;

/// Outcome record for one chart request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestReport {
    pub received_at: DateTime<Utc>,
    pub chat_id: i64,
    pub product: String,
    pub region: String,
    pub valid_time: String,
    /// Terminal stage: Delivered or Failed.
    pub stage: Stage,
    /// For failures, the stage the error surfaced in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_in: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub duration_ms: u64,
}

pub struct RequestTracker {
    reports: Mutex<VecDeque<RequestReport>>,
    capacity: usize,
}

impl RequestTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            reports: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    pub async fn push(&self, report: RequestReport) {
        let mut reports = self.reports.lock().await;
        if reports.len() == self.capacity {
            reports.pop_front();
        }
        reports.push_back(report);
    }

    /// Newest first.
    pub async fn recent(&self) -> Vec<RequestReport> {
        let reports = self.reports.lock().await;
        reports.iter().rev().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(chat_id: i64) -> RequestReport {
        RequestReport {
            received_at: Utc::now(),
            chat_id,
            product: "turbulence".to_string(),
            region: "Europe".to_string(),
            valid_time: "2024-11-24 10:00".to_string(),
            stage: Stage::Delivered,
            failed_in: None,
            error_kind: None,
            duration_ms: 42,
        }
    }

    #[tokio::test]
    async fn test_oldest_report_evicted_at_capacity() {
        let tracker = RequestTracker::new(2);
        tracker.push(report(1)).await;
        tracker.push(report(2)).await;
        tracker.push(report(3)).await;

        let recent = tracker.recent().await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].chat_id, 3);
        assert_eq!(recent[1].chat_id, 2);
    }
}
