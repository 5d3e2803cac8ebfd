//! Priority scheduling of triaged patients.
//!
//! Entries are kept ordered by category rank (Emergency=1, Urgent=2,
//! Routine=3). Equal ranks keep their insertion order.

use serde::Serialize;
use tokio::sync::Mutex;

use crate::metrics;
use crate::types::TriageCategory;

/// A scheduled patient
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    pub priority_rank: u8,
    pub patient_id: String,
    pub category: TriageCategory,
    /// Insertion sequence, used to break rank ties
    pub sequence: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    entries: Vec<QueueEntry>,
    next_sequence: u64,
}

/// Ordered queue of triaged patients
#[derive(Debug, Default)]
pub struct PriorityScheduler {
    state: Mutex<QueueState>,
}

impl PriorityScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a patient and return the full queue in retrieval order.
    pub async fn schedule(
        &self,
        patient_id: impl Into<String>,
        category: TriageCategory,
    ) -> Vec<QueueEntry> {
        let mut state = self.state.lock().await;

        let entry = QueueEntry {
            priority_rank: category.rank(),
            patient_id: patient_id.into(),
            category,
            sequence: state.next_sequence,
        };
        state.next_sequence += 1;

        // After every entry of equal or better rank, so ties stay FIFO
        let pos = state.entries.partition_point(|e| e.priority_rank <= entry.priority_rank);
        tracing::debug!(
            patient_id = %entry.patient_id,
            rank = entry.priority_rank,
            position = pos,
            "Patient scheduled"
        );
        state.entries.insert(pos, entry);

        metrics::set_queue_size(state.entries.len());
        state.entries.clone()
    }

    /// Current queue in retrieval order.
    pub async fn ordered(&self) -> Vec<QueueEntry> {
        self.state.lock().await.entries.clone()
    }

    /// Remove and return the most urgent, earliest-scheduled entry.
    pub async fn pop_highest_priority(&self) -> Option<QueueEntry> {
        let mut state = self.state.lock().await;
        if state.entries.is_empty() {
            return None;
        }
        let entry = state.entries.remove(0);
        metrics::set_queue_size(state.entries.len());
        Some(entry)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ids(entries: &[QueueEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.patient_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_ordering_by_rank() {
        let scheduler = PriorityScheduler::new();
        scheduler.schedule("p1", TriageCategory::Routine).await;
        scheduler.schedule("p2", TriageCategory::Emergency).await;
        let ordered = scheduler.schedule("p3", TriageCategory::Urgent).await;

        assert_eq!(ids(&ordered), vec!["p2", "p3", "p1"]);
        assert_eq!(ordered[0].priority_rank, 1);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let scheduler = PriorityScheduler::new();
        scheduler.schedule("u1", TriageCategory::Urgent).await;
        scheduler.schedule("e1", TriageCategory::Emergency).await;
        scheduler.schedule("u2", TriageCategory::Urgent).await;
        scheduler.schedule("e2", TriageCategory::Emergency).await;

        assert_eq!(ids(&scheduler.ordered().await), vec!["e1", "e2", "u1", "u2"]);
    }

    #[tokio::test]
    async fn test_pop_highest_priority() {
        let scheduler = PriorityScheduler::new();
        assert!(scheduler.pop_highest_priority().await.is_none());

        scheduler.schedule("r", TriageCategory::Routine).await;
        scheduler.schedule("e", TriageCategory::Emergency).await;

        assert_eq!(scheduler.pop_highest_priority().await.unwrap().patient_id, "e");
        assert_eq!(scheduler.pop_highest_priority().await.unwrap().patient_id, "r");
        assert!(scheduler.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_scheduling() {
        let scheduler = Arc::new(PriorityScheduler::new());
        let categories = [TriageCategory::Routine, TriageCategory::Urgent, TriageCategory::Emergency];

        let handles: Vec<_> = (0..60)
            .map(|i| {
                let scheduler = scheduler.clone();
                let category = categories[i % 3];
                tokio::spawn(async move { scheduler.schedule(format!("p{}", i), category).await })
            })
            .collect();
        futures::future::join_all(handles).await;

        let ordered = scheduler.ordered().await;
        assert_eq!(ordered.len(), 60);
        assert!(ordered.windows(2).all(|w| {
            (w[0].priority_rank, w[0].sequence) < (w[1].priority_rank, w[1].sequence)
        }));
    }
}
