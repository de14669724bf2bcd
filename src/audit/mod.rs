//! Immutable, ordered audit trail
//!
//! One entry per decision, appended durably before the enforcement call
//! returns. Entries carry a record fingerprint, never the raw record, and
//! are totally ordered by a single owned sequence counter. Nothing here is
//! ever mutated or deleted; the log replays cleanly from its sink.

mod sink;

pub use sink::{AuditSink, FailingSink, FileSink, MemorySink};

use crate::engine::decision::{ActorContext, Decision};
use crate::error::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// One immutable audit record
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Monotonically increasing, assigned by the recorder, starts at 1
    pub seq: u64,
    pub policy_id: String,
    /// Framework tags of the policy at decision time, so compliance scoring
    /// replays from the log alone
    pub frameworks: Vec<String>,
    /// Non-reversible digest of the evaluated record
    pub record_fingerprint: String,
    pub decision: Decision,
    pub actor: ActorContext,
}

/// Decision context to be audited; the recorder assigns the sequence number
#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub policy_id: String,
    pub frameworks: Vec<String>,
    pub record_fingerprint: String,
    pub decision: Decision,
    pub actor: ActorContext,
}

/// Append-only audit recorder over a durable sink
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
    /// Next sequence number; the lock also serializes sink write order
    next_seq: Mutex<u64>,
    cache: RwLock<Vec<AuditEntry>>,
}

impl AuditRecorder {
    /// Open a recorder over a sink, replaying any existing entries to seed
    /// the cache and the sequence counter.
    pub async fn open(sink: Arc<dyn AuditSink>) -> Result<Self> {
        let mut entries = Vec::new();
        for line in sink.read_lines().await? {
            match serde_json::from_str::<AuditEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable audit line: {}", e);
                }
            }
        }
        let next_seq = entries.last().map(|e| e.seq + 1).unwrap_or(1);
        Ok(Self {
            sink,
            next_seq: Mutex::new(next_seq),
            cache: RwLock::new(entries),
        })
    }

    /// Recorder backed by an append-only JSONL file
    pub async fn file(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(Arc::new(FileSink::open(path).await?)).await
    }

    /// Recorder backed by memory only
    pub fn in_memory() -> Self {
        Self {
            sink: Arc::new(MemorySink::default()),
            next_seq: Mutex::new(1),
            cache: RwLock::new(Vec::new()),
        }
    }

    /// Durably append one entry and return its sequence number.
    ///
    /// The write is complete before this returns; on sink failure the
    /// sequence counter does not advance and the caller must fail closed.
    pub async fn append(&self, pending: PendingEntry) -> Result<u64> {
        let mut next_seq = self.next_seq.lock().await;
        let entry = AuditEntry {
            seq: *next_seq,
            policy_id: pending.policy_id,
            frameworks: pending.frameworks,
            record_fingerprint: pending.record_fingerprint,
            decision: pending.decision,
            actor: pending.actor,
        };
        let line = serde_json::to_string(&entry)?;
        self.sink.write_line(&line).await?;

        let seq = entry.seq;
        *next_seq += 1;
        self.cache.write().await.push(entry);
        Ok(seq)
    }

    /// Entries with a sequence number greater than `seq`, in order.
    /// `read_since(0)` returns the full log.
    pub async fn read_since(&self, seq: u64) -> Vec<AuditEntry> {
        self.cache
            .read()
            .await
            .iter()
            .filter(|e| e.seq > seq)
            .cloned()
            .collect()
    }

    /// Number of entries recorded
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::decision::DecisionOutcome;
    use crate::policy::Action;
    use tempfile::TempDir;

    fn pending(policy_id: &str, action: Action) -> PendingEntry {
        PendingEntry {
            policy_id: policy_id.to_string(),
            frameworks: vec!["GDPR".to_string()],
            record_fingerprint: "deadbeef".to_string(),
            decision: Decision {
                rule_id: "r1".to_string(),
                action,
                fields: vec!["email".to_string()],
                message: "test".to_string(),
                detail: String::new(),
                timestamp: chrono::Utc::now(),
                outcome: DecisionOutcome::Applied,
            },
            actor: ActorContext::new("tester"),
        }
    }

    #[tokio::test]
    async fn test_append_assigns_increasing_seq() {
        let recorder = AuditRecorder::in_memory();
        let first = recorder.append(pending("p1", Action::Allow)).await.unwrap();
        let second = recorder.append(pending("p1", Action::Deny)).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(recorder.len().await, 2);
    }

    #[tokio::test]
    async fn test_read_since_filters() {
        let recorder = AuditRecorder::in_memory();
        for _ in 0..5 {
            recorder.append(pending("p1", Action::Flag)).await.unwrap();
        }
        assert_eq!(recorder.read_since(0).await.len(), 5);
        let tail = recorder.read_since(3).await;
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].seq, 4);
        assert_eq!(tail[1].seq, 5);
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_advance_seq() {
        struct FlakySink {
            inner: MemorySink,
            fail: std::sync::atomic::AtomicBool,
        }
        #[async_trait::async_trait]
        impl AuditSink for FlakySink {
            async fn write_line(&self, line: &str) -> Result<()> {
                if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                    return Err(crate::error::Error::AuditWriteFailed("down".to_string()));
                }
                self.inner.write_line(line).await
            }
            async fn read_lines(&self) -> Result<Vec<String>> {
                self.inner.read_lines().await
            }
        }

        let sink = Arc::new(FlakySink {
            inner: MemorySink::default(),
            fail: std::sync::atomic::AtomicBool::new(false),
        });
        let recorder = AuditRecorder::open(sink.clone()).await.unwrap();
        recorder.append(pending("p1", Action::Allow)).await.unwrap();

        sink.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        let err = recorder.append(pending("p1", Action::Deny)).await;
        assert!(matches!(err, Err(crate::error::Error::AuditWriteFailed(_))));

        sink.fail.store(false, std::sync::atomic::Ordering::SeqCst);
        let seq = recorder.append(pending("p1", Action::Deny)).await.unwrap();
        // The failed append left no gap
        assert_eq!(seq, 2);
        assert_eq!(recorder.len().await, 2);
    }

    #[tokio::test]
    async fn test_file_sink_replays_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.jsonl");

        {
            let recorder = AuditRecorder::file(&path).await.unwrap();
            recorder.append(pending("p1", Action::Deny)).await.unwrap();
            recorder.append(pending("p2", Action::Allow)).await.unwrap();
        }

        let reopened = AuditRecorder::file(&path).await.unwrap();
        assert_eq!(reopened.len().await, 2);
        let entries = reopened.read_since(0).await;
        assert_eq!(entries[0].policy_id, "p1");
        assert_eq!(entries[1].policy_id, "p2");

        // Sequence numbering continues where the log left off
        let seq = reopened.append(pending("p3", Action::Flag)).await.unwrap();
        assert_eq!(seq, 3);
    }

    #[tokio::test]
    async fn test_concurrent_appends_totally_ordered() {
        let recorder = Arc::new(AuditRecorder::in_memory());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let recorder = Arc::clone(&recorder);
            handles.push(tokio::spawn(async move {
                recorder.append(pending("p1", Action::Flag)).await.unwrap()
            }));
        }
        let mut seqs = Vec::new();
        for handle in handles {
            seqs.push(handle.await.unwrap());
        }
        seqs.sort_unstable();
        assert_eq!(seqs, (1..=8).collect::<Vec<u64>>());

        let entries = recorder.read_since(0).await;
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.seq, i as u64 + 1);
        }
    }
}
