//! Audit Recorder
//!
//! Best-effort audit trail. `record` never blocks and never fails the
//! caller: entries go onto a bounded queue drained by one background
//! worker. A full queue drops the entry with a warning.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::domain::entity::audit_log::LoginAuditEntry;
use crate::domain::repository::AuditLogRepository;

const RETRY_DELAY: Duration = Duration::from_millis(100);

enum AuditMessage {
    Entry(Box<LoginAuditEntry>),
    Flush(oneshot::Sender<()>),
}

pub struct AuditRecorder {
    sender: mpsc::Sender<AuditMessage>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AuditRecorder {
    /// Start the background writer
    ///
    /// Must be called inside a Tokio runtime.
    pub fn spawn<R>(repo: Arc<R>, capacity: usize) -> Self
    where
        R: AuditLogRepository + Send + Sync + 'static,
    {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(repo, receiver));

        Self {
            sender,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Enqueue an entry without waiting
    pub fn record(&self, entry: LoginAuditEntry) {
        match self.sender.try_send(AuditMessage::Entry(Box::new(entry))) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Audit queue full, entry dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("Audit worker stopped, entry dropped");
            }
        }
    }

    /// Wait until everything enqueued so far has been written
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(AuditMessage::Flush(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Drain the queue and stop the worker
    pub async fn shutdown(&self) {
        self.flush().await;

        let handle = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
            tracing::info!("Audit recorder stopped");
        }
    }
}

async fn run_worker<R>(repo: Arc<R>, mut receiver: mpsc::Receiver<AuditMessage>)
where
    R: AuditLogRepository + Send + Sync + 'static,
{
    while let Some(message) = receiver.recv().await {
        match message {
            AuditMessage::Entry(entry) => write_entry(repo.as_ref(), &entry).await,
            AuditMessage::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

async fn write_entry<R>(repo: &R, entry: &LoginAuditEntry)
where
    R: AuditLogRepository + Send + Sync,
{
    if let Err(first) = repo.insert_audit_entry(entry).await {
        tracing::debug!(error = %first, "Audit insert failed, retrying once");
        tokio::time::sleep(RETRY_DELAY).await;

        if let Err(e) = repo.insert_audit_entry(entry).await {
            tracing::error!(
                error = %e,
                attempt_type = entry.attempt_type.as_str(),
                success = entry.success,
                "Audit entry lost"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use platform::client::ClientInfo;

    use super::*;
    use crate::domain::entity::audit_log::AttemptType;
    use crate::infra::memory::MemoryAuthRepository;

    #[tokio::test]
    async fn test_entries_written_in_order() {
        let repo = Arc::new(MemoryAuthRepository::new());
        let recorder = AuditRecorder::spawn(repo.clone(), 16);
        let client = ClientInfo::new(None, None);

        recorder.record(LoginAuditEntry::new(AttemptType::Login, &client).failed("X"));
        recorder.record(LoginAuditEntry::new(AttemptType::Login, &client).succeeded());
        recorder.flush().await;

        let entries = repo.audit_entries();
        assert_eq!(entries.len(), 2);
        assert!(!entries[0].success);
        assert!(entries[1].success);
    }

    #[tokio::test]
    async fn test_record_after_shutdown_is_harmless() {
        let repo = Arc::new(MemoryAuthRepository::new());
        let recorder = AuditRecorder::spawn(repo.clone(), 4);
        recorder.shutdown().await;

        recorder.record(LoginAuditEntry::new(AttemptType::Logout, &ClientInfo::new(None, None)));
        assert!(repo.audit_entries().is_empty());
    }
}
