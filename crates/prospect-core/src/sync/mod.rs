//! Bidirectional sync engine
//!
//! One cycle: snapshot the pending local changes, exchange them with the
//! server, settle the round trip. The push buffers are cleared only inside
//! the apply transaction, so a failed exchange leaves everything pending and
//! the next cycle re-pushes the same snapshot.

mod apply;
mod transport;

pub use transport::{HttpSyncClient, SyncTransport};

use tokio::sync::Mutex;

use crate::db::{ChangeTracker, Database, SessionRepository, SqliteSessionRepository};
use crate::error::{Error, Result};
use crate::protocol::SyncRequest;

/// Summary of a completed sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Records pushed to the server (including tombstone ids)
    pub pushed: usize,
    /// Records received in the pull delta (including tombstone ids)
    pub pulled: usize,
    /// The watermark handed back by the server
    pub watermark: i64,
}

/// Drives sync cycles over a [`SyncTransport`]
pub struct SyncEngine<T: SyncTransport> {
    transport: T,
    cycle: Mutex<()>,
}

impl<T: SyncTransport> SyncEngine<T> {
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            cycle: Mutex::const_new(()),
        }
    }

    /// Run one full sync cycle against the server.
    ///
    /// A cycle already in flight is rejected with [`Error::SyncInProgress`]
    /// rather than queued. Without a stored session this fails fast with
    /// [`Error::NotAuthenticated`] and never touches the network.
    pub async fn run_sync(&self, db: &Database) -> Result<SyncOutcome> {
        let _guard = self.cycle.try_lock().map_err(|_| Error::SyncInProgress)?;

        let sessions = SqliteSessionRepository::new(db.connection());
        let Some(session) = sessions.session()? else {
            return Err(Error::NotAuthenticated);
        };

        let pushed = ChangeTracker::new(db.connection()).pending()?;
        let request = SyncRequest {
            changes: pushed.clone(),
            last_pulled_at: sessions.last_pulled_at()?,
        };

        tracing::info!(
            pushing = pushed.record_count(),
            last_pulled_at = ?request.last_pulled_at,
            "starting sync cycle"
        );

        let response = self.transport.exchange(&session.token, &request).await?;

        apply::apply_round_trip(db.connection(), session.user_id, &pushed, &response)?;

        let outcome = SyncOutcome {
            pushed: pushed.record_count(),
            pulled: response.changes.record_count(),
            watermark: response.timestamp,
        };

        tracing::info!(
            pushed = outcome.pushed,
            pulled = outcome.pulled,
            watermark = outcome.watermark,
            "sync cycle complete"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::{AuthSession, LeadRepository, SqliteLeadRepository};
    use crate::models::{Lead, RecordId, Role};
    use crate::protocol::{SyncChanges, SyncResponse};

    struct StaticTransport {
        response: SyncResponse,
        calls: std::sync::Mutex<Vec<SyncRequest>>,
    }

    impl StaticTransport {
        fn new(response: SyncResponse) -> Self {
            Self {
                response,
                calls: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl SyncTransport for StaticTransport {
        async fn exchange(&self, _token: &str, request: &SyncRequest) -> Result<SyncResponse> {
            self.calls.lock().unwrap().push(request.clone());
            Ok(self.response.clone())
        }
    }

    struct FailingTransport;

    impl SyncTransport for FailingTransport {
        async fn exchange(&self, _token: &str, _request: &SyncRequest) -> Result<SyncResponse> {
            Err(Error::Api("service unavailable (503)".to_string()))
        }
    }

    fn setup_logged_in() -> Database {
        let db = Database::open_in_memory().unwrap();
        let sessions = SqliteSessionRepository::new(db.connection());
        sessions
            .store_session(&AuthSession {
                user_id: RecordId::new(),
                email: "editor@example.com".to_string(),
                name: "Editor".to_string(),
                role: Role::Editor,
                token: "jwt-token".to_string(),
            })
            .unwrap();
        db
    }

    fn sample_lead() -> Lead {
        Lead::new(
            "Asha Traders",
            "Mumbai",
            "9876543210",
            "9876543210",
            None,
            RecordId::new(),
        )
    }

    #[tokio::test]
    async fn test_sync_requires_session() {
        let db = Database::open_in_memory().unwrap();
        let transport = StaticTransport::new(SyncResponse {
            changes: SyncChanges::default(),
            timestamp: 1_000,
        });
        let engine = SyncEngine::new(transport);

        let result = engine.run_sync(&db).await;
        assert!(matches!(result, Err(Error::NotAuthenticated)));
        assert_eq!(engine.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_exchange_keeps_changes_pending() {
        let db = setup_logged_in();
        let leads = SqliteLeadRepository::new(db.connection());
        leads.create(&sample_lead()).unwrap();

        let engine = SyncEngine::new(FailingTransport);
        assert!(matches!(engine.run_sync(&db).await, Err(Error::Api(_))));

        let pending = ChangeTracker::new(db.connection()).pending().unwrap();
        assert_eq!(pending.leads.created.len(), 1);
        let sessions = SqliteSessionRepository::new(db.connection());
        assert!(sessions.last_pulled_at().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_successful_cycle_settles_and_advances_watermark() {
        let db = setup_logged_in();
        let leads = SqliteLeadRepository::new(db.connection());
        leads.create(&sample_lead()).unwrap();

        let engine = SyncEngine::new(StaticTransport::new(SyncResponse {
            changes: SyncChanges::default(),
            timestamp: 9_000,
        }));
        let outcome = engine.run_sync(&db).await.unwrap();

        assert_eq!(outcome.pushed, 1);
        assert_eq!(outcome.pulled, 0);
        assert_eq!(outcome.watermark, 9_000);

        assert!(ChangeTracker::new(db.connection()).pending().unwrap().is_empty());
        let sessions = SqliteSessionRepository::new(db.connection());
        assert_eq!(sessions.last_pulled_at().unwrap(), Some(9_000));
    }

    #[tokio::test]
    async fn test_request_carries_stored_watermark() {
        let db = setup_logged_in();
        let sessions = SqliteSessionRepository::new(db.connection());
        sessions.set_last_pulled_at(4_500).unwrap();

        let engine = SyncEngine::new(StaticTransport::new(SyncResponse {
            changes: SyncChanges::default(),
            timestamp: 9_000,
        }));
        engine.run_sync(&db).await.unwrap();

        let calls = engine.transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].last_pulled_at, Some(4_500));
    }
}
