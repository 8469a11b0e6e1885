use crate::gateway::ListingGateway;
use crate::wizard::{ListingWizard, PreviewRegistry};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::{
    sync::{Mutex, OwnedMutexGuard},
    task::JoinHandle,
};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("wizard session not found")]
    NotFound,
    #[error("a submission is in progress for this wizard")]
    Busy,
}

struct SessionEntry {
    account_id: String,
    wizard: Arc<Mutex<ListingWizard>>,
    last_touched: Instant,
}

/// Open wizard sessions, one draft each, keyed by session id and owned by
/// the account that opened them.
#[derive(Clone)]
pub struct SessionStore {
    gateway: Arc<dyn ListingGateway>,
    previews: PreviewRegistry,
    sessions: Arc<Mutex<HashMap<Uuid, SessionEntry>>>,
}

impl SessionStore {
    pub fn new(gateway: Arc<dyn ListingGateway>, previews: PreviewRegistry) -> Self {
        Self {
            gateway,
            previews,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub async fn open(&self, account_id: &str) -> (Uuid, OwnedMutexGuard<ListingWizard>) {
        let id = Uuid::new_v4();
        let wizard = Arc::new(Mutex::new(ListingWizard::new(
            self.gateway.clone(),
            self.previews.clone(),
        )));
        // Fresh mutex, nobody else can hold it yet.
        let guard = wizard.clone().lock_owned().await;
        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            id,
            SessionEntry {
                account_id: account_id.to_string(),
                wizard,
                last_touched: Instant::now(),
            },
        );
        info!(target = "listing.api", session = %id, account = account_id, open_sessions = sessions.len(), "wizard opened");
        (id, guard)
    }

    /// Locks a session for one request. A session that is mid-submission
    /// holds its lock for the whole upload and create sequence, so callers
    /// get `Busy` instead of waiting.
    pub async fn lock(
        &self,
        id: Uuid,
        account_id: &str,
    ) -> Result<OwnedMutexGuard<ListingWizard>, SessionError> {
        let wizard = {
            let mut sessions = self.sessions.lock().await;
            let entry = sessions.get_mut(&id).ok_or(SessionError::NotFound)?;
            if entry.account_id != account_id {
                return Err(SessionError::NotFound);
            }
            entry.last_touched = Instant::now();
            entry.wizard.clone()
        };
        wizard.try_lock_owned().map_err(|_| SessionError::Busy)
    }

    pub async fn remove(&self, id: Uuid, account_id: &str) -> Result<(), SessionError> {
        let mut guard = self.lock(id, account_id).await?;
        guard.close().map_err(|_| SessionError::Busy)?;
        drop(guard);
        self.sessions.lock().await.remove(&id);
        info!(target = "listing.api", session = %id, "wizard removed");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Closes and drops sessions untouched for at least `max_idle`.
    /// Sessions locked by an in-flight request are left for the next sweep.
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let idle: Vec<Uuid> = sessions
            .iter()
            .filter(|(_, entry)| entry.last_touched.elapsed() >= max_idle)
            .map(|(id, _)| *id)
            .collect();

        let mut removed = 0;
        for id in idle {
            let Some(entry) = sessions.get(&id) else {
                continue;
            };
            let Ok(mut wizard) = entry.wizard.clone().try_lock_owned() else {
                continue;
            };
            if wizard.close().is_err() {
                continue;
            }
            drop(wizard);
            sessions.remove(&id);
            removed += 1;
        }
        if removed > 0 {
            info!(target = "listing.api", removed, open_sessions = sessions.len(), "idle wizards swept");
        }
        removed
    }

    /// Sweeps idle sessions every `every` until the process exits.
    pub fn spawn_sweeper(&self, every: Duration, max_idle: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                store.sweep_idle(max_idle).await;
            }
        })
    }
}
