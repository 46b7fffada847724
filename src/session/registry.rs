use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use super::{actor, SessionHandle};
use crate::domain::{DomainError, User};
use crate::error::{AppError, AppResult};
use crate::services::{AuthService, CompanyService};

/// Live sessions by user id
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<Uuid, SessionHandle>>>,
    companies: CompanyService,
    auth: AuthService,
}

impl SessionRegistry {
    pub fn new(companies: CompanyService, auth: AuthService) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            companies,
            auth,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, SessionHandle>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Running session of `user_id`, if any
    pub fn get(&self, user_id: Uuid) -> Option<SessionHandle> {
        self.lock()
            .get(&user_id)
            .filter(|handle| !handle.is_closed())
            .cloned()
    }

    /// Session of `user`, started and loaded when none is running
    pub async fn session(&self, user: &User) -> AppResult<SessionHandle> {
        let (handle, loading) = {
            let mut sessions = self.lock();
            match sessions.get(&user.id).filter(|handle| !handle.is_closed()) {
                Some(handle) => (handle.clone(), None),
                None => {
                    let handle = actor::spawn(user.id, self.companies.clone(), self.auth.clone());
                    // Queued before the handle is shared so it runs first
                    let loading = handle.start_load(user.clone())?;
                    sessions.insert(user.id, handle.clone());
                    (handle, Some(loading))
                }
            }
        };

        if let Some(loading) = loading {
            let snapshot = loading
                .await
                .map_err(|_| AppError::from(DomainError::NotSignedIn))?;
            tracing::info!(
                user_id = %user.id,
                companies = snapshot.companies.len(),
                "Session loaded"
            );
        }

        Ok(handle)
    }

    /// Stop and forget the session of `user_id`
    pub async fn sign_out(&self, user_id: Uuid) {
        let handle = self.lock().remove(&user_id);
        if let Some(handle) = handle {
            if let Err(e) = handle.sign_out().await {
                tracing::debug!(%user_id, error = %e, "Session already stopped");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().values().filter(|handle| !handle.is_closed()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
