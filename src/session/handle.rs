use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::{SessionCommand, SessionSnapshot};
use crate::domain::{Company, DomainError, User};
use crate::error::{AppError, AppResult};

/// Cloneable sender side of a session actor
#[derive(Debug, Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionCommand>,
}

/// The actor is gone, which only happens after sign-out
fn closed() -> AppError {
    DomainError::NotSignedIn.into()
}

impl SessionHandle {
    pub(super) fn new(sender: mpsc::Sender<SessionCommand>) -> Self {
        Self { sender }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> AppResult<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(command(reply))
            .await
            .map_err(|_| closed())?;
        response.await.map_err(|_| closed())
    }

    /// Queue a load without waiting for mailbox space
    pub(super) fn start_load(&self, user: User) -> AppResult<oneshot::Receiver<SessionSnapshot>> {
        let (reply, response) = oneshot::channel();
        self.sender
            .try_send(SessionCommand::Load { user, reply })
            .map_err(|_| closed())?;
        Ok(response)
    }

    pub async fn set_active(&self, company_id: Uuid) -> AppResult<Company> {
        self.request(|reply| SessionCommand::SetActive { company_id, reply })
            .await?
    }

    /// Resolve the reachable companies again
    pub async fn reload(&self) -> AppResult<Vec<Company>> {
        self.request(|reply| SessionCommand::Reload { reply }).await?
    }

    /// Replace the session's copy of the profile after it was edited
    pub async fn update_user(&self, user: User) -> AppResult<()> {
        self.request(|reply| SessionCommand::UpdateUser { user, reply })
            .await
    }

    pub async fn snapshot(&self) -> AppResult<SessionSnapshot> {
        self.request(|reply| SessionCommand::Snapshot { reply }).await
    }

    /// Clear the session and stop the actor
    pub async fn sign_out(&self) -> AppResult<()> {
        self.request(|reply| SessionCommand::SignOut { reply }).await
    }
}
