use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use super::{ActiveCompany, SessionCommand, SessionHandle, SessionSnapshot};
use crate::backend::AuthEvent;
use crate::domain::{Company, DomainError, User};
use crate::error::{AppError, AppResult};
use crate::services::{AuthService, CompanyService};

const MAILBOX_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

#[derive(Debug, Default)]
struct SessionState {
    user: Option<User>,
    companies: Vec<Company>,
    active: ActiveCompany,
    last_error: Option<String>,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            user: self.user.clone(),
            companies: self.companies.clone(),
            active_company: self.active.company().cloned(),
            last_error: self.last_error.clone(),
        }
    }
}

pub(super) struct SessionActor {
    user_id: Uuid,
    state: SessionState,
    companies: CompanyService,
    auth: AuthService,
    commands: mpsc::Receiver<SessionCommand>,
    events: broadcast::Receiver<AuthEvent>,
}

/// Start an actor for `user_id` and return its handle
pub(super) fn spawn(user_id: Uuid, companies: CompanyService, auth: AuthService) -> SessionHandle {
    let (sender, commands) = mpsc::channel(MAILBOX_CAPACITY);
    let actor = SessionActor {
        user_id,
        state: SessionState::default(),
        events: auth.subscribe(),
        companies,
        auth,
        commands,
    };
    tokio::spawn(actor.run());
    SessionHandle::new(sender)
}

impl SessionActor {
    async fn run(mut self) {
        tracing::debug!(user_id = %self.user_id, "Session started");
        let mut listening = true;

        loop {
            // Auth events first, so a request queued after a sign-in sees it
            let flow = tokio::select! {
                biased;
                event = self.events.recv(), if listening => match event {
                    Ok(event) if event.user_id() == self.user_id => self.on_auth_event(event).await,
                    Ok(_) => Flow::Continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(user_id = %self.user_id, skipped, "Session missed auth events");
                        Flow::Continue
                    }
                    Err(RecvError::Closed) => {
                        listening = false;
                        Flow::Continue
                    }
                },
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => Flow::Stop,
                },
            };

            if flow == Flow::Stop {
                break;
            }
        }

        tracing::debug!(user_id = %self.user_id, "Session stopped");
    }

    async fn handle(&mut self, command: SessionCommand) -> Flow {
        match command {
            SessionCommand::Load { user, reply } => {
                self.load(user).await;
                let _ = reply.send(self.state.snapshot());
            }
            SessionCommand::SetActive { company_id, reply } => {
                let result = self.set_active(company_id).await;
                let _ = reply.send(result);
            }
            SessionCommand::Reload { reply } => {
                let result = self.reload().await;
                let _ = reply.send(result);
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
            SessionCommand::UpdateUser { mut user, reply } => {
                if let Some(current) = &self.state.user {
                    if user.email.is_empty() {
                        user.email = current.email.clone();
                    }
                    self.state.user = Some(user);
                }
                let _ = reply.send(());
            }
            SessionCommand::SignOut { reply } => {
                self.state = SessionState::default();
                let _ = reply.send(());
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    async fn on_auth_event(&mut self, event: AuthEvent) -> Flow {
        match event {
            AuthEvent::SignedIn { .. } => {
                if let Some(cached) = self.state.user.clone() {
                    let user = self.auth.refresh_profile(&cached).await;
                    self.load(user).await;
                }
                Flow::Continue
            }
            AuthEvent::SignedOut { .. } => {
                self.state = SessionState::default();
                Flow::Stop
            }
        }
    }

    /// Resolve the reachable companies and select the default one, or the
    /// first reachable company when no default is stored
    async fn load(&mut self, user: User) {
        let user_id = user.id;
        let default_company = user.default_company_id;

        self.state.user = Some(user);
        self.state.active = ActiveCompany::None;
        self.state.last_error = None;

        match self.companies.list_user_companies(user_id).await {
            Ok(companies) => self.state.companies = companies,
            Err(e) => {
                self.state.companies.clear();
                self.state.last_error = Some(e.to_string());
            }
        }

        let target = default_company.or_else(|| self.state.companies.first().map(|c| c.id));
        if let Some(company_id) = target {
            if let Err(e) = self.set_active(company_id).await {
                tracing::warn!(%user_id, %company_id, error = %e, "Initial company unavailable");
            }
        }
    }

    /// Select `company_id`; on failure the session is left as it was
    async fn set_active(&mut self, company_id: Uuid) -> AppResult<Company> {
        let (user_id, stored_default) = match &self.state.user {
            Some(user) => (user.id, user.default_company_id),
            None => return Err(DomainError::NotSignedIn.into()),
        };

        let reachable = self
            .state
            .companies
            .iter()
            .find(|company| company.id == company_id)
            .cloned();

        let company = match reachable {
            Some(company) => company,
            None => self
                .companies
                .get_by_id(company_id)
                .await
                .map_err(|e| match e {
                    AppError::Backend(ref backend) if backend.is_not_found() => {
                        DomainError::CompanyUnavailable(company_id).into()
                    }
                    other => other,
                })?,
        };

        self.state.active = ActiveCompany::Resolved(company.clone());

        if stored_default != Some(company_id) {
            match self.auth.set_default_company(user_id, company_id).await {
                Ok(()) => {
                    if let Some(user) = self.state.user.as_mut() {
                        user.default_company_id = Some(company_id);
                    }
                }
                Err(e) => {
                    tracing::warn!(%user_id, %company_id, error = %e, "Could not store default company");
                }
            }
        }

        tracing::info!(%user_id, %company_id, "Active company changed");
        Ok(company)
    }

    async fn reload(&mut self) -> AppResult<Vec<Company>> {
        let user_id = match &self.state.user {
            Some(user) => user.id,
            None => return Err(DomainError::NotSignedIn.into()),
        };

        match self.companies.list_user_companies(user_id).await {
            Ok(companies) => {
                self.state.companies = companies.clone();
                self.state.last_error = None;
                Ok(companies)
            }
            Err(e) => {
                self.state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}
