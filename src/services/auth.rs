//! Authentication service
//!
//! Wraps the auth provider, loads the `usuarios` profile that goes with an auth
//! user and broadcasts sign-in/sign-out notifications to session actors.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::logged;
use crate::backend::{
    decode, tables, AuthEvent, AuthProvider, AuthSession, AuthUser, BackendError, Database,
    Select, Update,
};
use crate::config::Config;
use crate::domain::{DomainError, User, UserChanges};
use crate::error::{AppError, AppResult};

const ENTITY: &str = "usuario";
const EVENT_CAPACITY: usize = 64;

/// OAuth provider used by `login_with_google`
const GOOGLE: &str = "google";

/// Where the auth service sends the browser back to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRedirects {
    pub oauth: String,
    pub password_reset: String,
}

impl AuthRedirects {
    pub fn from_config(config: &Config) -> Self {
        Self {
            oauth: config.oauth_redirect_url(),
            password_reset: config.password_reset_redirect_url(),
        }
    }
}

/// Rejected or expired tokens become `Unauthenticated`
fn token_error(err: BackendError) -> AppError {
    match err {
        BackendError::Auth { status: 401 | 403, .. } => AppError::Unauthenticated,
        other => other.into(),
    }
}

#[derive(Clone)]
pub struct AuthService {
    auth: Arc<dyn AuthProvider>,
    db: Arc<dyn Database>,
    redirects: AuthRedirects,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthService {
    pub fn new(auth: Arc<dyn AuthProvider>, db: Arc<dyn Database>, redirects: AuthRedirects) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            auth,
            db,
            redirects,
            events,
        }
    }

    /// Receive every sign-in and sign-out from now on
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: AuthEvent) {
        // No receiver just means no live session
        if self.events.send(event).is_err() {
            tracing::debug!(user_id = %event.user_id(), "No session listening for auth event");
        }
    }

    /// Validate a bearer token
    pub async fn authenticate(&self, access_token: &str) -> AppResult<AuthUser> {
        self.auth.get_user(access_token).await.map_err(token_error)
    }

    /// Profile of `auth_user`, or a user built from its metadata when the
    /// profile row cannot be read
    pub async fn load_profile(&self, auth_user: &AuthUser) -> User {
        match self.fetch_profile(auth_user.id).await {
            Ok(mut user) => {
                user.email = auth_user.email.clone().unwrap_or_default();
                user
            }
            Err(e) => {
                tracing::warn!(user_id = %auth_user.id, error = %e, "Profile unavailable, using auth metadata");
                User::from_auth(auth_user)
            }
        }
    }

    /// Stored profile of a signed-in `user`; `user` itself when the row
    /// cannot be read
    pub async fn refresh_profile(&self, user: &User) -> User {
        match self.fetch_profile(user.id).await {
            Ok(mut fresh) => {
                fresh.email = user.email.clone();
                fresh
            }
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Profile unavailable, keeping cached user");
                user.clone()
            }
        }
    }

    async fn fetch_profile(&self, user_id: Uuid) -> AppResult<User> {
        let row = self
            .db
            .fetch_one(&Select::from(tables::USERS).eq("id", user_id))
            .await?;
        Ok(decode::<User>(ENTITY, row)?)
    }

    pub async fn current_user(&self, access_token: &str) -> AppResult<User> {
        logged("auth.current_user", async {
            let auth_user = self.authenticate(access_token).await?;
            Ok::<_, AppError>(self.load_profile(&auth_user).await)
        })
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthSession> {
        logged("auth.login", async {
            let session = self.auth.sign_in_with_password(email, password).await?;
            tracing::info!(user_id = %session.user.id, "User signed in");
            self.emit(AuthEvent::SignedIn {
                user_id: session.user.id,
            });
            Ok::<_, AppError>(session)
        })
        .await
    }

    /// Google authorize URL; `redirect_to` defaults to the dashboard
    pub fn login_with_google(&self, redirect_to: Option<&str>) -> AppResult<String> {
        let redirect = redirect_to.unwrap_or(&self.redirects.oauth);
        self.auth.authorize_url(GOOGLE, redirect).map_err(|e| {
            tracing::error!(operation = "auth.login_with_google", error = %e, "Service operation failed");
            e.into()
        })
    }

    pub async fn logout(&self, access_token: &str, user_id: Uuid) -> AppResult<()> {
        logged("auth.logout", async {
            self.auth.sign_out(access_token).await.map_err(token_error)?;
            tracing::info!(%user_id, "User signed out");
            self.emit(AuthEvent::SignedOut { user_id });
            Ok::<_, AppError>(())
        })
        .await
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> AppResult<AuthUser> {
        logged("auth.register", async {
            let metadata = json!({
                "nome": first_name,
                "sobrenome": last_name,
                "nome_exibicao": format!("{} {}", first_name, last_name),
            });
            let user = self.auth.sign_up(email, password, metadata).await?;
            tracing::info!(user_id = %user.id, "User registered");
            Ok::<_, AppError>(user)
        })
        .await
    }

    pub async fn update_user(&self, user_id: Uuid, changes: UserChanges) -> AppResult<User> {
        logged("auth.update_user", async {
            if changes.is_empty() {
                return Err(AppError::from(DomainError::validation(
                    "no profile fields to update",
                )));
            }

            let update = Update::table(tables::USERS)
                .set_opt("nome", changes.first_name)
                .set_opt("sobrenome", changes.last_name)
                .set_opt("nome_exibicao", changes.display_name)
                .set_opt("url_avatar", changes.avatar_url)
                .set_opt("empresa_padrao_id", changes.default_company_id)
                .eq("id", user_id);

            Ok::<_, AppError>(decode::<User>(ENTITY, self.db.update_one(&update).await?)?)
        })
        .await
    }

    /// Persist the company selected for the next session
    pub async fn set_default_company(&self, user_id: Uuid, company_id: Uuid) -> AppResult<()> {
        self.db
            .update_one(
                &Update::table(tables::USERS)
                    .set("empresa_padrao_id", company_id)
                    .eq("id", user_id),
            )
            .await?;
        Ok(())
    }

    pub async fn recover_password(&self, email: &str) -> AppResult<()> {
        logged("auth.recover_password", async {
            self.auth
                .recover_password(email, &self.redirects.password_reset)
                .await?;
            Ok::<_, AppError>(())
        })
        .await
    }

    pub async fn reset_password(&self, access_token: &str, new_password: &str) -> AppResult<AuthUser> {
        logged("auth.reset_password", async {
            let user = self
                .auth
                .update_password(access_token, new_password)
                .await
                .map_err(token_error)?;
            tracing::info!(user_id = %user.id, "Password updated");
            Ok::<_, AppError>(user)
        })
        .await
    }
}
