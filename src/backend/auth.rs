//! Auth provider
//!
//! Sign-in, sign-up and token validation against the hosted auth service.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{BackendError, BackendResult};

/// User record as the auth service knows it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
}

impl AuthUser {
    /// String field from the signup metadata
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata.get(key).and_then(Value::as_str)
    }
}

/// Tokens issued on sign-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: AuthUser,
}

/// Auth-state change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { user_id: Uuid },
    SignedOut { user_id: Uuid },
}

impl AuthEvent {
    pub fn user_id(&self) -> Uuid {
        match self {
            Self::SignedIn { user_id } | Self::SignedOut { user_id } => *user_id,
        }
    }
}

/// Operations of the hosted auth service
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<AuthSession>;

    /// Create an account; `metadata` is stored with the auth user
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> BackendResult<AuthUser>;

    async fn sign_out(&self, access_token: &str) -> BackendResult<()>;

    /// Resolve an access token to its user
    async fn get_user(&self, access_token: &str) -> BackendResult<AuthUser>;

    async fn recover_password(&self, email: &str, redirect_to: &str) -> BackendResult<()>;

    async fn update_password(&self, access_token: &str, password: &str) -> BackendResult<AuthUser>;

    /// Where to send the browser for an OAuth login
    fn authorize_url(&self, provider: &str, redirect_to: &str) -> BackendResult<String>;
}

#[derive(Debug, Clone)]
struct StoredUser {
    user: AuthUser,
    password: String,
}

#[derive(Debug, Default)]
struct AuthState {
    users: HashMap<String, StoredUser>,
    tokens: HashMap<String, String>,
    recoveries: Vec<(String, String)>,
}

/// Process-local auth service
#[derive(Debug, Default)]
pub struct MemoryAuth {
    state: Mutex<AuthState>,
}

fn unauthorized(message: &str) -> BackendError {
    BackendError::Auth {
        status: 401,
        message: message.to_string(),
    }
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a user with a fixed id
    pub fn add_user(&self, id: Uuid, email: &str, password: &str) -> AuthUser {
        let user = AuthUser {
            id,
            email: Some(email.to_string()),
            user_metadata: Value::Object(Default::default()),
        };
        self.lock().users.insert(
            email.to_lowercase(),
            StoredUser {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        user
    }

    /// Issue an access token without a password check
    pub fn issue_token(&self, email: &str) -> Option<String> {
        let mut state = self.lock();
        let email = email.to_lowercase();
        state.users.get(&email)?;
        let token = Uuid::new_v4().to_string();
        state.tokens.insert(token.clone(), email);
        Some(token)
    }

    /// Recovery requests as (email, redirect) pairs
    pub fn recoveries(&self) -> Vec<(String, String)> {
        self.lock().recoveries.clone()
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<AuthSession> {
        let mut state = self.lock();
        let email = email.to_lowercase();
        let user = match state.users.get(&email) {
            Some(stored) if stored.password == password => stored.user.clone(),
            _ => {
                return Err(BackendError::Auth {
                    status: 400,
                    message: "Invalid login credentials".to_string(),
                })
            }
        };

        let access_token = Uuid::new_v4().to_string();
        state.tokens.insert(access_token.clone(), email);

        Ok(AuthSession {
            access_token,
            refresh_token: Some(Uuid::new_v4().to_string()),
            expires_in: Some(3600),
            token_type: Some("bearer".to_string()),
            user,
        })
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> BackendResult<AuthUser> {
        let mut state = self.lock();
        let key = email.to_lowercase();
        if state.users.contains_key(&key) {
            return Err(BackendError::Auth {
                status: 422,
                message: "User already registered".to_string(),
            });
        }

        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            user_metadata: metadata,
        };
        state.users.insert(
            key,
            StoredUser {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        Ok(user)
    }

    async fn sign_out(&self, access_token: &str) -> BackendResult<()> {
        self.lock()
            .tokens
            .remove(access_token)
            .map(|_| ())
            .ok_or_else(|| unauthorized("Invalid token"))
    }

    async fn get_user(&self, access_token: &str) -> BackendResult<AuthUser> {
        let state = self.lock();
        state
            .tokens
            .get(access_token)
            .and_then(|email| state.users.get(email))
            .map(|stored| stored.user.clone())
            .ok_or_else(|| unauthorized("Invalid token"))
    }

    async fn recover_password(&self, email: &str, redirect_to: &str) -> BackendResult<()> {
        self.lock()
            .recoveries
            .push((email.to_string(), redirect_to.to_string()));
        Ok(())
    }

    async fn update_password(&self, access_token: &str, password: &str) -> BackendResult<AuthUser> {
        let mut state = self.lock();
        let email = state
            .tokens
            .get(access_token)
            .cloned()
            .ok_or_else(|| unauthorized("Invalid token"))?;
        let stored = state
            .users
            .get_mut(&email)
            .ok_or_else(|| unauthorized("User not found"))?;
        stored.password = password.to_string();
        Ok(stored.user.clone())
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str) -> BackendResult<String> {
        Ok(format!(
            "memory://authorize?provider={}&redirect_to={}",
            provider, redirect_to
        ))
    }
}
