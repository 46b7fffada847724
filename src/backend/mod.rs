//! Backend client
//!
//! Handles to the hosted database and auth service. A [`Backend`] is built
//! once at startup and handed to every service; nothing here is a global.

pub mod auth;
pub mod gotrue;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod tables;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use auth::{AuthEvent, AuthProvider, AuthSession, AuthUser, MemoryAuth};
pub use gotrue::GoTrueAuth;
pub use memory::{Call, MemoryDatabase, Operation};
pub use postgres::PgDatabase;
pub use query::{Direction, Embed, Filter, Insert, Order, Select, Update};

/// Result type for backend calls
pub type BackendResult<T> = Result<T, BackendError>;

/// Failures reported by the remote database or auth service
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Auth service error ({status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Unexpected {entity} shape: {source}")]
    Decode {
        entity: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("No rows returned from {0}")]
    NotFound(&'static str),

    #[error("Multiple rows returned from {0}")]
    MultipleRows(&'static str),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rejected by backend: {0}")]
    Rejected(String),
}

impl BackendError {
    /// True when the backend answered but found nothing to return
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Table access surface of the hosted database
#[async_trait]
pub trait Database: Send + Sync {
    /// Rows matching the select, embeds attached
    async fn select(&self, query: &Select) -> BackendResult<Vec<Value>>;

    /// Insert one row and return it as stored
    async fn insert(&self, insert: &Insert) -> BackendResult<Value>;

    /// Update matching rows and return them as stored
    async fn update(&self, update: &Update) -> BackendResult<Vec<Value>>;

    /// Exactly one row, otherwise `NotFound` or `MultipleRows`
    async fn fetch_one(&self, query: &Select) -> BackendResult<Value> {
        let mut rows = self.select(query).await?;
        match rows.len() {
            0 => Err(BackendError::NotFound(query.table)),
            1 => Ok(rows.remove(0)),
            _ => Err(BackendError::MultipleRows(query.table)),
        }
    }

    /// Zero or one row
    async fn fetch_optional(&self, query: &Select) -> BackendResult<Option<Value>> {
        let mut rows = self.select(query).await?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(Some(rows.remove(0))),
            _ => Err(BackendError::MultipleRows(query.table)),
        }
    }

    /// Update that must touch exactly one row
    async fn update_one(&self, update: &Update) -> BackendResult<Value> {
        let mut rows = self.update(update).await?;
        match rows.len() {
            0 => Err(BackendError::NotFound(update.table)),
            1 => Ok(rows.remove(0)),
            _ => Err(BackendError::MultipleRows(update.table)),
        }
    }
}

/// Decode one row into a typed record
pub fn decode<T: DeserializeOwned>(entity: &'static str, row: Value) -> BackendResult<T> {
    serde_json::from_value(row).map_err(|source| BackendError::Decode { entity, source })
}

/// Decode every row into typed records, failing on the first bad row
pub fn decode_all<T: DeserializeOwned>(entity: &'static str, rows: Vec<Value>) -> BackendResult<Vec<T>> {
    rows.into_iter().map(|row| decode(entity, row)).collect()
}

/// Database and auth handles shared by all services
#[derive(Clone)]
pub struct Backend {
    client: Arc<dyn Database>,
    admin: Arc<dyn Database>,
    auth: Arc<dyn AuthProvider>,
}

impl Backend {
    pub fn new(
        client: Arc<dyn Database>,
        admin: Arc<dyn Database>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self { client, admin, auth }
    }

    /// Postgres pools for the unprivileged and privileged roles
    pub fn postgres(
        client: sqlx::PgPool,
        admin: sqlx::PgPool,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self::new(
            Arc::new(PgDatabase::new(client)),
            Arc::new(PgDatabase::new(admin)),
            auth,
        )
    }

    /// In-memory store serving both roles
    pub fn memory(database: Arc<MemoryDatabase>, auth: Arc<MemoryAuth>) -> Self {
        Self::new(database.clone(), database, auth)
    }

    /// Handle scoped to unprivileged access
    pub fn client(&self) -> Arc<dyn Database> {
        self.client.clone()
    }

    /// Handle scoped to privileged access
    pub fn admin(&self) -> Arc<dyn Database> {
        self.admin.clone()
    }

    pub fn auth(&self) -> Arc<dyn AuthProvider> {
        self.auth.clone()
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fetch_one_requires_single_row() {
        let db = MemoryDatabase::new();
        db.seed(
            tables::BANKS,
            vec![
                json!({"id": "b1", "nome": "Banco A", "status": "ativo"}),
                json!({"id": "b2", "nome": "Banco B", "status": "ativo"}),
            ],
        );

        let all = Select::from(tables::BANKS).eq("status", "ativo");
        assert!(matches!(
            db.fetch_one(&all).await,
            Err(BackendError::MultipleRows("bancos"))
        ));

        let none = Select::from(tables::BANKS).eq("id", "b9");
        assert!(db.fetch_one(&none).await.unwrap_err().is_not_found());
        assert!(db.fetch_optional(&none).await.unwrap().is_none());

        let one = Select::from(tables::BANKS).eq("id", "b2");
        assert_eq!(db.fetch_one(&one).await.unwrap()["nome"], "Banco B");
    }

    #[tokio::test]
    async fn test_update_one_reports_missing_row() {
        let db = MemoryDatabase::new();
        let update = Update::table(tables::BANKS).set("status", "inativo").eq("id", "b1");

        assert!(db.update_one(&update).await.unwrap_err().is_not_found());
    }

    #[test]
    fn test_decode_reports_entity() {
        let err = decode::<crate::domain::Company>("empresa", json!({"nome": "No id"})).unwrap_err();
        assert!(err.to_string().contains("empresa"));
    }
}
