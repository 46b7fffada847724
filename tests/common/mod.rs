//! Common test utilities

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use beeconta::api::{self, AppState};
use beeconta::backend::{tables, Backend, MemoryAuth, MemoryDatabase};
use beeconta::services::AuthRedirects;

/// Router over the in-memory backend, plus handles to seed it
pub struct TestApp {
    pub router: Router,
    pub db: Arc<MemoryDatabase>,
    pub auth: Arc<MemoryAuth>,
}

/// Setup a fresh application with empty tables
pub fn setup() -> TestApp {
    let db = Arc::new(MemoryDatabase::new());
    let auth = Arc::new(MemoryAuth::new());
    let backend = Backend::memory(db.clone(), auth.clone());
    let state = AppState::new(
        backend,
        AuthRedirects {
            oauth: "http://localhost:3000/dashboard".to_string(),
            password_reset: "http://localhost:3000/auth/redefinir-senha".to_string(),
        },
    );

    TestApp {
        router: api::build_router(state),
        db,
        auth,
    }
}

impl TestApp {
    /// Auth user with a profile row, returning its id and an access token
    pub fn sign_in(&self, email: &str) -> (Uuid, String) {
        let id = Uuid::new_v4();
        self.auth.add_user(id, email, "secret");
        self.db.seed(
            tables::USERS,
            vec![json!({"id": id, "nome": "Teste", "sobrenome": "Usuario", "empresa_padrao_id": null})],
        );
        let token = self.auth.issue_token(email).expect("user just added");
        (id, token)
    }

    /// Send one request and decode the JSON body (`Null` when empty)
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    /// Active company with a grant for `user_id`
    pub fn seed_company(&self, user_id: Uuid, name: &str, level: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.db.seed(
            tables::COMPANIES,
            vec![json!({"id": id, "nome": name, "cnpj_cpf": "00000000000100", "tipo_documento": "CNPJ", "status": "ativo"})],
        );
        self.db.seed(
            tables::COMPANY_ACCESS,
            vec![json!({"usuario_id": user_id, "empresa_id": id, "nivel_acesso": level, "status": "ativo"})],
        );
        id
    }
}
