//! GoTrue-compatible auth client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde_json::{json, Value};

use super::auth::{AuthProvider, AuthSession, AuthUser};
use super::{BackendError, BackendResult};

/// Auth service reached over HTTP at `{base}/auth/v1/`
#[derive(Debug, Clone)]
pub struct GoTrueAuth {
    http: Client,
    endpoint: Url,
    anon_key: String,
}

impl GoTrueAuth {
    pub fn new(base_url: &str, anon_key: impl Into<String>) -> BackendResult<Self> {
        let endpoint = Url::parse(&format!("{}/auth/v1/", base_url.trim_end_matches('/')))
            .map_err(|e| BackendError::InvalidRequest(format!("auth url: {}", e)))?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            endpoint,
            anon_key: anon_key.into(),
        })
    }

    fn url(&self, path: &str) -> BackendResult<Url> {
        self.endpoint
            .join(path)
            .map_err(|e| BackendError::InvalidRequest(format!("auth path {}: {}", path, e)))
    }

    fn request(&self, builder: RequestBuilder, access_token: Option<&str>) -> RequestBuilder {
        let builder = builder.header("apikey", self.anon_key.as_str());
        match access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder.bearer_auth(&self.anon_key),
        }
    }

    async fn send(&self, builder: RequestBuilder) -> BackendResult<Value> {
        let response = builder.send().await?;
        read_body(response).await
    }
}

/// JSON body of a successful response, or the service's error message
async fn read_body(response: Response) -> BackendResult<Value> {
    let status = response.status();
    let text = response.text().await?;
    let body: Value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };

    if status.is_success() {
        return Ok(body);
    }

    Err(BackendError::Auth {
        status: status.as_u16(),
        message: error_message(&body).unwrap_or_else(|| status.to_string()),
    })
}

fn error_message(body: &Value) -> Option<String> {
    if let Value::String(text) = body {
        return Some(text.clone());
    }
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn decode_user(body: Value) -> BackendResult<AuthUser> {
    // signup answers with the user at the top level, or nested when a session is issued
    let user = body
        .get("user")
        .filter(|user| user.is_object())
        .cloned()
        .unwrap_or(body);
    serde_json::from_value(user).map_err(|source| BackendError::Decode {
        entity: "auth user",
        source,
    })
}

#[async_trait]
impl AuthProvider for GoTrueAuth {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<AuthSession> {
        let mut url = self.url("token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let body = self
            .send(
                self.request(self.http.post(url), None)
                    .json(&json!({ "email": email, "password": password })),
            )
            .await?;

        serde_json::from_value(body).map_err(|source| BackendError::Decode {
            entity: "auth session",
            source,
        })
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> BackendResult<AuthUser> {
        let body = self
            .send(self.request(self.http.post(self.url("signup")?), None).json(&json!({
                "email": email,
                "password": password,
                "data": metadata,
            })))
            .await?;

        decode_user(body)
    }

    async fn sign_out(&self, access_token: &str) -> BackendResult<()> {
        self.send(self.request(self.http.post(self.url("logout")?), Some(access_token)))
            .await?;
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> BackendResult<AuthUser> {
        let body = self
            .send(self.request(self.http.get(self.url("user")?), Some(access_token)))
            .await?;
        decode_user(body)
    }

    async fn recover_password(&self, email: &str, redirect_to: &str) -> BackendResult<()> {
        let mut url = self.url("recover")?;
        url.query_pairs_mut().append_pair("redirect_to", redirect_to);

        self.send(
            self.request(self.http.post(url), None)
                .json(&json!({ "email": email })),
        )
        .await?;
        Ok(())
    }

    async fn update_password(&self, access_token: &str, password: &str) -> BackendResult<AuthUser> {
        let body = self
            .send(
                self.request(self.http.put(self.url("user")?), Some(access_token))
                    .json(&json!({ "password": password })),
            )
            .await?;
        decode_user(body)
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str) -> BackendResult<String> {
        let url = Url::parse_with_params(
            self.url("authorize")?.as_str(),
            &[("provider", provider), ("redirect_to", redirect_to)],
        )
        .map_err(|e| BackendError::InvalidRequest(format!("authorize url: {}", e)))?;
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_url_carries_provider_and_redirect() {
        let auth = GoTrueAuth::new("https://project.example.co/", "anon").unwrap();
        let url = auth
            .authorize_url("google", "http://localhost:3000/dashboard")
            .unwrap();

        assert!(url.starts_with("https://project.example.co/auth/v1/authorize?"));
        assert!(url.contains("provider=google"));
        assert!(url.contains("redirect_to=http%3A%2F%2Flocalhost%3A3000%2Fdashboard"));
    }

    #[test]
    fn test_error_message_prefers_description() {
        let body = json!({"error": "invalid_grant", "error_description": "Invalid login credentials"});
        assert_eq!(error_message(&body).as_deref(), Some("Invalid login credentials"));

        let body = json!({"code": 422, "msg": "User already registered"});
        assert_eq!(error_message(&body).as_deref(), Some("User already registered"));

        assert_eq!(error_message(&json!({})), None);
    }

    #[test]
    fn test_decode_user_accepts_nested_and_flat_shapes() {
        let id = uuid::Uuid::new_v4();
        let flat = json!({"id": id, "email": "ana@example.com"});
        let nested = json!({"access_token": "t", "user": {"id": id}});

        assert_eq!(decode_user(flat).unwrap().id, id);
        assert_eq!(decode_user(nested).unwrap().id, id);
    }
}
