//! Application user
//!
//! Profile row in `usuarios` joined with the e-mail known to the auth service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::AuthUser;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,

    /// Filled from the auth service; not a column of `usuarios`
    #[serde(default)]
    pub email: String,

    #[serde(rename = "nome", default)]
    pub first_name: String,

    #[serde(rename = "sobrenome", default)]
    pub last_name: String,

    #[serde(rename = "nome_exibicao", default)]
    pub display_name: Option<String>,

    #[serde(rename = "url_avatar", default)]
    pub avatar_url: Option<String>,

    /// Company selected on the last session
    #[serde(rename = "empresa_padrao_id", default)]
    pub default_company_id: Option<Uuid>,

    #[serde(rename = "admin_sistema", default)]
    pub system_admin: bool,
}

impl User {
    /// Minimal user built from the auth record when the profile row is unreadable
    pub fn from_auth(auth: &AuthUser) -> Self {
        let email = auth.email.clone().unwrap_or_default();
        let display_name = auth
            .metadata_str("nome_exibicao")
            .map(str::to_string)
            .or_else(|| Some(email.clone()).filter(|e| !e.is_empty()));

        Self {
            id: auth.id,
            first_name: auth.metadata_str("nome").unwrap_or_default().to_string(),
            last_name: auth.metadata_str("sobrenome").unwrap_or_default().to_string(),
            display_name,
            avatar_url: None,
            default_company_id: None,
            system_admin: false,
            email,
        }
    }
}

/// Editable profile fields; `None` leaves the column untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserChanges {
    #[serde(rename = "nome", default)]
    pub first_name: Option<String>,

    #[serde(rename = "sobrenome", default)]
    pub last_name: Option<String>,

    #[serde(rename = "nome_exibicao", default)]
    pub display_name: Option<String>,

    #[serde(rename = "url_avatar", default)]
    pub avatar_url: Option<String>,

    #[serde(rename = "empresa_padrao_id", default)]
    pub default_company_id: Option<Uuid>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
