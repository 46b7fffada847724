//! Per-user session state
//!
//! Each signed-in user gets one actor task owning the session: the user, the
//! companies they can reach and the company they are working on. Requests and
//! auth notifications are serialized through the actor's mailbox.

mod actor;
mod handle;
mod registry;

use serde::Serialize;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::domain::{Company, User};
use crate::error::AppResult;

pub use handle::SessionHandle;
pub use registry::SessionRegistry;

/// Company the user is working on
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ActiveCompany {
    #[default]
    None,
    Resolved(Company),
}

impl ActiveCompany {
    pub fn company(&self) -> Option<&Company> {
        match self {
            Self::None => None,
            Self::Resolved(company) => Some(company),
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        self.company().map(|c| c.id)
    }
}

/// Point-in-time copy of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    #[serde(rename = "usuario")]
    pub user: Option<User>,
    #[serde(rename = "empresas")]
    pub companies: Vec<Company>,
    #[serde(rename = "empresa_ativa")]
    pub active_company: Option<Company>,
    /// Last failure while resolving companies
    #[serde(rename = "erro", skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

pub(crate) enum SessionCommand {
    Load {
        user: User,
        reply: oneshot::Sender<SessionSnapshot>,
    },
    SetActive {
        company_id: Uuid,
        reply: oneshot::Sender<AppResult<Company>>,
    },
    Reload {
        reply: oneshot::Sender<AppResult<Vec<Company>>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    UpdateUser {
        user: User,
        reply: oneshot::Sender<()>,
    },
    SignOut {
        reply: oneshot::Sender<()>,
    },
}
