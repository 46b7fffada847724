//! Domain services
//!
//! Each operation turns into filtered selects and mutations on the remote
//! tables, decodes the rows and returns `AppResult`. Failures are logged once
//! here, at the service boundary.

pub mod access;
pub mod auth;
pub mod bank_account;
pub mod company;
pub mod credit_card;
pub mod group;
pub mod report;
pub mod transaction;

use std::future::Future;

use crate::backend::Backend;
use crate::domain::DomainError;
use crate::error::AppResult;

pub use access::AccessResolver;
pub use auth::{AuthRedirects, AuthService};
pub use bank_account::BankAccountService;
pub use company::CompanyService;
pub use credit_card::CreditCardService;
pub use group::GroupService;
pub use report::ReportService;
pub use transaction::TransactionService;

/// Await `operation`, logging its error under `name`
pub(crate) async fn logged<T, F>(name: &'static str, operation: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    let result = operation.await;
    if let Err(e) = &result {
        tracing::error!(operation = name, error = %e, "Service operation failed");
    }
    result
}

/// Reject a patch that sets no column of `entity`
pub(crate) fn require_changes(empty: bool, entity: &str) -> AppResult<()> {
    if empty {
        return Err(DomainError::validation(format!("no {} fields to update", entity)).into());
    }
    Ok(())
}

/// Every service, built over one backend
#[derive(Clone)]
pub struct Services {
    pub auth: AuthService,
    pub companies: CompanyService,
    pub groups: GroupService,
    pub bank_accounts: BankAccountService,
    pub credit_cards: CreditCardService,
    pub transactions: TransactionService,
    pub reports: ReportService,
}

impl Services {
    pub fn new(backend: &Backend, redirects: AuthRedirects) -> Self {
        let db = backend.client();
        Self {
            auth: AuthService::new(backend.auth(), db.clone(), redirects),
            companies: CompanyService::new(db.clone()),
            groups: GroupService::new(db.clone()),
            bank_accounts: BankAccountService::new(db.clone()),
            credit_cards: CreditCardService::new(db.clone()),
            transactions: TransactionService::new(db.clone()),
            reports: ReportService::new(db),
        }
    }
}
