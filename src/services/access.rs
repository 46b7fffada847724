//! Access resolution
//!
//! A user reaches a company either through a direct grant or through a group
//! the company belongs to. Only active grants, active associations and active
//! companies count.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::backend::{tables, Database, Embed, Filter, Select};
use crate::domain::{AccessGrant, AccessLevel, Company, DomainError, Embedded, Status};
use crate::error::AppResult;

/// Embed alias carrying the company of an access or association row
const COMPANY_ALIAS: &str = "empresas";

fn active_company_embed() -> Embed {
    Embed::new(COMPANY_ALIAS, tables::COMPANIES, "empresa_id").eq("status", Status::Active)
}

/// Company embedded in `row` under `alias`, if it decodes to one
pub(crate) fn embedded_company(row: &Value, alias: &str) -> Option<Company> {
    match Embedded::<Company>::decode(row.get(alias)) {
        Ok(Embedded::Empty) => None,
        Ok(Embedded::Single(company)) => Some(company),
        Ok(Embedded::Ambiguous(companies)) => {
            tracing::warn!(
                count = companies.len(),
                "Join returned several companies for one row, using the first"
            );
            companies.into_iter().next()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Skipping embedded company that does not decode");
            None
        }
    }
}

/// Append `candidates` to `companies`, skipping ids already in `seen`
fn merge_unique(
    companies: &mut Vec<Company>,
    seen: &mut HashSet<Uuid>,
    candidates: impl IntoIterator<Item = Company>,
) {
    for company in candidates {
        if seen.insert(company.id) {
            companies.push(company);
        }
    }
}

#[derive(Clone)]
pub struct AccessResolver {
    db: Arc<dyn Database>,
}

impl AccessResolver {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Companies reachable by `user_id`: direct grants first, in row order,
    /// then companies reached through groups. Any failed fetch fails the whole
    /// resolution.
    pub async fn reachable_companies(&self, user_id: Uuid) -> AppResult<Vec<Company>> {
        let direct_rows = self
            .db
            .select(
                &Select::from(tables::COMPANY_ACCESS)
                    .eq("usuario_id", user_id)
                    .eq("status", Status::Active)
                    .embed(active_company_embed()),
            )
            .await?;

        let mut seen = HashSet::new();
        let mut companies = Vec::new();
        merge_unique(
            &mut companies,
            &mut seen,
            direct_rows
                .iter()
                .filter_map(|row| embedded_company(row, COMPANY_ALIAS)),
        );

        let group_rows = self
            .db
            .select(
                &Select::from(tables::GROUP_ACCESS)
                    .eq("usuario_id", user_id)
                    .eq("status", Status::Active),
            )
            .await?;

        let group_ids: Vec<Value> = group_rows
            .iter()
            .filter_map(|row| row.get("grupo_id"))
            .filter(|id| !id.is_null())
            .cloned()
            .collect();

        if group_ids.is_empty() {
            return Ok(companies);
        }

        let association_rows = self
            .db
            .select(
                &Select::from(tables::GROUP_COMPANIES)
                    .filter(Filter::In("grupo_id", group_ids))
                    .eq("status", Status::Active)
                    .embed(active_company_embed()),
            )
            .await?;

        merge_unique(
            &mut companies,
            &mut seen,
            association_rows
                .iter()
                .filter_map(|row| embedded_company(row, COMPANY_ALIAS)),
        );

        tracing::debug!(%user_id, count = companies.len(), "Resolved reachable companies");
        Ok(companies)
    }

    /// Fail with `PermissionDenied` unless `user_id` holds an active ADMIN
    /// grant on the entity. `access_table` is the grant table and
    /// `entity_column` its foreign key to the entity.
    pub async fn require_admin(
        &self,
        access_table: &'static str,
        entity_column: &'static str,
        user_id: Uuid,
        entity_id: Uuid,
    ) -> AppResult<()> {
        let row = self
            .db
            .fetch_optional(
                &Select::from(access_table)
                    .eq("usuario_id", user_id)
                    .eq(entity_column, entity_id)
                    .eq("status", Status::Active),
            )
            .await?;

        let level = row
            .and_then(|row| serde_json::from_value::<AccessGrant>(row).ok())
            .map(|grant| grant.level);

        match level {
            Some(AccessLevel::Admin) => Ok(()),
            Some(AccessLevel::Editor) | Some(AccessLevel::Viewer) | None => {
                tracing::warn!(%user_id, %entity_id, table = access_table, "Admin access required");
                Err(DomainError::permission_denied().into())
            }
        }
    }
}
