//! Company service

use std::sync::Arc;

use uuid::Uuid;

use super::access::AccessResolver;
use super::{logged, require_changes};
use crate::backend::{decode, tables, Database, Insert, Select, Update};
use crate::domain::{AccessLevel, Company, CompanyChanges, NewCompany, Status};
use crate::error::{AppError, AppResult};

const ENTITY: &str = "empresa";

#[derive(Clone)]
pub struct CompanyService {
    db: Arc<dyn Database>,
    access: AccessResolver,
}

impl CompanyService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            access: AccessResolver::new(db.clone()),
            db,
        }
    }

    /// Active company by id
    pub async fn get_by_id(&self, company_id: Uuid) -> AppResult<Company> {
        logged("company.get_by_id", async {
            let row = self
                .db
                .fetch_one(
                    &Select::from(tables::COMPANIES)
                        .eq("id", company_id)
                        .eq("status", Status::Active),
                )
                .await?;
            Ok::<_, AppError>(decode::<Company>(ENTITY, row)?)
        })
        .await
    }

    /// Companies the user reaches directly or through groups
    pub async fn list_user_companies(&self, user_id: Uuid) -> AppResult<Vec<Company>> {
        logged(
            "company.list_user_companies",
            self.access.reachable_companies(user_id),
        )
        .await
    }

    /// Insert an active company and make the creator its ADMIN
    pub async fn create(&self, company: NewCompany, user_id: Uuid) -> AppResult<Company> {
        logged("company.create", async {
            let insert = Insert::new(tables::COMPANIES)
                .set("nome", &company.name)
                .set_opt("nome_fantasia", company.trade_name.as_ref())
                .set_opt("cnpj_cpf", company.document.as_ref())
                .set("tipo_documento", company.document_type)
                .set_opt("regime_tributario", company.tax_regime)
                .set_opt("url_logo", company.logo_url.as_ref())
                .set_opt("endereco", company.address.as_ref())
                .set_opt("contato", company.contact.as_ref())
                .set("status", Status::Active);

            let created: Company = decode(ENTITY, self.db.insert(&insert).await?)?;

            self.db
                .insert(
                    &Insert::new(tables::COMPANY_ACCESS)
                        .set("usuario_id", user_id)
                        .set("empresa_id", created.id)
                        .set("nivel_acesso", AccessLevel::Admin)
                        .set("status", Status::Active),
                )
                .await?;

            tracing::info!(company_id = %created.id, %user_id, "Company created");
            Ok::<_, AppError>(created)
        })
        .await
    }

    /// Apply `changes`; requires ADMIN access
    pub async fn update(
        &self,
        company_id: Uuid,
        changes: CompanyChanges,
        user_id: Uuid,
    ) -> AppResult<Company> {
        logged("company.update", async {
            require_changes(changes.is_empty(), ENTITY)?;

            self.access
                .require_admin(tables::COMPANY_ACCESS, "empresa_id", user_id, company_id)
                .await?;

            let update = Update::table(tables::COMPANIES)
                .set_opt("nome", changes.name)
                .set_opt("nome_fantasia", changes.trade_name)
                .set_opt("cnpj_cpf", changes.document)
                .set_opt("tipo_documento", changes.document_type)
                .set_opt("regime_tributario", changes.tax_regime)
                .set_opt("url_logo", changes.logo_url)
                .set_opt("endereco", changes.address)
                .set_opt("contato", changes.contact)
                .set_opt("status", changes.status)
                .eq("id", company_id);

            Ok::<_, AppError>(decode::<Company>(ENTITY, self.db.update_one(&update).await?)?)
        })
        .await
    }

    /// Mark the company inactive; requires ADMIN access
    pub async fn delete(&self, company_id: Uuid, user_id: Uuid) -> AppResult<()> {
        logged("company.delete", async {
            self.access
                .require_admin(tables::COMPANY_ACCESS, "empresa_id", user_id, company_id)
                .await?;

            self.db
                .update(
                    &Update::table(tables::COMPANIES)
                        .set("status", Status::Inactive)
                        .eq("id", company_id),
                )
                .await?;

            tracing::info!(%company_id, %user_id, "Company deactivated");
            Ok::<_, AppError>(())
        })
        .await
    }
}
