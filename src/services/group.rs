//! Economic group service

use std::sync::Arc;

use uuid::Uuid;

use super::access::{embedded_company, AccessResolver};
use super::{logged, require_changes};
use crate::backend::{decode, tables, Database, Embed, Insert, Select, Update};
use crate::domain::{
    AccessLevel, Embedded, EconomicGroup, GroupChanges, GroupCompany, NewGroup, Status,
};
use crate::error::{AppError, AppResult};

const ENTITY: &str = "grupo";
const ASSOCIATION: &str = "associacao";

/// Alias of the group embedded in an access row
const GROUP_ALIAS: &str = "grupos_economicos";
/// Alias of the company embedded in an association row
const COMPANY_ALIAS: &str = "empresa";

#[derive(Clone)]
pub struct GroupService {
    db: Arc<dyn Database>,
    access: AccessResolver,
}

impl GroupService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            access: AccessResolver::new(db.clone()),
            db,
        }
    }

    pub async fn get_by_id(&self, group_id: Uuid) -> AppResult<EconomicGroup> {
        logged("group.get_by_id", async {
            let row = self
                .db
                .fetch_one(
                    &Select::from(tables::GROUPS)
                        .eq("id", group_id)
                        .eq("status", Status::Active),
                )
                .await?;
            Ok::<_, AppError>(decode::<EconomicGroup>(ENTITY, row)?)
        })
        .await
    }

    /// Active groups the user holds an active grant on
    pub async fn list_user_groups(&self, user_id: Uuid) -> AppResult<Vec<EconomicGroup>> {
        logged("group.list_user_groups", async {
            let rows = self
                .db
                .select(
                    &Select::from(tables::GROUP_ACCESS)
                        .eq("usuario_id", user_id)
                        .eq("status", Status::Active)
                        .embed(
                            Embed::new(GROUP_ALIAS, tables::GROUPS, "grupo_id")
                                .eq("status", Status::Active),
                        ),
                )
                .await?;

            let mut groups = Vec::with_capacity(rows.len());
            for row in &rows {
                match Embedded::<EconomicGroup>::decode(row.get(GROUP_ALIAS)) {
                    Ok(Embedded::Empty) => {}
                    Ok(Embedded::Single(group)) => groups.push(group),
                    Ok(Embedded::Ambiguous(found)) => {
                        tracing::warn!(count = found.len(), "Several groups for one grant, using the first");
                        groups.extend(found.into_iter().next());
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping embedded group that does not decode");
                    }
                }
            }
            Ok::<_, AppError>(groups)
        })
        .await
    }

    /// Insert an active group and make the creator its ADMIN
    pub async fn create(&self, group: NewGroup, user_id: Uuid) -> AppResult<EconomicGroup> {
        logged("group.create", async {
            let insert = Insert::new(tables::GROUPS)
                .set("nome", &group.name)
                .set_opt("descricao", group.description.as_ref())
                .set_opt("url_logo", group.logo_url.as_ref())
                .set("status", Status::Active);

            let created: EconomicGroup = decode(ENTITY, self.db.insert(&insert).await?)?;

            self.db
                .insert(
                    &Insert::new(tables::GROUP_ACCESS)
                        .set("usuario_id", user_id)
                        .set("grupo_id", created.id)
                        .set("nivel_acesso", AccessLevel::Admin)
                        .set("status", Status::Active),
                )
                .await?;

            tracing::info!(group_id = %created.id, %user_id, "Economic group created");
            Ok::<_, AppError>(created)
        })
        .await
    }

    pub async fn update(
        &self,
        group_id: Uuid,
        changes: GroupChanges,
        user_id: Uuid,
    ) -> AppResult<EconomicGroup> {
        logged("group.update", async {
            require_changes(changes.is_empty(), ENTITY)?;

            self.access
                .require_admin(tables::GROUP_ACCESS, "grupo_id", user_id, group_id)
                .await?;

            let update = Update::table(tables::GROUPS)
                .set_opt("nome", changes.name)
                .set_opt("descricao", changes.description)
                .set_opt("url_logo", changes.logo_url)
                .set_opt("status", changes.status)
                .eq("id", group_id);

            Ok::<_, AppError>(decode::<EconomicGroup>(ENTITY, self.db.update_one(&update).await?)?)
        })
        .await
    }

    pub async fn delete(&self, group_id: Uuid, user_id: Uuid) -> AppResult<()> {
        logged("group.delete", async {
            self.access
                .require_admin(tables::GROUP_ACCESS, "grupo_id", user_id, group_id)
                .await?;

            self.db
                .update(
                    &Update::table(tables::GROUPS)
                        .set("status", Status::Inactive)
                        .eq("id", group_id),
                )
                .await?;

            tracing::info!(%group_id, %user_id, "Economic group deactivated");
            Ok::<_, AppError>(())
        })
        .await
    }

    /// Active associations of the group; `company` is set when the company
    /// itself is active
    pub async fn list_group_companies(&self, group_id: Uuid) -> AppResult<Vec<GroupCompany>> {
        logged("group.list_group_companies", async {
            let rows = self
                .db
                .select(
                    &Select::from(tables::GROUP_COMPANIES)
                        .eq("grupo_id", group_id)
                        .eq("status", Status::Active)
                        .embed(
                            Embed::new(COMPANY_ALIAS, tables::COMPANIES, "empresa_id")
                                .eq("status", Status::Active),
                        ),
                )
                .await?;

            let mut associations = Vec::with_capacity(rows.len());
            for row in rows {
                let company = embedded_company(&row, COMPANY_ALIAS);
                match serde_json::from_value::<GroupCompany>(row) {
                    Ok(mut association) => {
                        association.company = company;
                        associations.push(association);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping association that does not decode");
                    }
                }
            }
            Ok::<_, AppError>(associations)
        })
        .await
    }

    /// Link a company to the group, reactivating an earlier link if present
    pub async fn add_company(
        &self,
        group_id: Uuid,
        company_id: Uuid,
        primary: bool,
    ) -> AppResult<GroupCompany> {
        logged("group.add_company", async {
            let existing = self
                .db
                .fetch_optional(
                    &Select::from(tables::GROUP_COMPANIES)
                        .eq("grupo_id", group_id)
                        .eq("empresa_id", company_id),
                )
                .await?;

            let row = match existing {
                Some(_) => {
                    self.db
                        .update_one(
                            &Update::table(tables::GROUP_COMPANIES)
                                .set("empresa_principal", primary)
                                .set("status", Status::Active)
                                .eq("grupo_id", group_id)
                                .eq("empresa_id", company_id),
                        )
                        .await?
                }
                None => {
                    self.db
                        .insert(
                            &Insert::new(tables::GROUP_COMPANIES)
                                .set("grupo_id", group_id)
                                .set("empresa_id", company_id)
                                .set("empresa_principal", primary)
                                .set("status", Status::Active),
                        )
                        .await?
                }
            };

            Ok::<_, AppError>(decode::<GroupCompany>(ASSOCIATION, row)?)
        })
        .await
    }

    /// Mark the association inactive
    pub async fn remove_company(&self, group_id: Uuid, company_id: Uuid) -> AppResult<()> {
        logged("group.remove_company", async {
            self.db
                .update(
                    &Update::table(tables::GROUP_COMPANIES)
                        .set("status", Status::Inactive)
                        .eq("grupo_id", group_id)
                        .eq("empresa_id", company_id),
                )
                .await?;
            Ok::<_, AppError>(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryDatabase, Operation};
    use crate::domain::DomainError;
    use serde_json::json;

    fn setup() -> (Arc<MemoryDatabase>, GroupService) {
        let db = Arc::new(MemoryDatabase::new());
        (db.clone(), GroupService::new(db))
    }

    fn seed_group(db: &MemoryDatabase, group: Uuid, user: Uuid, level: &str) {
        db.seed(
            tables::GROUPS,
            vec![json!({"id": group, "nome": "Holding", "status": "ativo"})],
        );
        db.seed(
            tables::GROUP_ACCESS,
            vec![json!({"usuario_id": user, "grupo_id": group, "nivel_acesso": level, "status": "ativo"})],
        );
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let (db, service) = setup();
        let user = Uuid::new_v4();

        let created = service
            .create(
                NewGroup {
                    name: "Grupo Norte".to_string(),
                    description: None,
                    logo_url: None,
                },
                user,
            )
            .await
            .unwrap();

        assert_eq!(db.rows(tables::GROUP_ACCESS)[0]["nivel_acesso"], "ADMIN");

        let groups = service.list_user_groups(user).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, created.id);
        assert_eq!(groups[0].name, "Grupo Norte");
    }

    #[tokio::test]
    async fn test_inactive_group_not_listed() {
        let (db, service) = setup();
        let (group, user) = (Uuid::new_v4(), Uuid::new_v4());
        seed_group(&db, group, user, "ADMIN");

        service.delete(group, user).await.unwrap();

        assert!(service.list_user_groups(user).await.unwrap().is_empty());
        assert!(service.get_by_id(group).await.is_err());
    }

    #[tokio::test]
    async fn test_editor_cannot_update_or_delete() {
        let (db, service) = setup();
        let (group, editor) = (Uuid::new_v4(), Uuid::new_v4());
        seed_group(&db, group, editor, "EDITOR");

        let changes = GroupChanges {
            name: Some("Outro".to_string()),
            ..Default::default()
        };
        let update = service.update(group, changes, editor).await.unwrap_err();
        let delete = service.delete(group, editor).await.unwrap_err();

        assert!(matches!(update, AppError::Domain(DomainError::PermissionDenied(_))));
        assert!(matches!(delete, AppError::Domain(DomainError::PermissionDenied(_))));
        assert_eq!(db.call_count(Operation::Update, tables::GROUPS), 0);
        assert_eq!(db.rows(tables::GROUPS)[0]["nome"], "Holding");
    }

    #[tokio::test]
    async fn test_add_company_reactivates_existing_association() {
        let (db, service) = setup();
        let (group, company) = (Uuid::new_v4(), Uuid::new_v4());
        db.seed(
            tables::COMPANIES,
            vec![json!({"id": company, "nome": "Filial", "status": "ativo"})],
        );

        let first = service.add_company(group, company, false).await.unwrap();
        assert!(!first.primary);

        service.remove_company(group, company).await.unwrap();
        assert!(service.list_group_companies(group).await.unwrap().is_empty());

        let again = service.add_company(group, company, true).await.unwrap();
        assert!(again.primary);
        assert_eq!(again.status, Status::Active);
        assert_eq!(db.rows(tables::GROUP_COMPANIES).len(), 1);

        let listed = service.list_group_companies(group).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].company.as_ref().map(|c| c.name.as_str()), Some("Filial"));
    }

    #[tokio::test]
    async fn test_association_kept_when_company_inactive() {
        let (db, service) = setup();
        let (group, company) = (Uuid::new_v4(), Uuid::new_v4());
        db.seed(
            tables::COMPANIES,
            vec![json!({"id": company, "nome": "Fechada", "status": "inativo"})],
        );
        db.seed(
            tables::GROUP_COMPANIES,
            vec![json!({"grupo_id": group, "empresa_id": company, "empresa_principal": false, "status": "ativo"})],
        );

        let listed = service.list_group_companies(group).await.unwrap();

        assert_eq!(listed.len(), 1);
        assert!(listed[0].company.is_none());
    }
}
