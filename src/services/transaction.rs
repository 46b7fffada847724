//! Transaction and category service

use std::sync::Arc;

use uuid::Uuid;

use super::{logged, require_changes};
use crate::backend::{
    decode, decode_all, tables, Database, Direction, Embed, Filter, Insert, Select, Update,
};
use crate::domain::{
    CatalogStatus, Category, CategoryKind, DomainError, NewCategory, NewTransaction, Transaction,
    TransactionChanges, TransactionFilters, TransactionStatus,
};
use crate::error::{AppError, AppResult};

const ENTITY: &str = "transacao";
const CATEGORY: &str = "categoria";

fn embeds() -> [Embed; 3] {
    [
        Embed::new("conta_bancaria", tables::BANK_ACCOUNTS, "conta_bancaria_id"),
        Embed::new("cartao_credito", tables::CREDIT_CARDS, "cartao_credito_id"),
        Embed::new("categoria", tables::CATEGORIES, "categoria_id"),
    ]
}

/// Company transactions narrowed by `filters`, newest first
fn list_query(company_id: Uuid, filters: &TransactionFilters) -> Select {
    let mut query = Select::from(tables::TRANSACTIONS).eq("empresa_id", company_id);

    if let Some(from) = filters.from {
        query = query.filter(Filter::gte("data_transacao", from));
    }
    if let Some(to) = filters.to {
        query = query.filter(Filter::lte("data_transacao", to));
    }
    if let Some(kind) = filters.kind {
        query = query.eq("tipo", kind);
    }
    if let Some(account) = filters.bank_account_id {
        query = query.eq("conta_bancaria_id", account);
    }
    if let Some(card) = filters.credit_card_id {
        query = query.eq("cartao_credito_id", card);
    }
    if let Some(category) = filters.category_id {
        query = query.eq("categoria_id", category);
    }
    if let Some(status) = filters.status {
        query = query.eq("status", status);
    }

    query
        .embeds(embeds())
        .order_by("data_transacao", Direction::Desc)
}

#[derive(Clone)]
pub struct TransactionService {
    db: Arc<dyn Database>,
}

impl TransactionService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&self, transaction_id: Uuid) -> AppResult<Transaction> {
        logged("transaction.get_by_id", async {
            let row = self
                .db
                .fetch_one(
                    &Select::from(tables::TRANSACTIONS)
                        .eq("id", transaction_id)
                        .embeds(embeds()),
                )
                .await?;
            Ok::<_, AppError>(decode::<Transaction>(ENTITY, row)?)
        })
        .await
    }

    pub async fn list_for_company(
        &self,
        company_id: Uuid,
        filters: &TransactionFilters,
    ) -> AppResult<Vec<Transaction>> {
        logged("transaction.list_for_company", async {
            let rows = self.db.select(&list_query(company_id, filters)).await?;
            Ok::<_, AppError>(decode_all::<Transaction>(ENTITY, rows)?)
        })
        .await
    }

    /// Accounts and cards must belong to `company_id`; categories may also
    /// be shared ones
    async fn check_references(
        &self,
        company_id: Uuid,
        bank_account_id: Option<Uuid>,
        credit_card_id: Option<Uuid>,
        category_id: Option<Uuid>,
    ) -> AppResult<()> {
        if let Some(id) = bank_account_id {
            let query = Select::from(tables::BANK_ACCOUNTS)
                .eq("id", id)
                .eq("empresa_id", company_id);
            self.require_row(&query, "conta_bancaria_id").await?;
        }
        if let Some(id) = credit_card_id {
            let query = Select::from(tables::CREDIT_CARDS)
                .eq("id", id)
                .eq("empresa_id", company_id);
            self.require_row(&query, "cartao_credito_id").await?;
        }
        if let Some(id) = category_id {
            let query = Select::from(tables::CATEGORIES).eq("id", id).filter(Filter::or(vec![
                Filter::eq("empresa_id", company_id),
                Filter::is_null("empresa_id"),
            ]));
            self.require_row(&query, "categoria_id").await?;
        }
        Ok(())
    }

    async fn require_row(&self, query: &Select, column: &str) -> AppResult<()> {
        match self.db.fetch_optional(query).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::validation(format!(
                "{} does not belong to the company",
                column
            ))
            .into()),
        }
    }

    /// Insert a transaction, pending and non-recurring unless stated
    pub async fn create(&self, transaction: NewTransaction) -> AppResult<Transaction> {
        logged("transaction.create", async {
            self.check_references(
                transaction.company_id,
                transaction.bank_account_id,
                transaction.credit_card_id,
                transaction.category_id,
            )
            .await?;

            let insert = Insert::new(tables::TRANSACTIONS)
                .set("empresa_id", transaction.company_id)
                .set("tipo", transaction.kind)
                .set("descricao", &transaction.description)
                .set("valor", transaction.amount)
                .set("data_transacao", transaction.date)
                .set_opt("data_competencia", transaction.accrual_date)
                .set_opt("conta_bancaria_id", transaction.bank_account_id)
                .set_opt("cartao_credito_id", transaction.credit_card_id)
                .set_opt("categoria_id", transaction.category_id)
                .set("status", transaction.status.unwrap_or_default())
                .set("recorrente", transaction.recurring.unwrap_or(false))
                .set_opt("parcela_atual", transaction.installment)
                .set_opt("total_parcelas", transaction.installment_count)
                .set_opt("transacao_pai_id", transaction.parent_id)
                .set_opt("observacoes", transaction.notes.as_ref())
                .set_opt("anexos", transaction.attachments.as_ref())
                .embeds(embeds());

            let created: Transaction = decode(ENTITY, self.db.insert(&insert).await?)?;
            tracing::info!(
                transaction_id = %created.id,
                company_id = %created.company_id,
                amount = %created.amount,
                "Transaction created"
            );
            Ok::<_, AppError>(created)
        })
        .await
    }

    pub async fn update(
        &self,
        transaction_id: Uuid,
        changes: TransactionChanges,
    ) -> AppResult<Transaction> {
        logged("transaction.update", async {
            require_changes(changes.is_empty(), ENTITY)?;

            if changes.bank_account_id.is_some()
                || changes.credit_card_id.is_some()
                || changes.category_id.is_some()
            {
                let current = self
                    .db
                    .fetch_one(&Select::from(tables::TRANSACTIONS).eq("id", transaction_id))
                    .await?;
                let company_id = current
                    .get("empresa_id")
                    .and_then(|v| v.as_str())
                    .and_then(|v| Uuid::parse_str(v).ok())
                    .ok_or_else(|| DomainError::validation("transaction has no company"))?;
                self.check_references(
                    company_id,
                    changes.bank_account_id,
                    changes.credit_card_id,
                    changes.category_id,
                )
                .await?;
            }

            let update = Update::table(tables::TRANSACTIONS)
                .set_opt("tipo", changes.kind)
                .set_opt("descricao", changes.description)
                .set_opt("valor", changes.amount)
                .set_opt("data_transacao", changes.date)
                .set_opt("data_competencia", changes.accrual_date)
                .set_opt("conta_bancaria_id", changes.bank_account_id)
                .set_opt("cartao_credito_id", changes.credit_card_id)
                .set_opt("categoria_id", changes.category_id)
                .set_opt("status", changes.status)
                .set_opt("recorrente", changes.recurring)
                .set_opt("parcela_atual", changes.installment)
                .set_opt("total_parcelas", changes.installment_count)
                .set_opt("observacoes", changes.notes)
                .set_opt("anexos", changes.attachments)
                .eq("id", transaction_id)
                .embeds(embeds());

            Ok::<_, AppError>(decode::<Transaction>(ENTITY, self.db.update_one(&update).await?)?)
        })
        .await
    }

    /// Cancel the transaction; the row stays
    pub async fn delete(&self, transaction_id: Uuid) -> AppResult<()> {
        logged("transaction.delete", async {
            self.db
                .update(
                    &Update::table(tables::TRANSACTIONS)
                        .set("status", TransactionStatus::Cancelled)
                        .eq("id", transaction_id),
                )
                .await?;
            tracing::info!(%transaction_id, "Transaction cancelled");
            Ok::<_, AppError>(())
        })
        .await
    }

    /// Active categories of the company plus the shared ones. With `kind`,
    /// only categories of that kind or usable for both.
    pub async fn list_categories(
        &self,
        company_id: Uuid,
        kind: Option<CategoryKind>,
    ) -> AppResult<Vec<Category>> {
        logged("transaction.list_categories", async {
            let mut query = Select::from(tables::CATEGORIES)
                .eq("status", CatalogStatus::Active)
                .filter(Filter::or(vec![
                    Filter::eq("empresa_id", company_id),
                    Filter::is_null("empresa_id"),
                ]));

            if let Some(kind) = kind {
                query = query.filter(Filter::or(vec![
                    Filter::eq("tipo", kind),
                    Filter::eq("tipo", CategoryKind::Both),
                ]));
            }

            let query = query
                .embed(Embed::new("categoria_pai", tables::CATEGORIES, "categoria_pai_id"))
                .order_by("nome", Direction::Asc);

            let rows = self.db.select(&query).await?;
            Ok::<_, AppError>(decode_all::<Category>(CATEGORY, rows)?)
        })
        .await
    }

    pub async fn create_category(&self, category: NewCategory) -> AppResult<Category> {
        logged("transaction.create_category", async {
            let insert = Insert::new(tables::CATEGORIES)
                .set_opt("empresa_id", category.company_id)
                .set("nome", &category.name)
                .set("tipo", category.kind)
                .set_opt("cor", category.color.as_ref())
                .set_opt("icone", category.icon.as_ref())
                .set_opt("categoria_pai_id", category.parent_id)
                .set("status", CatalogStatus::Active);

            Ok::<_, AppError>(decode::<Category>(CATEGORY, self.db.insert(&insert).await?)?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryDatabase;
    use crate::domain::TransactionKind;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn setup() -> (Arc<MemoryDatabase>, TransactionService) {
        let db = Arc::new(MemoryDatabase::new());
        (db.clone(), TransactionService::new(db))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_transaction(company: Uuid, kind: TransactionKind, on: NaiveDate) -> NewTransaction {
        NewTransaction {
            company_id: company,
            kind,
            description: "Lançamento".to_string(),
            amount: dec!(100),
            date: on,
            accrual_date: None,
            bank_account_id: None,
            credit_card_id: None,
            category_id: None,
            status: None,
            recurring: None,
            installment: None,
            installment_count: None,
            parent_id: None,
            notes: None,
            attachments: None,
        }
    }

    #[tokio::test]
    async fn test_create_applies_defaults() {
        let (db, service) = setup();

        let created = service
            .create(new_transaction(Uuid::new_v4(), TransactionKind::Income, date(2024, 3, 1)))
            .await
            .unwrap();

        assert_eq!(created.status, TransactionStatus::Pending);
        assert!(!created.recurring);
        assert_eq!(db.rows(tables::TRANSACTIONS)[0]["status"], "pendente");
    }

    #[tokio::test]
    async fn test_list_filters_by_range_and_kind_newest_first() {
        let (_db, service) = setup();
        let company = Uuid::new_v4();

        for (kind, on) in [
            (TransactionKind::Income, date(2024, 2, 28)),
            (TransactionKind::Expense, date(2024, 3, 5)),
            (TransactionKind::Income, date(2024, 3, 10)),
            (TransactionKind::Income, date(2024, 3, 20)),
            (TransactionKind::Income, date(2024, 4, 1)),
        ] {
            service.create(new_transaction(company, kind, on)).await.unwrap();
        }
        service
            .create(new_transaction(Uuid::new_v4(), TransactionKind::Income, date(2024, 3, 15)))
            .await
            .unwrap();

        let filters = TransactionFilters {
            from: Some(date(2024, 3, 1)),
            to: Some(date(2024, 3, 31)),
            kind: Some(TransactionKind::Income),
            ..Default::default()
        };
        let listed = service.list_for_company(company, &filters).await.unwrap();

        let dates: Vec<_> = listed.iter().map(|t| t.date).collect();
        assert_eq!(dates, vec![date(2024, 3, 20), date(2024, 3, 10)]);

        let all = service
            .list_for_company(company, &TransactionFilters::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn test_cancelled_transaction_is_kept() {
        let (_db, service) = setup();
        let created = service
            .create(new_transaction(Uuid::new_v4(), TransactionKind::Expense, date(2024, 3, 1)))
            .await
            .unwrap();

        service.delete(created.id).await.unwrap();

        let fetched = service.get_by_id(created.id).await.unwrap();
        assert_eq!(fetched.status, TransactionStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_categories_include_shared_and_match_kind() {
        let (db, service) = setup();
        let (company, other) = (Uuid::new_v4(), Uuid::new_v4());
        let parent = Uuid::new_v4();

        db.seed(
            tables::CATEGORIES,
            vec![
                json!({"id": parent, "empresa_id": null, "nome": "Despesas fixas", "tipo": "DESPESA", "status": "ativa"}),
                json!({"id": Uuid::new_v4(), "empresa_id": company, "nome": "Aluguel", "tipo": "DESPESA", "categoria_pai_id": parent, "status": "ativa"}),
                json!({"id": Uuid::new_v4(), "empresa_id": company, "nome": "Vendas", "tipo": "RECEITA", "status": "ativa"}),
                json!({"id": Uuid::new_v4(), "empresa_id": company, "nome": "Ajustes", "tipo": "AMBOS", "status": "ativa"}),
                json!({"id": Uuid::new_v4(), "empresa_id": company, "nome": "Antiga", "tipo": "DESPESA", "status": "inativa"}),
                json!({"id": Uuid::new_v4(), "empresa_id": other, "nome": "Outra empresa", "tipo": "DESPESA", "status": "ativa"}),
            ],
        );

        let all = service.list_categories(company, None).await.unwrap();
        let names: Vec<_> = all.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Ajustes", "Aluguel", "Despesas fixas", "Vendas"]);

        let expenses = service
            .list_categories(company, Some(CategoryKind::Expense))
            .await
            .unwrap();
        let names: Vec<_> = expenses.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Ajustes", "Aluguel", "Despesas fixas"]);

        let rent = &expenses[1];
        assert_eq!(rent.parent.as_ref().map(|p| p.id), Some(parent));
    }

    #[tokio::test]
    async fn test_create_category_is_active() {
        let (_db, service) = setup();

        let category = service
            .create_category(NewCategory {
                company_id: Some(Uuid::new_v4()),
                name: "Marketing".to_string(),
                kind: CategoryKind::Expense,
                color: Some("#ff9900".to_string()),
                icon: None,
                parent_id: None,
            })
            .await
            .unwrap();

        assert_eq!(category.status, CatalogStatus::Active);
        assert_eq!(category.color.as_deref(), Some("#ff9900"));
    }

    #[tokio::test]
    async fn test_references_must_belong_to_the_company() {
        let (db, service) = setup();
        let (company, other) = (Uuid::new_v4(), Uuid::new_v4());
        let (foreign_account, foreign_card) = (Uuid::new_v4(), Uuid::new_v4());
        let (foreign_category, shared_category) = (Uuid::new_v4(), Uuid::new_v4());
        db.seed(
            tables::BANK_ACCOUNTS,
            vec![json!({"id": foreign_account, "empresa_id": other, "status": "ativa"})],
        );
        db.seed(
            tables::CREDIT_CARDS,
            vec![json!({"id": foreign_card, "empresa_id": other, "status": "ativo"})],
        );
        db.seed(
            tables::CATEGORIES,
            vec![
                json!({"id": foreign_category, "empresa_id": other, "nome": "Deles", "tipo": "DESPESA", "status": "ativa"}),
                json!({"id": shared_category, "empresa_id": null, "nome": "Geral", "tipo": "AMBOS", "status": "ativa"}),
            ],
        );

        let mut transaction = new_transaction(company, TransactionKind::Expense, date(2024, 3, 1));
        transaction.bank_account_id = Some(foreign_account);
        let err = service.create(transaction).await.unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::Validation(_))));

        let mut transaction = new_transaction(company, TransactionKind::Expense, date(2024, 3, 1));
        transaction.credit_card_id = Some(foreign_card);
        assert!(service.create(transaction).await.is_err());
        assert!(db.rows(tables::TRANSACTIONS).is_empty());

        let mut transaction = new_transaction(company, TransactionKind::Expense, date(2024, 3, 1));
        transaction.category_id = Some(shared_category);
        let created = service.create(transaction).await.unwrap();
        assert_eq!(created.category_id, Some(shared_category));

        let err = service
            .update(
                created.id,
                TransactionChanges {
                    category_id: Some(foreign_category),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::Validation(_))));
        assert_eq!(db.rows(tables::TRANSACTIONS)[0]["categoria_id"], json!(shared_category));
    }

    #[tokio::test]
    async fn test_update_without_changes_is_rejected() {
        let (db, service) = setup();
        let created = service
            .create(new_transaction(Uuid::new_v4(), TransactionKind::Income, date(2024, 3, 1)))
            .await
            .unwrap();
        db.reset_calls();

        let err = service
            .update(created.id, TransactionChanges::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Domain(DomainError::Validation(_))));
        assert_eq!(db.call_count(crate::backend::Operation::Update, tables::TRANSACTIONS), 0);
    }
}
