//! Bank account service, plus the bank and currency catalogs

use std::sync::Arc;

use uuid::Uuid;

use super::{logged, require_changes};
use crate::backend::{decode, decode_all, tables, Database, Direction, Embed, Insert, Select, Update};
use crate::domain::{
    BankAccount, BankAccountChanges, BankAccountStatus, Bank, CatalogStatus, Currency,
    NewBankAccount, Status,
};
use crate::error::{AppError, AppResult};

const ENTITY: &str = "conta_bancaria";

fn embeds() -> [Embed; 2] {
    [
        Embed::new("banco", tables::BANKS, "banco_id"),
        Embed::new("moeda", tables::CURRENCIES, "moeda_id"),
    ]
}

#[derive(Clone)]
pub struct BankAccountService {
    db: Arc<dyn Database>,
}

impl BankAccountService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Account by id, whatever its status
    pub async fn get_by_id(&self, account_id: Uuid) -> AppResult<BankAccount> {
        logged("bank_account.get_by_id", async {
            let row = self
                .db
                .fetch_one(&Select::from(tables::BANK_ACCOUNTS).eq("id", account_id).embeds(embeds()))
                .await?;
            Ok::<_, AppError>(decode::<BankAccount>(ENTITY, row)?)
        })
        .await
    }

    pub async fn list_for_company(&self, company_id: Uuid) -> AppResult<Vec<BankAccount>> {
        logged("bank_account.list_for_company", async {
            let rows = self
                .db
                .select(
                    &Select::from(tables::BANK_ACCOUNTS)
                        .eq("empresa_id", company_id)
                        .eq("status", BankAccountStatus::Active)
                        .embeds(embeds())
                        .order_by("descricao", Direction::Asc),
                )
                .await?;
            Ok::<_, AppError>(decode_all::<BankAccount>(ENTITY, rows)?)
        })
        .await
    }

    pub async fn create(&self, account: NewBankAccount) -> AppResult<BankAccount> {
        logged("bank_account.create", async {
            let insert = Insert::new(tables::BANK_ACCOUNTS)
                .set("empresa_id", account.company_id)
                .set("banco_id", account.bank_id)
                .set("agencia", &account.branch)
                .set("conta", &account.account_number)
                .set_opt("digito", account.check_digit.as_ref())
                .set("tipo_conta", account.account_type)
                .set("descricao", &account.description)
                .set("saldo_inicial", account.opening_balance)
                .set("data_saldo_inicial", account.opening_balance_date)
                .set("moeda_id", account.currency_id)
                .set("status", BankAccountStatus::Active)
                .embeds(embeds());

            let created: BankAccount = decode(ENTITY, self.db.insert(&insert).await?)?;
            tracing::info!(account_id = %created.id, company_id = %created.company_id, "Bank account created");
            Ok::<_, AppError>(created)
        })
        .await
    }

    pub async fn update(
        &self,
        account_id: Uuid,
        changes: BankAccountChanges,
    ) -> AppResult<BankAccount> {
        logged("bank_account.update", async {
            require_changes(changes.is_empty(), ENTITY)?;

            let update = Update::table(tables::BANK_ACCOUNTS)
                .set_opt("banco_id", changes.bank_id)
                .set_opt("agencia", changes.branch)
                .set_opt("conta", changes.account_number)
                .set_opt("digito", changes.check_digit)
                .set_opt("tipo_conta", changes.account_type)
                .set_opt("descricao", changes.description)
                .set_opt("saldo_inicial", changes.opening_balance)
                .set_opt("data_saldo_inicial", changes.opening_balance_date)
                .set_opt("moeda_id", changes.currency_id)
                .set_opt("status", changes.status)
                .eq("id", account_id)
                .embeds(embeds());

            Ok::<_, AppError>(decode::<BankAccount>(ENTITY, self.db.update_one(&update).await?)?)
        })
        .await
    }

    /// Close the account; the row stays
    pub async fn delete(&self, account_id: Uuid) -> AppResult<()> {
        logged("bank_account.delete", async {
            self.db
                .update(
                    &Update::table(tables::BANK_ACCOUNTS)
                        .set("status", BankAccountStatus::Closed)
                        .eq("id", account_id),
                )
                .await?;
            tracing::info!(%account_id, "Bank account closed");
            Ok::<_, AppError>(())
        })
        .await
    }

    pub async fn list_banks(&self) -> AppResult<Vec<Bank>> {
        logged("bank_account.list_banks", async {
            let rows = self
                .db
                .select(
                    &Select::from(tables::BANKS)
                        .eq("status", Status::Active)
                        .order_by("nome", Direction::Asc),
                )
                .await?;
            Ok::<_, AppError>(decode_all::<Bank>("banco", rows)?)
        })
        .await
    }

    pub async fn list_currencies(&self) -> AppResult<Vec<Currency>> {
        logged("bank_account.list_currencies", async {
            let rows = self
                .db
                .select(
                    &Select::from(tables::CURRENCIES)
                        .eq("status", CatalogStatus::Active)
                        .order_by("nome", Direction::Asc),
                )
                .await?;
            Ok::<_, AppError>(decode_all::<Currency>("moeda", rows)?)
        })
        .await
    }
}
