//! Credit card service

use std::sync::Arc;

use uuid::Uuid;

use super::{logged, require_changes};
use crate::backend::{decode, decode_all, tables, Database, Direction, Embed, Insert, Select, Update};
use crate::domain::finance::validate_card_days;
use crate::domain::{CardStatus, CreditCard, CreditCardChanges, NewCreditCard};
use crate::error::{AppError, AppResult};

const ENTITY: &str = "cartao_credito";

fn embeds() -> [Embed; 2] {
    [
        Embed::new("banco", tables::BANKS, "banco_id"),
        Embed::new("moeda", tables::CURRENCIES, "moeda_id"),
    ]
}

#[derive(Clone)]
pub struct CreditCardService {
    db: Arc<dyn Database>,
}

impl CreditCardService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&self, card_id: Uuid) -> AppResult<CreditCard> {
        logged("credit_card.get_by_id", async {
            let row = self
                .db
                .fetch_one(&Select::from(tables::CREDIT_CARDS).eq("id", card_id).embeds(embeds()))
                .await?;
            Ok::<_, AppError>(decode::<CreditCard>(ENTITY, row)?)
        })
        .await
    }

    pub async fn list_for_company(&self, company_id: Uuid) -> AppResult<Vec<CreditCard>> {
        logged("credit_card.list_for_company", async {
            let rows = self
                .db
                .select(
                    &Select::from(tables::CREDIT_CARDS)
                        .eq("empresa_id", company_id)
                        .eq("status", CardStatus::Active)
                        .embeds(embeds())
                        .order_by("descricao", Direction::Asc),
                )
                .await?;
            Ok::<_, AppError>(decode_all::<CreditCard>(ENTITY, rows)?)
        })
        .await
    }

    pub async fn create(&self, card: NewCreditCard) -> AppResult<CreditCard> {
        logged("credit_card.create", async {
            validate_card_days(Some(card.closing_day), Some(card.due_day))?;

            let insert = Insert::new(tables::CREDIT_CARDS)
                .set("empresa_id", card.company_id)
                .set_opt("banco_id", card.bank_id)
                .set("descricao", &card.description)
                .set("bandeira", &card.brand)
                .set("ultimos_digitos", &card.last_digits)
                .set("nome_titular", &card.holder_name)
                .set("data_fechamento", card.closing_day)
                .set("data_vencimento", card.due_day)
                .set("limite", card.credit_limit)
                .set("moeda_id", card.currency_id)
                .set("internacional", card.international)
                .set("status", CardStatus::Active)
                .embeds(embeds());

            let created: CreditCard = decode(ENTITY, self.db.insert(&insert).await?)?;
            tracing::info!(card_id = %created.id, company_id = %created.company_id, "Credit card created");
            Ok::<_, AppError>(created)
        })
        .await
    }

    pub async fn update(&self, card_id: Uuid, changes: CreditCardChanges) -> AppResult<CreditCard> {
        logged("credit_card.update", async {
            require_changes(changes.is_empty(), ENTITY)?;

            validate_card_days(changes.closing_day, changes.due_day)?;

            let update = Update::table(tables::CREDIT_CARDS)
                .set_opt("banco_id", changes.bank_id)
                .set_opt("descricao", changes.description)
                .set_opt("bandeira", changes.brand)
                .set_opt("ultimos_digitos", changes.last_digits)
                .set_opt("nome_titular", changes.holder_name)
                .set_opt("data_fechamento", changes.closing_day)
                .set_opt("data_vencimento", changes.due_day)
                .set_opt("limite", changes.credit_limit)
                .set_opt("moeda_id", changes.currency_id)
                .set_opt("internacional", changes.international)
                .set_opt("status", changes.status)
                .eq("id", card_id)
                .embeds(embeds());

            Ok::<_, AppError>(decode::<CreditCard>(ENTITY, self.db.update_one(&update).await?)?)
        })
        .await
    }

    /// Cancel the card; the row stays
    pub async fn delete(&self, card_id: Uuid) -> AppResult<()> {
        logged("credit_card.delete", async {
            self.db
                .update(
                    &Update::table(tables::CREDIT_CARDS)
                        .set("status", CardStatus::Cancelled)
                        .eq("id", card_id),
                )
                .await?;
            tracing::info!(%card_id, "Credit card cancelled");
            Ok::<_, AppError>(())
        })
        .await
    }
}
