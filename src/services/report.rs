//! Financial summary

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::logged;
use crate::backend::{decode_all, tables, Database, Filter, Select};
use crate::domain::{
    BankAccountStatus, FinancialSummary, MonthTotals, ReportMonth, TransactionKind,
    TransactionStatus,
};
use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
struct OpeningBalance {
    #[serde(rename = "saldo_inicial")]
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct Movement {
    #[serde(rename = "tipo")]
    kind: TransactionKind,
    #[serde(rename = "valor")]
    amount: Decimal,
}

/// Income and expense sums; transfers count as neither
fn totals(movements: &[Movement]) -> MonthTotals {
    movements
        .iter()
        .fold(MonthTotals::default(), |mut totals, movement| {
            match movement.kind {
                TransactionKind::Income => totals.income += movement.amount,
                TransactionKind::Expense => totals.expenses += movement.amount,
                TransactionKind::Transfer => {}
            }
            totals
        })
}

#[derive(Clone)]
pub struct ReportService {
    db: Arc<dyn Database>,
}

impl ReportService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub async fn financial_summary(
        &self,
        company_id: Uuid,
        current: ReportMonth,
        previous: ReportMonth,
    ) -> AppResult<FinancialSummary> {
        logged("report.financial_summary", async {
            let accounts = self
                .db
                .select(
                    &Select::from(tables::BANK_ACCOUNTS)
                        .eq("empresa_id", company_id)
                        .eq("status", BankAccountStatus::Active),
                )
                .await?;
            let total_balance: Decimal = decode_all::<OpeningBalance>("conta_bancaria", accounts)?
                .iter()
                .map(|account| account.amount)
                .sum();

            let current_totals = self.month_totals(company_id, current).await?;
            let previous_totals = self.month_totals(company_id, previous).await?;

            tracing::debug!(
                %company_id,
                month = %current,
                income = %current_totals.income,
                expenses = %current_totals.expenses,
                "Computed financial summary"
            );

            Ok::<_, AppError>(FinancialSummary::new(
                total_balance,
                current_totals,
                previous_totals,
            ))
        })
        .await
    }

    /// Settled income and expenses dated inside `month`
    async fn month_totals(&self, company_id: Uuid, month: ReportMonth) -> AppResult<MonthTotals> {
        let (first, last) = month.bounds();
        let rows = self
            .db
            .select(
                &Select::from(tables::TRANSACTIONS)
                    .eq("empresa_id", company_id)
                    .eq("status", TransactionStatus::Settled)
                    .filter(Filter::gte("data_transacao", first))
                    .filter(Filter::lte("data_transacao", last)),
            )
            .await?;

        Ok(totals(&decode_all::<Movement>("transacao", rows)?))
    }
}
