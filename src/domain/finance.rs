//! Financial records
//!
//! Banks and currencies are shared catalogs. Bank accounts, credit cards,
//! categories and transactions belong to one company.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::DomainError;
use super::status::{
    AccountType, BankAccountStatus, CardStatus, CatalogStatus, CategoryKind, Status,
    TransactionKind, TransactionStatus,
};
use super::time;

// =========================================================================
// Catalogs
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bank {
    pub id: Uuid,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "url_logo", default)]
    pub logo_url: Option<String>,
    #[serde(rename = "pais", default)]
    pub country: String,
    #[serde(default)]
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub id: Uuid,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "simbolo")]
    pub symbol: String,
    #[serde(rename = "pais", default)]
    pub country: String,
    #[serde(default)]
    pub status: CatalogStatus,
}

// =========================================================================
// Bank accounts
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: Uuid,
    #[serde(rename = "empresa_id")]
    pub company_id: Uuid,
    #[serde(rename = "banco_id")]
    pub bank_id: Uuid,
    #[serde(rename = "agencia")]
    pub branch: String,
    #[serde(rename = "conta")]
    pub account_number: String,
    #[serde(rename = "digito", default)]
    pub check_digit: Option<String>,
    #[serde(rename = "tipo_conta")]
    pub account_type: AccountType,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "saldo_inicial")]
    pub opening_balance: Decimal,
    #[serde(rename = "data_saldo_inicial")]
    pub opening_balance_date: NaiveDate,
    #[serde(rename = "moeda_id")]
    pub currency_id: Uuid,
    #[serde(default)]
    pub status: BankAccountStatus,
    #[serde(rename = "data_criacao", default, deserialize_with = "time::lenient")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "data_atualizacao", default, deserialize_with = "time::lenient")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "banco", default)]
    pub bank: Option<Bank>,
    #[serde(rename = "moeda", default)]
    pub currency: Option<Currency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBankAccount {
    #[serde(rename = "empresa_id")]
    pub company_id: Uuid,
    #[serde(rename = "banco_id")]
    pub bank_id: Uuid,
    #[serde(rename = "agencia")]
    pub branch: String,
    #[serde(rename = "conta")]
    pub account_number: String,
    #[serde(rename = "digito", default)]
    pub check_digit: Option<String>,
    #[serde(rename = "tipo_conta")]
    pub account_type: AccountType,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "saldo_inicial")]
    pub opening_balance: Decimal,
    #[serde(rename = "data_saldo_inicial")]
    pub opening_balance_date: NaiveDate,
    #[serde(rename = "moeda_id")]
    pub currency_id: Uuid,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BankAccountChanges {
    #[serde(rename = "banco_id", default)]
    pub bank_id: Option<Uuid>,
    #[serde(rename = "agencia", default)]
    pub branch: Option<String>,
    #[serde(rename = "conta", default)]
    pub account_number: Option<String>,
    #[serde(rename = "digito", default)]
    pub check_digit: Option<String>,
    #[serde(rename = "tipo_conta", default)]
    pub account_type: Option<AccountType>,
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
    #[serde(rename = "saldo_inicial", default)]
    pub opening_balance: Option<Decimal>,
    #[serde(rename = "data_saldo_inicial", default)]
    pub opening_balance_date: Option<NaiveDate>,
    #[serde(rename = "moeda_id", default)]
    pub currency_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<BankAccountStatus>,
}

impl BankAccountChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// =========================================================================
// Credit cards
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditCard {
    pub id: Uuid,
    #[serde(rename = "empresa_id")]
    pub company_id: Uuid,
    #[serde(rename = "banco_id", default)]
    pub bank_id: Option<Uuid>,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "bandeira")]
    pub brand: String,
    #[serde(rename = "ultimos_digitos")]
    pub last_digits: String,
    #[serde(rename = "nome_titular")]
    pub holder_name: String,
    /// Day of month the statement closes
    #[serde(rename = "data_fechamento")]
    pub closing_day: u8,
    /// Day of month the statement is due
    #[serde(rename = "data_vencimento")]
    pub due_day: u8,
    #[serde(rename = "limite")]
    pub credit_limit: Decimal,
    #[serde(rename = "moeda_id")]
    pub currency_id: Uuid,
    #[serde(rename = "internacional", default)]
    pub international: bool,
    #[serde(default)]
    pub status: CardStatus,
    #[serde(rename = "data_criacao", default, deserialize_with = "time::lenient")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "data_atualizacao", default, deserialize_with = "time::lenient")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "banco", default)]
    pub bank: Option<Bank>,
    #[serde(rename = "moeda", default)]
    pub currency: Option<Currency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCreditCard {
    #[serde(rename = "empresa_id")]
    pub company_id: Uuid,
    #[serde(rename = "banco_id", default)]
    pub bank_id: Option<Uuid>,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "bandeira")]
    pub brand: String,
    #[serde(rename = "ultimos_digitos")]
    pub last_digits: String,
    #[serde(rename = "nome_titular")]
    pub holder_name: String,
    #[serde(rename = "data_fechamento")]
    pub closing_day: u8,
    #[serde(rename = "data_vencimento")]
    pub due_day: u8,
    #[serde(rename = "limite")]
    pub credit_limit: Decimal,
    #[serde(rename = "moeda_id")]
    pub currency_id: Uuid,
    #[serde(rename = "internacional", default)]
    pub international: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreditCardChanges {
    #[serde(rename = "banco_id", default)]
    pub bank_id: Option<Uuid>,
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
    #[serde(rename = "bandeira", default)]
    pub brand: Option<String>,
    #[serde(rename = "ultimos_digitos", default)]
    pub last_digits: Option<String>,
    #[serde(rename = "nome_titular", default)]
    pub holder_name: Option<String>,
    #[serde(rename = "data_fechamento", default)]
    pub closing_day: Option<u8>,
    #[serde(rename = "data_vencimento", default)]
    pub due_day: Option<u8>,
    #[serde(rename = "limite", default)]
    pub credit_limit: Option<Decimal>,
    #[serde(rename = "moeda_id", default)]
    pub currency_id: Option<Uuid>,
    #[serde(rename = "internacional", default)]
    pub international: Option<bool>,
    #[serde(default)]
    pub status: Option<CardStatus>,
}

impl CreditCardChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Closing and due days must be valid days of a month
pub fn validate_card_days(closing_day: Option<u8>, due_day: Option<u8>) -> Result<(), DomainError> {
    for (name, day) in [("data_fechamento", closing_day), ("data_vencimento", due_day)] {
        if let Some(day) = day {
            if !(1..=31).contains(&day) {
                return Err(DomainError::validation(format!(
                    "{} must be between 1 and 31, got {}",
                    name, day
                )));
            }
        }
    }
    Ok(())
}

// =========================================================================
// Categories
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    /// `None` for categories shared by every company
    #[serde(rename = "empresa_id", default)]
    pub company_id: Option<Uuid>,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "tipo")]
    pub kind: CategoryKind,
    #[serde(rename = "cor", default)]
    pub color: Option<String>,
    #[serde(rename = "icone", default)]
    pub icon: Option<String>,
    #[serde(rename = "categoria_pai_id", default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub status: CatalogStatus,
    #[serde(rename = "categoria_pai", default)]
    pub parent: Option<Box<Category>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCategory {
    #[serde(rename = "empresa_id", default)]
    pub company_id: Option<Uuid>,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "tipo")]
    pub kind: CategoryKind,
    #[serde(rename = "cor", default)]
    pub color: Option<String>,
    #[serde(rename = "icone", default)]
    pub icon: Option<String>,
    #[serde(rename = "categoria_pai_id", default)]
    pub parent_id: Option<Uuid>,
}

// =========================================================================
// Transactions
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    #[serde(rename = "empresa_id")]
    pub company_id: Uuid,
    #[serde(rename = "tipo")]
    pub kind: TransactionKind,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "valor")]
    pub amount: Decimal,
    #[serde(rename = "data_transacao")]
    pub date: NaiveDate,
    /// Accrual date, when different from the cash date
    #[serde(rename = "data_competencia", default)]
    pub accrual_date: Option<NaiveDate>,
    #[serde(rename = "conta_bancaria_id", default)]
    pub bank_account_id: Option<Uuid>,
    #[serde(rename = "cartao_credito_id", default)]
    pub credit_card_id: Option<Uuid>,
    #[serde(rename = "categoria_id", default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub status: TransactionStatus,
    #[serde(rename = "recorrente", default)]
    pub recurring: bool,
    #[serde(rename = "parcela_atual", default)]
    pub installment: Option<i32>,
    #[serde(rename = "total_parcelas", default)]
    pub installment_count: Option<i32>,
    #[serde(rename = "transacao_pai_id", default)]
    pub parent_id: Option<Uuid>,
    #[serde(rename = "observacoes", default)]
    pub notes: Option<String>,
    #[serde(rename = "anexos", default)]
    pub attachments: Option<Vec<String>>,
    #[serde(rename = "data_criacao", default, deserialize_with = "time::lenient")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "data_atualizacao", default, deserialize_with = "time::lenient")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "conta_bancaria", default)]
    pub bank_account: Option<BankAccount>,
    #[serde(rename = "cartao_credito", default)]
    pub credit_card: Option<CreditCard>,
    #[serde(rename = "categoria", default)]
    pub category: Option<Category>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    #[serde(rename = "empresa_id")]
    pub company_id: Uuid,
    #[serde(rename = "tipo")]
    pub kind: TransactionKind,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "valor")]
    pub amount: Decimal,
    #[serde(rename = "data_transacao")]
    pub date: NaiveDate,
    #[serde(rename = "data_competencia", default)]
    pub accrual_date: Option<NaiveDate>,
    #[serde(rename = "conta_bancaria_id", default)]
    pub bank_account_id: Option<Uuid>,
    #[serde(rename = "cartao_credito_id", default)]
    pub credit_card_id: Option<Uuid>,
    #[serde(rename = "categoria_id", default)]
    pub category_id: Option<Uuid>,
    /// Defaults to pending
    #[serde(default)]
    pub status: Option<TransactionStatus>,
    #[serde(rename = "recorrente", default)]
    pub recurring: Option<bool>,
    #[serde(rename = "parcela_atual", default)]
    pub installment: Option<i32>,
    #[serde(rename = "total_parcelas", default)]
    pub installment_count: Option<i32>,
    #[serde(rename = "transacao_pai_id", default)]
    pub parent_id: Option<Uuid>,
    #[serde(rename = "observacoes", default)]
    pub notes: Option<String>,
    #[serde(rename = "anexos", default)]
    pub attachments: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionChanges {
    #[serde(rename = "tipo", default)]
    pub kind: Option<TransactionKind>,
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
    #[serde(rename = "valor", default)]
    pub amount: Option<Decimal>,
    #[serde(rename = "data_transacao", default)]
    pub date: Option<NaiveDate>,
    #[serde(rename = "data_competencia", default)]
    pub accrual_date: Option<NaiveDate>,
    #[serde(rename = "conta_bancaria_id", default)]
    pub bank_account_id: Option<Uuid>,
    #[serde(rename = "cartao_credito_id", default)]
    pub credit_card_id: Option<Uuid>,
    #[serde(rename = "categoria_id", default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<TransactionStatus>,
    #[serde(rename = "recorrente", default)]
    pub recurring: Option<bool>,
    #[serde(rename = "parcela_atual", default)]
    pub installment: Option<i32>,
    #[serde(rename = "total_parcelas", default)]
    pub installment_count: Option<i32>,
    #[serde(rename = "observacoes", default)]
    pub notes: Option<String>,
    #[serde(rename = "anexos", default)]
    pub attachments: Option<Vec<String>>,
}

impl TransactionChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Optional narrowing of a company's transaction list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionFilters {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub kind: Option<TransactionKind>,
    #[serde(default)]
    pub bank_account_id: Option<Uuid>,
    #[serde(default)]
    pub credit_card_id: Option<Uuid>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<TransactionStatus>,
}

// =========================================================================
// Reports
// =========================================================================

/// Calendar month, written `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReportMonth {
    year: i32,
    month: u32,
}

impl ReportMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, DomainError> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(DomainError::validation(format!(
                "invalid month {}-{:02}",
                year, month
            )));
        }
        Ok(Self { year, month })
    }

    /// Month containing `date`
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// First and last day of the month
    pub fn bounds(&self) -> (NaiveDate, NaiveDate) {
        let first = NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default();
        let next = if self.month == 12 {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1)
        };
        let last = next.and_then(|d| d.pred_opt()).unwrap_or(first);
        (first, last)
    }
}

impl fmt::Display for ReportMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for ReportMonth {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::validation(format!("expected YYYY-MM, got '{}'", s));
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for ReportMonth {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReportMonth> for String {
    fn from(month: ReportMonth) -> Self {
        month.to_string()
    }
}

/// Income and expense totals for one month
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonthTotals {
    pub income: Decimal,
    pub expenses: Decimal,
}

impl MonthTotals {
    pub fn balance(&self) -> Decimal {
        self.income - self.expenses
    }
}

/// Percentage change from `previous` to `current`; 100 when there is no
/// positive base to compare against
pub fn variation(current: Decimal, previous: Decimal) -> Decimal {
    if previous > Decimal::ZERO {
        (current - previous) / previous * Decimal::ONE_HUNDRED
    } else {
        Decimal::ONE_HUNDRED
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    #[serde(rename = "saldo_total")]
    pub total_balance: Decimal,
    #[serde(rename = "receitas_mes_atual")]
    pub current_income: Decimal,
    #[serde(rename = "despesas_mes_atual")]
    pub current_expenses: Decimal,
    #[serde(rename = "saldo_mes_atual")]
    pub current_balance: Decimal,
    #[serde(rename = "receitas_mes_anterior")]
    pub previous_income: Decimal,
    #[serde(rename = "despesas_mes_anterior")]
    pub previous_expenses: Decimal,
    #[serde(rename = "saldo_mes_anterior")]
    pub previous_balance: Decimal,
    #[serde(rename = "variacao_receitas")]
    pub income_variation: Decimal,
    #[serde(rename = "variacao_despesas")]
    pub expense_variation: Decimal,
    #[serde(rename = "variacao_saldo")]
    pub balance_variation: Decimal,
}

impl FinancialSummary {
    pub fn new(total_balance: Decimal, current: MonthTotals, previous: MonthTotals) -> Self {
        Self {
            total_balance,
            current_income: current.income,
            current_expenses: current.expenses,
            current_balance: current.balance(),
            previous_income: previous.income,
            previous_expenses: previous.expenses,
            previous_balance: previous.balance(),
            income_variation: variation(current.income, previous.income),
            expense_variation: variation(current.expenses, previous.expenses),
            balance_variation: variation(current.balance(), previous.balance()),
        }
    }
}
