//! Status and kind vocabularies
//!
//! Variants serialize to the values stored in the remote tables.

use serde::{Deserialize, Serialize};

/// Lifecycle of companies, groups, accesses, associations and banks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    #[serde(rename = "ativo")]
    Active,
    #[serde(rename = "inativo")]
    Inactive,
    #[serde(rename = "pendente")]
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BankAccountStatus {
    #[default]
    #[serde(rename = "ativa")]
    Active,
    #[serde(rename = "inativa")]
    Inactive,
    #[serde(rename = "encerrada")]
    Closed,
}

/// Lifecycle of currencies and categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CatalogStatus {
    #[default]
    #[serde(rename = "ativa")]
    Active,
    #[serde(rename = "inativa")]
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CardStatus {
    #[default]
    #[serde(rename = "ativo")]
    Active,
    #[serde(rename = "inativo")]
    Inactive,
    #[serde(rename = "bloqueado")]
    Blocked,
    #[serde(rename = "cancelado")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransactionStatus {
    #[default]
    #[serde(rename = "pendente")]
    Pending,
    #[serde(rename = "efetivada")]
    Settled,
    #[serde(rename = "cancelada")]
    Cancelled,
}

/// Access level granted to a user on a company or group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessLevel {
    #[serde(rename = "ADMIN")]
    Admin,
    #[serde(rename = "EDITOR")]
    Editor,
    #[serde(rename = "VISUALIZADOR")]
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentType {
    Cnpj,
    Cpf,
    Estrangeiro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaxRegime {
    Simples,
    LucroPresumido,
    LucroReal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    #[serde(rename = "CORRENTE")]
    Checking,
    #[serde(rename = "POUPANCA")]
    Savings,
    #[serde(rename = "INVESTIMENTO")]
    Investment,
    #[serde(rename = "PAGAMENTO")]
    Payment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    #[serde(rename = "RECEITA")]
    Income,
    #[serde(rename = "DESPESA")]
    Expense,
    #[serde(rename = "TRANSFERENCIA")]
    Transfer,
}

/// Which transactions a category applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryKind {
    #[serde(rename = "RECEITA")]
    Income,
    #[serde(rename = "DESPESA")]
    Expense,
    #[serde(rename = "AMBOS")]
    Both,
}
