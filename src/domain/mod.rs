//! Domain module
//!
//! Records, inputs and vocabularies shared by the services.

pub mod company;
pub mod embedded;
pub mod error;
pub mod finance;
pub mod status;
pub mod time;
pub mod user;

pub use company::{
    AccessGrant, Address, Company, CompanyChanges, Contact, EconomicGroup, GroupChanges,
    GroupCompany, NewCompany, NewGroup,
};
pub use embedded::Embedded;
pub use error::{DomainError, PERMISSION_DENIED_MESSAGE};
pub use finance::{
    Bank, BankAccount, BankAccountChanges, Category, CreditCard, CreditCardChanges, Currency,
    FinancialSummary, MonthTotals, NewBankAccount, NewCategory, NewCreditCard, NewTransaction,
    ReportMonth, Transaction, TransactionChanges, TransactionFilters,
};
pub use status::{
    AccessLevel, AccountType, BankAccountStatus, CardStatus, CatalogStatus, CategoryKind,
    DocumentType, Status, TaxRegime, TransactionKind, TransactionStatus,
};
pub use user::{User, UserChanges};
