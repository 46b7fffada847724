//! Remote table names

pub const USERS: &str = "usuarios";
pub const COMPANIES: &str = "empresas";
pub const GROUPS: &str = "grupos_economicos";
pub const COMPANY_ACCESS: &str = "acessos_usuario_empresa";
pub const GROUP_ACCESS: &str = "acessos_usuario_grupo";
pub const GROUP_COMPANIES: &str = "associacoes_empresa_grupo";
pub const BANKS: &str = "bancos";
pub const CURRENCIES: &str = "moedas";
pub const BANK_ACCOUNTS: &str = "contas_bancarias";
pub const CREDIT_CARDS: &str = "cartoes_credito";
pub const CATEGORIES: &str = "categorias";
pub const TRANSACTIONS: &str = "transacoes";

/// Every table the application reads or writes
pub const ALL: &[&str] = &[
    USERS,
    COMPANIES,
    GROUPS,
    COMPANY_ACCESS,
    GROUP_ACCESS,
    GROUP_COMPANIES,
    BANKS,
    CURRENCIES,
    BANK_ACCOUNTS,
    CREDIT_CARDS,
    CATEGORIES,
    TRANSACTIONS,
];
