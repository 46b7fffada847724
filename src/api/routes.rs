//! API Routes
//!
//! HTTP endpoint definitions. Every body is an envelope: `{"data": ...}` on
//! success, `{"error": {...}}` on failure.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::Response,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::middleware::RequestUser;
use super::{created, ok, ApiJson, ApiPath, ApiQuery, AppState, Envelope};
use crate::backend::{tables, AuthSession, AuthUser};
use crate::domain::{
    Bank, BankAccount, BankAccountChanges, Category, CategoryKind, Company, CompanyChanges,
    CreditCard, CreditCardChanges, Currency, DomainError, EconomicGroup, FinancialSummary,
    GroupChanges, GroupCompany, NewBankAccount, NewCategory, NewCompany, NewCreditCard, NewGroup,
    NewTransaction, ReportMonth, Transaction, TransactionChanges, TransactionFilters, User,
    UserChanges,
};
use crate::error::{AppError, AppResult};
use crate::services::AccessResolver;
use crate::session::{SessionHandle, SessionSnapshot};

type Data<T> = AppResult<Json<Envelope<T>>>;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(rename = "nome")]
    pub first_name: String,
    #[serde(rename = "sobrenome")]
    pub last_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    #[serde(default)]
    pub redirect_to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecoverPasswordRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActiveCompanyRequest {
    #[serde(rename = "empresa_id")]
    pub company_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddCompanyRequest {
    #[serde(rename = "empresa_id")]
    pub company_id: Uuid,
    #[serde(rename = "empresa_principal", default)]
    pub primary: bool,
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    #[serde(rename = "tipo", default)]
    pub kind: Option<CategoryKind>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// Defaults to the current month
    #[serde(rename = "mes", default)]
    pub month: Option<ReportMonth>,
    /// Defaults to the month before `mes`
    #[serde(rename = "mes_anterior", default)]
    pub previous_month: Option<ReportMonth>,
}

// =========================================================================
// API Router
// =========================================================================

/// Routes reachable without a token
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/google", get(google_authorize_url))
        .route("/auth/recover-password", post(recover_password))
}

/// Routes behind the bearer-token middleware
pub fn protected_router() -> Router<AppState> {
    Router::new()
        // Current user and session
        .route("/me", get(get_me).patch(update_me))
        .route("/me/session", get(get_session))
        .route("/me/companies", get(get_my_companies))
        .route("/me/companies/reload", post(reload_my_companies))
        .route("/me/active-company", put(set_active_company))
        .route("/auth/logout", post(logout))
        .route("/auth/reset-password", post(reset_password))
        // Companies
        .route("/companies", post(create_company))
        .route(
            "/companies/:company_id",
            get(get_company).patch(update_company).delete(delete_company),
        )
        .route(
            "/companies/:company_id/bank-accounts",
            get(list_bank_accounts),
        )
        .route("/companies/:company_id/credit-cards", get(list_credit_cards))
        .route("/companies/:company_id/transactions", get(list_transactions))
        .route("/companies/:company_id/categories", get(list_categories))
        .route("/companies/:company_id/summary", get(get_summary))
        // Economic groups
        .route("/groups", get(list_groups).post(create_group))
        .route(
            "/groups/:group_id",
            get(get_group).patch(update_group).delete(delete_group),
        )
        .route(
            "/groups/:group_id/companies",
            get(list_group_companies).post(add_group_company),
        )
        .route(
            "/groups/:group_id/companies/:company_id",
            delete(remove_group_company),
        )
        // Catalogs
        .route("/banks", get(list_banks))
        .route("/currencies", get(list_currencies))
        // Bank accounts
        .route("/bank-accounts", post(create_bank_account))
        .route(
            "/bank-accounts/:account_id",
            get(get_bank_account)
                .patch(update_bank_account)
                .delete(delete_bank_account),
        )
        // Credit cards
        .route("/credit-cards", post(create_credit_card))
        .route(
            "/credit-cards/:card_id",
            get(get_credit_card)
                .patch(update_credit_card)
                .delete(delete_credit_card),
        )
        // Transactions and categories
        .route("/transactions", post(create_transaction))
        .route(
            "/transactions/:transaction_id",
            get(get_transaction)
                .patch(update_transaction)
                .delete(delete_transaction),
        )
        .route("/categories", post(create_category))
}

// =========================================================================
// Access helpers
// =========================================================================

/// Session of the caller, loading the profile when none is running
async fn session_of(state: &AppState, caller: &RequestUser) -> AppResult<SessionHandle> {
    if let Some(handle) = state.sessions.get(caller.user.id) {
        return Ok(handle);
    }
    let profile = state.services.auth.load_profile(&caller.user).await;
    state.sessions.session(&profile).await
}

/// Fail unless the caller reaches `company_id`; the reachable set is
/// refreshed once before giving up
async fn require_company(state: &AppState, caller: &RequestUser, company_id: Uuid) -> AppResult<()> {
    let session = session_of(state, caller).await?;
    let reachable = |companies: &[Company]| companies.iter().any(|c| c.id == company_id);

    if reachable(&session.snapshot().await?.companies) {
        return Ok(());
    }
    if reachable(&session.reload().await?) {
        return Ok(());
    }

    tracing::warn!(user_id = %caller.user.id, %company_id, "Company outside caller's reach");
    Err(DomainError::permission_denied().into())
}

async fn require_group_admin(state: &AppState, caller: &RequestUser, group_id: Uuid) -> AppResult<()> {
    AccessResolver::new(state.backend.client())
        .require_admin(tables::GROUP_ACCESS, "grupo_id", caller.user.id, group_id)
        .await
}

async fn require_group_member(state: &AppState, caller: &RequestUser, group_id: Uuid) -> AppResult<()> {
    let groups = state.services.groups.list_user_groups(caller.user.id).await?;
    if groups.iter().any(|g| g.id == group_id) {
        Ok(())
    } else {
        Err(DomainError::permission_denied().into())
    }
}

/// A record the caller looks up by id; a missing one is refused like one
/// outside their reach
fn hide_missing<T>(result: AppResult<T>) -> AppResult<T> {
    result.map_err(|e| match e {
        AppError::Backend(ref backend) if backend.is_not_found() => {
            DomainError::permission_denied().into()
        }
        other => other,
    })
}

/// Reachable companies may have changed
async fn refresh_session(state: &AppState, caller: &RequestUser) {
    if let Some(session) = state.sessions.get(caller.user.id) {
        if let Err(e) = session.reload().await {
            tracing::warn!(user_id = %caller.user.id, error = %e, "Session refresh failed");
        }
    }
}

// =========================================================================
// Auth (public)
// =========================================================================

async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> AppResult<Response> {
    let user = state
        .services
        .auth
        .register(
            &request.email,
            &request.password,
            &request.first_name,
            &request.last_name,
        )
        .await?;
    Ok(created(user))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Data<AuthSession> {
    let session = state
        .services
        .auth
        .login(&request.email, &request.password)
        .await?;
    Ok(ok(session))
}

async fn google_authorize_url(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AuthorizeQuery>,
) -> Data<AuthorizeResponse> {
    let url = state
        .services
        .auth
        .login_with_google(query.redirect_to.as_deref())?;
    Ok(ok(AuthorizeResponse { url }))
}

async fn recover_password(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RecoverPasswordRequest>,
) -> Data<MessageResponse> {
    state.services.auth.recover_password(&request.email).await?;
    Ok(ok(MessageResponse {
        message: "Recovery e-mail sent".to_string(),
    }))
}

// =========================================================================
// Current user and session
// =========================================================================

async fn get_me(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
) -> Data<User> {
    Ok(ok(state.services.auth.load_profile(&caller.user).await))
}

async fn update_me(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiJson(changes): ApiJson<UserChanges>,
) -> Data<User> {
    let mut user = state
        .services
        .auth
        .update_user(caller.user.id, changes)
        .await?;
    user.email = caller.user.email.clone().unwrap_or_default();

    if let Some(session) = state.sessions.get(caller.user.id) {
        if let Err(e) = session.update_user(user.clone()).await {
            tracing::debug!(user_id = %caller.user.id, error = %e, "Session gone before profile update");
        }
    }
    Ok(ok(user))
}

async fn get_session(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
) -> Data<SessionSnapshot> {
    let session = session_of(&state, &caller).await?;
    Ok(ok(session.snapshot().await?))
}

async fn get_my_companies(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
) -> Data<Vec<Company>> {
    let session = session_of(&state, &caller).await?;
    Ok(ok(session.snapshot().await?.companies))
}

async fn reload_my_companies(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
) -> Data<Vec<Company>> {
    let session = session_of(&state, &caller).await?;
    Ok(ok(session.reload().await?))
}

async fn set_active_company(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiJson(request): ApiJson<ActiveCompanyRequest>,
) -> Data<Company> {
    let session = session_of(&state, &caller).await?;
    Ok(ok(session.set_active(request.company_id).await?))
}

async fn logout(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
) -> AppResult<StatusCode> {
    state
        .services
        .auth
        .logout(&caller.access_token, caller.user.id)
        .await?;
    state.sessions.sign_out(caller.user.id).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_password(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiJson(request): ApiJson<ResetPasswordRequest>,
) -> Data<AuthUser> {
    let user = state
        .services
        .auth
        .reset_password(&caller.access_token, &request.password)
        .await?;
    Ok(ok(user))
}

// =========================================================================
// Companies
// =========================================================================

async fn create_company(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiJson(company): ApiJson<NewCompany>,
) -> AppResult<Response> {
    let company = state
        .services
        .companies
        .create(company, caller.user.id)
        .await?;
    refresh_session(&state, &caller).await;
    Ok(created(company))
}

async fn get_company(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(company_id): ApiPath<Uuid>,
) -> Data<Company> {
    require_company(&state, &caller, company_id).await?;
    Ok(ok(state.services.companies.get_by_id(company_id).await?))
}

async fn update_company(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(company_id): ApiPath<Uuid>,
    ApiJson(changes): ApiJson<CompanyChanges>,
) -> Data<Company> {
    let company = state
        .services
        .companies
        .update(company_id, changes, caller.user.id)
        .await?;
    Ok(ok(company))
}

async fn delete_company(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(company_id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    state
        .services
        .companies
        .delete(company_id, caller.user.id)
        .await?;
    refresh_session(&state, &caller).await;
    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Economic groups
// =========================================================================

async fn list_groups(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
) -> Data<Vec<EconomicGroup>> {
    Ok(ok(state.services.groups.list_user_groups(caller.user.id).await?))
}

async fn create_group(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiJson(group): ApiJson<NewGroup>,
) -> AppResult<Response> {
    let group = state.services.groups.create(group, caller.user.id).await?;
    Ok(created(group))
}

async fn get_group(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(group_id): ApiPath<Uuid>,
) -> Data<EconomicGroup> {
    require_group_member(&state, &caller, group_id).await?;
    Ok(ok(state.services.groups.get_by_id(group_id).await?))
}

async fn update_group(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(group_id): ApiPath<Uuid>,
    ApiJson(changes): ApiJson<GroupChanges>,
) -> Data<EconomicGroup> {
    let group = state
        .services
        .groups
        .update(group_id, changes, caller.user.id)
        .await?;
    Ok(ok(group))
}

async fn delete_group(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(group_id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    state.services.groups.delete(group_id, caller.user.id).await?;
    refresh_session(&state, &caller).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_group_companies(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(group_id): ApiPath<Uuid>,
) -> Data<Vec<GroupCompany>> {
    require_group_member(&state, &caller, group_id).await?;
    Ok(ok(state.services.groups.list_group_companies(group_id).await?))
}

async fn add_group_company(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(group_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<AddCompanyRequest>,
) -> AppResult<Response> {
    require_group_admin(&state, &caller, group_id).await?;
    // Members of the group reach the company afterwards
    require_company(&state, &caller, request.company_id).await?;
    let association = state
        .services
        .groups
        .add_company(group_id, request.company_id, request.primary)
        .await?;
    refresh_session(&state, &caller).await;
    Ok(created(association))
}

async fn remove_group_company(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath((group_id, company_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    require_group_admin(&state, &caller, group_id).await?;
    state
        .services
        .groups
        .remove_company(group_id, company_id)
        .await?;
    refresh_session(&state, &caller).await;
    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Catalogs
// =========================================================================

async fn list_banks(State(state): State<AppState>) -> Data<Vec<Bank>> {
    Ok(ok(state.services.bank_accounts.list_banks().await?))
}

async fn list_currencies(State(state): State<AppState>) -> Data<Vec<Currency>> {
    Ok(ok(state.services.bank_accounts.list_currencies().await?))
}

// =========================================================================
// Bank accounts
// =========================================================================

async fn list_bank_accounts(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(company_id): ApiPath<Uuid>,
) -> Data<Vec<BankAccount>> {
    require_company(&state, &caller, company_id).await?;
    Ok(ok(state.services.bank_accounts.list_for_company(company_id).await?))
}

async fn create_bank_account(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiJson(account): ApiJson<NewBankAccount>,
) -> AppResult<Response> {
    require_company(&state, &caller, account.company_id).await?;
    Ok(created(state.services.bank_accounts.create(account).await?))
}

async fn get_bank_account(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(account_id): ApiPath<Uuid>,
) -> Data<BankAccount> {
    let account = hide_missing(state.services.bank_accounts.get_by_id(account_id).await)?;
    require_company(&state, &caller, account.company_id).await?;
    Ok(ok(account))
}

async fn update_bank_account(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(account_id): ApiPath<Uuid>,
    ApiJson(changes): ApiJson<BankAccountChanges>,
) -> Data<BankAccount> {
    let account = hide_missing(state.services.bank_accounts.get_by_id(account_id).await)?;
    require_company(&state, &caller, account.company_id).await?;
    Ok(ok(state.services.bank_accounts.update(account_id, changes).await?))
}

async fn delete_bank_account(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(account_id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    let account = hide_missing(state.services.bank_accounts.get_by_id(account_id).await)?;
    require_company(&state, &caller, account.company_id).await?;
    state.services.bank_accounts.delete(account_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Credit cards
// =========================================================================

async fn list_credit_cards(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(company_id): ApiPath<Uuid>,
) -> Data<Vec<CreditCard>> {
    require_company(&state, &caller, company_id).await?;
    Ok(ok(state.services.credit_cards.list_for_company(company_id).await?))
}

async fn create_credit_card(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiJson(card): ApiJson<NewCreditCard>,
) -> AppResult<Response> {
    require_company(&state, &caller, card.company_id).await?;
    Ok(created(state.services.credit_cards.create(card).await?))
}

async fn get_credit_card(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(card_id): ApiPath<Uuid>,
) -> Data<CreditCard> {
    let card = hide_missing(state.services.credit_cards.get_by_id(card_id).await)?;
    require_company(&state, &caller, card.company_id).await?;
    Ok(ok(card))
}

async fn update_credit_card(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(card_id): ApiPath<Uuid>,
    ApiJson(changes): ApiJson<CreditCardChanges>,
) -> Data<CreditCard> {
    let card = hide_missing(state.services.credit_cards.get_by_id(card_id).await)?;
    require_company(&state, &caller, card.company_id).await?;
    Ok(ok(state.services.credit_cards.update(card_id, changes).await?))
}

async fn delete_credit_card(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(card_id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    let card = hide_missing(state.services.credit_cards.get_by_id(card_id).await)?;
    require_company(&state, &caller, card.company_id).await?;
    state.services.credit_cards.delete(card_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Transactions and categories
// =========================================================================

async fn list_transactions(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(company_id): ApiPath<Uuid>,
    ApiQuery(filters): ApiQuery<TransactionFilters>,
) -> Data<Vec<Transaction>> {
    require_company(&state, &caller, company_id).await?;
    let transactions = state
        .services
        .transactions
        .list_for_company(company_id, &filters)
        .await?;
    Ok(ok(transactions))
}

async fn create_transaction(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiJson(transaction): ApiJson<NewTransaction>,
) -> AppResult<Response> {
    require_company(&state, &caller, transaction.company_id).await?;
    Ok(created(state.services.transactions.create(transaction).await?))
}

async fn get_transaction(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(transaction_id): ApiPath<Uuid>,
) -> Data<Transaction> {
    let transaction = hide_missing(state.services.transactions.get_by_id(transaction_id).await)?;
    require_company(&state, &caller, transaction.company_id).await?;
    Ok(ok(transaction))
}

async fn update_transaction(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(transaction_id): ApiPath<Uuid>,
    ApiJson(changes): ApiJson<TransactionChanges>,
) -> Data<Transaction> {
    let transaction = hide_missing(state.services.transactions.get_by_id(transaction_id).await)?;
    require_company(&state, &caller, transaction.company_id).await?;
    let updated = state
        .services
        .transactions
        .update(transaction_id, changes)
        .await?;
    Ok(ok(updated))
}

async fn delete_transaction(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(transaction_id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    let transaction = hide_missing(state.services.transactions.get_by_id(transaction_id).await)?;
    require_company(&state, &caller, transaction.company_id).await?;
    state.services.transactions.delete(transaction_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_categories(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(company_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> Data<Vec<Category>> {
    require_company(&state, &caller, company_id).await?;
    let categories = state
        .services
        .transactions
        .list_categories(company_id, query.kind)
        .await?;
    Ok(ok(categories))
}

async fn create_category(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiJson(category): ApiJson<NewCategory>,
) -> AppResult<Response> {
    // Shared categories are curated outside the API
    let company_id = category.company_id.ok_or_else(|| {
        AppError::from(DomainError::validation("empresa_id is required"))
    })?;
    require_company(&state, &caller, company_id).await?;
    Ok(created(state.services.transactions.create_category(category).await?))
}

// =========================================================================
// Reports
// =========================================================================

async fn get_summary(
    State(state): State<AppState>,
    Extension(caller): Extension<RequestUser>,
    ApiPath(company_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<SummaryQuery>,
) -> Data<FinancialSummary> {
    require_company(&state, &caller, company_id).await?;

    let month = query
        .month
        .unwrap_or_else(|| ReportMonth::of(Utc::now().date_naive()));
    let previous = query.previous_month.unwrap_or_else(|| month.previous());

    let summary = state
        .services
        .reports
        .financial_summary(company_id, month, previous)
        .await?;
    Ok(ok(summary))
}
