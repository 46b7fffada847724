//! API Integration Tests

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use beeconta::backend::tables;
use beeconta::domain::PERMISSION_DENIED_MESSAGE;

mod common;

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().unwrap(),
        other => other.to_string().parse().unwrap(),
    }
}

#[tokio::test]
async fn test_health_check_needs_no_token() {
    let app = common::setup();

    let (status, body) = app.send(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("OK"));
}

#[tokio::test]
async fn test_protected_route_without_token_is_rejected() {
    let app = common::setup();

    let (status, body) = app.send(Method::GET, "/api/v1/me", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthenticated");
    assert!(body.get("data").is_none());

    let (status, _) = app.get("/api/v1/me", "not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_login_and_profile() {
    let app = common::setup();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "email": "ana@example.com",
                "password": "secret",
                "nome": "Ana",
                "sobrenome": "Lima"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    assert_eq!(body["data"]["user_metadata"]["nome_exibicao"], "Ana Lima");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({"email": "ana@example.com", "password": "secret"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    // No profile row yet, so the auth metadata is used
    let (status, body) = app.get("/api/v1/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nome"], "Ana");
    assert_eq!(body["data"]["email"], "ana@example.com");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({"email": "ana@example.com", "password": "wrong"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "auth_rejected");
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = common::setup();
    let (_, token) = app.sign_in("bia@example.com");

    let (status, _) = app.get("/api/v1/me/session", &token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(Method::POST, "/api/v1/auth/logout", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = app.get("/api/v1/me/session", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_google_authorize_url_defaults_to_dashboard() {
    let app = common::setup();

    let (status, body) = app
        .send(Method::GET, "/api/v1/auth/google", None, None)
        .await;

    assert_eq!(status, StatusCode::OK);
    let url = body["data"]["url"].as_str().unwrap();
    assert!(url.contains("provider=google"));
    assert!(url.contains("http://localhost:3000/dashboard"));
}

#[tokio::test]
async fn test_company_lifecycle_and_permissions() {
    let app = common::setup();
    let (_, owner) = app.sign_in("owner@example.com");
    let (_, stranger) = app.sign_in("stranger@example.com");

    let (status, body) = app
        .post(
            "/api/v1/companies",
            &owner,
            json!({"nome": "Acme Ltda", "cnpj_cpf": "12345678000190", "tipo_documento": "CNPJ"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
    assert_eq!(body["data"]["status"], "ativo");
    let company_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app.get("/api/v1/me/companies", &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let uri = format!("/api/v1/companies/{}", company_id);
    let (status, body) = app.get(&uri, &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nome"], "Acme Ltda");

    // Outsiders get the uniform permission error
    let (status, body) = app.get(&uri, &stranger).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], PERMISSION_DENIED_MESSAGE);

    let (status, body) = app
        .send(Method::PATCH, &uri, Some(&stranger), Some(json!({"nome": "Hijacked"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "permission_denied");
    assert_eq!(app.db.rows(tables::COMPANIES)[0]["nome"], "Acme Ltda");

    let (status, body) = app
        .send(Method::PATCH, &uri, Some(&owner), Some(json!({"nome_fantasia": "Acme"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nome_fantasia"], "Acme");

    // Soft delete: the row stays, the company leaves the reachable set
    let (status, _) = app.send(Method::DELETE, &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.db.rows(tables::COMPANIES)[0]["status"], "inativo");

    let (_, body) = app.get("/api/v1/me/companies", &owner).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_body_keeps_the_error_envelope() {
    let app = common::setup();
    let (_, token) = app.sign_in("carla@example.com");

    let (status, body) = app.post("/api/v1/companies", &token, json!({})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");

    let (status, body) = app.get("/api/v1/companies/not-a-uuid", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn test_active_company_switch_is_stored() {
    let app = common::setup();
    let (user_id, token) = app.sign_in("davi@example.com");
    let first = app.seed_company(user_id, "Primeira", "ADMIN");
    let second = app.seed_company(user_id, "Segunda", "EDITOR");

    let (status, body) = app.get("/api/v1/me/session", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["empresa_ativa"]["id"], json!(first));
    assert_eq!(body["data"]["empresas"].as_array().unwrap().len(), 2);

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/v1/me/active-company",
            Some(&token),
            Some(json!({"empresa_id": second})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nome"], "Segunda");

    let (_, body) = app.get("/api/v1/me/session", &token).await;
    assert_eq!(body["data"]["empresa_ativa"]["id"], json!(second));

    let profile = app
        .db
        .rows(tables::USERS)
        .into_iter()
        .find(|row| row["id"] == json!(user_id))
        .unwrap();
    assert_eq!(profile["empresa_padrao_id"], json!(second));

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/v1/me/active-company",
            Some(&token),
            Some(json!({"empresa_id": Uuid::new_v4()})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "company_unavailable");
}

#[tokio::test]
async fn test_group_membership_extends_reach() {
    let app = common::setup();
    let (owner_id, owner) = app.sign_in("owner@example.com");
    let (member_id, member) = app.sign_in("member@example.com");
    let company = app.seed_company(owner_id, "Filial", "ADMIN");

    let (status, body) = app
        .post("/api/v1/groups", &owner, json!({"nome": "Holding"}))
        .await;
    assert_eq!(status, StatusCode::CREATED, "group create failed: {}", body);
    let group_id = body["data"]["id"].as_str().unwrap().to_string();

    let companies_uri = format!("/api/v1/groups/{}/companies", group_id);

    // Not a member yet
    let (status, _) = app.get(&companies_uri, &member).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .post(&companies_uri, &member, json!({"empresa_id": company}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(
            &companies_uri,
            &owner,
            json!({"empresa_id": company, "empresa_principal": true}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "add company failed: {}", body);
    assert_eq!(body["data"]["empresa_principal"], true);

    app.db.seed(
        tables::GROUP_ACCESS,
        vec![json!({
            "usuario_id": member_id,
            "grupo_id": group_id,
            "nivel_acesso": "VISUALIZADOR",
            "status": "ativo"
        })],
    );

    let (status, body) = app.get(&companies_uri, &member).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["empresa"]["nome"], "Filial");

    let (status, body) = app.get(&format!("/api/v1/companies/{}", company), &member).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nome"], "Filial");

    // Viewers cannot rename the group
    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("/api/v1/groups/{}", group_id),
            Some(&member),
            Some(json!({"nome": "Outra"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_bank_account_soft_delete() {
    let app = common::setup();
    let (user_id, token) = app.sign_in("eva@example.com");
    let company = app.seed_company(user_id, "Loja", "ADMIN");
    let (bank, currency) = (Uuid::new_v4(), Uuid::new_v4());
    app.db.seed(
        tables::BANKS,
        vec![json!({"id": bank, "codigo": "001", "nome": "Banco do Brasil", "status": "ativo"})],
    );
    app.db.seed(
        tables::CURRENCIES,
        vec![json!({"id": currency, "codigo": "BRL", "nome": "Real", "simbolo": "R$", "status": "ativa"})],
    );

    let (status, body) = app
        .post(
            "/api/v1/bank-accounts",
            &token,
            json!({
                "empresa_id": company,
                "banco_id": bank,
                "agencia": "1234",
                "conta": "56789",
                "tipo_conta": "CORRENTE",
                "descricao": "Conta principal",
                "saldo_inicial": "250.00",
                "data_saldo_inicial": "2024-01-01",
                "moeda_id": currency
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
    assert_eq!(body["data"]["status"], "ativa");
    let account_id = body["data"]["id"].as_str().unwrap().to_string();

    let list_uri = format!("/api/v1/companies/{}/bank-accounts", company);
    let (_, body) = app.get(&list_uri, &token).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let account_uri = format!("/api/v1/bank-accounts/{}", account_id);
    let (status, _) = app.send(Method::DELETE, &account_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app.get(&list_uri, &token).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, body) = app.get(&account_uri, &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "encerrada");
}

#[tokio::test]
async fn test_financial_summary_endpoint() {
    let app = common::setup();
    let (user_id, token) = app.sign_in("fabio@example.com");
    let company = app.seed_company(user_id, "Consultoria", "ADMIN");
    app.db.seed(
        tables::BANK_ACCOUNTS,
        vec![
            json!({"id": Uuid::new_v4(), "empresa_id": company, "saldo_inicial": "1000.00", "status": "ativa"}),
            json!({"id": Uuid::new_v4(), "empresa_id": company, "saldo_inicial": "500.50", "status": "ativa"}),
        ],
    );
    let movement = |kind: &str, amount: &str, on: &str| {
        json!({
            "id": Uuid::new_v4(),
            "empresa_id": company,
            "tipo": kind,
            "descricao": "lancamento",
            "valor": amount,
            "data_transacao": on,
            "status": "efetivada"
        })
    };
    app.db.seed(
        tables::TRANSACTIONS,
        vec![
            movement("RECEITA", "300", "2024-05-10"),
            movement("DESPESA", "120", "2024-05-31"),
            movement("RECEITA", "200", "2024-04-15"),
            movement("DESPESA", "100", "2024-04-01"),
        ],
    );

    let uri = format!(
        "/api/v1/companies/{}/summary?mes=2024-05&mes_anterior=2024-04",
        company
    );
    let (status, body) = app.get(&uri, &token).await;

    assert_eq!(status, StatusCode::OK, "summary failed: {}", body);
    let summary = &body["data"];
    assert_eq!(decimal(&summary["saldo_total"]), dec!(1500.50));
    assert_eq!(decimal(&summary["receitas_mes_atual"]), dec!(300));
    assert_eq!(decimal(&summary["despesas_mes_atual"]), dec!(120));
    assert_eq!(decimal(&summary["saldo_mes_anterior"]), dec!(100));
    assert_eq!(decimal(&summary["variacao_receitas"]), dec!(50));

    let (status, body) = app
        .get(
            &format!("/api/v1/companies/{}/summary?mes=2024-13", company),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn test_responses_carry_a_request_id() {
    let app = common::setup();

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");
}

#[tokio::test]
async fn test_empty_patch_is_a_validation_error() {
    let app = common::setup();
    let (user_id, token) = app.sign_in("gil@example.com");
    let company = app.seed_company(user_id, "Padaria", "ADMIN");

    let uri = format!("/api/v1/companies/{}", company);
    let (status, body) = app.send(Method::PATCH, &uri, Some(&token), Some(json!({}))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "validation_failed");
    assert_eq!(app.db.rows(tables::COMPANIES)[0]["nome"], "Padaria");

    let (status, body) = app
        .post("/api/v1/groups", &token, json!({"nome": "Rede"}))
        .await;
    assert_eq!(status, StatusCode::CREATED, "group create failed: {}", body);
    let group_uri = format!("/api/v1/groups/{}", body["data"]["id"].as_str().unwrap());
    let (status, _) = app
        .send(Method::PATCH, &group_uri, Some(&token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_profile_default_company_reaches_the_session() {
    let app = common::setup();
    let (user_id, token) = app.sign_in("helena@example.com");
    let first = app.seed_company(user_id, "Primeira", "ADMIN");
    let second = app.seed_company(user_id, "Segunda", "ADMIN");

    let (_, body) = app.get("/api/v1/me/session", &token).await;
    assert_eq!(body["data"]["empresa_ativa"]["id"], json!(first));

    let (status, body) = app
        .send(
            Method::PATCH,
            "/api/v1/me",
            Some(&token),
            Some(json!({"empresa_padrao_id": second})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "profile update failed: {}", body);

    let (_, body) = app.get("/api/v1/me/session", &token).await;
    assert_eq!(body["data"]["usuario"]["empresa_padrao_id"], json!(second));
    assert_eq!(body["data"]["usuario"]["email"], "helena@example.com");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({"email": "helena@example.com", "password": "secret"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/api/v1/me/session", &token).await;
    assert_eq!(body["data"]["empresa_ativa"]["id"], json!(second));
}

#[tokio::test]
async fn test_missing_and_foreign_records_answer_alike() {
    let app = common::setup();
    let (owner_id, owner) = app.sign_in("ines@example.com");
    let (_, stranger) = app.sign_in("joao@example.com");
    let company = app.seed_company(owner_id, "Oficina", "ADMIN");
    let account = Uuid::new_v4();
    app.db.seed(
        tables::BANK_ACCOUNTS,
        vec![json!({
            "id": account,
            "empresa_id": company,
            "banco_id": Uuid::new_v4(),
            "agencia": "0001",
            "conta": "12345",
            "tipo_conta": "CORRENTE",
            "descricao": "Caixa",
            "saldo_inicial": "0",
            "data_saldo_inicial": "2024-01-01",
            "moeda_id": Uuid::new_v4(),
            "status": "ativa"
        })],
    );

    let (status, body) = app.get(&format!("/api/v1/bank-accounts/{}", account), &owner).await;
    assert_eq!(status, StatusCode::OK, "owner read failed: {}", body);

    let existing = format!("/api/v1/bank-accounts/{}", account);
    let missing = format!("/api/v1/bank-accounts/{}", Uuid::new_v4());

    let (status, foreign) = app.get(&existing, &stranger).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, absent) = app.get(&missing, &stranger).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(foreign, absent);

    for uri in [
        format!("/api/v1/credit-cards/{}", Uuid::new_v4()),
        format!("/api/v1/transactions/{}", Uuid::new_v4()),
    ] {
        let (status, body) = app.send(Method::DELETE, &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["message"], PERMISSION_DENIED_MESSAGE);
    }
}

#[tokio::test]
async fn test_transaction_rejects_another_companys_account() {
    let app = common::setup();
    let (user_id, token) = app.sign_in("karla@example.com");
    let mine = app.seed_company(user_id, "Minha", "ADMIN");
    let theirs = app.seed_company(user_id, "Outra", "ADMIN");
    let account = Uuid::new_v4();
    app.db.seed(
        tables::BANK_ACCOUNTS,
        vec![json!({"id": account, "empresa_id": theirs, "saldo_inicial": "0", "status": "ativa"})],
    );

    let (status, body) = app
        .post(
            "/api/v1/transactions",
            &token,
            json!({
                "empresa_id": mine,
                "tipo": "DESPESA",
                "descricao": "Material",
                "valor": "80.00",
                "data_transacao": "2024-06-03",
                "conta_bancaria_id": account
            }),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "unexpected: {}", body);
    assert_eq!(body["error"]["code"], "validation_failed");
    assert!(app.db.rows(tables::TRANSACTIONS).is_empty());
}
