//! Supabase ledger tests against a mock PostgREST server

use serde_json::json;
use webserver::config::SupabaseConfig;
use webserver::{SupabaseLedger, UsageLedger, UserAccount, WebServerError};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ledger(server: &MockServer) -> SupabaseLedger {
    SupabaseLedger::new(&SupabaseConfig {
        url: format!("{}/", server.uri()),
        service_key: "service-key".into(),
    })
    .unwrap()
}

#[tokio::test]
async fn test_find_account_queries_users_by_email() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("email", "eq.jan@example.com"))
        .and(query_param("select", "*"))
        .and(header("apikey", "service-key"))
        .and(header("authorization", "Bearer service-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"email": "jan@example.com", "plan": "gold", "usage_count": 4, "usage_limit": 10, "created_at": "2024-01-01"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let account = ledger(&server).find_account("jan@example.com").await.unwrap().unwrap();

    assert_eq!(account.plan.as_deref(), Some("gold"));
    assert_eq!(account.usage_count, 4);
    assert_eq!(account.remaining_after_use(), Some(5));
}

#[tokio::test]
async fn test_unknown_email_has_no_account() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    assert!(ledger(&server).find_account("ghost@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_record_usage_increments_count() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(query_param("email", "eq.jan@example.com"))
        .and(header("apikey", "service-key"))
        .and(body_partial_json(json!({ "usage_count": 5 })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let account = UserAccount {
        email: "jan@example.com".into(),
        plan: Some("gold".into()),
        usage_count: 4,
        usage_limit: Some(10),
    };
    ledger(&server).record_usage(&account).await.unwrap();
}

#[tokio::test]
async fn test_error_status_is_a_ledger_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let err = ledger(&server).find_account("jan@example.com").await.unwrap_err();

    match err {
        WebServerError::Ledger { message } => {
            assert!(message.contains("401"));
            assert!(message.contains("invalid api key"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
