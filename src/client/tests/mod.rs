//! Client tests against a mocked portal.

use std::time::Duration;

use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::client::{StorefrontApi, StorefrontClient};
use crate::config::{PortalConfig, RetryConfig};
use crate::error::{Error, SessionError};

const LOGIN_FORM_HTML: &str = r#"
<html><body>
<form method="post">
    <input type="hidden" name="SMAGENTNAME" value="agent-a1">
    <input type="hidden" name="target" value="/dashboard">
    USER: <input type="text" name="USER">
    Password: <input type="password" name="password">
</form>
</body></html>
"#;

/// A client pointed at the mock server, with retries effectively disabled
fn client_for(server: &MockServer) -> StorefrontClient {
    let portal = PortalConfig {
        base_url: server.uri(),
        login_page: format!("{}/forms/login.fcc", server.uri()),
        username: "buyer".into(),
        password: "secret".into(),
        account_number: None,
        page_size: 2,
        ..PortalConfig::default()
    };
    let retry = RetryConfig {
        max_attempts: 0,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    StorefrontClient::new(portal, retry).expect("client must build")
}

/// Mount everything a successful login needs except the form POST itself
async fn mount_login_pages(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("home"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/forms/login.fcc?TYPE=auth", server.uri())),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forms/login.fcc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_FORM_HTML))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/validate"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

/// Mount the full happy-path login flow
async fn mount_login_success(server: &MockServer) {
    mount_login_pages(server).await;
    Mock::given(method("POST"))
        .and(path("/forms/login.fcc"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/dashboard", server.uri())),
        )
        .mount(server)
        .await;
}

/// A logged-in client against a fresh mock portal
async fn logged_in_client() -> (MockServer, StorefrontClient) {
    let server = MockServer::start().await;
    mount_login_success(&server).await;
    let client = client_for(&server);
    client.login().await.expect("login must succeed");
    (server, client)
}

#[tokio::test]
async fn login_succeeds_and_marks_the_session_authenticated() {
    let server = MockServer::start().await;
    mount_login_pages(&server).await;
    // The POST must echo the hidden fields and the credentials.
    Mock::given(method("POST"))
        .and(path("/forms/login.fcc"))
        .and(body_string_contains("SMAGENTNAME=agent-a1"))
        .and(body_string_contains("USER=buyer"))
        .and(body_string_contains("password=secret"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/dashboard", server.uri())),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(!client.is_authenticated());
    client.login().await.expect("login must succeed");
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn rejected_credentials_surface_as_invalid_credentials() {
    let server = MockServer::start().await;
    mount_login_pages(&server).await;
    Mock::given(method("POST"))
        .and(path("/forms/login.fcc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Bad Login</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    match client.login().await {
        Err(Error::Session(SessionError::InvalidCredentials)) => {}
        other => panic!("expected InvalidCredentials, got {other:?}"),
    }
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn auth_redirect_to_the_wrong_page_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/outage.html", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/outage.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("back soon"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    match client.login().await {
        Err(Error::Session(SessionError::BadLoginRedirect { actual, .. })) => {
            assert!(actual.contains("outage.html"));
        }
        other => panic!("expected BadLoginRedirect, got {other:?}"),
    }
}

#[tokio::test]
async fn login_page_without_a_form_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/forms/login.fcc", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forms/login.fcc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>no form here</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    match client.login().await {
        Err(Error::Session(SessionError::LoginFormNotFound { .. })) => {}
        other => panic!("expected LoginFormNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn requests_before_login_fail_without_touching_the_network() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    match client.search("oats").await {
        Err(Error::Session(SessionError::NotAuthenticated)) => {}
        other => panic!("expected NotAuthenticated, got {other:?}"),
    }
    assert!(
        server.received_requests().await.unwrap_or_default().is_empty(),
        "the authentication guard must reject before any request is sent"
    );
}

#[tokio::test]
async fn search_follows_pagination_and_merges_hits() {
    let (server, client) = logged_in_client().await;

    let page0 = serde_json::json!({
        "totalHits": 3, "pageNumber": 0, "pageSize": 2,
        "items": [
            {"itemNumber": "10001", "brand": "Acme", "description": "Rolled Oats"},
            {"itemNumber": "10002", "brand": "Acme", "description": "Steel Cut Oats"}
        ]
    });
    let page1 = serde_json::json!({
        "totalHits": 3, "pageNumber": 1, "pageSize": 2,
        "items": [
            {"itemNumber": "10003", "brand": "Orchard", "description": "Granola"}
        ]
    });
    Mock::given(method("GET"))
        .and(path("/api/shopping/products"))
        .and(query_param("pageNumber", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page0))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/shopping/products"))
        .and(query_param("pageNumber", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page1))
        .expect(1)
        .mount(&server)
        .await;

    let page = client.search("oats granola").await.expect("search");

    assert_eq!(page.query, "oats granola");
    assert_eq!(page.total_hits, 3);
    assert_eq!(page.hits.len(), 3);
    assert_eq!(page.hits[2].product_number, "10003");
}

#[tokio::test]
async fn single_page_searches_fetch_exactly_one_page() {
    let (server, client) = logged_in_client().await;

    let only_page = serde_json::json!({
        "totalHits": 1, "pageNumber": 0, "pageSize": 2,
        "items": [{"itemNumber": "10001", "brand": "Acme", "description": "Rolled Oats"}]
    });
    Mock::given(method("GET"))
        .and(path("/api/shopping/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(only_page))
        .expect(1)
        .mount(&server)
        .await;

    let page = client.search("oats").await.expect("search");
    assert_eq!(page.hits.len(), 1);
}

#[tokio::test]
async fn product_detail_maps_vendor_json() {
    let (server, client) = logged_in_client().await;

    let detail = serde_json::json!({
        "itemNumber": "10001", "upc": "036000291452", "brand": "Acme",
        "description": "Rolled Oats", "pack": 12, "size": "16 OZ",
        "organic": true,
        "pricing": {"netPrice": 24.5, "netUnitPrice": 2.04}
    });
    Mock::given(method("GET"))
        .and(path("/api/shopping/products/10001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail))
        .mount(&server)
        .await;

    let record = client.product("10001").await.expect("product fetch");
    assert_eq!(record.product_number, "10001");
    assert!(record.organic);
    assert_eq!(record.pricing.as_ref().map(|p| p.case_price), Some(24.5));
}

#[tokio::test]
async fn server_errors_surface_the_status_and_endpoint() {
    let (server, client) = logged_in_client().await;

    Mock::given(method("GET"))
        .and(path("/api/shopping/products/10001"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    match client.product("10001").await {
        Err(Error::Portal { status, endpoint }) => {
            assert_eq!(status, 500);
            assert_eq!(endpoint, "/api/shopping/products/10001");
        }
        other => panic!("expected Portal error, got {other:?}"),
    }
}

#[tokio::test]
async fn expired_sessions_demote_the_client_to_unauthenticated() {
    let (server, client) = logged_in_client().await;

    Mock::given(method("GET"))
        .and(path("/api/shopping/products/10001"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    match client.product("10001").await {
        Err(Error::Session(SessionError::NotAuthenticated)) => {}
        other => panic!("expected NotAuthenticated, got {other:?}"),
    }
    assert!(
        !client.is_authenticated(),
        "a 401 must clear the authenticated flag so callers re-login"
    );
}

#[tokio::test]
async fn malformed_payloads_surface_as_unexpected_response() {
    let (server, client) = logged_in_client().await;

    Mock::given(method("GET"))
        .and(path("/api/shopping/products/10001"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    match client.product("10001").await {
        Err(Error::Session(SessionError::UnexpectedResponse { endpoint, .. })) => {
            assert_eq!(endpoint, "/api/shopping/products/10001");
        }
        other => panic!("expected UnexpectedResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn invoices_follow_pagination() {
    let (server, client) = logged_in_client().await;

    let page0 = serde_json::json!({
        "totalCount": 3, "pageNumber": 0, "pageSize": 2,
        "invoices": [
            {"invoiceNumber": "INV-1", "totalAmount": 10.0},
            {"invoiceNumber": "INV-2", "totalAmount": 20.0}
        ]
    });
    let page1 = serde_json::json!({
        "totalCount": 3, "pageNumber": 1, "pageSize": 2,
        "invoices": [{"invoiceNumber": "INV-3", "totalAmount": 30.0}]
    });
    Mock::given(method("GET"))
        .and(path("/api/shopping/invoices"))
        .and(query_param("pageNumber", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page0))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/shopping/invoices"))
        .and(query_param("pageNumber", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page1))
        .mount(&server)
        .await;

    let list = client.invoices().await.expect("invoice list");
    assert_eq!(list.invoices.len(), 3);
    assert_eq!(list.invoices[2].invoice_number, "INV-3");
}

#[tokio::test]
async fn open_orders_deserialize_from_the_envelope() {
    let (server, client) = logged_in_client().await;

    let body = serde_json::json!({
        "openOrders": [
            {"orderNumber": "SO-500", "items": [
                {"lineNumber": 1, "itemNumber": "10001", "quantityOrdered": 5, "quantityShipped": 0}
            ]}
        ]
    });
    Mock::given(method("GET"))
        .and(path("/api/shopping/orders/open-orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let orders = client.open_orders().await.expect("open orders");
    assert_eq!(orders.open_orders.len(), 1);
    assert_eq!(orders.open_orders[0].lines[0].quantity_ordered, 5);
}

#[tokio::test]
async fn transient_portal_errors_are_retried() {
    let server = MockServer::start().await;
    mount_login_success(&server).await;
    let portal = PortalConfig {
        base_url: server.uri(),
        login_page: format!("{}/forms/login.fcc", server.uri()),
        username: "buyer".into(),
        password: "secret".into(),
        page_size: 2,
        ..PortalConfig::default()
    };
    let retry = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    let client = StorefrontClient::new(portal, retry).expect("client must build");
    client.login().await.expect("login");

    // Two failures, then success: up_to_n_times makes the 503 mock expire.
    Mock::given(method("GET"))
        .and(path("/api/shopping/products/10001"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    let detail = serde_json::json!({"itemNumber": "10001", "brand": "Acme", "description": "Oats"});
    Mock::given(method("GET"))
        .and(path("/api/shopping/products/10001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail))
        .mount(&server)
        .await;

    let record = client.product("10001").await.expect("retries should recover");
    assert_eq!(record.product_number, "10001");
}
