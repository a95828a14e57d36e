// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP-level behavior of the registry client

use assert_matches::assert_matches;
use httptest::all_of;
use httptest::matchers::contains;
use httptest::matchers::eq;
use httptest::matchers::json_decoded;
use httptest::matchers::not;
use httptest::matchers::request;
use httptest::matchers::url_decoded;
use httptest::responders::json_encoded;
use httptest::responders::status_code;
use httptest::Expectation;
use netbox_client::Client;
use netbox_client::ClientConfig;
use netbox_client::Error;
use netbox_client::ErrorClass;
use netbox_client::ListFilter;
use netbox_client::RegistryApi;
use serde_json::json;
use serde_json::Map;
use ssot_test_utils::dev::test_setup_log;
use ssot_types::dcim::Site;
use ssot_types::ObjectKind;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Binds the mock server to IPv4 loopback: registry and source URLs are
/// built as `host:port`, which doesn't work for a bare IPv6 address.
fn run_server() -> httptest::Server {
    httptest::ServerBuilder::new()
        .bind_addr(([127, 0, 0, 1], 0).into())
        .run()
        .unwrap()
}

fn config_for(server: &httptest::Server, token: &str) -> ClientConfig {
    ClientConfig {
        scheme: String::from("http"),
        hostname: server.addr().ip().to_string(),
        port: server.addr().port(),
        api_token: token.to_owned(),
        validate_cert: true,
        ca_file: None,
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_list_follows_next_links() {
    let logctx = test_setup_log("test_list_follows_next_links");
    let server = run_server();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/api/dcim/sites/"),
            request::query(url_decoded(contains(("limit", "0")))),
            request::query(url_decoded(contains(("tag", "netbox-ssot")))),
            request::query(url_decoded(not(contains(("offset", "2"))))),
            request::headers(contains(("authorization", "Token secret"))),
            request::headers(contains(("accept", "application/json"))),
        ])
        .respond_with(json_encoded(json!({
            "count": 3,
            // The registry believes it lives elsewhere.
            "next": "https://netbox.internal/api/dcim/sites/\
                     ?limit=0&offset=2&tag=netbox-ssot",
            "previous": null,
            "results": [
                {"id": 1, "name": "one", "slug": "one"},
                {"id": 2, "name": "two", "slug": "two"},
            ],
        }))),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/api/dcim/sites/"),
            request::query(url_decoded(contains(("offset", "2")))),
        ])
        .respond_with(json_encoded(json!({
            "count": 3,
            "next": null,
            "previous": null,
            "results": [{"id": 3, "name": "three", "slug": "three"}],
        }))),
    );

    let client = Client::new(
        &logctx.log,
        &config_for(&server, "secret"),
        CancellationToken::new(),
    )
    .unwrap();
    let sites: Vec<Site> = netbox_client::list_typed(
        &client,
        &ListFilter::new().tag("netbox-ssot"),
    )
    .await
    .unwrap();
    let names: Vec<&str> = sites.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["one", "two", "three"]);
    logctx.cleanup_successful();
}

#[tokio::test]
async fn test_v2_tokens_are_bearer_tokens() {
    let logctx = test_setup_log("test_v2_tokens_are_bearer_tokens");
    let server = run_server();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/api/extras/tags/"),
            request::headers(contains(("authorization", "Bearer nbt_abc.def"))),
        ])
        .respond_with(json_encoded(json!({"next": null, "results": []}))),
    );
    let client = Client::new(
        &logctx.log,
        &config_for(&server, "nbt_abc.def"),
        CancellationToken::new(),
    )
    .unwrap();
    let tags = client.list(ObjectKind::Tag, &ListFilter::new()).await.unwrap();
    assert!(tags.is_empty());
    logctx.cleanup_successful();
}

#[tokio::test]
async fn test_patch_sends_only_given_fields() {
    let logctx = test_setup_log("test_patch_sends_only_given_fields");
    let server = run_server();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("PATCH", "/api/dcim/interfaces/42/"),
            request::headers(contains(("content-type", "application/json"))),
            request::body(json_decoded(eq(json!({"tagged_vlans": [10, 20]})))),
        ])
        .respond_with(json_encoded(json!({
            "id": 42,
            "name": "eth0",
            "tagged_vlans": [{"id": 10}, {"id": 20}],
        }))),
    );
    let client = Client::new(
        &logctx.log,
        &config_for(&server, "secret"),
        CancellationToken::new(),
    )
    .unwrap();
    let mut body = Map::new();
    body.insert(String::from("tagged_vlans"), json!([10, 20]));
    let patched =
        client.patch(ObjectKind::Interface, 42, &body).await.unwrap();
    assert_eq!(patched["id"], 42);
    logctx.cleanup_successful();
}

#[tokio::test]
async fn test_create_and_delete() {
    let logctx = test_setup_log("test_create_and_delete");
    let server = run_server();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/api/tenancy/tenants/"),
            request::body(json_decoded(eq(json!({
                "name": "acme",
                "slug": "acme",
            })))),
        ])
        .respond_with(
            status_code(201)
                .insert_header("content-type", "application/json")
                .body(r#"{"id": 5, "name": "acme", "slug": "acme"}"#),
        ),
    );
    server.expect(
        Expectation::matching(request::method_path(
            "DELETE",
            "/api/tenancy/tenants/5/",
        ))
        .respond_with(status_code(204)),
    );
    let client = Client::new(
        &logctx.log,
        &config_for(&server, "secret"),
        CancellationToken::new(),
    )
    .unwrap();
    let created = client
        .create(ObjectKind::Tenant, &json!({"name": "acme", "slug": "acme"}))
        .await
        .unwrap();
    assert_eq!(created["id"], 5);
    client.delete(ObjectKind::Tenant, 5).await.unwrap();
    logctx.cleanup_successful();
}

#[tokio::test]
async fn test_error_classification() {
    let logctx = test_setup_log("test_error_classification");
    let server = run_server();
    server.expect(
        Expectation::matching(request::method_path("GET", "/api/dcim/sites/"))
            .respond_with(status_code(403).body(r#"{"detail": "no"}"#)),
    );
    server.expect(
        Expectation::matching(request::method_path(
            "POST",
            "/api/dcim/sites/",
        ))
        .respond_with(status_code(400).body(r#"{"slug": ["taken"]}"#)),
    );
    server.expect(
        Expectation::matching(request::method_path(
            "GET",
            "/api/dcim/devices/",
        ))
        .respond_with(status_code(200).body("<html>proxy error</html>")),
    );
    let client = Client::new(
        &logctx.log,
        &config_for(&server, "secret"),
        CancellationToken::new(),
    )
    .unwrap();

    let error =
        client.list(ObjectKind::Site, &ListFilter::new()).await.unwrap_err();
    assert_eq!(error.class(), ErrorClass::Auth);
    assert!(error.is_fatal());

    let error = client
        .create(ObjectKind::Site, &json!({"name": "x"}))
        .await
        .unwrap_err();
    assert_matches!(
        &error,
        Error::Status { body, .. } if body.contains("taken")
    );
    assert_eq!(error.class(), ErrorClass::Protocol);
    assert!(!error.is_fatal());

    let error =
        client.list(ObjectKind::Device, &ListFilter::new()).await.unwrap_err();
    assert_matches!(error, Error::Decode { .. });
    logctx.cleanup_successful();
}

#[tokio::test]
async fn test_unreachable_registry_is_transport_error() {
    let logctx = test_setup_log("test_unreachable_registry_is_transport_error");
    let server = run_server();
    let config = config_for(&server, "secret");
    drop(server);

    let client =
        Client::new(&logctx.log, &config, CancellationToken::new()).unwrap();
    let error =
        client.list(ObjectKind::Site, &ListFilter::new()).await.unwrap_err();
    assert_eq!(error.class(), ErrorClass::Transport);
    logctx.cleanup_successful();
}

#[tokio::test]
async fn test_cancelled_requests_fail_fast() {
    let logctx = test_setup_log("test_cancelled_requests_fail_fast");
    let server = run_server();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let client =
        Client::new(&logctx.log, &config_for(&server, "secret"), cancel)
            .unwrap();
    let error =
        client.list(ObjectKind::Site, &ListFilter::new()).await.unwrap_err();
    assert_matches!(error, Error::Cancelled);
    logctx.cleanup_successful();
}

#[tokio::test]
async fn test_missing_ca_file_is_config_error() {
    let logctx = test_setup_log("test_missing_ca_file_is_config_error");
    let dir = camino_tempfile::tempdir().unwrap();
    let config = ClientConfig {
        scheme: String::from("https"),
        hostname: String::from("netbox.example.com"),
        port: 443,
        api_token: String::from("secret"),
        validate_cert: true,
        ca_file: Some(dir.path().join("missing.pem")),
        timeout: Duration::from_secs(5),
    };
    let error = Client::new(&logctx.log, &config, CancellationToken::new())
        .err()
        .unwrap();
    assert_eq!(error.class(), ErrorClass::Config);
    logctx.cleanup_successful();
}
