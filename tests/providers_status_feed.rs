// tests/providers_status_feed.rs
//
// StatusFeed backend over the fixture transport: request shape, decoding,
// rate-limit detection, update/delete forms and session handling.

use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use social_poller::error::ReadError;
use social_poller::ingest::providers::transport::Method;
use social_poller::ingest::providers::{FixtureTransport, PathKind, Response, StatusFeedFactory};
use social_poller::ingest::session::SessionCapability;
use social_poller::ingest::types::{Credentials, Headers, Params, PathFactory};

const TIMELINE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<statuses type="array">
  <status><id>101</id><text>first</text></status>
  <status><id>102</id><text>second</text></status>
</statuses>"#;

const STATUS: &str = "<status><id>555</id><text>posted</text></status>";

fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[tokio::test]
async fn public_timeline_sends_cursor_and_decodes_xml() {
    let fx = FixtureTransport::new();
    fx.push(Response::ok(TIMELINE));
    let path = StatusFeedFactory::fixture(PathKind::Public, fx.clone())
        .create()
        .unwrap();

    let mut params = Params::new();
    params.insert("count".into(), json!(2));
    let ids: Vec<String> = path
        .read_data(Some("100"), &params)
        .await
        .unwrap()
        .map(|i| i.id)
        .collect();
    assert_eq!(ids, ["101", "102"]);

    let req = fx.last_request().unwrap();
    assert_eq!(req.method, Method::Get);
    assert!(req.url.ends_with("statuses/public_timeline.xml"), "{}", req.url);
    assert_eq!(param(&req.params, "since_id"), Some("100"));
    assert_eq!(param(&req.params, "count"), Some("2"));
    assert_eq!(req.authorization, None);
}

#[tokio::test]
async fn search_reads_json_results_and_forwards_query() {
    let fx = FixtureTransport::new();
    fx.push(Response::ok(r#"{"results":[{"id_str":"9","text":"rust"}]}"#));
    fx.push(Response::ok(r#"{"error":"bad query"}"#));
    let path = StatusFeedFactory::fixture(PathKind::Search, fx.clone())
        .create()
        .unwrap();

    let mut params = Params::new();
    params.insert("q".into(), json!("rust"));
    let items: Vec<_> = path.read_data(None, &params).await.unwrap().collect();
    assert_eq!(items[0].id, "9");
    assert_eq!(items[0].payload["text"], json!("rust"));

    let req = fx.last_request().unwrap();
    assert!(req.url.ends_with("search.json"));
    assert_eq!(param(&req.params, "q"), Some("rust"));

    let err = path.read_data(None, &params).await.err().unwrap();
    assert!(matches!(err, ReadError::Fetch(_)));
}

#[tokio::test]
async fn exhausted_quota_maps_to_rate_limit() {
    let reset = Utc::now().timestamp() + 120;
    let fx = FixtureTransport::new();
    fx.push(
        Response::new(400, "slow down")
            .with_header("X-RateLimit-Remaining", "0")
            .with_header("X-RateLimit-Reset", &reset.to_string()),
    );
    fx.push(Response::new(400, "slow down").with_header("X-RateLimit-Remaining", "0"));
    fx.push(Response::new(502, "bad gateway"));
    let path = StatusFeedFactory::fixture(PathKind::Public, fx).create().unwrap();

    match path.read_data(None, &Params::new()).await {
        Err(ReadError::RateLimited(sig)) => {
            assert!(sig.wait <= Duration::from_secs(120));
            assert!(sig.wait >= Duration::from_secs(110));
        }
        other => panic!("expected rate limit, got {:?}", other.err()),
    }

    // no reset header: remainder of the hour since the first read
    match path.read_data(None, &Params::new()).await {
        Err(ReadError::RateLimited(sig)) => {
            assert!(sig.wait <= Duration::from_secs(3600));
            assert!(sig.wait >= Duration::from_secs(3590));
        }
        other => panic!("expected rate limit, got {:?}", other.err()),
    }

    let err = path.read_data(None, &Params::new()).await.err().unwrap();
    assert!(matches!(err, ReadError::Fetch(_)));
}

#[tokio::test]
async fn update_posts_form_and_parses_status() {
    let fx = FixtureTransport::new();
    fx.push(Response::ok(STATUS));
    fx.push(Response::new(403, "duplicate"));
    let path = StatusFeedFactory::fixture(PathKind::Update, fx.clone())
        .create()
        .unwrap();

    let mut headers = Headers::new();
    headers.insert("in_reply_to_status_id".into(), json!("42"));
    headers.insert("lat".into(), json!(50.08));
    headers.insert("ignored".into(), json!("nope"));

    let item = path
        .update_data(&json!("hello world"), &headers)
        .await
        .unwrap()
        .expect("accepted");
    assert_eq!(item.id, "555");

    let req = fx.last_request().unwrap();
    assert_eq!(req.method, Method::Post);
    assert!(req.url.ends_with("statuses/update.xml"));
    assert_eq!(param(&req.params, "status"), Some("hello world"));
    assert_eq!(param(&req.params, "in_reply_to_status_id"), Some("42"));
    assert_eq!(param(&req.params, "lat"), Some("50.08"));
    assert_eq!(param(&req.params, "trim_user"), Some("1"));
    assert_eq!(param(&req.params, "ignored"), None);

    let rejected = path.update_data(&json!("hello world"), &headers).await.unwrap();
    assert!(rejected.is_none());
}

#[tokio::test]
async fn delete_targets_status_id_from_header() {
    let fx = FixtureTransport::new();
    fx.push(Response::ok(STATUS));
    let path = StatusFeedFactory::fixture(PathKind::Delete, fx.clone())
        .create()
        .unwrap();

    let mut headers = Headers::new();
    headers.insert("data_id".into(), json!("555"));
    headers.insert("lat".into(), json!(1));
    path.update_data(&json!(""), &headers).await.unwrap();

    let req = fx.last_request().unwrap();
    assert!(req.url.ends_with("statuses/destroy/555.xml"), "{}", req.url);
    assert_eq!(param(&req.params, "lat"), None);

    assert!(path.update_data(&json!(""), &Headers::new()).await.is_err());
}

#[tokio::test]
async fn update_only_paths_read_nothing() {
    let fx = FixtureTransport::new();
    for kind in [PathKind::Update, PathKind::Delete] {
        let path = StatusFeedFactory::fixture(kind, fx.clone()).create().unwrap();
        assert_eq!(path.read_data(None, &Params::new()).await.unwrap().count(), 0);
    }
    assert!(fx.requests().is_empty());
}

#[tokio::test]
async fn session_authorizes_requests_until_ended() {
    let fx = FixtureTransport::new();
    fx.push(Response::ok(TIMELINE));
    fx.push(Response::ok(TIMELINE));
    let path = StatusFeedFactory::fixture(PathKind::Home, fx.clone())
        .create()
        .unwrap();
    let cap = SessionCapability::of(path.as_ref());
    assert!(cap.is_auth_required());

    {
        let guard = cap
            .open(&Credentials::new("ck", "cs"), &Credentials::new("ut", "us"))
            .unwrap();
        assert!(guard.is_active());
        path.read_data(None, &Params::new()).await.unwrap();
    }
    assert!(!cap.is_session_active());
    path.read_data(None, &Params::new()).await.unwrap();

    let reqs = fx.requests();
    let auth = reqs[0].authorization.as_deref().unwrap();
    assert!(auth.contains(r#"oauth_consumer_key="ck""#));
    assert!(auth.contains(r#"oauth_token="ut""#));
    assert!(!auth.contains("cs"), "secret is not sent");
    assert_eq!(reqs[1].authorization, None);
}

#[test]
fn malformed_credentials_are_rejected() {
    let fx = FixtureTransport::new();
    let path = StatusFeedFactory::fixture(PathKind::Home, fx).create().unwrap();
    let cap = SessionCapability::of(path.as_ref());

    assert!(cap
        .init_session(&Credentials::new("", "cs"), &Credentials::new("ut", "us"))
        .is_err());
    assert!(cap
        .init_session(&Credentials::new("ck", "cs"), &Credentials::new("ut", "bad\nsecret"))
        .is_err());
    assert!(!cap.is_session_active());
}
