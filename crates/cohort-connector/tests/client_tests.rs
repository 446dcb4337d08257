//! Integration tests for the roster feed client using wiremock.
//!
//! Cover both feed shapes, authentication header plumbing, the retry
//! ceiling against a persistently failing endpoint, no-retry behavior
//! on permanent errors, and both malformed-payload policies.

use serde_json::json;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cohort_connector::{FeedAuth, FeedConfig, FeedSchema, RosterFeedClient, RosterSource};
use cohort_connector::FeedError;
use cohort_core::OrgUnitId;

/// Config pointed at the mock server with no retry delays, so failing
/// tests don't sleep.
fn fast_config(base_url: &str) -> FeedConfig {
    let mut config = FeedConfig::new(base_url);
    config.retry_delays_secs = vec![0, 0];
    config
}

#[tokio::test]
async fn test_fetch_paged_objects_roster() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/481236/classlist/paged"))
        .and(query_param("_format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            [
                {"username": "abc123", "user_id": 1, "role": {"id": 107}},
                {"username": "def456", "user_id": 2, "role": {"id": 117}}
            ]
        ])))
        .mount(&server)
        .await;

    let client = RosterFeedClient::new(fast_config(&server.uri())).unwrap();
    let roster = client.fetch_roster(&OrgUnitId::new("481236")).await.unwrap();

    assert_eq!(roster.len(), 2);
    assert_eq!(roster[0].username, "abc123");
    assert_eq!(roster[1].role_id, 117);
}

#[tokio::test]
async fn test_fetch_flat_records_roster() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/OU9/classlist/paged"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "Email": "abc123@example.edu",
                "OrgDefinedId": "OU9",
                "Identifier": "169",
                "Username": "abc123",
                "RoleId": 107
            }
        ])))
        .mount(&server)
        .await;

    let mut config = fast_config(&server.uri());
    config.api_version = "v2".to_string();
    config.schema = FeedSchema::FlatRecords;
    let client = RosterFeedClient::new(config).unwrap();

    let roster = client.fetch_roster(&OrgUnitId::new("OU9")).await.unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].email.as_deref(), Some("abc123@example.edu"));
}

#[tokio::test]
async fn test_basic_auth_header_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header_exists("Authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = fast_config(&server.uri());
    config.auth = FeedAuth::Basic {
        username: "svc-lms".to_string(),
        password: "pw".to_string(),
    };
    let client = RosterFeedClient::new(config).unwrap();

    client.fetch_roster(&OrgUnitId::new("1")).await.unwrap();
}

#[tokio::test]
async fn test_key_pair_auth_headers_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("X-App-Id", "app-1"))
        .and(header("X-App-Key", "key-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = fast_config(&server.uri());
    config.auth = FeedAuth::KeyPair {
        app_id: "app-1".to_string(),
        app_key: "key-1".to_string(),
    };
    let client = RosterFeedClient::new(config).unwrap();

    client.fetch_roster(&OrgUnitId::new("1")).await.unwrap();
}

#[tokio::test]
async fn test_retry_ceiling_on_persistent_server_error() {
    let server = MockServer::start().await;

    // Exactly three attempts against a permanently failing endpoint,
    // then a Failure value rather than a panic.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = RosterFeedClient::new(fast_config(&server.uri())).unwrap();
    let err = client
        .fetch_roster(&OrgUnitId::new("1"))
        .await
        .unwrap_err();

    match err {
        FeedError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, FeedError::Upstream { status: 503 }));
        }
        other => panic!("expected RetriesExhausted, got {other}"),
    }
}

#[tokio::test]
async fn test_transient_failure_then_recovery() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"username": "abc123", "user_id": 1, "role": {"id": 107}}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = RosterFeedClient::new(fast_config(&server.uri())).unwrap();
    let roster = client.fetch_roster(&OrgUnitId::new("1")).await.unwrap();
    assert_eq!(roster.len(), 1);
}

#[tokio::test]
async fn test_connection_refused_is_transient() {
    // Bind a port, then free it so the connection is refused.
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = RosterFeedClient::new(fast_config(&uri)).unwrap();
    let err = client
        .fetch_roster(&OrgUnitId::new("1"))
        .await
        .unwrap_err();

    match err {
        FeedError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, FeedError::Connection { .. }));
        }
        other => panic!("expected RetriesExhausted, got {other}"),
    }
}

#[tokio::test]
async fn test_permanent_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = RosterFeedClient::new(fast_config(&server.uri())).unwrap();
    let err = client
        .fetch_roster(&OrgUnitId::new("1"))
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::Rejected { status: 404 }));
}

#[tokio::test]
async fn test_auth_rejection_is_permanent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = RosterFeedClient::new(fast_config(&server.uri())).unwrap();
    let err = client
        .fetch_roster(&OrgUnitId::new("1"))
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::AuthRejected { status: 401 }));
}

#[tokio::test]
async fn test_malformed_payload_is_error_by_default() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "not a roster"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = RosterFeedClient::new(fast_config(&server.uri())).unwrap();
    let err = client
        .fetch_roster(&OrgUnitId::new("1"))
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::MalformedPayload { .. }));
}

#[tokio::test]
async fn test_malformed_payload_as_empty_roster_when_opted_in() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = fast_config(&server.uri());
    config.empty_on_malformed = true;
    let client = RosterFeedClient::new(config).unwrap();

    let roster = client.fetch_roster(&OrgUnitId::new("1")).await.unwrap();
    assert!(roster.is_empty());
}
