use std::collections::HashMap;
use std::sync::Arc;

use reqwest::StatusCode;
use rollcall_application::OverrideStore;
use rollcall_core::AppError;
use rollcall_domain::{
    AccessLevel, NewOverrideRecord, OverrideId, OverrideTarget, PermissionValue, ResourceKey,
    Role, UserRef,
};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use super::{
    HttpOverrideStore, HttpOverrideStoreConfig, OverridePayload, OverrideResponse,
    error_from_status,
};

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
    let values: HashMap<String, String> = pairs
        .iter()
        .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
        .collect();
    move |name| values.get(name).cloned()
}

#[test]
fn config_applies_defaults_and_trims_base_url() {
    let config = HttpOverrideStoreConfig::from_lookup(lookup(&[(
        "ROLLCALL_API_BASE_URL",
        "http://school.test/api/",
    )]));
    assert_eq!(
        config.ok(),
        Some(HttpOverrideStoreConfig {
            base_url: "http://school.test/api".to_owned(),
            api_token: None,
            timeout_ms: 10_000,
            max_attempts: 3,
            retry_backoff_ms: 200,
        })
    );
}

#[test]
fn config_requires_base_url_and_rejects_zero_values() {
    let missing = HttpOverrideStoreConfig::from_lookup(lookup(&[]));
    assert!(matches!(missing, Err(AppError::Validation(_))));

    let zero_attempts = HttpOverrideStoreConfig::from_lookup(lookup(&[
        ("ROLLCALL_API_BASE_URL", "http://school.test"),
        ("ROLLCALL_HTTP_MAX_ATTEMPTS", "0"),
    ]));
    assert!(matches!(zero_attempts, Err(AppError::Validation(_))));

    let garbage_timeout = HttpOverrideStoreConfig::from_lookup(lookup(&[
        ("ROLLCALL_API_BASE_URL", "http://school.test"),
        ("ROLLCALL_HTTP_TIMEOUT_MS", "soon"),
    ]));
    assert!(matches!(garbage_timeout, Err(AppError::Validation(_))));
}

#[test]
fn blank_token_is_ignored() {
    let config = HttpOverrideStoreConfig::from_lookup(lookup(&[
        ("ROLLCALL_API_BASE_URL", "http://school.test"),
        ("ROLLCALL_API_TOKEN", "   "),
    ]));
    assert_eq!(config.ok().and_then(|config| config.api_token), None);
}

#[test]
fn payload_flattens_target_and_flags() {
    let record = NewOverrideRecord {
        target: OverrideTarget::Role(Role::FinanceOfficer),
        resource_key: ResourceKey::new("billing.invoices").unwrap_or_else(|_| unreachable!()),
        permission: AccessLevel::ViewCreate.permission(),
    };

    let payload = serde_json::to_value(OverridePayload::from(&record));
    assert_eq!(
        payload.ok(),
        Some(json!({
            "target_type": "role",
            "target_id": "finance_officer",
            "resource_key": "billing.invoices",
            "view": true,
            "create": true,
            "edit": false,
            "delete": false,
        }))
    );
}

#[test]
fn response_with_numeric_id_converts_to_record() {
    let response = serde_json::from_value::<OverrideResponse>(json!({
        "id": 42,
        "target_type": "user",
        "target_id": "student-7",
        "resource_key": "grades.view",
        "view": true,
    }));
    assert!(response.is_ok());

    let record = response
        .unwrap_or_else(|_| unreachable!())
        .try_into_record();
    assert!(record.is_ok());
    let record = record.unwrap_or_else(|_| unreachable!());
    assert_eq!(record.id.as_str(), "42");
    assert_eq!(record.target.to_string(), "user:student-7");
    assert_eq!(record.permission, PermissionValue::new(true, false, false, false));
}

#[test]
fn response_with_unknown_role_is_rejected() {
    let response = serde_json::from_value::<OverrideResponse>(json!({
        "id": "ovr-1",
        "target_type": "role",
        "target_id": "janitor",
        "resource_key": "grades.view",
        "view": true,
        "create": false,
        "edit": false,
        "delete": false,
    }));
    assert!(response.is_ok());

    let record = response
        .unwrap_or_else(|_| unreachable!())
        .try_into_record();
    assert!(matches!(record, Err(AppError::Validation(_))));
}

#[test]
fn statuses_map_to_error_categories() {
    let operation = "update permission override";
    assert!(matches!(
        error_from_status(operation, StatusCode::NOT_FOUND, ""),
        AppError::NotFound(_)
    ));
    assert!(matches!(
        error_from_status(operation, StatusCode::CONFLICT, ""),
        AppError::Conflict(_)
    ));
    assert!(matches!(
        error_from_status(operation, StatusCode::UNPROCESSABLE_ENTITY, "bad key"),
        AppError::Validation(_)
    ));
    assert!(matches!(
        error_from_status(operation, StatusCode::FORBIDDEN, ""),
        AppError::Internal(_)
    ));
}

#[test]
fn store_clamps_retry_settings() {
    let store = HttpOverrideStore::new(
        reqwest::Client::new(),
        HttpOverrideStoreConfig {
            base_url: "http://school.test".to_owned(),
            api_token: None,
            timeout_ms: 1_000,
            max_attempts: 1,
            retry_backoff_ms: 1,
        },
    );
    assert_eq!(store.max_attempts, 1);
    assert_eq!(store.retry_backoff_ms, 50);
    assert_eq!(
        store.collection_url(),
        "http://school.test/permission-overrides"
    );
}

#[test]
fn item_url_escapes_opaque_ids() {
    let store = HttpOverrideStore::new(
        reqwest::Client::new(),
        config("http://school.test/api", None),
    );
    let id = OverrideId::new("legacy/7?force").unwrap_or_else(|_| unreachable!());

    assert_eq!(
        store.item_url(&id).map(String::from).ok(),
        Some("http://school.test/api/permission-overrides/legacy%2F7%3Fforce".to_owned())
    );
}

#[derive(Debug, Clone)]
struct RecordedRequest {
    method: String,
    target: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl RecordedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Loopback backend answering each connection with the next scripted response.
struct ScriptedBackend {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl ScriptedBackend {
    async fn start(responses: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|error| panic!("failed to bind listener: {error}"));
        let address = listener
            .local_addr()
            .unwrap_or_else(|error| panic!("listener has no address: {error}"));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        tokio::spawn(async move {
            let mut responses = responses.into_iter();
            while let Ok((mut stream, _)) = listener.accept().await {
                let Some(request) = read_request(&mut stream).await else {
                    continue;
                };
                recorded.lock().await.push(request);

                let (status, body) = responses.next().unwrap_or((500, "unexpected request"));
                let reply = format!(
                    "HTTP/1.1 {status} Scripted\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self {
            base_url: format!("http://{address}"),
            requests,
        }
    }

    async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }
}

async fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 1024];
    let header_end = loop {
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(position) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
            break position;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_owned();
    let target = request_line.next()?.to_owned();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_owned(), value.trim().to_owned()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buffer[header_end + 4..].to_vec();
    while body.len() < content_length {
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..read]);
    }

    Some(RecordedRequest {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn config(base_url: &str, api_token: Option<&str>) -> HttpOverrideStoreConfig {
    HttpOverrideStoreConfig {
        base_url: base_url.to_owned(),
        api_token: api_token.map(str::to_owned),
        timeout_ms: 5_000,
        max_attempts: 3,
        retry_backoff_ms: 1,
    }
}

fn store_for(backend: &ScriptedBackend, api_token: Option<&str>) -> HttpOverrideStore {
    let http_client = reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap_or_else(|error| panic!("failed to build HTTP client: {error}"));
    HttpOverrideStore::new(http_client, config(&backend.base_url, api_token))
}

const TEACHER_ATTENDANCE: &str = r#"[{"id": 7, "target_type": "role", "target_id": "teacher",
    "resource_key": "attendance.daily", "view": true, "create": false, "edit": false,
    "delete": false}]"#;

#[tokio::test]
async fn list_sends_target_query_and_bearer_token() {
    let backend = ScriptedBackend::start(vec![(200, "[]")]).await;
    let store = store_for(&backend, Some("secret-token"));
    let student = UserRef::new("student-7").unwrap_or_else(|_| unreachable!());

    let listed = store.list_overrides(&OverrideTarget::User(student)).await;
    assert_eq!(listed.ok(), Some(Vec::new()));

    let requests = backend.requests().await;
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "GET");
    assert_eq!(
        request.target,
        "/permission-overrides?target_type=user&target_id=student-7"
    );
    assert_eq!(request.header("authorization"), Some("Bearer secret-token"));
}

#[tokio::test]
async fn list_retries_transient_statuses() {
    let backend = ScriptedBackend::start(vec![
        (503, "busy"),
        (429, "slow down"),
        (200, TEACHER_ATTENDANCE),
    ])
    .await;
    let store = store_for(&backend, None);

    let listed = store
        .list_overrides(&OverrideTarget::Role(Role::Teacher))
        .await
        .unwrap_or_default();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed.first().map(|record| record.id.as_str()), Some("7"));
    assert_eq!(backend.requests().await.len(), 3);
    assert!(
        backend
            .requests()
            .await
            .iter()
            .all(|request| request.header("authorization").is_none())
    );
}

#[tokio::test]
async fn list_gives_up_after_max_attempts() {
    let backend =
        ScriptedBackend::start(vec![(502, ""), (502, ""), (502, ""), (200, "[]")]).await;
    let store = store_for(&backend, None);

    let listed = store
        .list_overrides(&OverrideTarget::Role(Role::Teacher))
        .await;

    assert!(matches!(listed, Err(AppError::Internal(_))));
    assert_eq!(backend.requests().await.len(), 3);
}

#[tokio::test]
async fn list_skips_malformed_records_and_keeps_the_rest() {
    let backend = ScriptedBackend::start(vec![(
        200,
        r#"[
            {"id": "1", "target_type": "role", "target_id": "teacher",
             "resource_key": "attendance.daily", "view": true},
            {"id": "2", "target_type": "role", "target_id": "teacher",
             "resource_key": "religious_study/hafalan", "view": true, "edit": true},
            {"id": "3", "target_type": "role", "target_id": "teacher",
             "resource_key": "grades entry", "view": true},
            {"id": "4", "target_type": "role", "target_id": "janitor",
             "resource_key": "grades.entry", "view": true}
        ]"#,
    )])
    .await;
    let store = store_for(&backend, None);

    let listed = store
        .list_overrides(&OverrideTarget::Role(Role::Teacher))
        .await;
    assert!(listed.is_ok());

    let keys: Vec<String> = listed
        .unwrap_or_default()
        .into_iter()
        .map(|record| record.resource_key.as_str().to_owned())
        .collect();
    assert_eq!(
        keys,
        vec![
            "attendance.daily".to_owned(),
            "religious_study/hafalan".to_owned()
        ]
    );
}

#[tokio::test]
async fn create_posts_the_flat_payload() {
    let backend = ScriptedBackend::start(vec![(
        201,
        r#"{"id": "ovr-9", "target_type": "role", "target_id": "parent",
            "resource_key": "invoices", "view": true, "create": false, "edit": false,
            "delete": false}"#,
    )])
    .await;
    let store = store_for(&backend, Some("secret-token"));

    let created = store
        .create_override(NewOverrideRecord {
            target: OverrideTarget::Role(Role::Parent),
            resource_key: ResourceKey::new("invoices").unwrap_or_else(|_| unreachable!()),
            permission: AccessLevel::ViewOnly.permission(),
        })
        .await;
    assert_eq!(
        created.map(|record| record.id.as_str().to_owned()).ok(),
        Some("ovr-9".to_owned())
    );

    let requests = backend.requests().await;
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.target, "/permission-overrides");
    assert_eq!(request.header("authorization"), Some("Bearer secret-token"));
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&request.body).ok(),
        Some(json!({
            "target_type": "role",
            "target_id": "parent",
            "resource_key": "invoices",
            "view": true,
            "create": false,
            "edit": false,
            "delete": false,
        }))
    );
}

#[tokio::test]
async fn update_is_attempted_once_on_server_error() {
    let backend = ScriptedBackend::start(vec![(503, "busy"), (200, "")]).await;
    let store = store_for(&backend, None);
    let id = OverrideId::new("ovr-1").unwrap_or_else(|_| unreachable!());

    let updated = store
        .update_override(
            &id,
            NewOverrideRecord {
                target: OverrideTarget::Role(Role::Teacher),
                resource_key: ResourceKey::new("grades.entry").unwrap_or_else(|_| unreachable!()),
                permission: AccessLevel::ViewEdit.permission(),
            },
        )
        .await;

    assert!(matches!(updated, Err(AppError::Internal(_))));
    let requests = backend.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "PUT");
    assert_eq!(requests[0].target, "/permission-overrides/ovr-1");
}

#[tokio::test]
async fn delete_maps_missing_record_to_not_found() {
    let backend = ScriptedBackend::start(vec![(404, "gone")]).await;
    let store = store_for(&backend, None);
    let id = OverrideId::new("legacy/7").unwrap_or_else(|_| unreachable!());

    let deleted = store.delete_override(&id).await;

    assert!(matches!(deleted, Err(AppError::NotFound(_))));
    let requests = backend.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "DELETE");
    assert_eq!(requests[0].target, "/permission-overrides/legacy%2F7");
}
