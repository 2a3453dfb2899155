//! PostgREST-backed document store for the Supabase `reports` table.
//!
//! Rows are scoped with `user_id=eq.<uid>` on every request and row level
//! security enforces the same rule server side. Live queries poll.

use crate::store::{ReportStream, STREAM_CAPACITY};
use crate::{
    CreateReportInput, DocumentStore, Report, StoreError, StoreResult, UpdateReportInput,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use furrow_auth::{AccessTokenSource, AuthError};
use furrow_config_and_utils::{summarize_response_body, Config};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const TABLE: &str = "reports";
const ORDER: &str = "date.desc,created_at.desc";

/// PostgREST error body.
#[derive(Debug, Default, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct NewRow<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    input: &'a CreateReportInput,
}

#[derive(Serialize)]
struct PatchRow<'a> {
    #[serde(flatten)]
    patch: &'a UpdateReportInput,
    updated_at: DateTime<Utc>,
}

/// Map a failed PostgREST response to a [`StoreError`].
fn classify_error(status: StatusCode, body: &str) -> StoreError {
    let parsed: PostgrestError = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .unwrap_or_else(|| format!("HTTP {}", status));

    match status {
        StatusCode::UNAUTHORIZED => StoreError::Unauthenticated,
        StatusCode::FORBIDDEN => StoreError::Forbidden(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            StoreError::InvalidInput(message)
        }
        _ if status.is_server_error() => StoreError::Network(message),
        _ => match parsed.code.as_deref() {
            // Row level security violation.
            Some("42501") => StoreError::Forbidden(message),
            _ => StoreError::Unknown(message),
        },
    }
}

/// Supabase [`DocumentStore`].
#[derive(Clone)]
pub struct SupabaseDocumentStore {
    http_client: Client,
    supabase_url: String,
    publishable_key: String,
    tokens: Arc<dyn AccessTokenSource>,
    poll_interval: Duration,
}

impl SupabaseDocumentStore {
    pub fn new(config: &Config, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            http_client: Client::new(),
            supabase_url: config.supabase_url.trim_end_matches('/').to_string(),
            publishable_key: config.supabase_publishable_key.clone(),
            tokens,
            poll_interval: Duration::from_secs(config.report_poll_interval_secs.max(1)),
        }
    }

    /// Override how often live queries re-read the table.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.supabase_url, TABLE)
    }

    async fn request(&self, method: Method) -> StoreResult<RequestBuilder> {
        let token = self.tokens.access_token().await.map_err(|e| match e {
            AuthError::NotLoggedIn => StoreError::Unauthenticated,
            other => StoreError::Auth(other),
        })?;

        Ok(self
            .http_client
            .request(method, self.table_url())
            .header("apikey", &self.publishable_key)
            .bearer_auth(token))
    }

    /// Send and decode the rows PostgREST returns.
    async fn rows(&self, request: RequestBuilder) -> StoreResult<Vec<Report>> {
        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                StoreError::Network(e.to_string())
            } else {
                StoreError::Http(e)
            }
        })?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            warn!(
                status = %status,
                body_summary = %summarize_response_body(&text),
                "Report store request failed"
            );
            return Err(classify_error(status, &text));
        }
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl DocumentStore for SupabaseDocumentStore {
    async fn insert(&self, user_id: &str, input: &CreateReportInput) -> StoreResult<Report> {
        let request = self
            .request(Method::POST)
            .await?
            .header("Prefer", "return=representation")
            .json(&NewRow { user_id, input });

        self.rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Unknown("insert returned no row".to_string()))
    }

    async fn patch(
        &self,
        user_id: &str,
        report_id: &str,
        patch: &UpdateReportInput,
    ) -> StoreResult<Report> {
        let request = self
            .request(Method::PATCH)
            .await?
            .query(&[
                ("id", format!("eq.{}", report_id)),
                ("user_id", format!("eq.{}", user_id)),
            ])
            .header("Prefer", "return=representation")
            .json(&PatchRow {
                patch,
                updated_at: Utc::now(),
            });

        // PostgREST answers an unmatched filter with an empty array.
        self.rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(report_id.to_string()))
    }

    async fn remove(&self, user_id: &str, report_id: &str) -> StoreResult<()> {
        let request = self.request(Method::DELETE).await?.query(&[
            ("id", format!("eq.{}", report_id)),
            ("user_id", format!("eq.{}", user_id)),
        ]);
        self.rows(request).await?;
        Ok(())
    }

    async fn fetch(&self, user_id: &str, report_id: &str) -> StoreResult<Option<Report>> {
        let request = self.request(Method::GET).await?.query(&[
            ("select", "*".to_string()),
            ("id", format!("eq.{}", report_id)),
            ("user_id", format!("eq.{}", user_id)),
        ]);
        Ok(self.rows(request).await?.into_iter().next())
    }

    async fn query(&self, user_id: &str) -> StoreResult<Vec<Report>> {
        let request = self.request(Method::GET).await?.query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", user_id)),
            ("order", ORDER.to_string()),
        ]);
        self.rows(request).await
    }

    async fn subscribe(&self, user_id: &str) -> StoreResult<ReportStream> {
        let initial = self.query(user_id).await?;
        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        if tx.send(Ok(initial.clone())).await.is_err() {
            return Ok(rx);
        }

        let store = self.clone();
        let user_id = user_id.to_string();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            let mut last = Some(initial);

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = ticker.tick() => {}
                }

                let message = match store.query(&user_id).await {
                    Ok(reports) if last.as_ref() == Some(&reports) => continue,
                    Ok(reports) => {
                        last = Some(reports.clone());
                        Ok(reports)
                    }
                    // Report each failure streak once.
                    Err(_) if last.is_none() => continue,
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "Live report poll failed");
                        last = None;
                        Err(e)
                    }
                };
                if tx.send(message).await.is_err() {
                    break;
                }
            }
            debug!(user_id = %user_id, "Live report query ended");
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use furrow_auth::AuthResult;
    use parking_lot::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    struct StaticToken(Option<&'static str>);

    #[async_trait]
    impl AccessTokenSource for StaticToken {
        async fn access_token(&self) -> AuthResult<String> {
            self.0
                .map(str::to_string)
                .ok_or(AuthError::NotLoggedIn)
        }
    }

    /// Loopback HTTP server answering with canned responses in order.
    struct StubServer {
        url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl StubServer {
        async fn start(responses: Vec<(u16, &'static str)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://{}", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));
            let log = requests.clone();

            tokio::spawn(async move {
                for (status, body) in responses {
                    let (mut socket, _) = listener.accept().await.unwrap();
                    let request = read_request(&mut socket).await;
                    log.lock().push(request.to_lowercase());
                    let response = format!(
                        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    socket.write_all(response.as_bytes()).await.unwrap();
                    socket.flush().await.unwrap();
                }
            });

            Self { url, requests }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().clone()
        }
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    const ROW: &str = r#"[{
        "id": "r-1",
        "date": "2024-03-09",
        "expenses": [{ "id": "e1", "description": "Feed", "amount": 12.5 }],
        "labels": [{ "id": "l1", "name": "Cows", "count": 3 }],
        "total": 12.5,
        "user_id": "uid-1",
        "created_at": "2024-03-09T10:00:00.123456+00:00",
        "updated_at": "2024-03-09T10:00:00.123456+00:00"
    }]"#;

    fn store(url: &str, token: Option<&'static str>) -> SupabaseDocumentStore {
        let config = Config {
            supabase_url: format!("{}/", url),
            supabase_publishable_key: "pk-test".to_string(),
            ..Config::default()
        };
        SupabaseDocumentStore::new(&config, Arc::new(StaticToken(token)))
            .with_poll_interval(Duration::from_millis(10))
    }

    fn input() -> CreateReportInput {
        CreateReportInput::new(chrono::NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(), vec![], vec![])
    }

    #[test]
    fn test_classify_error() {
        assert!(matches!(
            classify_error(StatusCode::UNAUTHORIZED, "{}"),
            StoreError::Unauthenticated
        ));
        assert!(matches!(
            classify_error(StatusCode::FORBIDDEN, r#"{"message":"rls"}"#),
            StoreError::Forbidden(m) if m == "rls"
        ));
        assert!(matches!(
            classify_error(StatusCode::BAD_REQUEST, r#"{"code":"22P02","message":"bad date"}"#),
            StoreError::InvalidInput(m) if m == "bad date"
        ));
        assert!(matches!(
            classify_error(StatusCode::SERVICE_UNAVAILABLE, "oops"),
            StoreError::Network(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::CONFLICT, r#"{"code":"42501","message":"denied"}"#),
            StoreError::Forbidden(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::CONFLICT, "{}"),
            StoreError::Unknown(m) if m.contains("409")
        ));
    }

    #[tokio::test]
    async fn test_insert_sends_owner_and_returns_row() {
        let server = StubServer::start(vec![(201, ROW)]).await;
        let store = store(&server.url, Some("access-1"));

        let report = store.insert("uid-1", &input()).await.unwrap();
        assert_eq!(report.id, "r-1");
        assert_eq!(report.labels[0].count, 3);

        let request = &server.requests()[0];
        assert!(request.starts_with("post /rest/v1/reports "));
        assert!(request.contains("apikey: pk-test"));
        assert!(request.contains("authorization: bearer access-1"));
        assert!(request.contains("prefer: return=representation"));
        assert!(request.contains(r#""user_id":"uid-1""#));
        assert!(request.contains(r#""date":"2024-03-09""#));
    }

    #[tokio::test]
    async fn test_query_filters_and_orders() {
        let server = StubServer::start(vec![(200, ROW)]).await;
        let store = store(&server.url, Some("access-1"));

        let reports = store.query("uid-1").await.unwrap();
        assert_eq!(reports.len(), 1);

        let request = &server.requests()[0];
        assert!(request.starts_with("get /rest/v1/reports?"));
        assert!(request.contains("user_id=eq.uid-1"));
        assert!(request.contains("order=date.desc%2ccreated_at.desc"));
    }

    #[tokio::test]
    async fn test_patch_stamps_updated_at() {
        let server = StubServer::start(vec![(200, ROW)]).await;
        let store = store(&server.url, Some("access-1"));
        let patch = UpdateReportInput {
            total: Some(12.5),
            ..Default::default()
        };

        store.patch("uid-1", "r-1", &patch).await.unwrap();

        let request = &server.requests()[0];
        assert!(request.starts_with("patch /rest/v1/reports?"));
        assert!(request.contains("id=eq.r-1"));
        assert!(request.contains(r#""updated_at":"#));
        assert!(request.contains(r#""total":12.5"#));
        assert!(!request.contains(r#""date""#));
    }

    #[tokio::test]
    async fn test_patch_without_match_is_not_found() {
        let server = StubServer::start(vec![(200, "[]")]).await;
        let store = store(&server.url, Some("access-1"));

        let result = store
            .patch("uid-1", "missing", &UpdateReportInput::default())
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(id)) if id == "missing"));
    }

    #[tokio::test]
    async fn test_remove_and_fetch_missing() {
        let server = StubServer::start(vec![(204, ""), (200, "[]")]).await;
        let store = store(&server.url, Some("access-1"));

        store.remove("uid-1", "r-1").await.unwrap();
        assert!(store.fetch("uid-1", "r-1").await.unwrap().is_none());

        let requests = server.requests();
        assert!(requests[0].starts_with("delete /rest/v1/reports?"));
        assert!(requests[1].contains("id=eq.r-1"));
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let server = StubServer::start(vec![(401, "{}"), (503, "{}")]).await;
        let store = store(&server.url, Some("access-1"));

        assert!(matches!(store.query("uid-1").await, Err(StoreError::Unauthenticated)));
        let err = store.query("uid-1").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_signed_out_is_unauthenticated() {
        let store = store("http://127.0.0.1:9", None);
        assert!(matches!(
            store.query("uid-1").await,
            Err(StoreError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_subscribe_emits_only_on_change() {
        let server = StubServer::start(vec![(200, "[]"), (200, "[]"), (200, ROW)]).await;
        let store = store(&server.url, Some("access-1"));

        let mut stream = store.subscribe("uid-1").await.unwrap();
        let first = stream.recv().await.unwrap().unwrap();
        assert!(first.is_empty());

        let second = tokio::time::timeout(Duration::from_secs(2), stream.recv())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(server.requests().len(), 3);
    }
}
