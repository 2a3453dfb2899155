//! Supabase Auth (GoTrue) identity provider.
//!
//! Talks to the REST endpoints directly with `reqwest`, keeps tokens in the
//! [`SnapshotManager`], and broadcasts every session change it causes.

use crate::auth_fsm::RefreshConfig;
use crate::oauth::{authorize_url, OAuthCallbackServer, PkcePair};
use crate::{
    AccessTokenSource, AuthError, AuthResult, IdentityProvider, ProviderUser, SessionChanges,
    SessionUser,
};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use furrow_config_and_utils::{summarize_response_body, Config};
use furrow_storage::{ProviderSessionMeta, SnapshotManager};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Capacity of the session-change broadcast channel.
const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Token grant response shared by password, PKCE, sign-up and refresh.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: ProviderUser,
}

/// Sign-up answers with a session when confirmation is off, or just the
/// user when an email confirmation is pending.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    PendingConfirmation(ProviderUser),
}

/// GoTrue error body. Newer servers send `error_code`/`msg`, older ones
/// `error`/`error_description`.
#[derive(Debug, Default, Deserialize)]
struct GoTrueError {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Map a failed GoTrue response to an [`AuthError`].
fn classify_error(status: StatusCode, body: &str) -> AuthError {
    let parsed: GoTrueError = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.error_code.or(parsed.error).unwrap_or_default();
    let message = parsed
        .msg
        .or(parsed.message)
        .or(parsed.error_description)
        .unwrap_or_else(|| format!("HTTP {}", status));

    match code.as_str() {
        "invalid_credentials" | "invalid_grant" => AuthError::InvalidCredentials(message),
        "email_exists" | "user_already_exists" => AuthError::EmailInUse(message),
        "weak_password" => AuthError::WeakPassword(message),
        "email_address_invalid" | "validation_failed" => AuthError::InvalidEmail(message),
        _ if status.is_server_error() => AuthError::Network(message),
        _ => AuthError::Unknown(message),
    }
}

/// Supabase-backed [`IdentityProvider`] and [`AccessTokenSource`].
pub struct SupabaseAuthClient {
    http_client: Client,
    supabase_url: String,
    publishable_key: String,
    snapshots: Arc<SnapshotManager>,
    changes: broadcast::Sender<Option<ProviderUser>>,
    refresh_config: RefreshConfig,
    oauth_port: u16,
    oauth_timeout: Duration,
    /// Refresh tokens rotate, so only one refresh may run at a time.
    refresh_lock: tokio::sync::Mutex<()>,
}

impl SupabaseAuthClient {
    pub fn new(config: &Config, snapshots: Arc<SnapshotManager>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            http_client: Client::new(),
            supabase_url: config.supabase_url.trim_end_matches('/').to_string(),
            publishable_key: config.supabase_publishable_key.clone(),
            snapshots,
            changes,
            refresh_config: RefreshConfig::default(),
            oauth_port: config.oauth_callback_port,
            oauth_timeout: Duration::from_secs(config.oauth_timeout_secs),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Override the refresh retry policy.
    pub fn with_refresh_config(mut self, refresh_config: RefreshConfig) -> Self {
        self.refresh_config = refresh_config;
        self
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.supabase_url, path)
    }

    fn notify(&self, user: Option<ProviderUser>) {
        // No receivers just means nobody is listening yet.
        let _ = self.changes.send(user);
    }

    /// POST to a token-issuing endpoint and decode the JSON answer.
    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> AuthResult<T> {
        let url = self.auth_url(path);
        debug!(url = %url, "Supabase auth request");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.publishable_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            warn!(
                status = %status,
                body_summary = %summarize_response_body(&text),
                "Supabase auth request failed"
            );
            return Err(classify_error(status, &text));
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Persist tokens and metadata for a fresh session.
    fn store_session(&self, token: &TokenResponse) -> AuthResult<()> {
        let user = SessionUser::from_provider(&token.user);
        let meta = ProviderSessionMeta {
            user_id: token.user.id.clone(),
            email: token.user.email.clone(),
            display_name: user.display_name,
            expires_at: Utc::now() + ChronoDuration::seconds(token.expires_in),
        };
        self.snapshots
            .set_provider_session(&token.access_token, &token.refresh_token, &meta)?;
        Ok(())
    }

    fn establish(&self, token: TokenResponse) -> AuthResult<ProviderUser> {
        self.store_session(&token)?;
        info!(user_id = %token.user.id, "Supabase session established");
        self.notify(Some(token.user.clone()));
        Ok(token.user)
    }

    fn drop_session(&self, reason: &str) -> AuthResult<()> {
        info!(reason, "Clearing Supabase session");
        self.snapshots.clear_provider_session()?;
        self.notify(None);
        Ok(())
    }

    /// Ask the server who owns `access_token`. `Ok(None)` when it says nobody.
    async fn fetch_user(&self, access_token: &str) -> AuthResult<Option<ProviderUser>> {
        let url = self.auth_url("user");
        debug!(url = %url, "Verifying session with Supabase");

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.publishable_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(status = %status, "Server rejected stored session");
            return Ok(None);
        }
        if !status.is_success() {
            warn!(
                status = %status,
                body_summary = %summarize_response_body(&text),
                "Session verification failed"
            );
            return Err(classify_error(status, &text));
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Single refresh attempt. Server errors come back as `Network` so the
    /// caller retries them.
    async fn try_refresh(&self, refresh_token: &str) -> AuthResult<TokenResponse> {
        self.post_json::<TokenResponse>(
            "token?grant_type=refresh_token",
            serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
        .map_err(|e| match e {
            AuthError::InvalidCredentials(msg) | AuthError::Unknown(msg) => {
                AuthError::TokenRefresh(msg)
            }
            other => other,
        })
    }

    /// Refresh with exponential backoff. A rejected refresh token clears
    /// the session; exhausting retries on transient errors keeps it.
    async fn refresh_with_backoff(&self, refresh_token: &str) -> AuthResult<ProviderUser> {
        let mut last_error = None;

        for attempt in 0..self.refresh_config.max_retries {
            match self.try_refresh(refresh_token).await {
                Ok(token) => {
                    info!(user_id = %token.user.id, "Token refreshed");
                    return self.establish(token);
                }
                Err(e) if e.is_transient() => {
                    last_error = Some(e);
                    if attempt + 1 < self.refresh_config.max_retries {
                        let delay = self.refresh_config.delay_for_attempt(attempt);
                        debug!(
                            attempt = attempt + 1,
                            max_retries = self.refresh_config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "Refresh failed with transient error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Refresh token rejected");
                    self.drop_session("refresh rejected")?;
                    return Err(e);
                }
            }
        }

        warn!(
            max_retries = self.refresh_config.max_retries,
            "Refresh retries exhausted"
        );
        Err(last_error.unwrap_or(AuthError::RefreshExhausted(
            self.refresh_config.max_retries,
        )))
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuthClient {
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<ProviderUser> {
        debug!(email = %email, "Password sign-in");
        let token: TokenResponse = self
            .post_json(
                "token?grant_type=password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        self.establish(token)
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<ProviderUser> {
        debug!(email = %email, "Sign-up");
        let response: SignUpResponse = self
            .post_json(
                "signup",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;

        match response {
            SignUpResponse::Session(token) => self.establish(token),
            SignUpResponse::PendingConfirmation(user) => {
                info!(user_id = %user.id, "Sign-up pending email confirmation");
                Err(AuthError::Unknown(
                    "Check your inbox to confirm your email, then sign in".to_string(),
                ))
            }
        }
    }

    async fn sign_in_with_google(&self) -> AuthResult<ProviderUser> {
        let pkce = PkcePair::generate();
        let callback = OAuthCallbackServer::new(self.oauth_port, self.oauth_timeout)
            .bind()
            .await?;
        let url = authorize_url(&self.supabase_url, "google", &callback.callback_url(), &pkce)?;

        info!("Opening browser for Google sign-in");
        open::that(url.as_str())
            .map_err(|e| AuthError::PopupBlocked(format!("could not open browser: {}", e)))?;

        let code = callback.wait_for_code().await?;
        let token: TokenResponse = self
            .post_json(
                "token?grant_type=pkce",
                serde_json::json!({ "auth_code": code, "code_verifier": pkce.verifier }),
            )
            .await?;
        self.establish(token)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let Some(access_token) = self.snapshots.get_access_token()? else {
            return self.drop_session("sign-out without stored session");
        };

        let url = self.auth_url("logout");
        debug!(url = %url, "Signing out");
        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.publishable_key)
            .bearer_auth(&access_token)
            .send()
            .await?;

        let status = response.status();
        // 401/404: the server already forgot this session.
        if !status.is_success()
            && status != StatusCode::UNAUTHORIZED
            && status != StatusCode::NOT_FOUND
        {
            let text = response.text().await.unwrap_or_default();
            warn!(
                status = %status,
                body_summary = %summarize_response_body(&text),
                "Sign-out failed"
            );
            return Err(classify_error(status, &text));
        }

        self.drop_session("signed out")
    }

    fn on_session_changed(&self) -> SessionChanges {
        self.changes.subscribe()
    }

    async fn restore_session(&self) -> AuthResult<Option<ProviderUser>> {
        if !self.snapshots.has_provider_session()? {
            debug!("No stored Supabase session");
            return Ok(None);
        }

        let (Some(access_token), Some(meta)) = (
            self.snapshots.get_access_token()?,
            self.snapshots.get_session_meta()?,
        ) else {
            self.drop_session("incomplete stored session")?;
            return Ok(None);
        };

        if meta.is_expired() {
            info!(user_id = %meta.user_id, "Stored session expired, refreshing");
            let Some(refresh_token) = self.snapshots.get_refresh_token()? else {
                self.drop_session("expired without refresh token")?;
                return Ok(None);
            };
            let _refreshing = self.refresh_lock.lock().await;
            return match self.refresh_with_backoff(&refresh_token).await {
                Ok(user) => Ok(Some(user)),
                Err(e) if e.is_transient() => Err(e),
                Err(_) => Ok(None),
            };
        }

        match self.fetch_user(&access_token).await? {
            Some(user) => {
                info!(user_id = %user.id, "Stored session verified");
                Ok(Some(user))
            }
            None => {
                self.drop_session("server rejected stored session")?;
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl AccessTokenSource for SupabaseAuthClient {
    async fn access_token(&self) -> AuthResult<String> {
        let _refreshing = self.refresh_lock.lock().await;

        let access_token = self
            .snapshots
            .get_access_token()?
            .ok_or(AuthError::NotLoggedIn)?;
        if !self.snapshots.is_session_expired()? {
            return Ok(access_token);
        }

        let refresh_token = self
            .snapshots
            .get_refresh_token()?
            .ok_or(AuthError::NotLoggedIn)?;
        info!("Access token expired, refreshing");
        self.refresh_with_backoff(&refresh_token).await?;
        self.snapshots
            .get_access_token()?
            .ok_or(AuthError::NotLoggedIn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use furrow_storage::MemoryStorage;
    use parking_lot::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

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

    const TOKEN_BODY: &str = r#"{
        "access_token": "access-1",
        "refresh_token": "refresh-1",
        "expires_in": 3600,
        "token_type": "bearer",
        "user": { "id": "uid-1", "email": "a@b.com", "user_metadata": { "full_name": "Ada Field" } }
    }"#;

    fn client(url: &str) -> (SupabaseAuthClient, Arc<SnapshotManager>) {
        let snapshots = Arc::new(SnapshotManager::new(Box::new(MemoryStorage::new())));
        let config = Config {
            supabase_url: format!("{}/", url),
            supabase_publishable_key: "pk-test".to_string(),
            ..Config::default()
        };
        let client = SupabaseAuthClient::new(&config, snapshots.clone()).with_refresh_config(
            RefreshConfig {
                max_retries: 2,
                initial_delay_ms: 1,
                max_delay_ms: 2,
            },
        );
        (client, snapshots)
    }

    fn store_expired_session(snapshots: &SnapshotManager) {
        snapshots
            .set_provider_session(
                "stale-access",
                "refresh-0",
                &ProviderSessionMeta {
                    user_id: "uid-1".to_string(),
                    email: Some("a@b.com".to_string()),
                    display_name: None,
                    expires_at: Utc::now() - ChronoDuration::hours(1),
                },
            )
            .unwrap();
    }

    #[test]
    fn test_classify_error_codes() {
        let err = classify_error(
            StatusCode::BAD_REQUEST,
            r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#,
        );
        assert!(matches!(err, AuthError::InvalidCredentials(ref m) if m == "Invalid login credentials"));

        let err = classify_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(err.code(), "invalid-credentials");

        let err = classify_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"error_code":"user_already_exists","msg":"User already registered"}"#,
        );
        assert_eq!(err.code(), "email-in-use");

        let err = classify_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"error_code":"weak_password","msg":"Password should be at least 6 characters"}"#,
        );
        assert_eq!(err.code(), "weak-password");

        let err = classify_error(
            StatusCode::BAD_REQUEST,
            r#"{"error_code":"email_address_invalid","msg":"Email address is invalid"}"#,
        );
        assert_eq!(err.code(), "invalid-email");
    }

    #[test]
    fn test_classify_error_fallbacks() {
        let err = classify_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "Network error: HTTP 502 Bad Gateway");

        let err = classify_error(StatusCode::BAD_REQUEST, r#"{"msg":"odd"}"#);
        assert!(matches!(err, AuthError::Unknown(ref m) if m == "odd"));
    }

    #[tokio::test]
    async fn test_sign_in_stores_tokens_and_notifies() {
        let server = StubServer::start(vec![(200, TOKEN_BODY)]).await;
        let (client, snapshots) = client(&server.url);
        let mut changes = client.on_session_changed();

        let user = client.sign_in("a@b.com", "secret1").await.unwrap();

        assert_eq!(user.id, "uid-1");
        assert_eq!(snapshots.get_access_token().unwrap(), Some("access-1".to_string()));
        assert_eq!(snapshots.get_refresh_token().unwrap(), Some("refresh-1".to_string()));
        let meta = snapshots.get_session_meta().unwrap().unwrap();
        assert_eq!(meta.display_name.as_deref(), Some("Ada Field"));
        assert!(!meta.is_expired());
        assert_eq!(changes.recv().await.unwrap().unwrap().id, "uid-1");

        let requests = server.requests();
        assert!(requests[0].starts_with("post /auth/v1/token?grant_type=password "));
        assert!(requests[0].contains("apikey: pk-test"));
        assert!(requests[0].contains(r#""email":"a@b.com""#));
    }

    #[tokio::test]
    async fn test_sign_in_rejected() {
        let server = StubServer::start(vec![(
            400,
            r#"{"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#,
        )])
        .await;
        let (client, snapshots) = client(&server.url);

        let err = client.sign_in("a@b.com", "wrong").await.unwrap_err();

        assert_eq!(err.code(), "invalid-credentials");
        assert!(!snapshots.has_provider_session().unwrap());
    }

    #[tokio::test]
    async fn test_sign_up_pending_confirmation_is_error() {
        let server = StubServer::start(vec![(
            200,
            r#"{"id":"uid-2","email":"new@b.com","user_metadata":{}}"#,
        )])
        .await;
        let (client, snapshots) = client(&server.url);

        let err = client.sign_up("new@b.com", "secret1").await.unwrap_err();

        assert_eq!(err.code(), "unknown");
        assert!(!snapshots.has_provider_session().unwrap());
        assert!(server.requests()[0].starts_with("post /auth/v1/signup "));
    }

    #[tokio::test]
    async fn test_sign_out_clears_tokens() {
        let server = StubServer::start(vec![(200, TOKEN_BODY), (204, "")]).await;
        let (client, snapshots) = client(&server.url);
        client.sign_in("a@b.com", "secret1").await.unwrap();
        let mut changes = client.on_session_changed();

        client.sign_out().await.unwrap();

        assert!(!snapshots.has_provider_session().unwrap());
        assert_eq!(changes.recv().await.unwrap(), None);
        let requests = server.requests();
        assert!(requests[1].starts_with("post /auth/v1/logout "));
        assert!(requests[1].contains("authorization: bearer access-1"));
    }

    #[tokio::test]
    async fn test_sign_out_server_error_keeps_tokens() {
        let server = StubServer::start(vec![(200, TOKEN_BODY), (503, "")]).await;
        let (client, snapshots) = client(&server.url);
        client.sign_in("a@b.com", "secret1").await.unwrap();

        let err = client.sign_out().await.unwrap_err();

        assert!(err.is_transient());
        assert!(snapshots.has_provider_session().unwrap());
    }

    #[tokio::test]
    async fn test_restore_without_session() {
        let (client, _) = client("http://127.0.0.1:9");
        assert_eq!(client.restore_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_restore_verifies_unexpired_session() {
        let server = StubServer::start(vec![
            (200, TOKEN_BODY),
            (200, r#"{"id":"uid-1","email":"a@b.com"}"#),
        ])
        .await;
        let (client, _) = client(&server.url);
        client.sign_in("a@b.com", "secret1").await.unwrap();

        let user = client.restore_session().await.unwrap().unwrap();

        assert_eq!(user.id, "uid-1");
        assert!(server.requests()[1].starts_with("get /auth/v1/user "));
    }

    #[tokio::test]
    async fn test_restore_rejected_session_is_cleared() {
        let server = StubServer::start(vec![(200, TOKEN_BODY), (401, "{}")]).await;
        let (client, snapshots) = client(&server.url);
        client.sign_in("a@b.com", "secret1").await.unwrap();

        assert_eq!(client.restore_session().await.unwrap(), None);
        assert!(!snapshots.has_provider_session().unwrap());
    }

    #[tokio::test]
    async fn test_restore_refreshes_expired_session() {
        let server = StubServer::start(vec![(200, TOKEN_BODY)]).await;
        let (client, snapshots) = client(&server.url);
        store_expired_session(&snapshots);

        let user = client.restore_session().await.unwrap().unwrap();

        assert_eq!(user.id, "uid-1");
        assert_eq!(snapshots.get_access_token().unwrap(), Some("access-1".to_string()));
        let requests = server.requests();
        assert!(requests[0].starts_with("post /auth/v1/token?grant_type=refresh_token "));
        assert!(requests[0].contains(r#""refresh_token":"refresh-0""#));
    }

    #[tokio::test]
    async fn test_rejected_refresh_clears_session() {
        let server = StubServer::start(vec![(
            400,
            r#"{"error_code":"refresh_token_not_found","msg":"Invalid Refresh Token"}"#,
        )])
        .await;
        let (client, snapshots) = client(&server.url);
        store_expired_session(&snapshots);
        let mut changes = client.on_session_changed();

        assert_eq!(client.restore_session().await.unwrap(), None);
        assert!(!snapshots.has_provider_session().unwrap());
        assert_eq!(changes.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_refresh_retries_transient_errors() {
        let server = StubServer::start(vec![(503, ""), (200, TOKEN_BODY)]).await;
        let (client, snapshots) = client(&server.url);
        store_expired_session(&snapshots);

        let token = client.access_token().await.unwrap();

        assert_eq!(token, "access-1");
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_exhausted_keeps_session() {
        let server = StubServer::start(vec![(503, ""), (503, "")]).await;
        let (client, snapshots) = client(&server.url);
        store_expired_session(&snapshots);

        let err = client.restore_session().await.unwrap_err();

        assert!(err.is_transient());
        assert!(snapshots.has_provider_session().unwrap());
    }

    #[tokio::test]
    async fn test_access_token_requires_session() {
        let (client, _) = client("http://127.0.0.1:9");
        assert!(matches!(
            client.access_token().await,
            Err(AuthError::NotLoggedIn)
        ));
    }
}
