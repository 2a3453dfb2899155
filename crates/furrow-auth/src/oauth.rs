//! Loopback callback server and PKCE helpers for browser-based Google sign-in.

use crate::{AuthError, AuthResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use url::Url;

/// PKCE code verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// Fresh random verifier (43 URL-safe characters).
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_verifier(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

/// Callback server configuration. Call [`OAuthCallbackServer::bind`] before
/// opening the browser so a busy port is reported up front.
pub struct OAuthCallbackServer {
    port: u16,
    timeout: Duration,
}

impl OAuthCallbackServer {
    /// Port 0 picks a free port.
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }

    pub async fn bind(&self) -> AuthResult<BoundCallback> {
        let addr = format!("127.0.0.1:{}", self.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            AuthError::PopupBlocked(format!("could not listen on {}: {}", addr, e))
        })?;
        let port = listener.local_addr()?.port();

        info!(port, "OAuth callback server listening");

        Ok(BoundCallback {
            listener,
            port,
            timeout: self.timeout,
        })
    }
}

/// A listening callback server, ready to receive one redirect.
pub struct BoundCallback {
    listener: TcpListener,
    port: u16,
    timeout: Duration,
}

impl BoundCallback {
    pub fn callback_url(&self) -> String {
        format!("http://localhost:{}/callback", self.port)
    }

    /// Wait for the redirect and return the authorization code.
    ///
    /// Timing out or a denied consent screen map to `PopupClosed`.
    pub async fn wait_for_code(self) -> AuthResult<String> {
        let timeout = self.timeout;
        match tokio::time::timeout(timeout, self.accept_callback()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "OAuth callback timed out");
                Err(AuthError::PopupClosed)
            }
        }
    }

    async fn accept_callback(self) -> AuthResult<String> {
        loop {
            let (mut socket, _) = self.listener.accept().await?;
            match read_callback(&mut socket).await {
                Ok(Some(params)) => return finish(&mut socket, params).await,
                // Favicon probes and other stray requests.
                Ok(None) => continue,
                Err(e) => {
                    debug!(error = %e, "Dropping malformed callback connection");
                    continue;
                }
            }
        }
    }
}

/// Build the provider's authorize URL for a PKCE flow.
pub fn authorize_url(
    supabase_url: &str,
    provider: &str,
    redirect_to: &str,
    pkce: &PkcePair,
) -> AuthResult<Url> {
    let mut url = Url::parse(supabase_url)?.join("/auth/v1/authorize")?;
    url.query_pairs_mut()
        .append_pair("provider", provider)
        .append_pair("redirect_to", redirect_to)
        .append_pair("code_challenge", &pkce.challenge)
        .append_pair("code_challenge_method", "s256");
    Ok(url)
}

/// Read the request line. Returns the query params for `GET /callback`,
/// `None` for anything else (after answering 404).
async fn read_callback(socket: &mut TcpStream) -> AuthResult<Option<HashMap<String, String>>> {
    let mut reader = BufReader::new(&mut *socket);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    debug!(request = %request_line.trim(), "Received callback request");

    let mut parts = request_line.split_whitespace();
    let (Some("GET"), Some(target)) = (parts.next(), parts.next()) else {
        send_response(socket, 405, "Method Not Allowed", "Method Not Allowed").await?;
        return Ok(None);
    };

    let url = Url::parse("http://localhost")?.join(target)?;
    if url.path() != "/callback" {
        send_response(socket, 404, "Not Found", "Not Found").await?;
        return Ok(None);
    }

    Ok(Some(url.query_pairs().into_owned().collect()))
}

async fn finish(socket: &mut TcpStream, params: HashMap<String, String>) -> AuthResult<String> {
    if let Some(error) = params.get("error") {
        let description = params
            .get("error_description")
            .cloned()
            .unwrap_or_else(|| error.clone());
        send_response(socket, 200, "OK", &result_page(false, &description)).await?;
        return Err(if error == "access_denied" {
            AuthError::PopupClosed
        } else {
            AuthError::Unknown(description)
        });
    }

    match params.get("code") {
        Some(code) if !code.is_empty() => {
            send_response(socket, 200, "OK", &result_page(true, "")).await?;
            Ok(code.clone())
        }
        _ => {
            send_response(socket, 200, "OK", &result_page(false, "Missing code")).await?;
            Err(AuthError::Unknown(
                "Sign-in callback did not include a code".to_string(),
            ))
        }
    }
}

async fn send_response(
    socket: &mut TcpStream,
    status_code: u16,
    status_text: &str,
    body: &str,
) -> AuthResult<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.flush().await?;
    Ok(())
}

fn result_page(success: bool, detail: &str) -> String {
    let (heading, color, message) = if success {
        (
            "Signed in to Furrow",
            "#16a34a",
            "You can close this window and return to the terminal.".to_string(),
        )
    } else {
        (
            "Sign-in failed",
            "#dc2626",
            format!("{}. You can close this window and try again.", escape_html(detail)),
        )
    };
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Furrow</title></head>
<body style="font-family: system-ui; text-align: center; padding: 48px;">
<h1 style="color: {color};">{heading}</h1>
<p>{message}</p>
</body>
</html>"#
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
