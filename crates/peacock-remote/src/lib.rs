// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use peacock_app::{
    AuthState, ItemPatch, MenuItemId, MenuRow, MenuService, Session, SessionHub,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::Deserialize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use time::OffsetDateTime;
use url::Url;

const ROWS_PATH: &str = "rest/v1/menu_items";
const TOKEN_PATH: &str = "auth/v1/token";
const LOGOUT_PATH: &str = "auth/v1/logout";
const OBJECT_MEDIA_TYPE: &str = "application/vnd.pgrst.object+json";
/// Sessions this close to expiry are renewed before the next request.
const REFRESH_MARGIN: time::Duration = time::Duration::seconds(30);

/// Blocking client for the hosted data service: PostgREST-style row access
/// under `/rest/v1` and password-grant auth under `/auth/v1`.
#[derive(Debug)]
pub struct RestClient {
    base_url: Url,
    anon_key: String,
    timeout: Duration,
    http: HttpClient,
    session: Mutex<Option<Session>>,
    refreshing: Mutex<()>,
    hub: SessionHub,
}

impl RestClient {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("service.url must not be empty -- set it in the config or PEACOCK_SERVICE_URL");
        }
        let base_url = Url::parse(&format!("{trimmed}/"))
            .with_context(|| format!("service.url {trimmed:?} is not a valid URL"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!(
                "service.url {trimmed:?} must use http or https, got {:?}",
                base_url.scheme()
            );
        }
        if anon_key.trim().is_empty() {
            bail!("service.anon_key must not be empty -- copy the public key from the service dashboard");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            anon_key: anon_key.trim().to_owned(),
            timeout,
            http,
            session: Mutex::new(None),
            refreshing: Mutex::new(()),
            hub: SessionHub::default(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .with_context(|| format!("build URL for {path}"))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .current_session()
            .map(|session| session.access_token)
            .unwrap_or_else(|| self.anon_key.clone());
        builder.header("apikey", &self.anon_key).bearer_auth(bearer)
    }

    fn send(&self, builder: RequestBuilder) -> Result<Response> {
        self.authorize(builder)
            .send()
            .map_err(|error| connection_error(self.base_url(), error))
    }

    fn require_session(&self) -> Result<Session> {
        self.current_session()
            .ok_or_else(|| anyhow!("not signed in -- sign in as an admin first"))
    }

    fn fetch_rows(&self, query: &[(&str, &str)]) -> Result<Vec<MenuRow>> {
        let url = self.endpoint(ROWS_PATH, query)?;
        let response = self.send(self.http.get(url))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        response.json().context("decode menu rows")
    }

    fn replace_session(&self, session: Option<Session>) {
        *self.lock_session() = session.clone();
        self.hub.publish(&AuthState::from_session(session));
    }

    fn request_token(&self, grant_type: &str, body: &serde_json::Value) -> Result<TokenResponse> {
        let url = self.endpoint(TOKEN_PATH, &[("grant_type", grant_type)])?;
        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(body)
            .send()
            .map_err(|error| connection_error(self.base_url(), error))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        response
            .json()
            .with_context(|| format!("decode {grant_type} token response"))
    }

    /// Trades the refresh token for a new session and publishes it.
    pub fn refresh_session(&self, refresh_token: &str, email: &str) -> Result<Session> {
        let token = self.request_token(
            "refresh_token",
            &serde_json::json!({ "refresh_token": refresh_token }),
        )?;
        let mut session = token.into_session(email, OffsetDateTime::now_utc());
        if session.refresh_token.is_none() {
            session.refresh_token = Some(refresh_token.to_owned());
        }
        tracing::info!(email = %session.email, "session refreshed");
        self.replace_session(Some(session.clone()));
        Ok(session)
    }

    fn renew_session(&self) -> Option<Session> {
        // one refresh at a time; a waiter picks up the winner's session
        let _refreshing = match self.refreshing.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = OffsetDateTime::now_utc();
        let session = self.lock_session().clone()?;
        if !session.is_expired_at(now.saturating_add(REFRESH_MARGIN)) {
            return Some(session);
        }
        if let Some(refresh_token) = session.refresh_token.as_deref() {
            match self.refresh_session(refresh_token, &session.email) {
                Ok(renewed) => return Some(renewed),
                Err(error) => tracing::warn!(%error, "session refresh failed"),
            }
        }
        if !session.is_expired_at(now) {
            return Some(session);
        }
        *self.lock_session() = None;
        tracing::info!(email = %session.email, "session expired");
        self.hub.publish(&AuthState::Unauthenticated);
        None
    }
}

impl MenuService for RestClient {
    fn list_available_items(&self) -> Result<Vec<MenuRow>> {
        let rows = self.fetch_rows(&[
            ("select", "*"),
            ("is_available", "eq.true"),
            ("order", "display_order.asc"),
        ])?;
        tracing::debug!(count = rows.len(), "fetched available menu rows");
        Ok(rows)
    }

    fn get_item_by_id(&self, id: &MenuItemId) -> Result<Option<MenuRow>> {
        let filter = format!("eq.{id}");
        let url = self.endpoint(ROWS_PATH, &[("select", "*"), ("id", &filter)])?;
        let response = self.send(self.http.get(url).header("Accept", OBJECT_MEDIA_TYPE))?;
        let status = response.status();
        // a single-object request with zero matching rows is rejected as 406
        if status == StatusCode::NOT_ACCEPTABLE {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        let row = response
            .json()
            .with_context(|| format!("decode menu row {id}"))?;
        Ok(Some(row))
    }

    fn list_all_items(&self) -> Result<Vec<MenuRow>> {
        self.require_session()?;
        let rows = self.fetch_rows(&[("select", "*"), ("order", "display_order.asc")])?;
        tracing::debug!(count = rows.len(), "fetched all menu rows");
        Ok(rows)
    }

    fn update_item(&self, id: &MenuItemId, patch: &ItemPatch) -> Result<MenuRow> {
        if patch.is_empty() {
            bail!("nothing to update for menu item {id}");
        }
        self.require_session()?;
        let filter = format!("eq.{id}");
        let url = self.endpoint(ROWS_PATH, &[("id", &filter)])?;
        let response = self.send(
            self.http
                .patch(url)
                .header("Prefer", "return=representation")
                .header("Accept", OBJECT_MEDIA_TYPE)
                .json(patch),
        )?;
        let status = response.status();
        if status == StatusCode::NOT_ACCEPTABLE {
            bail!("menu item {id} no longer exists -- refresh the admin table");
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        let row: MenuRow = response
            .json()
            .with_context(|| format!("decode updated menu row {id}"))?;
        tracing::info!(%id, available = row.is_available, "menu row updated");
        Ok(row)
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let token = self
            .request_token(
                "password",
                &serde_json::json!({ "email": email, "password": password }),
            )
            .inspect_err(|error| tracing::warn!(%error, "sign-in rejected"))?;
        let session = token.into_session(email, OffsetDateTime::now_utc());
        tracing::info!(email = %session.email, "signed in");
        self.replace_session(Some(session.clone()));
        Ok(session)
    }

    fn sign_out(&self) -> Result<()> {
        let Some(session) = self.lock_session().clone() else {
            return Ok(());
        };
        let url = self.endpoint(LOGOUT_PATH, &[])?;
        let result = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send();
        match result {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(status = response.status().as_u16(), "logout request rejected");
            }
            Ok(_) => {}
            Err(error) => tracing::warn!(%error, "logout request failed"),
        }
        // the local session is dropped even if the service could not be told
        self.replace_session(None);
        tracing::info!(email = %session.email, "signed out");
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        let session = self.lock_session().clone()?;
        let horizon = OffsetDateTime::now_utc().saturating_add(REFRESH_MARGIN);
        if session.is_expired_at(horizon) {
            return self.renew_session();
        }
        Some(session)
    }

    fn sessions(&self) -> &SessionHub {
        &self.hub
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    user: Option<TokenUser>,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self, fallback_email: &str, now: OffsetDateTime) -> Session {
        let email = self
            .user
            .and_then(|user| user.email)
            .filter(|email| !email.is_empty())
            .unwrap_or_else(|| fallback_email.to_owned());
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            email,
            // a lifetime past the representable range is treated as no expiry
            expires_at: self
                .expires_in
                .and_then(|seconds| now.checked_add(time::Duration::seconds(seconds))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ServiceErrorEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

impl ServiceErrorEnvelope {
    fn into_message(self) -> Option<String> {
        [self.message, self.error_description, self.msg]
            .into_iter()
            .flatten()
            .find(|message| !message.trim().is_empty())
    }
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check [service].url and your network connection ({})",
        base_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ServiceErrorEnvelope>(body)
        && let Some(message) = parsed.into_message()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), message);
    }

    if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::{RestClient, StatusCode, TokenResponse, clean_error_response};
    use std::time::Duration;
    use time::OffsetDateTime;

    #[test]
    fn rejects_bad_base_urls() {
        let timeout = Duration::from_secs(1);
        assert!(RestClient::new("", "key", timeout).is_err());
        assert!(RestClient::new("ftp://example.com", "key", timeout).is_err());
        assert!(RestClient::new("not a url", "key", timeout).is_err());
        assert!(RestClient::new("https://example.com", " ", timeout).is_err());
    }

    #[test]
    fn base_url_is_normalized() {
        let client = RestClient::new("https://example.com/", "key", Duration::from_secs(1))
            .expect("client should initialize");
        assert_eq!(client.base_url(), "https://example.com");
        let url = client
            .endpoint("rest/v1/menu_items", &[("select", "*"), ("id", "eq.m1")])
            .expect("endpoint");
        assert_eq!(
            url.as_str(),
            "https://example.com/rest/v1/menu_items?select=*&id=eq.m1"
        );
    }

    #[test]
    fn error_envelopes_surface_messages() {
        let message =
            clean_error_response(StatusCode::BAD_REQUEST, r#"{"error_description":"Invalid login credentials"}"#)
                .to_string();
        assert_eq!(message, "server error (400): Invalid login credentials");

        let message = clean_error_response(StatusCode::FORBIDDEN, r#"{"message":"permission denied"}"#)
            .to_string();
        assert_eq!(message, "server error (403): permission denied");

        let message = clean_error_response(StatusCode::BAD_GATEWAY, "upstream down").to_string();
        assert_eq!(message, "server error (502): upstream down");

        let message = clean_error_response(StatusCode::INTERNAL_SERVER_ERROR, "{}").to_string();
        assert_eq!(message, "server returned 500");
    }

    #[test]
    fn token_response_builds_session() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"access_token":"abc","refresh_token":"r","expires_in":60,"user":{"email":"owner@example.com"}}"#,
        )
        .expect("token json");
        let now = OffsetDateTime::UNIX_EPOCH;
        let session = token.into_session("typed@example.com", now);
        assert_eq!(session.email, "owner@example.com");
        assert_eq!(session.expires_at, Some(now + time::Duration::seconds(60)));
        assert!(!session.is_expired_at(now));
    }

    #[test]
    fn oversized_token_lifetime_means_no_expiry() {
        let token: TokenResponse = serde_json::from_str(&format!(
            r#"{{"access_token":"abc","expires_in":{}}}"#,
            i64::MAX
        ))
        .expect("token json");
        let now = OffsetDateTime::now_utc();
        let session = token.into_session("typed@example.com", now);
        assert_eq!(session.email, "typed@example.com");
        assert_eq!(session.expires_at, None);
        assert!(!session.is_expired_at(now));
    }
}
