//! HTTP signal source.
//!
//! Each session is a `reqwest::Client` with its own cookie jar, created by
//! a form login. The source remembers the last page it fetched; indicator
//! queries read the configured region of that page.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use livewatch_core::{AuthError, LivewatchConfig, NavError, QueryError, SignalSource, Viewport};

use crate::page::PageRegion;

const USER_AGENT: &str = concat!("livewatch/", env!("CARGO_PKG_VERSION"));

/// Authenticated browsing context.
#[derive(Debug, Clone)]
pub struct WebSession {
    client: Client,
    id: u64,
    established_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Page {
    url: String,
    body: String,
}

#[derive(Debug, Clone)]
struct WebSettings {
    base_url: String,
    login_path: String,
    identity: String,
    username: String,
    password: String,
    live_keyword: String,
    end_keyword: String,
    viewport: Viewport,
    request_timeout: Duration,
}

pub struct WebSignalSource {
    settings: WebSettings,
    live_region: PageRegion,
    end_region: PageRegion,
    page: Mutex<Option<Page>>,
    active: Mutex<Option<WebSession>>,
    next_session_id: AtomicU64,
}

impl WebSignalSource {
    pub fn from_config(config: &LivewatchConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            settings: WebSettings {
                base_url: config.source.base_url.trim_end_matches('/').to_string(),
                login_path: config.source.login_path.clone(),
                identity: config.target.identity.clone(),
                username: config.credentials.id.clone(),
                password: config.credentials.secret.clone(),
                live_keyword: config.target.live_keyword.clone(),
                end_keyword: config.target.end_keyword.clone(),
                viewport: config.viewport,
                request_timeout: Duration::from_secs(config.source.request_timeout_secs),
            },
            live_region: PageRegion::new(&config.source.live_region)?,
            end_region: PageRegion::new(&config.source.end_region)?,
            page: Mutex::new(None),
            active: Mutex::new(None),
            next_session_id: AtomicU64::new(1),
        })
    }

    fn login_url(&self) -> String {
        format!("{}{}", self.settings.base_url, self.settings.login_path)
    }

    fn profile_url(&self) -> String {
        format!("{}/{}/", self.settings.base_url, self.settings.identity)
    }

    fn live_url(&self) -> String {
        format!("{}/{}/live/", self.settings.base_url, self.settings.identity)
    }

    fn build_client(&self) -> Result<Client, reqwest::Error> {
        Client::builder()
            .cookie_store(true)
            .timeout(self.settings.request_timeout)
            .user_agent(USER_AGENT)
            .default_headers(viewport_headers(self.settings.viewport))
            .build()
    }

    async fn fetch(&self, session: &WebSession, url: &str) -> Result<(), NavError> {
        let response = session
            .client
            .get(url)
            .send()
            .await
            .map_err(nav_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(NavError::SessionExpired);
        }
        if !status.is_success() {
            return Err(NavError::Unreachable {
                target: url.to_string(),
                details: format!("HTTP {}", status),
            });
        }
        // A logged-out session is redirected to the login form.
        if response.url().path().starts_with(&self.settings.login_path) {
            return Err(NavError::SessionExpired);
        }

        let body = response.text().await.map_err(nav_error)?;
        tracing::debug!(url, bytes = body.len(), session = session.id, "Page fetched");
        *self.page_guard() = Some(Page {
            url: url.to_string(),
            body,
        });
        *self.active_guard() = Some(session.clone());
        Ok(())
    }

    fn query_current_page(
        &self,
        region: &PageRegion,
        keyword: &str,
    ) -> Result<bool, QueryError> {
        let page = self.page_guard();
        let page = page.as_ref().ok_or(QueryError::NoPage)?;
        region.contains(&page.body, keyword).ok_or_else(|| {
            QueryError::Render(format!("no <{}> element on {}", region.element(), page.url))
        })
    }

    fn page_guard(&self) -> MutexGuard<'_, Option<Page>> {
        self.page.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn active_guard(&self) -> MutexGuard<'_, Option<WebSession>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SignalSource for WebSignalSource {
    type Session = WebSession;

    async fn authenticate(&self) -> Result<WebSession, AuthError> {
        let client = self
            .build_client()
            .map_err(|err| AuthError::Transport(err.to_string()))?;
        let login_url = self.login_url();

        // Pre-auth cookies (CSRF and friends) come from the login page itself.
        let response = client.get(&login_url).send().await.map_err(auth_error)?;
        if !response.status().is_success() {
            return Err(AuthError::Transport(format!(
                "login page returned HTTP {}",
                response.status()
            )));
        }

        let response = client
            .post(&login_url)
            .form(&[
                ("username", self.settings.username.as_str()),
                ("password", self.settings.password.as_str()),
            ])
            .send()
            .await
            .map_err(auth_error)?;
        if !response.status().is_success() {
            return Err(AuthError::Rejected(format!(
                "login returned HTTP {}",
                response.status()
            )));
        }

        let session = WebSession {
            client,
            id: self.next_session_id.fetch_add(1, Ordering::SeqCst),
            established_at: Utc::now(),
        };
        tracing::info!(session = session.id, account = %self.settings.username, "Logged in");
        Ok(session)
    }

    async fn navigate_to_target(&self, session: &WebSession) -> Result<(), NavError> {
        self.fetch(session, &self.profile_url()).await
    }

    async fn reload(&self, session: &WebSession) -> Result<(), NavError> {
        let url = self
            .page_guard()
            .as_ref()
            .map(|page| page.url.clone())
            .unwrap_or_else(|| self.profile_url());
        self.fetch(session, &url).await
    }

    async fn open_live_view(&self, session: &WebSession) -> Result<(), NavError> {
        self.fetch(session, &self.live_url()).await
    }

    async fn is_live_indicator_present(&self) -> Result<bool, QueryError> {
        self.query_current_page(&self.live_region, &self.settings.live_keyword)
    }

    async fn is_end_indicator_present(&self) -> Result<bool, QueryError> {
        let session = self.active_guard().clone().ok_or(QueryError::NoPage)?;
        let url = self
            .page_guard()
            .as_ref()
            .map(|page| page.url.clone())
            .ok_or(QueryError::NoPage)?;

        self.fetch(&session, &url).await.map_err(|err| match err {
            NavError::Timeout => QueryError::Timeout,
            other => QueryError::Transport(other.to_string()),
        })?;
        self.query_current_page(&self.end_region, &self.settings.end_keyword)
    }

    async fn close(&self) {
        let session = self.active_guard().take();
        self.page_guard().take();
        if let Some(session) = session {
            tracing::debug!(
                session = session.id,
                established_at = %session.established_at,
                "Browsing session closed"
            );
        }
    }
}

fn viewport_headers(viewport: Viewport) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("viewport-width"),
        HeaderValue::from(viewport.width),
    );
    headers.insert(
        HeaderName::from_static("sec-ch-viewport-height"),
        HeaderValue::from(viewport.height),
    );
    headers
}

fn nav_error(err: reqwest::Error) -> NavError {
    if err.is_timeout() {
        NavError::Timeout
    } else {
        NavError::Transport(err.to_string())
    }
}

fn auth_error(err: reqwest::Error) -> AuthError {
    if err.is_timeout() {
        AuthError::Timeout
    } else {
        AuthError::Transport(err.to_string())
    }
}
