//! reqwest implementation of the auth API
//!
//! JSON over HTTPS against a configured base URL. The client keeps a cookie
//! jar, which is where the durable refresh credential lives: login/register
//! responses set it, and `refresh` sends it back without the core ever
//! seeing it.

use std::time::Duration;

use reqwest::RequestBuilder;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::backend::{AuthBackend, BoxFuture};
use crate::constants::{LOGIN_PATH, LOGOUT_PATH, PROFILE_PATH, REFRESH_PATH, REGISTER_PATH};
use crate::error::{ExchangeError, Result};
use crate::types::{Credential, LoginRequest, Principal, ProfilePatch, RegisterRequest, Session};

/// Body returned by login, register and refresh.
#[derive(Debug, Deserialize)]
struct SessionResponse {
    access_token: String,
    user: Principal,
}

impl From<SessionResponse> for Session {
    fn from(response: SessionResponse) -> Self {
        Session {
            credential: Credential::new(response.access_token),
            principal: response.user,
        }
    }
}

/// Auth API client over reqwest.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Build a backend with its own cookie-carrying client.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeError::Network(format!("building HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Use an existing client. It must keep a cookie store for `refresh`
    /// to carry the refresh credential.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn exchange<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| ExchangeError::Network(format!("{what} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            debug!(status = status.as_u16(), what, "exchange rejected");
            return Err(ExchangeError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ExchangeError::InvalidResponse(format!("{what} response: {e}")))
    }
}

impl AuthBackend for HttpBackend {
    fn login<'a>(&'a self, request: &'a LoginRequest) -> BoxFuture<'a, Result<Session>> {
        Box::pin(async move {
            let builder = self.client.post(self.url(LOGIN_PATH)).json(request);
            self.exchange::<SessionResponse>(builder, "login")
                .await
                .map(Session::from)
        })
    }

    fn register<'a>(&'a self, request: &'a RegisterRequest) -> BoxFuture<'a, Result<Session>> {
        Box::pin(async move {
            let builder = self.client.post(self.url(REGISTER_PATH)).json(request);
            self.exchange::<SessionResponse>(builder, "register")
                .await
                .map(Session::from)
        })
    }

    fn refresh(&self) -> BoxFuture<'_, Result<Session>> {
        Box::pin(async move {
            let builder = self.client.post(self.url(REFRESH_PATH));
            self.exchange::<SessionResponse>(builder, "refresh")
                .await
                .map(Session::from)
        })
    }

    fn logout_notify<'a>(
        &'a self,
        credential: Option<&'a Credential>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut builder = self.client.post(self.url(LOGOUT_PATH));
            if let Some(credential) = credential {
                builder = builder.bearer_auth(credential.expose());
            }
            let response = builder
                .send()
                .await
                .map_err(|e| ExchangeError::Network(format!("logout request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| String::from("<no body>"));
                return Err(ExchangeError::Status {
                    status: status.as_u16(),
                    message: error_message(&body),
                });
            }
            Ok(())
        })
    }

    fn fetch_profile<'a>(&'a self, credential: &'a Credential) -> BoxFuture<'a, Result<Principal>> {
        Box::pin(async move {
            let builder = self
                .client
                .get(self.url(PROFILE_PATH))
                .bearer_auth(credential.expose());
            self.exchange(builder, "profile").await
        })
    }

    fn update_profile<'a>(
        &'a self,
        credential: &'a Credential,
        patch: &'a ProfilePatch,
    ) -> BoxFuture<'a, Result<Principal>> {
        Box::pin(async move {
            let builder = self
                .client
                .patch(self.url(PROFILE_PATH))
                .bearer_auth(credential.expose())
                .json(patch);
            self.exchange(builder, "profile update").await
        })
    }
}

/// Pull a human-readable message out of an error body.
///
/// Checks `message`, `detail`, `error` (string) and `error.message`, in that
/// order. Falls back to the raw body.
fn error_message(body: &str) -> String {
    if let Ok(serde_json::Value::Object(fields)) = serde_json::from_str::<serde_json::Value>(body) {
        let found = ["message", "detail", "error"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(|v| v.as_str()))
            .or_else(|| {
                fields
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
            });
        if let Some(message) = found {
            return message.to_owned();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        String::from("<no body>")
    } else {
        trimmed.to_owned()
    }
}
