//! Blocking JSON-over-HTTPS plumbing shared by the provider clients

use crate::error::{PublishError, PublishResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::io::Read;
use std::time::Duration;
use tracing::debug;
use ureq::http::HeaderMap;
use ureq::unversioned::multipart::Form;
use ureq::Agent;

/// Global timeout for a single request, body included
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Method {
    Get,
    Post,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

/// Request payload
pub(crate) enum Payload<'a> {
    Empty,
    Bytes {
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

/// HTTP client bound to one provider API base URL.
///
/// Non-2xx answers become [`PublishError::Api`] carrying the provider
/// error code and any declared rate-limit reset; connection failures
/// become [`PublishError::Transport`].
#[derive(Debug, Clone)]
pub(crate) struct ApiClient {
    agent: Agent,
    base_url: String,
    provider: &'static str,
}

impl ApiClient {
    pub(crate) fn new(provider: &'static str, base_url: &str) -> Self {
        let config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .user_agent(concat!("pawgen-publish/", env!("CARGO_PKG_VERSION")))
            .build();

        Self {
            agent: Agent::new_with_config(config),
            base_url: base_url.trim_end_matches('/').to_string(),
            provider,
        }
    }

    pub(crate) fn provider(&self) -> &'static str {
        self.provider
    }

    /// Send a request and return the raw body of a 2xx answer
    pub(crate) fn send(
        &self,
        method: Method,
        path: &str,
        bearer: &str,
        payload: Payload<'_>,
    ) -> PublishResult<String> {
        let url = format!("{}{}", self.base_url, path);
        let auth = format!("Bearer {}", bearer);
        debug!("{} {} {}", self.provider, method, url);

        let result = match (method, payload) {
            (Method::Get, _) => self.agent.get(&url).header("Authorization", &auth).call(),
            (Method::Post, Payload::Empty) => self
                .agent
                .post(&url)
                .header("Authorization", &auth)
                .send_empty(),
            (Method::Put, Payload::Empty) => self
                .agent
                .put(&url)
                .header("Authorization", &auth)
                .send_empty(),
            (Method::Post, Payload::Bytes { content_type, bytes }) => self
                .agent
                .post(&url)
                .header("Authorization", &auth)
                .header("Content-Type", content_type)
                .send(bytes),
            (Method::Put, Payload::Bytes { content_type, bytes }) => self
                .agent
                .put(&url)
                .header("Authorization", &auth)
                .header("Content-Type", content_type)
                .send(bytes),
        };

        let mut response = result.map_err(|e| self.transport(e))?;
        let status = response.status().as_u16();
        let retry_after = retry_after(response.headers());
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| self.transport(e))?;

        if (200..300).contains(&status) {
            Ok(body)
        } else {
            debug!("{} answered {}: {}", self.provider, status, body);
            Err(api_error(self.provider, status, &body, retry_after))
        }
    }

    /// GET a JSON document
    pub(crate) fn get_json<T: DeserializeOwned>(&self, path: &str, bearer: &str) -> PublishResult<T> {
        let body = self.send(Method::Get, path, bearer, Payload::Empty)?;
        self.decode(&body)
    }

    /// Send a JSON body and decode the JSON answer
    pub(crate) fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        bearer: &str,
        body: &B,
    ) -> PublishResult<T> {
        let bytes = serde_json::to_vec(body)?;
        let answer = self.send(
            method,
            path,
            bearer,
            Payload::Bytes {
                content_type: "application/json",
                bytes: &bytes,
            },
        )?;
        self.decode(&answer)
    }

    pub(crate) fn decode<T: DeserializeOwned>(&self, body: &str) -> PublishResult<T> {
        serde_json::from_str(body).map_err(|e| {
            PublishError::protocol(self.provider, format!("undecodable response: {}", e))
        })
    }

    fn transport(&self, e: ureq::Error) -> PublishError {
        PublishError::Transport {
            provider: self.provider,
            message: e.to_string(),
        }
    }
}

/// Build an API error from a failed response body.
///
/// Understands Cloudflare envelopes (`errors: [{code, message}]`) and
/// Netlify errors (`{code, message}`); anything else is kept verbatim.
pub(crate) fn api_error(
    provider: &'static str,
    status: u16,
    body: &str,
    retry_after: Option<Duration>,
) -> PublishError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let first = parsed.as_ref().map(|v| {
        v.get("errors")
            .and_then(|e| e.get(0))
            .unwrap_or(v)
            .clone()
    });

    let code = first
        .as_ref()
        .and_then(|e| e.get("code"))
        .and_then(|c| c.as_u64());
    let message = first
        .as_ref()
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "empty response".to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        });

    PublishError::Api {
        provider,
        status,
        code,
        message,
        retry_after,
    }
}

/// Reset delay declared by `Retry-After` (seconds) or `X-RateLimit-Reset`
/// (epoch seconds)
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
    };

    if let Some(secs) = header("retry-after") {
        return Some(Duration::from_secs(secs.max(0) as u64));
    }
    header("x-ratelimit-reset").map(|reset| {
        let now = chrono::Utc::now().timestamp();
        Duration::from_secs((reset - now).max(0) as u64)
    })
}

/// Percent-encode each segment of a URL path, keeping the `/` separators
pub(crate) fn encode_path(path: &str) -> String {
    path.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

/// Render a multipart form into a content type and a body, so it goes
/// through [`ApiClient::send`] like any other payload
pub(crate) fn encode_form(mut form: Form<'_>) -> PublishResult<(String, Vec<u8>)> {
    let content_type = format!("multipart/form-data; boundary={}", form.boundary());
    let mut body = Vec::new();
    form.read_to_end(&mut body)
        .map_err(|e| PublishError::io("encoding multipart body", e))?;
    Ok((content_type, body))
}
