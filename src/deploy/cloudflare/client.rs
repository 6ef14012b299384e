//! Cloudflare Pages REST client

use crate::deploy::http::{encode_form, encode_path, ApiClient, Method, Payload};
use crate::error::{PublishError, PublishResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use ureq::unversioned::multipart::{Form, Part};

pub(crate) const PROVIDER: &str = "cloudflare";

/// One asset in an upload batch
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UploadEntry {
    /// cfdigest of the content
    pub key: String,
    /// Base64 content
    pub value: String,
    pub metadata: UploadMetadata,
    pub base64: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UploadMetadata {
    #[serde(rename = "contentType")]
    pub content_type: String,
}

/// Created deployment
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Deployment {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Cloudflare Pages API operations used by the deployer
pub trait PagesApi: Send + Sync {
    /// Fetch a short-lived upload JWT for the project
    fn upload_token(&self) -> PublishResult<String>;

    /// Digests among `hashes` the asset store does not have yet
    fn check_missing(&self, jwt: &str, hashes: &[String]) -> PublishResult<Vec<String>>;

    /// Upload one batch of assets
    fn upload(&self, jwt: &str, entries: &[UploadEntry]) -> PublishResult<()>;

    /// Mark digests as recently used
    fn upsert_hashes(&self, jwt: &str, hashes: &[String]) -> PublishResult<()>;

    /// Create a deployment from a path→digest manifest
    fn create_deployment(
        &self,
        manifest: &BTreeMap<String, String>,
        redirects: Option<&[u8]>,
    ) -> PublishResult<Deployment>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: Option<u64>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct UploadToken {
    jwt: String,
}

/// Cloudflare Pages client for one account and project
#[derive(Debug, Clone)]
pub struct PagesClient {
    http: ApiClient,
    api_token: String,
    account_id: String,
    project_name: String,
}

impl PagesClient {
    pub fn new(
        base_url: &str,
        api_token: impl Into<String>,
        account_id: impl Into<String>,
        project_name: impl Into<String>,
    ) -> Self {
        Self {
            http: ApiClient::new(PROVIDER, base_url),
            api_token: api_token.into(),
            account_id: account_id.into(),
            project_name: project_name.into(),
        }
    }

    fn project_path(&self, suffix: &str) -> String {
        format!(
            "/accounts/{}/pages/projects/{}{}",
            encode_path(&self.account_id),
            encode_path(&self.project_name),
            suffix
        )
    }

    /// Unwrap a `{success, errors, result}` envelope
    fn unwrap<T: DeserializeOwned>(&self, body: &str) -> PublishResult<Option<T>> {
        let envelope: Envelope<T> = self.http.decode(body)?;
        if !envelope.success {
            let first = envelope.errors.into_iter().next();
            return Err(PublishError::Api {
                provider: PROVIDER,
                status: 200,
                code: first.as_ref().and_then(|e| e.code),
                message: first
                    .map(|e| e.message)
                    .unwrap_or_else(|| "request was not successful".to_string()),
                retry_after: None,
            });
        }
        Ok(envelope.result)
    }

    fn require<T>(value: Option<T>, what: &str) -> PublishResult<T> {
        value.ok_or_else(|| PublishError::protocol(PROVIDER, format!("response has no {}", what)))
    }

    fn post_json(&self, path: &str, bearer: &str, body: &serde_json::Value) -> PublishResult<String> {
        let bytes = serde_json::to_vec(body)?;
        self.http.send(
            Method::Post,
            path,
            bearer,
            Payload::Bytes {
                content_type: "application/json",
                bytes: &bytes,
            },
        )
    }
}

impl PagesApi for PagesClient {
    fn upload_token(&self) -> PublishResult<String> {
        let body = self.http.send(
            Method::Get,
            &self.project_path("/upload-token"),
            &self.api_token,
            Payload::Empty,
        )?;
        let token: UploadToken = Self::require(self.unwrap(&body)?, "upload token")?;
        Ok(token.jwt)
    }

    fn check_missing(&self, jwt: &str, hashes: &[String]) -> PublishResult<Vec<String>> {
        let body = self.post_json(
            "/pages/assets/check-missing",
            jwt,
            &json!({ "hashes": hashes }),
        )?;
        Ok(self.unwrap::<Vec<String>>(&body)?.unwrap_or_default())
    }

    fn upload(&self, jwt: &str, entries: &[UploadEntry]) -> PublishResult<()> {
        let bytes = serde_json::to_vec(entries)?;
        let body = self.http.send(
            Method::Post,
            "/pages/assets/upload",
            jwt,
            Payload::Bytes {
                content_type: "application/json",
                bytes: &bytes,
            },
        )?;
        self.unwrap::<serde_json::Value>(&body)?;
        Ok(())
    }

    fn upsert_hashes(&self, jwt: &str, hashes: &[String]) -> PublishResult<()> {
        let body = self.post_json(
            "/pages/assets/upsert-hashes",
            jwt,
            &json!({ "hashes": hashes }),
        )?;
        self.unwrap::<serde_json::Value>(&body)?;
        Ok(())
    }

    fn create_deployment(
        &self,
        manifest: &BTreeMap<String, String>,
        redirects: Option<&[u8]>,
    ) -> PublishResult<Deployment> {
        let manifest = serde_json::to_string(manifest)?;
        let mut form = Form::new().text("manifest", &manifest);
        if let Some(redirects) = redirects {
            let part = Part::bytes(redirects)
                .file_name("_redirects")
                .mime_str("application/octet-stream")
                .map_err(|e| PublishError::protocol(PROVIDER, e.to_string()))?;
            form = form.part("_redirects", part);
        }
        let (content_type, bytes) = encode_form(form)?;

        let body = self.http.send(
            Method::Post,
            &self.project_path("/deployments"),
            &self.api_token,
            Payload::Bytes {
                content_type: &content_type,
                bytes: &bytes,
            },
        )?;
        Self::require(self.unwrap(&body)?, "deployment")
    }
}
