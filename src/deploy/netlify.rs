//! Netlify deployer
//!
//! Netlify deploys are digest-addressed: the client posts a path→SHA1
//! manifest, the server answers with the digests it does not have yet, and
//! only those files are uploaded. Progress is observed by polling the
//! deploy state; the deploy is done once one upload round has delivered
//! every required file, or when the state reaches `ready`.

use super::http::{encode_path, ApiClient, Method, Payload};
use super::item::DeployItem;
use super::retry::{Retrier, RetryPolicy};
use super::{DeploySummary, Deployer, Provider};
use crate::config::NetlifyConfig;
use crate::error::{PublishError, PublishResult};
use indicatif::ProgressBar;
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

const PROVIDER: &str = "netlify";

/// Deploy title sent when creating a deploy
const DEPLOY_TITLE: &str = "pawgen_deployer";

/// Server-side deploy states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployState {
    /// No deploy yet on the client side
    Init,
    Error,
    New,
    Uploading,
    Prepared,
    Processing,
    Preparing,
    Uploaded,
    Ready,
}

impl DeployState {
    /// Parse a state string; unknown states are a protocol error
    pub fn parse(s: &str) -> PublishResult<Self> {
        match s {
            "--init--" => Ok(Self::Init),
            "error" => Ok(Self::Error),
            "new" => Ok(Self::New),
            "uploading" => Ok(Self::Uploading),
            "prepared" => Ok(Self::Prepared),
            "processing" => Ok(Self::Processing),
            "preparing" => Ok(Self::Preparing),
            "uploaded" => Ok(Self::Uploaded),
            "ready" => Ok(Self::Ready),
            other => Err(PublishError::protocol(
                PROVIDER,
                format!("unknown deploy state '{}'", other),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "--init--",
            Self::Error => "error",
            Self::New => "new",
            Self::Uploading => "uploading",
            Self::Prepared => "prepared",
            Self::Processing => "processing",
            Self::Preparing => "preparing",
            Self::Uploaded => "uploaded",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for DeployState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Deploy resource as returned by the API
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeployInfo {
    pub id: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub required: Option<Vec<String>>,
    #[serde(default)]
    pub ssl_url: Option<String>,
}

/// Netlify API operations used by the deployer
pub trait NetlifyApi: Send + Sync {
    /// Most recent deploy of the site in `prepared` state, if any
    fn find_prepared(&self) -> PublishResult<Option<DeployInfo>>;

    /// Create an async deploy for a path→SHA1 manifest
    fn create_deploy(&self, files: &BTreeMap<String, String>) -> PublishResult<DeployInfo>;

    /// Fetch a deploy, including the digests it still requires
    fn get_deploy(&self, deploy_id: &str) -> PublishResult<DeployInfo>;

    /// Upload the content of one site path
    fn upload_file(&self, deploy_id: &str, path: &str, bytes: &[u8]) -> PublishResult<()>;

    /// Cancel a deploy
    fn cancel(&self, deploy_id: &str) -> PublishResult<()>;
}

/// Netlify REST client
#[derive(Debug, Clone)]
pub struct NetlifyClient {
    http: ApiClient,
    token: String,
    site_id: String,
}

impl NetlifyClient {
    pub fn new(base_url: &str, token: impl Into<String>, site_id: impl Into<String>) -> Self {
        Self {
            http: ApiClient::new(PROVIDER, base_url),
            token: token.into(),
            site_id: site_id.into(),
        }
    }
}

impl NetlifyApi for NetlifyClient {
    fn find_prepared(&self) -> PublishResult<Option<DeployInfo>> {
        let path = format!(
            "/sites/{}/deploys?state=prepared&per_page=1",
            encode_path(&self.site_id)
        );
        let deploys: Vec<DeployInfo> = self.http.get_json(&path, &self.token)?;
        Ok(deploys.into_iter().next())
    }

    fn create_deploy(&self, files: &BTreeMap<String, String>) -> PublishResult<DeployInfo> {
        let path = format!(
            "/sites/{}/deploys?title={}&async=true",
            encode_path(&self.site_id),
            DEPLOY_TITLE
        );
        let body = json!({ "async": true, "files": files });
        self.http.send_json(Method::Post, &path, &self.token, &body)
    }

    fn get_deploy(&self, deploy_id: &str) -> PublishResult<DeployInfo> {
        self.http
            .get_json(&format!("/deploys/{}", encode_path(deploy_id)), &self.token)
    }

    fn upload_file(&self, deploy_id: &str, path: &str, bytes: &[u8]) -> PublishResult<()> {
        let url = format!(
            "/deploys/{}/files{}",
            encode_path(deploy_id),
            encode_path(path)
        );
        self.http.send(
            Method::Put,
            &url,
            &self.token,
            Payload::Bytes {
                content_type: "application/octet-stream",
                bytes,
            },
        )?;
        Ok(())
    }

    fn cancel(&self, deploy_id: &str) -> PublishResult<()> {
        let url = format!("/deploys/{}/cancel", encode_path(deploy_id));
        self.http
            .send(Method::Post, &url, &self.token, Payload::Empty)?;
        Ok(())
    }
}

/// Client-side view of one deploy session
#[derive(Debug, Default)]
struct Session {
    deploy_id: Option<String>,
    uploaded: HashSet<String>,
    uploaded_bytes: u64,
    url: Option<String>,
}

enum Step {
    Continue,
    Done,
}

/// Drives a Netlify deploy from manifest to uploaded content
pub struct NetlifyDeployer<A: NetlifyApi = NetlifyClient> {
    api: A,
    retrier: Retrier,
    poll_interval: Duration,
    max_polls: u32,
    progress: ProgressBar,
}

impl NetlifyDeployer<NetlifyClient> {
    /// Build a deployer from configuration; token and site id are required
    pub fn from_config(config: &NetlifyConfig, max_attempts: u32) -> PublishResult<Self> {
        let token = config.token.as_deref().filter(|t| !t.is_empty()).ok_or(
            PublishError::MissingSetting {
                provider: PROVIDER,
                key: "token",
            },
        )?;
        let site_id = config.site_id.as_deref().filter(|s| !s.is_empty()).ok_or(
            PublishError::MissingSetting {
                provider: PROVIDER,
                key: "site_id",
            },
        )?;

        let policy = RetryPolicy::new(
            max_attempts,
            Duration::from_millis(config.initial_backoff_ms),
        );
        Ok(Self::new(
            NetlifyClient::new(&config.base_url, token, site_id),
            Retrier::new(policy),
        )
        .with_polling(
            Duration::from_secs(config.poll_interval_secs),
            config.max_polls,
        ))
    }
}

impl<A: NetlifyApi> NetlifyDeployer<A> {
    pub fn new(api: A, retrier: Retrier) -> Self {
        Self {
            api,
            retrier,
            poll_interval: Duration::from_secs(2),
            max_polls: 900,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report uploaded files on `bar`
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = bar;
        self
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = poll_interval;
        self.max_polls = max_polls;
        self
    }

    /// Apply one observed state to the session
    fn transition(
        &self,
        session: &mut Session,
        state: &str,
        manifest: &BTreeMap<String, String>,
        by_digest: &HashMap<String, &DeployItem>,
    ) -> PublishResult<Step> {
        use DeployState::*;

        let state = DeployState::parse(state)?;
        match (state, session.deploy_id.clone()) {
            (Init | Error, _) => {
                let deploy = self
                    .retrier
                    .exec("netlify create deploy", || self.api.create_deploy(manifest))?;
                info!("Created Netlify deploy {} ({} files)", deploy.id, manifest.len());
                session.deploy_id = Some(deploy.id);
                Ok(Step::Continue)
            }
            (New | Uploading, None) => Ok(Step::Done),
            // Done once every file required this round is uploaded
            (New | Uploading | Prepared, Some(id)) => {
                self.upload_round(session, &id, by_digest)?;
                Ok(Step::Done)
            }
            (Prepared, None) => Err(PublishError::protocol(
                PROVIDER,
                "prepared state without a deploy id",
            )),
            (Processing | Preparing | Uploaded, _) => Ok(Step::Continue),
            (Ready, _) => Ok(Step::Done),
        }
    }

    fn upload_round(
        &self,
        session: &mut Session,
        deploy_id: &str,
        by_digest: &HashMap<String, &DeployItem>,
    ) -> PublishResult<()> {
        let deploy = self
            .retrier
            .exec("netlify fetch required", || self.api.get_deploy(deploy_id))?;
        if deploy.ssl_url.is_some() {
            session.url = deploy.ssl_url.clone();
        }
        let required: Vec<String> = deploy
            .required
            .unwrap_or_default()
            .into_iter()
            .filter(|sha| !session.uploaded.contains(sha))
            .collect();

        if required.is_empty() {
            debug!("Deploy {} requires no uploads", deploy_id);
            return Ok(());
        }
        info!("Uploading {} files to deploy {}", required.len(), deploy_id);
        self.progress.inc_length(required.len() as u64);

        for sha in required {
            let item = by_digest.get(&sha).ok_or_else(|| {
                PublishError::protocol(PROVIDER, format!("deploy requires unknown digest {}", sha))
            })?;
            let bytes = item.read_all()?;
            let site_path = item.site_path();

            let uploaded = self.retrier.exec("netlify upload file", || {
                self.api.upload_file(deploy_id, &site_path, &bytes)
            });
            if let Err(e) = uploaded {
                if e.status() == Some(422) {
                    warn!("Netlify rejected {}; cancelling deploy {}", site_path, deploy_id);
                    if let Err(cancel) = self
                        .retrier
                        .exec("netlify cancel deploy", || self.api.cancel(deploy_id))
                    {
                        warn!("Failed to cancel deploy {}: {}", deploy_id, cancel);
                    }
                }
                return Err(e);
            }

            debug!("Uploaded {} ({} bytes)", site_path, bytes.len());
            session.uploaded_bytes += bytes.len() as u64;
            session.uploaded.insert(sha);
            self.progress.inc(1);
        }
        Ok(())
    }
}

impl<A: NetlifyApi> Deployer for NetlifyDeployer<A> {
    fn provider(&self) -> Provider {
        Provider::Netlify
    }

    fn deploy(&self, items: &[DeployItem]) -> PublishResult<DeploySummary> {
        let manifest: BTreeMap<String, String> = items
            .iter()
            .map(|i| (i.site_path(), i.digests().sha1_hex()))
            .collect();
        let mut by_digest: HashMap<String, &DeployItem> = HashMap::new();
        for item in items {
            by_digest.entry(item.digests().sha1_hex()).or_insert(item);
        }

        let mut session = Session::default();
        let mut state = match self
            .retrier
            .exec("netlify find prepared deploy", || self.api.find_prepared())?
        {
            Some(deploy) => {
                info!("Resuming prepared Netlify deploy {}", deploy.id);
                session.deploy_id = Some(deploy.id);
                deploy.state
            }
            None => DeployState::Init.as_str().to_string(),
        };

        let mut polls = 0;
        loop {
            if let Step::Done = self.transition(&mut session, &state, &manifest, &by_digest)? {
                break;
            }

            let deploy_id = session
                .deploy_id
                .clone()
                .ok_or_else(|| PublishError::protocol(PROVIDER, "no deploy id to poll"))?;
            if polls >= self.max_polls {
                return Err(PublishError::DeployTimedOut { deploy_id, polls });
            }
            polls += 1;
            self.retrier.sleep(self.poll_interval);

            let deploy = self
                .retrier
                .exec("netlify poll deploy", || self.api.get_deploy(&deploy_id))?;
            debug!("Deploy {} is {} (poll {})", deploy_id, deploy.state, polls);
            if deploy.ssl_url.is_some() {
                session.url = deploy.ssl_url;
            }
            state = deploy.state;
        }

        self.progress.finish_and_clear();
        let uploaded_files = session.uploaded.len();
        info!(
            "Netlify deploy {} finished: {} uploaded, {} unchanged",
            session.deploy_id.as_deref().unwrap_or("-"),
            uploaded_files,
            items.len().saturating_sub(uploaded_files)
        );
        Ok(DeploySummary {
            deploy_id: session.deploy_id.unwrap_or_default(),
            uploaded_files,
            uploaded_bytes: session.uploaded_bytes,
            skipped_files: items.len().saturating_sub(uploaded_files),
            url: session.url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// In-memory Netlify: stores content by SHA1 and plays back a state script
    #[derive(Default)]
    struct FakeNetlify {
        prepared: Mutex<Option<DeployInfo>>,
        script: Mutex<VecDeque<&'static str>>,
        stored: Mutex<HashSet<String>>,
        manifest: Mutex<BTreeMap<String, String>>,
        uploads: Mutex<Vec<String>>,
        cancelled: Mutex<Vec<String>>,
        reject_uploads: bool,
    }

    impl FakeNetlify {
        fn scripted(states: &[&'static str]) -> Self {
            Self {
                script: Mutex::new(states.iter().copied().collect()),
                ..Default::default()
            }
        }

        fn required(&self) -> Vec<String> {
            let stored = self.stored.lock();
            let mut required: Vec<String> = self
                .manifest
                .lock()
                .values()
                .filter(|sha| !stored.contains(*sha))
                .cloned()
                .collect();
            required.sort();
            required.dedup();
            required
        }
    }

    impl NetlifyApi for Arc<FakeNetlify> {
        fn find_prepared(&self) -> PublishResult<Option<DeployInfo>> {
            Ok(self.prepared.lock().take())
        }

        fn create_deploy(&self, files: &BTreeMap<String, String>) -> PublishResult<DeployInfo> {
            *self.manifest.lock() = files.clone();
            Ok(DeployInfo {
                id: "deploy-1".to_string(),
                state: "new".to_string(),
                ..Default::default()
            })
        }

        fn get_deploy(&self, deploy_id: &str) -> PublishResult<DeployInfo> {
            let state = self.script.lock().pop_front().unwrap_or("ready");
            Ok(DeployInfo {
                id: deploy_id.to_string(),
                state: state.to_string(),
                required: Some(self.required()),
                ssl_url: Some("https://site.netlify.app".to_string()),
            })
        }

        fn upload_file(&self, _deploy_id: &str, path: &str, bytes: &[u8]) -> PublishResult<()> {
            if self.reject_uploads {
                return Err(PublishError::Api {
                    provider: PROVIDER,
                    status: 422,
                    code: None,
                    message: "unprocessable".to_string(),
                    retry_after: None,
                });
            }
            self.uploads.lock().push(path.to_string());
            let item = DeployItem::from_bytes(path, bytes.to_vec());
            self.stored.lock().insert(item.digests().sha1_hex());
            Ok(())
        }

        fn cancel(&self, deploy_id: &str) -> PublishResult<()> {
            self.cancelled.lock().push(deploy_id.to_string());
            Ok(())
        }
    }

    fn deployer(
        fake: &Arc<FakeNetlify>,
        max_polls: u32,
    ) -> (NetlifyDeployer<Arc<FakeNetlify>>, Arc<Mutex<Vec<Duration>>>) {
        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sleeps);
        let retrier = Retrier::new(RetryPolicy::new(3, Duration::from_millis(1)))
            .with_sleep(move |d| sink.lock().push(d));
        let deployer = NetlifyDeployer::new(Arc::clone(fake), retrier)
            .with_polling(Duration::from_secs(2), max_polls);
        (deployer, sleeps)
    }

    fn site() -> Vec<DeployItem> {
        vec![
            DeployItem::from_bytes("index.html", b"<h1>home</h1>".to_vec()),
            DeployItem::from_bytes("about/index.html", b"<h1>about</h1>".to_vec()),
            DeployItem::from_bytes("copy/index.html", b"<h1>home</h1>".to_vec()),
        ]
    }

    #[test]
    fn state_parsing() {
        assert_eq!(DeployState::parse("ready").unwrap(), DeployState::Ready);
        assert_eq!(DeployState::parse("--init--").unwrap(), DeployState::Init);
        assert!(matches!(
            DeployState::parse("exploded").unwrap_err(),
            PublishError::Protocol { .. }
        ));
    }

    #[test]
    fn fresh_deploy_uploads_each_digest_once() {
        let fake = Arc::new(FakeNetlify::scripted(&["prepared", "processing", "ready"]));
        let (deployer, _) = deployer(&fake, 10);

        let summary = deployer.deploy(&site()).unwrap();

        assert_eq!(summary.deploy_id, "deploy-1");
        assert_eq!(summary.uploaded_files, 2);
        assert_eq!(summary.skipped_files, 1);
        assert_eq!(summary.url.as_deref(), Some("https://site.netlify.app"));
        assert_eq!(fake.uploads.lock().len(), 2);
        assert_eq!(fake.manifest.lock().len(), 3);
        assert!(fake.manifest.lock().contains_key("/about/index.html"));
    }

    #[test]
    fn upload_round_completes_without_waiting_for_ready() {
        let fake = Arc::new(FakeNetlify::scripted(&[
            "prepared", "uploaded", "uploaded", "uploaded", "uploaded",
        ]));
        let (deployer, sleeps) = deployer(&fake, 2);

        let summary = deployer.deploy(&site()).unwrap();

        assert_eq!(summary.uploaded_files, 2);
        assert_eq!(summary.url.as_deref(), Some("https://site.netlify.app"));
        assert_eq!(sleeps.lock().len(), 1);
    }

    #[test]
    fn redeploy_uploads_nothing() {
        let fake = Arc::new(FakeNetlify::scripted(&["prepared", "ready"]));
        let (deployer, _) = deployer(&fake, 10);
        deployer.deploy(&site()).unwrap();
        let first = fake.uploads.lock().len();

        fake.script.lock().extend(["prepared", "ready"]);
        let summary = deployer.deploy(&site()).unwrap();

        assert_eq!(summary.uploaded_files, 0);
        assert_eq!(fake.uploads.lock().len(), first);
    }

    #[test]
    fn processing_is_never_done() {
        let fake = Arc::new(FakeNetlify::scripted(&["processing"; 50]));
        let (deployer, sleeps) = deployer(&fake, 5);

        let err = deployer.deploy(&site()).unwrap_err();

        match err {
            PublishError::DeployTimedOut { deploy_id, polls } => {
                assert_eq!(deploy_id, "deploy-1");
                assert_eq!(polls, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*sleeps.lock(), vec![Duration::from_secs(2); 5]);
    }

    #[test]
    fn resumes_prepared_deploy() {
        let fake = Arc::new(FakeNetlify::scripted(&["ready"]));
        *fake.manifest.lock() = site()
            .iter()
            .map(|i| (i.site_path(), i.digests().sha1_hex()))
            .collect();
        *fake.prepared.lock() = Some(DeployInfo {
            id: "deploy-0".to_string(),
            state: "prepared".to_string(),
            ..Default::default()
        });
        let (deployer, _) = deployer(&fake, 10);

        let summary = deployer.deploy(&site()).unwrap();

        assert_eq!(summary.deploy_id, "deploy-0");
        assert_eq!(summary.uploaded_files, 2);
    }

    #[test]
    fn rejected_upload_cancels_deploy() {
        let fake = Arc::new(FakeNetlify {
            reject_uploads: true,
            ..FakeNetlify::scripted(&["prepared"])
        });
        let (deployer, _) = deployer(&fake, 10);

        let err = deployer.deploy(&site()).unwrap_err();

        assert_eq!(err.status(), Some(422));
        assert_eq!(*fake.cancelled.lock(), vec!["deploy-1".to_string()]);
    }

    #[test]
    fn unknown_state_is_protocol_error() {
        let fake = Arc::new(FakeNetlify::scripted(&["on-fire"]));
        let (deployer, _) = deployer(&fake, 10);

        assert!(matches!(
            deployer.deploy(&site()).unwrap_err(),
            PublishError::Protocol { .. }
        ));
    }

    #[test]
    fn error_state_recreates_deploy() {
        let fake = Arc::new(FakeNetlify::scripted(&["error", "prepared", "ready"]));
        let (deployer, _) = deployer(&fake, 10);

        let summary = deployer.deploy(&site()).unwrap();

        assert_eq!(summary.uploaded_files, 2);
    }

    #[test]
    fn missing_settings_fail_construction() {
        let config = NetlifyConfig {
            token: Some("t".to_string()),
            site_id: None,
            ..Default::default()
        };
        assert!(matches!(
            NetlifyDeployer::from_config(&config, 3).err(),
            Some(PublishError::MissingSetting { key: "site_id", .. })
        ));
    }

    mod wire {
        use super::*;
        use httpmock::Method::{GET, POST, PUT};
        use httpmock::MockServer;

        fn client(server: &MockServer) -> NetlifyClient {
            NetlifyClient::new(&server.base_url(), "tok", "site-1")
        }

        fn fast_retrier() -> Retrier {
            Retrier::new(RetryPolicy::new(2, Duration::from_millis(1))).with_sleep(|_| {})
        }

        #[test]
        fn resumed_deploy_uploads_required_files() {
            let server = MockServer::start();
            let item = DeployItem::from_bytes("index.html", b"hello".to_vec());
            let sha = item.digests().sha1_hex();

            let lookup = server.mock(|when, then| {
                when.method(GET)
                    .path("/sites/site-1/deploys")
                    .query_param("state", "prepared")
                    .query_param("per_page", "1")
                    .header("authorization", "Bearer tok");
                then.status(200)
                    .body(r#"[{"id":"d1","state":"prepared"}]"#);
            });
            let poll = server.mock(|when, then| {
                when.method(GET).path("/deploys/d1");
                then.status(200).body(format!(
                    r#"{{"id":"d1","state":"ready","required":["{}"],"ssl_url":null}}"#,
                    sha
                ));
            });
            let upload = server.mock(|when, then| {
                when.method(PUT)
                    .path("/deploys/d1/files/index.html")
                    .header("content-type", "application/octet-stream")
                    .body("hello");
                then.status(200).body(r#"{"size":5}"#);
            });

            let deployer = NetlifyDeployer::new(client(&server), fast_retrier());
            let summary = deployer.deploy(&[item]).unwrap();

            lookup.assert();
            upload.assert_hits(1);
            poll.assert_hits(1);
            assert_eq!(summary.uploaded_files, 1);
        }

        #[test]
        fn create_posts_manifest() {
            let server = MockServer::start();
            let item = DeployItem::from_bytes("index.html", b"hello".to_vec());

            server.mock(|when, then| {
                when.method(GET).path("/sites/site-1/deploys");
                then.status(200).body("[]");
            });
            let create = server.mock(|when, then| {
                when.method(POST)
                    .path("/sites/site-1/deploys")
                    .query_param("title", "pawgen_deployer")
                    .query_param("async", "true")
                    .json_body(json!({
                        "async": true,
                        "files": { "/index.html": item.digests().sha1_hex() }
                    }));
                then.status(200).body(r#"{"id":"d2","state":"new"}"#);
            });
            server.mock(|when, then| {
                when.method(GET).path("/deploys/d2");
                then.status(200).body(r#"{"id":"d2","state":"ready","required":[]}"#);
            });

            let deployer = NetlifyDeployer::new(client(&server), fast_retrier());
            let summary = deployer.deploy(&[item]).unwrap();

            create.assert();
            assert_eq!(summary.deploy_id, "d2");
            assert_eq!(summary.uploaded_files, 0);
        }

        #[test]
        fn unprocessable_upload_cancels_over_the_wire() {
            let server = MockServer::start();
            let item = DeployItem::from_bytes("bad.html", b"bad".to_vec());
            let sha = item.digests().sha1_hex();

            server.mock(|when, then| {
                when.method(GET).path("/sites/site-1/deploys");
                then.status(200).body(r#"[{"id":"d3","state":"prepared"}]"#);
            });
            server.mock(|when, then| {
                when.method(GET).path("/deploys/d3");
                then.status(200)
                    .body(format!(r#"{{"id":"d3","state":"prepared","required":["{}"]}}"#, sha));
            });
            server.mock(|when, then| {
                when.method(PUT).path("/deploys/d3/files/bad.html");
                then.status(422).body(r#"{"code":422,"message":"invalid file"}"#);
            });
            let cancel = server.mock(|when, then| {
                when.method(POST).path("/deploys/d3/cancel");
                then.status(200).body(r#"{"id":"d3"}"#);
            });

            let deployer = NetlifyDeployer::new(client(&server), fast_retrier());
            let err = deployer.deploy(&[item]).unwrap_err();

            cancel.assert();
            assert_eq!(err.status(), Some(422));
        }
    }
}
