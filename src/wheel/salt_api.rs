//! salt-api (`rest_cherrypy`) transport for wheel key functions.
//!
//! Every call posts a one-chunk lowstate list to `<api_url>/run` carrying a
//! pre-issued eauth token. Synchronous wheel calls come back wrapped in an
//! event envelope (`{"tag": .., "data": {"return": .., "success": ..}}`);
//! the function's own return is unwrapped so callers see what an in-process
//! wheel client would hand back. Async submissions return `{tag, jid}`
//! untouched.
//!
use serde_json::{Value, json};
use std::cell::OnceCell;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{ClientError, Result, WheelClient};
use crate::cmd::minion::MinionId;
use crate::settings::Settings;

/// The default client useragent for salt-api requests
static USERAGENT: &str = concat!("modify-keys/", env!("CARGO_PKG_VERSION"));

const FUN_GEN_ACCEPT: &str = "key.gen_accept";
const FUN_DELETE: &str = "key.delete";
const FUN_DELETE_DICT: &str = "key.delete_dict";

#[derive(Debug)]
pub struct SaltApiClient {
    http: reqwest::Client,
    run_url: Url,
    token: String,
    rt: tokio::runtime::Runtime,
}

impl SaltApiClient {
    pub fn new(
        api_url: &Url,
        token: impl Into<String>,
        verify_tls: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .gzip(true)
            .user_agent(USERAGENT)
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .build()?;
        let run_url = run_endpoint(api_url)?;
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ClientError::Runtime)?;
        Ok(Self {
            http,
            run_url,
            token: token.into(),
            rt,
        })
    }

    /// Validate `settings` (url, token) and build a client from them.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_url = settings.api_url()?;
        let token = settings.token()?;
        Self::new(&api_url, token, settings.verify_tls, settings.timeout())
    }

    pub fn run_url(&self) -> &Url {
        &self.run_url
    }

    /// Post a single lowstate chunk and return the first entry of `return`.
    fn run(&self, chunk: Value) -> Result {
        self.rt.block_on(async {
            let response = self
                .http
                .post(self.run_url.clone())
                .header(reqwest::header::ACCEPT, "application/json")
                .json(&Value::Array(vec![chunk]))
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ClientError::Status { status, body });
            }
            let body = response.json::<Value>().await?;
            first_return(body)
        })
    }
}

impl WheelClient for SaltApiClient {
    fn gen_accept(&self, ids: &[MinionId]) -> Result {
        debug!(fun = FUN_GEN_ACCEPT, client = "wheel", count = ids.len(), "calling wheel");
        let ret = self.run(gen_accept_low(ids, &self.token))?;
        unwrap_wheel(ret)
    }

    fn delete_by_match(&self, pattern: &str) -> Result {
        debug!(fun = FUN_DELETE, client = "wheel_async", %pattern, "submitting job");
        let ack = self.run(delete_match_low(pattern, &self.token))?;
        log_submission(FUN_DELETE, &ack);
        Ok(ack)
    }

    fn delete_by_set(&self, ids: &[MinionId]) -> Result {
        debug!(fun = FUN_DELETE_DICT, client = "wheel_async", count = ids.len(), "submitting job");
        let ack = self.run(delete_set_low(ids, &self.token))?;
        log_submission(FUN_DELETE_DICT, &ack);
        Ok(ack)
    }
}

/// Defers settings load and client construction to the first backend call.
///
/// Invocations that never reach the backend (absent minion, help) need
/// neither a config file nor a token.
#[derive(Debug, Default)]
pub struct LazySaltApiClient {
    config: Option<PathBuf>,
    settings: OnceCell<Settings>,
    client: OnceCell<SaltApiClient>,
}

impl LazySaltApiClient {
    /// Settings come from `config` (or the default path) on first use.
    pub fn new(config: Option<PathBuf>) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: OnceCell::from(settings),
            ..Default::default()
        }
    }

    fn settings(&self) -> Result<&Settings> {
        if let Some(settings) = self.settings.get() {
            return Ok(settings);
        }
        let loaded = Settings::load(self.config.as_deref())?;
        Ok(self.settings.get_or_init(|| loaded))
    }

    fn client(&self) -> Result<&SaltApiClient> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let built = SaltApiClient::from_settings(self.settings()?)?;
        debug!(url = %built.run_url(), "salt-api client ready");
        Ok(self.client.get_or_init(|| built))
    }
}

impl WheelClient for LazySaltApiClient {
    fn gen_accept(&self, ids: &[MinionId]) -> Result {
        self.client()?.gen_accept(ids)
    }

    fn delete_by_match(&self, pattern: &str) -> Result {
        self.client()?.delete_by_match(pattern)
    }

    fn delete_by_set(&self, ids: &[MinionId]) -> Result {
        self.client()?.delete_by_set(ids)
    }
}

fn log_submission(fun: &str, ack: &Value) {
    let jid = ack.get("jid").and_then(Value::as_str).unwrap_or("<none>");
    info!(fun, jid, "job submitted; completion is not awaited");
}

/// Resolve `<base>/run`, keeping any path prefix on the base URL.
pub fn run_endpoint(base: &Url) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("run")
        .map_err(|e| ClientError::Envelope(format!("invalid api url {base}: {e}")))
}

pub fn gen_accept_low(ids: &[MinionId], token: &str) -> Value {
    json!({
        "client": "wheel",
        "fun": FUN_GEN_ACCEPT,
        "arg": ids,
        "token": token,
    })
}

pub fn delete_match_low(pattern: &str, token: &str) -> Value {
    json!({
        "client": "wheel_async",
        "fun": FUN_DELETE,
        "match": pattern,
        "token": token,
    })
}

pub fn delete_set_low(ids: &[MinionId], token: &str) -> Value {
    json!({
        "client": "wheel_async",
        "fun": FUN_DELETE_DICT,
        "match": { "minions": ids },
        "token": token,
    })
}

/// Take `return[0]` out of a salt-api response body.
pub fn first_return(body: Value) -> Result {
    let Value::Object(mut map) = body else {
        return Err(ClientError::Envelope("response is not an object".into()));
    };
    match map.remove("return") {
        Some(Value::Array(mut items)) if !items.is_empty() => Ok(items.swap_remove(0)),
        Some(_) => Err(ClientError::Envelope("`return` is empty or not a list".into())),
        None => Err(ClientError::Envelope("missing `return`".into())),
    }
}

/// Extract a wheel function's return value from its event envelope.
pub fn unwrap_wheel(ret: Value) -> Result {
    let Some(Value::Object(mut data)) = (match ret {
        Value::Object(mut m) => m.remove("data"),
        _ => None,
    }) else {
        return Err(ClientError::Envelope("missing wheel `data`".into()));
    };
    let value = data.remove("return").unwrap_or(Value::Null);
    if data.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(ClientError::Remote(value));
    }
    Ok(value)
}
