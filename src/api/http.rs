//! Purpose: HTTP/JSON transport for graph APIs.
//! Exports: `HttpTransport`.
//! Role: Concrete `Transport`; blocking ureq agent driven from tokio's blocking pool.
//! Invariants: Locally built paths resolve under the base url (and api version prefix).
//! Invariants: Server-issued continuation urls are used verbatim.
//! Invariants: GET/DELETE params travel in the query string, POST params as a form body.
#![allow(clippy::result_large_err)]

use crate::core::error::{Error, ErrorKind};
use crate::core::transport::{
    Method, Params, RequestPath, SharedTransport, Transport, set_default_transport,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

type ApiResult<T> = Result<T, Error>;

#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<HttpTransportInner>,
}

#[derive(Clone)]
struct HttpTransportInner {
    base_url: Url,
    version: Option<String>,
    token: Option<String>,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: RemoteError,
}

#[derive(Deserialize)]
struct RemoteError {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<i64>,
    error_subcode: Option<i64>,
    fbtrace_id: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let agent = ureq::AgentBuilder::new().build();
        Ok(Self {
            inner: Arc::new(HttpTransportInner {
                base_url,
                version: None,
                token: None,
                agent,
            }),
        })
    }

    /// Access token sent as a bearer credential on every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).token = Some(token.into());
        self
    }

    /// Path segment prefixed to locally built paths, e.g. `v19.0`.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        let version = version.trim_matches('/');
        Arc::make_mut(&mut self.inner).version =
            (!version.is_empty()).then(|| version.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        Arc::make_mut(&mut self.inner).agent = ureq::AgentBuilder::new().timeout(timeout).build();
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Registers this transport as the process-wide default and returns the shared handle.
    pub fn install_default(self) -> SharedTransport {
        let shared: SharedTransport = Arc::new(self);
        set_default_transport(shared.clone());
        shared
    }

    fn call_blocking(
        &self,
        method: Method,
        path: &RequestPath,
        params: &Params,
    ) -> ApiResult<Value> {
        let mut url = self.resolve(path)?;
        if method != Method::Post && !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, &param_value(value));
            }
        }

        let mut request = self
            .inner
            .agent
            .request(method.as_str(), url.as_str())
            .set("Accept", "application/json");
        // Credentials only travel to the configured origin.
        if let Some(token) = &self.inner.token {
            if url.origin() == self.inner.base_url.origin() {
                request = request.set("Authorization", &format!("Bearer {token}"));
            } else {
                debug!(url = %url, "withholding token from foreign origin");
            }
        }

        let response = if method == Method::Post {
            let form: Vec<(String, String)> = params
                .iter()
                .map(|(key, value)| (key.clone(), param_value(value)))
                .collect();
            let form: Vec<(&str, &str)> = form
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str()))
                .collect();
            request.send_form(&form)
        } else {
            request.call()
        };

        match response {
            Ok(resp) => read_json_response(resp),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(error_from_body(code, &body).with_path(path.to_string()))
            }
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
                .with_message("request failed")
                .with_path(path.to_string())
                .with_source(err)),
        }
    }

    /// Base for relative continuation tokens: base path plus version, with a
    /// trailing slash. Tokens starting with `/` stay host-absolute.
    fn relative_base(&self) -> Url {
        let mut url = self.inner.base_url.clone();
        let mut path = url.path().trim_end_matches('/').to_string();
        if let Some(version) = &self.inner.version {
            path.push('/');
            path.push_str(version);
        }
        path.push('/');
        url.set_path(&path);
        url
    }

    fn resolve(&self, path: &RequestPath) -> ApiResult<Url> {
        match path {
            RequestPath::Segments(segments) => {
                let mut all: Vec<&str> = Vec::with_capacity(segments.len() + 1);
                if let Some(version) = &self.inner.version {
                    all.push(version);
                }
                all.extend(segments.iter().map(String::as_str));
                build_url(&self.inner.base_url, &all)
            }
            RequestPath::Absolute(token) => {
                let url = Url::parse(token)
                    .or_else(|_| self.relative_base().join(token))
                    .map_err(|err| {
                        Error::new(ErrorKind::Decode)
                            .with_message("invalid continuation url")
                            .with_path(token.clone())
                            .with_source(err)
                    })?;
                ensure_http_scheme(&url, "continuation url")?;
                Ok(url)
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, method: Method, path: &RequestPath, params: &Params) -> ApiResult<Value> {
        debug!(%method, path = %path, params = params.len(), "graph request");
        let transport = self.clone();
        let path = path.clone();
        let params = params.clone();
        tokio::task::spawn_blocking(move || transport.call_blocking(method, &path, &params))
            .await
            .map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("transport task failed")
                    .with_source(err)
            })?
    }
}

fn normalize_base_url(raw: String) -> ApiResult<Url> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Config)
            .with_message("invalid graph base url")
            .with_source(err)
    })?;
    ensure_http_scheme(&url, "graph base url")?;
    if url.cannot_be_a_base() {
        return Err(Error::new(ErrorKind::Config).with_message("graph base url cannot be a base"));
    }
    let trimmed = url.path().trim_end_matches('/').to_string();
    url.set_path(if trimmed.is_empty() { "/" } else { &trimmed });
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn ensure_http_scheme(url: &Url, what: &str) -> ApiResult<()> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(Error::new(ErrorKind::Config).with_message(format!(
            "{what} must use http or https scheme"
        ))),
    }
}

fn build_url(base_url: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = base_url.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::Config).with_message("graph base url cannot be a base")
        })?;
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

fn param_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn read_json_response(response: ureq::Response) -> ApiResult<Value> {
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_source(err)
    })?;
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|err| {
        Error::new(ErrorKind::Decode)
            .with_message("invalid response json")
            .with_source(err)
    })
}

fn error_from_body(status: u16, body: &str) -> Error {
    let kind = error_kind_from_status(status);
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return Error::new(kind)
            .with_message(format!("remote error status {status}"))
            .with_status(status);
    };
    let remote = envelope.error;
    let mut message = remote
        .message
        .unwrap_or_else(|| format!("remote error status {status}"));
    if let Some(kind) = remote.kind {
        message = format!("{kind}: {message}");
    }
    let mut err = Error::new(kind).with_message(message).with_status(status);
    if let Some(code) = remote.code {
        err = err.with_code(code);
    }
    match (remote.error_subcode, remote.fbtrace_id) {
        (Some(subcode), Some(trace)) => {
            err = err.with_hint(format!("subcode {subcode}, trace id {trace}"))
        }
        (Some(subcode), None) => err = err.with_hint(format!("subcode {subcode}")),
        (None, Some(trace)) => err = err.with_hint(format!("trace id {trace}")),
        (None, None) => {}
    }
    err
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 | 413 | 422 => ErrorKind::Usage,
        401 | 403 => ErrorKind::Permission,
        404 => ErrorKind::NotFound,
        429 => ErrorKind::RateLimited,
        _ => ErrorKind::Remote,
    }
}
