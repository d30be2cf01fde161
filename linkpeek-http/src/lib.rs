//! Page fetcher with safe logging and an optional retry budget.
//!
//! - One GET per call; the body is kept as raw bytes so the caller decides
//!   how to decode it
//! - Response metadata (status, headers, MIME type, charset) travels with the
//!   body in [`FetchResult`], including for non-2xx answers
//! - Timeouts and cancellation surface as their own [`HttpError`] variants
//! - Optional *raw* request/response logging via `LINKPEEK_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust,no_run
//! # async fn demo() -> Result<(), linkpeek_http::HttpError> {
//! let client = linkpeek_http::HttpClient::new()?;
//! let page = client
//!     .fetch("https://example.com/", linkpeek_http::RequestOpts::default())
//!     .await?;
//! println!("{} {:?}", page.status, page.mime_type);
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers, body snippets (truncated), retries and final errors.
//! Secret-looking query parameters are redacted before they reach a log line.

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode, redirect};
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

pub use reqwest::Url;

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "LINKPEEK_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024; // cap raw body logs (64 KiB)
const MAX_REDIRECTS: usize = 10;
/// Bodies are read up to this many bytes unless [`RequestOpts::max_body`] says otherwise.
pub const DEFAULT_MAX_BODY: usize = 8 * 1024 * 1024;

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

/// Render a best-effort curl command for repro/debug. The query string is
/// rendered from the redacted pairs, never from the original URL.
fn make_curl(url: &Url, headers: &HeaderMap) -> String {
    let mut parts = vec!["curl".to_string(), "-XGET".to_string()];
    for (name, val) in redact_headers(headers) {
        parts.push(format!("-H '{}: {}'", name, val.replace('\'', r"'\''")));
    }
    parts.push(format!("'{}'", redacted(url)));
    parts.join(" ")
}

/// Loggable form of `url`: secret-looking query values are replaced and
/// credentials and fragment are dropped.
///
/// ```
/// use linkpeek_http::{Url, redacted};
///
/// let url = Url::parse("https://user:pw@ex.com:8443/p?q=1&token=abc#frag").unwrap();
/// assert_eq!(redacted(&url), "https://ex.com:8443/p?q=1&token=<redacted>");
/// ```
pub fn redacted(url: &Url) -> String {
    let (_, query) = redact_query(url);
    let mut target = format!("{}://{}", url.scheme(), url.host_str().unwrap_or("-"));
    if let Some(port) = url.port() {
        target.push_str(&format!(":{port}"));
    }
    target.push_str(url.path());
    if !query.is_empty() {
        let rendered: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
        target.push('?');
        target.push_str(&rendered.join("&"));
    }
    target
}

/// [`redacted`] for caller-supplied text. An address that does not parse
/// loses its whole query.
pub fn redacted_address(address: &str) -> String {
    match Url::parse(address.trim()) {
        Ok(url) => redacted(&url),
        Err(_) => address
            .split_once('?')
            .map_or(address, |(head, _)| head)
            .to_string(),
    }
}

/// Redact sensitive headers for logging
fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let mut val = v.to_str().unwrap_or("").to_string();
            if key.eq_ignore_ascii_case("authorization") || key.eq_ignore_ascii_case("cookie") {
                val = "<redacted>".into();
            }
            (key, val)
        })
        .collect()
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    /// The address did not parse as an absolute http(s) URL. Raised before any I/O.
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request cancelled")]
    Cancelled,
    /// The server answered outside `[200, 300)`. The full response is kept so
    /// callers can still classify it.
    #[error("server returned {status} for {}", status_target(.response))]
    Status {
        status: StatusCode,
        response: Box<FetchResult>,
    },
}

fn status_target(response: &FetchResult) -> String {
    redacted(&response.final_url)
}

// ==============================
// Fetch result & request options
// ==============================

/// Raw body plus the response metadata needed for content classification.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Address as requested.
    pub url: Url,
    /// Address after redirects.
    pub final_url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Lowercased `type/subtype` from `Content-Type`, parameters stripped.
    pub mime_type: Option<String>,
    /// Lowercased `charset` parameter from `Content-Type`, if declared.
    pub charset: Option<String>,
}

impl FetchResult {
    pub fn new(
        url: Url,
        final_url: Url,
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        let mime_type = content_type.and_then(mime_essence);
        let charset = content_type.and_then(charset_param);
        Self {
            url,
            final_url,
            status,
            headers,
            body,
            mime_type,
            charset,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// `text/html; charset=UTF-8` -> `text/html`
pub fn mime_essence(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim();
    if essence.is_empty() || !essence.contains('/') {
        return None;
    }
    Some(essence.to_ascii_lowercase())
}

/// `text/html; charset="UTF-8"` -> `utf-8`
pub fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        (!value.is_empty()).then(|| value.to_ascii_lowercase())
    })
}

/// Per-request tuning knobs for the fetcher.
///
/// ```
/// use linkpeek_http::RequestOpts;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     validate_status: false,
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(opts.retries.is_none());
/// ```
#[derive(Clone, Debug)]
pub struct RequestOpts {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub headers: Option<HeaderMap>,
    /// When true, a non-2xx answer is returned as [`HttpError::Status`].
    pub validate_status: bool,
    /// Stop reading the body after this many bytes.
    pub max_body: Option<usize>,
}

impl Default for RequestOpts {
    fn default() -> Self {
        Self {
            timeout: None,
            retries: None,
            headers: None,
            validate_status: true,
            max_body: None,
        }
    }
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Construct a client with the default user agent and connect timeout.
    ///
    /// ```no_run
    /// use linkpeek_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new()?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 0);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new() -> Result<Self, HttpError> {
        Self::configured(Duration::from_secs(5), None)
    }

    /// Construct a client with an explicit connect timeout and user agent.
    pub fn configured(
        connect_timeout: Duration,
        user_agent: Option<&str>,
    ) -> Result<Self, HttpError> {
        let ua = user_agent
            .map(str::to_string)
            .unwrap_or_else(|| format!("linkpeek/{}", env!("CARGO_PKG_VERSION")));
        let inner = Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(ua)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 0,
        })
    }

    /// Override the default timeout returned by [`HttpClient::new`].
    ///
    /// ```no_run
    /// use linkpeek_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new()?.with_timeout(Duration::from_secs(2));
    /// assert_eq!(client.default_timeout, Duration::from_secs(2));
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Override the retry budget. The default is no retries.
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    /// GET `address`, racing the request against `cancel`.
    ///
    /// Dropping the in-flight request on cancellation aborts the transfer; the
    /// caller sees [`HttpError::Cancelled`] and no partial body.
    pub async fn fetch_cancellable(
        &self,
        address: &str,
        opts: RequestOpts,
        cancel: &CancellationToken,
    ) -> Result<FetchResult, HttpError> {
        let url = parse_address(address)?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(host_path=%redact_query(&url).0, "http.cancelled");
                Err(HttpError::Cancelled)
            }
            res = self.fetch_url(url.clone(), opts) => res,
        }
    }

    /// GET `address` and return the raw body with its response metadata.
    pub async fn fetch(&self, address: &str, opts: RequestOpts) -> Result<FetchResult, HttpError> {
        let url = parse_address(address)?;
        self.fetch_url(url, opts).await
    }

    // ==============================
    // Core request implementation
    // ==============================

    async fn fetch_url(&self, url: Url, opts: RequestOpts) -> Result<FetchResult, HttpError> {
        let mut attempt = 0usize;
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let max_body = opts.max_body.unwrap_or(DEFAULT_MAX_BODY);
        let req_id = format!("r{:x}", REQUEST_SEQ.fetch_add(1, Ordering::Relaxed));
        let (host_path, redacted_q) = redact_query(&url);

        loop {
            let mut rb = self.inner.request(Method::GET, url.clone()).timeout(timeout);
            if let Some(hdrs) = &opts.headers {
                rb = rb.headers(hdrs.clone());
            }

            tracing::debug!(
                req_id=%req_id,
                attempt=attempt + 1,
                max_retries,
                host_path=%host_path,
                query=?redacted_q,
                timeout_ms=timeout.as_millis() as u64,
                "http.request.start"
            );

            if raw_enabled() {
                let curl = make_curl(&url, opts.headers.as_ref().unwrap_or(&HeaderMap::new()));
                tracing::debug!(target: "http.raw", %req_id, %curl, "request");
            }

            // ----- Send -----
            let t0 = std::time::Instant::now();
            let resp = match rb.send().await {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%err,
                            "http.retrying.network_send"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(
                        req_id=%req_id,
                        attempt,
                        message=%err,
                        "http.network_error.send"
                    );
                    return Err(classify_transport(err));
                }
            };
            let status = resp.status();
            let final_url = resp.url().clone();
            let headers = resp.headers().clone();
            let (bytes, truncated) = match read_capped(resp, max_body).await {
                Ok(read) => read,
                Err(err) => {
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%err,
                            "http.retrying.network_body"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(
                        req_id=%req_id,
                        attempt,
                        message=%err,
                        "http.network_error.body"
                    );
                    return Err(classify_transport(err));
                }
            };
            let dur_ms = t0.elapsed().as_millis() as u64;

            tracing::debug!(
                req_id=%req_id,
                %status,
                duration_ms=dur_ms,
                body_len=bytes.len(),
                truncated,
                declared_len=content_len(&headers, bytes.len()),
                content_type=?headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
                redirected=%(final_url != url),
                "http.response.headers"
            );

            if raw_enabled() {
                let hdrs = redact_headers(&headers);
                let truncated = bytes.len() > RAW_MAX_BODY;
                let text = String::from_utf8_lossy(&bytes[..bytes.len().min(RAW_MAX_BODY)]);
                tracing::info!(
                    target: "http.raw",
                    %req_id,
                    status=%status,
                    duration_ms=dur_ms,
                    headers=?hdrs,
                    body=%text,
                    truncated
                );
            }

            tracing::trace!(
                req_id=%req_id,
                body_snippet=%snip_body(&bytes),
                "http.response.body_snippet"
            );

            let is_429 = status == StatusCode::TOO_MANY_REQUESTS;
            if (is_429 || status.is_server_error()) && attempt < max_retries {
                attempt += 1;
                let delay = match retry_after_delay_secs(&headers) {
                    Some(secs) => Duration::from_secs(secs.min(30)),
                    None if is_429 => backoff(attempt).max(Duration::from_millis(1100)),
                    None => backoff(attempt),
                };
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms=delay.as_millis() as u64,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            let result = FetchResult::new(url, final_url, status, headers, bytes);
            if opts.validate_status && !status.is_success() {
                tracing::warn!(req_id=%req_id, %status, host_path=%host_path, "http.error");
                return Err(HttpError::Status {
                    status,
                    response: Box::new(result),
                });
            }
            return Ok(result);
        }
    }
}

// ==============================
// Helpers
// ==============================

/// Stream the body, keeping at most `limit` bytes. The flag reports whether
/// anything was left unread.
async fn read_capped(
    resp: reqwest::Response,
    limit: usize,
) -> Result<(Bytes, bool), reqwest::Error> {
    let mut stream = resp.bytes_stream();
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let room = limit - buf.len();
        if chunk.len() > room {
            buf.extend_from_slice(&chunk[..room]);
            return Ok((buf.freeze(), true));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok((buf.freeze(), false))
}

fn parse_address(address: &str) -> Result<Url, HttpError> {
    let url = Url::parse(address.trim())
        .map_err(|e| HttpError::Url(format!("{}: {e}", redacted_address(address))))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(HttpError::Url(format!(
            "{}: unsupported scheme {other}",
            redacted(&url)
        ))),
    }
}

/// Map a reqwest error, dropping the request URL from its message.
fn classify_transport(err: reqwest::Error) -> HttpError {
    let err = err.without_url();
    if err.is_timeout() {
        HttpError::Timeout(err.to_string())
    } else if err.is_builder() {
        HttpError::Build(err.to_string())
    } else {
        HttpError::Network(err.to_string())
    }
}

fn backoff(attempt: usize) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1 << (attempt.min(16) - 1)))
}

fn retry_after_delay_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .parse()
        .ok()
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(&body[..body.len().min(512)]).to_string();
    if body.len() > 512 {
        snip.push_str("...");
    }
    snip
}

fn redact_query(url: &Url) -> (String, Vec<(String, String)>) {
    // "host + path" string and redacted query list for logging
    let host_path = format!("{}{}", url.host_str().unwrap_or("-"), url.path());
    let redacted = url
        .query_pairs()
        .map(|(k, v)| {
            let k = k.to_string();
            let v = v.to_string();
            let is_secret = matches!(
                k.to_ascii_lowercase().as_str(),
                "access_token"
                    | "authorization"
                    | "auth"
                    | "key"
                    | "api_key"
                    | "token"
                    | "secret"
                    | "client_secret"
                    | "bearer"
            );
            (k, if is_secret { "<redacted>".into() } else { v })
        })
        .collect::<Vec<_>>();
    (host_path, redacted)
}

fn content_len(headers: &HeaderMap, body_len: usize) -> usize {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(body_len)
}
