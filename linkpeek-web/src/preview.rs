//! One call per address: fetch, decode, parse, extract.

use std::time::{Duration, Instant};

use futures::{StreamExt, stream};
use linkpeek_common::{ContentKind, ExtractMode, StatusPolicy};
use linkpeek_http::{
    FetchResult, HttpClient, HttpError, RequestOpts, redacted, redacted_address,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::decode::{load_document, sniff_meta_charset};
use crate::extract::{ResponseMeta, extract};
use crate::record::MetadataRecord;

#[derive(Debug, Error)]
pub enum PreviewError {
    /// Rejected before any I/O.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("server returned {status} for {}", redacted(.address))]
    NonSuccessStatus { status: u16, address: Url },
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("preview cancelled")]
    Cancelled,
    /// No document and no response metadata to fall back on.
    #[error("nothing could be extracted from {}", redacted(.0))]
    ExtractionFailed(Url),
}

impl PreviewError {
    /// Network-level failure: timeouts, cancellation, connection errors.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            PreviewError::Timeout(_) | PreviewError::Transport(_) | PreviewError::Cancelled
        )
    }
}

impl From<HttpError> for PreviewError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Url(msg) => PreviewError::InvalidAddress(msg),
            HttpError::Build(msg) | HttpError::Network(msg) => PreviewError::Transport(msg),
            HttpError::Timeout(msg) => PreviewError::Timeout(msg),
            HttpError::Cancelled => PreviewError::Cancelled,
            HttpError::Status { status, response } => PreviewError::NonSuccessStatus {
                status: status.as_u16(),
                address: response.final_url,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PreviewOptions {
    pub mode: ExtractMode,
    /// Kind used when neither `og:type` nor a MIME type says otherwise.
    pub default_kind: ContentKind,
    pub status_policy: StatusPolicy,
    /// Per-request timeout; `None` keeps the client's default.
    pub timeout: Option<Duration>,
}

/// Fetches pages and turns them into [`MetadataRecord`]s.
///
/// Holds no per-call state, so one instance can serve any number of
/// concurrent previews.
#[derive(Clone)]
pub struct Previewer {
    http: HttpClient,
    options: PreviewOptions,
}

impl Previewer {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            options: PreviewOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PreviewOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PreviewOptions {
        &self.options
    }

    pub async fn preview(&self, address: &str) -> Result<MetadataRecord, PreviewError> {
        self.preview_cancellable(address, &CancellationToken::new())
            .await
    }

    /// Preview `address`, aborting the request when `cancel` fires.
    ///
    /// A cancelled call returns [`PreviewError::Cancelled`], never a partial
    /// record.
    pub async fn preview_cancellable(
        &self,
        address: &str,
        cancel: &CancellationToken,
    ) -> Result<MetadataRecord, PreviewError> {
        let started = Instant::now();
        let mode = self.options.mode;
        let log_url = redacted_address(address);
        tracing::info!(url = %log_url, ?mode, "preview.start");

        let opts = RequestOpts {
            timeout: self.options.timeout,
            validate_status: mode == ExtractMode::Basic,
            ..RequestOpts::default()
        };
        let fetched = self.http.fetch_cancellable(address, opts, cancel).await;

        let outcome = match (mode, fetched) {
            (ExtractMode::Basic, Ok(res)) => Ok(self.basic_record(&res)),
            (ExtractMode::Basic, Err(HttpError::Status { status, response }))
                if self.options.status_policy == StatusPolicy::Degrade =>
            {
                tracing::warn!(
                    url = %redacted(&response.url),
                    status = status.as_u16(),
                    mime = response.mime_type.as_deref().unwrap_or("-"),
                    "preview.degraded"
                );
                Ok(extract(
                    &response.url,
                    None,
                    Some(&ResponseMeta::from(response.as_ref())),
                    self.options.default_kind,
                ))
            }
            (ExtractMode::DirectParse, Ok(res)) => self.direct_record(&res),
            (_, Err(err)) => Err(PreviewError::from(err)),
        };

        match &outcome {
            Ok(record) => tracing::info!(
                url = %log_url,
                kind = %record.content_type,
                status = ?record.response_status,
                degraded = record.degraded,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "preview.done"
            ),
            Err(err) => tracing::warn!(
                url = %log_url,
                error = %err,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "preview.failed"
            ),
        }
        outcome
    }

    /// Preview every address with at most `concurrency` requests in flight.
    /// Results come back in input order.
    pub async fn preview_many<S>(
        &self,
        addresses: &[S],
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> Vec<(String, Result<MetadataRecord, PreviewError>)>
    where
        S: AsRef<str>,
    {
        stream::iter(addresses.iter().map(|a| a.as_ref().to_string()))
            .map(|address| async move {
                let result = self.preview_cancellable(&address, cancel).await;
                (address, result)
            })
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    fn basic_record(&self, res: &FetchResult) -> MetadataRecord {
        let document = load_document(&res.body, res.charset.as_deref());
        extract(
            &res.url,
            document.as_ref(),
            Some(&ResponseMeta::from(res)),
            self.options.default_kind,
        )
    }

    /// The document's own charset declaration drives decoding; the response
    /// status and headers are not consulted.
    fn direct_record(&self, res: &FetchResult) -> Result<MetadataRecord, PreviewError> {
        let charset = sniff_meta_charset(&res.body);
        let document = load_document(&res.body, charset.as_deref())
            .ok_or_else(|| PreviewError::ExtractionFailed(res.url.clone()))?;
        Ok(extract(
            &res.url,
            Some(&document),
            None,
            self.options.default_kind,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_family() {
        assert!(PreviewError::Cancelled.is_transport());
        assert!(PreviewError::Timeout("slow".into()).is_transport());
        assert!(PreviewError::Transport("refused".into()).is_transport());
        assert!(!PreviewError::InvalidAddress("x".into()).is_transport());
        let url = Url::parse("https://ex.com/").unwrap();
        assert!(!PreviewError::ExtractionFailed(url).is_transport());
    }

    #[test]
    fn http_errors_map_onto_preview_errors() {
        assert!(matches!(
            PreviewError::from(HttpError::Url("nope".into())),
            PreviewError::InvalidAddress(_)
        ));
        assert!(matches!(
            PreviewError::from(HttpError::Network("reset".into())),
            PreviewError::Transport(_)
        ));
        assert!(matches!(
            PreviewError::from(HttpError::Cancelled),
            PreviewError::Cancelled
        ));
    }

    #[test]
    fn error_text_redacts_query_secrets() {
        let address = Url::parse("https://ex.com/p?api_key=s3cr3t&q=1").unwrap();
        let err = PreviewError::NonSuccessStatus {
            status: 403,
            address: address.clone(),
        };
        let text = err.to_string();
        assert!(!text.contains("s3cr3t"), "{text}");
        assert!(text.contains("q=1"), "{text}");
        assert!(!PreviewError::ExtractionFailed(address).to_string().contains("s3cr3t"));
    }
}
