//! Reading input documents from disk or over HTTP.
//!
//! URLs go through [`send_bytes`], which retries transient failures
//! (timeouts, connection resets, HTTP 429, HTTP 5xx) with exponential
//! backoff. Other 4xx responses are permanent and fail immediately.

use std::path::Path;
use std::time::Duration;

use inspection_extract::{RawDocument, SourceKind};

/// Maximum number of retry attempts for transient HTTP errors.
///
/// With exponential backoff (2s, 4s, 8s, 16s, 32s) the total wait before
/// giving up is 62 seconds.
const MAX_RETRIES: u32 = 5;

/// Maximum number of full re-fetch attempts when the response body cannot
/// be read (truncated or reset mid-transfer).
const MAX_BODY_RETRIES: u32 = 2;

/// Errors from fetching an input document.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Network or protocol failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status.
        status: reqwest::StatusCode,
    },

    /// A local file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Reads one input (a path or an `http(s)` URL) into a [`RawDocument`].
///
/// The document kind is `kind` when given, otherwise it is inferred from
/// the content (see [`detect_kind`]).
///
/// # Errors
///
/// Returns [`FetchError`] if the file cannot be read or the download fails
/// after all retries.
pub async fn fetch_input(
    client: &reqwest::Client,
    input: &str,
    kind: Option<SourceKind>,
) -> Result<RawDocument, FetchError> {
    let (bytes, content_type) = if is_url(input) {
        log::info!("Downloading {input}");
        send_bytes(|| client.get(input)).await?
    } else {
        let bytes = tokio::fs::read(input).await.map_err(|source| FetchError::Io {
            path: input.to_owned(),
            source,
        })?;
        (bytes, None)
    };

    let kind =
        kind.unwrap_or_else(|| detect_kind(input, content_type.as_deref(), &bytes));
    log::debug!("{input}: {} bytes, {kind}", bytes.len());

    Ok(RawDocument::new(bytes, kind))
}

fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Guesses whether a payload is a PDF or an HTML page.
///
/// A `%PDF` signature wins, then the response content type, then the file
/// extension. Anything else is treated as HTML.
#[must_use]
pub fn detect_kind(label: &str, content_type: Option<&str>, bytes: &[u8]) -> SourceKind {
    if bytes.trim_ascii_start().starts_with(b"%PDF") {
        return SourceKind::Pdf;
    }
    if content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("application/pdf")) {
        return SourceKind::Pdf;
    }

    let path = label.split(['?', '#']).next().unwrap_or(label);
    let is_pdf_extension = Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if is_pdf_extension {
        SourceKind::Pdf
    } else {
        SourceKind::Html
    }
}

/// Sends an HTTP request and returns the body bytes and content type.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (since builders are consumed by
/// `.send()`).
///
/// # Errors
///
/// Returns [`FetchError`] if the request fails after all retries, the
/// server returns a non-retryable status, or the body cannot be read
/// after all body retries.
#[allow(clippy::future_not_send)]
pub async fn send_bytes<F>(build_request: F) -> Result<(Vec<u8>, Option<String>), FetchError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut body_attempt = 0;
    loop {
        let response = send_inner(&build_request, MAX_RETRIES).await?;

        let url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        match response.bytes().await {
            Ok(body) => return Ok((body.to_vec(), content_type)),
            Err(e) if body_attempt < MAX_BODY_RETRIES => {
                body_attempt += 1;
                let delay = Duration::from_secs(1u64 << body_attempt);
                log::warn!(
                    "Body read failed (body retry {body_attempt}/{MAX_BODY_RETRIES}), \
                     re-fetching in {delay:?}...\n  url: {url}\n  error: {e}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                log::error!("Body read failed after {MAX_BODY_RETRIES} retries: {url}: {e}");
                return Err(FetchError::Http(e));
            }
        }
    }
}

/// Sends the request built by `build_request`, retrying on transient
/// errors up to `max_retries` times with exponential backoff. Returns the
/// successful [`reqwest::Response`] (status 2xx or 3xx).
#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    build_request: &F,
    max_retries: u32,
) -> Result<reqwest::Response, FetchError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            let delay = Duration::from_secs(1u64 << attempt); // 2s, 4s, 8s
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    attempt += 1;
                    continue;
                }
                return Err(FetchError::Http(e));
            }
            Ok(response) => {
                let status = response.status();
                if is_retryable_status(status) && attempt < max_retries {
                    log::warn!("  HTTP {status}");
                    attempt += 1;
                    continue;
                }
                if status.is_client_error() || status.is_server_error() {
                    return Err(FetchError::Status {
                        url: response.url().to_string(),
                        status,
                    });
                }
                return Ok(response);
            }
        }
    }
}

/// HTTP 429 and 5xx are worth another attempt; other 4xx are permanent.
fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}
