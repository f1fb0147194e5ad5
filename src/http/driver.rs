use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_RANGE, RANGE, USER_AGENT,
};
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::core::model::Resource;
use crate::http::{DriverContext, TransferDriver};

#[derive(thiserror::Error, Debug)]
pub enum HttpDriverError {
    /// Server ignored the Range header and replied 200 with the full body.
    #[error("server ignored range and returned full content")]
    RangeIgnoredFull(Bytes),

    #[error("range not supported by server")]
    RangeNotSupported,

    #[error("http status error: {0}")]
    Status(StatusCode),
}

pub struct HttpDriver {
    client: reqwest::Client,
}

impl HttpDriver {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .expect("reqwest client");
        Self { client }
    }

    fn build_headers(res: &Resource, ctx: &DriverContext) -> anyhow::Result<HeaderMap> {
        let mut h = HeaderMap::new();
        h.insert(USER_AGENT, HeaderValue::from_str(&ctx.user_agent)?);
        for (k, v) in &res.headers {
            let name = HeaderName::from_bytes(k.as_bytes())?;
            let value = HeaderValue::from_str(v)?;
            h.insert(name, value);
        }
        Ok(h)
    }

    fn should_retry_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
    }

    async fn sleep_backoff(ctx: &DriverContext, attempt: u32) {
        let base = ctx.retry_backoff_ms.max(1);
        let shift = attempt.min(16);
        let ms = base.saturating_mul(1u64 << shift).min(30_000);
        sleep(Duration::from_millis(ms)).await;
    }

    /// Content-Length, with zero and negative values treated as unknown.
    fn content_length(resp: &reqwest::Response) -> Option<u64> {
        resp.headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|len| *len > 0)
    }

    /// Total size from `Content-Range: bytes 0-0/1234`.
    fn content_range_total(resp: &reqwest::Response) -> Option<u64> {
        resp.headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.rsplit('/').next())
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|total| *total > 0)
    }

    async fn fetch(
        &self,
        res: &Resource,
        ctx: &DriverContext,
        range: Option<&str>,
    ) -> anyhow::Result<Bytes> {
        let headers = Self::build_headers(res, ctx)?;

        let mut last_err: Option<anyhow::Error> = None;
        for attempt in 0..=ctx.retries {
            if attempt > 0 {
                Self::sleep_backoff(ctx, attempt - 1).await;
            }

            let mut req = self
                .client
                .get(&res.uri)
                .headers(headers.clone())
                .timeout(Duration::from_secs(ctx.timeout_secs));
            if let Some(value) = range {
                req = req.header(RANGE, value);
            }

            let resp = match req.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            };

            match (range, resp.status()) {
                (Some(_), StatusCode::PARTIAL_CONTENT) => return Ok(resp.bytes().await?),
                (None, status) if status.is_success() => return Ok(resp.bytes().await?),

                // Range was ignored: the server handed us the whole body.
                (Some(_), StatusCode::OK) => {
                    let full = resp.bytes().await?;
                    return Err(HttpDriverError::RangeIgnoredFull(full).into());
                }

                (Some(_), StatusCode::RANGE_NOT_SATISFIABLE) => {
                    return Err(HttpDriverError::RangeNotSupported.into());
                }

                // Other 2xx answers to a range request are off-contract.
                (Some(_), status) if status.is_success() => {
                    return Err(HttpDriverError::RangeNotSupported.into());
                }

                (_, status) if Self::should_retry_status(status) => {
                    last_err = Some(HttpDriverError::Status(status).into());
                    continue;
                }

                (_, status) => return Err(HttpDriverError::Status(status).into()),
            }
        }

        Err(last_err.unwrap_or_else(|| HttpDriverError::Status(StatusCode::REQUEST_TIMEOUT).into()))
    }
}

#[async_trait]
impl TransferDriver for HttpDriver {
    fn name(&self) -> &'static str {
        "http"
    }

    /// HEAD for the size, then GET `bytes=0-0`: only a 206 with a
    /// Content-Range header counts as real range support.
    async fn probe(
        &self,
        res: &Resource,
        ctx: &DriverContext,
    ) -> anyhow::Result<(Option<u64>, bool)> {
        let headers = Self::build_headers(res, ctx)?;

        let head = self
            .client
            .head(&res.uri)
            .headers(headers.clone())
            .timeout(Duration::from_secs(ctx.timeout_secs))
            .send()
            .await?;

        let mut total = Self::content_length(&head);

        let test = self
            .client
            .get(&res.uri)
            .headers(headers)
            .timeout(Duration::from_secs(ctx.timeout_secs))
            .header(RANGE, "bytes=0-0")
            .send()
            .await?;

        let supports_ranges = test.status() == StatusCode::PARTIAL_CONTENT
            && test.headers().get(CONTENT_RANGE).is_some();

        // Some servers omit Content-Length on HEAD but still fill in the
        // Content-Range total on the range test.
        if total.is_none() && supports_ranges {
            total = Self::content_range_total(&test);
        }

        debug!(?total, supports_ranges, uri = %res.uri, "probe finished");
        Ok((total, supports_ranges))
    }

    async fn download_range(
        &self,
        res: &Resource,
        ctx: &DriverContext,
        start: u64,
        end_inclusive: u64,
    ) -> anyhow::Result<Bytes> {
        let range = format!("bytes={}-{}", start, end_inclusive);
        self.fetch(res, ctx, Some(&range)).await
    }

    async fn download_all(&self, res: &Resource, ctx: &DriverContext) -> anyhow::Result<Bytes> {
        self.fetch(res, ctx, None).await
    }
}
