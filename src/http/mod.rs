pub mod driver;

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::model::Resource;

/// Transfer tuning handed to the driver on every call.
#[derive(Debug, Clone)]
pub struct DriverContext {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for DriverContext {
    fn default() -> Self {
        Self {
            user_agent: format!("tug/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 60,
            retries: 2,
            retry_backoff_ms: 400,
        }
    }
}

/// Transport seam between the engine and the wire. The engine only ever
/// talks to the resource through this trait, which keeps the transfer
/// logic testable without a network.
#[async_trait]
pub trait TransferDriver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Probe the resource: total size (if reported) and whether byte
    /// ranges are actually honored.
    async fn probe(
        &self,
        res: &Resource,
        ctx: &DriverContext,
    ) -> anyhow::Result<(Option<u64>, bool)>;

    async fn download_range(
        &self,
        res: &Resource,
        ctx: &DriverContext,
        start: u64,
        end_inclusive: u64,
    ) -> anyhow::Result<Bytes>;

    async fn download_all(&self, res: &Resource, ctx: &DriverContext) -> anyhow::Result<Bytes>;
}
