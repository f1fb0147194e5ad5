use anyhow::Context;
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::debug;

use crate::core::assembler::Assembler;
use crate::core::events::{Outcome, TaskEvent};
use crate::core::model::{ProgressSnapshot, Resource};
use crate::core::planner::plan_ranges;
use crate::http::{DriverContext, TransferDriver};

/// One download to run to completion.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub resource: Resource,
    pub target_path: PathBuf,
}

/// Single-task transfer engine. Emits `TaskEvent`s into a bounded channel
/// in arrival order: zero or more `Progress`, then exactly one `Terminal`.
/// Setup belongs to the caller; every failure past `start` is reported
/// through the terminal event instead of an error return.
pub struct Engine {
    driver: Arc<dyn TransferDriver>,
    connections: usize,
    chunk_size: u64,
    ctx: DriverContext,
    events: mpsc::Sender<TaskEvent>,
}

impl Engine {
    pub fn new(
        driver: Arc<dyn TransferDriver>,
        connections: usize,
        chunk_size: u64,
        ctx: DriverContext,
        events: mpsc::Sender<TaskEvent>,
    ) -> Self {
        Self {
            driver,
            connections: connections.max(1),
            chunk_size: chunk_size.max(1024 * 1024),
            ctx,
            events,
        }
    }

    /// Run the request on its own task. The result is delivered through
    /// the event channel; the handle is only useful for joining.
    pub fn start(self, request: DownloadRequest) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(request).await })
    }

    async fn run(self, request: DownloadRequest) {
        let outcome = match self.download(&request).await {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::Failure(format!("{e:#}")),
        };
        let _ = self.events.send(TaskEvent::Terminal(outcome)).await;
    }

    async fn download(&self, request: &DownloadRequest) -> anyhow::Result<()> {
        let res = &request.resource;
        let (total, supports_ranges) = self.driver.probe(res, &self.ctx).await?;
        debug!(?total, supports_ranges, driver = self.driver.name(), "starting transfer");

        let _ = self
            .events
            .send(TaskEvent::Progress(ProgressSnapshot {
                downloaded: 0,
                total_size: total,
                speed_bps: 0,
            }))
            .await;

        let partial_path = request.target_path.with_extension("partial");
        let assembler = Arc::new(Assembler::create(&partial_path, total).await?);

        if supports_ranges && total.map_or(false, |t| t > 0) {
            self.download_fragmented(res, total, &assembler).await?;
        } else {
            self.download_single(res, total, &assembler).await?;
        }

        assembler.finalize(&request.target_path).await?;
        Ok(())
    }

    /// Fallback path: servers without range support (or without a known
    /// size) get one full-body request.
    async fn download_single(
        &self,
        res: &Resource,
        total: Option<u64>,
        assembler: &Arc<Assembler>,
    ) -> anyhow::Result<()> {
        let started = Instant::now();
        let bytes = self.driver.download_all(res, &self.ctx).await?;
        let len = bytes.len() as u64;
        assembler.write_at(0, &bytes).await?;

        let elapsed = started.elapsed().as_secs_f64().max(0.001);
        let _ = self
            .events
            .send(TaskEvent::Progress(ProgressSnapshot {
                downloaded: len,
                total_size: total.or(Some(len)),
                speed_bps: (len as f64 / elapsed) as u64,
            }))
            .await;
        Ok(())
    }

    async fn download_fragmented(
        &self,
        res: &Resource,
        total: Option<u64>,
        assembler: &Arc<Assembler>,
    ) -> anyhow::Result<()> {
        let total_size = total.context("fragmented transfer requires a known size")?;
        let mut pending = plan_ranges(total_size, self.chunk_size);
        let downloaded = Arc::new(Mutex::new(0u64));
        let started = Instant::now();

        while !pending.is_empty() {
            let batch: Vec<_> = pending
                .drain(0..pending.len().min(self.connections))
                .collect();
            let mut futs = FuturesUnordered::new();

            for range in batch {
                let driver = self.driver.clone();
                let res = res.clone();
                let ctx = self.ctx.clone();
                let assembler = assembler.clone();
                let downloaded = downloaded.clone();
                let events = self.events.clone();

                futs.push(async move {
                    let end = range.offset + range.len - 1;
                    let bytes = driver.download_range(&res, &ctx, range.offset, end).await?;
                    assembler.write_at(range.offset, &bytes).await?;

                    // Send while holding the counter so snapshots leave the
                    // engine in monotonically increasing order.
                    {
                        let mut d = downloaded.lock().await;
                        *d += bytes.len() as u64;
                        let elapsed = started.elapsed().as_secs_f64().max(0.001);
                        let _ = events
                            .send(TaskEvent::Progress(ProgressSnapshot {
                                downloaded: *d,
                                total_size: Some(total_size),
                                speed_bps: (*d as f64 / elapsed) as u64,
                            }))
                            .await;
                    }
                    Ok::<(), anyhow::Error>(())
                });
            }

            while let Some(result) = futs.next().await {
                result?;
            }
        }

        Ok(())
    }
}
