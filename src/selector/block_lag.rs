use super::Selector;
use crate::config::ProviderSpec;
use crate::error::SelectorError;
use crate::metrics::record_block_height;
use crate::rpc::RpcProbeClient;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// One upstream's state, owned exclusively by the block-lag selector.
///
/// `url` is fixed at construction. `block_number` is the only field that
/// mutates after construction and is therefore an atomic: it is written
/// by the single background updater and read concurrently by any number
/// of `choose()` callers, and a torn 64-bit read would be a bug.
struct ProviderState {
    url: Url,
    block_number: AtomicU64,
    client: RpcProbeClient,
}

struct Shared {
    providers: Vec<ProviderState>,
    lag: u64,
    probe_timeout: Duration,
    cancel: CancellationToken,
}

/// Routes traffic to the upstream that is furthest ahead, subject to a
/// hysteresis band (`lag`), continuously re-measured by a background
/// probe loop.
///
/// See `SPEC_FULL.md` §4.D for the full algorithm. In short: every
/// `interval`, fan out one `eth_getBlockByNumber("latest", false)` probe
/// per upstream, wait for the whole round to finish (the barrier), then
/// publish each result. `choose()` only ever reads the published state —
/// it never waits on a probe.
pub struct BlockLagSelector {
    shared: Arc<Shared>,
    ticker_task: Option<JoinHandle<()>>,
}

impl BlockLagSelector {
    /// Build one probe client per URL (each with an HTTP timeout equal
    /// to `interval`), run one synchronous probe round so the first
    /// externally visible `choose()` is informed, then spawn the
    /// background ticker.
    ///
    /// `urls` is expected to already be validated (see
    /// `selector::build_selector`) — every entry becomes a provider.
    pub async fn new(spec: &ProviderSpec, urls: Vec<Url>, http_client: Client) -> Self {
        let interval = spec.interval();
        let providers = urls
            .into_iter()
            .map(|url| ProviderState {
                client: RpcProbeClient::new(http_client.clone(), url.clone()),
                url,
                block_number: AtomicU64::new(0),
            })
            .collect();

        let shared = Arc::new(Shared {
            providers,
            lag: spec.lag,
            probe_timeout: interval,
            cancel: CancellationToken::new(),
        });

        // First-round warmup: await one synchronous probe round before
        // this constructor returns, so callers never observe an
        // all-zero table.
        check_servers(&shared).await;

        let ticker_shared = Arc::clone(&shared);
        let ticker_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; we already warmed up
            loop {
                tokio::select! {
                    _ = ticker_shared.cancel.cancelled() => {
                        debug!("block-lag selector shutting down");
                        return;
                    }
                    _ = ticker.tick() => {
                        check_servers(&ticker_shared).await;
                    }
                }
            }
        });

        Self {
            shared,
            ticker_task: Some(ticker_task),
        }
    }
}

/// Run one probe round: fan out a concurrent probe per provider, wait
/// for every task to finish (the barrier), then publish results.
///
/// Probes never propagate an error out of this function — a failed
/// probe degrades that provider's block number to 0 and nothing else.
async fn check_servers(shared: &Arc<Shared>) {
    let start = std::time::Instant::now();
    let mut handles = Vec::with_capacity(shared.providers.len());

    for (index, provider) in shared.providers.iter().enumerate() {
        let url = provider.url.clone();
        let fut = async move {
            match tokio::time::timeout(shared.probe_timeout, provider.client.latest_block_number()).await {
                Ok(Ok(block)) => (index, block),
                Ok(Err(e)) => {
                    warn!("probe failed for {}: {}", url, e);
                    (index, 0)
                }
                Err(_) => {
                    warn!("probe timed out for {}", url);
                    (index, 0)
                }
            }
        };
        handles.push(fut);
    }

    let results = futures::future::join_all(handles).await;

    for (index, block_number) in results {
        let provider = &shared.providers[index];
        provider.block_number.store(block_number, Ordering::Relaxed);
        record_block_height(provider.url.as_str(), block_number);
    }

    debug!("block-lag probe round finished in {:?}", start.elapsed());
}

impl Selector for BlockLagSelector {
    fn choose(&self) -> Result<Url, SelectorError> {
        choose_from(&self.shared.providers, self.shared.lag)
    }

    fn close(&self) {
        self.shared.cancel.cancel();
    }
}

impl Drop for BlockLagSelector {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
        if let Some(handle) = self.ticker_task.take() {
            handle.abort();
        }
    }
}

/// Core selection scan, factored out so it can be unit-tested against
/// hand-built fixtures without spinning up any I/O.
fn choose_from(providers: &[ProviderState], lag: u64) -> Result<Url, SelectorError> {
    if providers.is_empty() {
        return Err(SelectorError::NoProvider);
    }
    if providers.len() == 1 {
        return Ok(providers[0].url.clone());
    }

    let mut best_url: Option<Url> = None;
    let mut best_block: u64 = 0;

    for provider in providers {
        let block = provider.block_number.load(Ordering::Relaxed);
        if block == 0 {
            continue;
        }
        if block > best_block && block - best_block >= lag {
            best_block = block;
            best_url = Some(provider.url.clone());
        }
    }

    Ok(best_url.unwrap_or_else(|| providers[0].url.clone()))
}
