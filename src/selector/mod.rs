mod block_lag;
mod round_robin;

pub use block_lag::BlockLagSelector;
pub use round_robin::RoundRobinSelector;

use crate::config::{Policy, ProviderSpec};
use crate::error::{ConfigError, SelectorError};
use reqwest::Client;
use url::Url;

/// Polymorphic upstream selection contract.
///
/// `choose` must never block on I/O and must return within
/// microseconds — any probing a policy needs happens out-of-band, in
/// the background. `close` is idempotent; releasing background
/// resources more than once must not panic or double-free.
pub trait Selector: Send + Sync {
    fn choose(&self) -> Result<Url, SelectorError>;
    fn close(&self);
}

/// Build the selector named by `spec.policy`.
///
/// `probe_client` is the shared `reqwest::Client` the block-lag selector
/// uses for its background probes (round-robin ignores it — it never
/// issues I/O). Each probe gets `spec.interval()` as its per-request
/// timeout, matching the source's one-client-per-upstream-with-that-
/// timeout construction.
///
/// `async` because the block-lag selector performs one synchronous
/// probe round (§4.D "first-round warmup") before it is ready to serve
/// `choose()` — round-robin resolves immediately.
///
/// Every entry in `spec.urls` is parsed up front; the first one that
/// fails fails the whole build with a [`ConfigError`]. This guarantees
/// the resulting selector's provider count always matches the
/// configured URL count — see the §8 availability invariant.
pub async fn build_selector(
    spec: &ProviderSpec,
    probe_client: Client,
) -> Result<Box<dyn Selector>, ConfigError> {
    let urls = parse_urls(&spec.urls)?;
    Ok(match spec.policy {
        Policy::BlockLag => Box::new(BlockLagSelector::new(spec, urls, probe_client).await),
        Policy::RoundRobin => Box::new(RoundRobinSelector::new(urls)),
    })
}

fn parse_urls(urls: &[String]) -> Result<Vec<Url>, ConfigError> {
    urls.iter()
        .map(|raw| {
            Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
                url: raw.clone(),
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn factory_builds_round_robin_by_default() {
        let spec = ProviderSpec {
            urls: vec!["https://a".to_string()],
            interval: "1s".to_string(),
            lag: 100,
            policy: Policy::RoundRobin,
            max_idle_conns: 10,
            max_idle_conns_per_host: 10,
            max_redirection: 0,
        };
        let selector = build_selector(&spec, Client::new()).await.unwrap();
        assert_eq!(selector.choose().unwrap().as_str(), "https://a/");
        selector.close();
    }

    #[tokio::test]
    async fn factory_surfaces_an_unparseable_url_as_a_config_error() {
        let spec = ProviderSpec {
            urls: vec!["not a url".to_string()],
            interval: "1s".to_string(),
            lag: 100,
            policy: Policy::RoundRobin,
            max_idle_conns: 10,
            max_idle_conns_per_host: 10,
            max_redirection: 0,
        };
        let err = build_selector(&spec, Client::new()).await.unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }
}
