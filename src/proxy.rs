//! The filter itself: selection, forwarding, and the init/close lifecycle
//! tying the other modules together.

use arc_swap::ArcSwapOption;
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use url::Url;

use crate::config::ProviderSpec;
use crate::error::{ConfigError, ForwardError, SelectorError};
use crate::metrics::{record_request, RequestMetrics};
use crate::pipeline::{Context, OutboundResponse};
use crate::selector::{self, Selector};
use crate::types::RpcCall;

/// A JSON-RPC provider proxy: holds a pluggable [`Selector`] behind an
/// atomically swappable reference so `close` can release it without a
/// lock, and a shared [`Client`] every forwarded request is issued
/// through.
pub struct ProviderProxy {
    spec: ProviderSpec,
    client: Client,
    selector: ArcSwapOption<dyn Selector>,
}

impl ProviderProxy {
    /// Build a new generation from scratch. Fails if `spec.urls` is
    /// empty — the source panics here; this crate propagates a
    /// [`ConfigError`] instead (see `SPEC_FULL.md` REDESIGN FLAGS).
    pub async fn init(spec: ProviderSpec) -> Result<Self, ConfigError> {
        if spec.urls.is_empty() {
            return Err(ConfigError::NoUrls);
        }

        let client = build_http_client(&spec)?;
        let selector = selector::build_selector(&spec, client.clone()).await?;
        let selector: Arc<dyn Selector> = Arc::from(selector);

        Ok(Self {
            spec,
            client,
            selector: ArcSwapOption::from(Some(selector)),
        })
    }

    /// Build a new generation to replace `previous`. A generational
    /// reload, not a mutation in place: the caller is expected to call
    /// `previous.close()` once this generation has taken over and the
    /// old one has quiesced.
    pub async fn inherit(spec: ProviderSpec, _previous: &ProviderProxy) -> Result<Self, ConfigError> {
        Self::init(spec).await
    }

    /// Release the selector's background resources. Safe to call more
    /// than once: the second call observes the reference already
    /// cleared and does nothing.
    pub fn close(&self) {
        if let Some(old) = self.selector.swap(None) {
            old.close();
        }
    }

    /// Forward one request to the chosen upstream.
    ///
    /// Mirrors the source's filter-result convention: an empty string
    /// means success, anything else is the error that occurred. The
    /// error is also logged, since nothing upstream of this call is
    /// guaranteed to surface it to an operator.
    pub async fn handle(&self, ctx: &mut Context) -> String {
        match self.try_handle(ctx).await {
            Ok(()) => String::new(),
            Err(e) => {
                error!("{e}");
                e.to_string()
            }
        }
    }

    async fn try_handle(&self, ctx: &mut Context) -> Result<(), ForwardError> {
        let guard = self.selector.load();
        let selector = guard.as_ref().ok_or(SelectorError::Closed)?;
        let target = selector.choose()?;
        info!("select rpc provider: {target}");

        let request = ctx.request();
        let rpc_method = rpc_method_label(&request.path, &request.body);
        let forward_url = target_url(&target, &request.path);
        let method = request.method.clone();
        let headers = request.headers.clone();
        let body = request.body.clone();

        let start = Instant::now();
        let response = self
            .client
            .request(method, forward_url)
            .headers(headers)
            .body(body)
            .send()
            .await?;
        let duration = start.elapsed();

        let status = response.status();
        let response_headers = response.headers().clone();
        let body_result = response.bytes().await;

        // Emit the metric exactly once we have observed a response,
        // whether or not its body turned out to be readable.
        record_request(&RequestMetrics {
            policy: self.spec.policy.as_str(),
            provider: target.to_string(),
            rpc_method,
            status_code: status.as_u16(),
            duration,
        });

        let body = body_result.map_err(|e| ForwardError::Response(e.to_string()))?;

        ctx.set_response(OutboundResponse {
            status,
            headers: response_headers,
            body,
        });
        Ok(())
    }
}

fn build_http_client(spec: &ProviderSpec) -> Result<Client, ConfigError> {
    let redirect = if spec.max_redirection == 0 {
        reqwest::redirect::Policy::none()
    } else {
        reqwest::redirect::Policy::limited(spec.max_redirection)
    };

    Client::builder()
        .pool_max_idle_per_host(spec.max_idle_conns_per_host)
        .redirect(redirect)
        .build()
        .map_err(ConfigError::ClientBuild)
}

/// Derive the `rpcMethod` metric label. A non-root path identifies the
/// call (slashes collapsed, matching the source's path-as-method
/// convention); an empty or root path falls back to parsing the JSON
/// body.
fn rpc_method_label(path: &str, body: &[u8]) -> String {
    if path.trim_matches('/').is_empty() {
        parse_rpc_methods(body).join(",")
    } else {
        collapse_slashes(path)
    }
}

/// Append a non-root request path to the chosen upstream URL, slashes
/// collapsed. A root/empty path leaves `base` untouched — the request
/// goes straight to the configured upstream.
fn target_url(base: &Url, path: &str) -> Url {
    let collapsed = collapse_slashes(path);
    let trimmed = collapsed.trim_matches('/');
    if trimmed.is_empty() {
        return base.clone();
    }

    match base.join(&format!("/{trimmed}")) {
        Ok(url) => url,
        Err(e) => {
            warn!("failed to join path {path:?} onto {base}: {e}");
            base.clone()
        }
    }
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut last_was_slash = false;
    for c in path.chars() {
        if c == '/' {
            if last_was_slash {
                continue;
            }
            last_was_slash = true;
        } else {
            last_was_slash = false;
        }
        out.push(c);
    }
    out
}

/// Parse the JSON-RPC method name(s) out of a request body.
///
/// Total over all inputs: a single object yields one method, a JSON
/// array of objects yields one per element, and anything that isn't
/// one of those two shapes — empty input, a non-JSON payload, an empty
/// array — yields `["UNKNOWN"]`. A missing `method` field on an
/// otherwise well-formed object is likewise reported as `"UNKNOWN"`
/// rather than failing the whole parse.
pub fn parse_rpc_methods(body: &[u8]) -> Vec<String> {
    if body.is_empty() {
        return vec!["UNKNOWN".to_string()];
    }

    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Array(items)) if !items.is_empty() => {
            items.iter().map(method_of).collect()
        }
        Ok(value @ serde_json::Value::Object(_)) => vec![method_of(&value)],
        _ => {
            warn!("failed to parse an rpc method from the request body");
            vec!["UNKNOWN".to_string()]
        }
    }
}

fn method_of(value: &serde_json::Value) -> String {
    serde_json::from_value::<RpcCall>(value.clone())
        .ok()
        .and_then(|call| call.method)
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Policy;

    fn spec(urls: Vec<&str>) -> ProviderSpec {
        ProviderSpec {
            urls: urls.into_iter().map(String::from).collect(),
            interval: "1s".to_string(),
            lag: 100,
            policy: Policy::RoundRobin,
            max_idle_conns: 10,
            max_idle_conns_per_host: 10,
            max_redirection: 0,
        }
    }

    #[tokio::test]
    async fn init_rejects_an_empty_url_list() {
        let err = ProviderProxy::init(spec(vec![])).await.unwrap_err();
        assert!(matches!(err, ConfigError::NoUrls));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let proxy = ProviderProxy::init(spec(vec!["https://a"])).await.unwrap();
        proxy.close();
        proxy.close();
    }

    #[tokio::test]
    async fn handle_after_close_reports_the_closed_error() {
        let proxy = ProviderProxy::init(spec(vec!["https://a"])).await.unwrap();
        proxy.close();

        let request = crate::pipeline::InboundRequest::new(
            http::Method::POST,
            "/",
            http::HeaderMap::new(),
            bytes::Bytes::from_static(b"{}"),
        );
        let mut ctx = Context::new(request);
        let result = proxy.handle(&mut ctx).await;
        assert_eq!(result, SelectorError::Closed.to_string());
    }

    #[test]
    fn single_method_object_parses_to_one_method() {
        let body = br#"{"method":"eth_blockNumber","params":[],"id":1,"jsonrpc":"2.0"}"#;
        assert_eq!(parse_rpc_methods(body), vec!["eth_blockNumber".to_string()]);
    }

    #[test]
    fn another_single_method_object() {
        let body = br#"{"method":"eth_getBlockByNumber","params":["0xc5043f",false],"id":1,"jsonrpc":"2.0"}"#;
        assert_eq!(
            parse_rpc_methods(body),
            vec!["eth_getBlockByNumber".to_string()]
        );
    }

    #[test]
    fn garbage_payload_is_unknown() {
        assert_eq!(
            parse_rpc_methods(b"test unknown payload"),
            vec!["UNKNOWN".to_string()]
        );
    }

    #[test]
    fn empty_payload_is_unknown() {
        assert_eq!(parse_rpc_methods(b""), vec!["UNKNOWN".to_string()]);
    }

    #[test]
    fn batch_array_parses_one_method_per_element() {
        let body = br#"[
            {"jsonrpc":"2.0","method":"eth_getTransactionReceipt","params":["0x1"],"id":0},
            {"jsonrpc":"2.0","method":"eth_getTransactionReceipt","params":["0x2"],"id":1}
        ]"#;
        assert_eq!(
            parse_rpc_methods(body),
            vec![
                "eth_getTransactionReceipt".to_string(),
                "eth_getTransactionReceipt".to_string(),
            ]
        );
    }

    #[test]
    fn object_missing_method_is_unknown() {
        let body = br#"{"jsonrpc":"2.0","id":1}"#;
        assert_eq!(parse_rpc_methods(body), vec!["UNKNOWN".to_string()]);
    }

    #[test]
    fn empty_array_is_unknown() {
        assert_eq!(parse_rpc_methods(b"[]"), vec!["UNKNOWN".to_string()]);
    }

    #[test]
    fn root_path_falls_back_to_body_parsing() {
        let body = br#"{"method":"eth_blockNumber"}"#;
        assert_eq!(rpc_method_label("/", body), "eth_blockNumber");
        assert_eq!(rpc_method_label("", body), "eth_blockNumber");
    }

    #[test]
    fn non_root_path_is_used_directly_with_slashes_collapsed() {
        assert_eq!(rpc_method_label("//eth//call", b""), "/eth/call");
    }

    #[test]
    fn target_url_appends_a_collapsed_non_root_path() {
        let base = Url::parse("https://a").unwrap();
        assert_eq!(target_url(&base, "//eth//call").as_str(), "https://a/eth/call");
    }

    #[test]
    fn target_url_leaves_the_base_unchanged_for_a_root_path() {
        let base = Url::parse("https://a").unwrap();
        assert_eq!(target_url(&base, "/").as_str(), base.as_str());
        assert_eq!(target_url(&base, "").as_str(), base.as_str());
    }
}
