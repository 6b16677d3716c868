use crate::error::ProbeError;
use crate::types::{BlockHeader, JsonRpcRequest, JsonRpcResponse};
use reqwest::Client;
use std::sync::atomic::{AtomicU32, Ordering};
use url::Url;

/// JSON-RPC client used by the block-lag selector to probe a single
/// upstream's latest block number.
///
/// Safe for concurrent use: `id` generation is an atomic increment and
/// the underlying `reqwest::Client` is cheap to clone (internally
/// `Arc`-backed connection pool), so one client can be shared across the
/// selector's probe tasks without an external lock.
pub struct RpcProbeClient {
    client: Client,
    endpoint: Url,
    id_counter: AtomicU32,
}

impl RpcProbeClient {
    /// Build a probe client bound to a single endpoint, with `timeout`
    /// applied to every request it sends.
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self {
            client,
            endpoint,
            id_counter: AtomicU32::new(0),
        }
    }

    fn next_id(&self) -> serde_json::Value {
        let id = self.id_counter.fetch_add(1, Ordering::Relaxed) + 1;
        serde_json::Value::String(id.to_string())
    }

    /// Build a JSON-RPC request body. `params` is omitted from the wire
    /// form entirely (not serialized as `null`) when empty.
    pub fn build_request(&self, method: &str, params: Vec<serde_json::Value>) -> JsonRpcRequest {
        let params = if params.is_empty() {
            None
        } else {
            Some(serde_json::Value::Array(params))
        };
        JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id(),
            method: method.to_string(),
            params,
        }
    }

    /// POST a request and return the raw `result` value.
    ///
    /// Any envelope that decodes successfully is treated as data, even
    /// one that also carries a non-nil `error` — the caller is
    /// responsible for inspecting `error` if it cares; callers in this
    /// crate (the block-lag probe) only need `result`.
    pub async fn send(&self, req: &JsonRpcRequest) -> Result<serde_json::Value, ProbeError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(req)
            .send()
            .await?;
        let body: JsonRpcResponse = response.json().await?;
        Ok(body.result.unwrap_or(serde_json::Value::Null))
    }

    /// Probe `eth_getBlockByNumber("latest", false)` and return the
    /// decoded block number, or a [`ProbeError`] on any network, HTTP,
    /// or decode failure.
    pub async fn latest_block_number(&self) -> Result<u64, ProbeError> {
        let req = self.build_request(
            "eth_getBlockByNumber",
            vec![serde_json::Value::String("latest".to_string()), serde_json::Value::Bool(false)],
        );
        let result = self.send(&req).await?;
        let header: BlockHeader = serde_json::from_value(result)?;
        Ok(header.number_u64())
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RpcProbeClient {
        RpcProbeClient::new(Client::new(), Url::parse("https://example.invalid").unwrap())
    }

    #[test]
    fn omits_params_when_none_given() {
        let req = client().build_request("eth_blockNumber", vec![]);
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("params").is_none());
    }

    #[test]
    fn includes_params_when_given() {
        let req = client().build_request(
            "eth_getBlockByNumber",
            vec![serde_json::json!("latest"), serde_json::json!(false)],
        );
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["params"], serde_json::json!(["latest", false]));
    }

    #[test]
    fn ids_are_strictly_increasing() {
        let c = client();
        let ids: Vec<String> = (0..5)
            .map(|_| match c.next_id() {
                serde_json::Value::String(s) => s,
                _ => unreachable!(),
            })
            .collect();
        let parsed: Vec<u32> = ids.iter().map(|s| s.parse().unwrap()).collect();
        for w in parsed.windows(2) {
            assert!(w[1] > w[0], "ids must be strictly increasing: {:?}", parsed);
        }
    }

    #[test]
    fn building_then_reading_method_round_trips() {
        let req = client().build_request("eth_blockNumber", vec![]);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["method"], "eth_blockNumber");
        assert_eq!(value["jsonrpc"], "2.0");
    }
}
