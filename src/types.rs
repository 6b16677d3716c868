use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 request envelope.
///
/// `params` is skipped entirely when absent — never serialized as
/// `"params":null` — matching upstreams that reject a literal `null`.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: serde_json::Value,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response envelope.
///
/// `result` is returned even when the envelope is otherwise a success —
/// decoding into this shape is itself the signal the probe client treats
/// as "data", independent of whether `error` is also present.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcErrorBody {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Minimal Ethereum block header, as returned by `eth_getBlockByNumber`.
///
/// Only `number` is consumed by the block-lag probe; everything else
/// that a full header carries is out of scope.
#[derive(Debug, Deserialize)]
pub struct BlockHeader {
    pub number: String,
}

impl BlockHeader {
    /// Parse the hex-encoded block number, defaulting to 0 on malformed
    /// input (the probe round treats that identically to a network
    /// failure: the provider is reported as unhealthy for this round).
    pub fn number_u64(&self) -> u64 {
        u64::from_str_radix(self.number.trim_start_matches("0x"), 16).unwrap_or(0)
    }
}

/// One parsed JSON-RPC request object, as seen on the inbound forwarding
/// path. Only `method` is needed for metric labeling.
#[derive(Debug, Deserialize)]
pub struct RpcCall {
    #[serde(default)]
    pub method: Option<String>,
}
