use std::time::Duration;

/// A single forwarded request, ready to be published as metrics.
///
/// Stack-scoped on the forwarding path — built after a response is
/// observed (even an error response) and published once, except when
/// provider selection itself failed (no provider means nothing to
/// label these metrics with).
pub struct RequestMetrics {
    pub policy: &'static str,
    pub provider: String,
    pub rpc_method: String,
    pub status_code: u16,
    pub duration: Duration,
}

impl RequestMetrics {
    fn labels(&self) -> [(&'static str, String); 4] {
        [
            ("policy", self.policy.to_string()),
            ("status_code", self.status_code.to_string()),
            ("provider", self.provider.clone()),
            ("rpc_method", self.rpc_method.clone()),
        ]
    }
}

/// Record a forwarded request's counter and duration histogram.
///
/// Uses the `metrics` crate's recorder facade: this crate never installs
/// a recorder itself (that is the embedding binary's job — see
/// `main.rs`), it only emits through whatever global recorder, if any,
/// is installed. With no recorder installed these calls are harmless
/// no-ops.
pub fn record_request(m: &RequestMetrics) {
    metrics::counter!(
        "providerproxy_total_requests",
        "policy" => m.policy,
        "status_code" => m.status_code.to_string(),
        "provider" => m.provider.clone(),
        "rpc_method" => m.rpc_method.clone(),
    )
    .increment(1);
    metrics::histogram!(
        "providerproxy_requests_duration",
        "policy" => m.policy,
        "status_code" => m.status_code.to_string(),
        "provider" => m.provider.clone(),
        "rpc_method" => m.rpc_method.clone(),
    )
    .record(m.duration.as_millis() as f64);
}

/// Record the latest observed block height for one provider.
pub fn record_block_height(provider: &str, block_number: u64) {
    metrics::gauge!("provider_block_height", "provider" => provider.to_string())
        .set(block_number as f64);
}
