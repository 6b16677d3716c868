use thiserror::Error;

/// Errors that can occur while constructing a [`crate::proxy::ProviderProxy`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("node address not provided: `urls` must contain at least one entry")]
    NoUrls,
    #[error("invalid provider url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}

/// Errors returned by a [`crate::selector::Selector`].
#[derive(Error, Debug)]
pub enum SelectorError {
    #[error("no provider available")]
    NoProvider,
    #[error("provider proxy is closed")]
    Closed,
}

/// Errors internal to a single block-number probe.
///
/// Never escapes the block-lag selector: a failed probe degrades the
/// affected provider's block number to 0, it does not propagate.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("probe response decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("upstream returned a jsonrpc error {code}: {message}")]
    Rpc { code: i64, message: String },
}

/// Errors surfaced by the forwarding path ([`crate::proxy::ProviderProxy::handle`]).
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("provider selection failed: {0}")]
    Selection(#[from] SelectorError),
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("failed to wrap upstream response: {0}")]
    Response(String),
}

impl ForwardError {
    /// The source saw a response on the wire before this error occurred.
    ///
    /// Used to decide whether a request metric should still be recorded
    /// (selection failures never emit a metric, everything downstream of a
    /// received response does).
    pub fn response_observed(&self) -> bool {
        matches!(self, ForwardError::Response(_))
    }
}
