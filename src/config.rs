use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upstream selection policy.
///
/// `"roundRobin"` is the historical name; the implemented behavior is
/// uniform random selection over the configured URL list (see
/// [`crate::selector::round_robin`]). Unknown values deserialize to
/// [`Policy::RoundRobin`] rather than failing, matching the source's
/// factory fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    RoundRobin,
    BlockLag,
}

impl Serialize for Policy {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl Default for Policy {
    fn default() -> Self {
        Policy::RoundRobin
    }
}

impl Policy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::RoundRobin => "roundRobin",
            Policy::BlockLag => "blockLag",
        }
    }
}

impl<'de> Deserialize<'de> for Policy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "blockLag" => Policy::BlockLag,
            _ => Policy::RoundRobin,
        })
    }
}

fn default_interval() -> String {
    "1s".to_string()
}

fn default_lag() -> u64 {
    100
}

fn default_max_idle_conns() -> usize {
    10240
}

fn default_max_idle_conns_per_host() -> usize {
    1024
}

/// Configuration for a `ProviderProxy`, as recognized from YAML or JSON.
///
/// Deserialization never fails on a malformed `interval` or an unknown
/// `policy` value — both silently fall back to their documented
/// defaults, matching the source's permissive config handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderSpec {
    /// Upstream endpoint URLs. Must be non-empty (enforced at
    /// `ProviderProxy::init`, not here, since this type only models
    /// the wire shape).
    pub urls: Vec<String>,

    /// Probe period and per-probe HTTP timeout, as a duration string
    /// (e.g. `"1s"`, `"500ms"`). Parsed with [`humantime::parse_duration`];
    /// non-positive or unparsable values fall back to 1 second.
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Hysteresis band, in blocks, used by the block-lag selector.
    #[serde(default = "default_lag")]
    pub lag: u64,

    #[serde(default)]
    pub policy: Policy,

    #[serde(default = "default_max_idle_conns")]
    pub max_idle_conns: usize,

    #[serde(default = "default_max_idle_conns_per_host")]
    pub max_idle_conns_per_host: usize,

    #[serde(default)]
    pub max_redirection: usize,
}

impl ProviderSpec {
    /// Resolve `interval` to a [`Duration`], applying the documented
    /// fallback for missing/invalid/non-positive values.
    pub fn interval(&self) -> Duration {
        match humantime::parse_duration(&self.interval) {
            Ok(d) if d > Duration::ZERO => d,
            _ => Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_policy_falls_back_to_round_robin() {
        let spec: ProviderSpec =
            serde_yaml::from_str("urls: [\"https://a\"]\npolicy: somethingElse\n").unwrap();
        assert_eq!(spec.policy, Policy::RoundRobin);
    }

    #[test]
    fn missing_interval_defaults_to_one_second() {
        let spec: ProviderSpec = serde_yaml::from_str("urls: [\"https://a\"]\n").unwrap();
        assert_eq!(spec.interval(), Duration::from_secs(1));
    }

    #[test]
    fn zero_interval_falls_back_to_one_second() {
        let spec: ProviderSpec =
            serde_yaml::from_str("urls: [\"https://a\"]\ninterval: \"0s\"\n").unwrap();
        assert_eq!(spec.interval(), Duration::from_secs(1));
    }

    #[test]
    fn garbage_interval_falls_back_to_one_second() {
        let spec: ProviderSpec =
            serde_yaml::from_str("urls: [\"https://a\"]\ninterval: \"not-a-duration\"\n").unwrap();
        assert_eq!(spec.interval(), Duration::from_secs(1));
    }

    #[test]
    fn explicit_interval_is_honored() {
        let spec: ProviderSpec =
            serde_yaml::from_str("urls: [\"https://a\"]\ninterval: \"5s\"\n").unwrap();
        assert_eq!(spec.interval(), Duration::from_secs(5));
    }

    #[test]
    fn defaults_match_spec() {
        let spec: ProviderSpec = serde_yaml::from_str("urls: [\"https://a\"]\n").unwrap();
        assert_eq!(spec.lag, 100);
        assert_eq!(spec.max_idle_conns, 10240);
        assert_eq!(spec.max_idle_conns_per_host, 1024);
        assert_eq!(spec.max_redirection, 0);
        assert_eq!(spec.policy, Policy::RoundRobin);
    }
}
