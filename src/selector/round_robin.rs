use super::Selector;
use crate::error::SelectorError;
use rand::Rng;
use url::Url;

/// Stateless selector over an immutable snapshot of the configured URL
/// list.
///
/// The configuration name `"roundRobin"` is historical; this selects
/// uniformly at random on every call rather than rotating through a
/// counter — that is the behavior the source actually implements, and
/// this crate standardizes on it rather than silently "fixing" the name
/// to match a deterministic rotation.
pub struct RoundRobinSelector {
    urls: Vec<Url>,
}

impl RoundRobinSelector {
    /// `urls` is expected to already be validated (see
    /// `selector::build_selector`) — this never drops an entry.
    pub fn new(urls: Vec<Url>) -> Self {
        Self { urls }
    }
}

impl Selector for RoundRobinSelector {
    fn choose(&self) -> Result<Url, SelectorError> {
        if self.urls.is_empty() {
            return Err(SelectorError::NoProvider);
        }
        let idx = rand::thread_rng().gen_range(0..self.urls.len());
        Ok(self.urls[idx].clone())
    }

    fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(raw: &[&str]) -> Vec<Url> {
        raw.iter().map(|u| Url::parse(u).unwrap()).collect()
    }

    #[test]
    fn empty_list_is_an_error() {
        let s = RoundRobinSelector::new(vec![]);
        assert!(matches!(s.choose(), Err(SelectorError::NoProvider)));
    }

    #[test]
    fn single_url_always_wins() {
        let s = RoundRobinSelector::new(urls(&["https://a"]));
        for _ in 0..20 {
            assert_eq!(s.choose().unwrap().as_str(), "https://a/");
        }
    }

    #[test]
    fn every_returned_url_is_one_of_the_configured_urls() {
        let parsed = urls(&["https://a", "https://b", "https://c"]);
        let s = RoundRobinSelector::new(parsed.clone());
        for _ in 0..200 {
            let chosen = s.choose().unwrap();
            assert!(parsed.contains(&chosen));
        }
    }

    #[test]
    fn close_is_a_no_op() {
        let s = RoundRobinSelector::new(urls(&["https://a"]));
        s.close();
        s.close();
        assert!(s.choose().is_ok());
    }
}
