/// Default root of the provider API.
pub const DEFAULT_BASE_URL: &str = "http://api.wunderground.com/api";

/// A drained batch of features bound to one query.
///
/// The URL it renders doubles as the cache key, so feature order matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub features: Vec<String>,
    pub query: String,
}

impl ResolvedRequest {
    pub fn new(features: Vec<String>, query: impl Into<String>) -> Self {
        Self {
            features,
            query: query.into(),
        }
    }

    /// `{base}/{api_key}/{feature1}/.../q/{query}.json`
    pub fn url(&self, base: &str, api_key: &str) -> String {
        format!(
            "{}/{}/{}/q/{}.json",
            base.trim_end_matches('/'),
            api_key,
            self.features.join("/"),
            self.query
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn url_joins_features_in_order() {
        let req = ResolvedRequest::new(features(&["conditions", "forecast"]), "94107");
        assert_eq!(
            req.url(DEFAULT_BASE_URL, "KEY"),
            "http://api.wunderground.com/api/KEY/conditions/forecast/q/94107.json"
        );
    }

    #[test]
    fn order_changes_the_url() {
        let a = ResolvedRequest::new(features(&["tide", "almanac"]), "CA/San_Francisco");
        let b = ResolvedRequest::new(features(&["almanac", "tide"]), "CA/San_Francisco");
        assert_ne!(a.url("http://h", "k"), b.url("http://h", "k"));
    }

    #[test]
    fn trailing_slash_on_base_is_ignored() {
        let req = ResolvedRequest::new(features(&["conditions"]), "94107");
        assert_eq!(
            req.url("http://h/api/", "k"),
            "http://h/api/k/conditions/q/94107.json"
        );
    }
}
