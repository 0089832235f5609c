use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use super::domain::{ContentFilter, ContentVerdict};
use super::registry::{RegistryClient, RegistryTransport};

/// Scans submitted free text against the registry's active content filters.
pub struct ContentValidator<T> {
    registry: Arc<RegistryClient<T>>,
}

impl<T> ContentValidator<T>
where
    T: RegistryTransport + 'static,
{
    pub fn new(registry: Arc<RegistryClient<T>>) -> Self {
        Self { registry }
    }

    pub async fn validate_content(&self, text: &str) -> ContentVerdict {
        self.validate_all([text]).await
    }

    /// One registry round trip for the whole batch; the first blocked field wins.
    pub async fn validate_all<I, S>(&self, fields: I) -> ContentVerdict
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let owned: Vec<S> = fields.into_iter().collect();
        let fields: Vec<&str> = owned
            .iter()
            .map(AsRef::as_ref)
            .filter(|field: &&str| !field.trim().is_empty())
            .collect();
        if fields.is_empty() {
            return ContentVerdict::valid();
        }

        let filters = match self.registry.content_filters().await {
            Ok(filters) => filters,
            Err(err) => {
                warn!(error = %err, "content filters unavailable; accepting content");
                return ContentVerdict::valid();
            }
        };

        fields
            .iter()
            .find_map(|field| match_filters(field, &filters))
            .map(ContentVerdict::blocked)
            .unwrap_or_else(ContentVerdict::valid)
    }
}

/// First effective filter whose lower-cased pattern occurs in the lower-cased text.
pub fn match_filters(text: &str, filters: &[ContentFilter]) -> Option<String> {
    let now = Utc::now();
    let haystack = text.to_lowercase();
    filters
        .iter()
        .filter(|filter| filter.is_effective(now))
        .find(|filter| haystack.contains(&filter.pattern.to_lowercase()))
        .map(|filter| filter.pattern.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn matches_case_insensitively_and_returns_the_pattern() {
        let filters = vec![ContentFilter::new("Wire Transfer"), ContentFilter::new("spam")];
        assert_eq!(
            match_filters("Please send a WIRE TRANSFER today", &filters).as_deref(),
            Some("Wire Transfer")
        );
        assert_eq!(match_filters("hello world", &filters), None);
    }

    #[test]
    fn skips_expired_inactive_and_blank_filters() {
        let mut expired = ContentFilter::new("spam");
        expired.expires_at = Some(Utc::now() - Duration::minutes(1));
        let mut inactive = ContentFilter::new("spam");
        inactive.is_active = false;
        let blank = ContentFilter::new("  ");

        let filters = vec![expired, inactive, blank];
        assert_eq!(match_filters("this is spam content", &filters), None);
    }
}
