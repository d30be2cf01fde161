use linkpeek_common::ContentKind;
use serde::Serialize;
use std::hash::{Hash, Hasher};
use url::Url;

/// Everything learned about one URL.
///
/// Two records are equal when their [`resolved_address`](Self::resolved_address)
/// values are equal; the remaining fields are descriptive and may drift
/// between fetches of the same page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    /// Address as requested.
    pub original_address: Url,
    /// `og:url` when present and absolute, otherwise the original address.
    pub resolved_address: Url,
    pub content_type: ContentKind,
    /// Kind the caller asked for when nothing better was available.
    pub default_kind: ContentKind,
    pub title: Option<String>,
    pub description: Option<String>,
    pub site_name: Option<String>,
    pub author: Option<String>,
    pub keywords: Option<String>,
    pub image_address: Option<Url>,
    pub image_size: Option<ImageSize>,
    pub favicon_address: Option<Url>,
    pub touch_icon_address: Option<Url>,
    /// Raw tag text; not parsed as a date.
    pub publish_date: Option<String>,
    pub section: Option<String>,
    /// Absent when the record was not built from an HTTP response.
    pub response_status: Option<u16>,
    pub mime_type: Option<String>,
    /// Built from response metadata alone, without a parsed document.
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_card: Option<TwitterCard>,
}

impl PartialEq for MetadataRecord {
    fn eq(&self, other: &Self) -> bool {
        self.resolved_address == other.resolved_address
    }
}

impl Eq for MetadataRecord {}

impl Hash for MetadataRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.resolved_address.hash(state);
    }
}

/// Declared `og:image` dimensions. Both sides are finite and positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImageSize {
    pub width: f64,
    pub height: f64,
}

impl ImageSize {
    /// Build a size only when both dimensions are usable.
    pub fn new(width: f64, height: f64) -> Option<Self> {
        let usable = |v: f64| v.is_finite() && v > 0.0;
        (usable(width) && usable(height)).then_some(Self { width, height })
    }
}

/// `twitter:*` card tags. Informational only; never used to fill the
/// primary record fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TwitterCard {
    pub card: Option<String>,
    pub site: Option<String>,
    pub creator: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<Url>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(resolved: &str, title: &str) -> MetadataRecord {
        let original = Url::parse("https://example.com/original").unwrap();
        MetadataRecord {
            original_address: original,
            resolved_address: Url::parse(resolved).unwrap(),
            content_type: ContentKind::Article,
            default_kind: ContentKind::Website,
            title: Some(title.to_string()),
            description: None,
            site_name: None,
            author: None,
            keywords: None,
            image_address: None,
            image_size: None,
            favicon_address: None,
            touch_icon_address: None,
            publish_date: None,
            section: None,
            response_status: Some(200),
            mime_type: Some("text/html".into()),
            degraded: false,
            twitter_card: None,
        }
    }

    #[test]
    fn equality_only_considers_resolved_address() {
        let a = record("https://example.com/canonical", "Foo");
        let b = record("https://example.com/canonical", "Bar");
        let c = record("https://example.com/other", "Foo");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: std::collections::HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn image_size_rejects_partial_or_bad_dimensions() {
        assert!(ImageSize::new(1200.0, 630.0).is_some());
        assert!(ImageSize::new(0.0, 630.0).is_none());
        assert!(ImageSize::new(1200.0, -1.0).is_none());
        assert!(ImageSize::new(f64::NAN, 1.0).is_none());
        assert!(ImageSize::new(f64::INFINITY, 1.0).is_none());
    }

    #[test]
    fn serializes_with_camel_case_and_raw_kind() {
        let json = serde_json::to_value(record("https://example.com/c", "T")).unwrap();
        assert_eq!(json["resolvedAddress"], "https://example.com/c");
        assert_eq!(json["contentType"], "article");
        assert_eq!(json["responseStatus"], 200);
        assert!(json.get("twitterCard").is_none());
    }
}
