//! Tag resolution: one pure pass from (address, document, response) to a
//! [`MetadataRecord`].
//!
//! Every field is a priority list of sources; the first present, non-blank
//! value wins. Meta lookups match attribute values exactly (`og:title`, not
//! `OG:Title`); attribute names are already lowercased by the HTML parser.

use linkpeek_common::ContentKind;
use linkpeek_http::FetchResult;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::kind::{kind_for_mime_type, kind_for_og_type};
use crate::record::{ImageSize, MetadataRecord, TwitterCard};

const KEYWORD_MARKER: &str = "var keyword =";

const IMAGE_TAGS: &[&str] = &["og:image:secure_url", "og:image:url", "og:image", "thumbnail"];

const PUBLISH_DATE_TAGS: &[&str] = &[
    "article:modified_time",
    "article:published_time",
    "og:updated_time",
    "og:pubdate",
    "pubdate",
];

const FAVICON_LINKS: &[&str] = &[
    r#"head > link[rel="shortcut icon"]"#,
    r#"head > link[rel="icon"]"#,
];

const TOUCH_ICON_LINKS: &[&str] = &[
    r#"head > link[rel="apple-touch-icon"]:not([sizes])"#,
    r#"head > link[rel="apple-touch-icon"][sizes="180x180"]"#,
    r#"head > link[rel="apple-touch-icon-precomposed"]:not([sizes])"#,
];

/// Response metadata the extractor needs. Decoupled from [`FetchResult`] so
/// extraction can be exercised without a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMeta {
    pub status: u16,
    pub mime_type: Option<String>,
}

impl From<&FetchResult> for ResponseMeta {
    fn from(res: &FetchResult) -> Self {
        Self {
            status: res.status.as_u16(),
            mime_type: res.mime_type.clone(),
        }
    }
}

/// How a meta tag's key attribute must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Match {
    /// `property="key"` only.
    Property,
    /// `property="key"` or `name="key"`.
    PropertyOrName,
}

/// `<meta>` elements of a document in document order.
struct MetaTags<'a> {
    tags: Vec<MetaTag<'a>>,
}

struct MetaTag<'a> {
    property: Option<&'a str>,
    name: Option<&'a str>,
    content: &'a str,
}

impl<'a> MetaTags<'a> {
    fn collect(document: &'a Html) -> Self {
        let tags = Selector::parse("meta[content]")
            .map(|sel| {
                document
                    .select(&sel)
                    .filter_map(|el| {
                        let attrs = el.value();
                        Some(MetaTag {
                            property: attrs.attr("property"),
                            name: attrs.attr("name"),
                            content: attrs.attr("content")?,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { tags }
    }

    /// First non-blank content for `key`, trimmed.
    fn get(&self, key: &str, how: Match) -> Option<&'a str> {
        self.tags
            .iter()
            .filter(|tag| {
                tag.property == Some(key) || (how == Match::PropertyOrName && tag.name == Some(key))
            })
            .map(|tag| tag.content.trim())
            .find(|content| !content.is_empty())
    }

    /// First key in `keys` that yields a value.
    fn first_of(&self, keys: &[&str], how: Match) -> Option<&'a str> {
        keys.iter().find_map(|key| self.get(key, how))
    }

    fn has_prefix(&self, prefix: &str) -> bool {
        self.tags.iter().any(|tag| {
            tag.property.is_some_and(|p| p.starts_with(prefix))
                || tag.name.is_some_and(|n| n.starts_with(prefix))
        })
    }
}

/// Build a record from whatever is available.
///
/// With no document the record is classified from `response`'s MIME type
/// (or `default_kind` when there is no MIME type) and carries no descriptive
/// fields.
pub fn extract(
    address: &Url,
    document: Option<&Html>,
    response: Option<&ResponseMeta>,
    default_kind: ContentKind,
) -> MetadataRecord {
    let mime_type = response.and_then(|r| r.mime_type.clone());
    let mut record = MetadataRecord {
        original_address: address.clone(),
        resolved_address: address.clone(),
        content_type: default_kind,
        default_kind,
        title: None,
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
        response_status: response.map(|r| r.status),
        mime_type,
        degraded: document.is_none(),
        twitter_card: None,
    };

    let Some(document) = document else {
        if let Some(mime) = record.mime_type.as_deref() {
            record.content_type = kind_for_mime_type(mime);
        }
        return record;
    };

    let meta = MetaTags::collect(document);
    let owned = |s: &str| s.to_string();

    let resolved = meta
        .get("og:url", Match::PropertyOrName)
        .and_then(|raw| Url::parse(raw).ok())
        .unwrap_or_else(|| address.clone());

    record.content_type = meta
        .get("og:type", Match::PropertyOrName)
        .and_then(kind_for_og_type)
        .unwrap_or(default_kind);
    record.title = meta
        .get("og:title", Match::PropertyOrName)
        .map(owned)
        .or_else(|| document_title(document));
    record.description = meta
        .get("og:description", Match::Property)
        .or_else(|| meta.get("description", Match::PropertyOrName))
        .map(owned);
    record.site_name = meta.get("og:site_name", Match::PropertyOrName).map(owned);
    record.author = meta.get("author", Match::PropertyOrName).map(owned);
    record.keywords = meta
        .get("keywords", Match::PropertyOrName)
        .map(owned)
        .or_else(|| script_keywords(document));
    record.image_address = IMAGE_TAGS
        .iter()
        .filter_map(|key| meta.get(key, Match::PropertyOrName))
        .find_map(|raw| resolved.join(raw).ok());
    record.image_size = image_size(&meta);
    record.publish_date = meta.first_of(PUBLISH_DATE_TAGS, Match::Property).map(owned);
    record.section = meta.get("article:section", Match::PropertyOrName).map(owned);
    record.favicon_address = first_link(document, FAVICON_LINKS, &resolved);
    record.touch_icon_address = first_link(document, TOUCH_ICON_LINKS, &resolved);
    record.twitter_card = twitter_card(&meta, &resolved);
    record.resolved_address = resolved;
    record
}

fn document_title(document: &Html) -> Option<String> {
    let sel = Selector::parse("title").ok()?;
    document
        .select(&sel)
        .map(|el| el.text().collect::<String>())
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
}

fn image_size(meta: &MetaTags<'_>) -> Option<ImageSize> {
    let dim = |key| {
        meta.get(key, Match::PropertyOrName)
            .and_then(|raw| raw.parse::<f64>().ok())
    };
    ImageSize::new(dim("og:image:width")?, dim("og:image:height")?)
}

/// Resolve the `href` of the first matching `<link>`, trying selectors in
/// priority order.
fn first_link(document: &Html, selectors: &[&str], base: &Url) -> Option<Url> {
    selectors.iter().find_map(|raw| {
        let sel = Selector::parse(raw).ok()?;
        document
            .select(&sel)
            .filter_map(|el| el.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .find_map(|href| base.join(href).ok())
    })
}

/// Inline-script keyword list: within the `;`-terminated statement holding
/// `var keyword =`, the text between the next `[` and `]`, brackets stripped.
fn script_keywords(document: &Html) -> Option<String> {
    let sel = Selector::parse(r#"script[type="text/javascript"]"#).ok()?;
    document
        .select(&sel)
        .map(script_text)
        .find_map(|text| keywords_from_script(&text))
}

fn script_text(el: ElementRef<'_>) -> String {
    el.text().collect()
}

pub(crate) fn keywords_from_script(script: &str) -> Option<String> {
    let statement = script.split(';').find(|s| s.contains(KEYWORD_MARKER))?;
    let after_marker = &statement[statement.find(KEYWORD_MARKER)? + KEYWORD_MARKER.len()..];
    let open = after_marker.find('[')?;
    let close = open + after_marker[open..].find(']')?;
    let list = after_marker[open..=close]
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim();
    (!list.is_empty()).then(|| list.to_string())
}

fn twitter_card(meta: &MetaTags<'_>, base: &Url) -> Option<TwitterCard> {
    if !meta.has_prefix("twitter:") {
        return None;
    }
    let field = |key| meta.get(key, Match::PropertyOrName).map(str::to_string);
    Some(TwitterCard {
        card: field("twitter:card"),
        site: field("twitter:site"),
        creator: field("twitter:creator"),
        title: field("twitter:title"),
        description: field("twitter:description"),
        image: meta
            .first_of(&["twitter:image", "twitter:image:src"], Match::PropertyOrName)
            .and_then(|raw| base.join(raw).ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, html: &str) -> MetadataRecord {
        let address = Url::parse(url).unwrap();
        let document = Html::parse_document(html);
        let response = ResponseMeta {
            status: 200,
            mime_type: Some("text/html".into()),
        };
        extract(&address, Some(&document), Some(&response), ContentKind::Website)
    }

    fn html_page(head: &str) -> MetadataRecord {
        page(
            "https://ex.com/page",
            &format!("<html><head>{head}</head><body><p>x</p></body></html>"),
        )
    }

    #[test]
    fn og_title_beats_document_title() {
        let rec = html_page(r#"<title>Doc</title><meta property="og:title" content="X">"#);
        assert_eq!(rec.title.as_deref(), Some("X"));

        let rec = html_page(r#"<meta property="og:title" content="X"><title>Doc</title>"#);
        assert_eq!(rec.title.as_deref(), Some("X"));
    }

    #[test]
    fn document_title_is_the_fallback() {
        let rec = html_page("<title>  Y </title>");
        assert_eq!(rec.title.as_deref(), Some("Y"));

        let rec = html_page(r#"<meta property="og:title" content="  "><title>Y</title>"#);
        assert_eq!(rec.title.as_deref(), Some("Y"));

        let rec = html_page("");
        assert_eq!(rec.title, None);
    }

    #[test]
    fn og_url_overrides_resolved_address_only_when_absolute() {
        let rec = html_page(r#"<meta property="og:url" content="https://example.com/canonical">"#);
        assert_eq!(rec.resolved_address.as_str(), "https://example.com/canonical");
        assert_eq!(rec.original_address.as_str(), "https://ex.com/page");

        let rec = html_page(r#"<meta property="og:url" content="/relative">"#);
        assert_eq!(rec.resolved_address.as_str(), "https://ex.com/page");
    }

    #[test]
    fn content_type_from_og_type_with_aliases() {
        let rec = html_page(r#"<meta property="og:type" content="article">"#);
        assert_eq!(rec.content_type, ContentKind::Article);

        let rec = html_page(r#"<meta property="og:type" content="film">"#);
        assert_eq!(rec.content_type, ContentKind::VideoMovie);

        let rec = html_page(r#"<meta property="og:type" content="podcast">"#);
        assert_eq!(rec.content_type, ContentKind::Website);
    }

    #[test]
    fn default_kind_applies_when_og_type_is_missing() {
        let address = Url::parse("https://ex.com/").unwrap();
        let document = Html::parse_document("<title>t</title>");
        let rec = extract(&address, Some(&document), None, ContentKind::Article);
        assert_eq!(rec.content_type, ContentKind::Article);
        assert_eq!(rec.default_kind, ContentKind::Article);
        assert_eq!(rec.response_status, None);
    }

    #[test]
    fn description_prefers_og_property() {
        let rec = html_page(
            r#"<meta name="description" content="plain">
               <meta property="og:description" content="og">"#,
        );
        assert_eq!(rec.description.as_deref(), Some("og"));

        // og:description only counts as a property.
        let rec = html_page(
            r#"<meta name="og:description" content="og"><meta name="description" content="plain">"#,
        );
        assert_eq!(rec.description.as_deref(), Some("plain"));

        let rec = html_page(r#"<meta property="description" content="via property">"#);
        assert_eq!(rec.description.as_deref(), Some("via property"));
    }

    #[test]
    fn simple_fields() {
        let rec = html_page(
            r#"<meta property="og:site_name" content="Example">
               <meta name="author" content="Ada">
               <meta property="article:section" content="Tech">
               <meta name="keywords" content="rust, html">"#,
        );
        assert_eq!(rec.site_name.as_deref(), Some("Example"));
        assert_eq!(rec.author.as_deref(), Some("Ada"));
        assert_eq!(rec.section.as_deref(), Some("Tech"));
        assert_eq!(rec.keywords.as_deref(), Some("rust, html"));
    }

    #[test]
    fn attribute_names_match_case_insensitively() {
        let rec = html_page(
            r#"<META PROPERTY="og:title" CONTENT="X"><Meta Name="author" Content="Ada">
               <LINK REL="icon" HREF="/f.ico">"#,
        );
        assert_eq!(rec.title.as_deref(), Some("X"));
        assert_eq!(rec.author.as_deref(), Some("Ada"));
        assert_eq!(
            rec.favicon_address.map(String::from).as_deref(),
            Some("https://ex.com/f.ico")
        );
    }

    #[test]
    fn attribute_values_match_exactly() {
        let rec = html_page(r#"<meta property="OG:TITLE" content="loud"><title>quiet</title>"#);
        assert_eq!(rec.title.as_deref(), Some("quiet"));
    }

    #[test]
    fn image_chain_resolves_relative_to_resolved_address() {
        let rec = html_page(
            r#"<meta property="og:url" content="https://cdn.ex.com/a/b">
               <meta property="og:image" content="plain.png">
               <meta property="og:image:url" content="url.png">"#,
        );
        assert_eq!(
            rec.image_address.map(String::from).as_deref(),
            Some("https://cdn.ex.com/a/url.png")
        );

        let rec = html_page(
            r#"<meta property="og:image" content="/i.png">
               <meta property="og:image:secure_url" content="https://s.ex.com/i.png">"#,
        );
        assert_eq!(
            rec.image_address.map(String::from).as_deref(),
            Some("https://s.ex.com/i.png")
        );

        let rec = html_page(r#"<meta name="thumbnail" content="/thumb.jpg">"#);
        assert_eq!(
            rec.image_address.map(String::from).as_deref(),
            Some("https://ex.com/thumb.jpg")
        );
    }

    #[test]
    fn image_size_needs_both_positive_dimensions() {
        let rec = html_page(
            r#"<meta property="og:image:width" content="1200">
               <meta property="og:image:height" content="630.5">"#,
        );
        assert_eq!(rec.image_size, ImageSize::new(1200.0, 630.5));

        for (w, h) in [("0", "10"), ("10", "-3"), ("wide", "10"), ("10", "")] {
            let rec = html_page(&format!(
                r#"<meta property="og:image:width" content="{w}">
                   <meta property="og:image:height" content="{h}">"#
            ));
            assert_eq!(rec.image_size, None, "{w}x{h}");
        }

        let rec = html_page(r#"<meta property="og:image:width" content="1200">"#);
        assert_eq!(rec.image_size, None);
    }

    #[test]
    fn publish_date_priority_is_property_only() {
        let rec = html_page(
            r#"<meta property="pubdate" content="5">
               <meta property="og:updated_time" content="3">
               <meta property="article:published_time" content="2">"#,
        );
        assert_eq!(rec.publish_date.as_deref(), Some("2"));

        let rec = html_page(
            r#"<meta name="article:modified_time" content="1">
               <meta property="pubdate" content="5">"#,
        );
        assert_eq!(rec.publish_date.as_deref(), Some("5"));
    }

    #[test]
    fn favicon_resolves_against_page() {
        let rec = html_page(r#"<link rel="icon" href="/f.ico">"#);
        assert_eq!(
            rec.favicon_address.map(String::from).as_deref(),
            Some("https://ex.com/f.ico")
        );

        let rec = html_page(
            r#"<link rel="icon" href="/f.ico">
               <link rel="shortcut icon" href="/s.ico">"#,
        );
        assert_eq!(
            rec.favicon_address.map(String::from).as_deref(),
            Some("https://ex.com/s.ico")
        );
    }

    #[test]
    fn touch_icon_priority() {
        let rec = html_page(
            r#"<link rel="apple-touch-icon-precomposed" href="/pre.png">
               <link rel="apple-touch-icon" sizes="180x180" href="/180.png">
               <link rel="apple-touch-icon" sizes="152x152" href="/152.png">"#,
        );
        assert_eq!(
            rec.touch_icon_address.map(String::from).as_deref(),
            Some("https://ex.com/180.png")
        );

        let rec = html_page(
            r#"<link rel="apple-touch-icon" sizes="180x180" href="/180.png">
               <link rel="apple-touch-icon" href="/plain.png">"#,
        );
        assert_eq!(
            rec.touch_icon_address.map(String::from).as_deref(),
            Some("https://ex.com/plain.png")
        );

        let rec = html_page(r#"<link rel="apple-touch-icon" sizes="152x152" href="/152.png">"#);
        assert_eq!(rec.touch_icon_address, None);
    }

    #[test]
    fn keywords_from_inline_script() {
        let rec = page(
            "https://ex.com/",
            r#"<html><head><script type="text/javascript">
                 var other = 1;
                 var keyword = ["a","b","c"];
               </script></head><body></body></html>"#,
        );
        assert_eq!(rec.keywords.as_deref(), Some(r#""a","b","c""#));
    }

    #[test]
    fn keyword_scan_is_literal() {
        assert_eq!(keywords_from_script(r#"var keyword = [ x ]"#).as_deref(), Some("x"));
        assert_eq!(keywords_from_script(r#"var keywords = ["x"]"#), None);
        assert_eq!(keywords_from_script(r#"var keyword = []"#), None);
        assert_eq!(keywords_from_script(r#"var keyword = "x";"#), None);
        assert_eq!(keywords_from_script(r#"[1] var keyword = [2]"#).as_deref(), Some("2"));
    }

    #[test]
    fn keyword_scan_stays_inside_its_statement() {
        assert_eq!(
            keywords_from_script(r#"var keyword = "x"; var other = [1, 2];"#),
            None
        );
        assert_eq!(
            keywords_from_script(r#"var a = [0]; var keyword = ["k"]; var b = [9];"#).as_deref(),
            Some(r#""k""#)
        );
    }

    #[test]
    fn meta_keywords_beat_script() {
        let rec = html_page(
            r#"<meta name="keywords" content="meta">
               <script type="text/javascript">var keyword = ["s"];</script>"#,
        );
        assert_eq!(rec.keywords.as_deref(), Some("meta"));
    }

    #[test]
    fn twitter_card_is_informational() {
        let rec = html_page(
            r#"<meta name="twitter:card" content="summary_large_image">
               <meta name="twitter:title" content="Tweet title">
               <meta name="twitter:image" content="/tw.png">"#,
        );
        assert_eq!(rec.title, None);
        assert_eq!(rec.image_address, None);
        let card = rec.twitter_card.unwrap();
        assert_eq!(card.card.as_deref(), Some("summary_large_image"));
        assert_eq!(card.title.as_deref(), Some("Tweet title"));
        assert_eq!(card.image.map(String::from).as_deref(), Some("https://ex.com/tw.png"));

        assert!(html_page("<title>t</title>").twitter_card.is_none());
    }

    #[test]
    fn no_document_uses_mime_classification() {
        let address = Url::parse("https://ex.com/pic").unwrap();
        let response = ResponseMeta {
            status: 200,
            mime_type: Some("image/png".into()),
        };
        let rec = extract(&address, None, Some(&response), ContentKind::Article);
        assert_eq!(rec.content_type, ContentKind::FileImage);
        assert!(rec.degraded);
        assert_eq!(rec.title, None);
        assert_eq!(rec.response_status, Some(200));

        let response = ResponseMeta {
            status: 404,
            mime_type: Some("text/html".into()),
        };
        let rec = extract(&address, None, Some(&response), ContentKind::Article);
        assert_eq!(rec.content_type, ContentKind::Website);
        assert_eq!(rec.response_status, Some(404));
    }

    #[test]
    fn no_document_and_no_mime_uses_default_kind() {
        let address = Url::parse("https://ex.com/x").unwrap();
        let response = ResponseMeta {
            status: 200,
            mime_type: None,
        };
        let rec = extract(&address, None, Some(&response), ContentKind::MusicSong);
        assert_eq!(rec.content_type, ContentKind::MusicSong);
        assert_eq!(rec.mime_type, None);
    }
}
