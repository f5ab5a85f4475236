//! Visible-text extraction from fetched pages.
//!
//! Indicators are matched against the text a reader would see inside one
//! element (e.g. `header`), so markup, scripts and attribute values never
//! produce false positives.

use once_cell::sync::Lazy;
use regex::Regex;

// ═══════════════════════════════════════════════════════════════════════════════
// Markup Stripping Regexes
// ═══════════════════════════════════════════════════════════════════════════════

static RE_SCRIPT_OR_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style|noscript)\b[^>]*>.*?</(script|style|noscript)\s*>").unwrap()
});
static RE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// One named element whose text carries an indicator.
#[derive(Debug, Clone)]
pub struct PageRegion {
    element: String,
    pattern: Regex,
}

impl PageRegion {
    pub fn new(element: &str) -> Result<Self, regex::Error> {
        let element = element.to_ascii_lowercase();
        let name = regex::escape(&element);
        let pattern = Regex::new(&format!(r"(?is)<{name}\b[^>]*>(.*?)</{name}\s*>"))?;
        Ok(Self { element, pattern })
    }

    pub fn element(&self) -> &str {
        &self.element
    }

    /// Visible text of every matching element, joined by a space. `None`
    /// when the page has no such element.
    pub fn text(&self, html: &str) -> Option<String> {
        let html = RE_SCRIPT_OR_STYLE.replace_all(html, " ");
        let html = RE_COMMENT.replace_all(&html, " ");

        let parts: Vec<String> = self
            .pattern
            .captures_iter(&html)
            .filter_map(|captures| captures.get(1))
            .map(|inner| visible_text(inner.as_str()))
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" ").trim().to_string())
        }
    }

    pub fn contains(&self, html: &str, keyword: &str) -> Option<bool> {
        self.text(html).map(|text| text.contains(keyword))
    }
}

fn visible_text(fragment: &str) -> String {
    let text = RE_TAG.replace_all(fragment, " ");
    let text = decode_entities(&text);
    RE_WHITESPACE.replace_all(&text, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = r#"
<html>
  <head><style>header { color: red; }</style></head>
  <body>
    <header class="x1">
      <section>
        <span>someone</span>
        <div><span>直播</span></div>
      </section>
    </header>
    <main><p>posts</p></main>
    <footer><script>var s = "直播視訊已結束";</script>about &amp; help</footer>
  </body>
</html>"#;

    #[test]
    fn extracts_visible_header_text() {
        let region = PageRegion::new("header").unwrap();
        assert_eq!(region.text(PROFILE).as_deref(), Some("someone 直播"));
        assert_eq!(region.contains(PROFILE, "直播"), Some(true));
    }

    #[test]
    fn ignores_script_content() {
        let region = PageRegion::new("footer").unwrap();
        assert_eq!(region.text(PROFILE).as_deref(), Some("about & help"));
        assert_eq!(region.contains(PROFILE, "直播視訊已結束"), Some(false));
    }

    #[test]
    fn missing_region_is_none() {
        let region = PageRegion::new("nav").unwrap();
        assert_eq!(region.text(PROFILE), None);
        assert_eq!(region.contains(PROFILE, "anything"), None);
    }

    #[test]
    fn element_names_are_case_insensitive() {
        let region = PageRegion::new("FOOTER").unwrap();
        assert_eq!(region.element(), "footer");
        assert!(region.text("<FOOTER>Live video ended</FOOTER>").is_some());
    }

    #[test]
    fn does_not_match_longer_tag_names() {
        let region = PageRegion::new("header").unwrap();
        assert_eq!(region.text("<headers>nope</headers>"), None);
    }
}
