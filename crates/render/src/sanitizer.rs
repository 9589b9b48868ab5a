use ammonia::Builder;
use lol_html::{element, rewrite_str, RewriteStrSettings};
use std::collections::{HashMap, HashSet};

/// Tags that survive sanitization. Anything else is unwrapped, keeping its
/// children, unless it is listed in [`DROPPED_WITH_CONTENT`].
const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "address", "area", "article", "aside", "b", "bdi", "bdo", "big",
    "blockquote", "br", "button", "caption", "center", "cite", "code", "col", "colgroup", "data",
    "datalist", "dd", "del", "details", "dfn", "div", "dl", "dt", "em", "fieldset", "figcaption",
    "figure", "font", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "i", "img",
    "ins", "kbd", "label", "legend", "li", "main", "map", "mark", "meter", "nav", "ol",
    "optgroup", "option", "output", "p", "pre", "progress", "q", "rp", "rt", "ruby", "s", "samp",
    "section", "select", "small", "span", "strike", "strong", "style", "sub", "summary", "sup",
    "table", "tbody", "td", "textarea", "tfoot", "th", "thead", "time", "tr", "tt", "u", "ul",
    "var", "wbr",
];

/// Attributes allowed on every surviving tag. `target` and `rel` are absent
/// on purpose: anchors get fixed values for both.
const ALLOWED_ATTRIBUTES: &[&str] = &[
    "align", "alt", "autocomplete", "background", "bgcolor", "border", "cellpadding",
    "cellspacing", "checked", "cite", "class", "clear", "color", "cols", "colspan", "coords",
    "datetime", "default", "dir", "disabled", "download", "face", "for", "headers", "height",
    "hidden", "high", "href", "hreflang", "id", "ismap", "label", "lang", "list", "loop", "low",
    "max", "maxlength", "media", "min", "multiple", "name", "noshade", "nowrap", "open",
    "optimum", "placeholder", "readonly", "required", "rev", "reversed", "role", "rows",
    "rowspan", "rules", "scope", "selected", "shape", "size", "span", "spellcheck", "src",
    "srcset", "start", "step", "style", "summary", "tabindex", "title", "type", "usemap",
    "valign", "value", "width", "wrap",
];

const ALLOWED_ATTRIBUTE_PREFIXES: &[&str] = &["data-", "aria-"];

/// Removed together with everything inside them.
const DROPPED_WITH_CONTENT: &[&str] = &[
    "script", "iframe", "object", "embed", "noscript", "template",
];

pub const LINK_REL: &str = "noopener noreferrer";
pub const DEFAULT_IMAGE_ALT: &str = "Email image";

fn builder() -> Builder<'static> {
    let mut builder = Builder::default();
    builder
        .tags(ALLOWED_TAGS.iter().copied().collect())
        .clean_content_tags(DROPPED_WITH_CONTENT.iter().copied().collect())
        .tag_attributes(HashMap::new())
        .generic_attributes(ALLOWED_ATTRIBUTES.iter().copied().collect())
        .generic_attribute_prefixes(ALLOWED_ATTRIBUTE_PREFIXES.iter().copied().collect::<HashSet<_>>())
        .link_rel(Some(LINK_REL))
        .set_tag_attribute_value("a", "target", "_blank");
    builder
}

/// Cleans an untrusted email body for direct rendering.
///
/// The body is wrapped in `<div class="email-content-wrapper">` so the
/// display stylesheet has a stable root. Every anchor opens in a new
/// browsing context with `rel="noopener noreferrer"`, and images without
/// alternative text get [`DEFAULT_IMAGE_ALT`].
pub fn sanitize_email_html(body: &str) -> String {
    if body.trim().is_empty() {
        return String::new();
    }

    let wrapped = format!(r#"<div class="email-content-wrapper">{body}</div>"#);
    let cleaned = builder().clean(&wrapped).to_string();
    add_missing_alt(cleaned)
}

/// Gives every `<img>` without an `alt` attribute [`DEFAULT_IMAGE_ALT`].
/// Works on parsed elements, so attribute values and `<style>` text are
/// left alone.
fn add_missing_alt(html: String) -> String {
    let rewritten = rewrite_str(
        &html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("img", |el| {
                if !el.has_attribute("alt") {
                    el.set_attribute("alt", DEFAULT_IMAGE_ALT)?;
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    );
    // The handler cannot fail on ammonia output; keep the clean markup if it does.
    rewritten.unwrap_or(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_script_removed_with_content() {
        let out = sanitize_email_html("<p>hi</p><script>alert('x')</script>");
        assert!(!out.contains("<script"));
        assert!(!out.contains("alert"));
        assert!(out.contains("<p>hi</p>"));
    }

    #[test]
    fn test_iframe_removed_not_escaped() {
        let out = sanitize_email_html(r#"before<iframe src="https://evil.test">inner</iframe>after"#);
        assert!(!out.contains("iframe"));
        assert!(!out.contains("&lt;"));
        assert!(out.contains("beforeafter"));
    }

    #[test]
    fn test_unknown_tag_unwrapped() {
        let out = sanitize_email_html("<blink>shown</blink>");
        assert!(out.contains("shown"));
        assert!(!out.contains("blink"));
    }

    #[test]
    fn test_event_handlers_stripped() {
        let out = sanitize_email_html(r#"<div onclick="steal()" class="x">a</div><img src="a.png" onerror="boom()">"#);
        assert!(!out.contains("onclick"));
        assert!(!out.contains("onerror"));
        assert!(out.contains(r#"class="x""#));
    }

    #[test]
    fn test_javascript_url_dropped() {
        let out = sanitize_email_html(r#"<a href="javascript:alert(1)">x</a>"#);
        assert!(!out.contains("javascript:"));
    }

    #[test]
    fn test_anchor_forced_new_tab() {
        let out = sanitize_email_html(r#"<a href="https://example.com" target="_self" rel="opener">x</a>"#);
        assert!(out.contains(r#"target="_blank""#));
        assert!(out.contains(r#"rel="noopener noreferrer""#));
        assert!(!out.contains("_self"));
        assert!(!out.contains(r#"rel="opener""#));
    }

    #[test]
    fn test_image_gets_default_alt() {
        let out = sanitize_email_html(r#"<img src="https://example.com/a.png">"#);
        assert!(out.contains(r#"alt="Email image""#));
    }

    #[test]
    fn test_image_keeps_own_alt() {
        let out = sanitize_email_html(r#"<img src="https://example.com/a.png" alt="logo">"#);
        assert!(out.contains(r#"alt="logo""#));
        assert!(!out.contains(DEFAULT_IMAGE_ALT));
    }

    #[test]
    fn test_alt_inside_other_attribute_is_not_alt() {
        let out = sanitize_email_html(r#"<img src="a.png" title="x alt=y">"#);
        assert!(out.contains(r#"title="x alt=y""#));
        assert!(out.contains(r#"alt="Email image""#));
    }

    #[test]
    fn test_empty_alt_is_kept() {
        let out = sanitize_email_html(r#"<img src="spacer.gif" alt="">"#);
        assert!(out.contains(r#"alt="""#));
        assert!(!out.contains(DEFAULT_IMAGE_ALT));
    }

    #[test]
    fn test_img_text_in_style_untouched() {
        let out = sanitize_email_html("<style>/* <img src=x> */ p { color: red; }</style><p>x</p>");
        assert!(out.contains("/* <img src=x> */"));
        assert!(!out.contains(DEFAULT_IMAGE_ALT));
    }

    #[test]
    fn test_wrapper_and_data_attributes() {
        let out = sanitize_email_html(r#"<span data-id="7" aria-label="n">t</span>"#);
        assert!(out.starts_with(r#"<div class="email-content-wrapper">"#));
        assert!(out.contains(r#"data-id="7""#));
        assert!(out.contains(r#"aria-label="n""#));
    }

    #[test]
    fn test_style_block_kept() {
        let out = sanitize_email_html("<style>p { color: red; }</style><p>x</p>");
        assert!(out.contains("<style>p { color: red; }</style>"));
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(sanitize_email_html("   "), "");
    }

    fn fragment() -> impl Strategy<Value = String> {
        let tag = prop::sample::select(vec!["script", "iframe", "div", "p", "b", "object", "a"]);
        prop::collection::vec((tag, "[a-z0-9 ]{0,12}"), 0..8).prop_map(|parts| {
            parts
                .into_iter()
                .map(|(tag, text)| format!("<{tag}>{text}</{tag}>"))
                .collect::<String>()
        })
    }

    proptest! {
        #[test]
        fn prop_no_script_or_iframe_survives(html in fragment()) {
            let out = sanitize_email_html(&html).to_ascii_lowercase();
            prop_assert!(!out.contains("<script"));
            prop_assert!(!out.contains("<iframe"));
        }

        #[test]
        fn prop_every_anchor_is_new_tab(href in "[a-z]{1,10}", text in "[a-z]{0,10}") {
            let out = sanitize_email_html(&format!(r#"<a href="https://{href}.test/">{text}</a>"#));
            prop_assert!(out.contains(r#"target="_blank""#));
            prop_assert!(out.contains(r#"rel="noopener noreferrer""#));
        }
    }
}
