use crate::highlight::escape_text;
use crate::sanitizer::sanitize_email_html;
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Stylesheet placed inside every email's shadow root.
pub const EMAIL_STYLES: &str = r#"
:host {
  all: initial;
  font-family: system-ui, -apple-system, "Segoe UI", Roboto, "Helvetica Neue", Arial, sans-serif;
  color: #212529;
  line-height: 1.5;
  display: block;
  background-color: #ffffff;
}
a { color: #0d6efd; text-decoration: underline; }
img { max-width: 100%; height: auto; vertical-align: middle; }
table { border-collapse: collapse; mso-table-lspace: 0pt; mso-table-rspace: 0pt; }
.email-content-wrapper {
  overflow-wrap: break-word;
  word-wrap: break-word;
  word-break: break-word;
}
[style*="background-image"] {
  background-size: cover !important;
  background-position: center !important;
}
"#;

// A body counts as HTML only with a closing tag, a comment or doctype, or an
// opening tag from a known element. `a <b` or `<name>` in plain text does not.
static MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)</[a-z][a-z0-9]*\s*>|<!--|<!doctype|<(?:a|b|i|u|p|br|hr|img|div|span|table|tbody|tr|td|th|ul|ol|li|h[1-6]|html|head|body|meta|style|font|center|strong|em|blockquote|pre)(?:\s[^>]*)?/?>",
    )
    .expect("valid markup regex")
});

fn body_as_html(body: &str) -> Cow<'_, str> {
    if MARKUP.is_match(body) {
        return Cow::Borrowed(body);
    }
    let escaped = escape_text(body);
    Cow::Owned(escaped.replace("\r\n", "\n").replace('\n', "<br>\n"))
}

/// Renders an email body into an isolated style scope.
///
/// The result is a host `<div>` holding a declarative shadow root with
/// [`EMAIL_STYLES`] and the sanitized body. Plain-text bodies keep their
/// line breaks.
pub fn render_email(body: &str) -> String {
    let sanitized = sanitize_email_html(&body_as_html(body));
    format!(
        r#"<div class="email-host"><template shadowrootmode="open"><style>{EMAIL_STYLES}</style>{sanitized}</template></div>"#
    )
}

/// Wraps [`render_email`] in a standalone page suitable for an iframe or a
/// new tab.
pub fn render_email_document(subject: &str, body: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html>",
            r#"<html lang="en"><head><meta charset="utf-8">"#,
            r#"<meta name="referrer" content="no-referrer">"#,
            "<title>{}</title></head><body>{}</body></html>"
        ),
        escape_text(subject),
        render_email(body)
    )
}
