use crate::formatter::{tokenize, Token};

/// Escapes text for inclusion in HTML element content.
pub(crate) fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders HTML source as highlighted, escaped markup for a code view.
///
/// Tags are wrapped in `<span class="token tag">`, comments in
/// `<span class="token comment">`, matching the class names common
/// syntax-highlighting stylesheets expect.
pub fn highlight_html(source: &str) -> String {
    let mut out = String::from(r#"<pre class="language-html"><code class="language-html">"#);
    for token in tokenize(source) {
        match token {
            Token::Comment(c) => {
                out.push_str(r#"<span class="token comment">"#);
                out.push_str(&escape_text(c));
                out.push_str("</span>");
            }
            Token::Open(t) | Token::Close(t) | Token::SelfClosing(t) => {
                out.push_str(r#"<span class="token tag">"#);
                out.push_str(&escape_text(t));
                out.push_str("</span>");
            }
            Token::Text(t) => out.push_str(&escape_text(t)),
        }
    }
    out.push_str("</code></pre>");
    out
}
