use regex::Regex;
use std::sync::LazyLock;

const INDENT: &str = "  ";
const MAX_LINE_WIDTH: usize = 80;

/// Elements that never take children, so they never open a nesting level.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr", "!doctype", "doctype",
];

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--.*?-->|</[^>]+>|<[^>]+/>|<[^>]+>").expect("valid token regex")
});
static TAG_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<([a-zA-Z0-9\-!]+)").expect("valid tag name regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Comment(&'a str),
    Close(&'a str),
    SelfClosing(&'a str),
    Open(&'a str),
    Text(&'a str),
}

/// Splits markup into tags, comments and the text between them.
/// Text slices are returned untouched, whitespace included.
pub(crate) fn tokenize(src: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut last = 0;
    for m in TOKEN.find_iter(src) {
        if m.start() > last {
            tokens.push(Token::Text(&src[last..m.start()]));
        }
        tokens.push(classify(m.as_str()));
        last = m.end();
    }
    if last < src.len() {
        tokens.push(Token::Text(&src[last..]));
    }
    tokens
}

fn classify(tag: &str) -> Token<'_> {
    if tag.starts_with("<!--") {
        Token::Comment(tag)
    } else if tag.starts_with("</") {
        Token::Close(tag)
    } else if tag.ends_with("/>") {
        Token::SelfClosing(tag)
    } else {
        Token::Open(tag)
    }
}

fn opens_level(tag: &str) -> bool {
    match TAG_NAME.captures(tag) {
        Some(caps) => {
            let name = caps[1].to_ascii_lowercase();
            !VOID_ELEMENTS.contains(&name.as_str())
        }
        None => false,
    }
}

/// Re-indents HTML source for display.
///
/// Whitespace runs collapse to a single space, every tag and comment lands
/// on its own line, nested elements are indented by two spaces and text is
/// word-wrapped at 80 columns. Void and self-closing elements never change
/// the depth. Formatting already formatted output returns it unchanged.
pub fn format_html(html: &str) -> String {
    let normalized = WHITESPACE.replace_all(html, " ");
    let normalized = normalized.trim();
    if normalized.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(normalized.len() * 2);
    let mut depth = 0usize;

    for token in tokenize(normalized) {
        match token {
            Token::Close(tag) => {
                depth = depth.saturating_sub(1);
                push_line(&mut out, depth, tag);
            }
            Token::Open(tag) => {
                push_line(&mut out, depth, tag);
                if opens_level(tag) {
                    depth += 1;
                }
            }
            Token::Comment(tag) | Token::SelfClosing(tag) => push_line(&mut out, depth, tag),
            Token::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    push_wrapped(&mut out, depth, text);
                }
            }
        }
    }

    out.truncate(out.trim_end().len());
    out
}

fn push_line(out: &mut String, depth: usize, line: &str) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    out.push_str(line);
    out.push('\n');
}

fn push_wrapped(out: &mut String, depth: usize, text: &str) {
    let indent_width = INDENT.len() * depth;
    let mut line = String::new();
    let mut line_width = 0;

    for word in text.split(' ') {
        let word_width = word.chars().count();
        if line.is_empty() {
            line.push_str(word);
            line_width = word_width;
        } else if indent_width + line_width + 1 + word_width > MAX_LINE_WIDTH {
            push_line(out, depth, &line);
            line.clear();
            line.push_str(word);
            line_width = word_width;
        } else {
            line.push(' ');
            line.push_str(word);
            line_width += 1 + word_width;
        }
    }

    if !line.is_empty() {
        push_line(out, depth, &line);
    }
}
