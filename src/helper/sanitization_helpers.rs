use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

pub const MAX_TITLE_CHARS: usize = 200;

fn code_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The pattern is a literal; it always compiles.
    RE.get_or_init(|| Regex::new(r"(?s)```.*?```").unwrap())
}

/// Escapes HTML in Markdown content while leaving fenced code blocks (```) untouched.
/// Entities are decoded first so already-escaped input isn't escaped twice.
pub fn sanitize_markdown_content(markdown_input: &str) -> String {
    let mut output = String::with_capacity(markdown_input.len());
    let mut last_end = 0;

    for block in code_block_regex().find_iter(markdown_input) {
        output.push_str(&escape_text(&markdown_input[last_end..block.start()]));
        output.push_str(block.as_str());
        last_end = block.end();
    }
    output.push_str(&escape_text(&markdown_input[last_end..]));
    output
}

fn escape_text(text: &str) -> String {
    let decoded = html_escape::decode_html_entities(text);
    html_escape::encode_text(&decoded).into_owned()
}

/// Strips all HTML tags and returns plain, unescaped text. Used for titles;
/// escaping is left to whatever renders them.
pub fn strip_all_html(input: &str) -> String {
    let cleaned = ammonia::Builder::new()
        .tags(HashSet::new())
        .clean(input)
        .to_string();
    html_escape::decode_html_entities(&cleaned).into_owned()
}

/// Cleans a title and checks it is usable. Returns the error text to show on failure.
pub fn clean_title(raw: &str) -> Result<String, String> {
    let title = strip_all_html(raw).trim().to_string();
    if title.is_empty() {
        return Err("Title is mandatory and cannot be empty.".to_string());
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(format!("Title cannot exceed {} characters.", MAX_TITLE_CHARS));
    }
    Ok(title)
}
