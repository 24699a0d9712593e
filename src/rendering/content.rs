use pulldown_cmark::{html, Event, Options, Parser};

/// Maximum length (in characters) of a listing excerpt.
pub const EXCERPT_LEN: usize = 200;

fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
}

/// Render stored post or comment markdown to sanitized HTML.
///
/// Raw HTML embedded in the markdown passes through pulldown-cmark
/// untouched, so the rendered output goes through ammonia's allow-list
/// (scripts, event handlers and `javascript:` URLs are removed).
pub fn render_markdown(raw: &str) -> String {
    let parser = Parser::new_ext(raw, markdown_options() | Options::ENABLE_SMART_PUNCTUATION);
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    ammonia::clean(&html_output)
}

/// Build a plain-text excerpt for post listings.
pub fn excerpt(raw: &str, max_chars: usize) -> String {
    let parser = Parser::new_ext(raw, markdown_options());
    let text_only = ammonia::Builder::empty();
    let mut text = String::new();

    for event in parser {
        match event {
            Event::Text(t) | Event::Code(t) => {
                if !text.is_empty() && !text.ends_with(' ') {
                    text.push(' ');
                }
                text.push_str(&t);
                if text.chars().count() >= max_chars {
                    break;
                }
            }
            // Rich-text editors store HTML; keep only the text between tags.
            Event::Html(markup) | Event::InlineHtml(markup) => {
                let stripped = text_only.clean(&markup).to_string();
                let stripped = stripped.trim();
                if !stripped.is_empty() {
                    if !text.is_empty() && !text.ends_with(' ') {
                        text.push(' ');
                    }
                    text.push_str(stripped);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                text.push(' ');
            }
            _ => {}
        }
    }

    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    text.chars().take(max_chars).collect()
}
