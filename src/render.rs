//! Markdown to HTML for replies, and HTML to styled or plain output for the transcript.

use std::sync::LazyLock;

use html2text::render::text_renderer::{PlainDecorator, TaggedLine, TextDecorator};
use pulldown_cmark::{Options, Parser, html};
use pulldown_cmark_escape::escape_html_body_text;
use regex::{Captures, Regex};

use crate::tabs::ChatEntry;

const DARK_GOLD: &str = "#c09900";
const DARK_BLUE: &str = "#2384c8";
const DARK_GREEN: &str = "#2aa198";
const DARK_RED: &str = "#a6451c";

/// Width used when text is only needed for matching, not display. Longer lines still wrap.
const PLAIN_WIDTH: usize = 10_000;

fn style_for(tag: &str) -> Option<String> {
    let style = match tag {
        "b" | "strong" => format!("color: {DARK_GOLD}; font-weight: bold;"),
        "i" => format!("color: {DARK_GREEN}; font-style: italic;"),
        "em" => format!("color: {DARK_BLUE}; font-style: italic;"),
        "u" => format!("color: {DARK_BLUE}; text-decoration: underline;"),
        "s" | "strike" => format!("color: {DARK_RED}; text-decoration: line-through;"),
        "code" => format!("color: {DARK_GREEN}; font-weight: bold;"),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => format!("color: {DARK_RED}; font-weight: bold;"),
        _ => return None,
    };
    Some(style)
}

static OPEN_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(b|strong|i|em|u|s|strike|code|h[1-6]|body)(\s[^>]*?)?(/?)>").expect("tag pattern")
});
static STYLE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"style\s*=\s*"([^"]*)""#).expect("style pattern"));

pub fn markdown_to_html(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS;
    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

fn with_style(attrs: &str, style: &str) -> String {
    if STYLE_ATTR.is_match(attrs) {
        STYLE_ATTR
            .replace(attrs, |caps: &Captures| {
                format!(r#"style="{} {}""#, &caps[1], style)
            })
            .into_owned()
    } else {
        format!(r#"{attrs} style="{style}""#)
    }
}

/// Colour emphasis, code and headings, and set the base text colour.
pub fn style_transcript(html: &str, dark: bool) -> String {
    let base = if dark { "white" } else { "black" };
    let base_style = format!("color: {base};");
    let mut has_body = false;

    let styled = OPEN_TAG.replace_all(html, |caps: &Captures| {
        let tag = &caps[1];
        let attrs = caps.get(2).map_or("", |m| m.as_str());
        let close = &caps[3];
        let style = if tag == "body" {
            has_body = true;
            base_style.clone()
        } else {
            style_for(tag).unwrap_or_default()
        };
        format!("<{tag}{}{close}>", with_style(attrs, &style))
    });

    if has_body {
        styled.into_owned()
    } else {
        format!(r#"<div style="{base_style}">{styled}</div>"#)
    }
}

pub fn transcript_html(entries: &[ChatEntry], dark: bool) -> String {
    let joined: String = entries.iter().map(|entry| entry.content.as_str()).collect();
    style_transcript(&joined, dark)
}

/// Render HTML as wrapped terminal text.
pub fn html_to_text(html: &str, width: usize) -> String {
    html2text::from_read(html.as_bytes(), width.max(20))
}

/// Escape text for use inside an HTML element.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Writing to a String cannot fail.
    let _ = escape_html_body_text(&mut out, text);
    out
}

/// Plain decoration with link text kept inline and no footnote list.
#[derive(Clone, Debug)]
struct WireDecorator(PlainDecorator);

impl TextDecorator for WireDecorator {
    type Annotation = ();

    fn decorate_link_start(&mut self, _url: &str) -> (String, ()) {
        (String::new(), ())
    }

    fn decorate_link_end(&mut self) -> String {
        String::new()
    }

    fn decorate_em_start(&mut self) -> (String, ()) {
        self.0.decorate_em_start()
    }

    fn decorate_em_end(&mut self) -> String {
        self.0.decorate_em_end()
    }

    fn decorate_strong_start(&mut self) -> (String, ()) {
        self.0.decorate_strong_start()
    }

    fn decorate_strong_end(&mut self) -> String {
        self.0.decorate_strong_end()
    }

    fn decorate_strikeout_start(&mut self) -> (String, ()) {
        self.0.decorate_strikeout_start()
    }

    fn decorate_strikeout_end(&mut self) -> String {
        self.0.decorate_strikeout_end()
    }

    fn decorate_code_start(&mut self) -> (String, ()) {
        self.0.decorate_code_start()
    }

    fn decorate_code_end(&mut self) -> String {
        self.0.decorate_code_end()
    }

    fn decorate_preformat_first(&mut self) {
        self.0.decorate_preformat_first()
    }

    fn decorate_preformat_cont(&mut self) {
        self.0.decorate_preformat_cont()
    }

    fn decorate_image(&mut self, src: &str, title: &str) -> (String, ()) {
        self.0.decorate_image(src, title)
    }

    fn header_prefix(&mut self, level: usize) -> String {
        self.0.header_prefix(level)
    }

    fn quote_prefix(&mut self) -> String {
        self.0.quote_prefix()
    }

    fn unordered_item_prefix(&mut self) -> String {
        self.0.unordered_item_prefix()
    }

    fn ordered_item_prefix(&mut self, i: i64) -> String {
        self.0.ordered_item_prefix(i)
    }

    fn make_subblock_decorator(&self) -> Self {
        WireDecorator(self.0.make_subblock_decorator())
    }

    fn finalise(&mut self, _links: Vec<String>) -> Vec<TaggedLine<()>> {
        Vec::new()
    }
}

/// Text content of an HTML fragment, unwrapped, with links reduced to their text.
pub fn html_to_plain(html: &str) -> String {
    html2text::from_read_with_decorator(
        html.as_bytes(),
        PLAIN_WIDTH,
        WireDecorator(PlainDecorator::new()),
    )
}
