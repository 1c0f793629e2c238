//! Markdown to sanitized HTML.
//!
//! `pulldown-cmark` renders with tables, strikethrough, task lists, and
//! footnotes enabled. Single newlines become `<br>`. The resulting HTML is
//! passed through an `ammonia` allow-list, which drops scripts, styles,
//! frames, event-handler attributes, and non-http(s)/mailto URLs.
//!
//! Inline `style` survives only as `text-align` on table cells, and `class`
//! only with the names the renderer itself emits (`language-*` and the
//! footnote classes). Anything else would let a note restyle the page
//! around it.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

use ammonia::Builder;
use pulldown_cmark::{Event, Options, Parser, html};

/// Tags allowed through the sanitizer, with their extra attributes.
const ALLOWED: &[(&str, &[&str])] = &[
    ("a", &["href", "title"]),
    ("abbr", &["title"]),
    ("b", &[]),
    ("blockquote", &[]),
    ("br", &[]),
    ("code", &["class"]),
    ("del", &[]),
    ("div", &["class"]),
    ("em", &[]),
    ("h1", &["id"]),
    ("h2", &["id"]),
    ("h3", &["id"]),
    ("h4", &["id"]),
    ("h5", &["id"]),
    ("h6", &["id"]),
    ("hr", &[]),
    ("i", &[]),
    ("img", &["src", "alt", "title", "width", "height"]),
    ("input", &["type", "checked", "disabled"]),
    ("li", &["id"]),
    ("ol", &["start"]),
    ("p", &[]),
    ("pre", &[]),
    ("s", &[]),
    ("span", &["class"]),
    ("strong", &[]),
    ("sup", &["id", "class"]),
    ("table", &[]),
    ("tbody", &[]),
    ("td", &["align", "style"]),
    ("th", &["align", "style"]),
    ("thead", &[]),
    ("tr", &[]),
    ("ul", &[]),
];

const URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Classes pulldown-cmark puts on footnotes.
const FOOTNOTE_CLASSES: &[&str] = &[
    "footnote-definition",
    "footnote-definition-label",
    "footnote-reference",
];

fn allowed_class(name: &str) -> bool {
    name.strip_prefix("language-")
        .is_some_and(|lang| !lang.is_empty())
        || FOOTNOTE_CLASSES.contains(&name)
}

/// Keep only renderer-generated class names; drop the attribute if none remain.
fn filter_attribute<'u>(_tag: &str, attr: &str, value: &'u str) -> Option<Cow<'u, str>> {
    if attr != "class" {
        return Some(Cow::Borrowed(value));
    }
    let kept: Vec<&str> = value.split_whitespace().filter(|c| allowed_class(c)).collect();
    if kept.is_empty() {
        None
    } else {
        Some(Cow::Owned(kept.join(" ")))
    }
}

static SANITIZER: LazyLock<Builder<'static>> = LazyLock::new(|| {
    let mut builder = Builder::empty();
    builder
        .tags(ALLOWED.iter().map(|(tag, _)| *tag).collect::<HashSet<_>>())
        .clean_content_tags(HashSet::from(["script", "style"]))
        .url_schemes(URL_SCHEMES.iter().copied().collect::<HashSet<_>>())
        .link_rel(Some("noopener noreferrer"))
        .filter_style_properties(HashSet::from(["text-align"]))
        .attribute_filter(filter_attribute);
    for (tag, attrs) in ALLOWED {
        if !attrs.is_empty() {
            builder.add_tag_attributes(tag, attrs.iter().copied());
        }
    }
    builder
});

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
}

/// Render Markdown to HTML with the allow-list applied.
#[must_use]
pub fn render(markdown: &str) -> String {
    if markdown.is_empty() {
        return String::new();
    }
    let parser = Parser::new_ext(markdown, options()).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });
    let mut unsafe_html = String::with_capacity(markdown.len().saturating_mul(3) / 2);
    html::push_html(&mut unsafe_html, parser);
    sanitize(&unsafe_html)
}

/// Apply the allow-list to arbitrary HTML.
#[must_use]
pub fn sanitize(html: &str) -> String {
    SANITIZER.clean(html).to_string()
}

/// Escape text for safe inclusion in HTML bodies and attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    ammonia::clean_text(text)
}
