//! HTML pages.
//!
//! Pages are plain server-rendered HTML. Interactive parts (auto-save,
//! preview, the delete/download password prompts) live in `/static/app.js`,
//! which the CSP allows as the only script source.

use std::fmt::Write as _;

use axum::response::Html;

use yonote_core::markdown::{escape_html, render};
use yonote_core::time::{format_timestamp, now, time_ago};

/// Message shown while a lockout is active.
#[must_use]
pub fn lockout_message(remaining_secs: i64) -> String {
    format!("Too many failed password attempts. Please wait {remaining_secs} seconds and try again.")
}

/// Message shown after a wrong password that did not trigger a lock.
#[must_use]
pub fn wrong_password_message(attempts_remaining: u32) -> String {
    let plural = if attempts_remaining == 1 { "" } else { "s" };
    format!("Wrong password. {attempts_remaining} attempt{plural} remaining.")
}

/// What a note page needs to know about the note and the visitor.
#[derive(Debug)]
pub struct NoteView<'a> {
    pub key: &'a str,
    pub content: &'a str,
    pub updated_at: i64,
    pub has_password: bool,
    pub is_public: bool,
    pub authenticated: bool,
    pub is_new: bool,
}

fn layout(title: &str, flash: Option<&str>, body: &str) -> Html<String> {
    let mut page = String::with_capacity(body.len().saturating_add(1024));
    page.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    page.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    let _ = writeln!(page, "<title>{} · yonote</title>", escape_html(title));
    page.push_str("<style>\n");
    page.push_str(STYLE);
    page.push_str("</style>\n</head>\n<body>\n<main>\n");
    if let Some(message) = flash {
        let _ = writeln!(page, "<div class=\"flash\" role=\"status\">{}</div>", escape_html(message));
    }
    page.push_str(body);
    page.push_str("\n</main>\n<script src=\"/static/app.js\" defer></script>\n</body>\n</html>\n");
    Html(page)
}

fn saved_line(updated_at: i64) -> String {
    format!(
        "<span id=\"saved-at\" title=\"{}\">Saved {}</span>",
        format_timestamp(updated_at),
        time_ago(updated_at, now()),
    )
}

/// Editable note page.
#[must_use]
pub fn edit_page(view: &NoteView<'_>, flash: Option<&str>) -> Html<String> {
    let key = escape_html(view.key);
    let mut body = String::new();

    let _ = write!(
        body,
        "<header><h1><a href=\"/{key}\">/{key}</a></h1>{saved}\
         <nav><a href=\"/{key}?view=1\">View</a> \
         <a href=\"/{key}/download\" data-action=\"download\" data-protected=\"{protected}\">Download</a> \
         <a href=\"/{key}/delete\" data-action=\"delete\" data-protected=\"{protected}\">Delete</a> \
         <a href=\"/\">New note</a></nav></header>\n",
        saved = saved_line(view.updated_at),
        protected = view.has_password,
    );

    if view.is_new {
        body.push_str(
            "<p class=\"hint\">A new note. Bookmark this address to come back to it.</p>\n",
        );
    }

    let _ = write!(
        body,
        "<form id=\"note-form\" method=\"post\" action=\"/{key}/update\" data-key=\"{key}\">\n\
         <div class=\"editor\">\n\
         <textarea id=\"content\" name=\"content\" autofocus spellcheck=\"false\">{content}</textarea>\n\
         <div id=\"preview\" class=\"markdown\" hidden></div>\n\
         </div>\n\
         <fieldset>\n<legend>Protection</legend>\n",
        content = escape_html(view.content),
    );

    if view.has_password {
        body.push_str(
            "<label><input type=\"radio\" name=\"password_action\" value=\"keep\" checked> Keep password</label>\n\
             <label><input type=\"radio\" name=\"password_action\" value=\"change\"> Change password</label>\n\
             <label><input type=\"radio\" name=\"password_action\" value=\"remove\"> Remove password</label>\n",
        );
    } else {
        body.push_str(
            "<input type=\"hidden\" name=\"password_action\" value=\"change\">\n",
        );
    }
    let _ = write!(
        body,
        "<label>{label} <input type=\"password\" name=\"new_password\" autocomplete=\"new-password\"></label>\n\
         <label><input type=\"checkbox\" name=\"public\" value=\"1\"{checked}> Public read-only (requires a password)</label>\n\
         </fieldset>\n\
         <button type=\"submit\">Save</button> \
         <button type=\"button\" id=\"toggle-preview\">Preview</button>\n\
         <span id=\"autosave-status\" aria-live=\"polite\"></span>\n\
         </form>\n",
        label = if view.has_password { "New password" } else { "Set password" },
        checked = if view.is_public { " checked" } else { "" },
    );

    layout(view.key, flash, &body)
}

/// Read-only rendering of a note.
#[must_use]
pub fn read_only_page(view: &NoteView<'_>, flash: Option<&str>) -> Html<String> {
    let key = escape_html(view.key);
    let mut body = String::new();
    let _ = write!(body, "<header><h1>/{key}</h1>{}<nav>", saved_line(view.updated_at));
    if view.authenticated || !view.has_password {
        let _ = write!(body, "<a href=\"/{key}\">Edit</a> ");
    } else {
        let _ = write!(
            body,
            "<a href=\"/{key}?unlock=1\" data-action=\"unlock\">Unlock to edit</a> "
        );
    }
    let _ = write!(
        body,
        "<a href=\"/{key}/download\" data-action=\"download\" data-protected=\"false\">Download</a></nav></header>\n\
         <article class=\"markdown\">{}</article>\n",
        render(view.content),
    );
    layout(view.key, flash, &body)
}

/// Password challenge for a protected note.
#[must_use]
pub fn password_page(key: &str, next_url: &str, error: Option<&str>) -> Html<String> {
    let escaped = escape_html(key);
    let mut body = String::new();
    let _ = write!(
        body,
        "<h1>/{escaped}</h1>\n<p>This note is password-protected.</p>\n"
    );
    if let Some(error) = error {
        let _ = writeln!(body, "<p class=\"error\" role=\"alert\">{}</p>", escape_html(error));
    }
    let _ = write!(
        body,
        "<form method=\"post\" action=\"/{escaped}/verify\">\n\
         <input type=\"hidden\" name=\"next_url\" value=\"{next}\">\n\
         <label>Password <input type=\"password\" name=\"password\" autofocus required></label>\n\
         <button type=\"submit\">Unlock</button>\n\
         </form>\n",
        next = escape_html(next_url),
    );
    layout(key, None, &body)
}

const STYLE: &str = "\
body{margin:0;font:16px/1.5 system-ui,sans-serif;color:#222;background:#fafafa}\n\
main{max-width:960px;margin:0 auto;padding:1rem}\n\
header{display:flex;flex-wrap:wrap;gap:1rem;align-items:baseline}\n\
header h1{font-size:1.25rem;margin:0}\n\
nav a{margin-right:.75rem}\n\
textarea{width:100%;min-height:60vh;font:14px/1.5 ui-monospace,monospace;box-sizing:border-box}\n\
.markdown{background:#fff;padding:1rem;border:1px solid #ddd}\n\
.markdown table{border-collapse:collapse}\n\
.markdown td,.markdown th{border:1px solid #ccc;padding:.25rem .5rem}\n\
.flash{background:#eef6ff;border:1px solid #9cc3f5;padding:.5rem 1rem;margin-bottom:1rem}\n\
.error{color:#b00020}\n\
.hint{color:#666}\n\
fieldset{margin:1rem 0;border:1px solid #ddd}\n\
fieldset label{display:block}\n";

#[cfg(test)]
mod tests {
    use super::*;

    fn view<'a>(content: &'a str) -> NoteView<'a> {
        NoteView {
            key: "abc",
            content,
            updated_at: 0,
            has_password: false,
            is_public: false,
            authenticated: true,
            is_new: false,
        }
    }

    #[test]
    fn edit_page_escapes_content() {
        let Html(page) = edit_page(&view("</textarea><script>x</script>"), None);
        assert!(!page.contains("</textarea><script>"));
        assert!(page.contains("action=\"/abc/update\""));
    }

    #[test]
    fn read_only_page_renders_markdown() {
        let Html(page) = read_only_page(&view("**bold**"), Some("Saved"));
        assert!(page.contains("<strong>bold</strong>"));
        assert!(page.contains("class=\"flash\""));
    }

    #[test]
    fn password_page_shows_error() {
        let message = wrong_password_message(4);
        assert_eq!(message, "Wrong password. 4 attempts remaining.");
        let Html(page) = password_page("abc", "/abc", Some(&message));
        assert!(page.contains(&escape_html(&message)));
        assert!(page.contains("action=\"/abc/verify\""));
    }
}
