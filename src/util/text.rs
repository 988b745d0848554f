use std::borrow::Cow;

use html2text::render::TrivialDecorator;

fn is_stripped_control(c: char) -> bool {
    c == '\u{7f}' || (c < '\u{20}' && c != '\t' && c != '\n' && c != '\r')
}

/// Strip C0 control characters and ANSI escape sequences from feed text.
///
/// Tab, newline and carriage return survive. CSI (`ESC [` .. final byte
/// 0x40-0x7E) and OSC (`ESC ]` .. BEL or `ESC \`) sequences are removed whole;
/// a bare ESC is dropped on its own.
///
/// Returns `Cow::Borrowed` when nothing needs stripping.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            match chars.peek() {
                Some('[') => {
                    chars.next();
                    for p in chars.by_ref() {
                        if ('\u{40}'..='\u{7e}').contains(&p) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    chars.next();
                    while let Some(p) = chars.next() {
                        if p == '\u{07}' {
                            break;
                        }
                        if p == '\u{1b}' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            }
        } else if !is_stripped_control(c) {
            out.push(c);
        }
    }

    Cow::Owned(out)
}

/// Wide enough that html2text never wraps a feed title or summary.
const RENDER_WIDTH: usize = 10_000;

/// Convert an HTML fragment to a single line of plain text.
///
/// Rendering goes through html2text with the trivial decorator, so no
/// markdown-style marks (`*`, `[1]`, `#`) leak into titles. Whitespace
/// runs then collapse to one space and control characters are stripped.
///
/// ```
/// use feedline::util::strip_html;
///
/// assert_eq!(strip_html("<p>Fish &amp; <b>chips</b></p>\n"), "Fish & chips");
/// ```
pub fn strip_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let rendered = match html2text::config::with_decorator(TrivialDecorator::new())
        .string_from_read(html.as_bytes(), RENDER_WIDTH)
    {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(error = %e, "HTML render failed, keeping raw text");
            html.to_string()
        }
    };

    strip_control_chars(&rendered)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
