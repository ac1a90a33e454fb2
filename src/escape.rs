//! String Literal Escaping
//!
//! Makes untrusted text safe to embed inside a quoted script string that is
//! itself inside an HTML document. Single pass, one character at a time: an
//! escape sequence written for one character is never revisited.

/// Escape `text` for a single- or double-quoted script string literal.
///
/// Total over every `char`. Backslash, CR and LF become escape sequences;
/// quotes and angle brackets gain a leading backslash so the literal can
/// neither terminate early nor close the surrounding `<script>` element.
pub fn js_quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '"' | '\'' | '<' | '>' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Escape text for an HTML text or attribute context.
pub(crate) fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
