//! Minification for assembled components.
//!
//! Conservative, pure and deterministic: comments are stripped and
//! whitespace collapsed, nothing is renamed or restructured. Line breaks a
//! script may rely on for semicolon insertion are kept. Anything the scanner
//! cannot close (a comment, string or regex literal running past its end) is
//! reported instead of emitted half-processed.

use thiserror::Error;

use crate::components::ComponentKind;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MinifyError {
    #[error("Unterminated block comment")]
    UnterminatedComment,

    #[error("Unterminated string literal starting with {0}")]
    UnterminatedString(char),

    #[error("Unterminated regex literal")]
    UnterminatedRegex,
}

pub trait Minifier: Send + Sync {
    fn minify_script(&self, source: &str) -> Result<String, MinifyError>;
    fn minify_style(&self, source: &str) -> Result<String, MinifyError>;

    fn minify(&self, kind: ComponentKind, source: &str) -> Result<String, MinifyError> {
        match kind {
            ComponentKind::Script => self.minify_script(source),
            ComponentKind::Style => self.minify_style(source),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinMinifier;

impl Minifier for BuiltinMinifier {
    fn minify_script(&self, source: &str) -> Result<String, MinifyError> {
        let stripped = strip_comments(source, true)?;
        Ok(collapse_script_whitespace(&stripped))
    }

    fn minify_style(&self, source: &str) -> Result<String, MinifyError> {
        let stripped = strip_comments(source, false)?;
        Ok(collapse_style_whitespace(&stripped))
    }
}

/// Scanner state for comment stripping.
enum State {
    Normal,
    AfterSlash,
    InString(char),
    InStringEscape(char),
    InRegex { in_class: bool },
    InRegexEscape { in_class: bool },
    InBlockComment,
    InBlockCommentEnd,
    InLineComment,
}

/// Keywords after which a `/` opens a regex literal.
const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "case", "do", "else", "in", "new", "delete", "void", "throw",
];

/// Whether a `/` written after `out` starts a regex literal rather than a
/// division.
fn regex_allowed(out: &str) -> bool {
    let trimmed = out.trim_end();
    match trimmed.chars().last() {
        None => true,
        Some('(' | ',' | '=' | ':' | '[' | '!' | '&' | '|' | '?' | '{' | '}' | ';') => true,
        Some(c) if is_word_char(c) => {
            let word = &trimmed[trimmed.trim_end_matches(is_word_char).len()..];
            REGEX_KEYWORDS.contains(&word)
        }
        Some(_) => false,
    }
}

fn scan_normal(ch: char, output: &mut String) -> State {
    match ch {
        '"' | '\'' | '`' => {
            output.push(ch);
            State::InString(ch)
        }
        '/' => State::AfterSlash,
        _ => {
            output.push(ch);
            State::Normal
        }
    }
}

fn scan_regex(ch: char, in_class: bool, output: &mut String) -> Result<State, MinifyError> {
    if matches!(ch, '\n' | '\r') {
        return Err(MinifyError::UnterminatedRegex);
    }
    output.push(ch);
    Ok(match ch {
        '\\' => State::InRegexEscape { in_class },
        '[' if !in_class => State::InRegex { in_class: true },
        ']' if in_class => State::InRegex { in_class: false },
        '/' if !in_class => State::Normal,
        _ => State::InRegex { in_class },
    })
}

/// Strip `/* */` comments. With `script` set, `//` comments go too and regex
/// literals are copied verbatim. Quoted strings (including template
/// literals) are always copied verbatim.
pub fn strip_comments(input: &str, script: bool) -> Result<String, MinifyError> {
    let mut output = String::with_capacity(input.len());
    let mut state = State::Normal;

    for ch in input.chars() {
        state = match state {
            State::Normal => scan_normal(ch, &mut output),
            State::AfterSlash => match ch {
                '*' => State::InBlockComment,
                '/' if script => State::InLineComment,
                _ if script && regex_allowed(&output) => {
                    output.push('/');
                    scan_regex(ch, false, &mut output)?
                }
                _ => {
                    // Division, or a lone slash in a stylesheet.
                    output.push('/');
                    scan_normal(ch, &mut output)
                }
            },
            State::InString(quote) => {
                output.push(ch);
                if ch == '\\' {
                    State::InStringEscape(quote)
                } else if ch == quote {
                    State::Normal
                } else {
                    State::InString(quote)
                }
            }
            State::InStringEscape(quote) => {
                output.push(ch);
                State::InString(quote)
            }
            State::InRegex { in_class } => scan_regex(ch, in_class, &mut output)?,
            State::InRegexEscape { in_class } => {
                if matches!(ch, '\n' | '\r') {
                    return Err(MinifyError::UnterminatedRegex);
                }
                output.push(ch);
                State::InRegex { in_class }
            }
            State::InBlockComment => match ch {
                '*' => State::InBlockCommentEnd,
                _ => State::InBlockComment,
            },
            State::InBlockCommentEnd => match ch {
                '/' => {
                    // A comment still separates tokens.
                    output.push(' ');
                    State::Normal
                }
                '*' => State::InBlockCommentEnd,
                _ => State::InBlockComment,
            },
            State::InLineComment => match ch {
                '\n' | '\r' => {
                    output.push(ch);
                    State::Normal
                }
                _ => State::InLineComment,
            },
        };
    }

    match state {
        State::AfterSlash => {
            output.push('/');
            Ok(output)
        }
        State::InString(q) | State::InStringEscape(q) => Err(MinifyError::UnterminatedString(q)),
        State::InRegex { .. } | State::InRegexEscape { .. } => Err(MinifyError::UnterminatedRegex),
        State::InBlockComment | State::InBlockCommentEnd => Err(MinifyError::UnterminatedComment),
        State::Normal | State::InLineComment => Ok(output),
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

/// A literal `collapse_whitespace` copies untouched.
#[derive(Clone, Copy)]
enum Literal {
    Quoted(char),
    Regex { in_class: bool },
}

/// Copy `input`, replacing each whitespace run outside literals with whatever
/// `separator(prev, next, had_newline)` returns, or nothing.
/// Scripts keep regex literals intact; stylesheets lose a `;` directly
/// before `}`.
fn collapse_whitespace(
    input: &str,
    script: bool,
    separator: impl Fn(char, char, bool) -> Option<char>,
) -> String {
    let mut out = String::with_capacity(input.len());
    let mut literal: Option<Literal> = None;
    let mut escaped = false;
    let mut pending: Option<bool> = None;

    for ch in input.chars() {
        if let Some(lit) = literal {
            out.push(ch);
            literal = if escaped {
                escaped = false;
                Some(lit)
            } else if ch == '\\' {
                escaped = true;
                Some(lit)
            } else {
                match lit {
                    Literal::Quoted(q) if ch == q => None,
                    Literal::Regex { in_class: false } if ch == '/' => None,
                    Literal::Regex { in_class: false } if ch == '[' => Some(Literal::Regex { in_class: true }),
                    Literal::Regex { in_class: true } if ch == ']' => Some(Literal::Regex { in_class: false }),
                    _ => Some(lit),
                }
            };
            continue;
        }

        if ch.is_whitespace() {
            let newline = matches!(ch, '\n' | '\r');
            pending = Some(pending.unwrap_or(false) || newline);
            continue;
        }

        if let Some(newline) = pending.take() {
            if let Some(prev) = out.chars().last() {
                if let Some(sep) = separator(prev, ch, newline) {
                    out.push(sep);
                }
            }
        }

        if matches!(ch, '"' | '\'' | '`') {
            literal = Some(Literal::Quoted(ch));
        } else if script && ch == '/' && regex_allowed(&out) {
            literal = Some(Literal::Regex { in_class: false });
        }
        if !script && ch == '}' && out.ends_with(';') {
            out.pop();
        }
        out.push(ch);
    }

    out
}

/// A line break between these may be an implicit semicolon.
fn ends_statement(ch: char) -> bool {
    is_word_char(ch) || matches!(ch, ')' | ']' | '}' | '"' | '\'' | '`')
}

fn begins_statement(ch: char) -> bool {
    is_word_char(ch) || matches!(ch, '(' | '[' | '{' | '+' | '-' | '!' | '~' | '"' | '\'' | '`')
}

fn collapse_script_whitespace(input: &str) -> String {
    collapse_whitespace(input, true, |prev, next, newline| {
        if newline && ends_statement(prev) && begins_statement(next) {
            return Some('\n');
        }
        // `a + ++b` must not become `a+++b`.
        let keep = (prev == '+' && next == '+')
            || (prev == '-' && next == '-')
            || (is_word_char(prev) && is_word_char(next));
        keep.then_some(' ')
    })
}

fn collapse_style_whitespace(input: &str) -> String {
    collapse_whitespace(input, false, |prev, next, _| {
        let keep = !matches!(prev, '{' | '}' | ';' | ',' | ':' | '>')
            && !matches!(next, '{' | '}' | ';' | ',' | ':' | '>');
        keep.then_some(' ')
    })
}
