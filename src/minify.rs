//! Conservative single-pass HTML minifier.
//!
//! Strips comments and collapses whitespace runs; never rewrites tags or
//! attributes. Content of `<pre>`, `<textarea>`, `<script>` and `<style>`
//! is copied verbatim, and conditional comments (`<!--[if ...]>`) are
//! preserved. Malformed structure (an unterminated comment, tag, or
//! raw-text element) fails with [`MinifyError`] rather than producing a
//! silently truncated document.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Elements whose text content must not be touched.
const RAW_TEXT_ELEMENTS: [&str; 4] = ["pre", "textarea", "script", "style"];

/// Errors produced on malformed input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MinifyError {
    /// A `<!--` with no matching `-->`.
    #[error("unterminated comment starting at byte {at}")]
    UnterminatedComment {
        /// Byte offset of the comment opener.
        at: usize,
    },

    /// A tag opener with no closing `>`.
    #[error("unterminated tag starting at byte {at}")]
    UnterminatedTag {
        /// Byte offset of the `<`.
        at: usize,
    },

    /// A raw-text element with no matching close tag.
    #[error("unterminated <{tag}> element starting at byte {at}")]
    UnterminatedRawText {
        /// Element name.
        tag: String,
        /// Byte offset of the opening tag.
        at: usize,
    },
}

/// Minifier behavior switches. Both default to enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinifyOptions {
    /// Strip `<!-- -->` comments (conditional comments always survive).
    #[serde(default = "default_true")]
    pub remove_comments: bool,
    /// Collapse whitespace runs outside raw-text elements to one space.
    #[serde(default = "default_true")]
    pub collapse_whitespace: bool,
}

impl Default for MinifyOptions {
    fn default() -> Self {
        Self {
            remove_comments: true,
            collapse_whitespace: true,
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Minify an HTML document.
///
/// The output is never larger than the input; callers deciding whether a
/// rewrite is worth it compare lengths (see the pipeline's no-savings
/// short-circuit).
///
/// # Errors
///
/// Returns [`MinifyError`] on structurally malformed input.
pub fn minify(input: &str, options: &MinifyOptions) -> Result<String, MinifyError> {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    let mut i = 0usize;

    while i < bytes.len() {
        let rest = &input[i..];

        if rest.starts_with("<!--") {
            let close = rest
                .find("-->")
                .ok_or(MinifyError::UnterminatedComment { at: i })?;
            let end = i + close + 3;
            if !options.remove_comments || rest.starts_with("<!--[if") {
                flush_space(&mut out, &mut pending_space);
                out.push_str(&input[i..end]);
            }
            // A removed comment leaves any surrounding whitespace pending,
            // so it still collapses across the gap.
            i = end;
            continue;
        }

        if bytes[i] == b'<' && is_tag_open(bytes, i) {
            let end = tag_end(input, i)?;
            flush_space(&mut out, &mut pending_space);
            out.push_str(&input[i..end]);

            if let Some(name) = raw_text_name(&input[i..end]) {
                let body_end = find_raw_text_end(input, end, name).ok_or_else(|| {
                    MinifyError::UnterminatedRawText {
                        tag: name.to_string(),
                        at: i,
                    }
                })?;
                out.push_str(&input[end..body_end]);
                i = body_end;
            } else {
                i = end;
            }
            continue;
        }

        let Some(ch) = rest.chars().next() else {
            break;
        };
        if ch.is_whitespace() && options.collapse_whitespace {
            pending_space = true;
        } else {
            flush_space(&mut out, &mut pending_space);
            out.push(ch);
        }
        i += ch.len_utf8();
    }

    // Trailing whitespace is dropped along with the pending flag.
    Ok(out)
}

/// Emit at most one space for a pending whitespace run. Leading document
/// whitespace produces nothing.
fn flush_space(out: &mut String, pending: &mut bool) {
    if *pending {
        if !out.is_empty() {
            out.push(' ');
        }
        *pending = false;
    }
}

/// A `<` only opens a tag when followed by a name, `/`, `!` or `?`;
/// anything else (`a < b`) is text.
fn is_tag_open(bytes: &[u8], i: usize) -> bool {
    match bytes.get(i + 1).copied() {
        Some(b) => b.is_ascii_alphabetic() || matches!(b, b'/' | b'!' | b'?'),
        None => false,
    }
}

/// Index one past the `>` closing the tag at `i`, honoring quoted
/// attribute values that may contain `>`.
fn tag_end(input: &str, i: usize) -> Result<usize, MinifyError> {
    let bytes = input.as_bytes();
    let mut quote: Option<u8> = None;
    let mut j = i + 1;
    while j < bytes.len() {
        match quote {
            Some(q) => {
                if bytes[j] == q {
                    quote = None;
                }
            }
            None => match bytes[j] {
                b'"' | b'\'' => quote = Some(bytes[j]),
                b'>' => return Ok(j + 1),
                _ => {}
            },
        }
        j += 1;
    }
    Err(MinifyError::UnterminatedTag { at: i })
}

/// If `tag` opens a raw-text element (and is not self-closing), return its
/// canonical name.
fn raw_text_name(tag: &str) -> Option<&'static str> {
    let name_part = tag.strip_prefix('<')?;
    if name_part.starts_with('/') {
        return None;
    }
    if tag.trim_end_matches('>').ends_with('/') {
        return None;
    }
    let name: String = name_part
        .chars()
        .take_while(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();
    RAW_TEXT_ELEMENTS.iter().find(|t| **t == name).copied()
}

/// Find the byte offset of the `</name` close tag for a raw-text element,
/// scanning from `from`. Case-insensitive; the name must be followed by
/// `>`, whitespace, or `/` to count as a close tag.
fn find_raw_text_end(input: &str, from: usize, name: &str) -> Option<usize> {
    let hay = input.as_bytes();
    let needle = format!("</{name}");
    let needle = needle.as_bytes();
    let mut j = from;
    while j + needle.len() <= hay.len() {
        if hay[j..j + needle.len()].eq_ignore_ascii_case(needle) {
            match hay.get(j + needle.len()).copied() {
                Some(b'>' | b' ' | b'\t' | b'\n' | b'\r' | b'/') | None => return Some(j),
                _ => {}
            }
        }
        j += 1;
    }
    None
}
