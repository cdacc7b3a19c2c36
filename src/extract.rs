//! Recovery of a single HTML document from possibly-decorated model output.
//!
//! Models wrap the payload in markdown fences or surround it with prose
//! despite instructions to the contrary. This module finds the first complete
//! document span deterministically and rejects anything ambiguous or
//! unclosed; it never attempts to repair malformed markup.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// How the document span was recovered from the raw model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// The document sat inside a markdown code fence.
    FencedBlock,
    /// The document was found directly in the output text.
    RawDocument,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no HTML document root found in model output")]
    NoDocumentRoot,
    #[error("HTML document root is never closed")]
    UnterminatedDocument,
    #[error("model output contains more than one HTML document root")]
    MultipleDocuments,
    #[error("document contains no visible content")]
    NoVisibleContent,
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)```").expect("static fence pattern")
    })
}

/// Extract the first complete HTML document from raw model output.
///
/// Fenced blocks are inspected before the surrounding text, since a fence is
/// the most common decoration. Returns the document text (doctype included
/// when present) and how it was recovered.
pub fn extract_document(raw: &str) -> Result<(String, Extraction), ExtractError> {
    for caps in fence_re().captures_iter(raw) {
        if let Some(inner) = caps.get(1) {
            if find_root_token(inner.as_str()).is_some() {
                return scan_document(inner.as_str()).map(|html| (html, Extraction::FencedBlock));
            }
        }
    }
    scan_document(raw).map(|html| (html, Extraction::RawDocument))
}

/// Byte offset of the first `<html` token followed by `>` or whitespace.
fn find_root_token(text: &str) -> Option<usize> {
    let lower = text.to_ascii_lowercase();
    let mut from = 0;
    while let Some(pos) = lower[from..].find("<html") {
        let at = from + pos;
        match lower[at + 5..].chars().next() {
            Some(c) if c == '>' || c.is_ascii_whitespace() => return Some(at),
            Some(_) => from = at + 5,
            None => return None,
        }
    }
    None
}

fn scan_document(text: &str) -> Result<String, ExtractError> {
    let lower = text.to_ascii_lowercase();
    let root = find_root_token(text).ok_or(ExtractError::NoDocumentRoot)?;

    // The root element cannot nest, so the first close terminates the span.
    let close = root + lower[root..]
        .find("</html")
        .ok_or(ExtractError::UnterminatedDocument)?;
    let after_name = close + "</html".len();
    let gt = after_name
        + lower[after_name..]
            .find(|c: char| !c.is_whitespace())
            .ok_or(ExtractError::UnterminatedDocument)?;
    if lower.as_bytes()[gt] != b'>' {
        return Err(ExtractError::UnterminatedDocument);
    }
    let end = gt + 1;

    // A second root token anywhere after the first, nested or trailing, makes
    // the output ambiguous; reject rather than guess.
    if find_root_token(&text[root + 5..]).is_some() {
        return Err(ExtractError::MultipleDocuments);
    }

    if !has_visible_text(&text[root..end]) {
        return Err(ExtractError::NoVisibleContent);
    }

    let start = doctype_start(&lower, root).unwrap_or(root);
    Ok(text[start..end].to_string())
}

/// Start of a doctype declaration separated from the root only by whitespace.
fn doctype_start(lower: &str, root: usize) -> Option<usize> {
    let prefix = &lower[..root];
    let dt = prefix.rfind("<!doctype")?;
    let gt = dt + prefix[dt..].find('>')?;
    if prefix[gt + 1..].chars().all(char::is_whitespace) {
        Some(dt)
    } else {
        None
    }
}

/// Whether the span carries any text outside of tags, comments, script and
/// style content. "Content-bearing" for a generated page means at least one
/// visible character.
fn has_visible_text(span: &str) -> bool {
    let lower = span.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'<' {
            let rest = &lower[i..];
            if rest.starts_with("<!--") {
                match lower[i + 4..].find("-->") {
                    Some(j) => {
                        i = i + 4 + j + 3;
                        continue;
                    }
                    None => return false,
                }
            }
            let skip_close = if rest.starts_with("<script") {
                Some("</script")
            } else if rest.starts_with("<style") {
                Some("</style")
            } else {
                None
            };
            if let Some(close) = skip_close {
                match lower[i + 1..].find(close) {
                    Some(j) => {
                        let after = i + 1 + j + close.len();
                        match lower[after..].find('>') {
                            Some(k) => {
                                i = after + k + 1;
                                continue;
                            }
                            None => return false,
                        }
                    }
                    None => return false,
                }
            }
            match rest.find('>') {
                Some(j) => {
                    i += j + 1;
                    continue;
                }
                None => return false,
            }
        }
        if !bytes[i].is_ascii_whitespace() {
            return true;
        }
        i += 1;
    }
    false
}
