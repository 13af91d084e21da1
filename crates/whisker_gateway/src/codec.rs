//! `@content~` framing.
//!
//! Works on raw bytes so a token (or a multi-byte character) split across
//! reads is reassembled before it is turned into text. The carry-over buffer
//! belongs to the connection; the codec only borrows it for one call.

use crate::error::{FramingError, FramingResult};
use regex::bytes::Regex;
use std::sync::LazyLock;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)@[^@~]+~").expect("token pattern compiles"));
static WHOLE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)^@([^@~]+)~$").expect("token pattern compiles"));

/// Longest unterminated fragment kept between reads.
pub const MAX_FRAGMENT_BYTES: usize = 64 * 1024;

/// Decode `incoming` on top of the unterminated fragment in `carry`.
///
/// Returns every token completed by this read, in order, and leaves the new
/// unterminated fragment in `carry`. On error `carry` is emptied so the next
/// read starts clean.
///
/// `carry` grows with every read until a `~` arrives. A fragment longer than
/// [`MAX_FRAGMENT_BYTES`] fails with [`FramingError::FragmentTooLong`].
pub fn decode(carry: &mut Vec<u8>, incoming: &[u8]) -> FramingResult<Vec<String>> {
    let result = decode_words(carry, incoming);
    if result.is_err() {
        carry.clear();
    }
    result
}

/// Frame `content` as `@content~`.
pub fn encode(content: &str) -> FramingResult<Vec<u8>> {
    if content.is_empty() {
        return Err(FramingError::EmptyContent);
    }
    if content.contains(['@', '~']) {
        return Err(FramingError::ReservedCharacter(content.to_string()));
    }
    Ok(format!("@{}~", content).into_bytes())
}

fn decode_words(carry: &mut Vec<u8>, incoming: &[u8]) -> FramingResult<Vec<String>> {
    let mut tokens = Vec::new();

    for word in words(incoming) {
        if carry.is_empty() {
            if let Some(content) = whole_token(word) {
                tokens.push(content);
                continue;
            }
            if !is_fragmentary(word) {
                if !word.iter().all(u8::is_ascii_whitespace) {
                    tokens.push(text(word));
                }
                continue;
            }
        }

        carry.extend_from_slice(word);
        match word.iter().position(|b| *b == b'~') {
            None if carry.len() > MAX_FRAGMENT_BYTES => {
                return Err(FramingError::FragmentTooLong(carry.len()))
            }
            None => continue,
            Some(pos) if pos + 1 != word.len() => return Err(FramingError::UnterminatedDelimiter),
            Some(_) => {}
        }

        match whole_token(carry) {
            Some(content) => {
                tokens.push(content);
                carry.clear();
            }
            None => return Err(FramingError::Malformed(text(carry))),
        }
    }

    Ok(tokens)
}

/// Complete tokens plus the text between them, the latter cut before every `@`.
fn words(input: &[u8]) -> Vec<&[u8]> {
    let mut words = Vec::new();
    let mut last = 0;
    for m in TOKEN.find_iter(input) {
        push_gap(&mut words, &input[last..m.start()]);
        words.push(m.as_bytes());
        last = m.end();
    }
    push_gap(&mut words, &input[last..]);
    words
}

fn push_gap<'a>(words: &mut Vec<&'a [u8]>, gap: &'a [u8]) {
    let mut start = 0;
    for (i, b) in gap.iter().enumerate() {
        if *b == b'@' && i > start {
            words.push(&gap[start..i]);
            start = i;
        }
    }
    if start < gap.len() {
        words.push(&gap[start..]);
    }
}

fn is_fragmentary(word: &[u8]) -> bool {
    word.iter().any(|b| *b == b'@' || *b == b'~')
}

fn whole_token(bytes: &[u8]) -> Option<String> {
    WHOLE_TOKEN
        .captures(bytes)
        .and_then(|caps| caps.get(1))
        .map(|m| text(m.as_bytes()))
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
