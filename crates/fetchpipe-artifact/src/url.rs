//! Source URL normalization
//!
//! Applied once when a [`Bundle`](crate::Bundle) is built, before any path
//! is derived or any fetch is issued.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes escaped by [`percent_encode`]: everything but ASCII alphanumerics,
/// `-_.` and the URL delimiters `%/:=&?~#+!$,;'@()*[]`.
const ESCAPED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'%')
    .remove(b'/')
    .remove(b':')
    .remove(b'=')
    .remove(b'&')
    .remove(b'?')
    .remove(b'~')
    .remove(b'#')
    .remove(b'+')
    .remove(b'!')
    .remove(b'$')
    .remove(b',')
    .remove(b';')
    .remove(b'\'')
    .remove(b'@')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'[')
    .remove(b']');

/// Repair and percent-encode a caller-supplied URL.
#[must_use]
pub fn normalize_url(url: &str) -> String {
    percent_encode(&repair_scheme(url))
}

/// Restore the double slash that some proxies collapse out of a scheme.
///
/// `http:/host/a.jpg` becomes `http://host/a.jpg`. Only a single slash
/// directly followed by a word character is repaired; well-formed URLs
/// pass through unchanged.
#[must_use]
pub fn repair_scheme(url: &str) -> String {
    ["http:/", "https:/"]
        .iter()
        .fold(url.to_owned(), |acc, scheme| repair_one(&acc, scheme))
}

fn repair_one(input: &str, scheme: &str) -> String {
    let mut out = String::with_capacity(input.len() + 1);
    let mut rest = input;
    while let Some(pos) = rest.find(scheme) {
        let (head, after) = rest.split_at(pos + scheme.len());
        out.push_str(head);
        if after.starts_with(is_word_char) {
            out.push('/');
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Percent-encode every byte outside the URL-safe set.
///
/// Existing escapes are preserved since `%` itself is safe, so the
/// function is idempotent.
#[must_use]
pub fn percent_encode(url: &str) -> String {
    utf8_percent_encode(url, ESCAPED).to_string()
}
