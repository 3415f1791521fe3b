//! x-www-form-urlencoded decoding.
//!
//! Small by intent: the store endpoint needs exactly one field out of
//! a form body (or, failing that, the query string), decoded with '+'
//! and percent-escape handling.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("invalid percent escape in form data")]
    InvalidEscape,
    #[error("form field is not valid utf-8")]
    InvalidUtf8,
}

/// Parse a form-encoded byte string into name/value pairs.
///
/// A bare `name` with no `=` parses as an empty value, matching what
/// common form parsers accept.
pub fn parse(data: &[u8]) -> Result<Vec<(String, String)>, FormError> {
    let mut fields = Vec::new();
    for pair in data.split(|&b| b == b'&') {
        if pair.is_empty() {
            continue;
        }
        let (name, value) = match pair.iter().position(|&b| b == b'=') {
            Some(at) => (&pair[..at], &pair[at + 1..]),
            None => (pair, &[][..]),
        };
        fields.push((decode_component(name)?, decode_component(value)?));
    }
    Ok(fields)
}

/// First value for `name`, if the form carried it.
pub fn first_value<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

fn decode_component(raw: &[u8]) -> Result<String, FormError> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hi = raw.get(i + 1).and_then(|&b| char::from(b).to_digit(16));
                let lo = raw.get(i + 2).and_then(|&b| char::from(b).to_digit(16));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi * 16 + lo) as u8);
                        i += 3;
                    }
                    _ => return Err(FormError::InvalidEscape),
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| FormError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plus_and_percent_escapes() {
        let fields = parse(b"code=fn+handler%28%29+%7B%7D&x=1").unwrap();
        assert_eq!(first_value(&fields, "code"), Some("fn handler() {}"));
        assert_eq!(first_value(&fields, "x"), Some("1"));
    }

    #[test]
    fn empty_value_and_bare_name_both_parse() {
        let fields = parse(b"code=&flag").unwrap();
        assert_eq!(first_value(&fields, "code"), Some(""));
        assert_eq!(first_value(&fields, "flag"), Some(""));
    }

    #[test]
    fn missing_field_is_none() {
        let fields = parse(b"other=1").unwrap();
        assert_eq!(first_value(&fields, "code"), None);
    }

    #[test]
    fn broken_escape_is_an_error() {
        assert!(matches!(parse(b"code=%zz"), Err(FormError::InvalidEscape)));
        assert!(matches!(parse(b"code=%4"), Err(FormError::InvalidEscape)));
    }

    #[test]
    fn non_utf8_after_decoding_is_an_error() {
        assert!(matches!(parse(b"code=%ff%fe"), Err(FormError::InvalidUtf8)));
    }
}
