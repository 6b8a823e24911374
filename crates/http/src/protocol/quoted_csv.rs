//! Tokenizer for comma separated header values with quoted strings and
//! `;`-separated parameters, e.g.
//!
//! ```text
//! Forwarded: for="[2001:db8::1]:4711";proto=https, for=192.0.2.43
//! Accept-Encoding: gzip;q=1.0, identity; q=0.5, *;q=0
//! ```
//!
//! Each comma separated element yields an optional bare value followed by its
//! parameters. A leading `name=value` is a parameter, so the element has no
//! bare value. Parameter names are lower-cased and quoted values are unescaped.

use crate::ensure;
use crate::protocol::ParseError;

/// One comma separated element of a header value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvElement {
    value: Option<String>,
    params: Vec<(String, String)>,
}

impl CsvElement {
    /// The bare value, absent when the element starts with a parameter.
    #[inline]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Parameters in order of appearance, names lower-cased.
    #[inline]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// The first parameter with the given (lower-case) name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QuotedCsv;

impl QuotedCsv {
    /// Parses a single header value.
    pub fn parse(value: &str) -> Result<Vec<CsvElement>, ParseError> {
        let mut elements = Vec::new();
        Self::parse_into(value, &mut elements)?;
        Ok(elements)
    }

    /// Parses every value of a repeated header, keeping received order.
    pub fn parse_all<'a, I>(values: I) -> Result<Vec<CsvElement>, ParseError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut elements = Vec::new();
        for value in values {
            Self::parse_into(value, &mut elements)?;
        }
        Ok(elements)
    }

    fn parse_into(value: &str, elements: &mut Vec<CsvElement>) -> Result<(), ParseError> {
        for raw_element in split_unquoted(value, ',')? {
            if raw_element.trim().is_empty() {
                continue;
            }

            let mut element = CsvElement::default();
            for (index, segment) in split_unquoted(raw_element, ';')?.into_iter().enumerate() {
                let segment = segment.trim();
                if segment.is_empty() {
                    continue;
                }

                match find_unquoted(segment, '=') {
                    Some(eq) => {
                        let name = segment[..eq].trim();
                        ensure!(!name.is_empty(), ParseError::invalid_quoted_csv(format!("empty parameter name in `{value}`")));
                        let param_value = unquote(segment[eq + 1..].trim());
                        element.params.push((name.to_ascii_lowercase(), param_value));
                    }
                    None if index == 0 => element.value = Some(unquote(segment)),
                    None => element.params.push((segment.to_ascii_lowercase(), String::new())),
                }
            }

            if element.value.is_some() || !element.params.is_empty() {
                elements.push(element);
            }
        }
        Ok(())
    }
}

/// Splits on `separator` when outside a quoted string.
fn split_unquoted(value: &str, separator: char) -> Result<Vec<&str>, ParseError> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;

    for (index, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            c if c == separator && !quoted => {
                parts.push(&value[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }

    ensure!(!quoted, ParseError::invalid_quoted_csv(format!("unterminated quoted string in `{value}`")));
    parts.push(&value[start..]);
    Ok(parts)
}

fn find_unquoted(value: &str, target: char) -> Option<usize> {
    let mut quoted = false;
    let mut escaped = false;
    for (index, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            c if c == target && !quoted => return Some(index),
            _ => {}
        }
    }
    None
}

fn unquote(value: &str) -> String {
    if !value.contains('"') {
        return value.to_string();
    }

    let mut result = String::with_capacity(value.len());
    let mut quoted = false;
    let mut escaped = false;
    for c in value.chars() {
        if escaped {
            result.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            c => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_elements() {
        let elements = QuotedCsv::parse(r#"for="[2001:db8:cafe::17]:4711";Proto=https;by=203.0.113.43, for=192.0.2.60"#).unwrap();
        assert_eq!(elements.len(), 2);

        assert_eq!(elements[0].value(), None);
        assert_eq!(elements[0].param("for"), Some("[2001:db8:cafe::17]:4711"));
        assert_eq!(elements[0].param("proto"), Some("https"));
        assert_eq!(elements[0].param("by"), Some("203.0.113.43"));

        assert_eq!(elements[1].param("for"), Some("192.0.2.60"));
    }

    #[test]
    fn bare_value_with_params() {
        let elements = QuotedCsv::parse("gzip;q=1.0, identity; q=0.5, *;q=0").unwrap();
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].value(), Some("gzip"));
        assert_eq!(elements[0].param("q"), Some("1.0"));
        assert_eq!(elements[1].value(), Some("identity"));
        assert_eq!(elements[1].param("q"), Some("0.5"));
        assert_eq!(elements[2].value(), Some("*"));
    }

    #[test]
    fn quoted_comma_does_not_split() {
        let elements = QuotedCsv::parse(r#"for="a,b", host="x\"y""#).unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].param("for"), Some("a,b"));
        assert_eq!(elements[1].param("host"), Some("x\"y"));
    }

    #[test]
    fn empty_elements_are_skipped() {
        let elements = QuotedCsv::parse(" , gzip,, ").unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].value(), Some("gzip"));
    }

    #[test]
    fn parse_all_keeps_order() {
        let elements = QuotedCsv::parse_all(["for=a", "for=b, for=c"]).unwrap();
        let fors: Vec<_> = elements.iter().filter_map(|e| e.param("for")).collect();
        assert_eq!(fors, vec!["a", "b", "c"]);
    }

    #[test]
    fn malformed_input() {
        assert!(QuotedCsv::parse(r#"for="unterminated"#).is_err());
        assert!(QuotedCsv::parse("=value").is_err());
    }
}
