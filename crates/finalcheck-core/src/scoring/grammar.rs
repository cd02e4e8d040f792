//! The `Final: <int>` line grammar.
//!
//! Checks run in a fixed order and the first failing check names the
//! outcome. Several conditions overlap (`Final: -` is both "missing digits"
//! and "non-digit"), so the order below is part of the contract.

use super::outcome::OutcomeCode;

/// Literal every accepted completion starts with.
pub const FINAL_PREFIX: &str = "Final: ";

/// A grammar rejection: the matched code plus a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub code: OutcomeCode,
    pub message: String,
}

impl Rejection {
    fn new(code: OutcomeCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A line that passed the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedAnswer<'a> {
    /// The integer text after the prefix, exactly as written.
    pub text: &'a str,
    /// `None` when the digits are valid but exceed the `i64` range. Such an
    /// answer can never equal an expected answer.
    pub value: Option<i64>,
}

/// Parse a single line of the form `Final: <int>`.
pub fn parse_final_line(line: &str) -> Result<ParsedAnswer<'_>, Rejection> {
    let Some(rest) = line.strip_prefix(FINAL_PREFIX) else {
        return Err(Rejection::new(
            OutcomeCode::MissingPrefix,
            "Completion must start with exactly 'Final: '",
        ));
    };

    if strip(rest) != rest {
        return Err(Rejection::new(
            OutcomeCode::ExtraWhitespace,
            "No extra spaces allowed after 'Final: ' or after the integer",
        ));
    }

    if rest.is_empty() {
        return Err(Rejection::new(
            OutcomeCode::MissingInteger,
            "Missing integer after 'Final: '",
        ));
    }

    if rest.starts_with('+') {
        return Err(Rejection::new(
            OutcomeCode::PlusSignDisallowed,
            "Plus sign is not allowed. Use plain digits (or leading '-')",
        ));
    }

    match rest.strip_prefix('-') {
        Some(digits) => {
            if digits.is_empty() {
                return Err(Rejection::new(
                    OutcomeCode::MissingDigits,
                    "A '-' must be followed by digits",
                ));
            }
            check_digits(digits)?;
            if digits == "0" {
                return Err(Rejection::new(
                    OutcomeCode::NegativeZeroDisallowed,
                    "Negative zero (-0) is not allowed",
                ));
            }
            check_leading_zero(digits)?;
        }
        None => {
            check_digits(rest)?;
            check_leading_zero(rest)?;
        }
    }

    // Only overflow can fail here; the digit checks above rule out the rest.
    let value = rest.parse::<i64>().ok();

    Ok(ParsedAnswer { text: rest, value })
}

fn check_digits(s: &str) -> Result<(), Rejection> {
    if s.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(Rejection::new(
            OutcomeCode::NonDigitCharacters,
            "Integer must contain digits only",
        ))
    }
}

fn check_leading_zero(digits: &str) -> Result<(), Rejection> {
    if digits.len() > 1 && digits.starts_with('0') {
        Err(Rejection::new(
            OutcomeCode::LeadingZeros,
            "Leading zeros are not allowed",
        ))
    } else {
        Ok(())
    }
}

/// Whitespace as the normaliser sees it: Unicode `White_Space` plus the
/// ASCII information separators `\x1c`..`\x1f`.
pub(crate) fn is_space(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

/// Strip leading and trailing whitespace (internal whitespace is kept).
pub(crate) fn strip(s: &str) -> &str {
    s.trim_matches(is_space)
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\u{0b}'
            | '\u{0c}'
            | '\u{1c}'
            | '\u{1d}'
            | '\u{1e}'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

/// Split text into lines on every line boundary (`\r\n` counts once).
///
/// Empty text yields no lines; a trailing boundary does not add an empty line.
pub(crate) fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }
        lines.push(&text[start..i]);
        let mut end = i + c.len_utf8();
        if c == '\r' {
            if let Some(&(_, '\n')) = chars.peek() {
                chars.next();
                end += 1;
            }
        }
        start = end;
    }

    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

/// Bound a diagnostic preview to `limit` characters.
pub(crate) fn preview(text: &str, limit: usize) -> String {
    let total = text.chars().count();
    if total <= limit {
        return text.to_string();
    }
    let head: String = text.chars().take(limit).collect();
    format!("{head}... <truncated {} chars>", total - limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(line: &str) -> OutcomeCode {
        parse_final_line(line).unwrap_err().code
    }

    #[test]
    fn accepts_plain_and_negative_integers() {
        assert_eq!(parse_final_line("Final: 0").unwrap().value, Some(0));
        assert_eq!(parse_final_line("Final: 323").unwrap().value, Some(323));
        let parsed = parse_final_line("Final: -5").unwrap();
        assert_eq!(parsed.value, Some(-5));
        assert_eq!(parsed.text, "-5");
    }

    #[test]
    fn rejection_order() {
        assert_eq!(code("final: 3"), OutcomeCode::MissingPrefix);
        assert_eq!(code("Final:3"), OutcomeCode::MissingPrefix);
        assert_eq!(code("Final:  3"), OutcomeCode::ExtraWhitespace);
        assert_eq!(code("Final: 3 "), OutcomeCode::ExtraWhitespace);
        assert_eq!(code("Final: "), OutcomeCode::MissingInteger);
        assert_eq!(code("Final: +3"), OutcomeCode::PlusSignDisallowed);
        assert_eq!(code("Final: -"), OutcomeCode::MissingDigits);
        assert_eq!(code("Final: -3a"), OutcomeCode::NonDigitCharacters);
        assert_eq!(code("Final: --3"), OutcomeCode::NonDigitCharacters);
        assert_eq!(code("Final: -0"), OutcomeCode::NegativeZeroDisallowed);
        assert_eq!(code("Final: -007"), OutcomeCode::LeadingZeros);
        assert_eq!(code("Final: 1,000"), OutcomeCode::NonDigitCharacters);
        assert_eq!(code("Final: 00"), OutcomeCode::LeadingZeros);
    }

    #[test]
    fn non_ascii_digits_are_rejected() {
        assert_eq!(code("Final: \u{0663}"), OutcomeCode::NonDigitCharacters);
        assert_eq!(code("Final: 2\u{00b2}"), OutcomeCode::NonDigitCharacters);
    }

    #[test]
    fn out_of_range_digits_parse_without_a_value() {
        let parsed = parse_final_line("Final: 99999999999999999999").unwrap();
        assert_eq!(parsed.text, "99999999999999999999");
        assert_eq!(parsed.value, None);
        assert_eq!(
            parse_final_line("Final: -9223372036854775809").unwrap().value,
            None
        );
        assert_eq!(
            parse_final_line("Final: -9223372036854775808").unwrap().value,
            Some(i64::MIN)
        );
    }

    #[test]
    fn split_lines_boundaries() {
        assert!(split_lines("").is_empty());
        assert_eq!(split_lines("a"), vec!["a"]);
        assert_eq!(split_lines("a\r\nb"), vec!["a", "b"]);
        assert_eq!(split_lines("a\rb\nc"), vec!["a", "b", "c"]);
        assert_eq!(split_lines("a\n\nb"), vec!["a", "", "b"]);
        assert_eq!(split_lines("a\u{2028}b"), vec!["a", "b"]);
        assert_eq!(split_lines("a\n"), vec!["a"]);
    }

    #[test]
    fn preview_truncates_with_marker() {
        assert_eq!(preview("short", 10), "short");
        let long = "x".repeat(12);
        assert_eq!(preview(&long, 10), "xxxxxxxxxx... <truncated 2 chars>");
    }

    #[test]
    fn strip_removes_separators_but_not_interior() {
        assert_eq!(strip("\u{1f} Final: 1 \t\n"), "Final: 1");
        assert_eq!(strip("a  b"), "a  b");
    }
}
