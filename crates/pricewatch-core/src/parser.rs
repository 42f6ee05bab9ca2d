//! Parser for crawler output.
//!
//! Crawlers print one constructor-style record on success:
//!
//! ```text
//! Product(price=1000, original_price=1500, discount=None, link='http://x')
//! ```
//!
//! Fields may come in any order and may be missing. The literal `None` means
//! the crawler could not find the field and maps to [`Reported::Absent`].

use std::sync::LazyLock;

use regex::Regex;

use crate::error::AppError;
use crate::models::{ParsedCrawlResult, Reported};

const RECORD_PREFIX: &str = "Product(";
const RECORD_SUFFIX: &str = ")";
const ABSENT_TOKEN: &str = "None";

/// Matches a field key at the current scan position.
static FIELD_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(price|original_price|discount|link)=").expect("field key pattern is valid")
});

/// Stateless parser turning raw crawler stdout into a [`ParsedCrawlResult`].
#[derive(Debug, Default, Clone, Copy)]
pub struct OutputParser;

impl OutputParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse crawler stdout.
    ///
    /// Noise lines printed before the record are ignored; the last line
    /// starting with `Product(` is parsed.
    pub fn parse(&self, raw: &str) -> Result<ParsedCrawlResult, AppError> {
        if raw.trim().is_empty() {
            return Err(AppError::ParseError("empty crawler output".into()));
        }

        let line = raw
            .lines()
            .map(str::trim)
            .filter(|l| l.starts_with(RECORD_PREFIX))
            .next_back()
            .ok_or_else(|| {
                AppError::ParseError(format!(
                    "no {RECORD_PREFIX}...) record in crawler output: {}",
                    truncate(raw.trim(), 120)
                ))
            })?;

        let body = line
            .strip_prefix(RECORD_PREFIX)
            .and_then(|rest| rest.strip_suffix(RECORD_SUFFIX))
            .ok_or_else(|| AppError::ParseError(format!("unterminated record: {line}")))?;

        let mut result = ParsedCrawlResult::default();
        let mut seen: Vec<&str> = Vec::with_capacity(4);

        for (key, value) in split_fields(body)? {
            if seen.contains(&key) {
                return Err(AppError::ParseError(format!("duplicate field '{key}'")));
            }
            seen.push(key);

            match key {
                "price" => result.price = parse_integer(key, value)?,
                "original_price" => result.original_price = parse_integer(key, value)?,
                "discount" => result.discount = parse_discount(value),
                "link" => result.link = parse_link(value)?,
                other => {
                    return Err(AppError::ParseError(format!("unknown field '{other}'")));
                }
            }
        }

        Ok(result)
    }
}

/// Split the record body into `(key, raw value)` pairs.
///
/// A quoted value ends at its own closing quote, so commas and `key=` text
/// inside a link are kept. An unquoted value ends at the next comma. A value
/// must be followed by `,` and another field, or by the end of the body.
fn split_fields(body: &str) -> Result<Vec<(&str, &str)>, AppError> {
    let mut fields = Vec::with_capacity(4);
    if body.trim().is_empty() {
        return Ok(fields);
    }

    let mut rest = body;
    loop {
        let caps = FIELD_KEY.captures(rest).ok_or_else(|| unexpected_text(rest))?;
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            return Err(unexpected_text(rest));
        };
        let key = key.as_str();
        let (value, after) = split_value(key, rest[whole.end()..].trim_start())?;
        fields.push((key, value));

        let after = after.trim_start();
        if after.is_empty() {
            return Ok(fields);
        }
        rest = after
            .strip_prefix(',')
            .ok_or_else(|| unexpected_text(after))?;
    }
}

/// Take one raw value off the front of `input`, returning it and what follows.
///
/// Quoted values are returned with their quotes.
fn split_value<'a>(key: &str, input: &'a str) -> Result<(&'a str, &'a str), AppError> {
    if let Some(quote) = input.chars().next().filter(|c| matches!(c, '\'' | '"')) {
        let close = input[1..].find(quote).ok_or_else(|| {
            AppError::ParseError(format!("field '{key}' has an unterminated quote"))
        })?;
        return Ok(input.split_at(close + 2));
    }

    let (value, after) = input.split_at(input.find(',').unwrap_or(input.len()));
    let value = value.trim();
    if value.contains('=') {
        return Err(AppError::ParseError(format!(
            "field '{key}' has an unexpected value: '{}'",
            truncate(value, 60)
        )));
    }
    Ok((value, after))
}

fn unexpected_text(text: &str) -> AppError {
    AppError::ParseError(format!(
        "unexpected text in record: {}",
        truncate(text.trim(), 60)
    ))
}

fn parse_integer(key: &str, value: &str) -> Result<Reported<i64>, AppError> {
    if value == ABSENT_TOKEN {
        return Ok(Reported::Absent);
    }
    value
        .parse::<i64>()
        .map(Reported::Present)
        .map_err(|_| AppError::ParseError(format!("field '{key}' is not an integer: '{value}'")))
}

fn parse_discount(value: &str) -> Reported<String> {
    if value == ABSENT_TOKEN {
        return Reported::Absent;
    }
    Reported::Present(unquote(value).unwrap_or(value).to_string())
}

fn parse_link(value: &str) -> Result<Reported<String>, AppError> {
    if value == ABSENT_TOKEN {
        return Ok(Reported::Absent);
    }
    unquote(value)
        .map(|link| Reported::Present(link.to_string()))
        .ok_or_else(|| AppError::ParseError(format!("field 'link' is not quoted: {value}")))
}

/// Strip one pair of matching single or double quotes.
fn unquote(value: &str) -> Option<&str> {
    ['\'', '"']
        .into_iter()
        .find_map(|q| value.strip_prefix(q)?.strip_suffix(q))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
