//! Text-to-number conversion for one flattened listing row.
//!
//! Nothing in here fails: every stage that finds no match yields `None` and
//! the row is still emitted with whatever fields did parse.

use std::sync::OnceLock;

use market_core::{ChangeDirection, MarketQuote, RawRow};
use regex::Regex;

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([+-]?)(\d+(?:\.\d+)?)%").unwrap())
}

fn numeric_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A magnitude suffix only counts as a whole letter, so "5 Trade" stays "5".
    RE.get_or_init(|| Regex::new(r"(?i)[+-]?\$?\d[\d,]*(?:\.\d+)?(?:\s?[KMBT]\b)?").unwrap())
}

fn signed_decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[+-]?\d+(?:\.\d+)?").unwrap())
}

/// First percent token in the text, as written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentToken {
    pub value: f64,
    /// The text carried a leading `+` or `-`.
    pub explicit_sign: bool,
}

/// Fields recovered from one row's text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenFields {
    pub last_price: Option<f64>,
    pub change_pct: Option<f64>,
    pub volume_text: Option<String>,
}

pub fn percent_token(text: &str) -> Option<PercentToken> {
    let caps = percent_re().captures(text)?;
    let sign = caps.get(1).map_or("", |m| m.as_str());
    let digits: f64 = caps.get(2)?.as_str().parse().ok()?;
    Some(PercentToken {
        value: if sign == "-" { -digits } else { digits },
        explicit_sign: !sign.is_empty(),
    })
}

/// Percentage-point value of the first `±12.34%` token.
pub fn extract_percent(text: &str) -> Option<f64> {
    percent_token(text).map(|token| token.value)
}

/// Percentage-point value, with a markup direction applied to unsigned
/// tokens. A sign written in the text always wins over the markup.
pub fn change_with_direction(text: &str, direction: Option<ChangeDirection>) -> Option<f64> {
    let token = percent_token(text)?;
    match (token.explicit_sign, direction) {
        (false, Some(ChangeDirection::Down)) => Some(-token.value),
        _ => Some(token.value),
    }
}

/// Every numeric token in document order.
pub fn numeric_tokens(text: &str) -> Vec<&str> {
    numeric_token_re()
        .find_iter(text)
        .map(|m| m.as_str())
        .collect()
}

fn suffix_multiplier(suffix: char) -> Option<f64> {
    match suffix.to_ascii_uppercase() {
        'K' => Some(1e3),
        'M' => Some(1e6),
        'B' => Some(1e9),
        'T' => Some(1e12),
        _ => None,
    }
}

/// Parse a price token: separators and currency prefix dropped, magnitude
/// suffix applied.
pub fn parse_price(token: &str) -> Option<f64> {
    let cleaned: String = token
        .chars()
        .filter(|c| !matches!(c, ',' | '$') && !c.is_whitespace())
        .collect();

    let (number, multiplier) = match cleaned.chars().last() {
        Some(last) if last.is_ascii_alphabetic() => (
            &cleaned[..cleaned.len() - last.len_utf8()],
            suffix_multiplier(last)?,
        ),
        _ => (cleaned.as_str(), 1.0),
    };

    let value: f64 = signed_decimal_re().find(number)?.as_str().parse().ok()?;
    Some(value * multiplier)
}

/// Volume token kept as display text: thousand separators and inner
/// whitespace removed, everything else (suffix included) verbatim.
pub fn volume_text(token: &str) -> String {
    token
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect()
}

/// Price is the first numeric token; volume is the last one, but only when
/// there are at least two.
pub fn extract_fields(text: &str, direction: Option<ChangeDirection>) -> TokenFields {
    let tokens = numeric_tokens(text);
    let last_price = tokens.first().and_then(|token| parse_price(token));
    let volume = if tokens.len() >= 2 {
        tokens.last().map(|token| volume_text(token))
    } else {
        None
    };

    TokenFields {
        last_price,
        change_pct: change_with_direction(text, direction),
        volume_text: volume,
    }
}

/// Turn a raw row into a typed quote.
pub fn normalize(raw: &RawRow) -> MarketQuote {
    let fields = extract_fields(&raw.text, raw.direction);
    MarketQuote {
        symbol: raw.symbol.clone(),
        last_price: fields.last_price,
        change_pct: fields.change_pct,
        volume_text: fields.volume_text.unwrap_or_default(),
    }
}
