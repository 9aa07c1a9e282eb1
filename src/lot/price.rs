//! Amount parsing for the site's euro format (`"5 000 €"`, `"9 000 € - 11 000 €"`).

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::ParseError;

/// Parse a single euro amount, tolerating thousands spacing and NBSPs.
pub fn parse_amount(text: &str) -> Result<Decimal, ParseError> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '€' | ' ' | '\u{a0}' | '\u{202f}' | '\t'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if cleaned.is_empty() {
        return Err(ParseError::Amount(text.to_string()));
    }

    Decimal::from_str(&cleaned).map_err(|_| ParseError::Amount(text.to_string()))
}

/// Parse an estimate range `"<low> - <high>"`.
pub fn parse_estimate(text: &str) -> Result<(Decimal, Decimal), ParseError> {
    let normalized = text.replace('\u{a0}', " ");
    let Some((low, high)) = normalized.split_once(" - ") else {
        return Err(ParseError::Estimate(text.to_string()));
    };

    let low = parse_amount(low).map_err(|_| ParseError::Estimate(text.to_string()))?;
    let high = parse_amount(high).map_err(|_| ParseError::Estimate(text.to_string()))?;
    Ok((low, high))
}

pub fn format_amount(amount: Decimal) -> String {
    format!("{} €", amount.normalize())
}
