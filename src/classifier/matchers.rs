//! Built-in category matchers and their check-digit validators
//!
//! Pattern shapes accept the common formatted variants (dashes, spaces,
//! parentheses); validators strip separators before applying checksum or
//! range checks, so formatting never changes the outcome.

use super::Category;
use regex::Regex;

/// A compiled matcher for one content category
pub struct Matcher {
    pub category: Category,
    pub pattern: Regex,
    /// Fixed confidence reported for every match of this matcher
    pub confidence: f64,
    /// Optional post-match validation (checksum, digit ranges)
    pub validate: Option<fn(&str) -> bool>,
}

/// The built-in matcher set, ordered by category
pub fn builtin_matchers() -> Vec<Matcher> {
    vec![
        Matcher {
            category: Category::Email,
            pattern: Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
                .expect("email pattern"),
            confidence: 0.95,
            validate: None,
        },
        Matcher {
            category: Category::PaymentCard,
            pattern: Regex::new(r"\b\d(?:[ -]?\d){12,18}\b").expect("card pattern"),
            confidence: 0.98,
            validate: Some(validate_payment_card),
        },
        Matcher {
            category: Category::NationalId,
            pattern: Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("national id pattern"),
            confidence: 0.90,
            validate: Some(validate_ssn),
        },
        Matcher {
            category: Category::Phone,
            pattern: Regex::new(
                r"(?:\+\d{1,3}[ .-]?)?\(?\d{3}\)?[ .-]\d{3}[ .-]\d{4}\b|\b\d{10}\b",
            )
            .expect("phone pattern"),
            confidence: 0.75,
            validate: Some(validate_phone),
        },
    ]
}

fn digits_of(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Luhn check-digit algorithm over the decimal digits of `text`
pub fn luhn_check(text: &str) -> bool {
    let digits: Vec<u32> = text.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 2 {
        return false;
    }
    let mut sum = 0u32;
    for (i, &d) in digits.iter().rev().enumerate() {
        let mut val = d;
        if i % 2 == 1 {
            val *= 2;
            if val > 9 {
                val -= 9;
            }
        }
        sum += val;
    }
    sum % 10 == 0
}

/// Payment card: 13-19 digits, plausible issuer prefix, Luhn-valid
pub fn validate_payment_card(text: &str) -> bool {
    let clean = digits_of(text);
    if clean.len() < 13 || clean.len() > 19 {
        return false;
    }
    if !matches!(clean.as_bytes()[0], b'3' | b'4' | b'5' | b'6') {
        return false;
    }
    luhn_check(&clean)
}

/// US SSN shape with area/group/serial range validation
pub fn validate_ssn(text: &str) -> bool {
    let clean = digits_of(text);
    if clean.len() != 9 {
        return false;
    }
    let area: u32 = clean[..3].parse().unwrap_or(0);
    let group: u32 = clean[3..5].parse().unwrap_or(0);
    let serial: u32 = clean[5..].parse().unwrap_or(0);
    area > 0 && area != 666 && area < 900 && group > 0 && serial > 0
}

/// Phone: 10-13 digits after stripping formatting
pub fn validate_phone(text: &str) -> bool {
    let len = digits_of(text).len();
    (10..=13).contains(&len)
}
