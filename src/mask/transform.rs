//! Category-specific masking transforms.

use crate::model::EntityLabel;
use crate::patterns::ADDRESS_PREFIX;
use once_cell::sync::Lazy;
use regex::Regex;

/// Mask character.
pub const MASK: char = '*';

static ADDRESS_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^({ADDRESS_PREFIX})")).expect("address prefix must compile")
});

/// Mask one entity's text according to its category.
///
/// | category | example |
/// |---|---|
/// | name | `홍길동` → `홍**` |
/// | national_id | `900101-1234567` → `900101-*******` |
/// | phone | `010-1234-5678` → `010-****-5678` |
/// | email | `test@example.com` → `t***@example.com` |
/// | card_number | `1234-5678-9012-3456` → `1234-****-****-3456` |
/// | address | `서울시 강남구 테헤란로 123` → `서울시 강남구 ****` |
/// | account_number | `110-123-456789` → `110-***-**6789` |
pub fn mask_entity(text: &str, label: EntityLabel) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }
    // Already-masked segments are left as they are.
    if is_masked(text) {
        return text.to_string();
    }
    match label {
        EntityLabel::Name => mask_name(text),
        EntityLabel::NationalId => mask_national_id(text),
        EntityLabel::Phone => mask_phone(text),
        EntityLabel::Email => mask_email(text),
        EntityLabel::CardNumber => mask_card(text),
        EntityLabel::Address => mask_address(text),
        EntityLabel::AccountNumber => mask_account(text),
    }
}

fn mask_name(text: &str) -> String {
    let mut chars = text.chars();
    let first = chars.next().unwrap_or(MASK);
    if chars.next().is_some() {
        format!("{}**", first)
    } else {
        format!("{}*", first)
    }
}

fn mask_national_id(text: &str) -> String {
    let digits = ascii_digits(text);
    if digits.len() < 6 {
        return mask_digits(text);
    }
    format!("{}-*******", &digits[..6])
}

fn mask_phone(text: &str) -> String {
    if text.starts_with('(') {
        if let Some(close) = text.find(')') {
            let rest = ascii_digits(&text[close + 1..]);
            if rest.len() >= 4 {
                return format!("{} ****-{}", &text[..=close], &rest[rest.len() - 4..]);
            }
        }
        return mask_digits(text);
    }
    let digits = ascii_digits(text);
    if digits.len() < 8 {
        return mask_digits(text);
    }
    let prefix = if digits.starts_with("02") { 2 } else { 3 };
    format!("{}-****-{}", &digits[..prefix], &digits[digits.len() - 4..])
}

fn mask_email(text: &str) -> String {
    match text.split_once('@') {
        Some((local, domain)) => match local.chars().next() {
            Some(first) => format!("{}***@{}", first, domain),
            None => format!("***@{}", domain),
        },
        None => {
            let first = text.chars().next().unwrap_or(MASK);
            format!("{}***", first)
        }
    }
}

fn mask_card(text: &str) -> String {
    let digits = ascii_digits(text);
    if digits.len() < 8 {
        return mask_digits(text);
    }
    format!("{}-****-****-{}", &digits[..4], &digits[digits.len() - 4..])
}

fn mask_address(text: &str) -> String {
    if let Some(head) = ADDRESS_HEAD.captures(text).and_then(|c| c.get(1)) {
        return format!("{} ****", head.as_str());
    }
    match text.split_once(char::is_whitespace) {
        Some((first, _)) => format!("{} ****", first),
        None => {
            let first = text.chars().next().unwrap_or(MASK);
            format!("{}****", first)
        }
    }
}

fn mask_account(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let (head, tail) = if chars.len() >= 9 { (4, 4) } else { (2.min(chars.len()), 0) };
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            if i < head || i >= chars.len() - tail || !c.is_ascii_digit() {
                c
            } else {
                MASK
            }
        })
        .collect()
}

fn ascii_digits(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn mask_digits(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_digit() { MASK } else { c })
        .collect()
}

/// Whether text already carries mask characters.
pub(crate) fn is_masked(text: &str) -> bool {
    text.contains(MASK)
}
