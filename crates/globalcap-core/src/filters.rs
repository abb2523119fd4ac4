//! Whole-word name filters.

use crate::AssetType;

const FUND_WORDS: &[&str] = &[
    "ETF", "ETFS", "INDEX", "FUND", "FUNDS", "SPDR", "ISHARES", "VANGUARD", "INVESCO",
];

const REIT_WORDS: &[&str] = &["REIT", "REITS"];

/// True when `word` appears in `text` as a standalone token.
///
/// Tokens are maximal runs of ASCII letters and digits, compared
/// case-insensitively, so "Findex Corp" does not contain "INDEX".
pub fn contains_word(text: &str, word: &str) -> bool {
    text.split(|ch: char| !ch.is_ascii_alphanumeric())
        .any(|token| !token.is_empty() && token.eq_ignore_ascii_case(word))
}

fn contains_any_word(text: &str, words: &[&str]) -> bool {
    words.iter().any(|word| contains_word(text, word))
}

/// Exchange-traded funds, index products and fund families.
pub fn is_fund_name(name: &str) -> bool {
    contains_any_word(name, FUND_WORDS)
}

pub fn classify_asset_type(name: &str, industry: &str) -> AssetType {
    if contains_any_word(name, REIT_WORDS) || contains_any_word(industry, REIT_WORDS) {
        AssetType::Reit
    } else {
        AssetType::Stock
    }
}
