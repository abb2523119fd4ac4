use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{Symbol, ValidationError};

/// Asset class of a ranked record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    #[default]
    Stock,
    Reit,
    Commodity,
    Crypto,
}

impl AssetType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stock => "stock",
            Self::Reit => "reit",
            Self::Commodity => "commodity",
            Self::Crypto => "crypto",
        }
    }
}

impl Display for AssetType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated field set for an [`AssetRecord`].
///
/// Also the wire shape of the JSON artifact, so crypto snapshots written by
/// the external producer deserialize through it.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AssetDraft {
    pub ticker: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "market_cap")]
    pub market_cap_usd: f64,
    #[serde(default)]
    pub current_price: f64,
    #[serde(default)]
    pub previous_close: f64,
    #[serde(default)]
    pub percentage_change: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub primary_exchange: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub asset_type: AssetType,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub currency: String,
}

/// Canonical asset record flowing through the pipeline.
///
/// `market_cap_usd` is always USD while prices stay in the listing's native
/// currency. Records are validated once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AssetDraft")]
pub struct AssetRecord {
    ticker: Symbol,
    name: String,
    #[serde(rename = "market_cap")]
    market_cap_usd: f64,
    current_price: f64,
    previous_close: f64,
    percentage_change: f64,
    volume: f64,
    primary_exchange: String,
    country: String,
    sector: String,
    industry: String,
    asset_type: AssetType,
    image: Option<String>,
    currency: String,
}

impl AssetRecord {
    pub fn new(draft: AssetDraft) -> Result<Self, ValidationError> {
        let ticker = Symbol::parse(&draft.ticker)?;

        let name = draft.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyField { field: "name" });
        }

        validate_non_negative("market_cap", draft.market_cap_usd)?;
        validate_non_negative("current_price", draft.current_price)?;
        validate_non_negative("previous_close", draft.previous_close)?;
        validate_non_negative("volume", draft.volume)?;
        if !draft.percentage_change.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                field: "percentage_change",
            });
        }

        let currency = if draft.currency.trim().is_empty() {
            String::from("USD")
        } else {
            validate_currency_code(&draft.currency)?
        };

        let image = draft
            .image
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        Ok(Self {
            ticker,
            name: name.to_owned(),
            market_cap_usd: draft.market_cap_usd,
            current_price: draft.current_price,
            previous_close: draft.previous_close,
            percentage_change: draft.percentage_change,
            volume: draft.volume,
            primary_exchange: draft.primary_exchange.trim().to_owned(),
            country: draft.country.trim().to_owned(),
            sector: draft.sector.trim().to_owned(),
            industry: draft.industry.trim().to_owned(),
            asset_type: draft.asset_type,
            image,
            currency,
        })
    }

    pub fn ticker(&self) -> &Symbol {
        &self.ticker
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn market_cap_usd(&self) -> f64 {
        self.market_cap_usd
    }

    pub fn current_price(&self) -> f64 {
        self.current_price
    }

    pub fn previous_close(&self) -> f64 {
        self.previous_close
    }

    pub fn percentage_change(&self) -> f64 {
        self.percentage_change
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn primary_exchange(&self) -> &str {
        &self.primary_exchange
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn sector(&self) -> &str {
        &self.sector
    }

    pub fn industry(&self) -> &str {
        &self.industry
    }

    pub fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }
}

impl TryFrom<AssetDraft> for AssetRecord {
    type Error = ValidationError;

    fn try_from(value: AssetDraft) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// An asset with its 1-based position in the final ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedAsset {
    pub rank: u32,
    #[serde(flatten)]
    pub asset: AssetRecord,
}

pub fn validate_currency_code(input: &str) -> Result<String, ValidationError> {
    let normalized = input.trim().to_ascii_uppercase();
    let is_valid = normalized.len() == 3 && normalized.chars().all(|ch| ch.is_ascii_alphabetic());

    if !is_valid {
        return Err(ValidationError::InvalidCurrency {
            value: input.to_owned(),
        });
    }

    Ok(normalized)
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}
