//! Input checks applied before anything reaches the ledger store.

use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

pub const MAX_SYMBOL_LEN: usize = 10;
pub const MAX_FEED_ID_LEN: usize = 50;

/// 1e15 units.
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0x0, false, 0);
/// 1e12 USD per unit.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0x0, false, 0);
/// 1e27 USD, the largest quantity at the largest unit price.
pub const MAX_TOTAL_AMOUNT: Decimal =
    Decimal::from_parts(0xE800_0000, 0x9FD0_803C, 0x033B_2E3C, false, 0);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Quantity must be greater than zero (got {0})")]
    NonPositiveQuantity(Decimal),
    #[error("Quantity {0} exceeds the maximum of {max}", max = MAX_QUANTITY)]
    QuantityTooLarge(Decimal),
    #[error("Unit price must not be negative (got {0})")]
    NegativePrice(Decimal),
    #[error("Unit price {0} exceeds the maximum of {max}", max = MAX_UNIT_PRICE)]
    PriceTooLarge(Decimal),
    #[error("Total amount must not be negative (got {0})")]
    NegativeTotal(Decimal),
    #[error("Total amount {0} exceeds the maximum of {max}", max = MAX_TOTAL_AMOUNT)]
    TotalTooLarge(Decimal),
    #[error("Symbol {0:?} contains no letters or digits")]
    EmptySymbol(String),
    #[error("Asset name must not be empty")]
    EmptyName,
    #[error("Price feed id must not be empty")]
    EmptyFeedId,
    #[error("Price feed id {0:?} may only contain lowercase letters, digits and '-'")]
    MalformedFeedId(String),
    #[error("Price feed id is longer than {max} characters", max = MAX_FEED_ID_LEN)]
    FeedIdTooLong,
}

/// Uppercase, keep ASCII alphanumerics only, truncate to [`MAX_SYMBOL_LEN`].
pub fn sanitize_symbol(raw: &str) -> Result<String, ValidationError> {
    let clean: String = raw
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .take(MAX_SYMBOL_LEN)
        .collect();
    if clean.is_empty() {
        return Err(ValidationError::EmptySymbol(raw.to_string()));
    }
    Ok(clean)
}

pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(name.to_string())
}

pub fn validate_feed_id(feed_id: &str) -> Result<String, ValidationError> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9-]+$").expect("valid regex"));

    let feed_id = feed_id.trim();
    if feed_id.is_empty() {
        return Err(ValidationError::EmptyFeedId);
    }
    if !pattern.is_match(feed_id) {
        return Err(ValidationError::MalformedFeedId(feed_id.to_string()));
    }
    if feed_id.len() > MAX_FEED_ID_LEN {
        return Err(ValidationError::FeedIdTooLong);
    }
    Ok(feed_id.to_string())
}

pub fn validate_quantity(quantity: Decimal) -> Result<(), ValidationError> {
    if quantity <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveQuantity(quantity));
    }
    if quantity > MAX_QUANTITY {
        return Err(ValidationError::QuantityTooLarge(quantity));
    }
    Ok(())
}

pub fn validate_unit_price(price: Decimal) -> Result<(), ValidationError> {
    if price < Decimal::ZERO {
        return Err(ValidationError::NegativePrice(price));
    }
    if price > MAX_UNIT_PRICE {
        return Err(ValidationError::PriceTooLarge(price));
    }
    Ok(())
}

pub fn validate_total_amount(total: Decimal) -> Result<(), ValidationError> {
    if total < Decimal::ZERO {
        return Err(ValidationError::NegativeTotal(total));
    }
    if total > MAX_TOTAL_AMOUNT {
        return Err(ValidationError::TotalTooLarge(total));
    }
    Ok(())
}
