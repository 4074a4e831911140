//! Value Objects for the grocery domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Product name is empty or too long
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Price is negative, too large, or too precise
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Stock cannot be represented as a non-negative unit count
    #[error("Invalid stock: {0}")]
    InvalidStock(String),

    /// A stock transfer that does not move exactly one unit
    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),
}

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! surrogate_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Get the raw integer key
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

surrogate_id!(
    /// Surrogate key of a product, assigned by the store
    ProductId
);

surrogate_id!(
    /// Key of a grocery list (the list entity itself lives outside the ledger)
    ListId
);

surrogate_id!(
    /// Surrogate key of a ledger row
    ListItemId
);

// =============================================================================
// ProductName
// =============================================================================

/// Product name
///
/// # Invariants
/// - Trimmed, non-empty
/// - At most [`ProductName::MAX_LEN`] characters
/// - Compared case-sensitively, exactly as stored
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductName(String);

impl ProductName {
    /// Maximum length in characters
    pub const MAX_LEN: usize = 80;

    /// Create a product name, trimming surrounding whitespace
    ///
    /// # Errors
    /// Returns `DomainError::InvalidName` if the trimmed name is empty or too long
    pub fn new(value: impl AsRef<str>) -> Result<Self, DomainError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidName("Name is required".to_string()));
        }
        if trimmed.chars().count() > Self::MAX_LEN {
            return Err(DomainError::InvalidName(format!(
                "Name must be at most {} characters",
                Self::MAX_LEN
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the name as stored
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive substring match, used by product search
    pub fn matches(&self, search: &str) -> bool {
        self.0.to_lowercase().contains(&search.to_lowercase())
    }
}

impl TryFrom<String> for ProductName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProductName> for String {
    fn from(name: ProductName) -> Self {
        name.0
    }
}

impl fmt::Display for ProductName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Price
// =============================================================================

/// Price of one unit of a product
///
/// # Invariants
/// - 0.00 <= price <= 999.99
/// - At most two fractional digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Largest accepted price (999.99)
    pub fn max() -> Decimal {
        Decimal::new(99999, 2)
    }

    /// Create a new Price with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPrice` if value is out of range or has
    /// more than two fractional digits
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(DomainError::InvalidPrice(format!("{} is negative", value)));
        }
        if value > Self::max() {
            return Err(DomainError::InvalidPrice(format!("{} exceeds {}", value, Self::max())));
        }
        if value.normalize().scale() > 2 {
            return Err(DomainError::InvalidPrice(format!(
                "{} has more than two fractional digits",
                value
            )));
        }
        Ok(Self(value))
    }

    /// Parse a price from user or database text
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let decimal = value
            .trim()
            .parse::<Decimal>()
            .map_err(|_| DomainError::InvalidPrice(format!("'{}' is not a number", value)))?;
        Self::new(decimal)
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Zero price
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Convert a signed unit count (as read from a form or database) into stock
///
/// # Errors
/// Returns `DomainError::InvalidStock` for negative or oversized values
pub fn stock_from_i64(value: i64) -> Result<u32, DomainError> {
    u32::try_from(value)
        .map_err(|_| DomainError::InvalidStock(format!("{} is not a non-negative unit count", value)))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_name_is_trimmed() {
        let name = ProductName::new("  Melk ").unwrap();
        assert_eq!(name.as_str(), "Melk");
    }

    #[test]
    fn test_name_rejects_blank() {
        assert!(matches!(ProductName::new("   "), Err(DomainError::InvalidName(_))));
    }

    #[test]
    fn test_name_rejects_too_long() {
        let long = "x".repeat(ProductName::MAX_LEN + 1);
        assert!(ProductName::new(long).is_err());
        assert!(ProductName::new("x".repeat(ProductName::MAX_LEN)).is_ok());
    }

    #[test]
    fn test_name_is_case_sensitive() {
        assert_ne!(ProductName::new("melk").unwrap(), ProductName::new("Melk").unwrap());
    }

    #[test]
    fn test_name_search_ignores_case() {
        let name = ProductName::new("Cornflakes").unwrap();
        assert!(name.matches("FLAKE"));
        assert!(name.matches(""));
        assert!(!name.matches("melk"));
    }

    #[test]
    fn test_price_bounds() {
        assert!(Price::new(dec!(0)).is_ok());
        assert!(Price::new(dec!(0.95)).is_ok());
        assert!(Price::new(dec!(999.99)).is_ok());
        assert!(Price::new(dec!(1000.00)).is_err());
        assert!(Price::new(dec!(-0.01)).is_err());
    }

    #[test]
    fn test_price_rejects_three_decimals() {
        assert!(Price::new(dec!(1.999)).is_err());
        // Trailing zeros do not count as precision
        assert!(Price::new(dec!(1.900)).is_ok());
    }

    #[test]
    fn test_price_parse() {
        assert_eq!(Price::parse("7.98").unwrap().as_decimal(), dec!(7.98));
        assert!(Price::parse("abc").is_err());
        assert_eq!(Price::parse(" 2.19 ").unwrap().to_string(), "2.19");
    }

    #[test]
    fn test_price_max() {
        assert_eq!(Price::max(), dec!(999.99));
    }

    #[test]
    fn test_stock_from_i64() {
        assert_eq!(stock_from_i64(300).unwrap(), 300);
        assert!(stock_from_i64(-1).is_err());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&ProductId(7)).unwrap();
        assert_eq!(json, "7");
    }
}
