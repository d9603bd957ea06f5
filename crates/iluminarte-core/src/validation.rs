//! # Validation Module
//!
//! Field validation for catalog and account input.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: Web adapter       - form parsing, required fields            │
//! │  Layer 2: THIS MODULE       - business rules on each field             │
//! │  Layer 3: SQLite            - UNIQUE(code), CHECK(stock >= 0), FKs     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use iluminarte_core::validation::{validate_code, validate_stock};
//!
//! assert!(validate_code("LAMP-01").is_ok());
//! assert!(validate_stock(-1).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::{NewProduct, ProductUpdate};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_CODE_LEN: usize = 50;
const MAX_NAME_LEN: usize = 100;
const MAX_USERNAME_LEN: usize = 150;
const MIN_PASSWORD_LEN: usize = 8;

/// Ten-digit prices and costs, as the shop's price lists allow.
pub const MAX_AMOUNT: i64 = 9_999_999_999;
/// Largest on-hand count for one product (32-bit counter).
pub const MAX_STOCK: i64 = i32::MAX as i64;

// =============================================================================
// Product Fields
// =============================================================================

/// Validates a product code.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens and underscores only
pub fn validate_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.chars().count() > MAX_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_CODE_LEN,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name (1-100 characters).
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a price or cost: 0 to [`MAX_AMOUNT`].
pub fn validate_amount(field: &str, amount: i64) -> ValidationResult<()> {
    validate_range(field, amount, MAX_AMOUNT)
}

/// Validates an on-hand stock count: 0 to [`MAX_STOCK`].
pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    validate_range("stock", stock, MAX_STOCK)
}

fn validate_range(field: &str, value: i64, max: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    if value > max {
        return Err(ValidationError::TooLarge {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates every field of a new product.
pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_product_name(&product.name)?;
    validate_code(&product.code)?;
    validate_amount("sale_price", product.sale_price)?;
    validate_amount("cost", product.cost)?;
    validate_stock(product.stock)
}

/// Validates every field of a product update.
pub fn validate_product_update(update: &ProductUpdate) -> ValidationResult<()> {
    validate_product_name(&update.name)?;
    validate_code(&update.code)?;
    validate_amount("sale_price", update.sale_price)?;
    validate_amount("cost", update.cost)?;
    validate_stock(update.stock)
}

// =============================================================================
// Account Fields
// =============================================================================

/// Validates a username.
///
/// ## Rules
/// - Must not be empty, at most 150 characters
/// - Letters, digits and `@ . + - _`
pub fn validate_username(username: &str) -> ValidationResult<()> {
    let username = username.trim();

    if username.is_empty() {
        return Err(ValidationError::Required {
            field: "username".to_string(),
        });
    }

    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: MAX_USERNAME_LEN,
        });
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "may contain only letters, numbers, and @/./+/-/_".to_string(),
        });
    }

    Ok(())
}

/// Validates a new password.
///
/// ## Rules
/// - At least 8 characters
/// - Not entirely numeric
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LEN,
        });
    }

    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "password".to_string(),
            reason: "cannot be entirely numeric".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_code() {
        assert!(validate_code("A1").is_ok());
        assert!(validate_code("LAMP-01_B").is_ok());

        assert!(validate_code("").is_err());
        assert!(validate_code("   ").is_err());
        assert!(validate_code("has space").is_err());
        assert!(validate_code(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("Lámpara de mesa").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name(&"a".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_amount("cost", 0).is_ok());
        assert!(validate_amount("cost", 12_500).is_ok());
        assert_eq!(
            validate_stock(-1),
            Err(ValidationError::Negative {
                field: "stock".to_string()
            })
        );
    }

    #[test]
    fn test_validate_upper_bounds() {
        assert!(validate_amount("sale_price", MAX_AMOUNT).is_ok());
        assert_eq!(
            validate_amount("sale_price", 1_000_000_000_000),
            Err(ValidationError::TooLarge {
                field: "sale_price".to_string(),
                max: MAX_AMOUNT,
            })
        );
        assert!(validate_stock(MAX_STOCK).is_ok());
        assert!(matches!(
            validate_stock(MAX_STOCK + 1),
            Err(ValidationError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_new_product_reports_first_failure() {
        let product = NewProduct {
            name: "Lamp".to_string(),
            code: "bad code".to_string(),
            sale_price: 100,
            cost: -5,
            stock: 1,
            image: None,
        };
        assert!(matches!(
            validate_new_product(&product),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("ana.rojas@tienda").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("ana rojas").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("s3cret-pass").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password("12345678").is_err());
    }
}
