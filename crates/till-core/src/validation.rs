//! # Validation Module
//!
//! Boundary validation for every request that can change state.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller transport                                             │
//! │  └── Deserialization into typed requests (serde)                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Shape: ids, lengths, positive quantities                          │
//! │  └── Rules: sub-type vs direction, promotion windows                   │
//! │           │   (runs BEFORE a transaction is opened)                    │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE (sku, username)                                            │
//! │  ├── CHECK (quantity >= 0)                                             │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::validation::{validate_sku, validate_quantity};
//!
//! assert!(validate_sku("COKE-330").is_ok());
//! assert!(validate_quantity(5).is_ok());
//! ```

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::stock::StockSubType;
use crate::types::{AdjustStockRequest, NewProduct, NewUser, NewWarehouse, PlaceOrderRequest};
use crate::{MAX_ADJUSTMENT_QUANTITY, MAX_ITEM_QUANTITY, MAX_ORDER_LINES, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ```rust
/// use till_core::validation::validate_sku;
///
/// assert!(validate_sku("COKE-330").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();
    required(sku, "sku")?;
    max_len(sku, "sku", 50)?;

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (products, categories, warehouses, users).
pub fn validate_name(name: &str, field: &str) -> ValidationResult<()> {
    let name = name.trim();
    required(name, field)?;
    max_len(name, field, 200)
}

/// Validates a username: 3-50 characters, no whitespace.
pub fn validate_username(username: &str) -> ValidationResult<()> {
    required(username, "username")?;
    max_len(username, "username", 50)?;

    if username.chars().count() < 3 {
        return Err(ValidationError::OutOfRange {
            field: "username length".to_string(),
            min: 3,
            max: 50,
        });
    }
    if username.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }
    Ok(())
}

fn required(value: &str, field: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn max_len(value: &str, field: &str, max: usize) -> ValidationResult<()> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an order line quantity.
///
/// ```text
/// qty <= 0    → MustBePositive
/// qty > 999   → OutOfRange
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed.
///
/// ```text
/// cents < 0                → OutOfRange
/// cents > MAX_PRICE_CENTS  → OutOfRange
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    validate_amount_cents(cents, "price", 0)
}

/// Validates a money amount named `field` against `[min, MAX_PRICE_CENTS]`.
pub fn validate_amount_cents(cents: i64, field: &str, min: i64) -> ValidationResult<()> {
    if cents < min || cents > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

// =============================================================================
// Identifier & Date Validators
// =============================================================================

/// Validates a UUID string.
///
/// ```rust
/// use till_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    validate_uuid_field(id, "id")
}

/// Validates a UUID string, naming `field` in the error.
pub fn validate_uuid_field(id: &str, field: &str) -> ValidationResult<()> {
    required(id, field)?;

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

/// A validity window must end after it starts.
pub fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> ValidationResult<()> {
    if end <= start {
        return Err(ValidationError::InvalidFormat {
            field: "end_date".to_string(),
            reason: "must be after start_date".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates a checkout request before any side effect.
///
/// ## Rules
/// - `user_id` is a UUID
/// - 1 to MAX_ORDER_LINES lines
/// - every line has a UUID product id and a quantity in 1..=999
pub fn validate_place_order(request: &PlaceOrderRequest) -> ValidationResult<()> {
    validate_uuid_field(&request.user_id, "user_id")?;

    if request.items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }
    if request.items.len() > MAX_ORDER_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_LINES as i64,
        });
    }

    for line in &request.items {
        validate_uuid_field(&line.product_id, "product_id")?;
        validate_quantity(line.quantity)?;
    }

    Ok(())
}

/// Validates a direct stock movement.
pub fn validate_adjust_stock(user_id: &str, request: &AdjustStockRequest) -> ValidationResult<()> {
    validate_uuid_field(user_id, "user_id")?;
    validate_uuid_field(&request.product_id, "product_id")?;
    if let Some(warehouse_id) = &request.warehouse_id {
        validate_uuid_field(warehouse_id, "warehouse_id")?;
    }

    if request.quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    if request.quantity > MAX_ADJUSTMENT_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ADJUSTMENT_QUANTITY,
        });
    }

    if !request.sub_type.is_compatible_with(request.direction) {
        return Err(ValidationError::NotAllowed {
            field: format!("sub_type for {}", request.direction),
            allowed: StockSubType::allowed_for(request.direction),
        });
    }

    if let Some(notes) = &request.notes {
        max_len(notes, "notes", 500)?;
    }

    Ok(())
}

pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_sku(&product.sku)?;
    validate_name(&product.name, "name")?;
    validate_price_cents(product.price_cents)?;
    if let Some(category_id) = &product.category_id {
        validate_uuid_field(category_id, "category_id")?;
    }
    Ok(())
}

pub fn validate_new_user(user: &NewUser) -> ValidationResult<()> {
    validate_username(&user.username)?;
    validate_name(&user.name, "name")?;
    required(&user.password_hash, "password_hash")
}

pub fn validate_new_warehouse(warehouse: &NewWarehouse) -> ValidationResult<()> {
    validate_name(&warehouse.name, "name")?;
    validate_name(&warehouse.location, "location")?;
    if let Some(owner_id) = &warehouse.owner_id {
        validate_uuid_field(owner_id, "owner_id")?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::StockDirection;
    use crate::types::{OrderLineRequest, PaymentMethod};

    const USER: &str = "550e8400-e29b-41d4-a716-446655440000";
    const PRODUCT: &str = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";

    fn order(items: Vec<OrderLineRequest>) -> PlaceOrderRequest {
        PlaceOrderRequest {
            payment_method: PaymentMethod::Cash,
            user_id: USER.to_string(),
            items,
        }
    }

    fn line(quantity: i64) -> OrderLineRequest {
        OrderLineRequest {
            product_id: PRODUCT.to_string(),
            quantity,
        }
    }

    fn adjustment(direction: StockDirection, sub_type: StockSubType, quantity: i64) -> AdjustStockRequest {
        AdjustStockRequest {
            product_id: PRODUCT.to_string(),
            warehouse_id: None,
            quantity,
            direction,
            sub_type,
            notes: None,
        }
    }

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("COKE-330").is_ok());
        assert!(validate_sku("product_1").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("cashier1").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("two words").is_err());
        assert!(validate_username("").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_window() {
        let start = Utc::now();
        assert!(validate_window(start, start + chrono::Duration::seconds(1)).is_ok());
        assert!(validate_window(start, start).is_err());
        assert!(validate_window(start, start - chrono::Duration::days(1)).is_err());
    }

    #[test]
    fn test_validate_place_order() {
        assert!(validate_place_order(&order(vec![line(2)])).is_ok());

        let err = validate_place_order(&order(vec![])).unwrap_err();
        assert!(matches!(err, ValidationError::Required { .. }));

        let err = validate_place_order(&order(vec![line(2), line(0)])).unwrap_err();
        assert!(matches!(err, ValidationError::MustBePositive { .. }));

        let mut bad_product = order(vec![line(1)]);
        bad_product.items[0].product_id = "nope".into();
        assert!(validate_place_order(&bad_product).is_err());

        let too_many = order((0..=MAX_ORDER_LINES).map(|_| line(1)).collect());
        assert!(validate_place_order(&too_many).is_err());
    }

    #[test]
    fn test_validate_adjust_stock() {
        assert!(validate_adjust_stock(USER, &adjustment(StockDirection::In, StockSubType::Purchase, 5)).is_ok());
        assert!(validate_adjust_stock(USER, &adjustment(StockDirection::Out, StockSubType::Adjustment, 5)).is_ok());

        let err = validate_adjust_stock(USER, &adjustment(StockDirection::In, StockSubType::Purchase, 0))
            .unwrap_err();
        assert!(matches!(err, ValidationError::MustBePositive { .. }));

        let err = validate_adjust_stock(USER, &adjustment(StockDirection::In, StockSubType::Damaged, 1))
            .unwrap_err();
        assert!(matches!(err, ValidationError::NotAllowed { .. }));

        assert!(validate_adjust_stock("bad", &adjustment(StockDirection::In, StockSubType::Purchase, 1)).is_err());
    }

    #[test]
    fn test_validate_new_product() {
        let product = NewProduct {
            sku: "TEA-1".into(),
            name: "Green Tea".into(),
            price_cents: 350,
            category_id: None,
        };
        assert!(validate_new_product(&product).is_ok());

        let negative = NewProduct {
            price_cents: -1,
            ..product
        };
        assert!(validate_new_product(&negative).is_err());
    }

    #[test]
    fn test_validate_price_cents_bounds() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(MAX_PRICE_CENTS).is_ok());

        let err = validate_price_cents(MAX_PRICE_CENTS + 1).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { max: MAX_PRICE_CENTS, .. }));

        let huge = NewProduct {
            sku: "GOLD-1".into(),
            name: "Gold Bar".into(),
            price_cents: i64::MAX / 2,
            category_id: None,
        };
        assert!(validate_new_product(&huge).is_err());
    }
}
