//! # Promotion Resolver
//!
//! Selects the promotion that applies to a product line or to a whole cart,
//! and prices the line under it.
//!
//! ## Resolution Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Item promotions                                 │
//! │                                                                         │
//! │  product.promotions (storage order)                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  first with  start_date < now < end_date      ← both bounds EXCLUSIVE  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  price_with(rule, unit_price, quantity) ──► line total (≥ 0)           │
//! │                                                                         │
//! │                         Cart promotions                                 │
//! │                                                                         │
//! │  cart_promotions (storage order)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  first with  minimum_purchase ≤ subtotal                               │
//! │         and  start_date ≤ now ≤ end_date      ← both bounds INCLUSIVE  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  percentage of subtotal, or the fixed amount                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//! `now` is an argument, captured once by the caller per resolution. There is
//! no priority field: among overlapping promotions the first in storage order
//! wins, so callers must hand promotions over in a stable order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::Product;

// =============================================================================
// Promotion Type
// =============================================================================

/// Discriminant of [`PromotionRule`], as stored in the `promotion_type` column.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionType {
    PercentageDiscount,
    FixedDiscount,
    BuyXGetY,
    BundlePrice,
}

impl fmt::Display for PromotionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PromotionType::PercentageDiscount => "percentage_discount",
            PromotionType::FixedDiscount => "fixed_discount",
            PromotionType::BuyXGetY => "buy_x_get_y",
            PromotionType::BundlePrice => "bundle_price",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Item Rule
// =============================================================================

/// Type-specific terms of a product promotion.
///
/// Each variant carries exactly the fields its type needs, so a percentage
/// promotion cannot accidentally carry a bundle price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "promotion_type", rename_all = "snake_case")]
pub enum PromotionRule {
    /// Unit price reduced by a percentage (basis points).
    PercentageDiscount { percent_bps: u32 },
    /// Unit price reduced by a fixed amount.
    FixedDiscount { amount_cents: i64 },
    /// Buying `buy_product_id` adds a free `get_product_id` line.
    BuyXGetY {
        buy_product_id: String,
        get_product_id: String,
    },
    /// Every `required_quantity` units cost `promo_price_cents`.
    BundlePrice {
        required_quantity: i64,
        promo_price_cents: i64,
    },
}

impl PromotionRule {
    pub fn promotion_type(&self) -> PromotionType {
        match self {
            PromotionRule::PercentageDiscount { .. } => PromotionType::PercentageDiscount,
            PromotionRule::FixedDiscount { .. } => PromotionType::FixedDiscount,
            PromotionRule::BuyXGetY { .. } => PromotionType::BuyXGetY,
            PromotionRule::BundlePrice { .. } => PromotionType::BundlePrice,
        }
    }

    /// Builds a rule from flat storage columns.
    ///
    /// ## Column Usage
    /// ```text
    /// percentage_discount  discount_value = basis points (1..=10000)
    /// fixed_discount       discount_value = cents (> 0)
    /// buy_x_get_y          buy_product_id, get_product_id
    /// bundle_price         required_quantity (> 0), promo_price (> 0)
    /// ```
    pub fn from_parts(
        promotion_type: PromotionType,
        discount_value: Option<i64>,
        buy_product_id: Option<String>,
        get_product_id: Option<String>,
        required_quantity: Option<i64>,
        promo_price_cents: Option<i64>,
    ) -> CoreResult<Self> {
        let rule = match promotion_type {
            PromotionType::PercentageDiscount => {
                let bps = require(discount_value, promotion_type, "discount_value")?;
                let percent_bps = u32::try_from(bps).map_err(|_| invalid(format!(
                    "percentage_discount discount_value out of range: {}",
                    bps
                )))?;
                PromotionRule::PercentageDiscount { percent_bps }
            }
            PromotionType::FixedDiscount => PromotionRule::FixedDiscount {
                amount_cents: require(discount_value, promotion_type, "discount_value")?,
            },
            PromotionType::BuyXGetY => PromotionRule::BuyXGetY {
                buy_product_id: require(buy_product_id, promotion_type, "buy_product_id")?,
                get_product_id: require(get_product_id, promotion_type, "get_product_id")?,
            },
            PromotionType::BundlePrice => PromotionRule::BundlePrice {
                required_quantity: require(required_quantity, promotion_type, "required_quantity")?,
                promo_price_cents: require(promo_price_cents, promotion_type, "promo_price")?,
            },
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Checks that the rule's fields are present and positive.
    pub fn validate(&self) -> CoreResult<()> {
        match self {
            PromotionRule::PercentageDiscount { percent_bps } => {
                if *percent_bps == 0 || *percent_bps > 10_000 {
                    return Err(ValidationError::OutOfRange {
                        field: "discount_value".to_string(),
                        min: 1,
                        max: 10_000,
                    }
                    .into());
                }
            }
            PromotionRule::FixedDiscount { amount_cents } => {
                amount(*amount_cents, "discount_value")?;
            }
            PromotionRule::BuyXGetY {
                buy_product_id,
                get_product_id,
            } => {
                if buy_product_id.trim().is_empty() {
                    return Err(ValidationError::Required {
                        field: "buy_product_id".to_string(),
                    }
                    .into());
                }
                if get_product_id.trim().is_empty() {
                    return Err(ValidationError::Required {
                        field: "get_product_id".to_string(),
                    }
                    .into());
                }
            }
            PromotionRule::BundlePrice {
                required_quantity,
                promo_price_cents,
            } => {
                positive(*required_quantity, "required_quantity")?;
                amount(*promo_price_cents, "promo_price")?;
            }
        }
        Ok(())
    }

    /// Line total for `quantity` units at `unit_price` under this rule.
    ///
    /// ```text
    /// percentage  (p − round(p × bps / 10000)) × q
    /// fixed       (p − v) × q
    /// bundle      (q div r) × b + (q mod r) × p
    /// buy-get     p × q        (the free line is emitted separately)
    /// ```
    /// The result is clamped at zero.
    pub fn price_with(&self, unit_price: Money, quantity: i64) -> Money {
        let total = match self {
            PromotionRule::PercentageDiscount { percent_bps } => unit_price
                .apply_percentage_discount(*percent_bps)
                .multiply_quantity(quantity),
            PromotionRule::FixedDiscount { amount_cents } => {
                (unit_price - Money::from_cents(*amount_cents)).multiply_quantity(quantity)
            }
            PromotionRule::BundlePrice {
                required_quantity,
                promo_price_cents,
            } => {
                let bundles = quantity / required_quantity;
                let rest = quantity % required_quantity;
                Money::from_cents(*promo_price_cents).multiply_quantity(bundles)
                    + unit_price.multiply_quantity(rest)
            }
            PromotionRule::BuyXGetY { .. } => unit_price.multiply_quantity(quantity),
        };
        total.non_negative()
    }
}

fn require<T>(value: Option<T>, promotion_type: PromotionType, field: &str) -> CoreResult<T> {
    value.ok_or_else(|| invalid(format!("{} requires {}", promotion_type, field)))
}

fn positive(value: i64, field: &str) -> CoreResult<()> {
    if value <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        }
        .into());
    }
    Ok(())
}

fn amount(cents: i64, field: &str) -> CoreResult<()> {
    crate::validation::validate_amount_cents(cents, field, 1)?;
    Ok(())
}

fn invalid(reason: String) -> CoreError {
    CoreError::InvalidPromotion { reason }
}

// =============================================================================
// Item Promotion
// =============================================================================

/// A promotion attached to one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: String,
    pub product_id: String,
    #[serde(flatten)]
    pub rule: PromotionRule,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Promotion {
    /// Strict window: active only while `start_date < now < end_date`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_date < now && now < self.end_date
    }

    /// The free line this promotion yields when `product_id` is bought.
    pub fn free_item_for(&self, product_id: &str) -> Option<&str> {
        match &self.rule {
            PromotionRule::BuyXGetY {
                buy_product_id,
                get_product_id,
            } if buy_product_id == product_id => Some(get_product_id.as_str()),
            _ => None,
        }
    }
}

/// Input for creating a product promotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPromotion {
    pub product_id: String,
    #[serde(flatten)]
    pub rule: PromotionRule,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl NewPromotion {
    pub fn validate(&self) -> CoreResult<()> {
        crate::validation::validate_uuid_field(&self.product_id, "product_id")?;
        crate::validation::validate_window(self.start_date, self.end_date)?;
        self.rule.validate()
    }
}

/// Returns the first promotion active at `now`, in slice order.
///
/// ```rust
/// use chrono::{Duration, Utc};
/// use till_core::promotion::{select_item_promotion, Promotion, PromotionRule};
///
/// let now = Utc::now();
/// let promo = Promotion {
///     id: "a".into(),
///     product_id: "p".into(),
///     rule: PromotionRule::FixedDiscount { amount_cents: 10 },
///     start_date: now - Duration::hours(1),
///     end_date: now + Duration::hours(1),
///     created_at: now,
/// };
/// assert!(select_item_promotion(std::slice::from_ref(&promo), now).is_some());
/// // Exactly at the start bound the promotion is not yet active
/// assert!(select_item_promotion(std::slice::from_ref(&promo), promo.start_date).is_none());
/// ```
pub fn select_item_promotion(promotions: &[Promotion], now: DateTime<Utc>) -> Option<&Promotion> {
    promotions.iter().find(|p| p.is_active_at(now))
}

/// Effective line total and the promotion that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResolution<'a> {
    pub total: Money,
    pub promotion: Option<&'a Promotion>,
}

/// Resolves the line total for `quantity` units of `product` at `now`.
///
/// Without an active promotion the total is list price times quantity.
pub fn resolve_item_discount(product: &Product, quantity: i64, now: DateTime<Utc>) -> ItemResolution<'_> {
    let unit_price = product.price();
    match select_item_promotion(&product.promotions, now) {
        Some(promotion) => ItemResolution {
            total: promotion.rule.price_with(unit_price, quantity),
            promotion: Some(promotion),
        },
        None => ItemResolution {
            total: unit_price.multiply_quantity(quantity).non_negative(),
            promotion: None,
        },
    }
}

// =============================================================================
// Cart Promotion
// =============================================================================

/// Terms of a cart-level promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "promotion_type", rename_all = "snake_case")]
pub enum CartRule {
    PercentageDiscount { percent_bps: u32 },
    FixedDiscount { amount_cents: i64 },
}

impl CartRule {
    pub fn promotion_type(&self) -> PromotionType {
        match self {
            CartRule::PercentageDiscount { .. } => PromotionType::PercentageDiscount,
            CartRule::FixedDiscount { .. } => PromotionType::FixedDiscount,
        }
    }

    /// Builds a cart rule from its stored type and value.
    pub fn from_parts(promotion_type: PromotionType, discount_value: i64) -> CoreResult<Self> {
        let rule = match promotion_type {
            PromotionType::PercentageDiscount => CartRule::PercentageDiscount {
                percent_bps: u32::try_from(discount_value).map_err(|_| {
                    invalid(format!("cart discount_value out of range: {}", discount_value))
                })?,
            },
            PromotionType::FixedDiscount => CartRule::FixedDiscount {
                amount_cents: discount_value,
            },
            PromotionType::BuyXGetY | PromotionType::BundlePrice => {
                return Err(ValidationError::NotAllowed {
                    field: "promotion_type".to_string(),
                    allowed: vec![
                        PromotionType::PercentageDiscount.to_string(),
                        PromotionType::FixedDiscount.to_string(),
                    ],
                }
                .into());
            }
        };
        rule.validate()?;
        Ok(rule)
    }

    /// The value stored in the `discount_value` column.
    pub fn discount_value(&self) -> i64 {
        match *self {
            CartRule::PercentageDiscount { percent_bps } => i64::from(percent_bps),
            CartRule::FixedDiscount { amount_cents } => amount_cents,
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        match *self {
            CartRule::PercentageDiscount { percent_bps } => {
                PromotionRule::PercentageDiscount { percent_bps }.validate()
            }
            CartRule::FixedDiscount { amount_cents } => amount(amount_cents, "discount_value"),
        }
    }

    /// Discount on `subtotal`. Not clamped; the checkout clamps to the subtotal.
    pub fn discount_for(&self, subtotal: Money) -> Money {
        match *self {
            CartRule::PercentageDiscount { percent_bps } => subtotal.percentage_amount(percent_bps),
            CartRule::FixedDiscount { amount_cents } => Money::from_cents(amount_cents),
        }
    }
}

/// A discount on the whole order once the subtotal passes a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartPromotion {
    pub id: String,
    #[serde(flatten)]
    pub rule: CartRule,
    pub minimum_purchase_cents: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl CartPromotion {
    /// Inclusive window: active while `start_date <= now <= end_date`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_date <= now && now <= self.end_date
    }

    pub fn is_eligible(&self, subtotal: Money, now: DateTime<Utc>) -> bool {
        self.minimum_purchase_cents <= subtotal.cents() && self.is_active_at(now)
    }
}

/// Input for creating a cart promotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCartPromotion {
    #[serde(flatten)]
    pub rule: CartRule,
    pub minimum_purchase_cents: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl NewCartPromotion {
    pub fn validate(&self) -> CoreResult<()> {
        crate::validation::validate_amount_cents(self.minimum_purchase_cents, "minimum_purchase_amount", 0)?;
        crate::validation::validate_window(self.start_date, self.end_date)?;
        self.rule.validate()
    }
}

/// Returns the first cart promotion eligible for `subtotal` at `now`.
pub fn select_cart_promotion(
    promotions: &[CartPromotion],
    subtotal: Money,
    now: DateTime<Utc>,
) -> Option<&CartPromotion> {
    promotions.iter().find(|p| p.is_eligible(subtotal, now))
}

/// Cart-level discount for `subtotal` at `now`, zero when nothing applies.
pub fn resolve_cart_discount(promotions: &[CartPromotion], subtotal: Money, now: DateTime<Utc>) -> Money {
    select_cart_promotion(promotions, subtotal, now)
        .map(|p| p.rule.discount_for(subtotal))
        .unwrap_or_default()
}

// =============================================================================
// Unit Tests
// =============================================================================
