//! # Order Pricing
//!
//! Turns a validated cart selection into line snapshots and order totals.
//!
//! ```text
//! subtotal       = Σ list_price × qty
//! discount       = Σ (list_price − effective_price) × qty
//! shipping_total = flat fee
//! grand_total    = subtotal − discount + shipping_total
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{OrderId, OrderItem, OrderTotals, Product, ProductId};
use crate::validation::validate_quantity;

/// A selected product and how many the customer wants.
#[derive(Debug, Clone, Copy)]
pub struct LineInput<'a> {
    pub product: &'a Product,
    pub quantity: i64,
}

/// One priced line, ready to be frozen into an [`OrderItem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotedLine {
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    pub image_url: Option<String>,
    pub unit_price: Money,
    pub sale_price: Money,
    pub quantity: i64,
    pub line_total: Money,
}

impl QuotedLine {
    pub fn into_item(self, order_id: &OrderId) -> OrderItem {
        OrderItem {
            id: uuid::Uuid::new_v4().to_string(),
            order_id: order_id.clone(),
            product_id: self.product_id,
            name: self.name,
            sku: self.sku,
            image_url: self.image_url,
            unit_price: self.unit_price.vnd(),
            sale_price: self.sale_price.vnd(),
            quantity: self.quantity,
            line_total: self.line_total.vnd(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub lines: Vec<QuotedLine>,
    pub totals: OrderTotals,
}

/// Prices a selection. Totals that do not fit in an `i64` are rejected as
/// out of range.
pub fn quote(lines: &[LineInput<'_>], shipping_fee: Money) -> CoreResult<Quote> {
    if lines.is_empty() {
        return Err(CoreError::EmptySelection);
    }

    let mut subtotal = Money::zero();
    let mut discount = Money::zero();
    let mut quoted = Vec::with_capacity(lines.len());

    for line in lines {
        validate_quantity(line.quantity)?;

        let list = line.product.list_price();
        let effective = line.product.effective_price();

        let list_total = list.checked_mul(line.quantity).ok_or_else(total_overflow)?;
        let line_total = effective.checked_mul(line.quantity).ok_or_else(total_overflow)?;
        subtotal = subtotal.checked_add(list_total).ok_or_else(total_overflow)?;
        discount = list_total
            .checked_sub(line_total)
            .and_then(|d| discount.checked_add(d))
            .ok_or_else(total_overflow)?;

        quoted.push(QuotedLine {
            product_id: line.product.id.clone(),
            name: line.product.name.clone(),
            sku: line.product.sku.clone(),
            image_url: line.product.image_url.clone(),
            unit_price: list,
            sale_price: effective,
            quantity: line.quantity,
            line_total,
        });
    }

    let grand_total = subtotal
        .checked_sub(discount)
        .and_then(|t| t.checked_add(shipping_fee))
        .ok_or_else(total_overflow)?;

    let totals = OrderTotals {
        subtotal: subtotal.vnd(),
        discount: discount.vnd(),
        shipping_total: shipping_fee.vnd(),
        grand_total: grand_total.vnd(),
    };

    Ok(Quote {
        lines: quoted,
        totals,
    })
}

fn total_overflow() -> CoreError {
    ValidationError::OutOfRange {
        field: "order total".to_string(),
        min: 0,
        max: i64::MAX,
    }
    .into()
}

/// Checks that a product can be sold in the requested quantity right now.
pub fn ensure_available(product: &Product, requested: i64) -> CoreResult<()> {
    if !product.is_active {
        return Err(CoreError::not_found("Product", product.id.as_str()));
    }

    if requested > product.stock {
        return Err(CoreError::InsufficientStock {
            sku: product.sku.clone(),
            available: product.stock,
            requested,
        });
    }

    Ok(())
}
