//! Cart and order arithmetic.
//!
//! All amounts are in the store currency. Lines whose product no longer
//! exists are never priced: callers build [`PricedItem`]s only for products
//! they could load.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::{Coupon, Product};
use crate::domain::value_objects::round_money;

/// A cart or order line joined with the product data needed to price it.
#[derive(Clone, Debug, PartialEq)]
pub struct PricedItem {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub category_id: Option<Uuid>,
    pub author_id: Uuid,
    pub company_id: Option<Uuid>,
    pub unit_price: Decimal,
    pub shipping_cost: Option<Decimal>,
    pub additional_shipping_cost: Option<Decimal>,
    pub quantity: u32,
}

impl PricedItem {
    pub fn new(item_id: Uuid, product: &Product, quantity: u32) -> Self {
        Self {
            item_id,
            product_id: product.id(),
            category_id: product.category_id(),
            author_id: product.author_id(),
            company_id: product.company_id(),
            unit_price: product.effective_price(),
            shipping_cost: product.shipping_cost(),
            additional_shipping_cost: product.each_additional_item_shipping_cost(),
            quantity,
        }
    }

    pub fn line_total(&self) -> Decimal { self.unit_price * Decimal::from(self.quantity) }

    /// First unit ships at the base cost, every further unit at the
    /// additional cost (or the base cost when none is configured).
    pub fn shipping(&self) -> Decimal {
        let Some(base) = self.shipping_cost else { return Decimal::ZERO };
        if self.quantity <= 1 {
            return base;
        }
        let extra_units = Decimal::from(self.quantity - 1);
        base + self.additional_shipping_cost.unwrap_or(base) * extra_units
    }
}

pub fn subtotal(items: &[PricedItem]) -> Decimal {
    items.iter().map(PricedItem::line_total).sum()
}

pub fn shipping(items: &[PricedItem]) -> Decimal {
    items.iter().map(PricedItem::shipping).sum()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl CartTotals {
    /// Computes cart totals; the total never goes below zero.
    pub fn compute(items: &[PricedItem], coupon: Option<&Coupon>) -> Self {
        let subtotal = subtotal(items);
        let shipping = shipping(items);
        let discount = coupon.map(|c| c.calculate_discount(items, subtotal)).unwrap_or(Decimal::ZERO);
        let total = (subtotal + shipping - discount).max(Decimal::ZERO);
        Self { subtotal, shipping, discount, total }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub vat: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// VAT applies to the discounted subtotal; shipping is added after tax.
    pub fn compute(items: &[PricedItem], discount: Decimal, vat_rate: Decimal) -> Self {
        let subtotal = subtotal(items);
        let shipping = shipping(items);
        let taxable = (subtotal - discount).max(Decimal::ZERO);
        let vat = round_money(taxable * vat_rate);
        let total = round_money(taxable + vat + shipping);
        Self { subtotal, discount, shipping, vat, total }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn item(price: i64, quantity: u32) -> PricedItem {
        PricedItem {
            item_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            category_id: None,
            author_id: Uuid::nil(),
            company_id: None,
            unit_price: Decimal::from(price),
            shipping_cost: None,
            additional_shipping_cost: None,
            quantity,
        }
    }

    pub fn shipped_item(price: i64, quantity: u32, base: i64, additional: Option<i64>) -> PricedItem {
        PricedItem {
            shipping_cost: Some(Decimal::from(base)),
            additional_shipping_cost: additional.map(Decimal::from),
            ..item(price, quantity)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(shipped_item(10, 1, 5, Some(2)), 5)]
    #[case(shipped_item(10, 3, 5, Some(2)), 9)]
    #[case(shipped_item(10, 3, 5, None), 15)]
    #[case(item(10, 4), 0)]
    fn test_item_shipping(#[case] line: PricedItem, #[case] expected: i64) {
        assert_eq!(line.shipping(), Decimal::from(expected));
    }

    #[test]
    fn test_cart_totals_without_coupon() {
        let items = vec![shipped_item(10, 2, 4, Some(1)), item(7, 1)];
        let totals = CartTotals::compute(&items, None);
        assert_eq!(totals.subtotal, Decimal::from(27));
        assert_eq!(totals.shipping, Decimal::from(5));
        assert_eq!(totals.discount, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::from(32));
    }

    #[test]
    fn test_empty_cart_totals() {
        assert_eq!(CartTotals::compute(&[], None), CartTotals::default());
    }

    #[test]
    fn test_order_totals_vat_on_discounted_subtotal() {
        let items = vec![shipped_item(50, 2, 5, Some(0))];
        let totals = OrderTotals::compute(&items, Decimal::from(10), Decimal::new(20, 2));
        assert_eq!(totals.subtotal, Decimal::from(100));
        assert_eq!(totals.vat, Decimal::from(18));
        assert_eq!(totals.shipping, Decimal::from(5));
        assert_eq!(totals.total, Decimal::from(113));
    }

    #[test]
    fn test_order_totals_discount_larger_than_subtotal() {
        let items = vec![item(5, 1)];
        let totals = OrderTotals::compute(&items, Decimal::from(8), Decimal::new(20, 2));
        assert_eq!(totals.vat, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn test_vat_rounding() {
        let items = vec![PricedItem { unit_price: Decimal::new(333, 2), ..item(0, 1) }];
        let totals = OrderTotals::compute(&items, Decimal::ZERO, Decimal::new(20, 2));
        // 3.33 * 0.20 = 0.666
        assert_eq!(totals.vat, Decimal::new(67, 2));
        assert_eq!(totals.total, Decimal::new(400, 2));
    }
}
