use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use backoffice_core::{LineItemId, Money, ProductId};

/// Editable numeric inputs of a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemField {
    Quantity,
    UnitPrice,
    NumberOfUnits,
}

impl core::fmt::Display for ItemField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            ItemField::Quantity => "quantity",
            ItemField::UnitPrice => "unit_price",
            ItemField::NumberOfUnits => "number_of_units",
        })
    }
}

/// One row of a purchase invoice draft.
///
/// `total_price` is always `quantity * unit_price * number_of_units`; it has no
/// setter and is recomputed whenever one of its inputs changes (including on
/// deserialization, where any incoming total is ignored).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LineItemFields")]
pub struct LineItem {
    id: Option<LineItemId>,
    product_id: Option<ProductId>,
    quantity: i64,
    unit_price: Money,
    number_of_units: i64,
    total_price: Money,
    amount_paid: Money,
    expiry_date: Option<NaiveDate>,
}

/// Wire shape accepted when rehydrating a line item.
#[derive(Debug, Clone, Deserialize)]
struct LineItemFields {
    #[serde(default)]
    id: Option<LineItemId>,
    #[serde(default)]
    product_id: Option<ProductId>,
    quantity: i64,
    unit_price: Money,
    number_of_units: i64,
    #[serde(default)]
    amount_paid: Money,
    #[serde(default)]
    expiry_date: Option<NaiveDate>,
}

impl From<LineItemFields> for LineItem {
    fn from(f: LineItemFields) -> Self {
        let mut item = LineItem::new(f.product_id, f.quantity, f.unit_price, f.number_of_units)
            .with_paid(f.amount_paid)
            .with_expiry(f.expiry_date);
        item.id = f.id;
        item
    }
}

impl Default for LineItem {
    fn default() -> Self {
        Self::blank()
    }
}

impl LineItem {
    /// A freshly added row: no product, one unit, zero price, nothing paid.
    pub fn blank() -> Self {
        Self::new(None, 1, Money::ZERO, 1)
    }

    pub fn new(
        product_id: Option<ProductId>,
        quantity: i64,
        unit_price: Money,
        number_of_units: i64,
    ) -> Self {
        let mut item = Self {
            id: None,
            product_id,
            quantity,
            unit_price,
            number_of_units,
            total_price: Money::ZERO,
            amount_paid: Money::ZERO,
            expiry_date: None,
        };
        item.recompute_total();
        item
    }

    /// Set the paid amount as-is (no clamping). Used when rehydrating a draft.
    pub fn with_paid(mut self, amount_paid: Money) -> Self {
        self.amount_paid = amount_paid;
        self
    }

    pub fn with_expiry(mut self, expiry_date: Option<NaiveDate>) -> Self {
        self.expiry_date = expiry_date;
        self
    }

    pub fn id(&self) -> Option<LineItemId> {
        self.id
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn number_of_units(&self) -> i64 {
        self.number_of_units
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn amount_paid(&self) -> Money {
        self.amount_paid
    }

    pub fn expiry_date(&self) -> Option<NaiveDate> {
        self.expiry_date
    }

    /// How much more this item can absorb before it is saturated.
    pub fn spare_capacity(&self) -> Money {
        (self.total_price - self.amount_paid).max(Money::ZERO)
    }

    pub fn is_saturated(&self) -> bool {
        self.amount_paid >= self.total_price
    }

    /// Parse `raw` into `field`, write it and recompute the total.
    ///
    /// Counts that are non-positive or unparseable fall back to 1. Prices are
    /// rounded to cents; unparseable or negative prices fall back to 0.
    pub fn update_field(&mut self, field: ItemField, raw: &str) {
        match field {
            ItemField::Quantity => self.quantity = parse_count(raw),
            ItemField::NumberOfUnits => self.number_of_units = parse_count(raw),
            ItemField::UnitPrice => {
                self.unit_price = Money::parse(raw)
                    .filter(|p| !p.is_negative())
                    .unwrap_or(Money::ZERO);
            }
        }
        self.recompute_total();
    }

    /// Pull `amount_paid` back into `[0, total_price]`. Returns `true` if it moved.
    pub fn clamp_paid(&mut self) -> bool {
        let clamped = self.amount_paid.bounded(Money::ZERO, self.total_price);
        let changed = clamped != self.amount_paid;
        self.amount_paid = clamped;
        changed
    }

    /// Select a product for this row, seeding the unit price from the directory
    /// when one is known. The seeded price is not revalidated afterwards.
    pub fn select_product(&mut self, product_id: ProductId, purchase_price: Option<Money>) {
        self.product_id = Some(product_id);
        if let Some(price) = purchase_price {
            self.unit_price = price.max(Money::ZERO);
        }
        self.recompute_total();
    }

    pub fn set_expiry(&mut self, expiry_date: Option<NaiveDate>) {
        self.expiry_date = expiry_date;
    }

    pub(crate) fn set_paid(&mut self, amount: Money) {
        self.amount_paid = amount;
    }

    fn recompute_total(&mut self) {
        self.total_price = self.unit_price.times(self.quantity).times(self.number_of_units);
    }
}

fn parse_count(raw: &str) -> i64 {
    let s = raw.trim();
    let whole = s.split_once('.').map_or(s, |(w, _)| w);
    match whole.parse::<i64>() {
        Ok(n) if n > 0 => n,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i64, unit_price: i64, units: i64) -> LineItem {
        LineItem::new(
            Some(ProductId::from_raw(1)),
            quantity,
            Money::from_cents(unit_price),
            units,
        )
    }

    #[test]
    fn total_is_derived_from_inputs() {
        let it = item(3, 250, 4);
        assert_eq!(it.total_price(), Money::from_cents(3000));
    }

    #[test]
    fn update_field_recomputes_total() {
        let mut it = item(1, 1000, 1);
        it.update_field(ItemField::Quantity, "5");
        assert_eq!(it.total_price(), Money::from_major(50));

        it.update_field(ItemField::UnitPrice, "2.345");
        assert_eq!(it.unit_price(), Money::from_cents(235));
        assert_eq!(it.total_price(), Money::from_cents(1175));

        it.update_field(ItemField::NumberOfUnits, "2");
        assert_eq!(it.total_price(), Money::from_cents(2350));
    }

    #[test]
    fn counts_default_to_one_when_not_positive_or_garbage() {
        let mut it = item(4, 100, 4);
        it.update_field(ItemField::Quantity, "0");
        assert_eq!(it.quantity(), 1);
        it.update_field(ItemField::Quantity, "-3");
        assert_eq!(it.quantity(), 1);
        it.update_field(ItemField::NumberOfUnits, "abc");
        assert_eq!(it.number_of_units(), 1);
        it.update_field(ItemField::NumberOfUnits, "2.9");
        assert_eq!(it.number_of_units(), 2);
    }

    #[test]
    fn price_defaults_to_zero_when_negative_or_garbage() {
        let mut it = item(2, 100, 1);
        it.update_field(ItemField::UnitPrice, "");
        assert_eq!(it.unit_price(), Money::ZERO);
        it.update_field(ItemField::UnitPrice, "-4");
        assert_eq!(it.unit_price(), Money::ZERO);
        assert_eq!(it.total_price(), Money::ZERO);
    }

    #[test]
    fn clamp_paid_caps_at_total_after_shrink() {
        let mut it = item(2, 5000, 1).with_paid(Money::from_major(100));
        assert!(!it.clamp_paid());

        it.update_field(ItemField::Quantity, "1");
        assert!(it.clamp_paid());
        assert_eq!(it.amount_paid(), Money::from_major(50));
        assert!(it.is_saturated());
    }

    #[test]
    fn clamp_paid_lifts_negative_payment_to_zero() {
        let mut it = item(1, 100, 1).with_paid(Money::from_cents(-1));
        assert!(it.clamp_paid());
        assert_eq!(it.amount_paid(), Money::ZERO);
    }

    #[test]
    fn select_product_seeds_unit_price() {
        let mut it = LineItem::blank();
        it.update_field(ItemField::Quantity, "3");
        it.select_product(ProductId::from_raw(9), Some(Money::from_cents(199)));
        assert_eq!(it.product_id(), Some(ProductId::from_raw(9)));
        assert_eq!(it.total_price(), Money::from_cents(597));

        it.select_product(ProductId::from_raw(10), None);
        assert_eq!(it.unit_price(), Money::from_cents(199));
    }

    #[test]
    fn deserialization_ignores_incoming_total() {
        let json = r#"{
            "product_id": 4,
            "quantity": 2,
            "unit_price": 150,
            "number_of_units": 3,
            "total_price": 1,
            "amount_paid": 200,
            "expiry_date": "2027-01-31"
        }"#;
        let it: LineItem = serde_json::from_str(json).unwrap();
        assert_eq!(it.total_price(), Money::from_cents(900));
        assert_eq!(it.amount_paid(), Money::from_cents(200));
        assert_eq!(it.expiry_date(), NaiveDate::from_ymd_opt(2027, 1, 31));
    }
}
