use std::collections::BTreeMap;

use serde::Serialize;

use backoffice_core::Money;

use crate::invoice::InvoiceDraft;
use crate::line_item::LineItem;

/// Field-keyed validation messages (`"items[1].quantity" -> "must be positive"`).
///
/// Submission proceeds only when this is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }
}

impl core::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// Final completeness and invariant check before a draft may be submitted.
pub fn validate(draft: &InvoiceDraft) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    if draft.invoice_number.trim().is_empty() {
        errors.insert("invoice_number", "is required");
    }
    if draft.supplier_id.is_none_or(|s| !s.is_valid()) {
        errors.insert("supplier_id", "is required");
    }
    if draft.date.is_none() {
        errors.insert("date", "is required");
    }

    let mut valid_lines = 0usize;
    for (i, item) in draft.items.iter().enumerate() {
        let structurally_valid = check_line(item, i, &mut errors);
        if structurally_valid {
            valid_lines += 1;
        }
        if item.amount_paid() < Money::ZERO {
            errors.insert(format!("items[{i}].amount_paid"), "cannot be negative");
        } else if item.amount_paid() > item.total_price() {
            errors.insert(
                format!("items[{i}].amount_paid"),
                format!("cannot exceed line total {}", item.total_price()),
            );
        }
    }
    if valid_lines == 0 {
        errors.insert("items", "at least one complete line is required");
    }

    let total = draft.total_amount();
    if draft.amount_paid > total {
        errors.insert("amount_paid", format!("cannot exceed invoice total {total}"));
    } else if draft.amount_paid != draft.items_paid() {
        errors.insert(
            "amount_paid",
            format!("does not match the sum of line payments {}", draft.items_paid()),
        );
    }

    errors
}

fn check_line(item: &LineItem, i: usize, errors: &mut ValidationErrors) -> bool {
    let mut ok = true;
    if !item.product_id().is_some_and(|p| p.is_valid()) {
        errors.insert(format!("items[{i}].product_id"), "select a product");
        ok = false;
    }
    if item.quantity() <= 0 {
        errors.insert(format!("items[{i}].quantity"), "must be positive");
        ok = false;
    }
    if item.unit_price() < Money::ZERO {
        errors.insert(format!("items[{i}].unit_price"), "cannot be negative");
        ok = false;
    }
    if item.number_of_units() <= 0 {
        errors.insert(format!("items[{i}].number_of_units"), "must be positive");
        ok = false;
    }
    // Line totals saturate instead of wrapping; an exact product must exist.
    let exact = item
        .quantity()
        .checked_mul(item.number_of_units())
        .and_then(|n| item.unit_price().cents().checked_mul(n));
    if exact != Some(item.total_price().cents()) {
        errors.insert(format!("items[{i}].total_price"), "exceeds the supported range");
        ok = false;
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoffice_core::{ProductId, SupplierId};
    use chrono::NaiveDate;

    fn complete_draft() -> InvoiceDraft {
        let mut draft = InvoiceDraft::with_items(vec![
            LineItem::new(Some(ProductId::from_raw(3)), 2, Money::from_major(5), 1)
                .with_paid(Money::from_major(4)),
        ]);
        draft.invoice_number = "PI-1001".to_string();
        draft.supplier_id = Some(SupplierId::from_raw(9));
        draft.date = NaiveDate::from_ymd_opt(2026, 10, 1);
        draft
    }

    #[test]
    fn complete_draft_passes() {
        let errors = validate(&complete_draft());
        assert!(errors.is_empty(), "unexpected errors: {errors}");
    }

    #[test]
    fn new_draft_reports_missing_fields() {
        let errors = validate(&InvoiceDraft::new());
        assert_eq!(errors.get("invoice_number"), Some("is required"));
        assert_eq!(errors.get("supplier_id"), Some("is required"));
        assert_eq!(errors.get("date"), Some("is required"));
        assert_eq!(errors.get("items[0].product_id"), Some("select a product"));
        assert!(errors.get("items").is_some());
    }

    #[test]
    fn structural_line_errors_are_keyed_by_index() {
        let mut draft = complete_draft();
        draft.items.push(LineItem::new(Some(ProductId::from_raw(0)), 0, Money::from_cents(-1), -2));

        let errors = validate(&draft);
        assert!(errors.get("items[1].product_id").is_some());
        assert!(errors.get("items[1].quantity").is_some());
        assert!(errors.get("items[1].unit_price").is_some());
        assert!(errors.get("items[1].number_of_units").is_some());
        // The first line is still complete.
        assert!(errors.get("items").is_none());
    }

    #[test]
    fn overflowing_line_total_is_rejected() {
        let mut draft = complete_draft();
        draft.items.push(LineItem::new(
            Some(ProductId::from_raw(4)),
            i64::MAX / 2,
            Money::from_major(10),
            1,
        ));

        let errors = validate(&draft);
        assert_eq!(errors.get("items[1].total_price"), Some("exceeds the supported range"));
        assert!(errors.get("items[0].total_price").is_none());
    }

    #[test]
    fn overpaid_line_is_rejected() {
        let mut draft = complete_draft();
        draft.items[0] = draft.items[0].clone().with_paid(Money::from_major(11));
        draft.amount_paid = Money::from_major(11);

        let errors = validate(&draft);
        assert_eq!(errors.get("items[0].amount_paid"), Some("cannot exceed line total 10.00"));
        assert_eq!(errors.get("amount_paid"), Some("cannot exceed invoice total 10.00"));
    }

    #[test]
    fn invoice_paid_must_match_line_payments() {
        let mut draft = complete_draft();
        draft.amount_paid = Money::from_major(3);

        let errors = validate(&draft);
        assert_eq!(
            errors.get("amount_paid"),
            Some("does not match the sum of line payments 4.00")
        );
    }
}
