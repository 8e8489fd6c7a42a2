use serde::{Deserialize, Serialize};

use backoffice_core::Money;

use crate::invoice::InvoiceDraft;
use crate::line_item::LineItem;

/// Invoice-wide figures derived from the current draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub total_amount: Money,
    pub amount_paid: Money,
    pub remaining_amount: Money,
}

impl Totals {
    /// Derive totals from a draft. Pure; nothing is cached.
    pub fn of(draft: &InvoiceDraft) -> Self {
        let total_amount = Self::items_total(&draft.items);
        Self {
            total_amount,
            amount_paid: draft.amount_paid,
            remaining_amount: total_amount - draft.amount_paid,
        }
    }

    pub fn items_total(items: &[LineItem]) -> Money {
        items.iter().map(LineItem::total_price).sum()
    }

    pub fn items_paid_sum(items: &[LineItem]) -> Money {
        items.iter().map(LineItem::amount_paid).sum()
    }

    pub fn is_fully_paid(&self) -> bool {
        self.remaining_amount.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoffice_core::ProductId;

    #[test]
    fn remaining_is_total_minus_paid() {
        let draft = InvoiceDraft::with_items(vec![
            LineItem::new(Some(ProductId::from_raw(1)), 2, Money::from_cents(1250), 1)
                .with_paid(Money::from_cents(1000)),
            LineItem::new(Some(ProductId::from_raw(2)), 1, Money::from_cents(500), 3),
        ]);

        let totals = Totals::of(&draft);
        assert_eq!(totals.total_amount, Money::from_cents(4000));
        assert_eq!(totals.amount_paid, Money::from_cents(1000));
        assert_eq!(totals.remaining_amount, Money::from_cents(3000));
        assert!(!totals.is_fully_paid());
    }

    #[test]
    fn empty_price_lines_total_zero() {
        let totals = Totals::of(&InvoiceDraft::new());
        assert_eq!(totals.total_amount, Money::ZERO);
        assert!(totals.is_fully_paid());
    }
}
