use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use backoffice_core::{Money, SupplierId};

use crate::line_item::LineItem;
use crate::totals::Totals;

/// Header fields a user can edit directly; none of them affect payments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum HeaderField {
    InvoiceNumber(String),
    Supplier(Option<SupplierId>),
    Date(Option<NaiveDate>),
    Notes(Option<String>),
}

/// A purchase invoice being edited.
///
/// The draft owns its items for the whole edit session. `amount_paid` is the
/// invoice-level paid amount and, once a draft has passed through the edit
/// coordinator, always equals the sum of the items' paid amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    #[serde(default)]
    pub invoice_number: String,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub amount_paid: Money,
    pub items: Vec<LineItem>,
}

impl Default for InvoiceDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceDraft {
    /// A new draft starts with exactly one blank line.
    pub fn new() -> Self {
        Self {
            invoice_number: String::new(),
            supplier_id: None,
            date: None,
            notes: None,
            amount_paid: Money::ZERO,
            items: vec![LineItem::blank()],
        }
    }

    /// Build a draft around existing lines, deriving `amount_paid` from them.
    pub fn with_items(items: Vec<LineItem>) -> Self {
        let mut draft = Self {
            items,
            ..Self::new()
        };
        draft.sync_amount_paid();
        draft
    }

    pub fn total_amount(&self) -> Money {
        Totals::items_total(&self.items)
    }

    pub fn items_paid(&self) -> Money {
        Totals::items_paid_sum(&self.items)
    }

    pub fn apply_header(&mut self, field: HeaderField) {
        match field {
            HeaderField::InvoiceNumber(n) => self.invoice_number = n,
            HeaderField::Supplier(s) => self.supplier_id = s,
            HeaderField::Date(d) => self.date = d,
            HeaderField::Notes(n) => self.notes = n.filter(|n| !n.trim().is_empty()),
        }
    }

    /// Re-establish `amount_paid == Σ item.amount_paid`.
    pub(crate) fn sync_amount_paid(&mut self) {
        self.amount_paid = self.items_paid();
    }
}
