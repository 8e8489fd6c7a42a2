//! Edit coordinator: one explicit `reconcile` call per user edit.
//!
//! `reconcile` is a pure reducer. It clones the incoming draft, routes the
//! action to the line-item model or the allocation engine, re-derives the
//! invoice-level paid amount and hands back a fresh snapshot.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use backoffice_core::{DomainError, DomainResult, Money, ProductId};

use crate::allocation::{self, AllocationConflict};
use crate::invoice::{HeaderField, InvoiceDraft};
use crate::line_item::{ItemField, LineItem};
use crate::submission::ProductDirectory;
use crate::totals::Totals;

/// A single user edit, as delivered by the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EditAction {
    /// The invoice-level paid amount was changed.
    GlobalPaidChanged { amount: Money },
    /// A line's paid amount was committed (on blur, not per keystroke).
    ItemPaidChanged { index: usize, amount: Money },
    /// Quantity, unit price or units per pack changed; `raw` is the text as typed.
    ItemFieldChanged {
        index: usize,
        field: ItemField,
        raw: String,
    },
    /// A product was picked for a line.
    ProductSelected {
        index: usize,
        product_id: ProductId,
        #[serde(default)]
        purchase_price: Option<Money>,
    },
    ItemExpiryChanged {
        index: usize,
        expiry: Option<NaiveDate>,
    },
    HeaderChanged { header: HeaderField },
    ItemAdded,
    ItemRemoved { index: usize },
    /// "Mark fully paid".
    ResetPaid,
}

impl EditAction {
    /// Build a product selection, seeding the unit price from the directory.
    pub fn product_selected(
        index: usize,
        product_id: ProductId,
        directory: &dyn ProductDirectory,
    ) -> Self {
        let purchase_price = directory.purchase_info(product_id).map(|p| p.purchase_price);
        EditAction::ProductSelected {
            index,
            product_id,
            purchase_price,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            EditAction::GlobalPaidChanged { .. } => "global_paid_changed",
            EditAction::ItemPaidChanged { .. } => "item_paid_changed",
            EditAction::ItemFieldChanged { .. } => "item_field_changed",
            EditAction::ProductSelected { .. } => "product_selected",
            EditAction::ItemExpiryChanged { .. } => "item_expiry_changed",
            EditAction::HeaderChanged { .. } => "header_changed",
            EditAction::ItemAdded => "item_added",
            EditAction::ItemRemoved { .. } => "item_removed",
            EditAction::ResetPaid => "reset_paid",
        }
    }
}

/// Snapshot produced by one `reconcile` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub draft: InvoiceDraft,
    /// Set when an allocation could only be satisfied partially.
    pub conflict: Option<AllocationConflict>,
}

impl Reconciled {
    pub fn totals(&self) -> Totals {
        Totals::of(&self.draft)
    }
}

/// Apply one edit to a draft and re-establish the payment invariants.
///
/// Errors are reserved for misuse (unknown line index, removing the only line);
/// allocation shortfalls come back in [`Reconciled::conflict`].
pub fn reconcile(draft: &InvoiceDraft, action: EditAction) -> DomainResult<Reconciled> {
    tracing::debug!(action = action.name(), lines = draft.items.len(), "reconcile");

    let mut next = draft.clone();
    let conflict = route(&mut next, action)?;
    Ok(Reconciled {
        draft: next,
        conflict,
    })
}

fn route(draft: &mut InvoiceDraft, action: EditAction) -> DomainResult<Option<AllocationConflict>> {
    match action {
        EditAction::GlobalPaidChanged { amount } => {
            Ok(allocation::distribute_global_paid(draft, amount).conflict)
        }
        EditAction::ItemPaidChanged { index, amount } => {
            let target = draft.amount_paid;
            let item = item_mut(draft, index)?;
            item.set_paid(amount);
            item.clamp_paid();
            Ok(allocation::redistribute_remainder(draft, index, target)?.conflict)
        }
        EditAction::ItemFieldChanged { index, field, raw } => {
            let item = item_mut(draft, index)?;
            item.update_field(field, &raw);
            if item.clamp_paid() {
                tracing::debug!(line = index, %field, "line payment capped at new total");
            }
            draft.sync_amount_paid();
            Ok(None)
        }
        EditAction::ProductSelected {
            index,
            product_id,
            purchase_price,
        } => {
            let item = item_mut(draft, index)?;
            item.select_product(product_id, purchase_price);
            item.clamp_paid();
            draft.sync_amount_paid();
            Ok(None)
        }
        EditAction::ItemExpiryChanged { index, expiry } => {
            item_mut(draft, index)?.set_expiry(expiry);
            Ok(None)
        }
        EditAction::HeaderChanged { header } => {
            draft.apply_header(header);
            Ok(None)
        }
        EditAction::ItemAdded => {
            draft.items.push(LineItem::blank());
            Ok(None)
        }
        EditAction::ItemRemoved { index } => {
            if index >= draft.items.len() {
                return Err(out_of_range(index));
            }
            if draft.items.len() == 1 {
                return Err(DomainError::invariant("an invoice needs at least one line"));
            }
            let removed = draft.items.remove(index);
            if !removed.amount_paid().is_zero() {
                tracing::debug!(
                    line = index,
                    released = %removed.amount_paid(),
                    "removed a paid line; invoice paid amount shrinks"
                );
            }
            draft.sync_amount_paid();
            Ok(None)
        }
        EditAction::ResetPaid => Ok(allocation::reset_to_full(draft).conflict),
    }
}

fn item_mut(draft: &mut InvoiceDraft, index: usize) -> DomainResult<&mut LineItem> {
    draft.items.get_mut(index).ok_or_else(|| out_of_range(index))
}

fn out_of_range(index: usize) -> DomainError {
    DomainError::validation(format!("line index {index} out of range"))
}
