//! Replay a recorded edit script against a purchase invoice draft.
//!
//! Script format (JSON):
//!
//! ```json
//! {
//!   "draft": { "items": [{ "product_id": 1, "quantity": 1, "unit_price": 10000, "number_of_units": 1 }] },
//!   "products": [{ "product_id": 7, "purchase_price": 1250 }],
//!   "actions": [{ "action": "global_paid_changed", "amount": 9000 }]
//! }
//! ```
//!
//! Amounts are cents. `draft` defaults to a new draft and `products` to an empty
//! directory. A `product_selected` action without `purchase_price` is priced
//! from `products`.

use serde::{Deserialize, Serialize};

use backoffice_core::ProductId;
use backoffice_purchasing::{
    AllocationConflict, EditAction, EditSession, InMemoryProductDirectory, InvoiceDraft,
    ProductInfo, Totals, ValidationErrors, reconcile, validate,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub draft: Option<InvoiceDraft>,
    #[serde(default)]
    pub products: Vec<ProductEntry>,
    pub actions: Vec<EditAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductEntry {
    pub product_id: ProductId,
    #[serde(flatten)]
    pub info: ProductInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub action: EditAction,
    pub totals: Totals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub steps: Vec<StepReport>,
    pub draft: InvoiceDraft,
    pub valid: bool,
    pub validation: ValidationErrors,
}

/// Run every action in order. Rejected actions are reported and leave the
/// draft unchanged; replay continues with the next action.
pub fn replay(script: Script) -> ReplayReport {
    let directory: InMemoryProductDirectory = script
        .products
        .into_iter()
        .map(|p| (p.product_id, p.info))
        .collect();

    // Same normalization the form applies when it opens a draft.
    let mut draft = EditSession::new(script.draft.unwrap_or_default()).into_draft();

    let mut steps = Vec::with_capacity(script.actions.len());
    for (i, action) in script.actions.into_iter().enumerate() {
        let action = price_from_directory(action, &directory);
        let (conflict, error) = match reconcile(&draft, action.clone()) {
            Ok(out) => {
                draft = out.draft;
                (out.conflict.as_ref().map(AllocationConflict::to_string), None)
            }
            Err(e) => {
                tracing::warn!(step = i + 1, "action rejected: {e}");
                (None, Some(e.to_string()))
            }
        };
        steps.push(StepReport {
            step: i + 1,
            action,
            totals: Totals::of(&draft),
            conflict,
            error,
        });
    }

    let validation = validate(&draft);
    ReplayReport {
        steps,
        valid: validation.is_empty(),
        validation,
        draft,
    }
}

fn price_from_directory(action: EditAction, directory: &InMemoryProductDirectory) -> EditAction {
    match action {
        EditAction::ProductSelected {
            index,
            product_id,
            purchase_price: None,
        } => EditAction::product_selected(index, product_id, directory),
        other => other,
    }
}
