//! External collaborators and the one-shot hand-off of a finished draft.
//!
//! The engine never performs IO itself. Product lookups and persistence are
//! traits supplied by the caller; `submit` validates, builds the payload and
//! calls the persistence collaborator exactly once.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use backoffice_core::{LineItemId, Money, ProductId, SupplierId};

use crate::invoice::InvoiceDraft;
use crate::validation::{ValidationErrors, validate};

/// What the product directory knows about a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub purchase_price: Money,
    #[serde(default)]
    pub category: Option<String>,
}

/// Read-only product lookup, used only to seed a line's unit price.
pub trait ProductDirectory {
    fn purchase_info(&self, product_id: ProductId) -> Option<ProductInfo>;
}

/// Directory backed by a map (tests, replay tooling).
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductDirectory {
    products: HashMap<ProductId, ProductInfo>,
}

impl InMemoryProductDirectory {
    pub fn insert(&mut self, product_id: ProductId, info: ProductInfo) {
        self.products.insert(product_id, info);
    }
}

impl FromIterator<(ProductId, ProductInfo)> for InMemoryProductDirectory {
    fn from_iter<I: IntoIterator<Item = (ProductId, ProductInfo)>>(iter: I) -> Self {
        Self {
            products: iter.into_iter().collect(),
        }
    }
}

impl ProductDirectory for InMemoryProductDirectory {
    fn purchase_info(&self, product_id: ProductId) -> Option<ProductInfo> {
        self.products.get(&product_id).cloned()
    }
}

/// One line of the persisted invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<LineItemId>,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    pub number_of_units: i64,
    pub total_price: Money,
    pub amount_paid: Money,
    pub expiry_date: Option<NaiveDate>,
}

/// Finalized invoice handed to the persistence API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePayload {
    pub invoice_number: String,
    pub date: NaiveDate,
    pub supplier_id: SupplierId,
    pub amount_paid: Money,
    pub notes: Option<String>,
    pub items: Vec<PayloadItem>,
}

impl InvoicePayload {
    /// Build a payload from a draft that passes the validation gate.
    pub fn from_draft(draft: &InvoiceDraft) -> Result<Self, ValidationErrors> {
        let errors = validate(draft);
        if !errors.is_empty() {
            return Err(errors);
        }

        // The gate guarantees these are present.
        let (Some(date), Some(supplier_id)) = (draft.date, draft.supplier_id) else {
            return Err(errors);
        };

        let items = draft
            .items
            .iter()
            .filter_map(|item| {
                Some(PayloadItem {
                    id: item.id(),
                    product_id: item.product_id()?,
                    quantity: item.quantity(),
                    unit_price: item.unit_price(),
                    number_of_units: item.number_of_units(),
                    total_price: item.total_price(),
                    amount_paid: item.amount_paid(),
                    expiry_date: item.expiry_date(),
                })
            })
            .collect();

        Ok(Self {
            invoice_number: draft.invoice_number.trim().to_string(),
            date,
            supplier_id,
            amount_paid: draft.amount_paid,
            notes: draft.notes.clone(),
            items,
        })
    }
}

/// Acknowledgement returned by the persistence API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub invoice_id: i64,
}

/// Rejection from the persistence API, carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("persistence failed: {message}")]
pub struct PersistenceError {
    pub message: String,
}

impl PersistenceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Server-side storage of finalized invoices.
#[async_trait]
pub trait PersistenceApi: Send + Sync {
    async fn submit(&self, payload: &InvoicePayload) -> Result<SubmissionReceipt, PersistenceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("invoice is incomplete: {0}")]
    Invalid(ValidationErrors),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Validate the draft and hand it to the persistence API once.
///
/// The draft is only borrowed: on any error it is left as it was so the user
/// can correct it and retry. Nothing is retried here.
pub async fn submit<P>(draft: &InvoiceDraft, api: &P) -> Result<SubmissionReceipt, SubmitError>
where
    P: PersistenceApi + ?Sized,
{
    let payload = InvoicePayload::from_draft(draft).map_err(SubmitError::Invalid)?;

    match api.submit(&payload).await {
        Ok(receipt) => {
            tracing::info!(
                invoice_number = %payload.invoice_number,
                invoice_id = receipt.invoice_id,
                lines = payload.items.len(),
                "purchase invoice submitted"
            );
            Ok(receipt)
        }
        Err(e) => {
            tracing::warn!(invoice_number = %payload.invoice_number, "submission rejected: {e}");
            Err(e.into())
        }
    }
}
