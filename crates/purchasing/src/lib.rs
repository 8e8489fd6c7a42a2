//! Purchase invoice editing (payment allocation and consistency).
//!
//! This crate keeps a purchase invoice draft's invoice-level paid amount and its
//! line payments consistent while the user edits either side. It is pure,
//! deterministic domain logic; product lookup and persistence are supplied by
//! the caller through the traits in [`submission`].

pub mod allocation;
pub mod coordinator;
pub mod invoice;
pub mod line_item;
pub mod session;
pub mod submission;
pub mod totals;
pub mod validation;

pub use allocation::{
    Allocation, AllocationConflict, ConflictKind, distribute_global_paid, redistribute_remainder,
    reset_to_full,
};
pub use coordinator::{EditAction, Reconciled, reconcile};
pub use invoice::{HeaderField, InvoiceDraft};
pub use line_item::{ItemField, LineItem};
pub use session::{EditSession, EditTarget, SessionState};
pub use submission::{
    InMemoryProductDirectory, InvoicePayload, PayloadItem, PersistenceApi, PersistenceError,
    ProductDirectory, ProductInfo, SubmissionReceipt, SubmitError, submit,
};
pub use totals::Totals;
pub use validation::{ValidationErrors, validate};
