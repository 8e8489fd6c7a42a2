//! Edit session: `Idle -> Editing(target) -> Recomputing -> Idle`.
//!
//! The session owns the draft for the lifetime of the form. Field edits that
//! affect totals are reconciled as they are typed; a line's paid amount is only
//! buffered while typing and reconciled when the field is committed (blur), so
//! intermediate keystrokes never trigger a rebalance.

use serde::{Deserialize, Serialize};

use backoffice_core::{DomainError, DomainResult, Money};

use crate::allocation::AllocationConflict;
use crate::coordinator::{EditAction, reconcile};
use crate::invoice::InvoiceDraft;
use crate::line_item::{ItemField, LineItem};
use crate::totals::Totals;

/// The form field currently being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum EditTarget {
    GlobalPaid,
    ItemPaid { index: usize },
    ItemField { index: usize, field: ItemField },
}

impl EditTarget {
    fn line_index(&self) -> Option<usize> {
        match self {
            EditTarget::GlobalPaid => None,
            EditTarget::ItemPaid { index } | EditTarget::ItemField { index, .. } => Some(*index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Editing { target: EditTarget, buffer: String },
    Recomputing,
}

#[derive(Debug, Clone)]
pub struct EditSession {
    draft: InvoiceDraft,
    state: SessionState,
    last_conflict: Option<AllocationConflict>,
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new(InvoiceDraft::new())
    }
}

impl EditSession {
    /// Start a session. Line payments are clamped to their totals and the
    /// invoice-level amount re-derived so the session begins consistent.
    pub fn new(mut draft: InvoiceDraft) -> Self {
        if draft.items.is_empty() {
            draft.items.push(LineItem::blank());
        }
        for item in draft.items.iter_mut() {
            item.clamp_paid();
        }
        draft.sync_amount_paid();

        Self {
            draft,
            state: SessionState::Idle,
            last_conflict: None,
        }
    }

    pub fn draft(&self) -> &InvoiceDraft {
        &self.draft
    }

    pub fn into_draft(self) -> InvoiceDraft {
        self.draft
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn totals(&self) -> Totals {
        Totals::of(&self.draft)
    }

    /// Conflict reported by the most recent recomputation, if any.
    pub fn last_conflict(&self) -> Option<&AllocationConflict> {
        self.last_conflict.as_ref()
    }

    /// Focus a field. Focusing a different field abandons any uncommitted text.
    pub fn begin_edit(&mut self, target: EditTarget) -> DomainResult<()> {
        if self.state == SessionState::Recomputing {
            return Err(DomainError::conflict("recomputation in progress"));
        }
        if let Some(index) = target.line_index() {
            if index >= self.draft.items.len() {
                return Err(DomainError::validation(format!("line index {index} out of range")));
            }
        }
        if let SessionState::Editing { target: previous, .. } = &self.state {
            if *previous != target {
                tracing::debug!(?previous, "discarding uncommitted input");
            }
        }
        // A line payment field opens showing its current amount.
        let buffer = match target {
            EditTarget::ItemPaid { index } => self.draft.items[index].amount_paid().to_string(),
            EditTarget::GlobalPaid | EditTarget::ItemField { .. } => String::new(),
        };
        self.state = SessionState::Editing { target, buffer };
        Ok(())
    }

    /// Feed the current text of the focused field.
    pub fn input(&mut self, raw: &str) -> DomainResult<()> {
        let SessionState::Editing { target, buffer } = &mut self.state else {
            return Err(DomainError::conflict("no field is being edited"));
        };
        let target = *target;
        buffer.clear();
        buffer.push_str(raw);

        let action = match target {
            EditTarget::ItemPaid { .. } => return Ok(()),
            EditTarget::GlobalPaid => EditAction::GlobalPaidChanged {
                amount: parse_amount(raw),
            },
            EditTarget::ItemField { index, field } => EditAction::ItemFieldChanged {
                index,
                field,
                raw: raw.to_string(),
            },
        };
        self.recompute(action).map(|_| ())
    }

    /// Blur the focused field, reconciling a buffered line payment.
    pub fn commit(&mut self) -> DomainResult<Option<AllocationConflict>> {
        let SessionState::Editing { target, buffer } = &self.state else {
            return Err(DomainError::conflict("no field is being edited"));
        };

        match *target {
            EditTarget::ItemPaid { index } => {
                let amount = parse_amount(buffer);
                if self.draft.items.get(index).map(LineItem::amount_paid) == Some(amount) {
                    self.state = SessionState::Idle;
                    return Ok(None);
                }
                let action = EditAction::ItemPaidChanged { index, amount };
                let conflict = self.recompute(action)?;
                self.state = SessionState::Idle;
                Ok(conflict)
            }
            EditTarget::GlobalPaid | EditTarget::ItemField { .. } => {
                self.state = SessionState::Idle;
                Ok(None)
            }
        }
    }

    /// Leave the focused field without committing buffered text.
    pub fn cancel(&mut self) {
        if matches!(self.state, SessionState::Editing { .. }) {
            self.state = SessionState::Idle;
        }
    }

    /// Run a button-style action (add/remove line, mark fully paid, header edits).
    pub fn dispatch(&mut self, action: EditAction) -> DomainResult<Option<AllocationConflict>> {
        if self.state != SessionState::Idle {
            return Err(DomainError::conflict("finish editing the current field first"));
        }
        self.recompute(action)
    }

    /// `Recomputing` for exactly one reconcile, then back to the previous state.
    fn recompute(&mut self, action: EditAction) -> DomainResult<Option<AllocationConflict>> {
        let resume = std::mem::replace(&mut self.state, SessionState::Recomputing);
        let result = reconcile(&self.draft, action);
        self.state = resume;

        let out = result?;
        self.draft = out.draft;
        self.last_conflict = out.conflict;
        Ok(out.conflict)
    }
}

/// Empty or unparseable amounts count as zero.
fn parse_amount(raw: &str) -> Money {
    Money::parse(raw).unwrap_or(Money::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::ConflictKind;
    use backoffice_core::ProductId;

    fn session_of(totals: &[i64]) -> EditSession {
        EditSession::new(InvoiceDraft::with_items(
            totals
                .iter()
                .map(|t| LineItem::new(Some(ProductId::from_raw(1)), 1, Money::from_major(*t), 1))
                .collect(),
        ))
    }

    fn paid(session: &EditSession) -> Vec<Money> {
        session.draft().items.iter().map(LineItem::amount_paid).collect()
    }

    #[test]
    fn line_payment_is_buffered_until_commit() {
        let mut s = session_of(&[100, 100]);
        s.begin_edit(EditTarget::GlobalPaid).unwrap();
        s.input("100").unwrap();
        s.commit().unwrap();
        assert_eq!(paid(&s), vec![Money::from_major(50), Money::from_major(50)]);

        s.begin_edit(EditTarget::ItemPaid { index: 0 }).unwrap();
        s.input("8").unwrap();
        s.input("80").unwrap();
        assert_eq!(paid(&s), vec![Money::from_major(50), Money::from_major(50)]);

        let conflict = s.commit().unwrap();
        assert_eq!(conflict, None);
        assert_eq!(paid(&s), vec![Money::from_major(80), Money::from_major(20)]);
        assert_eq!(s.state(), &SessionState::Idle);
    }

    #[test]
    fn global_paid_applies_while_typing() {
        let mut s = session_of(&[100, 200]);
        s.begin_edit(EditTarget::GlobalPaid).unwrap();
        s.input("9").unwrap();
        assert_eq!(s.totals().amount_paid, Money::from_major(9));
        s.input("90").unwrap();
        assert_eq!(paid(&s), vec![Money::from_major(30), Money::from_major(60)]);
        assert!(matches!(s.state(), SessionState::Editing { .. }));
    }

    #[test]
    fn quantity_edit_recomputes_immediately() {
        let mut s = session_of(&[10]);
        s.begin_edit(EditTarget::ItemField { index: 0, field: ItemField::Quantity })
            .unwrap();
        s.input("3").unwrap();
        assert_eq!(s.totals().total_amount, Money::from_major(30));
    }

    #[test]
    fn blur_without_typing_keeps_line_payments() {
        let mut s = session_of(&[100, 100]);
        s.begin_edit(EditTarget::GlobalPaid).unwrap();
        s.input("100").unwrap();
        s.commit().unwrap();

        s.begin_edit(EditTarget::ItemPaid { index: 0 }).unwrap();
        assert_eq!(
            s.state(),
            &SessionState::Editing {
                target: EditTarget::ItemPaid { index: 0 },
                buffer: "50.00".to_string(),
            }
        );
        assert_eq!(s.commit().unwrap(), None);
        assert_eq!(paid(&s), vec![Money::from_major(50), Money::from_major(50)]);
        assert_eq!(s.totals().amount_paid, Money::from_major(100));
    }

    #[test]
    fn clearing_a_line_payment_moves_it_to_the_others() {
        let mut s = session_of(&[100, 100]);
        s.begin_edit(EditTarget::GlobalPaid).unwrap();
        s.input("100").unwrap();
        s.commit().unwrap();

        s.begin_edit(EditTarget::ItemPaid { index: 0 }).unwrap();
        s.input("").unwrap();
        s.commit().unwrap();
        assert_eq!(paid(&s), vec![Money::ZERO, Money::from_major(100)]);
    }

    #[test]
    fn cancel_discards_buffered_payment() {
        let mut s = session_of(&[10, 10]);
        s.begin_edit(EditTarget::ItemPaid { index: 1 }).unwrap();
        s.input("5").unwrap();
        s.cancel();
        assert_eq!(s.state(), &SessionState::Idle);
        assert_eq!(paid(&s), vec![Money::ZERO, Money::ZERO]);
    }

    #[test]
    fn dispatch_requires_idle() {
        let mut s = session_of(&[10]);
        s.begin_edit(EditTarget::GlobalPaid).unwrap();
        let err = s.dispatch(EditAction::ResetPaid).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        s.commit().unwrap();
        s.dispatch(EditAction::ResetPaid).unwrap();
        assert_eq!(s.totals().remaining_amount, Money::ZERO);
    }

    #[test]
    fn commit_without_focus_is_rejected() {
        let mut s = session_of(&[10]);
        assert!(matches!(s.commit(), Err(DomainError::Conflict(_))));
        assert!(matches!(s.input("1"), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn begin_edit_checks_line_index() {
        let mut s = session_of(&[10]);
        let err = s.begin_edit(EditTarget::ItemPaid { index: 4 }).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(s.state(), &SessionState::Idle);
    }

    #[test]
    fn conflicts_are_kept_for_the_ui() {
        let mut s = session_of(&[100, 100]);
        s.begin_edit(EditTarget::GlobalPaid).unwrap();
        s.input("40").unwrap();
        s.commit().unwrap();

        s.begin_edit(EditTarget::ItemPaid { index: 0 }).unwrap();
        s.input("70").unwrap();
        let conflict = s.commit().unwrap().unwrap();
        assert_eq!(conflict.kind, ConflictKind::EditedItemExceedsTarget);
        assert_eq!(s.last_conflict(), Some(&conflict));

        s.dispatch(EditAction::ItemAdded).unwrap();
        assert_eq!(s.last_conflict(), None);
    }

    #[test]
    fn new_session_normalizes_inconsistent_draft() {
        let mut draft = InvoiceDraft::with_items(vec![
            LineItem::new(Some(ProductId::from_raw(1)), 1, Money::from_major(10), 1)
                .with_paid(Money::from_major(25)),
        ]);
        draft.amount_paid = Money::from_major(99);

        let s = EditSession::new(draft);
        assert_eq!(s.totals().amount_paid, Money::from_major(10));
    }
}
