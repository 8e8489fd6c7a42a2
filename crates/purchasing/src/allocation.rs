//! Payment allocation across the lines of an invoice draft.
//!
//! All three operations leave the draft consistent: every line is paid within
//! `[0, total_price]` and `draft.amount_paid` equals the sum of line payments.
//! When a request cannot be met exactly the operation still produces that
//! consistent state and reports the gap as an [`AllocationConflict`].

use serde::{Deserialize, Serialize};

use backoffice_core::{DomainError, DomainResult, Money};

use crate::invoice::InvoiceDraft;

/// Why an allocation could not be satisfied exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Invoice-level distribution: the rounding difference did not fit on the last line.
    ResidualNotAbsorbed,
    /// A single line was paid more than the whole invoice-level amount.
    EditedItemExceedsTarget,
    /// The other lines had too little capacity to absorb the remainder.
    InsufficientCapacity,
    /// No other line has a non-zero total; the remainder was not placed.
    NoOtherCapacity,
}

/// Non-fatal allocation outcome surfaced to the caller (toast/warning).
///
/// `requested` is what the operation tried to place and `allocated` what it
/// actually placed; see [`ConflictKind`] for which amounts each kind compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationConflict {
    pub kind: ConflictKind,
    /// Line the conflict concerns (last line for invoice-level edits, edited line otherwise).
    pub index: usize,
    pub requested: Money,
    pub allocated: Money,
}

impl AllocationConflict {
    /// Amount that could not be placed (negative when the request was overshot).
    pub fn shortfall(&self) -> Money {
        self.requested - self.allocated
    }
}

impl core::fmt::Display for AllocationConflict {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.kind {
            ConflictKind::ResidualNotAbsorbed => write!(
                f,
                "allocated {} of requested {}; line {} could not absorb the remaining {}",
                self.allocated,
                self.requested,
                self.index + 1,
                self.shortfall()
            ),
            ConflictKind::EditedItemExceedsTarget => write!(
                f,
                "line {} payment {} exceeds the invoice paid amount; reduced to {}",
                self.index + 1,
                self.requested,
                self.allocated
            ),
            ConflictKind::InsufficientCapacity => write!(
                f,
                "other lines could absorb only {} of {}; {} returned to line {}",
                self.allocated,
                self.requested,
                self.shortfall(),
                self.index + 1
            ),
            ConflictKind::NoOtherCapacity => write!(
                f,
                "no other line can absorb the remaining {}; invoice paid reduced accordingly",
                self.requested
            ),
        }
    }
}

/// Result of one allocation operation.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Allocation {
    /// Authoritative invoice-level paid amount after the operation.
    pub amount_paid: Money,
    pub conflict: Option<AllocationConflict>,
}

impl Allocation {
    fn settle(draft: &mut InvoiceDraft, conflict: Option<AllocationConflict>) -> Self {
        draft.sync_amount_paid();
        if let Some(c) = &conflict {
            tracing::warn!(
                kind = ?c.kind,
                line = c.index,
                requested = %c.requested,
                allocated = %c.allocated,
                "allocation conflict: {c}"
            );
        }
        Self {
            amount_paid: draft.amount_paid,
            conflict,
        }
    }
}

/// Spread an invoice-level paid amount over all lines in proportion to their totals.
///
/// The target is clamped to `[0, total_amount]`. The rounding difference goes to
/// the last line; if that line cannot take it the residual is reported and no
/// further redistribution is attempted.
pub fn distribute_global_paid(draft: &mut InvoiceDraft, target: Money) -> Allocation {
    let total = draft.total_amount();

    if total <= Money::ZERO {
        for item in draft.items.iter_mut() {
            item.set_paid(Money::ZERO);
        }
        return Allocation::settle(draft, None);
    }

    let target = target.bounded(Money::ZERO, total);
    tracing::debug!(%target, %total, lines = draft.items.len(), "distributing invoice payment");

    for item in draft.items.iter_mut() {
        let share = Money::share(item.total_price(), total, target);
        item.set_paid(share.bounded(Money::ZERO, item.total_price()));
    }

    let diff = target - draft.items_paid();
    let mut conflict = None;
    let last_index = draft.items.len() - 1;
    let last = &mut draft.items[last_index];
    let wanted = last.amount_paid() + diff;
    let placed = wanted.bounded(Money::ZERO, last.total_price());
    last.set_paid(placed);

    if placed != wanted {
        conflict = Some(AllocationConflict {
            kind: ConflictKind::ResidualNotAbsorbed,
            index: last_index,
            requested: target,
            allocated: draft.items_paid(),
        });
    }

    Allocation::settle(draft, conflict)
}

/// Rebalance the other lines after one line's paid amount was committed.
///
/// The edited line must already be clamped to `[0, its total]`. The other lines
/// are filled proportionally to their totals so that all lines sum to
/// `target_total`, with a left-to-right greedy sweep when some of them saturate.
pub fn redistribute_remainder(
    draft: &mut InvoiceDraft,
    edited_index: usize,
    target_total: Money,
) -> DomainResult<Allocation> {
    let edited = draft.items.get(edited_index).ok_or_else(|| {
        DomainError::validation(format!("line index {edited_index} out of range"))
    })?;
    let edited_paid = edited.amount_paid();
    let edited_total = edited.total_price();
    let required_other = target_total - edited_paid;

    tracing::debug!(
        line = edited_index,
        %edited_paid,
        %target_total,
        "redistributing remainder"
    );

    if required_other < Money::ZERO {
        let capped = target_total.bounded(Money::ZERO, edited_total);
        for (i, item) in draft.items.iter_mut().enumerate() {
            item.set_paid(if i == edited_index { capped } else { Money::ZERO });
        }
        let conflict = AllocationConflict {
            kind: ConflictKind::EditedItemExceedsTarget,
            index: edited_index,
            requested: edited_paid,
            allocated: capped,
        };
        return Ok(Allocation::settle(draft, Some(conflict)));
    }

    let other_weight: Money = draft
        .items
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != edited_index)
        .map(|(_, item)| item.total_price())
        .sum();
    if other_weight <= Money::ZERO {
        // Nothing can absorb the remainder: siblings stay as they are.
        let conflict = (required_other > Money::ZERO).then_some(AllocationConflict {
            kind: ConflictKind::NoOtherCapacity,
            index: edited_index,
            requested: required_other,
            allocated: Money::ZERO,
        });
        return Ok(Allocation::settle(draft, conflict));
    }

    // Proportional pass.
    let mut assigned = Money::ZERO;
    for (_, item) in others_mut(draft, edited_index) {
        let share = Money::share(item.total_price(), other_weight, required_other)
            .bounded(Money::ZERO, item.total_price());
        item.set_paid(share);
        assigned += share;
    }

    // Several shares rounding up can overshoot by a few cents; trim from the back.
    if assigned > required_other {
        let mut excess = assigned - required_other;
        for (_, item) in others_mut(draft, edited_index).rev() {
            if excess.is_zero() {
                break;
            }
            let take = excess.min(item.amount_paid());
            item.set_paid(item.amount_paid() - take);
            excess -= take;
        }
        assigned = required_other;
    }

    // Saturation sweep.
    let mut remaining = required_other - assigned;
    for (_, item) in others_mut(draft, edited_index) {
        if remaining <= Money::ZERO {
            break;
        }
        let add = remaining.min(item.spare_capacity());
        item.set_paid(item.amount_paid() + add);
        remaining -= add;
    }

    let mut conflict = None;
    if remaining > Money::ZERO {
        let absorbed = required_other - remaining;
        let edited = &mut draft.items[edited_index];
        edited.set_paid((edited_paid + remaining).bounded(Money::ZERO, edited_total));
        conflict = Some(AllocationConflict {
            kind: ConflictKind::InsufficientCapacity,
            index: edited_index,
            requested: required_other,
            allocated: absorbed,
        });
    }

    Ok(Allocation::settle(draft, conflict))
}

/// Mark every line fully paid.
pub fn reset_to_full(draft: &mut InvoiceDraft) -> Allocation {
    for item in draft.items.iter_mut() {
        item.set_paid(item.total_price());
    }
    Allocation::settle(draft, None)
}

fn others_mut(
    draft: &mut InvoiceDraft,
    edited_index: usize,
) -> impl DoubleEndedIterator<Item = (usize, &mut crate::line_item::LineItem)> {
    draft
        .items
        .iter_mut()
        .enumerate()
        .filter(move |(i, _)| *i != edited_index)
}
