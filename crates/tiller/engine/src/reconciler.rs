//! Decision-batch reconciliation
//!
//! One cycle can produce decisions that contradict each other: a soft
//! completion proposal next to fresh scheduling work, or several closing
//! decisions racing for the final word. Reconciliation drops the
//! incompatible ones, arbitrates the rest by closing priority and gives
//! user code the last word through the closing hook.

use crate::graph::ClosingHook;
use tiller_types::Decision;

/// Remove structural duplicates, keeping first occurrences in order.
pub(crate) fn dedup(batch: Vec<Decision>) -> Vec<Decision> {
    let mut unique: Vec<Decision> = Vec::with_capacity(batch.len());
    for decision in batch {
        if !unique.contains(&decision) {
            unique.push(decision);
        }
    }
    unique
}

/// Reconcile a deduplicated batch into the final emission.
///
/// A proposal yields to any other non-closing work (or to anything still
/// in flight); non-closing work yields to a hard close. If closing
/// decisions survive, only the highest-priority one is kept and it is
/// routed through the closing hook, which may override or veto it.
pub(crate) fn reconcile(
    batch: Vec<Decision>,
    has_active_event: bool,
    hook: Option<&ClosingHook>,
) -> Vec<Decision> {
    let any_non_closing = batch.iter().any(|d| !d.is_closing());
    let any_hard_close = batch.iter().any(|d| d.is_closing() && !d.is_proposal());

    let mut survivors: Vec<Decision> = Vec::new();
    for decision in batch {
        let incompatible = (decision.is_proposal() && (any_non_closing || has_active_event))
            || (!decision.is_closing() && any_hard_close);
        if incompatible {
            tracing::debug!(kind = decision.kind_name(), "dropping incompatible decision");
            continue;
        }
        survivors.push(decision);
    }

    let mut best_close: Option<Decision> = None;
    for decision in survivors.iter().filter(|d| d.is_closing()) {
        let better = match &best_close {
            None => true,
            Some(current) => decision.closing_priority() > current.closing_priority(),
        };
        if better {
            best_close = Some(decision.clone());
        }
    }

    match best_close {
        Some(close) => {
            let resolved = match hook {
                Some(hook) => hook(&close),
                None => Some(close.clone()),
            };
            match resolved {
                Some(decision) => vec![decision],
                None => {
                    tracing::debug!(kind = close.kind_name(), "closing decision vetoed");
                    survivors.into_iter().filter(|d| !d.is_closing()).collect()
                }
            }
        }
        None => survivors,
    }
}
