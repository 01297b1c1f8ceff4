//! Draft validation
//!
//! Catches name-level declaration mistakes before identities are resolved
//! and the graph is built; the engine re-validates structurally (and walks
//! the parent relation for cycles) at build time.

use crate::builder::UnitDraft;
use crate::errors::{DslError, DslResult};
use std::collections::HashSet;

pub(crate) fn validate(drafts: &[UnitDraft]) -> DslResult<()> {
    validate_not_empty(drafts)?;
    validate_unique_declarations(drafts)?;
    validate_parent_references(drafts)?;
    Ok(())
}

fn validate_not_empty(drafts: &[UnitDraft]) -> DslResult<()> {
    if drafts.is_empty() {
        return Err(DslError::EmptyWorkflow);
    }
    Ok(())
}

fn validate_unique_declarations(drafts: &[UnitDraft]) -> DslResult<()> {
    let mut seen = HashSet::new();
    for draft in drafts {
        if !seen.insert(draft.key()) {
            return Err(DslError::DuplicateUnit(draft.display()));
        }
    }
    Ok(())
}

fn validate_parent_references(drafts: &[UnitDraft]) -> DslResult<()> {
    let declared: HashSet<_> = drafts.iter().map(|d| d.key()).collect();
    for draft in drafts {
        for parent in draft.parents() {
            if parent.key() == draft.key() {
                return Err(DslError::SelfParent(draft.display()));
            }
            if !declared.contains(&parent.key()) {
                return Err(DslError::UnknownParent {
                    unit: draft.display(),
                    parent: parent.display(),
                });
            }
        }
    }
    Ok(())
}
