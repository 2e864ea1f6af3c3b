//! Role-based authorization for pushed operations
//!
//! Pure table lookup; the caller decides what "deny" means (during sync
//! apply it means the record is skipped, never a failed batch).

use prospect_core::models::{CategoryType, Role};

/// A pushed operation, as the policy engine sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateLead,
    /// `closing_with` carries the target category's type when the update
    /// transitions the lead to closed
    UpdateLead {
        closing_with: Option<CategoryType>,
    },
    DeleteLead,
    CreateCallLog,
    CreateCategory,
    DeleteCategory,
}

#[must_use]
pub const fn allows(role: Role, operation: Operation) -> bool {
    match (role, operation) {
        (Role::Admin, _) => true,
        // Anyone may log calls and make non-closing edits; closing is
        // allowed for everyone only with a converted category.
        (
            _,
            Operation::CreateCallLog
            | Operation::UpdateLead { closing_with: None }
            | Operation::UpdateLead {
                closing_with: Some(CategoryType::Converted),
            },
        ) => true,
        (Role::Editor, Operation::DeleteLead) => true,
        _ => false,
    }
}
