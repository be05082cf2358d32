//! Field-level update operations.
//!
//! An [`Update`] is an ordered list of operators applied to a single matched document.
//! Backends report the effect of an update or replace as an [`UpdateOutcome`].

use bson::Bson;

/// A single field operator.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Sets the field to the value.
    Set(String, Bson),
    /// Removes the field.
    Unset(String),
    /// Adds the numeric value to the field, creating it when missing.
    Inc(String, Bson),
}

impl UpdateOp {
    pub fn field(&self) -> &str {
        match self {
            UpdateOp::Set(field, _) | UpdateOp::Unset(field) | UpdateOp::Inc(field, _) => field,
        }
    }
}

/// A partial update built from field operators.
///
/// ```ignore
/// use doccache::update::Update;
///
/// let changes = Update::new()
///     .set("charlie", "One more time")
///     .inc("delta", 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.ops.push(UpdateOp::Set(field.into(), value.into()));
        self
    }

    #[must_use]
    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Unset(field.into()));
        self
    }

    #[must_use]
    pub fn inc(mut self, field: impl Into<String>, amount: impl Into<Bson>) -> Self {
        self.ops.push(UpdateOp::Inc(field.into(), amount.into()));
        self
    }

    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Counts reported by a single-document update or replace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
    pub upserted: u64,
}

impl UpdateOutcome {
    /// The filter selected nothing and nothing was inserted.
    pub fn is_no_match(&self) -> bool {
        self.matched == 0 && self.upserted == 0
    }

    /// The filter selected a document that was left unchanged.
    pub fn is_no_modification(&self) -> bool {
        self.matched > 0 && self.modified == 0 && self.upserted == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_operator_order() {
        let update = Update::new()
            .set("charlie", "One more time")
            .inc("delta", 2)
            .unset("echo");

        let fields = update.ops().iter().map(UpdateOp::field).collect::<Vec<_>>();
        assert_eq!(fields, ["charlie", "delta", "echo"]);
        assert!(!update.is_empty());
        assert!(Update::new().is_empty());
    }

    #[test]
    fn outcome_classification() {
        let none = UpdateOutcome::default();
        assert!(none.is_no_match());
        assert!(!none.is_no_modification());

        let same = UpdateOutcome { matched: 1, modified: 0, upserted: 0 };
        assert!(!same.is_no_match());
        assert!(same.is_no_modification());

        let changed = UpdateOutcome { matched: 1, modified: 1, upserted: 0 };
        assert!(!changed.is_no_match());
        assert!(!changed.is_no_modification());

        let upserted = UpdateOutcome { matched: 0, modified: 0, upserted: 1 };
        assert!(!upserted.is_no_match());
        assert!(!upserted.is_no_modification());
    }
}
