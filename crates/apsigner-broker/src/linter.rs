//! Hard policy linter (spec §4.3.a): runs before any human review. A
//! violation rejects the whole batch and no signature is produced. The
//! distilled spec is explicit that the current system only carries
//! placeholders here — "the linter's *existence* is the contract" — so
//! this ships the two named stubs plus an open `register` hook for rules
//! that need chain state this daemon doesn't have (account balances, ASA
//! holdings) to be meaningful.

use crate::request::EntrySummary;

/// Algorand's real atomic-group size ceiling; exceeding it can never be
/// submitted on-chain regardless of anything else about the batch.
pub const MAX_GROUP_SIZE: usize = 16;

pub trait LintRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, batch: &[EntrySummary]) -> std::result::Result<(), String>;
}

struct MaxGroupSizeRule;

impl LintRule for MaxGroupSizeRule {
    fn name(&self) -> &'static str {
        "max_group_size"
    }

    fn check(&self, batch: &[EntrySummary]) -> std::result::Result<(), String> {
        if batch.len() > MAX_GROUP_SIZE {
            return Err(format!(
                "batch of {} entries exceeds the maximum group size of {MAX_GROUP_SIZE}",
                batch.len()
            ));
        }
        Ok(())
    }
}

/// Spec §4.3.a names this explicitly as a stub: a real implementation
/// needs an account-balance oracle this daemon doesn't have. It always
/// passes today and exists as the hook point a future rule hangs off of.
struct SenderOverspendGuardStub;

impl LintRule for SenderOverspendGuardStub {
    fn name(&self) -> &'static str {
        "sender_overspend_guard"
    }

    fn check(&self, _batch: &[EntrySummary]) -> std::result::Result<(), String> {
        Ok(())
    }
}

pub struct HardLinter {
    rules: Vec<Box<dyn LintRule>>,
}

impl Default for HardLinter {
    fn default() -> Self {
        Self {
            rules: vec![Box::new(MaxGroupSizeRule), Box::new(SenderOverspendGuardStub)],
        }
    }
}

impl HardLinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an additional hard rule, e.g. one backed by a future
    /// chain-state oracle.
    pub fn register(&mut self, rule: Box<dyn LintRule>) {
        self.rules.push(rule);
    }

    /// The first violating rule's message, or `Ok(())` if every rule
    /// passed.
    pub fn lint(&self, batch: &[EntrySummary]) -> std::result::Result<(), String> {
        for rule in &self.rules {
            if let Err(message) = rule.check(batch) {
                return Err(format!("{}: {message}", rule.name()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_entry() -> EntrySummary {
        EntrySummary::new(crate::request::EntryRole::Sign)
    }

    #[test]
    fn batch_within_limit_passes() {
        let linter = HardLinter::new();
        let batch = vec![sign_entry(); MAX_GROUP_SIZE];
        assert!(linter.lint(&batch).is_ok());
    }

    #[test]
    fn oversized_batch_rejected() {
        let linter = HardLinter::new();
        let batch = vec![sign_entry(); MAX_GROUP_SIZE + 1];
        assert!(linter.lint(&batch).is_err());
    }
}
