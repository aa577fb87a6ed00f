//! LogicSig opcode-and-bytes budget planning (spec §4.4 step 2). Algorand
//! pools LogicSig program-size/cost budget across every transaction in a
//! group: each transaction contributes a fixed baseline allowance, so a
//! program larger than one transaction's share needs extra ("dummy")
//! transactions appended purely to enlarge the pool.

/// Per-transaction baseline LogicSig budget, in bytes, before any pooling.
pub const BUDGET_BASE_BYTES: usize = 1000;
/// Extra pooled budget each additional transaction in the group
/// contributes.
pub const BUDGET_PER_TXN_BYTES: usize = 1000;

/// Minimum number of dummy transactions needed so the group's pooled
/// LogicSig budget covers `lsig_size` bytes. Zero if `lsig_size` already
/// fits in the baseline per-transaction allowance.
pub fn dummies_for_lsig_size(lsig_size: usize) -> usize {
    if lsig_size <= BUDGET_BASE_BYTES {
        return 0;
    }
    let shortfall = lsig_size - BUDGET_BASE_BYTES;
    (shortfall + BUDGET_PER_TXN_BYTES - 1) / BUDGET_PER_TXN_BYTES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_program_needs_no_dummies() {
        assert_eq!(dummies_for_lsig_size(200), 0);
        assert_eq!(dummies_for_lsig_size(BUDGET_BASE_BYTES), 0);
    }

    #[test]
    fn exact_multiple_shortfall() {
        assert_eq!(dummies_for_lsig_size(5000), 4);
    }

    #[test]
    fn partial_shortfall_rounds_up() {
        assert_eq!(dummies_for_lsig_size(1001), 1);
        assert_eq!(dummies_for_lsig_size(2500), 2);
    }
}
