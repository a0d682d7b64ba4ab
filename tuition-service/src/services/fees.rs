//! Fee and balance arithmetic.
//!
//! The SQL paths aggregate directly in the database; these helpers are the
//! same calculations over already-fetched rows, used when assembling the
//! fee matrix and when deriving balances for responses.

use rust_decimal::Decimal;
use uuid::Uuid;

/// Sum the fee cells of `enrolled` subjects for one standard. A subject
/// with no cell in the matrix contributes 0.
pub fn total_fee(cells: &[(Uuid, Decimal)], enrolled: &[Uuid]) -> Decimal {
    enrolled
        .iter()
        .map(|subject_id| {
            cells
                .iter()
                .find(|(id, _)| id == subject_id)
                .map(|(_, amount)| *amount)
                .unwrap_or(Decimal::ZERO)
        })
        .sum()
}

/// Remaining balance after a further payment of `amount`, given the total
/// payable and everything paid so far.
pub fn derive_remaining(total_fees: Decimal, paid_so_far: Decimal, amount: Decimal) -> Decimal {
    total_fees - (paid_so_far + amount)
}

/// Replay a sequence of payments against a total, yielding the remaining
/// balance after each one.
pub fn replay_balances(total_fees: Decimal, payments: &[Decimal]) -> Vec<Decimal> {
    let mut paid = Decimal::ZERO;
    payments
        .iter()
        .map(|amount| {
            let remaining = derive_remaining(total_fees, paid, *amount);
            paid += *amount;
            remaining
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn empty_enrollment_totals_zero() {
        let cells = vec![(Uuid::new_v4(), dec(500))];
        assert_eq!(total_fee(&cells, &[]), Decimal::ZERO);
    }

    #[test]
    fn single_subject_reads_its_cell() {
        let maths = Uuid::new_v4();
        let cells = vec![(maths, dec(500))];
        assert_eq!(total_fee(&cells, &[maths]), dec(500));
    }

    #[test]
    fn missing_cell_counts_as_zero() {
        let maths = Uuid::new_v4();
        let art = Uuid::new_v4();
        let cells = vec![(maths, dec(500))];
        assert_eq!(total_fee(&cells, &[maths, art]), dec(500));
    }

    #[test]
    fn total_is_additive_over_disjoint_subject_sets() {
        let maths = Uuid::new_v4();
        let english = Uuid::new_v4();
        let science = Uuid::new_v4();
        let cells = vec![(maths, dec(500)), (english, dec(300)), (science, dec(450))];

        let combined = total_fee(&cells, &[maths, english, science]);
        let split = total_fee(&cells, &[maths]) + total_fee(&cells, &[english, science]);
        assert_eq!(combined, split);
        assert_eq!(combined, dec(1250));
    }

    #[test]
    fn remaining_decreases_by_each_payment() {
        // Scenario: total 800, pay 300 then 200.
        assert_eq!(derive_remaining(dec(800), dec(0), dec(300)), dec(500));
        assert_eq!(derive_remaining(dec(800), dec(300), dec(200)), dec(300));
    }

    #[test]
    fn overpayment_goes_negative() {
        assert_eq!(derive_remaining(dec(100), dec(0), dec(150)), dec(-50));
    }

    #[test]
    fn replay_matches_total_minus_cumulative_sum() {
        let payments = vec![dec(300), dec(200), dec(100), dec(100)];
        let balances = replay_balances(dec(800), &payments);
        assert_eq!(balances, vec![dec(500), dec(300), dec(200), dec(100)]);

        // The last snapshot always equals total minus the full sum.
        let paid: Decimal = payments.iter().copied().sum();
        assert_eq!(*balances.last().unwrap(), dec(800) - paid);
    }

    #[test]
    fn replay_is_order_independent_in_its_final_value() {
        let forward = replay_balances(dec(800), &[dec(300), dec(200)]);
        let backward = replay_balances(dec(800), &[dec(200), dec(300)]);
        assert_eq!(forward.last(), backward.last());
    }
}
