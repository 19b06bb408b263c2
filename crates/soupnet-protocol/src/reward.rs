//! Deterministic block subsidy schedule and transfer fee arithmetic.
//!
//! Every node derives the same expected reward for a block index from the
//! same parameters, so claim validation needs no coordination. The
//! schedule decays exponentially per block and floors at the minimum
//! subsidy until the supply cap is hit.

use serde::{Deserialize, Serialize};

/// Hard cap on total issued units.
pub const MAX_TOKEN_SUPPLY_UNITS: i64 = 69_359_946;

/// Per-block exponential decay fraction.
pub const PER_BLOCK_SUBSIDY_DECAY_FRACTION: f64 = 0.000_001_643_599_884_193_491_8;

/// Floor for any nonzero scheduled subsidy.
pub const MIN_SUBSIDY_UNITS: i64 = 1;

/// The parameters the store applies when validating claims.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RewardSchedule {
    /// Base subsidy paid for block 1.
    pub block_reward_units: i64,
    pub max_token_supply_units: i64,
    pub decay_fraction: f64,
    pub min_subsidy_units: i64,
}

impl Default for RewardSchedule {
    fn default() -> Self {
        Self {
            block_reward_units: 115,
            max_token_supply_units: MAX_TOKEN_SUPPLY_UNITS,
            decay_fraction: PER_BLOCK_SUBSIDY_DECAY_FRACTION,
            min_subsidy_units: MIN_SUBSIDY_UNITS,
        }
    }
}

/// Scheduled subsidy for a block index.
///
/// Block 0 (genesis) yields nothing. For `i > 0` the subsidy is
/// `floor(base × (1 − decay)^(i−1))`, floored at the minimum subsidy.
pub fn scheduled_reward_for_block(block_index: u64, schedule: &RewardSchedule) -> i64 {
    if block_index == 0 {
        return 0;
    }
    let decay = schedule.decay_fraction.clamp(0.0, 0.999_999_999_9);
    let multiplier = 1.0 - decay;
    let exponent = (block_index - 1) as f64;
    let raw = schedule.block_reward_units as f64 * multiplier.powf(exponent);
    let floor_units = schedule.min_subsidy_units.max(1);
    floor_units.max(raw as i64)
}

/// Reward a valid claim must carry, given how much has been issued so far.
///
/// Zero once the supply cap is reached; otherwise the scheduled subsidy
/// clipped to the remaining supply.
pub fn expected_claim_reward_for_block(
    block_index: u64,
    issued_so_far: i64,
    schedule: &RewardSchedule,
) -> i64 {
    if issued_so_far >= schedule.max_token_supply_units {
        return 0;
    }
    let scheduled = scheduled_reward_for_block(block_index, schedule);
    if scheduled <= 0 {
        return 0;
    }
    let remaining = schedule.max_token_supply_units - issued_so_far;
    scheduled.min(remaining)
}

/// Burn fee for a transfer: 1% of the amount, minimum one unit.
/// Non-positive amounts carry no fee (and are rejected elsewhere).
pub fn transfer_burn_fee(amount: i64) -> i64 {
    if amount <= 0 {
        return 0;
    }
    (amount / 100).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_block_yields_nothing() {
        assert_eq!(scheduled_reward_for_block(0, &RewardSchedule::default()), 0);
    }

    #[test]
    fn block_one_pays_full_subsidy() {
        let schedule = RewardSchedule::default();
        assert_eq!(scheduled_reward_for_block(1, &schedule), 115);
    }

    #[test]
    fn subsidy_decays_over_the_long_run() {
        let schedule = RewardSchedule::default();
        // Per-block exponential decay: ~4% lower after ~24k blocks.
        assert_eq!(scheduled_reward_for_block(24_193, &schedule), 110);
    }

    #[test]
    fn subsidy_floors_at_minimum() {
        let schedule = RewardSchedule {
            block_reward_units: 2,
            ..RewardSchedule::default()
        };
        assert_eq!(scheduled_reward_for_block(10_000_000, &schedule), 1);
    }

    #[test]
    fn claim_reward_respects_supply_cap() {
        let schedule = RewardSchedule::default();
        assert_eq!(
            expected_claim_reward_for_block(1, schedule.max_token_supply_units, &schedule),
            0
        );
        assert_eq!(
            expected_claim_reward_for_block(1, schedule.max_token_supply_units - 10, &schedule),
            10
        );
        assert_eq!(expected_claim_reward_for_block(1, 0, &schedule), 115);
    }

    #[test]
    fn burn_fee_is_one_percent_with_floor() {
        assert_eq!(transfer_burn_fee(1), 1);
        assert_eq!(transfer_burn_fee(99), 1);
        assert_eq!(transfer_burn_fee(100), 1);
        assert_eq!(transfer_burn_fee(250), 2);
        assert_eq!(transfer_burn_fee(10_000), 100);
        assert_eq!(transfer_burn_fee(0), 0);
        assert_eq!(transfer_burn_fee(-5), 0);
    }
}
