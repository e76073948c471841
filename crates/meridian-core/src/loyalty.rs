//! # Loyalty Points
//!
//! Customers earn one point per [`SPEND_PER_LOYALTY_POINT`] of order total,
//! rounded down. Points are only awarded for orders the server has
//! committed; a queued offline order earns nothing at checkout.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::SPEND_PER_LOYALTY_POINT;

/// Reward tiers as `(lower bound, target, reward)`.
const REWARD_TIERS: [(i64, i64, &str); 2] = [
    (100, 200, "1 kg of red apples free"),
    (200, 500, "10% off the invoice"),
];

/// Points earned by an order total.
///
/// ## Example
/// ```rust
/// use meridian_core::loyalty::points_for_total;
/// use meridian_core::money::Money;
///
/// assert_eq!(points_for_total(Money::from_minor(2587)), 2);
/// assert_eq!(points_for_total(Money::from_minor(999)), 0);
/// ```
pub fn points_for_total(total: Money) -> i64 {
    total.whole_units_of(SPEND_PER_LOYALTY_POINT)
}

/// How far a customer is from the next reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RewardHint {
    pub points_needed: i64,
    pub target_points: i64,
    pub reward: String,
}

/// Suggests the next reward for a balance, if one is within reach.
pub fn next_reward(points: i64) -> Option<RewardHint> {
    REWARD_TIERS
        .iter()
        .find(|(low, target, _)| points >= *low && points < *target)
        .map(|(_, target, reward)| RewardHint {
            points_needed: target - points,
            target_points: *target,
            reward: (*reward).to_string(),
        })
}

/// Points credited for a committed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyAward {
    pub customer_id: i64,
    pub points_earned: i64,
    /// Balance reported by the server. `None` when the award call failed.
    pub new_total_points: Option<i64>,
    pub next_reward: Option<RewardHint>,
}

impl LoyaltyAward {
    /// Award confirmed by the server with the customer's new balance.
    pub fn credited(customer_id: i64, points_earned: i64, new_total_points: i64) -> Self {
        LoyaltyAward {
            customer_id,
            points_earned,
            new_total_points: Some(new_total_points),
            next_reward: next_reward(new_total_points),
        }
    }

    /// Award the server did not confirm.
    pub fn unconfirmed(customer_id: i64, points_earned: i64) -> Self {
        LoyaltyAward {
            customer_id,
            points_earned,
            new_total_points: None,
            next_reward: None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.new_total_points.is_some()
    }
}
