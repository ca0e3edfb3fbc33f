//! Autonomous pricing and liquidity
//!
//! Price derives from authenticity, Enochian content, tradition rarity, and
//! market state; purchases run a constant-product AMM with a protocol fee;
//! rebalancing pulls reserves toward the symmetric target when the spot
//! price drifts. Everything is fixed-point.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::fixed::Fixed;
use crate::quests::Quest;
use crate::{EnochianError, Result};

/// Economic system parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicParams {
    /// Base quest price in sats.
    pub base_price: Fixed,
    /// Protocol fee taken into the pool on purchase.
    pub protocol_fee: Fixed,
    /// Share of accumulated fees distributed to stakers.
    pub staking_reward_rate: Fixed,
    /// Spot-price deviation that triggers rebalancing.
    pub stability_threshold: Fixed,
    /// Fraction of the reserve gap pulled per rebalance.
    pub rebalance_pull: Fixed,
    /// Enochian price bonus.
    pub enochian_bonus: Fixed,
    /// Expected daily volume normalizing the demand curve.
    pub base_volume: Fixed,
}

impl Default for EconomicParams {
    fn default() -> Self {
        EconomicParams {
            base_price: Fixed::from_micros(4_720_000),
            protocol_fee: Fixed::from_micros(100_000),
            staking_reward_rate: Fixed::from_micros(150_000),
            stability_threshold: Fixed::from_micros(200_000),
            rebalance_pull: Fixed::from_micros(100_000),
            enochian_bonus: Fixed::from_micros(1_800_000),
            base_volume: Fixed::from_int(1000),
        }
    }
}

/// Full price breakdown for one quest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Quest id.
    pub quest_id: String,
    /// Base price.
    pub base_price: Fixed,
    /// Authenticity multiplier.
    pub authenticity_multiplier: Fixed,
    /// Enochian bonus multiplier.
    pub enochian_bonus: Fixed,
    /// Tradition rarity multiplier.
    pub rarity_multiplier: Fixed,
    /// Demand multiplier from rolling volume.
    pub demand_multiplier: Fixed,
    /// Liquidity adjustment.
    pub liquidity_adjustment: Fixed,
    /// Product of base and all multipliers.
    pub final_price: Fixed,
}

/// Constant-product liquidity pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityPool {
    /// Pool id.
    pub pool_id: String,
    /// Quest-token reserve.
    pub token_reserve: Fixed,
    /// Quote (sats) reserve.
    pub quote_reserve: Fixed,
    /// Accumulated protocol fees.
    pub fees_accumulated: Fixed,
    /// Rolling 24h volume counter.
    pub volume_24h: Fixed,
    /// Quote reserve at pool creation, normalizing the liquidity ratio.
    pub initial_quote: Fixed,
}

impl LiquidityPool {
    /// Open a pool with positive reserves.
    pub fn new(pool_id: impl Into<String>, token_reserve: Fixed, quote_reserve: Fixed) -> Result<Self> {
        if !token_reserve.is_positive() || !quote_reserve.is_positive() {
            return Err(EnochianError::InvalidRecord {
                id: "liquidity pool".to_string(),
                reason: "reserves must be positive".to_string(),
            });
        }
        Ok(LiquidityPool {
            pool_id: pool_id.into(),
            token_reserve,
            quote_reserve,
            fees_accumulated: Fixed::ZERO,
            volume_24h: Fixed::ZERO,
            initial_quote: quote_reserve,
        })
    }

    /// Spot price: quote reserve over token reserve.
    pub fn spot_price(&self) -> Fixed {
        self.quote_reserve / self.token_reserve
    }

    /// Liquidity ratio against the opening reserve.
    pub fn liquidity_ratio(&self) -> Fixed {
        self.quote_reserve / self.initial_quote
    }
}

/// Result of a processed purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseResult {
    /// Quest purchased.
    pub quest_id: String,
    /// Buyer identifier (opaque to the core).
    pub buyer_id: String,
    /// The price the buyer paid.
    pub price: PricePoint,
    /// Protocol fee taken.
    pub fee_paid: Fixed,
    /// Quest tokens released by the pool.
    pub token_out: Fixed,
    /// Spot price after the swap.
    pub spot_price_after: Fixed,
}

/// A staker's position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staker {
    /// Staker identifier.
    pub staker_id: String,
    /// Staked amount.
    pub stake_amount: Fixed,
    /// Mean authenticity of the staker's contributions.
    pub authenticity_contribution: Fixed,
}

/// One staker's computed reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardShare {
    /// Staker identifier.
    pub staker_id: String,
    /// Reward amount.
    pub amount: Fixed,
}

/// Price a quest against the current pool state.
pub fn price(quest: &Quest, pool: &LiquidityPool, params: &EconomicParams) -> PricePoint {
    // Exponential bonus at 95%+, linear scaling below, clipped to [0.5, 2.0].
    let s = quest.authenticity_score;
    let high_floor = Fixed::from_micros(950_000);
    let authenticity_multiplier = if s >= high_floor {
        Fixed::ONE + (s - high_floor) * Fixed::from_int(10)
    } else {
        Fixed::from_micros(500_000) + s * Fixed::from_micros(500_000)
    }
    .clamp(Fixed::from_micros(500_000), Fixed::from_int(2));

    let enochian_bonus = if quest.tradition_refs.iter().any(|t| t.is_enochian()) {
        params.enochian_bonus
    } else {
        Fixed::ONE
    };

    let distinct: BTreeSet<_> = quest.tradition_refs.iter().collect();
    let rarity_multiplier = (Fixed::ONE
        + Fixed::from_micros(300_000) * Fixed::from_int(distinct.len() as i64 - 1))
    .min(Fixed::from_int(4));

    // demand = 1 + 0.1 * ln(max(volume / base_volume, 0.1)), clipped.
    let demand_ratio = (pool.volume_24h / params.base_volume).max(Fixed::from_micros(100_000));
    let demand_multiplier = (Fixed::ONE + Fixed::from_micros(100_000) * demand_ratio.ln())
        .clamp(Fixed::from_micros(500_000), Fixed::from_int(2));

    // More liquidity, smaller premium; clipped to [0.8, 1.5].
    let liquidity_adjustment = (Fixed::ONE
        + Fixed::from_micros(200_000) * (Fixed::ONE - pool.liquidity_ratio().min(Fixed::from_int(2))))
    .clamp(Fixed::from_micros(800_000), Fixed::from_micros(1_500_000));

    let final_price = params.base_price
        * authenticity_multiplier
        * enochian_bonus
        * rarity_multiplier
        * demand_multiplier
        * liquidity_adjustment;

    PricePoint {
        quest_id: quest.quest_id.clone(),
        base_price: params.base_price,
        authenticity_multiplier,
        enochian_bonus,
        rarity_multiplier,
        demand_multiplier,
        liquidity_adjustment,
        final_price,
    }
}

/// Process a purchase: take the protocol fee, swap the remainder through the
/// constant-product curve, and update the pool.
pub fn apply_purchase(
    pool: &mut LiquidityPool,
    quest: &Quest,
    buyer_id: &str,
    params: &EconomicParams,
) -> Result<PurchaseResult> {
    let price = price(quest, pool, params);
    let amount_in = price.final_price;
    let fee_paid = amount_in * params.protocol_fee;
    let amount_in_after_fee = amount_in - fee_paid;

    // token_out = reserve_out * in / (reserve_in + in)
    let token_out = pool.token_reserve * amount_in_after_fee
        / (pool.quote_reserve + amount_in_after_fee);
    if token_out >= pool.token_reserve {
        return Err(EnochianError::InvalidRecord {
            id: pool.pool_id.clone(),
            reason: "swap would drain the token reserve".to_string(),
        });
    }

    pool.token_reserve -= token_out;
    pool.quote_reserve += amount_in_after_fee;
    pool.fees_accumulated += fee_paid;
    pool.volume_24h += amount_in;

    let spot_price_after = pool.spot_price();
    log::debug!(
        "Purchase of {} by {}: {} sats, {} tokens out, spot {}",
        quest.quest_id,
        buyer_id,
        amount_in,
        token_out,
        spot_price_after
    );

    Ok(PurchaseResult {
        quest_id: quest.quest_id.clone(),
        buyer_id: buyer_id.to_string(),
        price,
        fee_paid,
        token_out,
        spot_price_after,
    })
}

/// Pull reserves 10% toward the symmetric target when the spot price drifts
/// more than the stability threshold from base. Returns true when the pool
/// was adjusted.
pub fn rebalance(pool: &mut LiquidityPool, params: &EconomicParams) -> bool {
    let base = params.base_price;
    let deviation = (pool.spot_price() - base).abs() / base;
    if deviation <= params.stability_threshold {
        return false;
    }

    let total_value = pool.quote_reserve + pool.token_reserve * base;
    let quote_target = total_value / Fixed::from_int(2);
    let token_target = quote_target / base;

    pool.quote_reserve += (quote_target - pool.quote_reserve) * params.rebalance_pull;
    pool.token_reserve += (token_target - pool.token_reserve) * params.rebalance_pull;

    log::info!(
        "Rebalanced pool {}: spot {} toward base {}",
        pool.pool_id,
        pool.spot_price(),
        base
    );
    true
}

/// Compute staking rewards: `fees * rate` split by stake weighted with
/// authenticity contribution. Pure; the pool is untouched.
pub fn staking_shares(
    pool: &LiquidityPool,
    stakers: &[Staker],
    params: &EconomicParams,
) -> Vec<RewardShare> {
    let reward_pool = pool.fees_accumulated * params.staking_reward_rate;
    if !reward_pool.is_positive() {
        return Vec::new();
    }
    let total_weight: Fixed = stakers
        .iter()
        .map(|s| s.stake_amount * s.authenticity_contribution)
        .sum();
    if !total_weight.is_positive() {
        return Vec::new();
    }
    stakers
        .iter()
        .map(|staker| {
            let weight = staker.stake_amount * staker.authenticity_contribution;
            RewardShare {
                staker_id: staker.staker_id.clone(),
                amount: reward_pool * weight / total_weight,
            }
        })
        .collect()
}

/// Apply a computed distribution, deducting the total from the fee counter.
pub fn apply_staking_distribution(pool: &mut LiquidityPool, shares: &[RewardShare]) {
    let total: Fixed = shares.iter().map(|s| s.amount).sum();
    pool.fees_accumulated -= total;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::hash_fields;
    use crate::traditions::Tradition;

    fn quest(score_micros: i64, refs: Vec<Tradition>) -> Quest {
        Quest {
            quest_id: "quest-1".to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            objectives: vec![],
            wisdom_focus: "w".to_string(),
            tradition_refs: refs,
            grounding_entry_ids: vec![],
            difficulty: 5,
            enochian_invocation: "i".to_string(),
            authenticity_score: Fixed::from_micros(score_micros),
            content_digest: hash_fields(&[b"q"]),
            low_authenticity: false,
        }
    }

    fn pool() -> LiquidityPool {
        LiquidityPool::new(
            "main",
            Fixed::from_int(10_000),
            Fixed::from_int(100_000),
        )
        .unwrap()
    }

    #[test]
    fn test_worked_amm_example() {
        // Purchase of 1000 into (token=10000, quote=100000) at 10% fee:
        // token_out = 10000 * 900 / (100000 + 900) = 89.197224... (micros truncate)
        let mut pool = pool();
        pool.quote_reserve = Fixed::from_int(100_000);
        let fee = Fixed::from_int(1000) * Fixed::from_micros(100_000);
        assert_eq!(fee, Fixed::from_int(100));
        let after_fee = Fixed::from_int(900);
        let token_out =
            pool.token_reserve * after_fee / (pool.quote_reserve + after_fee);
        assert_eq!(token_out.micros(), 89_197_224);
    }

    #[test]
    fn test_purchase_updates_reserves_and_fees() {
        let mut pool = pool();
        let result = apply_purchase(
            &mut pool,
            &quest(990_000, vec![Tradition::Enochian]),
            "buyer-7",
            &EconomicParams::default(),
        )
        .unwrap();

        assert_eq!(result.fee_paid, result.price.final_price * Fixed::from_micros(100_000));
        assert_eq!(pool.fees_accumulated, result.fee_paid);
        assert_eq!(pool.volume_24h, result.price.final_price);
        assert!(pool.token_reserve < Fixed::from_int(10_000));
        assert!(pool.quote_reserve > Fixed::from_int(100_000));
        assert_eq!(result.spot_price_after, pool.spot_price());
    }

    #[test]
    fn test_authenticity_multiplier_curve() {
        let params = EconomicParams::default();
        let pool = pool();
        // 0.99 -> 1 + 0.04*10 = 1.4
        let high = price(&quest(990_000, vec![Tradition::Enochian]), &pool, &params);
        assert_eq!(high.authenticity_multiplier.micros(), 1_400_000);
        // 0.85 -> 0.5 + 0.425 = 0.925
        let low = price(&quest(850_000, vec![Tradition::Enochian]), &pool, &params);
        assert_eq!(low.authenticity_multiplier.micros(), 925_000);
        // 1.00 -> 1.5; cap keeps the curve inside [0.5, 2.0].
        let perfect = price(&quest(1_000_000, vec![Tradition::Enochian]), &pool, &params);
        assert_eq!(perfect.authenticity_multiplier.micros(), 1_500_000);
    }

    #[test]
    fn test_enochian_and_rarity_bonuses() {
        let params = EconomicParams::default();
        let pool = pool();
        let plain = price(&quest(900_000, vec![Tradition::Tarot]), &pool, &params);
        assert_eq!(plain.enochian_bonus, Fixed::ONE);
        assert_eq!(plain.rarity_multiplier, Fixed::ONE);

        let rich = price(
            &quest(
                900_000,
                vec![
                    Tradition::Enochian,
                    Tradition::HermeticQabalah,
                    Tradition::Alchemy,
                ],
            ),
            &pool,
            &params,
        );
        assert_eq!(rich.enochian_bonus.micros(), 1_800_000);
        // 1 + 0.3 * 2
        assert_eq!(rich.rarity_multiplier.micros(), 1_600_000);
    }

    #[test]
    fn test_demand_floor_applies_at_zero_volume() {
        let params = EconomicParams::default();
        let pool = pool();
        let point = price(&quest(900_000, vec![Tradition::Enochian]), &pool, &params);
        // volume 0 -> ratio floored at 0.1 -> 1 + 0.1*ln(0.1) ≈ 0.769742
        assert!((point.demand_multiplier.micros() - 769_742).abs() <= 5);
    }

    #[test]
    fn test_rebalance_triggers_only_past_threshold() {
        let params = EconomicParams::default();
        let mut calm = LiquidityPool::new(
            "calm",
            Fixed::from_int(10_000),
            Fixed::from_int(10_000) * params.base_price,
        )
        .unwrap();
        assert!(!rebalance(&mut calm, &params));

        // Spot = 10.0 vs base 4.72: deviation far past 20%.
        let mut drifted = pool();
        let before = drifted.spot_price();
        assert!(rebalance(&mut drifted, &params));
        let after = drifted.spot_price();
        assert!((after - params.base_price).abs() < (before - params.base_price).abs());
    }

    #[test]
    fn test_staking_distribution_is_pure_and_proportional() {
        let params = EconomicParams::default();
        let mut pool = pool();
        pool.fees_accumulated = Fixed::from_int(1000);

        let stakers = vec![
            Staker {
                staker_id: "a".to_string(),
                stake_amount: Fixed::from_int(100),
                authenticity_contribution: Fixed::from_micros(950_000),
            },
            Staker {
                staker_id: "b".to_string(),
                stake_amount: Fixed::from_int(100),
                authenticity_contribution: Fixed::from_micros(850_000),
            },
        ];
        let shares = staking_shares(&pool, &stakers, &params);
        assert_eq!(shares, staking_shares(&pool, &stakers, &params));
        let total: Fixed = shares.iter().map(|s| s.amount).sum();
        // fees * 0.15 = 150, split 95:85.
        assert!((total.micros() - 150_000_000).abs() <= 2);
        assert!(shares[0].amount > shares[1].amount);

        apply_staking_distribution(&mut pool, &shares);
        assert!((pool.fees_accumulated.micros() - 850_000_000).abs() <= 2);
    }
}
