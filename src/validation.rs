//! Creation-time parameter checks.
//!
//! Every function here is pure: it reads the request and the policy and
//! returns the first violated rule. The engine runs these before touching
//! the ledger or the escrow, so a rejected request leaves no trace.

use alloy::primitives::U256;

use crate::config::PolicyConfig;
use crate::domain::{
    CreateOrder, DcaParams, FixedPointAmount, GridParams, LiquidityParams, OptionParams,
    StrategyRequest, TwapParams, BPS_DENOMINATOR,
};
use crate::engine::grid::level_target_price;
use crate::error::ValidationError;

type Validation = std::result::Result<(), ValidationError>;

/// Validate a TWAP request
///
/// Checked in order: interval count, interval duration, price range, amount.
pub fn validate_twap(params: &TwapParams) -> Validation {
    if params.intervals < 2 {
        return Err(ValidationError::InvalidIntervals {
            intervals: params.intervals,
        });
    }

    if params.interval_duration == 0 {
        return Err(ValidationError::InvalidDuration);
    }

    if params.min_price_per_token >= params.max_price_per_token {
        return Err(ValidationError::InvalidPriceRange {
            min: params.min_price_per_token,
            max: params.max_price_per_token,
        });
    }

    if params.total_amount.is_zero() {
        return Err(invalid_amount("total_amount must be positive"));
    }

    // Every interval must move at least one base unit
    if params.total_amount.raw() < U256::from(params.intervals) {
        return Err(invalid_amount("total_amount is smaller than one base unit per interval"));
    }

    Ok(())
}

/// Validate an option request against the current time
pub fn validate_option(params: &OptionParams, now: u64) -> Validation {
    if params.expiry <= now {
        return Err(ValidationError::InvalidExpiry {
            expiry: params.expiry,
            now,
        });
    }

    if params.strike_price.is_zero() {
        return Err(ValidationError::InvalidStrike);
    }

    if params.collateral_amount.is_zero() {
        return Err(invalid_amount("collateral_amount must be positive"));
    }

    Ok(())
}

pub fn validate_dca(params: &DcaParams, policy: &PolicyConfig) -> Validation {
    if params.frequency < policy.min_dca_frequency_secs {
        return Err(ValidationError::FrequencyTooShort {
            frequency: params.frequency,
            minimum: policy.min_dca_frequency_secs,
        });
    }

    if params.amount_per_execution.is_zero() {
        return Err(invalid_amount("amount_per_execution must be positive"));
    }

    if params.amount_per_execution > params.total_amount {
        return Err(invalid_amount(&format!(
            "amount_per_execution {} exceeds total_amount {}",
            params.amount_per_execution, params.total_amount
        )));
    }

    let cap = policy.max_slippage_bps_cap.min(BPS_DENOMINATOR as u32);
    if params.max_slippage_bps > cap {
        return Err(ValidationError::InvalidSlippage {
            bps: params.max_slippage_bps,
            max_bps: cap,
        });
    }

    Ok(())
}

/// Validate a grid request; the whole price ladder must stay strictly positive
pub fn validate_grid(params: &GridParams, policy: &PolicyConfig) -> Validation {
    if params.grid_levels == 0 || params.grid_levels > policy.max_grid_levels {
        return Err(ValidationError::InvalidGridLevels {
            levels: params.grid_levels,
            max: policy.max_grid_levels,
        });
    }

    if params.amount_per_grid.is_zero() {
        return Err(invalid_amount("amount_per_grid must be positive"));
    }

    grid_total(params)?;

    if params.price_step.is_zero() {
        return Err(ValidationError::InvalidGridPrice {
            reason: "price_step must be positive".to_string(),
        });
    }

    // Lowest buy level sits at one end of the buy half, depending on the split
    let half = params.grid_levels / 2;
    let mut candidates = vec![0];
    if half > 1 {
        candidates.push(half - 1);
    }
    for level in candidates {
        let target = level_target_price(
            params.base_price,
            params.price_step,
            params.grid_levels,
            level,
            policy.grid_split,
        )
        .map_err(|e| ValidationError::InvalidGridPrice {
            reason: format!("level {level} target below zero: {e}"),
        })?;
        if target.is_zero() {
            return Err(ValidationError::InvalidGridPrice {
                reason: format!("level {level} target price is zero"),
            });
        }
    }

    Ok(())
}

pub fn validate_liquidity(params: &LiquidityParams) -> Validation {
    if params.lower_tick >= params.upper_tick {
        return Err(ValidationError::InvalidTickRange {
            lower: params.lower_tick,
            upper: params.upper_tick,
        });
    }

    if params.amount0.is_zero() && params.amount1.is_zero() {
        return Err(invalid_amount("position needs a non-zero amount0 or amount1"));
    }

    params
        .amount0
        .checked_add(params.amount1)
        .map_err(|_| invalid_amount("amount0 + amount1 overflows"))?;

    Ok(())
}

pub fn validate_deadline(deadline: Option<u64>, now: u64) -> Validation {
    match deadline {
        Some(deadline) if deadline <= now => Err(ValidationError::InvalidDeadline { deadline, now }),
        _ => Ok(()),
    }
}

/// Validate a full creation request: strategy parameters first, then the deadline
pub fn validate_request(request: &CreateOrder, now: u64, policy: &PolicyConfig) -> Validation {
    match &request.strategy {
        StrategyRequest::Twap(p) => validate_twap(p)?,
        StrategyRequest::Option(p) => validate_option(p, now)?,
        StrategyRequest::Dca(p) => validate_dca(p, policy)?,
        StrategyRequest::Grid(p) => validate_grid(p, policy)?,
        StrategyRequest::ConcentratedLiquidity(p) => validate_liquidity(p)?,
    }

    validate_deadline(request.deadline, now)
}

/// `grid_levels × amount_per_grid`
pub fn grid_total(params: &GridParams) -> std::result::Result<FixedPointAmount, ValidationError> {
    params
        .amount_per_grid
        .checked_mul_int(u64::from(params.grid_levels))
        .map_err(|_| invalid_amount("grid_levels × amount_per_grid overflows"))
}

fn invalid_amount(reason: &str) -> ValidationError {
    ValidationError::InvalidAmount {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridSplit;
    use alloy::primitives::Address;

    fn amt(s: &str) -> FixedPointAmount {
        s.parse().unwrap()
    }

    fn twap() -> TwapParams {
        TwapParams {
            token_in: Address::repeat_byte(1),
            token_out: Address::repeat_byte(2),
            total_amount: amt("1000"),
            intervals: 10,
            interval_duration: 3600,
            min_price_per_token: amt("0.95"),
            max_price_per_token: amt("1.05"),
        }
    }

    fn grid() -> GridParams {
        GridParams {
            base_token: Address::repeat_byte(1),
            quote_token: Address::repeat_byte(2),
            grid_levels: 4,
            price_step: amt("1"),
            base_price: amt("100"),
            amount_per_grid: amt("10"),
        }
    }

    #[test]
    fn test_twap_rules() {
        assert!(validate_twap(&twap()).is_ok());

        let mut p = twap();
        p.intervals = 0;
        assert_eq!(
            validate_twap(&p),
            Err(ValidationError::InvalidIntervals { intervals: 0 })
        );

        let mut p = twap();
        p.intervals = 1;
        assert!(matches!(
            validate_twap(&p),
            Err(ValidationError::InvalidIntervals { intervals: 1 })
        ));

        let mut p = twap();
        p.min_price_per_token = amt("1.05");
        p.max_price_per_token = amt("0.95");
        assert!(matches!(
            validate_twap(&p),
            Err(ValidationError::InvalidPriceRange { .. })
        ));

        // Equal bounds are rejected too
        let mut p = twap();
        p.max_price_per_token = p.min_price_per_token;
        assert!(matches!(
            validate_twap(&p),
            Err(ValidationError::InvalidPriceRange { .. })
        ));

        let mut p = twap();
        p.total_amount = FixedPointAmount::ZERO;
        assert!(matches!(
            validate_twap(&p),
            Err(ValidationError::InvalidAmount { .. })
        ));

        let mut p = twap();
        p.interval_duration = 0;
        assert_eq!(validate_twap(&p), Err(ValidationError::InvalidDuration));
    }

    #[test]
    fn test_option_rules() {
        let now = 1_000_000;
        let params = OptionParams {
            underlying: Address::repeat_byte(3),
            strike_price: amt("100"),
            premium: amt("0.1"),
            expiry: now - 86_400,
            is_call: true,
            collateral_amount: amt("1000"),
        };
        assert!(matches!(
            validate_option(&params, now),
            Err(ValidationError::InvalidExpiry { .. })
        ));

        // expiry == now is not in the future
        let mut p = params.clone();
        p.expiry = now;
        assert!(validate_option(&p, now).is_err());

        let mut p = params.clone();
        p.expiry = now + 86_400;
        assert!(validate_option(&p, now).is_ok());

        p.strike_price = FixedPointAmount::ZERO;
        assert_eq!(validate_option(&p, now), Err(ValidationError::InvalidStrike));
    }

    #[test]
    fn test_dca_rules() {
        let policy = PolicyConfig::default();
        let params = DcaParams {
            token_in: Address::repeat_byte(1),
            token_out: Address::repeat_byte(2),
            total_amount: amt("1000"),
            frequency: 100,
            amount_per_execution: amt("100"),
            max_slippage_bps: 50,
        };
        assert_eq!(
            validate_dca(&params, &policy),
            Err(ValidationError::FrequencyTooShort {
                frequency: 100,
                minimum: 3600
            })
        );

        let mut p = params.clone();
        p.frequency = 3600;
        assert!(validate_dca(&p, &policy).is_ok());

        p.amount_per_execution = amt("1000.000000000000000001");
        assert!(matches!(
            validate_dca(&p, &policy),
            Err(ValidationError::InvalidAmount { .. })
        ));

        p.amount_per_execution = FixedPointAmount::ZERO;
        assert!(matches!(
            validate_dca(&p, &policy),
            Err(ValidationError::InvalidAmount { .. })
        ));

        p.amount_per_execution = amt("100");
        p.max_slippage_bps = 10_001;
        assert!(matches!(
            validate_dca(&p, &policy),
            Err(ValidationError::InvalidSlippage { .. })
        ));
    }

    #[test]
    fn test_grid_rules() {
        let policy = PolicyConfig::default();
        assert!(validate_grid(&grid(), &policy).is_ok());

        let mut p = grid();
        p.grid_levels = 0;
        assert_eq!(
            validate_grid(&p, &policy),
            Err(ValidationError::InvalidGridLevels { levels: 0, max: 1024 })
        );

        // Oversized ladders are refused before any bitmap is allocated
        let mut p = grid();
        p.grid_levels = u32::MAX;
        assert_eq!(
            validate_grid(&p, &policy),
            Err(ValidationError::InvalidGridLevels {
                levels: u32::MAX,
                max: 1024
            })
        );
        p.grid_levels = 1024;
        p.price_step = amt("0.01");
        assert!(validate_grid(&p, &policy).is_ok());

        let mut p = grid();
        p.amount_per_grid = FixedPointAmount::ZERO;
        assert!(matches!(
            validate_grid(&p, &policy),
            Err(ValidationError::InvalidAmount { .. })
        ));

        // 2 buy levels at 100 - 2×60 would go negative
        let mut p = grid();
        p.price_step = amt("60");
        assert!(matches!(
            validate_grid(&p, &policy),
            Err(ValidationError::InvalidGridPrice { .. })
        ));

        // Same ladder fits when buy levels are offset by level index
        let offset = PolicyConfig {
            grid_split: GridSplit::LevelOffset,
            ..PolicyConfig::default()
        };
        assert!(validate_grid(&p, &offset).is_ok());
    }

    #[test]
    fn test_liquidity_rules() {
        let mut params = LiquidityParams {
            token0: Address::repeat_byte(1),
            token1: Address::repeat_byte(2),
            amount0: amt("5"),
            amount1: amt("7"),
            lower_tick: 10,
            upper_tick: 10,
        };
        assert_eq!(
            validate_liquidity(&params),
            Err(ValidationError::InvalidTickRange {
                lower: 10,
                upper: 10
            })
        );

        params.lower_tick = -10;
        assert!(validate_liquidity(&params).is_ok());

        params.amount0 = FixedPointAmount::ZERO;
        params.amount1 = FixedPointAmount::ZERO;
        assert!(validate_liquidity(&params).is_err());
    }

    #[test]
    fn test_request_checks_deadline_last() {
        let policy = PolicyConfig::default();
        let mut request = CreateOrder::new(StrategyRequest::Twap(twap())).with_deadline(500);
        assert_eq!(
            validate_request(&request, 500, &policy),
            Err(ValidationError::InvalidDeadline {
                deadline: 500,
                now: 500
            })
        );

        if let StrategyRequest::Twap(p) = &mut request.strategy {
            p.intervals = 0;
        }
        assert!(matches!(
            validate_request(&request, 500, &policy),
            Err(ValidationError::InvalidIntervals { .. })
        ));
    }
}
