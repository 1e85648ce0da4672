//! Bankruptcy price of a position slice

use perpliq_common::*;

use super::margin::{margin_requirements, net_notional, position_risk};
use crate::oracle::PriceOracle;
use crate::state::MarketRegistry;

/// Quote quantums a subaccount must receive for trading `delta_quantums` of a
/// perpetual so that the traded slice leaves it with exactly zero equity.
///
/// `ceil(-DNNV - TNC * |DMMR| / TMMR)`, or `-DNNV` when TMMR is zero. A negative
/// result is a payment the subaccount can afford at most.
pub fn bankruptcy_quote_quantums(
    markets: &MarketRegistry,
    oracle: &dyn PriceOracle,
    subaccount: &Subaccount,
    perpetual_id: u32,
    delta_quantums: i128,
) -> Result<i128> {
    let risk = margin_requirements(markets, oracle, subaccount)?;
    let delta_notional = net_notional(markets, oracle, perpetual_id, delta_quantums)?;

    let position = subaccount.position_quantums(perpetual_id);
    let before = position_risk(markets, oracle, perpetual_id, position)?;
    let after_quantums = position
        .checked_add(delta_quantums)
        .ok_or(PerpliqError::Overflow)?;
    let after = position_risk(markets, oracle, perpetual_id, after_quantums)?;

    let neg_dnnv = delta_notional.checked_neg().ok_or(PerpliqError::Overflow)?;
    let tmmr = risk.maintenance_margin as i128;
    if tmmr == 0 {
        return Ok(neg_dnnv);
    }

    let dmmr = (after.maintenance_margin as i128 - before.maintenance_margin as i128).abs();
    let numerator = neg_dnnv
        .checked_mul(tmmr)
        .and_then(|v| v.checked_sub(risk.net_collateral.checked_mul(dmmr)?))
        .ok_or(PerpliqError::Overflow)?;
    Ok(div_ceil_i128(numerator, tmmr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::PriceSnapshot;

    fn setup(price: u64) -> (MarketRegistry, PriceSnapshot) {
        let mut markets = MarketRegistry::new();
        markets
            .add_liquidity_tier(LiquidityTier {
                id: 0,
                name: "linear".to_string(),
                initial_margin_ppm: 200_000,
                maintenance_fraction_ppm: 500_000,
                base_position_notional: 1_000_000_000_000,
                impact_notional: 10_000_000_000,
            })
            .unwrap();
        markets
            .add_perpetual(Perpetual {
                id: 0,
                ticker: "BTC-USD".to_string(),
                market_id: 0,
                atomic_resolution: -8,
                liquidity_tier: 0,
                funding_index: 0,
            })
            .unwrap();
        let oracle = [MarketPrice {
            id: 0,
            price,
            exponent: -5,
        }]
        .into_iter()
        .collect();
        (markets, oracle)
    }

    fn carl(quote: i128) -> Subaccount {
        let mut sub = Subaccount::new(SubaccountId::new("carl", 0));
        sub.asset_positions.insert(QUOTE_ASSET_ID, quote);
        sub.perpetual_positions.insert(
            0,
            PerpetualPosition {
                quantums: -100_000_000,
                funding_index: 0,
            },
        );
        sub
    }

    #[test]
    fn test_full_close_of_short() {
        let (markets, oracle) = setup(5_000_000_000);
        let bq = bankruptcy_quote_quantums(&markets, &oracle, &carl(50_499_000_000), 0, 100_000_000).unwrap();
        assert_eq!(bq, -50_499_000_000);
    }

    #[test]
    fn test_quarter_slice_of_short() {
        let (markets, oracle) = setup(5_000_000_000);
        let bq = bankruptcy_quote_quantums(&markets, &oracle, &carl(50_499_000_000), 0, 25_000_000).unwrap();
        assert_eq!(bq, -12_624_750_000);
    }

    #[test]
    fn test_negative_collateral() {
        // Oracle 50,500: TNC = -1 USD
        let (markets, oracle) = setup(5_050_000_000);
        let bq = bankruptcy_quote_quantums(&markets, &oracle, &carl(50_499_000_000), 0, 100_000_000).unwrap();
        assert_eq!(bq, -50_499_000_000);
    }

    #[test]
    fn test_no_margin_requirement() {
        let (markets, oracle) = setup(5_000_000_000);
        let mut empty = Subaccount::new(SubaccountId::new("erin", 0));
        empty.asset_positions.insert(QUOTE_ASSET_ID, 1_000);
        let bq = bankruptcy_quote_quantums(&markets, &oracle, &empty, 0, -25_000_000).unwrap();
        assert_eq!(bq, 12_500_000_000);
    }
}
