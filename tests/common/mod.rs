//! Common test utilities for integration tests
//!
//! Builds exchange states from genesis documents: a BTC perpetual on a 20% /
//! 10% liquidity tier at $50,000, and the Carl / Dave subaccounts used across
//! the liquidation scenarios.

#![allow(dead_code)]

use perpliq::common::*;
use perpliq::engine::*;

// ============================================================================
// MARKETS
// ============================================================================

pub const BTC_PERPETUAL_ID: u32 = 0;
pub const BTC_CLOB_PAIR_ID: u32 = 0;
pub const BTC_MARKET_ID: u32 = 0;
pub const LINEAR_TIER_ID: u32 = 3;

/// 1 BTC in base quantums
pub const ONE_BTC: i128 = 100_000_000;

pub const GOVERNANCE: &str = "gov";

/// $ price of one BTC as an oracle price with exponent -5
pub fn btc_price(dollars: u64) -> MarketPrice {
    MarketPrice {
        id: BTC_MARKET_ID,
        price: dollars * 100_000,
        exponent: -5,
    }
}

/// $ price of one BTC in subticks of the BTC clob pair
pub fn subticks(dollars: u64) -> u64 {
    dollars * 1_000_000
}

/// 20% initial, 10% maintenance, linear up to $1,000,000
pub fn linear_tier() -> LiquidityTier {
    LiquidityTier {
        id: LINEAR_TIER_ID,
        name: "3".to_string(),
        initial_margin_ppm: 200_000,
        maintenance_fraction_ppm: 500_000,
        base_position_notional: 1_000_000_000_000,
        impact_notional: 2_500_000_000,
    }
}

/// Same fractions, scaling above $12,500
pub fn non_linear_tier() -> LiquidityTier {
    LiquidityTier {
        base_position_notional: 12_500_000_000,
        ..linear_tier()
    }
}

pub fn btc_perpetual() -> Perpetual {
    Perpetual {
        id: BTC_PERPETUAL_ID,
        ticker: "BTC-USD".to_string(),
        market_id: BTC_MARKET_ID,
        atomic_resolution: -8,
        liquidity_tier: LINEAR_TIER_ID,
        funding_index: 0,
    }
}

pub fn btc_clob_pair() -> ClobPair {
    ClobPair {
        id: BTC_CLOB_PAIR_ID,
        perpetual_id: BTC_PERPETUAL_ID,
        step_base_quantums: 5,
        subticks_per_tick: 5,
        quantum_conversion_exponent: -8,
        status: ClobPairStatus::Active,
    }
}

/// Fillable price reaches the full maintenance margin, no block limits
pub fn max_smmr_config() -> LiquidationsConfig {
    LiquidationsConfig {
        max_liquidation_fee_ppm: 5_000,
        fillable_price_config: FillablePriceConfig {
            bankruptcy_adjustment_ppm: 1_000_000,
            spread_to_maintenance_margin_ratio_ppm: 1_000_000,
        },
        position_block_limits: PositionBlockLimits {
            min_position_notional_liquidated: 1_000,
            max_position_portion_liquidated_ppm: 1_000_000,
        },
        subaccount_block_limits: SubaccountBlockLimits {
            max_notional_liquidated: u64::MAX,
            max_quantums_insurance_lost: u64::MAX,
        },
        max_insurance_fund_quantums_for_deleveraging: 0,
    }
}

// ============================================================================
// SUBACCOUNTS
// ============================================================================

pub fn carl() -> SubaccountId {
    SubaccountId::new("carl", 0)
}

pub fn dave() -> SubaccountId {
    SubaccountId::new("dave", 0)
}

pub fn dave_1() -> SubaccountId {
    SubaccountId::new("dave", 1)
}

pub fn subaccount(id: SubaccountId, quote: i128, btc_quantums: i128) -> Subaccount {
    let mut s = Subaccount::new(id);
    if quote != 0 {
        s.asset_positions.insert(QUOTE_ASSET_ID, quote);
    }
    if btc_quantums != 0 {
        s.perpetual_positions.insert(
            BTC_PERPETUAL_ID,
            PerpetualPosition {
                quantums: btc_quantums,
                funding_index: 0,
            },
        );
    }
    s
}

pub fn carl_1btc_short_50499() -> Subaccount {
    subaccount(carl(), 50_499_000_000, -ONE_BTC)
}

pub fn carl_1btc_short_49999() -> Subaccount {
    subaccount(carl(), 49_999_000_000, -ONE_BTC)
}

pub fn dave_1btc_long_50000() -> Subaccount {
    subaccount(dave(), 50_000_000_000, ONE_BTC)
}

/// Long 1 BTC against a $50,000 debt: zero equity at $50,000
pub fn dave_1btc_long_50000_short() -> Subaccount {
    subaccount(dave(), -50_000_000_000, ONE_BTC)
}

pub fn dave_1_long(btc_quantums: i128) -> Subaccount {
    subaccount(dave_1(), 50_000_000_000, btc_quantums)
}

// ============================================================================
// ORDERS
// ============================================================================

pub fn order(owner: SubaccountId, side: Side, btc_quantums: u64, dollars: u64, good_til_block: u32) -> Order {
    Order {
        order_id: 0,
        subaccount_id: owner,
        clob_pair_id: BTC_CLOB_PAIR_ID,
        side,
        quantums: btc_quantums,
        subticks: subticks(dollars),
        good_til_block,
        time_in_force: TimeInForce::GoodTilBlock,
    }
}

// ============================================================================
// SCENARIO BUILDER
// ============================================================================

/// Genesis for one scenario at block 2
pub struct Scenario {
    pub genesis: GenesisState,
}

impl Scenario {
    pub fn new(subaccounts: Vec<Subaccount>) -> Self {
        Self {
            genesis: GenesisState {
                block_height: 2,
                authority: GOVERNANCE.to_string(),
                liquidations_config: max_smmr_config(),
                liquidity_tiers: vec![linear_tier()],
                perpetuals: vec![btc_perpetual()],
                market_prices: vec![btc_price(50_000)],
                clob_pairs: vec![btc_clob_pair()],
                orders: Vec::new(),
                subaccounts,
                insurance_fund_balance: 0,
            },
        }
    }

    pub fn orders(mut self, orders: Vec<Order>) -> Self {
        self.genesis.orders = orders;
        self
    }

    pub fn oracle(mut self, dollars: u64) -> Self {
        self.genesis.market_prices = vec![btc_price(dollars)];
        self
    }

    pub fn tiers(mut self, tiers: Vec<LiquidityTier>) -> Self {
        self.genesis.liquidity_tiers = tiers;
        self
    }

    pub fn config(mut self, config: LiquidationsConfig) -> Self {
        self.genesis.liquidations_config = config;
        self
    }

    pub fn insurance(mut self, balance: u128) -> Self {
        self.genesis.insurance_fund_balance = balance;
        self
    }

    pub fn build(self) -> ExchangeState {
        ExchangeState::from_genesis(self.genesis).expect("valid genesis")
    }

    /// Build the state and run one liquidation pass over `ids`
    pub fn liquidate(self, ids: &[SubaccountId]) -> (ExchangeState, LiquidationReport) {
        let mut state = self.build();
        let report = process_liquidate_subaccounts(&mut state, ids).expect("liquidation pass");
        (state, report)
    }
}

/// Current state of a subaccount, which must exist
pub fn get(state: &ExchangeState, id: &SubaccountId) -> Subaccount {
    state.ledger.get(id).cloned().expect("subaccount exists")
}

/// The liquidation of `id`, which must have been worked
pub fn liquidation<'a>(report: &'a LiquidationReport, id: &SubaccountId) -> &'a AccountLiquidation {
    match report.outcome(id) {
        Some(AccountOutcome::Liquidated(l)) => l,
        other => panic!("{} was not liquidated: {:?}", id, other),
    }
}

/// The only worked position of a liquidated subaccount
pub fn btc_liquidation<'a>(report: &'a LiquidationReport, id: &SubaccountId) -> &'a PositionLiquidation {
    let l = liquidation(report, id);
    assert_eq!(l.positions.len(), 1);
    &l.positions[0]
}
