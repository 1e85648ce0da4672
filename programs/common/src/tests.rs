//! Unit tests for common types, config and math

#[cfg(test)]
mod type_tests {
    use crate::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_subaccount_id_ordering() {
        let ids: BTreeSet<SubaccountId> = [
            SubaccountId::new("dave", 1),
            SubaccountId::new("carl", 0),
            SubaccountId::new("dave", 0),
            SubaccountId::new("alice", 7),
        ]
        .into_iter()
        .collect();

        let ordered: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        assert_eq!(ordered, vec!["alice/7", "carl/0", "dave/0", "dave/1"]);
    }

    #[test]
    fn test_subaccount_id_parse() {
        let id: SubaccountId = "perp1abc/3".parse().unwrap();
        assert_eq!(id, SubaccountId::new("perp1abc", 3));
        assert!("nobody".parse::<SubaccountId>().is_err());
        assert!("/3".parse::<SubaccountId>().is_err());
    }

    #[test]
    fn test_side_helpers() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::closing(5), Side::Sell);
        assert_eq!(Side::closing(-5), Side::Buy);
        assert_eq!(Side::Sell.signed(10), -10);
    }

    #[test]
    fn test_order_crossing() {
        let ask = Order {
            order_id: 1,
            subaccount_id: SubaccountId::new("dave", 0),
            clob_pair_id: 0,
            side: Side::Sell,
            quantums: 100,
            subticks: 50_000,
            good_til_block: 10,
            time_in_force: TimeInForce::GoodTilBlock,
        };
        assert!(ask.crosses(Side::Buy, 50_000));
        assert!(!ask.crosses(Side::Buy, 49_999));
        assert!(!ask.is_expired(10));
        assert!(ask.is_expired(11));
    }

    #[test]
    fn test_clob_pair_status_parse() {
        assert_eq!("cancel-only".parse::<ClobPairStatus>().unwrap(), ClobPairStatus::CancelOnly);
        assert_eq!(ClobPairStatus::PostOnly.to_string(), "post_only");
        assert!("halted".parse::<ClobPairStatus>().is_err());
    }

    #[test]
    fn test_subaccount_json_shape() {
        let json = r#"{
            "id": { "owner": "carl", "number": 0 },
            "asset_positions": { "0": 50499000000 },
            "perpetual_positions": { "0": { "quantums": -100000000 } }
        }"#;
        let sub: Subaccount = serde_json::from_str(json).unwrap();
        assert_eq!(sub.quote_balance(), 50_499_000_000);
        assert_eq!(sub.position_quantums(0), -100_000_000);
        assert_eq!(sub.perpetual_positions[&0].funding_index, 0);
    }
}

#[cfg(test)]
mod config_tests {
    use crate::*;

    fn tier() -> LiquidityTier {
        LiquidityTier {
            id: 0,
            name: "Large-Cap".to_string(),
            initial_margin_ppm: 200_000,
            maintenance_fraction_ppm: 500_000,
            base_position_notional: 1_000_000_000_000,
            impact_notional: 10_000_000_000,
        }
    }

    #[test]
    fn test_liquidity_tier_validation() {
        assert!(tier().validate().is_ok());

        let mut bad = tier();
        bad.initial_margin_ppm = 1_000_001;
        assert!(bad.validate().unwrap_err().is_fatal());

        let mut bad = tier();
        bad.base_position_notional = 0;
        assert!(bad.validate().is_err());

        let mut bad = tier();
        bad.impact_notional = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_liquidations_config_validation() {
        assert!(LiquidationsConfig::standard().validate().is_ok());

        let mut cfg = LiquidationsConfig::standard();
        cfg.fillable_price_config.bankruptcy_adjustment_ppm = u32::MAX;
        assert!(cfg.validate().is_ok());

        cfg.fillable_price_config.bankruptcy_adjustment_ppm = 999_999;
        assert!(cfg.validate().is_err());

        let mut cfg = LiquidationsConfig::standard();
        cfg.position_block_limits.max_position_portion_liquidated_ppm = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = LiquidationsConfig::standard();
        cfg.max_liquidation_fee_ppm = 2_000_000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_config_defaults_from_partial_json() {
        let cfg: LiquidationsConfig =
            serde_json::from_str(r#"{ "max_liquidation_fee_ppm": 5000 }"#).unwrap();
        assert_eq!(cfg, LiquidationsConfig::standard());
    }
}

#[cfg(test)]
mod error_tests {
    use crate::*;

    #[test]
    fn test_error_severity() {
        assert_eq!(PerpliqError::ClobPairNotFound(3).severity(), Severity::Fatal);
        assert_eq!(PerpliqError::Overflow.severity(), Severity::Fatal);
        assert_eq!(
            PerpliqError::InsuranceLossLimitReached.severity(),
            Severity::Recoverable
        );
        let unauthorized = PerpliqError::InvalidAuthority {
            expected: "gov".to_string(),
            got: "mallory".to_string(),
        };
        assert_eq!(unauthorized.severity(), Severity::Unauthorized);
    }

    #[test]
    fn test_error_messages_and_codes() {
        assert_eq!(
            PerpliqError::ClobPairNotFound(7).to_string(),
            "ClobPair with id 7 not found"
        );
        assert_eq!(PerpliqError::ClobPairNotFound(7).code(), 200);
        assert_eq!(u64::from(PerpliqError::InsufficientLiquidity), 400);
    }
}

#[cfg(test)]
mod math_props {
    use crate::math::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn isqrt_is_floor_root(n in 0u128..(1u128 << 100)) {
            let r = isqrt(n);
            prop_assert!(r * r <= n);
            prop_assert!((r + 1) * (r + 1) > n);
        }

        #[test]
        fn tick_rounding_brackets_value(subticks in 1u64..u64::MAX / 2, tick in 1u64..1_000_000) {
            let down = round_down_to_tick(subticks, tick);
            let up = round_up_to_tick(subticks, tick);
            prop_assert!(down <= subticks && subticks <= up);
            prop_assert_eq!(down % tick, 0);
            prop_assert_eq!(up % tick, 0);
            prop_assert!(up - down <= tick);
        }

        #[test]
        fn signed_division_brackets(n in -1_000_000_000i128..1_000_000_000, d in 1i128..100_000) {
            let f = div_floor_i128(n, d);
            let c = div_ceil_i128(n, d);
            prop_assert!(f * d <= n);
            prop_assert!(c * d >= n);
            prop_assert!(c - f <= 1);
        }
    }
}
