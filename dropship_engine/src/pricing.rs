//! Margin-preserving price solver.
//!
//! Commission, acquiring and the client's target margin are all percentages of the *sale* price,
//! so with fixed costs `F` (purchase + logistics) the listing price solves
//! `P = F / (1 - c - a - m)`. When a product sits in a promotion and the client wants the margin
//! held, the listed (pre-discount) price is inflated to `P / (1 - d)` so that the post-discount
//! effective price still realizes the target.
//!
//! Everything here is pure and stateless; this module works in the marketplace listing-price
//! domain (roubles, f64). Persisting recommendations and pushing them upstream is the automation
//! loop's job.
use std::fmt::Display;

use thiserror::Error;

use crate::db_types::{PricingSettings, ProductSnapshot};

/// Below this the price solve divides by (effectively) zero or goes negative.
const MIN_DENOMINATOR: f64 = 0.0001;
/// Listing prices drifting less than this from the recommendation are left alone.
const PRICE_DRIFT_THRESHOLD_PERCENT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendedAction {
    NoChange,
    AdjustPrice,
    ExitPromotion,
    MaintainPromotion,
    WarningLowMargin,
}

impl Display for RecommendedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecommendedAction::NoChange => write!(f, "no_change"),
            RecommendedAction::AdjustPrice => write!(f, "adjust_price"),
            RecommendedAction::ExitPromotion => write!(f, "exit_promotion"),
            RecommendedAction::MaintainPromotion => write!(f, "maintain_promotion"),
            RecommendedAction::WarningLowMargin => write!(f, "warning_low_margin"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum PricingError {
    #[error("Pricing parameters are infeasible: commission + acquiring + margin leave a denominator of {denominator:.4}")]
    InfeasibleParameters { denominator: f64 },
    #[error("No purchase price available: estimate {estimate:.2} is outside the bounds [{min:.2}, {max:.2}]")]
    PurchasePriceOutOfBounds { estimate: f64, min: f64, max: f64 },
}

#[derive(Debug, Clone)]
pub struct PriceResult {
    pub purchase_price: f64,
    pub logistics_cost: f64,
    /// The required sale price with no promotion in play.
    pub target_price: f64,
    /// What to put on the card (pre-discount when a promotion is active).
    pub final_price: f64,
    /// What the customer actually pays after the promotion discount.
    pub effective_price: f64,
    pub commission_cost: f64,
    pub acquiring_cost: f64,
    /// Full cost at the effective price: fixed costs plus the percentage-of-sale costs.
    pub base_cost: f64,
    /// Realized margin at the effective price, in percent.
    pub actual_margin: f64,
    pub target_margin: f64,
    pub in_promotion: bool,
    pub promotion_discount: f64,
    pub recommended_action: RecommendedAction,
}

/// Purchase price for the solver: the cached cost when the product has one, otherwise a
/// bounds-checked estimate at `purchase_estimate_percent` of the current listing price.
pub fn resolve_purchase_price(product: &ProductSnapshot, settings: &PricingSettings) -> Result<f64, PricingError> {
    if let Some(known) = product.purchase_price {
        return Ok(known);
    }
    let estimate = product.current_price * settings.purchase_estimate_percent / 100.0;
    if estimate < settings.min_purchase_price || estimate > settings.max_purchase_price {
        return Err(PricingError::PurchasePriceOutOfBounds {
            estimate,
            min: settings.min_purchase_price,
            max: settings.max_purchase_price,
        });
    }
    Ok(estimate)
}

/// Volume-tiered logistics: the first liter at one tariff, every further liter at another, a
/// warehouse coefficient on top, and a flat handling fee. With no volume data only the handling
/// fee applies.
pub fn logistics_cost(product: &ProductSnapshot, settings: &PricingSettings) -> f64 {
    let volume = product.volume_liters.or_else(|| {
        match (product.length_cm, product.width_cm, product.height_cm) {
            (Some(l), Some(w), Some(h)) => Some(l * w * h / 1000.0),
            _ => None,
        }
    });
    let Some(volume) = volume else {
        return settings.shipment_handling;
    };
    let mut cost = settings.first_liter_logistics;
    if volume > 1.0 {
        cost += (volume - 1.0) * settings.additional_liter_logistics;
    }
    if settings.warehouse_coeff_percent > 0.0 {
        cost *= 1.0 + settings.warehouse_coeff_percent / 100.0;
    }
    cost += settings.shipment_handling;
    round2(cost)
}

pub fn calculate_optimal_price(
    product: &ProductSnapshot,
    settings: &PricingSettings,
) -> Result<PriceResult, PricingError> {
    let purchase_price = resolve_purchase_price(product, settings)?;
    let logistics = logistics_cost(product, settings);

    let c = product.commission_percent / 100.0;
    let a = settings.acquiring_percent / 100.0;
    let m = settings.markup_percent / 100.0;
    let denominator = 1.0 - c - a - m;
    if denominator <= MIN_DENOMINATOR {
        return Err(PricingError::InfeasibleParameters { denominator });
    }

    let fixed_cost = purchase_price + logistics;
    let required_sale_price = fixed_cost / denominator;

    let in_promotion = product.in_promotion;
    let discount = product.promotion_discount_percent;
    let discount_active = in_promotion && discount > 0.0;

    let final_price = if discount_active && settings.maintain_margin_in_promotions {
        // inflate the card price so the post-discount price recovers the target
        required_sale_price / (1.0 - discount / 100.0)
    } else {
        required_sale_price
    };
    let effective_price = if discount_active { final_price * (1.0 - discount / 100.0) } else { final_price };

    let commission_cost = effective_price * c;
    let acquiring_cost = effective_price * a;
    let base_cost = fixed_cost + commission_cost + acquiring_cost;
    let actual_margin = (effective_price - base_cost) / effective_price * 100.0;

    let recommended_action = if discount_active && !settings.maintain_margin_in_promotions {
        if actual_margin < settings.markup_percent * 0.5 {
            if settings.auto_exit_promotions {
                RecommendedAction::ExitPromotion
            } else {
                RecommendedAction::WarningLowMargin
            }
        } else {
            RecommendedAction::MaintainPromotion
        }
    } else {
        RecommendedAction::NoChange
    };

    Ok(PriceResult {
        purchase_price: round2(purchase_price),
        logistics_cost: logistics,
        target_price: round2(required_sale_price),
        final_price: round2(final_price),
        effective_price: round2(effective_price),
        commission_cost: round2(commission_cost),
        acquiring_cost: round2(acquiring_cost),
        base_cost: round2(base_cost),
        actual_margin: round2(actual_margin),
        target_margin: settings.markup_percent,
        in_promotion,
        promotion_discount: discount,
        recommended_action,
    })
}

/// Whether the listed price has drifted far enough from the recommendation (or an action demands
/// attention) to warrant an upstream push.
pub fn needs_update(product: &ProductSnapshot, result: &PriceResult) -> bool {
    if product.current_price <= 0.0 {
        return true;
    }
    let drift = (product.current_price - result.final_price).abs() / product.current_price * 100.0;
    drift > PRICE_DRIFT_THRESHOLD_PERCENT
        || matches!(result.recommended_action, RecommendedAction::ExitPromotion | RecommendedAction::AdjustPrice)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod test {
    use super::*;

    fn product(price: f64) -> ProductSnapshot {
        ProductSnapshot {
            id: 1,
            client_id: 1,
            external_id: 100,
            article: "ART-1".to_string(),
            name: "Товар".to_string(),
            current_price: price,
            purchase_price: None,
            commission_percent: 5.0,
            length_cm: None,
            width_cm: None,
            height_cm: None,
            volume_liters: None,
            in_promotion: false,
            promotion_discount_percent: 0.0,
            is_active: true,
        }
    }

    fn settings() -> PricingSettings {
        PricingSettings { markup_percent: 15.0, acquiring_percent: 2.0, ..Default::default() }
    }

    #[test]
    fn price_solve_recovers_the_target_margin() {
        let mut product = product(200.0);
        product.purchase_price = Some(100.0);
        // fix logistics at 20: no volume data, handling fee only
        let settings = PricingSettings { shipment_handling: 20.0, ..settings() };
        let result = calculate_optimal_price(&product, &settings).unwrap();
        // denom = 1 - 0.05 - 0.02 - 0.15 = 0.78; (100+20)/0.78 ≈ 153.85
        assert_eq!(result.logistics_cost, 20.0);
        assert!((result.final_price - 153.85).abs() < 0.01, "final price {}", result.final_price);
        assert!((result.actual_margin - 15.0).abs() < 0.05, "realized margin {}", result.actual_margin);
        assert_eq!(result.recommended_action, RecommendedAction::NoChange);
    }

    #[test]
    fn promotion_inflation_round_trips_the_margin() {
        let mut product = product(200.0);
        product.purchase_price = Some(100.0);
        product.in_promotion = true;
        product.promotion_discount_percent = 20.0;
        let settings =
            PricingSettings { shipment_handling: 20.0, maintain_margin_in_promotions: true, ..settings() };
        let result = calculate_optimal_price(&product, &settings).unwrap();
        // listed price 153.85 / 0.8 ≈ 192.31; effective price back at ≈ 153.85
        assert!((result.final_price - 192.31).abs() < 0.01, "final price {}", result.final_price);
        assert!((result.effective_price - 153.85).abs() < 0.01, "effective price {}", result.effective_price);
        assert!((result.actual_margin - 15.0).abs() < 0.05, "realized margin {}", result.actual_margin);
    }

    #[test]
    fn margin_erodes_when_not_maintained_and_actions_follow() {
        let mut p = product(200.0);
        p.purchase_price = Some(100.0);
        p.in_promotion = true;
        p.promotion_discount_percent = 20.0;
        let mut s = PricingSettings { shipment_handling: 20.0, maintain_margin_in_promotions: false, ..settings() };
        let eroded = calculate_optimal_price(&p, &s).unwrap();
        assert!(eroded.actual_margin < 15.0 * 0.5, "margin {} should be under half target", eroded.actual_margin);
        assert_eq!(eroded.recommended_action, RecommendedAction::WarningLowMargin);
        s.auto_exit_promotions = true;
        let exited = calculate_optimal_price(&p, &s).unwrap();
        assert_eq!(exited.recommended_action, RecommendedAction::ExitPromotion);
        // a mild discount keeps the promotion worthwhile
        p.promotion_discount_percent = 2.0;
        let kept = calculate_optimal_price(&p, &s).unwrap();
        assert_eq!(kept.recommended_action, RecommendedAction::MaintainPromotion);
    }

    #[test]
    fn infeasible_parameters_are_rejected() {
        let mut p = product(200.0);
        p.purchase_price = Some(100.0);
        p.commission_percent = 60.0;
        let s = PricingSettings { markup_percent: 35.0, acquiring_percent: 5.0, ..settings() };
        let err = calculate_optimal_price(&p, &s).unwrap_err();
        assert!(matches!(err, PricingError::InfeasibleParameters { .. }), "{err}");
    }

    #[test]
    fn purchase_estimate_is_bounds_checked() {
        let p = product(1000.0); // estimate 600 at the default 60%
        let s = PricingSettings { min_purchase_price: 100.0, max_purchase_price: 500.0, ..settings() };
        let err = calculate_optimal_price(&p, &s).unwrap_err();
        assert!(matches!(err, PricingError::PurchasePriceOutOfBounds { .. }), "{err}");
        let s = PricingSettings { min_purchase_price: 100.0, max_purchase_price: 800.0, ..settings() };
        let result = calculate_optimal_price(&p, &s).unwrap();
        assert_eq!(result.purchase_price, 600.0);
    }

    #[test]
    fn logistics_tiers_coefficient_and_handling() {
        let mut p = product(100.0);
        let s = PricingSettings {
            first_liter_logistics: 50.0,
            additional_liter_logistics: 10.0,
            warehouse_coeff_percent: 10.0,
            shipment_handling: 30.0,
            ..Default::default()
        };
        // no dimensions: handling fee only
        assert_eq!(logistics_cost(&p, &s), 30.0);
        // 3 liters: (50 + 2*10) * 1.1 + 30 = 107
        p.volume_liters = Some(3.0);
        assert_eq!(logistics_cost(&p, &s), 107.0);
        // dimensions fall back when the cached volume is absent: 10x10x20 cm = 2 l
        p.volume_liters = None;
        p.length_cm = Some(10.0);
        p.width_cm = Some(10.0);
        p.height_cm = Some(20.0);
        assert_eq!(logistics_cost(&p, &s), 96.0);
    }

    #[test]
    fn drift_threshold_gates_updates() {
        let mut p = product(153.9);
        p.purchase_price = Some(100.0);
        let s = PricingSettings { shipment_handling: 20.0, ..settings() };
        let result = calculate_optimal_price(&p, &s).unwrap();
        assert!(!needs_update(&p, &result), "0.03% drift should not trigger an update");
        p.current_price = 140.0;
        assert!(needs_update(&p, &result), "9% drift should trigger an update");
    }
}
