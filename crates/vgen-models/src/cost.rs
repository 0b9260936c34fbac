//! Generation cost estimation.
//!
//! Cost is linear in duration and in video count:
//! `total_cost(p, d, n) == estimate(p, d) * max(1, n)`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::provider::ProviderDescriptor;

/// Estimated cost of one video of `duration_secs` seconds.
pub fn estimate(provider: &ProviderDescriptor, duration_secs: u32) -> f64 {
    provider.cost_per_second() * duration_secs as f64
}

/// Estimated cost of a whole request.
pub fn total_cost(provider: &ProviderDescriptor, duration_secs: u32, video_count: u32) -> f64 {
    estimate(provider, duration_secs) * video_count.max(1) as f64
}

/// Format a USD amount the way it is shown to users, e.g. `$1.50`.
pub fn format_usd(amount: f64) -> String {
    format!("${:.2}", amount)
}

/// Cost figures for a form, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CostEstimate {
    pub per_video: f64,
    pub total: f64,
    pub video_count: u32,
    pub duration: u32,
    /// Formatted total, e.g. `$6.00`
    pub formatted: String,
    /// True when the provider has no per-second pricing.
    pub free: bool,
}

impl CostEstimate {
    pub fn new(provider: &ProviderDescriptor, duration_secs: u32, video_count: u32) -> Self {
        let video_count = video_count.max(1);
        let total = total_cost(provider, duration_secs, video_count);
        Self {
            per_video: estimate(provider, duration_secs),
            total,
            video_count,
            duration: duration_secs,
            formatted: format_usd(total),
            free: provider.pricing.cost_per_second.is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderCatalog;

    #[test]
    fn test_estimate_per_second() {
        let catalog = ProviderCatalog::builtin();
        let veo = catalog.get("veo3").unwrap();
        assert!((estimate(veo, 8) - 6.0).abs() < 1e-9);

        let runway = catalog.get("runway-gen4").unwrap();
        assert!((estimate(runway, 10) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_total_is_linear_in_count() {
        let catalog = ProviderCatalog::builtin();
        for provider in catalog.iter() {
            for d in [0, 1, 5, 8, 10] {
                for n in 1..=5 {
                    let lhs = estimate(provider, d) * n as f64;
                    let rhs = total_cost(provider, d, n);
                    assert!((lhs - rhs).abs() < 1e-9, "{} d={} n={}", provider.id, d, n);
                }
            }
        }
    }

    #[test]
    fn test_zero_count_costs_one_video() {
        let catalog = ProviderCatalog::builtin();
        let veo = catalog.get("veo3").unwrap();
        assert_eq!(total_cost(veo, 8, 0), total_cost(veo, 8, 1));
    }

    #[test]
    fn test_missing_pricing_is_free() {
        let catalog = ProviderCatalog::builtin();
        let ltx = catalog.get("ltx-video").unwrap();
        let est = CostEstimate::new(ltx, 10, 2);
        assert_eq!(est.total, 0.0);
        assert!(est.free);
        assert_eq!(est.formatted, "$0.00");
    }

    #[test]
    fn test_cost_estimate_view() {
        let catalog = ProviderCatalog::builtin();
        let veo = catalog.get("veo3").unwrap();
        let est = CostEstimate::new(veo, 8, 4);
        assert_eq!(est.video_count, 4);
        assert_eq!(est.formatted, "$24.00");
        assert!(!est.free);
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(1.5), "$1.50");
        assert_eq!(format_usd(0.0), "$0.00");
        assert_eq!(format_usd(12.346), "$12.35");
    }
}
