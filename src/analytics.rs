//! Conversion statistics and per-variant A/B results, aggregated from the
//! event store.

use std::collections::{BTreeMap, HashMap};

use futures::StreamExt;
use serde::Serialize;

use crate::engine::Flagship;
use crate::error::FlagshipError;
use crate::variant;

/// Impression/interaction counts with a rendered conversion rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureStats {
    pub impressions: u64,
    pub interactions: u64,
    pub conversion_rate: String,
}

impl FeatureStats {
    fn from_counts(impressions: u64, interactions: u64) -> Self {
        Self {
            impressions,
            interactions,
            conversion_rate: conversion_rate(interactions, impressions),
        }
    }
}

/// `round(interactions / impressions * 100, 2)` as a percentage string.
/// Integer rates render without decimals ("70%"), fractional rates keep up
/// to two ("33.33%"). Zero impressions is "0%", never a division by zero.
fn conversion_rate(interactions: u64, impressions: u64) -> String {
    if impressions == 0 {
        return "0%".to_string();
    }
    let rate = interactions as f64 / impressions as f64 * 100.0;
    let rounded = (rate * 100.0).round() / 100.0;
    if rounded == rounded.trunc() {
        format!("{}%", rounded as u64)
    } else {
        let text = format!("{:.2}", rounded);
        format!("{}%", text.trim_end_matches('0'))
    }
}

impl Flagship {
    /// Aggregate conversion statistics for one flag. Streams the event log;
    /// memory use is constant in the number of events.
    pub async fn feature_stats(&self, flag: &str) -> FeatureStats {
        let mut impressions: u64 = 0;
        let mut interactions: u64 = 0;
        let mut events = self.events.by_flag(flag).await;
        while let Some(event) = events.next().await {
            if event.is_impression() {
                impressions += 1;
            } else {
                interactions += 1;
            }
        }
        FeatureStats::from_counts(impressions, interactions)
    }

    /// Per-variant A/B results for one test flag.
    ///
    /// Each distinct user counts at most one impression and one interaction,
    /// attributed to the variant the user hashes to under the flag's
    /// *current* weights. Attribution is re-derived at report time, so
    /// reweighting variants after events were recorded changes historical
    /// results; that matches how assignments are produced and is deliberate.
    /// Users whose bucket falls outside the configured weights are skipped.
    pub async fn ab_test_results(
        &self,
        test: &str,
    ) -> Result<BTreeMap<String, FeatureStats>, FlagshipError> {
        let flag = self.flags.find(test).await?;
        let variants = flag
            .and_then(|f| f.variants)
            .filter(|v| !v.is_empty())
            .ok_or(FlagshipError::NoSuchTest)?;

        // (saw impression, saw interaction) per distinct user
        let mut seen: HashMap<String, (bool, bool)> = HashMap::new();
        let mut events = self.events.by_flag(test).await;
        while let Some(event) = events.next().await {
            let entry = seen.entry(event.user_id.clone()).or_default();
            if event.is_impression() {
                entry.0 = true;
            } else {
                entry.1 = true;
            }
        }

        let mut counts: BTreeMap<&str, (u64, u64)> = variants
            .iter()
            .map(|v| (v.name.as_str(), (0, 0)))
            .collect();
        for (user_id, (viewed, interacted)) in &seen {
            let Some(assigned) = variant::assign(test, user_id, &variants) else {
                continue;
            };
            if let Some(tally) = counts.get_mut(assigned) {
                if *viewed {
                    tally.0 += 1;
                }
                if *interacted {
                    tally.1 += 1;
                }
            }
        }

        Ok(counts
            .into_iter()
            .map(|(name, (impressions, interactions))| {
                (
                    name.to_string(),
                    FeatureStats::from_counts(impressions, interactions),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_impressions_is_zero_percent() {
        assert_eq!(conversion_rate(0, 0), "0%");
        assert_eq!(conversion_rate(5, 0), "0%");
    }

    #[test]
    fn integer_rates_render_without_decimals() {
        assert_eq!(conversion_rate(7, 10), "70%");
        assert_eq!(conversion_rate(10, 10), "100%");
        assert_eq!(conversion_rate(3, 2), "150%");
    }

    #[test]
    fn fractional_rates_round_to_two_places() {
        assert_eq!(conversion_rate(1, 3), "33.33%");
        assert_eq!(conversion_rate(2, 3), "66.67%");
        assert_eq!(conversion_rate(1, 8), "12.5%");
    }
}
