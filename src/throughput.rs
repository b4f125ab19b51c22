use std::collections::HashMap;

use chrono::NaiveDate;

use crate::calendar::{month_buckets, MonthLabel};
use crate::models::{Opportunity, Region, ThroughputRow};
use crate::roster::Roster;

/// Down payments per ramped rep per month the team is expected to hit.
pub const DPS_PER_FTE_TARGET: f64 = 0.5;

/// Monthly down payments by region over the trailing month buckets, set
/// against how many ramped reps were on the team at the start of each month.
pub fn build_throughput(
    opportunities: &[Opportunity],
    roster: &Roster,
    today: NaiveDate,
) -> Vec<ThroughputRow> {
    let mut counts: HashMap<(MonthLabel, Region), u32> = HashMap::new();
    for opportunity in opportunities {
        if let Some(month) = opportunity.dp_month {
            *counts.entry((month, opportunity.region)).or_default() += 1;
        }
    }

    month_buckets(today)
        .into_iter()
        .map(|bucket| {
            let us = counts.get(&(bucket.label, Region::Us)).copied().unwrap_or(0);
            let intl = counts.get(&(bucket.label, Region::Intl)).copied().unwrap_or(0);
            let total = us + intl;
            let ramped_fte = roster.ramped_headcount(bucket.start);

            ThroughputRow {
                month: bucket.label,
                month_start: bucket.start,
                us,
                intl,
                total,
                ramped_fte,
                dps_per_fte: per_fte(total, ramped_fte),
                target: DPS_PER_FTE_TARGET,
            }
        })
        .collect()
}

/// `None` when nobody was ramped; the chart shows a gap for that month.
pub fn per_fte(total: u32, ramped_fte: u32) -> Option<f64> {
    if ramped_fte == 0 {
        None
    } else {
        Some(f64::from(total) / f64::from(ramped_fte))
    }
}
