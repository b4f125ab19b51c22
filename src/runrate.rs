use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::calendar::{week_of_quarter, Quarter};
use crate::models::{Opportunity, RunratePoint, SeriesEnd};

/// Quarters kept on the run-rate chart, most recent last.
pub const RUNRATE_QUARTERS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    DownPayment,
    FinalPayment,
}

impl PaymentKind {
    pub fn title(&self) -> &'static str {
        match self {
            PaymentKind::DownPayment => "Down Payments",
            PaymentKind::FinalPayment => "Final Payments",
        }
    }

    fn event(&self, opportunity: &Opportunity) -> Option<(Quarter, u32)> {
        match self {
            PaymentKind::DownPayment => {
                Some((opportunity.dp_quarter?, opportunity.dp_week_of_quarter?))
            }
            PaymentKind::FinalPayment => {
                Some((opportunity.fp_quarter?, opportunity.fp_week_of_quarter?))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Runrate {
    pub kind: PaymentKind,
    pub current_quarter: Quarter,
    pub current_week: u32,
    pub points: Vec<RunratePoint>,
    pub series_ends: Vec<SeriesEnd>,
}

impl Runrate {
    /// Quarters on the chart, oldest first.
    pub fn quarters(&self) -> Vec<Quarter> {
        self.series_ends.iter().map(|end| end.quarter).collect()
    }

    pub fn value_at(&self, quarter: Quarter, week: u32) -> Option<u32> {
        self.points
            .iter()
            .find(|point| point.quarter == quarter && point.week_of_quarter == week)
            .map(|point| point.cumulative_count)
    }

    pub fn max_week(&self) -> u32 {
        self.points
            .iter()
            .map(|point| point.week_of_quarter)
            .max()
            .unwrap_or(0)
    }
}

/// Cumulative weekly event counts per quarter for the trailing quarters.
///
/// The quarter containing `today` is always a series, and its weeks after
/// today's week are left out so an unfinished quarter never shows a
/// completed curve.
pub fn build_runrate(opportunities: &[Opportunity], kind: PaymentKind, today: NaiveDate) -> Runrate {
    let current_quarter = Quarter::of(today);
    let current_week = week_of_quarter(today);

    let mut counts: BTreeMap<Quarter, BTreeMap<u32, u32>> = BTreeMap::new();
    for opportunity in opportunities {
        if let Some((quarter, week)) = kind.event(opportunity) {
            *counts.entry(quarter).or_default().entry(week).or_default() += 1;
        }
    }

    let max_week = counts
        .values()
        .flat_map(|weeks| weeks.keys().copied())
        .max()
        .unwrap_or(0)
        .max(current_week);
    counts.entry(current_quarter).or_default();

    let skip = counts.len().saturating_sub(RUNRATE_QUARTERS);
    let mut points = Vec::new();
    let mut series_ends = Vec::new();

    for (&quarter, weeks) in counts.iter().skip(skip) {
        let is_current = quarter == current_quarter;
        let mut cumulative = 0;
        let mut last = None;

        for week in 1..=max_week {
            cumulative += weeks.get(&week).copied().unwrap_or(0);
            if is_current && week > current_week {
                break;
            }
            points.push(RunratePoint {
                week_of_quarter: week,
                quarter,
                cumulative_count: cumulative,
                is_current,
            });
            last = Some((week, cumulative));
        }

        if let Some((week, cumulative)) = last {
            series_ends.push(SeriesEnd {
                quarter,
                week_of_quarter: week,
                cumulative_count: cumulative,
                is_current,
            });
        }
    }

    Runrate {
        kind,
        current_quarter,
        current_week,
        points,
        series_ends,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn down_payment_on(id: &str, when: NaiveDate) -> Opportunity {
        Opportunity::new(id, "Farm", "Owner", "Closed Won", "United States", when)
            .with_down_payment(Some(when))
    }

    fn quarter(y: i32, m: u32) -> Quarter {
        Quarter::of(date(y, m, 1))
    }

    #[test]
    fn curves_accumulate_and_never_decrease() {
        let opportunities = vec![
            down_payment_on("1", date(2024, 1, 2)),
            down_payment_on("2", date(2024, 1, 3)),
            down_payment_on("3", date(2024, 2, 10)),
            down_payment_on("4", date(2024, 3, 30)),
        ];
        let runrate = build_runrate(&opportunities, PaymentKind::DownPayment, date(2024, 8, 1));
        let q1 = quarter(2024, 1);

        assert_eq!(runrate.value_at(q1, 1), Some(2));
        assert_eq!(runrate.value_at(q1, 5), Some(2));
        assert_eq!(runrate.value_at(q1, 6), Some(3));
        assert_eq!(runrate.value_at(q1, 13), Some(4));

        let curve: Vec<u32> = runrate
            .points
            .iter()
            .filter(|point| point.quarter == q1)
            .map(|point| point.cumulative_count)
            .collect();
        assert!(curve.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn current_quarter_stops_at_todays_week() {
        let today = date(2024, 8, 1); // week 5 of 2024 Q3
        let opportunities = vec![
            down_payment_on("1", date(2024, 7, 2)),
            down_payment_on("2", date(2024, 4, 1)),
            down_payment_on("3", date(2024, 6, 28)),
        ];
        let runrate = build_runrate(&opportunities, PaymentKind::DownPayment, today);
        let current = quarter(2024, 7);

        assert_eq!(runrate.current_quarter, current);
        assert_eq!(runrate.current_week, 5);
        for week in 1..=runrate.max_week() {
            let value = runrate.value_at(current, week);
            if week <= 5 {
                assert_eq!(value, Some(1), "week {week} should be present");
            } else {
                assert_eq!(value, None, "week {week} should be masked");
            }
        }
        assert_eq!(runrate.value_at(quarter(2024, 4), 13), Some(2));
        assert!(runrate
            .points
            .iter()
            .all(|point| point.is_current == (point.quarter == current)));
    }

    #[test]
    fn quiet_current_quarter_still_gets_a_zero_curve() {
        let opportunities = vec![down_payment_on("1", date(2024, 2, 1))];
        let runrate = build_runrate(&opportunities, PaymentKind::DownPayment, date(2024, 5, 15));
        let current = quarter(2024, 4);

        assert_eq!(runrate.value_at(current, 1), Some(0));
        assert_eq!(runrate.value_at(current, runrate.current_week), Some(0));
        assert_eq!(runrate.value_at(current, runrate.current_week + 1), None);
    }

    #[test]
    fn keeps_only_the_latest_eight_quarters_in_calendar_order() {
        let mut opportunities = Vec::new();
        for year in [2022, 2023, 2024] {
            for month in [1, 4, 7, 10] {
                let id = format!("{year}-{month}");
                opportunities.push(down_payment_on(&id, date(year, month, 15)));
            }
        }
        let runrate = build_runrate(&opportunities, PaymentKind::DownPayment, date(2024, 12, 20));
        let labels: Vec<String> = runrate.quarters().iter().map(ToString::to_string).collect();

        assert_eq!(
            labels,
            [
                "2023 Q1", "2023 Q2", "2023 Q3", "2023 Q4", "2024 Q1", "2024 Q2", "2024 Q3",
                "2024 Q4"
            ]
        );
    }

    #[test]
    fn final_payments_use_their_own_dates() {
        let opportunities = vec![Opportunity::new("1", "Farm", "Owner", "Closed Won", "Chile", date(2023, 12, 1))
            .with_down_payment(Some(date(2023, 12, 5)))
            .with_final_payment(Some(date(2024, 1, 9)))];
        let runrate = build_runrate(&opportunities, PaymentKind::FinalPayment, date(2024, 6, 30));

        assert_eq!(runrate.value_at(quarter(2024, 1), 1), Some(0));
        assert_eq!(runrate.value_at(quarter(2024, 1), 2), Some(1));
        assert_eq!(runrate.value_at(quarter(2023, 10), 1), None);
    }

    #[test]
    fn series_ends_mark_the_last_plotted_week() {
        let opportunities = vec![
            down_payment_on("1", date(2024, 1, 3)),
            down_payment_on("2", date(2024, 7, 3)),
        ];
        let runrate = build_runrate(&opportunities, PaymentKind::DownPayment, date(2024, 7, 20));
        let ends: Vec<(String, u32, u32)> = runrate
            .series_ends
            .iter()
            .map(|end| (end.quarter.to_string(), end.week_of_quarter, end.cumulative_count))
            .collect();

        assert_eq!(
            ends,
            [("2024 Q1".to_string(), 3, 1), ("2024 Q3".to_string(), 3, 1)]
        );
    }
}
