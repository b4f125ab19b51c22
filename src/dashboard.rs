use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::funnel::{build_funnel, Funnel, PersonFilter, TerminalStages};
use crate::models::{Opportunity, ThroughputRow};
use crate::roster::Roster;
use crate::runrate::{build_runrate, PaymentKind, Runrate};
use crate::throughput::build_throughput;

/// Every table the dashboard shows, computed from one snapshot of the
/// opportunities and one value of `today`.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub today: NaiveDate,
    pub opportunity_count: usize,
    pub down_payment_runrate: Runrate,
    pub final_payment_runrate: Runrate,
    pub throughput: Vec<ThroughputRow>,
    pub funnel: Funnel,
}

impl Dashboard {
    pub fn compute(
        opportunities: &[Opportunity],
        roster: &Roster,
        today: NaiveDate,
        filter: &PersonFilter,
        terminal: &TerminalStages,
    ) -> Self {
        if let PersonFilter::Owner(name) = filter {
            if !roster.is_active_member(name) {
                warn!(person = %name, "selected person is not an active team member");
            }
        }

        let dashboard = Self {
            today,
            opportunity_count: opportunities.len(),
            down_payment_runrate: build_runrate(opportunities, PaymentKind::DownPayment, today),
            final_payment_runrate: build_runrate(opportunities, PaymentKind::FinalPayment, today),
            throughput: build_throughput(opportunities, roster, today),
            funnel: build_funnel(opportunities, filter, terminal, today),
        };

        info!(
            %today,
            opportunities = dashboard.opportunity_count,
            person = %dashboard.funnel.person,
            active = dashboard.funnel.active_opportunities.len(),
            "computed dashboard"
        );

        dashboard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TeamMember;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn one_pass_uses_a_single_today_everywhere() {
        let today = date(2024, 8, 1);
        let roster = Roster::new(vec![TeamMember::new("Sam Webster", date(2023, 1, 9), None)]);
        let opportunities = vec![
            Opportunity::new("1", "Farm", "Sam Webster", "Demo", "United States", date(2024, 6, 3))
                .with_down_payment(Some(date(2024, 7, 8))),
            Opportunity::new("2", "Farm", "Sam Webster", "Closed Won", "France", date(2024, 5, 3))
                .with_down_payment(Some(date(2024, 6, 8)))
                .with_final_payment(Some(date(2024, 7, 20))),
        ];

        let dashboard = Dashboard::compute(
            &opportunities,
            &roster,
            today,
            &PersonFilter::All,
            &TerminalStages::TrailingByVolume(1),
        );

        assert_eq!(dashboard.today, today);
        assert_eq!(dashboard.down_payment_runrate.current_week, 5);
        assert_eq!(dashboard.final_payment_runrate.current_quarter.to_string(), "2024 Q3");
        assert_eq!(dashboard.throughput.len(), 13);
        assert_eq!(dashboard.throughput.last().unwrap().month.to_string(), "Aug 2024");
        let july = &dashboard.throughput[11];
        assert_eq!((july.total, july.ramped_fte, july.dps_per_fte), (1, 1, Some(1.0)));
        assert_eq!(dashboard.funnel.person, "All");
    }

    #[test]
    fn empty_upload_still_produces_every_table() {
        let dashboard = Dashboard::compute(
            &[],
            &Roster::default(),
            date(2024, 2, 10),
            &PersonFilter::from_selection(Some("Nobody")),
            &TerminalStages::default(),
        );
        assert_eq!(dashboard.opportunity_count, 0);
        assert_eq!(dashboard.throughput.len(), 13);
        assert!(dashboard.funnel.stages.is_empty());
        assert!(dashboard.funnel.seasonality.is_empty());
        assert_eq!(dashboard.down_payment_runrate.quarters().len(), 1);
        assert!(dashboard
            .down_payment_runrate
            .points
            .iter()
            .all(|point| point.cumulative_count == 0));
    }

    #[test]
    fn serializes_labels_as_display_strings() {
        let dashboard = Dashboard::compute(
            &[],
            &Roster::default(),
            date(2024, 2, 10),
            &PersonFilter::All,
            &TerminalStages::default(),
        );
        let json = serde_json::to_value(&dashboard).unwrap();
        assert_eq!(json["today"], "2024-02-10");
        assert_eq!(json["throughput"][12]["month"], "Feb 2024");
        assert_eq!(json["throughput"][12]["dps_per_fte"], serde_json::Value::Null);
        assert_eq!(json["down_payment_runrate"]["current_quarter"], "2024 Q1");
        assert_eq!(json["down_payment_runrate"]["kind"], "down_payment");
    }
}
