use std::fmt::Write;

use chrono::NaiveDate;

use crate::dashboard::Dashboard;
use crate::funnel::Funnel;
use crate::models::{SeasonalityRow, TeamMember, ThroughputRow};
use crate::roster::{is_ramped_active, Roster};
use crate::runrate::Runrate;

pub fn render_markdown(dashboard: &Dashboard) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Sales Dashboard");
    let _ = writeln!(
        output,
        "Generated {} from {} opportunities",
        dashboard.today, dashboard.opportunity_count
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Run Rate");
    let _ = writeln!(output);
    output.push_str(&render_runrate(&dashboard.down_payment_runrate));
    let _ = writeln!(output);
    output.push_str(&render_runrate(&dashboard.final_payment_runrate));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Down Payments Per Ramped FTE Per Month");
    let _ = writeln!(output);
    output.push_str(&render_throughput(&dashboard.throughput));
    let _ = writeln!(output);
    output.push_str(&render_funnel(&dashboard.funnel));

    output
}

/// Week-by-quarter grid; cells past today's week in the current quarter are
/// left blank.
pub fn render_runrate(runrate: &Runrate) -> String {
    let mut output = String::new();
    let quarters = runrate.quarters();

    let _ = writeln!(output, "### {}", runrate.kind.title());
    if runrate.points.is_empty() {
        let _ = writeln!(output, "No payments recorded.");
        return output;
    }

    let _ = write!(output, "| Week |");
    for quarter in &quarters {
        if *quarter == runrate.current_quarter {
            let _ = write!(output, " {quarter} (current) |");
        } else {
            let _ = write!(output, " {quarter} |");
        }
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "|---|{}", "---|".repeat(quarters.len()));

    for week in 1..=runrate.max_week() {
        let _ = write!(output, "| {week} |");
        for quarter in &quarters {
            match runrate.value_at(*quarter, week) {
                Some(value) => {
                    let _ = write!(output, " {value} |");
                }
                None => output.push_str("  |"),
            }
        }
        let _ = writeln!(output);
    }

    output
}

pub fn render_throughput(rows: &[ThroughputRow]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "| Month | US | Intl | Total | Ramped FTE | DPs / FTE | Target |");
    let _ = writeln!(output, "|---|---|---|---|---|---|---|");
    for row in rows {
        let ratio = row
            .dps_per_fte
            .map(|value| format!("{value:.2}"))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} | {:.1} |",
            row.month, row.us, row.intl, row.total, row.ramped_fte, ratio, row.target
        );
    }

    output
}

pub fn render_funnel(funnel: &Funnel) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "## Funnel ({})", funnel.person);
    if funnel.stages.is_empty() {
        let _ = writeln!(output, "No open stages.");
    } else {
        for stage in &funnel.stages {
            match stage.share_of_total {
                Some(share) => {
                    let _ = writeln!(output, "- {}: {} ({share:.0}%)", stage.stage, stage.count);
                }
                None => {
                    let _ = writeln!(output, "- {}: {}", stage.stage, stage.count);
                }
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "## Active Opportunities ({})",
        funnel.active_opportunities.len()
    );
    if funnel.active_opportunities.is_empty() {
        let _ = writeln!(output, "No active opportunities.");
    } else {
        let _ = writeln!(output, "| Opportunity | Created | Stage | Owner | Country | Age (days) |");
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for row in &funnel.active_opportunities {
            let _ = writeln!(
                output,
                "| [{}]({}) | {} | {} | {} | {} | {} |",
                row.opportunity_name,
                row.link,
                row.created_display,
                row.stage,
                row.opportunity_owner,
                row.billing_country,
                row.age_days
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Seasonality");
    if funnel.seasonality.is_empty() {
        let _ = writeln!(output, "No opportunities created yet.");
        return output;
    }

    let _ = write!(output, "| Metric |");
    for row in &funnel.seasonality {
        let _ = write!(output, " {} |", row.month);
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "|---|{}", "---|".repeat(funnel.seasonality.len()));

    let metrics: [(&str, fn(&SeasonalityRow) -> u32); 3] = [
        ("Opportunities Created", |row| row.opportunities_created),
        ("Down Payments", |row| row.down_payments),
        ("Final Payments", |row| row.final_payments),
    ];
    for (name, value) in metrics {
        let _ = write!(output, "| {name} |");
        for row in &funnel.seasonality {
            let _ = write!(output, " {} |", value(row));
        }
        let _ = writeln!(output);
    }

    output
}

pub fn render_roster(roster: &Roster, as_of: NaiveDate) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "| Name | Start | End | Ramped | Ramped & Active ({as_of}) |");
    let _ = writeln!(output, "|---|---|---|---|---|");
    for member in roster.members() {
        let _ = writeln!(output, "{}", roster_line(member, as_of));
    }
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Ramped headcount: {}",
        roster.ramped_headcount(as_of)
    );

    output
}

fn roster_line(member: &TeamMember, as_of: NaiveDate) -> String {
    let end = member
        .end_date
        .map(|date| date.to_string())
        .unwrap_or_else(|| "-".to_string());
    let status = if is_ramped_active(member, as_of) { "yes" } else { "no" };
    format!(
        "| {} | {} | {} | {} | {} |",
        member.name, member.start_date, end, member.ramp_date, status
    )
}
