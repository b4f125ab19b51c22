use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::calendar::MonthLabel;
use crate::models::{ActiveOpportunity, Opportunity, SeasonalityRow, StageCount};

/// Most recent months kept in the seasonality table.
pub const SEASONALITY_MONTHS: usize = 18;

pub const OPPORTUNITY_LINK_BASE: &str =
    "https://carbonrobotics.lightning.force.com/lightning/r/Opportunity";

/// Closed stages when none are named: the two highest-volume stages.
pub const DEFAULT_TRAILING_TERMINAL_STAGES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonFilter {
    All,
    Owner(String),
}

impl PersonFilter {
    /// `None` and any casing of "all" select everyone.
    pub fn from_selection(selection: Option<&str>) -> Self {
        match selection.map(str::trim) {
            None => PersonFilter::All,
            Some(name) if name.is_empty() || name.eq_ignore_ascii_case("all") => PersonFilter::All,
            Some(name) => PersonFilter::Owner(name.to_string()),
        }
    }

    pub fn matches(&self, opportunity: &Opportunity) -> bool {
        match self {
            PersonFilter::All => true,
            PersonFilter::Owner(name) => opportunity.opportunity_owner == *name,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            PersonFilter::All => "All",
            PersonFilter::Owner(name) => name.as_str(),
        }
    }
}

/// Which stages count as closed and are left out of the active funnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalStages {
    /// The last `n` stages of the baseline ordering (ascending by volume).
    TrailingByVolume(usize),
    Named(BTreeSet<String>),
}

impl Default for TerminalStages {
    fn default() -> Self {
        TerminalStages::TrailingByVolume(DEFAULT_TRAILING_TERMINAL_STAGES)
    }
}

impl TerminalStages {
    pub fn named<I, S>(stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TerminalStages::Named(stages.into_iter().map(Into::into).collect())
    }

    fn open_stages(&self, baseline: &[(String, u32)]) -> Vec<String> {
        match self {
            TerminalStages::TrailingByVolume(n) => baseline
                .iter()
                .take(baseline.len().saturating_sub(*n))
                .map(|(stage, _)| stage.clone())
                .collect(),
            TerminalStages::Named(closed) => baseline
                .iter()
                .filter(|(stage, _)| !closed.contains(stage))
                .map(|(stage, _)| stage.clone())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Funnel {
    pub person: String,
    pub stages: Vec<StageCount>,
    pub active_opportunities: Vec<ActiveOpportunity>,
    pub seasonality: Vec<SeasonalityRow>,
}

/// Stage volumes across every opportunity, lowest first. Ties break on the
/// stage name so the ordering is stable between passes.
pub fn baseline_stage_order(opportunities: &[Opportunity]) -> Vec<(String, u32)> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for opportunity in opportunities {
        // A blank stage is missing data, not a stage.
        let stage = opportunity.stage.trim();
        if stage.is_empty() {
            continue;
        }
        *counts.entry(stage).or_default() += 1;
    }

    let mut ordered: Vec<(String, u32)> = counts
        .into_iter()
        .map(|(stage, count)| (stage.to_string(), count))
        .collect();
    ordered.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    ordered
}

pub fn opportunity_link(opportunity_id: &str) -> String {
    format!("{OPPORTUNITY_LINK_BASE}/{opportunity_id}/view")
}

pub fn build_funnel(
    opportunities: &[Opportunity],
    filter: &PersonFilter,
    terminal: &TerminalStages,
    today: NaiveDate,
) -> Funnel {
    let baseline = baseline_stage_order(opportunities);
    let open_stages = terminal.open_stages(&baseline);
    let selected: Vec<&Opportunity> = opportunities
        .iter()
        .filter(|opportunity| filter.matches(opportunity))
        .collect();

    Funnel {
        person: filter.label().to_string(),
        stages: stage_counts(&selected, &open_stages),
        active_opportunities: active_opportunities(&selected, &open_stages, today),
        seasonality: seasonality(opportunities, &selected),
    }
}

fn stage_counts(selected: &[&Opportunity], open_stages: &[String]) -> Vec<StageCount> {
    let counts: Vec<u32> = open_stages
        .iter()
        .map(|stage| {
            selected
                .iter()
                .filter(|opportunity| opportunity.stage == *stage)
                .count() as u32
        })
        .collect();
    let total: u32 = counts.iter().sum();

    open_stages
        .iter()
        .zip(counts)
        .map(|(stage, count)| StageCount {
            stage: stage.clone(),
            count,
            share_of_total: if total == 0 {
                None
            } else {
                Some(f64::from(count) * 100.0 / f64::from(total))
            },
        })
        .collect()
}

fn active_opportunities(
    selected: &[&Opportunity],
    open_stages: &[String],
    today: NaiveDate,
) -> Vec<ActiveOpportunity> {
    let rank: HashMap<&str, usize> = open_stages
        .iter()
        .enumerate()
        .map(|(position, stage)| (stage.as_str(), position))
        .collect();

    let mut rows: Vec<(usize, ActiveOpportunity)> = selected
        .iter()
        .filter_map(|opportunity| {
            let position = *rank.get(opportunity.stage.as_str())?;
            Some((
                position,
                ActiveOpportunity {
                    opportunity_name: opportunity.opportunity_name.clone(),
                    link: opportunity_link(&opportunity.opportunity_id),
                    created_date: opportunity.created_date,
                    created_display: opportunity.created_date.format("%b %d, %Y").to_string(),
                    stage: opportunity.stage.clone(),
                    opportunity_owner: opportunity.opportunity_owner.clone(),
                    billing_country: opportunity.billing_country.clone(),
                    age_days: (today - opportunity.created_date).num_days(),
                },
            ))
        })
        .collect();

    rows.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.age_days.cmp(&a.1.age_days)));
    rows.into_iter().map(|(_, row)| row).collect()
}

/// Monthly created / down payment / final payment counts for the selection,
/// laid on the created months seen across the whole dataset.
fn seasonality(all: &[Opportunity], selected: &[&Opportunity]) -> Vec<SeasonalityRow> {
    let months: BTreeSet<MonthLabel> = all.iter().map(|opportunity| opportunity.created_month).collect();

    let mut created: HashMap<MonthLabel, u32> = HashMap::new();
    let mut down_payments: HashMap<MonthLabel, u32> = HashMap::new();
    let mut final_payments: HashMap<MonthLabel, u32> = HashMap::new();
    for opportunity in selected {
        *created.entry(opportunity.created_month).or_default() += 1;
        if let Some(month) = opportunity.dp_month {
            *down_payments.entry(month).or_default() += 1;
        }
        if let Some(month) = opportunity.fp_month {
            *final_payments.entry(month).or_default() += 1;
        }
    }

    let skip = months.len().saturating_sub(SEASONALITY_MONTHS);
    months
        .into_iter()
        .skip(skip)
        .map(|month| SeasonalityRow {
            month,
            opportunities_created: created.get(&month).copied().unwrap_or(0),
            down_payments: down_payments.get(&month).copied().unwrap_or(0),
            final_payments: final_payments.get(&month).copied().unwrap_or(0),
        })
        .collect()
}
