use chrono::NaiveDate;
use serde::Serialize;

use crate::calendar::{month_of, quarter_of, week_of, MonthLabel, Quarter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Us,
    Intl,
}

impl Region {
    pub fn from_country(country: &str) -> Self {
        if country.trim() == "United States" {
            Region::Us
        } else {
            Region::Intl
        }
    }
}

/// Canonical opportunity record. Derived calendar fields are filled by the
/// loader and never recomputed downstream.
#[derive(Debug, Clone, Serialize)]
pub struct Opportunity {
    pub opportunity_id: String,
    pub opportunity_name: String,
    pub opportunity_owner: String,
    pub stage: String,
    pub billing_country: String,
    pub created_date: NaiveDate,
    pub verified_down_payment_date: Option<NaiveDate>,
    pub verified_final_payment_date: Option<NaiveDate>,
    pub close_date: Option<NaiveDate>,
    pub region: Region,
    pub created_month: MonthLabel,
    pub dp_month: Option<MonthLabel>,
    pub dp_quarter: Option<Quarter>,
    pub dp_week_of_quarter: Option<u32>,
    pub fp_month: Option<MonthLabel>,
    pub fp_quarter: Option<Quarter>,
    pub fp_week_of_quarter: Option<u32>,
}

impl Opportunity {
    pub fn new(
        opportunity_id: impl Into<String>,
        opportunity_name: impl Into<String>,
        opportunity_owner: impl Into<String>,
        stage: impl Into<String>,
        billing_country: impl Into<String>,
        created_date: NaiveDate,
    ) -> Self {
        let billing_country = billing_country.into();
        Self {
            opportunity_id: opportunity_id.into(),
            opportunity_name: opportunity_name.into(),
            opportunity_owner: opportunity_owner.into(),
            stage: stage.into(),
            region: Region::from_country(&billing_country),
            billing_country,
            created_date,
            verified_down_payment_date: None,
            verified_final_payment_date: None,
            close_date: None,
            created_month: MonthLabel::of(created_date),
            dp_month: None,
            dp_quarter: None,
            dp_week_of_quarter: None,
            fp_month: None,
            fp_quarter: None,
            fp_week_of_quarter: None,
        }
    }

    pub fn with_down_payment(mut self, date: Option<NaiveDate>) -> Self {
        self.verified_down_payment_date = date;
        self.dp_month = month_of(date);
        self.dp_quarter = quarter_of(date);
        self.dp_week_of_quarter = week_of(date);
        self
    }

    pub fn with_final_payment(mut self, date: Option<NaiveDate>) -> Self {
        self.verified_final_payment_date = date;
        self.fp_month = month_of(date);
        self.fp_quarter = quarter_of(date);
        self.fp_week_of_quarter = week_of(date);
        self
    }

    pub fn with_close_date(mut self, date: Option<NaiveDate>) -> Self {
        self.close_date = date;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamMember {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub ramp_date: NaiveDate,
}

impl TeamMember {
    pub fn is_active(&self) -> bool {
        self.end_date.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunratePoint {
    pub week_of_quarter: u32,
    pub quarter: Quarter,
    pub cumulative_count: u32,
    pub is_current: bool,
}

/// Where a quarter's run-rate line stops; used to label each series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesEnd {
    pub quarter: Quarter,
    pub week_of_quarter: u32,
    pub cumulative_count: u32,
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputRow {
    pub month: MonthLabel,
    pub month_start: NaiveDate,
    pub us: u32,
    pub intl: u32,
    pub total: u32,
    pub ramped_fte: u32,
    pub dps_per_fte: Option<f64>,
    pub target: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageCount {
    pub stage: String,
    pub count: u32,
    pub share_of_total: Option<f64>, // None when the funnel is empty
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveOpportunity {
    pub opportunity_name: String,
    pub link: String,
    pub created_date: NaiveDate,
    pub created_display: String,
    pub stage: String,
    pub opportunity_owner: String,
    pub billing_country: String,
    pub age_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonalityRow {
    pub month: MonthLabel,
    pub opportunities_created: u32,
    pub down_payments: u32,
    pub final_payments: u32,
}
