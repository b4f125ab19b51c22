use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::error::LoadError;
use crate::models::Opportunity;

const OPPORTUNITY_ID: &str = "opportunity_id";
const OPPORTUNITY_NAME: &str = "opportunity_name";
const OPPORTUNITY_OWNER: &str = "opportunity_owner";
const STAGE: &str = "stage";
const BILLING_COUNTRY: &str = "billing_country";
const CREATED_DATE: &str = "created_date";
const DOWN_PAYMENT_DATE: &str = "verified_down_payment_date";
const FINAL_PAYMENT_DATE: &str = "verified_final_payment_date";
const CLOSE_DATE: &str = "close_date";

pub const REQUIRED_COLUMNS: [&str; 9] = [
    OPPORTUNITY_ID,
    OPPORTUNITY_NAME,
    OPPORTUNITY_OWNER,
    STAGE,
    BILLING_COUNTRY,
    CREATED_DATE,
    DOWN_PAYMENT_DATE,
    FINAL_PAYMENT_DATE,
    CLOSE_DATE,
];

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

// Two-digit years must be tried before `%Y`, which happily reads "24" as year 24.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%y %H:%M",
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_skipped: usize,
    pub invalid_dates: usize,
}

#[derive(Debug, Clone)]
pub struct LoadedOpportunities {
    pub opportunities: Vec<Opportunity>,
    pub summary: LoadSummary,
}

/// Lowercases a header and joins its words with underscores, so
/// `" Verified Down Payment Date "` becomes `verified_down_payment_date`.
pub fn canonical_column(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .or_else(|| {
            DATETIME_FORMATS.iter().find_map(|format| {
                NaiveDateTime::parse_from_str(value, format)
                    .ok()
                    .map(|moment| moment.date())
            })
        })
}

/// Loads a spreadsheet (first sheet) or a CSV export, picked by extension.
pub fn load_path(path: &Path) -> Result<LoadedOpportunities, LoadError> {
    if is_workbook(path) {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(LoadError::EmptyWorkbook)??;
        load_range(&range)
    } else {
        let file = std::fs::File::open(path)?;
        load_reader(file)
    }
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| {
            WORKBOOK_EXTENSIONS
                .iter()
                .any(|known| extension.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

pub fn load_reader<R: Read>(reader: R) -> Result<LoadedOpportunities, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = ColumnIndex::resolve(reader.headers()?.iter())?;
    let mut table = TableBuilder::new(columns);

    for result in reader.records() {
        match result {
            Ok(record) => table.push_row(&record.iter().collect::<Vec<_>>()),
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(err) => {
                warn!(error = %err, "skipping unreadable opportunity row");
                table.skip_unreadable();
            }
        }
    }

    Ok(table.finish())
}

/// Loads a worksheet whose first row holds the column headers.
pub fn load_range(range: &Range<Data>) -> Result<LoadedOpportunities, LoadError> {
    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|header| header.iter().map(cell_text).collect())
        .unwrap_or_default();

    let columns = ColumnIndex::resolve(headers.iter().map(String::as_str))?;
    let mut table = TableBuilder::new(columns);
    for row in rows {
        let cells: Vec<String> = row.iter().map(cell_text).collect();
        table.push_row(&cells);
    }

    Ok(table.finish())
}

/// Text form of a worksheet cell. Date cells come out as `YYYY-MM-DD` so
/// they share the CSV date parsing.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        Data::Int(number) => number.to_string(),
        Data::Float(number) if number.fract() == 0.0 => format!("{number:.0}"),
        Data::Float(number) => number.to_string(),
        Data::Bool(flag) => flag.to_string(),
        Data::DateTime(moment) => moment
            .as_datetime()
            .map(|moment| moment.date().format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        Data::DateTimeIso(text) | Data::DurationIso(text) => text.clone(),
        Data::Error(_) => String::new(),
    }
}

struct ColumnIndex {
    positions: HashMap<&'static str, usize>,
}

impl ColumnIndex {
    fn resolve<'a>(headers: impl Iterator<Item = &'a str>) -> Result<Self, LoadError> {
        let canonical: Vec<String> = headers.map(canonical_column).collect();
        let mut positions = HashMap::new();
        let mut missing = Vec::new();

        for column in REQUIRED_COLUMNS {
            match canonical.iter().position(|header| header == column) {
                Some(index) => {
                    positions.insert(column, index);
                }
                None => missing.push(column.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(LoadError::Schema { missing });
        }

        Ok(Self { positions })
    }

    fn text<S: AsRef<str>>(&self, cells: &[S], column: &'static str) -> String {
        self.positions
            .get(column)
            .and_then(|&index| cells.get(index))
            .map_or("", |cell| cell.as_ref())
            .trim()
            .to_string()
    }

    fn date<S: AsRef<str>>(
        &self,
        cells: &[S],
        column: &'static str,
        summary: &mut LoadSummary,
    ) -> Option<NaiveDate> {
        let raw = self.text(cells, column);
        if raw.is_empty() {
            return None;
        }
        let parsed = parse_date(&raw);
        if parsed.is_none() {
            summary.invalid_dates += 1;
            debug!(column, value = %raw, "unparseable date left empty");
        }
        parsed
    }

    fn build<S: AsRef<str>>(&self, cells: &[S], summary: &mut LoadSummary) -> Option<Opportunity> {
        let opportunity_id = self.text(cells, OPPORTUNITY_ID);
        let Some(created_date) = self.date(cells, CREATED_DATE, summary) else {
            warn!(
                opportunity_id = %opportunity_id,
                "skipping opportunity without a usable created date"
            );
            return None;
        };

        let down_payment = self.date(cells, DOWN_PAYMENT_DATE, summary);
        let final_payment = self.date(cells, FINAL_PAYMENT_DATE, summary);
        let close_date = self.date(cells, CLOSE_DATE, summary);

        Some(
            Opportunity::new(
                opportunity_id,
                self.text(cells, OPPORTUNITY_NAME),
                self.text(cells, OPPORTUNITY_OWNER),
                self.text(cells, STAGE),
                self.text(cells, BILLING_COUNTRY),
                created_date,
            )
            .with_down_payment(down_payment)
            .with_final_payment(final_payment)
            .with_close_date(close_date),
        )
    }
}

/// Collects canonical records row by row, whatever the source format.
struct TableBuilder {
    columns: ColumnIndex,
    summary: LoadSummary,
    opportunities: Vec<Opportunity>,
}

impl TableBuilder {
    fn new(columns: ColumnIndex) -> Self {
        Self {
            columns,
            summary: LoadSummary::default(),
            opportunities: Vec::new(),
        }
    }

    fn push_row<S: AsRef<str>>(&mut self, cells: &[S]) {
        // Spreadsheets often carry formatted but empty trailing rows.
        if cells.iter().all(|cell| cell.as_ref().trim().is_empty()) {
            return;
        }
        self.summary.rows_read += 1;
        match self.columns.build(cells, &mut self.summary) {
            Some(opportunity) => self.opportunities.push(opportunity),
            None => self.summary.rows_skipped += 1,
        }
    }

    fn skip_unreadable(&mut self) {
        self.summary.rows_read += 1;
        self.summary.rows_skipped += 1;
    }

    fn finish(self) -> LoadedOpportunities {
        let TableBuilder {
            mut summary,
            mut opportunities,
            ..
        } = self;

        opportunities.sort_by_key(|opportunity| opportunity.created_date);
        summary.rows_kept = opportunities.len();

        info!(
            rows_read = summary.rows_read,
            rows_kept = summary.rows_kept,
            rows_skipped = summary.rows_skipped,
            invalid_dates = summary.invalid_dates,
            "loaded opportunities"
        );

        LoadedOpportunities {
            opportunities,
            summary,
        }
    }
}
