use anyhow::Context;
use chrono::{Months, NaiveDate};

use crate::models::TeamMember;

/// Months after the start date before a hire counts as fully productive.
pub const RAMP_MONTHS: u32 = 6;

const ROSTER_DATE_FORMAT: &str = "%m/%d/%y";

pub struct RosterEntry {
    pub name: &'static str,
    pub start: &'static str,
    /// Empty while still employed.
    pub end: &'static str,
}

/// Sales team, edited in place when someone joins or leaves.
pub const TEAM: &[RosterEntry] = &[
    RosterEntry { name: "Brad Westcott", start: "11/8/21", end: "" },
    RosterEntry { name: "Tim Mahoney", start: "2/14/22", end: "" },
    RosterEntry { name: "Cody Gradoville", start: "7/18/22", end: "10/21/22" },
    RosterEntry { name: "Eric Wetzel", start: "2/22/23", end: "7/15/24" },
    RosterEntry { name: "Miles Murphy", start: "3/27/23", end: "" },
    RosterEntry { name: "Austin Carter", start: "4/3/23", end: "" },
    RosterEntry { name: "Edgar Perez", start: "5/15/23", end: "1/15/24" },
    RosterEntry { name: "Jeff Vander Voort", start: "5/22/23", end: "" },
    RosterEntry { name: "Justin Lenz", start: "7/3/23", end: "" },
    RosterEntry { name: "Brian Huffman", start: "4/8/24", end: "" },
    RosterEntry { name: "Christian Janse", start: "6/1/24", end: "" },
    RosterEntry { name: "Genevieve Baumann", start: "7/29/24", end: "" },
    RosterEntry { name: "Mariñe Rodriguez Saiz", start: "8/5/24", end: "" },
    RosterEntry { name: "Sam Webster", start: "8/26/24", end: "" },
];

impl TeamMember {
    pub fn new(name: impl Into<String>, start_date: NaiveDate, end_date: Option<NaiveDate>) -> Self {
        Self {
            name: name.into(),
            start_date,
            end_date,
            ramp_date: start_date + Months::new(RAMP_MONTHS),
        }
    }
}

pub fn is_ramped_active(member: &TeamMember, as_of: NaiveDate) -> bool {
    member.ramp_date <= as_of && member.end_date.map_or(true, |end| end >= as_of)
}

/// Immutable team roster, built once at startup and passed to every
/// aggregation that needs headcount.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: Vec<TeamMember>,
}

impl Roster {
    pub fn new(members: Vec<TeamMember>) -> Self {
        Self { members }
    }

    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_entries(TEAM)
    }

    pub fn from_entries(entries: &[RosterEntry]) -> anyhow::Result<Self> {
        let mut members = Vec::with_capacity(entries.len());

        for entry in entries {
            let start = NaiveDate::parse_from_str(entry.start, ROSTER_DATE_FORMAT)
                .with_context(|| format!("invalid start date for {}: {}", entry.name, entry.start))?;
            let end = if entry.end.trim().is_empty() {
                None
            } else {
                Some(
                    NaiveDate::parse_from_str(entry.end, ROSTER_DATE_FORMAT).with_context(|| {
                        format!("invalid end date for {}: {}", entry.name, entry.end)
                    })?,
                )
            };
            members.push(TeamMember::new(entry.name, start, end));
        }

        Ok(Self::new(members))
    }

    pub fn members(&self) -> &[TeamMember] {
        &self.members
    }

    pub fn active_members(&self) -> impl Iterator<Item = &TeamMember> {
        self.members.iter().filter(|member| member.is_active())
    }

    pub fn is_active_member(&self, name: &str) -> bool {
        self.active_members().any(|member| member.name == name)
    }

    pub fn ramped_headcount(&self, as_of: NaiveDate) -> u32 {
        self.members
            .iter()
            .filter(|member| is_ramped_active(member, as_of))
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn ramp_starts_six_months_after_hire() {
        let member = TeamMember::new("Miles Murphy", date(2023, 3, 27), None);
        assert_eq!(member.ramp_date, date(2023, 9, 27));
        assert!(!is_ramped_active(&member, date(2023, 9, 26)));
        assert!(is_ramped_active(&member, date(2023, 9, 27)));
    }

    #[test]
    fn ramp_date_clamps_to_month_end() {
        let member = TeamMember::new("Late August", date(2023, 8, 31), None);
        assert_eq!(member.ramp_date, date(2024, 2, 29));
        assert!(member.ramp_date > member.start_date);
    }

    #[test]
    fn departed_members_stop_counting_after_end_date() {
        let member = TeamMember::new("Edgar Perez", date(2023, 5, 15), Some(date(2024, 1, 15)));
        assert!(is_ramped_active(&member, date(2024, 1, 15)));
        assert!(!is_ramped_active(&member, date(2024, 1, 16)));
    }

    #[test]
    fn open_ended_members_never_expire() {
        let member = TeamMember::new("Tim Mahoney", date(2022, 2, 14), None);
        assert!(is_ramped_active(&member, date(2099, 12, 31)));
    }

    #[test]
    fn headcount_is_zero_before_anyone_ramps() {
        let roster = Roster::builtin().unwrap();
        assert_eq!(roster.ramped_headcount(date(2022, 5, 7)), 0);
        assert_eq!(roster.ramped_headcount(date(2022, 5, 8)), 1);
    }

    #[test]
    fn headcount_excludes_departures() {
        let roster = Roster::new(vec![
            TeamMember::new("a", date(2023, 1, 1), None),
            TeamMember::new("b", date(2023, 1, 1), Some(date(2023, 9, 30))),
        ]);
        assert_eq!(roster.ramped_headcount(date(2023, 9, 1)), 2);
        assert_eq!(roster.ramped_headcount(date(2023, 10, 1)), 1);
    }

    #[test]
    fn builtin_roster_parses_and_tracks_active_members() {
        let roster = Roster::builtin().unwrap();
        assert_eq!(roster.members().len(), TEAM.len());
        assert!(roster.is_active_member("Sam Webster"));
        assert!(!roster.is_active_member("Eric Wetzel"));
        assert_eq!(roster.active_members().count(), 11);
    }

    #[test]
    fn malformed_roster_entry_is_reported() {
        let entries = [RosterEntry { name: "Broken", start: "2023-01-01", end: "" }];
        let err = Roster::from_entries(&entries).unwrap_err();
        assert!(err.to_string().contains("Broken"));
    }
}
