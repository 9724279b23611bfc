// Birthday matching.
//
// Birthdates come from a hand-maintained sheet in one of two shapes:
// `YYYY/MM/DD` when the year is known, `MM/DD` when it isn't. Anything else is
// reported and skipped, never fatal.
//
// The comparison is purely structural: month and day must be in range, but we
// do not check that the day exists in that month. `02/30` parses fine and will
// simply never match.

use chrono::{Datelike, NaiveDate};

use crate::core::roster::{PersonRecord, Roster, BIRTHDATE_KEY};

/// Result of parsing a raw birthdate cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedBirthdate {
    /// `YYYY/MM/DD`
    Full { year: i32, month: u32, day: u32 },
    /// `MM/DD`
    MonthDay { month: u32, day: u32 },
    Invalid(InvalidBirthdate),
}

/// Why a birthdate cell was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidBirthdate {
    /// Not two or three slash-separated parts.
    FieldCount(usize),
    /// A part that isn't an integer.
    NotANumber(String),
    MonthOutOfRange(u32),
    DayOutOfRange(u32),
    /// A year too far from today to give an age.
    YearOutOfRange(i32),
}

impl std::fmt::Display for InvalidBirthdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidBirthdate::FieldCount(n) => {
                write!(f, "expected YYYY/MM/DD or MM/DD, found {} field(s)", n)
            }
            InvalidBirthdate::NotANumber(part) => write!(f, "'{}' is not a number", part),
            InvalidBirthdate::MonthOutOfRange(m) => write!(f, "month {} is out of range", m),
            InvalidBirthdate::DayOutOfRange(d) => write!(f, "day {} is out of range", d),
            InvalidBirthdate::YearOutOfRange(y) => write!(f, "year {} is out of range", y),
        }
    }
}

/// Outcome of checking one birthdate against a reference date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BirthdayCheck {
    /// Birthday is today. `age` is set when the birthdate carried a year.
    Today { age: Option<i32> },
    NotToday,
    Invalid(InvalidBirthdate),
}

impl ParsedBirthdate {
    pub fn parse(raw: &str) -> Self {
        let parts: Vec<&str> = raw.trim().split('/').map(str::trim).collect();

        match parts.as_slice() {
            [year, month, day] => {
                let year = match parse_part::<i32>(year) {
                    Ok(year) => year,
                    Err(e) => return Self::Invalid(e),
                };
                match parse_month_day(month, day) {
                    Ok((month, day)) => Self::Full { year, month, day },
                    Err(e) => Self::Invalid(e),
                }
            }
            [month, day] => match parse_month_day(month, day) {
                Ok((month, day)) => Self::MonthDay { month, day },
                Err(e) => Self::Invalid(e),
            },
            other => Self::Invalid(InvalidBirthdate::FieldCount(other.len())),
        }
    }

    /// Compares month and day against `today`.
    pub fn check(&self, today: NaiveDate) -> BirthdayCheck {
        let (month, day, year) = match self {
            Self::Full { year, month, day } => (*month, *day, Some(*year)),
            Self::MonthDay { month, day } => (*month, *day, None),
            Self::Invalid(reason) => return BirthdayCheck::Invalid(reason.clone()),
        };

        if month != today.month() || day != today.day() {
            return BirthdayCheck::NotToday;
        }

        match year {
            Some(y) => match today.year().checked_sub(y) {
                Some(age) => BirthdayCheck::Today { age: Some(age) },
                None => BirthdayCheck::Invalid(InvalidBirthdate::YearOutOfRange(y)),
            },
            None => BirthdayCheck::Today { age: None },
        }
    }
}

fn parse_part<T: std::str::FromStr>(part: &str) -> Result<T, InvalidBirthdate> {
    part.parse::<T>()
        .map_err(|_| InvalidBirthdate::NotANumber(part.to_string()))
}

fn parse_month_day(month: &str, day: &str) -> Result<(u32, u32), InvalidBirthdate> {
    let month: u32 = parse_part(month)?;
    let day: u32 = parse_part(day)?;

    if !(1..=12).contains(&month) {
        return Err(InvalidBirthdate::MonthOutOfRange(month));
    }
    if !(1..=31).contains(&day) {
        return Err(InvalidBirthdate::DayOutOfRange(day));
    }

    Ok((month, day))
}

/// Parses `raw` and checks it against `today` in one step.
pub fn check_birthdate(raw: &str, today: NaiveDate) -> BirthdayCheck {
    ParsedBirthdate::parse(raw).check(today)
}

/// A roster row that failed birthdate parsing.
#[derive(Debug, Clone)]
pub struct RejectedRow {
    /// Position in the roster, 0-based over data rows.
    pub index: usize,
    pub raw: String,
    pub reason: InvalidBirthdate,
}

/// Matches and diagnostics from one pass over the roster.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// Records whose birthday is today, in roster order, with age attached
    /// when known.
    pub matches: Vec<PersonRecord>,
    pub rejected: Vec<RejectedRow>,
}

/// Returns everyone in `roster` whose birthday falls on `today`.
pub fn todays_birthdays(roster: &Roster, today: NaiveDate) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    if !roster.has_column(BIRTHDATE_KEY) {
        tracing::warn!("Roster has no '{}' column, nothing to match", BIRTHDATE_KEY);
        return outcome;
    }

    for (index, record) in roster.records.iter().enumerate() {
        let raw = record.birthdate().unwrap_or_default();

        match check_birthdate(raw, today) {
            BirthdayCheck::Today { age } => {
                let record = match age {
                    Some(age) => record.clone().with_age(age),
                    None => record.clone(),
                };
                outcome.matches.push(record);
            }
            BirthdayCheck::NotToday => {}
            BirthdayCheck::Invalid(reason) => {
                outcome.rejected.push(RejectedRow {
                    index,
                    raw: raw.to_string(),
                    reason,
                });
            }
        }
    }

    outcome
}
