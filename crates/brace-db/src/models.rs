use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Regimen phase for a date.
///
/// Stored as one of the fixed names `NONE`, `FORWARD`, `BACKWARD`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    #[default]
    None,
    Forward,
    Backward,
}

impl Direction {
    /// The stored symbolic name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Forward => "FORWARD",
            Self::Backward => "BACKWARD",
        }
    }

    /// Decode a stored name, mapping anything unrecognised to
    /// [`Direction::None`].
    pub fn from_stored(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = DirectionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Self::None),
            "FORWARD" => Ok(Self::Forward),
            "BACKWARD" => Ok(Self::Backward),
            other => Err(DirectionParseError(other.to_owned())),
        }
    }
}

/// Row decoding goes through [`Direction::from_stored`], so a corrupt or
/// future value never fails a query.
impl From<String> for Direction {
    fn from(s: String) -> Self {
        Self::from_stored(&s)
    }
}

/// Error returned when parsing an invalid [`Direction`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid direction: {0:?}")]
pub struct DirectionParseError(pub String);

// ---------------------------------------------------------------------------
// Stored dates
// ---------------------------------------------------------------------------

/// Dates are stored as ISO `YYYY-MM-DD` text and compared as text, which is
/// chronological only for four-digit, unsigned years.
pub const MIN_STORED_YEAR: i32 = 0;
pub const MAX_STORED_YEAR: i32 = 9999;

/// Error returned for a date outside years 0000 to 9999.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("date {0} is outside the storable range 0000-01-01..=9999-12-31")]
pub struct DateRangeError(pub NaiveDate);

/// Accept `date` only if its stored text sorts chronologically.
pub fn check_storable(date: NaiveDate) -> Result<NaiveDate, DateRangeError> {
    if (MIN_STORED_YEAR..=MAX_STORED_YEAR).contains(&date.year()) {
        Ok(date)
    } else {
        Err(DateRangeError(date))
    }
}

/// Clamp an inclusive date range to the storable years.
///
/// Returns `None` when no storable date lies inside `[from, to]`.
pub fn clamp_stored_range(from: NaiveDate, to: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    if from > to || from.year() > MAX_STORED_YEAR || to.year() < MIN_STORED_YEAR {
        return None;
    }
    let from = if from.year() < MIN_STORED_YEAR {
        NaiveDate::from_ymd_opt(MIN_STORED_YEAR, 1, 1)?
    } else {
        from
    };
    let to = if to.year() > MAX_STORED_YEAR {
        NaiveDate::from_ymd_opt(MAX_STORED_YEAR, 12, 31)?
    } else {
        to
    };
    Some((from, to))
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// One correction regimen: a forward run followed by a backward run,
/// repeating from `start_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: i64,
    pub start_date: NaiveDate,
    pub forward_count: i32,
    pub backward_count: i32,
}

impl Plan {
    /// Days in one full forward + backward cycle.
    ///
    /// Widened to `i64` so that extreme counts cannot overflow.
    pub fn cycle_length(&self) -> i64 {
        i64::from(self.forward_count) + i64::from(self.backward_count)
    }
}

/// Insert payload for a plan that does not have an id yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlan {
    pub start_date: NaiveDate,
    pub forward_count: i32,
    pub backward_count: i32,
}

impl NewPlan {
    pub fn new(start_date: NaiveDate, forward_count: i32, backward_count: i32) -> Self {
        Self {
            start_date,
            forward_count,
            backward_count,
        }
    }

    /// Attach the id the store assigned.
    pub fn with_id(self, id: i64) -> Plan {
        Plan {
            id,
            start_date: self.start_date,
            forward_count: self.forward_count,
            backward_count: self.backward_count,
        }
    }
}

/// A completion mark for one date under one plan. Unique per
/// `(date, plan_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub plan_id: i64,
    pub completed: bool,
    #[sqlx(try_from = "String")]
    pub direction: Direction,
    pub notes: String,
    /// Display hint stored with the record; overrides the phase color.
    pub color: Option<String>,
}

impl DailyRecord {
    /// A record with no notes and no stored color.
    pub fn new(date: NaiveDate, plan_id: i64, completed: bool, direction: Direction) -> Self {
        Self {
            date,
            plan_id,
            completed,
            direction,
            notes: String::new(),
            color: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
