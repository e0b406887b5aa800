//! Month grid for the planner's calendar selector.
//!
//! Grids are Sunday-first: leading `None` cells pad the weekdays before the
//! 1st, followed by every day of the month.

use chrono::{Datelike, NaiveDate};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DAYS_PER_WEEK: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    InvalidMonth(u32),
    YearOutOfRange(i32),
}

impl Display for CalendarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidMonth(month) => write!(f, "month must be 1..=12, got {month}"),
            Self::YearOutOfRange(year) => write!(f, "year {year} is out of range"),
        }
    }
}

impl Error for CalendarError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarMonth {
    first_day: NaiveDate,
    cells: Vec<Option<NaiveDate>>,
}

impl CalendarMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, CalendarError> {
        if !(1..=12).contains(&month) {
            return Err(CalendarError::InvalidMonth(month));
        }
        let first_day =
            NaiveDate::from_ymd_opt(year, month, 1).ok_or(CalendarError::YearOutOfRange(year))?;

        Ok(Self::containing(first_day))
    }

    /// Month that contains `date`.
    pub fn containing(date: NaiveDate) -> Self {
        let first_day = date.with_day(1).unwrap_or(date);
        let leading = first_day.weekday().num_days_from_sunday() as usize;
        let mut cells = vec![None; leading];
        cells.extend(
            first_day
                .iter_days()
                .take_while(|day| day.month() == first_day.month())
                .map(Some),
        );
        Self { first_day, cells }
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    pub fn month(&self) -> u32 {
        self.first_day.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    pub fn days_in_month(&self) -> usize {
        self.cells.iter().flatten().count()
    }

    /// Flat grid: padding cells then one cell per day.
    pub fn cells(&self) -> &[Option<NaiveDate>] {
        &self.cells
    }

    /// Grid rows of seven cells; the last row may be shorter.
    pub fn weeks(&self) -> impl Iterator<Item = &[Option<NaiveDate>]> {
        self.cells.chunks(DAYS_PER_WEEK)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year() && date.month() == self.month()
    }

    /// Display label such as `June 2024`.
    pub fn label(&self) -> String {
        self.first_day.format("%B %Y").to_string()
    }

    pub fn next(&self) -> Result<Self, CalendarError> {
        let (year, month) = if self.month() == 12 {
            (self.year() + 1, 1)
        } else {
            (self.year(), self.month() + 1)
        };
        Self::new(year, month)
    }

    pub fn previous(&self) -> Result<Self, CalendarError> {
        let (year, month) = if self.month() == 1 {
            (self.year() - 1, 12)
        } else {
            (self.year(), self.month() - 1)
        };
        Self::new(year, month)
    }
}
