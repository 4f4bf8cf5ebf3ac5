//! Time grid: the dense (year, frame-of-year) indexing every source is
//! aligned onto.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Date string layout used in source filenames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// `YYYYDDD` — year plus ordinal day of year.
    #[default]
    YearDoy,
    /// `YYYYMMDD` — year, month, day.
    YearMonthDay,
}

impl DateFormat {
    /// Parse a date string into `(year, day_of_year)`.
    pub fn parse(&self, s: &str) -> Option<(i32, u32)> {
        let date = match self {
            DateFormat::YearDoy => {
                if s.len() != 7 {
                    return None;
                }
                let year: i32 = s[0..4].parse().ok()?;
                let doy: u32 = s[4..7].parse().ok()?;
                NaiveDate::from_yo_opt(year, doy)?
            }
            DateFormat::YearMonthDay => {
                if s.len() != 8 {
                    return None;
                }
                let year: i32 = s[0..4].parse().ok()?;
                let month: u32 = s[4..6].parse().ok()?;
                let day: u32 = s[6..8].parse().ok()?;
                NaiveDate::from_ymd_opt(year, month, day)?
            }
        };
        Some((date.year(), date.ordinal()))
    }
}

/// A uniform (year, frame-of-year) time grid.
///
/// `frames_per_year` is `366 / days_per_frame` rounded down, so every year
/// carries the same frame count regardless of leap status. With daily
/// frames that means 366 slots per year and frame 365 permanently empty in
/// non-leap years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeGrid {
    /// First calendar year covered (inclusive).
    pub first_year: i32,
    /// Last calendar year covered (inclusive).
    pub last_year: i32,
    /// Number of frames in each year.
    pub frames_per_year: usize,
    /// Days aggregated into one frame.
    pub days_per_frame: u32,
}

impl TimeGrid {
    /// Create a time grid covering `[first_year, last_year]`.
    pub fn new(first_year: i32, last_year: i32, days_per_frame: u32) -> Self {
        debug_assert!(days_per_frame >= 1 && last_year >= first_year);
        Self {
            first_year,
            last_year,
            frames_per_year: (366 / days_per_frame) as usize,
            days_per_frame,
        }
    }

    /// Number of years covered.
    pub fn years(&self) -> usize {
        (self.last_year - self.first_year + 1) as usize
    }

    /// Total number of (year, frame) slots.
    pub fn slots(&self) -> usize {
        self.years() * self.frames_per_year
    }

    /// Frame index for a day of year, or `None` when the day maps past the
    /// last frame (possible only when `days_per_frame` does not divide 366).
    pub fn frame_of(&self, doy: u32) -> Option<usize> {
        if doy == 0 {
            return None;
        }
        let frame = ((doy - 1) / self.days_per_frame) as usize;
        (frame < self.frames_per_year).then_some(frame)
    }

    /// Zero-based year offset for a calendar year within the grid.
    pub fn year_index(&self, year: i32) -> Option<usize> {
        (year >= self.first_year && year <= self.last_year)
            .then(|| (year - self.first_year) as usize)
    }

    /// Flat slot index for `(year, day_of_year)`.
    pub fn slot(&self, year: i32, doy: u32) -> Option<usize> {
        let iy = self.year_index(year)?;
        let ifr = self.frame_of(doy)?;
        Some(iy * self.frames_per_year + ifr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_year_doy() {
        assert_eq!(DateFormat::YearDoy.parse("2019001"), Some((2019, 1)));
        assert_eq!(DateFormat::YearDoy.parse("2020366"), Some((2020, 366)));
        // Day 366 does not exist in a non-leap year.
        assert_eq!(DateFormat::YearDoy.parse("2019366"), None);
        assert_eq!(DateFormat::YearDoy.parse("2019"), None);
    }

    #[test]
    fn test_parse_year_month_day() {
        assert_eq!(DateFormat::YearMonthDay.parse("20190101"), Some((2019, 1)));
        assert_eq!(DateFormat::YearMonthDay.parse("20201231"), Some((2020, 366)));
        assert_eq!(DateFormat::YearMonthDay.parse("20190230"), None);
    }

    #[test]
    fn test_daily_grid() {
        let grid = TimeGrid::new(2018, 2020, 1);
        assert_eq!(grid.frames_per_year, 366);
        assert_eq!(grid.years(), 3);
        assert_eq!(grid.slots(), 3 * 366);
        assert_eq!(grid.slot(2018, 1), Some(0));
        assert_eq!(grid.slot(2019, 1), Some(366));
        assert_eq!(grid.slot(2020, 366), Some(3 * 366 - 1));
        assert_eq!(grid.slot(2021, 1), None);
    }

    #[test]
    fn test_multiday_frames_round_down() {
        // 366 / 5 = 73 frames; days 1..=365 map to frames 0..=72 and
        // day 366 falls past the last frame.
        let grid = TimeGrid::new(2019, 2019, 5);
        assert_eq!(grid.frames_per_year, 73);
        assert_eq!(grid.frame_of(1), Some(0));
        assert_eq!(grid.frame_of(5), Some(0));
        assert_eq!(grid.frame_of(6), Some(1));
        assert_eq!(grid.frame_of(365), Some(72));
        assert_eq!(grid.frame_of(366), None);
    }
}
