//! Shared utility functions for WSB crates.

/// Date utility functions
pub mod dates {
    use crate::error::DateError;
    use chrono::{Datelike, Months, NaiveDate};
    use std::mem::replace;

    /// Format a NaiveDate as "YYYY-MM-DD"
    pub fn format_date(date: &NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }

    /// Parse a date string in "YYYY-MM-DD" format
    pub fn parse_date(s: &str) -> Result<NaiveDate, DateError> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|e| DateError(format!("'{}' is not a YYYY-MM-DD date: {}", s, e)))
    }

    /// First day of the month containing `date`.
    pub fn first_of_month(date: &NaiveDate) -> NaiveDate {
        date.with_day(1).unwrap_or(*date)
    }

    /// Extract a calendar date from a grid layer label.
    ///
    /// Looks for the first `YYYY?MM?DD` run where each `?` is either `-` or
    /// `_`, so `ppt_2020-01-01`, `2020_01_01` and `aet_2020-01_01` all parse.
    pub fn parse_layer_date(label: &str) -> Result<NaiveDate, DateError> {
        let bytes = label.as_bytes();
        if bytes.len() >= 10 {
            for start in 0..=bytes.len() - 10 {
                let window = &bytes[start..start + 10];
                let digits_at = |range: std::ops::Range<usize>| {
                    window[range].iter().all(|b| b.is_ascii_digit())
                };
                let separator_at = |i: usize| matches!(window[i], b'-' | b'_');
                if !(digits_at(0..4) && separator_at(4) && digits_at(5..7) && separator_at(7))
                    || !digits_at(8..10)
                {
                    continue;
                }
                // all ten bytes are ASCII here, so slicing on them is safe
                let segment = &label[start..start + 10];
                let year: i32 = segment[0..4].parse().unwrap_or_default();
                let month: u32 = segment[5..7].parse().unwrap_or_default();
                let day: u32 = segment[8..10].parse().unwrap_or_default();
                if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                    return Ok(date);
                }
            }
        }
        Err(DateError(format!(
            "layer label '{}' has no year-month-day segment",
            label
        )))
    }

    /// Number of calendar months touched by the inclusive range `[start, end]`.
    pub fn months_in_range(start: &NaiveDate, end: &NaiveDate) -> usize {
        if end < start {
            return 0;
        }
        let span = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
        span as usize + 1
    }

    /// A month range iterator that yields the first day of every month from
    /// the month of the start date through the month of the end date (inclusive).
    #[derive(Clone, Eq, PartialEq, Copy, Debug)]
    pub struct MonthRange(pub NaiveDate, pub NaiveDate);

    impl MonthRange {
        pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
            MonthRange(first_of_month(&start), first_of_month(&end))
        }
    }

    impl Iterator for MonthRange {
        type Item = NaiveDate;
        fn next(&mut self) -> Option<Self::Item> {
            if self.0 <= self.1 {
                let next = self.0.checked_add_months(Months::new(1))?;
                Some(replace(&mut self.0, next))
            } else {
                None
            }
        }
    }

}

/// Error types
pub mod error {
    use std::fmt;

    #[derive(Debug, Clone, PartialEq)]
    pub struct DateError(pub String);

    impl fmt::Display for DateError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Date error: {}", self.0)
        }
    }

    impl std::error::Error for DateError {}
}
