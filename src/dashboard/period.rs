//! Calendar month periods used to bucket transactions.

use std::ops::RangeInclusive;

use time::{Date, Month};

use crate::Error;

/// The number of months shown in the dashboard trend.
pub const TREND_MONTHS: usize = 6;

/// A calendar month, e.g. March 2025.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthPeriod {
    first_day: Date,
    last_day: Date,
}

impl MonthPeriod {
    /// Create the period for `month` (1-12) of `year`.
    ///
    /// # Errors
    /// Returns [Error::Validation] if `month` is outside 1-12 or `year` is out of range.
    pub fn new(year: i32, month: u8) -> Result<Self, Error> {
        let month = Month::try_from(month).map_err(|_| {
            Error::Validation(format!("month must be between 1 and 12, got {month}"))
        })?;

        Self::from_year_month(year, month)
    }

    /// The period containing `date`.
    pub fn containing(date: Date) -> Result<Self, Error> {
        Self::from_year_month(date.year(), date.month())
    }

    fn from_year_month(year: i32, month: Month) -> Result<Self, Error> {
        let invalid_period = |_| Error::Validation(format!("invalid period {month} {year}"));

        let first_day = Date::from_calendar_date(year, month, 1).map_err(invalid_period)?;
        let (next_year, next_month) = match month {
            Month::December => (year + 1, Month::January),
            month => (year, month.next()),
        };
        let last_day = Date::from_calendar_date(next_year, next_month, 1)
            .map_err(invalid_period)?
            .previous_day()
            .ok_or_else(|| Error::Validation(format!("invalid period {month} {year}")))?;

        Ok(Self {
            first_day,
            last_day,
        })
    }

    /// The calendar year.
    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    /// The month number, 1-12.
    pub fn month(&self) -> u8 {
        self.first_day.month() as u8
    }

    /// The first day of the month.
    pub fn first_day(&self) -> Date {
        self.first_day
    }

    /// The last day of the month.
    pub fn last_day(&self) -> Date {
        self.last_day
    }

    /// Every day of the month.
    pub fn date_range(&self) -> RangeInclusive<Date> {
        self.first_day..=self.last_day
    }

    /// Whether `date` falls within the month.
    pub fn contains(&self, date: Date) -> bool {
        self.date_range().contains(&date)
    }

    /// The month before this one.
    pub fn previous(&self) -> Result<Self, Error> {
        let (year, month) = match self.first_day.month() {
            Month::January => (self.year() - 1, Month::December),
            month => (self.year(), month.previous()),
        };

        Self::from_year_month(year, month)
    }

    /// Three-letter month name, e.g. "Mar".
    pub fn short_label(&self) -> &'static str {
        match self.first_day.month() {
            Month::January => "Jan",
            Month::February => "Feb",
            Month::March => "Mar",
            Month::April => "Apr",
            Month::May => "May",
            Month::June => "Jun",
            Month::July => "Jul",
            Month::August => "Aug",
            Month::September => "Sep",
            Month::October => "Oct",
            Month::November => "Nov",
            Month::December => "Dec",
        }
    }
}

/// The `count` months ending with the month of `today`, oldest first.
pub fn trailing_months(today: Date, count: usize) -> Result<Vec<MonthPeriod>, Error> {
    let mut months = Vec::with_capacity(count);
    let mut month = MonthPeriod::containing(today)?;

    for index in 0..count {
        if index > 0 {
            month = month.previous()?;
        }
        months.push(month);
    }

    months.reverse();

    Ok(months)
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::{MonthPeriod, trailing_months};
    use crate::Error;

    #[test]
    fn new_rejects_invalid_month() {
        assert!(matches!(MonthPeriod::new(2025, 0), Err(Error::Validation(_))));
        assert!(matches!(MonthPeriod::new(2025, 13), Err(Error::Validation(_))));
    }

    #[test]
    fn bounds_handle_leap_years() {
        let february = MonthPeriod::new(2024, 2).unwrap();

        assert_eq!(february.first_day(), date!(2024 - 02 - 01));
        assert_eq!(february.last_day(), date!(2024 - 02 - 29));
        assert_eq!(MonthPeriod::new(2025, 2).unwrap().last_day(), date!(2025 - 02 - 28));
    }

    #[test]
    fn december_ends_on_the_31st() {
        let december = MonthPeriod::new(2024, 12).unwrap();

        assert_eq!(december.last_day(), date!(2024 - 12 - 31));
        assert!(december.contains(date!(2024 - 12 - 31)));
        assert!(!december.contains(date!(2025 - 01 - 01)));
    }

    #[test]
    fn trailing_months_cross_year_boundary() {
        let months = trailing_months(date!(2025 - 02 - 14), 6).unwrap();

        let got: Vec<(i32, u8)> = months.iter().map(|m| (m.year(), m.month())).collect();

        assert_eq!(
            got,
            vec![
                (2024, 9),
                (2024, 10),
                (2024, 11),
                (2024, 12),
                (2025, 1),
                (2025, 2)
            ]
        );
        assert_eq!(months[0].short_label(), "Sep");
    }
}
