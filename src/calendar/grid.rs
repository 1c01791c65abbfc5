use crate::model::CalendarError;
use chrono::{Datelike, Months, NaiveDate, Weekday};

/// A month that is known to exist, identified by its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthAnchor {
    first: NaiveDate,
}

impl MonthAnchor {
    pub fn from_ym(year: i32, month: u32) -> Result<Self, CalendarError> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|first| MonthAnchor { first })
            .ok_or_else(|| CalendarError::InvalidAnchor(format!("{year:04}-{month:02}")))
    }

    /// The month containing `date`; the day of month is ignored.
    pub fn of(date: NaiveDate) -> Self {
        MonthAnchor {
            first: date.with_day(1).unwrap_or(date),
        }
    }

    /// Accepts `YYYY-MM` or a full `YYYY-MM-DD`.
    pub fn parse(input: &str) -> Result<Self, CalendarError> {
        let raw = input.trim();
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Ok(Self::of(date));
        }
        let invalid = || CalendarError::InvalidAnchor(raw.to_string());
        let (year, month) = raw.split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::from_ym(year, month).map_err(|_| invalid())
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn days(&self) -> u32 {
        days_in_month(self.year(), self.month())
    }

    pub fn prev(&self) -> Self {
        self.first
            .checked_sub_months(Months::new(1))
            .map(Self::of)
            .unwrap_or(*self)
    }

    pub fn next(&self) -> Self {
        self.first
            .checked_add_months(Months::new(1))
            .map(Self::of)
            .unwrap_or(*self)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year() && date.month() == self.month()
    }

    pub fn label(&self) -> String {
        self.first.format("%B %Y").to_string()
    }
}

/// Number of days in `month`, taken as the day before the first of the
/// following month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        // only December of the last representable year gets here
        .unwrap_or(31)
}

/// Empty cells before the first of the month when weeks start on `first_weekday`.
pub fn leading_padding(first_of_month: NaiveDate, first_weekday: Weekday) -> u32 {
    let weekday = first_of_month.weekday().num_days_from_monday();
    (weekday + 7 - first_weekday.num_days_from_monday()) % 7
}

/// Weekdays in display order, starting at `first_weekday`.
pub fn week_order(first_weekday: Weekday) -> [Weekday; 7] {
    let mut days = [first_weekday; 7];
    for idx in 1..7 {
        days[idx] = days[idx - 1].succ();
    }
    days
}

/// Cells for the month containing `anchor`: `None` for leading padding, then
/// every day of the month in order.
pub fn month_cells(anchor: NaiveDate, first_weekday: Weekday) -> Vec<Option<NaiveDate>> {
    let month = MonthAnchor::of(anchor);
    let first = month.first_day();
    let padding = leading_padding(first, first_weekday) as usize;
    let days = month.days();

    let mut cells = Vec::with_capacity(padding + days as usize);
    cells.extend(std::iter::repeat(None).take(padding));
    cells.extend((1..=days).filter_map(|day| first.with_day(day)).map(Some));
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn is_leap(year: i32) -> bool {
        (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
    }

    #[test]
    fn march_2024_monday_start() {
        let cells = month_cells(date(2024, 3, 17), Weekday::Mon);
        // March 1st 2024 is a Friday
        assert_eq!(cells.iter().take_while(|c| c.is_none()).count(), 4);
        assert_eq!(cells.len(), 35);
        assert_eq!(cells[4], Some(date(2024, 3, 1)));
        assert_eq!(cells.last().copied().flatten(), Some(date(2024, 3, 31)));
    }

    #[test]
    fn march_2024_sunday_start() {
        let cells = month_cells(date(2024, 3, 1), Weekday::Sun);
        assert_eq!(cells.iter().take_while(|c| c.is_none()).count(), 5);
        assert_eq!(cells.len(), 36);
    }

    #[test]
    fn month_starting_on_first_weekday_has_no_padding() {
        // April 1st 2024 is a Monday
        let cells = month_cells(date(2024, 4, 30), Weekday::Mon);
        assert_eq!(cells[0], Some(date(2024, 4, 1)));
        assert_eq!(cells.len(), 30);
    }

    #[test]
    fn sunday_first_gets_six_cells_of_padding() {
        // September 1st 2024 is a Sunday
        let cells = month_cells(date(2024, 9, 1), Weekday::Mon);
        assert_eq!(cells.iter().take_while(|c| c.is_none()).count(), 6);
    }

    #[test]
    fn day_cells_are_one_through_month_length() {
        for year in [1900, 2000, 2023, 2024, 2100] {
            for month in 1..=12 {
                let first = date(year, month, 1);
                let cells = month_cells(first, Weekday::Mon);
                let padding = leading_padding(first, Weekday::Mon) as usize;
                let days = days_in_month(year, month);
                assert_eq!(cells.len(), padding + days as usize);
                assert!(cells[..padding].iter().all(Option::is_none));
                let numbers: Vec<u32> = cells[padding..]
                    .iter()
                    .map(|c| c.map(|d| d.day()).unwrap())
                    .collect();
                assert_eq!(numbers, (1..=days).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn february_follows_gregorian_leap_rule() {
        for year in [1900, 1996, 2000, 2023, 2024, 2100, 2400] {
            let expected = if is_leap(year) { 29 } else { 28 };
            let cells = month_cells(date(year, 2, 14), Weekday::Mon);
            assert_eq!(cells.iter().flatten().count(), expected, "year {year}");
        }
    }

    #[test]
    fn month_lengths() {
        let lengths = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
        for (idx, len) in lengths.iter().enumerate() {
            assert_eq!(days_in_month(2023, idx as u32 + 1), *len);
        }
    }

    #[test]
    fn anchor_parse_accepts_month_and_date() {
        assert_eq!(
            MonthAnchor::parse("2024-03").unwrap(),
            MonthAnchor::from_ym(2024, 3).unwrap()
        );
        assert_eq!(
            MonthAnchor::parse("2024-03-17").unwrap().first_day(),
            date(2024, 3, 1)
        );
    }

    #[test]
    fn anchor_parse_rejects_garbage() {
        for raw in ["", "march", "2024-13", "2024-00", "2024/03"] {
            assert!(
                matches!(MonthAnchor::parse(raw), Err(CalendarError::InvalidAnchor(_))),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn anchor_navigation_crosses_years() {
        let jan = MonthAnchor::from_ym(2024, 1).unwrap();
        assert_eq!(jan.prev(), MonthAnchor::from_ym(2023, 12).unwrap());
        assert_eq!(jan.prev().next(), jan);
        assert!(jan.contains(date(2024, 1, 31)));
        assert!(!jan.contains(date(2023, 1, 31)));
    }

    #[test]
    fn week_order_wraps() {
        assert_eq!(
            week_order(Weekday::Sun),
            [
                Weekday::Sun,
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat
            ]
        );
    }
}
