//! Concrete periods: a start date plus a number of units.
use super::{PeriodError, PeriodUnit};
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An immutable span of time expressed in a single unit.
///
/// Month and year periods always start on the first day of a month. An
/// eternity period has no meaningful start; it is pinned to `NaiveDate::MIN`
/// so that it sorts before every dated period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Period {
    unit: PeriodUnit,
    start: NaiveDate,
    size: u32,
}

impl Period {
    pub fn new(unit: PeriodUnit, start: NaiveDate, size: u32) -> Result<Self, PeriodError> {
        if unit == PeriodUnit::Eternity {
            return Ok(Self::eternity());
        }
        if size == 0 {
            return Err(PeriodError::ZeroSize { unit });
        }
        if unit != PeriodUnit::Day && start.day() != 1 {
            return Err(PeriodError::Misaligned { unit, start });
        }
        // The stop date must stay representable.
        shift(start, unit, i64::from(size))?;
        Ok(Self { unit, start, size })
    }

    pub fn eternity() -> Self {
        Self { unit: PeriodUnit::Eternity, start: NaiveDate::MIN, size: 1 }
    }

    pub fn day(year: i32, month: u32, day: u32) -> Result<Self, PeriodError> {
        let start = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| PeriodError::Unparsable(format!("{year}-{month}-{day}")))?;
        Self::new(PeriodUnit::Day, start, 1)
    }

    pub fn month(year: i32, month: u32) -> Result<Self, PeriodError> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| PeriodError::Unparsable(format!("{year}-{month}")))?;
        Self::new(PeriodUnit::Month, start, 1)
    }

    pub fn year(year: i32) -> Result<Self, PeriodError> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| PeriodError::Unparsable(year.to_string()))?;
        Self::new(PeriodUnit::Year, start, 1)
    }

    #[inline]
    pub fn unit(&self) -> PeriodUnit { self.unit }
    #[inline]
    pub fn start(&self) -> NaiveDate { self.start }
    #[inline]
    pub fn size(&self) -> u32 { self.size }

    pub fn is_eternity(&self) -> bool {
        self.unit == PeriodUnit::Eternity
    }

    /// The last day covered by the period (inclusive).
    pub fn stop(&self) -> NaiveDate {
        if self.is_eternity() {
            return NaiveDate::MAX;
        }
        // Representability was checked at construction.
        shift(self.start, self.unit, i64::from(self.size))
            .ok()
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    /// Number of days covered, or `None` for eternity.
    pub fn days(&self) -> Option<u32> {
        if self.is_eternity() {
            return None;
        }
        let span = self.stop().signed_duration_since(self.start).num_days() + 1;
        u32::try_from(span).ok()
    }

    /// The single-unit period starting at the same date.
    pub fn first(&self) -> Self {
        Self { size: 1, ..*self }
    }

    /// Moves the period by `n` of its own units.
    pub fn offset(&self, n: i32) -> Result<Self, PeriodError> {
        if self.is_eternity() {
            return Ok(*self);
        }
        let start = shift(self.start, self.unit, i64::from(n))?;
        Self::new(self.unit, start, self.size)
    }

    pub fn contains(&self, other: &Period) -> bool {
        if self.is_eternity() {
            return true;
        }
        if other.is_eternity() {
            return false;
        }
        self.start <= other.start && other.stop() <= self.stop()
    }

    /// The calendar period of `unit` that wholly contains this one.
    pub fn enclosing(&self, unit: PeriodUnit) -> Result<Self, PeriodError> {
        let incompatible = || PeriodError::Incompatible { period: self.to_string(), unit };
        if unit < self.unit {
            return Err(incompatible());
        }
        let candidate = match unit {
            PeriodUnit::Eternity => return Ok(Self::eternity()),
            PeriodUnit::Year => Self::year(self.start.year())?,
            PeriodUnit::Month => Self::month(self.start.year(), self.start.month())?,
            PeriodUnit::Day => Self::new(PeriodUnit::Day, self.start, 1)?,
        };
        if candidate.contains(self) {
            Ok(candidate)
        } else {
            Err(incompatible())
        }
    }

    /// Splits the period into consecutive single-unit periods of `unit`.
    pub fn subperiods(&self, unit: PeriodUnit) -> Result<Vec<Self>, PeriodError> {
        if self.is_eternity() || unit == PeriodUnit::Eternity || unit > self.unit {
            return Err(PeriodError::Incompatible { period: self.to_string(), unit });
        }
        let stop = self.stop();
        let mut cursor = self.start;
        let mut parts = Vec::new();
        while cursor <= stop {
            parts.push(Self::new(unit, cursor, 1)?);
            cursor = shift(cursor, unit, 1)?;
        }
        Ok(parts)
    }

    /// How many `unit` periods fit in this one.
    pub fn size_in(&self, unit: PeriodUnit) -> Result<u32, PeriodError> {
        match (self.unit, unit) {
            (PeriodUnit::Eternity, _) | (_, PeriodUnit::Eternity) => {}
            (from, to) if from == to => return Ok(self.size),
            (PeriodUnit::Year, PeriodUnit::Month) => return Ok(self.size * 12),
            (PeriodUnit::Year | PeriodUnit::Month, PeriodUnit::Day) => {
                if let Some(days) = self.days() {
                    return Ok(days);
                }
            }
            _ => {}
        }
        Err(PeriodError::Incompatible { period: self.to_string(), unit })
    }
}

fn shift(date: NaiveDate, unit: PeriodUnit, n: i64) -> Result<NaiveDate, PeriodError> {
    let magnitude = n.unsigned_abs();
    let shifted = match unit {
        PeriodUnit::Eternity => Some(date),
        PeriodUnit::Day => {
            let days = Days::new(magnitude);
            if n >= 0 { date.checked_add_days(days) } else { date.checked_sub_days(days) }
        }
        PeriodUnit::Month | PeriodUnit::Year => {
            let months = if unit == PeriodUnit::Year { magnitude.saturating_mul(12) } else { magnitude };
            let months = Months::new(u32::try_from(months).map_err(|_| PeriodError::OutOfRange)?);
            if n >= 0 { date.checked_add_months(months) } else { date.checked_sub_months(months) }
        }
    };
    shifted.ok_or(PeriodError::OutOfRange)
}

fn format_start(unit: PeriodUnit, start: NaiveDate) -> String {
    match unit {
        PeriodUnit::Day => start.format("%Y-%m-%d").to_string(),
        PeriodUnit::Month => start.format("%Y-%m").to_string(),
        PeriodUnit::Year if start.month() == 1 => start.format("%Y").to_string(),
        PeriodUnit::Year => start.format("%Y-%m").to_string(),
        PeriodUnit::Eternity => String::new(),
    }
}

/// Parses `YYYY`, `YYYY-MM` or `YYYY-MM-DD`, returning the date and the unit
/// its precision implies.
fn parse_start(text: &str) -> Option<(NaiveDate, PeriodUnit)> {
    let fields: Vec<&str> = text.split('-').collect();
    let year: i32 = fields.first()?.parse().ok()?;
    let month: u32 = fields.get(1).map_or(Some(1), |m| m.parse().ok())?;
    let day: u32 = fields.get(2).map_or(Some(1), |d| d.parse().ok())?;
    let unit = match fields.len() {
        1 => PeriodUnit::Year,
        2 => PeriodUnit::Month,
        3 => PeriodUnit::Day,
        _ => return None,
    };
    Some((NaiveDate::from_ymd_opt(year, month, day)?, unit))
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = format_start(self.unit, self.start);
        match self.unit {
            PeriodUnit::Eternity => f.write_str("ETERNITY"),
            PeriodUnit::Year if self.size == 1 && self.start.month() != 1 => write!(f, "year:{}", start),
            _ if self.size == 1 => f.write_str(&start),
            unit => write!(f, "{}:{}:{}", unit, start, self.size),
        }
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    /// Accepts `2024`, `2024-03`, `2024-03-05`, `ETERNITY` and the explicit
    /// `unit:start[:size]` form (`month:2024-01:6`, `year:2024-03`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let unparsable = || PeriodError::Unparsable(s.to_string());
        if text.eq_ignore_ascii_case("eternity") {
            return Ok(Self::eternity());
        }

        let parts: Vec<&str> = text.split(':').collect();
        match parts.as_slice() {
            [date] => {
                let (start, unit) = parse_start(date).ok_or_else(unparsable)?;
                Self::new(unit, start, 1)
            }
            [unit, date] | [unit, date, _] => {
                let unit: PeriodUnit = unit.parse()?;
                if unit == PeriodUnit::Eternity {
                    return Ok(Self::eternity());
                }
                let (start, _) = parse_start(date).ok_or_else(unparsable)?;
                let size = match parts.get(2) {
                    Some(size) => size.parse::<u32>().map_err(|_| unparsable())?,
                    None => 1,
                };
                Self::new(unit, start, size)
            }
            _ => Err(unparsable()),
        }
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

impl TryFrom<String> for Period {
    type Error = PeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn p(text: &str) -> Period {
        text.parse().unwrap()
    }

    #[rstest]
    #[case("2024", PeriodUnit::Year, "2024-01-01", 1)]
    #[case("2024-03", PeriodUnit::Month, "2024-03-01", 1)]
    #[case("2024-03-05", PeriodUnit::Day, "2024-03-05", 1)]
    #[case("month:2024-01:6", PeriodUnit::Month, "2024-01-01", 6)]
    #[case("year:2024-03", PeriodUnit::Year, "2024-03-01", 1)]
    #[case("year:2020:3", PeriodUnit::Year, "2020-01-01", 3)]
    #[case("day:2024-02-28:3", PeriodUnit::Day, "2024-02-28", 3)]
    fn test_parse(#[case] input: &str, #[case] unit: PeriodUnit, #[case] start: &str, #[case] size: u32) {
        let period = p(input);
        assert_eq!(period.unit(), unit);
        assert_eq!(period.start(), start.parse::<NaiveDate>().unwrap());
        assert_eq!(period.size(), size);
        // Display produces the parseable form.
        assert_eq!(p(&period.to_string()), period);
    }

    #[rstest]
    #[case("")]
    #[case("2024-13")]
    #[case("week:2024")]
    #[case("month:2024-01:0")]
    #[case("month:2024-01:x")]
    #[case("2024-01-02-03")]
    fn test_parse_invalid(#[case] input: &str) {
        assert!(input.parse::<Period>().is_err(), "Should fail: '{}'", input);
    }

    #[test]
    fn test_eternity() {
        let eternity = p("ETERNITY");
        assert!(eternity.is_eternity());
        assert_eq!(eternity.to_string(), "ETERNITY");
        assert!(eternity.contains(&p("2024")));
        assert!(!p("2024").contains(&eternity));
        assert_eq!(eternity.days(), None);
    }

    #[test]
    fn test_month_must_start_on_first_day() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(
            Period::new(PeriodUnit::Month, start, 1),
            Err(PeriodError::Misaligned { unit: PeriodUnit::Month, start })
        );
    }

    #[test]
    fn test_stop_and_days() {
        assert_eq!(p("2024").stop(), NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert_eq!(p("2024-02").stop(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(p("month:2024-01:6").stop(), NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
        assert_eq!(p("2024").days(), Some(366));
        assert_eq!(p("2023").days(), Some(365));
    }

    #[test]
    fn test_subperiods() {
        let months = p("2024").subperiods(PeriodUnit::Month).unwrap();
        assert_eq!(months.len(), 12);
        assert_eq!(months[0], p("2024-01"));
        assert_eq!(months[11], p("2024-12"));

        let half = p("month:2024-01:6").subperiods(PeriodUnit::Month).unwrap();
        assert_eq!(half.len(), 6);

        let days = p("2024-02").subperiods(PeriodUnit::Day).unwrap();
        assert_eq!(days.len(), 29);

        assert!(p("2024-02").subperiods(PeriodUnit::Year).is_err());
        assert!(Period::eternity().subperiods(PeriodUnit::Year).is_err());
    }

    #[test]
    fn test_enclosing() {
        assert_eq!(p("2024-03-05").enclosing(PeriodUnit::Year).unwrap(), p("2024"));
        assert_eq!(p("2024-03-05").enclosing(PeriodUnit::Month).unwrap(), p("2024-03"));
        assert_eq!(p("month:2024-01:6").enclosing(PeriodUnit::Year).unwrap(), p("2024"));
        assert!(p("month:2024-11:3").enclosing(PeriodUnit::Year).is_err());
        assert!(p("2024").enclosing(PeriodUnit::Month).is_err());
        assert!(p("2024").enclosing(PeriodUnit::Eternity).unwrap().is_eternity());
    }

    #[test]
    fn test_size_in() {
        assert_eq!(p("2024").size_in(PeriodUnit::Month).unwrap(), 12);
        assert_eq!(p("2024").size_in(PeriodUnit::Day).unwrap(), 366);
        assert_eq!(p("month:2024-01:6").size_in(PeriodUnit::Month).unwrap(), 6);
        assert!(p("2024-01").size_in(PeriodUnit::Year).is_err());
    }

    #[test]
    fn test_offset() {
        assert_eq!(p("2024-12").offset(1).unwrap(), p("2025-01"));
        assert_eq!(p("2024").offset(-1).unwrap(), p("2023"));
        assert_eq!(p("2024-03-01").offset(-1).unwrap(), p("2024-02-29"));
    }

    #[test]
    fn test_serde_uses_display_form() {
        let json = serde_json::to_string(&p("month:2024-01:6")).unwrap();
        assert_eq!(json, "\"month:2024-01:6\"");
        let back: Period = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p("month:2024-01:6"));
    }
}
