//! Rule for formula attributes: name parsing and start dates.
use crate::store::FORMULA_INCEPTION;
use crate::validation::declaration::FORMULA_PREFIX;
use chrono::NaiveDate;

/// True for `formula` and `formula_<anything>`.
pub(crate) fn is_formula_key(key: &str) -> bool {
    key == FORMULA_PREFIX
        || key
            .strip_prefix(FORMULA_PREFIX)
            .is_some_and(|rest| rest.starts_with('_'))
}

/// Reads the start date encoded in a formula attribute name.
///
/// `formula` applies from inception; `formula_YYYY`, `formula_YYYY_MM` and
/// `formula_YYYY_MM_DD` apply from the first day they designate.
pub(crate) fn start_date(key: &str) -> Result<NaiveDate, String> {
    if key == FORMULA_PREFIX {
        return Ok(FORMULA_INCEPTION);
    }
    let suffix = key
        .strip_prefix(FORMULA_PREFIX)
        .and_then(|rest| rest.strip_prefix('_'))
        .ok_or_else(|| format!("'{}' does not start with '{}_'", key, FORMULA_PREFIX))?;

    let fields: Vec<&str> = suffix.split('_').collect();
    let number = |idx: usize, width: usize| -> Result<Option<u32>, String> {
        match fields.get(idx) {
            None => Ok(None),
            Some(f) if f.len() == width && f.chars().all(|c| c.is_ascii_digit()) => {
                f.parse().map(Some).map_err(|_| format!("bad date field '{}'", f))
            }
            Some(f) => Err(format!("bad date field '{}', expected YYYY_MM_DD", f)),
        }
    };
    if fields.len() > 3 {
        return Err(format!("'{}' has too many date fields", suffix));
    }
    let year = number(0, 4)?.ok_or_else(|| "missing year".to_string())?;
    let month = number(1, 2)?.unwrap_or(1);
    let day = number(2, 2)?.unwrap_or(1);
    NaiveDate::from_ymd_opt(year as i32, month, day).ok_or_else(|| format!("'{}' is not a calendar date", suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("formula", true)]
    #[case("formula_2015_01_01", true)]
    #[case("formula_bad", true)]
    #[case("formulas", false)]
    #[case("label", false)]
    fn test_is_formula_key(#[case] key: &str, #[case] expected: bool) {
        assert_eq!(is_formula_key(key), expected);
    }

    #[rstest]
    #[case("formula_2015_01_01", "2015-01-01")]
    #[case("formula_2015_07", "2015-07-01")]
    #[case("formula_2002", "2002-01-01")]
    fn test_start_date(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(start_date(key).unwrap(), expected.parse::<NaiveDate>().unwrap());
    }

    #[test]
    fn test_inception() {
        assert_eq!(start_date("formula").unwrap(), FORMULA_INCEPTION);
    }

    #[rstest]
    #[case("formula_bad")]
    #[case("formula_2015_13_01")]
    #[case("formula_2015_02_30")]
    #[case("formula_15_01_01")]
    #[case("formula_2015_01_01_01")]
    #[case("formula_")]
    fn test_invalid_names(#[case] key: &str) {
        assert!(start_date(key).is_err(), "Should fail: '{}'", key);
    }
}
