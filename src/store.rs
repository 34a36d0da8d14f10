use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;

use crate::db::StoreResult;
use crate::error::StoreError;
use crate::models::{Laboratory, PermanentEmployee, Seniority};

/// Tenure and activity test used for referent and owner candidacy.
///
/// An employee passes when `hire_date + min_tenure_years <= as_of` and either
/// has no end date, or `project_end` is known, the employee left on or after
/// it, and that departure is already in the past relative to `today`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenureFilter {
    pub min_tenure_years: u32,
    pub as_of: NaiveDate,
    pub project_end: Option<NaiveDate>,
    pub today: NaiveDate,
    pub director_only: bool,
}

impl TenureFilter {
    /// Latest hire date whose `min_tenure_years` anniversary falls on or before
    /// `as_of`. Anniversaries clamp to month end, so 2016-02-29 + 7 years is
    /// 2023-02-28. `None` when the date range is exceeded.
    pub fn latest_qualifying_hire_date(&self) -> Option<NaiveDate> {
        let span = Months::new(self.min_tenure_years.saturating_mul(12));
        let mut cutoff = self.as_of.checked_sub_months(span)?;
        // Subtraction clamps too, so a leap day just past the cutoff may still qualify.
        while let Some(next) = cutoff.succ_opt() {
            match next.checked_add_months(span) {
                Some(anniversary) if anniversary <= self.as_of => cutoff = next,
                _ => break,
            }
        }
        Some(cutoff)
    }
}

/// Read contract the eligibility engine needs from storage.
pub trait RecordStore {
    /// Employees without an end date at the given seniority.
    fn find_active_employees_by_seniority(&self, level: Seniority) -> StoreResult<Vec<PermanentEmployee>>;

    /// Employees whose stored seniority matches `level` case-insensitively,
    /// former employees included.
    fn find_employees_by_seniority(&self, level: Seniority) -> StoreResult<Vec<PermanentEmployee>>;

    fn find_employees_by_director_flag(&self, director: bool) -> StoreResult<Vec<PermanentEmployee>>;

    fn find_employees_by_hire_date_offset(&self, filter: &TenureFilter) -> StoreResult<Vec<PermanentEmployee>>;

    /// `None` when the project bought nothing.
    fn sum_equipment_cost_by_project(&self, cup: &str) -> StoreResult<Option<Decimal>>;

    /// `None` when nobody was hired under the project.
    fn sum_staff_cost_by_project(&self, cup: &str) -> StoreResult<Option<Decimal>>;

    /// Laboratories that do (`included`) or do not collaborate on the project.
    fn find_laboratories_by_project_membership(&self, cup: &str, included: bool) -> StoreResult<Vec<Laboratory>>;
}

/// Exact sum that keeps "no rows" distinct from "rows summing to zero".
pub(crate) fn checked_sum(
    what: &'static str,
    values: impl IntoIterator<Item = Decimal>,
) -> StoreResult<Option<Decimal>> {
    let mut total: Option<Decimal> = None;
    for value in values {
        let sum = total
            .unwrap_or_default()
            .checked_add(value)
            .ok_or(StoreError::Overflow(what))?;
        total = Some(sum);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn filter(years: u32, as_of: NaiveDate) -> TenureFilter {
        TenureFilter {
            min_tenure_years: years,
            as_of,
            project_end: None,
            today: as_of,
            director_only: false,
        }
    }

    #[test]
    fn test_checked_sum_distinguishes_empty_from_zero() {
        assert_eq!(checked_sum("costs", Vec::new()).unwrap(), None);
        assert_eq!(checked_sum("costs", vec![Decimal::ZERO]).unwrap(), Some(Decimal::ZERO));
        assert_eq!(
            checked_sum("costs", vec![Decimal::new(10000, 2), Decimal::new(25050, 2)]).unwrap(),
            Some(Decimal::new(35050, 2))
        );
    }

    #[test]
    fn test_checked_sum_reports_overflow() {
        let err = checked_sum("equipment cost", vec![Decimal::MAX, Decimal::ONE]).unwrap_err();
        assert!(matches!(err, StoreError::Overflow("equipment cost")));
    }

    #[test]
    fn test_hire_cutoff_on_plain_dates() {
        assert_eq!(
            filter(7, date(2023, 1, 1)).latest_qualifying_hire_date(),
            Some(date(2016, 1, 1))
        );
        assert_eq!(
            filter(0, date(2017, 1, 1)).latest_qualifying_hire_date(),
            Some(date(2017, 1, 1))
        );
    }

    #[test]
    fn test_hire_cutoff_includes_leap_day_anniversaries() {
        // 2016-02-29 + 7 years = 2023-02-28.
        assert_eq!(
            filter(7, date(2023, 2, 28)).latest_qualifying_hire_date(),
            Some(date(2016, 2, 29))
        );
        assert_eq!(
            filter(7, date(2023, 2, 27)).latest_qualifying_hire_date(),
            Some(date(2016, 2, 27))
        );
        assert_eq!(
            filter(7, date(2023, 3, 1)).latest_qualifying_hire_date(),
            Some(date(2016, 3, 1))
        );
    }
}
