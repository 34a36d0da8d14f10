use rusqlite::params;
use rust_decimal::Decimal;

use super::employees::PERMANENT_COLUMNS;
use super::organization::LABORATORY_COLUMNS;
use super::{Database, StoreResult};
use crate::models::{Laboratory, PermanentEmployee, Seniority};
use crate::store::{RecordStore, TenureFilter, checked_sum};

impl RecordStore for Database {
    fn find_active_employees_by_seniority(&self, level: Seniority) -> StoreResult<Vec<PermanentEmployee>> {
        let sql = format!(
            "SELECT {PERMANENT_COLUMNS} FROM permanent_employees
             WHERE end_date IS NULL AND seniority = ?1
             ORDER BY matricola"
        );
        self.select_permanent(&sql, [level.as_str()])
    }

    fn find_employees_by_seniority(&self, level: Seniority) -> StoreResult<Vec<PermanentEmployee>> {
        let sql = format!(
            "SELECT {PERMANENT_COLUMNS} FROM permanent_employees
             WHERE LOWER(seniority) = LOWER(?1)
             ORDER BY matricola"
        );
        self.select_permanent(&sql, [level.as_str()])
    }

    fn find_employees_by_director_flag(&self, director: bool) -> StoreResult<Vec<PermanentEmployee>> {
        let sql = format!(
            "SELECT {PERMANENT_COLUMNS} FROM permanent_employees
             WHERE director = ?1
             ORDER BY matricola"
        );
        self.select_permanent(&sql, [director])
    }

    fn find_employees_by_hire_date_offset(&self, filter: &TenureFilter) -> StoreResult<Vec<PermanentEmployee>> {
        let Some(cutoff) = filter.latest_qualifying_hire_date() else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT {PERMANENT_COLUMNS} FROM permanent_employees
             WHERE hire_date <= ?1
               AND (?4 = 0 OR director = 1)
               AND (end_date IS NULL
                    OR (?2 IS NOT NULL AND end_date >= ?2 AND ?3 > end_date))
             ORDER BY matricola"
        );
        self.select_permanent(
            &sql,
            params![cutoff, filter.project_end, filter.today, filter.director_only],
        )
    }

    fn sum_equipment_cost_by_project(&self, cup: &str) -> StoreResult<Option<Decimal>> {
        checked_sum("equipment cost", self.equipment_costs(cup)?)
    }

    fn sum_staff_cost_by_project(&self, cup: &str) -> StoreResult<Option<Decimal>> {
        checked_sum("staff cost", self.staff_costs(cup)?)
    }

    fn find_laboratories_by_project_membership(&self, cup: &str, included: bool) -> StoreResult<Vec<Laboratory>> {
        let membership = if included { "IN" } else { "NOT IN" };
        let sql = format!(
            "SELECT {LABORATORY_COLUMNS} FROM laboratories
             WHERE name {membership} (SELECT laboratory FROM lab_projects WHERE cup = ?1)
             ORDER BY name"
        );
        self.select_laboratories(&sql, [cup])
    }
}
