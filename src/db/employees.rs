use rusqlite::{OptionalExtension, Row, params};

use super::{Database, StoreResult, decimal_column, decimal_to_sql, expect_changed, insert_error, parsed_column};
use crate::models::{Employee, PermanentEmployee, PersonalData, ProjectEmployee};

pub(crate) const PERMANENT_COLUMNS: &str = "matricola, name, surname, fiscal_code, address, birth_date, hire_date, end_date, seniority, director";

const PROJECT_EMPLOYEE_COLUMNS: &str = "matricola, name, surname, fiscal_code, address, birth_date, hire_date, contract_end, cost, cup";

impl Database {
    // --- Permanent employees ---

    pub fn insert_permanent_employee(&self, employee: &PermanentEmployee) -> StoreResult<()> {
        employee.validate()?;
        let p = &employee.person;
        self.conn
            .execute(
                "INSERT INTO permanent_employees
                    (matricola, name, surname, fiscal_code, address, birth_date, hire_date, end_date, seniority, director)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    p.matricola,
                    p.name,
                    p.surname,
                    p.fiscal_code,
                    p.address,
                    p.birth_date,
                    p.hire_date,
                    employee.end_date,
                    employee.seniority.as_str(),
                    employee.director,
                ],
            )
            .map_err(|e| insert_error(e, "permanent employee", &p.matricola))?;
        Ok(())
    }

    pub fn get_permanent_employee(&self, matricola: &str) -> StoreResult<Option<PermanentEmployee>> {
        let sql = format!("SELECT {PERMANENT_COLUMNS} FROM permanent_employees WHERE matricola = ?1");
        let employee = self
            .conn
            .query_row(&sql, [matricola], Self::row_to_permanent)
            .optional()?;
        Ok(employee)
    }

    pub fn list_permanent_employees(&self, active_only: bool) -> StoreResult<Vec<PermanentEmployee>> {
        let mut sql = format!("SELECT {PERMANENT_COLUMNS} FROM permanent_employees");
        if active_only {
            sql.push_str(" WHERE end_date IS NULL");
        }
        sql.push_str(" ORDER BY matricola");
        self.select_permanent(&sql, [])
    }

    /// Updates personal data and end date. Seniority and the director flag are
    /// left alone: they only change through recorded career steps.
    pub fn update_permanent_employee(&self, employee: &PermanentEmployee) -> StoreResult<()> {
        employee.validate()?;
        let p = &employee.person;
        let changed = self.conn.execute(
            "UPDATE permanent_employees
             SET name = ?2, surname = ?3, fiscal_code = ?4, address = ?5,
                 birth_date = ?6, hire_date = ?7, end_date = ?8
             WHERE matricola = ?1",
            params![
                p.matricola,
                p.name,
                p.surname,
                p.fiscal_code,
                p.address,
                p.birth_date,
                p.hire_date,
                employee.end_date,
            ],
        )?;
        expect_changed(changed, "permanent employee", &p.matricola)
    }

    /// Writes the career-controlled columns. Only career step recording calls this.
    pub(crate) fn write_career_state(&self, employee: &PermanentEmployee) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE permanent_employees SET seniority = ?2, director = ?3 WHERE matricola = ?1",
            params![
                employee.person.matricola,
                employee.seniority.as_str(),
                employee.director,
            ],
        )?;
        expect_changed(changed, "permanent employee", &employee.person.matricola)
    }

    pub fn delete_permanent_employee(&self, matricola: &str) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM permanent_employees WHERE matricola = ?1", [matricola])?;
        expect_changed(changed, "permanent employee", matricola)
    }

    pub(crate) fn select_permanent<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> StoreResult<Vec<PermanentEmployee>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_permanent)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn row_to_person(row: &Row) -> rusqlite::Result<PersonalData> {
        Ok(PersonalData {
            matricola: row.get(0)?,
            name: row.get(1)?,
            surname: row.get(2)?,
            fiscal_code: row.get(3)?,
            address: row.get(4)?,
            birth_date: row.get(5)?,
            hire_date: row.get(6)?,
        })
    }

    pub(crate) fn row_to_permanent(row: &Row) -> rusqlite::Result<PermanentEmployee> {
        Ok(PermanentEmployee {
            person: Self::row_to_person(row)?,
            end_date: row.get(7)?,
            seniority: parsed_column(row, 8)?,
            director: row.get(9)?,
        })
    }

    // --- Project employees ---

    pub fn insert_project_employee(&self, employee: &ProjectEmployee) -> StoreResult<()> {
        employee.validate()?;
        let p = &employee.person;
        self.conn
            .execute(
                "INSERT INTO project_employees
                    (matricola, name, surname, fiscal_code, address, birth_date, hire_date, contract_end, cost, cup)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    p.matricola,
                    p.name,
                    p.surname,
                    p.fiscal_code,
                    p.address,
                    p.birth_date,
                    p.hire_date,
                    employee.contract_end,
                    decimal_to_sql(&employee.cost),
                    employee.project,
                ],
            )
            .map_err(|e| insert_error(e, "project employee", &p.matricola))?;
        Ok(())
    }

    pub fn get_project_employee(&self, matricola: &str) -> StoreResult<Option<ProjectEmployee>> {
        let sql = format!("SELECT {PROJECT_EMPLOYEE_COLUMNS} FROM project_employees WHERE matricola = ?1");
        let employee = self
            .conn
            .query_row(&sql, [matricola], Self::row_to_project_employee)
            .optional()?;
        Ok(employee)
    }

    pub fn list_project_employees(&self, project: Option<&str>) -> StoreResult<Vec<ProjectEmployee>> {
        let mut sql = format!("SELECT {PROJECT_EMPLOYEE_COLUMNS} FROM project_employees");
        if project.is_some() {
            sql.push_str(" WHERE cup = ?1");
        }
        sql.push_str(" ORDER BY matricola");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match project {
            Some(cup) => stmt.query_map([cup], Self::row_to_project_employee)?,
            None => stmt.query_map([], Self::row_to_project_employee)?,
        };
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Updates personal data, contract end and cost. The owning project only
    /// changes through [`Database::set_project_employee_project`].
    pub fn update_project_employee(&self, employee: &ProjectEmployee) -> StoreResult<()> {
        employee.validate()?;
        let p = &employee.person;
        let changed = self.conn.execute(
            "UPDATE project_employees
             SET name = ?2, surname = ?3, fiscal_code = ?4, address = ?5,
                 birth_date = ?6, hire_date = ?7, contract_end = ?8, cost = ?9
             WHERE matricola = ?1",
            params![
                p.matricola,
                p.name,
                p.surname,
                p.fiscal_code,
                p.address,
                p.birth_date,
                p.hire_date,
                employee.contract_end,
                decimal_to_sql(&employee.cost),
            ],
        )?;
        expect_changed(changed, "project employee", &p.matricola)
    }

    pub fn set_project_employee_project(&self, matricola: &str, cup: &str) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE project_employees SET cup = ?2 WHERE matricola = ?1",
            params![matricola, cup],
        )?;
        expect_changed(changed, "project employee", matricola)
    }

    pub fn delete_project_employee(&self, matricola: &str) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM project_employees WHERE matricola = ?1", [matricola])?;
        expect_changed(changed, "project employee", matricola)
    }

    fn row_to_project_employee(row: &Row) -> rusqlite::Result<ProjectEmployee> {
        Ok(ProjectEmployee {
            person: Self::row_to_person(row)?,
            contract_end: row.get(7)?,
            cost: decimal_column(row, 8)?,
            project: row.get(9)?,
        })
    }

    // --- Either kind ---

    /// Looks the matricola up among permanent employees first, then project employees.
    pub fn get_employee(&self, matricola: &str) -> StoreResult<Option<Employee>> {
        if let Some(employee) = self.get_permanent_employee(matricola)? {
            return Ok(Some(Employee::Permanent(employee)));
        }
        Ok(self
            .get_project_employee(matricola)?
            .map(Employee::Contracted))
    }
}
