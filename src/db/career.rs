use chrono::NaiveDate;
use rusqlite::{Row, params};

use super::{Database, StoreResult, parsed_column};
use crate::models::{CareerStep, CareerStepKind};

impl Database {
    /// Appends a career step. Steps are never updated or deleted individually;
    /// callers go through the career service so the employee row changes with it.
    pub(crate) fn insert_career_step(
        &self,
        matricola: &str,
        kind: CareerStepKind,
        date: NaiveDate,
    ) -> StoreResult<CareerStep> {
        self.conn.execute(
            "INSERT INTO career_steps (matricola, kind, step_date) VALUES (?1, ?2, ?3)",
            params![matricola, kind.as_str(), date],
        )?;
        Ok(CareerStep {
            id: self.conn.last_insert_rowid(),
            kind,
            date,
            matricola: matricola.to_string(),
        })
    }

    /// Career history, oldest first. `None` lists every employee's steps.
    pub fn list_career_steps(&self, matricola: Option<&str>) -> StoreResult<Vec<CareerStep>> {
        let mut sql = String::from("SELECT id, kind, step_date, matricola FROM career_steps");
        if matricola.is_some() {
            sql.push_str(" WHERE matricola = ?1");
        }
        sql.push_str(" ORDER BY step_date, id");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match matricola {
            Some(m) => stmt.query_map([m], Self::row_to_career_step)?,
            None => stmt.query_map([], Self::row_to_career_step)?,
        };
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn row_to_career_step(row: &Row) -> rusqlite::Result<CareerStep> {
        Ok(CareerStep {
            id: row.get(0)?,
            kind: parsed_column(row, 1)?,
            date: row.get(2)?,
            matricola: row.get(3)?,
        })
    }
}
