use rusqlite::types::Type;
use rusqlite::{Connection, Row, Transaction};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::error::StoreError;

mod career;
mod employees;
mod organization;
mod queries;

pub type StoreResult<T> = Result<T, StoreError>;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS permanent_employees (
        matricola TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        surname TEXT NOT NULL,
        fiscal_code TEXT NOT NULL UNIQUE,
        address TEXT,
        birth_date TEXT NOT NULL,
        hire_date TEXT NOT NULL,
        end_date TEXT,
        seniority TEXT NOT NULL DEFAULT 'Junior' CHECK (seniority IN ('Junior', 'Middle', 'Senior')),
        director INTEGER NOT NULL DEFAULT 0 CHECK (director IN (0, 1))
    );

    CREATE TABLE IF NOT EXISTS projects (
        cup TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        budget TEXT NOT NULL,
        start_date TEXT NOT NULL,
        end_date TEXT,
        referent TEXT NOT NULL REFERENCES permanent_employees(matricola),
        owner TEXT NOT NULL REFERENCES permanent_employees(matricola)
    );

    CREATE TABLE IF NOT EXISTS project_employees (
        matricola TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        surname TEXT NOT NULL,
        fiscal_code TEXT NOT NULL UNIQUE,
        address TEXT,
        birth_date TEXT NOT NULL,
        hire_date TEXT NOT NULL,
        contract_end TEXT NOT NULL,
        cost TEXT NOT NULL,
        cup TEXT NOT NULL REFERENCES projects(cup)
    );

    CREATE TABLE IF NOT EXISTS laboratories (
        name TEXT PRIMARY KEY,
        topic TEXT NOT NULL,
        director TEXT NOT NULL REFERENCES permanent_employees(matricola)
    );

    CREATE TABLE IF NOT EXISTS equipment (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        description TEXT NOT NULL,
        cost TEXT NOT NULL,
        cup TEXT NOT NULL REFERENCES projects(cup),
        laboratory TEXT REFERENCES laboratories(name) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS career_steps (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        matricola TEXT NOT NULL REFERENCES permanent_employees(matricola) ON DELETE CASCADE,
        kind TEXT NOT NULL CHECK (kind IN ('Middle', 'Senior', 'Promosso_a_dirigente', 'Rimosso_da_dirigente')),
        step_date TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS affiliations (
        matricola TEXT NOT NULL REFERENCES permanent_employees(matricola) ON DELETE CASCADE,
        laboratory TEXT NOT NULL REFERENCES laboratories(name) ON DELETE CASCADE,
        PRIMARY KEY (matricola, laboratory)
    );

    CREATE TABLE IF NOT EXISTS lab_projects (
        laboratory TEXT NOT NULL REFERENCES laboratories(name) ON DELETE CASCADE,
        cup TEXT NOT NULL REFERENCES projects(cup) ON DELETE CASCADE,
        PRIMARY KEY (laboratory, cup)
    );

    CREATE INDEX IF NOT EXISTS idx_project_employees_cup ON project_employees(cup);
    CREATE INDEX IF NOT EXISTS idx_equipment_cup ON equipment(cup);
    CREATE INDEX IF NOT EXISTS idx_equipment_laboratory ON equipment(laboratory);
    CREATE INDEX IF NOT EXISTS idx_career_steps_matricola ON career_steps(matricola);
    CREATE INDEX IF NOT EXISTS idx_lab_projects_cup ON lab_projects(cup);
"#;

/// SQLite-backed record store. Owns its connection, which is closed when the
/// store is dropped.
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;
        debug!(path = %path.display(), "opened database");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(Self { conn, path: None })
    }

    fn configure(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(())
    }

    /// Location on disk, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn init(&self) -> StoreResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> StoreResult<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='permanent_employees'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(StoreError::NotInitialized);
        }
        Ok(())
    }

    /// Starts a transaction on the store's connection. Statements issued through
    /// `self` until the transaction is committed belong to it; dropping it
    /// without committing rolls everything back.
    pub fn transaction(&self) -> StoreResult<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }
}

// --- Column helpers ---

pub(crate) fn decimal_to_sql(value: &Decimal) -> String {
    value.to_string()
}

pub(crate) fn decimal_column(row: &Row, index: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(index)?;
    Decimal::from_str(raw.trim())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

pub(crate) fn parsed_column<T>(row: &Row, index: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(index)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

/// Turns a primary-key collision on insert into [`StoreError::Conflict`].
pub(crate) fn insert_error(err: rusqlite::Error, entity: &'static str, key: &str) -> StoreError {
    if let rusqlite::Error::SqliteFailure(code, _) = &err {
        if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY {
            return StoreError::Conflict {
                entity,
                key: key.to_string(),
            };
        }
    }
    err.into()
}

pub(crate) fn expect_changed(changed: usize, entity: &'static str, key: &str) -> StoreResult<()> {
    if changed == 0 {
        return Err(StoreError::NotFound {
            entity,
            key: key.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::Database;
    use crate::models::{
        Laboratory, NewEquipment, PermanentEmployee, PersonalData, Project, ProjectEmployee,
        Seniority,
    };
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    pub fn money(raw: &str) -> Decimal {
        raw.parse().expect("valid decimal")
    }

    pub fn database() -> Database {
        let db = Database::open_in_memory().expect("in-memory database opens");
        db.init().expect("schema applies");
        db
    }

    /// Builds a syntactically valid fiscal code that is unique per matricola.
    fn fiscal_code(matricola: &str) -> String {
        let digits: String = matricola
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect::<String>();
        let digits = format!("{:0>3}", digits);
        let tail = &digits[digits.len() - 3..];
        format!("RSSMRA80A01H{}Z", tail)
    }

    fn person(matricola: &str, hire_date: NaiveDate) -> PersonalData {
        PersonalData {
            matricola: matricola.to_string(),
            name: "Nome".to_string(),
            surname: format!("Cognome {matricola}"),
            fiscal_code: fiscal_code(matricola),
            address: None,
            birth_date: date(1970, 1, 1),
            hire_date,
        }
    }

    pub fn permanent(
        matricola: &str,
        hire_date: NaiveDate,
        end_date: Option<NaiveDate>,
        seniority: Seniority,
        director: bool,
    ) -> PermanentEmployee {
        PermanentEmployee {
            person: person(matricola, hire_date),
            end_date,
            seniority,
            director,
        }
    }

    pub fn contracted(matricola: &str, project: &str, cost: &str) -> ProjectEmployee {
        ProjectEmployee {
            person: person(matricola, date(2023, 1, 1)),
            contract_end: date(2025, 12, 31),
            cost: money(cost),
            project: project.to_string(),
        }
    }

    pub fn project(cup: &str, referent: &str, owner: &str) -> Project {
        Project {
            cup: cup.to_string(),
            name: format!("Progetto {cup}"),
            budget: money("100000.00"),
            start_date: date(2023, 1, 1),
            end_date: None,
            referent: referent.to_string(),
            owner: owner.to_string(),
        }
    }

    pub fn laboratory(name: &str, director: &str) -> Laboratory {
        Laboratory {
            name: name.to_string(),
            topic: format!("Ricerca {name}"),
            director: director.to_string(),
        }
    }

    pub fn purchase(description: &str, cost: &str, project: &str) -> NewEquipment {
        NewEquipment {
            description: description.to_string(),
            cost: money(cost),
            project: project.to_string(),
            laboratory: None,
        }
    }

    /// A senior director M001 heading lab "Fotonica", referent/owner of P1.
    pub fn seeded() -> Database {
        let db = database();
        db.insert_permanent_employee(&permanent("M001", date(2015, 1, 1), None, Seniority::Senior, true))
            .unwrap();
        db.insert_project(&project("P1", "M001", "M001")).unwrap();
        db.insert_laboratory(&laboratory("Fotonica", "M001")).unwrap();
        db.affiliate("M001", "Fotonica").unwrap();
        db
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let db = database();
        db.init().unwrap();
        db.ensure_initialized().unwrap();
    }

    #[test]
    fn test_uninitialized_database_is_reported() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.ensure_initialized(), Err(StoreError::NotInitialized)));
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let db = seeded();
        {
            let _tx = db.transaction().unwrap();
            db.delete_laboratory("Fotonica").unwrap();
        }
        assert!(db.get_laboratory("Fotonica").unwrap().is_some());

        let tx = db.transaction().unwrap();
        db.delete_laboratory("Fotonica").unwrap();
        tx.commit().unwrap();
        assert!(db.get_laboratory("Fotonica").unwrap().is_none());
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = std::env::temp_dir().join(format!("labstaff-test-{}", std::process::id()));
        let path = dir.join("nested").join("labstaff.db");
        {
            let db = Database::open(&path).unwrap();
            db.init().unwrap();
            assert_eq!(db.path(), Some(path.as_path()));
        }
        assert!(path.exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
