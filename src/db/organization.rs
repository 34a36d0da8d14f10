use rusqlite::{OptionalExtension, Row, params};

use super::{Database, StoreResult, decimal_column, decimal_to_sql, expect_changed, insert_error};
use crate::models::{Equipment, Laboratory, NewEquipment, Project};

pub(crate) const LABORATORY_COLUMNS: &str = "name, topic, director";
const PROJECT_COLUMNS: &str = "cup, name, budget, start_date, end_date, referent, owner";
const EQUIPMENT_COLUMNS: &str = "id, description, cost, cup, laboratory";

impl Database {
    // --- Laboratories ---

    pub fn insert_laboratory(&self, lab: &Laboratory) -> StoreResult<()> {
        lab.validate()?;
        self.conn
            .execute(
                "INSERT INTO laboratories (name, topic, director) VALUES (?1, ?2, ?3)",
                params![lab.name, lab.topic, lab.director],
            )
            .map_err(|e| insert_error(e, "laboratory", &lab.name))?;
        Ok(())
    }

    pub fn get_laboratory(&self, name: &str) -> StoreResult<Option<Laboratory>> {
        let sql = format!("SELECT {LABORATORY_COLUMNS} FROM laboratories WHERE name = ?1");
        Ok(self
            .conn
            .query_row(&sql, [name], Self::row_to_laboratory)
            .optional()?)
    }

    pub fn list_laboratories(&self) -> StoreResult<Vec<Laboratory>> {
        let sql = format!("SELECT {LABORATORY_COLUMNS} FROM laboratories ORDER BY name");
        self.select_laboratories(&sql, [])
    }

    pub fn update_laboratory(&self, lab: &Laboratory) -> StoreResult<()> {
        lab.validate()?;
        let changed = self.conn.execute(
            "UPDATE laboratories SET topic = ?2, director = ?3 WHERE name = ?1",
            params![lab.name, lab.topic, lab.director],
        )?;
        expect_changed(changed, "laboratory", &lab.name)
    }

    pub fn delete_laboratory(&self, name: &str) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM laboratories WHERE name = ?1", [name])?;
        expect_changed(changed, "laboratory", name)
    }

    pub(crate) fn select_laboratories<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> StoreResult<Vec<Laboratory>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_laboratory)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn row_to_laboratory(row: &Row) -> rusqlite::Result<Laboratory> {
        Ok(Laboratory {
            name: row.get(0)?,
            topic: row.get(1)?,
            director: row.get(2)?,
        })
    }

    // --- Projects ---

    pub fn insert_project(&self, project: &Project) -> StoreResult<()> {
        project.validate()?;
        self.conn
            .execute(
                "INSERT INTO projects (cup, name, budget, start_date, end_date, referent, owner)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    project.cup,
                    project.name,
                    decimal_to_sql(&project.budget),
                    project.start_date,
                    project.end_date,
                    project.referent,
                    project.owner,
                ],
            )
            .map_err(|e| insert_error(e, "project", &project.cup))?;
        Ok(())
    }

    pub fn get_project(&self, cup: &str) -> StoreResult<Option<Project>> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE cup = ?1");
        Ok(self
            .conn
            .query_row(&sql, [cup], Self::row_to_project)
            .optional()?)
    }

    pub fn get_project_by_name(&self, name: &str) -> StoreResult<Option<Project>> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE LOWER(name) = LOWER(?1)");
        Ok(self
            .conn
            .query_row(&sql, [name], Self::row_to_project)
            .optional()?)
    }

    pub fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY cup");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::row_to_project)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn update_project(&self, project: &Project) -> StoreResult<()> {
        project.validate()?;
        let changed = self.conn.execute(
            "UPDATE projects
             SET name = ?2, budget = ?3, start_date = ?4, end_date = ?5, referent = ?6, owner = ?7
             WHERE cup = ?1",
            params![
                project.cup,
                project.name,
                decimal_to_sql(&project.budget),
                project.start_date,
                project.end_date,
                project.referent,
                project.owner,
            ],
        )?;
        expect_changed(changed, "project", &project.cup)
    }

    pub fn delete_project(&self, cup: &str) -> StoreResult<()> {
        let changed = self.conn.execute("DELETE FROM projects WHERE cup = ?1", [cup])?;
        expect_changed(changed, "project", cup)
    }

    fn row_to_project(row: &Row) -> rusqlite::Result<Project> {
        Ok(Project {
            cup: row.get(0)?,
            name: row.get(1)?,
            budget: decimal_column(row, 2)?,
            start_date: row.get(3)?,
            end_date: row.get(4)?,
            referent: row.get(5)?,
            owner: row.get(6)?,
        })
    }

    // --- Equipment ---

    pub fn add_equipment(&self, purchase: &NewEquipment) -> StoreResult<i64> {
        purchase.validate()?;
        self.conn.execute(
            "INSERT INTO equipment (description, cost, cup, laboratory) VALUES (?1, ?2, ?3, ?4)",
            params![
                purchase.description,
                decimal_to_sql(&purchase.cost),
                purchase.project,
                purchase.laboratory,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_equipment(&self, id: i64) -> StoreResult<Option<Equipment>> {
        let sql = format!("SELECT {EQUIPMENT_COLUMNS} FROM equipment WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, [id], Self::row_to_equipment)
            .optional()?)
    }

    pub fn list_equipment(&self) -> StoreResult<Vec<Equipment>> {
        let sql = format!("SELECT {EQUIPMENT_COLUMNS} FROM equipment ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::row_to_equipment)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn update_equipment(&self, equipment: &Equipment) -> StoreResult<()> {
        equipment.validate()?;
        let changed = self.conn.execute(
            "UPDATE equipment SET description = ?2, cost = ?3, cup = ?4, laboratory = ?5 WHERE id = ?1",
            params![
                equipment.id,
                equipment.description,
                decimal_to_sql(&equipment.cost),
                equipment.project,
                equipment.laboratory,
            ],
        )?;
        expect_changed(changed, "equipment", &equipment.id.to_string())
    }

    pub fn set_equipment_laboratory(&self, id: i64, laboratory: Option<&str>) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE equipment SET laboratory = ?2 WHERE id = ?1",
            params![id, laboratory],
        )?;
        expect_changed(changed, "equipment", &id.to_string())
    }

    pub fn delete_equipment(&self, id: i64) -> StoreResult<()> {
        let changed = self.conn.execute("DELETE FROM equipment WHERE id = ?1", [id])?;
        expect_changed(changed, "equipment", &id.to_string())
    }

    /// Costs of the equipment bought by one project, as stored.
    pub(crate) fn equipment_costs(&self, cup: &str) -> StoreResult<Vec<rust_decimal::Decimal>> {
        let mut stmt = self.conn.prepare("SELECT cost FROM equipment WHERE cup = ?1")?;
        let rows = stmt.query_map([cup], |row| decimal_column(row, 0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Contracted costs of the staff hired under one project, as stored.
    pub(crate) fn staff_costs(&self, cup: &str) -> StoreResult<Vec<rust_decimal::Decimal>> {
        let mut stmt = self
            .conn
            .prepare("SELECT cost FROM project_employees WHERE cup = ?1")?;
        let rows = stmt.query_map([cup], |row| decimal_column(row, 0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn row_to_equipment(row: &Row) -> rusqlite::Result<Equipment> {
        Ok(Equipment {
            id: row.get(0)?,
            description: row.get(1)?,
            cost: decimal_column(row, 2)?,
            project: row.get(3)?,
            laboratory: row.get(4)?,
        })
    }

    // --- Relations ---

    pub fn affiliate(&self, matricola: &str, laboratory: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO affiliations (matricola, laboratory) VALUES (?1, ?2)",
            params![matricola, laboratory],
        )?;
        Ok(())
    }

    pub fn disaffiliate(&self, matricola: &str, laboratory: &str) -> StoreResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM affiliations WHERE matricola = ?1 AND laboratory = ?2",
            params![matricola, laboratory],
        )?;
        expect_changed(changed, "affiliation", &format!("{matricola}@{laboratory}"))
    }

    /// All (matricola, laboratory) pairs.
    pub fn list_affiliations(&self) -> StoreResult<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT matricola, laboratory FROM affiliations ORDER BY laboratory, matricola")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count_affiliates(&self, laboratory: &str) -> StoreResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM affiliations WHERE laboratory = ?1",
            [laboratory],
            |row| row.get(0),
        )?)
    }

    pub fn attach_project(&self, laboratory: &str, cup: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO lab_projects (laboratory, cup) VALUES (?1, ?2)",
            params![laboratory, cup],
        )?;
        Ok(())
    }

    pub fn detach_project(&self, laboratory: &str, cup: &str) -> StoreResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM lab_projects WHERE laboratory = ?1 AND cup = ?2",
            params![laboratory, cup],
        )?;
        expect_changed(changed, "lab project", &format!("{laboratory}/{cup}"))
    }

    /// All (laboratory, cup) pairs.
    pub fn list_lab_projects(&self) -> StoreResult<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT laboratory, cup FROM lab_projects ORDER BY cup, laboratory")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use crate::error::StoreError;
    use crate::store::RecordStore;

    #[test]
    fn test_laboratory_crud() {
        let db = seeded();
        let mut lab = db.get_laboratory("Fotonica").unwrap().unwrap();
        assert_eq!(lab.director, "M001");

        lab.topic = "Ottica quantistica".to_string();
        db.update_laboratory(&lab).unwrap();
        assert_eq!(
            db.get_laboratory("Fotonica").unwrap().unwrap().topic,
            "Ottica quantistica"
        );

        let err = db.insert_laboratory(&lab).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[test]
    fn test_project_lookup_by_name_ignores_case() {
        let db = seeded();
        let project = db.get_project_by_name("PROGETTO p1").unwrap().unwrap();
        assert_eq!(project.cup, "P1");
        assert_eq!(project.budget, money("100000.00"));
    }

    #[test]
    fn test_project_update_and_delete() {
        let db = seeded();
        let mut project = db.get_project("P1").unwrap().unwrap();
        project.end_date = Some(date(2025, 12, 31));
        db.update_project(&project).unwrap();
        assert_eq!(
            db.get_project("P1").unwrap().unwrap().end_date,
            Some(date(2025, 12, 31))
        );

        db.delete_project("P1").unwrap();
        assert!(db.list_projects().unwrap().is_empty());
    }

    #[test]
    fn test_equipment_gets_generated_ids() {
        let db = seeded();
        let first = db.add_equipment(&purchase("Laser", "120.00", "P1")).unwrap();
        let second = db.add_equipment(&purchase("Banco ottico", "80.00", "P1")).unwrap();
        assert!(second > first);

        db.set_equipment_laboratory(first, Some("Fotonica")).unwrap();
        let laser = db.get_equipment(first).unwrap().unwrap();
        assert_eq!(laser.laboratory.as_deref(), Some("Fotonica"));

        db.delete_laboratory("Fotonica").unwrap();
        let laser = db.get_equipment(first).unwrap().unwrap();
        assert_eq!(laser.laboratory, None);
    }

    #[test]
    fn test_equipment_update_and_delete() {
        let db = seeded();
        let id = db.add_equipment(&purchase("Laser", "120.00", "P1")).unwrap();

        let mut laser = db.get_equipment(id).unwrap().unwrap();
        laser.description = "Laser a femtosecondi".to_string();
        laser.cost = money("150.25");
        db.update_equipment(&laser).unwrap();
        assert_eq!(db.get_equipment(id).unwrap().unwrap(), laser);

        db.delete_equipment(id).unwrap();
        assert!(db.get_equipment(id).unwrap().is_none());
        assert!(matches!(db.delete_equipment(id), Err(StoreError::NotFound { .. })));
        assert!(matches!(db.update_equipment(&laser), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_negative_costs_never_reach_the_totals() {
        let db = seeded();
        let err = db.add_equipment(&purchase("Rimborso", "-500.00", "P1")).unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert_eq!(db.sum_equipment_cost_by_project("P1").unwrap(), None);

        let id = db.add_equipment(&purchase("Laser", "120.00", "P1")).unwrap();
        let mut laser = db.get_equipment(id).unwrap().unwrap();
        laser.cost = money("-120.00");
        assert!(matches!(db.update_equipment(&laser), Err(StoreError::Invalid(_))));
        assert_eq!(db.sum_equipment_cost_by_project("P1").unwrap(), Some(money("120.00")));

        let mut project = db.get_project("P1").unwrap().unwrap();
        project.budget = money("-1");
        assert!(matches!(db.update_project(&project), Err(StoreError::Invalid(_))));
    }

    #[test]
    fn test_relations_are_idempotent_and_removable() {
        let db = seeded();
        db.affiliate("M001", "Fotonica").unwrap();
        assert_eq!(db.count_affiliates("Fotonica").unwrap(), 1);

        db.attach_project("Fotonica", "P1").unwrap();
        db.attach_project("Fotonica", "P1").unwrap();
        assert_eq!(
            db.list_lab_projects().unwrap(),
            vec![("Fotonica".to_string(), "P1".to_string())]
        );

        db.detach_project("Fotonica", "P1").unwrap();
        assert!(matches!(
            db.detach_project("Fotonica", "P1"),
            Err(StoreError::NotFound { .. })
        ));

        db.disaffiliate("M001", "Fotonica").unwrap();
        assert!(db.list_affiliations().unwrap().is_empty());
    }
}
