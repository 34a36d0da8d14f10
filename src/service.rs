//! Business mutations.
//!
//! Each operation checks its eligibility rule through [`EligibilityEngine`] and
//! performs all of its writes inside one transaction, so a failure at any step
//! leaves the store untouched.

use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use crate::db::Database;
use crate::engine::EligibilityEngine;
use crate::error::ServiceError;
use crate::models::{
    CareerStep, CareerStepKind, Laboratory, PermanentEmployee, Project, ProjectEmployee,
};

pub type ServiceResult<T> = Result<T, ServiceError>;

pub struct OrgService<'a> {
    db: &'a Database,
    today: NaiveDate,
}

impl<'a> OrgService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            today: Local::now().date_naive(),
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    fn engine(&self) -> EligibilityEngine<'a, Database> {
        EligibilityEngine::new(self.db).with_today(self.today)
    }

    fn permanent(&self, matricola: &str) -> ServiceResult<PermanentEmployee> {
        self.db
            .get_permanent_employee(matricola)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "permanent employee",
                key: matricola.to_string(),
            })
    }

    fn project(&self, cup: &str) -> ServiceResult<Project> {
        self.db.get_project(cup)?.ok_or_else(|| ServiceError::NotFound {
            entity: "project",
            key: cup.to_string(),
        })
    }

    // --- Career ---

    /// Records a career step and applies it to the employee in one transaction.
    pub fn record_career_step(
        &self,
        matricola: &str,
        kind: CareerStepKind,
        date: NaiveDate,
    ) -> ServiceResult<CareerStep> {
        let tx = self.db.transaction()?;

        let mut employee = self.permanent(matricola)?;
        if !employee.is_active() {
            return Err(ServiceError::NotEligible {
                role: "career step recipient",
                matricola: matricola.to_string(),
            });
        }
        if date < employee.person.hire_date {
            return Err(crate::error::ModelError::Invalid {
                field: "date",
                message: format!(
                    "step date {date} precedes hire date {}",
                    employee.person.hire_date
                ),
            }
            .into());
        }
        if let Err(err) = kind.apply(&mut employee) {
            warn!(matricola, step = %kind, "career step rejected");
            return Err(err.into());
        }

        let step = self.db.insert_career_step(matricola, kind, date)?;
        self.db.write_career_state(&employee)?;
        tx.commit()?;

        info!(
            matricola,
            step = %kind,
            %date,
            seniority = %employee.seniority,
            director = employee.director,
            "career step recorded"
        );
        Ok(step)
    }

    // --- Laboratories ---

    /// Creates a laboratory with its affiliates. The director must be a
    /// scientific director candidate and is always affiliated.
    pub fn create_laboratory(&self, lab: &Laboratory, affiliates: &[&str]) -> ServiceResult<()> {
        lab.validate()?;
        let tx = self.db.transaction()?;

        self.require_director_candidate(&lab.director)?;
        self.db.insert_laboratory(lab)?;
        self.db.affiliate(&lab.director, &lab.name)?;
        for matricola in affiliates {
            self.db.affiliate(matricola, &lab.name)?;
        }
        tx.commit()?;

        info!(laboratory = %lab.name, director = %lab.director, "laboratory created");
        Ok(())
    }

    pub fn assign_lab_director(&self, laboratory: &str, matricola: &str) -> ServiceResult<()> {
        let tx = self.db.transaction()?;

        let mut lab = self
            .db
            .get_laboratory(laboratory)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "laboratory",
                key: laboratory.to_string(),
            })?;
        self.require_director_candidate(matricola)?;
        lab.director = matricola.to_string();
        self.db.update_laboratory(&lab)?;
        self.db.affiliate(matricola, laboratory)?;
        tx.commit()?;

        info!(laboratory, director = matricola, "laboratory director assigned");
        Ok(())
    }

    fn require_director_candidate(&self, matricola: &str) -> ServiceResult<()> {
        let candidates = self.engine().candidates_for_scientific_director()?;
        require_candidate(&candidates, matricola, "scientific director")
    }

    // --- Projects ---

    /// Creates a project whose referent and owner qualify for its dates.
    pub fn create_project(&self, project: &Project) -> ServiceResult<()> {
        project.validate()?;
        let tx = self.db.transaction()?;

        self.require_referent_candidate(project, &project.referent)?;
        self.require_owner_candidate(project, &project.owner)?;
        self.db.insert_project(project)?;
        tx.commit()?;

        info!(cup = %project.cup, "project created");
        Ok(())
    }

    pub fn assign_project_referent(&self, cup: &str, matricola: &str) -> ServiceResult<()> {
        let tx = self.db.transaction()?;

        let mut project = self.project(cup)?;
        self.require_referent_candidate(&project, matricola)?;
        project.referent = matricola.to_string();
        self.db.update_project(&project)?;
        tx.commit()?;

        info!(cup, referent = matricola, "project referent assigned");
        Ok(())
    }

    pub fn assign_project_owner(&self, cup: &str, matricola: &str) -> ServiceResult<()> {
        let tx = self.db.transaction()?;

        let mut project = self.project(cup)?;
        self.require_owner_candidate(&project, matricola)?;
        project.owner = matricola.to_string();
        self.db.update_project(&project)?;
        tx.commit()?;

        info!(cup, owner = matricola, "project owner assigned");
        Ok(())
    }

    fn require_referent_candidate(&self, project: &Project, matricola: &str) -> ServiceResult<()> {
        let candidates = self
            .engine()
            .candidates_for_scientific_referent(project.start_date, project.end_date)?;
        require_candidate(&candidates, matricola, "scientific referent")
    }

    fn require_owner_candidate(&self, project: &Project, matricola: &str) -> ServiceResult<()> {
        let candidates = self
            .engine()
            .candidates_for_project_owner(project.start_date, project.end_date)?;
        require_candidate(&candidates, matricola, "project owner")
    }

    // --- Project staff and equipment ---

    pub fn hire_project_employee(&self, employee: &ProjectEmployee) -> ServiceResult<()> {
        employee.validate()?;
        let tx = self.db.transaction()?;

        self.project(&employee.project)?;
        self.db.insert_project_employee(employee)?;
        tx.commit()?;

        info!(matricola = %employee.person.matricola, cup = %employee.project, "project employee hired");
        Ok(())
    }

    /// Moves a project employee to another project.
    pub fn transfer_project_employee(&self, matricola: &str, cup: &str) -> ServiceResult<()> {
        let tx = self.db.transaction()?;

        self.project(cup)?;
        if self.db.get_project_employee(matricola)?.is_none() {
            return Err(ServiceError::NotFound {
                entity: "project employee",
                key: matricola.to_string(),
            });
        }
        self.db.set_project_employee_project(matricola, cup)?;
        tx.commit()?;

        info!(matricola, cup, "project employee transferred");
        Ok(())
    }

    /// Moves equipment into a laboratory, or unassigns it with `None`.
    pub fn place_equipment(&self, id: i64, laboratory: Option<&str>) -> ServiceResult<()> {
        let tx = self.db.transaction()?;

        if let Some(name) = laboratory {
            if self.db.get_laboratory(name)?.is_none() {
                return Err(ServiceError::NotFound {
                    entity: "laboratory",
                    key: name.to_string(),
                });
            }
        }
        self.db.set_equipment_laboratory(id, laboratory)?;
        tx.commit()?;

        info!(equipment = id, laboratory = ?laboratory, "equipment placed");
        Ok(())
    }
}

fn require_candidate(
    candidates: &[PermanentEmployee],
    matricola: &str,
    role: &'static str,
) -> ServiceResult<()> {
    if candidates.iter().any(|c| c.person.matricola == matricola) {
        return Ok(());
    }
    warn!(matricola, role, "candidate rejected");
    Err(ServiceError::NotEligible {
        role,
        matricola: matricola.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::*;
    use crate::error::{ModelError, StoreError};
    use crate::models::Seniority;

    fn service(db: &Database) -> OrgService<'_> {
        OrgService::new(db).with_today(date(2024, 6, 1))
    }

    #[test]
    fn test_career_step_updates_employee_atomically() {
        let db = seeded();
        db.insert_permanent_employee(&permanent("M002", date(2018, 1, 1), None, Seniority::Junior, false))
            .unwrap();

        let svc = service(&db);
        let step = svc
            .record_career_step("M002", CareerStepKind::Middle, date(2021, 1, 1))
            .unwrap();
        assert_eq!(step.kind, CareerStepKind::Middle);

        let employee = db.get_permanent_employee("M002").unwrap().unwrap();
        assert_eq!(employee.seniority, Seniority::Middle);
        assert_eq!(db.list_career_steps(Some("M002")).unwrap().len(), 1);

        svc.record_career_step("M002", CareerStepKind::PromossoADirigente, date(2022, 1, 1))
            .unwrap();
        assert!(db.get_permanent_employee("M002").unwrap().unwrap().director);
    }

    #[test]
    fn test_rejected_career_step_leaves_no_trace() {
        let db = seeded();
        let svc = service(&db);

        // M001 is already a senior director.
        let err = svc
            .record_career_step("M001", CareerStepKind::Senior, date(2020, 1, 1))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Model(ModelError::InvalidTransition { .. })));
        let err = svc
            .record_career_step("M001", CareerStepKind::PromossoADirigente, date(2020, 1, 1))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Model(_)));

        assert!(db.list_career_steps(Some("M001")).unwrap().is_empty());
    }

    #[test]
    fn test_career_step_requires_active_employee_and_valid_date() {
        let db = database();
        db.insert_permanent_employee(&permanent(
            "M002",
            date(2010, 1, 1),
            Some(date(2020, 1, 1)),
            Seniority::Junior,
            false,
        ))
        .unwrap();
        db.insert_permanent_employee(&permanent("M003", date(2010, 1, 1), None, Seniority::Junior, false))
            .unwrap();
        let svc = service(&db);

        assert!(matches!(
            svc.record_career_step("M002", CareerStepKind::Middle, date(2015, 1, 1)),
            Err(ServiceError::NotEligible { .. })
        ));
        assert!(matches!(
            svc.record_career_step("M003", CareerStepKind::Middle, date(2009, 1, 1)),
            Err(ServiceError::Model(ModelError::Invalid { .. }))
        ));
        assert!(matches!(
            svc.record_career_step("M404", CareerStepKind::Middle, date(2015, 1, 1)),
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_laboratory_director_must_be_active_senior() {
        let db = seeded();
        db.insert_permanent_employee(&permanent("M002", date(2012, 1, 1), None, Seniority::Middle, false))
            .unwrap();
        let svc = service(&db);

        let err = svc
            .create_laboratory(&laboratory("Genomica", "M002"), &[])
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotEligible { role: "scientific director", .. }));
        assert!(db.get_laboratory("Genomica").unwrap().is_none());

        svc.create_laboratory(&laboratory("Genomica", "M001"), &["M002"])
            .unwrap();
        let org = db.load_organization().unwrap();
        assert_eq!(org.affiliates_of("Genomica").len(), 2);

        assert!(svc.assign_lab_director("Genomica", "M002").is_err());
        assert_eq!(db.get_laboratory("Genomica").unwrap().unwrap().director, "M001");
    }

    #[test]
    fn test_failed_affiliation_rolls_back_laboratory() {
        let db = seeded();
        let svc = service(&db);

        let err = svc
            .create_laboratory(&laboratory("Genomica", "M001"), &["M404"])
            .unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::Constraint(_))));
        assert!(db.get_laboratory("Genomica").unwrap().is_none());
    }

    #[test]
    fn test_project_roles_follow_candidacy() {
        let db = seeded();
        db.insert_permanent_employee(&permanent("M002", date(2020, 1, 1), None, Seniority::Senior, true))
            .unwrap();
        let svc = service(&db);

        // M002 has three years of tenure on 2023-01-01: owner yes, referent no.
        svc.assign_project_owner("P1", "M002").unwrap();
        assert_eq!(db.get_project("P1").unwrap().unwrap().owner, "M002");
        assert!(matches!(
            svc.assign_project_referent("P1", "M002"),
            Err(ServiceError::NotEligible { role: "scientific referent", .. })
        ));

        let mut next = project("P2", "M002", "M001");
        assert!(svc.create_project(&next).is_err());
        next.referent = "M001".to_string();
        svc.create_project(&next).unwrap();
        assert!(db.get_project("P2").unwrap().is_some());
    }

    #[test]
    fn test_transfer_and_placement() {
        let db = seeded();
        db.insert_project(&project("P2", "M001", "M001")).unwrap();
        let svc = service(&db);

        svc.hire_project_employee(&contracted("C001", "P1", "1200.00"))
            .unwrap();
        svc.transfer_project_employee("C001", "P2").unwrap();
        assert_eq!(db.get_project_employee("C001").unwrap().unwrap().project, "P2");
        assert!(matches!(
            svc.transfer_project_employee("C001", "P404"),
            Err(ServiceError::NotFound { entity: "project", .. })
        ));

        let id = db.add_equipment(&purchase("Oscilloscopio", "450.00", "P1")).unwrap();
        svc.place_equipment(id, Some("Fotonica")).unwrap();
        assert_eq!(
            db.get_equipment(id).unwrap().unwrap().laboratory.as_deref(),
            Some("Fotonica")
        );
        assert!(svc.place_equipment(id, Some("Nessuno")).is_err());
        svc.place_equipment(id, None).unwrap();
        assert_eq!(db.get_equipment(id).unwrap().unwrap().laboratory, None);
    }
}
