//! In-memory snapshot of the organization.
//!
//! Records live in maps keyed by their primary key and every association is a
//! pair of index maps from key to keys, so navigation works in both directions
//! without entities pointing at each other.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::db::{Database, StoreResult};
use crate::models::{
    CareerStep, Employee, Equipment, Laboratory, PermanentEmployee, Project, ProjectEmployee,
};

type Index = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Default, Clone, Serialize)]
pub struct Organization {
    permanent: BTreeMap<String, PermanentEmployee>,
    contracted: BTreeMap<String, ProjectEmployee>,
    laboratories: BTreeMap<String, Laboratory>,
    projects: BTreeMap<String, Project>,
    equipment: BTreeMap<i64, Equipment>,
    careers: BTreeMap<String, Vec<CareerStep>>,
    labs_by_employee: Index,
    employees_by_lab: Index,
    projects_by_lab: Index,
    labs_by_project: Index,
}

impl Organization {
    pub fn permanent_employees(&self) -> impl Iterator<Item = &PermanentEmployee> {
        self.permanent.values()
    }

    pub fn project_employees(&self) -> impl Iterator<Item = &ProjectEmployee> {
        self.contracted.values()
    }

    pub fn laboratories(&self) -> impl Iterator<Item = &Laboratory> {
        self.laboratories.values()
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn employee(&self, matricola: &str) -> Option<Employee> {
        if let Some(e) = self.permanent.get(matricola) {
            return Some(Employee::Permanent(e.clone()));
        }
        self.contracted
            .get(matricola)
            .map(|e| Employee::Contracted(e.clone()))
    }

    pub fn laboratory(&self, name: &str) -> Option<&Laboratory> {
        self.laboratories.get(name)
    }

    pub fn project(&self, cup: &str) -> Option<&Project> {
        self.projects.get(cup)
    }

    /// Laboratories the employee is affiliated with.
    pub fn laboratories_of(&self, matricola: &str) -> Vec<&Laboratory> {
        lookup(&self.labs_by_employee, matricola, &self.laboratories)
    }

    pub fn affiliates_of(&self, laboratory: &str) -> Vec<&PermanentEmployee> {
        lookup(&self.employees_by_lab, laboratory, &self.permanent)
    }

    pub fn projects_of_laboratory(&self, laboratory: &str) -> Vec<&Project> {
        lookup(&self.projects_by_lab, laboratory, &self.projects)
    }

    pub fn laboratories_of_project(&self, cup: &str) -> Vec<&Laboratory> {
        lookup(&self.labs_by_project, cup, &self.laboratories)
    }

    pub fn staff_of(&self, cup: &str) -> Vec<&ProjectEmployee> {
        self.contracted.values().filter(|e| e.project == cup).collect()
    }

    pub fn equipment_of_project(&self, cup: &str) -> Vec<&Equipment> {
        self.equipment.values().filter(|e| e.project == cup).collect()
    }

    pub fn equipment_in(&self, laboratory: &str) -> Vec<&Equipment> {
        self.equipment
            .values()
            .filter(|e| e.laboratory.as_deref() == Some(laboratory))
            .collect()
    }

    pub fn career_of(&self, matricola: &str) -> &[CareerStep] {
        self.careers.get(matricola).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn laboratories_directed_by(&self, matricola: &str) -> Vec<&Laboratory> {
        self.laboratories
            .values()
            .filter(|l| l.director == matricola)
            .collect()
    }

    pub fn projects_referenced_by(&self, matricola: &str) -> Vec<&Project> {
        self.projects.values().filter(|p| p.referent == matricola).collect()
    }

    pub fn projects_owned_by(&self, matricola: &str) -> Vec<&Project> {
        self.projects.values().filter(|p| p.owner == matricola).collect()
    }

    fn link(index: &mut Index, from: &str, to: &str) {
        index
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }
}

fn lookup<'a, V>(index: &Index, key: &str, records: &'a BTreeMap<String, V>) -> Vec<&'a V> {
    index
        .get(key)
        .into_iter()
        .flatten()
        .filter_map(|k| records.get(k.as_str()))
        .collect()
}

impl Database {
    /// Loads every record and relation into a detached snapshot.
    pub fn load_organization(&self) -> StoreResult<Organization> {
        let mut org = Organization::default();

        for e in self.list_permanent_employees(false)? {
            org.permanent.insert(e.person.matricola.clone(), e);
        }
        for e in self.list_project_employees(None)? {
            org.contracted.insert(e.person.matricola.clone(), e);
        }
        for l in self.list_laboratories()? {
            org.laboratories.insert(l.name.clone(), l);
        }
        for p in self.list_projects()? {
            org.projects.insert(p.cup.clone(), p);
        }
        for e in self.list_equipment()? {
            org.equipment.insert(e.id, e);
        }
        for step in self.list_career_steps(None)? {
            org.careers.entry(step.matricola.clone()).or_default().push(step);
        }
        for (matricola, lab) in self.list_affiliations()? {
            Organization::link(&mut org.labs_by_employee, &matricola, &lab);
            Organization::link(&mut org.employees_by_lab, &lab, &matricola);
        }
        for (lab, cup) in self.list_lab_projects()? {
            Organization::link(&mut org.projects_by_lab, &lab, &cup);
            Organization::link(&mut org.labs_by_project, &cup, &lab);
        }

        Ok(org)
    }
}
