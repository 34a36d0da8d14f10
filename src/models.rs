use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::ModelError;

static FISCAL_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z]{6}[0-9LMNPQRSTUV]{2}[A-EHLMPRST][0-9LMNPQRSTUV]{2}[A-Z][0-9LMNPQRSTUV]{3}[A-Z]$")
        .expect("fiscal code pattern compiles")
});

// --- Enumerations ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Seniority {
    Junior,
    Middle,
    Senior,
}

impl Seniority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Seniority::Junior => "Junior",
            Seniority::Middle => "Middle",
            Seniority::Senior => "Senior",
        }
    }
}

impl fmt::Display for Seniority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Seniority {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "junior" => Ok(Seniority::Junior),
            "middle" => Ok(Seniority::Middle),
            "senior" => Ok(Seniority::Senior),
            _ => Err(ModelError::UnknownSeniority(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CareerStepKind {
    Middle,
    Senior,
    #[serde(rename = "Promosso_a_dirigente")]
    PromossoADirigente,
    #[serde(rename = "Rimosso_da_dirigente")]
    RimossoDaDirigente,
}

impl CareerStepKind {
    pub const ALL: [CareerStepKind; 4] = [
        CareerStepKind::Middle,
        CareerStepKind::Senior,
        CareerStepKind::PromossoADirigente,
        CareerStepKind::RimossoDaDirigente,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CareerStepKind::Middle => "Middle",
            CareerStepKind::Senior => "Senior",
            CareerStepKind::PromossoADirigente => "Promosso_a_dirigente",
            CareerStepKind::RimossoDaDirigente => "Rimosso_da_dirigente",
        }
    }

    /// Seniority level a step moves the employee to, if it is a seniority step.
    pub fn target_seniority(&self) -> Option<Seniority> {
        match self {
            CareerStepKind::Middle => Some(Seniority::Middle),
            CareerStepKind::Senior => Some(Seniority::Senior),
            CareerStepKind::PromossoADirigente | CareerStepKind::RimossoDaDirigente => None,
        }
    }

    /// Applies the step to the employee's in-memory state.
    ///
    /// Seniority only moves one level up (Junior -> Middle -> Senior) and the
    /// director flag only flips to the opposite value.
    pub fn apply(&self, employee: &mut PermanentEmployee) -> Result<(), ModelError> {
        match self {
            CareerStepKind::Middle if employee.seniority == Seniority::Junior => {
                employee.seniority = Seniority::Middle;
            }
            CareerStepKind::Senior if employee.seniority == Seniority::Middle => {
                employee.seniority = Seniority::Senior;
            }
            CareerStepKind::PromossoADirigente if !employee.director => {
                employee.director = true;
            }
            CareerStepKind::RimossoDaDirigente if employee.director => {
                employee.director = false;
            }
            _ => {
                return Err(ModelError::InvalidTransition {
                    matricola: employee.person.matricola.clone(),
                    step: *self,
                    seniority: employee.seniority,
                    director: employee.director,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for CareerStepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CareerStepKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        CareerStepKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ModelError::UnknownStepType(s.to_string()))
    }
}

// --- Employees ---

/// Personal data shared by both kinds of employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalData {
    pub matricola: String,
    pub name: String,
    pub surname: String,
    pub fiscal_code: String,
    pub address: Option<String>,
    pub birth_date: NaiveDate,
    pub hire_date: NaiveDate,
}

impl PersonalData {
    pub fn validate(&self) -> Result<(), ModelError> {
        require_text("matricola", &self.matricola)?;
        require_text("name", &self.name)?;
        require_text("surname", &self.surname)?;
        if !FISCAL_CODE.is_match(&self.fiscal_code) {
            return Err(ModelError::InvalidFiscalCode(self.fiscal_code.clone()));
        }
        if self.hire_date < self.birth_date {
            return Err(ModelError::Invalid {
                field: "hire_date",
                message: format!(
                    "hire date {} precedes birth date {}",
                    self.hire_date, self.birth_date
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermanentEmployee {
    #[serde(flatten)]
    pub person: PersonalData,
    pub end_date: Option<NaiveDate>,
    pub seniority: Seniority,
    pub director: bool,
}

impl PermanentEmployee {
    pub fn is_active(&self) -> bool {
        self.end_date.is_none()
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        self.person.validate()?;
        if let Some(end) = self.end_date {
            if end < self.person.hire_date {
                return Err(ModelError::Invalid {
                    field: "end_date",
                    message: format!("end date {} precedes hire date {}", end, self.person.hire_date),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEmployee {
    #[serde(flatten)]
    pub person: PersonalData,
    pub contract_end: NaiveDate,
    pub cost: Decimal,
    /// CUP of the project the employee was hired under.
    pub project: String,
}

impl ProjectEmployee {
    pub fn validate(&self) -> Result<(), ModelError> {
        self.person.validate()?;
        require_text("project", &self.project)?;
        require_non_negative("cost", self.cost)?;
        if self.contract_end < self.person.hire_date {
            return Err(ModelError::Invalid {
                field: "contract_end",
                message: format!(
                    "contract end {} precedes hire date {}",
                    self.contract_end, self.person.hire_date
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Employee {
    Permanent(PermanentEmployee),
    Contracted(ProjectEmployee),
}

impl Employee {
    pub fn person(&self) -> &PersonalData {
        match self {
            Employee::Permanent(e) => &e.person,
            Employee::Contracted(e) => &e.person,
        }
    }

    pub fn matricola(&self) -> &str {
        &self.person().matricola
    }

    pub fn full_name(&self) -> String {
        let person = self.person();
        format!("{} {}", person.name, person.surname)
    }

    pub fn fiscal_code(&self) -> &str {
        &self.person().fiscal_code
    }

    pub fn hire_date(&self) -> NaiveDate {
        self.person().hire_date
    }

}

// --- Laboratories, projects, equipment ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Laboratory {
    pub name: String,
    pub topic: String,
    /// Matricola of the scientific director.
    pub director: String,
}

impl Laboratory {
    pub fn validate(&self) -> Result<(), ModelError> {
        require_text("name", &self.name)?;
        require_text("director", &self.director)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub cup: String,
    pub name: String,
    pub budget: Decimal,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    /// Matricola of the scientific referent.
    pub referent: String,
    /// Matricola of the responsabile.
    pub owner: String,
}

impl Project {
    pub fn validate(&self) -> Result<(), ModelError> {
        require_text("cup", &self.cup)?;
        require_text("name", &self.name)?;
        require_non_negative("budget", self.budget)?;
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(ModelError::Invalid {
                    field: "end_date",
                    message: format!("end date {} precedes start date {}", end, self.start_date),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: i64,
    pub description: String,
    pub cost: Decimal,
    /// CUP of the project that paid for it.
    pub project: String,
    pub laboratory: Option<String>,
}

impl Equipment {
    pub fn validate(&self) -> Result<(), ModelError> {
        require_text("description", &self.description)?;
        require_text("project", &self.project)?;
        require_non_negative("cost", self.cost)
    }
}

/// Equipment purchase before the store assigns it an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEquipment {
    pub description: String,
    pub cost: Decimal,
    pub project: String,
    pub laboratory: Option<String>,
}

impl NewEquipment {
    pub fn validate(&self) -> Result<(), ModelError> {
        require_text("description", &self.description)?;
        require_text("project", &self.project)?;
        require_non_negative("cost", self.cost)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareerStep {
    pub id: i64,
    pub kind: CareerStepKind,
    pub date: NaiveDate,
    pub matricola: String,
}

fn require_text(field: &'static str, value: &str) -> Result<(), ModelError> {
    if value.trim().is_empty() {
        return Err(ModelError::Invalid {
            field,
            message: "must not be empty".to_string(),
        });
    }
    Ok(())
}

fn require_non_negative(field: &'static str, value: Decimal) -> Result<(), ModelError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ModelError::Invalid {
            field,
            message: format!("must not be negative (got {value})"),
        });
    }
    Ok(())
}
