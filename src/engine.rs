//! Eligibility and aggregation rules.
//!
//! Every operation is a stateless read: it rebuilds its candidate set from the
//! record store on each call and either returns the complete result or a
//! [`QueryError`] naming the query that failed.

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::QueryError;
use crate::models::{CareerStepKind, Laboratory, PermanentEmployee, Seniority};
use crate::store::{RecordStore, TenureFilter};

/// Years of service a scientific referent needs at project start.
pub const REFERENT_MIN_TENURE_YEARS: u32 = 7;

pub type QueryResult<T> = Result<T, QueryError>;

pub struct EligibilityEngine<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    today: NaiveDate,
}

impl<'a, S: RecordStore + ?Sized> EligibilityEngine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            today: Local::now().date_naive(),
        }
    }

    /// Evaluates date-dependent rules as if today were `today`.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Active senior employees.
    pub fn candidates_for_scientific_director(&self) -> QueryResult<Vec<PermanentEmployee>> {
        const QUERY: &str = "candidates_for_scientific_director";
        let found = self
            .store
            .find_active_employees_by_seniority(Seniority::Senior)
            .map_err(|e| QueryError::from_store(QUERY, e))?;
        debug!(query = QUERY, candidates = found.len(), "evaluated");
        Ok(found)
    }

    /// Employees with at least seven years of service at `project_start` who are
    /// still employed, or who left on or after `project_end` (when known).
    pub fn candidates_for_scientific_referent(
        &self,
        project_start: NaiveDate,
        project_end: Option<NaiveDate>,
    ) -> QueryResult<Vec<PermanentEmployee>> {
        const QUERY: &str = "candidates_for_scientific_referent";
        let filter = TenureFilter {
            min_tenure_years: REFERENT_MIN_TENURE_YEARS,
            as_of: project_start,
            project_end,
            today: self.today,
            director_only: false,
        };
        self.tenured(QUERY, &filter)
    }

    /// Directors hired no later than `project_start`, with the same activity
    /// test as [`Self::candidates_for_scientific_referent`].
    pub fn candidates_for_project_owner(
        &self,
        project_start: NaiveDate,
        project_end: Option<NaiveDate>,
    ) -> QueryResult<Vec<PermanentEmployee>> {
        const QUERY: &str = "candidates_for_project_owner";
        let filter = TenureFilter {
            min_tenure_years: 0,
            as_of: project_start,
            project_end,
            today: self.today,
            director_only: true,
        };
        self.tenured(QUERY, &filter)
    }

    fn tenured(&self, query: &'static str, filter: &TenureFilter) -> QueryResult<Vec<PermanentEmployee>> {
        let found = self
            .store
            .find_employees_by_hire_date_offset(filter)
            .map_err(|e| QueryError::from_store(query, e))?;
        debug!(
            query,
            as_of = %filter.as_of,
            project_end = ?filter.project_end,
            candidates = found.len(),
            "evaluated"
        );
        Ok(found)
    }

    /// Employees who could receive a step of the given kind.
    ///
    /// Seniority steps match employees whose current level has the same name as
    /// the step (a `Middle` step lists the current Middles). Director steps list
    /// employees holding the opposite flag.
    pub fn candidates_for_career_step(&self, kind: CareerStepKind) -> QueryResult<Vec<PermanentEmployee>> {
        const QUERY: &str = "candidates_for_career_step";
        let found = match kind.target_seniority() {
            Some(level) => self.store.find_employees_by_seniority(level),
            None => self
                .store
                .find_employees_by_director_flag(kind == CareerStepKind::RimossoDaDirigente),
        }
        .map_err(|e| QueryError::from_store(QUERY, e))?;
        debug!(query = QUERY, step = %kind, candidates = found.len(), "evaluated");
        Ok(found)
    }

    /// Sum of equipment costs, `None` when the project bought nothing.
    pub fn total_equipment_cost(&self, cup: &str) -> QueryResult<Option<Decimal>> {
        const QUERY: &str = "total_equipment_cost";
        let total = self
            .store
            .sum_equipment_cost_by_project(cup)
            .map_err(|e| QueryError::from_store(QUERY, e))?;
        debug!(query = QUERY, cup, total = ?total, "evaluated");
        Ok(total)
    }

    /// Sum of contracted staff costs, `None` when nobody was hired under it.
    pub fn total_staff_cost(&self, cup: &str) -> QueryResult<Option<Decimal>> {
        const QUERY: &str = "total_staff_cost";
        let total = self
            .store
            .sum_staff_cost_by_project(cup)
            .map_err(|e| QueryError::from_store(QUERY, e))?;
        debug!(query = QUERY, cup, total = ?total, "evaluated");
        Ok(total)
    }

    pub fn laboratories_eligible_for_project(&self, cup: &str) -> QueryResult<Vec<Laboratory>> {
        self.laboratories("laboratories_eligible_for_project", cup, false)
    }

    pub fn laboratories_working_on_project(&self, cup: &str) -> QueryResult<Vec<Laboratory>> {
        self.laboratories("laboratories_working_on_project", cup, true)
    }

    fn laboratories(&self, query: &'static str, cup: &str, included: bool) -> QueryResult<Vec<Laboratory>> {
        let found = self
            .store
            .find_laboratories_by_project_membership(cup, included)
            .map_err(|e| QueryError::from_store(query, e))?;
        debug!(query, cup, laboratories = found.len(), "evaluated");
        Ok(found)
    }
}
