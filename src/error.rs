use thiserror::Error;

use crate::models::{CareerStepKind, Seniority};

/// Rejections raised while parsing or validating domain values.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown career step type '{0}' (expected Middle, Senior, Promosso_a_dirigente or Rimosso_da_dirigente)")]
    UnknownStepType(String),
    #[error("unknown seniority level '{0}' (expected Junior, Middle or Senior)")]
    UnknownSeniority(String),
    #[error("invalid fiscal code '{0}'")]
    InvalidFiscalCode(String),
    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
    #[error("career step {step} cannot be applied to {matricola} (seniority {seniority}, director {director})")]
    InvalidTransition {
        matricola: String,
        step: CareerStepKind,
        seniority: Seniority,
        director: bool,
    },
}

/// Failures of the SQLite record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] rusqlite::Error),
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },
    #[error("{entity} '{key}' already exists")]
    Conflict { entity: &'static str, key: String },
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("rejected record: {0}")]
    Invalid(#[from] ModelError),
    #[error("{0} total exceeds the decimal range")]
    Overflow(&'static str),
    #[error("database not initialized, run 'labstaff init' first")]
    NotInitialized,
    #[error("could not prepare database location: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::Error as E;

        let text = err.to_string();
        if text.contains("no such column") {
            return StoreError::SchemaMismatch(text);
        }

        match err {
            E::FromSqlConversionFailure(index, _, ref source) => {
                StoreError::SchemaMismatch(format!("column {index}: {source}"))
            }
            E::InvalidColumnType(index, ref name, ref ty) => {
                StoreError::SchemaMismatch(format!("column {index} ({name}) has type {ty}"))
            }
            E::InvalidColumnIndex(index) => {
                StoreError::SchemaMismatch(format!("column index {index} is absent"))
            }
            E::InvalidColumnName(ref name) => {
                StoreError::SchemaMismatch(format!("column {name} is absent"))
            }
            E::SqliteFailure(code, ref message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint(message.clone().unwrap_or_else(|| code.to_string()))
            }
            other => StoreError::Unavailable(other),
        }
    }
}

/// Failure of one eligibility or aggregation query, naming the query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query {query} failed: {source}")]
    StorageUnavailable {
        query: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("query {query} failed: unexpected record shape: {detail}")]
    SchemaMismatch { query: &'static str, detail: String },
}

impl QueryError {
    pub fn from_store(query: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::SchemaMismatch(detail) => QueryError::SchemaMismatch { query, detail },
            source => QueryError::StorageUnavailable { query, source },
        }
    }

    pub fn query(&self) -> &'static str {
        match self {
            QueryError::StorageUnavailable { query, .. } | QueryError::SchemaMismatch { query, .. } => {
                query
            }
        }
    }
}

/// Failures of the business mutations in [`crate::service`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("{matricola} is not eligible as {role}")]
    NotEligible { role: &'static str, matricola: String },
    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        ServiceError::Store(err.into())
    }
}

/// Invalid runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must not be empty when set")]
    EmptyValue { var: &'static str },
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log level/filter '{value}': unable to build EnvFilter")]
    EnvFilter {
        value: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("telemetry error: {0}")]
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_failure_maps_to_schema_mismatch() {
        let raw = rusqlite::Error::InvalidColumnName("seniority".to_string());
        let err = StoreError::from(raw);
        assert!(matches!(err, StoreError::SchemaMismatch(ref m) if m.contains("seniority")));

        let query = QueryError::from_store("candidates_for_scientific_director", err);
        assert!(matches!(query, QueryError::SchemaMismatch { .. }));
        assert_eq!(query.query(), "candidates_for_scientific_director");
    }

    #[test]
    fn test_other_failures_map_to_storage_unavailable() {
        let query = QueryError::from_store("total_staff_cost", StoreError::NotInitialized);
        assert!(matches!(query, QueryError::StorageUnavailable { .. }));
        assert!(query.to_string().contains("total_staff_cost"));
    }
}
