pub type FitsResult<T> = std::result::Result<T, FitsError>;

/// Errors produced by the data containers and the I/O engine.
#[derive(Debug, thiserror::Error)]
pub enum FitsError {
    /// A position, row or segment lies outside its valid range.
    #[error("{what} {value} is out of bounds [{min}, {max}]")]
    OutOfBounds {
        what: String,
        value: i64,
        min: i64,
        max: i64,
    },

    /// No column with the given name or index.
    #[error("Column not found: {0}")]
    NotFound(String),

    /// A column with the given name already exists.
    #[error("Duplicate column name: {0}")]
    Duplicate(String),

    /// A mutating operation was attempted on a read-only backend.
    #[error("Cannot {0}: data unit is read-only")]
    ReadOnly(String),

    /// Lengths which must agree do not.
    #[error("Size mismatch: {0}")]
    SizeMismatch(String),

    /// The requested value type does not match the declared type.
    #[error("Type mismatch for {name}: requested {requested}, declared {declared}")]
    TypeMismatch {
        name: String,
        requested: String,
        declared: String,
    },

    /// Wrapper around failures reported by the storage backend.
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl FitsError {
    pub fn out_of_bounds(what: impl Into<String>, value: i64, min: i64, max: i64) -> Self {
        FitsError::OutOfBounds {
            what: what.into(),
            value,
            min,
            max,
        }
    }

    /// Check that `value` lies in `[min, max]`.
    pub fn may_throw_out_of_bounds(what: &str, value: i64, min: i64, max: i64) -> FitsResult<()> {
        if value < min || value > max {
            return Err(Self::out_of_bounds(what, value, min, max));
        }
        Ok(())
    }
}

/// Attach context to low-level backend results.
pub trait IoContext<T> {
    fn io_context<F, S>(self, context: F) -> FitsResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for anyhow::Result<T> {
    fn io_context<F, S>(self, context: F) -> FitsResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| FitsError::Io {
            context: context().into(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_reports_range() {
        let err = FitsError::may_throw_out_of_bounds("Row", 12, 0, 9).unwrap_err();
        assert_eq!(err.to_string(), "Row 12 is out of bounds [0, 9]");
        assert!(FitsError::may_throw_out_of_bounds("Row", 9, 0, 9).is_ok());
        assert!(FitsError::may_throw_out_of_bounds("Row", -1, 0, 9).is_err());
    }

    #[test]
    fn duplicate_names_the_column() {
        let err = FitsError::Duplicate("RA".to_string());
        assert_eq!(err.to_string(), "Duplicate column name: RA");
    }

    #[test]
    fn io_context_wraps_backend_error() {
        let result: anyhow::Result<()> = Err(anyhow::anyhow!("disk full"));
        let err = result
            .io_context(|| format!("writing column {}", "RA"))
            .unwrap_err();
        assert!(matches!(err, FitsError::Io { .. }));
        assert_eq!(err.to_string(), "I/O error while writing column RA: disk full");
    }
}
