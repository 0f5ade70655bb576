use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// A routing mapping or transaction record already exists for the
    /// reference. Reference generation is supposed to make this unreachable
    /// in practice, so callers treat it as a logic error, not a retry.
    #[error("Duplicate internal reference: {0}")]
    DuplicateReference(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Convert an insert failure into a typed duplicate error when the
    /// driver reports a uniqueness violation.
    pub(crate) fn from_insert(err: sqlx::Error, reference: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::DuplicateReference(reference.to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
