#[derive(Debug, thiserror::Error)]
pub enum PharmacyError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unknown prescription: {0}")]
    UnknownPrescription(String),
    #[error("unknown medicine: {0}")]
    UnknownMedicine(String),
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("internal lock poisoned")]
    LockPoisoned,
}

pub type PharmacyResult<T> = std::result::Result<T, PharmacyError>;
