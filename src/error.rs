use pyo3::exceptions::PyRuntimeError;
use pyo3::PyErr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QkError {
    #[error("Data not loaded: {0}")]
    NotLoaded(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation: {0}")]
    Validation(String),

    #[error("{0}")]
    General(String),
}

impl From<QkError> for PyErr {
    fn from(err: QkError) -> PyErr {
        PyRuntimeError::new_err(err.to_string())
    }
}

impl From<PyErr> for QkError {
    fn from(err: PyErr) -> Self {
        QkError::General(err.to_string())
    }
}
