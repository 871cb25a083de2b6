use thiserror::Error;

use super::record::LogRecType;

pub type LogResult<T> = Result<T, LogError>;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("out of memory while building log record ({0})")]
    OutOfMemory(&'static str),

    /// Тип записи не подходит для этого построителя / не имеет формы заголовка.
    #[error("invalid record kind {0:?}")]
    InvalidRecordKind(LogRecType),

    /// Крошечный (crumb) тип пришёл через data-вход.
    #[error("record kind {0:?} must be built from crumbs")]
    WrongEntryPoint(LogRecType),

    #[error("corrupted log: {0}")]
    Corrupted(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
