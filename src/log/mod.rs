//! Prior-log: построение лог-записей, назначение LSA и сброс в страницы.
//!
//! Что здесь:
//! - lsa, record   - адреса, типы записей, заголовки;
//! - cursor        - правила раскладки записи по страницам;
//! - zip           - сжатие и diff undo/redo;
//! - prior         - узел prior list и его построитель;
//! - tdes, mvcc    - дескриптор транзакции (scope tracker) и учёт vacuum-блоков;
//! - append        - prior list под мьютексом, backpressure, drain;
//! - page, volume  - лог-страницы, чтение записей, том на диске;
//! - daemon        - фоновый flush.

pub mod append;
pub mod cursor;
pub mod daemon;
pub mod error;
pub mod lsa;
pub mod mvcc;
pub mod page;
pub mod prior;
pub mod record;
pub mod tdes;
pub mod volume;
pub mod zip;

pub use append::{LogAppender, PriorGuard, PriorInfo};
pub use daemon::FlushDaemon;
pub use error::{LogError, LogResult};
pub use lsa::LogLsa;
pub use mvcc::VacuumBlockData;
pub use page::{LogPageBuffer, LogRecordView};
pub use prior::{LogDataAddr, LogPriorNode, PriorBuilder, RV_NOTIFY_VACUUM};
pub use record::{DataHeader, LogRecType, LogRecordHeader, SysopEndType};
pub use tdes::{LogTdes, TranState};
pub use volume::LogVolume;
