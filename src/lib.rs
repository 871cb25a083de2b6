#![allow(non_snake_case)]

// Базовые модули
pub mod consts;
pub mod config;
pub mod metrics;
pub mod lock;

// Общие типы идентификаторов (Vfid, ...)
pub mod codec;

// XASL flattening: дерево плана -> поток
pub mod xasl;   // src/xasl/{mod,stream,visited,sink,context,driver}.rs + nodes/

// Prior-log: построение записей, LSA, drain, том
pub mod log;    // src/log/{mod,lsa,record,cursor,zip,prior,tdes,mvcc,append,page,volume,daemon}.rs

// Удобные реэкспорты
pub use config::{AppendMode, XaslLogConfig, ZipCodec};
pub use log::{
    FlushDaemon, LogAppender, LogError, LogLsa, LogPriorNode, LogRecType, LogTdes, LogVolume,
    PriorBuilder,
};
pub use xasl::{map_xasl_to_stream, Flattener, XaslStream, XtsError};
