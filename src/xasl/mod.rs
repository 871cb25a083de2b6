//! XASL flattening: дерево плана -> переносимый поток байтов.
//!
//! Что здесь:
//! - stream   - растущая арена с выровненным резервированием и `ArenaOffset`;
//! - visited  - кэш "адрес узла -> смещение" (каждый узел пишется один раз);
//! - sink     - трейты `Node`/`Sink`: размер и упаковка идут по одному коду;
//! - context  - `FlattenContext` (арена + кэш одного вызова) и спец. save_*;
//! - nodes    - модель дерева;
//! - driver   - заголовок потока, `map_*_to_stream`, разбор заголовка.
//!
//! Указатели в потоке заменяются смещениями; 0 означает null.

pub mod context;
pub mod driver;
pub mod error;
pub mod nodes;
pub mod sink;
pub mod stream;
pub mod visited;

pub use context::FlattenContext;
pub use driver::{
    map_filter_pred_to_stream, map_func_pred_to_stream, map_xasl_to_stream, Flattener,
    XaslStream, XaslStreamHeader,
};
pub use error::{XtsError, XtsResult};
pub use nodes::{link, Link, Text};
pub use sink::{sizeof_node, Node, Sink};
pub use stream::{ArenaOffset, StreamArena};
