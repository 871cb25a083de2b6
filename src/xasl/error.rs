use thiserror::Error;

use crate::codec::CodecError;

pub type XtsResult<T> = Result<T, XtsError>;

#[derive(Debug, Error)]
pub enum XtsError {
    /// Арена, visited-кэш или scratch-буфер не смогли вырасти.
    #[error("out of memory while flattening ({0})")]
    OutOfMemory(&'static str),

    /// Неизвестный дискриминант или несогласованная пара тег/вариант.
    #[error("invalid xasl node: {0}")]
    InvalidXaslNode(&'static str),

    /// Размер, посчитанный заранее, не совпал с реально упакованным.
    #[error("size mismatch for {kind}: sized {sized} bytes, packed {packed}")]
    SizeMismatch {
        kind: &'static str,
        sized: usize,
        packed: usize,
    },

    /// Смещения в потоке - 4-байтовые int.
    #[error("stream too large: {0} bytes")]
    StreamTooLarge(usize),

    #[error("malformed stream: {0}")]
    Codec(#[from] CodecError),
}

impl XtsError {
    /// Код ошибки для внешнего вызывающего (0 = успех не бывает).
    pub fn code(&self) -> i32 {
        match self {
            XtsError::OutOfMemory(_) => -2,
            XtsError::InvalidXaslNode(_) => -1004,
            XtsError::SizeMismatch { .. } => -1,
            XtsError::StreamTooLarge(_) => -2,
            XtsError::Codec(_) => -1004,
        }
    }
}
