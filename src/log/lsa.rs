//! LSA: адрес в логе (logical pageid, offset внутри лог-области).

use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use crate::consts::OR_LSA_SIZE;

/// Порядок - сначала pageid, потом offset; NULL (-1,-1) меньше любого реального адреса.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogLsa {
    pub pageid: i64,
    pub offset: i16,
}

impl LogLsa {
    pub const NULL: LogLsa = LogLsa {
        pageid: -1,
        offset: -1,
    };

    /// pageid занимает 48 бит.
    pub const MAX_PAGEID: i64 = (1 << 47) - 1;

    pub const fn new(pageid: i64, offset: i16) -> Self {
        Self { pageid, offset }
    }

    pub fn is_null(&self) -> bool {
        self.pageid == -1
    }

    pub fn set_null(&mut self) {
        *self = Self::NULL;
    }

    /// [pageid 48 бит][offset 16 бит], big-endian.
    pub fn encode(&self, out: &mut [u8]) {
        debug_assert!(out.len() >= OR_LSA_SIZE);
        let packed = ((self.pageid as u64) << 16) | (self.offset as u16 as u64);
        BigEndian::write_u64(&mut out[..OR_LSA_SIZE], packed);
    }

    pub fn decode(buf: &[u8]) -> Self {
        let packed = BigEndian::read_u64(&buf[..OR_LSA_SIZE]);
        let offset = (packed & 0xFFFF) as u16 as i16;
        // знаковое расширение 48-битного pageid
        let pageid = (packed as i64) >> 16;
        Self { pageid, offset }
    }
}

impl Default for LogLsa {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for LogLsa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}|{})", self.pageid, self.offset)
    }
}
