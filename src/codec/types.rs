//! Значения и идентификаторы, которыми оперирует кодек.

use super::CodecError;

/// Object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Oid {
    pub pageid: i32,
    pub slotid: i16,
    pub volid: i16,
}

impl Oid {
    pub const NULL: Oid = Oid {
        pageid: -1,
        slotid: -1,
        volid: -1,
    };

    pub fn new(pageid: i32, slotid: i16, volid: i16) -> Self {
        Self {
            pageid,
            slotid,
            volid,
        }
    }

    pub fn is_null(&self) -> bool {
        self.pageid == -1
    }
}

/// Volume + page id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Vpid {
    pub pageid: i32,
    pub volid: i16,
}

impl Vpid {
    pub const NULL: Vpid = Vpid {
        pageid: -1,
        volid: -1,
    };
}

/// Volume + file id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Vfid {
    pub fileid: i32,
    pub volid: i16,
}

impl Vfid {
    pub const NULL: Vfid = Vfid {
        fileid: -1,
        volid: -1,
    };

    pub fn is_null(&self) -> bool {
        self.fileid == -1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hfid {
    pub vfid: Vfid,
    pub hpgid: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Btid {
    pub vfid: Vfid,
    pub root_pageid: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ehid {
    pub vfid: Vfid,
    pub pageid: i32,
}

/// Коды типов (совместимы с нумерацией DB_TYPE_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum DbType {
    #[default]
    Null = 0,
    Integer = 1,
    Float = 2,
    Double = 3,
    Varchar = 4,
    Date = 12,
    Short = 18,
    Oid = 19,
    BigInt = 31,
}

impl DbType {
    pub fn from_i32(v: i32) -> Result<Self, CodecError> {
        Ok(match v {
            0 => DbType::Null,
            1 => DbType::Integer,
            2 => DbType::Float,
            3 => DbType::Double,
            4 => DbType::Varchar,
            12 => DbType::Date,
            18 => DbType::Short,
            19 => DbType::Oid,
            31 => DbType::BigInt,
            tag => return Err(CodecError::BadTag { what: "db type", tag }),
        })
    }
}

/// Домен (тип + параметры).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Domain {
    pub type_id: DbType,
    pub precision: i32,
    pub scale: i32,
    pub collation: u16,
}

impl Domain {
    pub fn of(type_id: DbType) -> Self {
        Self {
            type_id,
            ..Default::default()
        }
    }

    pub fn varchar(precision: i32, collation: u16) -> Self {
        Self {
            type_id: DbType::Varchar,
            precision,
            scale: 0,
            collation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DbValue {
    #[default]
    Null,
    Short(i16),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Varchar(String),
    Oid(Oid),
    Date(i32),
}

impl DbValue {
    pub fn db_type(&self) -> DbType {
        match self {
            DbValue::Null => DbType::Null,
            DbValue::Short(_) => DbType::Short,
            DbValue::Int(_) => DbType::Integer,
            DbValue::BigInt(_) => DbType::BigInt,
            DbValue::Float(_) => DbType::Float,
            DbValue::Double(_) => DbType::Double,
            DbValue::Varchar(_) => DbType::Varchar,
            DbValue::Oid(_) => DbType::Oid,
            DbValue::Date(_) => DbType::Date,
        }
    }
}

/// Идентификатор списка результатов (temp list file).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListId {
    pub query_id: i64,
    pub tuple_cnt: i64,
    pub page_cnt: i32,
    pub first_vpid: Vpid,
    pub last_vpid: Vpid,
    pub last_offset: i32,
    pub lasttpl_len: i32,
    pub temp_vfid: Vfid,
    /// Заполняется только на стороне сервера; при упаковке должен быть пуст.
    pub type_list: Vec<Domain>,
}
