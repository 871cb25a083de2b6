//! codec - двоичный кодек фиксированной ширины (семейство or_pack_* / or_get_*).
//!
//! Что здесь:
//! - OrWrite: приёмник байтов (Vec<u8> или счётчик размера); все or_pack_* пишут через него,
//!   поэтому размер и упаковка идут по одному пути кода.
//! - or_pack_*: big-endian int/bigint/double, OID/VPID/VFID/HFID/BTID/EHID/LSA, строки,
//!   домены, DB-значения, list id.
//! - OrReader: курсор для обратного разбора (заголовки потока, лог-записи, тесты).
//!
//! Типы значений (Oid, DbValue, Domain, ...) лежат в codec/types.rs.

pub mod types;

pub use types::{Btid, DbType, DbValue, Domain, Ehid, Hfid, ListId, Oid, Vfid, Vpid};

use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

use crate::consts::{
    OR_BIGINT_SIZE, OR_BTID_SIZE, OR_DOUBLE_SIZE, OR_EHID_SIZE, OR_HFID_SIZE, OR_INT_SIZE,
    OR_LIST_ID_SIZE, OR_OID_SIZE, OR_VFID_SIZE, OR_VPID_SIZE,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("truncated input: need {need} bytes at offset {at}, have {len}")]
    Truncated { need: usize, at: usize, len: usize },
    #[error("unknown tag {tag} for {what}")]
    BadTag { what: &'static str, tag: i32 },
    #[error("invalid utf-8 in packed string at offset {0}")]
    BadString(usize),
}

/// Приёмник упакованных байтов.
pub trait OrWrite {
    fn put_raw(&mut self, bytes: &[u8]);
}

impl OrWrite for Vec<u8> {
    #[inline]
    fn put_raw(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

/// Счётчик байтов без записи.
#[derive(Debug, Default, Clone, Copy)]
pub struct SizeCounter(pub usize);

impl OrWrite for SizeCounter {
    #[inline]
    fn put_raw(&mut self, bytes: &[u8]) {
        self.0 += bytes.len();
    }
}

// ----------------------------------------------------------------------------
// Scalars
// ----------------------------------------------------------------------------

#[inline]
pub fn or_pack_int<W: OrWrite + ?Sized>(w: &mut W, v: i32) {
    let mut tmp = [0u8; OR_INT_SIZE];
    BigEndian::write_i32(&mut tmp, v);
    w.put_raw(&tmp);
}

#[inline]
pub fn or_pack_bigint<W: OrWrite + ?Sized>(w: &mut W, v: i64) {
    let mut tmp = [0u8; OR_BIGINT_SIZE];
    BigEndian::write_i64(&mut tmp, v);
    w.put_raw(&tmp);
}

#[inline]
pub fn or_pack_double<W: OrWrite + ?Sized>(w: &mut W, v: f64) {
    let mut tmp = [0u8; OR_DOUBLE_SIZE];
    BigEndian::write_f64(&mut tmp, v);
    w.put_raw(&tmp);
}

// ----------------------------------------------------------------------------
// Identifiers
// ----------------------------------------------------------------------------

pub fn or_pack_oid<W: OrWrite + ?Sized>(w: &mut W, oid: &Oid) {
    let mut tmp = [0u8; OR_OID_SIZE];
    BigEndian::write_i32(&mut tmp[0..4], oid.pageid);
    BigEndian::write_i16(&mut tmp[4..6], oid.slotid);
    BigEndian::write_i16(&mut tmp[6..8], oid.volid);
    w.put_raw(&tmp);
}

pub fn or_pack_vpid<W: OrWrite + ?Sized>(w: &mut W, vpid: &Vpid) {
    let mut tmp = [0u8; OR_VPID_SIZE];
    BigEndian::write_i32(&mut tmp[0..4], vpid.pageid);
    BigEndian::write_i16(&mut tmp[4..6], vpid.volid);
    w.put_raw(&tmp);
}

pub fn or_pack_vfid<W: OrWrite + ?Sized>(w: &mut W, vfid: &Vfid) {
    let mut tmp = [0u8; OR_VFID_SIZE];
    BigEndian::write_i32(&mut tmp[0..4], vfid.fileid);
    BigEndian::write_i16(&mut tmp[4..6], vfid.volid);
    w.put_raw(&tmp);
}

pub fn or_pack_hfid<W: OrWrite + ?Sized>(w: &mut W, hfid: &Hfid) {
    or_pack_vfid(w, &hfid.vfid);
    or_pack_int(w, hfid.hpgid);
}

pub fn or_pack_btid<W: OrWrite + ?Sized>(w: &mut W, btid: &Btid) {
    or_pack_vfid(w, &btid.vfid);
    or_pack_int(w, btid.root_pageid);
}

pub fn or_pack_ehid<W: OrWrite + ?Sized>(w: &mut W, ehid: &Ehid) {
    or_pack_vfid(w, &ehid.vfid);
    or_pack_int(w, ehid.pageid);
}

// ----------------------------------------------------------------------------
// Strings / domains / values
// ----------------------------------------------------------------------------

/// Длина упакованной строки: [int len][bytes][NUL][pad to 4]; None => [int -1].
pub fn or_packed_string_length(s: Option<&str>) -> usize {
    match s {
        None => OR_INT_SIZE,
        Some(s) => OR_INT_SIZE + align4(s.len() + 1),
    }
}

pub fn or_pack_string<W: OrWrite + ?Sized>(w: &mut W, s: Option<&str>) {
    match s {
        None => or_pack_int(w, -1),
        Some(s) => {
            or_pack_int(w, s.len() as i32);
            w.put_raw(s.as_bytes());
            let pad = align4(s.len() + 1) - s.len();
            const ZEROS: [u8; 4] = [0u8; 4];
            w.put_raw(&ZEROS[..pad]);
        }
    }
}

/// [int type][int precision][int scale]
pub fn or_pack_domain<W: OrWrite + ?Sized>(w: &mut W, d: &Domain) {
    or_pack_int(w, d.type_id as i32 | ((d.collation as i32) << 16));
    or_pack_int(w, d.precision);
    or_pack_int(w, d.scale);
}

pub fn or_pack_db_value<W: OrWrite + ?Sized>(w: &mut W, v: &DbValue) {
    or_pack_int(w, v.db_type() as i32);
    match v {
        DbValue::Null => {}
        DbValue::Short(x) => or_pack_int(w, *x as i32),
        DbValue::Int(x) | DbValue::Date(x) => or_pack_int(w, *x),
        DbValue::BigInt(x) => or_pack_bigint(w, *x),
        DbValue::Float(x) => or_pack_int(w, x.to_bits() as i32),
        DbValue::Double(x) => or_pack_double(w, *x),
        DbValue::Varchar(s) => or_pack_string(w, Some(s.as_str())),
        DbValue::Oid(oid) => or_pack_oid(w, oid),
    }
}

pub fn or_packed_db_value_size(v: &DbValue) -> usize {
    let mut c = SizeCounter::default();
    or_pack_db_value(&mut c, v);
    c.0
}

/// Пакует list id. Вызывающий обязан проверить, что type list пуст
/// (с клиента на сервер список типов не передаётся).
pub fn or_pack_listid<W: OrWrite + ?Sized>(w: &mut W, l: &ListId) {
    or_pack_bigint(w, l.query_id);
    or_pack_bigint(w, l.tuple_cnt);
    or_pack_int(w, l.page_cnt);
    or_pack_vpid(w, &l.first_vpid);
    or_pack_vpid(w, &l.last_vpid);
    or_pack_int(w, l.last_offset);
    or_pack_int(w, l.lasttpl_len);
    or_pack_vfid(w, &l.temp_vfid);
    or_pack_int(w, l.type_list.len() as i32);
}

#[inline]
pub const fn align4(n: usize) -> usize {
    (n + 3) & !3
}

/// Выравнивание вверх к `unit` (степень двойки).
#[inline]
pub const fn make_align(n: usize, unit: usize) -> usize {
    (n + unit - 1) & !(unit - 1)
}

// ----------------------------------------------------------------------------
// Reader
// ----------------------------------------------------------------------------

/// Курсор разбора упакованных данных.
#[derive(Debug, Clone)]
pub struct OrReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> OrReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                need: n,
                at: self.pos,
                len: self.buf.len(),
            });
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn get_int(&mut self) -> Result<i32, CodecError> {
        Ok(BigEndian::read_i32(self.take(OR_INT_SIZE)?))
    }

    pub fn get_bigint(&mut self) -> Result<i64, CodecError> {
        Ok(BigEndian::read_i64(self.take(OR_BIGINT_SIZE)?))
    }

    pub fn get_double(&mut self) -> Result<f64, CodecError> {
        Ok(BigEndian::read_f64(self.take(OR_DOUBLE_SIZE)?))
    }

    pub fn get_oid(&mut self) -> Result<Oid, CodecError> {
        let b = self.take(OR_OID_SIZE)?;
        Ok(Oid {
            pageid: BigEndian::read_i32(&b[0..4]),
            slotid: BigEndian::read_i16(&b[4..6]),
            volid: BigEndian::read_i16(&b[6..8]),
        })
    }

    pub fn get_vpid(&mut self) -> Result<Vpid, CodecError> {
        let b = self.take(OR_VPID_SIZE)?;
        Ok(Vpid {
            pageid: BigEndian::read_i32(&b[0..4]),
            volid: BigEndian::read_i16(&b[4..6]),
        })
    }

    pub fn get_vfid(&mut self) -> Result<Vfid, CodecError> {
        let b = self.take(OR_VFID_SIZE)?;
        Ok(Vfid {
            fileid: BigEndian::read_i32(&b[0..4]),
            volid: BigEndian::read_i16(&b[4..6]),
        })
    }

    pub fn get_hfid(&mut self) -> Result<Hfid, CodecError> {
        let vfid = self.get_vfid()?;
        let hpgid = self.get_int()?;
        Ok(Hfid { vfid, hpgid })
    }

    pub fn get_btid(&mut self) -> Result<Btid, CodecError> {
        let vfid = self.get_vfid()?;
        let root_pageid = self.get_int()?;
        Ok(Btid { vfid, root_pageid })
    }

    pub fn get_string(&mut self) -> Result<Option<String>, CodecError> {
        let at = self.pos;
        let len = self.get_int()?;
        if len < 0 {
            return Ok(None);
        }
        let len = len as usize;
        let padded = align4(len + 1);
        let b = self.take(padded)?;
        let s = std::str::from_utf8(&b[..len]).map_err(|_| CodecError::BadString(at))?;
        Ok(Some(s.to_string()))
    }

    pub fn get_domain(&mut self) -> Result<Domain, CodecError> {
        let word = self.get_int()?;
        let type_id = DbType::from_i32(word & 0xFFFF)?;
        let collation = ((word >> 16) & 0xFFFF) as u16;
        let precision = self.get_int()?;
        let scale = self.get_int()?;
        Ok(Domain {
            type_id,
            precision,
            scale,
            collation,
        })
    }

    pub fn get_db_value(&mut self) -> Result<DbValue, CodecError> {
        let t = DbType::from_i32(self.get_int()?)?;
        Ok(match t {
            DbType::Null => DbValue::Null,
            DbType::Short => DbValue::Short(self.get_int()? as i16),
            DbType::Integer => DbValue::Int(self.get_int()?),
            DbType::Date => DbValue::Date(self.get_int()?),
            DbType::BigInt => DbValue::BigInt(self.get_bigint()?),
            DbType::Float => DbValue::Float(f32::from_bits(self.get_int()? as u32)),
            DbType::Double => DbValue::Double(self.get_double()?),
            DbType::Varchar => DbValue::Varchar(self.get_string()?.unwrap_or_default()),
            DbType::Oid => DbValue::Oid(self.get_oid()?),
        })
    }

    pub fn get_listid(&mut self) -> Result<ListId, CodecError> {
        let query_id = self.get_bigint()?;
        let tuple_cnt = self.get_bigint()?;
        let page_cnt = self.get_int()?;
        let first_vpid = self.get_vpid()?;
        let last_vpid = self.get_vpid()?;
        let last_offset = self.get_int()?;
        let lasttpl_len = self.get_int()?;
        let temp_vfid = self.get_vfid()?;
        let _type_cnt = self.get_int()?;
        Ok(ListId {
            query_id,
            tuple_cnt,
            page_cnt,
            first_vpid,
            last_vpid,
            last_offset,
            lasttpl_len,
            temp_vfid,
            type_list: Vec::new(),
        })
    }
}

// Размеры фиксированных структур должны совпадать с тем, что реально пишется.
const _: () = assert!(OR_HFID_SIZE == OR_VFID_SIZE + OR_INT_SIZE);
const _: () = assert!(OR_BTID_SIZE == OR_VFID_SIZE + OR_INT_SIZE);
const _: () = assert!(OR_EHID_SIZE == OR_VFID_SIZE + OR_INT_SIZE);
const _: () = assert!(
    OR_LIST_ID_SIZE
        == 2 * OR_BIGINT_SIZE + OR_INT_SIZE + 2 * OR_VPID_SIZE + 2 * OR_INT_SIZE + OR_VFID_SIZE
            + OR_INT_SIZE
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_padding_and_null() {
        let mut v = Vec::new();
        or_pack_string(&mut v, Some("abc"));
        assert_eq!(v.len(), or_packed_string_length(Some("abc")));
        assert_eq!(v.len(), 8); // 4 + align4(3+1)
        or_pack_string(&mut v, None);
        assert_eq!(v.len(), 12);

        let mut r = OrReader::new(&v);
        assert_eq!(r.get_string().unwrap().as_deref(), Some("abc"));
        assert_eq!(r.get_string().unwrap(), None);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn db_value_sizes_match_written() {
        let values = [
            DbValue::Null,
            DbValue::Short(-3),
            DbValue::Int(7),
            DbValue::BigInt(1 << 40),
            DbValue::Float(1.5),
            DbValue::Double(-2.25),
            DbValue::Varchar("hello".into()),
            DbValue::Oid(Oid::new(10, 2, 0)),
            DbValue::Date(738_000),
        ];
        for v in values.iter() {
            let mut out = Vec::new();
            or_pack_db_value(&mut out, v);
            assert_eq!(out.len(), or_packed_db_value_size(v), "value {:?}", v);
            let back = OrReader::new(&out).get_db_value().unwrap();
            assert_eq!(&back, v);
        }
    }

    #[test]
    fn list_id_fixed_size() {
        let mut out = Vec::new();
        let l = ListId {
            query_id: 9,
            tuple_cnt: 120,
            page_cnt: 3,
            ..ListId::default()
        };
        or_pack_listid(&mut out, &l);
        assert_eq!(out.len(), OR_LIST_ID_SIZE);
        assert_eq!(OrReader::new(&out).get_listid().unwrap(), l);
    }

    #[test]
    fn file_ids_and_domain_read_back() {
        let vfid = Vfid { fileid: 40, volid: 2 };
        let hfid = Hfid { vfid, hpgid: 77 };
        let btid = Btid { vfid, root_pageid: 5 };
        let dom = Domain {
            type_id: DbType::Varchar,
            precision: 64,
            scale: 0,
            collation: 3,
        };
        let mut out = Vec::new();
        or_pack_hfid(&mut out, &hfid);
        or_pack_btid(&mut out, &btid);
        or_pack_domain(&mut out, &dom);

        let mut r = OrReader::new(&out);
        assert_eq!(r.get_hfid().unwrap(), hfid);
        assert_eq!(r.get_btid().unwrap(), btid);
        assert_eq!(r.get_domain().unwrap(), dom);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn truncated_read_reports_position() {
        let buf = [0u8; 3];
        let err = OrReader::new(&buf).get_int().unwrap_err();
        assert_eq!(
            err,
            CodecError::Truncated {
                need: 4,
                at: 0,
                len: 3
            }
        );
    }

    #[test]
    fn make_align_rounds_up() {
        assert_eq!(make_align(0, 8), 0);
        assert_eq!(make_align(1, 8), 8);
        assert_eq!(make_align(8, 8), 8);
        assert_eq!(make_align(13, 8), 16);
    }
}
