//! Sink: единый путь кода для размера и упаковки узла.
//!
//! Каждый узел описывает свои поля один раз (`Node::process`). Прогон через
//! `SizeSink` считает байты (детей не трогает: ссылка = 4 байта), прогон через
//! `PackSink` пишет байты и рекурсивно сохраняет детей через `FlattenContext`.

use super::context::FlattenContext;
use super::error::{XtsError, XtsResult};
use super::nodes::{CacheAttrinfo, KeyRange, Link, ReguVariableList, ReguVarlistList};
use super::stream::ArenaOffset;
use super::visited::NodeKind;
use crate::codec::{
    or_pack_bigint, or_pack_btid, or_pack_db_value, or_pack_domain, or_pack_double, or_pack_ehid,
    or_pack_hfid, or_pack_int, or_pack_oid, or_pack_vfid, DbValue, Domain, Hfid, Oid, OrWrite,
};
use crate::codec::{Btid, Ehid, Vfid};
use crate::consts::OR_INT_SIZE;

/// Узел XASL-дерева, который умеет описать свою упакованную форму.
pub trait Node {
    const KIND: NodeKind;

    /// Поля узла в порядке упаковки. Вызывается дважды: для размера и для записи.
    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()>;
}

pub trait Sink<'t>: OrWrite + Sized {
    /// Записать 4-байтовое смещение, которое вернёт `f`.
    /// SizeSink не вызывает `f`.
    fn put_offset_with<F>(&mut self, f: F) -> XtsResult<()>
    where
        F: FnOnce(&mut FlattenContext<'t>) -> XtsResult<Option<ArenaOffset>>;

    #[inline]
    fn int(&mut self, v: i32) {
        or_pack_int(self, v)
    }

    #[inline]
    fn flag(&mut self, v: bool) {
        or_pack_int(self, v as i32)
    }

    #[inline]
    fn bigint(&mut self, v: i64) {
        or_pack_bigint(self, v)
    }

    #[inline]
    fn double(&mut self, v: f64) {
        or_pack_double(self, v)
    }

    fn oid(&mut self, v: &Oid) {
        or_pack_oid(self, v)
    }

    fn hfid(&mut self, v: &Hfid) {
        or_pack_hfid(self, v)
    }

    fn btid(&mut self, v: &Btid) {
        or_pack_btid(self, v)
    }

    fn ehid(&mut self, v: &Ehid) {
        or_pack_ehid(self, v)
    }

    fn vfid(&mut self, v: &Vfid) {
        or_pack_vfid(self, v)
    }

    fn domain(&mut self, d: &Domain) {
        or_pack_domain(self, d)
    }

    /// DB value, упакованный прямо в узел (не по ссылке).
    fn db_value_inline(&mut self, v: &DbValue) {
        or_pack_db_value(self, v)
    }

    // ------------------------------------------------------------------
    // Ссылки
    // ------------------------------------------------------------------

    fn node<N: Node>(&mut self, n: Option<&'t N>) -> XtsResult<()> {
        self.put_offset_with(move |cx| cx.save(n))
    }

    #[inline]
    fn link<N: Node>(&mut self, n: &'t Link<N>) -> XtsResult<()> {
        self.node(n.as_deref())
    }

    fn string(&mut self, v: Option<&'t str>) -> XtsResult<()> {
        self.put_offset_with(move |cx| cx.save_string(v))
    }

    fn int_array(&mut self, v: &'t [i32]) -> XtsResult<()> {
        self.put_offset_with(move |cx| cx.save_int_array(v))
    }

    fn oid_array(&mut self, v: &'t [Oid]) -> XtsResult<()> {
        self.put_offset_with(move |cx| cx.save_oid_array(v))
    }

    fn hfid_array(&mut self, v: &'t [Hfid]) -> XtsResult<()> {
        self.put_offset_with(move |cx| cx.save_hfid_array(v))
    }

    fn db_value_array(&mut self, v: &'t [Link<DbValue>]) -> XtsResult<()> {
        self.put_offset_with(move |cx| cx.save_db_value_array(v))
    }

    fn int_array_table(&mut self, v: &'t [Vec<i32>]) -> XtsResult<()> {
        self.put_offset_with(move |cx| cx.save_int_array_table(v))
    }

    fn regu_list(&mut self, v: &'t Link<ReguVariableList>) -> XtsResult<()> {
        self.put_offset_with(move |cx| cx.save_regu_variable_list(v.as_deref()))
    }

    fn varlist_list(&mut self, v: &'t Link<ReguVarlistList>) -> XtsResult<()> {
        self.put_offset_with(move |cx| cx.save_regu_varlist_list(v.as_deref()))
    }

    fn key_ranges(&mut self, v: &'t [KeyRange]) -> XtsResult<()> {
        self.put_offset_with(move |cx| cx.save_key_range_array(v))
    }

    /// Массив структур, упакованных подряд в одном резерве.
    fn inline_array<N: Node>(&mut self, v: &'t [N]) -> XtsResult<()> {
        self.put_offset_with(move |cx| cx.save_inline_array(v))
    }

    /// Общий кэш атрибутов: дедуплицируется как любой узел.
    #[inline]
    fn cache_attrinfo(&mut self, v: &'t Link<CacheAttrinfo>) -> XtsResult<()> {
        self.link(v)
    }
}

// ----------------------------------------------------------------------------
// SizeSink
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SizeSink {
    size: usize,
}

impl SizeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl OrWrite for SizeSink {
    #[inline]
    fn put_raw(&mut self, bytes: &[u8]) {
        self.size += bytes.len();
    }
}

impl<'t> Sink<'t> for SizeSink {
    #[inline]
    fn put_offset_with<F>(&mut self, _f: F) -> XtsResult<()>
    where
        F: FnOnce(&mut FlattenContext<'t>) -> XtsResult<Option<ArenaOffset>>,
    {
        self.size += OR_INT_SIZE;
        Ok(())
    }
}

/// Размер собственного представления узла (без детей).
pub fn sizeof_node<'t, N: Node>(n: &'t N) -> XtsResult<usize> {
    let mut s = SizeSink::new();
    n.process(&mut s)?;
    Ok(s.size())
}

// ----------------------------------------------------------------------------
// PackSink
// ----------------------------------------------------------------------------

pub struct PackSink<'c, 't> {
    cx: &'c mut FlattenContext<'t>,
    buf: Vec<u8>,
}

impl<'c, 't> PackSink<'c, 't> {
    pub fn new(cx: &'c mut FlattenContext<'t>, size_hint: usize) -> XtsResult<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(size_hint)
            .map_err(|_| XtsError::OutOfMemory("pack scratch buffer"))?;
        Ok(Self { cx, buf })
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl OrWrite for PackSink<'_, '_> {
    #[inline]
    fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

impl<'c, 't> Sink<'t> for PackSink<'c, 't> {
    fn put_offset_with<F>(&mut self, f: F) -> XtsResult<()>
    where
        F: FnOnce(&mut FlattenContext<'t>) -> XtsResult<Option<ArenaOffset>>,
    {
        let off = f(&mut *self.cx)?;
        or_pack_int(&mut self.buf, ArenaOffset::packed(off));
        Ok(())
    }
}
