//! FlattenContext: арена + visited-кэш одного вызова flatten.
//!
//! Что здесь:
//! - save::<N>() - общий алгоритм сохранения узла (size -> reserve -> mark -> pack -> copy);
//! - специальные save_* для строк, массивов и списков, у которых нет собственного
//!   Node-представления (таблицы смещений, inline-массивы структур).
//!
//! Контекст не разделяется между вызовами: всё состояние живёт в нём и
//! освобождается вместе с ним (в том числе на пути ошибки).

use std::marker::PhantomData;

use log::trace;

use super::error::{XtsError, XtsResult};
use super::nodes::{KeyRange, Link, ReguVariable, ReguVariableList, ReguVarlistList};
use super::sink::{sizeof_node, Node, PackSink};
use super::stream::{ArenaOffset, StreamArena};
use super::visited::{NodeKind, VisitedPtrs};
use crate::codec::{
    or_pack_hfid, or_pack_int, or_pack_oid, or_pack_string, or_packed_string_length, DbValue,
    Hfid, Oid,
};
use crate::consts::{ALIGN_UNIT, OR_HFID_SIZE, OR_INT_SIZE, OR_OID_SIZE};
use crate::metrics::{record_xasl_dedup_hit, record_xasl_node_saved};

/// `'t` - время жизни дерева: адреса узлов служат ключами кэша и должны
/// оставаться валидными, пока жив контекст.
#[derive(Debug)]
pub struct FlattenContext<'t> {
    arena: StreamArena,
    visited: VisitedPtrs,
    header_region: usize,
    _tree: PhantomData<&'t ()>,
}

impl<'t> FlattenContext<'t> {
    /// Контекст с минимальной (одна единица выравнивания) областью заголовка.
    pub fn new() -> XtsResult<Self> {
        Self::with_header(0, 0)
    }

    /// Зарезервировать область заголовка `header_region` байт (не меньше ALIGN_UNIT),
    /// чтобы ни один узел не получил смещение 0.
    pub fn with_header(initial_capacity: usize, header_region: usize) -> XtsResult<Self> {
        let mut arena = StreamArena::with_capacity(initial_capacity)?;
        let start = arena.reserve(header_region.max(ALIGN_UNIT))?;
        debug_assert_eq!(start, 0);
        Ok(Self {
            header_region: arena.free_offset(),
            arena,
            visited: VisitedPtrs::new(),
            _tree: PhantomData,
        })
    }

    #[inline]
    pub fn header_region(&self) -> usize {
        self.header_region
    }

    pub fn arena(&self) -> &StreamArena {
        &self.arena
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    pub fn into_arena(self) -> StreamArena {
        self.arena
    }

    fn reserve_offset(&mut self, size: usize) -> XtsResult<ArenaOffset> {
        let off = self.arena.reserve(size)?;
        // область заголовка не пуста, поэтому 0 здесь невозможен
        ArenaOffset::new(off).ok_or(XtsError::StreamTooLarge(off))
    }

    fn check_size(kind: &'static str, sized: usize, packed: usize) -> XtsResult<()> {
        if sized != packed {
            return Err(XtsError::SizeMismatch {
                kind,
                sized,
                packed,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Generic save
    // ------------------------------------------------------------------

    /// Сохранить узел и вернуть его смещение. None -> None (упакуется как 0).
    pub fn save<N: Node>(&mut self, node: Option<&'t N>) -> XtsResult<Option<ArenaOffset>> {
        let Some(node) = node else {
            return Ok(None);
        };
        let addr = node as *const N as usize;
        if let Some(off) = self.visited.get_offset(addr, N::KIND) {
            record_xasl_dedup_hit();
            return Ok(Some(off));
        }

        let size = sizeof_node(node)?;
        let offset = self.reserve_offset(size)?;
        // отметить до рекурсии: общие поддеревья и случайные циклы
        self.visited.mark(addr, N::KIND, offset)?;

        let mut packer = PackSink::new(self, size)?;
        node.process(&mut packer)?;
        let bytes = packer.into_bytes();
        Self::check_size(std::any::type_name::<N>(), size, bytes.len())?;

        self.arena.write_at(offset.get(), &bytes);
        record_xasl_node_saved();
        trace!("xts save {:?} @{} ({} bytes)", N::KIND, offset.get(), size);
        Ok(Some(offset))
    }

    // ------------------------------------------------------------------
    // Special saves
    // ------------------------------------------------------------------

    /// Строки дедуплицируются по адресу и длине.
    pub fn save_string(&mut self, s: Option<&'t str>) -> XtsResult<Option<ArenaOffset>> {
        let Some(s) = s else {
            return Ok(None);
        };
        let addr = s.as_ptr() as usize;
        if let Some(off) = self.visited.get_offset_sized(addr, NodeKind::String, s.len()) {
            record_xasl_dedup_hit();
            return Ok(Some(off));
        }
        let size = or_packed_string_length(Some(s));
        let offset = self.reserve_offset(size)?;
        self.visited.mark_sized(addr, NodeKind::String, s.len(), offset)?;

        let mut buf = Vec::with_capacity(size);
        or_pack_string(&mut buf, Some(s));
        Self::check_size("string", size, buf.len())?;
        self.arena.write_at(offset.get(), &buf);
        Ok(Some(offset))
    }

    /// Пустой массив сохраняется как null.
    pub fn save_int_array(&mut self, v: &[i32]) -> XtsResult<Option<ArenaOffset>> {
        if v.is_empty() {
            return Ok(None);
        }
        let mut buf = Vec::with_capacity(OR_INT_SIZE * v.len());
        for &x in v {
            or_pack_int(&mut buf, x);
        }
        let offset = self.reserve_offset(buf.len())?;
        self.arena.write_at(offset.get(), &buf);
        Ok(Some(offset))
    }

    pub fn save_oid_array(&mut self, v: &[Oid]) -> XtsResult<Option<ArenaOffset>> {
        if v.is_empty() {
            return Ok(None);
        }
        let mut buf = Vec::with_capacity(OR_OID_SIZE * v.len());
        for oid in v {
            or_pack_oid(&mut buf, oid);
        }
        let offset = self.reserve_offset(buf.len())?;
        self.arena.write_at(offset.get(), &buf);
        Ok(Some(offset))
    }

    pub fn save_hfid_array(&mut self, v: &[Hfid]) -> XtsResult<Option<ArenaOffset>> {
        if v.is_empty() {
            return Ok(None);
        }
        let mut buf = Vec::with_capacity(OR_HFID_SIZE * v.len());
        for hfid in v {
            or_pack_hfid(&mut buf, hfid);
        }
        let offset = self.reserve_offset(buf.len())?;
        self.arena.write_at(offset.get(), &buf);
        Ok(Some(offset))
    }

    /// Массив DB_VALUE*: каждое значение отдельно, затем таблица смещений.
    pub fn save_db_value_array(
        &mut self,
        v: &'t [Link<DbValue>],
    ) -> XtsResult<Option<ArenaOffset>> {
        if v.is_empty() {
            return Ok(None);
        }
        let mut offsets = Vec::new();
        offsets
            .try_reserve_exact(v.len())
            .map_err(|_| XtsError::OutOfMemory("db value offset table"))?;
        for val in v {
            offsets.push(ArenaOffset::packed(self.save(val.as_deref())?));
        }
        self.save_int_array(&offsets)
    }

    /// Таблица смещений int-массивов (lob attr ids по подклассам).
    /// Таблица резервируется раньше самих массивов.
    pub fn save_int_array_table(&mut self, v: &[Vec<i32>]) -> XtsResult<Option<ArenaOffset>> {
        if v.is_empty() {
            return Ok(None);
        }
        let table = self.reserve_offset(OR_INT_SIZE * v.len())?;
        let mut buf = Vec::with_capacity(OR_INT_SIZE * v.len());
        for ids in v {
            let off = self.save_int_array(ids)?;
            or_pack_int(&mut buf, ArenaOffset::packed(off));
        }
        self.arena.write_at(table.get(), &buf);
        Ok(Some(table))
    }

    /// Список regu-переменных как `[count, offsets...]`, без рекурсии по next на сервере.
    pub fn save_regu_variable_list(
        &mut self,
        list: Option<&'t ReguVariableList>,
    ) -> XtsResult<Option<ArenaOffset>> {
        let Some(list) = list else {
            return Ok(None);
        };
        let addr = list as *const ReguVariableList as usize;
        if let Some(off) = self.visited.get_offset(addr, NodeKind::ReguVariableList) {
            record_xasl_dedup_hit();
            return Ok(Some(off));
        }
        let table = self.offset_table(list.items.len(), |cx, i| {
            cx.save::<ReguVariable>(Some(&list.items[i]))
        })?;
        let offset = self.save_int_array(&table)?;
        if let Some(off) = offset {
            self.visited.mark(addr, NodeKind::ReguVariableList, off)?;
        }
        Ok(offset)
    }

    pub fn save_regu_varlist_list(
        &mut self,
        list: Option<&'t ReguVarlistList>,
    ) -> XtsResult<Option<ArenaOffset>> {
        let Some(list) = list else {
            return Ok(None);
        };
        let addr = list as *const ReguVarlistList as usize;
        if let Some(off) = self.visited.get_offset(addr, NodeKind::ReguVarlistList) {
            record_xasl_dedup_hit();
            return Ok(Some(off));
        }
        let table = self.offset_table(list.lists.len(), |cx, i| {
            cx.save_regu_variable_list(list.lists[i].as_deref())
        })?;
        let offset = self.save_int_array(&table)?;
        if let Some(off) = offset {
            self.visited.mark(addr, NodeKind::ReguVarlistList, off)?;
        }
        Ok(offset)
    }

    fn offset_table<F>(&mut self, n: usize, mut save_item: F) -> XtsResult<Vec<i32>>
    where
        F: FnMut(&mut Self, usize) -> XtsResult<Option<ArenaOffset>>,
    {
        let mut table = Vec::new();
        table
            .try_reserve_exact(n + 1)
            .map_err(|_| XtsError::OutOfMemory("offset table"))?;
        table.push(n as i32);
        for i in 0..n {
            let off = save_item(self, i)?;
            table.push(ArenaOffset::packed(off));
        }
        Ok(table)
    }

    /// Key ranges: 3 int на диапазон (range, key1, key2).
    pub fn save_key_range_array(&mut self, v: &'t [KeyRange]) -> XtsResult<Option<ArenaOffset>> {
        if v.is_empty() {
            return Ok(None);
        }
        let addr = v.as_ptr() as usize;
        if let Some(off) = self.visited.get_offset_sized(addr, NodeKind::KeyRangeArray, v.len()) {
            record_xasl_dedup_hit();
            return Ok(Some(off));
        }
        let mut table = Vec::new();
        table
            .try_reserve_exact(3 * v.len())
            .map_err(|_| XtsError::OutOfMemory("key range table"))?;
        for kr in v {
            table.push(kr.range as i32);
            table.push(ArenaOffset::packed(self.save(kr.key1.as_deref())?));
            table.push(ArenaOffset::packed(self.save(kr.key2.as_deref())?));
        }
        let offset = self.save_int_array(&table)?;
        if let Some(off) = offset {
            self.visited.mark_sized(addr, NodeKind::KeyRangeArray, v.len(), off)?;
        }
        Ok(offset)
    }

    /// Массив структур подряд в одном резерве; дети сохраняются во время упаковки.
    pub fn save_inline_array<N: Node>(&mut self, v: &'t [N]) -> XtsResult<Option<ArenaOffset>> {
        if v.is_empty() {
            return Ok(None);
        }
        let mut size = 0usize;
        for item in v {
            size += sizeof_node(item)?;
        }
        let offset = self.reserve_offset(size)?;

        let mut packer = PackSink::new(self, size)?;
        for item in v {
            item.process(&mut packer)?;
        }
        let bytes = packer.into_bytes();
        Self::check_size(std::any::type_name::<N>(), size, bytes.len())?;
        self.arena.write_at(offset.get(), &bytes);
        Ok(Some(offset))
    }
}
