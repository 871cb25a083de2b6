//! Visited-pointer cache: адрес исходного узла -> смещение в арене.
//!
//! 256 корзин, индекс = (addr / WORD_BITS) % 256, линейный поиск внутри корзины.
//! Ключ - пара (адрес, вид узла): разные виды могут начинаться по одному адресу
//! (структура и её первое поле).

use super::error::{XtsError, XtsResult};
use super::stream::ArenaOffset;
use crate::consts::{MAX_PTR_BLOCKS, START_PTR_PER_BLOCK, WORD_BITS};

/// Вид сохраняемого узла (часть ключа кэша).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    XaslNode,
    IndxInfo,
    PredExpr,
    ReguVariable,
    ReguVariableList,
    ReguVarlistList,
    KeyRangeArray,
    Arith,
    Aggregate,
    Function,
    Analytic,
    AnalyticEval,
    SortList,
    ListId,
    SortedListId,
    ValList,
    OutptrList,
    SelupdList,
    DbValue,
    CacheAttrinfo,
    MethodSigList,
    MethodSig,
    FilterPred,
    FuncPred,
    OdkuInfo,
    String,
    // элементы inline-массивов (в кэш не попадают)
    AccessSpec,
    UpddelClassInfo,
    UpdateAssignment,
}

#[derive(Debug, Clone, Copy)]
struct VisitedPtr {
    addr: usize,
    kind: NodeKind,
    // длина для срезов (строки, массивы); у узлов 0
    len: usize,
    offset: ArenaOffset,
}

#[derive(Debug)]
pub struct VisitedPtrs {
    blocks: Vec<Vec<VisitedPtr>>,
}

impl Default for VisitedPtrs {
    fn default() -> Self {
        Self::new()
    }
}

impl VisitedPtrs {
    pub fn new() -> Self {
        Self {
            blocks: (0..MAX_PTR_BLOCKS).map(|_| Vec::new()).collect(),
        }
    }

    #[inline]
    fn block_of(addr: usize) -> usize {
        (addr / WORD_BITS) % MAX_PTR_BLOCKS
    }

    pub fn get_offset(&self, addr: usize, kind: NodeKind) -> Option<ArenaOffset> {
        self.get_offset_sized(addr, kind, 0)
    }

    pub fn mark(&mut self, addr: usize, kind: NodeKind, offset: ArenaOffset) -> XtsResult<()> {
        self.mark_sized(addr, kind, 0, offset)
    }

    /// Срез с тем же началом, но другой длиной - другое значение.
    pub fn get_offset_sized(&self, addr: usize, kind: NodeKind, len: usize) -> Option<ArenaOffset> {
        self.blocks[Self::block_of(addr)]
            .iter()
            .find(|v| v.addr == addr && v.kind == kind && v.len == len)
            .map(|v| v.offset)
    }

    pub fn mark_sized(
        &mut self,
        addr: usize,
        kind: NodeKind,
        len: usize,
        offset: ArenaOffset,
    ) -> XtsResult<()> {
        let block = &mut self.blocks[Self::block_of(addr)];
        if block.len() == block.capacity() {
            // корзина стартует с 15 элементов и удваивается
            let extra = if block.capacity() == 0 {
                START_PTR_PER_BLOCK
            } else {
                block.capacity()
            };
            block
                .try_reserve_exact(extra)
                .map_err(|_| XtsError::OutOfMemory("visited pointer block"))?;
        }
        block.push(VisitedPtr {
            addr,
            kind,
            len,
            offset,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.blocks.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Сброс между независимыми вызовами; ёмкость корзин сохраняется.
    pub fn clear(&mut self) {
        for b in self.blocks.iter_mut() {
            b.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_address_different_kind_is_distinct() {
        let mut v = VisitedPtrs::new();
        let a = ArenaOffset::new(8).unwrap();
        let b = ArenaOffset::new(16).unwrap();
        v.mark(0x1000, NodeKind::XaslNode, a).unwrap();
        v.mark(0x1000, NodeKind::DbValue, b).unwrap();
        assert_eq!(v.get_offset(0x1000, NodeKind::XaslNode), Some(a));
        assert_eq!(v.get_offset(0x1000, NodeKind::DbValue), Some(b));
        assert_eq!(v.get_offset(0x1000, NodeKind::PredExpr), None);
    }

    #[test]
    fn same_address_different_len_is_distinct() {
        let mut v = VisitedPtrs::new();
        let a = ArenaOffset::new(8).unwrap();
        v.mark_sized(0x2000, NodeKind::String, 6, a).unwrap();
        assert_eq!(v.get_offset_sized(0x2000, NodeKind::String, 6), Some(a));
        assert_eq!(v.get_offset_sized(0x2000, NodeKind::String, 3), None);
        assert_eq!(v.get_offset(0x2000, NodeKind::String), None);
    }

    #[test]
    fn bucket_grows_past_start_size_and_clear_resets() {
        let mut v = VisitedPtrs::new();
        // все адреса в одну корзину: шаг WORD_BITS * MAX_PTR_BLOCKS
        let step = WORD_BITS * MAX_PTR_BLOCKS;
        for i in 0..(START_PTR_PER_BLOCK * 3) {
            let off = ArenaOffset::new(8 * (i + 1)).unwrap();
            v.mark(step * (i + 1), NodeKind::SortList, off).unwrap();
        }
        assert_eq!(v.len(), START_PTR_PER_BLOCK * 3);
        for i in 0..(START_PTR_PER_BLOCK * 3) {
            assert_eq!(
                v.get_offset(step * (i + 1), NodeKind::SortList).map(|o| o.get()),
                Some(8 * (i + 1))
            );
        }
        v.clear();
        assert!(v.is_empty());
        assert_eq!(v.get_offset(step, NodeKind::SortList), None);
    }
}
