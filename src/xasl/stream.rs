//! Растущая арена потока (xts stream buffer) с выровненным резервированием.
//!
//! Контракт:
//! - reserve(size) возвращает смещение, кратное ALIGN_UNIT; size округляется вверх.
//! - ранее выданные смещения остаются валидными при росте (арена может переехать,
//!   поэтому снаружи живут только смещения).
//! - рост: max(needed, STREAM_EXPANSION_UNIT, len/2), через try_reserve => OutOfMemory.

use std::num::NonZeroU32;

use log::debug;

use super::error::{XtsError, XtsResult};
use crate::codec::make_align;
use crate::consts::{ALIGN_UNIT, STREAM_EXPANSION_UNIT};
use crate::metrics::record_xasl_arena_growth;

/// Смещение узла в арене. 0 зарезервирован под "null" и непредставим.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaOffset(NonZeroU32);

impl ArenaOffset {
    pub fn new(v: usize) -> Option<Self> {
        u32::try_from(v).ok().and_then(NonZeroU32::new).map(ArenaOffset)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0.get() as usize
    }

    /// Упакованное значение: 0 для None.
    #[inline]
    pub fn packed(off: Option<ArenaOffset>) -> i32 {
        off.map(|o| o.0.get() as i32).unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct StreamArena {
    buf: Vec<u8>,
    free_offset: usize,
}

impl StreamArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Пустая арена с заранее выделенной ёмкостью (0 = расти по политике).
    pub fn with_capacity(initial: usize) -> XtsResult<Self> {
        let mut a = Self::new();
        if initial > 0 {
            a.buf
                .try_reserve_exact(initial)
                .map_err(|_| XtsError::OutOfMemory("stream arena"))?;
            a.buf.resize(initial, 0);
        }
        Ok(a)
    }

    /// Зарезервировать `size` байт (с выравниванием) и вернуть смещение начала.
    pub fn reserve(&mut self, size: usize) -> XtsResult<usize> {
        let size = make_align(size, ALIGN_UNIT);
        let end = self
            .free_offset
            .checked_add(size)
            .ok_or(XtsError::StreamTooLarge(usize::MAX))?;
        if end > i32::MAX as usize {
            return Err(XtsError::StreamTooLarge(end));
        }

        if end > self.buf.len() {
            let needed = end - self.buf.len();
            let grow = needed.max(STREAM_EXPANSION_UNIT).max(self.buf.len() / 2);
            self.buf
                .try_reserve_exact(grow)
                .map_err(|_| XtsError::OutOfMemory("stream arena"))?;
            let new_len = self.buf.len() + grow;
            self.buf.resize(new_len, 0);
            record_xasl_arena_growth();
            debug!("xasl stream grown by {} to {} bytes", grow, new_len);
        }

        let offset = self.free_offset;
        self.free_offset = end;
        Ok(offset)
    }

    /// Записать уже упакованные байты в ранее зарезервированную область.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) {
        self.buf[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    #[inline]
    pub fn free_offset(&self) -> usize {
        self.free_offset
    }

    /// Выделено байт (capacity арены, не занятость).
    #[inline]
    pub fn allocated(&self) -> usize {
        self.buf.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.free_offset]
    }

    /// Отдать занятую часть буфера вызывающему.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.buf.truncate(self.free_offset);
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservations_are_aligned_for_all_sizes() {
        let mut a = StreamArena::new();
        for size in [0usize, 1, 2, 7, 8, 9, 15, 16, 17, 100, 4095] {
            let off = a.reserve(size).unwrap();
            assert_eq!(off % ALIGN_UNIT, 0, "size={size} off={off}");
            assert_eq!(a.free_offset() % ALIGN_UNIT, 0);
        }
    }

    #[test]
    fn growth_policy_uses_expansion_unit_then_half() {
        let mut a = StreamArena::new();
        a.reserve(8).unwrap();
        assert_eq!(a.allocated(), STREAM_EXPANSION_UNIT);

        // заполнить до конца и вылезти на 8 байт
        a.reserve(STREAM_EXPANSION_UNIT - 8).unwrap();
        a.reserve(8).unwrap();
        assert_eq!(a.allocated(), 2 * STREAM_EXPANSION_UNIT);

        // большой запрос растит ровно на needed
        let big = 10 * STREAM_EXPANSION_UNIT;
        let before = a.allocated();
        let free = a.free_offset();
        a.reserve(big).unwrap();
        assert_eq!(a.allocated(), before + (free + big - before));
    }

    #[test]
    fn earlier_offsets_survive_growth() {
        let mut a = StreamArena::new();
        let off = a.reserve(4).unwrap();
        a.write_at(off, &[1, 2, 3, 4]);
        for _ in 0..10 {
            a.reserve(STREAM_EXPANSION_UNIT).unwrap();
        }
        assert_eq!(&a.as_bytes()[off..off + 4], &[1, 2, 3, 4]);
    }

    #[test]
    fn arena_offset_zero_is_unrepresentable() {
        assert!(ArenaOffset::new(0).is_none());
        assert_eq!(ArenaOffset::packed(None), 0);
        assert_eq!(ArenaOffset::packed(ArenaOffset::new(24)), 24);
    }
}
