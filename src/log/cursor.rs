//! Курсор добавления в лог-область.
//!
//! Одни и те же правила используются при резервировании (prior list, под
//! мьютексом) и при физической записи (drain) и чтении записи, поэтому
//! физические позиции совпадают с зарезервированными LSA.
//!
//! Правила:
//! - align: offset выравнивается до LOG_ALIGN; если вышли за область - следующая страница;
//! - advance_when_doesnt_fit(n): если offset + n >= area - следующая страница;
//! - add_align(n): offset += n, затем align;
//! - append_data(n): align, затем кусками по страницам, затем align.
//!
//! Раскладка записи: start_record (заголовок), data_header, undo, redo, end_record.

use std::ops::Range;

use super::lsa::LogLsa;
use crate::codec::make_align;
use crate::consts::{LOG_ALIGN, LOG_RECORD_HEADER_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendCursor {
    lsa: LogLsa,
    area: usize,
}

impl AppendCursor {
    pub fn new(lsa: LogLsa, area: usize) -> Self {
        debug_assert!(area > 0 && area <= i16::MAX as usize + 1);
        debug_assert!(!lsa.is_null());
        Self { lsa, area }
    }

    pub fn lsa(&self) -> LogLsa {
        self.lsa
    }

    pub fn area(&self) -> usize {
        self.area
    }

    #[inline]
    fn offset(&self) -> usize {
        self.lsa.offset as usize
    }

    #[inline]
    fn next_page(&mut self) {
        self.lsa.pageid += 1;
        self.lsa.offset = 0;
    }

    pub fn align(&mut self) {
        let off = make_align(self.offset(), LOG_ALIGN);
        if off >= self.area {
            self.next_page();
        } else {
            self.lsa.offset = off as i16;
        }
    }

    pub fn advance_when_doesnt_fit(&mut self, len: usize) {
        if self.offset() + len >= self.area {
            self.next_page();
        }
    }

    pub fn add_align(&mut self, len: usize) {
        let off = self.offset() + len;
        if off >= self.area {
            // заголовки меньше области, сюда попадаем только ровно на границе
            self.next_page();
        } else {
            self.lsa.offset = off as i16;
            self.align();
        }
    }

    /// Положить `len` байт кусками по страницам.
    /// `chunk(pageid, offset, src)` получает место в области и диапазон источника.
    pub fn append_data<F>(&mut self, len: usize, mut chunk: F)
    where
        F: FnMut(i64, usize, Range<usize>),
    {
        if len == 0 {
            return;
        }
        self.align();
        let mut cur = self.offset();
        let mut done = 0usize;
        while done < len {
            let n = (len - done).min(self.area - cur);
            chunk(self.lsa.pageid, cur, done..done + n);
            cur += n;
            done += n;
            if cur >= self.area {
                self.lsa.pageid += 1;
                cur = 0;
            }
        }
        self.lsa.offset = cur as i16;
        self.align();
    }

    /// Только сдвиг, без копирования.
    pub fn skip_data(&mut self, len: usize) {
        self.append_data(len, |_, _, _| {});
    }

    /// Место под заголовок записи; возвращает start LSA.
    pub fn start_record(&mut self) -> LogLsa {
        self.advance_when_doesnt_fit(LOG_RECORD_HEADER_SIZE);
        let start = self.lsa;
        self.add_align(LOG_RECORD_HEADER_SIZE);
        start
    }

    /// Место под data header; он всегда целиком в одной странице.
    pub fn data_header(&mut self, len: usize) -> LogLsa {
        self.advance_when_doesnt_fit(len);
        let at = self.lsa;
        self.add_align(len);
        at
    }

    /// Конец записи: здесь начнётся следующая (forw_lsa).
    pub fn end_record(&mut self) -> LogLsa {
        self.align();
        self.advance_when_doesnt_fit(LOG_RECORD_HEADER_SIZE);
        self.lsa
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AREA: usize = 512 - 16;

    #[test]
    fn align_wraps_past_area() {
        let mut c = AppendCursor::new(LogLsa::new(0, (AREA - 3) as i16), AREA);
        c.align();
        assert_eq!(c.lsa(), LogLsa::new(1, 0));

        let mut c = AppendCursor::new(LogLsa::new(0, 13), AREA);
        c.align();
        assert_eq!(c.lsa(), LogLsa::new(0, 16));
    }

    #[test]
    fn header_that_touches_the_end_moves_to_next_page() {
        let mut c = AppendCursor::new(LogLsa::new(4, (AREA - 32) as i16), AREA);
        c.advance_when_doesnt_fit(32);
        assert_eq!(c.lsa(), LogLsa::new(5, 0));

        let mut c = AppendCursor::new(LogLsa::new(4, (AREA - 40) as i16), AREA);
        c.advance_when_doesnt_fit(32);
        assert_eq!(c.lsa(), LogLsa::new(4, (AREA - 40) as i16));
    }

    #[test]
    fn data_splits_into_page_chunks() {
        let mut c = AppendCursor::new(LogLsa::new(0, 400), AREA);
        let mut chunks = Vec::new();
        c.append_data(1200, |p, off, r| chunks.push((p, off, r)));
        assert_eq!(chunks[0], (0, 400, 0..96));
        assert_eq!(chunks[1], (1, 0, 96..592));
        assert_eq!(chunks[2], (2, 0, 592..1088));
        assert_eq!(chunks[3], (3, 0, 1088..1200));
        assert_eq!(c.lsa(), LogLsa::new(3, 112));
        let total: usize = chunks.iter().map(|(_, _, r)| r.len()).sum();
        assert_eq!(total, 1200);
    }

    #[test]
    fn record_layout_keeps_header_on_one_page() {
        let mut c = AppendCursor::new(LogLsa::new(0, (AREA - 40) as i16), AREA);
        let start = c.start_record();
        assert_eq!(start, LogLsa::new(0, (AREA - 40) as i16));
        // 20-байтовый data header не помещается в остаток страницы
        let dh = c.data_header(20);
        assert_eq!(dh, LogLsa::new(1, 0));
        c.skip_data(10);
        assert_eq!(c.end_record(), LogLsa::new(1, 40));
    }

    #[test]
    fn offset_never_reaches_area() {
        let mut rng = oorandom::Rand64::new(7);
        let mut c = AppendCursor::new(LogLsa::new(0, 0), AREA);
        let mut prev = c.lsa();
        for _ in 0..2000 {
            let n = rng.rand_range(0..1500) as usize;
            match rng.rand_range(0..3) {
                0 => c.advance_when_doesnt_fit(n % 64),
                1 => c.add_align(n % 64),
                _ => c.skip_data(n),
            }
            assert!(c.lsa().offset >= 0 && (c.lsa().offset as usize) < AREA);
            assert!(c.lsa() >= prev);
            prev = c.lsa();
        }
    }
}
