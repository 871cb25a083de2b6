//! Лог-страницы в памяти: физическая запись узлов (drain) и чтение записей.
//!
//! Страница: [logical_pageid i64][first_record_offset i16][flags u16][checksum u32][area...].
//! Запись раскладывается теми же правилами курсора, что и при резервировании,
//! поэтому каждая запись оказывается ровно по своему start_lsa.

use byteorder::{BigEndian, ByteOrder};

use super::cursor::AppendCursor;
use super::error::{LogError, LogResult};
use super::lsa::LogLsa;
use super::prior::LogPriorNode;
use super::record::{DataHeader, LogRecordHeader};
use super::zip::{get_zip_len, is_zip_len, log_diff, log_unzip};
use crate::consts::{LOG_HDRPAGE_FLAG_ENCRYPTED, LOG_HDRPAGE_SIZE, LOG_RECORD_HEADER_SIZE};

pub const NULL_OFFSET: i16 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogPageHeader {
    pub logical_pageid: i64,
    /// Первая запись, начинающаяся на странице; NULL_OFFSET если таких нет.
    pub first_record_offset: i16,
    pub flags: u16,
    pub checksum: u32,
}

impl LogPageHeader {
    pub fn encode(&self) -> [u8; LOG_HDRPAGE_SIZE] {
        let mut b = [0u8; LOG_HDRPAGE_SIZE];
        BigEndian::write_i64(&mut b[0..8], self.logical_pageid);
        BigEndian::write_i16(&mut b[8..10], self.first_record_offset);
        BigEndian::write_u16(&mut b[10..12], self.flags);
        BigEndian::write_u32(&mut b[12..16], self.checksum);
        b
    }

    pub fn decode(b: &[u8]) -> Self {
        Self {
            logical_pageid: BigEndian::read_i64(&b[0..8]),
            first_record_offset: BigEndian::read_i16(&b[8..10]),
            flags: BigEndian::read_u16(&b[10..12]),
            checksum: BigEndian::read_u32(&b[12..16]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogPage {
    pub hdr: LogPageHeader,
    pub area: Vec<u8>,
}

impl LogPage {
    fn new(pageid: i64, area_size: usize) -> Self {
        Self {
            hdr: LogPageHeader {
                logical_pageid: pageid,
                first_record_offset: NULL_OFFSET,
                flags: 0,
                checksum: 0,
            },
            area: vec![0u8; area_size],
        }
    }

    pub fn is_tde_encrypted(&self) -> bool {
        self.hdr.flags & LOG_HDRPAGE_FLAG_ENCRYPTED != 0
    }

    /// crc32c по заголовку (без поля checksum) и области.
    pub fn compute_checksum(&self) -> u32 {
        let hb = self.hdr.encode();
        let crc = crc32c::crc32c(&hb[..12]);
        crc32c::crc32c_append(crc, &self.area)
    }
}

/// Запись, прочитанная с лог-страниц: payload уже распакован и diff снят.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecordView {
    pub lsa: LogLsa,
    pub header: LogRecordHeader,
    pub data_header: DataHeader,
    pub undo: Vec<u8>,
    pub redo: Vec<u8>,
    pub undo_zipped: bool,
    pub redo_zipped: bool,
}

#[derive(Debug, Clone)]
pub struct LogPageBuffer {
    page_size: usize,
    first_pageid: i64,
    pages: Vec<LogPage>,
    /// Куда ляжет следующая запись.
    append: AppendCursor,
}

impl LogPageBuffer {
    pub fn new(page_size: usize, start: LogLsa) -> Self {
        Self {
            page_size,
            first_pageid: start.pageid,
            pages: Vec::new(),
            append: AppendCursor::new(start, page_size - LOG_HDRPAGE_SIZE),
        }
    }

    /// Собрать буфер из прочитанных страниц (открытие тома).
    pub(crate) fn from_pages(
        page_size: usize,
        first_pageid: i64,
        pages: Vec<LogPage>,
        end_lsa: LogLsa,
    ) -> Self {
        Self {
            page_size,
            first_pageid,
            pages,
            append: AppendCursor::new(end_lsa, page_size - LOG_HDRPAGE_SIZE),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn area_size(&self) -> usize {
        self.page_size - LOG_HDRPAGE_SIZE
    }

    pub fn first_pageid(&self) -> i64 {
        self.first_pageid
    }

    pub fn pages(&self) -> &[LogPage] {
        &self.pages
    }

    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, pageid: i64) -> Option<&LogPage> {
        let idx = pageid.checked_sub(self.first_pageid)?;
        if idx < 0 {
            return None;
        }
        self.pages.get(idx as usize)
    }

    /// Конец записанного лога: start LSA следующей записи.
    pub fn end_lsa(&self) -> LogLsa {
        self.append.lsa()
    }

    /// Первая запись буфера.
    pub fn first_record_lsa(&self) -> Option<LogLsa> {
        self.pages.iter().find_map(|p| {
            (p.hdr.first_record_offset != NULL_OFFSET)
                .then(|| LogLsa::new(p.hdr.logical_pageid, p.hdr.first_record_offset))
        })
    }

    fn page_mut(&mut self, pageid: i64) -> LogResult<&mut LogPage> {
        if pageid < self.first_pageid {
            return Err(LogError::Corrupted(format!(
                "page {} precedes buffer start {}",
                pageid, self.first_pageid
            )));
        }
        let idx = (pageid - self.first_pageid) as usize;
        let area = self.area_size();
        while self.pages.len() <= idx {
            let id = self.first_pageid + self.pages.len() as i64;
            self.pages.push(LogPage::new(id, area));
        }
        Ok(&mut self.pages[idx])
    }

    fn write_at(&mut self, at: LogLsa, bytes: &[u8], tde: bool) -> LogResult<()> {
        let page = self.page_mut(at.pageid)?;
        let off = at.offset as usize;
        page.area[off..off + bytes.len()].copy_from_slice(bytes);
        if tde {
            page.hdr.flags |= LOG_HDRPAGE_FLAG_ENCRYPTED;
        }
        Ok(())
    }

    fn write_data(&mut self, c: &mut AppendCursor, data: &[u8], tde: bool) -> LogResult<()> {
        let mut chunks = Vec::new();
        c.append_data(data.len(), |p, off, r| chunks.push((LogLsa::new(p, off as i16), r)));
        for (at, r) in chunks {
            self.write_at(at, &data[r], tde)?;
        }
        Ok(())
    }

    /// Физически записать узел, которому prior list уже назначил LSA.
    pub fn append_node(&mut self, node: &LogPriorNode) -> LogResult<()> {
        let mut c = self.append;
        let start = c.start_record();
        if start != node.start_lsa {
            return Err(LogError::Corrupted(format!(
                "record reserved at {} but log ends at {}",
                node.start_lsa, start
            )));
        }
        let tde = node.tde_encrypted;
        self.write_at(start, &node.log_header.encode(), tde)?;
        let page = self.page_mut(start.pageid)?;
        if page.hdr.first_record_offset == NULL_OFFSET {
            page.hdr.first_record_offset = start.offset;
        }

        let dh = node.data_header.encode();
        let at = c.data_header(dh.len());
        if !dh.is_empty() {
            self.write_at(at, &dh, tde)?;
        }
        self.write_data(&mut c, &node.udata, tde)?;
        self.write_data(&mut c, &node.rdata, tde)?;

        let end = c.end_record();
        if end != node.log_header.forw_lsa {
            return Err(LogError::Corrupted(format!(
                "record {} ends at {}, forw_lsa says {}",
                start, end, node.log_header.forw_lsa
            )));
        }
        self.append = c;
        Ok(())
    }

    fn read_at(&self, at: LogLsa, len: usize) -> LogResult<&[u8]> {
        let page = self
            .page(at.pageid)
            .ok_or_else(|| LogError::Corrupted(format!("page {} not in buffer", at.pageid)))?;
        let off = at.offset as usize;
        page.area
            .get(off..off + len)
            .ok_or_else(|| LogError::Corrupted(format!("read past page area at {}", at)))
    }

    fn read_data(&self, c: &mut AppendCursor, len: usize) -> LogResult<Vec<u8>> {
        let mut out = vec![0u8; len];
        let mut missing = None;
        c.append_data(len, |p, off, r| match self.page(p) {
            Some(page) => out[r.clone()].copy_from_slice(&page.area[off..off + r.len()]),
            None => missing = Some(p),
        });
        match missing {
            Some(p) => Err(LogError::Corrupted(format!("payload page {} not in buffer", p))),
            None => Ok(out),
        }
    }

    /// Прочитать запись по её start LSA и вернуть исходные undo/redo образы.
    pub fn read_record(&self, lsa: LogLsa) -> LogResult<LogRecordView> {
        let mut c = AppendCursor::new(lsa, self.area_size());
        let start = c.start_record();
        if start != lsa {
            return Err(LogError::Corrupted(format!("{} is not a record start", lsa)));
        }
        let header = LogRecordHeader::decode(self.read_at(start, LOG_RECORD_HEADER_SIZE)?)?;
        let dh_len = DataHeader::default_for(header.rec_type).len();
        let at = c.data_header(dh_len);
        let data_header = if dh_len > 0 {
            DataHeader::decode(header.rec_type, self.read_at(at, dh_len)?)?
        } else {
            DataHeader::None
        };

        let (ustored, rstored) = data_header.payload_lengths();
        let uraw = self.read_data(&mut c, get_zip_len(ustored))?;
        let rraw = self.read_data(&mut c, get_zip_len(rstored))?;

        let end = c.end_record();
        if end != header.forw_lsa {
            return Err(LogError::Corrupted(format!(
                "record {} ends at {}, forw_lsa says {}",
                lsa, end, header.forw_lsa
            )));
        }

        let undo_zipped = is_zip_len(ustored);
        let redo_zipped = is_zip_len(rstored);
        let undo = if undo_zipped { log_unzip(&uraw)? } else { uraw };
        let mut redo = if redo_zipped { log_unzip(&rraw)? } else { rraw };
        if header.rec_type.is_diff() {
            log_diff(&undo, &mut redo);
        }

        Ok(LogRecordView {
            lsa,
            header,
            data_header,
            undo,
            redo,
            undo_zipped,
            redo_zipped,
        })
    }

    /// Все записи от первой до конца, по forw_lsa.
    pub fn records(&self) -> LogResult<Vec<LogRecordView>> {
        let mut out = Vec::new();
        let end = self.end_lsa();
        let mut lsa = match self.first_record_lsa() {
            Some(l) => l,
            None => return Ok(out),
        };
        while lsa < end {
            let rec = self.read_record(lsa)?;
            if rec.header.forw_lsa <= lsa {
                return Err(LogError::Corrupted(format!("forw_lsa of {} goes backwards", lsa)));
            }
            lsa = rec.header.forw_lsa;
            out.push(rec);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_header_layout() {
        let h = LogPageHeader {
            logical_pageid: 42,
            first_record_offset: 64,
            flags: LOG_HDRPAGE_FLAG_ENCRYPTED,
            checksum: 0xDEAD_BEEF,
        };
        let b = h.encode();
        assert_eq!(b.len(), LOG_HDRPAGE_SIZE);
        assert_eq!(LogPageHeader::decode(&b), h);
    }

    #[test]
    fn checksum_covers_area() {
        let mut p = LogPage::new(3, 496);
        let a = p.compute_checksum();
        p.area[100] = 1;
        assert_ne!(a, p.compute_checksum());
    }

    #[test]
    fn empty_buffer_has_no_records() {
        let b = LogPageBuffer::new(512, LogLsa::new(0, 0));
        assert!(b.first_record_lsa().is_none());
        assert!(b.records().unwrap().is_empty());
    }
}
