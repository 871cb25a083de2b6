//! Узел prior list и его построение.
//!
//! Два входа:
//! - `alloc_and_copy_crumbs` - undo/redo/undoredo (в т.ч. MVCC) из crumbs,
//!   со сжатием и diff;
//! - `alloc_and_copy_data` - все остальные типы, payload копируется как есть.
//!
//! Узел владеет копиями payload; LSA ему назначает `PriorList`.

use log::{debug, error};

use super::error::{LogError, LogResult};
use super::lsa::LogLsa;
use super::record::{
    DataHeader, LogData, LogRecSysopEnd, LogRecType, LogRecordHeader, SysopEndType,
};
use super::tdes::LogTdes;
use super::zip::{log_diff, log_zip, make_zip_len};
use crate::codec::Vfid;
use crate::config::{XaslLogConfig, ZipCodec};
use crate::consts::{PRIOR_NODE_OVERHEAD, ZIP_LEN_FLAG};
use crate::metrics::{record_diff_record, record_zip_attempt};

/// recovery index "уведомить vacuum": у такой записи нет файла.
pub const RV_NOTIFY_VACUUM: i32 = 1;

/// Где произошло изменение.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogDataAddr {
    pub vfid: Vfid,
    pub pageid: i32,
    pub volid: i16,
    pub offset: i16,
}

impl LogDataAddr {
    pub fn new(vfid: Vfid, pageid: i32, volid: i16, offset: i16) -> Self {
        Self {
            vfid,
            pageid,
            volid,
            offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogPriorNode {
    pub log_header: LogRecordHeader,
    /// NULL, пока узел не добавлен в prior list.
    pub start_lsa: LogLsa,
    pub data_header: DataHeader,
    pub udata: Vec<u8>,
    pub rdata: Vec<u8>,
    pub tde_encrypted: bool,
}

impl LogPriorNode {
    pub fn rec_type(&self) -> LogRecType {
        self.log_header.rec_type
    }

    pub fn data_header_length(&self) -> usize {
        self.data_header.len()
    }

    /// Вклад узла в list_size.
    pub fn accounted_size(&self) -> usize {
        PRIOR_NODE_OVERHEAD + self.data_header.len() + self.udata.len() + self.rdata.len()
    }

    /// Заменить заголовок данных (например, выбрать тип sysop end);
    /// длины payload проставляются заново.
    pub fn with_data_header(mut self, mut dh: DataHeader) -> Self {
        dh.set_payload_lengths(self.udata.len() as u32, self.rdata.len() as u32);
        if let Some(v) = dh.vacuum_info_mut() {
            v.prev_mvcc_op_log_lsa = LogLsa::NULL;
        }
        self.data_header = dh;
        self
    }

    pub fn with_tde_encrypted(mut self, on: bool) -> Self {
        self.tde_encrypted = on;
        self
    }
}

fn copy_payload(parts: &[&[u8]]) -> LogResult<Vec<u8>> {
    let total: usize = parts.iter().map(|p| p.len()).sum();
    if total as u64 >= ZIP_LEN_FLAG as u64 {
        return Err(LogError::OutOfMemory("payload longer than a log length field"));
    }
    let mut v = Vec::new();
    v.try_reserve_exact(total)
        .map_err(|_| LogError::OutOfMemory("prior node payload"))?;
    for p in parts {
        v.extend_from_slice(p);
    }
    Ok(v)
}

fn log_data(rcvindex: i32, addr: Option<&LogDataAddr>) -> LogData {
    match addr {
        Some(a) => LogData {
            rcvindex,
            pageid: a.pageid,
            offset: a.offset,
            volid: a.volid,
        },
        None => LogData {
            rcvindex,
            pageid: -1,
            offset: -1,
            volid: -1,
        },
    }
}

/// Строитель узлов; хранит только настройки сжатия.
#[derive(Debug, Clone, Copy)]
pub struct PriorBuilder {
    zip: Option<ZipCodec>,
    zip_min_size: usize,
}

impl Default for PriorBuilder {
    fn default() -> Self {
        Self::new(&XaslLogConfig::default())
    }
}

impl PriorBuilder {
    pub fn new(cfg: &XaslLogConfig) -> Self {
        Self {
            zip: cfg.log_compress.then_some(cfg.zip_codec),
            zip_min_size: cfg.log_zip_min_size,
        }
    }

    /// Запись без crumbs: форма заголовка по типу, payload без сжатия.
    pub fn alloc_and_copy_data(
        &self,
        tdes: &LogTdes,
        rec_type: LogRecType,
        rcvindex: i32,
        addr: Option<&LogDataAddr>,
        undo: &[u8],
        redo: &[u8],
    ) -> LogResult<LogPriorNode> {
        if rec_type.uses_crumbs() {
            error!(
                "record kind {:?} passed to the data entry point (rcvindex {})",
                rec_type, rcvindex
            );
            debug_assert!(false, "{:?} must be built from crumbs", rec_type);
            return Err(LogError::WrongEntryPoint(rec_type));
        }
        let mut dh = DataHeader::default_for(rec_type);
        if (!undo.is_empty() && !dh.carries_undo()) || (!redo.is_empty() && !dh.carries_redo()) {
            return Err(LogError::InvalidRecordKind(rec_type));
        }
        if let Some(d) = dh.log_data_mut() {
            *d = log_data(rcvindex, addr);
        }
        match &mut dh {
            DataHeader::DbExternRedo(d) => d.rcvindex = rcvindex,
            DataHeader::Replication(r) => r.rcvindex = rcvindex,
            _ => {}
        }
        dh.set_payload_lengths(undo.len() as u32, redo.len() as u32);

        Ok(LogPriorNode {
            log_header: LogRecordHeader::new(tdes.trid, rec_type),
            start_lsa: LogLsa::NULL,
            data_header: dh,
            udata: copy_payload(&[undo])?,
            rdata: copy_payload(&[redo])?,
            tde_encrypted: false,
        })
    }

    /// Конец системной операции выбранного типа. Logical undo формы несут
    /// undo payload, остальные обязаны прийти с пустым.
    pub fn alloc_sysop_end(
        &self,
        tdes: &LogTdes,
        end: LogRecSysopEnd,
        addr: Option<&LogDataAddr>,
        undo: &[u8],
    ) -> LogResult<LogPriorNode> {
        let mut dh = DataHeader::SysopEnd(end);
        if !undo.is_empty() && !dh.carries_undo() {
            return Err(LogError::InvalidRecordKind(LogRecType::SysopEnd));
        }
        let mut rcvindex = 0;
        if let Some(d) = dh.log_data_mut() {
            rcvindex = d.rcvindex;
            *d = log_data(rcvindex, addr);
        }
        stamp_mvcc(&mut dh, tdes, rcvindex, addr);

        let node = LogPriorNode {
            log_header: LogRecordHeader::new(tdes.trid, LogRecType::SysopEnd),
            start_lsa: LogLsa::NULL,
            data_header: DataHeader::None,
            udata: copy_payload(&[undo])?,
            rdata: Vec::new(),
            tde_encrypted: false,
        };
        Ok(node.with_data_header(dh))
    }

    /// undo/redo запись из crumbs. Большие payload сжимаются; если сжимаются
    /// оба, redo сначала xor'ится с undo и тип становится diff-вариантом.
    pub fn alloc_and_copy_crumbs(
        &self,
        tdes: &LogTdes,
        rec_type: LogRecType,
        rcvindex: i32,
        addr: Option<&LogDataAddr>,
        undo_crumbs: &[&[u8]],
        redo_crumbs: &[&[u8]],
    ) -> LogResult<LogPriorNode> {
        if !rec_type.uses_crumbs() || rec_type.is_diff() {
            return Err(LogError::InvalidRecordKind(rec_type));
        }
        let has_undo = !rec_type.is_redo();
        let has_redo = !rec_type.is_undo();
        if (!has_undo && !undo_crumbs.is_empty()) || (!has_redo && !redo_crumbs.is_empty()) {
            return Err(LogError::InvalidRecordKind(rec_type));
        }

        let undo = copy_payload(undo_crumbs)?;
        let redo = copy_payload(redo_crumbs)?;

        let zip_undo = self.zip.is_some() && has_undo && undo.len() >= self.zip_min_size;
        let zip_redo = self.zip.is_some() && has_redo && redo.len() >= self.zip_min_size;
        let is_diff = rec_type.is_undoredo() && zip_undo && zip_redo;

        let diffed = if is_diff {
            let mut d = redo.clone();
            log_diff(&undo, &mut d);
            Some(d)
        } else {
            None
        };
        let (udata, ulength) = self.maybe_zip(undo, zip_undo);

        let zipped = if zip_redo {
            self.zip_payload(diffed.as_deref().unwrap_or(&redo))
        } else {
            None
        };
        let redo_zipped = zipped.is_some();
        let (rdata, rlength) = match zipped {
            Some(z) => {
                let len = make_zip_len(z.len());
                (z, len)
            }
            // redo храним исходным, без diff
            None => {
                let len = redo.len() as u32;
                (redo, len)
            }
        };

        let rec_type = match rec_type {
            LogRecType::UndoRedoData if is_diff && redo_zipped => LogRecType::DiffUndoRedoData,
            LogRecType::MvccUndoRedoData if is_diff && redo_zipped => {
                LogRecType::MvccDiffUndoRedoData
            }
            other => other,
        };
        if rec_type.is_diff() {
            record_diff_record();
        }

        let mut dh = DataHeader::default_for(rec_type);
        if let Some(d) = dh.log_data_mut() {
            *d = log_data(rcvindex, addr);
        }
        dh.set_payload_lengths(ulength, rlength);
        stamp_mvcc(&mut dh, tdes, rcvindex, addr);

        debug!(
            "prior node {:?}: undo {} bytes{}, redo {} bytes{}",
            rec_type,
            udata.len(),
            if ulength & ZIP_LEN_FLAG != 0 { " (zip)" } else { "" },
            rdata.len(),
            if redo_zipped { " (zip)" } else { "" }
        );

        Ok(LogPriorNode {
            log_header: LogRecordHeader::new(tdes.trid, rec_type),
            start_lsa: LogLsa::NULL,
            data_header: dh,
            udata,
            rdata,
            tde_encrypted: false,
        })
    }

    fn zip_payload(&self, data: &[u8]) -> Option<Vec<u8>> {
        let codec = self.zip?;
        let z = log_zip(codec, data);
        record_zip_attempt(z.is_some());
        z
    }

    fn maybe_zip(&self, data: Vec<u8>, try_zip: bool) -> (Vec<u8>, u32) {
        if try_zip {
            if let Some(z) = self.zip_payload(&data) {
                let len = make_zip_len(z.len());
                return (z, len);
            }
        }
        let len = data.len() as u32;
        (data, len)
    }
}

fn stamp_mvcc(dh: &mut DataHeader, tdes: &LogTdes, rcvindex: i32, addr: Option<&LogDataAddr>) {
    match dh {
        DataHeader::MvccUndoredo(m) => m.mvccid = tdes.mvccid,
        DataHeader::MvccUndo(m) => m.mvccid = tdes.mvccid,
        DataHeader::MvccRedo(m) => m.mvccid = tdes.mvccid,
        DataHeader::SysopEnd(LogRecSysopEnd {
            end_type: SysopEndType::LogicalMvccUndo(m),
            ..
        }) => m.mvccid = tdes.mvccid,
        _ => {}
    }
    if let Some(v) = dh.vacuum_info_mut() {
        v.vfid = match addr {
            Some(a) if rcvindex != RV_NOTIFY_VACUUM => a.vfid,
            _ => Vfid::NULL,
        };
        v.prev_mvcc_op_log_lsa = LogLsa::NULL;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::zip::is_zip_len;

    fn image(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| ((i / 32) as u8).wrapping_add(seed)).collect()
    }

    fn addr() -> LogDataAddr {
        LogDataAddr::new(Vfid { fileid: 12, volid: 0 }, 100, 0, 24)
    }

    #[test]
    fn small_payloads_stay_plain() {
        let b = PriorBuilder::default();
        let t = LogTdes::new(3);
        let n = b
            .alloc_and_copy_crumbs(&t, LogRecType::UndoRedoData, 7, Some(&addr()), &[&b"old"[..]], &[&b"new"[..], &b"!"[..]])
            .unwrap();
        assert_eq!(n.rec_type(), LogRecType::UndoRedoData);
        assert_eq!(n.data_header.payload_lengths(), (3, 4));
        assert_eq!(n.rdata, b"new!");
        assert!(n.start_lsa.is_null());
    }

    #[test]
    fn large_similar_images_become_diff() {
        let b = PriorBuilder::default();
        let t = LogTdes::new(3).with_mvccid(44);
        let undo = image(10 * 1024, 0);
        let mut redo = undo.clone();
        redo[5000] ^= 0xFF;
        let n = b
            .alloc_and_copy_crumbs(&t, LogRecType::MvccUndoRedoData, 7, Some(&addr()), &[undo.as_slice()], &[redo.as_slice()])
            .unwrap();
        assert_eq!(n.rec_type(), LogRecType::MvccDiffUndoRedoData);
        let (ul, rl) = n.data_header.payload_lengths();
        assert!(is_zip_len(ul) && is_zip_len(rl));
        assert_eq!(n.data_header.mvccid(), Some(44));
        let v = n.data_header.vacuum_info().unwrap();
        assert_eq!(v.vfid, addr().vfid);
        assert!(v.prev_mvcc_op_log_lsa.is_null());
    }

    #[test]
    fn compression_off_keeps_kind() {
        let cfg = XaslLogConfig::default().with_log_compress(false);
        let b = PriorBuilder::new(&cfg);
        let undo = image(4096, 1);
        let n = b
            .alloc_and_copy_crumbs(&LogTdes::new(1), LogRecType::UndoRedoData, 2, None, &[undo.as_slice()], &[undo.as_slice()])
            .unwrap();
        assert_eq!(n.rec_type(), LogRecType::UndoRedoData);
        assert_eq!(n.data_header.payload_lengths(), (4096, 4096));
    }

    #[test]
    fn notify_vacuum_has_no_file() {
        let b = PriorBuilder::default();
        let n = b
            .alloc_and_copy_crumbs(
                &LogTdes::new(1).with_mvccid(5),
                LogRecType::MvccUndoData,
                RV_NOTIFY_VACUUM,
                Some(&addr()),
                &[&b"x"[..]],
                &[],
            )
            .unwrap();
        assert!(n.data_header.vacuum_info().unwrap().vfid.is_null());
    }

    #[test]
    fn redo_payload_on_undo_kind_is_rejected() {
        let b = PriorBuilder::default();
        let r = b.alloc_and_copy_crumbs(&LogTdes::new(1), LogRecType::UndoData, 2, None, &[], &[&b"r"[..]]);
        assert!(matches!(r, Err(LogError::InvalidRecordKind(LogRecType::UndoData))));
    }

    #[test]
    fn data_entry_fills_shape() {
        let b = PriorBuilder::default();
        let n = b
            .alloc_and_copy_data(&LogTdes::new(1), LogRecType::Postpone, 9, Some(&addr()), &[], b"later")
            .unwrap();
        match n.data_header {
            DataHeader::Postpone(r) => {
                assert_eq!(r.length, 5);
                assert_eq!(r.data.rcvindex, 9);
                assert_eq!(r.data.pageid, 100);
            }
            other => panic!("unexpected header {:?}", other),
        }
        let c = b
            .alloc_and_copy_data(&LogTdes::new(1), LogRecType::Commit, 0, None, &[], &[])
            .unwrap();
        assert_eq!(c.data_header_length(), 8);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic)]
    fn crumb_kind_through_data_entry() {
        let b = PriorBuilder::default();
        let r = b.alloc_and_copy_data(&LogTdes::new(1), LogRecType::UndoRedoData, 1, None, b"u", b"r");
        assert!(matches!(r, Err(LogError::WrongEntryPoint(LogRecType::UndoRedoData))));
    }
}
