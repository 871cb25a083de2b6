//! Типы лог-записей, заголовок записи и формы data header.
//!
//! Что здесь:
//! - `LogRecType` - коды типов и их классификация (undo/redo/diff/mvcc/crumbs);
//! - `LogRecordHeader` - 32-байтовый заголовок каждой записи;
//! - `DataHeader` - типо-зависимый заголовок данных фиксированной длины.
//!
//! Длина data header зависит только от типа записи: sysop-end хранит
//! вариантную часть в области размера наибольшего варианта.

use byteorder::{BigEndian, ByteOrder};

use super::error::{LogError, LogResult};
use super::lsa::LogLsa;
use crate::codec::Vfid;
use crate::consts::{LOG_RECORD_HEADER_SIZE, OR_LSA_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum LogRecType {
    UndoRedoData = 2,
    UndoData = 3,
    RedoData = 4,
    DbExternRedoData = 5,
    Postpone = 6,
    RunPostpone = 7,
    Compensate = 8,
    WillCommit = 14,
    CommitWithPostponeObsolete = 15,
    Commit = 17,
    SysopStartPostpone = 18,
    SysopEnd = 20,
    Abort = 22,
    StartChkpt = 25,
    EndChkpt = 26,
    Savepoint = 27,
    TwoPcPrepare = 28,
    TwoPcStart = 29,
    TwoPcCommitDecision = 30,
    TwoPcAbortDecision = 31,
    TwoPcCommitInformParticps = 32,
    TwoPcAbortInformParticps = 33,
    TwoPcRecvAck = 34,
    EndOfLog = 35,
    DummyHeadPostpone = 36,
    DummyCrashRecovery = 37,
    ReplicationData = 39,
    ReplicationStatement = 40,
    DiffUndoRedoData = 43,
    DummyHaServerState = 44,
    DummyOvfRecord = 45,
    MvccUndoRedoData = 46,
    MvccUndoData = 47,
    MvccRedoData = 48,
    MvccDiffUndoRedoData = 49,
    SysopAtomicStart = 50,
    DummyGeneric = 51,
    CommitWithPostpone = 52,
}

impl LogRecType {
    pub fn from_code(code: i32) -> LogResult<Self> {
        use LogRecType::*;
        Ok(match code {
            2 => UndoRedoData,
            3 => UndoData,
            4 => RedoData,
            5 => DbExternRedoData,
            6 => Postpone,
            7 => RunPostpone,
            8 => Compensate,
            14 => WillCommit,
            15 => CommitWithPostponeObsolete,
            17 => Commit,
            18 => SysopStartPostpone,
            20 => SysopEnd,
            22 => Abort,
            25 => StartChkpt,
            26 => EndChkpt,
            27 => Savepoint,
            28 => TwoPcPrepare,
            29 => TwoPcStart,
            30 => TwoPcCommitDecision,
            31 => TwoPcAbortDecision,
            32 => TwoPcCommitInformParticps,
            33 => TwoPcAbortInformParticps,
            34 => TwoPcRecvAck,
            35 => EndOfLog,
            36 => DummyHeadPostpone,
            37 => DummyCrashRecovery,
            39 => ReplicationData,
            40 => ReplicationStatement,
            43 => DiffUndoRedoData,
            44 => DummyHaServerState,
            45 => DummyOvfRecord,
            46 => MvccUndoRedoData,
            47 => MvccUndoData,
            48 => MvccRedoData,
            49 => MvccDiffUndoRedoData,
            50 => SysopAtomicStart,
            51 => DummyGeneric,
            52 => CommitWithPostpone,
            other => return Err(LogError::Corrupted(format!("unknown record type {}", other))),
        })
    }

    pub fn is_mvcc_op(self) -> bool {
        matches!(
            self,
            LogRecType::MvccUndoRedoData
                | LogRecType::MvccDiffUndoRedoData
                | LogRecType::MvccUndoData
                | LogRecType::MvccRedoData
        )
    }

    pub fn is_diff(self) -> bool {
        matches!(
            self,
            LogRecType::DiffUndoRedoData | LogRecType::MvccDiffUndoRedoData
        )
    }

    pub fn is_undoredo(self) -> bool {
        matches!(
            self,
            LogRecType::UndoRedoData
                | LogRecType::DiffUndoRedoData
                | LogRecType::MvccUndoRedoData
                | LogRecType::MvccDiffUndoRedoData
        )
    }

    pub fn is_undo(self) -> bool {
        matches!(self, LogRecType::UndoData | LogRecType::MvccUndoData)
    }

    pub fn is_redo(self) -> bool {
        matches!(self, LogRecType::RedoData | LogRecType::MvccRedoData)
    }

    /// Типы, чьи undo/redo собираются из crumbs.
    pub fn uses_crumbs(self) -> bool {
        self.is_undoredo() || self.is_undo() || self.is_redo()
    }
}

/// [prev_tranlsa 8][back_lsa 8][forw_lsa 8][trid i32][type i32]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecordHeader {
    pub prev_tranlsa: LogLsa,
    pub back_lsa: LogLsa,
    pub forw_lsa: LogLsa,
    pub trid: i32,
    pub rec_type: LogRecType,
}

impl LogRecordHeader {
    pub fn new(trid: i32, rec_type: LogRecType) -> Self {
        Self {
            prev_tranlsa: LogLsa::NULL,
            back_lsa: LogLsa::NULL,
            forw_lsa: LogLsa::NULL,
            trid,
            rec_type,
        }
    }

    pub fn encode(&self) -> [u8; LOG_RECORD_HEADER_SIZE] {
        let mut b = [0u8; LOG_RECORD_HEADER_SIZE];
        self.prev_tranlsa.encode(&mut b[0..8]);
        self.back_lsa.encode(&mut b[8..16]);
        self.forw_lsa.encode(&mut b[16..24]);
        BigEndian::write_i32(&mut b[24..28], self.trid);
        BigEndian::write_i32(&mut b[28..32], self.rec_type as i32);
        b
    }

    pub fn decode(buf: &[u8]) -> LogResult<Self> {
        if buf.len() < LOG_RECORD_HEADER_SIZE {
            return Err(LogError::Corrupted("short record header".into()));
        }
        Ok(Self {
            prev_tranlsa: LogLsa::decode(&buf[0..8]),
            back_lsa: LogLsa::decode(&buf[8..16]),
            forw_lsa: LogLsa::decode(&buf[16..24]),
            trid: BigEndian::read_i32(&buf[24..28]),
            rec_type: LogRecType::from_code(BigEndian::read_i32(&buf[28..32]))?,
        })
    }
}

// ---------------- data header shapes ----------------

/// Адрес изменения: recovery index + страница.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogData {
    pub rcvindex: i32,
    pub pageid: i32,
    pub offset: i16,
    pub volid: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogVacuumInfo {
    pub prev_mvcc_op_log_lsa: LogLsa,
    pub vfid: Vfid,
}

/// Длины undo/redo хранятся как есть или в zip-кодировке (старший бит).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRecUndoredo {
    pub data: LogData,
    pub ulength: u32,
    pub rlength: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRecUndo {
    pub data: LogData,
    pub length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRecRedo {
    pub data: LogData,
    pub length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRecMvccUndoredo {
    pub undoredo: LogRecUndoredo,
    pub mvccid: u64,
    pub vacuum_info: LogVacuumInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRecMvccUndo {
    pub undo: LogRecUndo,
    pub mvccid: u64,
    pub vacuum_info: LogVacuumInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRecMvccRedo {
    pub redo: LogRecRedo,
    pub mvccid: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRecDbExternRedo {
    pub rcvindex: i32,
    pub length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRecRunPostpone {
    pub data: LogData,
    pub ref_lsa: LogLsa,
    pub length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRecCompensate {
    pub data: LogData,
    pub undo_nxlsa: LogLsa,
    pub length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRecDonetime {
    pub at_time: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRecStartPostpone {
    pub posp_lsa: LogLsa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SysopEndType {
    #[default]
    Commit,
    Abort,
    LogicalUndo(LogRecUndo),
    LogicalMvccUndo(LogRecMvccUndo),
    LogicalCompensate {
        compensate_lsa: LogLsa,
    },
    LogicalRunPostpone {
        postpone_lsa: LogLsa,
        is_sysop_postpone: bool,
    },
}

impl SysopEndType {
    pub fn code(&self) -> i32 {
        match self {
            SysopEndType::Commit => 0,
            SysopEndType::Abort => 1,
            SysopEndType::LogicalUndo(_) => 2,
            SysopEndType::LogicalMvccUndo(_) => 3,
            SysopEndType::LogicalCompensate { .. } => 4,
            SysopEndType::LogicalRunPostpone { .. } => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRecSysopEnd {
    pub lastparent_lsa: LogLsa,
    pub prv_topresult_lsa: LogLsa,
    pub end_type: SysopEndType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRecSysopStartPostpone {
    pub sysop_end: LogRecSysopEnd,
    pub posp_lsa: LogLsa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRecSavept {
    pub length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRec2pcPrepcommit {
    pub gtrid: i32,
    pub gtrinfo_length: i32,
    pub num_object_locks: i32,
    pub num_page_locks: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRecChkpt {
    pub redo_lsa: LogLsa,
    pub ntrans: i32,
    pub ntops: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRecReplication {
    pub lsa: LogLsa,
    pub length: u32,
    pub rcvindex: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRecHaServerState {
    pub state: i32,
    pub at_time: i64,
}

const LOG_DATA_SIZE: usize = 12;
const VACUUM_INFO_SIZE: usize = OR_LSA_SIZE + 8;
const UNDOREDO_SIZE: usize = LOG_DATA_SIZE + 8;
const UNDO_SIZE: usize = LOG_DATA_SIZE + 4;
const MVCC_UNDOREDO_SIZE: usize = UNDOREDO_SIZE + 8 + VACUUM_INFO_SIZE;
const MVCC_UNDO_SIZE: usize = UNDO_SIZE + 8 + VACUUM_INFO_SIZE;
const MVCC_REDO_SIZE: usize = UNDO_SIZE + 8;
const SYSOP_END_SIZE: usize = 2 * OR_LSA_SIZE + 4 + MVCC_UNDO_SIZE;

/// Заголовок данных записи; форма выбирается типом записи.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataHeader {
    None,
    Undoredo(LogRecUndoredo),
    Undo(LogRecUndo),
    Redo(LogRecRedo),
    MvccUndoredo(LogRecMvccUndoredo),
    MvccUndo(LogRecMvccUndo),
    MvccRedo(LogRecMvccRedo),
    DbExternRedo(LogRecDbExternRedo),
    Postpone(LogRecRedo),
    RunPostpone(LogRecRunPostpone),
    Compensate(LogRecCompensate),
    Donetime(LogRecDonetime),
    StartPostpone(LogRecStartPostpone),
    SysopStartPostpone(LogRecSysopStartPostpone),
    SysopEnd(LogRecSysopEnd),
    Savepoint(LogRecSavept),
    TwoPcPrepare(LogRec2pcPrepcommit),
    Chkpt(LogRecChkpt),
    Replication(LogRecReplication),
    HaServerState(LogRecHaServerState),
}

impl DataHeader {
    /// Пустая форма для типа записи.
    pub fn default_for(kind: LogRecType) -> Self {
        use LogRecType as T;
        match kind {
            T::UndoRedoData | T::DiffUndoRedoData => DataHeader::Undoredo(Default::default()),
            T::UndoData => DataHeader::Undo(Default::default()),
            T::RedoData => DataHeader::Redo(Default::default()),
            T::MvccUndoRedoData | T::MvccDiffUndoRedoData => {
                DataHeader::MvccUndoredo(Default::default())
            }
            T::MvccUndoData => DataHeader::MvccUndo(Default::default()),
            T::MvccRedoData => DataHeader::MvccRedo(Default::default()),
            T::DbExternRedoData => DataHeader::DbExternRedo(Default::default()),
            T::Postpone => DataHeader::Postpone(Default::default()),
            T::RunPostpone => DataHeader::RunPostpone(Default::default()),
            T::Compensate => DataHeader::Compensate(Default::default()),
            T::Commit | T::Abort => DataHeader::Donetime(Default::default()),
            T::CommitWithPostpone | T::CommitWithPostponeObsolete => {
                DataHeader::StartPostpone(Default::default())
            }
            T::SysopStartPostpone => DataHeader::SysopStartPostpone(Default::default()),
            T::SysopEnd => DataHeader::SysopEnd(Default::default()),
            T::Savepoint => DataHeader::Savepoint(Default::default()),
            T::TwoPcPrepare => DataHeader::TwoPcPrepare(Default::default()),
            T::EndChkpt => DataHeader::Chkpt(Default::default()),
            T::ReplicationData | T::ReplicationStatement => {
                DataHeader::Replication(Default::default())
            }
            T::DummyHaServerState => DataHeader::HaServerState(Default::default()),
            _ => DataHeader::None,
        }
    }

    /// Физическая длина заголовка данных.
    pub fn len(&self) -> usize {
        match self {
            DataHeader::None => 0,
            DataHeader::Undoredo(_) => UNDOREDO_SIZE,
            DataHeader::Undo(_) | DataHeader::Redo(_) | DataHeader::Postpone(_) => UNDO_SIZE,
            DataHeader::MvccUndoredo(_) => MVCC_UNDOREDO_SIZE,
            DataHeader::MvccUndo(_) => MVCC_UNDO_SIZE,
            DataHeader::MvccRedo(_) => MVCC_REDO_SIZE,
            DataHeader::DbExternRedo(_) => 8,
            DataHeader::RunPostpone(_) | DataHeader::Compensate(_) => {
                LOG_DATA_SIZE + OR_LSA_SIZE + 4
            }
            DataHeader::Donetime(_) => 8,
            DataHeader::StartPostpone(_) => OR_LSA_SIZE,
            DataHeader::SysopStartPostpone(_) => SYSOP_END_SIZE + OR_LSA_SIZE,
            DataHeader::SysopEnd(_) => SYSOP_END_SIZE,
            DataHeader::Savepoint(_) => 4,
            DataHeader::TwoPcPrepare(_) => 16,
            DataHeader::Chkpt(_) => OR_LSA_SIZE + 8,
            DataHeader::Replication(_) => OR_LSA_SIZE + 8,
            DataHeader::HaServerState(_) => 16,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Хранимые длины (undo, redo), возможно в zip-кодировке.
    pub fn payload_lengths(&self) -> (u32, u32) {
        match self {
            DataHeader::Undoredo(u) => (u.ulength, u.rlength),
            DataHeader::MvccUndoredo(m) => (m.undoredo.ulength, m.undoredo.rlength),
            DataHeader::Undo(u) => (u.length, 0),
            DataHeader::MvccUndo(m) => (m.undo.length, 0),
            DataHeader::Compensate(c) => (c.length, 0),
            DataHeader::SysopEnd(e) => (sysop_end_undo_length(e), 0),
            DataHeader::SysopStartPostpone(p) => (sysop_end_undo_length(&p.sysop_end), 0),
            DataHeader::Redo(r) | DataHeader::Postpone(r) => (0, r.length),
            DataHeader::MvccRedo(m) => (0, m.redo.length),
            DataHeader::DbExternRedo(d) => (0, d.length),
            DataHeader::RunPostpone(r) => (0, r.length),
            DataHeader::Savepoint(s) => (0, s.length),
            DataHeader::Replication(r) => (0, r.length),
            DataHeader::TwoPcPrepare(p) => (0, p.gtrinfo_length.max(0) as u32),
            _ => (0, 0),
        }
    }

    /// Есть ли у формы undo-сторона payload.
    pub fn carries_undo(&self) -> bool {
        match self {
            DataHeader::Undoredo(_)
            | DataHeader::MvccUndoredo(_)
            | DataHeader::Undo(_)
            | DataHeader::MvccUndo(_)
            | DataHeader::Compensate(_) => true,
            DataHeader::SysopEnd(e) => sysop_end_carries_undo(e),
            DataHeader::SysopStartPostpone(p) => sysop_end_carries_undo(&p.sysop_end),
            _ => false,
        }
    }

    pub fn carries_redo(&self) -> bool {
        matches!(
            self,
            DataHeader::Undoredo(_)
                | DataHeader::MvccUndoredo(_)
                | DataHeader::Redo(_)
                | DataHeader::Postpone(_)
                | DataHeader::MvccRedo(_)
                | DataHeader::DbExternRedo(_)
                | DataHeader::RunPostpone(_)
                | DataHeader::Savepoint(_)
                | DataHeader::Replication(_)
                | DataHeader::TwoPcPrepare(_)
        )
    }

    /// Проставить хранимые длины. Сторона, которой у формы нет, игнорируется.
    pub fn set_payload_lengths(&mut self, ulength: u32, rlength: u32) {
        match self {
            DataHeader::Undoredo(u) => {
                u.ulength = ulength;
                u.rlength = rlength;
            }
            DataHeader::MvccUndoredo(m) => {
                m.undoredo.ulength = ulength;
                m.undoredo.rlength = rlength;
            }
            DataHeader::Undo(u) => u.length = ulength,
            DataHeader::MvccUndo(m) => m.undo.length = ulength,
            DataHeader::Compensate(c) => c.length = ulength,
            DataHeader::SysopEnd(e) => set_sysop_end_undo_length(e, ulength),
            DataHeader::SysopStartPostpone(p) => set_sysop_end_undo_length(&mut p.sysop_end, ulength),
            DataHeader::Redo(r) | DataHeader::Postpone(r) => r.length = rlength,
            DataHeader::MvccRedo(m) => m.redo.length = rlength,
            DataHeader::DbExternRedo(d) => d.length = rlength,
            DataHeader::RunPostpone(r) => r.length = rlength,
            DataHeader::Savepoint(s) => s.length = rlength,
            DataHeader::Replication(r) => r.length = rlength,
            DataHeader::TwoPcPrepare(p) => p.gtrinfo_length = rlength as i32,
            _ => {}
        }
    }

    pub fn log_data_mut(&mut self) -> Option<&mut LogData> {
        match self {
            DataHeader::Undoredo(u) => Some(&mut u.data),
            DataHeader::MvccUndoredo(m) => Some(&mut m.undoredo.data),
            DataHeader::Undo(u) => Some(&mut u.data),
            DataHeader::MvccUndo(m) => Some(&mut m.undo.data),
            DataHeader::Redo(r) | DataHeader::Postpone(r) => Some(&mut r.data),
            DataHeader::MvccRedo(m) => Some(&mut m.redo.data),
            DataHeader::RunPostpone(r) => Some(&mut r.data),
            DataHeader::Compensate(c) => Some(&mut c.data),
            DataHeader::SysopEnd(LogRecSysopEnd {
                end_type: SysopEndType::LogicalUndo(u),
                ..
            }) => Some(&mut u.data),
            DataHeader::SysopEnd(LogRecSysopEnd {
                end_type: SysopEndType::LogicalMvccUndo(m),
                ..
            }) => Some(&mut m.undo.data),
            _ => None,
        }
    }

    /// Vacuum info MVCC-undo форм (включая sysop end с logical MVCC undo).
    pub fn vacuum_info_mut(&mut self) -> Option<&mut LogVacuumInfo> {
        match self {
            DataHeader::MvccUndoredo(m) => Some(&mut m.vacuum_info),
            DataHeader::MvccUndo(m) => Some(&mut m.vacuum_info),
            DataHeader::SysopEnd(LogRecSysopEnd {
                end_type: SysopEndType::LogicalMvccUndo(m),
                ..
            }) => Some(&mut m.vacuum_info),
            _ => None,
        }
    }

    pub fn vacuum_info(&self) -> Option<&LogVacuumInfo> {
        match self {
            DataHeader::MvccUndoredo(m) => Some(&m.vacuum_info),
            DataHeader::MvccUndo(m) => Some(&m.vacuum_info),
            DataHeader::SysopEnd(LogRecSysopEnd {
                end_type: SysopEndType::LogicalMvccUndo(m),
                ..
            }) => Some(&m.vacuum_info),
            _ => None,
        }
    }

    pub fn mvccid(&self) -> Option<u64> {
        match self {
            DataHeader::MvccUndoredo(m) => Some(m.mvccid),
            DataHeader::MvccUndo(m) => Some(m.mvccid),
            DataHeader::MvccRedo(m) => Some(m.mvccid),
            DataHeader::SysopEnd(LogRecSysopEnd {
                end_type: SysopEndType::LogicalMvccUndo(m),
                ..
            }) => Some(m.mvccid),
            _ => None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = HdrWriter::with_capacity(self.len());
        match self {
            DataHeader::None => {}
            DataHeader::Undoredo(u) => w.undoredo(u),
            DataHeader::Undo(u) => w.undo(u),
            DataHeader::Redo(r) | DataHeader::Postpone(r) => w.redo(r),
            DataHeader::MvccUndoredo(m) => {
                w.undoredo(&m.undoredo);
                w.u64(m.mvccid);
                w.vacuum_info(&m.vacuum_info);
            }
            DataHeader::MvccUndo(m) => w.mvcc_undo(m),
            DataHeader::MvccRedo(m) => {
                w.redo(&m.redo);
                w.u64(m.mvccid);
            }
            DataHeader::DbExternRedo(d) => {
                w.i32(d.rcvindex);
                w.u32(d.length);
            }
            DataHeader::RunPostpone(r) => {
                w.log_data(&r.data);
                w.lsa(&r.ref_lsa);
                w.u32(r.length);
            }
            DataHeader::Compensate(c) => {
                w.log_data(&c.data);
                w.lsa(&c.undo_nxlsa);
                w.u32(c.length);
            }
            DataHeader::Donetime(d) => w.i64(d.at_time),
            DataHeader::StartPostpone(p) => w.lsa(&p.posp_lsa),
            DataHeader::SysopStartPostpone(p) => {
                w.sysop_end(&p.sysop_end);
                w.lsa(&p.posp_lsa);
            }
            DataHeader::SysopEnd(e) => w.sysop_end(e),
            DataHeader::Savepoint(s) => w.u32(s.length),
            DataHeader::TwoPcPrepare(p) => {
                w.i32(p.gtrid);
                w.i32(p.gtrinfo_length);
                w.i32(p.num_object_locks);
                w.i32(p.num_page_locks);
            }
            DataHeader::Chkpt(c) => {
                w.lsa(&c.redo_lsa);
                w.i32(c.ntrans);
                w.i32(c.ntops);
            }
            DataHeader::Replication(r) => {
                w.lsa(&r.lsa);
                w.u32(r.length);
                w.i32(r.rcvindex);
            }
            DataHeader::HaServerState(h) => {
                w.i32(h.state);
                w.i32(0);
                w.i64(h.at_time);
            }
        }
        debug_assert_eq!(w.buf.len(), self.len());
        w.buf
    }

    pub fn decode(kind: LogRecType, buf: &[u8]) -> LogResult<Self> {
        let shape = Self::default_for(kind);
        if buf.len() < shape.len() {
            return Err(LogError::Corrupted(format!(
                "data header of {:?} needs {} bytes, got {}",
                kind,
                shape.len(),
                buf.len()
            )));
        }
        let mut r = HdrReader { buf, pos: 0 };
        Ok(match shape {
            DataHeader::None => DataHeader::None,
            DataHeader::Undoredo(_) => DataHeader::Undoredo(r.undoredo()),
            DataHeader::Undo(_) => DataHeader::Undo(r.undo()),
            DataHeader::Redo(_) => DataHeader::Redo(r.redo()),
            DataHeader::Postpone(_) => DataHeader::Postpone(r.redo()),
            DataHeader::MvccUndoredo(_) => DataHeader::MvccUndoredo(LogRecMvccUndoredo {
                undoredo: r.undoredo(),
                mvccid: r.u64(),
                vacuum_info: r.vacuum_info(),
            }),
            DataHeader::MvccUndo(_) => DataHeader::MvccUndo(r.mvcc_undo()),
            DataHeader::MvccRedo(_) => DataHeader::MvccRedo(LogRecMvccRedo {
                redo: r.redo(),
                mvccid: r.u64(),
            }),
            DataHeader::DbExternRedo(_) => DataHeader::DbExternRedo(LogRecDbExternRedo {
                rcvindex: r.i32(),
                length: r.u32(),
            }),
            DataHeader::RunPostpone(_) => DataHeader::RunPostpone(LogRecRunPostpone {
                data: r.log_data(),
                ref_lsa: r.lsa(),
                length: r.u32(),
            }),
            DataHeader::Compensate(_) => DataHeader::Compensate(LogRecCompensate {
                data: r.log_data(),
                undo_nxlsa: r.lsa(),
                length: r.u32(),
            }),
            DataHeader::Donetime(_) => DataHeader::Donetime(LogRecDonetime { at_time: r.i64() }),
            DataHeader::StartPostpone(_) => {
                DataHeader::StartPostpone(LogRecStartPostpone { posp_lsa: r.lsa() })
            }
            DataHeader::SysopStartPostpone(_) => {
                DataHeader::SysopStartPostpone(LogRecSysopStartPostpone {
                    sysop_end: r.sysop_end()?,
                    posp_lsa: r.lsa(),
                })
            }
            DataHeader::SysopEnd(_) => DataHeader::SysopEnd(r.sysop_end()?),
            DataHeader::Savepoint(_) => DataHeader::Savepoint(LogRecSavept { length: r.u32() }),
            DataHeader::TwoPcPrepare(_) => DataHeader::TwoPcPrepare(LogRec2pcPrepcommit {
                gtrid: r.i32(),
                gtrinfo_length: r.i32(),
                num_object_locks: r.i32(),
                num_page_locks: r.i32(),
            }),
            DataHeader::Chkpt(_) => DataHeader::Chkpt(LogRecChkpt {
                redo_lsa: r.lsa(),
                ntrans: r.i32(),
                ntops: r.i32(),
            }),
            DataHeader::Replication(_) => DataHeader::Replication(LogRecReplication {
                lsa: r.lsa(),
                length: r.u32(),
                rcvindex: r.i32(),
            }),
            DataHeader::HaServerState(_) => {
                let state = r.i32();
                let _pad = r.i32();
                DataHeader::HaServerState(LogRecHaServerState {
                    state,
                    at_time: r.i64(),
                })
            }
        })
    }
}

fn sysop_end_carries_undo(e: &LogRecSysopEnd) -> bool {
    matches!(
        e.end_type,
        SysopEndType::LogicalUndo(_) | SysopEndType::LogicalMvccUndo(_)
    )
}

fn sysop_end_undo_length(e: &LogRecSysopEnd) -> u32 {
    match &e.end_type {
        SysopEndType::LogicalUndo(u) => u.length,
        SysopEndType::LogicalMvccUndo(m) => m.undo.length,
        _ => 0,
    }
}

fn set_sysop_end_undo_length(e: &mut LogRecSysopEnd, len: u32) {
    match &mut e.end_type {
        SysopEndType::LogicalUndo(u) => u.length = len,
        SysopEndType::LogicalMvccUndo(m) => m.undo.length = len,
        _ => {}
    }
}

struct HdrWriter {
    buf: Vec<u8>,
}

impl HdrWriter {
    fn with_capacity(n: usize) -> Self {
        Self {
            buf: Vec::with_capacity(n),
        }
    }

    fn i16(&mut self, v: i16) {
        let mut b = [0u8; 2];
        BigEndian::write_i16(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    fn i32(&mut self, v: i32) {
        let mut b = [0u8; 4];
        BigEndian::write_i32(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    fn u32(&mut self, v: u32) {
        let mut b = [0u8; 4];
        BigEndian::write_u32(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    fn i64(&mut self, v: i64) {
        let mut b = [0u8; 8];
        BigEndian::write_i64(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    fn u64(&mut self, v: u64) {
        let mut b = [0u8; 8];
        BigEndian::write_u64(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    fn lsa(&mut self, lsa: &LogLsa) {
        let mut b = [0u8; OR_LSA_SIZE];
        lsa.encode(&mut b);
        self.buf.extend_from_slice(&b);
    }

    fn vfid(&mut self, vfid: &Vfid) {
        self.i32(vfid.fileid);
        self.i16(vfid.volid);
        self.i16(0);
    }

    fn log_data(&mut self, d: &LogData) {
        self.i32(d.rcvindex);
        self.i32(d.pageid);
        self.i16(d.offset);
        self.i16(d.volid);
    }

    fn vacuum_info(&mut self, v: &LogVacuumInfo) {
        self.lsa(&v.prev_mvcc_op_log_lsa);
        self.vfid(&v.vfid);
    }

    fn undoredo(&mut self, u: &LogRecUndoredo) {
        self.log_data(&u.data);
        self.u32(u.ulength);
        self.u32(u.rlength);
    }

    fn undo(&mut self, u: &LogRecUndo) {
        self.log_data(&u.data);
        self.u32(u.length);
    }

    fn redo(&mut self, r: &LogRecRedo) {
        self.log_data(&r.data);
        self.u32(r.length);
    }

    fn mvcc_undo(&mut self, m: &LogRecMvccUndo) {
        self.undo(&m.undo);
        self.u64(m.mvccid);
        self.vacuum_info(&m.vacuum_info);
    }

    fn sysop_end(&mut self, e: &LogRecSysopEnd) {
        let start = self.buf.len();
        self.lsa(&e.lastparent_lsa);
        self.lsa(&e.prv_topresult_lsa);
        self.i32(e.end_type.code());
        match &e.end_type {
            SysopEndType::Commit | SysopEndType::Abort => {}
            SysopEndType::LogicalUndo(u) => self.undo(u),
            SysopEndType::LogicalMvccUndo(m) => self.mvcc_undo(m),
            SysopEndType::LogicalCompensate { compensate_lsa } => self.lsa(compensate_lsa),
            SysopEndType::LogicalRunPostpone {
                postpone_lsa,
                is_sysop_postpone,
            } => {
                self.lsa(postpone_lsa);
                self.i32(*is_sysop_postpone as i32);
            }
        }
        // вариантная часть занимает место наибольшего варианта
        self.buf.resize(start + SYSOP_END_SIZE, 0);
    }
}

/// Чтение по заранее проверенной длине.
struct HdrReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl HdrReader<'_> {
    fn take(&mut self, n: usize) -> &[u8] {
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        s
    }

    fn i16(&mut self) -> i16 {
        BigEndian::read_i16(self.take(2))
    }

    fn i32(&mut self) -> i32 {
        BigEndian::read_i32(self.take(4))
    }

    fn u32(&mut self) -> u32 {
        BigEndian::read_u32(self.take(4))
    }

    fn i64(&mut self) -> i64 {
        BigEndian::read_i64(self.take(8))
    }

    fn u64(&mut self) -> u64 {
        BigEndian::read_u64(self.take(8))
    }

    fn lsa(&mut self) -> LogLsa {
        LogLsa::decode(self.take(OR_LSA_SIZE))
    }

    fn vfid(&mut self) -> Vfid {
        let fileid = self.i32();
        let volid = self.i16();
        let _pad = self.i16();
        Vfid { fileid, volid }
    }

    fn log_data(&mut self) -> LogData {
        LogData {
            rcvindex: self.i32(),
            pageid: self.i32(),
            offset: self.i16(),
            volid: self.i16(),
        }
    }

    fn vacuum_info(&mut self) -> LogVacuumInfo {
        LogVacuumInfo {
            prev_mvcc_op_log_lsa: self.lsa(),
            vfid: self.vfid(),
        }
    }

    fn undoredo(&mut self) -> LogRecUndoredo {
        LogRecUndoredo {
            data: self.log_data(),
            ulength: self.u32(),
            rlength: self.u32(),
        }
    }

    fn undo(&mut self) -> LogRecUndo {
        LogRecUndo {
            data: self.log_data(),
            length: self.u32(),
        }
    }

    fn redo(&mut self) -> LogRecRedo {
        LogRecRedo {
            data: self.log_data(),
            length: self.u32(),
        }
    }

    fn mvcc_undo(&mut self) -> LogRecMvccUndo {
        LogRecMvccUndo {
            undo: self.undo(),
            mvccid: self.u64(),
            vacuum_info: self.vacuum_info(),
        }
    }

    fn sysop_end(&mut self) -> LogResult<LogRecSysopEnd> {
        let start = self.pos;
        let lastparent_lsa = self.lsa();
        let prv_topresult_lsa = self.lsa();
        let end_type = match self.i32() {
            0 => SysopEndType::Commit,
            1 => SysopEndType::Abort,
            2 => SysopEndType::LogicalUndo(self.undo()),
            3 => SysopEndType::LogicalMvccUndo(self.mvcc_undo()),
            4 => SysopEndType::LogicalCompensate {
                compensate_lsa: self.lsa(),
            },
            5 => SysopEndType::LogicalRunPostpone {
                postpone_lsa: self.lsa(),
                is_sysop_postpone: self.i32() != 0,
            },
            other => {
                return Err(LogError::Corrupted(format!("unknown sysop end type {}", other)))
            }
        };
        self.pos = start + SYSOP_END_SIZE;
        Ok(LogRecSysopEnd {
            lastparent_lsa,
            prv_topresult_lsa,
            end_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(LogRecType::MvccDiffUndoRedoData.is_undoredo());
        assert!(LogRecType::MvccDiffUndoRedoData.is_diff());
        assert!(LogRecType::MvccRedoData.uses_crumbs());
        assert!(!LogRecType::Postpone.uses_crumbs());
        assert!(!LogRecType::Commit.is_mvcc_op());
        assert!(LogRecType::from_code(38).is_err());
    }

    #[test]
    fn header_lengths_follow_kind() {
        assert_eq!(DataHeader::default_for(LogRecType::UndoRedoData).len(), 20);
        assert_eq!(DataHeader::default_for(LogRecType::MvccUndoRedoData).len(), 44);
        assert_eq!(DataHeader::default_for(LogRecType::MvccUndoData).len(), 40);
        assert_eq!(DataHeader::default_for(LogRecType::MvccRedoData).len(), 24);
        assert_eq!(DataHeader::default_for(LogRecType::SysopEnd).len(), 60);
        assert_eq!(DataHeader::default_for(LogRecType::SysopStartPostpone).len(), 68);
        assert_eq!(DataHeader::default_for(LogRecType::WillCommit).len(), 0);
        assert_eq!(DataHeader::default_for(LogRecType::Commit).len(), 8);
    }

    #[test]
    fn sysop_end_variant_decodes_at_fixed_length() {
        let e = LogRecSysopEnd {
            lastparent_lsa: LogLsa::new(3, 40),
            prv_topresult_lsa: LogLsa::NULL,
            end_type: SysopEndType::LogicalRunPostpone {
                postpone_lsa: LogLsa::new(2, 8),
                is_sysop_postpone: true,
            },
        };
        let dh = DataHeader::SysopStartPostpone(LogRecSysopStartPostpone {
            sysop_end: e,
            posp_lsa: LogLsa::new(3, 16),
        });
        let bytes = dh.encode();
        assert_eq!(bytes.len(), dh.len());
        let back = DataHeader::decode(LogRecType::SysopStartPostpone, &bytes).unwrap();
        assert_eq!(back, dh);
    }

    #[test]
    fn record_header_keeps_links() {
        let mut h = LogRecordHeader::new(7, LogRecType::MvccUndoData);
        h.prev_tranlsa = LogLsa::new(1, 64);
        h.forw_lsa = LogLsa::new(2, 0);
        let back = LogRecordHeader::decode(&h.encode()).unwrap();
        assert_eq!(back, h);
    }
}
