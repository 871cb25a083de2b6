//! Дескриптор транзакции и трекер вложенных областей (sysop / postpone).
//!
//! Вложенность не хранится счётчиком: она восстанавливается сравнением LSA
//! маркеров с `lastparent_lsa` текущей системной операции. Всё это меняется
//! только под мьютексом prior list, во время `next_record`.

use super::lsa::LogLsa;
use super::record::LogRecType;
use crate::consts::LOG_SYSTEM_TRANID;

pub const MVCCID_NULL: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranState {
    #[default]
    Active,
    UnactiveCommittedWithPostpone,
    UnactiveTopopeCommittedWithPostpone,
    UnactiveCommitted,
    UnactiveAborted,
}

/// Открытая системная операция.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogTopop {
    pub lastparent_lsa: LogLsa,
    pub posp_lsa: LogLsa,
}

/// LSA, нужные recovery для разбора незавершённых областей.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRcvTdes {
    pub sysop_start_postpone_lsa: LogLsa,
    pub atomic_sysop_start_lsa: LogLsa,
    pub tran_start_postpone_lsa: LogLsa,
}

#[derive(Debug, Clone, Default)]
pub struct LogTdes {
    pub trid: i32,
    pub state: TranState,
    pub head_lsa: LogLsa,
    pub tail_lsa: LogLsa,
    pub undo_nxlsa: LogLsa,
    pub commit_abort_lsa: LogLsa,
    pub mvccid: u64,
    pub topops: Vec<LogTopop>,
    pub rcv: LogRcvTdes,
}

impl LogTdes {
    pub fn new(trid: i32) -> Self {
        Self {
            trid,
            ..Default::default()
        }
    }

    /// Системный worker (vacuum / recovery).
    pub fn system_worker() -> Self {
        Self::new(LOG_SYSTEM_TRANID)
    }

    pub fn with_mvccid(mut self, mvccid: u64) -> Self {
        self.mvccid = mvccid;
        self
    }

    pub fn is_system_worker_transaction(&self) -> bool {
        self.trid == LOG_SYSTEM_TRANID
    }

    pub fn is_under_sysop(&self) -> bool {
        !self.topops.is_empty()
    }

    /// Открыть системную операцию; родитель - текущий хвост транзакции.
    pub fn start_sysop(&mut self) {
        self.topops.push(LogTopop {
            lastparent_lsa: self.tail_lsa,
            posp_lsa: LogLsa::NULL,
        });
    }

    pub fn end_sysop(&mut self) -> Option<LogTopop> {
        self.topops.pop()
    }

    fn last_parent_lsa(&self) -> LogLsa {
        self.topops
            .last()
            .map(|t| t.lastparent_lsa)
            .unwrap_or(LogLsa::NULL)
    }

    /// Связать новую запись с цепочкой транзакции; возвращает prev_tranlsa.
    ///
    /// Записи системного worker'а вне sysop в цепочку не попадают.
    pub fn link_record(&mut self, start_lsa: LogLsa) -> LogLsa {
        if self.is_system_worker_transaction() && !self.is_under_sysop() {
            self.head_lsa.set_null();
            self.tail_lsa.set_null();
            return LogLsa::NULL;
        }
        let prev = self.tail_lsa;
        self.tail_lsa = start_lsa;
        if self.head_lsa.is_null() {
            self.head_lsa = start_lsa;
        }
        self.undo_nxlsa = start_lsa;
        prev
    }

    /// Побочные эффекты отдельных типов записей на маркеры транзакции.
    pub fn track_scope(&mut self, kind: LogRecType, start_lsa: LogLsa) {
        match kind {
            LogRecType::SysopStartPostpone => {
                debug_assert!(self.is_under_sysop());
                self.rcv.sysop_start_postpone_lsa = start_lsa;
                let parent = self.last_parent_lsa();
                if !self.rcv.atomic_sysop_start_lsa.is_null()
                    && self.rcv.atomic_sysop_start_lsa > parent
                {
                    // postpone закрывает атомарную операцию внутри этой sysop
                    self.rcv.atomic_sysop_start_lsa.set_null();
                }
                self.state = TranState::UnactiveTopopeCommittedWithPostpone;
            }
            LogRecType::SysopEnd => {
                let parent = self.last_parent_lsa();
                if !self.rcv.atomic_sysop_start_lsa.is_null()
                    && self.rcv.atomic_sysop_start_lsa > parent
                {
                    self.rcv.atomic_sysop_start_lsa.set_null();
                }
                if !self.rcv.sysop_start_postpone_lsa.is_null()
                    && self.rcv.sysop_start_postpone_lsa > parent
                {
                    self.rcv.sysop_start_postpone_lsa.set_null();
                }
            }
            LogRecType::CommitWithPostpone | LogRecType::CommitWithPostponeObsolete => {
                self.rcv.tran_start_postpone_lsa = start_lsa;
            }
            LogRecType::SysopAtomicStart => {
                debug_assert!(
                    self.rcv.atomic_sysop_start_lsa.is_null(),
                    "atomic sysop already started at {}",
                    self.rcv.atomic_sysop_start_lsa
                );
                self.rcv.atomic_sysop_start_lsa = start_lsa;
            }
            LogRecType::Commit | LogRecType::Abort => {
                debug_assert!(
                    self.commit_abort_lsa.is_null(),
                    "transaction {} already has a terminal record",
                    self.trid
                );
                self.commit_abort_lsa = start_lsa;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lsa(p: i64, o: i16) -> LogLsa {
        LogLsa::new(p, o)
    }

    #[test]
    fn chain_links_previous_tail() {
        let mut t = LogTdes::new(5);
        assert!(t.link_record(lsa(0, 0)).is_null());
        assert_eq!(t.link_record(lsa(0, 64)), lsa(0, 0));
        assert_eq!(t.head_lsa, lsa(0, 0));
        assert_eq!(t.tail_lsa, lsa(0, 64));
        assert_eq!(t.undo_nxlsa, lsa(0, 64));
    }

    #[test]
    fn system_worker_outside_sysop_is_unchained() {
        let mut t = LogTdes::system_worker();
        assert!(t.link_record(lsa(1, 0)).is_null());
        assert!(t.head_lsa.is_null() && t.tail_lsa.is_null());

        t.start_sysop();
        assert!(t.link_record(lsa(1, 64)).is_null());
        assert_eq!(t.link_record(lsa(1, 128)), lsa(1, 64));
        assert_eq!(t.head_lsa, lsa(1, 64));
    }

    #[test]
    fn sysop_end_clears_markers_opened_inside_it() {
        let mut t = LogTdes::new(9);
        t.link_record(lsa(2, 0));
        t.start_sysop(); // parent = (2|0)
        t.track_scope(LogRecType::SysopAtomicStart, lsa(2, 64));
        t.track_scope(LogRecType::SysopStartPostpone, lsa(2, 128));
        // атомарная операция открыта после родителя -> закрыта postpone'ом
        assert!(t.rcv.atomic_sysop_start_lsa.is_null());
        assert_eq!(t.rcv.sysop_start_postpone_lsa, lsa(2, 128));
        assert_eq!(t.state, TranState::UnactiveTopopeCommittedWithPostpone);

        t.track_scope(LogRecType::SysopEnd, lsa(2, 256));
        assert!(t.rcv.sysop_start_postpone_lsa.is_null());
    }

    #[test]
    fn outer_atomic_start_survives_nested_sysop_end() {
        let mut t = LogTdes::new(9);
        t.track_scope(LogRecType::SysopAtomicStart, lsa(3, 0));
        t.link_record(lsa(3, 0));
        t.link_record(lsa(3, 64));
        t.start_sysop(); // parent = (3|64) > atomic start
        t.track_scope(LogRecType::SysopEnd, lsa(3, 128));
        assert_eq!(t.rcv.atomic_sysop_start_lsa, lsa(3, 0));
    }

    #[test]
    fn terminal_and_commit_postpone_markers() {
        let mut t = LogTdes::new(4);
        t.track_scope(LogRecType::CommitWithPostpone, lsa(7, 8));
        assert_eq!(t.rcv.tran_start_postpone_lsa, lsa(7, 8));
        t.track_scope(LogRecType::Commit, lsa(7, 64));
        assert_eq!(t.commit_abort_lsa, lsa(7, 64));
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic)]
    fn second_terminal_record_is_a_contract_violation() {
        let mut t = LogTdes::new(4);
        t.track_scope(LogRecType::Commit, lsa(7, 64));
        t.track_scope(LogRecType::Abort, lsa(7, 128));
    }
}
