//! Учёт MVCC-операций по vacuum-блокам лога.
//!
//! Лог делится на блоки по `vacuum_log_block_pages` страниц. Для каждого
//! блока с MVCC-операциями копится диапазон mvccid; при переходе в новый
//! блок данные прошлого блока отдаются vacuum'у (`take_blocks`).

use log::debug;

use super::lsa::LogLsa;
use super::tdes::MVCCID_NULL;

/// Данные завершённого блока для vacuum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VacuumBlockData {
    pub blockid: i64,
    /// Последняя MVCC-операция блока; от неё vacuum идёт назад по prev_mvcc_op_log_lsa.
    pub last_mvcc_op_lsa: LogLsa,
    pub oldest_visible_mvccid: u64,
    pub newest_mvccid: u64,
}

#[derive(Debug, Clone)]
pub struct MvccBlockTracker {
    block_pages: u64,
    pub mvcc_op_log_lsa: LogLsa,
    pub oldest_visible_mvccid: u64,
    pub newest_block_mvccid: u64,
    pub does_block_need_vacuum: bool,
    produced: Vec<VacuumBlockData>,
}

impl MvccBlockTracker {
    pub fn new(block_pages: u64) -> Self {
        Self {
            block_pages: block_pages.max(1),
            mvcc_op_log_lsa: LogLsa::NULL,
            oldest_visible_mvccid: MVCCID_NULL,
            newest_block_mvccid: MVCCID_NULL,
            does_block_need_vacuum: false,
            produced: Vec::new(),
        }
    }

    pub fn blockid(&self, pageid: i64) -> i64 {
        pageid / self.block_pages as i64
    }

    /// Учесть MVCC-запись, начинающуюся в `start_lsa`.
    /// Возвращает prev_mvcc_op_log_lsa для vacuum info этой записи.
    pub fn record_op(&mut self, start_lsa: LogLsa, mvccid: u64, global_oldest_visible: u64) -> LogLsa {
        let prev = self.mvcc_op_log_lsa;

        if self.does_block_need_vacuum
            && !prev.is_null()
            && self.blockid(prev.pageid) != self.blockid(start_lsa.pageid)
        {
            self.produce_block_data();
        }

        if !self.does_block_need_vacuum {
            self.oldest_visible_mvccid = global_oldest_visible;
            self.newest_block_mvccid = mvccid;
        } else if self.newest_block_mvccid < mvccid {
            self.newest_block_mvccid = mvccid;
        }
        self.mvcc_op_log_lsa = start_lsa;
        self.does_block_need_vacuum = true;
        prev
    }

    fn produce_block_data(&mut self) {
        let data = VacuumBlockData {
            blockid: self.blockid(self.mvcc_op_log_lsa.pageid),
            last_mvcc_op_lsa: self.mvcc_op_log_lsa,
            oldest_visible_mvccid: self.oldest_visible_mvccid,
            newest_mvccid: self.newest_block_mvccid,
        };
        debug!(
            "vacuum block {} produced: last op {}, mvccid {}..{}",
            data.blockid, data.last_mvcc_op_lsa, data.oldest_visible_mvccid, data.newest_mvccid
        );
        self.produced.push(data);
        self.does_block_need_vacuum = false;
    }

    /// Забрать накопленные блоки.
    pub fn take_blocks(&mut self) -> Vec<VacuumBlockData> {
        std::mem::take(&mut self.produced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ops_chain_and_raise_newest_within_block() {
        let mut t = MvccBlockTracker::new(4);
        assert!(t.record_op(LogLsa::new(0, 0), 10, 7).is_null());
        assert_eq!(t.record_op(LogLsa::new(1, 64), 12, 9), LogLsa::new(0, 0));
        assert_eq!(t.record_op(LogLsa::new(2, 0), 11, 9), LogLsa::new(1, 64));
        // oldest фиксируется один раз на блок
        assert_eq!(t.oldest_visible_mvccid, 7);
        assert_eq!(t.newest_block_mvccid, 12);
        assert!(t.take_blocks().is_empty());
    }

    #[test]
    fn crossing_block_boundary_produces_previous_block() {
        let mut t = MvccBlockTracker::new(4);
        t.record_op(LogLsa::new(3, 0), 20, 15);
        let prev = t.record_op(LogLsa::new(4, 0), 30, 25);
        assert_eq!(prev, LogLsa::new(3, 0));
        let blocks = t.take_blocks();
        assert_eq!(
            blocks,
            vec![VacuumBlockData {
                blockid: 0,
                last_mvcc_op_lsa: LogLsa::new(3, 0),
                oldest_visible_mvccid: 15,
                newest_mvccid: 20,
            }]
        );
        assert_eq!(t.oldest_visible_mvccid, 25);
        assert_eq!(t.newest_block_mvccid, 30);
    }
}
