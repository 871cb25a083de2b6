//! Prior list: резервирование LSA и очередь записей до сброса в лог-страницы.
//!
//! Что здесь:
//! - `PriorInfo` - глобальный курсор, prev_lsa, список узлов, MVCC-учёт
//!   (всё под одним мьютексом);
//! - `LogAppender` - владеет мьютексом prior list и "log critical section"
//!   (буфером страниц), реализует `next_record` / `next_record_with_lock`,
//!   backpressure и drain.
//!
//! Порядок блокировок: log CS -> prior mutex. Backpressure всегда идёт
//! после отпускания prior mutex.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use super::cursor::AppendCursor;
use super::error::LogResult;
use super::lsa::LogLsa;
use super::mvcc::{MvccBlockTracker, VacuumBlockData};
use super::page::LogPageBuffer;
use super::prior::LogPriorNode;
use super::tdes::{LogTdes, MVCCID_NULL};
use crate::config::{AppendMode, XaslLogConfig};
use crate::consts::LOG_HDRPAGE_SIZE;
use crate::metrics::{
    record_daemon_wakeup, record_pages_written, record_prior_record, record_sync_drain,
};

/// Состояние под мьютексом prior list.
#[derive(Debug)]
pub struct PriorInfo {
    cursor: AppendCursor,
    prev_lsa: LogLsa,
    list: VecDeque<LogPriorNode>,
    list_size: usize,
    mvcc: MvccBlockTracker,
}

impl PriorInfo {
    fn new(cfg: &XaslLogConfig, start: LogLsa) -> Self {
        Self {
            cursor: AppendCursor::new(start, cfg.log_page_size - LOG_HDRPAGE_SIZE),
            prev_lsa: LogLsa::NULL,
            list: VecDeque::new(),
            list_size: 0,
            mvcc: MvccBlockTracker::new(cfg.vacuum_log_block_pages),
        }
    }

    /// Куда придётся следующая запись (до выравнивания под заголовок).
    pub fn prior_lsa(&self) -> LogLsa {
        self.cursor.lsa()
    }

    /// Начало последней добавленной записи.
    pub fn prev_lsa(&self) -> LogLsa {
        self.prev_lsa
    }

    pub fn list_len(&self) -> usize {
        self.list.len()
    }

    pub fn list_size(&self) -> usize {
        self.list_size
    }

    pub fn mvcc(&self) -> &MvccBlockTracker {
        &self.mvcc
    }

    /// Назначить LSA, связать с транзакцией и поставить в хвост.
    fn append_node(&mut self, mut node: LogPriorNode, tdes: &mut LogTdes, oldest_visible: u64) -> LogLsa {
        let kind = node.rec_type();

        // START
        let start = self.cursor.start_record();
        node.start_lsa = start;
        node.log_header.back_lsa = self.prev_lsa;
        self.prev_lsa = start;
        node.log_header.prev_tranlsa = tdes.link_record(start);

        if let Some(mvccid) = node.data_header.mvccid() {
            if let Some(vacuum) = node.data_header.vacuum_info_mut() {
                debug_assert_ne!(mvccid, MVCCID_NULL);
                vacuum.prev_mvcc_op_log_lsa = self.mvcc.record_op(start, mvccid, oldest_visible);
            }
        }
        tdes.track_scope(kind, start);

        // DATA-APPENDED
        self.cursor.data_header(node.data_header_length());
        self.cursor.skip_data(node.udata.len());
        self.cursor.skip_data(node.rdata.len());

        // ENDED
        node.log_header.forw_lsa = self.cursor.end_record();

        // LINKED
        let size = node.accounted_size();
        self.list_size += size;
        record_prior_record(size);
        debug!(
            "prior {:?} trid {} at {} (forw {}), list {} bytes",
            kind, node.log_header.trid, start, node.log_header.forw_lsa, self.list_size
        );
        self.list.push_back(node);
        start
    }

    fn detach(&mut self) -> VecDeque<LogPriorNode> {
        self.list_size = 0;
        std::mem::take(&mut self.list)
    }

    /// Вернуть незаписанный хвост в голову списка, перед узлами,
    /// добавленными после detach.
    fn reattach(&mut self, mut head: VecDeque<LogPriorNode>) {
        self.list_size += head.iter().map(LogPriorNode::accounted_size).sum::<usize>();
        head.append(&mut self.list);
        self.list = head;
    }
}

/// Удерживаемый мьютекс prior list для пакета записей.
pub struct PriorGuard<'a> {
    inner: Option<MutexGuard<'a, PriorInfo>>,
    prior: &'a Mutex<PriorInfo>,
}

impl Deref for PriorGuard<'_> {
    type Target = PriorInfo;

    fn deref(&self) -> &PriorInfo {
        match &self.inner {
            Some(g) => &**g,
            None => unreachable!("prior guard is re-acquired before returning to the caller"),
        }
    }
}

impl DerefMut for PriorGuard<'_> {
    fn deref_mut(&mut self) -> &mut PriorInfo {
        match &mut self.inner {
            Some(g) => &mut **g,
            None => unreachable!("prior guard is re-acquired before returning to the caller"),
        }
    }
}

/// Движок добавления лог-записей.
pub struct LogAppender {
    cfg: XaslLogConfig,
    prior: Mutex<PriorInfo>,
    /// log critical section
    pages: Mutex<LogPageBuffer>,
    budget: usize,
    oldest_visible: AtomicU64,
    in_crash_recovery: AtomicBool,
    flush_requested: Mutex<bool>,
    flush_cv: Condvar,
}

impl LogAppender {
    pub fn new(cfg: XaslLogConfig) -> Arc<Self> {
        Self::with_start(cfg, LogLsa::new(0, 0))
    }

    pub fn with_start(cfg: XaslLogConfig, start: LogLsa) -> Arc<Self> {
        let budget = cfg.log_buffer_bytes();
        info!(
            "log appender: page {} bytes, buffer budget {} bytes, mode {}, start {}",
            cfg.log_page_size, budget, cfg.append_mode, start
        );
        Arc::new(Self {
            prior: Mutex::new(PriorInfo::new(&cfg, start)),
            pages: Mutex::new(LogPageBuffer::new(cfg.log_page_size, start)),
            budget,
            oldest_visible: AtomicU64::new(MVCCID_NULL),
            in_crash_recovery: AtomicBool::new(false),
            flush_requested: Mutex::new(false),
            flush_cv: Condvar::new(),
            cfg,
        })
    }

    pub fn config(&self) -> &XaslLogConfig {
        &self.cfg
    }

    pub fn set_global_oldest_visible(&self, mvccid: u64) {
        self.oldest_visible.store(mvccid, Ordering::Relaxed);
    }

    pub fn set_crash_recovery(&self, on: bool) {
        self.in_crash_recovery.store(on, Ordering::Relaxed);
    }

    pub fn lock(&self) -> PriorGuard<'_> {
        PriorGuard {
            inner: Some(self.prior.lock().unwrap()),
            prior: &self.prior,
        }
    }

    /// Доступ к буферу страниц под log critical section.
    pub fn pages(&self) -> MutexGuard<'_, LogPageBuffer> {
        self.pages.lock().unwrap()
    }

    /// Добавить запись; мьютекс берётся внутри.
    pub fn next_record(&self, node: LogPriorNode, tdes: &mut LogTdes) -> LogResult<LogLsa> {
        let (start, over) = {
            let mut g = self.prior.lock().unwrap();
            let start = g.append_node(node, tdes, self.oldest_visible.load(Ordering::Relaxed));
            (start, g.list_size >= self.budget)
        };
        if over {
            self.relieve_pressure()?;
        }
        Ok(start)
    }

    /// Добавить запись под уже взятым мьютексом. При переполнении мьютекс
    /// временно отпускается на время разгрузки.
    pub fn next_record_with_lock(
        &self,
        guard: &mut PriorGuard<'_>,
        node: LogPriorNode,
        tdes: &mut LogTdes,
    ) -> LogResult<LogLsa> {
        let start = guard.append_node(node, tdes, self.oldest_visible.load(Ordering::Relaxed));
        if guard.list_size >= self.budget {
            guard.inner = None;
            let res = self.relieve_pressure();
            guard.inner = Some(guard.prior.lock().unwrap());
            res?;
        }
        Ok(start)
    }

    fn relieve_pressure(&self) -> LogResult<()> {
        let recovering = self.in_crash_recovery.load(Ordering::Relaxed);
        match self.cfg.append_mode {
            AppendMode::Server if !recovering => {
                debug!("prior list over budget, waking flush daemon");
                self.wakeup_flush_daemon();
                thread::sleep(Duration::from_millis(1));
            }
            _ => {
                warn!(
                    "prior list over budget ({} bytes), draining synchronously",
                    self.budget
                );
                record_sync_drain();
                self.drain()?;
            }
        }
        Ok(())
    }

    pub(crate) fn wakeup_flush_daemon(&self) {
        let mut req = self.flush_requested.lock().unwrap();
        *req = true;
        self.flush_cv.notify_one();
    }

    /// Ждать сигнала или таймаута; true, если был запрос.
    pub(crate) fn wait_flush_request(&self, timeout: Duration) -> bool {
        let req = self.flush_requested.lock().unwrap();
        let (mut req, _) = self
            .flush_cv
            .wait_timeout_while(req, timeout, |r| !*r)
            .unwrap();
        let was = *req;
        *req = false;
        if was {
            record_daemon_wakeup();
        }
        was
    }

    /// Снять весь prior list и записать узлы в страницы. Возвращает число записей.
    /// При ошибке незаписанные узлы остаются в prior list.
    pub fn drain(&self) -> LogResult<usize> {
        let mut pages = self.pages.lock().unwrap();
        let mut nodes = self.prior.lock().unwrap().detach();
        let n = nodes.len();
        let before = pages.num_pages();
        while let Some(node) = nodes.front() {
            if let Err(e) = pages.append_node(node) {
                warn!(
                    "drain stopped at {}: {}; {} records kept in prior list",
                    node.start_lsa,
                    e,
                    nodes.len()
                );
                self.prior.lock().unwrap().reattach(nodes);
                return Err(e);
            }
            nodes.pop_front();
        }
        let written = pages.num_pages() - before;
        record_pages_written(written);
        if n > 0 {
            debug!("drained {} records, {} new pages, log ends at {}", n, written, pages.end_lsa());
        }
        Ok(n)
    }

    /// Готовые данные vacuum-блоков.
    pub fn take_vacuum_blocks(&self) -> Vec<VacuumBlockData> {
        self.prior.lock().unwrap().mvcc.take_blocks()
    }
}
