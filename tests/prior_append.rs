use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use anyhow::Result;

use XaslLog::log::{LogDataAddr, LogLsa, LogPriorNode, RV_NOTIFY_VACUUM};
use XaslLog::codec::Vfid;
use XaslLog::{LogAppender, LogRecType, LogTdes, PriorBuilder, XaslLogConfig};

fn cfg() -> XaslLogConfig {
    // маленькие страницы: записи часто переходят границу
    XaslLogConfig::default().with_log_page_size(512)
}

fn addr() -> LogDataAddr {
    LogDataAddr::new(Vfid { fileid: 7, volid: 0 }, 12, 0, 40)
}

fn undoredo(b: &PriorBuilder, t: &LogTdes, undo: &[u8], redo: &[u8]) -> Result<LogPriorNode> {
    Ok(b.alloc_and_copy_crumbs(t, LogRecType::UndoRedoData, 3, Some(&addr()), &[undo], &[redo])?)
}

#[test]
fn three_records_of_one_transaction_chain() -> Result<()> {
    let app = LogAppender::new(cfg());
    let b = PriorBuilder::new(app.config());
    let mut t = LogTdes::new(11);

    let r1 = app.next_record(undoredo(&b, &t, b"u1", b"r1")?, &mut t)?;
    let r2 = app.next_record(undoredo(&b, &t, b"u2", b"r2")?, &mut t)?;
    let r3 = app.next_record(undoredo(&b, &t, b"u3", b"r3")?, &mut t)?;

    assert_eq!(t.head_lsa, r1);
    assert_eq!(t.tail_lsa, r3);
    assert_eq!(t.undo_nxlsa, r3);

    app.drain()?;
    let pages = app.pages();
    let v1 = pages.read_record(r1)?;
    let v2 = pages.read_record(r2)?;
    let v3 = pages.read_record(r3)?;
    assert!(v1.header.prev_tranlsa.is_null());
    assert_eq!(v2.header.prev_tranlsa, r1);
    assert_eq!(v3.header.prev_tranlsa, r2);
    assert_eq!(v1.header.forw_lsa, r2);
    assert_eq!(v3.header.back_lsa, r2);
    assert_eq!(v2.undo, b"u2");
    assert_eq!(v2.redo, b"r2");
    Ok(())
}

#[test]
fn records_spanning_pages_keep_offsets_in_area() -> Result<()> {
    let app = LogAppender::new(cfg());
    let area = app.config().log_page_size as i16 - 16;
    let b = PriorBuilder::new(&app.config().clone().with_log_compress(false));
    let mut t = LogTdes::new(2);

    let big = vec![0xABu8; 1500];
    let start = app.next_record(undoredo(&b, &t, &big, &big)?, &mut t)?;
    let next = app.next_record(undoredo(&b, &t, b"x", b"y")?, &mut t)?;
    assert!(next.pageid >= start.pageid + 5);
    assert!(next.offset >= 0 && next.offset < area);

    app.drain()?;
    let pages = app.pages();
    let v = pages.read_record(start)?;
    assert_eq!(v.undo, big);
    assert_eq!(v.redo, big);
    assert_eq!(v.header.forw_lsa, next);
    Ok(())
}

#[test]
fn concurrent_appenders_get_increasing_lsas_and_own_chains() -> Result<()> {
    let app = LogAppender::new(cfg());
    let b = PriorBuilder::new(app.config());
    let threads = 4;
    let per_thread = 150;

    let mut handles = Vec::new();
    for i in 0..threads {
        let app = Arc::clone(&app);
        handles.push(thread::spawn(move || -> Result<Vec<LogLsa>> {
            let mut t = LogTdes::new(100 + i);
            let mut mine = Vec::with_capacity(per_thread);
            for n in 0..per_thread {
                let payload = vec![(n % 250) as u8; 1 + n % 90];
                let node = b.alloc_and_copy_crumbs(
                    &t,
                    LogRecType::RedoData,
                    1,
                    None,
                    &[],
                    &[payload.as_slice()],
                )?;
                mine.push(app.next_record(node, &mut t)?);
            }
            Ok(mine)
        }));
    }
    let mut per_tran: HashMap<i32, Vec<LogLsa>> = HashMap::new();
    for (i, h) in handles.into_iter().enumerate() {
        let mine = h.join().expect("appender thread")?;
        assert!(mine.windows(2).all(|w| w[0] < w[1]));
        per_tran.insert(100 + i as i32, mine);
    }

    app.drain()?;
    let pages = app.pages();
    let all = pages.records()?;
    assert_eq!(all.len(), threads as usize * per_thread);
    for w in all.windows(2) {
        assert!(w[0].lsa < w[1].lsa);
        assert_eq!(w[0].header.forw_lsa, w[1].lsa);
        assert_eq!(w[1].header.back_lsa, w[0].lsa);
    }

    // у каждой транзакции prev_tranlsa указывает на её же предыдущую запись
    let mut last: HashMap<i32, LogLsa> = HashMap::new();
    for r in &all {
        let prev = last.insert(r.header.trid, r.lsa).unwrap_or(LogLsa::NULL);
        assert_eq!(r.header.prev_tranlsa, prev);
    }
    for (trid, mine) in per_tran {
        let got: Vec<LogLsa> = all
            .iter()
            .filter(|r| r.header.trid == trid)
            .map(|r| r.lsa)
            .collect();
        assert_eq!(got, mine);
    }
    Ok(())
}

#[test]
fn with_lock_batch_is_contiguous() -> Result<()> {
    let app = LogAppender::new(cfg());
    let b = PriorBuilder::new(app.config());
    let mut other = LogTdes::new(1);
    let mut t = LogTdes::new(2);

    app.next_record(undoredo(&b, &other, b"a", b"b")?, &mut other)?;
    let batch: Vec<LogLsa> = {
        let mut g = app.lock();
        let before = g.prev_lsa();
        let mut v = Vec::new();
        for i in 0..5u8 {
            let node = undoredo(&b, &t, &[i], &[i + 1])?;
            v.push(app.next_record_with_lock(&mut g, node, &mut t)?);
        }
        assert!(before < v[0]);
        assert_eq!(g.prev_lsa(), v[4]);
        assert_eq!(g.list_len(), 6);
        v
    };
    app.next_record(undoredo(&b, &other, b"c", b"d")?, &mut other)?;

    app.drain()?;
    let pages = app.pages();
    let all = pages.records()?;
    let lsas: Vec<LogLsa> = all.iter().map(|r| r.lsa).collect();
    assert_eq!(&lsas[1..6], batch.as_slice());
    Ok(())
}

#[test]
fn sysop_scope_markers_follow_log_positions() -> Result<()> {
    let app = LogAppender::new(cfg());
    let b = PriorBuilder::new(app.config());
    let mut t = LogTdes::new(4);

    app.next_record(undoredo(&b, &t, b"u", b"r")?, &mut t)?;
    t.start_sysop();
    let atomic = b.alloc_and_copy_data(&t, LogRecType::SysopAtomicStart, 0, None, &[], &[])?;
    let atomic_lsa = app.next_record(atomic, &mut t)?;
    assert_eq!(t.rcv.atomic_sysop_start_lsa, atomic_lsa);

    app.next_record(undoredo(&b, &t, b"u2", b"r2")?, &mut t)?;
    let end = b.alloc_and_copy_data(&t, LogRecType::SysopEnd, 0, None, &[], &[])?;
    let end_lsa = app.next_record(end, &mut t)?;
    t.end_sysop();
    assert!(t.rcv.atomic_sysop_start_lsa.is_null());
    assert_eq!(t.tail_lsa, end_lsa);

    let commit = b.alloc_and_copy_data(&t, LogRecType::Commit, 0, None, &[], &[])?;
    let commit_lsa = app.next_record(commit, &mut t)?;
    assert_eq!(t.commit_abort_lsa, commit_lsa);
    Ok(())
}

#[test]
fn system_worker_records_stay_out_of_chains() -> Result<()> {
    let app = LogAppender::new(cfg());
    let b = PriorBuilder::new(app.config());
    let mut w = LogTdes::system_worker();
    let n = b.alloc_and_copy_crumbs(&w, LogRecType::RedoData, RV_NOTIFY_VACUUM, None, &[], &[&b"v"[..]])?;
    app.next_record(n, &mut w)?;
    assert!(w.head_lsa.is_null() && w.tail_lsa.is_null());

    app.drain()?;
    let pages = app.pages();
    let all = pages.records()?;
    assert_eq!(all.len(), 1);
    assert!(all[0].header.prev_tranlsa.is_null());
    Ok(())
}

#[test]
fn mvcc_ops_produce_vacuum_blocks_across_block_boundary() -> Result<()> {
    let app = LogAppender::new(cfg().with_vacuum_log_block_pages(1));
    app.set_global_oldest_visible(40);
    let b = PriorBuilder::new(&app.config().clone().with_log_compress(false));
    let mut t = LogTdes::new(6).with_mvccid(50);

    let mut starts = Vec::new();
    for _ in 0..6 {
        let payload = vec![1u8; 200];
        let n = b.alloc_and_copy_crumbs(
            &t,
            LogRecType::MvccUndoData,
            5,
            None,
            &[payload.as_slice()],
            &[],
        )?;
        starts.push(app.next_record(n, &mut t)?);
    }
    let blocks = app.take_vacuum_blocks();
    assert!(!blocks.is_empty());
    for blk in &blocks {
        assert_eq!(blk.oldest_visible_mvccid, 40);
        assert_eq!(blk.newest_mvccid, 50);
        assert!(starts.contains(&blk.last_mvcc_op_lsa));
        assert_eq!(blk.blockid, blk.last_mvcc_op_lsa.pageid);
    }
    assert!(app.take_vacuum_blocks().is_empty());

    // цепочка prev_mvcc_op_log_lsa читается с диска в обратном порядке
    app.drain()?;
    let pages = app.pages();
    for w in starts.windows(2) {
        let v = pages.read_record(w[1])?;
        let vac = v.data_header.vacuum_info().expect("mvcc record");
        assert_eq!(vac.prev_mvcc_op_log_lsa, w[0]);
        assert_eq!(v.data_header.mvccid(), Some(50));
    }
    Ok(())
}

#[test]
fn logical_undo_sysop_end_carries_its_undo() -> Result<()> {
    use XaslLog::log::record::{LogData, LogRecSysopEnd, LogRecUndo};
    use XaslLog::log::SysopEndType;

    let app = LogAppender::new(cfg());
    let b = PriorBuilder::new(app.config());
    let mut t = LogTdes::new(8);

    t.start_sysop();
    let parent = app.next_record(undoredo(&b, &t, b"a", b"b")?, &mut t)?;
    let end = LogRecSysopEnd {
        lastparent_lsa: parent,
        prv_topresult_lsa: LogLsa::NULL,
        end_type: SysopEndType::LogicalUndo(LogRecUndo {
            data: LogData {
                rcvindex: 33,
                ..Default::default()
            },
            length: 0,
        }),
    };
    let node = b.alloc_sysop_end(&t, end, Some(&addr()), b"logical-undo")?;
    assert_eq!(node.data_header.payload_lengths(), (12, 0));
    let end_lsa = app.next_record(node, &mut t)?;
    t.end_sysop();

    // commit-форма undo не несёт
    let bad = b.alloc_sysop_end(&t, LogRecSysopEnd::default(), None, b"x");
    assert!(bad.is_err());

    app.drain()?;
    let v = app.pages().read_record(end_lsa)?;
    assert_eq!(v.undo, b"logical-undo");
    match v.data_header {
        XaslLog::log::DataHeader::SysopEnd(e) => {
            assert_eq!(e.lastparent_lsa, parent);
            match e.end_type {
                SysopEndType::LogicalUndo(u) => {
                    assert_eq!(u.data.rcvindex, 33);
                    assert_eq!(u.data.pageid, addr().pageid);
                }
                other => panic!("unexpected end type {:?}", other),
            }
        }
        other => panic!("unexpected data header {:?}", other),
    }
    Ok(())
}
