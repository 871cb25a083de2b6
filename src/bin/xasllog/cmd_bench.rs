use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use XaslLog::codec::Vfid;
use XaslLog::config::Builder;
use XaslLog::log::{LogDataAddr, LogLsa};
use XaslLog::metrics::{self, MetricsSnapshot};
use XaslLog::{AppendMode, FlushDaemon, LogAppender, LogRecType, LogTdes, LogVolume, PriorBuilder};

#[derive(Serialize)]
struct BenchReport {
    records: usize,
    payload: usize,
    threads: usize,
    mode: String,
    elapsed_ms: f64,
    records_per_sec: f64,
    first_lsa: String,
    last_lsa: String,
    end_lsa: String,
    pages: usize,
    volume: Option<String>,
    metrics: MetricsSnapshot,
}

/// undo и redo отличаются в каждом 64-м байте: diff после xor почти нулевой.
fn images(seed: usize, len: usize) -> (Vec<u8>, Vec<u8>) {
    let undo: Vec<u8> = (0..len).map(|j| ((seed + j / 16) % 251) as u8).collect();
    let mut redo = undo.clone();
    for b in redo.iter_mut().step_by(64) {
        *b = b.wrapping_add(1);
    }
    (undo, redo)
}

fn append_worker(
    app: &LogAppender,
    builder: PriorBuilder,
    trid: i32,
    count: usize,
    payload: usize,
) -> Result<(LogLsa, LogLsa)> {
    let mut tdes = LogTdes::new(trid);
    let addr = LogDataAddr::new(Vfid { fileid: trid, volid: 0 }, 0, 0, 0);
    let mut first = LogLsa::NULL;
    let mut last = LogLsa::NULL;
    for i in 0..count {
        let (undo, redo) = images(i, payload);
        let node = builder.alloc_and_copy_crumbs(
            &tdes,
            LogRecType::UndoRedoData,
            i as i32 % 64,
            Some(&addr),
            &[undo.as_slice()],
            &[redo.as_slice()],
        )?;
        let lsa = app.next_record(node, &mut tdes)?;
        if first.is_null() {
            first = lsa;
        }
        last = lsa;
    }
    Ok((first, last))
}

pub fn exec(
    records: usize,
    payload: usize,
    mode: AppendMode,
    threads: usize,
    path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let threads = threads.max(1);
    let cfg = Builder::new().append_mode(mode).build()?;
    let builder = PriorBuilder::new(&cfg);
    let app = LogAppender::new(cfg);

    metrics::reset();
    let mut daemon = match mode {
        AppendMode::Server => Some(FlushDaemon::start(app.clone())?),
        AppendMode::Standalone => None,
    };

    let t0 = Instant::now();
    let per_thread = records / threads;
    let mut handles = Vec::with_capacity(threads);
    for t in 0..threads {
        let app = app.clone();
        let count = if t == 0 { records - per_thread * (threads - 1) } else { per_thread };
        handles.push(thread::spawn(move || {
            append_worker(&app, builder, t as i32 + 1, count, payload)
        }));
    }

    let mut first = LogLsa::NULL;
    let mut last = LogLsa::NULL;
    for h in handles {
        let (f, l) = h.join().map_err(|_| anyhow!("append worker panicked"))??;
        if !f.is_null() && (first.is_null() || f < first) {
            first = f;
        }
        if last.is_null() || l > last {
            last = l;
        }
    }

    if let Some(d) = daemon.as_mut() {
        d.stop();
    }
    app.drain().context("final drain")?;
    let elapsed = t0.elapsed().as_secs_f64();

    let pages = app.pages();
    let volume = match &path {
        Some(dir) => Some(LogVolume::flush(dir, &pages)?.display().to_string()),
        None => None,
    };

    let report = BenchReport {
        records,
        payload,
        threads,
        mode: mode.to_string(),
        elapsed_ms: elapsed * 1000.0,
        records_per_sec: if elapsed > 0.0 { records as f64 / elapsed } else { 0.0 },
        first_lsa: first.to_string(),
        last_lsa: last.to_string(),
        end_lsa: pages.end_lsa().to_string(),
        pages: pages.num_pages(),
        volume,
        metrics: metrics::snapshot(),
    };
    drop(pages);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let m = &report.metrics;
    println!("bench-append ({} mode, {} threads):", report.mode, report.threads);
    println!("  records        = {} x {} bytes", report.records, report.payload);
    println!(
        "  elapsed        = {:.2} ms ({:.0} rec/s)",
        report.elapsed_ms, report.records_per_sec
    );
    println!("  lsa range      = {} .. {}", report.first_lsa, report.last_lsa);
    println!("  log end        = {} ({} pages)", report.end_lsa, report.pages);
    println!("  prior bytes    = {}", m.log_prior_bytes);
    println!(
        "  zip            = {}/{} ({:.1}%)",
        m.log_zip_successes,
        m.log_zip_attempts,
        m.zip_success_ratio() * 100.0
    );
    println!("  diff records   = {}", m.log_diff_records);
    println!("  sync drains    = {}", m.log_sync_drains);
    println!("  daemon wakeups = {}", m.log_daemon_wakeups);
    if let Some(v) = &report.volume {
        println!("  volume         = {}", v);
    }
    Ok(())
}
