use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

use XaslLog::log::LogRecordView;
use XaslLog::LogVolume;

#[derive(Serialize)]
struct RecordLine {
    lsa: String,
    kind: String,
    trid: i32,
    prev_tranlsa: String,
    back_lsa: String,
    forw_lsa: String,
    data_header_len: usize,
    undo_len: usize,
    redo_len: usize,
    undo_zipped: bool,
    redo_zipped: bool,
}

impl From<&LogRecordView> for RecordLine {
    fn from(r: &LogRecordView) -> Self {
        Self {
            lsa: r.lsa.to_string(),
            kind: format!("{:?}", r.header.rec_type),
            trid: r.header.trid,
            prev_tranlsa: r.header.prev_tranlsa.to_string(),
            back_lsa: r.header.back_lsa.to_string(),
            forw_lsa: r.header.forw_lsa.to_string(),
            data_header_len: r.data_header.len(),
            undo_len: r.undo.len(),
            redo_len: r.redo.len(),
            undo_zipped: r.undo_zipped,
            redo_zipped: r.redo_zipped,
        }
    }
}

#[derive(Serialize)]
struct DumpReport {
    page_size: usize,
    pages: usize,
    first_pageid: i64,
    end_lsa: String,
    tde_pages: usize,
    records: Vec<RecordLine>,
}

pub fn exec(path: PathBuf, json: bool) -> Result<()> {
    let buf = LogVolume::open(&path)
        .with_context(|| format!("open log volume in {}", path.display()))?;
    let records = buf
        .records()
        .with_context(|| format!("walk records of {}", path.display()))?;

    let report = DumpReport {
        page_size: buf.page_size(),
        pages: buf.num_pages(),
        first_pageid: buf.first_pageid(),
        end_lsa: buf.end_lsa().to_string(),
        tde_pages: buf.pages().iter().filter(|p| p.is_tde_encrypted()).count(),
        records: records.iter().map(RecordLine::from).collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "log volume {}: {} pages x {} bytes, first page {}, end {}, tde pages {}",
        path.display(),
        report.pages,
        report.page_size,
        report.first_pageid,
        report.end_lsa,
        report.tde_pages
    );
    for r in &report.records {
        println!(
            "{:>14} {:<22} trid={:<4} prev_tran={:<12} undo={}{} redo={}{} -> {}",
            r.lsa,
            r.kind,
            r.trid,
            r.prev_tranlsa,
            r.undo_len,
            if r.undo_zipped { "z" } else { "" },
            r.redo_len,
            if r.redo_zipped { "z" } else { "" },
            r.forw_lsa
        );
    }
    println!("{} records", report.records.len());
    Ok(())
}
