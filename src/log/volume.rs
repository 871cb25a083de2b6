//! Лог-том на диске: `<dir>/log_active`.
//!
//! Формат:
//!   [magic 8][page_size u32][npages u32][first_pageid i64][end_lsa 8]
//!   затем npages страниц по page_size байт: [page header 16][area].
//!
//! Запись: tmp + rename под эксклюзивной блокировкой каталога; checksum
//! каждой страницы - crc32c. Чтение проверяет magic и checksums.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::info;

use super::lsa::LogLsa;
use super::page::{LogPage, LogPageBuffer, LogPageHeader};
use crate::consts::{
    LOG_HDRPAGE_SIZE, LOG_PAGE_SIZE_MAX, LOG_PAGE_SIZE_MIN, LOG_VOLUME_FILE, LOG_VOLUME_HDR_SIZE,
    LOG_VOLUME_MAGIC, OR_LSA_SIZE,
};
use crate::lock::VolumeLock;
use crate::metrics::record_volume_flush;

pub struct LogVolume;

impl LogVolume {
    pub fn path(dir: &Path) -> PathBuf {
        dir.join(LOG_VOLUME_FILE)
    }

    /// Записать все страницы буфера. Возвращает путь тома.
    pub fn flush(dir: &Path, buf: &LogPageBuffer) -> Result<PathBuf> {
        fs::create_dir_all(dir).with_context(|| format!("create log dir {}", dir.display()))?;
        let _lock = VolumeLock::writer(dir)?;

        let path = Self::path(dir);
        let tmp_path = dir.join(format!("{}.tmp", LOG_VOLUME_FILE));
        let f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .with_context(|| format!("open log volume tmp {}", tmp_path.display()))?;
        let mut w = BufWriter::new(f);

        w.write_all(LOG_VOLUME_MAGIC)?;
        w.write_u32::<BigEndian>(buf.page_size() as u32)?;
        w.write_u32::<BigEndian>(buf.num_pages() as u32)?;
        w.write_i64::<BigEndian>(buf.first_pageid())?;
        let mut lsa = [0u8; OR_LSA_SIZE];
        buf.end_lsa().encode(&mut lsa);
        w.write_all(&lsa)?;

        for page in buf.pages() {
            let mut hdr = page.hdr;
            hdr.checksum = page.compute_checksum();
            w.write_all(&hdr.encode())?;
            w.write_all(&page.area)?;
        }

        let f = w
            .into_inner()
            .map_err(|e| anyhow!("flush log volume {}: {}", tmp_path.display(), e))?;
        f.sync_all()?;
        drop(f);

        fs::rename(&tmp_path, &path).with_context(|| {
            format!("rename {} -> {}", tmp_path.display(), path.display())
        })?;
        let _ = fsync_dir(dir);

        record_volume_flush();
        info!(
            "log volume {}: {} pages, end {}",
            path.display(),
            buf.num_pages(),
            buf.end_lsa()
        );
        Ok(path)
    }

    /// Прочитать том и проверить checksums.
    ///
    /// Заголовку не доверяем: размер страницы, число страниц и end_lsa
    /// сверяются с допустимыми значениями и длиной файла до аллокаций.
    pub fn open(dir: &Path) -> Result<LogPageBuffer> {
        let _lock = VolumeLock::reader(dir)?;
        let path = Self::path(dir);
        let f = File::open(&path).with_context(|| format!("open log volume {}", path.display()))?;
        let file_len = f.metadata()?.len();
        let mut r = BufReader::new(f);

        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != LOG_VOLUME_MAGIC {
            bail!("{}: bad log volume magic", path.display());
        }
        let page_size = r.read_u32::<BigEndian>()? as usize;
        if !page_size.is_power_of_two()
            || !(LOG_PAGE_SIZE_MIN..=LOG_PAGE_SIZE_MAX).contains(&page_size)
        {
            bail!("{}: bad page size {}", path.display(), page_size);
        }
        let npages = r.read_u32::<BigEndian>()? as usize;
        let expected_len = (npages as u64)
            .checked_mul(page_size as u64)
            .and_then(|n| n.checked_add(LOG_VOLUME_HDR_SIZE as u64));
        if expected_len != Some(file_len) {
            bail!(
                "{}: header claims {} pages of {} bytes, file has {} bytes",
                path.display(),
                npages,
                page_size,
                file_len
            );
        }
        let first_pageid = r.read_i64::<BigEndian>()?;
        let mut lsa = [0u8; OR_LSA_SIZE];
        r.read_exact(&mut lsa)?;
        let end_lsa = LogLsa::decode(&lsa);

        let area_size = page_size - LOG_HDRPAGE_SIZE;
        // end_lsa - внутри прочитанных страниц или в начале следующей
        let end_page_ok = first_pageid
            .checked_add(npages as i64)
            .is_some_and(|last| (first_pageid..=last).contains(&end_lsa.pageid));
        if end_lsa.is_null()
            || !end_page_ok
            || end_lsa.offset < 0
            || end_lsa.offset as usize >= area_size
        {
            bail!(
                "{}: end lsa {} outside {} pages from {}",
                path.display(),
                end_lsa,
                npages,
                first_pageid
            );
        }

        let mut pages = Vec::with_capacity(npages);
        let mut hb = [0u8; LOG_HDRPAGE_SIZE];
        for i in 0..npages {
            r.read_exact(&mut hb)
                .with_context(|| format!("{}: truncated at page {}", path.display(), i))?;
            let hdr = LogPageHeader::decode(&hb);
            let mut area = vec![0u8; area_size];
            r.read_exact(&mut area)
                .with_context(|| format!("{}: truncated at page {}", path.display(), i))?;
            let page = LogPage { hdr, area };
            let expected = first_pageid + i as i64;
            if hdr.logical_pageid != expected {
                bail!(
                    "{}: page {} has logical id {}, expected {}",
                    path.display(),
                    i,
                    hdr.logical_pageid,
                    expected
                );
            }
            let crc = page.compute_checksum();
            if crc != hdr.checksum {
                bail!(
                    "{}: checksum mismatch on page {} (stored {:#010x}, computed {:#010x})",
                    path.display(),
                    expected,
                    hdr.checksum,
                    crc
                );
            }
            pages.push(page);
        }
        Ok(LogPageBuffer::from_pages(page_size, first_pageid, pages, end_lsa))
    }
}

#[cfg(unix)]
fn fsync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn fsync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
