//! Centralized configuration and builder for XaslLog.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - XaslLogConfig::from_env() reads XL_* variables; unknown/garbage values keep defaults.
//! - Builder returns a validated XaslLogConfig, which the log engine and flatten driver consume.
//!
//! Engines never read the environment themselves: only from_env()/Builder do.
//!
//! Defaults:
//! - log_page_size = 16 KiB (log area = page size - 16-byte page header)
//! - log_buffer_pages = 256 (backpressure budget = pages * page size)
//! - log_compress = true, log_zip_min_size = 255, zip_codec = zstd
//! - append_mode = standalone (synchronous drain on overflow)

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};

use crate::consts::{
    LOG_DEFAULT_PAGE_SIZE, LOG_PAGE_SIZE_MAX, LOG_PAGE_SIZE_MIN, LOG_ZIP_MIN_SIZE_DEFAULT,
};

/// Алгоритм сжатия undo/redo.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ZipCodec {
    #[default]
    Zstd,
    Gzip,
}

impl FromStr for ZipCodec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zstd" => Ok(ZipCodec::Zstd),
            "gzip" | "deflate" => Ok(ZipCodec::Gzip),
            other => Err(anyhow!("unknown zip codec '{}'", other)),
        }
    }
}

impl fmt::Display for ZipCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ZipCodec::Zstd => "zstd",
            ZipCodec::Gzip => "gzip",
        })
    }
}

/// Как разгружается переполненный prior list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AppendMode {
    /// Будим flush-демон и коротко спим.
    Server,
    /// Синхронный дренаж в вызывающем потоке (однопоточный режим, recovery).
    #[default]
    Standalone,
}

impl FromStr for AppendMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server" => Ok(AppendMode::Server),
            "standalone" | "sa" => Ok(AppendMode::Standalone),
            other => Err(anyhow!("unknown append mode '{}'", other)),
        }
    }
}

impl fmt::Display for AppendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AppendMode::Server => "server",
            AppendMode::Standalone => "standalone",
        })
    }
}

/// Top-level configuration for XaslLog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XaslLogConfig {
    /// Log page size in bytes (power of two, 512..=32768: offsets in an LSA are i16).
    /// Env: XL_LOG_PAGE_SIZE (default 16384)
    pub log_page_size: usize,

    /// In-memory log buffer size in pages; prior list over this budget triggers a drain.
    /// Env: XL_LOG_BUFFER_PAGES (default 256)
    pub log_buffer_pages: usize,

    /// Compress undo/redo payloads.
    /// Env: XL_LOG_COMPRESS (default true; "1|true|on|yes" => true)
    pub log_compress: bool,

    /// Payloads shorter than this are never compressed.
    /// Env: XL_LOG_ZIP_MIN_SIZE (default 255)
    pub log_zip_min_size: usize,

    /// Env: XL_ZIP_CODEC = zstd|gzip (default zstd)
    pub zip_codec: ZipCodec,

    /// Env: XL_APPEND_MODE = server|standalone (default standalone)
    pub append_mode: AppendMode,

    /// Flush daemon timer period.
    /// Env: XL_FLUSH_INTERVAL_MS (default 10)
    pub flush_daemon_interval_ms: u64,

    /// Log pages per vacuum block (MVCC bookkeeping granularity).
    /// Env: XL_VACUUM_LOG_BLOCK_PAGES (default 31)
    pub vacuum_log_block_pages: u64,

    /// Initial XASL arena capacity (0 = start empty, grow by policy).
    /// Env: XL_XASL_STREAM_INITIAL (default 0)
    pub xasl_stream_initial: usize,
}

impl Default for XaslLogConfig {
    fn default() -> Self {
        Self {
            log_page_size: LOG_DEFAULT_PAGE_SIZE,
            log_buffer_pages: 256,
            log_compress: true,
            log_zip_min_size: LOG_ZIP_MIN_SIZE_DEFAULT,
            zip_codec: ZipCodec::Zstd,
            append_mode: AppendMode::Standalone,
            flush_daemon_interval_ms: 10,
            vacuum_log_block_pages: 31,
            xasl_stream_initial: 0,
        }
    }
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| {
        let s = v.trim().to_ascii_lowercase();
        s == "1" || s == "true" || s == "on" || s == "yes"
    })
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl XaslLogConfig {
    /// Load configuration from XL_* environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(n) = env_parse::<usize>("XL_LOG_PAGE_SIZE") {
            cfg.log_page_size = n;
        }
        if let Some(n) = env_parse::<usize>("XL_LOG_BUFFER_PAGES") {
            cfg.log_buffer_pages = n;
        }
        if let Some(on) = env_bool("XL_LOG_COMPRESS") {
            cfg.log_compress = on;
        }
        if let Some(n) = env_parse::<usize>("XL_LOG_ZIP_MIN_SIZE") {
            cfg.log_zip_min_size = n;
        }
        if let Some(c) = env_parse::<ZipCodec>("XL_ZIP_CODEC") {
            cfg.zip_codec = c;
        }
        if let Some(m) = env_parse::<AppendMode>("XL_APPEND_MODE") {
            cfg.append_mode = m;
        }
        if let Some(ms) = env_parse::<u64>("XL_FLUSH_INTERVAL_MS") {
            cfg.flush_daemon_interval_ms = ms;
        }
        if let Some(n) = env_parse::<u64>("XL_VACUUM_LOG_BLOCK_PAGES") {
            cfg.vacuum_log_block_pages = n;
        }
        if let Some(n) = env_parse::<usize>("XL_XASL_STREAM_INITIAL") {
            cfg.xasl_stream_initial = n;
        }

        cfg
    }

    /// Fluent setters (builder-style) to override specific fields.

    pub fn with_log_page_size(mut self, ps: usize) -> Self {
        self.log_page_size = ps;
        self
    }

    pub fn with_log_buffer_pages(mut self, pages: usize) -> Self {
        self.log_buffer_pages = pages;
        self
    }

    pub fn with_log_compress(mut self, on: bool) -> Self {
        self.log_compress = on;
        self
    }

    pub fn with_log_zip_min_size(mut self, n: usize) -> Self {
        self.log_zip_min_size = n;
        self
    }

    pub fn with_zip_codec(mut self, c: ZipCodec) -> Self {
        self.zip_codec = c;
        self
    }

    pub fn with_append_mode(mut self, m: AppendMode) -> Self {
        self.append_mode = m;
        self
    }

    pub fn with_flush_daemon_interval_ms(mut self, ms: u64) -> Self {
        self.flush_daemon_interval_ms = ms;
        self
    }

    pub fn with_vacuum_log_block_pages(mut self, n: u64) -> Self {
        self.vacuum_log_block_pages = n;
        self
    }

    pub fn with_xasl_stream_initial(mut self, n: usize) -> Self {
        self.xasl_stream_initial = n;
        self
    }

    /// Backpressure budget in bytes.
    pub fn log_buffer_bytes(&self) -> usize {
        self.log_buffer_pages * self.log_page_size
    }

    pub fn validate(&self) -> Result<()> {
        let ps = self.log_page_size;
        if !ps.is_power_of_two() || !(LOG_PAGE_SIZE_MIN..=LOG_PAGE_SIZE_MAX).contains(&ps) {
            bail!("log_page_size must be a power of two in 512..=32768, got {}", ps);
        }
        if self.log_buffer_pages == 0 {
            bail!("log_buffer_pages must be >= 1");
        }
        if self.vacuum_log_block_pages == 0 {
            bail!("vacuum_log_block_pages must be >= 1");
        }
        Ok(())
    }
}

impl fmt::Display for XaslLogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "XaslLogConfig {{ \
             log_page_size: {}, \
             log_buffer_pages: {}, \
             log_compress: {}, \
             log_zip_min_size: {}, \
             zip_codec: {}, \
             append_mode: {}, \
             flush_daemon_interval_ms: {}, \
             vacuum_log_block_pages: {}, \
             xasl_stream_initial: {} \
             }}",
            self.log_page_size,
            self.log_buffer_pages,
            self.log_compress,
            self.log_zip_min_size,
            self.zip_codec,
            self.append_mode,
            self.flush_daemon_interval_ms,
            self.vacuum_log_block_pages,
            if self.xasl_stream_initial == 0 {
                "grow".to_string()
            } else {
                self.xasl_stream_initial.to_string()
            },
        )
    }
}

/// Builder that produces a validated XaslLogConfig.
#[derive(Clone, Debug)]
pub struct Builder {
    cfg: XaslLogConfig,
}

impl Default for Builder {
    fn default() -> Self {
        // Start from env, then allow overrides.
        Self {
            cfg: XaslLogConfig::from_env(),
        }
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a clean default (without reading env).
    pub fn from_default() -> Self {
        Self {
            cfg: XaslLogConfig::default(),
        }
    }

    pub fn log_page_size(mut self, ps: usize) -> Self {
        self.cfg.log_page_size = ps;
        self
    }

    pub fn log_buffer_pages(mut self, pages: usize) -> Self {
        self.cfg.log_buffer_pages = pages;
        self
    }

    pub fn log_compress(mut self, on: bool) -> Self {
        self.cfg.log_compress = on;
        self
    }

    pub fn log_zip_min_size(mut self, n: usize) -> Self {
        self.cfg.log_zip_min_size = n;
        self
    }

    pub fn zip_codec(mut self, c: ZipCodec) -> Self {
        self.cfg.zip_codec = c;
        self
    }

    pub fn append_mode(mut self, m: AppendMode) -> Self {
        self.cfg.append_mode = m;
        self
    }

    pub fn flush_daemon_interval_ms(mut self, ms: u64) -> Self {
        self.cfg.flush_daemon_interval_ms = ms;
        self
    }

    pub fn vacuum_log_block_pages(mut self, n: u64) -> Self {
        self.cfg.vacuum_log_block_pages = n;
        self
    }

    pub fn xasl_stream_initial(mut self, n: usize) -> Self {
        self.cfg.xasl_stream_initial = n;
        self
    }

    /// Finish the builder and obtain a validated configuration.
    pub fn build(self) -> Result<XaslLogConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = XaslLogConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.log_buffer_bytes(), 256 * 16384);
    }

    #[test]
    fn codec_and_mode_parse() {
        assert_eq!("ZSTD".parse::<ZipCodec>().unwrap(), ZipCodec::Zstd);
        assert_eq!(" gzip ".parse::<ZipCodec>().unwrap(), ZipCodec::Gzip);
        assert!("lz4".parse::<ZipCodec>().is_err());
        assert_eq!("server".parse::<AppendMode>().unwrap(), AppendMode::Server);
    }
}
