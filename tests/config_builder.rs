use anyhow::Result;

use XaslLog::config::Builder;
use XaslLog::{AppendMode, LogAppender, XaslLogConfig, ZipCodec};

#[test]
fn builder_rejects_bad_page_sizes() {
    for ps in [0usize, 256, 1000, 65536, 3 * 4096] {
        let r = Builder::from_default().log_page_size(ps).build();
        assert!(r.is_err(), "page size {} must be rejected", ps);
    }
    for ps in [512usize, 4096, 16384, 32768] {
        let cfg = Builder::from_default().log_page_size(ps).build().unwrap();
        assert_eq!(cfg.log_page_size, ps);
    }
}

#[test]
fn builder_rejects_zero_budgets() {
    assert!(Builder::from_default().log_buffer_pages(0).build().is_err());
    assert!(Builder::from_default().vacuum_log_block_pages(0).build().is_err());
}

#[test]
fn builder_overrides_reach_appender() -> Result<()> {
    let cfg = Builder::from_default()
        .log_page_size(1024)
        .log_buffer_pages(4)
        .log_compress(false)
        .log_zip_min_size(1000)
        .zip_codec(ZipCodec::Gzip)
        .append_mode(AppendMode::Server)
        .flush_daemon_interval_ms(3)
        .vacuum_log_block_pages(2)
        .xasl_stream_initial(4096)
        .build()?;
    assert_eq!(cfg.log_buffer_bytes(), 4096);

    let app = LogAppender::new(cfg.clone());
    assert_eq!(app.config(), &cfg);
    assert_eq!(app.lock().prior_lsa().pageid, 0);
    Ok(())
}

#[test]
fn with_setters_match_builder() -> Result<()> {
    let a = XaslLogConfig::default()
        .with_log_page_size(2048)
        .with_zip_codec(ZipCodec::Gzip)
        .with_append_mode(AppendMode::Server)
        .with_xasl_stream_initial(8192);
    let b = Builder::from_default()
        .log_page_size(2048)
        .zip_codec(ZipCodec::Gzip)
        .append_mode(AppendMode::Server)
        .xasl_stream_initial(8192)
        .build()?;
    assert_eq!(a, b);
    a.validate()?;
    Ok(())
}

#[test]
fn display_lists_every_field() {
    let s = XaslLogConfig::default().to_string();
    for key in [
        "log_page_size: 16384",
        "log_buffer_pages: 256",
        "log_compress: true",
        "log_zip_min_size: 255",
        "zip_codec: zstd",
        "append_mode: standalone",
        "flush_daemon_interval_ms",
        "vacuum_log_block_pages: 31",
        "xasl_stream_initial: grow",
    ] {
        assert!(s.contains(key), "{} missing in {}", key, s);
    }
}

// Единственный тест, трогающий XL_* переменные.
#[test]
fn from_env_reads_overrides_and_ignores_garbage() {
    std::env::set_var("XL_LOG_PAGE_SIZE", "4096");
    std::env::set_var("XL_LOG_COMPRESS", "off");
    std::env::set_var("XL_ZIP_CODEC", "gzip");
    std::env::set_var("XL_APPEND_MODE", "server");
    std::env::set_var("XL_LOG_BUFFER_PAGES", "many");

    let cfg = XaslLogConfig::from_env();

    for k in [
        "XL_LOG_PAGE_SIZE",
        "XL_LOG_COMPRESS",
        "XL_ZIP_CODEC",
        "XL_APPEND_MODE",
        "XL_LOG_BUFFER_PAGES",
    ] {
        std::env::remove_var(k);
    }

    assert_eq!(cfg.log_page_size, 4096);
    assert!(!cfg.log_compress);
    assert_eq!(cfg.zip_codec, ZipCodec::Gzip);
    assert_eq!(cfg.append_mode, AppendMode::Server);
    // нечисловое значение игнорируется
    assert_eq!(cfg.log_buffer_pages, 256);
}
