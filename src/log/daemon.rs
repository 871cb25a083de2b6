//! Flush-демон: фоновый поток, который сливает prior list в лог-страницы.
//!
//! Просыпается по сигналу backpressure (condvar) или по таймеру
//! `flush_daemon_interval_ms`. Останавливается при Drop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info};

use super::append::LogAppender;

pub struct FlushDaemon {
    appender: Arc<LogAppender>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FlushDaemon {
    pub fn start(appender: Arc<LogAppender>) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let interval = Duration::from_millis(appender.config().flush_daemon_interval_ms.max(1));

        let app = appender.clone();
        let stop_flag = stop.clone();
        let handle = thread::Builder::new()
            .name("log-flush".into())
            .spawn(move || {
                info!("log flush daemon started (interval {:?})", interval);
                while !stop_flag.load(Ordering::Relaxed) {
                    let signalled = app.wait_flush_request(interval);
                    match app.drain() {
                        Ok(n) if n > 0 => debug!(
                            "flush daemon drained {} records ({})",
                            n,
                            if signalled { "signal" } else { "timer" }
                        ),
                        Ok(_) => {}
                        Err(e) => error!("flush daemon drain failed: {}", e),
                    }
                }
                // остаток списка при остановке
                if let Err(e) = app.drain() {
                    error!("flush daemon final drain failed: {}", e);
                }
                info!("log flush daemon stopped");
            })
            .context("spawn log flush daemon")?;

        Ok(Self {
            appender,
            stop,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        if let Some(h) = self.handle.take() {
            self.stop.store(true, Ordering::Relaxed);
            self.appender.wakeup_flush_daemon();
            let _ = h.join();
        }
    }
}

impl Drop for FlushDaemon {
    fn drop(&mut self) {
        self.stop();
    }
}
