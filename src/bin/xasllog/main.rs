use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

mod cli;
mod cmd_bench;
mod cmd_dump;
mod cmd_flatten;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт - info.
    // Пример: RUST_LOG=debug xasllog bench-append --records 1000 --payload 300
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        error!("{:?}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::FlattenDemo { json } => cmd_flatten::exec(json),

        cli::Cmd::BenchAppend {
            records,
            payload,
            mode,
            threads,
            path,
            json,
        } => cmd_bench::exec(records, payload, mode.into(), threads, path, json),

        cli::Cmd::DumpLog { path, json } => cmd_dump::exec(path, json),
    }
}
