use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use XaslLog::AppendMode;

/// XaslLog CLI: XASL flatten demo, prior-log append bench, log volume dump.
#[derive(Parser, Debug)]
#[command(name = "xasllog", version, about = "XaslLog CLI", arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ModeArg {
    Server,
    Standalone,
}

impl From<ModeArg> for AppendMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Server => AppendMode::Server,
            ModeArg::Standalone => AppendMode::Standalone,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Flatten a sample plan with shared sub-trees and print the stream framing
    FlattenDemo {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Append N records through the prior list and report LSA range + metrics
    BenchAppend {
        #[arg(long, default_value_t = 10_000)]
        records: usize,
        /// undo/redo payload size in bytes
        #[arg(long, default_value_t = 256)]
        payload: usize,
        #[arg(long, value_enum, default_value_t = ModeArg::Standalone)]
        mode: ModeArg,
        /// Appending threads (each is its own transaction)
        #[arg(long, default_value_t = 1)]
        threads: usize,
        /// Flush the resulting log pages into a volume under this directory
        #[arg(long)]
        path: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Walk records of a flushed log volume via forw_lsa
    DumpLog {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}
