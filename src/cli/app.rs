use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "sddsinfo")]
#[command(about = "Inspect and diagnose self-describing tabular scientific data files")]
#[command(version)]
pub struct Cli {
    /// Control colored output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Write output to a file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Clone, Copy, ValueEnum, Debug)]
pub enum StatisticArg {
    None,
    Mean,
    Median,
    Min,
    Max,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the layout (schema) and per-page row counts of a file
    Inspect {
        /// Path to a file (.sdds, .sdds.gz, .sdds.xz)
        #[arg(short, long)]
        file: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Hex dump of raw page bytes
    Dump {
        /// Path to a file
        #[arg(short, long)]
        file: String,

        /// Absolute byte offset to start dumping (default 0)
        #[arg(long)]
        offset: Option<u64>,

        /// Number of bytes to dump (default 256)
        #[arg(short, long)]
        length: Option<usize>,
    },

    /// Read one page and print parameter/array/row contents, with
    /// optional sparsing and statistics
    Pages {
        /// Path to a file
        #[arg(short, long)]
        file: String,

        /// Page number to read (1-indexed; default: all pages)
        #[arg(short, long)]
        page: Option<u64>,

        /// Sparse interval: keep every Nth row (default 1)
        #[arg(long, default_value = "1")]
        sparse_interval: usize,

        /// Sparse offset: skip this many rows before sparsing (default 0)
        #[arg(long, default_value = "0")]
        sparse_offset: usize,

        /// Only read the last N rows
        #[arg(long, default_value = "0")]
        last_rows: usize,

        /// Aggregate statistic over each sparse window
        #[arg(long, value_enum, default_value = "none")]
        statistic: StatisticArg,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Validate a file's structure: header parses, every page's row
    /// count and byte layout are self-consistent
    Validate {
        /// Path to a file
        #[arg(short, long)]
        file: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}
