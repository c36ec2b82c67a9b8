#[cfg(not(feature = "cli"))]
compile_error!("The `sddsinfo` binary requires the `cli` feature. Build with `--features cli`.");

use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::process;

use sdds::cli;
use sdds::cli::app::{Cli, ColorMode, Commands};
use sdds::SddsError;

fn main() {
    let cli = Cli::parse();

    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {} // colored auto-detects tty
    }

    let writer_result: Result<Box<dyn Write>, SddsError> = match &cli.output {
        Some(path) => File::create(path)
            .map(|f| Box::new(f) as Box<dyn Write>)
            .map_err(|e| SddsError::Io(format!("cannot create {path}: {e}"))),
        None => Ok(Box::new(std::io::stdout()) as Box<dyn Write>),
    };

    let mut writer = match writer_result {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Inspect { file, json } => {
            cli::inspect::execute(&cli::inspect::InspectOptions { file, json }, &mut writer)
        }

        Commands::Dump { file, offset, length } => {
            cli::dump::execute(&cli::dump::DumpOptions { file, offset, length }, &mut writer)
        }

        Commands::Pages {
            file,
            page,
            sparse_interval,
            sparse_offset,
            last_rows,
            statistic,
            json,
        } => cli::pages::execute(
            &cli::pages::PagesOptions {
                file,
                page,
                sparse_interval,
                sparse_offset,
                last_rows,
                statistic,
                json,
            },
            &mut writer,
        ),

        Commands::Validate { file, json } => {
            cli::validate::execute(&cli::validate::ValidateOptions { file, json }, &mut writer)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
