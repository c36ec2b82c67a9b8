//! Shared utilities. `hex` backs the `sddsinfo dump` subcommand; other
//! helpers the teacher carried here (search-path file resolution, audit
//! logging, MySQL/Prometheus exporters) have no counterpart in this crate
//! and were dropped in the final trim (see DESIGN.md).

pub mod hex;
