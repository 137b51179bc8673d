//! Fetcher subprocess management and output parsing for mediagrab.
//!
//! This crate owns everything that touches the external media fetcher:
//!
//! - [`fetcher_args`] / [`relaxed_fetcher_args`] - Deterministic argument
//!   construction from a request
//! - [`locate_fetcher`] - Binary discovery
//! - [`spawn_fetcher`] - The process runner: streamed output plus a
//!   [`KillSwitch`]
//! - [`parse_progress`] / [`classify_failure`] - Pure parsers for the
//!   tool's unstructured text output

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/mediagrab/mediagrab/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod args;
mod locate;
mod progress;
mod runner;

pub use args::{RELAXED_FLAGS, fetcher_args, relaxed_fetcher_args};
pub use locate::{FETCHER_PROGRAM, locate_fetcher};
pub use progress::{ProgressUpdate, classify_failure, parse_progress};
pub use runner::{
    FetcherEvent, FetcherHandle, KillSwitch, OutputChannel, SpawnError, spawn_fetcher,
};
