//! Environment sources.
//!
//! # Data Flow
//! ```text
//! process environment ──▶ MapEnv::from_process() ──┐
//!                                                  ├─▶ config::loader ──▶ ClientConfig
//! `git config -l -z`  ──▶ git::load_git_env()   ───┘
//! ```
//!
//! # Design Decisions
//! - The two sources stay separate; precedence is decided per setting by the loader
//! - Lookups never fail; typed accessors fall back to the caller's default

pub mod git;
pub mod source;

pub use git::load_git_env;
pub use source::{Env, MapEnv};
