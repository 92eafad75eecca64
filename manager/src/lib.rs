//! Bot manager library
//!
//! Registers git-backed bots and deploys them as containers on this host.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod registry;
pub mod server;
pub mod storage;
pub mod store;
pub mod utils;
