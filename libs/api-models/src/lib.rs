//! Request and response shapes shared by the bot manager HTTP API.

pub mod models;
