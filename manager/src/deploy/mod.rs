//! Deployment engine

pub mod bulk;
pub mod compose;
pub mod docker;
pub mod fsm;
pub mod locks;
pub mod orchestrator;
pub mod runner;
pub mod step;
pub mod strategy;
pub mod workspace;
