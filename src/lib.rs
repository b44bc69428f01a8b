#![forbid(unsafe_code)]

pub mod app;
pub mod audit;
pub mod cli;
pub mod config;
pub mod logging;
pub mod model;
pub mod payload_api;
pub mod relation;
pub mod report;
pub mod run;
pub mod store;
pub mod suggest;
pub mod task;
