pub mod context;
pub mod http;
pub mod job_store;
pub mod model;
pub mod queue;
pub mod runner;
pub mod trigger;
