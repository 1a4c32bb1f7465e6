pub mod api;
pub mod config;
pub mod error;
pub mod node;
pub mod puzzle;
pub mod scheduler;
pub mod shutdown;
pub mod solver;
pub mod worker;
