pub mod cli;
pub mod config;
pub mod detect;
pub mod driver;
pub mod extract;
pub mod progress;
pub mod report;
pub mod runner;
pub mod server;
pub mod util;
