pub mod api;
pub mod clock;
pub mod config;
pub mod context;
pub mod db;
pub mod jobs;
pub mod logging;
