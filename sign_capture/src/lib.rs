mod throttle;

pub mod app;
pub mod camera;
pub mod config;
pub mod cv_utils;
pub mod prediction;
pub mod preview;
pub mod session;
pub mod state;
pub mod telemetry;
pub mod ui;
pub mod worker;

pub use app::start_app;
