pub mod app;
pub mod io;
pub mod telemetry;

pub use app::run as run_app;
