pub mod app;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod eval;
pub mod input;
pub mod runtime;

pub use app::run;
pub use env::CliArgs;
