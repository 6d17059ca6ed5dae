mod app;
pub mod eval_bar;

pub use app::run_app;
