pub mod window;

pub use window::{resolve_window, AnalysisWindow, MAX_WINDOW_DAYS};
