mod cleaner;

pub use cleaner::{run_sweep, start_session_sweeper};
