pub mod progress_bars;
pub mod prompts;

pub use progress_bars::*;
pub use prompts::*;
