mod batch;
mod descriptor;
mod outcome;
mod scheduler;
mod settings;
mod sweeper;
mod worker;

#[cfg(test)]
pub(crate) mod mock;

pub use batch::*;
pub use descriptor::*;
pub use outcome::*;
pub use scheduler::*;
pub use settings::*;
pub use sweeper::*;
pub use worker::*;
