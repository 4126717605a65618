mod compute;
mod identity;
mod interface;
mod network;
mod orchestration;

pub use compute::*;
pub use identity::*;
pub use interface::*;
pub use network::*;
pub use orchestration::*;
