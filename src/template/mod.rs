mod builder;
mod userdata;

pub use builder::*;
pub use userdata::*;
