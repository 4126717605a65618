mod generate;

pub use generate::*;
