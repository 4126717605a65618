mod create;
mod delete;
mod delete_all;

pub use create::create;
pub use delete::delete;
pub use delete_all::delete_all;
