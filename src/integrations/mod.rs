pub mod cloud_interface;
pub mod providers;
