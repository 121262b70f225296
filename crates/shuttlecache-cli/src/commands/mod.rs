pub mod admin;
pub mod driver;
