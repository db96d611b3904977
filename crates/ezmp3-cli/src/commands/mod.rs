pub mod config;
pub mod convert;
pub mod doctor;
pub mod extract;
