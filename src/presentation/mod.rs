pub mod sections;
pub mod views;
