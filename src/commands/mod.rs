pub mod apply;
pub mod types;
