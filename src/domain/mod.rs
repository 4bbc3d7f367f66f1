pub mod models;
pub mod ordering;
