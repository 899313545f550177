// src/models/mod.rs

pub mod analytics;
pub mod normalize;
pub mod request;
pub mod result;
pub mod settings;
pub mod student;
pub mod test;
