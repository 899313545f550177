// src/utils/mod.rs

pub mod api_key;
pub mod filename;
pub mod timestamp;
