// src/handlers/mod.rs

pub mod analytics;
pub mod maintenance;
pub mod report;
pub mod settings;
pub mod templates;
