// src/services/mod.rs

pub mod analysis;
pub mod report;

pub use analysis::{AnalysisDefaults, AnalysisService};
pub use report::{DocumentRenderer, DocxRenderer, PlaceholderRenderer, ReportService};
