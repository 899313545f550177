// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    services::{AnalysisService, ReportService},
    store::{RecordsStore, SettingsStore, TemplateStore},
};

/// Shared handles, constructed once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub analysis: Arc<AnalysisService>,
    pub reports: Arc<ReportService>,
    pub templates: Arc<dyn TemplateStore>,
    pub records: Arc<dyn RecordsStore>,
    pub settings: Arc<dyn SettingsStore>,
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<AnalysisService> {
    fn from_ref(state: &AppState) -> Self {
        state.analysis.clone()
    }
}

impl FromRef<AppState> for Arc<ReportService> {
    fn from_ref(state: &AppState) -> Self {
        state.reports.clone()
    }
}

impl FromRef<AppState> for Arc<dyn TemplateStore> {
    fn from_ref(state: &AppState) -> Self {
        state.templates.clone()
    }
}

impl FromRef<AppState> for Arc<dyn RecordsStore> {
    fn from_ref(state: &AppState) -> Self {
        state.records.clone()
    }
}

impl FromRef<AppState> for Arc<dyn SettingsStore> {
    fn from_ref(state: &AppState) -> Self {
        state.settings.clone()
    }
}
