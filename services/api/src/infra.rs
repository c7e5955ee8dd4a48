use chrono::{DateTime, Utc};
use leadgen::config::RoutingConfig;
use leadgen::error::AppError;
use leadgen::workflows::leads::{Lead, LeadActivity, LeadId, LeadRepository, RepositoryError};
use leadgen::workflows::routing::{RoutingTable, RoutingTableImporter};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

const SEED_STUDENTS: &[u8] = include_bytes!("../../../crates/leadgen/data/students.csv");
const SEED_RULES: &[u8] = include_bytes!("../../../crates/leadgen/data/rules.csv");

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryLeadRepository {
    leads: Arc<Mutex<HashMap<LeadId, Lead>>>,
    activities: Arc<Mutex<Vec<LeadActivity>>>,
}

impl LeadRepository for InMemoryLeadRepository {
    fn insert(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        let mut guard = self.leads.lock().expect("lead mutex poisoned");
        if guard.contains_key(&lead.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(lead.id.clone(), lead.clone());
        Ok(lead)
    }

    fn fetch(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let guard = self.leads.lock().expect("lead mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn count_from_ip_since(&self, ip: &str, since: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let guard = self.leads.lock().expect("lead mutex poisoned");
        Ok(guard
            .values()
            .filter(|lead| lead.consent_ip == ip && lead.created_at >= since)
            .count())
    }

    fn record_activity(&self, activity: LeadActivity) -> Result<(), RepositoryError> {
        let mut guard = self.activities.lock().expect("activity mutex poisoned");
        guard.push(activity);
        Ok(())
    }

    fn activities(&self, id: &LeadId) -> Result<Vec<LeadActivity>, RepositoryError> {
        let guard = self.activities.lock().expect("activity mutex poisoned");
        Ok(guard
            .iter()
            .filter(|activity| &activity.lead_id == id)
            .cloned()
            .collect())
    }
}

/// Sample students and rules bundled with the library crate.
pub(crate) fn seed_routing_table() -> Result<RoutingTable, AppError> {
    Ok(RoutingTableImporter::from_readers(SEED_STUDENTS, SEED_RULES)?)
}

/// Configured CSV exports when present, otherwise the bundled seed data.
pub(crate) fn load_routing_table(config: &RoutingConfig) -> Result<RoutingTable, AppError> {
    match (&config.students_csv, &config.rules_csv) {
        (Some(students), Some(rules)) => routing_table_from_paths(students, rules),
        _ => seed_routing_table(),
    }
}

pub(crate) fn routing_table_from_paths(
    students: &Path,
    rules: &Path,
) -> Result<RoutingTable, AppError> {
    let table = RoutingTableImporter::from_paths(students, rules)?;
    info!(
        students = table.students.len(),
        rules = table.rules.len(),
        path = %rules.display(),
        "routing table imported"
    );
    Ok(table)
}
