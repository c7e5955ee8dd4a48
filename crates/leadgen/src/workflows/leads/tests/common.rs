use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::IntakeConfig;
use crate::workflows::leads::domain::{Lead, LeadActivity, LeadId, LeadSubmission};
use crate::workflows::leads::repository::{LeadRepository, RepositoryError};
use crate::workflows::leads::service::LeadIntakeService;
use crate::workflows::routing::{
    InMemoryRuleStore, RoutingEngine, RoutingPolicy, RoutingRule, RoutingRuleTarget,
    RoutingStrategy, RoutingTable, RuleId, RuleType, Student, StudentId,
};

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 10, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn submission() -> LeadSubmission {
    LeadSubmission {
        full_name: "Priya Shah".to_string(),
        phone: "07700 900123".to_string(),
        email: Some("priya@example.co.uk".to_string()),
        address_line1: "12 Colmore Row".to_string(),
        address_line2: Some(String::new()),
        town_city: "Birmingham".to_string(),
        postcode: "b1 1aa".to_string(),
        approx_value: "250000".to_string(),
        reason_for_sale: "Relocating".to_string(),
        timeline: "ASAP".to_string(),
        consent_marketing: true,
        utm_source: Some("google".to_string()),
        referrer_url: Some("https://averyfastsale.com/sell".to_string()),
        ..LeadSubmission::default()
    }
}

fn student(slug: &str, id: &str) -> Student {
    Student {
        id: StudentId(id.to_string()),
        slug: slug.to_string(),
        display_name: slug.replace('-', " "),
        phone: "07700900001".to_string(),
        email: None,
        bio: None,
        is_active: true,
        is_at_capacity: false,
    }
}

/// `B1 -> john`; `jane` has no rules and only takes direct captures.
pub(super) fn routing_table() -> RoutingTable {
    RoutingTable {
        students: vec![
            student("john-smith", "student-1"),
            student("jane-doe", "student-2"),
        ],
        rules: vec![RoutingRule::new(
            "rule-1",
            RuleType::PostcodePrefix,
            "B1",
            RoutingStrategy::Priority,
        )],
        targets: vec![RoutingRuleTarget {
            rule_id: RuleId("rule-1".to_string()),
            student_id: StudentId("student-1".to_string()),
            priority: 0,
            is_active: true,
        }],
        round_robin: Vec::new(),
    }
}

pub(super) type TestService = LeadIntakeService<MemoryLeadRepository, InMemoryRuleStore>;

pub(super) fn build_service() -> (TestService, Arc<MemoryLeadRepository>, Arc<InMemoryRuleStore>) {
    build_service_with(IntakeConfig::default())
}

pub(super) fn build_service_with(
    config: IntakeConfig,
) -> (TestService, Arc<MemoryLeadRepository>, Arc<InMemoryRuleStore>) {
    let repository = Arc::new(MemoryLeadRepository::default());
    let store = Arc::new(InMemoryRuleStore::new(routing_table()).expect("valid table"));
    let engine = Arc::new(RoutingEngine::new(store.clone(), RoutingPolicy::default()));
    let service = LeadIntakeService::new(repository.clone(), engine, config);
    (service, repository, store)
}

#[derive(Default, Clone)]
pub(super) struct MemoryLeadRepository {
    pub(super) leads: Arc<Mutex<HashMap<LeadId, Lead>>>,
    pub(super) activities: Arc<Mutex<Vec<LeadActivity>>>,
}

impl MemoryLeadRepository {
    pub(super) fn len(&self) -> usize {
        self.leads.lock().expect("repository mutex poisoned").len()
    }
}

impl LeadRepository for MemoryLeadRepository {
    fn insert(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        let mut guard = self.leads.lock().expect("repository mutex poisoned");
        if guard.contains_key(&lead.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(lead.id.clone(), lead.clone());
        Ok(lead)
    }

    fn fetch(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let guard = self.leads.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn count_from_ip_since(
        &self,
        ip: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        let guard = self.leads.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|lead| lead.consent_ip == ip && lead.created_at >= since)
            .count())
    }

    fn record_activity(&self, activity: LeadActivity) -> Result<(), RepositoryError> {
        self.activities
            .lock()
            .expect("activity mutex poisoned")
            .push(activity);
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

pub(super) struct UnavailableRepository;

impl LeadRepository for UnavailableRepository {
    fn insert(&self, _lead: Lead) -> Result<Lead, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn count_from_ip_since(
        &self,
        _ip: &str,
        _since: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn record_activity(&self, _activity: LeadActivity) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn activities(&self, _id: &LeadId) -> Result<Vec<LeadActivity>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
