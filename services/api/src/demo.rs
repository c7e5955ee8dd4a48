use crate::infra::{load_routing_table, routing_table_from_paths, InMemoryLeadRepository};
use chrono::Utc;
use clap::Args;
use leadgen::config::{AppConfig, IntakeConfig};
use leadgen::error::AppError;
use leadgen::workflows::leads::{
    IntakeOutcome, LeadActivityKind, LeadIntakeService, LeadRepository, LeadSubmission,
};
use leadgen::workflows::routing::{
    InMemoryRuleStore, RouteRequest, RouteResult, RoutingEngine, RoutingPolicy, RoutingTable,
};
use std::path::PathBuf;
use std::sync::Arc;

const SAMPLE_POSTCODES: &[(&str, &str)] = &[
    ("B1 1AA", "Birmingham"),
    ("B15 2TT", "Birmingham"),
    ("M60 1QD", "Manchester"),
    ("LS1 4AP", "Leeds"),
    ("EX1 1AA", "Exeter"),
];

#[derive(Args, Debug)]
pub(crate) struct RoutingTestArgs {
    /// Seller postcode to route, e.g. "B1 1AA"
    #[arg(long)]
    pub(crate) postcode: String,
    /// Town or city from the seller's address
    #[arg(long)]
    pub(crate) town: Option<String>,
    /// County from the seller's address (only consulted with county matching enabled)
    #[arg(long)]
    pub(crate) county: Option<String>,
    /// Student CSV export. Requires --rules.
    #[arg(long, requires = "rules")]
    pub(crate) students: Option<PathBuf>,
    /// Routing rule CSV export. Requires --students.
    #[arg(long, requires = "students")]
    pub(crate) rules: Option<PathBuf>,
    /// Advance round-robin cursors as a live lead would
    #[arg(long)]
    pub(crate) commit: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Optional student CSV export. Defaults to the bundled sample students.
    #[arg(long, requires = "rules")]
    pub(crate) students: Option<PathBuf>,
    /// Optional routing rule CSV export. Defaults to the bundled sample rules.
    #[arg(long, requires = "students")]
    pub(crate) rules: Option<PathBuf>,
    /// Skip the lead intake portion of the demo.
    #[arg(long)]
    pub(crate) skip_intake: bool,
}

pub(crate) fn run_routing_test(args: RoutingTestArgs) -> Result<(), AppError> {
    let RoutingTestArgs {
        postcode,
        town,
        county,
        students,
        rules,
        commit,
    } = args;

    let config = AppConfig::load()?;
    let table = resolve_table(&config, students, rules)?;
    let engine = RoutingEngine::new(
        Arc::new(InMemoryRuleStore::new(table)?),
        RoutingPolicy::from(&config.routing),
    );

    let request =
        RouteRequest::new(&postcode, town.as_deref()).with_county(county.as_deref());
    let result = if commit {
        engine.route(&request)
    } else {
        engine.dry_run_request(&request)
    };

    println!(
        "Routing test for {} ({})",
        postcode.trim(),
        if commit { "committed" } else { "dry run" }
    );
    render_route(&result);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        students,
        rules,
        skip_intake,
    } = args;

    let config = AppConfig::load()?;
    let table = resolve_table(&config, students, rules)?;
    println!("Lead routing demo");
    println!(
        "- {} students | {} rules | {} rule targets",
        table.students.len(),
        table.rules.len(),
        table.targets.len()
    );

    let store = Arc::new(InMemoryRuleStore::new(table)?);
    let engine = Arc::new(RoutingEngine::new(
        store,
        RoutingPolicy::from(&config.routing),
    ));

    println!("\nSample postcodes (dry run)");
    for (postcode, town) in SAMPLE_POSTCODES {
        let result = engine.dry_run(postcode, Some(*town));
        println!("\n{postcode} / {town}");
        render_route(&result);
    }

    if skip_intake {
        return Ok(());
    }

    println!("\nLead intake demo (contact details redacted)");
    let repository = Arc::new(InMemoryLeadRepository::default());
    let service = LeadIntakeService::new(repository.clone(), engine, IntakeConfig::default());

    let lead = match service.submit(demo_submission(), "203.0.113.10", Utc::now()) {
        Ok(IntakeOutcome::Accepted { lead, .. }) => lead,
        Ok(IntakeOutcome::Discarded) => {
            println!("  Submission discarded");
            return Ok(());
        }
        Err(err) => {
            println!("  Submission rejected: {}", err);
            return Ok(());
        }
    };

    let view = lead.status_view();
    println!(
        "- Received lead {} -> status {} ({})",
        view.lead_id, view.status, view.capture_mode
    );
    match (&view.assigned_student_id, view.match_level) {
        (Some(student), Some(level)) => println!("  Assigned to {} at {}", student, level),
        _ => println!("  Waiting for manual assignment"),
    }

    match repository.activities(&lead.id) {
        Ok(activities) => {
            println!("  Activity trail:");
            for activity in activities {
                println!("    - {}", describe_activity(&activity.kind));
            }
        }
        Err(err) => println!("  Activity trail unavailable: {}", err),
    }

    Ok(())
}

fn resolve_table(
    config: &AppConfig,
    students: Option<PathBuf>,
    rules: Option<PathBuf>,
) -> Result<RoutingTable, AppError> {
    match (students, rules) {
        (Some(students), Some(rules)) => routing_table_from_paths(&students, &rules),
        _ => load_routing_table(&config.routing),
    }
}

fn render_route(result: &RouteResult) {
    println!("  Outcome: {}", result.summary());
    println!("  Match level: {}", result.match_level);
    if result.tried_rules.is_empty() {
        println!("  No rules matched");
    }
    for tried in &result.tried_rules {
        let targets: Vec<String> = tried
            .targets
            .iter()
            .map(|target| format!("{}@{}", target.student.slug, target.priority))
            .collect();
        match &tried.skip_reason {
            Some(reason) => println!(
                "  - {} [{}] skipped: {}",
                tried.rule.describe(),
                targets.join(", "),
                reason
            ),
            None => println!("  - {} [{}] selected", tried.rule.describe(), targets.join(", ")),
        }
    }
    if let Some(failure) = &result.store_failure {
        println!(
            "  Store failure at {}: {}",
            failure.stage, failure.detail
        );
    }
}

fn describe_activity(kind: &LeadActivityKind) -> String {
    match kind {
        LeadActivityKind::FormSubmitted {
            source_page,
            capture_mode,
        } => format!("form submitted on {} ({})", source_page, capture_mode.label()),
        LeadActivityKind::Routed {
            student_id,
            match_level,
            ..
        } => format!("routed to {} at {}", student_id, match_level),
        LeadActivityKind::DirectCapture { student_id } => {
            format!("captured directly by {}", student_id)
        }
        LeadActivityKind::RoutingUnmatched {
            rules_tried,
            store_failure,
        } => match store_failure {
            Some(detail) => format!("unrouted after {} rules: {}", rules_tried, detail),
            None => format!("unrouted after {} rules", rules_tried),
        },
    }
}

fn demo_submission() -> LeadSubmission {
    LeadSubmission {
        full_name: "Alex Morgan".to_string(),
        phone: "0121 496 0000".to_string(),
        email: Some("alex@example.com".to_string()),
        address_line1: "12 Colmore Row".to_string(),
        town_city: "Birmingham".to_string(),
        postcode: "b1 1aa".to_string(),
        approx_value: "250000".to_string(),
        reason_for_sale: "Relocating".to_string(),
        timeline: "ASAP".to_string(),
        consent_marketing: true,
        utm_source: Some("demo".to_string()),
        ..LeadSubmission::default()
    }
}
