//! Geographic lead routing: postcode parsing, rule lookup, target selection, and tracing.

pub mod domain;
pub mod engine;
pub mod import;
pub mod postcode;
pub mod router;
pub mod sandbox;
mod selector;
pub mod store;
pub mod table;
pub mod trace;

#[cfg(test)]
mod tests;

pub use domain::{
    match_key, ResolvedTarget, RoundRobinState, RoutingRule, RoutingRuleTarget, RoutingStrategy,
    RuleId, RuleSnapshot, RuleType, Student, StudentId, NO_ASSIGNMENT_YET,
};
pub use engine::{route_with, RouteRequest, RoutingEngine, RoutingPolicy, DEFAULT_CURSOR_ATTEMPTS};
pub use import::{RoutingImportError, RoutingTableImporter};
pub use postcode::{parse_postcode, InvalidPostcode, ParsedPostcode};
pub use router::{routing_router, RoutingTestRequest};
pub use sandbox::SandboxStore;
pub use selector::select_student;
pub use store::{RuleStore, StoreError, StudentDirectory};
pub use table::{InMemoryRuleStore, RoutingTable, RoutingTableError};
pub use trace::{MatchLevel, RouteResult, SkipReason, StoreFailure, TriedRule};
