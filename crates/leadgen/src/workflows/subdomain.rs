//! Tenant subdomain resolution: `<slug>.<base domain>` to a student page.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::workflows::routing::{StoreError, Student, StudentDirectory, StudentId};

/// Platform paths and services that can never be a student's slug.
pub const SYSTEM_SLUGS: &[&str] = &[
    "admin", "api", "login", "register", "signup", "dashboard", "settings", "account", "profile",
    "help", "support", "contact", "about", "privacy", "terms", "blog", "news", "faq", "sitemap",
    "robots", "favicon", "static", "assets", "uploads", "images", "css", "js", "fonts", "media",
    "download", "downloads", "app", "www", "mail", "email", "status", "health",
];

/// City names held back for location landing pages.
pub const CITY_SLUGS: &[&str] = &[
    "london", "birmingham", "manchester", "leeds", "liverpool", "sheffield", "bristol",
    "newcastle", "nottingham", "leicester", "coventry", "bradford", "cardiff", "belfast",
    "edinburgh", "glasgow", "aberdeen", "dundee", "exeter", "oxford", "cambridge", "bath", "york",
    "chester", "canterbury", "winchester", "brighton", "bournemouth", "southampton", "portsmouth",
    "plymouth", "norwich", "derby", "stoke", "wolverhampton", "sunderland", "swansea",
    "middlesbrough", "hull", "reading", "luton", "milton-keynes", "northampton", "swindon",
    "warrington", "huddersfield", "slough", "watford", "ipswich", "peterborough",
];

pub fn is_reserved(slug: &str) -> bool {
    let slug = slug.trim().to_ascii_lowercase();
    SYSTEM_SLUGS.contains(&slug.as_str()) || CITY_SLUGS.contains(&slug.as_str())
}

/// Public-facing student details for a subdomain page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentProfile {
    /// Sent back as `student_id` on direct-capture submissions.
    pub id: StudentId,
    pub slug: String,
    pub display_name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub accepting_leads: bool,
}

impl From<Student> for StudentProfile {
    fn from(student: Student) -> Self {
        Self {
            accepting_leads: student.is_eligible(),
            id: student.id,
            slug: student.slug,
            display_name: student.display_name,
            phone: student.phone,
            email: student.email,
            bio: student.bio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubdomainResolution {
    Reserved,
    Student { student: StudentProfile },
    Unknown,
}

pub struct SubdomainResolver<D> {
    directory: Arc<D>,
    base_domain: String,
}

impl<D> SubdomainResolver<D>
where
    D: StudentDirectory + 'static,
{
    pub fn new(directory: Arc<D>, base_domain: impl Into<String>) -> Self {
        Self {
            directory,
            base_domain: base_domain.into().to_ascii_lowercase(),
        }
    }

    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    /// Reserved names first, then active students; inactive students resolve as unknown.
    pub fn resolve(&self, slug: &str) -> Result<SubdomainResolution, StoreError> {
        let slug = slug.trim().to_ascii_lowercase();
        if is_reserved(&slug) {
            return Ok(SubdomainResolution::Reserved);
        }

        match self.directory.student_by_slug(&slug)? {
            Some(student) if student.is_active => Ok(SubdomainResolution::Student {
                student: student.into(),
            }),
            _ => Ok(SubdomainResolution::Unknown),
        }
    }

    /// Resolve from a `Host` header. The bare base domain has no subdomain.
    pub fn resolve_host(&self, host: &str) -> Result<Option<SubdomainResolution>, StoreError> {
        match subdomain_from_host(host, &self.base_domain) {
            Some(slug) => self.resolve(&slug).map(Some),
            None => Ok(None),
        }
    }
}

/// `john-smith.averyfastsale.com:443` -> `john-smith`. Nested labels are not tenants.
pub fn subdomain_from_host(host: &str, base_domain: &str) -> Option<String> {
    let host = host.trim().to_ascii_lowercase();
    let host = host.split(':').next().unwrap_or_default();
    let suffix = format!(".{}", base_domain.trim().to_ascii_lowercase());

    let slug = host.strip_suffix(&suffix)?;
    if slug.is_empty() || slug.contains('.') {
        return None;
    }
    Some(slug.to_string())
}

/// Router exposing subdomain lookups for the edge/front-end tier.
pub fn subdomain_router<D>(resolver: Arc<SubdomainResolver<D>>) -> Router
where
    D: StudentDirectory + 'static,
{
    Router::new()
        .route("/api/v1/subdomains/:slug", get(slug_handler::<D>))
        .route("/api/v1/subdomain", get(host_handler::<D>))
        .with_state(resolver)
}

async fn slug_handler<D>(
    State(resolver): State<Arc<SubdomainResolver<D>>>,
    Path(slug): Path<String>,
) -> Response
where
    D: StudentDirectory + 'static,
{
    respond(resolver.resolve(&slug).map(Some))
}

async fn host_handler<D>(
    State(resolver): State<Arc<SubdomainResolver<D>>>,
    headers: HeaderMap,
) -> Response
where
    D: StudentDirectory + 'static,
{
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    respond(resolver.resolve_host(host))
}

fn respond(resolution: Result<Option<SubdomainResolution>, StoreError>) -> Response {
    match resolution {
        Ok(Some(resolution @ SubdomainResolution::Unknown)) => {
            (StatusCode::NOT_FOUND, axum::Json(resolution)).into_response()
        }
        Ok(Some(resolution)) => (StatusCode::OK, axum::Json(resolution)).into_response(),
        Ok(None) => {
            let payload = json!({ "type": "root" });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => {
            warn!(error = %err, "subdomain lookup failed");
            let payload = json!({ "error": err.to_string() });
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(payload)).into_response()
        }
    }
}
