use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use super::domain::{
    match_key, RoutingRule, RoutingRuleTarget, RoutingStrategy, RuleType, Student, StudentId,
};
use super::table::{RoutingTable, RoutingTableError};

#[derive(Debug, thiserror::Error)]
pub enum RoutingImportError {
    #[error("failed to read routing export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid routing CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: unknown rule type '{value}'")]
    UnknownRuleType { line: u64, value: String },
    #[error("line {line}: unknown routing strategy '{value}'")]
    UnknownStrategy { line: u64, value: String },
    #[error("line {line}: no student with slug '{slug}'")]
    UnknownStudent { line: u64, slug: String },
    #[error("line {line}: expected a yes/no flag, found '{value}'")]
    InvalidFlag { line: u64, value: String },
    #[error("line {line}: rule {rule} mixes routing strategies")]
    ConflictingStrategy { line: u64, rule: String },
    #[error(transparent)]
    Table(#[from] RoutingTableError),
}

/// Builds a [`RoutingTable`] from a students export and a one-row-per-target rules export.
///
/// Students: `[Id,]Slug,Display Name,Phone,Email,Active,At Capacity`. Without an `Id`
/// column the id is `student-<slug>`.
/// Rules: `Rule Type,Match Value,Strategy,Student,Priority,Active`
pub struct RoutingTableImporter;

impl RoutingTableImporter {
    pub fn from_paths<P: AsRef<Path>, Q: AsRef<Path>>(
        students: P,
        rules: Q,
    ) -> Result<RoutingTable, RoutingImportError> {
        let students = std::fs::File::open(students)?;
        let rules = std::fs::File::open(rules)?;
        Self::from_readers(students, rules)
    }

    pub fn from_readers<R: Read, T: Read>(
        students: R,
        rules: T,
    ) -> Result<RoutingTable, RoutingImportError> {
        let students = parse_students(students)?;
        let (rules, targets) = parse_rules(rules, &students)?;

        let table = RoutingTable {
            students,
            rules,
            targets,
            round_robin: Vec::new(),
        };
        table.validate()?;
        Ok(table)
    }
}

#[derive(Debug, Deserialize)]
struct StudentRow {
    #[serde(rename = "Id", default, deserialize_with = "empty_string_as_none")]
    id: Option<String>,
    #[serde(rename = "Slug")]
    slug: String,
    #[serde(rename = "Display Name")]
    display_name: String,
    #[serde(rename = "Phone", default)]
    phone: String,
    #[serde(rename = "Email", default, deserialize_with = "empty_string_as_none")]
    email: Option<String>,
    #[serde(rename = "Active", default, deserialize_with = "empty_string_as_none")]
    active: Option<String>,
    #[serde(
        rename = "At Capacity",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    at_capacity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RuleRow {
    #[serde(rename = "Rule Type")]
    rule_type: String,
    #[serde(rename = "Match Value")]
    match_value: String,
    #[serde(rename = "Strategy", default, deserialize_with = "empty_string_as_none")]
    strategy: Option<String>,
    #[serde(rename = "Student")]
    student: String,
    #[serde(rename = "Priority", default)]
    priority: Option<i32>,
    #[serde(rename = "Active", default, deserialize_with = "empty_string_as_none")]
    active: Option<String>,
}

fn parse_students<R: Read>(reader: R) -> Result<Vec<Student>, RoutingImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut students = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        let line = line_of(&record);
        let row: StudentRow = record.deserialize(Some(&headers))?;

        let slug = row.slug.to_ascii_lowercase();
        let id = row.id.unwrap_or_else(|| format!("student-{slug}"));

        students.push(Student {
            id: StudentId(id),
            slug,
            display_name: row.display_name,
            phone: row.phone,
            email: row.email,
            bio: None,
            is_active: parse_flag(row.active.as_deref(), true, line)?,
            is_at_capacity: parse_flag(row.at_capacity.as_deref(), false, line)?,
        });
    }

    Ok(students)
}

struct PendingRule {
    rule: RoutingRule,
    explicit_strategy: Option<RoutingStrategy>,
}

fn parse_rules<R: Read>(
    reader: R,
    students: &[Student],
) -> Result<(Vec<RoutingRule>, Vec<RoutingRuleTarget>), RoutingImportError> {
    let by_slug: HashMap<&str, &StudentId> = students
        .iter()
        .map(|student| (student.slug.as_str(), &student.id))
        .collect();

    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let mut pending: Vec<PendingRule> = Vec::new();
    let mut index: HashMap<(RuleType, String), usize> = HashMap::new();
    let mut targets = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        let line = line_of(&record);
        let row: RuleRow = record.deserialize(Some(&headers))?;

        let rule_type =
            RuleType::from_label(&row.rule_type).ok_or_else(|| RoutingImportError::UnknownRuleType {
                line,
                value: row.rule_type.clone(),
            })?;
        let strategy = row
            .strategy
            .as_deref()
            .map(|value| {
                RoutingStrategy::from_label(value).ok_or_else(|| {
                    RoutingImportError::UnknownStrategy {
                        line,
                        value: value.to_string(),
                    }
                })
            })
            .transpose()?;
        let student_id = by_slug
            .get(row.student.to_ascii_lowercase().as_str())
            .map(|id| (*id).clone())
            .ok_or_else(|| RoutingImportError::UnknownStudent {
                line,
                slug: row.student.clone(),
            })?;

        let key = (rule_type, match_key(&row.match_value));
        let slot = match index.get(&key) {
            Some(slot) => *slot,
            None => {
                let id = format!("rule-{}", pending.len() + 1);
                pending.push(PendingRule {
                    rule: RoutingRule::new(
                        id,
                        rule_type,
                        &row.match_value,
                        strategy.unwrap_or_default(),
                    ),
                    explicit_strategy: strategy,
                });
                index.insert(key, pending.len() - 1);
                pending.len() - 1
            }
        };

        let entry = &mut pending[slot];
        match (entry.explicit_strategy, strategy) {
            (Some(existing), Some(incoming)) if existing != incoming => {
                return Err(RoutingImportError::ConflictingStrategy {
                    line,
                    rule: entry.rule.describe(),
                });
            }
            (None, Some(incoming)) => {
                entry.explicit_strategy = Some(incoming);
                entry.rule.strategy = incoming;
            }
            _ => {}
        }

        targets.push(RoutingRuleTarget {
            rule_id: entry.rule.id.clone(),
            student_id,
            priority: row.priority.unwrap_or(0),
            is_active: parse_flag(row.active.as_deref(), true, line)?,
        });
    }

    let rules = pending.into_iter().map(|entry| entry.rule).collect();
    Ok((rules, targets))
}

fn line_of(record: &csv::StringRecord) -> u64 {
    record.position().map(|position| position.line()).unwrap_or(0)
}

fn parse_flag(value: Option<&str>, default: bool, line: u64) -> Result<bool, RoutingImportError> {
    let Some(value) = value else {
        return Ok(default);
    };

    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(true),
        "false" | "no" | "n" | "0" => Ok(false),
        _ => Err(RoutingImportError::InvalidFlag {
            line,
            value: value.to_string(),
        }),
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
