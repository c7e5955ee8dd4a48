use crate::workflows::routing::domain::{RoutingStrategy, RuleType, StudentId};
use crate::workflows::routing::import::{RoutingImportError, RoutingTableImporter};
use crate::workflows::routing::table::RoutingTableError;

const STUDENTS: &str = "\
Slug,Display Name,Phone,Email,Active,At Capacity
John-Smith,John Smith,07700900001,john@example.com,yes,no
sarah-jones,Sarah Jones,07700900002,,yes,
mike-wilson,Mike Wilson,07700900003,mike@example.com,,yes
";

const RULES: &str = "\
Rule Type,Match Value,Strategy,Student,Priority,Active
POSTCODE_PREFIX,B1,PRIORITY,john-smith,0,
postcode prefix,b,,john-smith,0,yes
POSTCODE_PREFIX,B,round robin,sarah-jones,1,yes
TOWN,Leeds,,mike-wilson,,
";

const NO_RULES: &str = "Rule Type,Match Value,Strategy,Student,Priority,Active\n";

#[test]
fn imports_students_and_groups_rule_rows() {
    let table = RoutingTableImporter::from_readers(STUDENTS.as_bytes(), RULES.as_bytes())
        .expect("import succeeds");

    assert_eq!(table.students.len(), 3);
    assert_eq!(table.students[0].slug, "john-smith");
    assert_eq!(table.students[1].email, None);
    assert!(table.students[1].is_eligible());
    assert!(table.students[2].is_at_capacity);

    assert_eq!(table.rules.len(), 3);
    assert_eq!(table.targets.len(), 4);

    let district = table
        .snapshot(RuleType::PostcodePrefix, "B")
        .expect("district rule imported");
    assert_eq!(district.rule.strategy, RoutingStrategy::RoundRobin);
    assert_eq!(district.targets.len(), 2);

    let town = table
        .snapshot(RuleType::Town, "leeds")
        .expect("town rule imported");
    assert_eq!(town.rule.match_value, "LEEDS");
    assert_eq!(town.rule.strategy, RoutingStrategy::Priority);
}

#[test]
fn unknown_student_slug_reports_the_line() {
    let rules = "Rule Type,Match Value,Strategy,Student,Priority,Active\nTOWN,Bath,,nobody,0,yes\n";

    let error = RoutingTableImporter::from_readers(STUDENTS.as_bytes(), rules.as_bytes())
        .expect_err("unknown slug rejected");

    match error {
        RoutingImportError::UnknownStudent { line, slug } => {
            assert_eq!(line, 2);
            assert_eq!(slug, "nobody");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unknown_rule_type_is_rejected() {
    let rules = "Rule Type,Match Value,Strategy,Student,Priority,Active\nREGION,North,,john-smith,0,yes\n";

    let error = RoutingTableImporter::from_readers(STUDENTS.as_bytes(), rules.as_bytes())
        .expect_err("rule type rejected");

    assert!(matches!(error, RoutingImportError::UnknownRuleType { .. }));
}

#[test]
fn conflicting_strategies_for_one_rule_are_rejected() {
    let rules = "Rule Type,Match Value,Strategy,Student,Priority,Active\n\
TOWN,York,PRIORITY,john-smith,0,yes\n\
TOWN,york,ROUND_ROBIN,sarah-jones,0,yes\n";

    let error = RoutingTableImporter::from_readers(STUDENTS.as_bytes(), rules.as_bytes())
        .expect_err("conflict rejected");

    assert!(matches!(
        error,
        RoutingImportError::ConflictingStrategy { line: 3, .. }
    ));
}

#[test]
fn unreadable_flags_are_rejected() {
    let students = "Slug,Display Name,Phone,Email,Active,At Capacity\nsam,Sam,077,,maybe,no\n";

    let error = RoutingTableImporter::from_readers(students.as_bytes(), NO_RULES.as_bytes())
        .expect_err("flag rejected");

    assert!(matches!(error, RoutingImportError::InvalidFlag { .. }));
}

#[test]
fn duplicate_slugs_fail_table_validation() {
    let students = "Id,Slug,Display Name,Phone,Email,Active,At Capacity\nstu-1,sam,Sam,077,,yes,no\nstu-2,SAM,Sam Two,078,,yes,no\n";

    let error = RoutingTableImporter::from_readers(students.as_bytes(), NO_RULES.as_bytes())
        .expect_err("duplicate slug rejected");

    assert!(matches!(
        error,
        RoutingImportError::Table(RoutingTableError::DuplicateSlug(_))
    ));
}

#[test]
fn student_ids_survive_reordered_exports() {
    let reordered = "\
Slug,Display Name,Phone,Email,Active,At Capacity
mike-wilson,Mike Wilson,07700900003,mike@example.com,,yes
sarah-jones,Sarah Jones,07700900002,,yes,
John-Smith,John Smith,07700900001,john@example.com,yes,no
";

    let original = RoutingTableImporter::from_readers(STUDENTS.as_bytes(), RULES.as_bytes())
        .expect("import succeeds");
    let shuffled = RoutingTableImporter::from_readers(reordered.as_bytes(), RULES.as_bytes())
        .expect("import succeeds");

    let john = StudentId("student-john-smith".to_string());
    assert_eq!(
        original.student(&john).map(|student| student.slug.as_str()),
        Some("john-smith")
    );
    assert_eq!(
        shuffled.student(&john).map(|student| student.slug.as_str()),
        Some("john-smith")
    );

    let b1 = shuffled
        .snapshot(RuleType::PostcodePrefix, "B1")
        .expect("exact rule imported");
    assert_eq!(b1.targets[0].student.id, john);
}

#[test]
fn explicit_id_column_is_kept() {
    let students = "\
Id,Slug,Display Name,Phone,Email,Active,At Capacity
agent-42,john-smith,John Smith,07700900001,,yes,no
,sarah-jones,Sarah Jones,07700900002,,yes,no
";

    let table = RoutingTableImporter::from_readers(students.as_bytes(), NO_RULES.as_bytes())
        .expect("import succeeds");

    assert_eq!(table.students[0].id, StudentId("agent-42".to_string()));
    assert_eq!(
        table.students[1].id,
        StudentId("student-sarah-jones".to_string())
    );
}
