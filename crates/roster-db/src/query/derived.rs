//! # Derived Queries
//!
//! Parses an operation name into a query plan.
//!
//! ## Naming Grammar
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  find   Distinct Top3  By  UsernameAndAgeGreaterThan  OrderByAgeDesc    │
//! │  ────   ──────────────  ──  ─────────────────────────  ──────────────   │
//! │  subject  descriptor        predicate                   static sort     │
//! │                                                                         │
//! │  subject     find|read|get|query|search|stream │ count │ exists │       │
//! │              delete|remove                                              │
//! │  descriptor  free text, except Distinct and First<N>/Top<N>             │
//! │  predicate   parts split on Or, then And                                │
//! │  part        <Property><Operator>[IgnoreCase]                           │
//! │  property    camel-case path; TeamName → team.name                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Parameters are named after their property (`username`, `age`,
//! `teamName`). A property used twice gets `_2`, `_3` suffixes, and
//! `Between` takes `<property>_start` and `<property>_end`.

use roster_core::{Direction, EntityMeta, Order, Sort};

use super::criteria::{Criteria, Operand, Operator, Predicate};
use super::QueryError;

// =============================================================================
// Parsed Query
// =============================================================================

/// What a derived query does with the matching rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Find,
    Count,
    Exists,
    Delete,
}

/// A parsed operation name.
#[derive(Debug, Clone)]
pub struct DerivedQuery {
    pub name: String,
    pub subject: Subject,
    pub distinct: bool,
    pub limit: Option<u64>,
    pub criteria: Criteria,
    pub sort: Sort,
}

impl DerivedQuery {
    pub fn parameter_names(&self) -> Vec<&str> {
        self.criteria.parameter_names()
    }
}

const FIND_PREFIXES: &[&str] = &["find", "read", "get", "query", "search", "stream"];

/// Operator keywords, most specific first. The `Is` forms are aliases.
const OPERATOR_KEYWORDS: &[(&str, Operator)] = &[
    ("IsNotNull", Operator::IsNotNull),
    ("NotNull", Operator::IsNotNull),
    ("IsNull", Operator::IsNull),
    ("Null", Operator::IsNull),
    ("IsNotIn", Operator::NotIn),
    ("NotIn", Operator::NotIn),
    ("IsNotLike", Operator::NotLike),
    ("NotLike", Operator::NotLike),
    ("IsGreaterThanEqual", Operator::GreaterThanEqual),
    ("GreaterThanEqual", Operator::GreaterThanEqual),
    ("IsGreaterThan", Operator::GreaterThan),
    ("GreaterThan", Operator::GreaterThan),
    ("IsLessThanEqual", Operator::LessThanEqual),
    ("LessThanEqual", Operator::LessThanEqual),
    ("IsLessThan", Operator::LessThan),
    ("LessThan", Operator::LessThan),
    ("IsBetween", Operator::Between),
    ("Between", Operator::Between),
    ("IsIn", Operator::In),
    ("In", Operator::In),
    ("IsLike", Operator::Like),
    ("Like", Operator::Like),
    ("IsStartingWith", Operator::StartingWith),
    ("StartingWith", Operator::StartingWith),
    ("StartsWith", Operator::StartingWith),
    ("IsEndingWith", Operator::EndingWith),
    ("EndingWith", Operator::EndingWith),
    ("EndsWith", Operator::EndingWith),
    ("IsContaining", Operator::Containing),
    ("Containing", Operator::Containing),
    ("Contains", Operator::Containing),
    ("IsNot", Operator::NotEquals),
    ("Not", Operator::NotEquals),
    ("Is", Operator::Equals),
    ("Equals", Operator::Equals),
];

// =============================================================================
// Parser
// =============================================================================

/// Parses `name` against the entity `meta`.
///
/// ## Example
/// ```rust
/// use roster_core::MEMBER_META;
/// use roster_db::query::{parse_method_name, Subject};
///
/// let query = parse_method_name("findByUsernameAndAgeGreaterThan", &MEMBER_META).unwrap();
/// assert_eq!(query.subject, Subject::Find);
/// assert_eq!(query.parameter_names(), vec!["username", "age"]);
///
/// let err = parse_method_name("findByUsernameAndAgeGreaterThen", &MEMBER_META).unwrap_err();
/// assert_eq!(err.to_string(), "No property 'greaterThen' found for type 'Member.age'");
/// ```
pub fn parse_method_name(name: &str, meta: &'static EntityMeta) -> Result<DerivedQuery, QueryError> {
    let invalid = |reason: &str| QueryError::InvalidMethodName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid("only ASCII letters and digits are allowed"));
    }

    let (subject, rest) = split_subject(name).ok_or_else(|| {
        invalid("expected a find/read/get/query/search/stream/count/exists/delete/remove prefix")
    })?;

    const ORDER_BY: &str = "OrderBy";
    let (descriptor, predicate_part, order_part) = match find_by(rest) {
        Some(at) => {
            let tail = &rest[at + 2..];
            if tail.is_empty() {
                return Err(invalid("expected criteria after 'By'"));
            }
            if let Some(order) = tail.strip_prefix(ORDER_BY) {
                (&rest[..at], "", Some(order))
            } else {
                match find_keyword(tail, ORDER_BY) {
                    Some(o) => (&rest[..at], &tail[..o], Some(&tail[o + ORDER_BY.len()..])),
                    None => (&rest[..at], tail, None),
                }
            }
        }
        // findAllOrderByUsername: no criteria, sort only.
        None => match rest.find(ORDER_BY) {
            Some(o) => (&rest[..o], "", Some(&rest[o + ORDER_BY.len()..])),
            None => (rest, "", None),
        },
    };

    let distinct = descriptor.contains("Distinct");
    let limit = parse_limit(descriptor).map_err(|reason| invalid(&reason))?;

    let mut criteria = Criteria::new();
    let mut slots = SlotNames::default();
    if !predicate_part.is_empty() {
        for (i, or_part) in split_keyword(predicate_part, "Or").into_iter().enumerate() {
            for (j, and_part) in split_keyword(or_part, "And").into_iter().enumerate() {
                if and_part.is_empty() {
                    return Err(invalid("empty predicate between And/Or"));
                }
                let predicate = parse_part(and_part, meta, &mut slots)?;
                criteria = if i > 0 && j == 0 {
                    criteria.or(predicate)
                } else {
                    criteria.and(predicate)
                };
            }
        }
    }

    let sort = match order_part {
        Some(order_part) => parse_order(order_part, meta, name)?,
        None => Sort::unsorted(),
    };

    Ok(DerivedQuery {
        name: name.to_string(),
        subject,
        distinct,
        limit,
        criteria,
        sort,
    })
}

fn split_subject(name: &str) -> Option<(Subject, &str)> {
    let candidates = FIND_PREFIXES
        .iter()
        .map(|prefix| (*prefix, Subject::Find))
        .chain([
            ("count", Subject::Count),
            ("exists", Subject::Exists),
            ("delete", Subject::Delete),
            ("remove", Subject::Delete),
        ]);

    for (prefix, subject) in candidates {
        if let Some(rest) = name.strip_prefix(prefix) {
            if rest.is_empty() || rest.starts_with(|c: char| c.is_ascii_uppercase()) {
                return Some((subject, rest));
            }
        }
    }
    None
}

/// Position of the `By` that ends the descriptor, skipping `OrderBy`.
fn find_by(rest: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(offset) = rest[from..].find("By") {
        let at = from + offset;
        let after = &rest[at + 2..];
        let boundary = after.is_empty() || after.starts_with(|c: char| c.is_ascii_uppercase());
        if boundary && !rest[..at].ends_with("Order") {
            return Some(at);
        }
        from = at + 2;
    }
    None
}

fn parse_limit(descriptor: &str) -> Result<Option<u64>, String> {
    for keyword in ["First", "Top"] {
        if let Some(at) = descriptor.find(keyword) {
            let digits: String = descriptor[at + keyword.len()..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if digits.is_empty() {
                return Ok(Some(1));
            }
            let limit: u64 = digits
                .parse()
                .map_err(|_| format!("'{}{}' is not a valid limit", keyword, digits))?;
            if limit == 0 {
                return Err(format!("'{}0' would never return a row", keyword));
            }
            return Ok(Some(limit));
        }
    }
    Ok(None)
}

/// First position of `keyword` that is followed by an upper-case letter and
/// not at the start.
fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    let mut from = 1;
    while from < text.len() {
        let offset = text[from..].find(keyword)?;
        let at = from + offset;
        let after = &text[at + keyword.len()..];
        if after.starts_with(|c: char| c.is_ascii_uppercase()) {
            return Some(at);
        }
        from = at + keyword.len();
    }
    None
}

fn split_keyword<'a>(text: &'a str, keyword: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(at) = find_keyword(rest, keyword) {
        parts.push(&rest[..at]);
        rest = &rest[at + keyword.len()..];
    }
    parts.push(rest);
    parts
}

// =============================================================================
// Predicate Parts
// =============================================================================

#[derive(Default)]
struct SlotNames {
    used: Vec<String>,
}

impl SlotNames {
    fn next(&mut self, base: &str) -> String {
        let mut name = base.to_string();
        let mut n = 1;
        while self.used.contains(&name) {
            n += 1;
            name = format!("{}_{}", base, n);
        }
        self.used.push(name.clone());
        name
    }
}

fn parse_part(part: &str, meta: &'static EntityMeta, slots: &mut SlotNames) -> Result<Predicate, QueryError> {
    let (part, ignore_case) = match part
        .strip_suffix("AllIgnoreCase")
        .or_else(|| part.strip_suffix("IgnoreCase"))
        .or_else(|| part.strip_suffix("IgnoringCase"))
    {
        Some(stripped) => (stripped, true),
        None => (part, false),
    };

    let mut first_error = None;
    for (keyword, operator) in OPERATOR_KEYWORDS {
        let Some(property) = part.strip_suffix(keyword) else {
            continue;
        };
        if property.is_empty() {
            continue;
        }
        match resolve_camel(property, meta) {
            Ok(path) => return Ok(build_predicate(path, *operator, ignore_case, slots)),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }

    match resolve_camel(part, meta) {
        Ok(path) => Ok(build_predicate(path, Operator::Equals, ignore_case, slots)),
        Err(err) => Err(first_error.unwrap_or(err)),
    }
}

fn build_predicate(path: String, operator: Operator, ignore_case: bool, slots: &mut SlotNames) -> Predicate {
    let base = slot_base(&path);
    let mut predicate = Predicate::new(path, operator);
    match operator.arity() {
        0 => {}
        2 => {
            predicate = predicate
                .operand(Operand::Param(slots.next(&format!("{}_start", base))))
                .operand(Operand::Param(slots.next(&format!("{}_end", base))));
        }
        _ => predicate = predicate.operand(Operand::Param(slots.next(&base))),
    }
    if ignore_case {
        predicate = predicate.ignoring_case();
    }
    predicate
}

/// `team.name` → `teamName`
fn slot_base(path: &str) -> String {
    let mut base = String::new();
    for (i, segment) in path.split('.').enumerate() {
        if i == 0 {
            base.push_str(segment);
        } else {
            base.push_str(&capitalize(segment));
        }
    }
    base
}

/// Resolves a camel-case property (`Username`, `TeamName`) to a dotted path.
///
/// Tries the whole text first, then splits at camel-case boundaries from the
/// right so the longest matching head wins. A head naming a plain field
/// leaves the tail unresolvable: that is the `greaterThen` on `Member.age`
/// case.
fn resolve_camel(text: &str, meta: &'static EntityMeta) -> Result<String, QueryError> {
    let whole = uncapitalize(text);
    if meta.field(&whole).is_some() {
        return Ok(whole);
    }

    let boundaries: Vec<usize> = text
        .char_indices()
        .skip(1)
        .filter(|(_, c)| c.is_ascii_uppercase())
        .map(|(i, _)| i)
        .collect();

    for &at in boundaries.iter().rev() {
        let head = uncapitalize(&text[..at]);
        let tail = &text[at..];

        if let Some(relation) = meta.relation(&head) {
            let nested = resolve_camel(tail, relation.target).map_err(|err| match err {
                QueryError::NoProperty { property, .. } => QueryError::NoProperty {
                    property,
                    entity: relation.target.name.to_string(),
                },
                other => other,
            })?;
            return Ok(format!("{}.{}", head, nested));
        }

        if meta.field(&head).is_some() {
            return Err(QueryError::NoProperty {
                property: uncapitalize(tail),
                entity: format!("{}.{}", meta.name, head),
            });
        }
    }

    Err(QueryError::NoProperty {
        property: whole,
        entity: meta.name.to_string(),
    })
}

fn parse_order(order_part: &str, meta: &'static EntityMeta, name: &str) -> Result<Sort, QueryError> {
    let mut orders = Vec::new();
    let mut rest = order_part;

    while !rest.is_empty() {
        let asc = find_direction(rest, "Asc");
        let desc = find_direction(rest, "Desc");
        let (end, keyword_len, direction) = match (asc, desc) {
            (Some(a), Some(d)) if a < d => (a, 3, Direction::Asc),
            (Some(_), Some(d)) => (d, 4, Direction::Desc),
            (Some(a), None) => (a, 3, Direction::Asc),
            (None, Some(d)) => (d, 4, Direction::Desc),
            (None, None) => (rest.len(), 0, Direction::Asc),
        };

        let property = &rest[..end];
        if property.is_empty() {
            return Err(QueryError::InvalidMethodName {
                name: name.to_string(),
                reason: "OrderBy needs a property before Asc/Desc".to_string(),
            });
        }
        let path = resolve_camel(property, meta).map_err(|_| QueryError::InvalidSort {
            property: uncapitalize(property),
            entity: meta.name.to_string(),
        })?;
        orders.push(Order {
            property: path,
            direction,
            ignore_case: false,
        });
        rest = &rest[end + keyword_len..];
    }

    if orders.is_empty() {
        return Err(QueryError::InvalidMethodName {
            name: name.to_string(),
            reason: "OrderBy needs at least one property".to_string(),
        });
    }
    Ok(Sort::from_orders(orders))
}

/// `Asc`/`Desc` ending a sort item: followed by an upper-case letter or the end.
fn find_direction(text: &str, keyword: &str) -> Option<usize> {
    let mut from = 1;
    while from < text.len() {
        let offset = text[from..].find(keyword)?;
        let at = from + offset;
        let after = &text[at + keyword.len()..];
        if after.is_empty() || after.starts_with(|c: char| c.is_ascii_uppercase()) {
            return Some(at);
        }
        from = at + keyword.len();
    }
    None
}

fn uncapitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::{MEMBER_META, TEAM_META};

    fn parse(name: &str) -> DerivedQuery {
        parse_method_name(name, &MEMBER_META).unwrap()
    }

    #[test]
    fn test_username_and_age_greater_than() {
        let query = parse("findByUsernameAndAgeGreaterThan");
        let group = &query.criteria.groups()[0];

        assert_eq!(query.subject, Subject::Find);
        assert_eq!(group.len(), 2);
        assert_eq!(group[0].property(), "username");
        assert_eq!(group[0].operator(), Operator::Equals);
        assert_eq!(group[1].property(), "age");
        assert_eq!(group[1].operator(), Operator::GreaterThan);
    }

    #[test]
    fn test_typo_reports_nested_property() {
        let err = parse_method_name("findByUsernameAndAgeGreaterThen", &MEMBER_META).unwrap_err();
        assert_eq!(
            err,
            QueryError::NoProperty {
                property: "greaterThen".to_string(),
                entity: "Member.age".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_property() {
        let err = parse_method_name("findByNickname", &MEMBER_META).unwrap_err();
        assert_eq!(err.to_string(), "No property 'nickname' found for type 'Member'");
    }

    #[test]
    fn test_descriptor_is_ignored() {
        for name in [
            "findMemberByUsername",
            "findListByUsername",
            "findOptionalByUsername",
            "findMemberSliceByAge",
            "findEntityGraphByUsername",
        ] {
            let query = parse(name);
            assert_eq!(query.criteria.groups()[0].len(), 1, "{}", name);
            assert!(!query.distinct);
            assert_eq!(query.limit, None);
        }
    }

    #[test]
    fn test_subjects() {
        assert_eq!(parse("countByAge").subject, Subject::Count);
        assert_eq!(parse("existsByUsername").subject, Subject::Exists);
        assert_eq!(parse("deleteByUsername").subject, Subject::Delete);
        assert_eq!(parse("removeByAge").subject, Subject::Delete);
        assert_eq!(parse("readByAge").subject, Subject::Find);
        assert!(parse_method_name("fetchByAge", &MEMBER_META).is_err());
        assert!(parse_method_name("finderByAge", &MEMBER_META).is_err());
    }

    #[test]
    fn test_distinct_and_limits() {
        let query = parse("findDistinctTop3ByAge");
        assert!(query.distinct);
        assert_eq!(query.limit, Some(3));
        assert_eq!(parse("findFirstByUsername").limit, Some(1));
        assert!(parse_method_name("findTop0ByAge", &MEMBER_META).is_err());
    }

    #[test]
    fn test_or_splits_groups() {
        let query = parse("findByUsernameOrAgeLessThanEqualAndTeamIsNull");
        let groups = query.criteria.groups();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 1);
        assert_eq!(groups[1].len(), 2);
        assert_eq!(groups[1][1].property(), "team");
        assert_eq!(groups[1][1].operator(), Operator::IsNull);
    }

    #[test]
    fn test_relation_paths() {
        let query = parse("findByTeamName");
        assert_eq!(query.criteria.groups()[0][0].property(), "team.name");
        assert_eq!(query.parameter_names(), vec!["teamName"]);

        let query = parse("findByTeamId");
        assert_eq!(query.criteria.groups()[0][0].property(), "team.id");

        let err = parse_method_name("findByTeamSize", &MEMBER_META).unwrap_err();
        assert_eq!(err.to_string(), "No property 'size' found for type 'Team'");
    }

    #[test]
    fn test_slot_naming() {
        let query = parse("findByAgeBetweenOrAgeGreaterThan");
        assert_eq!(query.parameter_names(), vec!["age_start", "age_end", "age"]);

        let query = parse("findByUsernameOrUsernameStartingWith");
        assert_eq!(query.parameter_names(), vec!["username", "username_2"]);
    }

    #[test]
    fn test_operator_keywords() {
        let cases = [
            ("findByAgeGreaterThanEqual", Operator::GreaterThanEqual),
            ("findByAgeIsLessThan", Operator::LessThan),
            ("findByUsernameIn", Operator::In),
            ("findByUsernameNotIn", Operator::NotIn),
            ("findByTeamIsNotNull", Operator::IsNotNull),
            ("findByUsernameNot", Operator::NotEquals),
            ("findByUsernameIs", Operator::Equals),
            ("findByUsernameLike", Operator::Like),
            ("findByUsernameEndingWith", Operator::EndingWith),
            ("findByUsernameContaining", Operator::Containing),
        ];
        for (name, operator) in cases {
            assert_eq!(parse(name).criteria.groups()[0][0].operator(), operator, "{}", name);
        }
    }

    #[test]
    fn test_ignore_case() {
        let query = parse("findByUsernameIgnoreCase");
        let predicate = &query.criteria.groups()[0][0];
        assert_eq!(predicate.property(), "username");
        assert_eq!(predicate.operator(), Operator::Equals);
    }

    #[test]
    fn test_order_by() {
        let query = parse("findByAgeOrderByUsernameDescIdAsc");
        assert_eq!(query.sort.orders().len(), 2);
        assert_eq!(query.sort.orders()[0], Order::desc("username"));
        assert_eq!(query.sort.orders()[1], Order::asc("id"));

        let query = parse("findByTeamOrderById");
        assert_eq!(query.sort.orders()[0], Order::asc("id"));

        assert!(matches!(
            parse_method_name("findByAgeOrderByNicknameDesc", &MEMBER_META),
            Err(QueryError::InvalidSort { .. })
        ));
    }

    #[test]
    fn test_find_all_without_by() {
        let query = parse("findAll");
        assert!(query.criteria.is_empty());

        let query = parse("findAllOrderByUsernameDesc");
        assert!(query.criteria.is_empty());
        assert_eq!(query.sort.orders()[0], Order::desc("username"));

        assert!(parse_method_name("findBy", &MEMBER_META).is_err());
    }

    #[test]
    fn test_team_queries() {
        let query = parse_method_name("findByName", &TEAM_META).unwrap();
        assert_eq!(query.parameter_names(), vec!["name"]);
    }
}
