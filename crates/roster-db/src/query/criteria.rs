//! # Criteria
//!
//! Predicates over entity properties, combined as an OR of AND-groups.
//!
//! ```text
//! findByUsernameAndAgeGreaterThanOrTeamNameIsNull
//!
//!   group 0: username = :username AND age > :age
//!   group 1: team.name IS NULL
//!
//!   WHERE (member.username = ? AND member.age > ?) OR (team.name IS NULL)
//! ```
//!
//! Operands are either parameter slots, bound by name when the query runs,
//! or values fixed when the criteria are built.

use roster_core::{EntityMeta, Value};

use super::named::{ParamValue, Params};
use super::sql::{resolve_path, JoinSet, Statement};
use super::QueryError;

// =============================================================================
// Operator
// =============================================================================

/// Comparison applied by one predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    Between,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Like,
    NotLike,
    StartingWith,
    EndingWith,
    Containing,
}

impl Operator {
    /// Number of operands the operator consumes.
    pub fn arity(&self) -> usize {
        match self {
            Operator::IsNull | Operator::IsNotNull => 0,
            Operator::Between => 2,
            _ => 1,
        }
    }
}

// =============================================================================
// Predicate
// =============================================================================

/// One predicate operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Named slot filled from [`Params`] at execution.
    Param(String),
    /// Value fixed at build time.
    Value(ParamValue),
}

/// `<property> <operator> <operands>`, property being a dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    property: String,
    operator: Operator,
    ignore_case: bool,
    operands: Vec<Operand>,
}

impl Predicate {
    pub fn new(property: impl Into<String>, operator: Operator) -> Self {
        Predicate {
            property: property.into(),
            operator,
            ignore_case: false,
            operands: Vec::new(),
        }
    }

    pub fn operand(mut self, operand: Operand) -> Self {
        self.operands.push(operand);
        self
    }

    pub fn ignoring_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    fn render(
        &self,
        meta: &'static EntityMeta,
        params: &Params,
        joins: &mut JoinSet,
        out: &mut Statement,
    ) -> Result<(), QueryError> {
        if self.operands.len() != self.operator.arity() {
            return Err(QueryError::InvalidPredicate {
                property: self.property.clone(),
                reason: format!(
                    "{:?} takes {} operand(s), got {}",
                    self.operator,
                    self.operator.arity(),
                    self.operands.len()
                ),
            });
        }

        let resolved = resolve_path(meta, &self.property).ok_or_else(|| QueryError::NoProperty {
            property: self.property.clone(),
            entity: meta.name.to_string(),
        })?;
        if let Some(relation) = resolved.join {
            joins.add(relation);
        }

        let column = if self.ignore_case {
            format!("UPPER({})", resolved.qualified())
        } else {
            resolved.qualified()
        };

        let operands = self
            .operands
            .iter()
            .map(|operand| match operand {
                Operand::Param(name) => params
                    .get(name)
                    .ok_or_else(|| QueryError::MissingParameter(name.clone())),
                Operand::Value(value) => Ok(value),
            })
            .collect::<Result<Vec<&ParamValue>, QueryError>>()?;

        match self.operator {
            Operator::IsNull => out.push_sql(&format!("{} IS NULL", column)),
            Operator::IsNotNull => out.push_sql(&format!("{} IS NOT NULL", column)),
            Operator::Equals | Operator::NotEquals => {
                let value = self.single(operands[0])?;
                let equals = self.operator == Operator::Equals;
                if value.is_null() {
                    let test = if equals { "IS NULL" } else { "IS NOT NULL" };
                    out.push_sql(&format!("{} {}", column, test));
                } else {
                    out.push_sql(&format!("{} {} ", column, if equals { "=" } else { "<>" }));
                    self.push_value(out, value.clone());
                }
            }
            Operator::GreaterThan
            | Operator::GreaterThanEqual
            | Operator::LessThan
            | Operator::LessThanEqual
            | Operator::Like
            | Operator::NotLike => {
                let symbol = match self.operator {
                    Operator::GreaterThan => ">",
                    Operator::GreaterThanEqual => ">=",
                    Operator::LessThan => "<",
                    Operator::LessThanEqual => "<=",
                    Operator::Like => "LIKE",
                    _ => "NOT LIKE",
                };
                let value = self.single(operands[0])?;
                out.push_sql(&format!("{} {} ", column, symbol));
                self.push_value(out, value.clone());
            }
            Operator::Between => {
                let start = self.single(operands[0])?;
                let end = self.single(operands[1])?;
                out.push_sql(&format!("{} BETWEEN ", column));
                self.push_value(out, start.clone());
                out.push_sql(" AND ");
                self.push_value(out, end.clone());
            }
            Operator::In | Operator::NotIn => {
                let keyword = if self.operator == Operator::In { "IN" } else { "NOT IN" };
                out.push_sql(&format!("{} {} (", column, keyword));
                for (i, value) in operands[0].values().iter().enumerate() {
                    if i > 0 {
                        out.push_sql(", ");
                    }
                    self.push_value(out, value.clone());
                }
                out.push_sql(")");
            }
            Operator::StartingWith | Operator::EndingWith | Operator::Containing => {
                let text = self.single(operands[0])?.as_text().ok_or_else(|| {
                    QueryError::InvalidPredicate {
                        property: self.property.clone(),
                        reason: format!("{:?} needs a text value", self.operator),
                    }
                })?;
                let escaped = escape_like(text);
                let pattern = match self.operator {
                    Operator::StartingWith => format!("{}%", escaped),
                    Operator::EndingWith => format!("%{}", escaped),
                    _ => format!("%{}%", escaped),
                };
                out.push_sql(&format!("{} LIKE ", column));
                self.push_value(out, Value::Text(pattern));
                out.push_sql(" ESCAPE '\\'");
            }
        }
        Ok(())
    }

    fn single<'a>(&self, value: &'a ParamValue) -> Result<&'a Value, QueryError> {
        match value {
            ParamValue::Single(value) => Ok(value),
            ParamValue::List(_) => Err(QueryError::InvalidPredicate {
                property: self.property.clone(),
                reason: format!("{:?} does not accept a collection", self.operator),
            }),
        }
    }

    fn push_value(&self, out: &mut Statement, value: Value) {
        if self.ignore_case {
            out.push_sql("UPPER(");
            out.push_bind(value);
            out.push_sql(")");
        } else {
            out.push_bind(value);
        }
    }
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// =============================================================================
// Criteria
// =============================================================================

/// Disjunction of conjunctions. Empty criteria match every row.
///
/// ## Example
/// ```rust
/// use roster_db::query::{Criteria, Operator};
///
/// // username = 'AAA' AND age > 15, OR age IS NULL
/// let criteria = Criteria::new()
///     .value("username", Operator::Equals, "AAA")
///     .value("age", Operator::GreaterThan, 15)
///     .or(roster_db::query::Predicate::new("age", Operator::IsNull));
/// assert_eq!(criteria.groups().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    groups: Vec<Vec<Predicate>>,
}

impl Criteria {
    pub fn new() -> Self {
        Criteria::default()
    }

    /// Adds `predicate` to the current AND-group.
    pub fn and(mut self, predicate: Predicate) -> Self {
        match self.groups.last_mut() {
            Some(group) => group.push(predicate),
            None => self.groups.push(vec![predicate]),
        }
        self
    }

    /// Starts a new AND-group with `predicate`.
    pub fn or(mut self, predicate: Predicate) -> Self {
        self.groups.push(vec![predicate]);
        self
    }

    /// Adds `property <operator> :slot`.
    pub fn param(self, property: &str, operator: Operator, slot: &str) -> Self {
        self.and(Predicate::new(property, operator).operand(Operand::Param(slot.to_string())))
    }

    /// Adds `property <operator> value`.
    pub fn value(self, property: &str, operator: Operator, value: impl Into<Value>) -> Self {
        self.and(
            Predicate::new(property, operator)
                .operand(Operand::Value(ParamValue::Single(value.into()))),
        )
    }

    pub fn eq(self, property: &str, value: impl Into<Value>) -> Self {
        self.value(property, Operator::Equals, value)
    }

    pub fn between(self, property: &str, start: impl Into<Value>, end: impl Into<Value>) -> Self {
        self.and(
            Predicate::new(property, Operator::Between)
                .operand(Operand::Value(ParamValue::Single(start.into())))
                .operand(Operand::Value(ParamValue::Single(end.into()))),
        )
    }

    pub fn is_in<I, V>(self, property: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.and(Predicate::new(property, Operator::In).operand(Operand::Value(ParamValue::List(values))))
    }

    pub fn is_null(self, property: &str) -> Self {
        self.and(Predicate::new(property, Operator::IsNull))
    }

    pub fn is_not_null(self, property: &str) -> Self {
        self.and(Predicate::new(property, Operator::IsNotNull))
    }

    pub fn groups(&self) -> &[Vec<Predicate>] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(Vec::is_empty)
    }

    /// Distinct slot names in order of first use.
    pub fn parameter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for predicate in self.groups.iter().flatten() {
            for operand in &predicate.operands {
                if let Operand::Param(name) = operand {
                    if !names.contains(&name.as_str()) {
                        names.push(name);
                    }
                }
            }
        }
        names
    }

    /// Renders the WHERE body (without `WHERE`), adding needed joins.
    pub(crate) fn render(
        &self,
        meta: &'static EntityMeta,
        params: &Params,
        joins: &mut JoinSet,
        out: &mut Statement,
    ) -> Result<(), QueryError> {
        let groups = self.groups.iter().filter(|group| !group.is_empty());
        for (i, group) in groups.enumerate() {
            if i > 0 {
                out.push_sql(" OR ");
            }
            out.push_sql("(");
            for (j, predicate) in group.iter().enumerate() {
                if j > 0 {
                    out.push_sql(" AND ");
                }
                predicate.render(meta, params, joins, out)?;
            }
            out.push_sql(")");
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::MEMBER_META;

    fn render(criteria: &Criteria, params: &Params) -> Result<Statement, QueryError> {
        let mut joins = JoinSet::default();
        let mut out = Statement::new();
        criteria.render(&MEMBER_META, params, &mut joins, &mut out)?;
        Ok(out)
    }

    #[test]
    fn test_or_of_and_groups() {
        let criteria = Criteria::new()
            .eq("username", "AAA")
            .value("age", Operator::GreaterThanEqual, 20)
            .or(Predicate::new("team", Operator::IsNull));

        let out = render(&criteria, &Params::new()).unwrap();
        assert_eq!(
            out.sql(),
            "(member.username = ? AND member.age >= ?) OR (member.team_id IS NULL)"
        );
        assert_eq!(out.binds().len(), 2);
    }

    #[test]
    fn test_equals_null_renders_is_null() {
        let criteria = Criteria::new().eq("team", None::<i64>);
        let out = render(&criteria, &Params::new()).unwrap();
        assert_eq!(out.sql(), "(member.team_id IS NULL)");
        assert!(out.binds().is_empty());
    }

    #[test]
    fn test_between_and_in() {
        let criteria = Criteria::new()
            .between("age", 10, 20)
            .is_in("username", ["AAA", "BBB"]);
        let out = render(&criteria, &Params::new()).unwrap();
        assert_eq!(
            out.sql(),
            "(member.age BETWEEN ? AND ? AND member.username IN (?, ?))"
        );
        assert_eq!(out.binds().len(), 4);
    }

    #[test]
    fn test_containing_escapes_wildcards() {
        let criteria = Criteria::new().value("username", Operator::Containing, "50%_off");
        let out = render(&criteria, &Params::new()).unwrap();

        assert_eq!(out.sql(), "(member.username LIKE ? ESCAPE '\\')");
        assert_eq!(out.binds(), &[Value::from("%50\\%\\_off%")]);
    }

    #[test]
    fn test_ignore_case_wraps_both_sides() {
        let criteria = Criteria::new().and(
            Predicate::new("username", Operator::Equals)
                .operand(Operand::Param("username".to_string()))
                .ignoring_case(),
        );
        let out = render(&criteria, &Params::new().bind("username", "aaa")).unwrap();
        assert_eq!(out.sql(), "(UPPER(member.username) = UPPER(?))");
    }

    #[test]
    fn test_parameter_names_are_distinct() {
        let criteria = Criteria::new()
            .param("username", Operator::Equals, "username")
            .or(Predicate::new("username", Operator::Like).operand(Operand::Param("username".to_string())));
        assert_eq!(criteria.parameter_names(), vec!["username"]);
    }

    #[test]
    fn test_unknown_property() {
        let criteria = Criteria::new().eq("nickname", "AAA");
        assert!(matches!(
            render(&criteria, &Params::new()),
            Err(QueryError::NoProperty { .. })
        ));
    }

    #[test]
    fn test_collection_rejected_for_scalar_operator() {
        let criteria = Criteria::new().param("age", Operator::GreaterThan, "age");
        let params = Params::new().bind_list("age", [1, 2]);
        assert!(matches!(
            render(&criteria, &params),
            Err(QueryError::InvalidPredicate { .. })
        ));
    }
}
