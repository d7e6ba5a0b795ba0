//! # Named Parameters
//!
//! Parsing of explicit SQL with `:name` placeholders and by-name binding.
//!
//! ## Placeholder Expansion
//! ```text
//! SELECT m.* FROM member m WHERE m.username IN :names AND m.age > :age
//!                                              │               │
//!   Params { names: List[AAA, BBB], age: 10 }  │               │
//!                                              ▼               ▼
//! SELECT m.* FROM member m WHERE m.username IN (?, ?) AND m.age > ?
//!   binds = [AAA, BBB, 10]
//! ```
//!
//! Placeholders inside single-quoted literals, double-quoted identifiers and
//! `::` casts are left alone. Positional `?` parameters are rejected because
//! binding is strictly by name.

use roster_core::Value;

use super::sql::Statement;
use super::QueryError;

// =============================================================================
// Parameter Values
// =============================================================================

/// A bound parameter: one value or a collection (for `IN`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(Value),
    List(Vec<Value>),
}

impl ParamValue {
    /// The values in bind order.
    pub fn values(&self) -> &[Value] {
        match self {
            ParamValue::Single(value) => std::slice::from_ref(value),
            ParamValue::List(values) => values,
        }
    }
}

/// Parameters bound by name.
///
/// Binding the same name twice is not an error until the parameters are
/// used, at which point it fails with [`QueryError::DuplicateParameter`].
///
/// ## Example
/// ```rust
/// use roster_db::query::Params;
///
/// let params = Params::new()
///     .bind("username", "AAA")
///     .bind("age", 10)
///     .bind_list("names", ["AAA", "BBB"]);
/// assert_eq!(params.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
    duplicate: Option<String>,
}

impl Params {
    pub fn new() -> Self {
        Params::default()
    }

    /// Binds a single value.
    pub fn bind(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name.into(), ParamValue::Single(value.into()))
    }

    /// Binds a collection, expanded to `(?, ?, ...)` where used.
    pub fn bind_list<I, V>(self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push(name.into(), ParamValue::List(values))
    }

    fn push(mut self, name: String, value: ParamValue) -> Self {
        if self.duplicate.is_none() && self.get(&name).is_some() {
            self.duplicate = Some(name.clone());
        }
        self.entries.push((name, value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Checks that exactly the `expected` names are bound, each once.
    ///
    /// ## Errors
    /// - `DuplicateParameter` when a name was bound twice
    /// - `MissingParameter` for the first expected name that is unbound
    /// - `UnexpectedParameter` for the first bound name nobody uses
    pub fn check<'a>(&self, expected: impl IntoIterator<Item = &'a str> + Clone) -> Result<(), QueryError> {
        if let Some(name) = &self.duplicate {
            return Err(QueryError::DuplicateParameter(name.clone()));
        }

        if let Some(missing) = expected.clone().into_iter().find(|name| self.get(name).is_none()) {
            return Err(QueryError::MissingParameter(missing.to_string()));
        }

        if let Some(unexpected) = self
            .names()
            .find(|bound| !expected.clone().into_iter().any(|name| name == *bound))
        {
            return Err(QueryError::UnexpectedParameter(unexpected.to_string()));
        }

        Ok(())
    }
}

// =============================================================================
// Parsed SQL
// =============================================================================

/// Explicit SQL split around its `:name` placeholders.
///
/// `fragments.len() == slots.len() + 1`; slot `i` sits between fragment `i`
/// and fragment `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSql {
    fragments: Vec<String>,
    slots: Vec<String>,
}

impl ParsedSql {
    /// Scans `sql` for placeholders.
    ///
    /// ## Errors
    /// `InvalidSql` for empty SQL, positional `?` parameters, a bare `:`
    /// followed by nothing, or an unterminated quote.
    pub fn parse(sql: &str) -> Result<Self, QueryError> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(QueryError::InvalidSql("query is empty".to_string()));
        }

        let chars: Vec<char> = sql.chars().collect();
        let mut fragments = Vec::new();
        let mut slots = Vec::new();
        let mut current = String::new();
        let mut quote: Option<char> = None;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];

            if let Some(open) = quote {
                current.push(c);
                if c == open {
                    quote = None;
                }
                i += 1;
                continue;
            }

            match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                    i += 1;
                }
                '?' => {
                    return Err(QueryError::InvalidSql(
                        "positional parameters are not supported, use :name".to_string(),
                    ));
                }
                ':' if chars.get(i + 1) == Some(&':') => {
                    current.push_str("::");
                    i += 2;
                }
                ':' => {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && is_name_char(chars[end], end == start) {
                        end += 1;
                    }
                    if end == start {
                        return Err(QueryError::InvalidSql(format!(
                            "expected a parameter name after ':' at position {}",
                            i
                        )));
                    }
                    fragments.push(std::mem::take(&mut current));
                    slots.push(chars[start..end].iter().collect());
                    i = end;
                }
                _ => {
                    current.push(c);
                    i += 1;
                }
            }
        }

        if quote.is_some() {
            return Err(QueryError::InvalidSql("unterminated quoted text".to_string()));
        }

        fragments.push(current);
        Ok(ParsedSql { fragments, slots })
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn parameter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for slot in &self.slots {
            if !names.contains(&slot.as_str()) {
                names.push(slot);
            }
        }
        names
    }

    /// Renders with positional `?` and collects bind values.
    pub fn bind(&self, params: &Params) -> Result<Statement, QueryError> {
        params.check(self.parameter_names())?;

        let mut statement = Statement::new();
        for (fragment, slot) in self.fragments.iter().zip(&self.slots) {
            statement.push_sql(fragment);
            match params.get(slot) {
                Some(ParamValue::Single(value)) => statement.push_bind(value.clone()),
                Some(ParamValue::List(values)) => statement.push_bind_list(values),
                None => return Err(QueryError::MissingParameter(slot.clone())),
            }
        }
        if let Some(last) = self.fragments.last() {
            statement.push_sql(last);
        }
        Ok(statement)
    }
}

fn is_name_char(c: char, first: bool) -> bool {
    if first {
        c.is_ascii_alphabetic() || c == '_'
    } else {
        c.is_ascii_alphanumeric() || c == '_'
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_placeholders() {
        let parsed = ParsedSql::parse(
            "SELECT m.* FROM member m WHERE m.username = :username AND m.age = :age",
        )
        .unwrap();
        assert_eq!(parsed.parameter_names(), vec!["username", "age"]);

        let statement = parsed
            .bind(&Params::new().bind("username", "AAA").bind("age", 10))
            .unwrap();
        assert_eq!(
            statement.sql(),
            "SELECT m.* FROM member m WHERE m.username = ? AND m.age = ?"
        );
        assert_eq!(statement.binds(), &[Value::from("AAA"), Value::from(10)]);
    }

    #[test]
    fn test_literals_and_casts_are_not_placeholders() {
        let parsed =
            ParsedSql::parse("SELECT ':skip', \"a:b\", age::TEXT FROM member WHERE age = :age").unwrap();
        assert_eq!(parsed.parameter_names(), vec!["age"]);
    }

    #[test]
    fn test_list_parameter_expands() {
        let parsed = ParsedSql::parse("SELECT m.* FROM member m WHERE m.username IN :names").unwrap();
        let statement = parsed
            .bind(&Params::new().bind_list("names", ["AAA", "BBB"]))
            .unwrap();

        assert!(statement.sql().ends_with("IN (?, ?)"));
        assert_eq!(statement.binds().len(), 2);
    }

    #[test]
    fn test_repeated_placeholder_binds_twice() {
        let parsed = ParsedSql::parse("SELECT 1 WHERE :a = :a").unwrap();
        let statement = parsed.bind(&Params::new().bind("a", 1)).unwrap();
        assert_eq!(statement.binds().len(), 2);
    }

    #[test]
    fn test_binding_errors() {
        let parsed = ParsedSql::parse("SELECT m.* FROM member m WHERE m.username = :username").unwrap();

        assert_eq!(
            parsed.bind(&Params::new()).unwrap_err(),
            QueryError::MissingParameter("username".to_string())
        );
        assert_eq!(
            parsed
                .bind(&Params::new().bind("username", "AAA").bind("age", 1))
                .unwrap_err(),
            QueryError::UnexpectedParameter("age".to_string())
        );
        assert_eq!(
            parsed
                .bind(&Params::new().bind("username", "AAA").bind("username", "BBB"))
                .unwrap_err(),
            QueryError::DuplicateParameter("username".to_string())
        );
    }

    #[test]
    fn test_rejects_positional_and_malformed_sql() {
        assert!(ParsedSql::parse("SELECT * FROM member WHERE age = ?").is_err());
        assert!(ParsedSql::parse("SELECT * FROM member WHERE age = : ").is_err());
        assert!(ParsedSql::parse("SELECT 'open").is_err());
        assert!(ParsedSql::parse("   ").is_err());
    }
}
