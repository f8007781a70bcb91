//! Value conversion and SQL text helpers.
//!
//! Every statement in this crate is built from introspected table and column
//! names, so identifiers are always quoted and values always bound.

use evlog_core::value::Value;

/// Quote an SQL identifier, doubling embedded quotes.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `alias."column"`
#[must_use]
pub fn qualified(alias: &str, column: &str) -> String {
    format!("{alias}.{}", quote_ident(column))
}

#[must_use]
pub fn to_libsql(value: &Value) -> libsql::Value {
    match value {
        Value::Null => libsql::Value::Null,
        Value::Integer(i) => libsql::Value::Integer(*i),
        Value::Real(r) => libsql::Value::Real(*r),
        Value::Text(s) => libsql::Value::Text(s.clone()),
        Value::Blob(b) => libsql::Value::Blob(b.clone()),
    }
}

#[must_use]
pub fn from_libsql(value: libsql::Value) -> Value {
    match value {
        libsql::Value::Null => Value::Null,
        libsql::Value::Integer(i) => Value::Integer(i),
        libsql::Value::Real(r) => Value::Real(r),
        libsql::Value::Text(s) => Value::Text(s),
        libsql::Value::Blob(b) => Value::Blob(b),
    }
}

/// Render `alias."col" = ?N AND ...`, pushing bound values onto `params`.
///
/// Parameters are numbered, so clauses may appear in the SQL text in any
/// order relative to the order values were pushed.
pub fn equality_clause<'a, I>(alias: &str, filter: I, params: &mut Vec<libsql::Value>) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, &'a Value)>,
{
    filter
        .into_iter()
        .map(|(column, value)| {
            params.push(to_libsql(value));
            format!("{} = ?{}", qualified(alias, column), params.len())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("eventLog", "\"eventLog\"")]
    #[case("we\"ird", "\"we\"\"ird\"")]
    #[case("eventLogGroup_eventLogEntity", "\"eventLogGroup_eventLogEntity\"")]
    fn quote_ident_escapes_quotes(#[case] name: &str, #[case] quoted: &str) {
        assert_eq!(quote_ident(name), quoted);
    }

    #[test]
    fn qualified_quotes_only_the_column() {
        assert_eq!(qualified("t1", "id_article"), "t1.\"id_article\"");
    }

    #[test]
    fn equality_clause_numbers_params_after_existing() {
        let mut params = vec![libsql::Value::Integer(1)];
        let filter = [("id", &Value::Integer(5)), ("identifier", &Value::Null)];
        let clauses = equality_clause("t2", filter, &mut params);
        assert_eq!(clauses, vec!["t2.\"id\" = ?2", "t2.\"identifier\" = ?3"]);
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn libsql_values_convert_both_ways() {
        for value in [
            Value::Null,
            Value::Integer(3),
            Value::Real(1.5),
            Value::Text("x".into()),
            Value::Blob(vec![0, 1]),
        ] {
            assert_eq!(from_libsql(to_libsql(&value)), value);
        }
    }
}
