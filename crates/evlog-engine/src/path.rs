//! Relationship paths ("via") and the cascade query built from them.
//!
//! A membership's `via` names the relations leading from the member entity
//! towards the group's target, dot-separated. The cascade walks the path the
//! other way round, starting at the target:
//!
//! ```text
//! member eventLogAction, target eventLogGroup, via "eventLog.eventLogEntity"
//!
//! eventLogGroup(key)
//!     .get("eventLogEntity")
//!     .get("eventLog")
//!     .get("eventLogAction", {id: <changed action id>})
//! ```

use evlog_core::query::{Filter, Selection, TraversalQuery};
use evlog_core::schema::KeyColumn;

/// A parsed `via` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViaPath {
    raw: String,
    hops: Vec<String>,
}

impl ViaPath {
    /// Parse a dot-delimited path. An empty string has no hops.
    #[must_use]
    pub fn parse(via: &str) -> Self {
        let hops = if via.is_empty() {
            Vec::new()
        } else {
            via.split('.').rev().map(str::to_string).collect()
        };
        Self {
            raw: via.to_string(),
            hops,
        }
    }

    /// Hops in traversal order, starting at the target entity.
    #[must_use]
    pub fn hops(&self) -> &[String] {
        &self.hops
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// The path as configured.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Build the query finding every `target` row reachable from the source
    /// row identified by `source_key`.
    ///
    /// With an empty path and `target == source`, the source row is its own
    /// target and the key filters the root directly.
    #[must_use]
    pub fn cascade_query(
        &self,
        target: &str,
        target_keys: &[KeyColumn],
        source: &str,
        source_key: Filter,
    ) -> TraversalQuery {
        let select = Selection::Columns(target_keys.iter().map(|k| k.name.clone()).collect());
        let query = TraversalQuery::new(target).select(select);
        if self.is_empty() && target == source {
            return query.filter(source_key);
        }
        self.hops
            .iter()
            .fold(query, |query, hop| query.get(hop))
            .get_filtered(source, source_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evlog_core::value::Value;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("", &[])]
    #[case("eventLog", &["eventLog"])]
    #[case("eventLog.eventLogEntity", &["eventLogEntity", "eventLog"])]
    #[case("a.b.c", &["c", "b", "a"])]
    fn parse_reverses_hops(#[case] via: &str, #[case] expected: &[&str]) {
        let path = ViaPath::parse(via);
        assert_eq!(path.hops(), expected);
        assert_eq!(path.as_str(), via);
    }

    #[test]
    fn cascade_query_walks_reversed_path_then_filters_source() {
        let path = ViaPath::parse("eventLog.eventLogEntity");
        let query = path.cascade_query(
            "eventLogGroup",
            &[KeyColumn::number("id")],
            "eventLogAction",
            Filter::new().eq("id", 4),
        );
        assert_eq!(query.root, "eventLogGroup");
        assert_eq!(query.select, Selection::columns(&["id"]));
        assert_eq!(
            query.path(),
            vec!["eventLogEntity", "eventLog", "eventLogAction"]
        );
        assert!(query.filter.is_empty());
        let last = query.hops.last().unwrap();
        assert_eq!(
            last.filter.iter().collect::<Vec<_>>(),
            vec![("id", &Value::Integer(4))]
        );
    }

    #[test]
    fn empty_path_hops_straight_to_source() {
        let query = ViaPath::parse("").cascade_query(
            "article",
            &[KeyColumn::number("id")],
            "comment",
            Filter::new().eq("id", 1),
        );
        assert_eq!(query.path(), vec!["comment"]);
    }

    #[test]
    fn empty_path_onto_itself_filters_root() {
        let query = ViaPath::parse("").cascade_query(
            "article",
            &[KeyColumn::number("id")],
            "article",
            Filter::new().eq("id", 1),
        );
        assert!(query.hops.is_empty());
        assert!(!query.filter.is_empty());
    }
}
