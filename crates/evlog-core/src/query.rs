//! Relation traversal plans and their raw results.
//!
//! A `TraversalQuery` starts at a root entity and walks named relations hop
//! by hop, like an ORM's `.get(relation, filter)` chaining. Hops either only
//! constrain the root set (filter hops) or are also returned as nested
//! sub-collections (fetched hops). Stores execute a query in a single round
//! trip and return untransformed `RawRecord` trees.

use std::collections::BTreeMap;

use crate::value::Value;

/// Which columns to return for the root or a fetched hop.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    Columns(Vec<String>),
}

impl Selection {
    #[must_use]
    pub fn columns<S: AsRef<str>>(names: &[S]) -> Self {
        Self::Columns(names.iter().map(|n| n.as_ref().to_string()).collect())
    }
}

/// Conjunction of column equality constraints.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter(Vec<(String, Value)>);

impl Filter {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a `column = value` constraint.
    #[must_use]
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.0.push((column.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(c, v)| (c.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for Filter {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One step along a named relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Hop {
    pub relation: String,
    pub filter: Filter,
    /// `Some` when the related rows are returned as a nested collection.
    pub fetch: Option<Selection>,
}

/// Sort key on a root column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// A multi-hop relation traversal rooted at one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalQuery {
    pub root: String,
    pub select: Selection,
    pub filter: Filter,
    pub hops: Vec<Hop>,
    pub order: Option<Order>,
    /// Maximum number of root rows. Only valid without fetched hops.
    pub limit: Option<u32>,
}

impl TraversalQuery {
    #[must_use]
    pub fn new(root: &str) -> Self {
        Self {
            root: root.to_string(),
            select: Selection::All,
            filter: Filter::new(),
            hops: Vec::new(),
            order: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn select(mut self, select: Selection) -> Self {
        self.select = select;
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Constrain the result to rows reachable through `relation`.
    #[must_use]
    pub fn get(self, relation: &str) -> Self {
        self.get_filtered(relation, Filter::new())
    }

    /// Constrain the result to rows reachable through `relation` whose
    /// related row matches `filter`.
    #[must_use]
    pub fn get_filtered(mut self, relation: &str, filter: Filter) -> Self {
        self.hops.push(Hop {
            relation: relation.to_string(),
            filter,
            fetch: None,
        });
        self
    }

    /// Return rows reachable through `relation` as a nested collection.
    /// Root rows without related rows are still returned.
    #[must_use]
    pub fn fetch(mut self, relation: &str, select: Selection) -> Self {
        self.hops.push(Hop {
            relation: relation.to_string(),
            filter: Filter::new(),
            fetch: Some(select),
        });
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: &str) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            descending: false,
        });
        self
    }

    #[must_use]
    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            descending: true,
        });
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Hop relation names, in traversal order.
    #[must_use]
    pub fn path(&self) -> Vec<&str> {
        self.hops.iter().map(|h| h.relation.as_str()).collect()
    }
}

/// One untransformed result row with nested fetched relations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRecord {
    pub columns: BTreeMap<String, Value>,
    pub related: BTreeMap<String, Vec<RawRecord>>,
}

impl RawRecord {
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Nested rows fetched through `relation`; empty when none matched.
    #[must_use]
    pub fn related(&self, relation: &str) -> &[Self] {
        self.related.get(relation).map_or(&[], Vec::as_slice)
    }
}

/// A relation addressed by its role, used to assign explicit accessor names
/// when two relations from one table would otherwise share a derived name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationRole {
    /// `table.column` references another table's key.
    Reference { table: String, column: String },
    /// The inverse of `referencing_table.column` as seen from `table`.
    Reverse {
        table: String,
        referencing_table: String,
        column: String,
    },
    /// Many-to-many from `table` through the mapping table `via`.
    Mapping { table: String, via: String },
}

impl RelationRole {
    /// The table this relation is accessed from.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::Reference { table, .. }
            | Self::Reverse { table, .. }
            | Self::Mapping { table, .. } => table,
        }
    }
}
