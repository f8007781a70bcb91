//! Schema introspection and relation naming.
//!
//! The store knows nothing about the tables it hosts until it reads them from
//! `sqlite_master`. From the foreign keys it derives named relations the way
//! an ORM does:
//!
//! ```text
//! comment.id_article -> article.id
//!
//!   comment --"article"--> article     (reference)
//!   article --"comment"--> comment     (reverse reference)
//!
//! article_tag(id_article, id_tag) with PRIMARY KEY (id_article, id_tag)
//!
//!   article --"tag"-->     tag         (mapping via article_tag)
//!   tag     --"article"--> article     (mapping via article_tag)
//! ```
//!
//! Derived names can collide (two relations from one table to the same
//! table). Explicit accessor names, keyed by `RelationRole`, always win over
//! derived names; a derived name shared by several relations is ambiguous.

use std::collections::{BTreeMap, HashMap};

use evlog_core::enums::ValueKind;
use evlog_core::errors::StoreError;
use evlog_core::query::{RelationRole, Selection};
use evlog_core::schema::KeyColumn;

use crate::error::DatabaseError;
use crate::helpers::quote_ident;

/// One column of an introspected table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    /// 1-based position inside the primary key, 0 when not part of it.
    pub pk_index: u32,
}

impl ColumnInfo {
    /// Classify by `SQLite` type affinity: INTEGER, REAL and NUMERIC
    /// affinities are numbers, TEXT and BLOB are not.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        let ty = self.declared_type.to_ascii_uppercase();
        if ty.contains("INT") {
            ValueKind::Number
        } else if ty.is_empty()
            || ["CHAR", "CLOB", "TEXT", "BLOB"].iter().any(|t| ty.contains(t))
        {
            ValueKind::Other
        } else {
            ValueKind::Number
        }
    }
}

/// A single-column foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: String,
    pub table: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableInfo {
    /// Primary-key columns in key order.
    #[must_use]
    pub fn key_columns(&self) -> Vec<KeyColumn> {
        let mut keys: Vec<&ColumnInfo> = self.columns.iter().filter(|c| c.pk_index > 0).collect();
        keys.sort_by_key(|c| c.pk_index);
        keys.into_iter()
            .map(|c| KeyColumn {
                name: c.name.clone(),
                kind: c.kind(),
            })
            .collect()
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Resolve a selection against this table's columns.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Query` for a column the table does not have.
    pub fn resolve_selection(&self, selection: &Selection) -> Result<Vec<String>, DatabaseError> {
        match selection {
            Selection::All => Ok(self.column_names()),
            Selection::Columns(columns) => {
                if let Some(missing) = columns.iter().find(|c| !self.has_column(c)) {
                    return Err(DatabaseError::Query(format!(
                        "table {} has no column '{missing}'",
                        self.name
                    )));
                }
                Ok(columns.clone())
            }
        }
    }

    /// The single referenced column used when a foreign key omits its target.
    fn implicit_key(&self) -> Option<String> {
        match self.key_columns().as_slice() {
            [only] => Some(only.name.clone()),
            _ => None,
        }
    }

    /// Whether this table is a pure mapping table between two other tables.
    fn mapping_ends(&self) -> Option<(&ForeignKey, &ForeignKey)> {
        let keys = self.key_columns();
        if keys.len() != 2 || self.foreign_keys.len() != 2 {
            return None;
        }
        let (a, b) = (&self.foreign_keys[0], &self.foreign_keys[1]);
        let covers = keys.iter().all(|k| k.name == a.column || k.name == b.column);
        (covers && a.column != b.column && a.table != b.table).then_some((a, b))
    }
}

/// How two tables are joined for one relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    /// `source.column = target.target_column`
    Reference { column: String, target_column: String },
    /// `target.column = source.source_column`
    Reverse { column: String, source_column: String },
    /// `via.source_column = source.source_key` and
    /// `via.target_column = target.target_key`
    Mapping {
        via: String,
        source_column: String,
        source_key: String,
        target_column: String,
        target_key: String,
    },
}

/// A named, traversable relation from one table to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub role: RelationRole,
    pub default_name: String,
    pub target: String,
    pub kind: RelationKind,
}

/// Introspected tables and the relations derived from their foreign keys.
#[derive(Debug, Clone, Default)]
pub struct SchemaGraph {
    tables: BTreeMap<String, TableInfo>,
    relations: BTreeMap<String, Vec<Relation>>,
}

impl SchemaGraph {
    /// Build the graph from table definitions.
    #[must_use]
    pub fn from_tables(tables: Vec<TableInfo>) -> Self {
        let tables: BTreeMap<String, TableInfo> =
            tables.into_iter().map(|t| (t.name.clone(), t)).collect();
        let mut relations: BTreeMap<String, Vec<Relation>> = BTreeMap::new();

        for table in tables.values() {
            for fk in &table.foreign_keys {
                relations.entry(table.name.clone()).or_default().push(Relation {
                    role: RelationRole::Reference {
                        table: table.name.clone(),
                        column: fk.column.clone(),
                    },
                    default_name: fk.table.clone(),
                    target: fk.table.clone(),
                    kind: RelationKind::Reference {
                        column: fk.column.clone(),
                        target_column: fk.to.clone(),
                    },
                });
                relations.entry(fk.table.clone()).or_default().push(Relation {
                    role: RelationRole::Reverse {
                        table: fk.table.clone(),
                        referencing_table: table.name.clone(),
                        column: fk.column.clone(),
                    },
                    default_name: table.name.clone(),
                    target: table.name.clone(),
                    kind: RelationKind::Reverse {
                        column: fk.column.clone(),
                        source_column: fk.to.clone(),
                    },
                });
            }

            if let Some((a, b)) = table.mapping_ends() {
                for (from, to) in [(a, b), (b, a)] {
                    relations.entry(from.table.clone()).or_default().push(Relation {
                        role: RelationRole::Mapping {
                            table: from.table.clone(),
                            via: table.name.clone(),
                        },
                        default_name: to.table.clone(),
                        target: to.table.clone(),
                        kind: RelationKind::Mapping {
                            via: table.name.clone(),
                            source_column: from.column.clone(),
                            source_key: from.to.clone(),
                            target_column: to.column.clone(),
                            target_key: to.to.clone(),
                        },
                    });
                }
            }
        }

        Self { tables, relations }
    }

    #[must_use]
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// # Errors
    ///
    /// Returns `StoreError::UnknownTable` if the table was not introspected.
    pub fn table(&self, database: &str, name: &str) -> Result<&TableInfo, DatabaseError> {
        self.tables.get(name).ok_or_else(|| {
            StoreError::UnknownTable {
                database: database.to_string(),
                table: name.to_string(),
            }
            .into()
        })
    }

    /// Whether `role` names a relation in this graph.
    #[must_use]
    pub fn has_role(&self, role: &RelationRole) -> bool {
        self.relations
            .get(role.table())
            .is_some_and(|rels| rels.iter().any(|r| &r.role == role))
    }

    /// Resolve an accessor name on `table` to a relation.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnknownRelation` when nothing answers to `name`,
    /// or `StoreError::AmbiguousRelation` when several relations do.
    pub fn resolve(
        &self,
        table: &str,
        name: &str,
        aliases: &HashMap<RelationRole, String>,
    ) -> Result<&Relation, DatabaseError> {
        let candidates = self.relations.get(table).map_or(&[][..], Vec::as_slice);

        let explicit: Vec<&Relation> = candidates
            .iter()
            .filter(|r| aliases.get(&r.role).is_some_and(|alias| alias == name))
            .collect();
        let matches = if explicit.is_empty() {
            candidates
                .iter()
                .filter(|r| !aliases.contains_key(&r.role) && r.default_name == name)
                .collect()
        } else {
            explicit
        };

        match matches.as_slice() {
            [relation] => Ok(relation),
            [] => Err(StoreError::UnknownRelation {
                table: table.to_string(),
                relation: name.to_string(),
            }
            .into()),
            many => Err(StoreError::AmbiguousRelation {
                table: table.to_string(),
                relation: name.to_string(),
                candidates: many.len(),
            }
            .into()),
        }
    }
}

/// Read every user table, its columns and foreign keys.
///
/// # Errors
///
/// Returns `DatabaseError` if any introspection query fails.
pub async fn introspect(conn: &libsql::Connection) -> Result<SchemaGraph, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            (),
        )
        .await?;
    let mut names = Vec::new();
    while let Some(row) = rows.next().await? {
        names.push(row.get::<String>(0)?);
    }

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let columns = read_columns(conn, &name).await?;
        let raw_fks = read_foreign_keys(conn, &name).await?;
        tables.push((
            TableInfo {
                name,
                columns,
                foreign_keys: Vec::new(),
            },
            raw_fks,
        ));
    }

    // A foreign key without an explicit target column references the
    // target's primary key, which is only known once all tables are read.
    let implicit: HashMap<String, Option<String>> = tables
        .iter()
        .map(|(t, _)| (t.name.clone(), t.implicit_key()))
        .collect();
    let tables = tables
        .into_iter()
        .map(|(mut table, raw_fks)| {
            table.foreign_keys = raw_fks
                .into_iter()
                .filter_map(|(column, target, to)| {
                    let to = to.or_else(|| implicit.get(&target).cloned().flatten())?;
                    Some(ForeignKey {
                        column,
                        table: target,
                        to,
                    })
                })
                .collect();
            table
        })
        .collect();

    let graph = SchemaGraph::from_tables(tables);
    tracing::debug!(tables = graph.tables.len(), "schema introspected");
    Ok(graph)
}

async fn read_columns(
    conn: &libsql::Connection,
    table: &str,
) -> Result<Vec<ColumnInfo>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT name, type, pk FROM pragma_table_info(?1) ORDER BY cid",
            [table],
        )
        .await?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next().await? {
        columns.push(ColumnInfo {
            name: row.get::<String>(0)?,
            declared_type: row.get::<Option<String>>(1)?.unwrap_or_default(),
            pk_index: u32::try_from(row.get::<i64>(2)?).unwrap_or(0),
        });
    }
    if columns.is_empty() {
        return Err(DatabaseError::InvalidState(format!(
            "table {} reported no columns",
            quote_ident(table)
        )));
    }
    Ok(columns)
}

/// Single-column foreign keys as `(column, target table, target column)`.
/// Composite foreign keys are skipped.
async fn read_foreign_keys(
    conn: &libsql::Connection,
    table: &str,
) -> Result<Vec<(String, String, Option<String>)>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT id, \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
            [table],
        )
        .await?;
    let mut grouped: BTreeMap<i64, Vec<(String, String, Option<String>)>> = BTreeMap::new();
    while let Some(row) = rows.next().await? {
        grouped.entry(row.get::<i64>(0)?).or_default().push((
            row.get::<String>(2)?,
            row.get::<String>(1)?,
            row.get::<Option<String>>(3)?,
        ));
    }
    Ok(grouped
        .into_values()
        .filter_map(|mut parts| {
            if parts.len() == 1 {
                parts.pop()
            } else {
                tracing::debug!(table, "skipping composite foreign key");
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn col(name: &str, ty: &str, pk: u32) -> ColumnInfo {
        ColumnInfo {
            name: name.into(),
            declared_type: ty.into(),
            pk_index: pk,
        }
    }

    fn fk(column: &str, table: &str) -> ForeignKey {
        ForeignKey {
            column: column.into(),
            table: table.into(),
            to: "id".into(),
        }
    }

    fn blog() -> SchemaGraph {
        SchemaGraph::from_tables(vec![
            TableInfo {
                name: "article".into(),
                columns: vec![col("id", "INTEGER", 1), col("title", "TEXT", 0)],
                foreign_keys: vec![],
            },
            TableInfo {
                name: "comment".into(),
                columns: vec![col("id", "INTEGER", 1), col("id_article", "INTEGER", 0)],
                foreign_keys: vec![fk("id_article", "article")],
            },
            TableInfo {
                name: "tag".into(),
                columns: vec![col("id", "INTEGER", 1)],
                foreign_keys: vec![],
            },
            TableInfo {
                name: "article_tag".into(),
                columns: vec![col("id_article", "INTEGER", 1), col("id_tag", "INTEGER", 2)],
                foreign_keys: vec![fk("id_article", "article"), fk("id_tag", "tag")],
            },
            TableInfo {
                name: "featured".into(),
                columns: vec![col("id", "INTEGER", 1), col("id_article", "INTEGER", 0)],
                foreign_keys: vec![fk("id_article", "article")],
            },
        ])
    }

    #[test]
    fn affinity_classification() {
        assert_eq!(col("a", "INTEGER", 0).kind(), ValueKind::Number);
        assert_eq!(col("a", "bigint", 0).kind(), ValueKind::Number);
        assert_eq!(col("a", "DECIMAL(10,2)", 0).kind(), ValueKind::Number);
        assert_eq!(col("a", "REAL", 0).kind(), ValueKind::Number);
        assert_eq!(col("a", "VARCHAR(20)", 0).kind(), ValueKind::Other);
        assert_eq!(col("a", "TEXT", 0).kind(), ValueKind::Other);
        assert_eq!(col("a", "", 0).kind(), ValueKind::Other);
    }

    #[test]
    fn key_columns_follow_pk_order() {
        let table = TableInfo {
            name: "t".into(),
            columns: vec![col("b", "TEXT", 2), col("x", "TEXT", 0), col("a", "INTEGER", 1)],
            foreign_keys: vec![],
        };
        assert_eq!(
            table.key_columns(),
            vec![KeyColumn::number("a"), KeyColumn::other("b")]
        );
    }

    #[test]
    fn reference_and_reverse_are_derived() {
        let graph = blog();
        let aliases = HashMap::new();
        let up = graph.resolve("comment", "article", &aliases).unwrap();
        assert_eq!(up.target, "article");
        assert!(matches!(up.kind, RelationKind::Reference { .. }));

        let down = graph.resolve("article", "comment", &aliases).unwrap();
        assert_eq!(down.target, "comment");
        assert!(matches!(down.kind, RelationKind::Reverse { .. }));
    }

    #[test]
    fn mapping_tables_produce_many_to_many() {
        let graph = blog();
        let rel = graph.resolve("article", "tag", &HashMap::new()).unwrap();
        assert_eq!(rel.target, "tag");
        assert!(matches!(&rel.kind, RelationKind::Mapping { via, .. } if via == "article_tag"));
        assert!(graph.resolve("tag", "article", &HashMap::new()).is_ok());
    }

    #[test]
    fn unknown_relation_is_reported() {
        let err = blog()
            .resolve("article", "author", &HashMap::new())
            .unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Store(StoreError::UnknownRelation { .. })
        ));
    }

    #[test]
    fn colliding_derived_names_are_ambiguous_until_aliased() {
        // Two references from one table to article both derive "article".
        let graph = SchemaGraph::from_tables(vec![
            TableInfo {
                name: "article".into(),
                columns: vec![col("id", "INTEGER", 1)],
                foreign_keys: vec![],
            },
            TableInfo {
                name: "link".into(),
                columns: vec![
                    col("id", "INTEGER", 1),
                    col("id_source", "INTEGER", 0),
                    col("id_target", "INTEGER", 0),
                ],
                foreign_keys: vec![fk("id_source", "article"), fk("id_target", "article")],
            },
        ]);

        let mut aliases = HashMap::new();
        let err = graph.resolve("link", "article", &aliases).unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Store(StoreError::AmbiguousRelation { candidates: 2, .. })
        ));

        aliases.insert(
            RelationRole::Reference {
                table: "link".into(),
                column: "id_target".into(),
            },
            "target".into(),
        );
        let target = graph.resolve("link", "target", &aliases).unwrap();
        assert!(
            matches!(&target.kind, RelationKind::Reference { column, .. } if column == "id_target")
        );
        // The remaining derived name is now unique.
        let source = graph.resolve("link", "article", &aliases).unwrap();
        assert!(
            matches!(&source.kind, RelationKind::Reference { column, .. } if column == "id_source")
        );
    }

    #[test]
    fn explicit_alias_beats_derived_name() {
        let graph = blog();
        let mut aliases = HashMap::new();
        // Alias the mapping onto the reverse reference's derived name.
        aliases.insert(
            RelationRole::Mapping {
                table: "article".into(),
                via: "article_tag".into(),
            },
            "comment".into(),
        );
        let rel = graph.resolve("article", "comment", &aliases).unwrap();
        assert!(matches!(rel.kind, RelationKind::Mapping { .. }));
    }

    #[test]
    fn has_role_checks_source_table() {
        let graph = blog();
        assert!(graph.has_role(&RelationRole::Reference {
            table: "featured".into(),
            column: "id_article".into(),
        }));
        assert!(!graph.has_role(&RelationRole::Reference {
            table: "featured".into(),
            column: "nope".into(),
        }));
    }
}
