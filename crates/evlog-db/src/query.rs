//! Compile relation traversals to a single SQL statement and fold the flat
//! result back into nested `RawRecord` trees.
//!
//! Filter hops become inner joins whose constraints land in `WHERE`; the
//! root set is made `DISTINCT` because several related rows can match one
//! root row. Fetched hops become left joins so roots without related rows
//! survive, and each fetched level is nested under the previous one.

use std::collections::{BTreeMap, HashMap};

use evlog_core::query::{Filter, RawRecord, RelationRole, TraversalQuery};
use evlog_core::value::Value;

use crate::error::DatabaseError;
use crate::helpers::{equality_clause, from_libsql, qualified, quote_ident};
use crate::schema::{RelationKind, SchemaGraph};

/// Columns read for one result level; the root level has no relation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Level {
    relation: Option<String>,
    columns: Vec<String>,
}

#[derive(Debug)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<libsql::Value>,
    levels: Vec<Level>,
}

impl CompiledQuery {
    fn width(&self) -> usize {
        self.levels.iter().map(|l| l.columns.len()).sum()
    }
}

/// Build the SQL for `query`.
///
/// # Errors
///
/// Returns `DatabaseError` for unknown tables, columns, or relations, when
/// filter and fetched hops are mixed in one traversal, and when a limit is
/// combined with fetched hops.
pub fn compile(
    database: &str,
    schema: &SchemaGraph,
    aliases: &HashMap<RelationRole, String>,
    query: &TraversalQuery,
) -> Result<CompiledQuery, DatabaseError> {
    let fetching = query.hops.iter().any(|h| h.fetch.is_some());
    if fetching && query.hops.iter().any(|h| h.fetch.is_none()) {
        return Err(DatabaseError::Query(format!(
            "traversal from {} mixes filtered and fetched hops",
            query.root
        )));
    }

    if fetching && query.limit.is_some() {
        return Err(DatabaseError::Query(format!(
            "traversal from {} limits rows while fetching relations",
            query.root
        )));
    }

    let root = schema.table(database, &query.root)?;
    let mut params = Vec::new();
    let mut joins = Vec::new();
    let mut conditions = Vec::new();
    let mut levels = vec![Level {
        relation: None,
        columns: root.resolve_selection(&query.select)?,
    }];

    check_filter(root.name.as_str(), &query.filter, |c| root.has_column(c))?;
    conditions.extend(equality_clause("t0", query.filter.iter(), &mut params));
    let order = match &query.order {
        Some(order) if !root.has_column(&order.column) => {
            return Err(DatabaseError::Query(format!(
                "table {} has no column '{}'",
                root.name, order.column
            )));
        }
        Some(order) => Some(format!(
            " ORDER BY {}{}",
            qualified("t0", &order.column),
            if order.descending { " DESC" } else { "" }
        )),
        None => None,
    };

    let mut current = root;
    for (index, hop) in query.hops.iter().enumerate() {
        let relation = schema.resolve(&current.name, &hop.relation, aliases)?;
        let target = schema.table(database, &relation.target)?;
        check_filter(&target.name, &hop.filter, |c| target.has_column(c))?;

        let from = format!("t{index}");
        let to = format!("t{}", index + 1);
        let join = if hop.fetch.is_some() { "LEFT JOIN" } else { "JOIN" };
        let target_sql = quote_ident(&target.name);

        let mut on = match &relation.kind {
            RelationKind::Reference {
                column,
                target_column,
            } => vec![format!(
                "{} = {}",
                qualified(&to, target_column),
                qualified(&from, column)
            )],
            RelationKind::Reverse {
                column,
                source_column,
            } => vec![format!(
                "{} = {}",
                qualified(&to, column),
                qualified(&from, source_column)
            )],
            RelationKind::Mapping {
                via,
                source_column,
                source_key,
                target_column,
                target_key,
            } => {
                let via_alias = format!("m{}", index + 1);
                joins.push(format!(
                    "{join} {} {via_alias} ON {} = {}",
                    quote_ident(via),
                    qualified(&via_alias, source_column),
                    qualified(&from, source_key)
                ));
                vec![format!(
                    "{} = {}",
                    qualified(&to, target_key),
                    qualified(&via_alias, target_column)
                )]
            }
        };

        let filter = equality_clause(&to, hop.filter.iter(), &mut params);
        if let Some(selection) = &hop.fetch {
            on.extend(filter);
            levels.push(Level {
                relation: Some(hop.relation.clone()),
                columns: target.resolve_selection(selection)?,
            });
        } else {
            conditions.extend(filter);
        }
        joins.push(format!("{join} {target_sql} {to} ON {}", on.join(" AND ")));
        current = target;
    }

    // Fetching traversals contain only fetched hops, so level N reads tN.
    let projection: Vec<String> = levels
        .iter()
        .enumerate()
        .flat_map(|(index, level)| {
            let alias = format!("t{index}");
            level
                .columns
                .iter()
                .map(move |c| qualified(&alias, c))
                .collect::<Vec<_>>()
        })
        .collect();

    let mut sql = format!(
        "SELECT {}{} FROM {} t0",
        if fetching { "" } else { "DISTINCT " },
        projection.join(", "),
        quote_ident(&query.root)
    );
    for join in &joins {
        sql.push(' ');
        sql.push_str(join);
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    if let Some(order) = &order {
        sql.push_str(order);
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    Ok(CompiledQuery {
        sql,
        params,
        levels,
    })
}

fn check_filter(
    table: &str,
    filter: &Filter,
    has_column: impl Fn(&str) -> bool,
) -> Result<(), DatabaseError> {
    match filter.iter().find(|(column, _)| !has_column(column)) {
        Some((column, _)) => Err(DatabaseError::Query(format!(
            "table {table} has no column '{column}'"
        ))),
        None => Ok(()),
    }
}

/// Compile and run `query` on `conn`.
///
/// # Errors
///
/// Returns `DatabaseError` if compilation or execution fails.
pub async fn run_traversal(
    conn: &libsql::Connection,
    database: &str,
    schema: &SchemaGraph,
    aliases: &HashMap<RelationRole, String>,
    query: &TraversalQuery,
) -> Result<Vec<RawRecord>, DatabaseError> {
    let compiled = compile(database, schema, aliases, query)?;
    tracing::trace!(sql = %compiled.sql, "running traversal");

    let width = compiled.width();
    let mut rows = conn
        .query(&compiled.sql, libsql::params_from_iter(compiled.params.clone()))
        .await?;
    let mut flat = Vec::new();
    while let Some(row) = rows.next().await? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            let index = i32::try_from(i)
                .map_err(|_| DatabaseError::Query("too many selected columns".into()))?;
            values.push(from_libsql(row.get_value(index)?));
        }
        flat.push(values);
    }
    Ok(fold(&compiled.levels, flat))
}

fn fold(levels: &[Level], rows: Vec<Vec<Value>>) -> Vec<RawRecord> {
    let split = |row: Vec<Value>| -> Vec<BTreeMap<String, Value>> {
        let mut values = row.into_iter();
        levels
            .iter()
            .map(|level| {
                level
                    .columns
                    .iter()
                    .map(|c| (c.clone(), values.next().unwrap_or(Value::Null)))
                    .collect()
            })
            .collect()
    };

    // Nothing fetched: `DISTINCT` already returned one row per root.
    if levels.len() == 1 {
        return rows
            .into_iter()
            .flat_map(split)
            .map(|columns| RawRecord {
                columns,
                related: BTreeMap::new(),
            })
            .collect();
    }

    let mut out = Vec::new();
    let mut index = HashMap::new();
    for row in rows {
        merge_row(&mut out, &mut index, levels, split(row));
    }
    out
}

/// Positions of already folded records, keyed by the positions of their
/// ancestors and their own column values.
type FoldIndex = HashMap<(Vec<usize>, String), usize>;

fn merge_row(
    out: &mut Vec<RawRecord>,
    index: &mut FoldIndex,
    levels: &[Level],
    parts: Vec<BTreeMap<String, Value>>,
) {
    let mut parts = parts.into_iter();
    let Some(root) = parts.next() else {
        return;
    };
    let mut path = Vec::with_capacity(levels.len());
    let position = upsert(out, index, &path, root);
    path.push(position);
    let mut current = &mut out[position];
    for (level, columns) in levels.iter().skip(1).zip(parts) {
        // A left join that matched nothing.
        if columns.values().all(Value::is_null) {
            break;
        }
        let relation = level.relation.clone().unwrap_or_default();
        let children = current.related.entry(relation).or_default();
        let position = upsert(children, index, &path, columns);
        path.push(position);
        current = &mut children[position];
    }
}

fn upsert(
    list: &mut Vec<RawRecord>,
    index: &mut FoldIndex,
    path: &[usize],
    columns: BTreeMap<String, Value>,
) -> usize {
    let key = (path.to_vec(), format!("{columns:?}"));
    *index.entry(key).or_insert_with(|| {
        list.push(RawRecord {
            columns,
            related: BTreeMap::new(),
        });
        list.len() - 1
    })
}
