//! Postgres database
//!
//! Renders the query model as SQL. Every value is bound as `jsonb` and
//! compared against `to_jsonb(column)`, so the same filter works for text,
//! uuid, date and numeric columns. Rows come back as a single `jsonb` value
//! with embedded rows merged in under their alias.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::query::{Direction, Embed, Filter, Insert, Select, Update};
use super::{BackendError, BackendResult, Database};

type Builder = QueryBuilder<'static, Postgres>;

/// Database reached through a sqlx pool
#[derive(Debug, Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Quote a table or column name, refusing anything but `[a-z_][a-z0-9_]*`
fn ident(name: &str) -> BackendResult<String> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid {
        Ok(format!("\"{}\"", name))
    } else {
        Err(BackendError::InvalidIdentifier(name.to_string()))
    }
}

fn push_filter(qb: &mut Builder, alias: &str, filter: &Filter) -> BackendResult<()> {
    match filter {
        Filter::Eq(column, value) => {
            qb.push(format!("to_jsonb({}.{}) = ", alias, ident(column)?));
            qb.push_bind(value.clone());
        }
        Filter::In(column, values) => {
            qb.push_bind(Value::Array(values.clone()));
            qb.push(format!(" @> jsonb_build_array({}.{})", alias, ident(column)?));
        }
        Filter::Gte(column, value) => {
            qb.push(format!("to_jsonb({}.{}) >= ", alias, ident(column)?));
            qb.push_bind(value.clone());
        }
        Filter::Lte(column, value) => {
            qb.push(format!("to_jsonb({}.{}) <= ", alias, ident(column)?));
            qb.push_bind(value.clone());
        }
        Filter::IsNull(column) => {
            qb.push(format!("{}.{} IS NULL", alias, ident(column)?));
        }
        Filter::Or(filters) if filters.is_empty() => {
            qb.push("FALSE");
        }
        Filter::Or(filters) => {
            qb.push("(");
            for (i, inner) in filters.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                push_filter(qb, alias, inner)?;
            }
            qb.push(")");
        }
    }
    Ok(())
}

fn push_conditions(qb: &mut Builder, alias: &str, filters: &[Filter]) -> BackendResult<()> {
    for filter in filters {
        qb.push(" AND ");
        push_filter(qb, alias, filter)?;
    }
    Ok(())
}

fn push_where(qb: &mut Builder, alias: &str, filters: &[Filter]) -> BackendResult<()> {
    for (i, filter) in filters.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        push_filter(qb, alias, filter)?;
    }
    Ok(())
}

/// `to_jsonb(t)` plus one subselect per embed
fn push_projection(qb: &mut Builder, embeds: &[Embed]) -> BackendResult<()> {
    qb.push("to_jsonb(t)");
    for (i, embed) in embeds.iter().enumerate() {
        let alias = format!("e{}", i);
        // validated, so safe inside a string literal
        ident(embed.alias)?;
        qb.push(format!(
            " || jsonb_build_object('{}', (SELECT to_jsonb({a}) FROM {} AS {a} WHERE {a}.\"id\" = t.{}",
            embed.alias,
            ident(embed.table)?,
            ident(embed.column)?,
            a = alias,
        ));
        push_conditions(qb, &alias, &embed.filters)?;
        qb.push(" LIMIT 1))");
    }
    Ok(())
}

fn build_select(query: &Select) -> BackendResult<Builder> {
    let mut qb = Builder::new("SELECT ");
    push_projection(&mut qb, &query.embeds)?;
    qb.push(format!(" FROM {} AS t", ident(query.table)?));
    push_where(&mut qb, "t", &query.filters)?;

    for (i, order) in query.order.iter().enumerate() {
        qb.push(if i == 0 { " ORDER BY " } else { ", " });
        qb.push(format!(
            "t.{} {}",
            ident(order.column)?,
            match order.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            }
        ));
    }

    if let Some(limit) = query.limit {
        qb.push(" LIMIT ");
        qb.push_bind(limit as i64);
    }

    Ok(qb)
}

fn build_insert(insert: &Insert) -> BackendResult<Builder> {
    let table = ident(insert.table)?;
    let mut qb = Builder::new(format!("WITH t AS (INSERT INTO {} ", table));

    if insert.values.is_empty() {
        qb.push("DEFAULT VALUES");
    } else {
        let columns = insert
            .values
            .keys()
            .map(|column| ident(column))
            .collect::<BackendResult<Vec<_>>>()?;

        qb.push(format!("({}) SELECT ", columns.join(", ")));
        qb.push(
            columns
                .iter()
                .map(|column| format!("r.{}", column))
                .collect::<Vec<_>>()
                .join(", "),
        );
        qb.push(format!(" FROM jsonb_populate_record(NULL::{}, ", table));
        qb.push_bind(Value::Object(insert.values.clone()));
        qb.push(") AS r");
    }

    qb.push(" RETURNING *) SELECT ");
    push_projection(&mut qb, &insert.embeds)?;
    qb.push(" FROM t");
    Ok(qb)
}

fn build_update(update: &Update) -> BackendResult<Builder> {
    if update.values.is_empty() {
        return Err(BackendError::InvalidRequest(format!(
            "update on {} sets no columns",
            update.table
        )));
    }
    if update.filters.is_empty() {
        return Err(BackendError::InvalidRequest(format!(
            "update on {} without filters",
            update.table
        )));
    }

    let table = ident(update.table)?;
    let assignments = update
        .values
        .keys()
        .map(|column| ident(column).map(|c| format!("{c} = r.{c}")))
        .collect::<BackendResult<Vec<_>>>()?;

    let mut qb = Builder::new(format!(
        "WITH t AS (UPDATE {} AS x SET {} FROM jsonb_populate_record(NULL::{}, ",
        table,
        assignments.join(", "),
        table
    ));
    qb.push_bind(Value::Object(update.values.clone()));
    qb.push(") AS r");
    push_where(&mut qb, "x", &update.filters)?;
    qb.push(" RETURNING x.*) SELECT ");
    push_projection(&mut qb, &update.embeds)?;
    qb.push(" FROM t");
    Ok(qb)
}

#[async_trait]
impl Database for PgDatabase {
    async fn select(&self, query: &Select) -> BackendResult<Vec<Value>> {
        let mut qb = build_select(query)?;
        let rows = qb.build_query_scalar::<Value>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn insert(&self, insert: &Insert) -> BackendResult<Value> {
        let mut qb = build_insert(insert)?;
        let row = qb.build_query_scalar::<Value>().fetch_one(&self.pool).await?;
        Ok(row)
    }

    async fn update(&self, update: &Update) -> BackendResult<Vec<Value>> {
        let mut qb = build_update(update)?;
        let rows = qb.build_query_scalar::<Value>().fetch_all(&self.pool).await?;
        Ok(rows)
    }
}
