//! In-memory database
//!
//! Evaluates the query model over JSON rows kept in process. Used by the test
//! suites and for running the API without a hosted database. It records every
//! call and can be told to reject calls on a table, which is how tests observe
//! the "exactly one remote call" and "abort on failure" behaviors.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::query::{Direction, Embed, Filter, Insert, Select, Update};
use super::{BackendError, BackendResult, Database};

/// Kind of remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Insert,
    Update,
}

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    pub table: String,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, Vec<Value>>,
    failures: Vec<(Operation, String)>,
    calls: Vec<Call>,
}

/// Process-local stand-in for the hosted database
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    state: Mutex<State>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append rows to a table
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Current contents of a table
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Reject every later `operation` on `table`
    pub fn fail_on(&self, operation: Operation, table: &str) {
        self.lock().failures.push((operation, table.to_string()));
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, operation: Operation, table: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation == operation && call.table == table)
            .count()
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }
}

impl State {
    fn record(&mut self, operation: Operation, table: &str) -> BackendResult<()> {
        self.calls.push(Call {
            operation,
            table: table.to_string(),
        });

        if self
            .failures
            .iter()
            .any(|(op, name)| *op == operation && name == table)
        {
            return Err(BackendError::Rejected(format!(
                "{:?} on {} rejected",
                operation, table
            )));
        }

        Ok(())
    }

    fn with_embeds(&self, mut row: Value, embeds: &[Embed]) -> Value {
        for embed in embeds {
            let target = match row.get(embed.column) {
                Some(key) if !key.is_null() => self
                    .tables
                    .get(embed.table)
                    .and_then(|rows| {
                        rows.iter().find(|candidate| {
                            candidate.get("id") == Some(key)
                                && embed.filters.iter().all(|f| matches(candidate, f))
                        })
                    })
                    .cloned()
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            };

            if let Value::Object(map) = &mut row {
                map.insert(embed.alias.to_string(), target);
            }
        }
        row
    }
}

fn field<'a>(row: &'a Value, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn matches(row: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(column, value) => field(row, column) == value,
        Filter::In(column, values) => values.contains(field(row, column)),
        Filter::Gte(column, value) => matches!(
            compare(field(row, column), value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Filter::Lte(column, value) => matches!(
            compare(field(row, column), value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Filter::IsNull(column) => field(row, column).is_null(),
        Filter::Or(filters) => filters.iter().any(|f| matches(row, f)),
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn select(&self, query: &Select) -> BackendResult<Vec<Value>> {
        let mut state = self.lock();
        state.record(Operation::Select, query.table)?;

        let mut rows: Vec<Value> = state
            .tables
            .get(query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| matches(row, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if !query.order.is_empty() {
            rows.sort_by(|a, b| {
                for order in &query.order {
                    let ordering = compare(field(a, order.column), field(b, order.column))
                        .unwrap_or(Ordering::Equal);
                    let ordering = match order.direction {
                        Direction::Asc => ordering,
                        Direction::Desc => ordering.reverse(),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows
            .into_iter()
            .map(|row| state.with_embeds(row, &query.embeds))
            .collect())
    }

    async fn insert(&self, insert: &Insert) -> BackendResult<Value> {
        let mut state = self.lock();
        state.record(Operation::Insert, insert.table)?;

        let mut row: Map<String, Value> = insert.values.clone();
        row.entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        let row = Value::Object(row);

        state
            .tables
            .entry(insert.table.to_string())
            .or_default()
            .push(row.clone());

        Ok(state.with_embeds(row, &insert.embeds))
    }

    async fn update(&self, update: &Update) -> BackendResult<Vec<Value>> {
        let mut state = self.lock();
        state.record(Operation::Update, update.table)?;

        if update.filters.is_empty() {
            return Err(BackendError::InvalidRequest(format!(
                "update on {} without filters",
                update.table
            )));
        }
        if update.values.is_empty() {
            return Err(BackendError::InvalidRequest(format!(
                "update on {} sets no columns",
                update.table
            )));
        }

        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(update.table) {
            for row in rows.iter_mut() {
                let current: &Value = row;
                if !update.filters.iter().all(|f| matches(current, f)) {
                    continue;
                }
                if let Value::Object(map) = &mut *row {
                    for (column, value) in &update.values {
                        map.insert(column.clone(), value.clone());
                    }
                }
                updated.push(row.clone());
            }
        }

        Ok(updated
            .into_iter()
            .map(|row| state.with_embeds(row, &update.embeds))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded() -> MemoryDatabase {
        let db = MemoryDatabase::new();
        db.seed(
            "empresas",
            vec![
                json!({"id": "c1", "nome": "Alfa", "status": "ativo"}),
                json!({"id": "c2", "nome": "Beta", "status": "inativo"}),
            ],
        );
        db.seed(
            "acessos_usuario_empresa",
            vec![
                json!({"usuario_id": "u1", "empresa_id": "c1", "status": "ativo"}),
                json!({"usuario_id": "u1", "empresa_id": "c2", "status": "ativo"}),
                json!({"usuario_id": "u1", "empresa_id": null, "status": "ativo"}),
            ],
        );
        db
    }

    #[tokio::test]
    async fn test_embed_filters_null_the_embed_but_keep_the_row() {
        let db = seeded();
        let query = Select::from("acessos_usuario_empresa")
            .eq("usuario_id", "u1")
            .embed(Embed::new("empresas", "empresas", "empresa_id").eq("status", "ativo"));

        let rows = db.select(&query).await.unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["empresas"]["nome"], "Alfa");
        assert!(rows[1]["empresas"].is_null());
        assert!(rows[2]["empresas"].is_null());
    }

    #[tokio::test]
    async fn test_order_range_and_or_filters() {
        let db = MemoryDatabase::new();
        db.seed(
            "transacoes",
            vec![
                json!({"id": "t1", "data_transacao": "2024-01-10", "tipo": "RECEITA"}),
                json!({"id": "t2", "data_transacao": "2024-02-05", "tipo": "DESPESA"}),
                json!({"id": "t3", "data_transacao": "2024-01-25", "tipo": "TRANSFERENCIA"}),
            ],
        );

        let query = Select::from("transacoes")
            .filter(Filter::gte("data_transacao", "2024-01-01"))
            .filter(Filter::lte("data_transacao", "2024-01-31"))
            .filter(Filter::or(vec![
                Filter::eq("tipo", "RECEITA"),
                Filter::eq("tipo", "TRANSFERENCIA"),
            ]))
            .order_by("data_transacao", Direction::Desc);

        let ids: Vec<_> = db
            .select(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|row| row["id"].as_str().unwrap().to_string())
            .collect();

        assert_eq!(ids, vec!["t3", "t1"]);
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_update_merges() {
        let db = MemoryDatabase::new();
        let row = db
            .insert(&Insert::new("bancos").set("nome", "Banco").set("status", "ativo"))
            .await
            .unwrap();
        let id = row["id"].as_str().unwrap().to_string();

        let updated = db
            .update(&Update::table("bancos").set("status", "inativo").eq("id", &id))
            .await
            .unwrap();

        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["status"], "inativo");
        assert_eq!(updated[0]["nome"], "Banco");
        assert_eq!(db.rows("bancos")[0]["status"], "inativo");
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded() {
        let db = seeded();
        db.fail_on(Operation::Select, "empresas");

        let result = db.select(&Select::from("empresas")).await;

        assert!(matches!(result, Err(BackendError::Rejected(_))));
        assert_eq!(db.call_count(Operation::Select, "empresas"), 1);
    }

    #[tokio::test]
    async fn test_unfiltered_update_is_refused() {
        let db = seeded();
        let result = db.update(&Update::table("empresas").set("status", "inativo")).await;

        assert!(matches!(result, Err(BackendError::InvalidRequest(_))));
        assert_eq!(db.rows("empresas")[0]["status"], "ativo");
    }

    #[tokio::test]
    async fn test_update_without_values_is_refused() {
        let db = seeded();
        let result = db.update(&Update::table("empresas").eq("id", "c1")).await;

        assert!(matches!(result, Err(BackendError::InvalidRequest(_))));
        assert_eq!(db.call_count(Operation::Update, "empresas"), 1);
    }
}
