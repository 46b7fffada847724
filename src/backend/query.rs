//! Query model
//!
//! Backend-agnostic description of the selects and mutations the services
//! issue. Table and column names are `&'static str` so they always come from
//! code, never from request input.

use serde::Serialize;
use serde_json::{Map, Value};

/// Serialize a filter or column value, mapping failures to `null`
pub(crate) fn to_value<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Row filter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(&'static str, Value),
    In(&'static str, Vec<Value>),
    Gte(&'static str, Value),
    Lte(&'static str, Value),
    IsNull(&'static str),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq<T: Serialize>(column: &'static str, value: T) -> Self {
        Self::Eq(column, to_value(value))
    }

    pub fn one_of<I, T>(column: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        Self::In(column, values.into_iter().map(to_value).collect())
    }

    pub fn gte<T: Serialize>(column: &'static str, value: T) -> Self {
        Self::Gte(column, to_value(value))
    }

    pub fn lte<T: Serialize>(column: &'static str, value: T) -> Self {
        Self::Lte(column, to_value(value))
    }

    pub fn is_null(column: &'static str) -> Self {
        Self::IsNull(column)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Self::Or(filters)
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: &'static str,
    pub direction: Direction,
}

/// Many-to-one embed: `alias` receives the row of `table` whose `id` equals
/// the parent's `column`, or `null` when no row satisfies `filters`.
#[derive(Debug, Clone, PartialEq)]
pub struct Embed {
    pub alias: &'static str,
    pub table: &'static str,
    pub column: &'static str,
    pub filters: Vec<Filter>,
}

impl Embed {
    pub fn new(alias: &'static str, table: &'static str, column: &'static str) -> Self {
        Self {
            alias,
            table,
            column,
            filters: Vec::new(),
        }
    }

    pub fn eq<T: Serialize>(mut self, column: &'static str, value: T) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }
}

/// Filtered read
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: &'static str,
    pub filters: Vec<Filter>,
    pub embeds: Vec<Embed>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Select {
    pub fn from(table: &'static str) -> Self {
        Self {
            table,
            filters: Vec::new(),
            embeds: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq<T: Serialize>(self, column: &'static str, value: T) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn embeds(mut self, embeds: impl IntoIterator<Item = Embed>) -> Self {
        self.embeds.extend(embeds);
        self
    }

    pub fn order_by(mut self, column: &'static str, direction: Direction) -> Self {
        self.order.push(Order { column, direction });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Single-row insert returning the stored row
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: &'static str,
    pub values: Map<String, Value>,
    pub embeds: Vec<Embed>,
}

impl Insert {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            values: Map::new(),
            embeds: Vec::new(),
        }
    }

    pub fn set<T: Serialize>(mut self, column: &'static str, value: T) -> Self {
        self.values.insert(column.to_string(), to_value(value));
        self
    }

    /// Set the column only when a value is present
    pub fn set_opt<T: Serialize>(self, column: &'static str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.set(column, value),
            None => self,
        }
    }

    pub fn embeds(mut self, embeds: impl IntoIterator<Item = Embed>) -> Self {
        self.embeds.extend(embeds);
        self
    }
}

/// Filtered update returning every affected row
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: &'static str,
    pub values: Map<String, Value>,
    pub filters: Vec<Filter>,
    pub embeds: Vec<Embed>,
}

impl Update {
    pub fn table(table: &'static str) -> Self {
        Self {
            table,
            values: Map::new(),
            filters: Vec::new(),
            embeds: Vec::new(),
        }
    }

    pub fn set<T: Serialize>(mut self, column: &'static str, value: T) -> Self {
        self.values.insert(column.to_string(), to_value(value));
        self
    }

    /// Set the column only when a value is present
    pub fn set_opt<T: Serialize>(self, column: &'static str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.set(column, value),
            None => self,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq<T: Serialize>(self, column: &'static str, value: T) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn embeds(mut self, embeds: impl IntoIterator<Item = Embed>) -> Self {
        self.embeds.extend(embeds);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_set_opt_skips_missing_values() {
        let insert = Insert::new("empresas")
            .set("nome", "Acme")
            .set_opt::<String>("nome_fantasia", None)
            .set_opt("url_logo", Some("https://logo"));

        assert_eq!(insert.values.len(), 2);
        assert_eq!(insert.values["nome"], json!("Acme"));
        assert!(!insert.values.contains_key("nome_fantasia"));
    }

    #[test]
    fn test_uuid_filters_serialize_as_strings() {
        let id = Uuid::new_v4();
        let select = Select::from("empresas").eq("id", id).limit(1);

        assert_eq!(select.filters, vec![Filter::Eq("id", json!(id.to_string()))]);
        assert_eq!(select.limit, Some(1));
    }
}
