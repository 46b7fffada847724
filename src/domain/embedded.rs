//! Embedded join results
//!
//! A joined row can come back as `null`, a single object or an array of
//! objects depending on how the relation is declared remotely. [`Embedded`]
//! names each shape so callers handle all of them.

use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Embedded<T> {
    /// Null, missing or an empty array
    Empty,
    Single(T),
    /// More than one row where at most one was expected
    Ambiguous(Vec<T>),
}

impl<T: DeserializeOwned> Embedded<T> {
    /// Classify the value found under an embed alias
    pub fn decode(value: Option<&Value>) -> Result<Self, serde_json::Error> {
        match value {
            None | Some(Value::Null) => Ok(Self::Empty),
            Some(Value::Array(items)) => {
                let mut decoded = items
                    .iter()
                    .map(|item| serde_json::from_value(item.clone()))
                    .collect::<Result<Vec<T>, _>>()?;
                match decoded.len() {
                    0 => Ok(Self::Empty),
                    1 => Ok(Self::Single(decoded.remove(0))),
                    _ => Ok(Self::Ambiguous(decoded)),
                }
            }
            Some(other) => serde_json::from_value(other.clone()).map(Self::Single),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Named {
        id: String,
        nome: String,
    }

    fn named(id: &str) -> Named {
        Named {
            id: id.to_string(),
            nome: format!("Empresa {}", id),
        }
    }

    #[test]
    fn test_shapes() {
        let row = json!({
            "none": null,
            "empty": [],
            "object": {"id": "a", "nome": "Empresa a"},
            "one": [{"id": "b", "nome": "Empresa b"}],
            "many": [{"id": "c", "nome": "Empresa c"}, {"id": "d", "nome": "Empresa d"}],
        });

        assert_eq!(Embedded::<Named>::decode(row.get("missing")).unwrap(), Embedded::Empty);
        assert_eq!(Embedded::<Named>::decode(row.get("none")).unwrap(), Embedded::Empty);
        assert_eq!(Embedded::<Named>::decode(row.get("empty")).unwrap(), Embedded::Empty);
        assert_eq!(
            Embedded::<Named>::decode(row.get("object")).unwrap(),
            Embedded::Single(named("a"))
        );
        assert_eq!(
            Embedded::<Named>::decode(row.get("one")).unwrap(),
            Embedded::Single(named("b"))
        );
        assert_eq!(
            Embedded::<Named>::decode(row.get("many")).unwrap(),
            Embedded::Ambiguous(vec![named("c"), named("d")])
        );
    }

    #[test]
    fn test_missing_required_field_is_an_error() {
        let value = json!({"id": "a"});
        assert!(Embedded::<Named>::decode(Some(&value)).is_err());
    }
}
