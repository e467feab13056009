// src/common/filters.rs

//! Strings de filtro das etiquetas: uma lista de pares `chave=valor` separados
//! por vírgula, por exemplo `part__IPN=IPN-001, location__name=Shelf A`.
//!
//! As chaves seguem a sintaxe de consulta por relações (`relacao__campo__lookup`)
//! e são resolvidas contra o conjunto de campos de um [`EntityType`].

use std::borrow::Cow;
use std::fmt;

use serde_json::Value;
use validator::ValidationError;

use crate::models::inventory::EntityType;

const LOOKUP_SEPARATOR: &str = "__";

/// Operadores aceitos no final de uma chave de filtro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Exact,
    IExact,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
    IsNull,
}

impl Lookup {
    pub fn parse(name: &str) -> Option<Self> {
        let lookup = match name {
            "exact" => Lookup::Exact,
            "iexact" => Lookup::IExact,
            "contains" => Lookup::Contains,
            "icontains" => Lookup::IContains,
            "startswith" => Lookup::StartsWith,
            "istartswith" => Lookup::IStartsWith,
            "endswith" => Lookup::EndsWith,
            "iendswith" => Lookup::IEndsWith,
            "gt" => Lookup::Gt,
            "gte" => Lookup::Gte,
            "lt" => Lookup::Lt,
            "lte" => Lookup::Lte,
            "isnull" => Lookup::IsNull,
            _ => return None,
        };
        Some(lookup)
    }
    /// Lookups que fazem sentido em uma chave estrangeira (compara o pk).
    pub fn applies_to_relation(self) -> bool {
        matches!(
            self,
            Lookup::Exact | Lookup::Gt | Lookup::Gte | Lookup::Lt | Lookup::Lte | Lookup::IsNull
        )
    }
}

/// Conjunto de filtros já separado em pares, na ordem em que foram escritos.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    pairs: Vec<(String, String)>,
}

impl FilterSet {
    /// Separa a string em pares `chave=valor`. Não verifica se as chaves existem.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let value = value.trim();
        let mut pairs = Vec::new();

        if value.is_empty() {
            return Ok(Self { pairs });
        }

        for group in value.split(',') {
            let group = group.trim();
            let parts: Vec<&str> = group.split('=').collect();

            if parts.len() != 2 {
                return Err(invalid_group(group));
            }

            let key = parts[0].trim();
            let val = parts[1].trim();

            if key.is_empty() || val.is_empty() {
                return Err(invalid_group(group));
            }

            pairs.push((key.to_string(), val.to_string()));
        }

        Ok(Self { pairs })
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Verifica se um objeto serializado satisfaz todos os filtros.
    /// Relações aparecem no JSON como objetos aninhados (ou `null`).
    pub fn matches(&self, object: &Value) -> bool {
        self.pairs
            .iter()
            .all(|(key, expected)| matches_pair(object, key, expected))
    }
}

impl fmt::Display for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

/// Valida a string de filtros contra os campos de uma entidade.
///
/// Todas as chaves inválidas são reunidas em um único erro.
pub fn validate_filter_string(value: &str, entity: EntityType) -> Result<FilterSet, ValidationError> {
    let filters = FilterSet::parse(value)?;

    let problems: Vec<String> = filters
        .iter()
        .filter_map(|(key, _)| resolve_key(entity, key).err())
        .collect();

    if problems.is_empty() {
        return Ok(filters);
    }

    let mut err = ValidationError::new("invalid_filter");
    err.message = Some(Cow::Owned(problems.join("; ")));
    Err(err)
}

// Resolve uma chave (ex: `part__category__name__icontains`) percorrendo as relações.
fn resolve_key(entity: EntityType, key: &str) -> Result<(), String> {
    let segments: Vec<&str> = key.split(LOOKUP_SEPARATOR).collect();
    let mut current = entity;
    let mut index = 0;

    while index < segments.len() {
        let segment = segments[index];
        let remaining = &segments[index + 1..];

        if let Some(target) = current.relation(segment) {
            match remaining {
                [] => return Ok(()),
                [lookup] => {
                    if let Some(lookup) = Lookup::parse(lookup) {
                        return relation_lookup(segment, lookup, key);
                    }
                }
                _ => {}
            }

            if current.is_reference(segment) {
                return match remaining {
                    [pk] | [pk, _] if is_pk(pk) => match remaining.get(1) {
                        None => Ok(()),
                        Some(lookup) if Lookup::parse(lookup).is_some() => Ok(()),
                        Some(lookup) => Err(format!(
                            "Unsupported lookup '{}' for field '{}' in '{}'",
                            lookup, pk, key
                        )),
                    },
                    _ => Err(format!(
                        "Related Field '{}' can only be filtered by pk in '{}'",
                        segment, key
                    )),
                };
            }

            current = target;
            index += 1;
            continue;
        }

        if current.has_field(segment) {
            return match remaining {
                [] => Ok(()),
                [lookup] if Lookup::parse(lookup).is_some() => Ok(()),
                [lookup] => Err(format!(
                    "Unsupported lookup '{}' for field '{}' in '{}'",
                    lookup, segment, key
                )),
                _ => Err(format!(
                    "Cannot resolve keyword '{}' into field '{}' in '{}'",
                    remaining.join(LOOKUP_SEPARATOR),
                    segment,
                    key
                )),
            };
        }

        return Err(format!(
            "Cannot resolve keyword '{}' into field. Choices are: {}",
            segment,
            current.choices().join(", ")
        ));
    }

    Err(format!("Cannot resolve keyword '{}' into field", key))
}

fn relation_lookup(relation: &str, lookup: Lookup, key: &str) -> Result<(), String> {
    if lookup.applies_to_relation() {
        Ok(())
    } else {
        Err(format!(
            "Related Field '{}' got invalid lookup in '{}'",
            relation, key
        ))
    }
}

fn is_pk(segment: &str) -> bool {
    segment == "pk" || segment == "id"
}

fn invalid_group(group: &str) -> ValidationError {
    let mut err = ValidationError::new("invalid_group");
    err.message = Some(Cow::Owned(format!("Invalid group: {}", group)));
    err
}

fn matches_pair(object: &Value, key: &str, expected: &str) -> bool {
    let mut segments: Vec<&str> = key.split(LOOKUP_SEPARATOR).collect();

    let lookup = match segments.last().and_then(|s| Lookup::parse(s)) {
        Some(lookup) if segments.len() > 1 => {
            segments.pop();
            lookup
        }
        _ => Lookup::Exact,
    };

    let mut current = object;
    for segment in segments {
        let field = if segment == "id" { "pk" } else { segment };
        current = match current {
            Value::Object(map) => match map.get(field) {
                Some(next) => next,
                None => return false,
            },
            // Relação guardada só pela chave primária
            Value::Number(_) | Value::Null if field == "pk" => current,
            _ => return false,
        };
    }

    // Uma relação sem campo final compara pela chave primária.
    let actual = match current {
        Value::Object(map) => map.get("pk").unwrap_or(&Value::Null),
        other => other,
    };

    compare(actual, lookup, expected)
}

fn compare(actual: &Value, lookup: Lookup, expected: &str) -> bool {
    if lookup == Lookup::IsNull {
        return match parse_bool(expected) {
            Some(want_null) => actual.is_null() == want_null,
            None => false,
        };
    }

    if actual.is_null() {
        return false;
    }

    match lookup {
        Lookup::Exact => equals(actual, expected),
        Lookup::IExact => text(actual).to_lowercase() == expected.to_lowercase(),
        Lookup::Contains => text(actual).contains(expected),
        Lookup::IContains => text(actual).to_lowercase().contains(&expected.to_lowercase()),
        Lookup::StartsWith => text(actual).starts_with(expected),
        Lookup::IStartsWith => text(actual).to_lowercase().starts_with(&expected.to_lowercase()),
        Lookup::EndsWith => text(actual).ends_with(expected),
        Lookup::IEndsWith => text(actual).to_lowercase().ends_with(&expected.to_lowercase()),
        Lookup::Gt | Lookup::Gte | Lookup::Lt | Lookup::Lte => {
            match (actual.as_f64(), expected.parse::<f64>().ok()) {
                (Some(a), Some(e)) => match lookup {
                    Lookup::Gt => a > e,
                    Lookup::Gte => a >= e,
                    Lookup::Lt => a < e,
                    _ => a <= e,
                },
                _ => {
                    let a = text(actual);
                    match lookup {
                        Lookup::Gt => a.as_str() > expected,
                        Lookup::Gte => a.as_str() >= expected,
                        Lookup::Lt => a.as_str() < expected,
                        _ => a.as_str() <= expected,
                    }
                }
            }
        }
        Lookup::IsNull => unreachable!(),
    }
}

fn equals(actual: &Value, expected: &str) -> bool {
    match actual {
        Value::Bool(b) => parse_bool(expected) == Some(*b),
        Value::Number(n) => match (n.as_f64(), expected.parse::<f64>()) {
            (Some(a), Ok(e)) => a == e,
            _ => false,
        },
        Value::String(s) => s == expected,
        _ => false,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
