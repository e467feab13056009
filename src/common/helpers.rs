// src/common/helpers.rs

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use validator::ValidationError;

/// Remove os zeros à direita de uma quantidade ("5.000" -> 5, "2.50" -> 2.5).
/// Valores inteiros viram números inteiros no contexto do template.
pub fn normalize(quantity: Decimal) -> Value {
    let normalized = quantity.normalize();

    if normalized.scale() == 0 {
        if let Some(int) = normalized.to_i64() {
            return Value::from(int);
        }
    }

    match normalized.to_f64() {
        Some(float) => Value::from(float),
        None => Value::String(normalized.to_string()),
    }
}

/// Junta a URL base com um caminho absoluto, sem barras duplicadas.
pub fn build_absolute_uri(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Lê uma lista de ids da query string ("1,2, 3").
pub fn parse_id_list(raw: &str) -> Result<Vec<i64>, ValidationError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>().map_err(|_| {
                let mut err = ValidationError::new("invalid_id");
                err.message = Some(format!("'{}' não é um id válido.", part).into());
                err
            })
        })
        .collect()
}

// Valores "verdadeiros" aceitos em query strings e variáveis de ambiente.
pub fn str2bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "y" | "yes" | "t" | "true" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_strips_trailing_zeros() {
        assert_eq!(normalize(Decimal::new(500, 2)), json!(5));
        assert_eq!(normalize(Decimal::new(250, 2)), json!(2.5));
        assert_eq!(normalize(Decimal::ZERO), json!(0));
    }

    #[test]
    fn absolute_uri_joins_without_double_slash() {
        assert_eq!(
            build_absolute_uri("https://inv.example.com/", "/part/10/"),
            "https://inv.example.com/part/10/"
        );
        assert_eq!(
            build_absolute_uri("http://localhost:3000", "stock/item/1/"),
            "http://localhost:3000/stock/item/1/"
        );
    }

    #[test]
    fn id_lists_are_parsed_and_bad_ids_rejected() {
        assert_eq!(parse_id_list("1, 2,,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_id_list("").unwrap().is_empty());

        let err = parse_id_list("1,abc").unwrap_err();
        assert_eq!(err.code, "invalid_id");
    }

    #[test]
    fn truthy_strings() {
        assert!(str2bool("True"));
        assert!(str2bool("1"));
        assert!(!str2bool("0"));
        assert!(!str2bool("off"));
    }
}
