// src/services/label_context.rs

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::{
    common::helpers::normalize,
    middleware::request::LabelRequest,
    models::inventory::{BuildLine, Part, PrintObject, StockItem, StockLocation},
};

/// Variáveis entregues ao template.
pub type LabelContext = Map<String, Value>;

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl PrintObject {
    /// Contexto específico da entidade (o "hook" de cada tipo de etiqueta).
    pub fn label_context(&self, request: &LabelRequest) -> LabelContext {
        match self {
            PrintObject::StockItem(item) => stock_item_context(item, request),
            PrintObject::StockLocation(location) => stock_location_context(location),
            PrintObject::Part(part) => part_context(part, request),
            PrintObject::BuildLine(line) => build_line_context(line),
        }
    }
}

fn stock_item_context(item: &StockItem, request: &LabelRequest) -> LabelContext {
    let part = &item.part;

    let context = json!({
        "item": to_value(item),
        "part": to_value(part),
        "name": part.full_name,
        "ipn": part.ipn,
        "revision": part.revision,
        "quantity": normalize(item.quantity),
        "serial": item.serial,
        "barcode_data": item.barcode_data,
        "barcode_hash": item.barcode_hash,
        "qr_data": item.format_barcode(),
        "qr_url": request.build_absolute_uri(&item.get_absolute_url()),
        "tests": to_value(&item.test_result_map()),
        "parameters": to_value(&part.parameters_map()),
    });

    into_context(context)
}

fn stock_location_context(location: &StockLocation) -> LabelContext {
    into_context(json!({
        "location": to_value(location),
        "qr_data": location.format_barcode(),
    }))
}

fn part_context(part: &Part, request: &LabelRequest) -> LabelContext {
    into_context(json!({
        "part": to_value(part),
        "category": to_value(&part.category),
        "name": part.name,
        "description": part.description,
        "IPN": part.ipn,
        "revision": part.revision,
        "qr_data": part.format_barcode(),
        "qr_url": request.build_absolute_uri(&part.get_absolute_url()),
        "parameters": to_value(&part.parameters_map()),
    }))
}

fn build_line_context(line: &BuildLine) -> LabelContext {
    into_context(json!({
        "build_line": to_value(line),
        "build": to_value(&line.build),
        "bom_item": to_value(&line.bom_item),
        "part": to_value(&line.bom_item.sub_part),
        "quantity": normalize(line.quantity),
        "allocated_quantity": normalize(line.allocated_quantity()),
        "allocations": to_value(&line.allocations),
    }))
}

fn into_context(value: Value) -> LabelContext {
    match value {
        Value::Object(map) => map,
        _ => LabelContext::new(),
    }
}
