// src/models/inventory.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

// Os objetos de estoque aqui são somente leitura: a etiqueta apenas os imprime.
// Os nomes dos campos serializados são os mesmos usados nos filtros e nos templates.

// --- 1. Categorias de Peças ---
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PartCategory {
    pub pk: i64,
    pub name: String,
    pub description: Option<String>,
    pub pathstring: String,
    pub parent: Option<i64>,
}

// --- 2. Parâmetros de Peças ---
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PartParameter {
    pub name: String,
    pub data: String,
    pub units: Option<String>,
}

// --- 3. Peças ---
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Part {
    pub pk: i64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    #[serde(rename = "IPN")]
    pub ipn: Option<String>,
    pub revision: Option<String>,
    pub keywords: Option<String>,
    pub active: bool,
    pub assembly: bool,
    pub component: bool,
    pub trackable: bool,
    pub purchaseable: bool,
    pub salable: bool,
    pub category: Option<PartCategory>,
    pub parameters: Vec<PartParameter>,
}

impl Part {
    /// Monta o nome completo no formato "IPN | nome | revisão", omitindo as partes vazias.
    pub fn format_full_name(name: &str, ipn: Option<&str>, revision: Option<&str>) -> String {
        [ipn, Some(name), revision]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" | ")
    }

    pub fn format_barcode(&self) -> String {
        format_brief_barcode("part", self.pk)
    }

    pub fn get_absolute_url(&self) -> String {
        format!("/part/{}/", self.pk)
    }

    pub fn parameters_map(&self) -> BTreeMap<String, PartParameter> {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.clone()))
            .collect()
    }
}

// --- 4. Locais de Estoque ---
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StockLocation {
    pub pk: i64,
    pub name: String,
    pub description: Option<String>,
    pub pathstring: String,
    pub structural: bool,
    pub external: bool,
    pub parent: Option<i64>,
}

impl StockLocation {
    pub fn format_barcode(&self) -> String {
        format_brief_barcode("stocklocation", self.pk)
    }

    pub fn get_absolute_url(&self) -> String {
        format!("/stock/location/{}/", self.pk)
    }
}

// --- 5. Resultados de Teste ---
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StockItemTestResult {
    pub test: String,
    pub result: bool,
    pub value: Option<String>,
    pub notes: Option<String>,
    pub date: DateTime<Utc>,
}

// --- 6. Itens de Estoque ---
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StockItem {
    pub pk: i64,
    pub part: Part,
    pub location: Option<StockLocation>,
    pub quantity: Decimal,
    pub serial: Option<String>,
    pub batch: Option<String>,
    pub status: i32,
    pub barcode_data: String,
    pub barcode_hash: String,
    pub tests: Vec<StockItemTestResult>,
}

impl StockItem {
    pub fn format_barcode(&self) -> String {
        format_brief_barcode("stockitem", self.pk)
    }

    pub fn get_absolute_url(&self) -> String {
        format!("/stock/item/{}/", self.pk)
    }

    /// Mapa "chave do teste" -> resultado mais recente.
    pub fn test_result_map(&self) -> BTreeMap<String, StockItemTestResult> {
        let mut results: BTreeMap<String, StockItemTestResult> = BTreeMap::new();

        for result in &self.tests {
            let key = test_key(&result.test);
            match results.get(&key) {
                Some(existing) if existing.date > result.date => {}
                _ => {
                    results.insert(key, result.clone());
                }
            }
        }

        results
    }
}

// --- 7. Ordens de Produção ---
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Build {
    pub pk: i64,
    pub reference: String,
    pub title: String,
    pub quantity: Decimal,
    pub status: i32,
    pub part: Part,
}

impl Build {
    pub fn get_absolute_url(&self) -> String {
        format!("/build/{}/", self.pk)
    }
}

// --- 8. Lista de Materiais ---
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BomItem {
    pub pk: i64,
    pub part: i64,
    pub sub_part: Part,
    pub quantity: Decimal,
    pub reference: String,
    pub optional: bool,
    pub consumable: bool,
}

// --- 9. Alocações de Estoque para a Produção ---
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BuildItem {
    pub pk: i64,
    pub stock_item: i64,
    pub quantity: Decimal,
}

// --- 10. Linhas da Ordem de Produção ---
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BuildLine {
    pub pk: i64,
    pub build: Build,
    pub bom_item: BomItem,
    pub quantity: Decimal,
    pub allocations: Vec<BuildItem>,
}

impl BuildLine {
    pub fn allocated_quantity(&self) -> Decimal {
        self.allocations.iter().map(|a| a.quantity).sum()
    }
}

/// O objeto que uma etiqueta vai imprimir em uma passada de renderização.
#[derive(Debug, Clone, PartialEq)]
pub enum PrintObject {
    StockItem(StockItem),
    StockLocation(StockLocation),
    Part(Part),
    BuildLine(BuildLine),
}

impl PrintObject {
    pub fn pk(&self) -> i64 {
        match self {
            PrintObject::StockItem(item) => item.pk,
            PrintObject::StockLocation(location) => location.pk,
            PrintObject::Part(part) => part.pk,
            PrintObject::BuildLine(line) => line.pk,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let value = match self {
            PrintObject::StockItem(item) => serde_json::to_value(item),
            PrintObject::StockLocation(location) => serde_json::to_value(location),
            PrintObject::Part(part) => serde_json::to_value(part),
            PrintObject::BuildLine(line) => serde_json::to_value(line),
        };
        // Structs com chaves String nunca falham ao serializar.
        value.unwrap_or(serde_json::Value::Null)
    }
}

/// Tipos de entidade que podem ser consultados por uma string de filtros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    StockItem,
    StockLocation,
    Part,
    PartCategory,
    Build,
    BomItem,
    BuildLine,
}

impl EntityType {
    pub fn name(self) -> &'static str {
        match self {
            EntityType::StockItem => "StockItem",
            EntityType::StockLocation => "StockLocation",
            EntityType::Part => "Part",
            EntityType::PartCategory => "PartCategory",
            EntityType::Build => "Build",
            EntityType::BomItem => "BomItem",
            EntityType::BuildLine => "BuildLine",
        }
    }

    /// Campos simples (não relacionais) que aceitam filtros.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            EntityType::StockItem => &[
                "pk", "id", "quantity", "serial", "batch", "status", "barcode_data", "barcode_hash",
            ],
            EntityType::StockLocation => &[
                "pk", "id", "name", "description", "pathstring", "structural", "external",
            ],
            EntityType::Part => &[
                "pk", "id", "name", "full_name", "description", "IPN", "revision", "keywords",
                "active", "assembly", "component", "trackable", "purchaseable", "salable",
            ],
            EntityType::PartCategory => &["pk", "id", "name", "description", "pathstring"],
            EntityType::Build => &["pk", "id", "reference", "title", "quantity", "status"],
            EntityType::BomItem => &["pk", "id", "quantity", "reference", "optional", "consumable"],
            EntityType::BuildLine => &["pk", "id", "quantity"],
        }
    }

    /// Relações (chaves estrangeiras) que podem ser atravessadas com `__`.
    pub fn relations(self) -> &'static [(&'static str, EntityType)] {
        match self {
            EntityType::StockItem => &[
                ("part", EntityType::Part),
                ("location", EntityType::StockLocation),
            ],
            EntityType::StockLocation => &[("parent", EntityType::StockLocation)],
            EntityType::Part => &[("category", EntityType::PartCategory)],
            EntityType::PartCategory => &[("parent", EntityType::PartCategory)],
            EntityType::Build => &[("part", EntityType::Part)],
            EntityType::BomItem => &[
                ("part", EntityType::Part),
                ("sub_part", EntityType::Part),
            ],
            EntityType::BuildLine => &[
                ("build", EntityType::Build),
                ("bom_item", EntityType::BomItem),
            ],
        }
    }

    pub fn relation(self, name: &str) -> Option<EntityType> {
        self.relations()
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, target)| *target)
    }

    /// Relações que o objeto serializado guarda só como chave primária (`parent: 1`).
    /// Só podem ser comparadas pelo `pk`.
    pub fn is_reference(self, name: &str) -> bool {
        matches!(
            (self, name),
            (EntityType::StockLocation, "parent")
                | (EntityType::PartCategory, "parent")
                | (EntityType::BomItem, "part")
        )
    }

    pub fn has_field(self, name: &str) -> bool {
        self.fields().contains(&name)
    }

    /// Lista de campos válidos, usada nas mensagens de erro.
    pub fn choices(self) -> Vec<&'static str> {
        let mut choices: Vec<&'static str> = self
            .fields()
            .iter()
            .copied()
            .chain(self.relations().iter().map(|(name, _)| *name))
            .collect();
        choices.sort_unstable();
        choices
    }
}

fn format_brief_barcode(model_type: &str, pk: i64) -> String {
    format!("{{\"{}\": {}}}", model_type, pk)
}

/// Normaliza o nome de um teste para uso como chave no template
/// ("Firmware Version" -> "firmwareversion").
pub fn test_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn category() -> PartCategory {
        PartCategory {
            pk: 3,
            name: "Resistors".into(),
            description: Some("Passive components".into()),
            pathstring: "Electronics/Resistors".into(),
            parent: Some(1),
        }
    }

    pub fn part() -> Part {
        Part {
            pk: 10,
            name: "R_10K_0805".into(),
            full_name: Part::format_full_name("R_10K_0805", Some("IPN-001"), Some("B")),
            description: Some("10k resistor".into()),
            ipn: Some("IPN-001".into()),
            revision: Some("B".into()),
            keywords: None,
            active: true,
            assembly: false,
            component: true,
            trackable: true,
            purchaseable: true,
            salable: false,
            category: Some(category()),
            parameters: vec![PartParameter {
                name: "Resistance".into(),
                data: "10k".into(),
                units: Some("ohm".into()),
            }],
        }
    }

    pub fn location() -> StockLocation {
        StockLocation {
            pk: 4,
            name: "Shelf A".into(),
            description: None,
            pathstring: "Warehouse/Shelf A".into(),
            structural: false,
            external: false,
            parent: Some(2),
        }
    }

    pub fn stock_item() -> StockItem {
        StockItem {
            pk: 42,
            part: part(),
            location: Some(location()),
            quantity: Decimal::new(500, 2),
            serial: Some("42".into()),
            batch: Some("B-2024".into()),
            status: 10,
            barcode_data: String::new(),
            barcode_hash: String::new(),
            tests: vec![
                StockItemTestResult {
                    test: "Firmware Version".into(),
                    result: false,
                    value: Some("1.0".into()),
                    notes: None,
                    date: Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
                },
                StockItemTestResult {
                    test: "firmware version".into(),
                    result: true,
                    value: Some("1.1".into()),
                    notes: None,
                    date: Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap(),
                },
            ],
        }
    }

    pub fn build_line() -> BuildLine {
        let mut assembly = part();
        assembly.pk = 20;
        assembly.name = "Control Board".into();
        assembly.assembly = true;

        BuildLine {
            pk: 7,
            build: Build {
                pk: 5,
                reference: "BO-0005".into(),
                title: "Control boards".into(),
                quantity: Decimal::new(10, 0),
                status: 20,
                part: assembly,
            },
            bom_item: BomItem {
                pk: 9,
                part: 20,
                sub_part: part(),
                quantity: Decimal::new(2, 0),
                reference: "R1, R2".into(),
                optional: false,
                consumable: false,
            },
            quantity: Decimal::new(20, 0),
            allocations: vec![
                BuildItem { pk: 1, stock_item: 42, quantity: Decimal::new(5, 0) },
                BuildItem { pk: 2, stock_item: 43, quantity: Decimal::new(75, 1) },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures;
    use super::*;

    #[test]
    fn full_name_skips_blank_parts() {
        assert_eq!(Part::format_full_name("Widget", None, None), "Widget");
        assert_eq!(Part::format_full_name("Widget", Some(""), Some("A")), "Widget | A");
        assert_eq!(Part::format_full_name("Widget", Some("W-1"), None), "W-1 | Widget");
    }

    #[test]
    fn barcodes_use_brief_json() {
        assert_eq!(fixtures::stock_item().format_barcode(), "{\"stockitem\": 42}");
        assert_eq!(fixtures::location().format_barcode(), "{\"stocklocation\": 4}");
        assert_eq!(fixtures::part().format_barcode(), "{\"part\": 10}");
    }

    #[test]
    fn test_result_map_keeps_latest_result_per_key() {
        let map = fixtures::stock_item().test_result_map();
        assert_eq!(map.len(), 1);
        let latest = &map["firmwareversion"];
        assert!(latest.result);
        assert_eq!(latest.value.as_deref(), Some("1.1"));
    }

    #[test]
    fn allocated_quantity_sums_allocations() {
        assert_eq!(fixtures::build_line().allocated_quantity(), Decimal::new(125, 1));
    }

    #[test]
    fn part_serializes_ipn_in_upper_case() {
        let value = PrintObject::Part(fixtures::part()).to_json();
        assert_eq!(value["IPN"], "IPN-001");
        assert_eq!(value["category"]["pk"], 3);
    }

    #[test]
    fn relations_resolve_to_target_entity() {
        assert_eq!(EntityType::StockItem.relation("part"), Some(EntityType::Part));
        assert_eq!(EntityType::BuildLine.relation("bom_item"), Some(EntityType::BomItem));
        assert_eq!(EntityType::Part.relation("location"), None);
        assert!(EntityType::Part.has_field("IPN"));
    }
}
