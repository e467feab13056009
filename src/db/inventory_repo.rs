// src/db/inventory_repo.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use crate::{
    common::error::AppError,
    models::{
        inventory::{
            BomItem, Build, BuildItem, BuildLine, Part, PartCategory, PartParameter, PrintObject,
            StockItem, StockItemTestResult, StockLocation,
        },
        label::LabelKind,
    },
};

// ---
// Linhas do banco (planas). Os objetos aninhados são montados aqui no repositório.
// ---

#[derive(FromRow)]
struct PartRow {
    id: i64,
    name: String,
    description: Option<String>,
    ipn: Option<String>,
    revision: Option<String>,
    keywords: Option<String>,
    active: bool,
    assembly: bool,
    component: bool,
    trackable: bool,
    purchaseable: bool,
    salable: bool,
    category_id: Option<i64>,
}

#[derive(FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
    description: Option<String>,
    pathstring: String,
    parent_id: Option<i64>,
}

#[derive(FromRow)]
struct ParameterRow {
    name: String,
    data: String,
    units: Option<String>,
}

#[derive(FromRow)]
struct LocationRow {
    id: i64,
    name: String,
    description: Option<String>,
    pathstring: String,
    structural: bool,
    external: bool,
    parent_id: Option<i64>,
}

#[derive(FromRow)]
struct StockItemRow {
    id: i64,
    part_id: i64,
    location_id: Option<i64>,
    quantity: Decimal,
    serial: Option<String>,
    batch: Option<String>,
    status: i32,
    barcode_data: String,
    barcode_hash: String,
}

#[derive(FromRow)]
struct TestResultRow {
    test: String,
    result: bool,
    value: Option<String>,
    notes: Option<String>,
    date: DateTime<Utc>,
}

#[derive(FromRow)]
struct BuildRow {
    id: i64,
    reference: String,
    title: String,
    quantity: Decimal,
    status: i32,
    part_id: i64,
}

#[derive(FromRow)]
struct BomItemRow {
    id: i64,
    part_id: i64,
    sub_part_id: i64,
    quantity: Decimal,
    reference: String,
    optional: bool,
    consumable: bool,
}

#[derive(FromRow)]
struct BuildLineRow {
    id: i64,
    build_id: i64,
    bom_item_id: i64,
    quantity: Decimal,
}

#[derive(FromRow)]
struct BuildItemRow {
    id: i64,
    stock_item_id: i64,
    quantity: Decimal,
}

/// Carrega os objetos que as etiquetas imprimem.
#[derive(Clone)]
pub struct InventoryRepository {
    pool: PgPool,
}

impl InventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Carrega os objetos na ordem pedida. Qualquer id inexistente é um erro.
    pub async fn load_print_objects(&self, kind: LabelKind, ids: &[i64]) -> Result<Vec<PrintObject>, AppError> {
        let mut objects = Vec::with_capacity(ids.len());

        for &id in ids {
            let object = match kind {
                LabelKind::StockItem => PrintObject::StockItem(self.get_stock_item(id).await?),
                LabelKind::StockLocation => PrintObject::StockLocation(self.get_stock_location(id).await?),
                LabelKind::Part => PrintObject::Part(self.get_part(id).await?),
                LabelKind::BuildLine => PrintObject::BuildLine(self.get_build_line(id).await?),
            };
            objects.push(object);
        }

        Ok(objects)
    }

    pub async fn get_part(&self, id: i64) -> Result<Part, AppError> {
        let row = sqlx::query_as::<_, PartRow>("SELECT * FROM parts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::ObjectNotFound { kind: "Part", pk: id })?;

        let category = match row.category_id {
            Some(category_id) => self.get_category(category_id).await?,
            None => None,
        };

        let parameters = sqlx::query_as::<_, ParameterRow>(
            "SELECT name, data, units FROM part_parameters WHERE part_id = $1 ORDER BY name ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|p| PartParameter { name: p.name, data: p.data, units: p.units })
        .collect();

        Ok(Part {
            pk: row.id,
            full_name: Part::format_full_name(&row.name, row.ipn.as_deref(), row.revision.as_deref()),
            name: row.name,
            description: row.description,
            ipn: row.ipn,
            revision: row.revision,
            keywords: row.keywords,
            active: row.active,
            assembly: row.assembly,
            component: row.component,
            trackable: row.trackable,
            purchaseable: row.purchaseable,
            salable: row.salable,
            category,
            parameters,
        })
    }

    async fn get_category(&self, id: i64) -> Result<Option<PartCategory>, AppError> {
        let category = sqlx::query_as::<_, CategoryRow>("SELECT * FROM part_categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| PartCategory {
                pk: row.id,
                name: row.name,
                description: row.description,
                pathstring: row.pathstring,
                parent: row.parent_id,
            });

        Ok(category)
    }

    pub async fn get_stock_location(&self, id: i64) -> Result<StockLocation, AppError> {
        let row = sqlx::query_as::<_, LocationRow>("SELECT * FROM stock_locations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::ObjectNotFound { kind: "StockLocation", pk: id })?;

        Ok(StockLocation {
            pk: row.id,
            name: row.name,
            description: row.description,
            pathstring: row.pathstring,
            structural: row.structural,
            external: row.external,
            parent: row.parent_id,
        })
    }

    pub async fn get_stock_item(&self, id: i64) -> Result<StockItem, AppError> {
        let row = sqlx::query_as::<_, StockItemRow>("SELECT * FROM stock_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::ObjectNotFound { kind: "StockItem", pk: id })?;

        let part = self.get_part(row.part_id).await?;

        let location = match row.location_id {
            Some(location_id) => Some(self.get_stock_location(location_id).await?),
            None => None,
        };

        let tests = sqlx::query_as::<_, TestResultRow>(
            r#"
            SELECT test, result, value, notes, date
            FROM stock_item_test_results
            WHERE stock_item_id = $1
            ORDER BY date ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|t| StockItemTestResult {
            test: t.test,
            result: t.result,
            value: t.value,
            notes: t.notes,
            date: t.date,
        })
        .collect();

        Ok(StockItem {
            pk: row.id,
            part,
            location,
            quantity: row.quantity,
            serial: row.serial,
            batch: row.batch,
            status: row.status,
            barcode_data: row.barcode_data,
            barcode_hash: row.barcode_hash,
            tests,
        })
    }

    pub async fn get_build_line(&self, id: i64) -> Result<BuildLine, AppError> {
        let row = sqlx::query_as::<_, BuildLineRow>("SELECT * FROM build_lines WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::ObjectNotFound { kind: "BuildLine", pk: id })?;

        let build_row = sqlx::query_as::<_, BuildRow>("SELECT * FROM builds WHERE id = $1")
            .bind(row.build_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::ObjectNotFound { kind: "Build", pk: row.build_id })?;

        let bom_row = sqlx::query_as::<_, BomItemRow>("SELECT * FROM bom_items WHERE id = $1")
            .bind(row.bom_item_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::ObjectNotFound { kind: "BomItem", pk: row.bom_item_id })?;

        let allocations = sqlx::query_as::<_, BuildItemRow>(
            "SELECT id, stock_item_id, quantity FROM build_items WHERE build_line_id = $1 ORDER BY id ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|a| BuildItem { pk: a.id, stock_item: a.stock_item_id, quantity: a.quantity })
        .collect();

        let build = Build {
            pk: build_row.id,
            reference: build_row.reference,
            title: build_row.title,
            quantity: build_row.quantity,
            status: build_row.status,
            part: self.get_part(build_row.part_id).await?,
        };

        let bom_item = BomItem {
            pk: bom_row.id,
            part: bom_row.part_id,
            sub_part: self.get_part(bom_row.sub_part_id).await?,
            quantity: bom_row.quantity,
            reference: bom_row.reference,
            optional: bom_row.optional,
            consumable: bom_row.consumable,
        };

        Ok(BuildLine {
            pk: row.id,
            build,
            bom_item,
            quantity: row.quantity,
            allocations,
        })
    }
}
