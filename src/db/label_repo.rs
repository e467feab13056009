// src/db/label_repo.rs

use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::label::{LabelKind, LabelTemplate},
};

#[derive(Clone)]
pub struct LabelRepository {
    pool: PgPool,
}

impl LabelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Funções de "Leitura"
    // ---

    pub async fn list(&self, kind: LabelKind, enabled: Option<bool>) -> Result<Vec<LabelTemplate>, AppError> {
        let templates = sqlx::query_as::<_, LabelTemplate>(
            r#"
            SELECT * FROM label_templates
            WHERE kind = $1 AND ($2::BOOLEAN IS NULL OR enabled = $2)
            ORDER BY name ASC
            "#,
        )
        .bind(kind)
        .bind(enabled)
        .fetch_all(&self.pool)
        .await?;

        Ok(templates)
    }

    pub async fn find_by_id(&self, kind: LabelKind, id: i64) -> Result<Option<LabelTemplate>, AppError> {
        let template = sqlx::query_as::<_, LabelTemplate>(
            "SELECT * FROM label_templates WHERE kind = $1 AND id = $2",
        )
        .bind(kind)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(template)
    }

    // ---
    // Funções de "Escrita" (Transacionais)
    // ---

    pub async fn create<'e, E>(&self, executor: E, template: &LabelTemplate) -> Result<LabelTemplate, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, LabelTemplate>(
            r#"
            INSERT INTO label_templates
                (kind, name, description, label, enabled, width, height, filename_pattern, filters, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(template.kind)
        .bind(&template.name)
        .bind(&template.description)
        .bind(&template.label)
        .bind(template.enabled)
        .bind(template.width)
        .bind(template.height)
        .bind(&template.filename_pattern)
        .bind(&template.filters)
        .bind(&template.metadata)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, &template.label))
    }

    pub async fn update<'e, E>(&self, executor: E, template: &LabelTemplate) -> Result<LabelTemplate, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, LabelTemplate>(
            r#"
            UPDATE label_templates SET
                name = $3,
                description = $4,
                label = $5,
                enabled = $6,
                width = $7,
                height = $8,
                filename_pattern = $9,
                filters = $10,
                updated_at = NOW()
            WHERE kind = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(template.kind)
        .bind(template.id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(&template.label)
        .bind(template.enabled)
        .bind(template.width)
        .bind(template.height)
        .bind(&template.filename_pattern)
        .bind(&template.filters)
        .fetch_optional(executor)
        .await
        .map_err(|e| map_unique_violation(e, &template.label))?
        .ok_or(AppError::LabelNotFound(template.id))
    }

    pub async fn update_metadata(
        &self,
        kind: LabelKind,
        id: i64,
        metadata: &serde_json::Value,
    ) -> Result<LabelTemplate, AppError> {
        sqlx::query_as::<_, LabelTemplate>(
            r#"
            UPDATE label_templates SET metadata = $3, updated_at = NOW()
            WHERE kind = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(kind)
        .bind(id)
        .bind(metadata)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::LabelNotFound(id))
    }

    /// Remove o registro. O arquivo do template fica no disco.
    pub async fn delete(&self, kind: LabelKind, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM label_templates WHERE kind = $1 AND id = $2")
            .bind(kind)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::LabelNotFound(id));
        }
        Ok(())
    }
}

// O caminho do template é único entre todas as etiquetas.
fn map_unique_violation(e: sqlx::Error, label: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::UniqueConstraintViolation(format!(
                "Já existe uma etiqueta usando o arquivo '{}'",
                label
            ));
        }
    }
    e.into()
}
