// src/services/label_service.rs

use std::path::{Path, PathBuf};

use serde_json::Value;
use sqlx::PgPool;
use validator::{ValidationError, ValidationErrors};

use crate::{
    common::error::AppError,
    db::{InventoryRepository, LabelRepository},
    middleware::request::LabelRequest,
    models::label::{
        media_path, CreateLabelPayload, LabelKind, LabelTemplate, TemplateUpload,
        UpdateLabelPayload,
    },
    services::{label_renderer::LabelRenderer, pdf::LabelDocument},
};

/// Resultado de uma impressão: PDF, ou o HTML cru no modo debug.
#[derive(Debug)]
pub enum PrintOutput {
    Html(String),
    Pdf(LabelDocument),
}

#[derive(Clone)]
pub struct LabelService {
    pool: PgPool,
    label_repo: LabelRepository,
    inventory_repo: InventoryRepository,
    renderer: LabelRenderer,
    // LABEL_DEBUG: toda impressão devolve HTML
    debug_mode: bool,
}

impl LabelService {
    pub fn new(
        pool: PgPool,
        label_repo: LabelRepository,
        inventory_repo: InventoryRepository,
        renderer: LabelRenderer,
        debug_mode: bool,
    ) -> Self {
        Self {
            pool,
            label_repo,
            inventory_repo,
            renderer,
            debug_mode,
        }
    }

    // --- LISTAGEM ---
    // Com `items`, só as etiquetas cujos filtros aceitam todos os objetos.
    pub async fn list_templates(
        &self,
        kind: LabelKind,
        enabled: Option<bool>,
        items: &[i64],
    ) -> Result<Vec<LabelTemplate>, AppError> {
        let templates = self.label_repo.list(kind, enabled).await?;

        if items.is_empty() {
            return Ok(templates);
        }

        let objects = self.inventory_repo.load_print_objects(kind, items).await?;

        Ok(templates
            .into_iter()
            .filter(|template| template.applies_to(&objects))
            .collect())
    }

    pub async fn get(&self, kind: LabelKind, id: i64) -> Result<LabelTemplate, AppError> {
        self.label_repo
            .find_by_id(kind, id)
            .await?
            .ok_or(AppError::LabelNotFound(id))
    }

    // --- CRIAÇÃO ---
    // O arquivo é gravado dentro da transação: se a gravação falhar, o registro não existe.
    pub async fn create(&self, kind: LabelKind, payload: CreateLabelPayload) -> Result<LabelTemplate, AppError> {
        let (template, upload) = payload.into_template(kind)?;

        let mut tx = self.pool.begin().await?;

        let created = self.label_repo.create(&mut *tx, &template).await?;
        self.write_template(&upload).await?;

        tx.commit().await?;

        tracing::info!(id = created.id, kind = %kind, label = %created.label, "✅ Etiqueta criada");
        Ok(created)
    }

    // --- ATUALIZAÇÃO ---
    pub async fn update(
        &self,
        kind: LabelKind,
        id: i64,
        payload: UpdateLabelPayload,
    ) -> Result<LabelTemplate, AppError> {
        let mut template = self.get(kind, id).await?;
        let upload = payload.apply(&mut template)?;

        // O novo conteúdo vai para um arquivo temporário; o template atual só é
        // substituído depois do commit.
        let staged = match &upload {
            Some(upload) => Some(StagedTemplate::write(self.renderer.media_root(), upload).await?),
            None => None,
        };

        let mut tx = self.pool.begin().await?;

        let updated = match self.label_repo.update(&mut *tx, &template).await {
            Ok(updated) => updated,
            Err(e) => {
                if let Some(staged) = staged {
                    staged.discard().await;
                }
                return Err(e);
            }
        };

        if let Err(e) = tx.commit().await {
            if let Some(staged) = staged {
                staged.discard().await;
            }
            return Err(e.into());
        }

        if let Some(staged) = staged {
            staged.persist().await?;
        }

        tracing::info!(id = updated.id, kind = %kind, "✅ Etiqueta atualizada");
        Ok(updated)
    }

    pub async fn delete(&self, kind: LabelKind, id: i64) -> Result<(), AppError> {
        self.label_repo.delete(kind, id).await?;
        tracing::info!(id, kind = %kind, "🗑️ Etiqueta removida");
        Ok(())
    }

    // --- METADATA ---
    pub async fn get_metadata(&self, kind: LabelKind, id: i64) -> Result<Value, AppError> {
        Ok(self.get(kind, id).await?.metadata)
    }

    /// PATCH: as chaves enviadas substituem as existentes, as outras ficam.
    pub async fn update_metadata(&self, kind: LabelKind, id: i64, patch: Value) -> Result<Value, AppError> {
        let Value::Object(patch) = patch else {
            let mut err = ValidationError::new("type");
            err.message = Some("O metadata deve ser um objeto JSON.".into());
            let mut errors = ValidationErrors::new();
            errors.add("metadata", err);
            return Err(AppError::ValidationError(errors));
        };

        let current = self.get(kind, id).await?;
        let mut metadata = match current.metadata {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        metadata.extend(patch);

        let updated = self
            .label_repo
            .update_metadata(kind, id, &Value::Object(metadata))
            .await?;

        Ok(updated.metadata)
    }

    // --- IMPRESSÃO ---
    pub async fn print(
        &self,
        kind: LabelKind,
        id: i64,
        items: &[i64],
        request: LabelRequest,
        debug: bool,
    ) -> Result<PrintOutput, AppError> {
        if items.is_empty() {
            return Err(AppError::NothingToPrint);
        }

        let template = self.get(kind, id).await?;
        let objects = self.inventory_repo.load_print_objects(kind, items).await?;

        let renderer = self.renderer.clone();
        let debug = debug || self.debug_mode;

        // Renderização e PDF são síncronos (CPU); saem do executor async.
        let output = tokio::task::spawn_blocking(move || {
            if debug {
                renderer
                    .render_many_as_string(&template, &objects, &request)
                    .map(PrintOutput::Html)
            } else {
                renderer
                    .render_many(&template, &objects, &request)
                    .map(PrintOutput::Pdf)
            }
        })
        .await
        .map_err(|e| AppError::InternalServerError(e.into()))??;

        Ok(output)
    }

    async fn write_template(&self, upload: &TemplateUpload) -> Result<(), AppError> {
        let path = media_path(self.renderer.media_root(), &upload.path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, upload.content.as_bytes()).await?;

        tracing::debug!(path = %path.display(), "Template gravado");
        Ok(())
    }
}

/// Template gravado ao lado do destino, esperando o commit.
#[derive(Debug)]
struct StagedTemplate {
    staging: PathBuf,
    target: PathBuf,
}

impl StagedTemplate {
    async fn write(media_root: &Path, upload: &TemplateUpload) -> Result<Self, AppError> {
        let target = media_path(media_root, &upload.path);
        let mut staging = target.clone().into_os_string();
        staging.push(".upload");
        let staging = PathBuf::from(staging);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&staging, upload.content.as_bytes()).await?;

        Ok(Self { staging, target })
    }

    async fn persist(self) -> Result<(), AppError> {
        tokio::fs::rename(&self.staging, &self.target).await?;
        tracing::debug!(path = %self.target.display(), "Template substituído");
        Ok(())
    }

    async fn discard(self) {
        if let Err(e) = tokio::fs::remove_file(&self.staging).await {
            tracing::warn!(path = %self.staging.display(), "⚠️ Temporário não removido: {}", e);
        }
    }
}
