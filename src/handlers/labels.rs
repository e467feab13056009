// src/handlers/labels.rs

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use validator::ValidationErrors;

use crate::{
    common::{
        error::AppError,
        helpers::{parse_id_list, str2bool},
    },
    config::AppState,
    middleware::request::LabelRequest,
    models::label::{
        CreateLabelPayload, LabelKind, LabelTemplate, MetadataPayload, UpdateLabelPayload,
    },
    services::label_service::PrintOutput,
};

// ---
// Query strings
// ---
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListLabelsQuery {
    /// Somente etiquetas ativas (ou inativas)
    pub enabled: Option<bool>,
    /// Ids separados por vírgula: só as etiquetas cujos filtros aceitam todos eles
    pub items: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PrintLabelQuery {
    /// Ids separados por vírgula, na ordem de impressão
    pub items: Option<String>,
    /// Devolve o HTML em vez do PDF
    pub debug: Option<String>,
}

// O `{kind}` da URL: stock, location, part ou buildline.
fn parse_kind(slug: &str) -> Result<LabelKind, AppError> {
    LabelKind::from_api_slug(slug).ok_or_else(|| AppError::UnknownLabelKind(slug.to_string()))
}

fn parse_items(raw: Option<&str>) -> Result<Vec<i64>, AppError> {
    parse_id_list(raw.unwrap_or_default()).map_err(|e| {
        let mut errors = ValidationErrors::new();
        errors.add("items", e);
        AppError::ValidationError(errors)
    })
}

// ---
// Handler: list_labels
// ---
#[utoipa::path(
    get,
    path = "/api/label/{kind}",
    tag = "Labels",
    params(
        ("kind" = String, Path, description = "stock, location, part ou buildline"),
        ListLabelsQuery
    ),
    responses(
        (status = 200, description = "Etiquetas do tipo", body = Vec<LabelTemplate>),
        (status = 404, description = "Tipo desconhecido ou objeto não encontrado")
    )
)]
pub async fn list_labels(
    State(app_state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<ListLabelsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let kind = parse_kind(&kind)?;
    let items = parse_items(query.items.as_deref())?;

    let templates = app_state
        .label_service
        .list_templates(kind, query.enabled, &items)
        .await?;

    Ok((StatusCode::OK, Json(templates)))
}

// ---
// Handler: create_label
// ---
#[utoipa::path(
    post,
    path = "/api/label/{kind}",
    tag = "Labels",
    request_body = CreateLabelPayload,
    params(("kind" = String, Path, description = "stock, location, part ou buildline")),
    responses(
        (status = 201, description = "Etiqueta criada e template gravado", body = LabelTemplate),
        (status = 400, description = "Dados inválidos (extensão, filtros, dimensões)"),
        (status = 409, description = "Arquivo de template já usado por outra etiqueta")
    )
)]
pub async fn create_label(
    State(app_state): State<AppState>,
    Path(kind): Path<String>,
    Json(payload): Json<CreateLabelPayload>,
) -> Result<impl IntoResponse, AppError> {
    let kind = parse_kind(&kind)?;

    let template = app_state.label_service.create(kind, payload).await?;

    Ok((StatusCode::CREATED, Json(template)))
}

#[utoipa::path(
    get,
    path = "/api/label/{kind}/{id}",
    tag = "Labels",
    params(
        ("kind" = String, Path, description = "stock, location, part ou buildline"),
        ("id" = i64, Path, description = "ID da etiqueta")
    ),
    responses(
        (status = 200, description = "Etiqueta", body = LabelTemplate),
        (status = 404, description = "Etiqueta não encontrada")
    )
)]
pub async fn get_label(
    State(app_state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let kind = parse_kind(&kind)?;
    let template = app_state.label_service.get(kind, id).await?;
    Ok((StatusCode::OK, Json(template)))
}

#[utoipa::path(
    patch,
    path = "/api/label/{kind}/{id}",
    tag = "Labels",
    request_body = UpdateLabelPayload,
    params(
        ("kind" = String, Path, description = "stock, location, part ou buildline"),
        ("id" = i64, Path, description = "ID da etiqueta")
    ),
    responses(
        (status = 200, description = "Etiqueta atualizada", body = LabelTemplate),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Etiqueta não encontrada")
    )
)]
pub async fn update_label(
    State(app_state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
    Json(payload): Json<UpdateLabelPayload>,
) -> Result<impl IntoResponse, AppError> {
    let kind = parse_kind(&kind)?;
    let template = app_state.label_service.update(kind, id, payload).await?;
    Ok((StatusCode::OK, Json(template)))
}

#[utoipa::path(
    delete,
    path = "/api/label/{kind}/{id}",
    tag = "Labels",
    params(
        ("kind" = String, Path, description = "stock, location, part ou buildline"),
        ("id" = i64, Path, description = "ID da etiqueta")
    ),
    responses(
        (status = 204, description = "Etiqueta removida (o arquivo do template é mantido)"),
        (status = 404, description = "Etiqueta não encontrada")
    )
)]
pub async fn delete_label(
    State(app_state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let kind = parse_kind(&kind)?;
    app_state.label_service.delete(kind, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---
// Metadata
// ---
#[utoipa::path(
    get,
    path = "/api/label/{kind}/{id}/metadata",
    tag = "Labels",
    params(
        ("kind" = String, Path, description = "stock, location, part ou buildline"),
        ("id" = i64, Path, description = "ID da etiqueta")
    ),
    responses((status = 200, description = "Metadata da etiqueta", body = MetadataPayload))
)]
pub async fn get_label_metadata(
    State(app_state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let kind = parse_kind(&kind)?;
    let metadata = app_state.label_service.get_metadata(kind, id).await?;
    Ok((StatusCode::OK, Json(MetadataPayload { metadata })))
}

#[utoipa::path(
    patch,
    path = "/api/label/{kind}/{id}/metadata",
    tag = "Labels",
    request_body = MetadataPayload,
    params(
        ("kind" = String, Path, description = "stock, location, part ou buildline"),
        ("id" = i64, Path, description = "ID da etiqueta")
    ),
    responses(
        (status = 200, description = "Metadata mesclado", body = MetadataPayload),
        (status = 400, description = "Metadata não é um objeto JSON")
    )
)]
pub async fn update_label_metadata(
    State(app_state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
    Json(payload): Json<MetadataPayload>,
) -> Result<impl IntoResponse, AppError> {
    let kind = parse_kind(&kind)?;
    let metadata = app_state
        .label_service
        .update_metadata(kind, id, payload.metadata)
        .await?;
    Ok((StatusCode::OK, Json(MetadataPayload { metadata })))
}

// ---
// Handler: print_label
// ---
#[utoipa::path(
    get,
    path = "/api/label/{kind}/{id}/print",
    tag = "Labels",
    params(
        ("kind" = String, Path, description = "stock, location, part ou buildline"),
        ("id" = i64, Path, description = "ID da etiqueta"),
        PrintLabelQuery,
        ("x-remote-user" = Option<String>, Header, description = "Usuário autenticado pelo proxy")
    ),
    responses(
        (status = 200, description = "PDF da etiqueta (application/pdf), ou HTML no modo debug"),
        (status = 400, description = "Nenhum item, ou item de outro tipo"),
        (status = 404, description = "Etiqueta ou item não encontrado")
    )
)]
pub async fn print_label(
    State(app_state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
    Query(query): Query<PrintLabelQuery>,
    request: LabelRequest,
) -> Result<Response, AppError> {
    let kind = parse_kind(&kind)?;
    let items = parse_items(query.items.as_deref())?;
    let debug = query.debug.as_deref().is_some_and(str2bool);

    let output = app_state
        .label_service
        .print(kind, id, &items, request, debug)
        .await?;

    match output {
        PrintOutput::Html(html) => Ok(Html(html).into_response()),
        PrintOutput::Pdf(document) => {
            // Configura os Headers para o navegador baixar o PDF
            let headers = [
                (header::CONTENT_TYPE, document.content_type.to_string()),
                (header::CONTENT_DISPOSITION, document.content_disposition()),
            ];
            Ok((headers, document.bytes).into_response())
        }
    }
}
