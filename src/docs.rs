// src/docs.rs

use utoipa::OpenApi;
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- LABELS ---
        handlers::labels::list_labels,
        handlers::labels::create_label,
        handlers::labels::get_label,
        handlers::labels::update_label,
        handlers::labels::delete_label,
        handlers::labels::get_label_metadata,
        handlers::labels::update_label_metadata,
        handlers::labels::print_label,
    ),
    components(
        schemas(
            // --- Labels ---
            models::label::LabelKind,
            models::label::LabelTemplate,

            // --- Payloads ---
            models::label::CreateLabelPayload,
            models::label::UpdateLabelPayload,
            models::label::MetadataPayload,
        )
    ),
    tags(
        (name = "Labels", description = "Templates de Etiquetas e Impressão")
    )
)]
pub struct ApiDoc;
