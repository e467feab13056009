// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::label::LabelKind;

// Tipo de erro único da aplicação, com `thiserror` para a ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Tipo de etiqueta desconhecido: {0}")]
    UnknownLabelKind(String),

    #[error("Etiqueta {0} não encontrada")]
    LabelNotFound(i64),

    #[error("{kind} {pk} não encontrado")]
    ObjectNotFound { kind: &'static str, pk: i64 },

    #[error("A etiqueta é do tipo '{expected}', mas o objeto é '{found}'")]
    KindMismatch { expected: LabelKind, found: LabelKind },

    #[error("Nenhum objeto selecionado para impressão")]
    NothingToPrint,

    #[error("{0}")]
    UniqueConstraintViolation(String),

    #[error("Fonte não encontrada: {0}")]
    FontNotFound(String),

    #[error("Falha ao ler ou gravar o arquivo de template: {0}")]
    TemplateFile(#[from] std::io::Error),

    #[error("Falha ao renderizar o template: {0}")]
    TemplateRender(#[from] minijinja::Error),

    #[error("Falha ao gerar o PDF: {0}")]
    PdfRender(String),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação, campo a campo.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| match &e.message {
                            Some(m) => m.to_string(),
                            None => e.code.to_string(),
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::UnknownLabelKind(_) | AppError::LabelNotFound(_) | AppError::ObjectNotFound { .. } => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            AppError::KindMismatch { .. } | AppError::NothingToPrint => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::UniqueConstraintViolation(msg) => (StatusCode::CONFLICT, msg),

            // Todos os outros erros viram 500.
            // O `tracing` loga a mensagem detalhada que o `thiserror` montou.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Ocorreu um erro inesperado.".to_string())
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_bad_request() {
        let mut errors = validator::ValidationErrors::new();
        errors.add("width", validator::ValidationError::new("range"));

        let response = AppError::ValidationError(errors).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_label_is_not_found() {
        let response = AppError::LabelNotFound(7).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn duplicate_template_is_conflict() {
        let response = AppError::UniqueConstraintViolation("dup".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
