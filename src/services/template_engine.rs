// src/services/template_engine.rs

use std::path::Path;
use std::sync::Arc;

use minijinja::{value::Value, AutoEscape, Environment, Error, ErrorKind, HtmlEscape, UndefinedBehavior};
use qrcode::{render::svg, QrCode};

use crate::{common::error::AppError, services::label_context::LabelContext};

pub const LABEL_BASE_TEMPLATE: &str = "label/label_base.html";

const LABEL_BASE_SOURCE: &str = include_str!("../../templates/label/label_base.html");

/// Ambiente de templates compartilhado entre as requisições (somente leitura).
#[derive(Clone)]
pub struct TemplateEngine {
    env: Arc<Environment<'static>>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();

        // Variáveis indefinidas (e seus atributos) viram texto vazio.
        env.set_undefined_behavior(UndefinedBehavior::Chainable);

        // Escape pela extensão, sem diferenciar maiúsculas (`LABEL.HTML`).
        env.set_auto_escape_callback(auto_escape);

        // `none` não aparece na etiqueta.
        env.set_formatter(|output, state, value| {
            if value.is_none() {
                return Ok(());
            }
            minijinja::escape_formatter(output, state, value)
        });

        env.add_filter("qrcode", qrcode_filter);

        // O template base é estático; falhar aqui é um erro de compilação do template embutido.
        if let Err(e) = env.add_template(LABEL_BASE_TEMPLATE, LABEL_BASE_SOURCE) {
            tracing::error!("🔥 Template base de etiquetas inválido: {}", e);
        }

        Self { env: Arc::new(env) }
    }

    /// Lê o template do disco e renderiza em HTML (com escape automático).
    pub fn render_file(&self, path: &Path, context: &LabelContext) -> Result<String, AppError> {
        let source = std::fs::read_to_string(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("label.html");

        self.render_named(name, &source, context)
    }

    pub fn render_named(&self, name: &str, source: &str, context: &LabelContext) -> Result<String, AppError> {
        let html = self
            .env
            .render_named_str(name, source, Value::from_serialize(context))?;
        Ok(html)
    }

    /// Renderiza um texto simples (sem escape de HTML), usado nos nomes de arquivo.
    pub fn render_str(&self, source: &str, context: &LabelContext) -> Result<String, AppError> {
        let text = self.env.render_str(source, Value::from_serialize(context))?;
        Ok(text)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn auto_escape(name: &str) -> AutoEscape {
    let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("html" | "htm" | "xml") => AutoEscape::Html,
        _ => AutoEscape::None,
    }
}

/// `{{ qr_data|qrcode }}`: QR code em SVG inline. O atributo `data-qr`
/// leva o conteúdo original para a etapa de PDF.
fn qrcode_filter(data: String) -> Result<Value, Error> {
    let code = QrCode::new(data.as_bytes())
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("QR code inválido: {}", e)))?;

    let image = code
        .render::<svg::Color>()
        .min_dimensions(120, 120)
        .build();

    let html = format!(
        "<div class=\"qrcode\" data-qr=\"{}\">{}</div>",
        HtmlEscape(&data),
        image
    );

    Ok(Value::from_safe_string(html))
}
