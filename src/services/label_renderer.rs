// src/services/label_renderer.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::{
    common::error::AppError,
    middleware::request::LabelRequest,
    models::{
        inventory::PrintObject,
        label::{LabelKind, LabelTemplate},
    },
    services::{
        label_context::LabelContext,
        pdf::{LabelDocument, PdfConverter, PdfJob, PDF_CONTENT_TYPE},
        plugins::PluginRegistry,
        template_engine::TemplateEngine,
    },
};

/// Tudo que a renderização precisa: onde estão os templates, o motor de
/// templates, os plugins e o conversor de PDF. Montado uma vez no startup.
#[derive(Clone)]
pub struct LabelRenderer {
    media_root: PathBuf,
    engine: TemplateEngine,
    plugins: PluginRegistry,
    converter: Arc<dyn PdfConverter>,
}

impl LabelRenderer {
    pub fn new(
        media_root: impl Into<PathBuf>,
        plugins: PluginRegistry,
        converter: Arc<dyn PdfConverter>,
    ) -> Self {
        Self {
            media_root: media_root.into(),
            engine: TemplateEngine::new(),
            plugins,
            converter,
        }
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Renderiza várias etiquetas do mesmo template em um único PDF (uma página por objeto).
    /// O nome do arquivo vem do primeiro objeto.
    pub fn render_many(
        &self,
        template: &LabelTemplate,
        objects: &[PrintObject],
        request: &LabelRequest,
    ) -> Result<LabelDocument, AppError> {
        let bound: Vec<BoundLabel<'_>> = objects
            .iter()
            .map(|object| template.bind(object))
            .collect::<Result<_, _>>()?;

        let first = bound.first().ok_or(AppError::NothingToPrint)?;
        let filename = first.generate_filename(request, self)?;

        let pages = bound
            .iter()
            .map(|label| label.render_as_string(request, self))
            .collect::<Result<Vec<_>, _>>()?;

        self.to_pdf(template, pages, filename, request)
    }

    /// Concatena o HTML de várias etiquetas (modo debug).
    pub fn render_many_as_string(
        &self,
        template: &LabelTemplate,
        objects: &[PrintObject],
        request: &LabelRequest,
    ) -> Result<String, AppError> {
        if objects.is_empty() {
            return Err(AppError::NothingToPrint);
        }

        let mut pages = Vec::with_capacity(objects.len());
        for object in objects {
            pages.push(template.bind(object)?.render_as_string(request, self)?);
        }

        Ok(pages.join("\n"))
    }

    fn to_pdf(
        &self,
        template: &LabelTemplate,
        pages: Vec<String>,
        filename: String,
        request: &LabelRequest,
    ) -> Result<LabelDocument, AppError> {
        let template_path = template.template_name(&self.media_root);

        let job = PdfJob {
            template_path: &template_path,
            pages,
            filename,
            base_url: &request.base_url,
            width_mm: template.width,
            height_mm: template.height,
            presentational_hints: true,
        };

        // Falhas do conversor sobem sem alteração.
        let bytes = self.converter.convert(&job)?;

        tracing::info!(
            label = template.id,
            pages = job.pages.len(),
            filename = %job.filename,
            "🏷️ Etiqueta gerada"
        );

        Ok(LabelDocument {
            filename: job.filename,
            content_type: PDF_CONTENT_TYPE,
            attachment: true,
            bytes,
        })
    }
}

impl LabelTemplate {
    /// Liga o template a um objeto para uma passada de renderização.
    /// O tipo do objeto precisa ser o mesmo da etiqueta.
    pub fn bind<'a>(&'a self, object: &'a PrintObject) -> Result<BoundLabel<'a>, AppError> {
        let found = LabelKind::of(object);
        if found != self.kind {
            return Err(AppError::KindMismatch {
                expected: self.kind,
                found,
            });
        }

        Ok(BoundLabel { template: self, object })
    }
}

/// Um template de etiqueta com o seu "objeto a imprimir".
#[derive(Debug, Clone, Copy)]
pub struct BoundLabel<'a> {
    template: &'a LabelTemplate,
    object: &'a PrintObject,
}

impl<'a> BoundLabel<'a> {
    pub fn template(&self) -> &'a LabelTemplate {
        self.template
    }

    pub fn object(&self) -> &'a PrintObject {
        self.object
    }

    /// Contexto específico do tipo de etiqueta.
    pub fn get_context_data(&self, request: &LabelRequest) -> LabelContext {
        self.object.label_context(request)
    }

    /// Contexto completo: dados da entidade, dados comuns e, por último, os plugins.
    pub fn context(&self, request: &LabelRequest, plugins: &PluginRegistry) -> LabelContext {
        let mut context = self.get_context_data(request);

        // Dados "básicos" que toda etiqueta recebe
        let timestamp = request.timestamp;
        context.insert("base_url".into(), Value::String(request.base_url.clone()));
        context.insert("date".into(), Value::String(timestamp.format("%Y-%m-%d").to_string()));
        context.insert(
            "datetime".into(),
            Value::String(timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
        );
        context.insert("request".into(), serde_json::to_value(request).unwrap_or(Value::Null));
        context.insert(
            "user".into(),
            serde_json::to_value(&request.user).unwrap_or(Value::Null),
        );
        context.insert("width".into(), Value::from(self.template.width));
        context.insert("height".into(), Value::from(self.template.height));

        // Os plugins podem sobrescrever qualquer chave
        plugins.add_label_context(self.template, self.object, request, &mut context);

        context
    }

    /// Nome do arquivo gerado, a partir do `filename_pattern`.
    pub fn generate_filename(&self, request: &LabelRequest, renderer: &LabelRenderer) -> Result<String, AppError> {
        let context = self.context(request, &renderer.plugins);
        renderer.engine.render_str(&self.template.filename_pattern, &context)
    }

    /// Renderiza a etiqueta em HTML. Útil no modo debug.
    pub fn render_as_string(&self, request: &LabelRequest, renderer: &LabelRenderer) -> Result<String, AppError> {
        let path = self.template.template_name(&renderer.media_root);
        let context = self.context(request, &renderer.plugins);
        renderer.engine.render_file(&path, &context)
    }

    /// Renderiza a etiqueta em PDF.
    pub fn render(&self, request: &LabelRequest, renderer: &LabelRenderer) -> Result<LabelDocument, AppError> {
        let filename = self.generate_filename(request, renderer)?;
        let html = self.render_as_string(request, renderer)?;
        renderer.to_pdf(self.template, vec![html], filename, request)
    }
}
