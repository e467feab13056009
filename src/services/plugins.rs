// src/services/plugins.rs

use std::sync::Arc;

use serde_json::Value;

use crate::{
    middleware::request::LabelRequest,
    models::{inventory::PrintObject, label::LabelTemplate},
    services::label_context::LabelContext,
};

/// Um plugin que acrescenta dados ao contexto das etiquetas.
///
/// Os plugins rodam depois do contexto base e podem sobrescrever qualquer
/// chave (o último a escrever vence).
pub trait LabelContextContributor: Send + Sync {
    fn slug(&self) -> &str;

    fn add_label_context(
        &self,
        template: &LabelTemplate,
        object: &PrintObject,
        request: &LabelRequest,
        context: &mut LabelContext,
    );
}

/// Registro de plugins. Montado uma vez na inicialização e somente leitura depois.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    contributors: Arc<Vec<Arc<dyn LabelContextContributor>>>,
}

impl PluginRegistry {
    pub fn builder() -> PluginRegistryBuilder {
        PluginRegistryBuilder::default()
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Plugins na ordem de registro.
    pub fn contributors(&self) -> impl Iterator<Item = &Arc<dyn LabelContextContributor>> {
        self.contributors.iter()
    }

    pub fn len(&self) -> usize {
        self.contributors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }

    pub fn add_label_context(
        &self,
        template: &LabelTemplate,
        object: &PrintObject,
        request: &LabelRequest,
        context: &mut LabelContext,
    ) {
        for plugin in self.contributors() {
            tracing::debug!(plugin = plugin.slug(), label = template.id, "Aplicando contexto do plugin");
            plugin.add_label_context(template, object, request, context);
        }
    }
}

#[derive(Default)]
pub struct PluginRegistryBuilder {
    contributors: Vec<Arc<dyn LabelContextContributor>>,
}

impl PluginRegistryBuilder {
    pub fn register<P>(mut self, plugin: P) -> Self
    where
        P: LabelContextContributor + 'static,
    {
        tracing::info!("🔌 Plugin de etiquetas registrado: {}", plugin.slug());
        self.contributors.push(Arc::new(plugin));
        self
    }

    pub fn build(self) -> PluginRegistry {
        PluginRegistry {
            contributors: Arc::new(self.contributors),
        }
    }
}

// ---
// Plugin embutido: dados da empresa (COMPANY_NAME)
// ---
pub struct CompanyInfoContributor {
    company_name: String,
}

impl CompanyInfoContributor {
    pub fn new(company_name: impl Into<String>) -> Self {
        Self { company_name: company_name.into() }
    }
}

impl LabelContextContributor for CompanyInfoContributor {
    fn slug(&self) -> &str {
        "company-info"
    }

    fn add_label_context(
        &self,
        _template: &LabelTemplate,
        _object: &PrintObject,
        _request: &LabelRequest,
        context: &mut LabelContext,
    ) {
        context.insert("company_name".into(), Value::String(self.company_name.clone()));
    }
}
