// src/config.rs

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::helpers::str2bool,
    db::{InventoryRepository, LabelRepository},
    services::{
        label_renderer::LabelRenderer,
        label_service::LabelService,
        pdf::GenPdfConverter,
        plugins::{CompanyInfoContributor, PluginRegistry},
    },
};

/// Configuração lida do ambiente (e do `.env`, se existir).
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    // Raiz dos arquivos enviados (templates em MEDIA_ROOT/label/template/...)
    pub media_root: PathBuf,
    // URL pública do site; sem ela, a URL base vem do header Host
    pub site_url: Option<String>,
    pub fonts_dir: PathBuf,
    pub font_family: String,
    pub label_debug: bool,
    pub company_name: Option<String>,
    pub bind_addr: String,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;

        Ok(Self {
            database_url,
            media_root: env::var("MEDIA_ROOT").unwrap_or_else(|_| "./media".into()).into(),
            site_url: non_empty_var("SITE_URL"),
            fonts_dir: env::var("FONTS_DIR").unwrap_or_else(|_| "./fonts".into()).into(),
            font_family: env::var("FONT_FAMILY").unwrap_or_else(|_| "Roboto".into()),
            label_debug: env::var("LABEL_DEBUG").map(|v| str2bool(&v)).unwrap_or(false),
            company_name: non_empty_var("COMPANY_NAME"),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into()),
        })
    }

    /// Plugins de contexto ativos, na ordem em que rodam.
    pub fn plugin_registry(&self) -> PluginRegistry {
        let mut builder = PluginRegistry::builder();
        if let Some(name) = &self.company_name {
            builder = builder.register(CompanyInfoContributor::new(name.clone()));
        }
        builder.build()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub settings: Arc<Settings>,
    pub label_service: LabelService,
}

impl AppState {
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&settings.database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let plugins = settings.plugin_registry();
        tracing::info!("🔌 {} plugin(s) de contexto de etiqueta registrado(s)", plugins.len());

        let converter = Arc::new(GenPdfConverter::new(&settings.fonts_dir, &settings.font_family));
        let renderer = LabelRenderer::new(&settings.media_root, plugins, converter);

        let label_service = LabelService::new(
            db_pool.clone(),
            LabelRepository::new(db_pool.clone()),
            InventoryRepository::new(db_pool.clone()),
            renderer,
            settings.label_debug,
        );

        Ok(Self {
            db_pool,
            settings: Arc::new(settings),
            label_service,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(company_name: Option<&str>) -> Settings {
        Settings {
            database_url: "postgres://localhost/labels".into(),
            media_root: "./media".into(),
            site_url: None,
            fonts_dir: "./fonts".into(),
            font_family: "Roboto".into(),
            label_debug: false,
            company_name: company_name.map(Into::into),
            bind_addr: "127.0.0.1:3000".into(),
        }
    }

    #[test]
    fn company_plugin_is_registered_only_when_configured() {
        assert!(settings(None).plugin_registry().is_empty());

        let registry = settings(Some("ACME")).plugin_registry();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.contributors().map(|p| p.slug()).collect::<Vec<_>>(),
            vec!["company-info"]
        );
    }
}
