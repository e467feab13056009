//src/main.rs

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use label_templates::{
    config::{AppState, Settings},
    docs::ApiDoc,
    handlers,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logger: nível via RUST_LOG (padrão: info)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let settings = Settings::from_env()?;
    let bind_addr = settings.bind_addr.clone();
    let app_state = AppState::new(settings).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let label_routes = Router::new()
        .route(
            "/{kind}",
            get(handlers::labels::list_labels).post(handlers::labels::create_label),
        )
        .route(
            "/{kind}/{id}",
            get(handlers::labels::get_label)
                .patch(handlers::labels::update_label)
                .delete(handlers::labels::delete_label),
        )
        .route(
            "/{kind}/{id}/metadata",
            get(handlers::labels::get_label_metadata).patch(handlers::labels::update_label_metadata),
        )
        .route("/{kind}/{id}/print", get(handlers::labels::print_label));

    // Combina tudo no router principal
    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/label", label_routes)
        .with_state(app_state);

    // Inicia o servidor
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
