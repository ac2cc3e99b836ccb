//src/main.rs

use anyhow::Context;
use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod lifecycle;
mod middleware;
mod models;
mod services;

use crate::config::AppState;
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;
use crate::services::scheduler::spawn_contract_sweeper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("storeit_backend=info,tower_http=info")),
        )
        .with_target(false)
        .compact()
        .init();

    let app_state = AppState::new()
        .await
        .context("Falha ao inicializar o estado da aplicação")?;

    // Migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .context("Falha ao rodar as migrações do banco de dados")?;

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    if let Some((email, password)) = &app_state.settings.bootstrap_hr {
        app_state
            .auth_service
            .ensure_bootstrap_hr(email, password)
            .await
            .context("Falha ao criar a conta inicial de RH")?;
    }

    let _sweeper = spawn_contract_sweeper(
        app_state.contract_service.clone(),
        Duration::from_secs(app_state.settings.sweep_interval_secs),
    );

    let app = router(app_state.clone());

    let listener = TcpListener::bind(&app_state.settings.bind_addr)
        .await
        .with_context(|| format!("Falha ao escutar em {}", app_state.settings.bind_addr))?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("Erro no servidor Axum")?;
    Ok(())
}

fn router(app_state: AppState) -> Router {
    // Rotas públicas
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/reactivate", post(handlers::auth::reactivate_account))
        .route("/password-reset", post(handlers::auth::request_password_reset))
        .route("/password-reset/verify", post(handlers::auth::verify_reset_code))
        .route("/password-reset/confirm", post(handlers::auth::reset_password));

    let user_routes = Router::new()
        .route(
            "/me",
            get(handlers::auth::get_me)
                .put(handlers::auth::update_me)
                .delete(handlers::auth::delete_me),
        )
        .route("/me/credentials", put(handlers::auth::update_my_credentials));

    let staff_routes = Router::new()
        .route("/", post(handlers::auth::create_staff))
        .route("/{id}", delete(handlers::auth::delete_staff))
        .route("/{id}/reactivate", post(handlers::auth::reactivate_staff))
        .route("/{id}/warehouse", put(handlers::auth::transfer_staff));

    let warehouse_routes = Router::new()
        .route(
            "/",
            post(handlers::warehouses::create_warehouse).get(handlers::warehouses::list_warehouses),
        )
        .route(
            "/{id}",
            get(handlers::warehouses::get_warehouse).delete(handlers::warehouses::deactivate_warehouse),
        )
        .route(
            "/{id}/spaces",
            post(handlers::warehouses::create_space).get(handlers::warehouses::list_free_spaces),
        );

    let space_routes = Router::new()
        .route(
            "/{id}",
            get(handlers::warehouses::get_space).delete(handlers::warehouses::deactivate_space),
        )
        .route("/{id}/movements", get(handlers::warehouses::list_space_movements))
        .route("/{id}/reconcile", post(handlers::warehouses::reconcile_space));

    let contract_routes = Router::new()
        .route(
            "/",
            post(handlers::contracts::create_contract).get(handlers::contracts::list_contracts),
        )
        .route(
            "/{id}",
            get(handlers::contracts::get_contract).put(handlers::contracts::edit_contract),
        )
        .route("/{id}/verify", post(handlers::contracts::verify_contract))
        .route("/{id}/activate", post(handlers::contracts::activate_contract))
        .route("/{id}/cancel", post(handlers::contracts::cancel_contract))
        .route("/{id}/finalize", post(handlers::contracts::finalize_contract))
        .route("/{id}/pdf", get(handlers::contracts::contract_pdf));

    let product_routes = Router::new()
        .route("/", get(handlers::products::list_my_products))
        .route("/warehouse", get(handlers::products::list_warehouse_products))
        .route("/intake", post(handlers::products::intake_product))
        .route("/{id}/withdraw", post(handlers::products::withdraw_product))
        .route("/{id}/movements", get(handlers::products::product_movements));

    let chat_routes = Router::new()
        .route("/", post(handlers::chat::start_chat))
        .route(
            "/{id}/messages",
            post(handlers::chat::send_message).get(handlers::chat::list_messages),
        )
        .route("/{id}/close", post(handlers::chat::close_chat));

    // Tudo abaixo exige Bearer válido
    let protected = Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/staff", staff_routes)
        .route("/api/clients", get(handlers::auth::list_clients))
        .nest("/api/warehouses", warehouse_routes)
        .nest("/api/spaces", space_routes)
        .nest("/api/contracts", contract_routes)
        .nest("/api/products", product_routes)
        .nest("/api/chats", chat_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    Router::new()
        .route("/api/health", get(handlers::auth::health))
        .nest("/api/auth", auth_routes)
        .merge(protected)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
