#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mesa_observability::init();

    let config = mesa_api::config::ApiConfig::from_env()?;
    let app = mesa_api::app::build_app(&config)?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
