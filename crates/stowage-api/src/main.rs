use stowage_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (storage, thumbnail deriver, routes)
    let (_state, router) = stowage_api::setup::initialize_app(config.clone()).await?;

    // Start the server
    stowage_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
