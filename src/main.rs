#[tokio::main]
async fn main() -> kennel::error::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("kennel=info,sqlx=warn"),
    )
    .init();
    log::info!("Starting kennel site");

    match kennel::run().await {
        Ok(()) => {
            log::info!("Site shut down successfully");
            Ok(())
        }
        Err(e) => {
            log::error!("Site encountered an error: {}", e);
            Err(e)
        }
    }
}
