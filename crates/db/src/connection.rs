use mediascribe_config::Settings;
use mongodb::{Client, Database, options::ClientOptions};
use tracing::info;

/// Opens the MongoDB client with configured pool bounds and proves the
/// connection with a ping before handing the database out. Index bootstrap
/// runs against the returned handle.
pub async fn connect(settings: &Settings) -> Result<Database, mongodb::error::Error> {
    let cfg = &settings.database;

    let mut options = ClientOptions::parse(&cfg.url).await?;
    options.max_pool_size = cfg.max_pool_size.or(options.max_pool_size);
    options.min_pool_size = cfg.min_pool_size.or(options.min_pool_size);

    let client = Client::with_options(options)?;
    client
        .database("admin")
        .run_command(bson::doc! { "ping": 1 })
        .await?;

    info!(db = %cfg.name, "MongoDB connection established");
    Ok(client.database(&cfg.name))
}
