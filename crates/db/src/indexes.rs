use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Users
    create_indexes(
        db,
        "users",
        vec![
            index_unique(bson::doc! { "email": 1 }),
            index(bson::doc! { "quota_reset_date": 1 }),
        ],
    )
    .await?;

    // Jobs
    create_indexes(
        db,
        "jobs",
        vec![
            index(bson::doc! { "user_id": 1, "created_at": -1 }),
            index(bson::doc! { "status": 1, "completed_at": 1 }),
        ],
    )
    .await?;

    // Usage log. The unique (job_id, operation) pair is what makes billing
    // writes idempotent under event redelivery.
    create_indexes(
        db,
        "usage_logs",
        vec![
            index_unique(bson::doc! { "job_id": 1, "operation": 1 }),
            index(bson::doc! { "user_id": 1, "created_at": -1 }),
            index(bson::doc! { "created_at": -1 }),
        ],
    )
    .await?;

    // Alerts
    create_indexes(
        db,
        "alerts",
        vec![index(
            bson::doc! { "user_id": 1, "kind": 1, "created_at": -1 },
        )],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    info!(collection, "Indexes created");
    Ok(())
}
