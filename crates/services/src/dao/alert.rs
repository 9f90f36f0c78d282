use bson::{DateTime, doc, oid::ObjectId};
use mongodb::Database;

use mediascribe_db::models::{Alert, AlertKind};

use super::base::{BaseDao, DaoResult};

pub struct AlertDao {
    pub base: BaseDao<Alert>,
}

impl AlertDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Alert::COLLECTION),
        }
    }

    /// Creates an alert unless one of the same kind for the same user was
    /// raised after `cooldown_start`. Returns the alert when created.
    pub async fn create_deduped(
        &self,
        user_id: Option<ObjectId>,
        kind: AlertKind,
        message: String,
        amount_usd: Option<f64>,
        cooldown_start: DateTime,
    ) -> DaoResult<Option<Alert>> {
        let user_filter = match user_id {
            Some(id) => doc! { "user_id": id },
            None => doc! { "user_id": bson::Bson::Null },
        };
        let mut filter = user_filter;
        filter.insert("kind", kind.as_str());
        filter.insert("created_at", doc! { "$gte": cooldown_start });

        if self.base.find_one(filter).await?.is_some() {
            return Ok(None);
        }

        let alert = Alert {
            id: None,
            user_id,
            kind,
            message,
            amount_usd,
            created_at: DateTime::now(),
        };
        let id = self.base.insert_one(&alert).await?;
        Ok(Some(self.base.find_by_id(id).await?))
    }

    pub async fn find_recent(&self, limit: i64) -> DaoResult<Vec<Alert>> {
        use futures::TryStreamExt;
        let mut cursor = self
            .base
            .collection()
            .find(doc! {})
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .await?;
        let mut alerts = Vec::new();
        while let Some(alert) = cursor.try_next().await? {
            alerts.push(alert);
        }
        Ok(alerts)
    }
}
