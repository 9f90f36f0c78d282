use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bson::oid::ObjectId;
use mediascribe_api::{build_router, state::AppState};
use mediascribe_config::Settings;
use mediascribe_db::indexes::ensure_indexes;
use mediascribe_db::models::{Job, JobStatus};
use mediascribe_services::engine::sign_payload;
use mongodb::{Client, Database, options::ClientOptions};
use tokio::net::TcpListener;

use super::mock_engine::{MockObjectStore, MockSpeechEngine};

/// A running test application with its own MongoDB database and in-memory
/// engine/object-store doubles.
pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub db: Database,
    pub settings: Settings,
    pub state: AppState,
    pub client: reqwest::Client,
    pub engine: Arc<MockSpeechEngine>,
    pub store: Arc<MockObjectStore>,
}

impl TestApp {
    /// Spawn a new test server connected to the test MongoDB.
    ///
    /// Requires a running MongoDB at localhost:27017.
    /// Set MEDIASCRIBE__DATABASE__URL env var to override the connection
    /// string. Each test gets a unique database name for isolation.
    pub async fn spawn() -> Self {
        Self::spawn_with_settings(|_| {}).await
    }

    /// Spawn a test server with customized settings.
    pub async fn spawn_with_settings(mutator: impl FnOnce(&mut Settings)) -> Self {
        let db_name = format!("mediascribe_test_{}", uuid::Uuid::new_v4().simple());

        let mut settings = Settings::load().unwrap_or_else(|_| test_settings());
        if let Ok(url) = std::env::var("MEDIASCRIBE__DATABASE__URL") {
            settings.database.url = url;
        }
        settings.database.name = db_name.clone();
        mutator(&mut settings);

        let client_options = ClientOptions::parse(&settings.database.url)
            .await
            .expect("Failed to parse MongoDB URL");
        let mongo_client =
            Client::with_options(client_options).expect("Failed to create MongoDB client");
        let db = mongo_client.database(&db_name);

        ensure_indexes(&db).await.expect("Failed to create indexes");

        let engine = Arc::new(MockSpeechEngine::new());
        let store = Arc::new(MockObjectStore::new());
        let state = AppState::with_engine(
            db.clone(),
            settings.clone(),
            Arc::clone(&engine) as _,
            Arc::clone(&store) as _,
        );
        let app = build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base_url = format!("http://{}", addr);
        let client = reqwest::Client::new();

        Self {
            addr,
            base_url,
            db,
            settings,
            state,
            client,
            engine,
            store,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Posts a signed engine callback the way the real engine would.
    pub async fn post_engine_callback(&self, payload: &serde_json::Value) -> reqwest::Response {
        let body = serde_json::to_vec(payload).unwrap();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature =
            sign_payload(&self.settings.engine.webhook_secret, &body, &timestamp).unwrap();

        self.client
            .post(self.url("/webhooks/engine"))
            .header("x-engine-signature", signature)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .expect("Webhook request failed")
    }

    /// Polls until the job reaches `status`; panics after 5 seconds. The
    /// queued transcribe/summarize hops run asynchronously, so API-level
    /// tests observe their effects through this.
    pub async fn wait_for_status(&self, job_id: ObjectId, status: JobStatus) -> Job {
        self.wait_for_job(job_id, |job| job.status == status).await
    }

    pub async fn wait_for_job(&self, job_id: ObjectId, predicate: impl Fn(&Job) -> bool) -> Job {
        for _ in 0..100 {
            let job = self
                .state
                .jobs
                .find_by_id(job_id)
                .await
                .expect("Job disappeared while waiting");
            if predicate(&job) {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let job = self.state.jobs.find_by_id(job_id).await.unwrap();
        panic!(
            "Timed out waiting for job {}; current status {}",
            job_id,
            job.status.as_str()
        );
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let db = self.db.clone();
        // Best effort cleanup: drop the test database
        tokio::spawn(async move {
            let _ = db.drop().await;
        });
    }
}

fn test_settings() -> Settings {
    Settings {
        app: mediascribe_config::AppSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec![],
        },
        database: mediascribe_config::DatabaseSettings {
            url: "mongodb://localhost:27017".to_string(),
            name: "mediascribe_test".to_string(),
            max_pool_size: Some(5),
            min_pool_size: Some(1),
        },
        jwt: mediascribe_config::JwtSettings {
            secret: "test-secret-key-for-jwt-signing-minimum-32-chars".to_string(),
            access_token_ttl_secs: 3600,
            issuer: "mediascribe".to_string(),
        },
        object_store: mediascribe_config::ObjectStoreSettings {
            endpoint: "http://localhost:9000".to_string(),
            api_key: "test-key".to_string(),
            bucket: "mediascribe-test".to_string(),
        },
        engine: mediascribe_config::EngineSettings {
            base_url: "http://localhost:8100".to_string(),
            api_key: "test-key".to_string(),
            webhook_secret: "test-webhook-secret".to_string(),
            request_timeout_secs: 5,
            max_retries: 3,
        },
        pricing: mediascribe_config::PricingSettings {
            transcription_per_minute_usd: 0.006,
            summarization_usd: 0.01,
        },
        retention: mediascribe_config::RetentionSettings {
            retention_days: 30,
            sweep_cron: "0 0 3 * * *".to_string(),
        },
        alerts: mediascribe_config::AlertSettings {
            high_cost_threshold_usd: 50.0,
            lookback_hours: 24,
            cooldown_hours: 24,
            monitor_cron: "0 0 * * * *".to_string(),
            reconcile_cron: "0 30 4 * * *".to_string(),
        },
    }
}
