use mediascribe_config::Settings;
use mediascribe_services::{
    AuthService, Orchestrator, QuotaGuard,
    dao::{alert::AlertDao, job::JobDao, usage_log::UsageLedger, user::UserDao},
    engine::{HttpSpeechEngine, SpeechEngine},
    object_store::{HttpObjectStore, ObjectStore},
};
use mongodb::Database;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Settings,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserDao>,
    pub jobs: Arc<JobDao>,
    pub ledger: Arc<UsageLedger>,
    pub alerts: Arc<AlertDao>,
    pub quota: Arc<QuotaGuard>,
    pub store: Arc<dyn ObjectStore>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(db: Database, settings: Settings) -> Self {
        let engine: Arc<dyn SpeechEngine> = Arc::new(HttpSpeechEngine::new(&settings.engine));
        let store: Arc<dyn ObjectStore> = Arc::new(HttpObjectStore::new(&settings.object_store));
        Self::with_engine(db, settings, engine, store)
    }

    /// Same wiring with the outbound clients injected; test setups swap in
    /// in-memory doubles here.
    pub fn with_engine(
        db: Database,
        settings: Settings,
        engine: Arc<dyn SpeechEngine>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let auth = Arc::new(AuthService::new(settings.jwt.clone()));
        let users = Arc::new(UserDao::new(&db));
        let jobs = Arc::new(JobDao::new(&db));
        let ledger = Arc::new(UsageLedger::new(&db));
        let alerts = Arc::new(AlertDao::new(&db));
        let quota = Arc::new(QuotaGuard::new(Arc::clone(&users)));

        let orchestrator = Orchestrator::start(
            Arc::clone(&jobs),
            Arc::clone(&ledger),
            Arc::clone(&users),
            engine,
            &settings.engine,
            settings.pricing.clone(),
        );

        Self {
            db,
            settings,
            auth,
            users,
            jobs,
            ledger,
            alerts,
            quota,
            store,
            orchestrator,
        }
    }
}
