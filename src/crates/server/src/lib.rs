pub mod consts;
pub mod jukebox_api;
pub mod middleware;

use application::command::jukebox::JukeboxAppService;
use application::command::shared::IdGenerator;
use application::error::AppError;
use application::query::get_jukebox_queue::GetJukeboxQueue;
use domain::value::JukeboxId;
use infra::config::AppConfigImpl;
use infra::id_generator::SnowflakeIdGenerator;
use infra::repository::in_memory::catalog::InMemoryCatalog;
use infra::repository::in_memory::jukebox::{
    InMemoryJukeboxQueueDao, InMemoryJukeboxQueueRepository,
};
use infra::repository::postgres::command::{
    jukebox::JukeboxQueueRepositoryImpl, song::SongRepositoryImpl, user::UserRepositoryImpl,
};
use infra::repository::postgres::query::jukebox::JukeboxQueueDaoImpl;
use infra::StorageKind;
use log::{info, warn};
use sea_orm::DatabaseConnection;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DbBackend, DbErr, Statement};
use std::sync::Arc;

pub struct AppState {
    pub jukebox_service: Arc<JukeboxAppService>,
    pub jukebox_query: GetJukeboxQueue,
}

impl AppState {
    pub async fn init_db(app_cfg: &AppConfigImpl) -> Result<DatabaseConnection, DbErr> {
        use std::time::Duration;

        let pool = app_cfg.database();
        let mut opt = ConnectOptions::new(app_cfg.database_url());
        opt.max_connections(pool.max_connections)
            .min_connections(pool.min_connections)
            .connect_timeout(pool.connect_timeout)
            .acquire_timeout(pool.acquire_timeout)
            .idle_timeout(Duration::from_secs(60))
            .max_lifetime(Duration::from_secs(300))
            .sqlx_logging(false)
            .sqlx_logging_level(log::LevelFilter::Info);

        let db = Database::connect(opt).await?;

        let backend = DbBackend::Postgres;
        db.execute(Statement::from_string(backend, "SELECT 1".to_owned()))
            .await?;

        info!("Database connection pool initialized successfully");
        Ok(db)
    }

    /// 按配置的存储后端装配服务
    pub async fn new(app_cfg: &AppConfigImpl) -> Result<Self, AppError> {
        let id_generator: Arc<dyn IdGenerator> =
            Arc::new(SnowflakeIdGenerator::new(app_cfg.node_id())?);
        let jukebox_id = JukeboxId::from(app_cfg.jukebox_id());

        match app_cfg.storage() {
            StorageKind::Postgres => {
                let db = Self::init_db(app_cfg)
                    .await
                    .map_err(|e| AppError::RepositoryError("Database".to_string(), e.to_string()))?;
                Ok(Self::postgres(db, jukebox_id, id_generator))
            }
            StorageKind::Memory => {
                warn!("Using in-memory storage, the queue is lost on restart");
                Ok(Self::in_memory(
                    InMemoryCatalog::with_sample_data(),
                    jukebox_id,
                    id_generator,
                ))
            }
        }
    }

    pub fn postgres(
        db: DatabaseConnection,
        jukebox_id: JukeboxId,
        id_generator: Arc<dyn IdGenerator>,
    ) -> Self {
        let jukebox_service = JukeboxAppService::new(
            Arc::new(JukeboxQueueRepositoryImpl::new(db.clone(), jukebox_id)),
            Arc::new(SongRepositoryImpl::new(db.clone())),
            Arc::new(UserRepositoryImpl::new(db.clone())),
            id_generator,
        );
        let jukebox_query = GetJukeboxQueue::new(Arc::new(JukeboxQueueDaoImpl::new(db, jukebox_id)));

        Self {
            jukebox_service: Arc::new(jukebox_service),
            jukebox_query,
        }
    }

    pub fn in_memory(
        catalog: InMemoryCatalog,
        jukebox_id: JukeboxId,
        id_generator: Arc<dyn IdGenerator>,
    ) -> Self {
        let queue_repository = InMemoryJukeboxQueueRepository::new(jukebox_id);
        let catalog_repository = Arc::new(catalog.clone());
        let jukebox_service = JukeboxAppService::new(
            Arc::new(queue_repository.clone()),
            catalog_repository.clone(),
            catalog_repository,
            id_generator,
        );
        let jukebox_query = GetJukeboxQueue::new(Arc::new(InMemoryJukeboxQueueDao::new(
            queue_repository,
            catalog,
        )));

        Self {
            jukebox_service: Arc::new(jukebox_service),
            jukebox_query,
        }
    }
}
