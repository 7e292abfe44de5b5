use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use crate::auth::jwt::JwtKeys;
use crate::auth::mailer::{LogMailer, MemoryMailer, ResetMailer};
use crate::auth::password::PasswordHasher;
use crate::config::{AppConfig, HashingConfig, JwtConfig, StorageConfig, UploadConfig};
use crate::storage::{MemoryStorage, S3Storage, StorageClient};
use crate::users::{memory::MemoryUserStore, repo::PgUserStore, repo::UserStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageClient>,
    pub mailer: Arc<dyn ResetMailer>,
    pub jwt: JwtKeys,
    pub hasher: PasswordHasher,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn UserStore> = match &config.database_url {
            Some(url) => {
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
                    warn!(error = %e, "migration failed; continuing");
                }
                Arc::new(PgUserStore::new(db))
            }
            None => {
                warn!("DATABASE_URL not set; using in-process user store");
                Arc::new(MemoryUserStore::new())
            }
        };

        let storage: Arc<dyn StorageClient> = Arc::new(S3Storage::connect(&config.storage).await);

        let jwt = JwtKeys::new(&config.jwt);
        let hasher = PasswordHasher::new(&config.hashing)?;
        info!(production = config.production, "application state ready");

        Ok(Self {
            store,
            config,
            storage,
            mailer: Arc::new(LogMailer),
            jwt,
            hasher,
        })
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn ResetMailer>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn with_config(mut self, f: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = (*self.config).clone();
        f(&mut cfg);
        self.jwt = JwtKeys::new(&cfg.jwt);
        self.config = Arc::new(cfg);
        self
    }

    /// In-memory state with cheap hashing parameters.
    pub fn fake() -> Self {
        Self::fake_with_storage().0
    }

    /// Like [`fake`](Self::fake), also handing back the object store.
    pub fn fake_with_storage() -> (Self, Arc<MemoryStorage>) {
        let config = AppConfig {
            database_url: None,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                cookie_expire_days: 30,
            },
            hashing: HashingConfig {
                memory_kib: 8,
                iterations: 1,
                parallelism: 1,
            },
            uploads: UploadConfig {
                max_file_upload_bytes: 1024,
                path: "uploads".into(),
            },
            storage: StorageConfig {
                minio_endpoint: "fake".into(),
                minio_bucket: "fake".into(),
                minio_access_key: "fake".into(),
                minio_secret_key: "fake".into(),
                minio_region: "us-east-1".into(),
            },
            reset_ttl_minutes: 10,
            public_url: "http://localhost:8080".into(),
            admin_emails: vec!["admin@example.com".into()],
            production: false,
        };

        let storage = Arc::new(MemoryStorage::default());
        let jwt = JwtKeys::new(&config.jwt);
        let hasher = PasswordHasher::new(&config.hashing).expect("fake hashing params ok");
        let state = Self {
            store: Arc::new(MemoryUserStore::new()),
            config: Arc::new(config),
            storage: storage.clone() as Arc<dyn StorageClient>,
            mailer: Arc::new(MemoryMailer::default()),
            jwt,
            hasher,
        };
        (state, storage)
    }
}
