use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub cookie_expire_days: i64,
}

/// Argon2 work factor.
#[derive(Debug, Clone, Deserialize)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub max_file_upload_bytes: usize,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub minio_endpoint: String,
    pub minio_bucket: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub minio_region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs against the in-process store.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub hashing: HashingConfig,
    pub uploads: UploadConfig,
    pub storage: StorageConfig,
    pub reset_ttl_minutes: i64,
    pub public_url: String,
    pub admin_emails: Vec<String>,
    pub production: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "useraccounts".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "useraccounts-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60 * 24 * 30),
            cookie_expire_days: env_parse("JWT_COOKIE_EXPIRE", 30),
        };
        let hashing = HashingConfig {
            memory_kib: env_parse("ARGON2_MEMORY_KIB", 19 * 1024),
            iterations: env_parse("ARGON2_ITERATIONS", 2),
            parallelism: env_parse("ARGON2_PARALLELISM", 1),
        };
        let uploads = UploadConfig {
            max_file_upload_bytes: env_parse("MAX_FILE_UPLOAD_SIZE", 10 * 1024 * 1024),
            path: std::env::var("FILE_UPLOAD_PATH").unwrap_or_else(|_| "uploads".into()),
        };
        let storage = StorageConfig {
            minio_endpoint: std::env::var("MINIO_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:9000".into()),
            minio_bucket: std::env::var("MINIO_BUCKET").unwrap_or_else(|_| "useraccounts".into()),
            minio_access_key: std::env::var("MINIO_ACCESS_KEY")
                .unwrap_or_else(|_| "minioadmin".into()),
            minio_secret_key: std::env::var("MINIO_SECRET_KEY")
                .unwrap_or_else(|_| "minioadmin".into()),
            minio_region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };
        Ok(Self {
            database_url,
            jwt,
            hashing,
            uploads,
            storage,
            reset_ttl_minutes: env_parse("RESET_TOKEN_TTL_MINUTES", 10),
            public_url: std::env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into()),
            admin_emails: parse_list(&std::env::var("ADMIN_EMAILS").unwrap_or_default()),
            production: std::env::var("APP_ENV")
                .map(|v| v == "production")
                .unwrap_or(false),
        })
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|a| a.eq_ignore_ascii_case(email))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
