use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub minio: MinIOConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    /// Budget for a single service call; every sub-operation observes it
    pub request_timeout: Duration,
}

/// Which metadata store backs the services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataBackend {
    Postgres,
    /// Ephemeral, process-local store for local runs
    Memory,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: MetadataBackend,
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

/// MinIO/S3 storage configuration for presigned uploads and downloads
#[derive(Debug, Clone)]
pub struct MinIOConfig {
    /// MinIO/S3 endpoint URL
    pub endpoint: String,
    /// Access key for authentication
    pub access_key: String,
    /// Secret key for authentication
    pub secret_key: String,
    /// Bucket name for storing files
    pub bucket: String,
    /// AWS region (for S3 compatibility)
    pub region: String,
    /// Validity of presigned PUT URLs in seconds
    pub upload_url_expiry_secs: u32,
    /// Validity of presigned GET URLs in seconds
    pub download_url_expiry_secs: u32,
}

/// Limits and switches for media handling
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub max_file_size: i64,
    pub storage_quota_bytes: i64,
    pub thumbnails_enabled: bool,
    pub batch_concurrency: usize,
    pub upload_url_expiry_secs: u32,
    pub download_url_expiry_secs: u32,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        let app = AppConfig::from_env()?;
        let minio = MinIOConfig::from_env()?;
        let media = MediaConfig::from_env(&app, &minio)?;

        Ok(Config {
            database: DatabaseConfig::from_env()?,
            app,
            minio,
            media,
        })
    }
}

impl AppConfig {
    const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        // Parse CORS allowed origins from comma-separated string
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_REQUEST_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "REQUEST_TIMEOUT_SECS must be a valid number".to_string())?;

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    // Default values for database connection pool (conservative defaults for small-medium apps)
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let backend = match env::var("METADATA_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" => MetadataBackend::Postgres,
            "memory" => MetadataBackend::Memory,
            other => return Err(format!("Unknown METADATA_BACKEND: {}", other)),
        };

        let url = match backend {
            MetadataBackend::Postgres => {
                env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?
            }
            MetadataBackend::Memory => env::var("DATABASE_URL").unwrap_or_default(),
        };

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MAX_CONNECTIONS must be a valid number".to_string())?;

        let min_connections = env::var("DB_MIN_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MIN_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MIN_CONNECTIONS must be a valid number".to_string())?;

        let acquire_timeout_secs = env::var("DB_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_ACQUIRE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_ACQUIRE_TIMEOUT_SECS must be a valid number".to_string())?;

        let idle_timeout_secs = env::var("DB_IDLE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_IDLE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_IDLE_TIMEOUT_SECS must be a valid number".to_string())?;

        let max_lifetime_secs = env::var("DB_MAX_LIFETIME_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_LIFETIME_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_MAX_LIFETIME_SECS must be a valid number".to_string())?;

        Ok(Self {
            backend,
            url,
            max_connections,
            min_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
        })
    }
}

impl MinIOConfig {
    const DEFAULT_UPLOAD_URL_EXPIRY_SECS: u32 = 4 * 3600; // 4 hours
    const DEFAULT_DOWNLOAD_URL_EXPIRY_SECS: u32 = 3600; // 1 hour

    pub fn from_env() -> Result<Self, String> {
        let endpoint =
            env::var("MINIO_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".to_string());

        let access_key = env::var("MINIO_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string());

        let secret_key = env::var("MINIO_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string());

        let bucket = env::var("MINIO_BUCKET").unwrap_or_else(|_| "media-vault".to_string());

        let region = env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".to_string());

        let upload_url_expiry_secs = env::var("MINIO_UPLOAD_URL_EXPIRY_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_UPLOAD_URL_EXPIRY_SECS.to_string())
            .parse::<u32>()
            .map_err(|_| "MINIO_UPLOAD_URL_EXPIRY_SECS must be a valid number".to_string())?;

        let download_url_expiry_secs = env::var("MINIO_DOWNLOAD_URL_EXPIRY_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_DOWNLOAD_URL_EXPIRY_SECS.to_string())
            .parse::<u32>()
            .map_err(|_| "MINIO_DOWNLOAD_URL_EXPIRY_SECS must be a valid number".to_string())?;

        Ok(Self {
            endpoint,
            access_key,
            secret_key,
            bucket,
            region,
            upload_url_expiry_secs,
            download_url_expiry_secs,
        })
    }
}

impl MediaConfig {
    const DEFAULT_MAX_FILE_SIZE: i64 = 500 * 1024 * 1024; // 500MB
    const DEFAULT_STORAGE_QUOTA_BYTES: i64 = 15 * 1024 * 1024 * 1024; // 15GB
    const DEFAULT_BATCH_CONCURRENCY: usize = 4;

    pub fn from_env(app: &AppConfig, minio: &MinIOConfig) -> Result<Self, String> {
        let max_file_size = env::var("MEDIA_MAX_FILE_SIZE")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_FILE_SIZE.to_string())
            .parse::<i64>()
            .map_err(|_| "MEDIA_MAX_FILE_SIZE must be a valid number".to_string())?;

        let storage_quota_bytes = env::var("MEDIA_STORAGE_QUOTA_BYTES")
            .unwrap_or_else(|_| Self::DEFAULT_STORAGE_QUOTA_BYTES.to_string())
            .parse::<i64>()
            .map_err(|_| "MEDIA_STORAGE_QUOTA_BYTES must be a valid number".to_string())?;

        if storage_quota_bytes <= 0 {
            return Err("MEDIA_STORAGE_QUOTA_BYTES must be positive".to_string());
        }

        let thumbnails_enabled = env::var("MEDIA_THUMBNAILS_ENABLED")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        let batch_concurrency = env::var("MEDIA_BATCH_CONCURRENCY")
            .unwrap_or_else(|_| Self::DEFAULT_BATCH_CONCURRENCY.to_string())
            .parse::<usize>()
            .map_err(|_| "MEDIA_BATCH_CONCURRENCY must be a valid number".to_string())?
            .max(1);

        Ok(Self {
            max_file_size,
            storage_quota_bytes,
            thumbnails_enabled,
            batch_concurrency,
            upload_url_expiry_secs: minio.upload_url_expiry_secs,
            download_url_expiry_secs: minio.download_url_expiry_secs,
            request_timeout: app.request_timeout,
        })
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_file_size: Self::DEFAULT_MAX_FILE_SIZE,
            storage_quota_bytes: Self::DEFAULT_STORAGE_QUOTA_BYTES,
            thumbnails_enabled: true,
            batch_concurrency: Self::DEFAULT_BATCH_CONCURRENCY,
            upload_url_expiry_secs: MinIOConfig::DEFAULT_UPLOAD_URL_EXPIRY_SECS,
            download_url_expiry_secs: MinIOConfig::DEFAULT_DOWNLOAD_URL_EXPIRY_SECS,
            request_timeout: Duration::from_secs(AppConfig::DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}
