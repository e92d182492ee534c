use std::{env, path::PathBuf, str::FromStr};

use anyhow::{Context, Result};

pub const EDIT_PERMISSION_DISABLED: i8 = 0;
pub const EDIT_PERMISSION_ENABLED: i8 = 1;

const DEFAULT_ALLOWED_MIMES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/tiff",
    "image/tif",
    "image/avif",
    "image/heic",
    "image/heif",
];

/// Process-wide settings, loaded once in `main` and shared through `AppState`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub admin: AdminSettings,
    pub jwt: JwtSettings,
    pub upload: UploadSettings,
    pub images: ImageSettings,
}

#[derive(Clone, Debug)]
pub struct ServerSettings {
    pub port: u16,
    pub production: bool,
}

#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug)]
pub struct AdminSettings {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct JwtSettings {
    pub secret: String,
    pub expires_days: i64,
}

#[derive(Clone, Debug)]
pub struct UploadSettings {
    pub static_dir: PathBuf,
    pub max_file_size: u64,
    pub max_files: usize,
    pub allowed_mimes: Vec<String>,
}

impl UploadSettings {
    pub fn is_allowed_image(&self, content_type: Option<&str>) -> bool {
        let Some(content_type) = content_type else {
            return false;
        };
        let essence = content_type
            .parse::<mime::Mime>()
            .map(|parsed| parsed.essence_str().to_ascii_lowercase())
            .unwrap_or_else(|_| content_type.trim().to_ascii_lowercase());
        self.allowed_mimes.iter().any(|allowed| *allowed == essence)
    }
}

#[derive(Clone, Debug)]
pub struct ImageSettings {
    pub max_width: u32,
    pub effort: u8,
    pub max_concurrency: usize,
    pub quality: FormatQuality,
}

/// Lossy encoder quality (1-100). PNG, WebP and TIFF are written losslessly.
#[derive(Clone, Debug)]
pub struct FormatQuality {
    pub jpeg: u8,
    pub avif: u8,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let environment = env::var("APP_ENV")
            .or_else(|_| env::var("NODE_ENV"))
            .unwrap_or_default();

        let allowed_mimes = match env::var("UPLOAD_ALLOWED_MIMES") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .map(|value| value.trim().to_ascii_lowercase())
                .filter(|value| !value.is_empty())
                .collect(),
            _ => default_allowed_mimes(),
        };

        Ok(Self {
            server: ServerSettings {
                port: env_or("PORT", 3000)?,
                production: environment.eq_ignore_ascii_case("production"),
            },
            database: DatabaseSettings {
                host: env_string("DB_HOST", "localhost"),
                port: env_or("DB_PORT", 3306)?,
                username: env_string("DB_USER", "root"),
                password: env_string("DB_PASSWORD", "123456"),
                database: env_string("DB_NAME", "skullgirls"),
                max_connections: env_or("DB_MAX_CONNECTIONS", 10)?,
            },
            admin: AdminSettings {
                username: env_string("ADMIN_USERNAME", "admin"),
                password: env_string("ADMIN_PASSWORD", "admin"),
            },
            jwt: JwtSettings {
                secret: env_string("JWT_SECRET", "十年之约"),
                expires_days: env_or("JWT_EXPIRES_DAYS", 365)?,
            },
            upload: UploadSettings {
                static_dir: PathBuf::from(env_string("STATIC_DIR", "./static")),
                max_file_size: env_or("UPLOAD_MAX_FILE_SIZE", 99 * 1024 * 1024 * 1024)?,
                max_files: env_or("UPLOAD_MAX_FILES", 999)?,
                allowed_mimes,
            },
            images: ImageSettings {
                max_width: env_or("IMAGE_MAX_WIDTH", 200)?,
                effort: env_or("IMAGE_EFFORT", 6)?,
                max_concurrency: env_or::<usize>("IMAGE_MAX_CONCURRENCY", 4)?.max(1),
                quality: FormatQuality {
                    jpeg: env_or("IMAGE_QUALITY_JPEG", 80)?,
                    avif: env_or("IMAGE_QUALITY_AVIF", 80)?,
                },
            },
        })
    }

    /// Connection URL for the configured database.
    pub fn database_url(&self) -> String {
        format!("{}/{}", self.server_url(), self.database.database)
    }

    /// Connection URL without a database, used to create the schema on first boot.
    pub fn server_url(&self) -> String {
        let db = &self.database;
        format!(
            "mysql://{}:{}@{}:{}",
            urlencoding::encode(&db.username),
            urlencoding::encode(&db.password),
            db.host,
            db.port
        )
    }
}

pub fn default_allowed_mimes() -> Vec<String> {
    DEFAULT_ALLOWED_MIMES.iter().map(|m| m.to_string()).collect()
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} env var is not valid")),
        _ => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn test_config(static_dir: &std::path::Path) -> AppConfig {
    AppConfig {
        server: ServerSettings {
            port: 3000,
            production: false,
        },
        database: DatabaseSettings {
            host: "localhost".to_string(),
            port: 3306,
            username: "root".to_string(),
            password: "123456".to_string(),
            database: "skullgirls".to_string(),
            max_connections: 1,
        },
        admin: AdminSettings {
            username: "admin".to_string(),
            password: "admin".to_string(),
        },
        jwt: JwtSettings {
            secret: "test-secret".to_string(),
            expires_days: 365,
        },
        upload: UploadSettings {
            static_dir: static_dir.to_path_buf(),
            max_file_size: 1024 * 1024,
            max_files: 10,
            allowed_mimes: default_allowed_mimes(),
        },
        images: ImageSettings {
            max_width: 200,
            effort: 6,
            max_concurrency: 2,
            quality: FormatQuality { jpeg: 80, avif: 80 },
        },
    }
}
