use config::{Config, Environment, File};
use dotenvy::dotenv;
use serde::Deserialize;
use std::error::Error;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawConfig {
    database_url: String,
    /// 存储后端: "postgres" 或 "memory"
    storage: String,
    /// 雪花算法节点ID，多实例部署时每个实例需不同
    node_id: i64,
    /// 店内点唱机ID
    jukebox_id: i64,
    /// 数据库连接池配置
    database: RawDatabaseConfig,
    /// 服务器配置
    server: RawServerConfig,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            database_url: "".to_string(),
            storage: "postgres".to_string(),
            node_id: 1,
            jukebox_id: 1,
            database: RawDatabaseConfig::default(),
            server: RawServerConfig::default(),
        }
    }
}

/// 数据库连接池配置（原始配置）
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawDatabaseConfig {
    max_connections: u32,
    min_connections: u32,
    connect_timeout_secs: u64,
    acquire_timeout_secs: u64,
}

impl Default for RawDatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: 20,
            min_connections: 2,
            connect_timeout_secs: 3,
            acquire_timeout_secs: 8,
        }
    }
}

/// 服务器配置（原始配置）
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawServerConfig {
    /// 监听地址
    host: String,
    /// 监听端口
    port: u16,
}

impl Default for RawServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Postgres,
    Memory,
}

impl TryFrom<&str> for StorageKind {
    type Error = String;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageKind::Postgres),
            "memory" | "in_memory" => Ok(StorageKind::Memory),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

/// 数据库连接池配置
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub acquire_timeout: Duration,
}

/// 服务器配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct AppConfigImpl {
    database_url: String,
    storage: StorageKind,
    node_id: i64,
    jukebox_id: i64,
    database: DatabaseConfig,
    server: ServerConfig,
}

impl AppConfigImpl {
    fn new(data: RawConfig) -> Result<Self, String> {
        let storage = StorageKind::try_from(data.storage.as_str())?;
        if storage == StorageKind::Postgres && data.database_url.is_empty() {
            return Err("database_url is required when storage is postgres".to_string());
        }
        Ok(AppConfigImpl {
            database_url: data.database_url,
            storage,
            node_id: data.node_id,
            jukebox_id: data.jukebox_id,
            database: DatabaseConfig {
                max_connections: data.database.max_connections,
                min_connections: data.database.min_connections,
                connect_timeout: Duration::from_secs(data.database.connect_timeout_secs),
                acquire_timeout: Duration::from_secs(data.database.acquire_timeout_secs),
            },
            server: ServerConfig {
                host: data.server.host,
                port: data.server.port,
            },
        })
    }

    /// 加载配置：`.env` → `config.toml`（可选）→ `APP__` 前缀环境变量
    pub fn load() -> Result<AppConfigImpl, Box<dyn Error>> {
        dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        let raw: RawConfig = config.try_deserialize()?; // serde 自动填充默认值
        Ok(AppConfigImpl::new(raw)?)
    }

    pub fn database_url(&self) -> String {
        self.database_url.clone()
    }

    pub fn storage(&self) -> StorageKind {
        self.storage
    }

    pub fn node_id(&self) -> i64 {
        self.node_id
    }

    pub fn jukebox_id(&self) -> i64 {
        self.jukebox_id
    }

    pub fn database(&self) -> DatabaseConfig {
        self.database.clone()
    }

    pub fn server(&self) -> ServerConfig {
        self.server.clone()
    }
}
