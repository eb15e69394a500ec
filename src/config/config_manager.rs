// ==========================================
// PIM 变体导入 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::mapping::AttributeMappingRule;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::RepositoryError;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ImportResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ImportResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> ImportResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ImportError::from(RepositoryError::LockError(e.to_string())))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> ImportResult<Option<String>> {
        let conn = self.get_conn()?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ImportResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ImportResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> ImportResult<String> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有 global 配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 写入运行日志，便于回溯某次导入使用的配置
    pub fn get_config_snapshot(&self) -> ImportResult<String> {
        let conn = self.get_conn()?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&config_map)?)
    }

    /// 单字符配置（分隔符/包围符）
    fn get_single_byte(&self, key: &str, default: u8) -> ImportResult<u8> {
        let value = self.get_config_or_default(key, &(default as char).to_string())?;
        match value.as_bytes() {
            [b] => Ok(*b),
            [] => Ok(default),
            _ => Err(ImportError::ConfigValueError {
                key: key.to_string(),
                value,
                message: "必须为单个 ASCII 字符".to_string(),
            }),
        }
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    // ===== 文件格式 =====

    async fn get_file_delimiter(&self) -> ImportResult<u8> {
        self.get_single_byte(config_keys::FILE_DELIMITER, b';')
    }

    async fn get_file_enclosure(&self) -> ImportResult<u8> {
        self.get_single_byte(config_keys::FILE_ENCLOSURE, b'"')
    }

    // ===== 商品配置 =====

    async fn is_image_import_enabled(&self) -> ImportResult<bool> {
        let value = self.get_config_or_default(config_keys::IMAGE_ENABLED, "0")?;
        Ok(matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes"
        ))
    }

    async fn get_attribute_mapping(&self) -> ImportResult<Vec<AttributeMappingRule>> {
        let value = self.get_config_or_default(config_keys::ATTRIBUTE_MAPPING, "[]")?;
        let rules: Vec<AttributeMappingRule> = serde_json::from_str(&value).unwrap_or_else(|_| {
            tracing::warn!(
                config_key = config_keys::ATTRIBUTE_MAPPING,
                raw_value = %value,
                "属性复制规则格式错误，使用空配置"
            );
            Vec::new()
        });

        Ok(rules
            .into_iter()
            .filter(|r| !r.pim_attribute.is_empty() && !r.magento_attribute.is_empty())
            .collect())
    }

    async fn get_product_tax_classes(&self) -> ImportResult<BTreeMap<i64, i64>> {
        let value = self.get_config_or_default(config_keys::TAX_CLASS, "{}")?;
        let raw: BTreeMap<String, i64> = serde_json::from_str(&value).unwrap_or_else(|_| {
            tracing::warn!(
                config_key = config_keys::TAX_CLASS,
                raw_value = %value,
                "门店税率类别配置格式错误，使用空配置"
            );
            BTreeMap::new()
        });

        let mut classes = BTreeMap::new();
        for (store, tax_class) in raw {
            match store.trim().parse::<i64>() {
                Ok(store_id) => {
                    classes.insert(store_id, tax_class);
                }
                Err(_) => {
                    tracing::warn!(store = %store, "税率类别配置中的门店 ID 无效，已忽略");
                }
            }
        }
        Ok(classes)
    }

    async fn get_allowed_type_ids(&self) -> ImportResult<Vec<String>> {
        let value = self.get_config_or_default(config_keys::ALLOWED_TYPE_IDS, "configurable")?;

        let types: Vec<String> = value
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if types.is_empty() {
            Ok(vec!["configurable".to_string()])
        } else {
            Ok(types)
        }
    }

    // ===== SEO =====

    async fn get_product_url_suffix(&self) -> ImportResult<String> {
        self.get_config_or_default(config_keys::PRODUCT_URL_SUFFIX, ".html")
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 导入文件格式
    pub const FILE_DELIMITER: &str = "pim/file/delimiter";
    pub const FILE_ENCLOSURE: &str = "pim/file/enclosure";

    // 媒体
    pub const IMAGE_ENABLED: &str = "pim/image/enabled";

    // 商品
    pub const ATTRIBUTE_MAPPING: &str = "pim/product/attribute_mapping"; // JSON 数组
    pub const TAX_CLASS: &str = "pim/product/tax_class"; // JSON 对象 {"store_id": tax_class_id}

    // 变体
    pub const ALLOWED_TYPE_IDS: &str = "pim/variant/allowed_type_ids"; // 逗号分隔

    // SEO
    pub const PRODUCT_URL_SUFFIX: &str = "catalog/seo/product_url_suffix";
}
