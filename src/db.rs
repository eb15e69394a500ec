// ==========================================
// PIM 变体导入 - SQLite 连接与建库
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少单写者批处理时的偶发 busy 错误
// - 提供宿主目录表（门店/属性/商品/分类/URL 重写）的建库脚本
// - 动态列名一律经 quote_ident 加引号，禁止裸拼接
// ==========================================

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 持久化变体表名
pub const VARIANT_TABLE: &str = "pim_variant";

/// 暂存表名前缀（每次导入一张，按 import_key 命名）
pub const STAGING_TABLE_PREFIX: &str = "tmp_";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "PIM_IMPORT_DB_PATH";

/// 默认数据库路径
///
/// 优先 PIM_IMPORT_DB_PATH；否则用户数据目录下 pim-variant-import/pim.db
pub fn default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./pim.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("pim-variant-import");
        std::fs::create_dir_all(&dir).ok();
        path = dir.join("pim.db");
    }

    path.to_string_lossy().to_string()
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 标识符加引号（双引号包裹，内部双引号转义）
///
/// 暂存表的列名来自导入文件表头，只能以这种方式进入 SQL。
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// 字符串字面量加引号（仅用于 DDL 的 DEFAULT 子句，DML 一律绑定参数）
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// import_key → 暂存表名
pub fn staging_table_name(import_key: &str) -> String {
    format!("{}{}", STAGING_TABLE_PREFIX, import_key)
}

/// 表的列名列表（表结构顺序）；表不存在时返回空
pub fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(columns)
}

/// 将任意 SQLite 单元格读成文本
///
/// 暂存表混有 TEXT 与 INTEGER 列（_entity_id/_status 等），统一按文本流转。
pub fn value_as_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
    }
}

/// 初始化宿主目录 schema（幂等）
///
/// 包含:
/// - config_kv: 导入配置
/// - store / eav_attribute: 作用域与属性字典
/// - catalog_*: 商品实体、属性值、网站/分类关联
/// - pim_entities: 导入编码 → 内部 ID 映射（商品/分类/选项）
/// - url_rewrite / cache_invalidation
/// - pim_variant: 持久化变体表（列集合随每次导入重建）
/// - import_run / import_step_log: 运行日志
pub fn init_catalog_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS store (
            store_id INTEGER PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            website_id INTEGER NOT NULL DEFAULT 0,
            lang TEXT,
            channel_code TEXT,
            currency TEXT
        );

        CREATE TABLE IF NOT EXISTS eav_attribute (
            attribute_id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_type_id INTEGER NOT NULL,
            attribute_code TEXT NOT NULL,
            UNIQUE (entity_type_id, attribute_code)
        );

        CREATE TABLE IF NOT EXISTS catalog_product_entity (
            entity_id INTEGER PRIMARY KEY AUTOINCREMENT,
            sku TEXT NOT NULL UNIQUE,
            type_id TEXT NOT NULL DEFAULT 'simple',
            attribute_set_id INTEGER NOT NULL DEFAULT 4,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS catalog_product_entity_value (
            entity_id INTEGER NOT NULL,
            attribute_id INTEGER NOT NULL,
            store_id INTEGER NOT NULL DEFAULT 0,
            value TEXT,
            PRIMARY KEY (entity_id, attribute_id, store_id)
        );

        CREATE TABLE IF NOT EXISTS catalog_product_website (
            product_id INTEGER NOT NULL,
            website_id INTEGER NOT NULL,
            PRIMARY KEY (product_id, website_id)
        );

        CREATE TABLE IF NOT EXISTS catalog_category_entity (
            entity_id INTEGER PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS catalog_category_product (
            category_id INTEGER NOT NULL,
            product_id INTEGER NOT NULL,
            position INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (category_id, product_id)
        );

        CREATE TABLE IF NOT EXISTS pim_entities (
            import TEXT NOT NULL,
            code TEXT NOT NULL,
            entity_id INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (import, code)
        );

        CREATE TABLE IF NOT EXISTS url_rewrite (
            url_rewrite_id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_type TEXT NOT NULL,
            entity_id INTEGER NOT NULL,
            store_id INTEGER NOT NULL,
            request_path TEXT NOT NULL,
            target_path TEXT NOT NULL,
            UNIQUE (request_path, store_id)
        );

        CREATE TABLE IF NOT EXISTS cache_invalidation (
            cache_type TEXT PRIMARY KEY,
            invalidated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pim_variant (
            code TEXT PRIMARY KEY,
            axis TEXT
        );

        CREATE TABLE IF NOT EXISTS import_run (
            run_id TEXT PRIMARY KEY,
            import_code TEXT NOT NULL,
            file_path TEXT NOT NULL,
            state TEXT NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            report_json TEXT
        );

        CREATE TABLE IF NOT EXISTS import_step_log (
            run_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            step_code TEXT NOT NULL,
            success INTEGER NOT NULL,
            halted INTEGER NOT NULL,
            message TEXT,
            elapsed_ms INTEGER NOT NULL,
            PRIMARY KEY (run_id, position)
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    // 管理后台门店（store_id=0，默认值作用域）
    conn.execute(
        "INSERT OR IGNORE INTO store (store_id, code, website_id) VALUES (0, 'admin', 0)",
        [],
    )?;

    Ok(())
}
