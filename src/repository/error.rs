// ==========================================
// PIM 变体导入 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 数据库错误 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    // ===== 表结构错误 =====
    #[error("表不存在: {0}")]
    TableNotFound(String),

    #[error("列不存在 (table={table}): {column}")]
    ColumnNotFound { table: String, column: String },

    // ===== 暂存文件错误 =====
    #[error("暂存文件读取失败: {0}")]
    StagingFileError(String),

    #[error("暂存文件表头为空: {0}")]
    EmptyHeader(String),

    // ===== 数据质量错误 =====
    #[error("字段值错误 (field={field}): {message}")]
    FieldValueError { field: String, message: String },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("no such table") {
                    RepositoryError::TableNotFound(msg)
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for RepositoryError {
    fn from(err: csv::Error) -> Self {
        RepositoryError::StagingFileError(err.to_string())
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        RepositoryError::StagingFileError(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for RepositoryError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        RepositoryError::LockError(err.to_string())
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_missing_table_maps_to_table_not_found() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.execute("DELETE FROM tmp_variant", []).unwrap_err();
        assert!(matches!(
            RepositoryError::from(err),
            RepositoryError::TableNotFound(_)
        ));
    }

    #[test]
    fn test_other_sqlite_failures_map_to_query_error() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (code TEXT PRIMARY KEY)").unwrap();
        conn.execute("INSERT INTO t (code) VALUES ('A')", []).unwrap();
        let err = conn
            .execute("INSERT INTO t (code) VALUES ('A')", [])
            .unwrap_err();
        assert!(matches!(
            RepositoryError::from(err),
            RepositoryError::DatabaseQueryError(_)
        ));
    }

    #[test]
    fn test_no_rows_maps_to_not_found() {
        assert!(matches!(
            RepositoryError::from(rusqlite::Error::QueryReturnedNoRows),
            RepositoryError::NotFound { .. }
        ));
    }
}
