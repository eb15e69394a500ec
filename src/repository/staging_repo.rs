// ==========================================
// PIM 变体导入 - 暂存表 Repository Trait
// ==========================================
// 职责: 定义暂存表（tmp_<import_key>）数据访问接口
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 导入文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingFileFormat {
    pub delimiter: u8,
    pub enclosure: u8,
}

impl Default for StagingFileFormat {
    fn default() -> Self {
        Self {
            delimiter: b';',
            enclosure: b'"',
        }
    }
}

/// 新增列的类型定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSpec {
    Text { default: Option<String> },
    Integer { default: Option<i64> },
}

impl ColumnSpec {
    pub fn text(default: impl Into<String>) -> Self {
        ColumnSpec::Text {
            default: Some(default.into()),
        }
    }

    pub fn integer(default: i64) -> Self {
        ColumnSpec::Integer {
            default: Some(default),
        }
    }

    /// 列类型 + 约束（ALTER TABLE ADD COLUMN 片段）
    pub fn to_sql(&self) -> String {
        match self {
            ColumnSpec::Text { default: Some(v) } => {
                format!("TEXT NOT NULL DEFAULT {}", crate::db::quote_literal(v))
            }
            ColumnSpec::Text { default: None } => "TEXT".to_string(),
            ColumnSpec::Integer { default: Some(v) } => format!("INTEGER NOT NULL DEFAULT {}", v),
            ColumnSpec::Integer { default: None } => "INTEGER".to_string(),
        }
    }
}

/// 暂存表单元格（按 code 定位）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingCell {
    pub code: String,
    pub entity_id: Option<i64>,
    pub value: Option<String>,
}

/// 暂存表整行（列顺序 = 表结构顺序）
pub type StagingRow = IndexMap<String, Option<String>>;

// ==========================================
// StagingRepository Trait
// ==========================================
// 实现者: StagingRepositoryImpl（rusqlite + csv）
#[async_trait]
pub trait StagingRepository: Send + Sync {
    // ===== 建表与装载 =====

    /// 按文件表头创建暂存表（已存在则重建）
    ///
    /// # 参数
    /// - path: 导入文件
    /// - import_key: 导入编码（表名 tmp_<import_key>）
    /// - key_columns: 键列，首个为主键
    ///
    /// # 返回
    /// - Ok(Vec<String>): 文件表头列
    async fn create_from_file(
        &self,
        path: &Path,
        import_key: &str,
        key_columns: &[&str],
        format: StagingFileFormat,
    ) -> RepositoryResult<Vec<String>>;

    /// 装载文件数据行
    ///
    /// # 返回
    /// - Ok(usize): 写入的行数（空行不计）
    async fn load_rows_from_file(
        &self,
        path: &Path,
        import_key: &str,
        format: StagingFileFormat,
    ) -> RepositoryResult<usize>;

    /// 删除暂存表
    async fn drop_table(&self, import_key: &str) -> RepositoryResult<()>;

    // ===== 表结构 =====

    /// 列名列表（表结构顺序）
    async fn describe_columns(&self, import_key: &str) -> RepositoryResult<Vec<String>>;

    async fn column_exists(&self, import_key: &str, column: &str) -> RepositoryResult<bool>;

    /// 新增列
    ///
    /// # 返回
    /// - Ok(true): 已新增
    /// - Ok(false): 列已存在，未变更
    async fn add_column(
        &self,
        import_key: &str,
        column: &str,
        spec: &ColumnSpec,
    ) -> RepositoryResult<bool>;

    /// 复制列（目标列不存在时先创建）
    ///
    /// # 返回
    /// - Ok(false): 源列不存在，未执行
    async fn copy_column(&self, import_key: &str, from: &str, to: &str) -> RepositoryResult<bool>;

    // ===== 读写 =====

    /// 读取某列的全部单元格（按 code 排序）
    async fn fetch_cells(&self, import_key: &str, column: &str)
        -> RepositoryResult<Vec<StagingCell>>;

    /// 按 code 回写某列
    ///
    /// # 返回
    /// - Ok(usize): 更新行数
    async fn update_cells(
        &self,
        import_key: &str,
        column: &str,
        updates: &[(String, Option<String>)],
    ) -> RepositoryResult<usize>;

    /// 分页读取整行（code 升序，游标分页）
    ///
    /// # 参数
    /// - after_code: 上一页最后一行的 code；None 表示从头开始
    async fn fetch_rows_after(
        &self,
        import_key: &str,
        after_code: Option<&str>,
        limit: usize,
    ) -> RepositoryResult<Vec<StagingRow>>;
}
