// ==========================================
// PIM 变体导入 - 变体表 Repository Trait
// ==========================================
// 持久化变体表 pim_variant: code 主键 + axis + 上次导入的动态列
// ==========================================

use crate::repository::error::RepositoryResult;
use crate::repository::staging_repo::StagingRow;
use async_trait::async_trait;

#[async_trait]
pub trait VariantRepository: Send + Sync {
    /// 列名列表（表结构顺序）
    async fn describe_columns(&self) -> RepositoryResult<Vec<String>>;

    async fn drop_column(&self, column: &str) -> RepositoryResult<()>;

    /// 新增 TEXT 列；已存在返回 false
    async fn add_text_column(&self, column: &str) -> RepositoryResult<bool>;

    /// 批量 UPSERT（按 code 冲突更新）
    ///
    /// # 约束
    /// - 同一批次所有记录的列集合必须一致
    /// - 整批在一个事务内写入
    async fn upsert_batch(&self, rows: &[StagingRow]) -> RepositoryResult<usize>;

    /// 全表读取（code 升序）
    async fn fetch_all(&self) -> RepositoryResult<Vec<StagingRow>>;
}
