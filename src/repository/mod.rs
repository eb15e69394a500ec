// ==========================================
// PIM 变体导入 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供暂存表、变体表、宿主目录、运行日志的数据访问
// 约束: 值一律参数化；动态列名一律 quote_ident
// ==========================================

pub mod catalog_repo;
pub mod catalog_repo_impl;
pub mod error;
pub mod import_log_repo;
pub mod staging_repo;
pub mod staging_repo_impl;
pub mod variant_repo;
pub mod variant_repo_impl;

// 重导出核心仓储
pub use catalog_repo::{CatalogRepository, CategoryLink, EntityMatchSummary, ImportCategory};
pub use catalog_repo_impl::CatalogRepositoryImpl;
pub use error::{RepositoryError, RepositoryResult};
pub use import_log_repo::{ImportLogRepository, ImportRunEntity};
pub use staging_repo::{ColumnSpec, StagingCell, StagingFileFormat, StagingRepository, StagingRow};
pub use staging_repo_impl::StagingRepositoryImpl;
pub use variant_repo::VariantRepository;
pub use variant_repo_impl::VariantRepositoryImpl;
