// ==========================================
// PIM 变体导入 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 定位: 批处理 ETL（导入文件 → 暂存表 → 变体表 → 商品目录）
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "en");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 作用域/列语义/步骤结果
pub mod domain;

// 数据仓储层 - 暂存表/变体表/商品目录/运行日志
pub mod repository;

// 导入层 - 管道步骤与编排
pub mod importer;

// 配置层 - config_kv 读取与导入快照
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建库）
pub mod db;

// 日志系统
pub mod logging;

// 步骤级性能统计
pub mod perf;

// 国际化
pub mod i18n;

// ==========================================
// 重导出核心类型
// ==========================================

pub use config::{ConfigManager, ImportConfigReader, ImportSettings};
pub use domain::{
    ColumnDescriptor, PipelineReport, PipelineState, ScopeTable, StepOutcome, StepReport,
};
pub use importer::{
    ImportContext, ImportDefinition, ImportError, ImportResult, ImportStep, MediaImporter,
    PipelineBuilder, VariantImportPipeline,
};
pub use repository::{
    CatalogRepository, CatalogRepositoryImpl, ImportLogRepository, RepositoryError,
    RepositoryResult, StagingRepository, StagingRepositoryImpl, VariantRepository,
    VariantRepositoryImpl,
};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "PIM 变体导入";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
