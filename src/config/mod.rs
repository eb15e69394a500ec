// ==========================================
// PIM 变体导入 - 配置层
// ==========================================
// 职责: 导入配置读取，生成管道运行期只读快照
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;
pub mod settings;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::ImportConfigReader;
pub use settings::{load_scope_table, ImportSettings};
