// ==========================================
// PIM 变体导入 - 领域模型层
// ==========================================
// 职责: 定义作用域、列语义、步骤结果等纯类型
// 红线: 不含数据访问逻辑,不含管道逻辑
// ==========================================

pub mod column;
pub mod mapping;
pub mod scope;
pub mod step;
pub mod types;

// 重导出核心类型
pub use column::{ColumnDescriptor, ScopeSuffix, RESERVED_COLUMNS};
pub use mapping::{AttributeMappingRule, OptionEntry, ValueSource};
pub use scope::{ScopeEntry, ScopeTable, StoreRef};
pub use step::{PipelineReport, StepOutcome, StepReport};
pub use types::{
    PipelineState, ScopeDimension, DEFAULT_STORE_ID, PRODUCT_ENTITY_TYPE_ID, SCOPE_COMBINATIONS,
    URL_SCOPE_COMBINATIONS,
};
