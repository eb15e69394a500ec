// ==========================================
// PIM 变体导入 - 导入层
// ==========================================
// 职责: 暂存表 → 变体表 / 目录属性值 / 关联 / URL 重写
// 纯逻辑（分类、对账、计划）与步骤实现分开
// ==========================================

// 模块声明
pub mod associations;
pub mod attribute_writer;
pub mod classifier;
pub mod definition;
pub mod enricher;
pub mod error;
pub mod media;
pub mod option_resolver;
pub mod pipeline;
pub mod reconciler;
pub mod step;
pub mod steps;
pub mod upsert;
pub mod url_rewrite;

// 重导出核心类型
pub use classifier::{classify, StagingSchema};
pub use definition::ImportDefinition;
pub use error::{ImportError, ImportResult};
pub use media::MediaImporter;
pub use pipeline::{default_steps, PipelineBuilder, VariantImportPipeline};
pub use step::{ImportContext, ImportStep};
