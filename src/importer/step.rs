// ==========================================
// PIM 变体导入 - 步骤接口与运行上下文
// ==========================================
// 每个步骤返回 StepOutcome，不向外抛错；
// 上下文在管道构建时确定，运行期间只读
// ==========================================

use crate::config::settings::ImportSettings;
use crate::domain::step::StepOutcome;
use crate::importer::media::MediaImporter;
use crate::repository::catalog_repo::CatalogRepository;
use crate::repository::staging_repo::StagingRepository;
use crate::repository::variant_repo::VariantRepository;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// 管道运行上下文
#[derive(Clone)]
pub struct ImportContext {
    /// 导入编码（暂存表 tmp_<import_key>）
    pub import_key: String,
    pub file_path: PathBuf,
    pub settings: Arc<ImportSettings>,
    pub staging: Arc<dyn StagingRepository>,
    pub variants: Arc<dyn VariantRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub media: Option<Arc<dyn MediaImporter>>,
}

impl ImportContext {
    pub fn new(
        import_key: impl Into<String>,
        file_path: impl Into<PathBuf>,
        settings: Arc<ImportSettings>,
        staging: Arc<dyn StagingRepository>,
        variants: Arc<dyn VariantRepository>,
        catalog: Arc<dyn CatalogRepository>,
    ) -> Self {
        Self {
            import_key: import_key.into(),
            file_path: file_path.into(),
            settings,
            staging,
            variants,
            catalog,
            media: None,
        }
    }

    pub fn with_media(mut self, media: Arc<dyn MediaImporter>) -> Self {
        self.media = Some(media);
        self
    }
}

impl std::fmt::Debug for ImportContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportContext")
            .field("import_key", &self.import_key)
            .field("file_path", &self.file_path)
            .field("media", &self.media.is_some())
            .finish()
    }
}

// ==========================================
// ImportStep Trait
// ==========================================
#[async_trait]
pub trait ImportStep: Send + Sync {
    /// 步骤编码（运行日志用）
    fn code(&self) -> &'static str;

    /// 步骤描述（本地化）
    fn comment(&self) -> String;

    /// 性能统计标签
    fn perf_label(&self) -> &'static str {
        "variant.step"
    }

    async fn run(&self, ctx: &ImportContext) -> StepOutcome;
}
