// ==========================================
// PIM 变体导入 - 导入配置快照
// ==========================================
// 管道构建时一次性读取，运行期间只读
// 包含: 文件格式、属性复制规则、税率类别、URL 后缀、作用域解析表
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::domain::mapping::AttributeMappingRule;
use crate::domain::scope::ScopeTable;
use crate::domain::types::{ScopeDimension, SCOPE_COMBINATIONS};
use crate::importer::error::ImportResult;
use crate::repository::catalog_repo::CatalogRepository;
use crate::repository::staging_repo::StagingFileFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 导入配置快照（不可变）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSettings {
    pub file_format: StagingFileFormat,
    pub image_import_enabled: bool,
    pub attribute_mapping: Vec<AttributeMappingRule>,
    /// store_id → tax_class_id
    pub tax_classes: BTreeMap<i64, i64>,
    pub product_url_suffix: String,
    pub allowed_type_ids: Vec<String>,
    pub scopes: ScopeTable,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            file_format: StagingFileFormat::default(),
            image_import_enabled: false,
            attribute_mapping: Vec::new(),
            tax_classes: BTreeMap::new(),
            product_url_suffix: ".html".to_string(),
            allowed_type_ids: vec!["configurable".to_string()],
            scopes: ScopeTable::new(),
        }
    }
}

impl ImportSettings {
    /// 读取配置并解析作用域，生成快照
    ///
    /// # 参数
    /// - reader: 配置读取接口
    /// - catalog: 宿主目录（提供 resolve_scopes）
    pub async fn load(
        reader: &dyn ImportConfigReader,
        catalog: &dyn CatalogRepository,
    ) -> ImportResult<Self> {
        let file_format = StagingFileFormat {
            delimiter: reader.get_file_delimiter().await?,
            enclosure: reader.get_file_enclosure().await?,
        };

        let scopes = load_scope_table(catalog).await?;

        let settings = Self {
            file_format,
            image_import_enabled: reader.is_image_import_enabled().await?,
            attribute_mapping: reader.get_attribute_mapping().await?,
            tax_classes: reader.get_product_tax_classes().await?,
            product_url_suffix: reader.get_product_url_suffix().await?,
            allowed_type_ids: reader.get_allowed_type_ids().await?,
            scopes,
        };

        tracing::info!(
            suffixes = settings.scopes.suffixes().count(),
            websites = settings.scopes.websites().len(),
            mapping_rules = settings.attribute_mapping.len(),
            tax_overrides = settings.tax_classes.len(),
            "导入配置快照已加载"
        );

        Ok(settings)
    }
}

/// 按固定组合顺序解析作用域，并附带网站列表
pub async fn load_scope_table(catalog: &dyn CatalogRepository) -> ImportResult<ScopeTable> {
    let mut resolved = Vec::with_capacity(SCOPE_COMBINATIONS.len());
    for dims in SCOPE_COMBINATIONS.iter() {
        resolved.push(catalog.resolve_scopes(dims).await?);
    }

    let mut websites: Vec<i64> = catalog
        .resolve_scopes(&[ScopeDimension::Website])
        .await?
        .keys()
        .filter_map(|k| k.parse::<i64>().ok())
        .collect();
    websites.sort_unstable();

    Ok(ScopeTable::from_resolved(resolved, websites))
}
