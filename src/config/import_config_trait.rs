// ==========================================
// PIM 变体导入 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入管道所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::mapping::AttributeMappingRule;
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use std::collections::BTreeMap;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入管道所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    // ===== 文件格式 =====

    /// 获取导入文件分隔符
    ///
    /// # 默认值
    /// - `;`
    async fn get_file_delimiter(&self) -> ImportResult<u8>;

    /// 获取导入文件包围符
    ///
    /// # 默认值
    /// - `"`
    async fn get_file_enclosure(&self) -> ImportResult<u8>;

    // ===== 商品配置 =====

    /// 是否启用媒体导入
    ///
    /// # 默认值
    /// - false
    async fn is_image_import_enabled(&self) -> ImportResult<bool>;

    /// 获取属性复制规则
    ///
    /// # 返回
    /// - Vec<AttributeMappingRule>: 配置缺失或格式错误时为空
    async fn get_attribute_mapping(&self) -> ImportResult<Vec<AttributeMappingRule>>;

    /// 获取按门店配置的税率类别
    ///
    /// # 返回
    /// - BTreeMap<store_id, tax_class_id>
    async fn get_product_tax_classes(&self) -> ImportResult<BTreeMap<i64, i64>>;

    /// 获取允许的商品类型
    ///
    /// # 默认值
    /// - ["configurable"]
    async fn get_allowed_type_ids(&self) -> ImportResult<Vec<String>>;

    // ===== SEO =====

    /// 获取商品 URL 后缀
    ///
    /// # 默认值
    /// - `.html`
    async fn get_product_url_suffix(&self) -> ImportResult<String>;
}
