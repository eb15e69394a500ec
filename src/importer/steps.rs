// ==========================================
// PIM 变体导入 - 管道步骤实现
// ==========================================
// 顺序见 pipeline::default_steps
// 约定:
// - 步骤内部错误折叠为软失败（success=false，管道继续）
// - 只有源文件缺失/不可读时返回 halt
// ==========================================

use crate::domain::column::{
    AXIS_COLUMN, CATEGORIES_COLUMN, CODE_COLUMN, ENABLED_COLUMN, URL_KEY_COLUMN,
};
use crate::domain::mapping::ValueSource;
use crate::domain::step::StepOutcome;
use crate::domain::types::PRODUCT_ENTITY_TYPE_ID;
use crate::i18n::{t, t_with_args};
use crate::importer::associations::{plan_category_links, website_targets};
use crate::importer::attribute_writer::plan_attribute_values;
use crate::importer::classifier::StagingSchema;
use crate::importer::enricher::{
    copy_pairs, default_url_key, required_columns, resolve_type_id, status_from_enabled,
    TYPE_ID_COLUMN,
};
use crate::importer::error::ImportResult;
use crate::importer::option_resolver::{resolve_column, OptionIndex};
use crate::importer::reconciler::{columns_to_add, columns_to_drop};
use crate::importer::step::{ImportContext, ImportStep};
use crate::importer::upsert::{build_record, UPSERT_BATCH_SIZE};
use crate::importer::url_rewrite::{disambiguate, url_key_columns};
use crate::repository::staging_repo::ColumnSpec;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// 暂存表键列（首个为主键）
pub const STAGING_KEY_COLUMNS: [&str; 2] = [CODE_COLUMN, AXIS_COLUMN];

/// pim_entities.import 中商品的取值
pub const PRODUCT_ENTITY_KIND: &str = "product";

/// 导入结束时失效的缓存类型
pub const CACHE_TYPES: [&str; 2] = ["block_html", "full_page"];

/// 步骤结果收口：Err → 软失败
fn settle(code: &str, result: ImportResult<StepOutcome>) -> StepOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(step = code, error = %e, "步骤执行失败，管道继续");
            StepOutcome::failed(t_with_args("import.step_failed", &[("error", e.to_string().as_str())]))
        }
    }
}

async fn staging_schema(ctx: &ImportContext) -> ImportResult<StagingSchema> {
    let columns = ctx.staging.describe_columns(&ctx.import_key).await?;
    Ok(StagingSchema::from_columns(&columns, &ctx.settings.scopes))
}

// ==========================================
// 1. 创建暂存表
// ==========================================
pub struct CreateTableStep;

#[async_trait]
impl ImportStep for CreateTableStep {
    fn code(&self) -> &'static str {
        "create_table"
    }

    fn comment(&self) -> String {
        t("step.create_table")
    }

    fn perf_label(&self) -> &'static str {
        "variant.create_table"
    }

    async fn run(&self, ctx: &ImportContext) -> StepOutcome {
        let path = ctx.file_path.as_path();
        if !path.is_file() {
            tracing::error!(file = %path.display(), "导入文件不存在，中止管道");
            return StepOutcome::halt(t_with_args(
                "import.file_not_found",
                &[("path", path.display().to_string().as_str())],
            ));
        }

        match ctx
            .staging
            .create_from_file(
                path,
                &ctx.import_key,
                &STAGING_KEY_COLUMNS,
                ctx.settings.file_format,
            )
            .await
        {
            Ok(columns) => {
                tracing::info!(columns = columns.len(), "暂存表已按表头创建");
                StepOutcome::ok()
            }
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "暂存表创建失败，中止管道");
                StepOutcome::halt(t_with_args("import.step_failed", &[("error", e.to_string().as_str())]))
            }
        }
    }
}

// ==========================================
// 2. 装载暂存表
// ==========================================
pub struct InsertDataStep;

impl InsertDataStep {
    async fn execute(&self, ctx: &ImportContext) -> ImportResult<StepOutcome> {
        let count = ctx
            .staging
            .load_rows_from_file(&ctx.file_path, &ctx.import_key, ctx.settings.file_format)
            .await?;
        tracing::info!(rows = count, "暂存表装载完成");
        Ok(StepOutcome::ok_with(t_with_args(
            "import.lines_found",
            &[("count", count.to_string().as_str())],
        )))
    }
}

#[async_trait]
impl ImportStep for InsertDataStep {
    fn code(&self) -> &'static str {
        "insert_data"
    }

    fn comment(&self) -> String {
        t("step.insert_data")
    }

    fn perf_label(&self) -> &'static str {
        "variant.insert_data"
    }

    async fn run(&self, ctx: &ImportContext) -> StepOutcome {
        settle(self.code(), self.execute(ctx).await)
    }
}

// ==========================================
// 3. 必填数据补全
// ==========================================
pub struct AddRequiredDataStep;

impl AddRequiredDataStep {
    async fn execute(&self, ctx: &ImportContext) -> ImportResult<StepOutcome> {
        let key = ctx.import_key.as_str();

        for (column, spec) in required_columns() {
            ctx.staging.add_column(key, column, &spec).await?;
        }

        if !ctx.staging.column_exists(key, URL_KEY_COLUMN).await? {
            ctx.staging
                .add_column(key, URL_KEY_COLUMN, &ColumnSpec::text(""))
                .await?;
            let cells = ctx.staging.fetch_cells(key, URL_KEY_COLUMN).await?;
            let updates: Vec<(String, Option<String>)> = cells
                .into_iter()
                .map(|c| {
                    let url_key = default_url_key(&c.code);
                    (c.code, Some(url_key))
                })
                .collect();
            ctx.staging.update_cells(key, URL_KEY_COLUMN, &updates).await?;
        }

        if ctx.staging.column_exists(key, ENABLED_COLUMN).await? {
            let cells = ctx.staging.fetch_cells(key, ENABLED_COLUMN).await?;
            let updates: Vec<(String, Option<String>)> = cells
                .into_iter()
                .map(|c| {
                    let status = status_from_enabled(c.value.as_deref());
                    (c.code, Some(status.to_string()))
                })
                .collect();
            ctx.staging.update_cells(key, "_status", &updates).await?;
        }

        if ctx.staging.column_exists(key, TYPE_ID_COLUMN).await? {
            let allowed = &ctx.settings.allowed_type_ids;
            let cells = ctx.staging.fetch_cells(key, TYPE_ID_COLUMN).await?;
            let updates: Vec<(String, Option<String>)> = cells
                .into_iter()
                .map(|c| {
                    let type_id = resolve_type_id(c.value.as_deref(), allowed);
                    (c.code, Some(type_id))
                })
                .collect();
            ctx.staging.update_cells(key, "_type_id", &updates).await?;
        }

        let mut copied = 0;
        for rule in &ctx.settings.attribute_mapping {
            for (from, to) in copy_pairs(rule, &ctx.settings.scopes) {
                if ctx.staging.copy_column(key, &from, &to).await? {
                    tracing::debug!(from = %from, to = %to, "属性列已复制");
                    copied += 1;
                }
            }
        }
        tracing::info!(copied, rules = ctx.settings.attribute_mapping.len(), "必填数据补全完成");

        Ok(StepOutcome::ok())
    }
}

#[async_trait]
impl ImportStep for AddRequiredDataStep {
    fn code(&self) -> &'static str {
        "add_required_data"
    }

    fn comment(&self) -> String {
        t("step.add_required_data")
    }

    fn perf_label(&self) -> &'static str {
        "variant.add_required_data"
    }

    async fn run(&self, ctx: &ImportContext) -> StepOutcome {
        settle(self.code(), self.execute(ctx).await)
    }
}

// ==========================================
// 4. 编码匹配实体
// ==========================================
pub struct MatchEntityStep;

impl MatchEntityStep {
    async fn execute(&self, ctx: &ImportContext) -> ImportResult<StepOutcome> {
        let summary = ctx
            .catalog
            .match_entities(&ctx.import_key, CODE_COLUMN, PRODUCT_ENTITY_KIND)
            .await?;
        tracing::info!(matched = summary.matched, created = summary.created, "实体匹配完成");
        Ok(StepOutcome::ok_with(t_with_args(
            "import.entities_matched",
            &[
                ("matched", summary.matched.to_string().as_str()),
                ("created", summary.created.to_string().as_str()),
            ],
        )))
    }
}

#[async_trait]
impl ImportStep for MatchEntityStep {
    fn code(&self) -> &'static str {
        "match_entity"
    }

    fn comment(&self) -> String {
        t("step.match_entity")
    }

    fn perf_label(&self) -> &'static str {
        "variant.match_entity"
    }

    async fn run(&self, ctx: &ImportContext) -> StepOutcome {
        settle(self.code(), self.execute(ctx).await)
    }
}

// ==========================================
// 5. 变体表删列
// ==========================================
pub struct RemoveColumnsStep;

impl RemoveColumnsStep {
    async fn execute(&self, ctx: &ImportContext) -> ImportResult<StepOutcome> {
        let persistent = ctx.variants.describe_columns().await?;
        let drop = columns_to_drop(&persistent);
        for column in &drop {
            ctx.variants.drop_column(column).await?;
            tracing::debug!(column = %column, "变体表列已删除");
        }
        Ok(StepOutcome::ok_with(t_with_args(
            "import.columns_removed",
            &[("count", drop.len().to_string().as_str())],
        )))
    }
}

#[async_trait]
impl ImportStep for RemoveColumnsStep {
    fn code(&self) -> &'static str {
        "remove_columns"
    }

    fn comment(&self) -> String {
        t("step.remove_columns")
    }

    fn perf_label(&self) -> &'static str {
        "variant.remove_columns"
    }

    async fn run(&self, ctx: &ImportContext) -> StepOutcome {
        settle(self.code(), self.execute(ctx).await)
    }
}

// ==========================================
// 6. 变体表加列
// ==========================================
pub struct AddColumnsStep;

impl AddColumnsStep {
    async fn execute(&self, ctx: &ImportContext) -> ImportResult<StepOutcome> {
        let staging = ctx.staging.describe_columns(&ctx.import_key).await?;
        let persistent = ctx.variants.describe_columns().await?;

        let mut added = 0;
        for column in columns_to_add(&staging, &persistent) {
            if ctx.variants.add_text_column(&column).await? {
                tracing::debug!(column = %column, "变体表列已新增");
                added += 1;
            }
        }
        Ok(StepOutcome::ok_with(t_with_args(
            "import.columns_added",
            &[("count", added.to_string().as_str())],
        )))
    }
}

#[async_trait]
impl ImportStep for AddColumnsStep {
    fn code(&self) -> &'static str {
        "add_columns"
    }

    fn comment(&self) -> String {
        t("step.add_columns")
    }

    fn perf_label(&self) -> &'static str {
        "variant.add_columns"
    }

    async fn run(&self, ctx: &ImportContext) -> StepOutcome {
        settle(self.code(), self.execute(ctx).await)
    }
}

// ==========================================
// 7. 选项编码 → 选项 ID
// ==========================================
pub struct UpdateOptionStep;

impl UpdateOptionStep {
    async fn execute(&self, ctx: &ImportContext) -> ImportResult<StepOutcome> {
        let key = ctx.import_key.as_str();
        let schema = staging_schema(ctx).await?;

        let mut indexes: HashMap<String, OptionIndex> = HashMap::new();
        let mut resolved_columns = 0;
        let mut updated_rows = 0;

        for descriptor in schema.option_columns() {
            let attribute = descriptor.base_attribute.as_str();
            if !indexes.contains_key(attribute) {
                let entries = ctx.catalog.option_entries(attribute).await?;
                indexes.insert(attribute.to_string(), OptionIndex::new(entries));
            }
            let Some(index) = indexes.get(attribute) else {
                continue;
            };
            // 无选项的属性整列跳过
            if index.is_empty() {
                continue;
            }

            let cells = ctx.staging.fetch_cells(key, &descriptor.name).await?;
            let updates = resolve_column(&cells, index);
            let rows = ctx
                .staging
                .update_cells(key, &descriptor.name, &updates)
                .await?;
            tracing::debug!(column = %descriptor.name, rows, "选项编码已解析");

            resolved_columns += 1;
            updated_rows += rows;
        }

        Ok(StepOutcome::ok_with(t_with_args(
            "import.options_resolved",
            &[
                ("columns", resolved_columns.to_string().as_str()),
                ("rows", updated_rows.to_string().as_str()),
            ],
        )))
    }
}

#[async_trait]
impl ImportStep for UpdateOptionStep {
    fn code(&self) -> &'static str {
        "update_option"
    }

    fn comment(&self) -> String {
        t("step.update_option")
    }

    fn perf_label(&self) -> &'static str {
        "variant.update_option"
    }

    async fn run(&self, ctx: &ImportContext) -> StepOutcome {
        settle(self.code(), self.execute(ctx).await)
    }
}

// ==========================================
// 8. 写入变体表
// ==========================================
pub struct UpdateDataStep;

impl UpdateDataStep {
    async fn execute(&self, ctx: &ImportContext) -> ImportResult<StepOutcome> {
        let persistent: HashSet<String> =
            ctx.variants.describe_columns().await?.into_iter().collect();
        let attribute_ids = ctx.catalog.attribute_ids(PRODUCT_ENTITY_TYPE_ID).await?;

        let mut after: Option<String> = None;
        let mut total = 0;
        let mut batches = 0;
        loop {
            let rows = ctx
                .staging
                .fetch_rows_after(&ctx.import_key, after.as_deref(), UPSERT_BATCH_SIZE)
                .await?;
            let Some(last) = rows.last() else {
                break;
            };
            after = last.get(CODE_COLUMN).cloned().flatten();

            let records: Vec<_> = rows
                .iter()
                .map(|row| build_record(row, &persistent, &attribute_ids))
                .collect();
            total += ctx.variants.upsert_batch(&records).await?;
            batches += 1;
            tracing::debug!(batch = batches, rows = records.len(), "变体批次已写入");

            if rows.len() < UPSERT_BATCH_SIZE || after.is_none() {
                break;
            }
        }

        tracing::info!(rows = total, batches, "变体表写入完成");
        Ok(StepOutcome::ok_with(t_with_args(
            "import.variants_filled",
            &[
                ("count", total.to_string().as_str()),
                ("batches", batches.to_string().as_str()),
            ],
        )))
    }
}

#[async_trait]
impl ImportStep for UpdateDataStep {
    fn code(&self) -> &'static str {
        "update_data"
    }

    fn comment(&self) -> String {
        t("step.update_data")
    }

    fn perf_label(&self) -> &'static str {
        "variant.update_data"
    }

    async fn run(&self, ctx: &ImportContext) -> StepOutcome {
        settle(self.code(), self.execute(ctx).await)
    }
}

// ==========================================
// 10. 属性值写入
// ==========================================
pub struct SetValuesStep;

impl SetValuesStep {
    async fn execute(&self, ctx: &ImportContext) -> ImportResult<StepOutcome> {
        let schema = staging_schema(ctx).await?;
        let plan = plan_attribute_values(&schema, &ctx.settings.scopes, &ctx.settings.tax_classes);

        for (store_id, values) in &plan {
            let written = ctx
                .catalog
                .set_attribute_values(&ctx.import_key, values, PRODUCT_ENTITY_TYPE_ID, *store_id)
                .await?;
            tracing::debug!(store_id, attributes = values.len(), written, "属性值已写入");
        }

        Ok(StepOutcome::ok_with(t_with_args(
            "import.values_written",
            &[("stores", plan.len().to_string().as_str())],
        )))
    }
}

#[async_trait]
impl ImportStep for SetValuesStep {
    fn code(&self) -> &'static str {
        "set_values"
    }

    fn comment(&self) -> String {
        t("step.set_values")
    }

    fn perf_label(&self) -> &'static str {
        "variant.set_values"
    }

    async fn run(&self, ctx: &ImportContext) -> StepOutcome {
        settle(self.code(), self.execute(ctx).await)
    }
}

// ==========================================
// 11. 网站关联
// ==========================================
pub struct SetWebsitesStep;

impl SetWebsitesStep {
    async fn execute(&self, ctx: &ImportContext) -> ImportResult<StepOutcome> {
        let mut linked = 0;
        for website_id in website_targets(ctx.settings.scopes.websites()) {
            linked += ctx.catalog.link_websites(&ctx.import_key, website_id).await?;
        }
        Ok(StepOutcome::ok_with(t_with_args(
            "import.websites_linked",
            &[("count", linked.to_string().as_str())],
        )))
    }
}

#[async_trait]
impl ImportStep for SetWebsitesStep {
    fn code(&self) -> &'static str {
        "set_websites"
    }

    fn comment(&self) -> String {
        t("step.set_websites")
    }

    fn perf_label(&self) -> &'static str {
        "variant.set_websites"
    }

    async fn run(&self, ctx: &ImportContext) -> StepOutcome {
        settle(self.code(), self.execute(ctx).await)
    }
}

// ==========================================
// 12. 分类关联
// ==========================================
pub struct SetCategoriesStep;

impl SetCategoriesStep {
    async fn execute(&self, ctx: &ImportContext) -> ImportResult<StepOutcome> {
        let key = ctx.import_key.as_str();
        if !ctx.staging.column_exists(key, CATEGORIES_COLUMN).await? {
            tracing::warn!("暂存表缺少 categories 列，跳过分类关联");
            return Ok(StepOutcome::failed(t("import.categories_column_missing")));
        }

        let cells = ctx.staging.fetch_cells(key, CATEGORIES_COLUMN).await?;
        let categories = ctx.catalog.import_categories().await?;
        let plan = plan_category_links(&cells, &categories);

        // 先增后删
        let added = ctx.catalog.insert_category_links(&plan.add).await?;
        let removed = ctx.catalog.delete_category_links(&plan.remove).await?;
        tracing::info!(added, removed, "分类关联完成");

        Ok(StepOutcome::ok_with(t_with_args(
            "import.categories_linked",
            &[("added", added.to_string().as_str()), ("removed", removed.to_string().as_str())],
        )))
    }
}

#[async_trait]
impl ImportStep for SetCategoriesStep {
    fn code(&self) -> &'static str {
        "set_categories"
    }

    fn comment(&self) -> String {
        t("step.set_categories")
    }

    fn perf_label(&self) -> &'static str {
        "variant.set_categories"
    }

    async fn run(&self, ctx: &ImportContext) -> StepOutcome {
        settle(self.code(), self.execute(ctx).await)
    }
}

// ==========================================
// 13. URL 重写
// ==========================================
pub struct SetUrlRewriteStep;

impl SetUrlRewriteStep {
    async fn execute(&self, ctx: &ImportContext) -> ImportResult<StepOutcome> {
        let key = ctx.import_key.as_str();
        let schema = staging_schema(ctx).await?;
        let columns = url_key_columns(&schema, &ctx.settings.scopes);

        let mut stores = 0;
        for (store_id, column) in &columns {
            if !schema.contains(column) {
                tracing::warn!(store_id, column = %column, "暂存表缺少 url_key 列，跳过");
                continue;
            }

            let cells = ctx.staging.fetch_cells(key, column).await?;
            let updates = disambiguate(&cells);
            if !updates.is_empty() {
                ctx.staging.update_cells(key, column, &updates).await?;
                tracing::debug!(store_id, duplicates = updates.len(), "重复 url_key 已去重");
            }

            let mut values = IndexMap::new();
            values.insert(URL_KEY_COLUMN.to_string(), ValueSource::column(column));
            ctx.catalog
                .set_attribute_values(key, &values, PRODUCT_ENTITY_TYPE_ID, *store_id)
                .await?;
            ctx.catalog
                .rewrite_urls(key, *store_id, column, &ctx.settings.product_url_suffix)
                .await?;
            stores += 1;
        }

        Ok(StepOutcome::ok_with(t_with_args(
            "import.url_rewritten",
            &[("stores", stores.to_string().as_str())],
        )))
    }
}

#[async_trait]
impl ImportStep for SetUrlRewriteStep {
    fn code(&self) -> &'static str {
        "set_url_rewrite"
    }

    fn comment(&self) -> String {
        t("step.set_url_rewrite")
    }

    fn perf_label(&self) -> &'static str {
        "variant.set_url_rewrite"
    }

    async fn run(&self, ctx: &ImportContext) -> StepOutcome {
        settle(self.code(), self.execute(ctx).await)
    }
}

// ==========================================
// 14. 媒体导入
// ==========================================
pub struct ImportMediaStep;

impl ImportMediaStep {
    async fn execute(&self, ctx: &ImportContext) -> ImportResult<StepOutcome> {
        if !ctx.settings.image_import_enabled {
            return Ok(StepOutcome::ok_with(t("import.media_disabled")));
        }

        let Some(media) = ctx.media.as_ref() else {
            tracing::warn!("媒体导入已启用但未配置 MediaImporter");
            return Ok(StepOutcome::failed(t("import.media_importer_missing")));
        };

        let columns = ctx.staging.describe_columns(&ctx.import_key).await?;
        let source_dir = ctx.file_path.parent().unwrap_or_else(|| Path::new("."));
        let count = media
            .import_media(&ctx.import_key, source_dir, &columns)
            .await?;
        tracing::info!(media = count, "媒体导入完成");
        Ok(StepOutcome::ok())
    }
}

#[async_trait]
impl ImportStep for ImportMediaStep {
    fn code(&self) -> &'static str {
        "import_media"
    }

    fn comment(&self) -> String {
        t("step.import_media")
    }

    fn perf_label(&self) -> &'static str {
        "variant.import_media"
    }

    async fn run(&self, ctx: &ImportContext) -> StepOutcome {
        settle(self.code(), self.execute(ctx).await)
    }
}

// ==========================================
// 15. 删除暂存表
// ==========================================
pub struct DropTableStep;

impl DropTableStep {
    async fn execute(&self, ctx: &ImportContext) -> ImportResult<StepOutcome> {
        ctx.staging.drop_table(&ctx.import_key).await?;
        Ok(StepOutcome::ok_with(t("import.table_dropped")))
    }
}

#[async_trait]
impl ImportStep for DropTableStep {
    fn code(&self) -> &'static str {
        "drop_table"
    }

    fn comment(&self) -> String {
        t("step.drop_table")
    }

    fn perf_label(&self) -> &'static str {
        "variant.drop_table"
    }

    async fn run(&self, ctx: &ImportContext) -> StepOutcome {
        settle(self.code(), self.execute(ctx).await)
    }
}

// ==========================================
// 16. 清理缓存
// ==========================================
pub struct CleanCacheStep;

impl CleanCacheStep {
    async fn execute(&self, ctx: &ImportContext) -> ImportResult<StepOutcome> {
        ctx.catalog.clean_caches(&CACHE_TYPES).await?;
        Ok(StepOutcome::ok_with(t_with_args(
            "import.cache_cleaned",
            &[("types", CACHE_TYPES.join(", ").as_str())],
        )))
    }
}

#[async_trait]
impl ImportStep for CleanCacheStep {
    fn code(&self) -> &'static str {
        "clean_cache"
    }

    fn comment(&self) -> String {
        t("step.clean_cache")
    }

    fn perf_label(&self) -> &'static str {
        "variant.clean_cache"
    }

    async fn run(&self, ctx: &ImportContext) -> StepOutcome {
        settle(self.code(), self.execute(ctx).await)
    }
}
