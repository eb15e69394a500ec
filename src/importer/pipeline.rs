// ==========================================
// PIM 变体导入 - 管道编排器
// ==========================================
// 状态机: PENDING → RUNNING(i) → ... → DONE
//         RUNNING(i) → HALTED(i)（步骤返回 halt）
// 步骤严格串行；软失败记入报告后继续
// ==========================================

use crate::domain::step::{PipelineReport, StepReport};
use crate::domain::types::PipelineState;
use crate::importer::definition::ImportDefinition;
use crate::importer::step::{ImportContext, ImportStep};
use crate::importer::steps::{
    AddColumnsStep, AddRequiredDataStep, CleanCacheStep, CreateTableStep, DropTableStep,
    ImportMediaStep, InsertDataStep, MatchEntityStep, RemoveColumnsStep, SetCategoriesStep,
    SetUrlRewriteStep, SetValuesStep, SetWebsitesStep, UpdateDataStep, UpdateOptionStep,
};
use crate::perf::PerfGuard;
use crate::repository::import_log_repo::ImportLogRepository;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

/// 固定步骤序列
///
/// additional 插在变体表写入之后、属性值写入之前
pub fn default_steps(additional: Vec<Box<dyn ImportStep>>) -> Vec<Box<dyn ImportStep>> {
    let mut steps: Vec<Box<dyn ImportStep>> = vec![
        Box::new(CreateTableStep),
        Box::new(InsertDataStep),
        Box::new(AddRequiredDataStep),
        Box::new(MatchEntityStep),
        Box::new(RemoveColumnsStep),
        Box::new(AddColumnsStep),
        Box::new(UpdateOptionStep),
        Box::new(UpdateDataStep),
    ];
    steps.extend(additional);
    steps.extend([
        Box::new(SetValuesStep) as Box<dyn ImportStep>,
        Box::new(SetWebsitesStep),
        Box::new(SetCategoriesStep),
        Box::new(SetUrlRewriteStep),
        Box::new(ImportMediaStep),
        Box::new(DropTableStep),
        Box::new(CleanCacheStep),
    ]);
    steps
}

// ==========================================
// PipelineBuilder
// ==========================================
pub struct PipelineBuilder {
    ctx: ImportContext,
    definition: ImportDefinition,
    additional: Vec<Box<dyn ImportStep>>,
    run_log: Option<ImportLogRepository>,
}

impl PipelineBuilder {
    pub fn new(ctx: ImportContext) -> Self {
        Self {
            ctx,
            definition: ImportDefinition::variant(),
            additional: Vec::new(),
            run_log: None,
        }
    }

    /// 追加扩展步骤（按追加顺序执行）
    pub fn with_additional_step(mut self, step: Box<dyn ImportStep>) -> Self {
        self.additional.push(step);
        self
    }

    /// 启用运行日志落库
    pub fn with_run_log(mut self, run_log: ImportLogRepository) -> Self {
        self.run_log = Some(run_log);
        self
    }

    pub fn build(self) -> VariantImportPipeline {
        VariantImportPipeline {
            ctx: self.ctx,
            definition: self.definition,
            steps: default_steps(self.additional),
            run_log: self.run_log,
        }
    }
}

// ==========================================
// VariantImportPipeline
// ==========================================
pub struct VariantImportPipeline {
    ctx: ImportContext,
    definition: ImportDefinition,
    steps: Vec<Box<dyn ImportStep>>,
    run_log: Option<ImportLogRepository>,
}

impl VariantImportPipeline {
    pub fn definition(&self) -> &ImportDefinition {
        &self.definition
    }

    pub fn step_codes(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.code()).collect()
    }

    /// 执行整条管道
    ///
    /// # 返回
    /// - PipelineReport: 终态为 DONE 或 HALTED；步骤失败不产生 Err
    pub async fn run(&self) -> PipelineReport {
        let mut report = PipelineReport {
            run_id: Uuid::new_v4().to_string(),
            import_code: self.definition.code.to_string(),
            file_path: self.ctx.file_path.display().to_string(),
            state: PipelineState::Pending,
            started_at: Utc::now(),
            finished_at: None,
            steps: Vec::with_capacity(self.steps.len()),
        };

        info!(
            run_id = %report.run_id,
            import_key = %self.ctx.import_key,
            file = %report.file_path,
            steps = self.steps.len(),
            "变体导入开始"
        );
        self.log_run_start(&report);

        for (position, step) in self.steps.iter().enumerate() {
            report.state = PipelineState::Running { step: position };

            let perf = PerfGuard::new(step.perf_label());
            let outcome = step.run(&self.ctx).await;
            let stats = perf.stats();
            drop(perf);

            let step_report = StepReport {
                position,
                code: step.code().to_string(),
                comment: step.comment(),
                success: outcome.success,
                halted: outcome.halt_pipeline,
                message: outcome.message.clone(),
                elapsed_ms: stats.elapsed_ms,
                sql_count: stats.sql_count,
            };

            if outcome.success {
                info!(
                    step = step.code(),
                    elapsed_ms = stats.elapsed_ms,
                    message = outcome.message.as_deref().unwrap_or(""),
                    "步骤完成"
                );
            } else {
                warn!(
                    step = step.code(),
                    halted = outcome.halt_pipeline,
                    message = outcome.message.as_deref().unwrap_or(""),
                    "步骤失败"
                );
            }

            self.log_step(&report.run_id, &step_report);
            report.steps.push(step_report);

            if !outcome.should_continue() {
                report.state = PipelineState::Halted { step: position };
                break;
            }
        }

        if !report.state.is_terminal() {
            report.state = PipelineState::Done;
        }
        report.finished_at = Some(Utc::now());

        info!(
            run_id = %report.run_id,
            state = %report.state,
            failed = report.failed_steps().count(),
            "变体导入结束"
        );
        self.log_run_finish(&report);

        report
    }

    // ==========================================
    // 运行日志（失败只告警，不影响导入）
    // ==========================================

    fn log_run_start(&self, report: &PipelineReport) {
        if let Some(log) = &self.run_log {
            if let Err(e) = log.insert_run(report) {
                warn!(run_id = %report.run_id, error = %e, "运行日志登记失败");
            }
        }
    }

    fn log_step(&self, run_id: &str, step: &StepReport) {
        if let Some(log) = &self.run_log {
            if let Err(e) = log.insert_step(run_id, step) {
                warn!(run_id, step = %step.code, error = %e, "步骤日志写入失败");
            }
        }
    }

    fn log_run_finish(&self, report: &PipelineReport) {
        if let Some(log) = &self.run_log {
            if let Err(e) = log.finish_run(report) {
                warn!(run_id = %report.run_id, error = %e, "运行日志收尾失败");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::step::StepOutcome;
    use async_trait::async_trait;

    struct NoopStep;

    #[async_trait]
    impl ImportStep for NoopStep {
        fn code(&self) -> &'static str {
            "noop"
        }

        fn comment(&self) -> String {
            "noop".to_string()
        }

        async fn run(&self, _ctx: &ImportContext) -> StepOutcome {
            StepOutcome::ok()
        }
    }

    #[test]
    fn test_default_step_order() {
        let codes: Vec<_> = default_steps(Vec::new()).iter().map(|s| s.code()).collect();
        assert_eq!(
            codes,
            vec![
                "create_table",
                "insert_data",
                "add_required_data",
                "match_entity",
                "remove_columns",
                "add_columns",
                "update_option",
                "update_data",
                "set_values",
                "set_websites",
                "set_categories",
                "set_url_rewrite",
                "import_media",
                "drop_table",
                "clean_cache",
            ]
        );
    }

    #[test]
    fn test_additional_steps_follow_update_data() {
        let steps = default_steps(vec![Box::new(NoopStep)]);
        let codes: Vec<_> = steps.iter().map(|s| s.code()).collect();
        let update = codes.iter().position(|c| *c == "update_data").unwrap();
        assert_eq!(codes[update + 1], "noop");
        assert_eq!(codes[update + 2], "set_values");
        assert_eq!(codes.len(), 16);
    }
}
