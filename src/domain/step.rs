// ==========================================
// PIM 变体导入 - 步骤结果与运行报告
// ==========================================
// 步骤之间不共享可变的 continue 标志；每个步骤返回 StepOutcome，
// 由编排器决定是否继续
// ==========================================

use crate::domain::types::PipelineState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 单步执行结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub success: bool,
    /// true = 要求编排器中止后续步骤
    pub halt_pipeline: bool,
    pub message: Option<String>,
}

impl StepOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            halt_pipeline: false,
            message: None,
        }
    }

    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok()
        }
    }

    /// 软失败：记录失败，后续步骤照常执行
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            halt_pipeline: false,
            message: Some(message.into()),
        }
    }

    /// 硬失败：中止管道
    pub fn halt(message: impl Into<String>) -> Self {
        Self {
            success: false,
            halt_pipeline: true,
            message: Some(message.into()),
        }
    }

    pub fn should_continue(&self) -> bool {
        !self.halt_pipeline
    }
}

/// 单步运行记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub position: usize,
    pub code: String,
    pub comment: String,
    pub success: bool,
    pub halted: bool,
    pub message: Option<String>,
    pub elapsed_ms: u64,
    pub sql_count: u64,
}

/// 整次运行报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub import_code: String,
    pub file_path: String,
    pub state: PipelineState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepReport>,
}

impl PipelineReport {
    pub fn is_halted(&self) -> bool {
        matches!(self.state, PipelineState::Halted { .. })
    }

    /// 所有已执行步骤均成功
    pub fn all_succeeded(&self) -> bool {
        self.steps.iter().all(|s| s.success)
    }

    pub fn step(&self, code: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.code == code)
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| !s.success)
    }
}
