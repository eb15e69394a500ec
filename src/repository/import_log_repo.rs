// ==========================================
// PIM 变体导入 - 运行日志数据仓储
// ==========================================
// 表: import_run / import_step_log
// 红线: 每次运行、每个步骤都必须落库
// ==========================================

use crate::domain::step::{PipelineReport, StepReport};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// 运行记录（import_run 行）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRunEntity {
    pub run_id: String,
    pub import_code: String,
    pub file_path: String,
    pub state: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub report_json: Option<String>,
}

// ==========================================
// ImportLogRepository - 运行日志仓储
// ==========================================
pub struct ImportLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ImportLogRepository {
    /// 创建新的运行日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 登记一次运行（状态为报告当前状态）
    pub fn insert_run(&self, report: &PipelineReport) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO import_run (run_id, import_code, file_path, state, started_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                report.run_id,
                report.import_code,
                report.file_path,
                report.state.to_string(),
                report.started_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 追加一个步骤记录
    pub fn insert_step(&self, run_id: &str, step: &StepReport) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO import_step_log (
                run_id, position, step_code, success, halted, message, elapsed_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                run_id,
                step.position as i64,
                step.code,
                step.success,
                step.halted,
                step.message,
                step.elapsed_ms as i64,
            ],
        )?;
        Ok(())
    }

    /// 结束一次运行：写入终态与完整报告
    pub fn finish_run(&self, report: &PipelineReport) -> RepositoryResult<()> {
        let report_json = serde_json::to_string(report)
            .map_err(|e| RepositoryError::InternalError(format!("报告序列化失败: {}", e)))?;

        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE import_run
            SET state = ?2, finished_at = ?3, report_json = ?4
            WHERE run_id = ?1
            "#,
            params![
                report.run_id,
                report.state.to_string(),
                report.finished_at.map(|t| t.to_rfc3339()),
                report_json,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "import_run".to_string(),
                id: report.run_id.clone(),
            });
        }
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_run(&self, run_id: &str) -> RepositoryResult<Option<ImportRunEntity>> {
        let conn = self.get_conn()?;
        let run = conn
            .query_row(
                r#"
                SELECT run_id, import_code, file_path, state, started_at, finished_at, report_json
                FROM import_run WHERE run_id = ?1
                "#,
                params![run_id],
                |row| {
                    Ok(ImportRunEntity {
                        run_id: row.get(0)?,
                        import_code: row.get(1)?,
                        file_path: row.get(2)?,
                        state: row.get(3)?,
                        started_at: row.get(4)?,
                        finished_at: row.get(5)?,
                        report_json: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(run)
    }

    /// 某次运行的步骤记录（position 升序）
    ///
    /// # 返回
    /// - Vec<(position, step_code, success, halted, message)>
    pub fn list_steps(
        &self,
        run_id: &str,
    ) -> RepositoryResult<Vec<(usize, String, bool, bool, Option<String>)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT position, step_code, success, halted, message
            FROM import_step_log WHERE run_id = ?1 ORDER BY position
            "#,
        )?;
        let steps = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, i64>(0)? as usize,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::PipelineState;
    use chrono::Utc;

    fn setup() -> ImportLogRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_catalog_schema(&conn).unwrap();
        ImportLogRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn make_report() -> PipelineReport {
        PipelineReport {
            run_id: "run-1".to_string(),
            import_code: "variant".to_string(),
            file_path: "/tmp/variant.csv".to_string(),
            state: PipelineState::Pending,
            started_at: Utc::now(),
            finished_at: None,
            steps: Vec::new(),
        }
    }

    fn make_step(position: usize, code: &str) -> StepReport {
        StepReport {
            position,
            code: code.to_string(),
            comment: code.to_string(),
            success: true,
            halted: false,
            message: None,
            elapsed_ms: 1,
            sql_count: 0,
        }
    }

    #[test]
    fn test_run_lifecycle() {
        let repo = setup();
        let mut report = make_report();
        repo.insert_run(&report).unwrap();

        repo.insert_step(&report.run_id, &make_step(1, "createTable")).unwrap();
        repo.insert_step(&report.run_id, &make_step(2, "insertData")).unwrap();

        report.state = PipelineState::Done;
        report.finished_at = Some(Utc::now());
        repo.finish_run(&report).unwrap();

        let run = repo.find_run("run-1").unwrap().unwrap();
        assert_eq!(run.state, "DONE");
        assert!(run.report_json.unwrap().contains("\"import_code\":\"variant\""));

        let steps = repo.list_steps("run-1").unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].1, "insertData");
    }

    #[test]
    fn test_finish_unknown_run_is_not_found() {
        let repo = setup();
        let err = repo.finish_run(&make_report()).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }
}
