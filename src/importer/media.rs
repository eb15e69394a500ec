// ==========================================
// PIM 变体导入 - 媒体导入接口
// ==========================================
// 文件拷贝由宿主实现；管道只负责在启用时调用
// ==========================================

use crate::importer::error::ImportResult;
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait MediaImporter: Send + Sync {
    /// 导入暂存表中的媒体列
    ///
    /// # 参数
    /// - import_key: 暂存表
    /// - source_dir: 导入文件所在目录（媒体文件相对路径的根）
    /// - staging_columns: 暂存表现有列
    ///
    /// # 返回
    /// - Ok(usize): 处理的媒体数
    async fn import_media(
        &self,
        import_key: &str,
        source_dir: &Path,
        staging_columns: &[String],
    ) -> ImportResult<usize>;
}
