use anyhow::{Context, Result};
use filetime::FileTime;
use std::fs;
use std::path::Path;

/// 把來源檔的修改時間複製到目標檔
pub fn copy_modification_time(source: &Path, target: &Path) -> Result<()> {
    let metadata = fs::metadata(source)
        .with_context(|| format!("無法讀取來源檔資訊: {}", source.display()))?;
    let mtime = FileTime::from_last_modification_time(&metadata);
    filetime::set_file_mtime(target, mtime)
        .with_context(|| format!("無法設定檔案修改時間: {}", target.display()))?;
    Ok(())
}
