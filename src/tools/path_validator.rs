use anyhow::{Result, bail};
use std::path::Path;

/// 輸入路徑必須是既存的檔案或資料夾，否則整批中止
pub fn validate_input_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("輸入路徑不存在: {}", path.display());
    }
    if !path.is_file() && !path.is_dir() {
        bail!("輸入路徑不是檔案也不是資料夾: {}", path.display());
    }
    Ok(())
}

pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    } else if !path.is_dir() {
        bail!("路徑已存在但不是資料夾: {}", path.display());
    }
    Ok(())
}
