use crate::config::types::{Config, Settings};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// 預設的設定檔名稱（與執行目錄相對）
const SETTINGS_FILE: &str = "tvb-settings.json";

impl Config {
    pub fn new() -> Result<Self> {
        let settings = Self::load_settings(Path::new(SETTINGS_FILE))?;
        Ok(Self { settings })
    }

    /// 從指定路徑載入設定，檔案不存在時使用預設值
    pub fn load_settings(path: &Path) -> Result<Settings> {
        if !path.exists() {
            log::debug!("找不到設定檔 {}，使用預設設定", path.display());
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_settings_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Config::load_settings(&dir.path().join("no-such.json")).unwrap();
        assert_eq!(settings.default_output_directory, "./output");
    }

    #[test]
    fn test_load_settings_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tvb-settings.json");
        fs::write(
            &path,
            r#"{
                "encoding_parameters": { "movie": "--mp4 --add-audio ger" },
                "preserve_atmos_audio": true,
                "cpu_limit_enabled": true,
                "cpu_limit_percentage": 50
            }"#,
        )
        .unwrap();

        let settings = Config::load_settings(&path).unwrap();
        assert_eq!(settings.encoding_parameters.movie, "--mp4 --add-audio ger");
        assert_eq!(settings.encoding_parameters.tvshow, "");
        assert!(settings.preserve_atmos_audio);
        assert!(settings.cpu_limit_enabled);
        assert_eq!(settings.cpu_limit_percentage, 50);
        // 未指定的欄位保持預設
        assert!(settings.preserve_file_date);
    }

    #[test]
    fn test_load_settings_invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_settings(&path).is_err());
    }
}
