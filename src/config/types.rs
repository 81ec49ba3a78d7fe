use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// 編碼格式分類，決定 transcode-video 使用哪一組參數
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EncodeFormat {
    Movie,
    Tvshow,
    Custom,
}

impl std::fmt::Display for EncodeFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::Tvshow => write!(f, "tvshow"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// 各格式對應的 transcode-video 參數模板
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingParameters {
    pub movie: String,
    pub tvshow: String,
    pub custom: String,
}

impl EncodingParameters {
    #[must_use]
    pub fn for_format(&self, format: EncodeFormat) -> &str {
        match format {
            EncodeFormat::Movie => &self.movie,
            EncodeFormat::Tvshow => &self.tvshow,
            EncodeFormat::Custom => &self.custom,
        }
    }
}

/// 外部工具的呼叫方式（工具路徑搜尋不在本程式範圍內，由設定檔提供）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolCommands {
    pub transcode_video: String,
    pub mediainfo: String,
    pub mkvmerge: String,
    pub cpulimit: String,
}

impl Default for ToolCommands {
    fn default() -> Self {
        Self {
            transcode_video: "transcode-video".to_string(),
            mediainfo: "mediainfo".to_string(),
            mkvmerge: "mkvmerge".to_string(),
            cpulimit: "cpulimit".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub encoding_parameters: EncodingParameters,
    /// 附加到 HandBrakeCLI 命令尾端的預覽參數（-P 時使用）
    pub preview_parameter: String,
    pub default_output_directory: String,
    pub cpu_limit_enabled: bool,
    pub cpu_limit_percentage: u32,
    /// 將原始檔的修改時間複製到輸出檔
    pub preserve_file_date: bool,
    /// 保留 Dolby Atmos 音軌（以 copy 方式通過）
    pub preserve_atmos_audio: bool,
    pub statistics_file: String,
    pub tools: ToolCommands,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            encoding_parameters: EncodingParameters::default(),
            preview_parameter: "--start-at duration:0 --stop-at duration:30".to_string(),
            default_output_directory: "./output".to_string(),
            cpu_limit_enabled: false,
            cpu_limit_percentage: 100,
            preserve_file_date: true,
            preserve_atmos_audio: false,
            statistics_file: "tvb-stats.csv".to_string(),
            tools: ToolCommands::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_format_display() {
        assert_eq!(EncodeFormat::Movie.to_string(), "movie");
        assert_eq!(EncodeFormat::Tvshow.to_string(), "tvshow");
        assert_eq!(EncodeFormat::Custom.to_string(), "custom");
    }

    #[test]
    fn test_parameters_for_format() {
        let params = EncodingParameters {
            movie: "--target big".to_string(),
            tvshow: "--target small".to_string(),
            custom: String::new(),
        };
        assert_eq!(params.for_format(EncodeFormat::Movie), "--target big");
        assert_eq!(params.for_format(EncodeFormat::Tvshow), "--target small");
        assert_eq!(params.for_format(EncodeFormat::Custom), "");
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert!(settings.preserve_file_date);
        assert!(!settings.preserve_atmos_audio);
        assert_eq!(settings.cpu_limit_percentage, 100);
        assert_eq!(settings.tools.transcode_video, "transcode-video");
        assert_eq!(settings.statistics_file, "tvb-stats.csv");
    }
}
