//! 影片檔案搜尋與格式判斷
//!
//! 掃描輸入路徑（單一檔案或整個資料夾），依副檔名過濾影片檔，
//! 並由檔名的季/集標記判斷 movie 或 tvshow。

use crate::config::EncodeFormat;
use crate::tools::path_validator::validate_input_exists;
use anyhow::Result;
use log::debug;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

/// 可辨識的影片副檔名（不分大小寫）
const VIDEO_EXTENSIONS: [&str; 9] = [
    "mp4", "mkv", "avi", "mov", "flv", "m4v", "mpg", "mpeg", "wmv",
];

/// 季/集標記：分隔符後接最多兩位數季數與最多三位數集數，
/// 例如 "Show.S02E05" 或 "show s2e15"
static REGEX_SEASON_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.*?[.\s][sS]\d{1,2}[eE]\d{1,3}").expect("Invalid regex"));

#[derive(Debug, Clone)]
pub struct VideoFileInfo {
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct FormatAssignment {
    pub file: VideoFileInfo,
    pub format: EncodeFormat,
}

#[must_use]
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let lower = ext.to_lowercase();
            VIDEO_EXTENSIONS.contains(&lower.as_str())
        })
}

/// 由檔名判斷格式：有季/集標記者為 tvshow，其餘為 movie
#[must_use]
pub fn detect_format(file_name: &str) -> EncodeFormat {
    if REGEX_SEASON_EPISODE.is_match(file_name) {
        debug!("{file_name} 判斷為影集");
        EncodeFormat::Tvshow
    } else {
        debug!("{file_name} 判斷為電影");
        EncodeFormat::Movie
    }
}

/// 收集輸入路徑下的所有影片檔，順序依資料夾走訪順序
fn collect_video_files(input: &Path) -> Result<Vec<VideoFileInfo>> {
    validate_input_exists(input)?;

    let mut video_files = Vec::new();

    if input.is_file() {
        if is_video_file(input) {
            let size = std::fs::metadata(input).map(|m| m.len()).unwrap_or(0);
            video_files.push(VideoFileInfo {
                path: input.to_path_buf(),
                size,
            });
        }
    } else {
        video_files = WalkDir::new(input)
            .follow_links(false)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| is_video_file(entry.path()))
            .filter_map(|entry| {
                let size = entry.metadata().ok()?.len();
                Some(VideoFileInfo {
                    path: entry.into_path(),
                    size,
                })
            })
            .collect();
    }

    debug!("收集到 {} 個影片檔案", video_files.len());
    Ok(video_files)
}

/// 掃描並指派格式；forced_format 存在時套用到所有檔案
pub fn classify(input: &Path, forced_format: Option<EncodeFormat>) -> Result<Vec<FormatAssignment>> {
    let files = collect_video_files(input)?;

    let assignments = files
        .into_iter()
        .map(|file| {
            let format = forced_format.unwrap_or_else(|| {
                let name = file
                    .path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default();
                detect_format(name)
            });
            FormatAssignment { file, format }
        })
        .collect();

    Ok(assignments)
}
