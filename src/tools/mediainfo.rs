//! 音軌分析
//!
//! 透過 mediainfo 的 JSON 輸出列出音軌，並以關鍵字啟發式判斷
//! Dolby Atmos 音軌。判斷僅供參考，誤判在所難免；任何錯誤都
//! 退化為「沒有 Atmos」而不會中斷批次。

use log::debug;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

/// Atmos 關鍵字（含常見拼法變體）
const ATMOS_INDICATORS: [&str; 7] = [
    "atmos",
    "dolby atmos",
    "dolby-atmos",
    "dolby digital plus atmos",
    "dd+ atmos",
    "truehd atmos",
    "true-hd atmos",
];

/// Joint Object Coding 關鍵字，出現即代表 Atmos
const JOC_INDICATORS: [&str; 5] = [
    "joc",
    "joint object coding",
    "joint-object-coding",
    "enhanced ac-3 joc",
    "e-ac-3 joc",
];

/// 單一音軌的描述欄位，缺漏欄位一律以空字串代替
#[derive(Debug, Clone, Default)]
pub struct AudioTrack {
    /// 1 起算的音軌編號，只計音軌（與編碼器的編號一致）
    pub index: u32,
    pub format: String,
    pub format_profile: String,
    pub title: String,
    pub codec_id: String,
    pub format_info: String,
    pub commercial_name: String,
    pub is_atmos: bool,
}

#[derive(Deserialize)]
struct MediaInfoOutput {
    media: Option<MediaSection>,
}

#[derive(Deserialize)]
struct MediaSection {
    #[serde(default)]
    track: Vec<TrackSection>,
}

#[derive(Deserialize)]
struct TrackSection {
    #[serde(rename = "@type")]
    track_type: Option<String>,
    #[serde(rename = "Format")]
    format: Option<String>,
    #[serde(rename = "Format_Profile")]
    format_profile: Option<String>,
    #[serde(rename = "Format_Info")]
    format_info: Option<String>,
    #[serde(rename = "Format_Commercial_IfAny", alias = "Format_Commercial")]
    commercial_name: Option<String>,
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "CodecID")]
    codec_id: Option<String>,
}

/// 查詢檔案的音軌清單，依 mediainfo 列舉的順序編號
///
/// mediainfo 不存在、執行失敗或輸出無法解析時回傳空清單。
pub fn analyze_audio_tracks(mediainfo_cmd: &str, file: &Path) -> Vec<AudioTrack> {
    let output = match Command::new(mediainfo_cmd)
        .arg("--Output=JSON")
        .arg(file)
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            debug!("無法執行 mediainfo: {e}");
            return Vec::new();
        }
    };

    if !output.status.success() {
        debug!(
            "mediainfo 執行失敗: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        return Vec::new();
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_audio_tracks(&stdout)
}

/// 解析 mediainfo 的 JSON 輸出
pub fn parse_audio_tracks(json: &str) -> Vec<AudioTrack> {
    let parsed: MediaInfoOutput = match serde_json::from_str(json) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("無法解析 mediainfo 輸出: {e}");
            return Vec::new();
        }
    };

    let Some(media) = parsed.media else {
        return Vec::new();
    };

    let mut tracks = Vec::new();
    let mut audio_counter = 0u32;

    for section in media.track {
        if section.track_type.as_deref() != Some("Audio") {
            continue;
        }
        audio_counter += 1;

        let mut track = AudioTrack {
            index: audio_counter,
            format: lower_or_empty(section.format),
            format_profile: lower_or_empty(section.format_profile),
            title: lower_or_empty(section.title),
            codec_id: lower_or_empty(section.codec_id),
            format_info: lower_or_empty(section.format_info),
            commercial_name: lower_or_empty(section.commercial_name),
            is_atmos: false,
        };
        track.is_atmos = detect_atmos(&track);

        debug!(
            "音軌 {}: format={}, profile={}, title={}, codec_id={}, info={}, commercial={}, is_atmos={}",
            track.index,
            track.format,
            track.format_profile,
            track.title,
            track.codec_id,
            track.format_info,
            track.commercial_name,
            track.is_atmos
        );

        tracks.push(track);
    }

    tracks
}

/// 被標記為 Atmos 的音軌編號（可能為空）
#[must_use]
pub fn atmos_track_indices(tracks: &[AudioTrack]) -> Vec<u32> {
    tracks
        .iter()
        .filter(|t| t.is_atmos)
        .map(|t| t.index)
        .collect()
}

fn lower_or_empty(value: Option<String>) -> String {
    value.unwrap_or_default().to_lowercase()
}

/// Atmos 啟發式判斷，欄位需已轉小寫
fn detect_atmos(track: &AudioTrack) -> bool {
    let all_fields = [
        track.format_profile.as_str(),
        track.title.as_str(),
        track.format_info.as_str(),
        track.commercial_name.as_str(),
        track.codec_id.as_str(),
    ];

    // 任一欄位含 Atmos 關鍵字
    if all_fields
        .iter()
        .any(|field| ATMOS_INDICATORS.iter().any(|kw| field.contains(kw)))
    {
        return true;
    }

    // 任一欄位含 JOC 關鍵字
    if all_fields
        .iter()
        .any(|field| JOC_INDICATORS.iter().any(|kw| field.contains(kw)))
    {
        return true;
    }

    // TrueHD 且 profile 標記 Atmos
    if track.format.contains("truehd") && track.format_profile.contains("atmos") {
        return true;
    }

    // E-AC-3 且任一欄位出現 JOC 標記
    if track.format.contains("e-ac-3") && all_fields.iter().any(|field| field.contains("joc")) {
        return true;
    }

    // 商業名稱直接點名 Dolby Digital Plus with Dolby Atmos
    if track
        .commercial_name
        .contains("dolby digital plus with dolby atmos")
    {
        return true;
    }

    false
}
