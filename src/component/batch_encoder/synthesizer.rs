//! 編碼命令的合成與改寫
//!
//! 組出 transcode-video 的 dry-run 呼叫，從其輸出擷取 HandBrakeCLI
//! 命令，再對命令做三種改寫：輸出路徑替換、Atmos 音軌參數重建、
//! 預覽參數注入。找不到預期旗標時只記錄警告，命令維持原樣，
//! 不會中斷批次。

use super::command_line::{CommandLine, Word, split_words};
use crate::config::{EncodeFormat, Settings};
use log::{debug, warn};
use std::path::Path;

/// 編碼器執行檔名稱，dry-run 輸出中含此字串的行即為交接行
pub const ENCODER_SENTINEL: &str = "HandBrakeCLI";

/// 音軌參數缺漏時的預設編碼器
const DEFAULT_AUDIO_ENCODER: &str = "av_aac";
/// 音軌參數缺漏時的預設混音配置
const DEFAULT_MIXDOWN: &str = "5point1";

/// 組出 dry-run 的 transcode-video 呼叫
#[must_use]
pub fn build_dry_run_command(settings: &Settings, input: &Path, format: EncodeFormat) -> String {
    let params = settings.encoding_parameters.for_format(format);
    if params.is_empty() {
        format!(
            "{} --dry-run \"{}\"",
            settings.tools.transcode_video,
            input.display()
        )
    } else {
        format!(
            "{} {} --dry-run \"{}\"",
            settings.tools.transcode_video,
            params,
            input.display()
        )
    }
}

/// 此行是否為編碼器命令（交接行）
#[must_use]
pub fn is_encoder_command_line(line: &str) -> bool {
    line.contains(ENCODER_SENTINEL)
}

/// 從輸出行中找出第一個編碼器命令，原樣回傳
pub fn extract_encoder_command<'a>(lines: impl IntoIterator<Item = &'a str>) -> Option<String> {
    lines
        .into_iter()
        .find(|line| is_encoder_command_line(line))
        .map(|line| line.trim().to_string())
}

/// 把 --output 的值換成期望的輸出路徑
///
/// 路徑會去除內嵌引號後以引號包覆。原值若是單一 token，
/// 會一併移除命令尾端重複出現的同名 token（防範產生器把
/// 檔名印兩次）。找不到 --output 時記錄警告並維持原樣。
pub fn rewrite_output_path(cmd: &mut CommandLine, desired: &Path) {
    let Some(output_arg) = cmd.find("--output") else {
        warn!("命令中找不到 --output 參數，輸出路徑維持原樣");
        return;
    };

    let original_values: Vec<String> = output_arg
        .values
        .iter()
        .map(|w| w.text.clone())
        .collect();
    let original_joined = output_arg.joined_values();

    let clean_path = desired.display().to_string().replace(['\'', '"'], "");
    cmd.set_values("--output", vec![Word::quoted(clean_path.clone())]);

    // 原值跨多個 token 時不做移除（行為未定義，見測試）
    if original_values.len() == 1 {
        let removed = cmd.remove_stray_values_after("--output", &original_values[0]);
        if removed > 0 {
            debug!("移除重複的輸出檔名 token: {} x{removed}", original_values[0]);
        }
    }

    debug!("輸出路徑改寫: '{original_joined}' → '{clean_path}'");
}

/// 重建音訊參數以保留 Atmos 音軌
///
/// Atmos 音軌改為 copy 直通（無位元率、mixdown=none），其餘音軌
/// 沿用命令中原本的參數，缺漏時補上預設值。超出 --audio 範圍的
/// Atmos 音軌只回報警告，不改寫。
pub fn rewrite_for_atmos(cmd: &mut CommandLine, atmos_tracks: &[u32]) {
    if atmos_tracks.is_empty() {
        return;
    }

    let Some(audio_arg) = cmd.find("--audio") else {
        warn!("命令中找不到 --audio 參數，無法套用 Atmos 保留");
        return;
    };

    let list_text = audio_arg.first_value().to_string();
    let mut processed_tracks = Vec::new();
    for part in list_text.split(',') {
        match part.trim().parse::<u32>() {
            Ok(n) => processed_tracks.push(n),
            Err(_) => {
                warn!("無法解析 --audio 音軌清單 '{list_text}'，略過 Atmos 改寫");
                return;
            }
        }
    }
    let Some(&max_processed) = processed_tracks.iter().max() else {
        warn!("--audio 音軌清單為空，略過 Atmos 改寫");
        return;
    };
    let processed_count = processed_tracks.len();

    let unprocessable: Vec<u32> = atmos_tracks
        .iter()
        .copied()
        .filter(|t| *t > max_processed)
        .collect();
    if !unprocessable.is_empty() {
        warn!(
            "Atmos 音軌 {unprocessable:?} 超出處理範圍（最大編號 {max_processed}），不會被保留"
        );
        warn!("要保留這些音軌，請把對應語言加進 --add-audio 參數");
    }

    let relevant: Vec<u32> = atmos_tracks
        .iter()
        .copied()
        .filter(|t| *t <= max_processed)
        .collect();
    if relevant.is_empty() {
        debug!("處理範圍內沒有 Atmos 音軌，音訊參數維持原樣");
        return;
    }

    let original_encoders = comma_list(cmd, "--aencoder");
    let original_bitrates = comma_list(cmd, "--ab");
    let original_mixdowns = comma_list(cmd, "--mixdown");

    let mut encoders = Vec::with_capacity(processed_count);
    let mut bitrates = Vec::with_capacity(processed_count);
    let mut mixdowns = Vec::with_capacity(processed_count);

    for i in 1..=processed_count as u32 {
        if relevant.contains(&i) {
            // 直通保留原始位元流與聲道配置
            encoders.push("copy".to_string());
            bitrates.push(String::new());
            mixdowns.push("none".to_string());
            debug!("音軌 {i}: Atmos，改用 copy 直通");
        } else {
            let idx = (i - 1) as usize;
            encoders.push(
                original_encoders
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_AUDIO_ENCODER.to_string()),
            );
            bitrates.push(original_bitrates.get(idx).cloned().unwrap_or_default());
            mixdowns.push(
                original_mixdowns
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_MIXDOWN.to_string()),
            );
        }
    }

    let encoder_param = encoders.join(",");
    let bitrate_param = bitrates
        .iter()
        .filter(|b| !b.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(",");
    let mixdown_param = mixdowns.join(",");

    cmd.set_or_insert_after("--aencoder", "--audio", vec![Word::bare(encoder_param)]);

    if bitrate_param.is_empty() {
        // 全部為空時整個旗標省略
        cmd.remove("--ab");
    } else {
        cmd.set_or_insert_after("--ab", "--aencoder", vec![Word::bare(bitrate_param)]);
    }

    let mixdown_anchor = if cmd.contains_flag("--ab") {
        "--ab"
    } else {
        "--aencoder"
    };
    cmd.set_or_insert_after("--mixdown", mixdown_anchor, vec![Word::bare(mixdown_param)]);

    debug!("Atmos 音訊參數已套用: tracks={relevant:?}");
}

/// 把預覽參數附加到命令尾端
pub fn inject_preview(cmd: &mut CommandLine, preview_parameter: &str) {
    if preview_parameter.is_empty() {
        return;
    }
    cmd.append_words(split_words(preview_parameter));
}

/// 以 cpulimit 前綴包住整個編碼命令
#[must_use]
pub fn wrap_with_cpu_limit(command_text: &str, settings: &Settings) -> String {
    format!(
        "{} --limit={} -i -z {}",
        settings.tools.cpulimit, settings.cpu_limit_percentage, command_text
    )
}

fn comma_list(cmd: &CommandLine, name: &str) -> Vec<String> {
    cmd.find(name)
        .map(|arg| {
            arg.first_value()
                .split(',')
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
}
