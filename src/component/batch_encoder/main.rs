//! 批次編碼流程
//!
//! 逐檔循序處理：檢查輸出是否已存在、分析音軌、建立 dry-run 命令、
//! 交給監督器執行，完成後寫入統計列。單一檔案的失敗只記錄並跳過，
//! 不中斷整個批次。

use super::command_line::split_words;
use super::statistics::{StatisticsRecord, StatisticsRecorder};
use super::supervisor::{EncodeOutcome, HandoffResult, ProcessSupervisor};
use super::synthesizer::build_dry_run_command;
use crate::config::{Config, EncodeFormat};
use crate::tools::video_scanner::FormatAssignment;
use crate::tools::{
    FileSize, analyze_audio_tracks, atmos_track_indices, classify, copy_modification_time,
    ensure_directory_exists,
};
use anyhow::{Result, bail};
use chrono::Local;
use console::style;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// 一次批次執行的參數（來自命令列）
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub format: Option<EncodeFormat>,
    pub merge: bool,
    pub preview: bool,
    pub dry_run: bool,
}

/// 單一檔案的處理結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileResult {
    Completed,
    Skipped,
    Failed,
}

pub struct BatchEncoder {
    config: Config,
    options: BatchOptions,
    shutdown_signal: Arc<AtomicBool>,
}

impl BatchEncoder {
    #[must_use]
    pub const fn new(
        config: Config,
        options: BatchOptions,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            options,
            shutdown_signal,
        }
    }

    pub fn run(&self) -> Result<()> {
        let assignments = classify(&self.options.input, self.options.format)?;
        if assignments.is_empty() {
            bail!("找不到任何影片檔案");
        }

        let file_count = assignments.len();
        let output_dir = if self.options.dry_run {
            // dry-run 不建立輸出目錄，僅用於組出目標路徑
            self.options
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(&self.config.settings.default_output_directory))
        } else {
            self.prepare_output_directory()?
        };

        self.print_overview(file_count, &output_dir);

        let mut completed = 0usize;
        let mut skipped = 0usize;
        let mut failed = 0usize;

        for (index, assignment) in assignments.iter().enumerate() {
            if self.shutdown_signal.load(Ordering::SeqCst) {
                warn!("收到中斷信號，停止批次處理");
                break;
            }

            let counter = index + 1;
            let result = if self.options.merge {
                if self.options.dry_run {
                    self.show_merge_dry_run(&assignment.file.path, &output_dir)
                } else {
                    self.merge_file(&assignment.file.path, &output_dir)
                }
            } else {
                self.process_file(assignment, &output_dir, counter, file_count)
            };

            match result {
                FileResult::Completed => completed += 1,
                FileResult::Skipped => skipped += 1,
                FileResult::Failed => failed += 1,
            }
        }

        if !self.options.dry_run {
            self.print_summary(file_count, completed, skipped, failed, &output_dir);
        }

        Ok(())
    }

    /// 輸出目錄依序嘗試：指定目錄 → 設定檔預設 → ./output
    fn prepare_output_directory(&self) -> Result<PathBuf> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(requested) = &self.options.output {
            candidates.push(requested.clone());
        }
        candidates.push(PathBuf::from(&self.config.settings.default_output_directory));
        candidates.push(PathBuf::from("./output"));

        for candidate in candidates {
            match ensure_directory_exists(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(e) => warn!("無法建立輸出目錄 {}: {e}", candidate.display()),
            }
        }
        bail!("無法建立任何輸出目錄，請檢查權限或以 -o 指定有效路徑")
    }

    fn print_overview(&self, file_count: usize, output_dir: &Path) {
        if self.options.dry_run {
            println!("{}", style("=== 批次編碼（dry-run 模式）===").cyan().bold());
            println!("找到 {file_count} 個影片檔案");
        } else {
            println!("{}", style("=== 批次編碼 ===").cyan().bold());
            println!("找到 {file_count} 個影片檔案");
            println!("輸出目錄: {}", output_dir.display());
        }
    }

    fn print_summary(
        &self,
        file_count: usize,
        completed: usize,
        skipped: usize,
        failed: usize,
        output_dir: &Path,
    ) {
        println!();
        println!("{}", style("=== 批次編碼摘要 ===").cyan().bold());
        println!("  總計: {file_count} 個檔案");
        println!("  成功: {} 個", style(completed).green());
        if skipped > 0 {
            println!("  跳過: {} 個", style(skipped).yellow());
        }
        if failed > 0 {
            println!("  失敗: {} 個", style(failed).red());
        }
        println!("  輸出目錄: {}", output_dir.display());

        info!("批次編碼完成 - 成功: {completed}, 跳過: {skipped}, 失敗: {failed}");
    }

    /// 重新封裝的輸出路徑：原檔名改為 .mkv 副檔名
    fn merge_output_path(input: &Path, output_dir: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        output_dir.join(format!("{stem}.mkv"))
    }

    fn merge_command_text(&self, input: &Path, output_file: &Path) -> String {
        format!(
            "{} -o \"{}\" \"{}\"",
            self.config.settings.tools.mkvmerge,
            output_file.display(),
            input.display()
        )
    }

    /// dry-run 模式只顯示會執行的 mkvmerge 命令，不真的封裝
    fn show_merge_dry_run(&self, input: &Path, output_dir: &Path) -> FileResult {
        let output_file = Self::merge_output_path(input, output_dir);
        println!("mkvmerge 命令:");
        println!("  {}", self.merge_command_text(input, &output_file));
        FileResult::Completed
    }

    /// 以 mkvmerge 重新封裝單一檔案，不重新編碼
    fn merge_file(&self, input: &Path, output_dir: &Path) -> FileResult {
        let file_name = display_name(input);
        let output_file = Self::merge_output_path(input, output_dir);

        if output_file.exists() {
            info!("輸出檔已存在，跳過: {file_name}");
            return FileResult::Skipped;
        }

        let command_text = self.merge_command_text(input, &output_file);
        debug!("mkvmerge 命令: {command_text}");

        let words = split_words(&command_text);
        let Some((program, args)) = words.split_first() else {
            error!("mkvmerge 命令為空");
            return FileResult::Failed;
        };

        match Command::new(&program.text)
            .args(args.iter().map(|w| w.text.as_str()))
            .output()
        {
            Ok(output) if output.status.success() => {
                info!("重新封裝完成: {file_name}");
                if self.config.settings.preserve_file_date {
                    if let Err(e) = copy_modification_time(input, &output_file) {
                        warn!("無法保留檔案日期: {e}");
                    }
                }
                FileResult::Completed
            }
            Ok(output) => {
                error!(
                    "mkvmerge 失敗 ({}): {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                FileResult::Failed
            }
            Err(e) => {
                error!("無法啟動 mkvmerge: {e}");
                FileResult::Failed
            }
        }
    }

    /// 處理單一檔案的完整編碼流程
    fn process_file(
        &self,
        assignment: &FormatAssignment,
        output_dir: &Path,
        counter: usize,
        file_count: usize,
    ) -> FileResult {
        let input = &assignment.file.path;
        let file_name = display_name(input);
        let output_file = output_dir.join(input.file_name().unwrap_or_default());

        if !self.options.dry_run && output_file.exists() {
            if self.config.settings.preserve_file_date {
                if let Err(e) = copy_modification_time(input, &output_file) {
                    warn!("無法保留檔案日期: {e}");
                }
            }
            info!("輸出檔已存在，跳過: {file_name}");
            return FileResult::Skipped;
        }

        let progress = (counter as f64 / file_count as f64) * 100.0;
        println!();
        println!(
            "{}",
            style(format!("檔案 {counter} / {file_count} ({progress:.2}%)")).cyan()
        );
        println!("{}", style(format!("處理中: {file_name}")).bold());
        info!("處理中: {file_name}");

        let atmos_tracks = self.detect_atmos_tracks(input);
        let dry_run_command =
            build_dry_run_command(&self.config.settings, input, assignment.format);
        debug!("transcode-video 命令: {dry_run_command}");

        let supervisor = ProcessSupervisor::new(&self.config.settings);

        if self.options.dry_run {
            return self.show_dry_run(&supervisor, &dry_run_command, &output_file, &atmos_tracks);
        }

        match supervisor.run(
            &dry_run_command,
            &output_file,
            self.options.preview,
            &atmos_tracks,
        ) {
            EncodeOutcome::Completed(done) => {
                println!("{}", style(format!("完成: {file_name}")).green());
                println!("編碼耗時: {}", format_hms(done.elapsed));

                if let Err(e) = self.record_completion(
                    input,
                    &output_file,
                    done.elapsed,
                    &done.final_command,
                ) {
                    warn!("無法寫入統計資料: {e}");
                }

                if self.config.settings.preserve_file_date {
                    if let Err(e) = copy_modification_time(input, &output_file) {
                        warn!("無法保留檔案日期: {e}");
                    }
                }
                FileResult::Completed
            }
            EncodeOutcome::CompletedWithoutArtifact => {
                error!("編碼結束但沒有產生輸出檔: {file_name}");
                FileResult::Failed
            }
            EncodeOutcome::Failed(reason) => {
                error!("編碼失敗: {file_name}, {reason}");
                FileResult::Failed
            }
            EncodeOutcome::TimedOut => {
                error!("等待編碼命令逾時: {file_name}");
                FileResult::Failed
            }
        }
    }

    /// dry-run 模式只執行交接階段並顯示命令，不編碼也不寫統計
    fn show_dry_run(
        &self,
        supervisor: &ProcessSupervisor<'_>,
        dry_run_command: &str,
        output_file: &Path,
        atmos_tracks: &[u32],
    ) -> FileResult {
        println!("transcode-video 命令:");
        println!("  {dry_run_command}");

        match supervisor.await_handoff(dry_run_command) {
            HandoffResult::Captured(captured) => {
                println!("HandBrakeCLI 命令（原始）:");
                println!("  {captured}");
                let rewritten = supervisor.rewrite_command(
                    &captured,
                    output_file,
                    self.options.preview,
                    atmos_tracks,
                );
                println!("HandBrakeCLI 命令（改寫後）:");
                println!("  {rewritten}");
                FileResult::Completed
            }
            other => {
                println!(
                    "{}",
                    style("找不到 HandBrakeCLI 命令").yellow()
                );
                debug!("交接結果: {other:?}");
                FileResult::Failed
            }
        }
    }

    /// 分析音軌並回傳要保留的 Atmos 音軌編號
    ///
    /// 設定未啟用時仍會分析並提示，但不改寫音訊參數。
    fn detect_atmos_tracks(&self, input: &Path) -> Vec<u32> {
        let tracks = analyze_audio_tracks(&self.config.settings.tools.mediainfo, input);
        let indices = atmos_track_indices(&tracks);

        if indices.is_empty() {
            debug!("未偵測到 Dolby Atmos 音軌");
            return Vec::new();
        }

        if self.config.settings.preserve_atmos_audio {
            info!("偵測到 Dolby Atmos 音軌: {indices:?}");
            indices
        } else {
            info!("偵測到 Dolby Atmos 音軌 {indices:?}，但設定未啟用保留");
            Vec::new()
        }
    }

    fn record_completion(
        &self,
        input: &Path,
        output_file: &Path,
        elapsed: Duration,
        final_command: &str,
    ) -> Result<()> {
        let original_size = std::fs::metadata(input)?.len();
        let new_size = std::fs::metadata(output_file)?.len();
        let ratio = if original_size > 0 {
            new_size as f64 / original_size as f64 * 100.0
        } else {
            0.0
        };
        info!(
            "原始/新檔案大小: {}/{}",
            FileSize(original_size),
            FileSize(new_size)
        );

        let record = StatisticsRecord {
            encoded_date: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            filename: display_name(input),
            original_size: FileSize(original_size).to_string(),
            new_size: FileSize(new_size).to_string(),
            percentage: format!("{ratio:.2}%"),
            duration: format_hms(elapsed),
            command: final_command.to_string(),
        };

        let recorder = StatisticsRecorder::new(Path::new(&self.config.settings.statistics_file));
        recorder.append(&record)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn format_hms(duration: Duration) -> String {
    let total = duration.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn encoder_with(settings: Settings, options: BatchOptions) -> BatchEncoder {
        BatchEncoder::new(
            Config { settings },
            options,
            Arc::new(AtomicBool::new(false)),
        )
    }

    fn options(input: &Path) -> BatchOptions {
        BatchOptions {
            input: input.to_path_buf(),
            output: None,
            format: None,
            merge: false,
            preview: false,
            dry_run: false,
        }
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_hms(Duration::from_secs(59)), "00:00:59");
        assert_eq!(format_hms(Duration::from_secs(3723)), "01:02:03");
        assert_eq!(format_hms(Duration::from_secs(90061)), "25:01:01");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Path::new("/a/b/Movie.2020.mp4")), "Movie.2020.mp4");
    }

    #[test]
    fn test_merge_command_text_and_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let input = Path::new("/in/My Film 2020.mp4");
        let encoder = encoder_with(Settings::default(), options(dir.path()));

        let output_file = BatchEncoder::merge_output_path(input, Path::new("/out"));
        assert_eq!(output_file, Path::new("/out/My Film 2020.mkv"));

        assert_eq!(
            encoder.merge_command_text(input, &output_file),
            "mkvmerge -o \"/out/My Film 2020.mkv\" \"/in/My Film 2020.mp4\""
        );
    }

    #[test]
    fn test_run_merge_dry_run_shows_commands_without_merging() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("Movie Title 2020.mp4");
        std::fs::write(&input, b"x").unwrap();

        let out_dir = dir.path().join("out");
        let mut opts = options(dir.path());
        opts.output = Some(out_dir.clone());
        opts.merge = true;
        opts.dry_run = true;
        let encoder = encoder_with(Settings::default(), opts);

        encoder.run().unwrap();

        // dry-run 不建立輸出目錄，也不產生封裝結果
        assert!(!out_dir.exists());
    }

    #[test]
    fn test_prepare_output_directory_uses_requested() {
        let dir = tempfile::tempdir().unwrap();
        let requested = dir.path().join("out");

        let mut opts = options(dir.path());
        opts.output = Some(requested.clone());
        let encoder = encoder_with(Settings::default(), opts);

        let chosen = encoder.prepare_output_directory().unwrap();
        assert_eq!(chosen, requested);
        assert!(requested.is_dir());
    }

    #[test]
    fn test_prepare_output_directory_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        // 以一般檔案擋住指定目錄，強制走設定檔預設
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let fallback = dir.path().join("default-out");
        let mut settings = Settings::default();
        settings.default_output_directory = fallback.to_string_lossy().into_owned();

        let mut opts = options(dir.path());
        opts.output = Some(blocker.join("sub"));
        let encoder = encoder_with(settings, opts);

        let chosen = encoder.prepare_output_directory().unwrap();
        assert_eq!(chosen, fallback);
        assert!(fallback.is_dir());
    }
}
