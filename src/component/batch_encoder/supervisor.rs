//! 編碼子程序監督
//!
//! 兩階段狀態機：
//! STARTING → AWAITING_HANDOFF → EXECUTING →
//! {COMPLETED, COMPLETED_WITHOUT_ARTIFACT, FAILED, TIMED_OUT}
//!
//! 第一階段以 dry-run 啟動產生器，逐行讀取輸出等待含編碼器名稱的
//! 交接行，等待次數有上限；第二階段執行改寫後的編碼命令並從輸出
//! 解析進度，此階段不設逾時（信任編碼器自行結束）。

use super::command_line::{CommandLine, Word, split_words};
use super::synthesizer::{
    inject_preview, is_encoder_command_line, rewrite_for_atmos, rewrite_output_path,
    wrap_with_cpu_limit,
};
use crate::config::Settings;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use regex::Regex;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, LazyLock, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// 交接階段每次輪詢的等待時間
const HANDOFF_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// 交接階段的輪詢次數上限，超過即終止產生器
const HANDOFF_MAX_POLLS: u32 = 30;

/// 編碼器進度行：百分比、平均速率與 ETA
static REGEX_PROGRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s(\d+\.\d+)\s%.*avg\s(\d+\.\d+).*ETA\s(\d+)h(\d+)m(\d+)s")
        .expect("Invalid regex")
});

/// 單次進度回報
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    pub percent: f64,
    pub avg_fps: f64,
    pub eta_hours: u32,
    pub eta_minutes: u32,
    pub eta_seconds: u32,
}

/// 從編碼器輸出行解析進度
#[must_use]
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let caps = REGEX_PROGRESS.captures(line)?;
    Some(ProgressEvent {
        percent: caps[1].parse().ok()?,
        avg_fps: caps[2].parse().ok()?,
        eta_hours: caps[3].parse().ok()?,
        eta_minutes: caps[4].parse().ok()?,
        eta_seconds: caps[5].parse().ok()?,
    })
}

/// 進度百分比在單一檔案內不得倒退
#[must_use]
pub fn clamp_monotonic(event: ProgressEvent, last_percent: f64) -> ProgressEvent {
    ProgressEvent {
        percent: event.percent.max(last_percent),
        ..event
    }
}

/// 交接階段的結果
#[derive(Debug)]
pub enum HandoffResult {
    /// 擷取到編碼器命令行
    Captured(String),
    /// 產生器在印出編碼命令前就結束
    Exited,
    /// 超過輪詢上限，產生器已被終止
    TimedOut,
    /// 產生器無法啟動
    SpawnFailed(String),
}

/// 單一檔案的最終狀態
#[derive(Debug)]
pub enum EncodeOutcome {
    /// 子程序結束且輸出檔存在
    Completed(CompletedEncode),
    /// 子程序結束但輸出檔不存在，視為異常但不中斷批次
    CompletedWithoutArtifact,
    Failed(String),
    TimedOut,
}

#[derive(Debug)]
pub struct CompletedEncode {
    pub final_command: String,
    pub elapsed: Duration,
}

pub struct ProcessSupervisor<'a> {
    settings: &'a Settings,
    handoff_poll_interval: Duration,
    handoff_max_polls: u32,
}

impl<'a> ProcessSupervisor<'a> {
    #[must_use]
    pub const fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            handoff_poll_interval: HANDOFF_POLL_INTERVAL,
            handoff_max_polls: HANDOFF_MAX_POLLS,
        }
    }

    /// 執行完整的兩階段流程
    pub fn run(
        &self,
        dry_run_command: &str,
        output_file: &Path,
        preview: bool,
        atmos_tracks: &[u32],
    ) -> EncodeOutcome {
        info!("啟動 transcode-video dry-run 以取得 HandBrakeCLI 命令...");

        let captured = match self.await_handoff(dry_run_command) {
            HandoffResult::Captured(line) => line,
            HandoffResult::Exited => {
                return EncodeOutcome::Failed("產生器在印出編碼命令前就結束".to_string());
            }
            HandoffResult::TimedOut => return EncodeOutcome::TimedOut,
            HandoffResult::SpawnFailed(e) => {
                return EncodeOutcome::Failed(format!("無法啟動產生器: {e}"));
            }
        };

        let final_command = self.rewrite_command(&captured, output_file, preview, atmos_tracks);
        debug!("最終 HandBrakeCLI 命令: {final_command}");

        let start = Instant::now();
        match self.execute(&final_command) {
            Ok(()) => {
                let elapsed = start.elapsed();
                if output_file.exists() {
                    EncodeOutcome::Completed(CompletedEncode {
                        final_command,
                        elapsed,
                    })
                } else {
                    warn!("編碼程序結束但輸出檔不存在: {}", output_file.display());
                    EncodeOutcome::CompletedWithoutArtifact
                }
            }
            Err(e) => EncodeOutcome::Failed(e),
        }
    }

    /// 對擷取到的編碼命令套用所有改寫
    #[must_use]
    pub fn rewrite_command(
        &self,
        captured: &str,
        output_file: &Path,
        preview: bool,
        atmos_tracks: &[u32],
    ) -> String {
        let mut cmd = CommandLine::parse(captured);
        rewrite_output_path(&mut cmd, output_file);
        rewrite_for_atmos(&mut cmd, atmos_tracks);
        if preview {
            inject_preview(&mut cmd, &self.settings.preview_parameter);
        }
        cmd.to_string()
    }

    /// 交接階段：啟動 dry-run 產生器並等待編碼器命令行
    ///
    /// stdout 與 stderr 由讀取執行緒合流到同一個 channel。
    pub fn await_handoff(&self, dry_run_command: &str) -> HandoffResult {
        let words = split_words(dry_run_command);
        let mut child = match spawn_piped(&words) {
            Ok(child) => child,
            Err(e) => {
                error!("無法啟動 transcode-video: {e}");
                return HandoffResult::SpawnFailed(e.to_string());
            }
        };

        let (tx, rx) = mpsc::channel::<String>();
        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader(stderr, tx.clone());
        }
        drop(tx);

        let mut polls = 0u32;
        loop {
            match rx.recv_timeout(self.handoff_poll_interval) {
                Ok(line) => {
                    debug!("transcode-video 輸出: {}", line.trim());
                    if is_encoder_command_line(&line) {
                        info!("已從 transcode-video 輸出取得 HandBrakeCLI 命令");
                        let _ = child.kill();
                        let _ = child.wait();
                        return HandoffResult::Captured(line.trim().to_string());
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    polls += 1;
                    if polls > self.handoff_max_polls {
                        error!("等待 HandBrakeCLI 命令逾時，終止產生器");
                        let _ = child.kill();
                        let _ = child.wait();
                        return HandoffResult::TimedOut;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // 兩條輸出流都已關閉，產生器結束
                    let status = child.wait();
                    info!("transcode-video 結束，回傳狀態: {status:?}");
                    return HandoffResult::Exited;
                }
            }
        }
    }

    /// 執行階段：啟動編碼命令並解析進度直到結束，不設逾時
    fn execute(&self, final_command: &str) -> Result<(), String> {
        let command_text = if self.settings.cpu_limit_enabled {
            wrap_with_cpu_limit(final_command, self.settings)
        } else {
            final_command.to_string()
        };

        let words = split_words(&command_text);
        let mut child =
            spawn_piped(&words).map_err(|e| format!("無法啟動編碼程序: {e}"))?;

        // stderr 另開執行緒收集，失敗時作為錯誤訊息
        let stderr_lines: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let stderr_handle = child.stderr.take().map(|stderr| {
            let collected = Arc::clone(&stderr_lines);
            thread::spawn(move || {
                let reader = BufReader::new(stderr);
                for line in reader.lines().map_while(Result::ok) {
                    if let Ok(mut guard) = collected.lock() {
                        guard.push(line);
                    }
                }
            })
        });

        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("進度: {percent:>3}%|{wide_bar}| {msg}")
                .expect("Invalid progress template"),
        );

        if let Some(stdout) = child.stdout.take() {
            let reader = BufReader::new(stdout);
            let mut last_percent = 0.0f64;
            for line in reader.lines().map_while(Result::ok) {
                if let Some(event) = parse_progress_line(&line) {
                    let event = clamp_monotonic(event, last_percent);
                    last_percent = event.percent;
                    bar.set_position(event.percent as u64);
                    bar.set_message(format!(
                        "avg {:.1} fps, ETA {}h{}m{}s",
                        event.avg_fps, event.eta_hours, event.eta_minutes, event.eta_seconds
                    ));
                }
            }
        }

        let status = child
            .wait()
            .map_err(|e| format!("無法等待編碼程序: {e}"))?;
        if let Some(handle) = stderr_handle {
            let _ = handle.join();
        }
        bar.finish_and_clear();

        // 回傳碼不是完成與否的依據，最終以輸出檔是否存在判定
        if !status.success() {
            warn!("編碼程序回傳非零狀態: {status}");
            if let Ok(lines) = stderr_lines.lock() {
                if !lines.is_empty() {
                    debug!("編碼程序 stderr: {}", lines.join("\n"));
                }
            }
        }
        Ok(())
    }
}

fn spawn_piped(words: &[Word]) -> std::io::Result<Child> {
    let Some((program, args)) = words.split_first() else {
        return Err(std::io::Error::other("空的命令"));
    };
    Command::new(&program.text)
        .args(args.iter().map(|w| w.text.as_str()))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
}

fn spawn_line_reader(stream: impl Read + Send + 'static, tx: Sender<String>) {
    thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}
