use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use transcode_video_batch::component::{BatchEncoder, BatchOptions};
use transcode_video_batch::config::{Config, EncodeFormat};
use transcode_video_batch::init;
use transcode_video_batch::signal::setup_shutdown_signal;

/// 批次轉檔工具：以 transcode-video 產生 HandBrakeCLI 命令並在監督下執行
#[derive(Debug, Parser)]
#[command(name = "tvb", version, about)]
struct Cli {
    /// 輸入檔案或資料夾（含子資料夾）
    #[arg(short, long)]
    input: PathBuf,

    /// 輸出資料夾（預設取自設定檔）
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 強制所有檔案使用指定格式（未指定時自動偵測）
    #[arg(short, long, value_enum)]
    format: Option<EncodeFormat>,

    /// 以 mkvmerge 重新封裝，不重新編碼
    #[arg(short, long)]
    merge: bool,

    /// 只編碼預覽片段（預設 30 秒）
    #[arg(short = 'P', long)]
    preview: bool,

    /// 只顯示 HandBrakeCLI 命令，不執行編碼
    #[arg(short, long)]
    dry_run: bool,

    /// 顯示處理進度與詳細資訊
    #[arg(short, long)]
    verbose: bool,

    /// 顯示完整技術日誌
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init::init(cli.verbose, cli.debug);

    let shutdown_signal = setup_shutdown_signal();
    let config = Config::new()?;
    info!("設定載入完成");

    let options = BatchOptions {
        input: cli.input,
        output: cli.output,
        format: cli.format,
        merge: cli.merge,
        preview: cli.preview,
        dry_run: cli.dry_run,
    };

    BatchEncoder::new(config, options, shutdown_signal).run()
}
