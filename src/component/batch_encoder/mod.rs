//! 批次編碼元件
//!
//! 透過 transcode-video 取得 HandBrakeCLI 命令，改寫後在監督下執行

pub mod command_line;
mod main;
mod statistics;
pub mod supervisor;
pub mod synthesizer;

pub use main::{BatchEncoder, BatchOptions};
pub use statistics::{StatisticsRecord, StatisticsRecorder};
pub use supervisor::{EncodeOutcome, HandoffResult, ProcessSupervisor, ProgressEvent};
