//! 編碼結果統計
//!
//! 每個成功完成的檔案在分號分隔的統計檔中追加一列。
//! 檔案首次建立時先寫入固定標題列；既有資料列不會被改寫或重排。

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const DELIMITER: char = ';';
const HEADER: [&str; 7] = [
    "Encoded Date",
    "Filename",
    "Original Size",
    "New Size",
    "Percentage",
    "Duration of Encode",
    "Command",
];

/// 一列統計資料，欄位皆為已格式化的文字
#[derive(Debug, Clone)]
pub struct StatisticsRecord {
    pub encoded_date: String,
    pub filename: String,
    pub original_size: String,
    pub new_size: String,
    pub percentage: String,
    pub duration: String,
    pub command: String,
}

impl StatisticsRecord {
    fn fields(&self) -> [&str; 7] {
        [
            &self.encoded_date,
            &self.filename,
            &self.original_size,
            &self.new_size,
            &self.percentage,
            &self.duration,
            &self.command,
        ]
    }
}

pub struct StatisticsRecorder {
    path: PathBuf,
}

impl StatisticsRecorder {
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// 追加一列；統計檔不存在時先建立並寫入標題列
    pub fn append(&self, record: &StatisticsRecord) -> Result<()> {
        let is_new = !self.path.exists();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("無法開啟統計檔: {}", self.path.display()))?;

        if is_new {
            log::debug!("統計檔不存在，建立並寫入標題列");
            writeln!(file, "{}", format_row(&HEADER))?;
        } else {
            log::debug!("統計檔已存在，追加資料列");
        }

        writeln!(file, "{}", format_row(&record.fields()))
            .with_context(|| format!("無法寫入統計檔: {}", self.path.display()))?;
        Ok(())
    }
}

/// 最小引號規則：欄位含分隔符、引號或換行時才加引號，引號成對加倍
fn format_row(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|field| escape_field(field))
        .collect::<Vec<_>>()
        .join(&DELIMITER.to_string())
}

fn escape_field(field: &str) -> String {
    if field.contains(DELIMITER) || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn record(name: &str) -> StatisticsRecord {
        StatisticsRecord {
            encoded_date: "2026-08-23 10:00:00".to_string(),
            filename: name.to_string(),
            original_size: "5.00 GB".to_string(),
            new_size: "1.50 GB".to_string(),
            percentage: "30.00%".to_string(),
            duration: "01:23:45".to_string(),
            command: "HandBrakeCLI --input a.mp4 --output a.mkv".to_string(),
        }
    }

    #[test]
    fn test_first_append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tvb-stats.csv");
        let recorder = StatisticsRecorder::new(&path);

        recorder.append(&record("a.mp4")).unwrap();
        recorder.append(&record("b.mp4")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Encoded Date;Filename;Original Size;New Size;Percentage;Duration of Encode;Command"
        );
        assert!(lines[1].contains("a.mp4"));
        assert!(lines[2].contains("b.mp4"));
    }

    #[test]
    fn test_append_preserves_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tvb-stats.csv");
        let recorder = StatisticsRecorder::new(&path);

        recorder.append(&record("a.mp4")).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        recorder.append(&record("b.mp4")).unwrap();
        let after = fs::read_to_string(&path).unwrap();

        assert!(after.starts_with(&before));
        assert_eq!(after.lines().count(), before.lines().count() + 1);
    }

    #[test]
    fn test_fields_with_delimiter_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        let recorder = StatisticsRecorder::new(&path);

        let mut r = record("weird;name.mp4");
        r.command = "HandBrakeCLI --crop \"0:0\"".to_string();
        recorder.append(&r).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let data_line = content.lines().nth(1).unwrap();
        assert!(data_line.contains("\"weird;name.mp4\""));
        assert!(data_line.contains("\"HandBrakeCLI --crop \"\"0:0\"\"\""));
    }
}
