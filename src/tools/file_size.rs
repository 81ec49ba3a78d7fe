//! 檔案大小的人類可讀表示

use std::fmt;

const CHUNK: f64 = 1024.0;
const UNITS: [&str; 6] = ["bytes", "KB", "MB", "GB", "TB", "PB"];
const PRECISIONS: [usize; 6] = [0, 0, 1, 2, 2, 2];

/// 以 1024 為底換算單位的檔案大小
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSize(pub u64);

impl fmt::Display for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "0 bytes");
        }
        if self.0 == 1 {
            return write!(f, "1 byte");
        }

        let exponent = (self.0.ilog(1024) as usize).min(UNITS.len() - 1);
        let quotient = self.0 as f64 / CHUNK.powi(exponent as i32);
        write!(
            f,
            "{:.*} {}",
            PRECISIONS[exponent], quotient, UNITS[exponent]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_and_one_byte() {
        assert_eq!(FileSize(0).to_string(), "0 bytes");
        assert_eq!(FileSize(1).to_string(), "1 byte");
        assert_eq!(FileSize(512).to_string(), "512 bytes");
    }

    #[test]
    fn test_kilobytes_have_no_decimals() {
        assert_eq!(FileSize(2048).to_string(), "2 KB");
        assert_eq!(FileSize(1536).to_string(), "2 KB");
    }

    #[test]
    fn test_megabytes_one_decimal() {
        assert_eq!(FileSize(1024 * 1024).to_string(), "1.0 MB");
        assert_eq!(FileSize(1024 * 1024 + 512 * 1024).to_string(), "1.5 MB");
    }

    #[test]
    fn test_gigabytes_two_decimals() {
        assert_eq!(FileSize(5 * 1024 * 1024 * 1024).to_string(), "5.00 GB");
        let size = 1024u64 * 1024 * 1024 * 3 / 2;
        assert_eq!(FileSize(size).to_string(), "1.50 GB");
    }
}
