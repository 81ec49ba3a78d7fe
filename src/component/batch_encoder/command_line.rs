//! 結構化的命令列模型
//!
//! 把外部工具印出的編碼命令拆成「程式字詞 + 依序排列的旗標→值」
//! 的結構，改寫後再重組回文字。改寫一律在結構上進行，
//! 不對原始字串做正規表達式手術。

use std::fmt;

/// 單一字詞，並記錄來源是否帶引號（重組時保留引號）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub text: String,
    pub quoted: bool,
}

impl Word {
    #[must_use]
    pub fn bare(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: false,
        }
    }

    #[must_use]
    pub fn quoted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: true,
        }
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted || self.text.is_empty() || self.text.contains(char::is_whitespace) {
            write!(f, "\"{}\"", self.text)
        } else {
            write!(f, "{}", self.text)
        }
    }
}

/// 一個旗標與其後跟隨的值（值的個數不限，保留出現順序與重複）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub name: String,
    pub values: Vec<Word>,
}

impl Arg {
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<Word>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// 第一個值的文字（沒有值時為空字串）
    #[must_use]
    pub fn first_value(&self) -> &str {
        self.values.first().map_or("", |w| w.text.as_str())
    }

    /// 所有值以空白串接的文字
    #[must_use]
    pub fn joined_values(&self) -> String {
        self.values
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// 第一個旗標之前的字詞（程式名稱，可能含直譯器）
    program: Vec<Word>,
    args: Vec<Arg>,
}

/// 旗標以 '-' 開頭且第二個字元不是數字（避免把負數值當旗標）
fn is_flag(word: &Word) -> bool {
    !word.quoted
        && word.text.starts_with('-')
        && word
            .text
            .chars()
            .nth(1)
            .is_some_and(|c| !c.is_ascii_digit())
}

/// 以引號感知的方式拆字（支援單引號與雙引號）
#[must_use]
pub fn split_words(line: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut quote_char: Option<char> = None;

    for c in line.chars() {
        match quote_char {
            Some(q) => {
                if c == q {
                    quote_char = None;
                } else {
                    current.push(c);
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    quote_char = Some(c);
                    quoted = true;
                } else if c.is_whitespace() {
                    if !current.is_empty() || quoted {
                        words.push(Word {
                            text: std::mem::take(&mut current),
                            quoted,
                        });
                        quoted = false;
                    }
                } else {
                    current.push(c);
                }
            }
        }
    }
    if !current.is_empty() || quoted {
        words.push(Word {
            text: current,
            quoted,
        });
    }

    words
}

impl CommandLine {
    /// 解析一行命令文字
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut cmd = Self {
            program: Vec::new(),
            args: Vec::new(),
        };
        cmd.append_words(split_words(line));
        cmd
    }

    /// 依解析規則追加字詞：旗標開啟新參數，其餘附到最後一個參數
    pub fn append_words(&mut self, words: Vec<Word>) {
        for word in words {
            if is_flag(&word) {
                self.args.push(Arg::new(word.text, Vec::new()));
            } else if let Some(last) = self.args.last_mut() {
                last.values.push(word);
            } else {
                self.program.push(word);
            }
        }
    }

    #[must_use]
    pub fn program(&self) -> &[Word] {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// 第一個同名旗標
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Arg> {
        self.args.iter().find(|arg| arg.name == name)
    }

    #[must_use]
    pub fn contains_flag(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// 取代第一個同名旗標的值；旗標不存在時回傳 false
    pub fn set_values(&mut self, name: &str, values: Vec<Word>) -> bool {
        match self.args.iter_mut().find(|arg| arg.name == name) {
            Some(arg) => {
                arg.values = values;
                true
            }
            None => false,
        }
    }

    /// 在第一個 anchor 旗標之後插入參數；anchor 不存在時附加到尾端
    pub fn insert_after(&mut self, anchor: &str, arg: Arg) {
        match self.args.iter().position(|a| a.name == anchor) {
            Some(pos) => self.args.insert(pos + 1, arg),
            None => self.args.push(arg),
        }
    }

    /// 取代第一個同名旗標的值，不存在時插入到 anchor 之後
    pub fn set_or_insert_after(&mut self, name: &str, anchor: &str, values: Vec<Word>) {
        if !self.set_values(name, values.clone()) {
            self.insert_after(anchor, Arg::new(name, values));
        }
    }

    /// 移除第一個同名旗標（連同其值）；有移除時回傳 true
    pub fn remove(&mut self, name: &str) -> bool {
        match self.args.iter().position(|a| a.name == name) {
            Some(pos) => {
                self.args.remove(pos);
                true
            }
            None => false,
        }
    }

    /// 在指定旗標「之後」的參數中，移除所有文字完全相等的值 token，
    /// 回傳移除數量。指定旗標本身的值不受影響。
    pub fn remove_stray_values_after(&mut self, after: &str, token: &str) -> usize {
        let Some(start) = self.args.iter().position(|a| a.name == after) else {
            return 0;
        };

        let mut removed = 0;
        for arg in &mut self.args[start + 1..] {
            let before = arg.values.len();
            arg.values.retain(|w| w.text != token);
            removed += before - arg.values.len();
        }
        removed
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.program.iter().map(ToString::to_string).collect();
        for arg in &self.args {
            parts.push(arg.name.clone());
            parts.extend(arg.values.iter().map(ToString::to_string));
        }
        write!(f, "{}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words_plain() {
        let words = split_words("HandBrakeCLI --input a.mp4 --opt x");
        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, ["HandBrakeCLI", "--input", "a.mp4", "--opt", "x"]);
        assert!(words.iter().all(|w| !w.quoted));
    }

    #[test]
    fn test_split_words_quotes() {
        let words = split_words(r#"HandBrakeCLI --input "my film.mp4" --title '1'"#);
        assert_eq!(words[2].text, "my film.mp4");
        assert!(words[2].quoted);
        assert_eq!(words[4].text, "1");
        assert!(words[4].quoted);
    }

    #[test]
    fn test_parse_program_and_args() {
        let cmd = CommandLine::parse("ruby /usr/local/bin/transcode-video.rb --dry-run a.mp4");
        assert_eq!(cmd.program().len(), 2);
        assert_eq!(cmd.program()[0].text, "ruby");
        assert_eq!(cmd.find("--dry-run").unwrap().first_value(), "a.mp4");
    }

    #[test]
    fn test_parse_keeps_flag_multiplicity_and_order() {
        let cmd = CommandLine::parse("ENC --audio 1,2 --audio 3 --crop 0:0:0:0");
        let audio_args: Vec<&Arg> = cmd.args().iter().filter(|a| a.name == "--audio").collect();
        assert_eq!(audio_args.len(), 2);
        assert_eq!(audio_args[0].first_value(), "1,2");
        assert_eq!(audio_args[1].first_value(), "3");
    }

    #[test]
    fn test_negative_number_is_a_value() {
        let cmd = CommandLine::parse("ENC --gain -2.5 --out x");
        assert_eq!(cmd.find("--gain").unwrap().first_value(), "-2.5");
    }

    #[test]
    fn test_display_round_trip() {
        let line = r#"HandBrakeCLI --input "my film.mp4" --output out.mkv --quality 20"#;
        let cmd = CommandLine::parse(line);
        assert_eq!(cmd.to_string(), line);
    }

    #[test]
    fn test_display_quotes_whitespace_values() {
        let mut cmd = CommandLine::parse("ENC --output a.mkv");
        cmd.set_values("--output", vec![Word::bare("my out.mkv")]);
        assert_eq!(cmd.to_string(), "ENC --output \"my out.mkv\"");
    }

    #[test]
    fn test_set_or_insert_after() {
        let mut cmd = CommandLine::parse("ENC --audio 1,2 --quality 20");
        cmd.set_or_insert_after("--aencoder", "--audio", vec![Word::bare("copy,av_aac")]);
        assert_eq!(
            cmd.to_string(),
            "ENC --audio 1,2 --aencoder copy,av_aac --quality 20"
        );

        // 已存在時取代而不重複插入
        cmd.set_or_insert_after("--aencoder", "--audio", vec![Word::bare("copy,copy")]);
        assert_eq!(
            cmd.to_string(),
            "ENC --audio 1,2 --aencoder copy,copy --quality 20"
        );
    }

    #[test]
    fn test_remove_flag() {
        let mut cmd = CommandLine::parse("ENC --ab 128,128 --mixdown 5point1");
        assert!(cmd.remove("--ab"));
        assert!(!cmd.remove("--ab"));
        assert_eq!(cmd.to_string(), "ENC --mixdown 5point1");
    }

    #[test]
    fn test_remove_stray_values_after() {
        let mut cmd = CommandLine::parse("ENC --input a.mp4 --output b.mkv --opt x a.mp4");
        let removed = cmd.remove_stray_values_after("--output", "a.mp4");
        assert_eq!(removed, 1);
        // --output 之前的 --input 值不受影響
        assert_eq!(cmd.to_string(), "ENC --input a.mp4 --output b.mkv --opt x");
    }
}
