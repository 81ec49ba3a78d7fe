use env_logger::Env;

/// 初始化日誌系統
///
/// 預設只輸出 warn 以上，-v 提升為 info，--debug 提升為 debug。
/// RUST_LOG 環境變數仍可覆寫。
pub fn init(verbose: bool, debug: bool) {
    let default_level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();
}
