pub mod file_date;
pub mod file_size;
pub mod mediainfo;
pub mod path_validator;
pub mod video_scanner;

pub use file_date::copy_modification_time;
pub use file_size::FileSize;
pub use mediainfo::{AudioTrack, analyze_audio_tracks, atmos_track_indices};
pub use path_validator::{ensure_directory_exists, validate_input_exists};
pub use video_scanner::{FormatAssignment, VideoFileInfo, classify};
