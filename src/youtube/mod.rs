pub mod utils;

pub use utils::{build_watch_url, is_youtube_url, parse_id, validate_url};
