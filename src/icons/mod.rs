pub mod extract;
pub mod probe;
pub mod score;

pub use extract::{extract_best_icon, AppImageUnpacker, ExtractedIcon, Unpacker};
pub use probe::{IconFormat, ImageInfo, ImageProbe};
pub use score::{IconCandidate, IconScore};
