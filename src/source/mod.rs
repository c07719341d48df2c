pub mod encoding;
pub mod reader;
pub mod timestamp;

pub use encoding::{DecodeError, TextEncoding};
pub use reader::{FileReader, RawFile, ReadSummary, ReaderError};
pub use timestamp::{parse_event_time, TimestampError};
