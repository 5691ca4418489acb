pub mod archive;
pub mod codec;
pub mod error;
pub mod flat;
pub mod header;
pub mod record;
pub mod segment;

pub use archive::{ArchiveContainer, ArchiveTrailer, FileEntry};
pub use codec::{Codec, ZlibCodec};
pub use error::{CodecError, FormatError, IntegrityError, Result, XgError};
pub use flat::FlatFile;
pub use header::RichGameHeader;
pub use record::{EntryKind, GameRecord, RecordStream};
pub use segment::{game_records, Segment, SegmentRole, SegmentWalker};
