//! Data model and change-tracking core shared by the tracker and delivery crates.

pub mod defs;
pub mod detector;
pub mod digest;
pub mod normalize;
pub mod state;

pub use defs::{Classification, ClassifiedItem, Item, Priority, RawRecord, SeenRecord, SourceKind, TrackingStore};
pub use detector::{classify, ChangeDetector};
pub use digest::{CategorySection, CommentAlert, Digest, DigestAssembler, DigestEntry, PriorityRules};
pub use normalize::{normalize, normalize_batch, BatchResult, NormalizationError};
pub use state::{cleanup, window_days, StateError, StateStore, MAX_WINDOW_DAYS};
