//! Link preview extraction.
//!
//! - Body decoding with charset and parse fallbacks (`decode`)
//! - Open Graph / HTML / Twitter tag resolution into a record (`extract`)
//! - `og:type` and MIME classification tables (`kind`)
//! - Fetch-then-extract orchestration with cancellation (`preview`)

pub mod decode;
pub mod extract;
pub mod kind;
pub mod preview;
pub mod record;

pub use extract::{ResponseMeta, extract};
pub use preview::{PreviewError, PreviewOptions, Previewer};
pub use record::{ImageSize, MetadataRecord, TwitterCard};
