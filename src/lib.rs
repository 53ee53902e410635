//! PDF line reconstruction and re-emission
//!
//! This library decodes the positioned text of each page of a PDF, groups it
//! into visual lines by baseline, and writes a new PDF that redraws those
//! lines with a single embedded font.

mod decode;
mod embed;
mod error;
mod fonts;
mod lines;
mod output;
mod processor;
mod rebuild;
mod types;
mod utils;

pub use error::{DecodeError, FontEmbedError, RebuildError};

pub use decode::SourceDocument;
pub use embed::{EmbeddedFont, FontProgramKind};
pub use lines::{
    AnchorStrategy, DEFAULT_TOLERANCE, FALLBACK_FONT_SIZE, Line, LineReconstructor,
    reconstruct_lines,
};
pub use output::{Placement, Rgb};
pub use rebuild::{CancelFlag, Rebuilder, RebuilderBuilder, rebuild, rebuild_base64, reconstruct};

pub use types::{
    DecodedPage, MediaBox, PDF_CONTENT_TYPE, PageLines, REBUILT_PREFIX, RawTextItem, RebuiltFile,
    TextRun,
};

pub type Result<T, E = RebuildError> = std::result::Result<T, E>;
