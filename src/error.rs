use thiserror::Error;

/// The source bytes could not be turned into pages of positioned text.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("page {page} content could not be read: {reason}")]
    Content { page: u32, reason: String },
}

/// The supplied font program could not be embedded.
#[derive(Debug, Error)]
pub enum FontEmbedError {
    #[error("font is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("font program could not be parsed: {0}")]
    Parse(#[from] ttf_parser::FaceParsingError),
}

/// Any failure of a rebuild. No partial output accompanies an error.
#[derive(Debug, Error)]
pub enum RebuildError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("font embed error: {0}")]
    FontEmbed(#[from] FontEmbedError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rebuild cancelled before page {page}")]
    Cancelled { page: u32 },
}

impl From<lopdf::Error> for RebuildError {
    fn from(e: lopdf::Error) -> Self {
        RebuildError::Decode(DecodeError::Pdf(e))
    }
}
