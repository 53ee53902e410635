use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tracing::{debug, info};

use crate::decode::SourceDocument;
use crate::embed::EmbeddedFont;
use crate::error::RebuildError;
use crate::lines::{AnchorStrategy, DEFAULT_TOLERANCE, LineReconstructor};
use crate::output::{OutputDocument, Placement, Rgb};
use crate::types::{PageLines, RebuiltFile};

/// A flag another thread can raise to stop a rebuild between pages.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Builder for configuring a [`Rebuilder`].
///
/// # Examples
///
/// ```no_run
/// use pdf_rebuild::{AnchorStrategy, Placement, Rebuilder};
///
/// let rebuilder = Rebuilder::builder()
///     .tolerance(3.0)
///     .strategy(AnchorStrategy::NearestFit)
///     .placement(Placement::Preserve)
///     .password("secret")
///     .build();
/// let pdf = std::fs::read("scan.pdf")?;
/// let font = std::fs::read("DejaVuSans.ttf")?;
/// let rebuilt = rebuilder.rebuild("scan.pdf", &pdf, font)?;
/// assert_eq!(rebuilt.name, "rebuilt-scan.pdf");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct RebuilderBuilder {
    tolerance: f64,
    strategy: AnchorStrategy,
    placement: Placement,
    color: Rgb,
    password: Option<String>,
    cancel: Option<CancelFlag>,
}

impl Default for RebuilderBuilder {
    fn default() -> Self {
        RebuilderBuilder {
            tolerance: DEFAULT_TOLERANCE,
            strategy: AnchorStrategy::default(),
            placement: Placement::default(),
            color: Rgb::default(),
            password: None,
            cancel: None,
        }
    }
}

impl RebuilderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vertical distance, in points, within which runs share a line.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn strategy(mut self, strategy: AnchorStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    /// Set the password for encrypted PDFs.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn build(self) -> Rebuilder {
        Rebuilder {
            reconstructor: LineReconstructor::new(self.tolerance, self.strategy),
            placement: self.placement,
            color: self.color,
            password: self.password,
            cancel: self.cancel,
        }
    }
}

/// Rebuilds PDFs by reconstructing their text lines and redrawing them
/// with a single embedded font.
#[derive(Debug, Clone, Default)]
pub struct Rebuilder {
    reconstructor: LineReconstructor,
    placement: Placement,
    color: Rgb,
    password: Option<String>,
    cancel: Option<CancelFlag>,
}

impl Rebuilder {
    pub fn builder() -> RebuilderBuilder {
        RebuilderBuilder::new()
    }

    fn check_cancelled(&self, page: u32) -> Result<(), RebuildError> {
        match &self.cancel {
            Some(flag) if flag.is_cancelled() => {
                info!("rebuild cancelled before page {}", page);
                Err(RebuildError::Cancelled { page })
            }
            _ => Ok(()),
        }
    }

    fn load(&self, pdf: &[u8]) -> Result<SourceDocument, RebuildError> {
        Ok(SourceDocument::load(pdf, self.password.as_deref())?)
    }

    /// Rebuild `pdf`, drawing its text with the font program `font`.
    ///
    /// The result is named `rebuilt-<name>`. Nothing is returned unless
    /// every page succeeds.
    pub fn rebuild(
        &self,
        name: &str,
        pdf: &[u8],
        font: Vec<u8>,
    ) -> Result<RebuiltFile, RebuildError> {
        let source = self.load(pdf)?;
        let font = EmbeddedFont::from_bytes(font)?;
        self.rebuild_with(name, &source, font)
    }

    /// Like [`Rebuilder::rebuild`], with the font program given as base64.
    pub fn rebuild_base64(
        &self,
        name: &str,
        pdf: &[u8],
        font_base64: &str,
    ) -> Result<RebuiltFile, RebuildError> {
        let source = self.load(pdf)?;
        let font = EmbeddedFont::from_base64(font_base64)?;
        self.rebuild_with(name, &source, font)
    }

    /// Rebuild the PDF at `path`, naming the result after its file name.
    pub fn rebuild_path<P: AsRef<Path>, F: AsRef<Path>>(
        &self,
        path: P,
        font_path: F,
    ) -> Result<RebuiltFile, RebuildError> {
        let path = path.as_ref();
        let pdf = std::fs::read(path)?;
        let font = std::fs::read(font_path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.rebuild(&name, &pdf, font)
    }

    fn rebuild_with(
        &self,
        name: &str,
        source: &SourceDocument,
        font: EmbeddedFont,
    ) -> Result<RebuiltFile, RebuildError> {
        info!(
            "rebuilding {} ({} pages) with font {}",
            name,
            source.page_count(),
            font.name()
        );
        let mut output = OutputDocument::new(font, self.placement, self.color);

        for (number, page_id) in source.page_ids() {
            self.check_cancelled(number)?;
            let page = source.decode_page(number, page_id)?;
            let lines = self.reconstructor.reconstruct(page.runs());
            output.add_page(page.width, page.height, &lines)?;
        }

        let pages = output.page_count();
        let modified = Utc::now();
        let bytes = output.save(modified)?;
        info!("rebuilt {}: {} pages, {} bytes", name, pages, bytes.len());
        Ok(RebuiltFile::new(name, bytes, modified))
    }

    /// Decode `pdf` and reconstruct each page's lines without re-emitting.
    pub fn reconstruct(&self, pdf: &[u8]) -> Result<Vec<PageLines>, RebuildError> {
        let source = self.load(pdf)?;
        let mut pages = Vec::with_capacity(source.page_count());

        for (number, page_id) in source.page_ids() {
            self.check_cancelled(number)?;
            let page = source.decode_page(number, page_id)?;
            let lines = self.reconstructor.reconstruct(page.runs());
            debug!("page {}: {} lines", number, lines.len());
            pages.push(PageLines {
                number,
                width: page.width,
                height: page.height,
                lines,
            });
        }
        Ok(pages)
    }
}

/// Rebuild `pdf` with default settings.
///
/// Equivalent to `Rebuilder::default().rebuild(name, pdf, font)`.
pub fn rebuild(name: &str, pdf: &[u8], font: Vec<u8>) -> Result<RebuiltFile, RebuildError> {
    Rebuilder::default().rebuild(name, pdf, font)
}

/// Rebuild `pdf` with default settings and a base64-encoded font program.
pub fn rebuild_base64(
    name: &str,
    pdf: &[u8],
    font_base64: &str,
) -> Result<RebuiltFile, RebuildError> {
    Rebuilder::default().rebuild_base64(name, pdf, font_base64)
}

/// Reconstruct the lines of every page of `pdf` with default settings.
pub fn reconstruct(pdf: &[u8]) -> Result<Vec<PageLines>, RebuildError> {
    Rebuilder::default().reconstruct(pdf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());
        flag.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn builder_normalises_tolerance() {
        let rebuilder = Rebuilder::builder()
            .tolerance(-4.0)
            .strategy(AnchorStrategy::NearestFit)
            .build();
        assert_eq!(rebuilder.reconstructor.tolerance(), 4.0);
        assert_eq!(rebuilder.reconstructor.strategy(), AnchorStrategy::NearestFit);
    }

    #[test]
    fn corrupt_input_fails_before_the_font_is_read() {
        let err = rebuild("x.pdf", b"not a pdf at all", b"not a font".to_vec()).unwrap_err();
        assert!(matches!(err, RebuildError::Decode(_)));
    }
}
