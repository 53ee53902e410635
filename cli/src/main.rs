use clap::{Parser, ValueEnum};
use pdf_rebuild::{AnchorStrategy, Placement, Rebuilder};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    /// First line within tolerance wins
    FirstFit,
    /// Closest line within tolerance wins
    NearestFit,
}

impl From<Strategy> for AnchorStrategy {
    fn from(s: Strategy) -> Self {
        match s {
            Strategy::FirstFit => AnchorStrategy::FirstFit,
            Strategy::NearestFit => AnchorStrategy::NearestFit,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PlacementArg {
    /// Keep each line at its original baseline
    Preserve,
    /// Flip baselines vertically (height - y)
    Mirror,
}

impl From<PlacementArg> for Placement {
    fn from(p: PlacementArg) -> Self {
        match p {
            PlacementArg::Preserve => Placement::Preserve,
            PlacementArg::Mirror => Placement::Mirror,
        }
    }
}

#[derive(Parser)]
#[command(name = "pdf-rebuild")]
#[command(about = "Rebuild a PDF's text as reconstructed lines in a single font", long_about = None)]
struct Args {
    /// PDF file to rebuild
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// TrueType/OpenType font to embed
    #[arg(long, value_name = "TTF", conflicts_with = "font_base64")]
    font: Option<PathBuf>,

    /// File holding a base64-encoded font to embed
    #[arg(long, value_name = "FILE")]
    font_base64: Option<PathBuf>,

    /// Where to write the rebuilt PDF (default: rebuilt-<FILE> next to the input)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Vertical distance in points within which text shares a line
    #[arg(long, default_value_t = pdf_rebuild::DEFAULT_TOLERANCE)]
    tolerance: f64,

    #[arg(long, value_enum, default_value_t = Strategy::FirstFit)]
    strategy: Strategy,

    #[arg(long, value_enum, default_value_t = PlacementArg::Preserve)]
    placement: PlacementArg,

    /// Password for encrypted PDFs
    #[arg(short, long)]
    password: Option<String>,

    /// Print the reconstructed lines instead of writing a PDF
    #[arg(long)]
    lines: bool,
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", msg);
    std::process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut builder = Rebuilder::builder()
        .tolerance(args.tolerance)
        .strategy(args.strategy.into())
        .placement(args.placement.into());
    if let Some(password) = &args.password {
        builder = builder.password(password);
    }
    let rebuilder = builder.build();

    let pdf = std::fs::read(&args.file)
        .unwrap_or_else(|e| fail(format!("reading {:?}: {}", args.file, e)));

    if args.lines {
        let pages = rebuilder
            .reconstruct(&pdf)
            .unwrap_or_else(|e| fail(format!("reading lines from {:?}: {}", args.file, e)));
        for page in pages {
            println!("--- page {} ({} x {}) ---", page.number, page.width, page.height);
            for line in &page.lines {
                println!(
                    "{:>8.2} {:>8.2} {:>5.1}  {}",
                    line.x(),
                    line.anchor_y,
                    line.representative_font_size(),
                    line.combined_text()
                );
            }
        }
        return;
    }

    let name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let result = match (&args.font, &args.font_base64) {
        (Some(path), _) => {
            let font = std::fs::read(path)
                .unwrap_or_else(|e| fail(format!("reading font {:?}: {}", path, e)));
            rebuilder.rebuild(&name, &pdf, font)
        }
        (None, Some(path)) => {
            let encoded = std::fs::read_to_string(path)
                .unwrap_or_else(|e| fail(format!("reading font {:?}: {}", path, e)));
            rebuilder.rebuild_base64(&name, &pdf, &encoded)
        }
        (None, None) => fail("one of --font or --font-base64 is required"),
    };

    let rebuilt = result.unwrap_or_else(|e| fail(format!("rebuilding {:?}: {}", args.file, e)));

    let out_path = args.output.unwrap_or_else(|| args.file.with_file_name(&rebuilt.name));
    if let Err(e) = std::fs::write(&out_path, &rebuilt.bytes) {
        fail(format!("writing {:?}: {}", out_path, e));
    }
    eprintln!("Wrote {} bytes to {:?}", rebuilt.len(), out_path);
}
