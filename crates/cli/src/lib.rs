use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_annotator_core::{EditorConfig, Session};
use pdf_engine::{default_engine, OpenSource, PdfEngine};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

mod script;

pub use script::{Action, Script};

#[derive(Debug, Parser)]
#[command(name = "pdf-annotator")]
#[command(about = "Annotate PDF pages and flatten them into a new PDF")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render one page composite to PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        zoom: Option<f32>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Replay a JSON action script and export the flattened PDF.
    Annotate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        script: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let format = fmt::format().with_target(true).compact();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,pdf_annotator=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Render { file, page, zoom, output, config } => {
            run_render(&file, page, zoom, output.as_deref(), config.as_deref())
        }
        Commands::Annotate { file, script, output, config } => {
            run_annotate(&file, &script, output.as_deref(), config.as_deref())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let first_page_size_pt = if page_count > 0 {
        let size = engine.page_size(engine.get_page(handle, 0)?)?;
        Some(PageSizeOutput { width: size.width_pt, height: size.height_pt })
    } else {
        None
    };

    let payload = InfoOutput { path: file.display().to_string(), page_count, first_page_size_pt };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(handle)?;

    Ok(())
}

fn run_render(
    file: &Path,
    page: u32,
    zoom: Option<f32>,
    output: Option<&Path>,
    config: Option<&Path>,
) -> Result<()> {
    ensure_pdf_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let mut session = open_session(file, config)?;
    if page > session.page_count() {
        anyhow::bail!("page {page} out of range (page_count={})", session.page_count());
    }
    if let Some(zoom) = zoom {
        session.set_zoom(zoom);
    }

    let image = session
        .page_image(page)
        .context("failed to rasterize page overlay")?
        .with_context(|| format!("page {page} did not finish rendering"))?;

    let output =
        output.map(ToOwned::to_owned).unwrap_or_else(|| default_render_output(file, page));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

fn run_annotate(
    file: &Path,
    script: &Path,
    output: Option<&Path>,
    config: Option<&Path>,
) -> Result<()> {
    ensure_pdf_exists(file)?;

    let script = Script::from_file(script)?;
    let mut session = open_session(file, config)?;
    script.replay(&mut session)?;

    let artifact = session.export()?;
    let output = match output {
        Some(path) => path.to_owned(),
        None => file.with_file_name(&artifact.file_name),
    };

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&output, &artifact.bytes)
        .with_context(|| format!("failed to write PDF to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

fn open_session(file: &Path, config: Option<&Path>) -> Result<Session> {
    let config = match config {
        Some(path) => EditorConfig::from_json_file(path).context("failed to load config")?,
        None => EditorConfig::default(),
    };
    let fonts = config.load_fonts().context("failed to load fonts")?;

    let mut session = Session::with_default_engine(config).with_fonts(fonts);
    session.load_file(file).context("failed to open PDF")?;
    Ok(session)
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_render_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}
