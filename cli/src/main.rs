//! ocrflow CLI - PDF page surgery and OCR dispatch tool

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use ocrflow::provider::{
    AzureDocumentIntelligenceProvider, GoogleDocumentAiProvider, OcrProvider, TesseractProvider,
};
use ocrflow::{
    load_document, merge_files, PageSelection, ProviderResult, RasterFormat, RasterOptions,
};

#[derive(Parser)]
#[command(name = "ocrflow")]
#[command(version)]
#[command(about = "Split, merge, rasterize, and OCR PDF documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show document information
    Info {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Extract a page selection into a new PDF
    Split {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Page selection (e.g., "1-10", "1,3,5-7")
        #[arg(short, long)]
        pages: String,

        /// Output file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Concatenate PDFs into a single document
    Merge {
        /// Input PDF files, in order
        #[arg(value_name = "FILES", required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,

        /// Output file
        #[arg(short, long, value_name = "FILE", default_value = "merged.pdf")]
        output: PathBuf,
    },

    /// Render pages to PNG images
    Rasterize {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Page selection (e.g., "1-10", "1,3,5")
        #[arg(short, long, default_value = "all")]
        pages: String,

        /// Render resolution in DPI
        #[arg(long, default_value = "100")]
        dpi: u32,

        /// Cap on the longest image edge in pixels
        #[arg(long)]
        max_edge: Option<u32>,

        /// Output grayscale images
        #[arg(long)]
        gray: bool,

        /// Output directory
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,
    },

    /// Run OCR and write the full results as JSON
    Ocr {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Page selection (e.g., "1-10", "1,3,5")
        #[arg(short, long, default_value = "all")]
        pages: String,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,

        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// Run OCR and print the plain page text
    Text {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Page selection (e.g., "1-10", "1,3,5")
        #[arg(short, long, default_value = "all")]
        pages: String,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[command(flatten)]
        provider: ProviderArgs,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    /// Google Document AI
    Google,
    /// Azure Document Intelligence
    Azure,
    /// Local tesseract executable
    Tesseract,
}

#[derive(Args, Clone)]
struct ProviderArgs {
    /// OCR provider backend
    #[arg(long, value_enum, default_value = "tesseract")]
    provider: ProviderKind,

    /// Google Cloud project ID
    #[arg(long, env = "OCRFLOW_GCP_PROJECT")]
    gcp_project: Option<String>,

    /// Document AI processor ID
    #[arg(long, env = "OCRFLOW_GCP_PROCESSOR")]
    gcp_processor: Option<String>,

    /// Document AI processor location
    #[arg(long, default_value = "us")]
    gcp_location: String,

    /// Tesseract language model
    #[arg(long, default_value = "eng")]
    lang: String,

    /// Render resolution for providers that rasterize locally
    #[arg(long, default_value = "200")]
    ocr_dpi: u32,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Info { input } => cmd_info(&input),
        Commands::Split {
            input,
            pages,
            output,
        } => cmd_split(&input, &pages, output.as_deref()),
        Commands::Merge { inputs, output } => cmd_merge(&inputs, &output),
        Commands::Rasterize {
            input,
            pages,
            dpi,
            max_edge,
            gray,
            output,
        } => cmd_rasterize(&input, &pages, dpi, max_edge, gray, &output),
        Commands::Ocr {
            input,
            pages,
            output,
            compact,
            provider,
        } => cmd_ocr(&input, &pages, output.as_deref(), compact, &provider),
        Commands::Text {
            input,
            pages,
            output,
            provider,
        } => cmd_text(&input, &pages, output.as_deref(), &provider),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn parse_selection(pages: &str) -> Result<PageSelection, Box<dyn std::error::Error>> {
    PageSelection::parse(pages)
        .map_err(|e| format!("Invalid page selection: {}", e).into())
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let format = ocrflow::sniff_path(input)?;
    let doc = load_document(input)?;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: PDF {}", "Format".bold(), format.version);
    println!("{}: {}", "Pages".bold(), doc.page_count());
    println!("{}: {} bytes", "Size".bold(), doc.bytes().len());
    println!("{}: {}", "MD5".bold(), doc.document_hash());

    println!();
    println!("{}", "Page Dimensions".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for page in 1..=doc.page_count() {
        let (w, h) = doc.page_dimensions(page)?;
        println!("{}: {:.1} x {:.1} pt", format!("Page {page}").bold(), w, h);
    }

    Ok(())
}

fn cmd_split(
    input: &Path,
    pages: &str,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let selection = parse_selection(pages)?;
    let doc = load_document(input)?;
    let excerpt = doc.split(&selection)?;

    let path = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let stem = input.file_stem().unwrap_or_default().to_string_lossy();
            PathBuf::from(format!("{}_split.pdf", stem))
        }
    };

    excerpt.write_to_path(&path)?;
    println!(
        "{} {} ({} pages)",
        "Saved to".green(),
        path.display(),
        excerpt.page_count()
    );

    Ok(())
}

fn cmd_merge(inputs: &[PathBuf], output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let merged = merge_files(inputs)?;
    merged.write_to_path(output)?;
    println!(
        "{} {} ({} inputs, {} pages)",
        "Saved to".green(),
        output.display(),
        inputs.len(),
        merged.page_count()
    );

    Ok(())
}

fn cmd_rasterize(
    input: &Path,
    pages: &str,
    dpi: u32,
    max_edge: Option<u32>,
    gray: bool,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let selection = parse_selection(pages)?;
    let doc = load_document(input)?;
    let page_numbers = selection.resolve(doc.page_count())?;

    let mut options = RasterOptions::new().with_dpi(dpi);
    if gray {
        options = options.with_format(RasterFormat::Gray);
    }
    if let Some(edge) = max_edge {
        options = options.with_max_edge(edge);
    }

    fs::create_dir_all(output)?;
    let stem = input.file_stem().unwrap_or_default().to_string_lossy().to_string();

    let pb = ProgressBar::new(page_numbers.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    for &page in &page_numbers {
        pb.set_message(format!("page {}", page));
        let bytes = ocrflow::rasterize_page(&doc, page, &options)?;
        let path = output.join(format!("{}_page_{:04}.png", stem, page));
        fs::write(&path, &bytes)?;
        pb.inc(1);
    }

    pb.finish_with_message("Done!");
    println!(
        "{} {} pages to {}",
        "Rendered".green().bold(),
        page_numbers.len(),
        output.display()
    );

    Ok(())
}

fn cmd_ocr(
    input: &Path,
    pages: &str,
    output: Option<&Path>,
    compact: bool,
    args: &ProviderArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = run_provider(input, pages, args)?;
    let json = if compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };

    if let Some(path) = output {
        fs::write(path, &json)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

fn cmd_text(
    input: &Path,
    pages: &str,
    output: Option<&Path>,
    args: &ProviderArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = run_provider(input, pages, args)?;
    let text = result.full_text();

    if let Some(path) = output {
        fs::write(path, &text)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", text);
    }

    Ok(())
}

fn run_provider(
    input: &Path,
    pages: &str,
    args: &ProviderArgs,
) -> Result<ProviderResult, Box<dyn std::error::Error>> {
    let selection = parse_selection(pages)?;
    let doc = load_document(input)?;

    println!(
        "{} '{}' ({} pages)",
        "Processing".cyan(),
        doc.name(),
        doc.page_count()
    );

    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        match args.provider {
            ProviderKind::Google => {
                let project = args
                    .gcp_project
                    .clone()
                    .ok_or("--gcp-project is required for the google provider")?;
                let processor = args
                    .gcp_processor
                    .clone()
                    .ok_or("--gcp-processor is required for the google provider")?;

                let provider = GoogleDocumentAiProvider::from_env(project, processor)?
                    .with_location(args.gcp_location.clone());
                Ok(provider.process_document(&doc, &selection).await?)
            }
            ProviderKind::Azure => {
                let provider = AzureDocumentIntelligenceProvider::from_env()?;
                Ok(provider.process_document(&doc, &selection).await?)
            }
            ProviderKind::Tesseract => {
                let provider = TesseractProvider::new()
                    .with_language(args.lang.clone())
                    .with_raster_options(RasterOptions::new().with_dpi(args.ocr_dpi));
                Ok(provider.process_document(&doc, &selection).await?)
            }
        }
    })
}
