//! Command line front end

mod output;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::warn;

use crate::batch::{collect_images, BatchOptions, BatchRunner, CancelFlag, FileHandling};
use crate::naming::{generate_filename, sample_mapping, Template, DEFAULT_TEMPLATE};
use crate::report::{compile, write_csv, ReportFormat, ZipBundle, REPORT_FILE_NAME};
use crate::vision::{GeminiClient, GeminiConfig};

/// Extract receipt/invoice data with Gemini, compile it into a CSV report
/// and rename the images.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Receipt images, or folders containing them (default: current folder)
    pub paths: Vec<PathBuf>,
    /// What to do with each source file after extraction
    #[arg(short, long, value_enum, default_value_t = FileHandling::Copy)]
    pub mode: FileHandling,
    /// Do not archive source files into an 'Original' folder
    #[arg(long)]
    pub no_archive: bool,
    /// Filename template. Tags: {Date} {Vendor Name} {Price Amount}
    /// {Item Category} {Item Name} {Receipt_Invoice_No}
    #[arg(short, long, default_value = DEFAULT_TEMPLATE)]
    pub template: String,
    /// Report format
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Csv)]
    pub format: ReportFormat,
    /// Folder for the report (default: the input folder)
    #[arg(long)]
    pub report_dir: Option<PathBuf>,
    /// Also write every renamed image into this ZIP file
    #[arg(long)]
    pub zip: Option<PathBuf>,
    /// Gemini model (overrides GEMINI_MODEL)
    #[arg(long)]
    pub model: Option<String>,
    /// Open the report folder when done
    #[arg(long)]
    pub open: bool,
    /// Print the filename the template gives for a sample receipt and exit
    #[arg(long)]
    pub preview: bool,
    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            handling: self.mode,
            archive_originals: !self.no_archive,
            template: self.template.clone(),
        }
    }

    /// Whether the template names any output: renamed files or ZIP entries
    fn uses_template(&self) -> bool {
        self.mode != FileHandling::Keep || self.zip.is_some()
    }

    fn inputs(&self) -> Result<Vec<PathBuf>> {
        if self.paths.is_empty() {
            Ok(vec![std::env::current_dir().context("Failed to read current folder")?])
        } else {
            Ok(self.paths.clone())
        }
    }
}

/// Folder the report goes to: explicit, else the first input folder, else
/// the folder of the first file
fn report_dir(explicit: Option<&Path>, inputs: &[PathBuf], files: &[PathBuf]) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    if let Some(dir) = inputs.iter().find(|p| p.is_dir()) {
        return dir.clone();
    }
    files
        .first()
        .and_then(|f| f.parent())
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Run the application
pub async fn run(args: Args) -> Result<()> {
    if args.preview {
        println!("{}", generate_filename(&sample_mapping(), ".jpg", &args.template));
        return Ok(());
    }

    if args.uses_template() {
        if let Err(e) = Template::parse(&args.template) {
            warn!(error = %e, "Template is malformed; files will be named Error_Renaming");
        }
    }

    let inputs = args.inputs()?;
    for input in &inputs {
        if !input.exists() {
            bail!("The specified path does not exist: {}", input.display());
        }
    }
    let files = collect_images(&inputs).context("Failed to list input folder")?;
    if files.is_empty() {
        bail!("No image files found.");
    }

    let mut config = GeminiConfig::from_env()?;
    if let Some(model) = &args.model {
        config = config.with_model(model.as_str());
    }
    let client = GeminiClient::new(config).context("Failed to create Gemini client")?;

    let cancel = CancelFlag::default();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if cancel.cancel() {
                    eprintln!("Interrupted.");
                    std::process::exit(130);
                }
                eprintln!("Stopping after the current file... (Ctrl-C again to quit now)");
            }
        });
    }

    let mut runner = BatchRunner::new(&client, args.batch_options()).with_cancel(cancel);
    if let Some(zip) = &args.zip {
        runner = runner.with_bundle(ZipBundle::create(zip)?);
    }

    println!("Found {} images. Processing...", files.len());
    let summary = runner.run(&files, output::print_result).await;

    let bundle = match runner.take_bundle() {
        Some(bundle) => Some(bundle.finish()?),
        None => None,
    };

    let save_dir = report_dir(args.report_dir.as_deref(), &inputs, &files);
    let report = match args.format {
        ReportFormat::Csv => {
            let path = save_dir.join(REPORT_FILE_NAME);
            let appended = write_csv(&path, &compile(&summary.results))?;
            Some((path, appended))
        }
        ReportFormat::Disabled => None,
    };

    output::print_summary(&summary, &args.batch_options(), report.as_ref(), bundle.as_deref());

    if args.open {
        if let Err(e) = open::that(&save_dir) {
            warn!(path = ?save_dir, error = %e, "Failed to open folder");
        }
    }

    Ok(())
}
