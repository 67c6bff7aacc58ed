//! htmltopdf – command-line front end for the converter pipeline.
//!
//! Usage:
//!   htmltopdf render --body body.html [--header h.html] [--footer f.html] [-o out.pdf]
//!   htmltopdf render --body body.html --image [--convert-arg "-background white"]
//!   htmltopdf check
//!   htmltopdf sweep --days 7
//!   htmltopdf demo --kind image
//!
//! Converter locations come from `--config` (TOML) and `HTMLTOPDF_*`
//! environment variables; unset binaries are looked up on `PATH`.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use htmltopdf::binary;
use htmltopdf::delivery::{self, DirectorySink, WriterSink};
use htmltopdf::retention;
use htmltopdf::templates;
use htmltopdf::{Config, Document, DocumentSettings, Engine, Error, RegionKind, Result};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Converter configuration file (TOML).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Convert a header/body/footer document.
    Render(RenderArgs),
    /// Validate the converter binaries.
    Check,
    /// Delete work-directory files older than the given number of days.
    Sweep {
        #[arg(short, long)]
        days: u32,
        /// Directory to sweep (default: the configured work directory).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Convert the built-in test document.
    Demo {
        #[arg(short, long, value_enum, default_value_t = DemoKind::Pdf)]
        kind: DemoKind,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum DemoKind {
    Pdf,
    Image,
}

#[derive(clap::Args, Debug)]
struct RenderArgs {
    /// Body HTML file.
    #[arg(long)]
    body: PathBuf,
    /// Header HTML file.
    #[arg(long)]
    header: Option<PathBuf>,
    /// Footer HTML file.
    #[arg(long)]
    footer: Option<PathBuf>,
    #[arg(long = "body-css")]
    body_css: Vec<PathBuf>,
    #[arg(long = "header-css")]
    header_css: Vec<PathBuf>,
    #[arg(long = "footer-css")]
    footer_css: Vec<PathBuf>,
    /// Document settings as a JSON file.
    #[arg(short, long)]
    settings: Option<PathBuf>,
    /// Copy the result here; otherwise its work-directory path is printed.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Rasterize to JPEG instead of returning the PDF.
    #[arg(long)]
    image: bool,
    /// Keep page margins when rasterizing.
    #[arg(long)]
    no_trim: bool,
    /// Extra raster converter parameter, e.g. "-background white".
    #[arg(long = "convert-arg", allow_hyphen_values = true)]
    convert_args: Vec<String>,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        log::debug!("{}", e.diagnostic());
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    binary::fill_discovered(&mut config);

    match cli.command {
        Cmd::Render(args) => render(config, args),
        Cmd::Check => check(&config),
        Cmd::Sweep { days, dir } => {
            let dir = dir.unwrap_or_else(|| config.work_dir.clone());
            let removed = retention::sweep(&dir, days)?;
            for path in &removed {
                println!("{}", path.display());
            }
            eprintln!("Removed {} file(s)", removed.len());
            Ok(())
        }
        Cmd::Demo { kind, output } => demo(config, kind, output.as_deref()),
    }
}

fn load_settings(path: Option<&Path>) -> Result<DocumentSettings> {
    match path {
        Some(p) => {
            if !p.is_file() {
                return Err(Error::FileNotFound(p.to_path_buf()));
            }
            let json = fs::read_to_string(p)?;
            DocumentSettings::from_json(&json)
                .map_err(|e| Error::Config(format!("{}: {e}", p.display())))
        }
        None => Ok(DocumentSettings::default()),
    }
}

fn render(config: Config, args: RenderArgs) -> Result<()> {
    fs::create_dir_all(&config.work_dir)?;
    let settings = load_settings(args.settings.as_deref())?;
    let mut doc = Engine::new(config).document(settings);

    let regions = [
        (RegionKind::Header, args.header.as_ref(), &args.header_css),
        (RegionKind::Body, Some(&args.body), &args.body_css),
        (RegionKind::Footer, args.footer.as_ref(), &args.footer_css),
    ];
    for (kind, html, css_files) in regions {
        let region = doc.region_mut(kind);
        if let Some(path) = html {
            region.set_content_from_file(path)?;
        }
        for css in css_files {
            region.add_css_file(css)?;
        }
    }

    if args.image {
        export_images(&mut doc, &args.convert_args, !args.no_trim, args.output.as_deref())
    } else {
        export_pdf(&mut doc, args.output.as_deref())
    }
}

fn export_pdf(doc: &mut Document, output: Option<&Path>) -> Result<()> {
    match output {
        Some(out) => {
            let file = File::create(out)?;
            let mut sink = WriterSink::new(BufWriter::new(file));
            doc.download(&mut sink, true)?;
            println!("{}", out.display());
        }
        None => println!("{}", doc.create_pdf()?.display()),
    }
    Ok(())
}

fn export_images(
    doc: &mut Document,
    convert_args: &[String],
    trim: bool,
    output: Option<&Path>,
) -> Result<()> {
    let images = doc.create_image(true, convert_args, trim)?;

    match output {
        // a single image goes to the named file, page images into the directory
        Some(out) if images.is_single() => {
            let file = File::create(out)?;
            let mut sink = WriterSink::new(BufWriter::new(file));
            doc.deliver_file(&mut sink, &images.paths()[0], true)?;
            println!("{}", out.display());
        }
        Some(out) => {
            fs::create_dir_all(out)?;
            let mut sink = DirectorySink::new(out);
            for page in images.paths() {
                let name = page
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                delivery::deliver(&mut sink, page, &name, true)?;
            }
            for p in sink.delivered() {
                println!("{}", p.display());
            }
        }
        None => {
            for (path, dim) in images.paths().iter().zip(images.dimensions()) {
                match dim {
                    Some((w, h)) => println!("{} ({w}x{h})", path.display()),
                    None => println!("{}", path.display()),
                }
            }
        }
    }
    Ok(())
}

fn check(config: &Config) -> Result<()> {
    let pdf = binary::check_pdf_binary(config)?;
    println!("PDF generator: {} ({})", pdf.path.display(), pdf.version);
    if !pdf.extra_args.is_empty() {
        println!("  extra flags: {}", pdf.extra_args.join(" "));
    }

    match binary::check_convert_binary(config) {
        Ok(convert) => println!("Image converter: {}", convert.display()),
        Err(e) => println!("Image converter: unavailable ({e})"),
    }
    println!("Work directory: {}", config.work_dir.display());
    Ok(())
}

fn demo(config: Config, kind: DemoKind, output: Option<&Path>) -> Result<()> {
    fs::create_dir_all(&config.work_dir)?;
    let mut doc = Engine::new(config).document(DocumentSettings {
        margin_top: 30.0,
        header_spacing: 5.0,
        folding_marks: true,
        ..DocumentSettings::default()
    });
    doc.set_header_html(templates::header_template());
    doc.set_content_html(templates::body_template());
    doc.set_footer_html(templates::footer_template());

    match kind {
        DemoKind::Pdf => export_pdf(&mut doc, output),
        DemoKind::Image => export_images(&mut doc, &templates::demo_image_params(), true, output),
    }
}
