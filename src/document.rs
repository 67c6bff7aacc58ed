//! Document – ties the three regions, the settings and the PDF generator
//! together into a single conversion.
//!
//! A conversion:
//!
//! 1. **Build** – assemble the converter argv ([`Document::pdf_command`])
//! 2. **Write** – serialize header/footer (when used) and body to
//!    `{work_dir}/{region}_{id}.html`
//! 3. **Convert** – run the PDF generator, bounded by the configured timeout
//! 4. **Clean up** – remove the region files and report `{work_dir}/{id}.pdf`
//!
//! Documents share nothing mutable: every file name is derived from the
//! document id, so any number of documents can convert concurrently in the
//! same work directory.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Local;

use crate::binary::{self, PdfBinary};
use crate::command::CommandLine;
use crate::config::Config;
use crate::delivery::{self, DeliverySink};
use crate::error::{BinaryKind, Error, Result};
use crate::notify::{LogNotifier, Notifier};
use crate::region::{FooterMode, Region, RegionKind};
use crate::settings::DocumentSettings;

/// Configuration and hooks shared by every document created from it.
#[derive(Clone)]
pub struct Engine {
    config: Arc<Config>,
    notifier: Arc<dyn Notifier>,
}

impl Engine {
    /// Engine with log-only notifications.
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    /// Start a new document.
    pub fn document(&self, settings: DocumentSettings) -> Document {
        Document::new(self, settings)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A header/body/footer document converted by the external PDF generator.
#[derive(Debug)]
pub struct Document {
    id: String,
    settings: DocumentSettings,
    header: Region,
    body: Region,
    footer: Region,
    created: bool,
    engine: Engine,
    pdf_binary: Option<PdfBinary>,
}

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Time, process id and a per-process sequence; unique within the process
/// and practically unique across processes sharing a work directory.
fn next_id() -> String {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default();
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{micros:013x}{:08x}{seq:x}", process::id())
}

/// `{stem}_{dd_mm_YYYY__HH_MM}.{ext}` download name.
pub fn generated_filename(stem: &str, ext: &str) -> String {
    format!("{stem}_{}.{ext}", Local::now().format("%d_%m_%Y__%H_%M"))
}

/// Region HTML files written for one conversion. Removed on drop unless
/// [`TempInputs::keep`] is called.
struct TempInputs {
    files: Vec<PathBuf>,
    keep: bool,
}

impl TempInputs {
    fn new() -> Self {
        Self {
            files: Vec::new(),
            keep: false,
        }
    }

    fn write(&mut self, path: PathBuf, html: &str) -> io::Result<()> {
        self.files.push(path);
        let path = &self.files[self.files.len() - 1];
        log::debug!("Writing region file {}", path.display());
        fs::write(path, html)
    }

    fn keep(mut self) {
        log::info!("Keeping failed conversion inputs: {:?}", self.files);
        self.keep = true;
    }
}

impl Drop for TempInputs {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        for f in &self.files {
            match fs::remove_file(f) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Could not remove {}: {e}", f.display()),
            }
        }
    }
}

impl Document {
    /// Create a document. The PDF generator is checked here, but a failing
    /// check only logs and notifies; the document is always created and the
    /// problem surfaces when converting.
    pub fn new(engine: &Engine, settings: DocumentSettings) -> Self {
        let pdf_binary = match binary::check_pdf_binary(engine.config()) {
            Ok(b) => Some(b),
            Err(e) => {
                log::error!("PDF generator check failed: {}", e.diagnostic());
                engine.notifier().binary_warning(&e.to_string());
                None
            }
        };

        Self {
            id: next_id(),
            settings: settings.normalized(),
            header: Region::new(),
            body: Region::new(),
            footer: Region::new(),
            created: false,
            engine: engine.clone(),
            pdf_binary,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn settings(&self) -> &DocumentSettings {
        &self.settings
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The validated PDF generator, if the construction-time check passed.
    pub fn pdf_binary(&self) -> Option<&PdfBinary> {
        self.pdf_binary.as_ref()
    }

    /// `true` once a PDF has been produced.
    pub fn is_created(&self) -> bool {
        self.created
    }

    // -----------------------------------------------------------------------
    // Regions
    // -----------------------------------------------------------------------

    pub fn region(&self, kind: RegionKind) -> &Region {
        match kind {
            RegionKind::Header => &self.header,
            RegionKind::Body => &self.body,
            RegionKind::Footer => &self.footer,
        }
    }

    pub fn region_mut(&mut self, kind: RegionKind) -> &mut Region {
        match kind {
            RegionKind::Header => &mut self.header,
            RegionKind::Body => &mut self.body,
            RegionKind::Footer => &mut self.footer,
        }
    }

    pub fn set_header_html(&mut self, html: impl Into<String>) {
        self.header.set_content(html);
    }

    pub fn set_header_html_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.header.set_content_from_file(path)
    }

    pub fn set_header_css(&mut self, css: impl Into<String>) {
        self.header.set_css(css);
    }

    pub fn add_header_css_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.header.add_css_file(path)
    }

    pub fn set_content_html(&mut self, html: impl Into<String>) {
        self.body.set_content(html);
    }

    pub fn set_content_html_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.body.set_content_from_file(path)
    }

    pub fn set_content_css(&mut self, css: impl Into<String>) {
        self.body.set_css(css);
    }

    pub fn add_content_css_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.body.add_css_file(path)
    }

    pub fn set_footer_html(&mut self, html: impl Into<String>) {
        self.footer.set_content(html);
    }

    pub fn set_footer_html_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.footer.set_content_from_file(path)
    }

    pub fn set_footer_css(&mut self, css: impl Into<String>) {
        self.footer.set_css(css);
    }

    pub fn add_footer_css_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.footer.add_css_file(path)
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    fn includes_header(&self) -> bool {
        !self.header.is_empty()
    }

    fn includes_footer(&self) -> bool {
        !self.footer.is_empty() || self.settings.show_page_numbers
    }

    pub fn header_html(&self) -> String {
        self.header
            .render_header(self.settings.folding_marks, &self.engine.config.site_root())
    }

    pub fn body_html(&self) -> String {
        self.body.render(&self.engine.config.site_root())
    }

    pub fn footer_html(&self, mode: FooterMode) -> String {
        let page_numbers = self
            .settings
            .show_page_numbers
            .then_some(self.settings.page_numbers_prefix.as_str());
        self.footer
            .render_footer(mode, page_numbers, &self.engine.config.site_root())
    }

    /// `{work_dir}/{id}.pdf`
    pub fn pdf_path(&self) -> PathBuf {
        self.engine.config.work_dir.join(format!("{}.pdf", self.id))
    }

    /// `{work_dir}/{region}_{id}.html`
    pub fn region_path(&self, kind: RegionKind) -> PathBuf {
        self.engine
            .config
            .work_dir
            .join(format!("{}_{}.html", kind.file_stem(), self.id))
    }

    // -----------------------------------------------------------------------
    // Conversion
    // -----------------------------------------------------------------------

    /// The full PDF generator invocation for the current state.
    ///
    /// Flag order is fixed: margins, optional switches, header, footer,
    /// dpi/zoom, version-specific extras, then `<body.html> <out.pdf>`.
    pub fn pdf_command(&self) -> Result<CommandLine> {
        let config = self.engine.config();
        let program = self
            .pdf_binary
            .as_ref()
            .map(|b| b.path.clone())
            .or_else(|| binary::resolve_pdf_binary(config))
            .ok_or(Error::BinaryMissing(BinaryKind::PdfGenerator))?;
        let s = &self.settings;

        let mut cmd = CommandLine::new(program);
        if let Some(lib) = config.lib_path() {
            cmd.env("LD_LIBRARY_PATH", lib);
        }

        cmd.args(["-T", &format!("{}mm", s.margin_top)])
            .args(["-R", &format!("{}mm", s.margin_right)])
            .args(["-B", &format!("{}mm", s.margin_bottom)])
            .args(["-L", &format!("{}mm", s.margin_left)]);

        if s.disable_smart_shrinking {
            cmd.arg("--disable-smart-shrinking");
        }
        if s.enable_forms {
            cmd.arg("--enable-forms");
        }

        if self.includes_header() {
            cmd.args(["--header-spacing", &s.header_spacing.to_string()])
                .arg("--header-html")
                .arg(self.region_path(RegionKind::Header));
        }
        if self.includes_footer() {
            cmd.args(["--footer-spacing", &s.footer_spacing.to_string()])
                .arg("--footer-html")
                .arg(self.region_path(RegionKind::Footer));
        }

        cmd.args(["--dpi", &s.dpi.to_string()])
            .args(["--zoom", &s.zoom.to_string()]);

        if let Some(b) = &self.pdf_binary {
            cmd.args(&b.extra_args);
        }

        cmd.arg(self.region_path(RegionKind::Body)).arg(self.pdf_path());
        Ok(cmd)
    }

    /// Convert the document and return the PDF path.
    ///
    /// Calling this again regenerates and overwrites the PDF.
    pub fn create_pdf(&mut self) -> Result<PathBuf> {
        let config = Arc::clone(&self.engine.config);

        let cmd = self.pdf_command().map_err(|e| {
            log::error!("PDF conversion not possible: {e}");
            Error::ConversionFailed {
                output: e.to_string(),
                command: String::new(),
            }
        })?;

        // work_dir must already exist
        let mut inputs = TempInputs::new();
        if let Err(e) = self.write_inputs(&mut inputs) {
            log::error!("Could not write region files: {e} -- PDF create cmd: > {cmd} <");
            return Err(Error::ConversionFailed {
                output: e.to_string(),
                command: cmd.to_string(),
            });
        }

        log::debug!("PDF create cmd: {cmd}");
        let failure = match cmd.run_captured(config.timeout()) {
            Ok(out) if out.status.success() => None,
            Ok(out) => Some(format!("{:?} ({})", out.lines(), out.status)),
            Err(e) => Some(e.to_string()),
        };

        if let Some(output) = failure {
            log::error!("PDF conversion failed: {output} -- PDF create cmd: > {cmd} <");
            if config.keep_failed_inputs {
                inputs.keep();
            }
            return Err(Error::ConversionFailed {
                output,
                command: cmd.to_string(),
            });
        }
        drop(inputs);

        self.created = true;
        let pdf = self.pdf_path();
        log::info!("Created PDF {}", pdf.display());
        self.engine.notifier().document_created(&self.id, &pdf);
        Ok(pdf)
    }

    fn write_inputs(&self, inputs: &mut TempInputs) -> io::Result<()> {
        if self.includes_header() {
            inputs.write(self.region_path(RegionKind::Header), &self.header_html())?;
        }
        if self.includes_footer() {
            inputs.write(
                self.region_path(RegionKind::Footer),
                &self.footer_html(FooterMode::FullPage),
            )?;
        }
        inputs.write(self.region_path(RegionKind::Body), &self.body_html())
    }

    /// The existing PDF, or a fresh one when none was produced yet or the
    /// file has gone missing.
    pub fn ensure_pdf(&mut self) -> Result<PathBuf> {
        let pdf = self.pdf_path();
        if self.created && pdf.exists() {
            return Ok(pdf);
        }
        if self.created {
            log::warn!("PDF {} vanished, regenerating", pdf.display());
        }
        self.create_pdf()
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    /// Name offered for the PDF download.
    pub fn download_filename(&self) -> String {
        if self.settings.filename.is_empty() {
            generated_filename(&self.id, "pdf")
        } else {
            self.settings.filename.clone()
        }
    }

    /// Send the PDF to `sink`, converting first if needed.
    pub fn download(&mut self, sink: &mut dyn DeliverySink, delete_pdf: bool) -> Result<()> {
        let pdf = self.ensure_pdf()?;
        delivery::deliver(sink, &pdf, &self.download_filename(), delete_pdf)
    }

    /// Send any produced artifact (e.g. an exported image) to `sink`. The
    /// name is `outputFilename` when set, otherwise generated with the
    /// artifact's extension.
    pub fn deliver_file(
        &self,
        sink: &mut dyn DeliverySink,
        path: &Path,
        delete_after: bool,
    ) -> Result<()> {
        let name = if self.settings.output_filename.is_empty() {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("bin");
            generated_filename(&self.id, ext)
        } else {
            self.settings.output_filename.clone()
        };
        delivery::deliver(sink, path, &name, delete_after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(dir: &Path) -> Engine {
        Engine::new(Config {
            binary: Some(PathBuf::from("/opt/wkhtmltopdf")),
            work_dir: dir.to_path_buf(),
            ..Config::default()
        })
    }

    fn args(doc: &Document) -> Vec<String> {
        doc.pdf_command().unwrap().arg_strings()
    }

    fn position(args: &[String], flag: &str) -> usize {
        args.iter().position(|a| a == flag).unwrap()
    }

    #[test]
    fn ids_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let e = engine(dir.path());
        let a = e.document(DocumentSettings::default());
        let b = e.document(DocumentSettings::default());
        assert_ne!(a.id(), b.id());
        assert_ne!(a.pdf_path(), b.pdf_path());
    }

    #[test]
    fn command_has_fixed_flag_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = engine(dir.path()).document(DocumentSettings {
            margin_top: 30.0,
            margin_left: 0.0,
            dpi: 150,
            zoom: 1.5,
            ..DocumentSettings::default()
        });
        doc.set_header_html("<b>H</b>");
        let a = args(&doc);

        let expected_head = ["-T", "30mm", "-R", "5mm", "-B", "20mm", "-L", "0mm"];
        assert_eq!(&a[..8], &expected_head);
        for flag in ["-T", "-R", "-B", "-L", "--dpi", "--zoom", "--header-html", "--footer-html"] {
            assert_eq!(a.iter().filter(|x| *x == flag).count(), 1, "{flag}");
        }
        assert!(position(&a, "--header-spacing") < position(&a, "--header-html"));
        assert!(position(&a, "--header-html") < position(&a, "--footer-spacing"));
        assert!(position(&a, "--footer-html") < position(&a, "--dpi"));
        assert!(position(&a, "--dpi") < position(&a, "--zoom"));
        assert_eq!(a[position(&a, "--dpi") + 1], "150");
        assert_eq!(a[position(&a, "--zoom") + 1], "1.5");

        let n = a.len();
        assert_eq!(a[n - 2], doc.region_path(RegionKind::Body).to_string_lossy());
        assert_eq!(a[n - 1], doc.pdf_path().to_string_lossy());
    }

    #[test]
    fn integral_values_print_without_fraction() {
        let dir = tempfile::tempdir().unwrap();
        let doc = engine(dir.path()).document(DocumentSettings::default());
        let a = args(&doc);
        assert_eq!(a[position(&a, "--zoom") + 1], "1");
        assert_eq!(a[position(&a, "--dpi") + 1], "300");
        assert_eq!(a[position(&a, "--footer-spacing") + 1], "0");
    }

    #[test]
    fn empty_regions_without_page_numbers_omit_header_and_footer() {
        let dir = tempfile::tempdir().unwrap();
        let doc = engine(dir.path()).document(DocumentSettings {
            show_page_numbers: false,
            ..DocumentSettings::default()
        });
        let a = args(&doc);
        assert!(!a.iter().any(|x| x == "--header-html" || x == "--footer-html"));
        assert!(!a.iter().any(|x| x == "--header-spacing" || x == "--footer-spacing"));
    }

    #[test]
    fn page_numbers_force_footer() {
        let dir = tempfile::tempdir().unwrap();
        let doc = engine(dir.path()).document(DocumentSettings::default());
        let a = args(&doc);
        assert!(a.iter().any(|x| x == "--footer-html"));
        assert!(!a.iter().any(|x| x == "--header-html"));
        assert!(doc.footer_html(FooterMode::FullPage).contains(r#"id="pages_current""#));
    }

    #[test]
    fn optional_switches() {
        let dir = tempfile::tempdir().unwrap();
        let doc = engine(dir.path()).document(DocumentSettings {
            disable_smart_shrinking: true,
            enable_forms: true,
            ..DocumentSettings::default()
        });
        let a = args(&doc);
        let shrink = position(&a, "--disable-smart-shrinking");
        let forms = position(&a, "--enable-forms");
        assert!(position(&a, "-L") < shrink && shrink < forms);
        assert!(forms < position(&a, "--dpi"));
    }

    #[test]
    fn lib_path_sets_environment() {
        let dir = tempfile::tempdir().unwrap();
        let e = Engine::new(Config {
            binary: Some(PathBuf::from("/opt/wkhtmltopdf")),
            lib_path: Some(" /opt/wkhtmltox/lib ".into()),
            work_dir: dir.path().to_path_buf(),
            ..Config::default()
        });
        let cmd = e.document(DocumentSettings::default()).pdf_command().unwrap();
        assert_eq!(
            cmd.env_strings(),
            vec![("LD_LIBRARY_PATH".to_string(), "/opt/wkhtmltox/lib".to_string())]
        );
    }

    #[test]
    fn unconfigured_binary_fails_as_conversion_error() {
        let dir = tempfile::tempdir().unwrap();
        let e = Engine::new(Config {
            work_dir: dir.path().to_path_buf(),
            ..Config::default()
        });
        let mut doc = e.document(DocumentSettings::default());
        assert!(doc.pdf_binary().is_none());
        assert!(matches!(doc.create_pdf(), Err(Error::ConversionFailed { .. })));
        assert!(!doc.is_created());
    }

    #[test]
    fn missing_work_dir_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("not/yet/existing");
        let mut doc = engine(&work).document(DocumentSettings::default());
        doc.set_content_html("B");

        assert!(matches!(doc.create_pdf(), Err(Error::ConversionFailed { .. })));
        assert!(!work.exists());
    }

    #[test]
    fn unwritable_work_dir_fails_as_conversion_error() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        fs::write(&work, b"a file, not a directory").unwrap();
        let mut doc = engine(&work).document(DocumentSettings::default());
        doc.set_content_html("B");

        match doc.create_pdf() {
            Err(Error::ConversionFailed { command, .. }) => {
                assert!(command.contains("--dpi"), "{command}");
            }
            other => panic!("expected ConversionFailed, got {other:?}"),
        }
        assert!(work.is_file());
        assert!(!doc.is_created());
    }

    #[test]
    fn download_name_defaults_to_id_and_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let e = engine(dir.path());
        let doc = e.document(DocumentSettings::default());
        let name = doc.download_filename();
        assert!(name.starts_with(&format!("{}_", doc.id())));
        assert!(name.ends_with(".pdf"));

        let named = e.document(DocumentSettings {
            filename: "invoice.pdf".into(),
            ..DocumentSettings::default()
        });
        assert_eq!(named.download_filename(), "invoice.pdf");
    }
}
