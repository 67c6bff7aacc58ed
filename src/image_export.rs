//! Image export – rasterizes a document's PDF with the external image
//! converter.
//!
//! The converter writes `{stem}.jpg` for a single page. For multi-page PDFs
//! it may instead emit `{stem}-0.jpg`, `{stem}-1.jpg`, …; those are
//! collected into an ordered [`ImageOutput::Pages`] list.

use std::fs;
use std::path::{Path, PathBuf};

use crate::binary;
use crate::command::CommandLine;
use crate::document::Document;
use crate::error::{Error, Result};

pub const DENSITY: &str = "-density 300";
pub const QUALITY: &str = "-quality 100";
/// DIN A4 at 300 dpi.
pub const RESIZE: &str = "-resize 2480x3508";
pub const TRIM: &str = "-trim";

/// Upper bound for the page-split scan.
pub const MAX_PAGES: usize = 10_000;

/// One raster converter parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RasterParam {
    /// Option text such as `-background white`; split on whitespace into
    /// separate arguments.
    Flags(String),
    /// A file path passed as one argument.
    Path(PathBuf),
}

/// Result of an image export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutput {
    Single(PathBuf),
    /// Page images in page order.
    Pages(Vec<PathBuf>),
}

impl ImageOutput {
    pub fn paths(&self) -> &[PathBuf] {
        match self {
            ImageOutput::Single(p) => std::slice::from_ref(p),
            ImageOutput::Pages(pages) => pages,
        }
    }

    pub fn into_paths(self) -> Vec<PathBuf> {
        match self {
            ImageOutput::Single(p) => vec![p],
            ImageOutput::Pages(pages) => pages,
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, ImageOutput::Single(_))
    }

    /// Pixel dimensions of every produced image, `None` where the file
    /// cannot be decoded.
    pub fn dimensions(&self) -> Vec<Option<(u32, u32)>> {
        self.paths()
            .iter()
            .map(|p| match ::image::image_dimensions(p) {
                Ok(dim) => Some(dim),
                Err(e) => {
                    log::warn!("Cannot read dimensions of {}: {e}", p.display());
                    None
                }
            })
            .collect()
    }
}

/// `doc.pdf` → `doc.jpg`
pub fn image_path_for(pdf: &Path) -> PathBuf {
    pdf.with_extension("jpg")
}

/// `dir/doc.jpg`, 2 → `dir/doc-2.jpg`
pub fn page_path(image: &Path, index: usize) -> PathBuf {
    let stem = image.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let name = match image.extension() {
        Some(ext) => format!("{stem}-{index}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{index}"),
    };
    image.with_file_name(name)
}

/// Drop blank parameters and exact duplicates, keeping the first
/// occurrence of each. Option text is compared after trimming, so
/// `-quality 50` and `-quality 100` are both kept.
pub fn merge_params<I>(params: I) -> Vec<RasterParam>
where
    I: IntoIterator<Item = RasterParam>,
{
    let mut merged: Vec<RasterParam> = Vec::new();
    for param in params {
        let param = match param {
            RasterParam::Flags(f) => {
                let f = f.trim();
                if f.is_empty() {
                    continue;
                }
                RasterParam::Flags(f.to_string())
            }
            path => path,
        };
        if !merged.contains(&param) {
            merged.push(param);
        }
    }
    merged
}

/// The ordered, de-duplicated parameter list:
/// `-density 300 [-trim] <pdf> <extra…> -quality 100 -resize 2480x3508 <image>`.
///
/// This deliberately differs from a `-trim <pdf> -density 300 <extra…>`
/// ordering: the converter only applies `-density` to inputs that follow
/// it, so the density has to come before the PDF. Caller parameters
/// follow the input so they act on the rasterized pages.
pub fn raster_params(pdf: &Path, image: &Path, extra: &[String], trim: bool) -> Vec<RasterParam> {
    let mut params = vec![RasterParam::Flags(DENSITY.to_string())];
    if trim {
        params.push(RasterParam::Flags(TRIM.to_string()));
    }
    params.push(RasterParam::Path(pdf.to_path_buf()));
    params.extend(extra.iter().cloned().map(RasterParam::Flags));
    params.push(RasterParam::Flags(QUALITY.to_string()));
    params.push(RasterParam::Flags(RESIZE.to_string()));
    params.push(RasterParam::Path(image.to_path_buf()));
    merge_params(params)
}

pub fn raster_command(binary: &Path, params: &[RasterParam]) -> CommandLine {
    let mut cmd = CommandLine::new(binary);
    for p in params {
        match p {
            RasterParam::Flags(f) => {
                cmd.args(f.split_whitespace());
            }
            RasterParam::Path(path) => {
                cmd.arg(path);
            }
        }
    }
    cmd
}

/// Find what the converter produced for `image`: the file itself, or the
/// numbered page files starting at `-0`.
pub fn collect_output(image: &Path) -> Option<ImageOutput> {
    if image.exists() {
        return Some(ImageOutput::Single(image.to_path_buf()));
    }

    let pages: Vec<PathBuf> = (0..MAX_PAGES)
        .map(|n| page_path(image, n))
        .take_while(|p| p.exists())
        .collect();

    if pages.is_empty() {
        return None;
    }
    if pages.len() == MAX_PAGES {
        log::warn!("Stopped collecting page images of {} at {MAX_PAGES}", image.display());
    }
    Some(ImageOutput::Pages(pages))
}

impl Document {
    /// Rasterize the document to JPEG.
    ///
    /// The PDF is produced first when there is none yet. `extra_params` are
    /// merged into the default parameters (see [`raster_params`]); `trim`
    /// crops the page margins. Success is judged by the files the converter
    /// leaves behind, not by its exit status.
    pub fn create_image(
        &mut self,
        delete_source_pdf: bool,
        extra_params: &[String],
        trim: bool,
    ) -> Result<ImageOutput> {
        let convert = binary::check_convert_binary(self.engine().config())?;
        let pdf = self.ensure_pdf()?;
        let image = image_path_for(&pdf);

        let cmd = raster_command(&convert, &raster_params(&pdf, &image, extra_params, trim));
        log::debug!("Image convert cmd: {cmd}");

        match cmd.run(self.engine().config().timeout()) {
            Ok(status) if !status.success() => {
                log::debug!("Image converter exited with {status}");
            }
            Ok(_) => {}
            Err(e) => {
                log::error!("Image conversion failed: {e} -- cmd: > {cmd} <");
                return Err(Error::ConversionFailed {
                    output: e.to_string(),
                    command: cmd.to_string(),
                });
            }
        }

        if delete_source_pdf && pdf.exists() {
            if let Err(e) = fs::remove_file(&pdf) {
                log::warn!("Could not delete source PDF {}: {e}", pdf.display());
            }
        }

        let output = collect_output(&image).ok_or_else(|| {
            log::error!("Could not create image from pdf. Command: \"{cmd}\"");
            Error::ConversionFailed {
                output: "no image produced".to_string(),
                command: cmd.to_string(),
            }
        })?;
        log::info!("Created {} image(s) from {}", output.paths().len(), pdf.display());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(params: &[RasterParam]) -> Vec<String> {
        params
            .iter()
            .map(|p| match p {
                RasterParam::Flags(f) => f.clone(),
                RasterParam::Path(p) => p.display().to_string(),
            })
            .collect()
    }

    #[test]
    fn default_params_in_order() {
        let params = raster_params(Path::new("/w/doc.pdf"), Path::new("/w/doc.jpg"), &[], true);
        assert_eq!(
            flags(&params),
            vec![
                "-density 300",
                "-trim",
                "/w/doc.pdf",
                "-quality 100",
                "-resize 2480x3508",
                "/w/doc.jpg"
            ]
        );
    }

    #[test]
    fn no_trim_flag_when_disabled() {
        let params = raster_params(Path::new("/w/doc.pdf"), Path::new("/w/doc.jpg"), &[], false);
        assert!(!flags(&params).contains(&"-trim".to_string()));
    }

    #[test]
    fn overlapping_flags_are_both_kept() {
        let extra = vec!["-quality 50".to_string()];
        let f = flags(&raster_params(Path::new("a.pdf"), Path::new("a.jpg"), &extra, true));
        assert_eq!(f.iter().filter(|x| *x == "-quality 100").count(), 1);
        assert_eq!(f.iter().filter(|x| *x == "-quality 50").count(), 1);
        let fifty = f.iter().position(|x| x == "-quality 50").unwrap();
        let hundred = f.iter().position(|x| x == "-quality 100").unwrap();
        assert!(fifty < hundred);
    }

    #[test]
    fn exact_duplicates_collapse_to_first_position() {
        let extra = vec![
            " -density 300 ".to_string(),
            "-quality 100".to_string(),
            "".to_string(),
            "-background white".to_string(),
        ];
        let f = flags(&raster_params(Path::new("a.pdf"), Path::new("a.jpg"), &extra, false));
        assert_eq!(
            f,
            vec![
                "-density 300",
                "a.pdf",
                "-quality 100",
                "-background white",
                "-resize 2480x3508",
                "a.jpg"
            ]
        );
    }

    #[test]
    fn command_splits_flags_but_not_paths() {
        let params = raster_params(
            Path::new("/my docs/doc.pdf"),
            Path::new("/my docs/doc.jpg"),
            &["-alpha remove".to_string()],
            true,
        );
        let cmd = raster_command(Path::new("/usr/bin/convert"), &params);
        assert_eq!(
            cmd.arg_strings(),
            vec![
                "-density", "300", "-trim", "/my docs/doc.pdf", "-alpha", "remove",
                "-quality", "100", "-resize", "2480x3508", "/my docs/doc.jpg"
            ]
        );
    }

    #[test]
    fn paths() {
        assert_eq!(image_path_for(Path::new("/w/abc.pdf")), PathBuf::from("/w/abc.jpg"));
        assert_eq!(page_path(Path::new("/w/abc.jpg"), 2), PathBuf::from("/w/abc-2.jpg"));
    }

    #[test]
    fn collect_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("doc.jpg");
        fs::write(&img, b"jpg").unwrap();
        fs::write(dir.path().join("doc-0.jpg"), b"jpg").unwrap();
        assert_eq!(collect_output(&img), Some(ImageOutput::Single(img)));
    }

    #[test]
    fn collect_page_split_stops_at_gap() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("doc.jpg");
        for n in [0, 1, 2, 4] {
            fs::write(dir.path().join(format!("doc-{n}.jpg")), b"jpg").unwrap();
        }
        let out = collect_output(&img).unwrap();
        assert!(!out.is_single());
        assert_eq!(
            out.into_paths(),
            vec![
                dir.path().join("doc-0.jpg"),
                dir.path().join("doc-1.jpg"),
                dir.path().join("doc-2.jpg")
            ]
        );
    }

    #[test]
    fn collect_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("doc-1.jpg"), b"jpg").unwrap();
        assert_eq!(collect_output(&dir.path().join("doc.jpg")), None);
    }

    #[test]
    fn undecodable_image_has_no_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("doc.jpg");
        fs::write(&img, b"not a jpeg").unwrap();
        assert_eq!(ImageOutput::Single(img).dimensions(), vec![None]);
    }
}
