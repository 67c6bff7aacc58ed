//! Delivery – hands a finished artifact to whoever asked for it.
//!
//! A [`DeliverySink`] receives the file path and the suggested download
//! name. [`WriterSink`] streams the bytes into any writer (an HTTP response
//! body, stdout); [`DirectorySink`] copies the file into a directory under
//! the suggested name.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub trait DeliverySink {
    fn send(&mut self, path: &Path, filename: &str) -> io::Result<()>;
}

/// Streams file bytes into a writer.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> DeliverySink for WriterSink<W> {
    fn send(&mut self, path: &Path, filename: &str) -> io::Result<()> {
        let mut file = File::open(path)?;
        let n = io::copy(&mut file, &mut self.writer)?;
        self.writer.flush()?;
        log::debug!("Streamed {n} bytes of {} as {filename}", path.display());
        Ok(())
    }
}

/// Copies files into a target directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    delivered: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            delivered: Vec::new(),
        }
    }

    /// Paths written so far, in delivery order.
    pub fn delivered(&self) -> &[PathBuf] {
        &self.delivered
    }
}

impl DeliverySink for DirectorySink {
    fn send(&mut self, path: &Path, filename: &str) -> io::Result<()> {
        // only the final component, so a name cannot escape `dir`
        let name = Path::new(filename).file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid file name {filename:?}"),
            )
        })?;
        let target = self.dir.join(name);
        fs::copy(path, &target)?;
        self.delivered.push(target);
        Ok(())
    }
}

/// Send `path` to `sink` as `filename`, then delete it when `delete_after`
/// is set.
pub fn deliver(
    sink: &mut dyn DeliverySink,
    path: &Path,
    filename: &str,
    delete_after: bool,
) -> Result<()> {
    if let Err(e) = sink.send(path, filename) {
        log::error!("Delivery of {} failed: {e}", path.display());
        return Err(Error::DeliveryFailed(e));
    }

    if delete_after {
        if let Err(e) = fs::remove_file(path) {
            log::warn!("Could not delete delivered file {}: {e}", path.display());
        }
    }
    Ok(())
}
