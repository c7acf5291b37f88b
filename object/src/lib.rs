//! A thin convenience layer over `dicom-parser`: opening a Part 10 file
//! from a filesystem path or an arbitrary [`Read`]er, mirroring
//! `dicom_object::file` upstream.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use snafu::{ResultExt, Snafu};

pub use dicom_parser::{DataElement, DataSet, DicomFile};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("could not read file {:?}", path))]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("could not parse DICOM file"))]
    Parse { source: dicom_parser::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Read and parse a DICOM Part 10 file from any [`Read`] source.
pub fn from_reader<R: Read>(mut source: R) -> Result<DicomFile> {
    let mut buf = Vec::new();
    source
        .read_to_end(&mut buf)
        .context(IoSnafu { path: std::path::PathBuf::new() })?;
    dicom_parser::read_file(&buf).context(ParseSnafu)
}

/// Open and parse a DICOM Part 10 file from a filesystem path.
pub fn open_file<P: AsRef<Path>>(path: P) -> Result<DicomFile> {
    let path = path.as_ref();
    let mut file = File::open(path).context(IoSnafu { path: path.to_path_buf() })?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).context(IoSnafu { path: path.to_path_buf() })?;
    dicom_parser::read_file(&buf).context(ParseSnafu)
}
