use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::info;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Unable to write the template to {target}: {message}")]
    Io { target: String, message: String },
}

/// Echoes `contents` to `out`, then writes it to `path`. The echo always
/// happens first so a failed write still leaves the template visible.
pub fn publish<W: Write>(out: &mut W, path: &Path, contents: &str) -> Result<(), Error> {
    echo(out, contents)?;
    return write_file(path, contents);
}

pub fn echo<W: Write>(out: &mut W, contents: &str) -> Result<(), Error> {
    out.write_all(contents.as_bytes())
        .and_then(|_| out.flush())
        .map_err(|error| Error::Io {
            target: String::from("stdout"),
            message: error.to_string(),
        })
}

pub fn write_file(path: &Path, contents: &str) -> Result<(), Error> {
    let to_error = |error: std::io::Error| Error::Io {
        target: path.display().to_string(),
        message: error.to_string(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(to_error)?;
    }
    fs::write(path, contents).map_err(to_error)?;

    info!(path = %path.display(), bytes = contents.len(), "wrote template");
    return Ok(());
}
