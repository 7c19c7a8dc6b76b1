//! Operating system facilities.
//!
//! Text file access, the process arguments and environment, and the path
//! queries generated programs need at startup. Lookups that depend on the
//! environment take the variable reader as a parameter internally, so their
//! fallback chains can be exercised without touching the process
//! environment.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// A failed file operation.
#[derive(Debug, Error)]
#[error("cannot {action} `{}`: {source}", .path.display())]
pub struct OsError {
    action: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
}

impl OsError {
    fn new(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    /// The platform error code, or `-1` when there is none.
    pub fn code(&self) -> i32 {
        self.source.raw_os_error().unwrap_or(-1)
    }

    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Status code of a file operation result: `0` on success.
pub fn status_code<T>(result: &Result<T, OsError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => err.code(),
    }
}

/// Read a whole file as text. Invalid UTF-8 sequences are replaced.
pub fn read_text_file(path: impl AsRef<Path>) -> Result<String, OsError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|err| OsError::new("read", path, err))?;
    tracing::debug!(path = %path.display(), len = bytes.len(), "read text file");
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    })
}

/// Create or truncate a file and write `content` to it.
pub fn write_text_file(path: impl AsRef<Path>, content: &str) -> Result<(), OsError> {
    let path = path.as_ref();
    std::fs::write(path, content).map_err(|err| OsError::new("write", path, err))?;
    tracing::debug!(path = %path.display(), len = content.len(), "wrote text file");
    Ok(())
}

/// The process arguments, program name first.
pub fn args() -> Vec<String> {
    std::env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

/// The process environment as name and value pairs.
pub fn env() -> Vec<(String, String)> {
    std::env::vars_os()
        .map(|(name, value)| {
            (
                name.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            )
        })
        .collect()
}

/// The canonical absolute form of `path`, or `path` itself when it cannot
/// be resolved.
pub fn real_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Separator between entries of a search path variable.
pub const fn path_separator() -> char {
    if cfg!(windows) {
        ';'
    } else {
        ':'
    }
}

/// Separator between directory components.
pub const fn dir_separator() -> char {
    if cfg!(windows) {
        '\\'
    } else {
        '/'
    }
}

/// A path from a variable that is set, even to the empty string.
fn set_path(var: &dyn Fn(&str) -> Option<OsString>, name: &str) -> Option<PathBuf> {
    var(name).map(PathBuf::from)
}

fn process_var(name: &str) -> Option<OsString> {
    std::env::var_os(name)
}

/// The user's home directory.
///
/// `HOME` wins whenever it is set. Otherwise the platform's own notion of
/// the home directory is used, and `.` when there is none.
pub fn home_dir() -> PathBuf {
    home_dir_with(&process_var, dirs::home_dir)
}

fn home_dir_with(var: &dyn Fn(&str) -> Option<OsString>, platform: impl FnOnce() -> Option<PathBuf>) -> PathBuf {
    if let Some(home) = set_path(var, "HOME") {
        return home;
    }
    if cfg!(windows) {
        if let (Some(drive), Some(path)) = (set_path(var, "HOMEDRIVE"), set_path(var, "HOMEPATH")) {
            let mut home = drive.into_os_string();
            home.push(path.into_os_string());
            return PathBuf::from(home);
        }
    }
    platform().unwrap_or_else(|| PathBuf::from("."))
}

/// The directory for temporary files.
pub fn temp_dir() -> PathBuf {
    temp_dir_with(&process_var)
}

fn temp_dir_with(var: &dyn Fn(&str) -> Option<OsString>) -> PathBuf {
    if let Some(dir) = set_path(var, "TEMP").or_else(|| set_path(var, "TEMPDIR")) {
        return dir;
    }
    if cfg!(windows) {
        if let Some(local) = set_path(var, "LOCALAPPDATA") {
            return local.join("Temp");
        }
        PathBuf::from("c:\\tmp")
    } else {
        PathBuf::from("/tmp")
    }
}

/// Absolute path of the running executable.
pub fn app_path() -> PathBuf {
    match std::env::current_exe() {
        Ok(exe) => real_path(exe),
        Err(err) => {
            tracing::debug!(error = %err, "executable path unavailable, searching from argv[0]");
            let argv0 = std::env::args_os().next().unwrap_or_default();
            app_path_from(Path::new(&argv0), process_var("PATH"))
        }
    }
}

/// Resolve the executable from the program name it was started with.
fn app_path_from(argv0: &Path, search_path: Option<OsString>) -> PathBuf {
    if argv0.is_absolute() {
        return real_path(argv0);
    }
    if argv0.components().count() > 1 {
        return real_path(Path::new(".").join(argv0));
    }
    if let Some(search_path) = search_path {
        for dir in std::env::split_paths(&search_path) {
            let candidate = dir.join(argv0);
            if file_exists(&candidate) {
                return real_path(candidate);
            }
        }
    }
    real_path(argv0)
}

#[cfg(unix)]
fn file_exists(path: &Path) -> bool {
    nix::unistd::access(path, nix::unistd::AccessFlags::F_OK).is_ok()
}

#[cfg(not(unix))]
fn file_exists(path: &Path) -> bool {
    path.exists()
}
