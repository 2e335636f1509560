//! # pandoc-auto
//!
//! Locate, or auto-download and cache, a [pandoc](https://pandoc.org) binary
//! at runtime, so that users of pandoc-driven converters no longer need to
//! install pandoc by hand.
//!
//! ## How it works
//!
//! On first call to [`ensure_pandoc`]:
//!
//! 1. Uses `PANDOC_PATH` when it points at an existing file.
//! 2. Searches `PATH` for a system-wide `pandoc`.
//! 3. Checks `~/.cache/md2docx/pandoc-{VERSION}/` for a previously downloaded copy.
//! 4. If absent, downloads the platform archive from
//!    [jgm/pandoc releases](https://github.com/jgm/pandoc/releases) and
//!    extracts the `pandoc` executable into the cache dir.
//!
//! Subsequent calls skip the lookup entirely; the path is memoised.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pandoc_auto::{default_reference_doc, ensure_pandoc};
//!
//! let pandoc = ensure_pandoc(Some(&|downloaded, total| {
//!     if let Some(t) = total {
//!         eprint!("\rDownloading pandoc: {}/{} bytes", downloaded, t);
//!     }
//! })).expect("pandoc unavailable");
//! let reference = default_reference_doc(&pandoc).expect("reference.docx");
//! println!("{} {}", pandoc.display(), reference.display());
//! ```
//!
//! ## Platform support
//!
//! | OS      | Arch    | Release asset                     |
//! |---------|---------|-----------------------------------|
//! | macOS   | arm64   | `pandoc-{V}-arm64-macOS.zip`      |
//! | macOS   | x86_64  | `pandoc-{V}-x86_64-macOS.zip`     |
//! | Linux   | x86_64  | `pandoc-{V}-linux-amd64.tar.gz`   |
//! | Linux   | aarch64 | `pandoc-{V}-linux-arm64.tar.gz`   |
//! | Windows | x86_64  | `pandoc-{V}-windows-x86_64.zip`   |
//!
//! ## Environment variable overrides
//!
//! - `PANDOC_PATH` — path to an existing pandoc executable; skips lookup and download.
//! - `PANDOC_AUTO_CACHE_DIR` — override the default cache directory.

use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// The pandoc release downloaded when no local installation is found.
pub const PANDOC_VERSION: &str = "3.6.4";

/// GitHub release base URL.
const BASE_URL: &str = "https://github.com/jgm/pandoc/releases/download";

/// File name of the materialised default reference document.
const REFERENCE_DOC_NAME: &str = "reference.docx";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by pandoc-auto operations.
#[derive(Error, Debug)]
pub enum PandocAutoError {
    /// The current OS/architecture combination has no published pandoc build.
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// Could not create or write into the local cache directory.
    #[error("Cache directory error: {0}")]
    CacheDir(#[source] std::io::Error),

    /// Network download failed.
    #[error("Download failed: {0}")]
    Download(String),

    /// gzip/tar/zip extraction failed.
    #[error("Archive extraction failed: {0}")]
    Extract(String),

    /// `pandoc --print-default-data-file reference.docx` failed.
    #[error("Failed to materialise default reference document with '{path}': {reason}")]
    ReferenceDoc { path: PathBuf, reason: String },
}

// ── Internal: platform metadata ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    TarGz,
    Zip,
}

struct PlatformInfo {
    /// Asset filename in the GitHub release, e.g. `pandoc-3.6.4-linux-amd64.tar.gz`.
    archive_name: String,
    /// Relative path of the executable inside the archive.
    binary_path_in_archive: String,
    /// Filename to write on disk, e.g. `pandoc` or `pandoc.exe`.
    binary_name: &'static str,
    kind: ArchiveKind,
}

fn detect_platform() -> Result<PlatformInfo, PandocAutoError> {
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    let v = PANDOC_VERSION;

    match (os, arch) {
        ("macos", "aarch64") => Ok(PlatformInfo {
            archive_name: format!("pandoc-{v}-arm64-macOS.zip"),
            binary_path_in_archive: format!("pandoc-{v}-arm64/bin/pandoc"),
            binary_name: "pandoc",
            kind: ArchiveKind::Zip,
        }),
        ("macos", "x86_64") => Ok(PlatformInfo {
            archive_name: format!("pandoc-{v}-x86_64-macOS.zip"),
            binary_path_in_archive: format!("pandoc-{v}-x86_64/bin/pandoc"),
            binary_name: "pandoc",
            kind: ArchiveKind::Zip,
        }),
        ("linux", "x86_64") => Ok(PlatformInfo {
            archive_name: format!("pandoc-{v}-linux-amd64.tar.gz"),
            binary_path_in_archive: format!("pandoc-{v}/bin/pandoc"),
            binary_name: "pandoc",
            kind: ArchiveKind::TarGz,
        }),
        ("linux", "aarch64") => Ok(PlatformInfo {
            archive_name: format!("pandoc-{v}-linux-arm64.tar.gz"),
            binary_path_in_archive: format!("pandoc-{v}/bin/pandoc"),
            binary_name: "pandoc",
            kind: ArchiveKind::TarGz,
        }),
        ("windows", "x86_64") => Ok(PlatformInfo {
            archive_name: format!("pandoc-{v}-windows-x86_64.zip"),
            binary_path_in_archive: format!("pandoc-{v}/pandoc.exe"),
            binary_name: "pandoc.exe",
            kind: ArchiveKind::Zip,
        }),
        (os, arch) => Err(PandocAutoError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        }),
    }
}

fn binary_file_name() -> &'static str {
    if cfg!(windows) {
        "pandoc.exe"
    } else {
        "pandoc"
    }
}

// ── Cache directory resolution ───────────────────────────────────────────────

/// Returns the per-version cache directory for pandoc artefacts.
///
/// Default locations:
/// - **macOS**: `~/Library/Caches/md2docx/pandoc-{VERSION}/`
/// - **Linux**: `~/.cache/md2docx/pandoc-{VERSION}/`
/// - **Windows**: `%LOCALAPPDATA%\md2docx\pandoc-{VERSION}\`
///
/// Override by setting `PANDOC_AUTO_CACHE_DIR`.
pub fn pandoc_cache_dir() -> PathBuf {
    if let Ok(override_dir) = std::env::var("PANDOC_AUTO_CACHE_DIR") {
        return PathBuf::from(override_dir).join(format!("pandoc-{PANDOC_VERSION}"));
    }

    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir);

    base.join("md2docx").join(format!("pandoc-{PANDOC_VERSION}"))
}

// ── Thread-safe singleton path cache ─────────────────────────────────────────

static RESOLVED_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Search every directory of `PATH` for a pandoc executable.
pub fn find_on_path() -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(binary_file_name()))
        .find(|candidate| candidate.is_file())
}

/// Returns the pandoc path that [`ensure_pandoc`] would use without touching
/// the network, or `None` if a download would be required.
pub fn local_pandoc_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("PANDOC_PATH") {
        let pb = PathBuf::from(p);
        if pb.is_file() {
            return Some(pb);
        }
    }
    if let Some(p) = find_on_path() {
        return Some(p);
    }
    if let Ok(info) = detect_platform() {
        let p = pandoc_cache_dir().join(info.binary_name);
        if p.is_file() {
            return Some(p);
        }
    }
    None
}

/// Returns `true` if pandoc can be used without a download.
pub fn is_pandoc_available() -> bool {
    local_pandoc_path().is_some()
}

/// Ensures a pandoc executable is available and returns its path.
///
/// `on_progress` receives `(bytes_downloaded, total_size_option)` during
/// the download.  Pass `None` to suppress progress callbacks.
///
/// # Thread safety
///
/// Safe to call from multiple threads simultaneously; the resolved path is
/// memoised for the process lifetime.
pub fn ensure_pandoc(
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, PandocAutoError> {
    if let Some(path) = RESOLVED_PATH.get() {
        return Ok(path.clone());
    }

    let path = resolve_or_download(on_progress)?;

    // Best-effort cache in the OnceLock (ignore race; both will succeed).
    let _ = RESOLVED_PATH.set(path.clone());

    Ok(path)
}

/// Materialise pandoc's built-in `reference.docx` in the cache directory and
/// return its path.
///
/// The file is produced once with
/// `pandoc --print-default-data-file reference.docx` and reused afterwards.
pub fn default_reference_doc(pandoc: &Path) -> Result<PathBuf, PandocAutoError> {
    reference_doc_in(pandoc, &pandoc_cache_dir())
}

fn reference_doc_in(pandoc: &Path, cache_dir: &Path) -> Result<PathBuf, PandocAutoError> {
    let dest = cache_dir.join(REFERENCE_DOC_NAME);
    if dest.is_file() {
        return Ok(dest);
    }

    let output = Command::new(pandoc)
        .arg("--print-default-data-file")
        .arg(REFERENCE_DOC_NAME)
        .output()
        .map_err(|e| PandocAutoError::ReferenceDoc {
            path: pandoc.to_path_buf(),
            reason: e.to_string(),
        })?;

    if !output.status.success() || output.stdout.is_empty() {
        return Err(PandocAutoError::ReferenceDoc {
            path: pandoc.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    std::fs::create_dir_all(cache_dir).map_err(PandocAutoError::CacheDir)?;
    // Per-caller temp file in the same directory, renamed into place.
    let mut tmp = tempfile::NamedTempFile::new_in(cache_dir).map_err(PandocAutoError::CacheDir)?;
    tmp.write_all(&output.stdout)
        .map_err(PandocAutoError::CacheDir)?;
    if let Err(e) = tmp.persist(&dest) {
        // Another caller got there first.
        if !dest.is_file() {
            return Err(PandocAutoError::CacheDir(e.error));
        }
    }

    Ok(dest)
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn resolve_or_download(
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, PandocAutoError> {
    // 1. Environment variable override.
    if let Ok(env_path) = std::env::var("PANDOC_PATH") {
        let p = PathBuf::from(env_path);
        if p.is_file() {
            return Ok(p);
        }
        // Fall through: env var set but file missing → regular lookup.
        eprintln!(
            "pandoc-auto: PANDOC_PATH '{}' not found; searching PATH …",
            p.display()
        );
    }

    // 2. System installation.
    if let Some(p) = find_on_path() {
        return Ok(p);
    }

    let info = detect_platform()?;
    let cache_dir = pandoc_cache_dir();
    let bin_path = cache_dir.join(info.binary_name);

    // 3. Already cached on disk.
    if bin_path.is_file() {
        return Ok(bin_path);
    }

    // 4. Download and extract.
    let url = format!("{}/{}/{}", BASE_URL, PANDOC_VERSION, info.archive_name);

    std::fs::create_dir_all(&cache_dir).map_err(PandocAutoError::CacheDir)?;

    let archive_bytes = download_bytes(&url, on_progress)?;
    match info.kind {
        ArchiveKind::TarGz => {
            extract_from_tar_gz(&archive_bytes, &info.binary_path_in_archive, &bin_path)?
        }
        ArchiveKind::Zip => {
            extract_from_zip(&archive_bytes, &info.binary_path_in_archive, &bin_path)?
        }
    }
    mark_executable(&bin_path)?;

    Ok(bin_path)
}

/// Streams a URL into a `Vec<u8>`, calling `on_progress` every 64 KiB.
fn download_bytes(
    url: &str,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<Vec<u8>, PandocAutoError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pandoc-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| PandocAutoError::Download(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| PandocAutoError::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(PandocAutoError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let total = response.content_length();
    let capacity = total.unwrap_or(40 * 1024 * 1024) as usize;
    let mut buf = Vec::with_capacity(capacity);

    let mut stream = response;
    let mut chunk = vec![0u8; 64 * 1024]; // 64 KiB
    let mut downloaded: u64 = 0;

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                downloaded += n as u64;
                if let Some(cb) = on_progress {
                    cb(downloaded, total);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(PandocAutoError::Download(format!("Read error: {e}")));
            }
        }
    }

    Ok(buf)
}

/// Extracts a single file from a gzipped tar archive into `dest_path`.
fn extract_from_tar_gz(
    archive_bytes: &[u8],
    path_in_archive: &str,
    dest_path: &Path,
) -> Result<(), PandocAutoError> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let gz = GzDecoder::new(archive_bytes);
    let mut archive = Archive::new(gz);

    for entry in archive
        .entries()
        .map_err(|e| PandocAutoError::Extract(e.to_string()))?
    {
        let mut entry = entry.map_err(|e| PandocAutoError::Extract(e.to_string()))?;
        let entry_path = entry
            .path()
            .map_err(|e| PandocAutoError::Extract(e.to_string()))?;

        let entry_str = entry_path.to_string_lossy();
        if entry_str == path_in_archive {
            entry
                .unpack(dest_path)
                .map_err(|e| PandocAutoError::Extract(format!("Unpack failed: {e}")))?;
            return Ok(());
        }
    }

    Err(PandocAutoError::Extract(format!(
        "'{}' not found in archive",
        path_in_archive
    )))
}

/// Extracts a single file from a zip archive into `dest_path`.
fn extract_from_zip(
    archive_bytes: &[u8],
    path_in_archive: &str,
    dest_path: &Path,
) -> Result<(), PandocAutoError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(archive_bytes))
        .map_err(|e| PandocAutoError::Extract(e.to_string()))?;

    let mut entry = archive.by_name(path_in_archive).map_err(|_| {
        PandocAutoError::Extract(format!("'{}' not found in archive", path_in_archive))
    })?;

    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| PandocAutoError::Extract(format!("Unpack failed: {e}")))?;
    std::fs::write(dest_path, bytes)
        .map_err(|e| PandocAutoError::Extract(format!("Unpack failed: {e}")))
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<(), PandocAutoError> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)
        .map_err(PandocAutoError::CacheDir)?
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).map_err(PandocAutoError::CacheDir)
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<(), PandocAutoError> {
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pandoc-auto-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn cache_dir_is_deterministic() {
        let d1 = pandoc_cache_dir();
        let d2 = pandoc_cache_dir();
        assert_eq!(d1, d2);
        assert!(d1.to_str().unwrap().contains(PANDOC_VERSION));
    }

    #[test]
    fn cache_dir_override_via_env() {
        std::env::set_var("PANDOC_AUTO_CACHE_DIR", "/tmp/test_md2docx_override");
        let d = pandoc_cache_dir();
        std::env::remove_var("PANDOC_AUTO_CACHE_DIR");
        assert!(d.starts_with("/tmp/test_md2docx_override"));
        assert!(d.to_str().unwrap().contains(PANDOC_VERSION));
    }

    #[test]
    fn platform_archive_names_carry_version() {
        if let Ok(info) = detect_platform() {
            assert!(info.archive_name.contains(PANDOC_VERSION));
            assert!(info.binary_path_in_archive.ends_with(info.binary_name));
        }
    }

    #[test]
    fn extracts_binary_from_tar_gz() {
        let mut builder = tar::Builder::new(Vec::new());
        let payload = b"#!/bin/sh\necho pandoc\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(payload.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, "pandoc-x/bin/pandoc", &payload[..])
            .unwrap();
        let tar_bytes = builder.into_inner().unwrap();

        let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        gz.write_all(&tar_bytes).unwrap();
        let archive = gz.finish().unwrap();

        let dir = scratch_dir("tgz");
        let dest = dir.join("pandoc");
        extract_from_tar_gz(&archive, "pandoc-x/bin/pandoc", &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), payload);

        let missing = extract_from_tar_gz(&archive, "nope/pandoc", &dir.join("other"));
        assert!(matches!(missing, Err(PandocAutoError::Extract(_))));
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn extracts_binary_from_zip() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("pandoc-x/pandoc.exe", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"MZ").unwrap();
        let archive = writer.finish().unwrap().into_inner();

        let dir = scratch_dir("zip");
        let dest = dir.join("pandoc.exe");
        extract_from_zip(&archive, "pandoc-x/pandoc.exe", &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"MZ");
        std::fs::remove_dir_all(dir).ok();
    }

    #[cfg(unix)]
    fn fake_pandoc(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("fake-pandoc");
        std::fs::write(&script, "#!/bin/sh\nprintf 'PK-reference'\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn reference_doc_is_written_once_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let pandoc = fake_pandoc(dir.path());
        let cache = dir.path().join("cache");

        let first = reference_doc_in(&pandoc, &cache).unwrap();
        assert_eq!(std::fs::read(&first).unwrap(), b"PK-reference");

        std::fs::remove_file(&pandoc).unwrap();
        assert_eq!(reference_doc_in(&pandoc, &cache).unwrap(), first);
    }

    #[cfg(unix)]
    #[test]
    fn concurrent_first_use_of_reference_doc_succeeds() {
        for _ in 0..5 {
            let dir = tempfile::tempdir().unwrap();
            let pandoc = fake_pandoc(dir.path());
            let cache = dir.path().join("cache");

            let results: Vec<_> = std::thread::scope(|scope| {
                let handles: Vec<_> = (0..8)
                    .map(|_| scope.spawn(|| reference_doc_in(&pandoc, &cache)))
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            for result in results {
                let path = result.unwrap();
                assert_eq!(std::fs::read(&path).unwrap(), b"PK-reference");
            }
            let leftovers = std::fs::read_dir(&cache).unwrap().count();
            assert_eq!(leftovers, 1, "temp files left in the cache dir");
        }
    }

    #[test]
    fn failing_pandoc_is_a_reference_doc_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = reference_doc_in(&dir.path().join("no-such-pandoc"), dir.path()).unwrap_err();
        assert!(matches!(err, PandocAutoError::ReferenceDoc { .. }));
    }
}
