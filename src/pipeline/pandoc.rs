//! pandoc invocation: option construction and the process boundary.
//!
//! The pipeline only ever talks to a [`DocumentConverter`], so tests (and
//! callers with their own conversion service) can substitute the pandoc
//! process with anything that maps `(options, bytes)` to DOCX bytes.

use crate::config::{PandocConfig, ReferenceDoc};
use crate::error::Md2DocxError;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Converts a document buffer according to pandoc-style options.
pub trait DocumentConverter: Send + Sync {
    /// Run one conversion. `input` is fed as the whole source document; the
    /// returned bytes are the whole output document.
    fn convert(&self, options: &[String], input: &[u8]) -> Result<Vec<u8>, Md2DocxError>;

    /// Reference document to use for [`ReferenceDoc::Bundled`]. `None` means
    /// the converter's built-in default applies and no option is passed.
    fn bundled_reference_doc(&self) -> Result<Option<PathBuf>, Md2DocxError> {
        Ok(None)
    }
}

/// Input format of a conversion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Markdown,
    Html,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Markdown => "markdown",
            SourceFormat::Html => "html",
        }
    }
}

/// Output format of every run.
pub const TARGET_FORMAT: &str = "docx";

/// Configurable pandoc options and their command-line flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PandocOption {
    ReferenceDoc,
    ResourcePath,
    Toc,
    TocDepth,
    TocTitle,
}

impl PandocOption {
    /// Flag prefix; the value is appended directly.
    pub fn flag(&self) -> &'static str {
        match self {
            PandocOption::ReferenceDoc => "--reference-doc=",
            PandocOption::ResourcePath => "--resource-path=",
            PandocOption::Toc => "--toc=",
            PandocOption::TocDepth => "--toc-depth=",
            PandocOption::TocTitle => "--metadata=toc-title:",
        }
    }

    fn with(&self, value: impl std::fmt::Display) -> String {
        format!("{}{value}", self.flag())
    }
}

/// Full option list for one run: output to stdout, source and target
/// formats, then each configured option in a fixed order.
///
/// `reference_doc` is the already-resolved reference document, see
/// [`resolve_reference_doc`].
pub fn build_options(
    config: &PandocConfig,
    from: SourceFormat,
    reference_doc: Option<&Path>,
) -> Vec<String> {
    let mut options = vec![
        "-o-".to_string(),
        format!("--from={}", from.as_str()),
        format!("--to={TARGET_FORMAT}"),
    ];

    if let Some(doc) = reference_doc {
        options.push(PandocOption::ReferenceDoc.with(doc.display()));
    }
    if let Some(ref path) = config.resource_path {
        options.push(PandocOption::ResourcePath.with(path));
    }
    if let Some(toc) = config.toc {
        options.push(PandocOption::Toc.with(toc));
    }
    if let Some(depth) = config.toc_depth {
        options.push(PandocOption::TocDepth.with(depth));
    }
    if let Some(ref title) = config.toc_title {
        options.push(PandocOption::TocTitle.with(title));
    }
    options
}

/// Turn the configured [`ReferenceDoc`] into a concrete path, if any.
pub fn resolve_reference_doc(
    config: &PandocConfig,
    converter: &dyn DocumentConverter,
) -> Result<Option<PathBuf>, Md2DocxError> {
    match config.reference_doc {
        ReferenceDoc::Bundled => converter.bundled_reference_doc(),
        ReferenceDoc::Path(ref p) => Ok(Some(p.clone())),
        ReferenceDoc::None => Ok(None),
    }
}

/// [`DocumentConverter`] backed by a pandoc executable.
#[derive(Debug, Clone)]
pub struct PandocConverter {
    program: PathBuf,
}

impl PandocConverter {
    /// Use the pandoc executable at `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Locate pandoc (`PANDOC_PATH`, `PATH`, cache), downloading a pinned
    /// release if none is installed.
    pub fn locate() -> Result<Self, Md2DocxError> {
        let program = pandoc_auto::ensure_pandoc(None)
            .map_err(|e| Md2DocxError::PandocUnavailable(e.to_string()))?;
        Ok(Self::new(program))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn spawn_error(&self, source: std::io::Error) -> Md2DocxError {
        Md2DocxError::ConverterSpawn {
            program: self.program.clone(),
            source,
        }
    }
}

impl DocumentConverter for PandocConverter {
    fn convert(&self, options: &[String], input: &[u8]) -> Result<Vec<u8>, Md2DocxError> {
        debug!(
            program = %self.program.display(),
            ?options,
            input_bytes = input.len(),
            "running pandoc"
        );

        let mut child = Command::new(&self.program)
            .args(options)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Md2DocxError::Internal("pandoc stdin not captured".into()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Md2DocxError::Internal("pandoc stdout not captured".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Md2DocxError::Internal("pandoc stderr not captured".into()))?;

        // stdin and stderr run on their own threads so no pipe can fill up
        // while another is being drained.
        let (out, err, written) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || {
                let result = stdin.write_all(input);
                drop(stdin);
                result
            });
            let err_reader = scope.spawn(move || {
                let mut buf = Vec::new();
                stderr.read_to_end(&mut buf).map(|_| buf)
            });
            let mut out = Vec::new();
            let out_result = stdout.read_to_end(&mut out).map(|_| out);
            (out_result, joined(err_reader.join()), joined(writer.join()))
        });

        let status = child.wait().map_err(|e| self.spawn_error(e))?;
        let stderr_text = String::from_utf8_lossy(&err.unwrap_or_default()).into_owned();

        if !status.success() {
            let from = options
                .iter()
                .find_map(|o| o.strip_prefix("--from="))
                .unwrap_or("input")
                .to_string();
            return Err(Md2DocxError::ConversionFailed {
                from,
                status: status.to_string(),
                stderr: stderr_text,
            });
        }

        // A broken stdin pipe only matters when pandoc also reported success.
        written.map_err(|e| self.spawn_error(e))?;
        let out = out.map_err(|e| self.spawn_error(e))?;
        if !stderr_text.trim().is_empty() {
            debug!(stderr = %stderr_text.trim(), "pandoc diagnostics");
        }
        Ok(out)
    }

    fn bundled_reference_doc(&self) -> Result<Option<PathBuf>, Md2DocxError> {
        pandoc_auto::default_reference_doc(&self.program)
            .map(Some)
            .map_err(|e| Md2DocxError::PandocUnavailable(e.to_string()))
    }
}

fn joined<T>(result: std::thread::Result<std::io::Result<T>>) -> std::io::Result<T> {
    result.unwrap_or_else(|_| Err(std::io::Error::other("pipe thread panicked")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_options_only_by_default() {
        let opts = build_options(&PandocConfig::default(), SourceFormat::Markdown, None);
        assert_eq!(opts, vec!["-o-", "--from=markdown", "--to=docx"]);
    }

    #[test]
    fn every_configured_option_in_order() {
        let config = PandocConfig {
            reference_doc: ReferenceDoc::Path("ref.docx".into()),
            resource_path: Some("img:assets".into()),
            toc: Some(true),
            toc_depth: Some(3),
            toc_title: Some("Contents".into()),
        };
        let opts = build_options(&config, SourceFormat::Html, Some(Path::new("ref.docx")));
        assert_eq!(
            opts,
            vec![
                "-o-",
                "--from=html",
                "--to=docx",
                "--reference-doc=ref.docx",
                "--resource-path=img:assets",
                "--toc=true",
                "--toc-depth=3",
                "--metadata=toc-title:Contents",
            ]
        );
    }

    #[test]
    fn toc_false_is_still_passed() {
        let config = PandocConfig {
            toc: Some(false),
            ..Default::default()
        };
        let opts = build_options(&config, SourceFormat::Markdown, None);
        assert!(opts.contains(&"--toc=false".to_string()));
    }

    struct NoBundle;

    impl DocumentConverter for NoBundle {
        fn convert(&self, _options: &[String], input: &[u8]) -> Result<Vec<u8>, Md2DocxError> {
            Ok(input.to_vec())
        }
    }

    #[test]
    fn reference_doc_resolution() {
        let mut config = PandocConfig::default();
        assert_eq!(resolve_reference_doc(&config, &NoBundle).unwrap(), None);

        config.reference_doc = ReferenceDoc::Path("custom.docx".into());
        assert_eq!(
            resolve_reference_doc(&config, &NoBundle).unwrap(),
            Some(PathBuf::from("custom.docx"))
        );

        config.reference_doc = ReferenceDoc::None;
        assert_eq!(resolve_reference_doc(&config, &NoBundle).unwrap(), None);
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let converter = PandocConverter::new("/nonexistent/bin/pandoc");
        let err = converter
            .convert(&["--version".to_string()], b"")
            .unwrap_err();
        assert!(matches!(err, Md2DocxError::ConverterSpawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_passes_stderr_through() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-pandoc");
        std::fs::write(&script, "#!/bin/sh\ncat >/dev/null\necho 'Unknown option --bogus' >&2\nexit 2\n")
            .unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let err = PandocConverter::new(&script)
            .convert(&["--from=markdown".to_string()], b"# hi")
            .unwrap_err();
        match err {
            Md2DocxError::ConversionFailed { from, stderr, .. } => {
                assert_eq!(from, "markdown");
                assert!(stderr.contains("Unknown option --bogus"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn stdout_is_returned_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("echo-pandoc");
        std::fs::write(&script, "#!/bin/sh\ncat\n").unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let input = vec![b'x'; 256 * 1024];
        let out = PandocConverter::new(&script).convert(&[], &input).unwrap();
        assert_eq!(out, input);
    }
}
