//! Execution orchestration: archive extraction, script invocation,
//! and bounded-retry cleanup of execution artifacts.
//!
//! Whatever happens during extraction or execution, cleanup runs
//! before the outcome is reported, and a cleanup failure never
//! overrides the execution result — it is retried on a fixed delay
//! and, past the bound, logged as a fatal cleanup failure without
//! crashing the process.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;
use tracing::{error, info, warn};

use scriptcast_core::{ARCHIVE_SUFFIX, CastError, SCRIPT_SUFFIX};

use crate::host::SessionHost;
use crate::runtime::ScriptRuntime;

/// Maximum deletion attempts per artifact.
pub const CLEANUP_ATTEMPTS: u32 = 10;

/// Fixed delay between deletion attempts (no backoff curve).
pub const CLEANUP_DELAY: Duration = Duration::from_secs(1);

/// A randomly suffixed artifact name, e.g. `upload-1f2ec9aa.lua`.
pub fn random_name(prefix: &str, ext: &str) -> String {
    let r: u32 = rand::rng().random();
    format!("{prefix}{r:08x}{ext}")
}

// ── ExecutionRequest ─────────────────────────────────────────────

/// Everything the upload phase produced for one execution.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// The uploaded file, or the resolved shared path.
    pub script_path: PathBuf,
    /// The reference name as the client sent it (marker stripped for
    /// shared references). Drives archive-suffix resolution.
    pub reference_name: String,
    /// Argument string for the script.
    pub args: String,
    /// Whether the content is an archive requiring extraction.
    pub is_archive: bool,
    /// Whether the reference resolved into the shared directory.
    /// Shared files are never deleted.
    pub shared: bool,
}

// ── Orchestrator ─────────────────────────────────────────────────

/// Turns an uploaded/located file into a running script and
/// guarantees artifact cleanup afterward.
pub struct Orchestrator {
    download_dir: PathBuf,
    shared_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(download_dir: impl Into<PathBuf>, shared_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            shared_dir: shared_dir.into(),
        }
    }

    /// Extract (if needed), run, then clean up. The cleanup protocol
    /// always runs; its outcome never changes the returned result.
    pub async fn execute(
        &self,
        request: &ExecutionRequest,
        host: &mut SessionHost,
        runtime: &dyn ScriptRuntime,
    ) -> Result<(), CastError> {
        let mut extract_dir: Option<PathBuf> = None;
        let result = self.run_inner(request, &mut extract_dir, host, runtime).await;
        self.cleanup(request, extract_dir.as_deref()).await;
        result
    }

    async fn run_inner(
        &self,
        request: &ExecutionRequest,
        extract_dir: &mut Option<PathBuf>,
        host: &mut SessionHost,
        runtime: &dyn ScriptRuntime,
    ) -> Result<(), CastError> {
        let script = if request.is_archive {
            self.extract(request, extract_dir)?
        } else {
            request.script_path.clone()
        };

        host.set_script_dir(script.parent().unwrap_or(Path::new(".")));
        info!("executing {}", script.display());
        runtime.run(&script, host).await
    }

    /// Unpack the archive into a fresh randomly named directory under
    /// the appropriate base, and resolve the inner script path from
    /// the original reference name.
    fn extract(
        &self,
        request: &ExecutionRequest,
        extract_dir: &mut Option<PathBuf>,
    ) -> Result<PathBuf, CastError> {
        let file_name = Path::new(&request.reference_name)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(CastError::Archive(format!(
                "unusable archive reference: {}",
                request.reference_name
            )))?;
        let stem = file_name
            .strip_suffix(ARCHIVE_SUFFIX)
            .ok_or(CastError::Archive(format!(
                "archive reference {file_name} lacks the {ARCHIVE_SUFFIX} suffix"
            )))?;

        let base = if request.shared {
            &self.shared_dir
        } else {
            &self.download_dir
        };
        let dir = base.join(random_name("unpack-", ""));
        std::fs::create_dir_all(&dir)?;
        *extract_dir = Some(dir.clone());

        let file = std::fs::File::open(&request.script_path)?;
        zip::ZipArchive::new(file)
            .map_err(|e| CastError::Archive(format!("open archive: {e}")))?
            .extract(&dir)
            .map_err(|e| CastError::Archive(format!("extract archive: {e}")))?;

        Ok(dir.join(format!("{stem}{SCRIPT_SUFFIX}")))
    }

    /// Delete the uploaded file (never for shared references) and the
    /// extraction directory, each with bounded retry.
    async fn cleanup(&self, request: &ExecutionRequest, extract_dir: Option<&Path>) {
        if !request.shared {
            let path = request.script_path.clone();
            if let Err(e) = remove_with_retry(
                &path,
                || std::fs::remove_file(&path),
                CLEANUP_ATTEMPTS,
                CLEANUP_DELAY,
            )
            .await
            {
                error!("fatal cleanup failure: {e}");
            }
        }

        if let Some(dir) = extract_dir {
            if let Err(e) = remove_with_retry(
                dir,
                || std::fs::remove_dir_all(dir),
                CLEANUP_ATTEMPTS,
                CLEANUP_DELAY,
            )
            .await
            {
                error!("fatal cleanup failure: {e}");
            }
        }
    }
}

// ── Retry loop ───────────────────────────────────────────────────

/// Run a deletion op until it succeeds, the artifact is already gone,
/// or `attempts` is exhausted, sleeping `delay` between attempts.
pub async fn remove_with_retry<F>(
    path: &Path,
    mut op: F,
    attempts: u32,
    delay: Duration,
) -> Result<(), CastError>
where
    F: FnMut() -> io::Result<()>,
{
    for attempt in 1..=attempts {
        match op() {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                warn!(
                    "cleanup attempt {attempt}/{attempts} for {} failed: {e}",
                    path.display()
                );
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(CastError::Cleanup {
        path: path.display().to_string(),
        attempts,
    })
}

// ── Tests ────────────────────────────────────────────────────────
