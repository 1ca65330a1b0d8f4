//! Run sessions: one directory per QA run holding its screenshots.
//!
//! Provides centralized management of run sessions with:
//! - Unique session directories under a configurable base location
//! - Run sessions that persist, since results files point at their screenshots
//! - Scratch sessions that are removed on drop unless preserved
//! - Session metadata tracking
//! - Screenshot naming from page title, label and timestamp

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::config;

/// A QA run session with organized file management
#[derive(Debug)]
pub struct Session {
    /// Unique session ID
    pub id: String,
    /// Root directory for this session
    pub dir: PathBuf,
    /// Whether to keep files after session ends
    pub keep: bool,
    /// Page under test, recorded in the session metadata
    pub target: Option<String>,
}

impl Session {
    /// Create a new session with a unique ID under the configured base directory
    pub fn new() -> Self {
        let id = generate_session_id();
        let dir = PathBuf::from(config::session_base_dir()).join(&id);
        Self::from_parts(id, dir, false)
    }

    /// Create a session with a specific name/prefix under the configured base directory
    pub fn with_name(name: &str) -> Self {
        Self::in_base(config::session_base_dir(), name)
    }

    /// Create a named session under an explicit base directory
    pub fn in_base(base: impl AsRef<Path>, name: &str) -> Self {
        let id = format!("{}_{}", sanitize_filename(name), generate_timestamp_suffix());
        let dir = base.as_ref().join(&id);
        Self::from_parts(id, dir, false)
    }

    /// Session for one QA run under `base`.
    ///
    /// Step results reference the screenshots taken here, so the directory is
    /// kept after the run unless `discard` is set.
    pub fn for_run(base: impl AsRef<Path>, name: &str, discard: bool) -> Self {
        Self::in_base(base, name).keep(!discard)
    }

    /// Create a session in a specific directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let id = dir
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(generate_session_id);

        // User-specified directories are kept by default
        Self::from_parts(id, dir, true)
    }

    fn from_parts(id: String, dir: PathBuf, keep: bool) -> Self {
        Self {
            id,
            dir,
            keep,
            target: None,
        }
    }

    /// Set whether to keep files after session ends
    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    /// Record the page under test
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Initialize the session directory
    pub fn init(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let metadata = serde_json::json!({
            "id": self.id,
            "created": chrono::Utc::now().to_rfc3339(),
            "target": self.target,
        });

        let metadata_path = self.dir.join(".session.json");
        fs::write(metadata_path, serde_json::to_string_pretty(&metadata)?)?;
        debug!(session = %self.id, dir = %self.dir.display(), "session initialized");

        Ok(())
    }

    /// Get path for a labeled screenshot of a page
    ///
    /// Files are named `<title>_<label>_<YYYYmmdd_HHMMSS>.png`; an empty
    /// title falls back to `page`.
    pub fn screenshot_path(&self, page_title: &str, label: &str) -> PathBuf {
        self.dir
            .join(screenshot_filename(page_title, label, &generate_timestamp_suffix()))
    }

    /// List all PNG files in the session
    pub fn list_screenshots(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut shots = Vec::new();
        if self.dir.exists() {
            for entry in fs::read_dir(&self.dir)? {
                let path = entry?.path();
                if path.extension().map(|e| e == "png").unwrap_or(false) {
                    shots.push(path);
                }
            }
        }
        shots.sort();
        Ok(shots)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.keep && self.dir.exists() {
            if let Err(e) = fs::remove_dir_all(&self.dir) {
                warn!(dir = %self.dir.display(), "failed to remove session dir: {}", e);
            }
        }
    }
}

/// Build a screenshot file name from its parts
fn screenshot_filename(page_title: &str, label: &str, timestamp: &str) -> String {
    let title = match sanitize_filename(page_title) {
        t if t.is_empty() => "page".to_string(),
        t => t,
    };
    let label = match sanitize_filename(label) {
        l if l.is_empty() => "screenshot".to_string(),
        l => l,
    };
    format!("{}_{}_{}.png", title, label, timestamp)
}

/// Generate a unique session ID
fn generate_session_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let pid = std::process::id();
    format!("session_{}_{}", timestamp, pid)
}

/// Generate a timestamp suffix
fn generate_timestamp_suffix() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Make text safe for file names.
///
/// Drops everything except word characters, whitespace and dashes, lower-cases,
/// then collapses runs of whitespace and dashes into a single underscore.
pub fn sanitize_filename(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    let lowered = kept.trim().to_lowercase();

    let mut out = String::with_capacity(lowered.len());
    let mut in_separator = false;
    for c in lowered.chars() {
        if c == '-' || c.is_whitespace() {
            if !in_separator {
                out.push('_');
                in_separator = true;
            }
        } else {
            out.push(c);
            in_separator = false;
        }
    }
    out
}

/// Clean up sessions under `base` older than `max_age`
pub fn cleanup_old_sessions(base: &Path, max_age: std::time::Duration) -> std::io::Result<usize> {
    if !base.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let mut cleaned = 0;

    for entry in fs::read_dir(base)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let expired = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .map(|age| age > max_age)
            .unwrap_or(false);

        if expired && fs::remove_dir_all(&path).is_ok() {
            cleaned += 1;
        }
    }

    Ok(cleaned)
}

/// List all existing sessions under `base`
pub fn list_sessions(base: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !base.exists() {
        return Ok(Vec::new());
    }

    let mut sessions = Vec::new();
    for entry in fs::read_dir(base)? {
        let path = entry?.path();
        if path.is_dir() {
            sessions.push(path);
        }
    }
    sessions.sort();
    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_new() {
        let session = Session::new();
        assert!(session.id.starts_with("session_"));
        assert!(!session.keep);
    }

    #[test]
    fn test_session_in_base() {
        let base = tempfile::tempdir().unwrap();
        let session = Session::in_base(base.path(), "My Page");
        assert!(session.id.starts_with("my_page_"));
        assert!(session.dir.starts_with(base.path()));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Hello World"), "hello_world");
        assert_eq!(sanitize_filename("step_3 - before!"), "step_3_before");
        assert_eq!(sanitize_filename("  Graph   Editor -- v2  "), "graph_editor_v2");
        assert_eq!(sanitize_filename("a/b\\c"), "abc");
        assert_eq!(sanitize_filename("???"), "");
    }

    #[test]
    fn test_screenshot_filename() {
        assert_eq!(
            screenshot_filename("Tree Demo", "step_2_after", "20240101_120000"),
            "tree_demo_step_2_after_20240101_120000.png"
        );
        assert_eq!(
            screenshot_filename("", "", "20240101_120000"),
            "page_screenshot_20240101_120000.png"
        );
    }

    #[test]
    fn test_init_and_cleanup() {
        let base = tempfile::tempdir().unwrap();
        let session = Session::in_base(base.path(), "run").with_target("file:///tmp/a.html");
        session.init().unwrap();

        let meta = fs::read_to_string(session.dir.join(".session.json")).unwrap();
        assert!(meta.contains("file:///tmp/a.html"));

        fs::write(session.dir.join("x.png"), b"png").unwrap();
        assert_eq!(session.list_screenshots().unwrap().len(), 1);

        let dir = session.dir.clone();
        drop(session);
        assert!(!dir.exists());
    }

    #[test]
    fn test_run_session_keeps_screenshots() {
        let base = tempfile::tempdir().unwrap();
        let session = Session::for_run(base.path(), "app_qa", false);
        session.init().unwrap();
        let shot = session.screenshot_path("App", "step_1_before");
        fs::write(&shot, b"png").unwrap();
        drop(session);
        assert!(shot.exists());

        let discarded = Session::for_run(base.path(), "scratch", true);
        discarded.init().unwrap();
        let dir = discarded.dir.clone();
        drop(discarded);
        assert!(!dir.exists());
    }

    #[test]
    fn test_kept_session_survives_drop() {
        let base = tempfile::tempdir().unwrap();
        let session = Session::in_base(base.path(), "kept").keep(true);
        session.init().unwrap();
        let dir = session.dir.clone();
        drop(session);
        assert!(dir.exists());
        assert_eq!(list_sessions(base.path()).unwrap(), vec![dir]);
    }
}
