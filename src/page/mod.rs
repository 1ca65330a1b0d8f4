//! Browser page capability surface.
//!
//! Everything the QA core knows about a browser goes through [`PageSession`].
//! [`WebDriverPage`] drives a real browser over the W3C WebDriver protocol;
//! tests substitute in-memory pages.

pub mod tools;
pub mod webdriver;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use tools::{TOOL_NAMES, dispatch, tool_definitions};
pub use webdriver::{BrowserType, WebDriverConfig, WebDriverPage};

/// Result type for page operations
pub type PageResult<T> = Result<T, PageError>;

/// Errors raised by page actions
#[derive(Debug, Error)]
pub enum PageError {
    /// No element matched the selector before the action timeout
    #[error("no element matches selector '{0}'")]
    ElementNotFound(String),

    /// The browser did not finish the action in time
    #[error("timed out: {0}")]
    Timeout(String),

    /// The browser rejected or failed the command
    #[error("{command} failed: {message}")]
    Command { command: String, message: String },

    /// The remote session is gone; nothing further can run against this page
    #[error("page session closed: {0}")]
    SessionClosed(String),

    /// Could not talk to the WebDriver server
    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PageError {
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Whether this error ends the page session for good
    pub fn is_fatal(&self) -> bool {
        matches!(self, PageError::SessionClosed(_))
    }
}

/// A live browser page.
///
/// Each action either succeeds or fails with a [`PageError`]; only
/// [`PageError::SessionClosed`] means the page can no longer be used.
pub trait PageSession {
    /// Load a URL in the page
    fn navigate(&mut self, url: &str) -> PageResult<()>;

    /// Current document title
    fn title(&mut self) -> PageResult<String>;

    /// Save a screenshot labeled `label` and return its path
    fn screenshot(&mut self, label: &str) -> PageResult<PathBuf>;

    /// Current serialized markup of the page
    fn content(&mut self) -> PageResult<String>;

    fn click(&mut self, selector: &str) -> PageResult<()>;

    fn fill(&mut self, selector: &str, value: &str) -> PageResult<()>;

    /// Visible text of the first element matching `selector`
    fn get_text(&mut self, selector: &str) -> PageResult<String>;

    /// Release the underlying browser. Calling it twice is a no-op.
    fn close(&mut self) -> PageResult<()>;
}

impl<P: PageSession + ?Sized> PageSession for &mut P {
    fn navigate(&mut self, url: &str) -> PageResult<()> {
        (**self).navigate(url)
    }

    fn title(&mut self) -> PageResult<String> {
        (**self).title()
    }

    fn screenshot(&mut self, label: &str) -> PageResult<PathBuf> {
        (**self).screenshot(label)
    }

    fn content(&mut self) -> PageResult<String> {
        (**self).content()
    }

    fn click(&mut self, selector: &str) -> PageResult<()> {
        (**self).click(selector)
    }

    fn fill(&mut self, selector: &str, value: &str) -> PageResult<()> {
        (**self).fill(selector, value)
    }

    fn get_text(&mut self, selector: &str) -> PageResult<String> {
        (**self).get_text(selector)
    }

    fn close(&mut self) -> PageResult<()> {
        (**self).close()
    }
}

/// Turn a QA target into a URL the browser can load.
///
/// An existing local path becomes an absolute `file://` URL; anything else is
/// passed through unchanged.
pub fn target_url(target: &str) -> PageResult<String> {
    let path = Path::new(target);
    if !path.exists() {
        return Ok(target.to_string());
    }

    let absolute = path.canonicalize()?;
    url::Url::from_file_path(&absolute)
        .map(|u| u.to_string())
        .map_err(|_| {
            PageError::command(
                "target",
                format!("cannot express {} as a URL", absolute.display()),
            )
        })
}
