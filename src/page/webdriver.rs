//! [`PageSession`] over WebDriver, driven through `fantoccini`.
//!
//! Talks to a running `chromedriver` or `geckodriver`. The page owns a
//! single-threaded tokio runtime and blocks on each command, so callers stay
//! synchronous. Element lookups use the driver's implicit wait, which is set to
//! the configured action timeout when the session opens.

use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use fantoccini::elements::Element;
use fantoccini::error::{CmdError, ErrorStatus};
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Map, Value, json};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

use super::{PageError, PageResult, PageSession};
use crate::config;
use crate::session::Session;

/// Page loads are allowed longer than element actions
const PAGE_LOAD_TIMEOUT_MS: u64 = 30_000;

/// Supported browser types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserType {
    Chrome,
    Firefox,
}

impl FromStr for BrowserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chrome" | "chromium" => Ok(BrowserType::Chrome),
            "firefox" => Ok(BrowserType::Firefox),
            other => Err(format!("unsupported browser '{}'; use chrome or firefox", other)),
        }
    }
}

impl BrowserType {
    /// Capabilities requested for a new session
    fn capabilities(&self, headless: bool) -> Map<String, Value> {
        let mut caps = Map::new();
        match self {
            BrowserType::Chrome => {
                let mut args = vec!["--window-size=1280,1024", "--disable-gpu"];
                if headless {
                    args.push("--headless=new");
                }
                caps.insert("browserName".to_string(), json!("chrome"));
                caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
            }
            BrowserType::Firefox => {
                let args: Vec<&str> = if headless { vec!["-headless"] } else { vec![] };
                caps.insert("browserName".to_string(), json!("firefox"));
                caps.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
            }
        }
        caps
    }
}

/// Connection settings for a WebDriver session
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    /// Driver base URL, e.g. `http://localhost:9515`
    pub server_url: String,
    pub browser: BrowserType,
    pub headless: bool,
    /// Implicit wait for click/fill/get_text (milliseconds)
    pub action_timeout_ms: u64,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        let cfg = config::get();
        Self {
            server_url: cfg.browser.webdriver_url.clone(),
            browser: cfg.browser.browser.parse().unwrap_or(BrowserType::Chrome),
            headless: true,
            action_timeout_ms: cfg.browser.action_timeout_ms,
        }
    }
}

impl WebDriverConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }

    pub fn browser(mut self, browser: BrowserType) -> Self {
        self.browser = browser;
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn action_timeout_ms(mut self, ms: u64) -> Self {
        self.action_timeout_ms = ms;
        self
    }
}

/// A browser page driven through WebDriver.
///
/// Screenshots are written into the run [`Session`]. The remote session is
/// deleted on [`close`](PageSession::close) or, failing that, on drop.
pub struct WebDriverPage {
    runtime: Runtime,
    client: Option<Client>,
    shots: Session,
}

impl WebDriverPage {
    /// Start a new browser session
    pub fn open(config: WebDriverConfig, shots: Session) -> PageResult<Self> {
        shots.init()?;
        info!(
            browser = ?config.browser,
            headless = config.headless,
            server = %config.server_url,
            "starting WebDriver session"
        );

        let runtime = Builder::new_current_thread().enable_all().build()?;
        let client = runtime.block_on(connect(&config))?;
        debug!("WebDriver session created");

        // From here on, dropping the page deletes the remote session
        let page = Self {
            runtime,
            client: Some(client),
            shots,
        };

        let action = Duration::from_millis(config.action_timeout_ms);
        let timeouts = TimeoutConfiguration::new(
            Some(action),
            Some(Duration::from_millis(PAGE_LOAD_TIMEOUT_MS)),
            Some(action),
        );
        page.run("set timeouts", |client| async move {
            client.update_timeouts(timeouts).await
        })?;
        Ok(page)
    }

    /// Run session holding this page's screenshots
    pub fn session(&self) -> &Session {
        &self.shots
    }

    fn client(&self) -> PageResult<Client> {
        self.client
            .clone()
            .ok_or_else(|| PageError::SessionClosed("session already closed".to_string()))
    }

    /// Block on one client command
    fn run<T, F, Fut>(&self, command: &str, f: F) -> PageResult<T>
    where
        F: FnOnce(Client) -> Fut,
        Fut: Future<Output = Result<T, CmdError>>,
    {
        let client = self.client()?;
        self.runtime
            .block_on(f(client))
            .map_err(|e| page_error(command, e))
    }

    /// Find the first element matching `selector` and act on it
    fn on_element<T, F, Fut>(&self, command: &str, selector: &str, f: F) -> PageResult<T>
    where
        F: FnOnce(Element) -> Fut,
        Fut: Future<Output = Result<T, CmdError>>,
    {
        let client = self.client()?;
        self.runtime
            .block_on(async move {
                let element = client.find(Locator::Css(selector)).await?;
                f(element).await
            })
            .map_err(|e| match e {
                ref e if e.is_no_such_element() => PageError::ElementNotFound(selector.to_string()),
                other => page_error(command, other),
            })
    }
}

impl PageSession for WebDriverPage {
    fn navigate(&mut self, url: &str) -> PageResult<()> {
        info!(url, "navigating");
        self.run("navigate", |client| async move { client.goto(url).await })
    }

    fn title(&mut self) -> PageResult<String> {
        self.run("title", |client| async move { client.title().await })
    }

    fn screenshot(&mut self, label: &str) -> PageResult<PathBuf> {
        let title = self.title().unwrap_or_default();
        let image = self.run("screenshot", |client| async move { client.screenshot().await })?;

        let path = self.shots.screenshot_path(&title, label);
        std::fs::write(&path, image)?;
        debug!(path = %path.display(), "screenshot saved");
        Ok(path)
    }

    fn content(&mut self) -> PageResult<String> {
        self.run("source", |client| async move { client.source().await })
    }

    fn click(&mut self, selector: &str) -> PageResult<()> {
        self.on_element("click", selector, |element| async move {
            element.click().await?;
            Ok(())
        })
    }

    fn fill(&mut self, selector: &str, value: &str) -> PageResult<()> {
        self.on_element("fill", selector, |element| async move {
            element.clear().await?;
            element.send_keys(value).await?;
            Ok(())
        })
    }

    fn get_text(&mut self, selector: &str) -> PageResult<String> {
        self.on_element("get_text", selector, |element| async move {
            element.text().await
        })
    }

    fn close(&mut self) -> PageResult<()> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };
        info!("closing WebDriver session");
        self.runtime
            .block_on(client.close())
            .map_err(|e| page_error("close", e))
    }
}

impl Drop for WebDriverPage {
    fn drop(&mut self) {
        if self.client.is_some() {
            if let Err(e) = self.close() {
                warn!("failed to close WebDriver session on drop: {}", e);
            }
        }
    }
}

async fn connect(config: &WebDriverConfig) -> PageResult<Client> {
    let mut builder = ClientBuilder::rustls().map_err(|e| PageError::Transport(e.to_string()))?;
    builder.capabilities(config.browser.capabilities(config.headless));
    builder.connect(&config.server_url).await.map_err(|e| {
        PageError::Transport(format!(
            "could not start a session at {} ({})",
            config.server_url, e
        ))
    })
}

/// Map a client error onto the page error kinds
fn page_error(command: &str, err: CmdError) -> PageError {
    match err {
        CmdError::Standard(e) => {
            let message = first_line(&e.to_string()).to_string();
            match e.error {
                ErrorStatus::InvalidSessionId
                | ErrorStatus::NoSuchWindow
                | ErrorStatus::SessionNotCreated => PageError::SessionClosed(message),
                ErrorStatus::Timeout | ErrorStatus::ScriptTimeout => PageError::Timeout(message),
                _ => PageError::command(command, message),
            }
        }
        CmdError::Lost(e) => PageError::Transport(e.to_string()),
        other => PageError::command(command, first_line(&other.to_string())),
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::{Arc, Mutex};
    use std::path::Path;

    /// Minimal WebDriver server that answers every command and logs requests
    struct FakeDriver {
        url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl FakeDriver {
        fn start(fail_timeouts: bool) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let url = format!("http://{}", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));
            let log = Arc::clone(&requests);
            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else { break };
                    let _ = answer(stream, &log, fail_timeouts);
                }
            });
            Self { url, requests }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        fn count(&self, request: &str) -> usize {
            self.requests().iter().filter(|r| *r == request).count()
        }
    }

    fn answer(
        stream: TcpStream,
        log: &Mutex<Vec<String>>,
        fail_timeouts: bool,
    ) -> std::io::Result<()> {
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut request_line = String::new();
        reader.read_line(&mut request_line)?;
        if request_line.trim().is_empty() {
            return Ok(());
        }

        let mut length = 0;
        loop {
            let mut header = String::new();
            if reader.read_line(&mut header)? == 0 {
                break;
            }
            let header = header.trim_end();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    length = value.trim().parse().unwrap_or(0);
                }
            }
        }
        let mut body = vec![0; length];
        reader.read_exact(&mut body)?;

        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or_default();
        let path = parts.next().unwrap_or_default();
        log.lock().unwrap().push(format!("{} {}", method, path));

        let (status, reply) = match (method, path) {
            ("POST", "/session") => ("200 OK", r#"{"value":{"sessionId":"s1","capabilities":{}}}"#),
            ("POST", "/session/s1/timeouts") if fail_timeouts => (
                "500 Internal Server Error",
                r#"{"value":{"error":"unknown error","message":"boom","stacktrace":""}}"#,
            ),
            _ => ("200 OK", r#"{"value":null}"#),
        };

        let mut stream = reader.into_inner();
        write!(
            stream,
            "HTTP/1.1 {}\r\nContent-Type: application/json; charset=utf-8\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            reply.len(),
            reply
        )?;
        stream.flush()
    }

    fn open(driver: &FakeDriver, base: &Path) -> PageResult<WebDriverPage> {
        let config = WebDriverConfig::new(&driver.url).browser(BrowserType::Chrome);
        WebDriverPage::open(config, Session::in_base(base, "driver"))
    }

    #[test]
    fn test_browser_type_from_str() {
        assert_eq!("Chrome".parse::<BrowserType>().unwrap(), BrowserType::Chrome);
        assert_eq!("chromium".parse::<BrowserType>().unwrap(), BrowserType::Chrome);
        assert_eq!("firefox".parse::<BrowserType>().unwrap(), BrowserType::Firefox);
        assert!("safari".parse::<BrowserType>().is_err());
    }

    #[test]
    fn test_capabilities_headless_flag() {
        let caps = BrowserType::Chrome.capabilities(true);
        assert_eq!(caps["browserName"], "chrome");
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.iter().any(|a| a == "--headless=new"));

        let caps = BrowserType::Firefox.capabilities(false);
        let args = caps["moz:firefoxOptions"]["args"].as_array().unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_open_sets_timeouts_and_drop_deletes_session() {
        let driver = FakeDriver::start(false);
        let base = tempfile::tempdir().unwrap();

        let page = open(&driver, base.path()).unwrap();
        assert_eq!(
            driver.requests(),
            vec!["POST /session", "POST /session/s1/timeouts"]
        );

        drop(page);
        assert_eq!(driver.count("DELETE /session/s1"), 1);
    }

    #[test]
    fn test_failed_open_still_deletes_session() {
        let driver = FakeDriver::start(true);
        let base = tempfile::tempdir().unwrap();

        let err = open(&driver, base.path()).err().unwrap();
        assert!(matches!(err, PageError::Command { ref command, .. } if command == "set timeouts"));
        assert_eq!(driver.count("DELETE /session/s1"), 1);
    }

    #[test]
    fn test_close_twice_is_a_no_op() {
        let driver = FakeDriver::start(false);
        let base = tempfile::tempdir().unwrap();

        let mut page = open(&driver, base.path()).unwrap();
        page.close().unwrap();
        page.close().unwrap();
        assert!(page.title().unwrap_err().is_fatal());
        drop(page);

        assert_eq!(driver.count("DELETE /session/s1"), 1);
    }
}
