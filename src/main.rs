use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use web_qa::agent::ToolAgent;
use web_qa::config;
use web_qa::llm::{CurlTransport, LlmConfig, check_health};
use web_qa::page::{BrowserType, PageSession, WebDriverConfig, WebDriverPage, target_url};
use web_qa::plan::{PlanRunner, parse_plan};
use web_qa::qa::{analyze_bugs, fix_bugs, generate_plan};
use web_qa::report::{QaReport, format_summary};
use web_qa::session::{Session, cleanup_old_sessions, list_sessions, sanitize_filename};

/// web-qa - LLM-planned functional testing of web applications
#[derive(Parser, Debug)]
#[command(
    name = "web-qa",
    about = "Plan, run and fix functional UI tests for a web page with an LLM agent",
    after_help = "ENVIRONMENT VARIABLES:\n\
        WEB_QA_LLM_ENDPOINT      Chat completions endpoint URL\n\
        WEB_QA_LLM_MODEL         Model name\n\
        WEB_QA_LLM_API_KEY       API key (GEMINI_API_KEY also accepted)\n\
        WEB_QA_WEBDRIVER_URL     WebDriver server URL\n\
        WEB_QA_BROWSER           chrome or firefox\n\
        WEB_QA_ACTION_TIMEOUT    Page action timeout (ms)\n\
        WEB_QA_SESSION_DIR       Base directory for run sessions\n\
        WEB_QA_OUTPUT            Results file name"
)]
struct Args {
    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Test a page: generate a plan, run it in a browser, and save the results
    Run {
        /// URL or local HTML file to test
        target: String,

        /// Results file, overwritten if it exists [default: WEB_QA_OUTPUT or qa_results.json]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Use this plan instead of asking the model for one
        #[arg(short, long)]
        plan_file: Option<PathBuf>,

        /// Analyze issues and write a corrected HTML document next to the results
        #[arg(long)]
        fix: bool,

        /// Show the browser window
        #[arg(long)]
        headed: bool,

        /// Browser: chrome or firefox [default: WEB_QA_BROWSER or chrome]
        #[arg(long)]
        browser: Option<BrowserType>,

        /// WebDriver server URL [default: WEB_QA_WEBDRIVER_URL]
        #[arg(long)]
        webdriver_url: Option<String>,

        /// Timeout for click, fill and get_text in milliseconds
        #[arg(long)]
        action_timeout: Option<u64>,

        /// Chat completions endpoint URL [default: WEB_QA_LLM_ENDPOINT]
        #[arg(long)]
        endpoint: Option<String>,

        /// Model name [default: WEB_QA_LLM_MODEL]
        #[arg(long)]
        model: Option<String>,

        /// Directory for screenshots (default: a new run dir under WEB_QA_SESSION_DIR)
        #[arg(long)]
        screenshots: Option<PathBuf>,

        /// Delete the run's screenshots once results are saved
        #[arg(long)]
        discard_screenshots: bool,

        /// Print the results report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse a plan file and print its steps as JSON
    Parse {
        /// Plan text file
        file: PathBuf,
    },

    /// Print the summary of a saved results file
    Report {
        /// Results JSON written by `run` [default: WEB_QA_OUTPUT or qa_results.json]
        file: Option<PathBuf>,
    },

    /// List run sessions, optionally removing old ones
    Sessions {
        /// Remove sessions older than this many hours
        #[arg(long)]
        cleanup_hours: Option<u64>,
    },
}

struct RunOptions {
    target: String,
    output: Option<PathBuf>,
    plan_file: Option<PathBuf>,
    fix: bool,
    headed: bool,
    browser: Option<BrowserType>,
    webdriver_url: Option<String>,
    action_timeout: Option<u64>,
    endpoint: Option<String>,
    model: Option<String>,
    screenshots: Option<PathBuf>,
    discard_screenshots: bool,
    json: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Some(Commands::Run {
            target,
            output,
            plan_file,
            fix,
            headed,
            browser,
            webdriver_url,
            action_timeout,
            endpoint,
            model,
            screenshots,
            discard_screenshots,
            json,
        }) => run(RunOptions {
            target,
            output,
            plan_file,
            fix,
            headed,
            browser,
            webdriver_url,
            action_timeout,
            endpoint,
            model,
            screenshots,
            discard_screenshots,
            json,
        })?,

        Some(Commands::Parse { file }) => {
            let text = std::fs::read_to_string(&file)?;
            let steps = parse_plan(&text);
            if steps.is_empty() {
                warn!(file = %file.display(), "no numbered steps found");
            }
            println!("{}", serde_json::to_string_pretty(&steps)?);
        }

        Some(Commands::Report { file }) => {
            let file = file.unwrap_or_else(default_output);
            let report = QaReport::load(&file)?;
            println!("{}", format_summary(&report.summary()));
        }

        Some(Commands::Sessions { cleanup_hours }) => {
            let base = PathBuf::from(config::session_base_dir());
            if let Some(hours) = cleanup_hours {
                let removed = cleanup_old_sessions(&base, Duration::from_secs(hours * 3600))?;
                println!("Removed {} session(s) older than {}h", removed, hours);
            }
            for session in list_sessions(&base)? {
                println!("{}", session.display());
            }
        }

        None => {
            println!("web-qa - LLM-planned functional testing of web applications");
            println!();
            println!("Usage: web-qa <COMMAND>");
            println!();
            println!("Commands:");
            println!("  run       Plan and run functional tests against a page");
            println!("  parse     Parse a plan file into steps");
            println!("  report    Summarize a saved results file");
            println!("  sessions  List or clean up run sessions");
            println!();
            println!("Run with --help for more information.");
        }
    }

    Ok(())
}

fn run(opts: RunOptions) -> Result<(), Box<dyn Error>> {
    let url = target_url(&opts.target)?;
    let output = opts.output.clone().unwrap_or_else(default_output);

    let session = match &opts.screenshots {
        Some(dir) => Session::in_dir(dir),
        None => Session::for_run(
            config::session_base_dir(),
            &session_name(&opts.target),
            opts.discard_screenshots,
        ),
    }
    .with_target(url.clone());

    let mut llm_config = LlmConfig::default();
    if let Some(endpoint) = &opts.endpoint {
        llm_config.endpoint = endpoint.clone();
    }
    if let Some(model) = &opts.model {
        llm_config.model = model.clone();
    }
    if !check_health(&llm_config.endpoint, 5).unwrap_or(false) {
        warn!(
            endpoint = %llm_config.endpoint,
            "model endpoint is not responding; requests may fail"
        );
    }

    let mut driver_config = WebDriverConfig::default().headless(!opts.headed);
    if let Some(server) = &opts.webdriver_url {
        driver_config.server_url = server.clone();
    }
    if let Some(browser) = opts.browser {
        driver_config = driver_config.browser(browser);
    }
    if let Some(ms) = opts.action_timeout {
        driver_config = driver_config.action_timeout_ms(ms);
    }

    let mut page = WebDriverPage::open(driver_config, session)?;
    page.navigate(&url)?;
    info!(title = %page.title().unwrap_or_default(), "page loaded");

    let original_html = if Path::new(&opts.target).is_file() {
        std::fs::read_to_string(&opts.target)?
    } else {
        page.content()?
    };

    let transport = CurlTransport::new(llm_config.clone());
    let mut agent = ToolAgent::new(&mut page, transport, llm_config);

    let plan_text = match &opts.plan_file {
        Some(path) => std::fs::read_to_string(path)?,
        None => generate_plan(&mut agent, &url)?,
    };

    let mut runner = PlanRunner::with_agent(agent);
    let test_run = runner.run(&plan_text)?;
    let mut agent = runner.into_executor().into_agent();

    let report = QaReport::from_run(test_run);
    report.save(&output)?;
    let summary = report.summary();

    if opts.fix {
        if summary.is_clean() {
            info!("no issues found; skipping bug fixing");
        } else {
            let analysis = analyze_bugs(&mut agent, &summary, &original_html)?;
            let analysis_path = output.with_extension("analysis.md");
            std::fs::write(&analysis_path, &analysis)?;

            let fixed = fix_bugs(&mut agent, &summary, &analysis, &original_html)?;
            let fixed_path = output.with_extension("fixed.html");
            std::fs::write(&fixed_path, fixed)?;
            info!(
                analysis = %analysis_path.display(),
                fixed = %fixed_path.display(),
                "bug fixing finished"
            );
        }
    }

    drop(agent);
    let screenshot_dir = page.session().dir.clone();
    let screenshots = page.session().list_screenshots()?.len();
    page.close()?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", format_summary(&summary));
        println!("\nResults: {}", output.display());
        if !opts.discard_screenshots || opts.screenshots.is_some() {
            println!("Screenshots: {} ({} files)", screenshot_dir.display(), screenshots);
        }
    }

    Ok(())
}

/// Results file from `WEB_QA_OUTPUT`, or the default name
fn default_output() -> PathBuf {
    PathBuf::from(&config::get().session.output_file)
}

/// Session name derived from the target's last path segment
fn session_name(target: &str) -> String {
    let stem = target
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(target)
        .split('.')
        .next()
        .unwrap_or_default();
    match sanitize_filename(stem) {
        s if s.is_empty() => "qa_run".to_string(),
        s => format!("{}_qa", s),
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "web_qa=debug" } else { "web_qa=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
