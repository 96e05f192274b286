use std::path::PathBuf;

use clap::Parser;

fn parse_positive_u32(value: &str) -> Result<u32, String> {
    let parsed = value.parse::<u32>().map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(name = "browsecraft", about = "BDD browser-automation test runner", version)]
pub struct Cli {
    /// Feature files or directories to run.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    #[arg(long, help = "Only run scenarios whose title contains this substring")]
    pub grep: Option<String>,

    #[arg(long = "tag", help = "Cucumber tag expression, e.g. \"@smoke and not @wip\"")]
    pub tag: Option<String>,

    #[arg(
        long,
        env = "BROWSECRAFT_RETRIES",
        default_value_t = 0,
        help = "Retries per failed item before it is recorded as Failed"
    )]
    pub retries: u32,

    #[arg(long, help = "Stop dispatching new items after the first final failure")]
    pub bail: bool,

    #[arg(
        long,
        env = "BROWSECRAFT_WORKERS",
        default_value_t = 1,
        value_parser = parse_positive_u32,
        help = "Worker count per browser"
    )]
    pub workers: u32,

    #[arg(long, help = "Single browser to run against, e.g. chrome")]
    pub browser: Option<String>,

    #[arg(long, value_delimiter = ',', help = "Comma-separated browser list, e.g. chrome,firefox")]
    pub browsers: Vec<String>,

    #[arg(long, default_value = "matrix", help = "parallel | sequential | matrix")]
    pub strategy: String,

    #[arg(long, help = "Run browsers headless (default)", overrides_with = "headed")]
    pub headless: bool,

    #[arg(long, help = "Run browsers with a visible window", overrides_with = "headless")]
    pub headed: bool,

    #[arg(long, help = "Verbose step/hook logging")]
    pub debug: bool,
}

impl Cli {
    /// The resolved browser list: `--browsers` wins, then `--browser`,
    /// defaulting to a single `chrome` worker set.
    pub fn resolved_browsers(&self) -> Vec<String> {
        if !self.browsers.is_empty() {
            self.browsers.clone()
        } else if let Some(browser) = &self.browser {
            vec![browser.clone()]
        } else {
            vec!["chrome".to_string()]
        }
    }

    pub fn resolved_headless(&self) -> bool {
        !self.headed
    }
}
