use anyhow::{bail, Context, Result};
use ::config::{Config, Environment, File};
use serde::Deserialize;

const DEFAULT_SITE_ROOT: &str = "https://www.ptt.cc";
const DEFAULT_BOARD: &str = "KoreaDrama";
const DEFAULT_SUBJECT_TAG: &str = "[影音]";
const DEFAULT_DB_PATH: &str = "data/tvboard.sqlite";
const DEFAULT_CONCURRENCY: usize = 8;
const DEFAULT_USER_AGENT: &str = concat!("tvboard_crawler/", env!("CARGO_PKG_VERSION"));

/// Run settings. Sources, lowest precedence first: built-in defaults,
/// `tvboard.toml` in the working directory, `TVBOARD_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub site_root: String,
    pub board: String,
    pub subject_tag: String,
    pub db_path: String,
    pub concurrency: usize,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            site_root: DEFAULT_SITE_ROOT.to_string(),
            board: DEFAULT_BOARD.to_string(),
            subject_tag: DEFAULT_SUBJECT_TAG.to_string(),
            db_path: DEFAULT_DB_PATH.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::with_name("tvboard").required(false))
            .add_source(Environment::with_prefix("TVBOARD").try_parsing(true))
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.subject_tag.is_empty() {
            bail!("subject_tag must not be empty");
        }
        Ok(())
    }

    /// Board index; always serves the newest page.
    pub fn index_url(&self) -> String {
        format!("{}/bbs/{}/index.html", self.site_root, self.board)
    }

    pub fn page_url(&self, page: u32) -> String {
        format!("{}/bbs/{}/index{}.html", self.site_root, self.board, page)
    }
}
