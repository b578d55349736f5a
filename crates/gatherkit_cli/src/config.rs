//! Command-line configuration and path resolution.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::Parser;
use directories::{BaseDirs, UserDirs};
use gatherkit_io_fs::{C_SUFFIX_DEFAULT, EnumGatherSymlinkStrategy, SpecGatherOptions};

/// Find files with one suffix anywhere under a folder and copy them into a single folder.
#[derive(Debug, Parser)]
#[command(name = "gatherkit", version)]
pub struct Cli {
    /// Folder to search (prompted for when omitted).
    #[arg(long, short, env = "GATHERKIT_SOURCE")]
    pub source: Option<PathBuf>,
    /// Folder receiving the copies (prompted for when omitted).
    #[arg(long, short, env = "GATHERKIT_DESTINATION")]
    pub destination: Option<PathBuf>,
    /// Case-sensitive file-name suffix to gather.
    #[arg(long, env = "GATHERKIT_SUFFIX", default_value = C_SUFFIX_DEFAULT)]
    pub suffix: String,
    /// Show what would be copied without writing anything.
    #[arg(long)]
    pub dry_run: bool,
    /// Do not follow symbolic links.
    #[arg(long)]
    pub skip_symlinks: bool,
    /// Do not carry permissions and timestamps over to the copies.
    #[arg(long)]
    pub no_preserve_metadata: bool,
    /// Fail instead of prompting for missing folders.
    #[arg(long)]
    pub no_prompt: bool,
    /// Log filter for diagnostics on stderr (e.g. `info`, `gatherkit_io_fs=debug`).
    #[arg(long, env = "GATHERKIT_LOG", default_value = "warn")]
    pub log_level: String,
}

/// Which folder is being asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumPathRole {
    Source,
    Destination,
}

/// Supplies a folder the command line left out.
pub trait PathSelector {
    fn select(&mut self, role: EnumPathRole, suffix: &str) -> anyhow::Result<PathBuf>;
}

/// Used with `--no-prompt`: every missing folder is an error.
pub struct NoPromptSelector;

impl PathSelector for NoPromptSelector {
    fn select(&mut self, role: EnumPathRole, _suffix: &str) -> anyhow::Result<PathBuf> {
        match role {
            EnumPathRole::Source => bail!("missing --source (or GATHERKIT_SOURCE)"),
            EnumPathRole::Destination => {
                bail!("missing --destination (or GATHERKIT_DESTINATION)")
            }
        }
    }
}

/// Asks on a line-based terminal; an empty answer takes the default folder.
pub struct PromptSelector<R, W> {
    reader: R,
    writer: W,
    path_dir_default: PathBuf,
    path_dir_home: Option<PathBuf>,
}

impl<R: BufRead, W: Write> PromptSelector<R, W> {
    pub fn new(reader: R, writer: W, path_dir_default: PathBuf, path_dir_home: Option<PathBuf>) -> Self {
        Self {
            reader,
            writer,
            path_dir_default,
            path_dir_home,
        }
    }
}

impl<R: BufRead, W: Write> PathSelector for PromptSelector<R, W> {
    fn select(&mut self, role: EnumPathRole, suffix: &str) -> anyhow::Result<PathBuf> {
        let c_question = match role {
            EnumPathRole::Source => format!("Choose starting folder to find {suffix} files"),
            EnumPathRole::Destination => format!("Choose folder to copy found {suffix} files into"),
        };
        write!(
            self.writer,
            "{c_question} [{}]: ",
            self.path_dir_default.display()
        )?;
        self.writer.flush()?;

        let mut c_answer = String::new();
        let n_read = self
            .reader
            .read_line(&mut c_answer)
            .context("failed to read answer")?;
        if n_read == 0 {
            bail!("no folder given: input closed");
        }
        let c_answer = c_answer.trim();
        if c_answer.is_empty() {
            return Ok(self.path_dir_default.clone());
        }
        Ok(expand_home(c_answer, self.path_dir_home.as_deref()))
    }
}

/// Fully resolved inputs of one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub path_dir_src: PathBuf,
    pub path_dir_dst: PathBuf,
    pub spec_options: SpecGatherOptions,
}

impl Cli {
    /// Fill in missing folders through `selector` and build library options.
    pub fn into_config(self, selector: &mut dyn PathSelector) -> anyhow::Result<Config> {
        let path_dir_src = match self.source {
            Some(path) => path,
            None => selector.select(EnumPathRole::Source, &self.suffix)?,
        };
        let path_dir_dst = match self.destination {
            Some(path) => path,
            None => selector.select(EnumPathRole::Destination, &self.suffix)?,
        };

        let path_dir_home = home_dir();
        let path_dir_src = absolutize(&path_dir_src, path_dir_home.as_deref())
            .context("failed to resolve source folder")?;
        let path_dir_dst = absolutize(&path_dir_dst, path_dir_home.as_deref())
            .context("failed to resolve destination folder")?;

        let rule_symlink = if self.skip_symlinks {
            EnumGatherSymlinkStrategy::Skip
        } else {
            EnumGatherSymlinkStrategy::Follow
        };
        Ok(Config {
            path_dir_src,
            path_dir_dst,
            spec_options: SpecGatherOptions {
                suffix: self.suffix,
                rule_symlink,
                if_preserve_metadata: !self.no_preserve_metadata,
                if_dry_run: self.dry_run,
                ..SpecGatherOptions::default()
            },
        })
    }
}

pub fn home_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
}

/// Default folder offered by the prompt: Desktop, then home, then `.`.
pub fn default_prompt_dir() -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| dirs.desktop_dir().map(Path::to_path_buf))
        .or_else(home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Expand a leading `~` to the home folder.
pub fn expand_home(raw: &str, path_dir_home: Option<&Path>) -> PathBuf {
    let Some(path_dir_home) = path_dir_home else {
        return PathBuf::from(raw);
    };
    if raw == "~" {
        return path_dir_home.to_path_buf();
    }
    match raw.strip_prefix("~/") {
        Some(rest) => path_dir_home.join(rest),
        None => PathBuf::from(raw),
    }
}

fn absolutize(path: &Path, path_dir_home: Option<&Path>) -> std::io::Result<PathBuf> {
    let path = match path.to_str() {
        Some(raw) => expand_home(raw, path_dir_home),
        None => path.to_path_buf(),
    };
    std::path::absolute(path)
}
