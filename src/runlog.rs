//! Output folder layout and the human-readable run log.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::data::model::IsotopeMode;

pub const LOG_FILE_NAME: &str = "Log file.txt";
pub const FIGURES_DIR: &str = "Figures";
pub const RESULTS_DIR: &str = "Results";
pub const RT_FIGURES_DIR: &str = "Retention time figures";

const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Append-only sink for run events, one line per message.
pub trait RunLog {
    fn append(&mut self, message: &str) -> io::Result<()>;
}

/// In-memory log, used by tests and dry runs.
impl RunLog for Vec<String> {
    fn append(&mut self, message: &str) -> io::Result<()> {
        self.push(message.to_string());
        Ok(())
    }
}

/// Log file reopened in append mode for every write.
#[derive(Debug, Clone)]
pub struct FileRunLog {
    path: PathBuf,
}

impl FileRunLog {
    /// Create (or truncate) the log with its header line.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let mut file = fs::File::create(&path)?;
        writeln!(file, "Log file created at {}", Local::now().format(STAMP_FORMAT))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RunLog for FileRunLog {
    fn append(&mut self, message: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        writeln!(file, "{message}; {}", Local::now().format(STAMP_FORMAT))
    }
}

/// `<root>/<name>` with its Figures and Results subfolders and a fresh log.
#[derive(Debug, Clone)]
pub struct OutputFolder {
    pub root: PathBuf,
    pub figures: PathBuf,
    pub results: PathBuf,
    pub log: FileRunLog,
}

impl OutputFolder {
    pub fn create(parent: &Path, name: &str, mode: IsotopeMode) -> io::Result<Self> {
        let root = parent.join(name);
        fs::create_dir_all(&root)?;
        let mut log = FileRunLog::create(root.join(LOG_FILE_NAME))?;
        log.append(&format!("Isotope type: {}", mode.display_name()))?;

        let figures = root.join(FIGURES_DIR);
        fs::create_dir_all(&figures)?;
        let results = root.join(RESULTS_DIR);
        fs::create_dir_all(&results)?;

        log::info!("Output folder ready at {}", root.display());
        Ok(Self {
            root,
            figures,
            results,
            log,
        })
    }

    /// Folder for near-tie figures, created on first use.
    pub fn rt_figures(&self) -> io::Result<PathBuf> {
        let dir = self.root.join(RT_FIGURES_DIR);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_layout_and_log_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = OutputFolder::create(dir.path(), "Run 1", IsotopeMode::Deuterium).unwrap();
        assert!(out.figures.is_dir());
        assert!(out.results.is_dir());
        assert!(out.rt_figures().unwrap().is_dir());

        out.log.append("Number of linearity standards analyzed: 3").unwrap();
        let text = fs::read_to_string(out.log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Log file created at "));
        assert!(lines[1].starts_with("Isotope type: δD; "));
        assert!(lines[2].starts_with("Number of linearity standards analyzed: 3; "));
    }

    #[test]
    fn recreating_the_folder_starts_a_fresh_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = OutputFolder::create(dir.path(), "Run", IsotopeMode::Carbon).unwrap();
        first.log.append("old entry").unwrap();
        let second = OutputFolder::create(dir.path(), "Run", IsotopeMode::Carbon).unwrap();
        let text = fs::read_to_string(second.log.path()).unwrap();
        assert!(!text.contains("old entry"));
        assert!(text.contains("Isotope type: δC"));
    }
}
