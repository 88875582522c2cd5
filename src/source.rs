//! Where chart bytes come from.
//!
//! A [`ChartSource`] lists chart files by extension and reads their bytes.
//! [`DirectorySource`] walks an unpacked archive directory; [`FileListSource`]
//! serves an explicit list of files. Sibling charts are decoded in parallel
//! with [`load_tick_charts`].

use crate::chart::{ChartFormat, DecodeOptions, TickChart};
use crate::error::Result;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Read-only access to chart files.
pub trait ChartSource: Sync {
    /// Paths of every entry with the given extension (without the dot),
    /// sorted.
    fn list_by_extension(&self, extension: &str) -> Result<Vec<PathBuf>>;

    /// Full contents of one entry.
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case(extension))
}

/// An unpacked archive directory, searched recursively.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ChartSource for DirectorySource {
    fn list_by_extension(&self, extension: &str) -> Result<Vec<PathBuf>> {
        let mut paths: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(root = %self.root.display(), error = %e, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && has_extension(entry.path(), extension))
            .map(|entry| entry.into_path())
            .collect();
        paths.sort();

        debug!(root = %self.root.display(), extension, found = paths.len(), "listed charts");
        Ok(paths)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(path)?)
    }
}

/// An explicit list of chart files.
#[derive(Debug, Clone, Default)]
pub struct FileListSource {
    paths: Vec<PathBuf>,
}

impl FileListSource {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }
}

impl ChartSource for FileListSource {
    fn list_by_extension(&self, extension: &str) -> Result<Vec<PathBuf>> {
        let mut paths: Vec<PathBuf> = self
            .paths
            .iter()
            .filter(|path| has_extension(path, extension))
            .cloned()
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(path)?)
    }
}

/// Chart name of a path: its file stem.
pub fn chart_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Decodes every tick-table chart of a source in parallel.
///
/// # Returns
///
/// One `(path, result)` pair per chart file, in path order. A chart that
/// fails to read or decode does not stop the others.
///
/// # Errors
///
/// Returns an error only if the source can't be listed.
pub fn load_tick_charts(
    source: &dyn ChartSource,
    options: &DecodeOptions,
) -> Result<Vec<(PathBuf, Result<TickChart>)>> {
    let paths = source.list_by_extension(ChartFormat::TickTable.extension())?;

    let results: Vec<(PathBuf, Result<TickChart>)> = paths
        .par_iter()
        .map(|path| {
            let chart = source
                .read(path)
                .and_then(|bytes| TickChart::decode(&bytes, options))
                .map(|chart| chart.with_name(chart_name(path)));
            (path.clone(), chart)
        })
        .collect();

    for (path, result) in &results {
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "failed to load chart");
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{ChartEvent, EncodeOptions, TempoRecord};
    use crate::error::ChartError;
    use std::collections::HashMap;

    /// In-memory source keyed by path.
    struct MemorySource {
        files: HashMap<PathBuf, Vec<u8>>,
    }

    impl ChartSource for MemorySource {
        fn list_by_extension(&self, extension: &str) -> Result<Vec<PathBuf>> {
            let mut paths: Vec<PathBuf> = self
                .files
                .keys()
                .filter(|path| has_extension(path, extension))
                .cloned()
                .collect();
            paths.sort();
            Ok(paths)
        }

        fn read(&self, path: &Path) -> Result<Vec<u8>> {
            self.files.get(path).cloned().ok_or_else(|| {
                ChartError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"))
            })
        }
    }

    fn encoded_chart() -> Vec<u8> {
        let mut chart = TickChart::new("");
        chart.tempos = vec![TempoRecord::new(0.0, 500_000, 0)];
        chart.events = vec![ChartEvent::new(60, 0.0, 0.5)];
        chart.encode(&EncodeOptions::default()).unwrap()
    }

    #[test]
    fn test_failures_reported_per_chart() {
        let mut files = HashMap::new();
        files.insert(PathBuf::from("songs/a/vocals.xmk"), encoded_chart());
        files.insert(PathBuf::from("songs/a/broken.xmk"), vec![8, 0, 0]);
        files.insert(PathBuf::from("songs/a/notes.fsgmub"), vec![]);
        let source = MemorySource { files };

        let results = load_tick_charts(&source, &DecodeOptions::default()).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, PathBuf::from("songs/a/broken.xmk"));
        assert!(results[0].1.is_err());

        let chart = results[1].1.as_ref().unwrap();
        assert_eq!(chart.name, "vocals");
        assert_eq!(chart.events.len(), 1);
    }

    #[test]
    fn test_directory_source() {
        let root = std::env::temp_dir().join(format!("chartconv-source-{}", std::process::id()));
        let nested = root.join("songs").join("a");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("guitar_3x2.XMK"), encoded_chart()).unwrap();
        fs::write(nested.join("readme.txt"), b"hi").unwrap();

        let source = DirectorySource::new(&root);
        let paths = source.list_by_extension("xmk").unwrap();
        assert_eq!(paths, vec![nested.join("guitar_3x2.XMK")]);
        assert_eq!(chart_name(&paths[0]), "guitar_3x2");

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_missing_directory_lists_nothing() {
        let root = std::env::temp_dir().join(format!("chartconv-missing-{}", std::process::id()));
        let source = DirectorySource::new(&root);
        assert!(source.list_by_extension("xmk").unwrap().is_empty());
    }

    #[test]
    fn test_file_list_source() {
        let source = FileListSource::new([
            PathBuf::from("b.xmk"),
            PathBuf::from("a.xmk"),
            PathBuf::from("c.mid"),
        ]);
        assert_eq!(
            source.list_by_extension("xmk").unwrap(),
            vec![PathBuf::from("a.xmk"), PathBuf::from("b.xmk")]
        );
    }
}
