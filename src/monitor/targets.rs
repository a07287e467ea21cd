//! Startup target list.

use std::io::Read;
use std::path::Path;

use thiserror::Error;

use crate::probe::{ParsedTarget, TargetError, is_blank, trim_target};

/// Errors while loading the target list.
#[derive(Debug, Error)]
pub enum TargetListError {
    /// Failed to read the list.
    #[error("failed to read targets: {0}")]
    Io(#[from] std::io::Error),
}

/// Ordered, immutable list of target lines.
///
/// Blank lines are dropped on load; everything else is kept verbatim
/// (trimmed) in its original order, including lines that will not parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetList {
    targets: Vec<String>,
}

impl TargetList {
    /// Split newline-separated text into targets.
    pub fn parse(text: &str) -> Self {
        let targets = text
            .split('\n')
            .filter(|line| !is_blank(line))
            .map(|line| trim_target(line).to_owned())
            .collect();
        Self { targets }
    }

    /// Read every line from `reader`.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, TargetListError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(Self::parse(&text))
    }

    /// Read a target file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TargetListError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(Self::parse(&text))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Lines that will be reported as malformed when probed.
    pub fn invalid(&self) -> Vec<TargetError> {
        self.iter()
            .filter_map(|line| ParsedTarget::parse(line).err())
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for TargetList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let targets = iter
            .into_iter()
            .map(Into::into)
            .filter(|line: &String| !is_blank(line))
            .map(|line| trim_target(&line).to_owned())
            .collect();
        Self { targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_skips_blank_lines() {
        let list = TargetList::parse("http://a.example/\r\n\r\n   \nhttp://b.example/\n");
        assert_eq!(
            list.iter().collect::<Vec<_>>(),
            vec!["http://a.example/", "http://b.example/"]
        );
    }

    #[test]
    fn test_parse_keeps_order_and_invalid_lines() {
        let list = TargetList::parse("http://c.example/\nnot a url\nhttp://a.example/");
        assert_eq!(list.len(), 3);
        assert_eq!(list.iter().nth(1), Some("not a url"));

        let invalid = list.invalid();
        assert_eq!(invalid.len(), 1);
        assert!(matches!(invalid[0], TargetError::Malformed { .. }));
    }

    #[test]
    fn test_from_reader_and_path() {
        let list = TargetList::from_reader("http://x.example/\n\n".as_bytes()).unwrap();
        assert_eq!(list.len(), 1);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "http://one.example/").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "http://two.example/").unwrap();
        let list = TargetList::from_path(file.path()).unwrap();
        assert_eq!(list.len(), 2);

        assert!(TargetList::from_path("/nonexistent/targets.txt").is_err());
    }

    #[test]
    fn test_from_iterator() {
        let list: TargetList = ["", "http://a.example/", " \r"].into_iter().collect();
        assert_eq!(list.len(), 1);
        assert!(TargetList::default().is_empty());
    }
}
