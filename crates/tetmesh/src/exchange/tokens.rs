use std::path::Path;
use std::str::FromStr;

use crate::error::ExchangeError;

/// Which characters separate the fields of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiters {
    // TetGen and the derived-geometry sidecar
    Whitespace,
    // ABAQUS files as written by CUBIT use `, ` between fields
    WhitespaceOrComma,
}

/// Clean up a raw line: ignore anything after a comment then cleanly split it.
///
/// An empty result means the line carried no data and should be skipped.
pub fn tokenize(line: &str, delimiters: Delimiters) -> Vec<&str> {
    let content = line.split('#').next().unwrap_or_default();
    match delimiters {
        Delimiters::Whitespace => content.split_whitespace().collect(),
        Delimiters::WhitespaceOrComma => content
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .collect(),
    }
}

/// A line which carried data, with the 1-based line number it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<'a> {
    pub line: usize,
    pub tokens: Vec<&'a str>,
}

impl<'a> Record<'a> {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// A format violation located at this record.
    pub fn error(&self, path: &Path, message: impl Into<String>) -> ExchangeError {
        ExchangeError::format(path, Some(self.line), message)
    }

    /// Parse the token in `column`, naming the field in any error.
    pub fn field<T: FromStr>(&self, path: &Path, column: usize, name: &str) -> Result<T, ExchangeError> {
        let raw = self
            .tokens
            .get(column)
            .ok_or_else(|| self.error(path, format!("missing {name} in column {}", column + 1)))?;
        raw.parse::<T>()
            .map_err(|_| self.error(path, format!("invalid {name}: `{raw}`")))
    }

    /// Fail unless the record has exactly `count` fields.
    pub fn expect_len(&self, path: &Path, count: usize, what: &str) -> Result<(), ExchangeError> {
        if self.len() != count {
            return Err(self.error(
                path,
                format!("{what} needs {count} fields, found {}", self.len()),
            ));
        }
        Ok(())
    }
}

/// Tokenize every line of `text`, dropping lines without data.
///
/// `first_line` is the 1-based number of the first line of `text` within
/// its file, for callers that consumed a header themselves.
pub fn records(text: &str, delimiters: Delimiters, first_line: usize) -> Vec<Record<'_>> {
    text.lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let tokens = tokenize(line, delimiters);
            if tokens.is_empty() {
                None
            } else {
                Some(Record {
                    line: first_line + index,
                    tokens,
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("  1  0.5 1e-3  # a comment", Delimiters::Whitespace),
            vec!["1", "0.5", "1e-3"]
        );
        assert!(tokenize("# only a comment", Delimiters::Whitespace).is_empty());
        assert!(tokenize(" \t ", Delimiters::Whitespace).is_empty());

        // commas only split when asked to
        assert_eq!(tokenize("1, 2.0,3", Delimiters::Whitespace), vec!["1,", "2.0,3"]);
        assert_eq!(
            tokenize("1, 2.0,3 ,\t4", Delimiters::WhitespaceOrComma),
            vec!["1", "2.0", "3", "4"]
        );
        assert_eq!(
            tokenize("*ELEMENT, TYPE=C3D4, ELSET=EB1", Delimiters::WhitespaceOrComma),
            vec!["*ELEMENT", "TYPE=C3D4", "ELSET=EB1"]
        );
    }

    #[test]
    fn test_records() {
        let text = "# header comment\n3 4\n\n  # nothing\n1 2 3\r\n";
        let parsed = records(text, Delimiters::Whitespace, 1);
        assert_eq!(
            parsed,
            vec![
                Record {
                    line: 2,
                    tokens: vec!["3", "4"]
                },
                Record {
                    line: 5,
                    tokens: vec!["1", "2", "3"]
                },
            ]
        );

        // offset line numbers for text that starts part way into a file
        assert_eq!(records("1 2", Delimiters::Whitespace, 4)[0].line, 4);
    }

    #[test]
    fn test_record_fields() {
        let path = Path::new("cube.node");
        let record = Record {
            line: 7,
            tokens: vec!["4", "x"],
        };
        assert_eq!(record.field::<usize>(path, 0, "count").unwrap(), 4);

        let e = record.field::<f64>(path, 1, "coordinate").unwrap_err();
        assert_eq!(e.to_string(), "cube.node:7: invalid coordinate: `x`");

        let e = record.field::<f64>(path, 2, "coordinate").unwrap_err();
        assert!(e.to_string().contains("missing coordinate"));

        assert!(record.expect_len(path, 2, "header").is_ok());
        assert!(record.expect_len(path, 3, "header").is_err());
    }
}
