//! CSV loading.
//!
//! Every data row becomes one [`Document`] whose content lists the row as
//! `header: value` lines, so column names stay next to their values once the
//! row is embedded.

use std::path::Path;

use tracing::debug;

use super::{Document, RagError};

/// Dialect of the CSV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: char,
    pub quote: char,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote: '"',
        }
    }
}

/// Parses CSV text into records.
///
/// Quoted fields may contain the delimiter, line breaks and doubled quotes.
/// A quote in the middle of an unquoted field is kept as a literal
/// character. Blank lines are skipped.
pub fn parse_csv(text: &str, opts: CsvOptions) -> Result<Vec<Vec<String>>, RagError> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut quote_line = 1;
    let mut chars = text.chars().peekable();

    let mut end_record = |record: &mut Vec<String>, field: &mut String| {
        record.push(std::mem::take(field));
        let done = std::mem::take(record);
        if !(done.len() == 1 && done[0].is_empty()) {
            records.push(done);
        }
    };

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == opts.quote {
                if chars.peek() == Some(&opts.quote) {
                    chars.next();
                    field.push(opts.quote);
                } else {
                    in_quotes = false;
                }
            } else {
                if c == '\n' {
                    line += 1;
                }
                field.push(c);
            }
            continue;
        }

        match c {
            // A quote opens a quoted field only at the start of a field
            c if c == opts.quote && field.is_empty() => {
                in_quotes = true;
                quote_line = line;
            }
            c if c == opts.delimiter => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                end_record(&mut record, &mut field);
                line += 1;
            }
            c => field.push(c),
        }
    }

    if in_quotes {
        return Err(RagError::Csv {
            line: quote_line,
            message: "unterminated quoted field".to_string(),
        });
    }
    if !field.is_empty() || !record.is_empty() {
        end_record(&mut record, &mut field);
    }

    Ok(records)
}

/// Turns parsed records (header first) into documents.
pub fn records_to_documents(records: Vec<Vec<String>>, source: &str) -> Vec<Document> {
    let mut rows = records.into_iter();
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let header: Vec<String> = header.into_iter().map(|h| h.trim().to_string()).collect();

    rows.enumerate()
        .map(|(i, row)| {
            if row.len() > header.len() {
                debug!(row = i, extra = row.len() - header.len(), "ignoring extra CSV fields");
            }
            let content = header
                .iter()
                .enumerate()
                .map(|(col, name)| {
                    let value = row.get(col).map_or("", |v| v.trim());
                    format!("{name}: {value}")
                })
                .collect::<Vec<_>>()
                .join("\n");
            Document::new(content)
                .with_metadata("source", source)
                .with_metadata("row", i)
        })
        .collect()
}

/// Loads a CSV file as one document per row.
pub async fn load_csv_documents(path: &Path, opts: CsvOptions) -> Result<Vec<Document>, RagError> {
    if !tokio::fs::try_exists(path).await? {
        return Err(RagError::MissingCsv(path.to_path_buf()));
    }
    let text = tokio::fs::read_to_string(path).await?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    let records = parse_csv(text, opts)?;
    Ok(records_to_documents(records, &path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quoted_fields() {
        let text = "name,description,price\n\
                    \"Trail Runner\",\"Light, grippy \"\"all-terrain\"\" shoe\",89.99\r\n\
                    Rain Jacket,\"Two\nlines\",120\n\n";
        let records = parse_csv(text, CsvOptions::default()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[1],
            vec![
                "Trail Runner".to_string(),
                "Light, grippy \"all-terrain\" shoe".to_string(),
                "89.99".to_string()
            ]
        );
        assert_eq!(records[2][1], "Two\nlines");
    }

    #[test]
    fn test_parse_without_trailing_newline() {
        let records = parse_csv("a,b\n1,", CsvOptions::default()).unwrap();
        assert_eq!(records, vec![vec!["a", "b"], vec!["1", ""]]);
    }

    #[test]
    fn test_parse_errors_report_line() {
        let err = parse_csv("a,b\n1,\"open\n2,3\n", CsvOptions::default()).unwrap_err();
        assert!(matches!(err, RagError::Csv { line: 2, .. }));

    }

    #[test]
    fn test_quote_inside_unquoted_field_is_literal() {
        let text = "name,size\nPizza stone 12\" round,12\"\nx\"y,1\n";
        let records = parse_csv(text, CsvOptions::default()).unwrap();
        assert_eq!(records[1], vec!["Pizza stone 12\" round", "12\""]);
        assert_eq!(records[2], vec!["x\"y", "1"]);
    }

    #[test]
    fn test_custom_dialect() {
        let opts = CsvOptions {
            delimiter: ';',
            quote: '\'',
        };
        let records = parse_csv("a;b\n'x;y';z\n", opts).unwrap();
        assert_eq!(records[1], vec!["x;y", "z"]);
    }

    #[test]
    fn test_rows_become_documents() {
        let records = parse_csv(
            "name, price\nMug , 12\nBottle\n",
            CsvOptions::default(),
        )
        .unwrap();
        let docs = records_to_documents(records, "products.csv");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "name: Mug\nprice: 12");
        assert_eq!(docs[1].content, "name: Bottle\nprice: ");
        assert_eq!(docs[1].metadata["row"], 1);
        assert_eq!(docs[1].metadata["source"], "products.csv");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_csv_documents(&dir.path().join("products.csv"), CsvOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::MissingCsv(_)));
    }
}
