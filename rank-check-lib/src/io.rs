//! Keyword input and ranking output.
//!
//! Keywords are read from the first column of a CSV (or plain one-per-line)
//! file. Records are written as CSV with the columns
//! `Keyword, Position, URL, Title, Snippet`, or as a JSON array.

use crate::error::RankCheckError;
use crate::types::RankingRecord;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Header row of the tabular output.
pub const CSV_HEADERS: [&str; 5] = ["Keyword", "Position", "URL", "Title", "Snippet"];

/// Read keywords from a file, one per row (first CSV column).
///
/// # Errors
///
/// Returns `RankCheckError::FileError` if the file cannot be opened or
/// contains no keywords.
pub fn read_keywords_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<String>, RankCheckError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        RankCheckError::file_error(path.to_string_lossy(), format!("Cannot open keyword file: {}", e))
    })?;

    let keywords = read_keywords(file)
        .map_err(|e| RankCheckError::file_error(path.to_string_lossy(), e.to_string()))?;

    if keywords.is_empty() {
        return Err(RankCheckError::file_error(
            path.to_string_lossy(),
            "No keywords found in file",
        ));
    }

    tracing::info!(count = keywords.len(), path = %path.display(), "loaded keywords");
    Ok(keywords)
}

/// Read keywords from any CSV source.
///
/// Blank rows and rows starting with `#` are skipped. A first row that
/// carries the output header columns (at least `Keyword,Position`) is
/// skipped too, so a previous results file can be fed back in; a lone
/// `keyword` cell is a keyword. Duplicates are kept.
pub fn read_keywords<R: Read>(reader: R) -> Result<Vec<String>, RankCheckError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut keywords = Vec::new();
    for (index, row) in rdr.records().enumerate() {
        let row = row?;
        let Some(first) = row.get(0).map(str::trim) else {
            continue;
        };
        if first.is_empty() || first.starts_with('#') {
            continue;
        }
        if index == 0 && is_header_row(&row) {
            continue;
        }
        keywords.push(first.to_string());
    }

    Ok(keywords)
}

fn is_header_row(row: &csv::StringRecord) -> bool {
    row.len() > 1
        && row
            .iter()
            .zip(CSV_HEADERS)
            .all(|(cell, header)| cell.eq_ignore_ascii_case(header))
}

/// Write records as CSV with a header row.
///
/// An unknown position is written as an empty cell.
pub fn write_csv<W: Write>(writer: W, records: &[RankingRecord]) -> Result<(), RankCheckError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADERS)?;

    for record in records {
        let position = record.position_cell();
        wtr.write_record([
            record.keyword.as_str(),
            position.as_str(),
            record.url.as_str(),
            record.title.as_str(),
            record.snippet.as_str(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write records to a CSV file, creating or truncating it.
pub fn write_csv_file<P: AsRef<Path>>(
    path: P,
    records: &[RankingRecord],
) -> Result<(), RankCheckError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| {
        RankCheckError::file_error(path.to_string_lossy(), format!("Cannot create output file: {}", e))
    })?;
    write_csv(file, records)?;
    tracing::info!(count = records.len(), path = %path.display(), "wrote results");
    Ok(())
}

/// Write records as a pretty-printed JSON array.
pub fn write_json<W: Write>(mut writer: W, records: &[RankingRecord]) -> Result<(), RankCheckError> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writeln!(writer)?;
    Ok(())
}
