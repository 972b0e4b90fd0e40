//! Tabular file parser
//!
//! Reads a spreadsheet (.xlsx/.xls via calamine) or delimited-text (.csv)
//! byte payload into an ordered sequence of header -> value rows. The first
//! physical row is always the header row; fully blank rows are dropped.
//!
//! Spreadsheet cell stringification: numeric cells with no fractional part
//! render as integer literals, booleans as "true"/"false", and formula cells
//! render their formula source text rather than the evaluated value. The
//! formula behavior is a documented limitation of the import format, kept
//! intentionally.

use calamine::{Data, Range, Reader, Xls, Xlsx};
use std::io::Cursor;
use thiserror::Error;

/// Tabular parse errors
#[derive(Debug, Error)]
pub enum ParseError {
    /// File extension is neither a recognized spreadsheet nor delimited-text suffix
    #[error("Unsupported file format: {0} (expected .xlsx, .xls or .csv)")]
    UnsupportedFormat(String),

    /// Workbook is unreadable or structurally invalid
    #[error("Malformed spreadsheet: {0}")]
    Workbook(String),

    /// Delimited text is unreadable
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    /// File has fewer than two physical rows (header + at least one data row)
    #[error("File must contain a header row and at least one data row")]
    TooFewRows,
}

/// Input format, inferred from the filename extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Spreadsheet,
    Delimited,
}

/// One parsed data row: an ordered header -> raw cell text mapping,
/// tagged with its physical line number in the source file
#[derive(Debug, Clone, Default)]
pub struct Row {
    line: usize,
    cells: Vec<(String, String)>,
}

impl Row {
    fn new(line: usize) -> Self {
        Self {
            line,
            cells: Vec::new(),
        }
    }

    fn push(&mut self, header: String, value: String) {
        self.cells.push((header, value));
    }

    /// Physical 1-based line number in the source file (header is line 1)
    pub fn line(&self) -> usize {
        self.line
    }

    /// Iterate cells in column order
    pub fn cells(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(h, v)| (h.as_str(), v.as_str()))
    }

    /// Look up a cell by case-insensitive exact header match
    pub fn get_ci(&self, header: &str) -> Option<&str> {
        let wanted = header.to_lowercase();
        self.cells
            .iter()
            .find(|(h, _)| h.to_lowercase() == wanted)
            .map(|(_, v)| v.as_str())
    }

    fn has_data(&self) -> bool {
        self.cells.iter().any(|(_, v)| !v.is_empty())
    }
}

/// Infer the input format from the filename extension
pub fn detect_format(filename: &str) -> Result<FileFormat, ParseError> {
    let lower = filename.to_lowercase();
    if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
        Ok(FileFormat::Spreadsheet)
    } else if lower.ends_with(".csv") {
        Ok(FileFormat::Delimited)
    } else {
        Err(ParseError::UnsupportedFormat(filename.to_string()))
    }
}

/// Parse a file payload into data rows
///
/// Fails with [`ParseError::TooFewRows`] unless the file holds a header row
/// plus at least one physical data row.
pub fn parse_bytes(filename: &str, bytes: &[u8]) -> Result<Vec<Row>, ParseError> {
    match detect_format(filename)? {
        FileFormat::Spreadsheet => parse_spreadsheet(filename, bytes),
        FileFormat::Delimited => parse_csv(bytes),
    }
}

fn parse_spreadsheet(filename: &str, bytes: &[u8]) -> Result<Vec<Row>, ParseError> {
    let lower = filename.to_lowercase();
    let cursor = Cursor::new(bytes);

    let (range, formulas) = if lower.ends_with(".xlsx") {
        let mut workbook =
            Xlsx::new(cursor).map_err(|e| ParseError::Workbook(e.to_string()))?;
        let sheet = first_sheet_name(&workbook.sheet_names())?;
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| ParseError::Workbook(e.to_string()))?;
        let formulas = workbook.worksheet_formula(&sheet).ok();
        (range, formulas)
    } else {
        let mut workbook =
            Xls::new(cursor).map_err(|e| ParseError::Workbook(e.to_string()))?;
        let sheet = first_sheet_name(&workbook.sheet_names())?;
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| ParseError::Workbook(e.to_string()))?;
        let formulas = workbook.worksheet_formula(&sheet).ok();
        (range, formulas)
    };

    range_to_rows(&range, formulas.as_ref())
}

fn first_sheet_name(names: &[String]) -> Result<String, ParseError> {
    names
        .first()
        .cloned()
        .ok_or_else(|| ParseError::Workbook("workbook contains no sheets".to_string()))
}

fn range_to_rows(
    range: &Range<Data>,
    formulas: Option<&Range<String>>,
) -> Result<Vec<Row>, ParseError> {
    if range.height() < 2 {
        return Err(ParseError::TooFewRows);
    }

    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut row_iter = range.rows().enumerate();

    let headers: Vec<String> = match row_iter.next() {
        Some((_, header_row)) => header_row
            .iter()
            .map(|cell| cell_to_string(cell).trim().to_string())
            .collect(),
        None => return Err(ParseError::TooFewRows),
    };

    let mut rows = Vec::new();
    for (i, data_row) in row_iter {
        let mut row = Row::new(start_row as usize + i + 1);
        for (j, cell) in data_row.iter().enumerate().take(headers.len()) {
            let abs = (start_row + i as u32, start_col + j as u32);
            // Formula cells keep their source text, not the cached value
            let value = match formulas
                .and_then(|f| f.get_value(abs))
                .filter(|f| !f.is_empty())
            {
                Some(formula) => formula.clone(),
                None => cell_to_string(cell),
            };
            row.push(headers[j].clone(), value);
        }
        if row.has_data() {
            rows.push(row);
        }
    }

    Ok(rows)
}

fn parse_csv(bytes: &[u8]) -> Result<Vec<Row>, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let mut records = Vec::new();
    for result in reader.records() {
        records.push(result?);
    }

    if records.len() < 2 {
        return Err(ParseError::TooFewRows);
    }

    let headers: Vec<String> = records[0].iter().map(|h| h.trim().to_string()).collect();

    let mut rows = Vec::new();
    for (i, record) in records.iter().enumerate().skip(1) {
        // The reader skips fully empty lines, so the record position is the
        // only reliable source of the physical line number
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(i + 1);
        let mut row = Row::new(line);
        for (j, value) in record.iter().enumerate().take(headers.len()) {
            row.push(headers[j].clone(), value.trim().to_string());
        }
        if row.has_data() {
            rows.push(row);
        }
    }

    Ok(rows)
}

/// Render a spreadsheet cell as text
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Bool(b) => {
            if *b {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_number(*f),
        Data::DateTime(dt) => format_number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}

/// Whole-valued floats render as integer literals, otherwise default decimal text
fn format_number(f: f64) -> String {
    if f.is_finite() && f == (f as i64) as f64 {
        (f as i64).to_string()
    } else {
        f.to_string()
    }
}
