//! Tab/line-delimited clipboard text
//!
//! Uses the csv crate with a tab delimiter, so cells holding tabs, quotes or
//! newlines survive a copy/paste cycle.

/// Strip one trailing line terminator
fn strip_terminator(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text)
}

/// True when the text is one value to broadcast over the selection
pub fn is_single_value(text: &str) -> bool {
    let text = strip_terminator(text);
    !text.contains('\n') && !text.contains('\t')
}

/// The broadcast value of single-value text
///
/// A cell copied on its own comes back quoted when it holds a `"`; that
/// quoting is undone. Other text is taken literally.
pub fn single_value(text: &str) -> String {
    let line = strip_terminator(text).trim_end_matches('\r');
    if line.starts_with('"') {
        if let [row] = parse_delimited(line).as_slice() {
            if let [value] = row.as_slice() {
                if write_record(row) == line {
                    return value.clone();
                }
            }
        }
    }
    line.to_string()
}

fn write_record(fields: &[String]) -> String {
    // A lone empty field is written as an empty line, not as `""`
    if let [only] = fields {
        if only.is_empty() {
            return String::new();
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    let written = writer
        .write_record(fields)
        .ok()
        .and_then(|_| writer.into_inner().ok())
        .and_then(|bytes| String::from_utf8(bytes).ok());

    match written {
        Some(mut line) => {
            if line.ends_with('\n') {
                line.pop();
            }
            line
        }
        None => fields.join("\t"),
    }
}

/// Serialize a block of cells, one line per row
pub fn to_delimited(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| write_record(row))
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_plain(text: &str) -> Vec<Vec<String>> {
    text.split('\n')
        .map(|line| {
            line.trim_end_matches('\r')
                .split('\t')
                .map(str::to_string)
                .collect()
        })
        .collect()
}

/// Parse delimited text into rows of cells
///
/// Blank lines become rows holding one empty cell, so pasted columns with
/// gaps stay aligned.
pub fn parse_delimited(text: &str) -> Vec<Vec<String>> {
    let text = strip_terminator(text);
    if text.is_empty() {
        return vec![vec![String::new()]];
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut next_line: u64 = 1;
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Clipboard text is not valid delimited data: {}", e);
                return split_plain(text);
            }
        };

        let line = record.position().map(|p| p.line()).unwrap_or(next_line);
        while next_line < line {
            rows.push(vec![String::new()]);
            next_line += 1;
        }
        let embedded: u64 = record
            .iter()
            .map(|field| field.matches('\n').count() as u64)
            .sum();
        rows.push(record.iter().map(str::to_string).collect());
        next_line = line + embedded + 1;
    }

    let total_lines = text.matches('\n').count() as u64 + 1;
    while next_line <= total_lines {
        rows.push(vec![String::new()]);
        next_line += 1;
    }
    rows
}

/// Non-blank lines, trimmed, for transposed paste
pub fn transposed_values(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
