//! Spreadsheet toolkit.
//!
//! Reads `.xlsx` workbooks and delimited text tables and renders every sheet
//! as a markdown table. An `.xlsx` file is a zip container of XML parts; the
//! parts are read with `zip`, then shared strings and sheet XML are parsed
//! with regexes.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use super::{parse_args, require_non_empty, Tool, ToolContext, ToolError, ToolResult, Toolkit};
use crate::utils::{decode_entities, extension_of};

/// Rows rendered per sheet before truncating.
const MAX_ROWS_PER_SHEET: usize = 2_000;

/// Last column of an xlsx sheet (`XFD`), zero-based.
const MAX_COLUMN_INDEX: usize = 16_383;

type ZipReader<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

/// A parsed worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    /// Render as a markdown table; the first row is the header.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("## Sheet: {}\n\n", self.name);
        let width = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        if width == 0 {
            out.push_str("(empty sheet)\n");
            return out;
        }

        let render = |row: &Vec<String>| {
            let cells: Vec<String> = (0..width)
                .map(|i| {
                    row.get(i)
                        .map(|c| c.replace('|', "\\|").replace('\n', " "))
                        .unwrap_or_default()
                })
                .collect();
            format!("| {} |\n", cells.join(" | "))
        };

        out.push_str(&render(&self.rows[0]));
        out.push_str(&format!("|{}\n", " --- |".repeat(width)));
        for row in self.rows.iter().skip(1).take(MAX_ROWS_PER_SHEET) {
            out.push_str(&render(row));
        }
        if self.rows.len() > MAX_ROWS_PER_SHEET + 1 {
            out.push_str(&format!(
                "\n...[{} more rows]\n",
                self.rows.len() - MAX_ROWS_PER_SHEET - 1
            ));
        }
        out
    }
}

/// Reads the table file at `path` and renders it as markdown.
pub fn extract_table_content(path: &Path) -> Result<String, ToolError> {
    let ext = extension_of(&path.to_string_lossy()).unwrap_or_default();
    let sheets = match ext.as_str() {
        "xlsx" | "xlsm" => {
            let bytes = std::fs::read(path).map_err(|e| {
                ToolError::FilesystemError(format!("{}: {}", path.display(), e))
            })?;
            read_workbook(&bytes)?
        }
        "csv" | "tsv" => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                ToolError::FilesystemError(format!("{}: {}", path.display(), e))
            })?;
            let delimiter = if ext == "tsv" { '\t' } else { ',' };
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "table".to_string());
            vec![Sheet {
                name,
                rows: parse_delimited(&text, delimiter),
            }]
        }
        "xls" => {
            return Err(ToolError::UnsupportedFormat(
                "legacy binary .xls workbooks are not supported; convert to .xlsx".to_string(),
            ))
        }
        other => {
            return Err(ToolError::UnsupportedFormat(format!(
                "'{}' is not a spreadsheet extension",
                other
            )))
        }
    };

    Ok(sheets
        .iter()
        .map(Sheet::to_markdown)
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Parses an `.xlsx` workbook from its raw bytes.
pub fn read_workbook(bytes: &[u8]) -> Result<Vec<Sheet>, ToolError> {
    let mut archive = open_zip(bytes)?;

    let shared = match read_member(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml),
        None => Vec::new(),
    };

    let workbook = read_member(&mut archive, "xl/workbook.xml")?
        .ok_or_else(|| ToolError::UnsupportedFormat("missing xl/workbook.xml".to_string()))?;
    let rels = read_member(&mut archive, "xl/_rels/workbook.xml.rels")?
        .map(|xml| parse_relationships(&xml))
        .unwrap_or_default();

    let mut sheets = Vec::new();
    for (index, (name, rel_id)) in parse_sheet_entries(&workbook).into_iter().enumerate() {
        let part = rel_id
            .and_then(|id| rels.get(&id).cloned())
            .map(|target| normalize_target(&target))
            .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", index + 1));

        let xml = read_member(&mut archive, &part)?.ok_or_else(|| {
            ToolError::UnsupportedFormat(format!("missing worksheet part {}", part))
        })?;
        sheets.push(Sheet {
            name,
            rows: parse_sheet_rows(&xml, &shared),
        });
    }

    Ok(sheets)
}

/// Reads one member of a zip container as text.
pub(crate) fn read_zip_text(bytes: &[u8], name: &str) -> Result<Option<String>, ToolError> {
    read_member(&mut open_zip(bytes)?, name)
}

fn open_zip(bytes: &[u8]) -> Result<ZipReader<'_>, ToolError> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| invalid_zip(&e.to_string()))
}

/// Text of member `name`, `None` when the archive has no such member.
fn read_member(archive: &mut ZipReader<'_>, name: &str) -> Result<Option<String>, ToolError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(invalid_zip(&format!("{}: {}", name, e))),
    };

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| invalid_zip(&format!("failed to read {}: {}", name, e)))?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

fn normalize_target(target: &str) -> String {
    let trimmed = target.trim_start_matches('/');
    if trimmed.starts_with("xl/") {
        trimmed.to_string()
    } else {
        format!("xl/{}", trimmed)
    }
}

fn invalid_zip(reason: &str) -> ToolError {
    ToolError::UnsupportedFormat(format!("invalid zip container: {}", reason))
}

macro_rules! cached_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect(concat!("Invalid regex for ", stringify!($name))))
        }
    };
}

cached_regex!(si_re, r"(?s)<si\b[^>]*>(.*?)</si>");
cached_regex!(t_re, r"(?s)<t\b[^>]*>(.*?)</t>");
cached_regex!(sheet_re, r"<sheet\b[^>]*>");
cached_regex!(relationship_re, r"<Relationship\b[^>]*>");
cached_regex!(row_re, r"(?s)<row\b[^>]*>(.*?)</row>");
cached_regex!(cell_re, r"(?s)<c\b([^>]*?)(?:/>|>(.*?)</c>)");
cached_regex!(v_re, r"(?s)<v>(.*?)</v>");

/// Value of attribute `name` inside a tag string.
fn attr(tag: &str, name: &str) -> Option<String> {
    let needle = format!("{}=\"", name);
    let mut search = 0;
    while let Some(found) = tag[search..].find(&needle) {
        let start = search + found;
        // reject suffix matches such as `r:id` when looking for `id`
        let boundary = start == 0
            || tag[..start]
                .chars()
                .last()
                .is_some_and(|c| c.is_whitespace());
        let value_start = start + needle.len();
        if boundary {
            let end = tag[value_start..].find('"')? + value_start;
            return Some(decode_entities(&tag[value_start..end]));
        }
        search = value_start;
    }
    None
}

fn parse_shared_strings(xml: &str) -> Vec<String> {
    si_re()
        .captures_iter(xml)
        .map(|si| {
            t_re()
                .captures_iter(&si[1])
                .map(|t| decode_entities(&t[1]))
                .collect::<String>()
        })
        .collect()
}

fn parse_sheet_entries(workbook: &str) -> Vec<(String, Option<String>)> {
    sheet_re()
        .find_iter(workbook)
        .filter_map(|m| {
            let tag = m.as_str();
            let name = attr(tag, "name")?;
            Some((name, attr(tag, "r:id")))
        })
        .collect()
}

fn parse_relationships(xml: &str) -> HashMap<String, String> {
    relationship_re()
        .find_iter(xml)
        .filter_map(|m| {
            let tag = m.as_str();
            Some((attr(tag, "Id")?, attr(tag, "Target")?))
        })
        .collect()
}

/// Zero-based column index from a cell reference like `AB12`.
///
/// `None` for references without letters or beyond column `XFD`.
fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<char> = reference
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let index = letters
        .iter()
        .fold(0usize, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1));
    Some(index - 1).filter(|&i| i <= MAX_COLUMN_INDEX)
}

fn parse_sheet_rows(xml: &str, shared: &[String]) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for row in row_re().captures_iter(xml) {
        let mut cells: Vec<String> = Vec::new();
        for cell in cell_re().captures_iter(&row[1]) {
            let attrs = &cell[1];
            let body = cell.get(2).map(|m| m.as_str()).unwrap_or("");
            let column = attr(attrs, "r")
                .and_then(|r| column_index(&r))
                .unwrap_or(cells.len());

            let raw = v_re().captures(body).map(|v| decode_entities(&v[1]));
            let value = match attr(attrs, "t").as_deref() {
                Some("s") => raw
                    .and_then(|i| i.trim().parse::<usize>().ok())
                    .and_then(|i| shared.get(i).cloned())
                    .unwrap_or_default(),
                Some("inlineStr") => t_re()
                    .captures_iter(body)
                    .map(|t| decode_entities(&t[1]))
                    .collect(),
                Some("b") => match raw.as_deref() {
                    Some("1") => "TRUE".to_string(),
                    Some(_) => "FALSE".to_string(),
                    None => String::new(),
                },
                _ => raw.unwrap_or_default(),
            };

            if cells.len() <= column {
                cells.resize(column + 1, String::new());
            }
            cells[column] = value;
        }
        rows.push(cells);
    }
    rows
}

/// Splits delimited text into rows, honouring double-quoted fields.
fn parse_delimited(text: &str, delimiter: char) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == delimiter && !in_quotes => row.push(std::mem::take(&mut field)),
            '\r' if !in_quotes => {}
            '\n' if !in_quotes => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            c => field.push(c),
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

#[derive(Debug, Deserialize)]
struct ExtractExcelParams {
    document_path: String,
}

/// Toolkit exposing `extract_excel_content`.
#[derive(Debug, Default)]
pub struct ExcelToolkit;

impl ExcelToolkit {
    pub fn new() -> Self {
        Self
    }
}

impl Toolkit for ExcelToolkit {
    fn name(&self) -> &str {
        "excel"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(ExtractExcelTool)]
    }
}

struct ExtractExcelTool;

#[async_trait]
impl Tool for ExtractExcelTool {
    fn name(&self) -> &str {
        "extract_excel_content"
    }

    fn description(&self) -> &str {
        "Extract every sheet of an .xlsx, .csv or .tsv file as markdown tables."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "document_path": {
                    "type": "string",
                    "description": "Local path of the spreadsheet"
                }
            },
            "required": ["document_path"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let params: ExtractExcelParams = parse_args(args)?;
        require_non_empty("document_path", &params.document_path)?;

        let path = std::path::PathBuf::from(&params.document_path);
        let content = tokio::task::spawn_blocking(move || extract_table_content(&path))
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Reader task failed: {}", e)))?;

        match content {
            Ok(markdown) => Ok(ToolResult::success(markdown)),
            Err(e) => Ok(ToolResult::failure(e.to_string())),
        }
    }
}
