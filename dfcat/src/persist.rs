// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Lossless persistence for registries
//!
//! The persisted form is line-oriented text:
//!
//! - Line 1 is a JSON schema descriptor:
//!   `{"columns":[{"name":"model","kind":"set"},...],"key_column":"key","locator_column":"locator"}`
//!   with metadata columns listed in schema-establishment order.
//! - Every following line is one record, in registry iteration order, as
//!   comma-delimited fields: key, locator, then one field per descriptor
//!   column. A field containing a comma, double quote, CR or LF is wrapped
//!   in double quotes with embedded quotes doubled.
//!
//! Inside a field, every primitive is its JSON encoding, which preserves
//! the primitive type (`"7"` vs `7` vs `7.5` vs `true`) and escapes all
//! control characters, so a row can never span lines. A set cell joins its
//! encoded elements with the `;` sub-delimiter after escaping `\` as `\\`
//! and `;` as `\;` within each element. An absent cell is the empty field;
//! the empty text scalar still encodes as `""`, so absence stays
//! distinguishable from emptiness.
//!
//! Round-trip contract: `save(load(save(r))) == save(r)` byte-for-byte for
//! any valid registry, including the empty one.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{CatalogError, CatalogResult};
use crate::registry::{Record, Registry};
use crate::value::{canonicalize, CellValue, ColumnKind, Scalar};

const DELIMITER: char = ',';
const SUB_DELIMITER: char = ';';
const KEY_COLUMN: &str = "key";
const LOCATOR_COLUMN: &str = "locator";

/// Schema descriptor written as the first line of the persisted form
#[derive(Debug, Serialize, Deserialize)]
struct Descriptor {
    columns: Vec<DescriptorColumn>,
    key_column: String,
    locator_column: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct DescriptorColumn {
    name: String,
    kind: ColumnKind,
}

impl Descriptor {
    fn for_registry(registry: &Registry) -> Self {
        let columns = registry
            .columns()
            .iter()
            .map(|name| DescriptorColumn {
                name: name.clone(),
                kind: registry
                    .column_kind(name)
                    .unwrap_or(ColumnKind::Scalar),
            })
            .collect();
        Self {
            columns,
            key_column: KEY_COLUMN.to_string(),
            locator_column: LOCATOR_COLUMN.to_string(),
        }
    }

    fn validate(&self) -> CatalogResult<()> {
        if self.key_column.is_empty() || self.locator_column.is_empty() {
            return Err(CatalogError::Format(
                "descriptor key_column and locator_column must be non-empty".to_string(),
            ));
        }
        if self.key_column == self.locator_column {
            return Err(CatalogError::Format(
                "descriptor key_column and locator_column must differ".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if column.name.is_empty() {
                return Err(CatalogError::Format(
                    "descriptor column names must be non-empty".to_string(),
                ));
            }
            if column.name == self.key_column || column.name == self.locator_column {
                return Err(CatalogError::Format(format!(
                    "descriptor column '{}' collides with the key/locator column",
                    column.name
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(CatalogError::Format(format!(
                    "duplicate descriptor column '{}'",
                    column.name
                )));
            }
        }
        Ok(())
    }
}

/// Write the registry to `writer` in the persisted format
pub fn save<W: Write>(registry: &Registry, writer: &mut W) -> CatalogResult<()> {
    let descriptor = Descriptor::for_registry(registry);
    let header = serde_json::to_string(&descriptor)
        .map_err(|e| CatalogError::Internal(format!("descriptor serialization failed: {}", e)))?;
    writer.write_all(header.as_bytes())?;
    writer.write_all(b"\n")?;

    for record in registry.iter() {
        let row = encode_row(record, &descriptor);
        writer.write_all(row.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    log::debug!(
        "saved {} entries across {} metadata columns",
        registry.len(),
        descriptor.columns.len()
    );
    Ok(())
}

/// Write the registry to a file, creating or truncating it
pub fn save_path<P: AsRef<Path>>(registry: &Registry, path: P) -> CatalogResult<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    save(registry, &mut writer)
}

/// Reconstruct a registry from `reader`.
///
/// Fails with [`CatalogError::Format`] on a missing or inconsistent
/// descriptor, a row whose field count disagrees with the descriptor, an
/// unparseable cell, or a duplicate/empty key. A loaded registry carries
/// no retained query.
pub fn load<R: Read>(reader: &mut R) -> CatalogResult<Registry> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    parse(&text)
}

/// Read a registry from a file
pub fn load_path<P: AsRef<Path>>(path: P) -> CatalogResult<Registry> {
    let file = File::open(path.as_ref())?;
    let mut reader = BufReader::new(file);
    let registry = load(&mut reader)?;
    log::debug!(
        "loaded {} entries from {}",
        registry.len(),
        path.as_ref().display()
    );
    Ok(registry)
}

fn parse(text: &str) -> CatalogResult<Registry> {
    let mut lines = text.split('\n');
    let header = match lines.next() {
        Some(header) if !header.is_empty() => header.strip_suffix('\r').unwrap_or(header),
        _ => {
            return Err(CatalogError::Format(
                "missing schema descriptor on the first line".to_string(),
            ))
        }
    };
    let descriptor: Descriptor = serde_json::from_str(header)
        .map_err(|e| CatalogError::Format(format!("invalid schema descriptor: {}", e)))?;
    descriptor.validate()?;

    let mut registry = Registry::new();
    for column in &descriptor.columns {
        registry.adopt_column(&column.name, column.kind);
    }

    let remainder: Vec<&str> = lines.collect();
    for (index, raw_line) in remainder.iter().enumerate() {
        let row_number = index + 1;
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        if line.is_empty() {
            // The writer terminates every row with a newline, so one empty
            // trailing fragment is expected; anything else is structural.
            if index + 1 == remainder.len() {
                continue;
            }
            return Err(CatalogError::Format(format!(
                "row {}: unexpected empty line",
                row_number
            )));
        }

        let fields = split_row(line, row_number)?;
        let expected = 2 + descriptor.columns.len();
        if fields.len() != expected {
            return Err(CatalogError::Format(format!(
                "row {}: expected {} fields, found {}",
                row_number,
                expected,
                fields.len()
            )));
        }

        let key = decode_text_field(&fields[0], row_number, &descriptor.key_column)?;
        if key.is_empty() {
            return Err(CatalogError::Format(format!(
                "row {}: empty key",
                row_number
            )));
        }
        let locator = decode_text_field(&fields[1], row_number, &descriptor.locator_column)?;

        let mut metadata = HashMap::new();
        for (offset, column) in descriptor.columns.iter().enumerate() {
            let field = &fields[offset + 2];
            if field.is_empty() {
                continue; // absent cell
            }
            let cell = decode_cell(field, column.kind).map_err(|e| {
                CatalogError::Format(format!(
                    "row {}, column '{}': {}",
                    row_number, column.name, e
                ))
            })?;
            metadata.insert(column.name.clone(), cell);
        }

        let record = Record::from_parts(key.clone(), locator, metadata);
        if !registry.insert_record(record) {
            return Err(CatalogError::Format(format!(
                "row {}: duplicate key '{}'",
                row_number, key
            )));
        }
    }

    Ok(registry)
}

fn encode_row(record: &Record, descriptor: &Descriptor) -> String {
    let mut fields = Vec::with_capacity(2 + descriptor.columns.len());
    fields.push(encode_scalar(&Scalar::Text(record.key().to_string())));
    fields.push(encode_scalar(&Scalar::Text(record.locator().to_string())));
    for column in &descriptor.columns {
        let field = match record.get(&column.name) {
            None => String::new(),
            Some(cell) => encode_cell(cell),
        };
        fields.push(field);
    }
    fields
        .iter()
        .map(|field| quote_field(field))
        .collect::<Vec<_>>()
        .join(&DELIMITER.to_string())
}

fn encode_cell(cell: &CellValue) -> String {
    match cell {
        CellValue::Scalar(value) => encode_scalar(value),
        CellValue::Set(values) => values
            .iter()
            .map(|value| escape_element(&encode_scalar(value)))
            .collect::<Vec<_>>()
            .join(&SUB_DELIMITER.to_string()),
    }
}

/// JSON encoding of one primitive. Floats go through serde_json so they
/// always keep a decimal point or exponent and never collapse into the
/// integer syntax.
fn encode_scalar(value: &Scalar) -> String {
    match value {
        Scalar::Bool(b) => b.to_string(),
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(x) => serde_json::to_string(x).unwrap_or_else(|_| "0.0".to_string()),
        Scalar::Text(s) => serde_json::to_string(s).unwrap_or_default(),
    }
}

fn decode_cell(field: &str, kind: ColumnKind) -> Result<CellValue, String> {
    match kind {
        ColumnKind::Scalar => Ok(CellValue::Scalar(decode_scalar(field)?)),
        ColumnKind::Set => {
            let elements = split_elements(field)?
                .iter()
                .map(|token| decode_scalar(token))
                .collect::<Result<Vec<Scalar>, String>>()?;
            if elements.is_empty() {
                return Err("set cell decoded to zero elements".to_string());
            }
            Ok(CellValue::Set(canonicalize(elements)))
        }
    }
}

fn decode_scalar(token: &str) -> Result<Scalar, String> {
    let value: serde_json::Value =
        serde_json::from_str(token).map_err(|e| format!("unparseable value '{}': {}", token, e))?;
    match value {
        serde_json::Value::Bool(b) => Ok(Scalar::Bool(b)),
        serde_json::Value::String(s) => Ok(Scalar::Text(s)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Scalar::Int(i))
            } else if let Some(x) = n.as_f64() {
                Ok(Scalar::Float(x))
            } else {
                Err(format!("number '{}' is out of range", n))
            }
        }
        other => Err(format!("unsupported value '{}'", other)),
    }
}

fn decode_text_field(field: &str, row_number: usize, column: &str) -> CatalogResult<String> {
    match decode_scalar(field) {
        Ok(Scalar::Text(s)) => Ok(s),
        Ok(other) => Err(CatalogError::Format(format!(
            "row {}: {} field must be text, found {}",
            row_number,
            column,
            other.type_name()
        ))),
        Err(e) => Err(CatalogError::Format(format!(
            "row {}: bad {} field: {}",
            row_number, column, e
        ))),
    }
}

/// Escape the sub-delimiter and the escape character inside an encoded set
/// element
fn escape_element(token: &str) -> String {
    let mut escaped = String::with_capacity(token.len());
    for c in token.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            SUB_DELIMITER => {
                escaped.push('\\');
                escaped.push(SUB_DELIMITER);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Split a set field on unescaped sub-delimiters and unescape each element
fn split_elements(field: &str) -> Result<Vec<String>, String> {
    let mut elements = Vec::new();
    let mut current = String::new();
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) => current.push(next),
                None => return Err("dangling escape at end of set cell".to_string()),
            },
            SUB_DELIMITER => {
                elements.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    elements.push(current);
    Ok(elements)
}

/// Wrap a field in double quotes when it contains the delimiter, a quote
/// or a line break, doubling embedded quotes
fn quote_field(field: &str) -> String {
    let needs_quoting = field
        .chars()
        .any(|c| c == DELIMITER || c == '"' || c == '\n' || c == '\r');
    if !needs_quoting {
        return field.to_string();
    }
    let mut quoted = String::with_capacity(field.len() + 2);
    quoted.push('"');
    for c in field.chars() {
        if c == '"' {
            quoted.push('"');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Quote-aware field splitter for one row
fn split_row(line: &str, row_number: usize) -> CatalogResult<Vec<String>> {
    let mut raw_parts: Vec<&str> = Vec::new();
    let mut in_quotes = false;
    let mut start = 0usize;
    let bytes = line.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i] as char;
        if b == '"' {
            if in_quotes && i + 1 < bytes.len() && bytes[i + 1] as char == '"' {
                i += 2;
                continue;
            }
            in_quotes = !in_quotes;
        } else if b == DELIMITER && !in_quotes {
            raw_parts.push(&line[start..i]);
            start = i + 1;
        }
        i += 1;
    }
    if in_quotes {
        return Err(CatalogError::Format(format!(
            "row {}: unterminated quoted field",
            row_number
        )));
    }
    raw_parts.push(&line[start..]);

    raw_parts
        .into_iter()
        .map(|part| unquote_field(part, row_number))
        .collect()
}

fn unquote_field(part: &str, row_number: usize) -> CatalogResult<String> {
    if !part.starts_with('"') {
        return Ok(part.to_string());
    }
    if part.len() < 2 || !part.ends_with('"') {
        return Err(CatalogError::Format(format!(
            "row {}: malformed quoted field",
            row_number
        )));
    }
    Ok(part[1..part.len() - 1].replace("\"\"", "\""))
}
