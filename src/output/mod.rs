//! Output formatters for ingestion reports and query views.

use std::io::Write;

use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

use crate::config::OutputFormat;
use crate::core::Result;

/// Output format enum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Json,
    Text,
}

impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => Format::Json,
            OutputFormat::Text => Format::Text,
        }
    }
}

impl Format {
    pub fn format_value<W: Write>(&self, value: &Value, writer: &mut W) -> Result<()> {
        match self {
            Format::Json => format_json(value, writer),
            Format::Text => format_text(value, writer),
        }
    }

    pub fn format<T: Serialize, W: Write>(&self, data: &T, writer: &mut W) -> Result<()> {
        let value = serde_json::to_value(data)?;
        self.format_value(&value, writer)
    }
}

fn format_json<W: Write>(value: &Value, writer: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writeln!(writer)?;
    Ok(())
}

fn format_text<W: Write>(value: &Value, writer: &mut W) -> Result<()> {
    format_value_as_text(value, writer, 0)
}

fn format_key(key: &str) -> String {
    key.replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_scalar(value: &Value) -> String {
    match value {
        Value::String(s) if s.is_empty() => "-".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if *b { "yes" } else { "no" }.to_string(),
        Value::Null => "-".to_string(),
        _ => value.to_string(),
    }
}

/// Arrays of flat objects render as aligned columns.
fn is_table_compatible(arr: &[Value]) -> bool {
    !arr.is_empty()
        && arr.iter().all(|v| match v {
            Value::Object(map) => map
                .values()
                .all(|v| !matches!(v, Value::Object(_) | Value::Array(_))),
            _ => false,
        })
}

fn format_as_table<W: Write>(arr: &[Value], writer: &mut W, indent: usize) -> Result<()> {
    let Some(Value::Object(first)) = arr.first() else {
        return Ok(());
    };
    let prefix = "  ".repeat(indent);
    let headers: Vec<&str> = first.keys().map(String::as_str).collect();

    let rows: Vec<Vec<String>> = arr
        .iter()
        .filter_map(Value::as_object)
        .map(|map| {
            headers
                .iter()
                .map(|h| format_scalar(map.get(*h).unwrap_or(&Value::Null)))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(format_key(h).chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header_line = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{:<w$}", format_key(h), w = *w))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(writer, "{prefix}{}", header_line.trim_end().dimmed())?;

    for row in rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{cell:<w$}", w = *w))
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(writer, "{prefix}{}", line.trim_end())?;
    }
    Ok(())
}

fn format_value_as_text<W: Write>(value: &Value, writer: &mut W, indent: usize) -> Result<()> {
    let prefix = "  ".repeat(indent);
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                match val {
                    Value::Array(arr) => {
                        writeln!(
                            writer,
                            "{prefix}{} ({})",
                            format_key(key).bold(),
                            arr.len()
                        )?;
                        format_value_as_text(val, writer, indent + 1)?;
                    }
                    Value::Object(_) => {
                        writeln!(writer, "{prefix}{}", format_key(key).bold())?;
                        format_value_as_text(val, writer, indent + 1)?;
                    }
                    _ => {
                        writeln!(writer, "{prefix}{}: {}", format_key(key), format_scalar(val))?;
                    }
                }
            }
        }
        Value::Array(arr) if arr.is_empty() => {
            writeln!(writer, "{prefix}{}", "(none)".dimmed())?;
        }
        Value::Array(arr) if is_table_compatible(arr) => {
            format_as_table(arr, writer, indent)?;
        }
        Value::Array(arr) => {
            for (i, item) in arr.iter().enumerate() {
                writeln!(writer, "{prefix}[{i}]")?;
                format_value_as_text(item, writer, indent + 1)?;
            }
        }
        _ => {
            writeln!(writer, "{prefix}{}", format_scalar(value))?;
        }
    }
    Ok(())
}
