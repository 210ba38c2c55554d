use crate::error::{BlockError, IngestError};
use crate::models::{BlockTag, LayoutBlock};
use serde_json::Value;

pub fn normalize_block(record: &Value) -> Result<LayoutBlock, BlockError> {
    let object = record.as_object().ok_or(BlockError::NotAnObject)?;

    let tag = match object.get("tag") {
        Some(Value::String(tag)) if !tag.trim().is_empty() => BlockTag::from(tag.trim()),
        Some(Value::String(_)) | None | Some(Value::Null) => return Err(BlockError::MissingTag),
        Some(other) => {
            return Err(BlockError::InvalidField {
                field: "tag",
                details: format!("expected a string, got {other}"),
            })
        }
    };

    let level = match object.get("level") {
        None | Some(Value::Null) => return Err(BlockError::MissingLevel),
        Some(value) => parse_level(value)?,
    };

    let sentences = match object.get("sentences") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => Ok(text.trim().to_string()),
                other => Err(BlockError::InvalidField {
                    field: "sentences",
                    details: format!("expected strings, got {other}"),
                }),
            })
            .filter(|sentence| !matches!(sentence, Ok(text) if text.is_empty()))
            .collect::<Result<Vec<_>, _>>()?,
        Some(Value::String(text)) if !text.trim().is_empty() => vec![text.trim().to_string()],
        Some(Value::String(_)) => Vec::new(),
        Some(other) => {
            return Err(BlockError::InvalidField {
                field: "sentences",
                details: format!("expected an array, got {other}"),
            })
        }
    };

    if tag == BlockTag::Header && sentences.is_empty() {
        return Err(BlockError::EmptyHeader);
    }

    let table_rows = match object.get("table_rows") {
        None | Some(Value::Null) => None,
        Some(Value::Array(rows)) => Some(rows.iter().map(normalize_row).collect::<Result<_, _>>()?),
        Some(other) => {
            return Err(BlockError::InvalidField {
                field: "table_rows",
                details: format!("expected an array, got {other}"),
            })
        }
    };

    Ok(LayoutBlock {
        tag,
        level,
        sentences,
        table_rows,
    })
}

pub fn normalize_blocks(records: &[Value]) -> Result<Vec<LayoutBlock>, IngestError> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            normalize_block(record).map_err(|source| IngestError::Block { index, source })
        })
        .collect()
}

pub fn blocks_from_response(payload: &Value) -> Result<Vec<LayoutBlock>, IngestError> {
    let records = payload
        .as_array()
        .or_else(|| payload.pointer("/return_dict/result/blocks").and_then(Value::as_array))
        .or_else(|| payload.pointer("/blocks").and_then(Value::as_array))
        .ok_or_else(|| IngestError::LayoutService("response carries no block list".to_string()))?;

    normalize_blocks(records)
}

fn parse_level(value: &Value) -> Result<u32, BlockError> {
    let invalid = || BlockError::InvalidLevel(value.to_string());

    if let Some(level) = value.as_u64() {
        return u32::try_from(level).map_err(|_| invalid());
    }

    // Some producers emit whole floats such as `1.0`.
    match value.as_f64() {
        Some(level) if level >= 0.0 && level.fract() == 0.0 && level <= f64::from(u32::MAX) => {
            Ok(level as u32)
        }
        _ => Err(invalid()),
    }
}

fn normalize_row(row: &Value) -> Result<Vec<String>, BlockError> {
    match row {
        Value::Array(cells) => Ok(cells.iter().map(cell_text).collect()),
        Value::Object(fields) => {
            if let Some(Value::Array(cells)) = fields.get("cells") {
                Ok(cells.iter().map(cell_text).collect())
            } else if let Some(value) = fields.get("cell_value") {
                Ok(vec![cell_text(value)])
            } else {
                Err(BlockError::InvalidField {
                    field: "table_rows",
                    details: "row object has neither cells nor cell_value".to_string(),
                })
            }
        }
        other => Err(BlockError::InvalidField {
            field: "table_rows",
            details: format!("unexpected row {other}"),
        }),
    }
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(text) => text.trim().to_string(),
        Value::Null => String::new(),
        Value::Object(fields) => fields.get("cell_value").map(cell_text).unwrap_or_default(),
        other => other.to_string(),
    }
}
