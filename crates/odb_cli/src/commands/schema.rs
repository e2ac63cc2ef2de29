//! Schema command implementation.

use odb_core::Input;
use odb_storage::Access;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Schema of one input.
#[derive(Debug, Serialize)]
pub struct SchemaInfo {
    /// Input path.
    pub path: String,
    /// Header size in bytes.
    pub header_size: usize,
    /// Number of records (absent for streams).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_count: Option<u64>,
    /// Fields in order.
    pub fields: Vec<FieldInfo>,
}

/// One field of a schema.
#[derive(Debug, Serialize)]
pub struct FieldInfo {
    /// Field name.
    pub name: String,
    /// Type name as accepted by `-f`.
    #[serde(rename = "type")]
    pub field_type: String,
}

/// Reads the header of `path`.
pub fn inspect(path: &Path) -> Result<SchemaInfo, Box<dyn std::error::Error>> {
    let input = Input::open(path, Access::Read)?;
    let header = input.header();
    Ok(SchemaInfo {
        path: path.display().to_string(),
        header_size: header.size(),
        record_count: input.record_count()?,
        fields: header
            .fields()
            .iter()
            .map(|f| FieldInfo {
                name: f.name(),
                field_type: f.field_type().to_string(),
            })
            .collect(),
    })
}

/// Runs the schema command.
pub fn run(files: &[PathBuf], format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let schemas = files
        .iter()
        .map(|path| inspect(path))
        .collect::<Result<Vec<_>, _>>()?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&schemas)?);
        }
        _ => {
            for schema in &schemas {
                print_text_output(schema);
            }
        }
    }
    Ok(())
}

fn print_text_output(schema: &SchemaInfo) {
    println!("{}", schema.path);
    println!("  Header size: {} bytes", schema.header_size);
    if let Some(count) = schema.record_count {
        println!("  Records:     {count}");
    }
    println!("  Fields:");
    for (i, field) in schema.fields.iter().enumerate() {
        println!("    {:>3}  {}:{}", i + 1, field.name, field.field_type);
    }
}
