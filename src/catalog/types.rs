// ABOUTME: Maps native column types from every dialect onto a small semantic type set
// ABOUTME: Semantic types drive the catalog descriptions shown to operators

use serde::{Serialize, Serializer};
use std::fmt;

/// Engine-neutral column type shown in the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticType {
    String,
    Integer,
    BigInt,
    Boolean,
    DateTime,
    Date,
    Decimal,
    Float,
    Text,
    /// Unmapped native type, kept verbatim
    Other(String),
}

/// Lowercase a native type and drop length/precision arguments and sign modifiers
///
/// ```
/// # use data_explorer::catalog::types::base_type;
/// assert_eq!(base_type("VARCHAR(255)"), "varchar");
/// assert_eq!(base_type("int(10) unsigned"), "int");
/// assert_eq!(base_type("timestamp(3) without time zone"), "timestamp without time zone");
/// ```
pub fn base_type(native: &str) -> String {
    let mut out = String::with_capacity(native.len());
    let mut depth = 0usize;
    for ch in native.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch.to_ascii_lowercase()),
            _ => {}
        }
    }

    out.split_whitespace()
        .filter(|word| !matches!(*word, "unsigned" | "signed" | "zerofill"))
        .collect::<Vec<_>>()
        .join(" ")
}

impl SemanticType {
    pub fn from_native(native: &str) -> Self {
        // MySQL reports booleans as tinyint(1)
        if native.trim().to_ascii_lowercase().starts_with("tinyint(1)") {
            return SemanticType::Boolean;
        }

        match base_type(native).as_str() {
            "varchar" | "char" | "nvarchar" | "nchar" | "character varying" | "character"
            | "bpchar" | "citext" | "uuid" | "uniqueidentifier" | "string" => SemanticType::String,
            "int" | "integer" | "int4" | "smallint" | "int2" | "mediumint" | "tinyint"
            | "serial" => SemanticType::Integer,
            "bigint" | "int8" | "bigserial" => SemanticType::BigInt,
            "boolean" | "bool" | "bit" => SemanticType::Boolean,
            "datetime" | "datetime2" | "smalldatetime" | "datetimeoffset" | "timestamp"
            | "timestamptz" | "timestamp without time zone" | "timestamp with time zone" => {
                SemanticType::DateTime
            }
            "date" => SemanticType::Date,
            "decimal" | "numeric" | "money" | "smallmoney" => SemanticType::Decimal,
            "float" | "double" | "real" | "float4" | "float8" | "double precision" => {
                SemanticType::Float
            }
            "text" | "tinytext" | "mediumtext" | "longtext" | "ntext" | "clob" => SemanticType::Text,
            _ => SemanticType::Other(native.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            SemanticType::String => "string",
            SemanticType::Integer => "integer",
            SemanticType::BigInt => "bigint",
            SemanticType::Boolean => "boolean",
            SemanticType::DateTime => "datetime",
            SemanticType::Date => "date",
            SemanticType::Decimal => "decimal",
            SemanticType::Float => "float",
            SemanticType::Text => "text",
            SemanticType::Other(raw) => raw,
        }
    }

    /// Human-readable description; unmapped types show their capitalised name
    pub fn description(&self) -> String {
        match self {
            SemanticType::String => "Text value".to_string(),
            SemanticType::Integer => "Whole number".to_string(),
            SemanticType::BigInt => "Large whole number".to_string(),
            SemanticType::Boolean => "True/False value".to_string(),
            SemanticType::DateTime => "Date and time value".to_string(),
            SemanticType::Date => "Date value".to_string(),
            SemanticType::Decimal => "Decimal number".to_string(),
            SemanticType::Float => "Floating point number".to_string(),
            SemanticType::Text => "Long text value".to_string(),
            SemanticType::Other(raw) => capitalize(raw),
        }
    }
}

fn capitalize(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for SemanticType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}
