//! Validate command implementation.

use super::Format;
use kvmux_testkit::SpaceSchema;
use serde::Serialize;
use std::io::Read;
use std::path::Path;

/// A parsed space description.
#[derive(Debug, Serialize)]
pub struct ValidateResult {
    /// Space name.
    pub space: String,
    /// Key attribute and type.
    pub key: AttributeInfo,
    /// Other attributes in declaration order.
    pub attributes: Vec<AttributeInfo>,
    /// Canonical description.
    pub canonical: String,
}

/// One attribute.
#[derive(Debug, Serialize)]
pub struct AttributeInfo {
    /// Attribute name.
    pub name: String,
    /// Datatype name.
    pub datatype: String,
    /// Datatype code.
    pub code: u16,
}

/// Parses `description` into a report.
pub fn validate(description: &str) -> Result<ValidateResult, String> {
    let schema = SpaceSchema::parse(description)?;
    let info = |name: &str, dt: kvmux_codec::Datatype| AttributeInfo {
        name: name.to_string(),
        datatype: format!("{dt:?}"),
        code: dt.code(),
    };
    Ok(ValidateResult {
        space: schema.name.clone(),
        key: info(&schema.key, schema.key_type),
        attributes: schema
            .attributes
            .iter()
            .map(|(name, dt)| info(name, *dt))
            .collect(),
        canonical: schema.to_string(),
    })
}

/// Runs the validate command.
pub fn run(file: Option<&Path>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let format = Format::parse(format)?;
    let description = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let result = validate(&description).map_err(|e| format!("Invalid space description: {e}"))?;
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => {
            println!("Space: {}", result.space);
            println!("Key: {} ({})", result.key.name, result.key.datatype);
            for attr in &result.attributes {
                println!("  {:<20} {:<16} {}", attr.name, attr.datatype, attr.code);
            }
            println!("\n{}", result.canonical);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_attributes_in_order() {
        let result =
            validate("space profiles key username attributes string name, map(string, int) m")
                .unwrap();
        assert_eq!(result.space, "profiles");
        assert_eq!(result.key.name, "username");
        assert_eq!(result.attributes.len(), 2);
        assert_eq!(result.attributes[1].datatype, "MapStringInt64");
        assert!(result.canonical.starts_with("space profiles"));
    }

    #[test]
    fn rejects_missing_key() {
        assert!(validate("space broken").is_err());
    }
}
