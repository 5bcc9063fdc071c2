//! Codes command implementation.

use super::Format;
use kvmux_codec::{Datatype, PredicateKind};
use kvmux_core::Status;
use serde::Serialize;

/// One named numeric code.
#[derive(Debug, Serialize)]
pub struct CodeEntry {
    /// Numeric value.
    pub code: u16,
    /// Symbolic name.
    pub name: String,
    /// Description, where one exists.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Every code table.
#[derive(Debug, Serialize)]
pub struct CodeTables {
    /// Engine status codes.
    pub statuses: Vec<CodeEntry>,
    /// Attribute datatype codes.
    pub datatypes: Vec<CodeEntry>,
    /// Predicate codes.
    pub predicates: Vec<CodeEntry>,
}

const PREDICATES: [PredicateKind; 11] = [
    PredicateKind::Fail,
    PredicateKind::Equals,
    PredicateKind::LessEqual,
    PredicateKind::GreaterEqual,
    PredicateKind::Regex,
    PredicateKind::LengthEquals,
    PredicateKind::LengthLessEqual,
    PredicateKind::LengthGreaterEqual,
    PredicateKind::Contains,
    PredicateKind::LessThan,
    PredicateKind::GreaterThan,
];

/// Builds every table.
pub fn tables() -> CodeTables {
    let statuses = Status::all()
        .iter()
        .map(|s| CodeEntry {
            code: s.code(),
            name: s.name().to_string(),
            description: s.message().to_string(),
        })
        .collect();
    // Datatype codes are sparse; scan the tagged range.
    let datatypes = (Datatype::Generic.code()..=Datatype::Garbage.code())
        .filter_map(|code| Datatype::from_code(code).ok())
        .map(|dt| CodeEntry {
            code: dt.code(),
            name: format!("{dt:?}"),
            description: String::new(),
        })
        .collect();
    let predicates = PREDICATES
        .iter()
        .map(|p| CodeEntry {
            code: p.code(),
            name: format!("{p:?}"),
            description: String::new(),
        })
        .collect();
    CodeTables {
        statuses,
        datatypes,
        predicates,
    }
}

/// Runs the codes command.
pub fn run(format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let format = Format::parse(format)?;
    let tables = tables();
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&tables)?),
        Format::Text => {
            for (title, entries) in [
                ("Statuses", &tables.statuses),
                ("Datatypes", &tables.datatypes),
                ("Predicates", &tables.predicates),
            ] {
                println!("=== {title} ===");
                for entry in entries {
                    println!("{:>5}  {:<22} {}", entry.code, entry.name, entry.description);
                }
                println!();
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_cover_every_code() {
        let tables = tables();
        assert_eq!(tables.statuses.len(), Status::all().len());
        assert_eq!(tables.predicates.len(), 11);
        assert!(tables.datatypes.iter().any(|d| d.code == 9217));
        assert!(tables.datatypes.iter().any(|d| d.name == "Garbage"));
        let names: Vec<_> = tables.statuses.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"SEARCHDONE"));
    }

    #[test]
    fn format_is_checked() {
        assert!(Format::parse("yaml").is_err());
        assert_eq!(Format::parse("json").unwrap(), Format::Json);
    }
}
