//! Space descriptions.
//!
//! A description names the space, its key and its typed attributes:
//!
//! ```text
//! space profiles
//! key username
//! attributes
//!     string name,
//!     int visits,
//!     set(string) hobbies,
//!     map(string, int) upvotes
//! subspace name
//! ```
//!
//! The key may carry a type (`key int id`); it defaults to string.
//! `subspace`, `tolerate` and `create` clauses are accepted and ignored.

use kvmux_codec::{ContainerKind, Datatype, Value};
use std::fmt;

const CLAUSES: [&str; 5] = ["key", "attributes", "subspace", "tolerate", "create"];

/// The schema of one space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceSchema {
    /// Space name.
    pub name: String,
    /// Key attribute name.
    pub key: String,
    /// Key datatype.
    pub key_type: Datatype,
    /// Attributes other than the key, in declaration order.
    pub attributes: Vec<(String, Datatype)>,
}

impl SpaceSchema {
    /// Parses a space description.
    pub fn parse(description: &str) -> Result<Self, String> {
        let tokens = tokenize(description);
        let mut tokens = tokens.iter().map(String::as_str).peekable();

        if tokens.next() != Some("space") {
            return Err("description must start with `space`".into());
        }
        let name = match tokens.next() {
            Some(name) if !is_clause(name) => name.to_string(),
            _ => return Err("missing space name".into()),
        };

        let mut key: Option<(String, Datatype)> = None;
        let mut attributes: Vec<(String, Datatype)> = Vec::new();

        while let Some(clause) = tokens.next() {
            match clause {
                "key" => {
                    let first = tokens.next().ok_or("missing key name")?;
                    let parsed = match parse_type(first) {
                        Some(dt) if tokens.peek().is_some_and(|t| !is_clause(t)) => {
                            let name = tokens.next().ok_or("missing key name")?;
                            (name.to_string(), dt)
                        }
                        _ => (first.to_string(), Datatype::String),
                    };
                    if !parsed.1.is_primitive() {
                        return Err(format!("key `{}` must be a primitive type", parsed.0));
                    }
                    key = Some(parsed);
                }
                "attributes" => {
                    while tokens.peek().is_some_and(|t| !is_clause(t)) {
                        let ty = tokens.next().ok_or("missing attribute type")?;
                        let dt = parse_type(ty).ok_or_else(|| format!("unknown type `{ty}`"))?;
                        let attr = match tokens.next() {
                            Some(attr) if !is_clause(attr) => attr,
                            _ => return Err(format!("missing name for attribute of type `{ty}`")),
                        };
                        if attributes.iter().any(|(n, _)| n == attr) {
                            return Err(format!("attribute `{attr}` declared twice"));
                        }
                        attributes.push((attr.to_string(), dt));
                    }
                }
                "subspace" | "tolerate" | "create" => {
                    while tokens.peek().is_some_and(|t| !is_clause(t)) {
                        tokens.next();
                    }
                }
                other => return Err(format!("unexpected `{other}`")),
            }
        }

        let (key, key_type) = key.ok_or("missing key")?;
        if attributes.iter().any(|(n, _)| *n == key) {
            return Err(format!("attribute `{key}` shadows the key"));
        }
        Ok(Self {
            name,
            key,
            key_type,
            attributes,
        })
    }

    /// Datatype of a non-key attribute.
    pub fn attribute_type(&self, name: &str) -> Option<Datatype> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, dt)| *dt)
    }

    /// Datatype of any attribute, the key included.
    pub fn any_type(&self, name: &str) -> Option<Datatype> {
        if name == self.key {
            Some(self.key_type)
        } else {
            self.attribute_type(name)
        }
    }
}

impl fmt::Display for SpaceSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "space {}", self.name)?;
        write!(f, "key {} {}", type_name(self.key_type), self.key)?;
        if !self.attributes.is_empty() {
            write!(f, "\nattributes")?;
            for (i, (name, dt)) in self.attributes.iter().enumerate() {
                let sep = if i == 0 { " " } else { ", " };
                write!(f, "{sep}{} {name}", type_name(*dt))?;
            }
        }
        Ok(())
    }
}

fn is_clause(token: &str) -> bool {
    CLAUSES.contains(&token)
}

/// Splits on whitespace and top-level commas; whitespace inside
/// parentheses is dropped so `map(string, int)` stays one token.
fn tokenize(description: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in description.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c.is_whitespace() && depth > 0 => {}
            c if (c.is_whitespace() || c == ',') && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn parse_primitive(name: &str) -> Option<Datatype> {
    match name {
        "string" => Some(Datatype::String),
        "int" | "int64" => Some(Datatype::Int64),
        "float" => Some(Datatype::Float),
        _ => None,
    }
}

fn parse_type(token: &str) -> Option<Datatype> {
    if let Some(dt) = parse_primitive(token) {
        return Some(dt);
    }
    let (outer, rest) = token.split_once('(')?;
    let inner = rest.strip_suffix(')')?;
    match outer {
        "list" => Datatype::list_of(parse_primitive(inner)?).ok(),
        "set" => Datatype::set_of(parse_primitive(inner)?).ok(),
        "map" => {
            let (k, v) = inner.split_once(',')?;
            Datatype::map_of(parse_primitive(k)?, parse_primitive(v)?).ok()
        }
        _ => None,
    }
}

fn type_name(dt: Datatype) -> String {
    fn primitive(dt: Datatype) -> &'static str {
        match dt {
            Datatype::Int64 => "int",
            Datatype::Float => "float",
            _ => "string",
        }
    }
    let elem = |dt: Datatype| dt.element().map(primitive).unwrap_or("string");
    match dt.container() {
        ContainerKind::Primitive => primitive(dt).to_string(),
        ContainerKind::List => format!("list({})", elem(dt)),
        ContainerKind::Set => format!("set({})", elem(dt)),
        ContainerKind::Map => format!(
            "map({}, {})",
            dt.map_key().map(primitive).unwrap_or("string"),
            elem(dt)
        ),
    }
}

/// Returns true if a value of type `value` may be stored in an attribute
/// of type `schema`. Empty containers match any container of their kind.
pub fn accepts(schema: Datatype, value: Datatype) -> bool {
    if schema == value {
        return true;
    }
    let generic = matches!(
        value,
        Datatype::ListGeneric | Datatype::SetGeneric | Datatype::MapGeneric
    );
    generic && schema.container() == value.container()
}

/// The value a new object holds for an attribute it was not given.
pub fn default_value(dt: Datatype) -> Value {
    match dt.container() {
        ContainerKind::List => Value::List(Vec::new()),
        ContainerKind::Set => Value::Set(Vec::new()),
        ContainerKind::Map => Value::Map(Vec::new()),
        ContainerKind::Primitive => match dt {
            Datatype::Int64 => Value::Int(0),
            Datatype::Float => Value::Float(0.0),
            _ => Value::String(String::new()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILES: &str = "space profiles
key username
attributes
    string name,
    float height,
    int profile_views,
    list(string) pending_requests,
    set(string) hobbies,
    map(string, int) upvotes
subspace name
subspace height
";

    #[test]
    fn parse_full_description() {
        let schema = SpaceSchema::parse(PROFILES).unwrap();
        assert_eq!(schema.name, "profiles");
        assert_eq!(schema.key, "username");
        assert_eq!(schema.key_type, Datatype::String);
        assert_eq!(schema.attributes.len(), 6);
        assert_eq!(schema.attribute_type("height"), Some(Datatype::Float));
        assert_eq!(
            schema.attribute_type("upvotes"),
            Some(Datatype::MapStringInt64)
        );
        assert_eq!(schema.attribute_type("username"), None);
        assert_eq!(schema.any_type("username"), Some(Datatype::String));
    }

    #[test]
    fn typed_key_and_no_attributes() {
        let schema = SpaceSchema::parse("space counters key int id").unwrap();
        assert_eq!(schema.key, "id");
        assert_eq!(schema.key_type, Datatype::Int64);
        assert!(schema.attributes.is_empty());

        let schema = SpaceSchema::parse("space locks\nkey username\n").unwrap();
        assert_eq!(schema.key_type, Datatype::String);
    }

    #[test]
    fn invalid_descriptions() {
        assert!(SpaceSchema::parse("").is_err());
        assert!(SpaceSchema::parse("space kv").is_err());
        assert!(SpaceSchema::parse("space kv key k attributes blob v").is_err());
        assert!(SpaceSchema::parse("space kv key k attributes string v, int v").is_err());
        assert!(SpaceSchema::parse("space kv key k attributes string k").is_err());
        assert!(SpaceSchema::parse("space kv key list(int) k").is_err());
    }

    #[test]
    fn display_reparses() {
        let schema = SpaceSchema::parse(PROFILES).unwrap();
        let again = SpaceSchema::parse(&schema.to_string()).unwrap();
        assert_eq!(schema, again);
    }

    #[test]
    fn empty_containers_are_accepted() {
        assert!(accepts(Datatype::SetString, Datatype::SetGeneric));
        assert!(!accepts(Datatype::SetString, Datatype::ListGeneric));
        assert!(!accepts(Datatype::Int64, Datatype::Float));
        assert_eq!(default_value(Datatype::MapStringInt64), Value::Map(vec![]));
    }
}
