//! Structural type representation shared by parameter types, return types,
//! and schema field types (§4.4 of the type model).

use std::fmt;

/// A structural type. Parses from and renders to a Go-flavored string syntax
/// (`string`, `[]T`, `[N]T`, `*T`, `map[K]V`, `pkg.Name`) so it round-trips
/// through the wire formats the schema loader and query analyzers use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(Primitive),
    Slice(Box<Type>),
    Array(u64, Box<Type>),
    Map(Box<Type>, Box<Type>),
    Pointer(Box<Type>),
    Named { package: Option<String>, name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    String,
    Int,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    Any,
}

impl Primitive {
    pub const ALL: [Primitive; 8] = [
        Primitive::String,
        Primitive::Int,
        Primitive::Int32,
        Primitive::Int64,
        Primitive::Float32,
        Primitive::Float64,
        Primitive::Bool,
        Primitive::Any,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Int => "int",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::Float32 => "float32",
            Primitive::Float64 => "float64",
            Primitive::Bool => "bool",
            Primitive::Any => "any",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Primitive::ALL.into_iter().find(|p| p.name() == s)
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Primitive::Int | Primitive::Int32 | Primitive::Int64 | Primitive::Float32 | Primitive::Float64
        )
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{}", p.name()),
            Type::Slice(t) => write!(f, "[]{t}"),
            Type::Array(n, t) => write!(f, "[{n}]{t}"),
            Type::Map(k, v) => write!(f, "map[{k}]{v}"),
            Type::Pointer(t) => write!(f, "*{t}"),
            Type::Named { package: Some(pkg), name } => write!(f, "{pkg}.{name}"),
            Type::Named { package: None, name } => write!(f, "{name}"),
        }
    }
}

/// Parses a type string per §4.4. Returns `None` on malformed syntax; callers
/// that need a diagnostic should report `invalid-type-annotation` themselves.
pub fn parse_type(s: &str) -> Option<Type> {
    let (ty, rest) = parse_type_prefix(s.trim())?;
    rest.trim().is_empty().then_some(ty)
}

fn parse_type_prefix(s: &str) -> Option<(Type, &str)> {
    let s = s.trim_start();
    if let Some(rest) = s.strip_prefix("[]") {
        let (inner, rest) = parse_type_prefix(rest)?;
        return Some((Type::Slice(Box::new(inner)), rest));
    }
    if let Some(rest) = s.strip_prefix('[') {
        let close = rest.find(']')?;
        let n: u64 = rest[..close].trim().parse().ok()?;
        let (inner, rest) = parse_type_prefix(&rest[close + 1..])?;
        return Some((Type::Array(n, Box::new(inner)), rest));
    }
    if let Some(rest) = s.strip_prefix("map[") {
        let close = find_matching_bracket(rest)?;
        let (key, key_rest) = parse_type_prefix(&rest[..close])?;
        if !key_rest.trim().is_empty() {
            return None;
        }
        let (value, rest) = parse_type_prefix(&rest[close + 1..])?;
        return Some((Type::Map(Box::new(key), Box::new(value)), rest));
    }
    if let Some(rest) = s.strip_prefix('*') {
        let (inner, rest) = parse_type_prefix(rest)?;
        return Some((Type::Pointer(Box::new(inner)), rest));
    }

    let end = s
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let (ident, rest) = s.split_at(end);
    let ty = if let Some(p) = Primitive::from_name(ident) {
        Type::Primitive(p)
    } else if let Some((pkg, name)) = ident.split_once('.') {
        Type::Named {
            package: Some(pkg.to_string()),
            name: name.to_string(),
        }
    } else {
        Type::Named {
            package: None,
            name: ident.to_string(),
        }
    };
    Some((ty, rest))
}

fn find_matching_bracket(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Allowed scaf type names, used by the `invalid-type-annotation` rule: every
/// built-in primitive plus the list/map/pointer/nullable forms over them or
/// over a named schema model.
pub fn is_valid_type_annotation(ty: &Type) -> bool {
    match ty {
        Type::Primitive(_) => true,
        Type::Named { .. } => true,
        Type::Slice(inner) | Type::Array(_, inner) | Type::Pointer(inner) => {
            is_valid_type_annotation(inner)
        }
        Type::Map(k, v) => is_valid_type_annotation(k) && is_valid_type_annotation(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_primitives() {
        for p in Primitive::ALL {
            let s = p.name();
            assert_eq!(parse_type(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn round_trips_slice_and_pointer() {
        assert_eq!(parse_type("[]string").unwrap().to_string(), "[]string");
        assert_eq!(parse_type("*int64").unwrap().to_string(), "*int64");
    }

    #[test]
    fn round_trips_map_with_named_value() {
        let ty = parse_type("map[string]pkg.User").unwrap();
        assert_eq!(ty.to_string(), "map[string]pkg.User");
        match ty {
            Type::Map(k, v) => {
                assert_eq!(*k, Type::Primitive(Primitive::String));
                assert_eq!(
                    *v,
                    Type::Named {
                        package: Some("pkg".into()),
                        name: "User".into()
                    }
                );
            }
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn round_trips_fixed_array() {
        assert_eq!(parse_type("[3]int").unwrap().to_string(), "[3]int");
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse_type("string garbage").is_none());
    }

    #[test]
    fn named_types_are_always_valid_annotations() {
        let ty = Type::Named {
            package: None,
            name: "User".into(),
        };
        assert!(is_valid_type_annotation(&ty));
    }
}
