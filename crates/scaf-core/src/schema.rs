//! Declarative model/field/relationship schema loader (§4.5).

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::types::{parse_type, Type};

#[derive(Debug, Clone, Deserialize)]
struct RawSchema {
    #[serde(default)]
    models: IndexMap<String, RawModel>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawModel {
    #[serde(default)]
    fields: IndexMap<String, RawField>,
    #[serde(default)]
    relationships: IndexMap<String, RawRelationship>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawField {
    #[serde(rename = "type")]
    type_str: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    unique: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRelationship {
    rel_type: String,
    target: String,
    #[serde(default)]
    many: bool,
    direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// A field on a [`Model`].
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub required: bool,
    pub unique: bool,
}

/// A typed relationship edge from a [`Model`] to another.
#[derive(Debug, Clone)]
pub struct Relationship {
    pub name: String,
    pub rel_type: String,
    pub target: String,
    pub many: bool,
    pub direction: Direction,
}

/// A named model: an ordered set of fields plus relationships to other models.
#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    pub fields: Vec<Field>,
    pub relationships: Vec<Relationship>,
}

impl Model {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }
}

/// A fully loaded schema: every [`Model`] keyed by name, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    models: IndexMap<String, Model>,
}

impl Schema {
    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    /// Resolve `base.path` through a possibly-relative schema field type: used
    /// by schema-aware query analyzers to type a property access like `u.name`.
    pub fn field_type(&self, model: &str, field: &str) -> Option<&Type> {
        self.models.get(model)?.field(field).map(|f| &f.ty)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("failed to read schema file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse schema file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("schema {path} declares field {model}.{field} with unparseable type {type_str:?}")]
    InvalidFieldType {
        path: PathBuf,
        model: String,
        field: String,
        type_str: String,
    },
}

/// Load and parse a schema file. `path` is resolved against `base_dir` unless
/// it is already absolute.
pub fn load_schema(base_dir: &Path, path: &Path) -> Result<Schema, SchemaError> {
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    };

    let text = std::fs::read_to_string(&resolved).map_err(|source| SchemaError::Io {
        path: resolved.clone(),
        source,
    })?;
    parse_schema(&text, &resolved)
}

fn parse_schema(text: &str, path: &Path) -> Result<Schema, SchemaError> {
    let raw: RawSchema = serde_yaml::from_str(text).map_err(|source| SchemaError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut models = IndexMap::new();
    for (model_name, raw_model) in raw.models {
        let mut fields = Vec::with_capacity(raw_model.fields.len());
        for (field_name, raw_field) in raw_model.fields {
            let ty = parse_type(&raw_field.type_str).ok_or_else(|| SchemaError::InvalidFieldType {
                path: path.to_path_buf(),
                model: model_name.clone(),
                field: field_name.clone(),
                type_str: raw_field.type_str.clone(),
            })?;
            fields.push(Field {
                name: field_name,
                ty,
                required: raw_field.required,
                unique: raw_field.unique,
            });
        }

        let relationships = raw_model
            .relationships
            .into_iter()
            .map(|(name, r)| Relationship {
                name,
                rel_type: r.rel_type,
                target: r.target,
                many: r.many,
                direction: r.direction,
            })
            .collect();

        models.insert(
            model_name.clone(),
            Model {
                name: model_name,
                fields,
                relationships,
            },
        );
    }

    Ok(Schema { models })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn parses_models_fields_and_relationships() {
        let yaml = indoc! {r#"
            models:
              User:
                fields:
                  id:
                    type: "string"
                    required: true
                    unique: true
                  age:
                    type: "int32"
                relationships:
                  posts:
                    rel_type: AUTHORED
                    target: Post
                    many: true
                    direction: outgoing
              Post:
                fields:
                  title:
                    type: "string"
        "#};

        let schema = parse_schema(yaml, Path::new("schema.yaml")).unwrap();
        let user = schema.model("User").unwrap();
        assert_eq!(user.field("id").unwrap().ty, Type::Primitive(crate::types::Primitive::String));
        assert!(user.field("id").unwrap().required);
        let rel = user.relationship("posts").unwrap();
        assert_eq!(rel.target, "Post");
        assert!(rel.many);
        assert_eq!(rel.direction, Direction::Outgoing);
    }

    #[test]
    fn empty_sections_are_allowed() {
        let yaml = "models:\n  Empty: {}\n";
        let schema = parse_schema(yaml, Path::new("schema.yaml")).unwrap();
        let model = schema.model("Empty").unwrap();
        assert!(model.fields.is_empty());
        assert!(model.relationships.is_empty());
    }

    #[test]
    fn invalid_field_type_is_reported() {
        let yaml = indoc! {r#"
            models:
              Bad:
                fields:
                  x:
                    type: "not a type ["
        "#};
        let err = parse_schema(yaml, Path::new("schema.yaml")).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidFieldType { .. }));
    }
}
