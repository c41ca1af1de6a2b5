//! Model file I/O.
//!
//! A model is one self-contained document: color types, variables, places
//! with their initial markings, transitions with optional guards, arcs,
//! and named queries. The same serde model reads and writes as JSON, RON
//! or YAML, picked by file extension.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::net::NetBuilder;
use crate::net::ast::{ArcExpression, GuardExpression};
use crate::net::builder::TokenDecl;
use crate::query::Condition;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ron error: {0}")]
    Ron(#[from] ron::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unsupported model format '{0}'")]
    UnsupportedFormat(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorTypeModel {
    pub name: String,
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableModel {
    pub name: String,
    pub color_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceModel {
    pub name: String,
    pub color_types: Vec<String>,
    #[serde(default)]
    pub initial: Vec<TokenDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionModel {
    pub name: String,
    #[serde(default)]
    pub guard: Option<GuardExpression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcModel {
    pub place: String,
    pub transition: String,
    pub expression: ArcExpression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InhibitorModel {
    pub place: String,
    pub transition: String,
    pub weight: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryModel {
    pub name: String,
    pub condition: Condition,
}

/// The on-disk document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetModel {
    #[serde(default)]
    pub color_types: Vec<ColorTypeModel>,
    #[serde(default)]
    pub variables: Vec<VariableModel>,
    #[serde(default)]
    pub places: Vec<PlaceModel>,
    #[serde(default)]
    pub transitions: Vec<TransitionModel>,
    #[serde(default)]
    pub input_arcs: Vec<ArcModel>,
    #[serde(default)]
    pub output_arcs: Vec<ArcModel>,
    #[serde(default)]
    pub inhibitor_arcs: Vec<InhibitorModel>,
    #[serde(default)]
    pub queries: Vec<QueryModel>,
}

impl NetModel {
    /// Feeds the whole document into a [`NetBuilder`], ready to build.
    pub fn into_builder(self) -> NetBuilder {
        let mut builder = NetBuilder::new();
        for color_type in self.color_types {
            builder.add_color_type(&color_type.name);
            for color in &color_type.colors {
                builder.add_to_color_type(&color_type.name, color);
            }
        }
        for variable in self.variables {
            builder.add_variable(&variable.name, &variable.color_type);
        }
        for place in self.places {
            let domain: Vec<&str> = place.color_types.iter().map(String::as_str).collect();
            builder.add_place(&place.name, &domain, place.initial);
        }
        for transition in self.transitions {
            builder.add_transition(&transition.name, transition.guard);
        }
        for arc in self.input_arcs {
            builder.add_input_arc(&arc.place, &arc.transition, arc.expression);
        }
        for arc in self.output_arcs {
            builder.add_output_arc(&arc.transition, &arc.place, arc.expression);
        }
        for inhibitor in self.inhibitor_arcs {
            builder.add_inhibitor_arc(&inhibitor.place, &inhibitor.transition, inhibitor.weight);
        }
        builder
    }
}

/// Reads a model, picking the format from the file extension.
pub fn read_model<P: AsRef<Path>>(path: P) -> Result<NetModel, IoError> {
    let path = path.as_ref();
    match extension_of(path)? {
        Format::Json => read_json(path),
        Format::Ron => read_ron(path),
        Format::Yaml => read_yaml(path),
    }
}

/// Writes a model, picking the format from the file extension.
pub fn write_model<P: AsRef<Path>>(path: P, model: &NetModel) -> Result<(), IoError> {
    let path = path.as_ref();
    match extension_of(path)? {
        Format::Json => write_json(path, model),
        Format::Ron => write_ron(path, model),
        Format::Yaml => write_yaml(path, model),
    }
}

enum Format {
    Json,
    Ron,
    Yaml,
}

fn extension_of(path: &Path) -> Result<Format, IoError> {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .unwrap_or("");
    match extension {
        "json" => Ok(Format::Json),
        "ron" => Ok(Format::Ron),
        "yaml" | "yml" => Ok(Format::Yaml),
        other => Err(IoError::UnsupportedFormat(other.to_owned())),
    }
}

pub fn to_json_string<T>(value: &T) -> Result<String, IoError>
where
    T: Serialize,
{
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn from_json_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(serde_json::from_str(s)?)
}

pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<(), IoError> {
    let mut file = File::create(path)?;
    let content = to_json_string(value)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

pub fn read_json<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T, IoError> {
    let mut file = File::open(path)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    from_json_str(&content)
}

pub fn to_ron_string<T>(value: &T) -> Result<String, IoError>
where
    T: Serialize,
{
    let mut pretty = PrettyConfig::default();
    pretty.new_line = "\n".into();
    Ok(ron::ser::to_string_pretty(value, pretty)?)
}

pub fn from_ron_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(ron::from_str(s).map_err(ron::Error::from)?)
}

pub fn write_ron<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<(), IoError> {
    let mut file = File::create(path)?;
    let content = to_ron_string(value)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

pub fn read_ron<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T, IoError> {
    let mut file = File::open(path)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    from_ron_str(&content)
}

pub fn to_yaml_string<T>(value: &T) -> Result<String, IoError>
where
    T: Serialize,
{
    Ok(serde_yaml::to_string(value)?)
}

pub fn from_yaml_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(serde_yaml::from_str(s)?)
}

pub fn write_yaml<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<(), IoError> {
    let mut file = File::create(path)?;
    let content = to_yaml_string(value)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

pub fn read_yaml<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T, IoError> {
    let mut file = File::open(path)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    from_yaml_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ast::ColorExpression;
    use crate::query::CountExpression;

    fn sample_model() -> NetModel {
        NetModel {
            color_types: vec![ColorTypeModel {
                name: "philo".to_owned(),
                colors: vec!["a".to_owned(), "b".to_owned(), "c".to_owned()],
            }],
            variables: vec![VariableModel {
                name: "x".to_owned(),
                color_type: "philo".to_owned(),
            }],
            places: vec![
                PlaceModel {
                    name: "thinking".to_owned(),
                    color_types: vec!["philo".to_owned()],
                    initial: vec![TokenDecl::new(&["a"], 1), TokenDecl::new(&["b"], 1)],
                },
                PlaceModel {
                    name: "eating".to_owned(),
                    color_types: vec!["philo".to_owned()],
                    initial: Vec::new(),
                },
            ],
            transitions: vec![TransitionModel {
                name: "sit".to_owned(),
                guard: Some(GuardExpression::Inequality {
                    lhs: vec![ColorExpression::var("x")],
                    rhs: vec![ColorExpression::color("philo", "c")],
                }),
            }],
            input_arcs: vec![ArcModel {
                place: "thinking".to_owned(),
                transition: "sit".to_owned(),
                expression: ArcExpression::Single(ColorExpression::var("x")),
            }],
            output_arcs: vec![ArcModel {
                place: "eating".to_owned(),
                transition: "sit".to_owned(),
                expression: ArcExpression::Single(ColorExpression::var("x")),
            }],
            inhibitor_arcs: vec![InhibitorModel {
                place: "eating".to_owned(),
                transition: "sit".to_owned(),
                weight: 2,
            }],
            queries: vec![QueryModel {
                name: "someone-eats".to_owned(),
                condition: Condition::ExistsFinally(Box::new(Condition::LessThanOrEqual(
                    CountExpression::Literal(1),
                    CountExpression::Place("eating".to_owned()),
                ))),
            }],
        }
    }

    #[test]
    fn json_round_trips() {
        let model = sample_model();
        let text = to_json_string(&model).unwrap();
        let back: NetModel = from_json_str(&text).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn ron_round_trips() {
        let model = sample_model();
        let text = to_ron_string(&model).unwrap();
        let back: NetModel = from_ron_str(&text).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn yaml_round_trips() {
        let model = sample_model();
        let text = to_yaml_string(&model).unwrap();
        let back: NetModel = from_yaml_str(&text).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn documents_build_into_nets() {
        let net = sample_model().into_builder().build().unwrap();
        assert_eq!(net.place_count(), 2);
        assert_eq!(net.transition_count(), 1);
        assert_eq!(net.initial_marking().total_tokens(), 2);
        assert!(net.find_place("eating").is_some());
        assert!(net.find_transition("sit").is_some());
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let model: NetModel = from_json_str("{}").unwrap();
        assert!(model.places.is_empty());
        assert!(model.queries.is_empty());
    }

    #[test]
    fn model_files_dispatch_on_extension() {
        let model = sample_model();
        let dir = std::env::temp_dir();
        for name in ["cpn-io-test.json", "cpn-io-test.ron", "cpn-io-test.yaml"] {
            let path = dir.join(format!("{}-{}", std::process::id(), name));
            write_model(&path, &model).unwrap();
            let back = read_model(&path).unwrap();
            std::fs::remove_file(&path).ok();
            assert_eq!(back, model);
        }

        let error = read_model(dir.join("model.pnml")).err().unwrap();
        assert!(matches!(error, IoError::UnsupportedFormat(_)));
    }
}
