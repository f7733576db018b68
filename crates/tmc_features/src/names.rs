//! Names-file schema
//!
//! A names file declares the target first, then one feature per line:
//!
//! ```text
//! <=50K, >50K.            | target labels
//!
//! age: continuous.
//! workclass: Private, Self-emp-not-inc, Federal-gov.
//! fnlwgt: ignore.
//! ```
//!
//! The first non-empty line is the target declaration. It is either a bare
//! label list (the target is then named `target`) or a feature name. If the
//! target is not re-declared in the body it is appended as the last column.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{FeatureError, Result};
use crate::line::normalize_names_line;

/// Name given to a target declared only by its label list.
pub const DEFAULT_TARGET_NAME: &str = "target";

/// Declared type of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    Continuous,
    Categorical,
    Ignore,
    /// Reserved by the grammar; carried but never modeled.
    Label,
}

impl FeatureType {
    /// Keyword used in a names file, `None` for categorical features which
    /// list their values instead.
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            FeatureType::Continuous => Some("continuous"),
            FeatureType::Ignore => Some("ignore"),
            FeatureType::Label => Some("label"),
            FeatureType::Categorical => None,
        }
    }

    /// Parse a reserved keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "continuous" => Some(FeatureType::Continuous),
            "ignore" => Some(FeatureType::Ignore),
            "label" => Some(FeatureType::Label),
            _ => None,
        }
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword().unwrap_or("categorical"))
    }
}

/// A single column declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,

    /// `None` when the declaration carried no type
    pub kind: Option<FeatureType>,

    /// Category vocabulary in declaration order; empty unless categorical
    pub values: Vec<String>,
}

impl Feature {
    pub fn continuous(name: impl Into<String>) -> Self {
        Self::typed(name, FeatureType::Continuous)
    }

    pub fn typed(name: impl Into<String>, kind: FeatureType) -> Self {
        Self {
            name: name.into(),
            kind: Some(kind),
            values: Vec::new(),
        }
    }

    pub fn categorical<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: Some(FeatureType::Categorical),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            values: Vec::new(),
        }
    }

    pub fn is_continuous(&self) -> bool {
        self.kind == Some(FeatureType::Continuous)
    }

    pub fn is_categorical(&self) -> bool {
        self.kind == Some(FeatureType::Categorical)
    }

    /// Right-hand side of the declaration, without the terminating `.`
    fn declaration(&self) -> Option<String> {
        match self.kind {
            Some(FeatureType::Categorical) => Some(self.values.join(", ")),
            Some(kind) => kind.keyword().map(str::to_string),
            None => None,
        }
    }

    fn write_line<W: Write>(&self, sink: &mut W) -> io::Result<()> {
        match self.declaration() {
            Some(decl) => writeln!(sink, "{}: {}.", self.name, decl),
            None => writeln!(sink, "{}.", self.name),
        }
    }
}

/// Parse one names line. Returns `None` for lines that normalize to empty.
///
/// A head containing a comma has no feature name: the whole line is a label
/// list and the feature keeps the default target name.
pub fn parse_line(raw: &str) -> Option<Feature> {
    let line = normalize_names_line(raw);
    if line.is_empty() {
        return None;
    }

    let (head, tail) = match line.split_once(':') {
        Some((head, tail)) => (head.trim_end_matches(' '), Some(tail)),
        None => (line.trim_end_matches(' '), None),
    };

    let (name, tail) = if head.contains(',') {
        (DEFAULT_TARGET_NAME, Some(line))
    } else {
        (head, tail)
    };

    let tail = match tail.map(|t| t.trim_start_matches(' ')) {
        Some(t) if !t.is_empty() => t,
        _ => return Some(Feature::untyped(name)),
    };

    if let Some(kind) = FeatureType::from_keyword(tail) {
        return Some(Feature::typed(name, kind));
    }

    Some(Feature::categorical(
        name,
        tail.split(',').map(|value| value.trim_matches(' ')),
    ))
}

/// Parsed names file: the target plus every column in data-file order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    target_feature: String,
    features: Vec<Feature>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Schema {
    /// Build a schema from columns in data-file order. The target must be
    /// declared exactly once.
    pub fn new(target_feature: impl Into<String>, features: Vec<Feature>) -> Result<Self> {
        let target_feature = target_feature.into();
        let occurrences = features
            .iter()
            .filter(|f| f.name == target_feature)
            .count();
        if occurrences != 1 {
            return Err(FeatureError::MalformedSchema(format!(
                "target feature '{}' declared {} times, expected exactly once",
                target_feature, occurrences
            )));
        }

        let index = features
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();

        Ok(Self {
            target_feature,
            features,
            index,
        })
    }

    /// Parse a names description line by line.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader.lines();

        let mut target = None;
        for line in lines.by_ref() {
            let line = line.map_err(FeatureError::SchemaIo)?;
            if let Some(feature) = parse_line(&line) {
                target = Some(feature);
                break;
            }
        }
        let target = target.ok_or_else(|| {
            FeatureError::MalformedSchema("no target declaration found".to_string())
        })?;

        let mut features = Vec::new();
        for line in lines {
            let line = line.map_err(FeatureError::SchemaIo)?;
            if let Some(feature) = parse_line(&line) {
                features.push(feature);
            }
        }

        let target_feature = target.name.clone();
        if !features.iter().any(|f| f.name == target_feature) {
            debug!(target = %target_feature, "target not declared in body, appending as last column");
            features.push(target);
        }

        let schema = Self::new(target_feature, features)?;
        info!(
            target = %schema.target_feature,
            features = schema.size(),
            "parsed names description"
        );
        Ok(schema)
    }

    /// Read and parse a names file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(FeatureError::SchemaIo)?;
        debug!(path = %path.display(), "reading names file");
        Self::parse(BufReader::new(file))
    }

    /// Number of columns, target included.
    pub fn size(&self) -> usize {
        self.features.len()
    }

    pub fn target_feature(&self) -> &str {
        &self.target_feature
    }

    /// Column index of the target.
    pub fn target_index(&self) -> usize {
        self.index[&self.target_feature]
    }

    pub fn target(&self) -> &Feature {
        &self.features[self.target_index()]
    }

    /// Look up a column by name. With duplicate names the last one wins.
    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.index.get(name).map(|&i| &self.features[i])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Columns in data-file order.
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn feature_order(&self) -> impl Iterator<Item = &str> + '_ {
        self.features.iter().map(|f| f.name.as_str())
    }

    /// Write the names description to `sink`.
    ///
    /// The first line always declares the target with its labels. A
    /// trailing target is left out of the body; any other target is also
    /// declared in place, so re-parsing keeps the column order.
    pub fn write_names<W: Write>(&self, sink: &mut W) -> io::Result<()> {
        let target_idx = self.target_index();
        let target_last = target_idx + 1 == self.features.len();

        self.features[target_idx].write_line(sink)?;
        writeln!(sink)?;

        for (i, feature) in self.features.iter().enumerate() {
            if target_last && i == target_idx {
                continue;
            }
            feature.write_line(sink)?;
        }
        Ok(())
    }

    pub fn to_names_string(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_names(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl FromStr for Schema {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADULT_HEAD: &str = "\
| adult census excerpt
>50K, <=50K.

age: continuous.
workclass: Private, Self-emp-not-inc, Never-worked.
fnlwgt: continuous.   | sampling weight
education-num: ignore.
";

    #[test]
    fn test_parse_line_keywords() {
        assert_eq!(parse_line("age: continuous."), Some(Feature::continuous("age")));
        assert_eq!(
            parse_line("id: ignore."),
            Some(Feature::typed("id", FeatureType::Ignore))
        );
        assert_eq!(
            parse_line("row:label"),
            Some(Feature::typed("row", FeatureType::Label))
        );
    }

    #[test]
    fn test_parse_line_categorical_keeps_order_and_duplicates() {
        let feature = parse_line("color :  red, blue ,red.").unwrap();
        assert_eq!(feature.name, "color");
        assert_eq!(feature.kind, Some(FeatureType::Categorical));
        assert_eq!(feature.values, vec!["red", "blue", "red"]);
    }

    #[test]
    fn test_parse_line_label_list_has_default_name() {
        let feature = parse_line("<=50K, >50K.").unwrap();
        assert_eq!(feature.name, DEFAULT_TARGET_NAME);
        assert_eq!(feature.values, vec!["<=50K", ">50K"]);
    }

    #[test]
    fn test_parse_line_untyped() {
        assert_eq!(parse_line("target_feature.| note"), Some(Feature::untyped("target_feature")));
        assert_eq!(parse_line("weight:   ."), Some(Feature::untyped("weight")));
        assert_eq!(parse_line("   | nothing here"), None);
    }

    #[test]
    fn test_schema_appends_label_list_target() {
        let schema: Schema = ADULT_HEAD.parse().unwrap();
        assert_eq!(schema.size(), 5);
        assert_eq!(schema.target_feature(), "target");
        assert_eq!(schema.target_index(), 4);
        assert_eq!(
            schema.feature_order().collect::<Vec<_>>(),
            vec!["age", "workclass", "fnlwgt", "education-num", "target"]
        );
        assert_eq!(schema.target().values, vec![">50K", "<=50K"]);
        assert!(schema.feature("workclass").unwrap().is_categorical());
    }

    #[test]
    fn test_schema_target_declared_in_body() {
        let text = "\
| this is comment
target_feature.| one more comment

   feature1: continuous.
feature2: continuous.   | third comment
feature3: ignore.
target_feature: v1, v2.
case weight: continuous.

  | trailing comment
";
        let schema: Schema = text.parse().unwrap();
        assert_eq!(schema.size(), 5);
        assert_eq!(schema.target_index(), 3);
        assert_eq!(schema.target().values, vec!["v1", "v2"]);
        assert_eq!(schema.index_of("case weight"), Some(4));
    }

    #[test]
    fn test_schema_without_content_is_malformed() {
        let err = "| just a comment\n\n   \n| another\n"
            .parse::<Schema>()
            .unwrap_err();
        assert!(matches!(err, FeatureError::MalformedSchema(_)));

        let err = "".parse::<Schema>().unwrap_err();
        assert!(matches!(err, FeatureError::MalformedSchema(_)));
    }

    #[test]
    fn test_schema_new_requires_single_target() {
        let err = Schema::new(
            "y",
            vec![Feature::continuous("x"), Feature::categorical("y", ["a", "b"]), Feature::untyped("y")],
        )
        .unwrap_err();
        assert!(matches!(err, FeatureError::MalformedSchema(_)));

        let err = Schema::new("y", vec![Feature::continuous("x")]).unwrap_err();
        assert!(matches!(err, FeatureError::MalformedSchema(_)));
    }

    #[test]
    fn test_write_names_trailing_target() {
        let schema: Schema = ADULT_HEAD.parse().unwrap();
        assert_eq!(
            schema.to_names_string(),
            "\
target: >50K, <=50K.

age: continuous.
workclass: Private, Self-emp-not-inc, Never-worked.
fnlwgt: continuous.
education-num: ignore.
"
        );
    }

    #[test]
    fn test_round_trip_preserves_columns() {
        let schema = Schema::new(
            "income",
            vec![
                Feature::continuous("age"),
                Feature::categorical("income", ["low", "high"]),
                Feature::categorical("color", ["red", "blue", "red"]),
                Feature::typed("id", FeatureType::Label),
                Feature::untyped("note"),
            ],
        )
        .unwrap();

        let reparsed: Schema = schema.to_names_string().parse().unwrap();
        assert_eq!(reparsed.target_feature(), "income");
        assert_eq!(reparsed.features(), schema.features());
    }

    #[test]
    fn test_write_names_inner_target_lists_labels_first() {
        let schema = Schema::new(
            "income",
            vec![
                Feature::continuous("age"),
                Feature::categorical("income", ["0", "1"]),
                Feature::continuous("hours"),
            ],
        )
        .unwrap();

        assert_eq!(
            schema.to_names_string(),
            "\
income: 0, 1.

age: continuous.
income: 0, 1.
hours: continuous.
"
        );
        let reparsed: Schema = schema.to_names_string().parse().unwrap();
        assert_eq!(reparsed.target_index(), 1);
        assert_eq!(reparsed.features(), schema.features());
    }
}
