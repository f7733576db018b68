//! Target-aligned feature transform
//!
//! Every column gets one [`Rule`]:
//! - continuous features keep their magnitude and flip sign when they
//!   correlate negatively with the target
//! - categorical features are replaced by the target rate of their value
//! - the target is re-encoded as `0`/`1`
//! - everything else passes through untouched and is declared `ignore`
//!
//! After the transform every modeled column is numeric and non-negatively
//! correlated with the target.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{FeatureError, Result};
use crate::line::{normalize_data_line, split_fields, MISSING};
use crate::names::{Feature, FeatureType, Schema};
use crate::stats::{Statistics, TargetEncoding};

/// Per-column re-encoding rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Rule {
    /// Target label replaced by its 0/1 code
    Target,
    /// `a * value + b`
    Linear { a: f64, b: f64 },
    /// Category replaced by its goodness
    CategoricalToContinuous { mapping: BTreeMap<String, f64> },
    /// Value copied through unchanged
    Ignore,
}

impl Rule {
    fn output_type(&self) -> FeatureType {
        match self {
            Rule::Target => FeatureType::Categorical,
            Rule::Linear { .. } | Rule::CategoricalToContinuous { .. } => FeatureType::Continuous,
            Rule::Ignore => FeatureType::Ignore,
        }
    }
}

/// Knobs for [`Transform::derive_with`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformOptions {
    /// Continuous features with `|correlation| <= ignore_below`, or with an
    /// undefined correlation, are ignored instead of failing the derivation.
    #[serde(default)]
    pub ignore_below: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRule {
    pub name: String,
    #[serde(flatten)]
    pub rule: Rule,
}

/// Derived transform, applicable to any row shaped like the source schema.
#[derive(Debug, Clone, Serialize)]
pub struct Transform {
    target_feature: String,
    target_index: usize,
    encoding: TargetEncoding,
    rules: Vec<FeatureRule>,
}

impl Transform {
    /// Derive with default options: sign flip only, no ignore threshold.
    pub fn derive(schema: &Schema, stats: &Statistics) -> Result<Self> {
        Self::derive_with(schema, stats, &TransformOptions::default())
    }

    pub fn derive_with(
        schema: &Schema,
        stats: &Statistics,
        options: &TransformOptions,
    ) -> Result<Self> {
        let same_columns = stats.features().len() == schema.size()
            && stats
                .features()
                .iter()
                .zip(schema.feature_order())
                .all(|(s, name)| s.name == name);
        if !same_columns || stats.target_feature() != schema.target_feature() {
            return Err(FeatureError::mismatch(
                None,
                None,
                "statistics were accumulated against a different schema",
            ));
        }

        let target_idx = schema.target_index();
        let mut rules = Vec::with_capacity(schema.size());
        for (i, (feature, feature_stats)) in schema
            .features()
            .iter()
            .zip(stats.features())
            .enumerate()
        {
            let rule = if i == target_idx {
                Rule::Target
            } else {
                match feature.kind {
                    Some(FeatureType::Continuous) => {
                        match stats.column_correlation(feature_stats) {
                            Ok(correlation) => linear_rule(&feature.name, correlation, options),
                            Err(err) if options.ignore_below.is_some() => {
                                warn!(feature = %feature.name, error = %err, "ignoring feature");
                                Rule::Ignore
                            }
                            Err(err) => return Err(err),
                        }
                    }
                    Some(FeatureType::Categorical) => {
                        let mapping = feature_stats
                            .categorical()
                            .map(|summary| {
                                summary
                                    .categories
                                    .iter()
                                    .map(|c| (c.value.clone(), c.goodness))
                                    .collect()
                            })
                            .unwrap_or_default();
                        Rule::CategoricalToContinuous { mapping }
                    }
                    _ => Rule::Ignore,
                }
            };
            debug!(feature = %feature.name, rule = ?rule, "derived rule");
            rules.push(FeatureRule {
                name: feature.name.clone(),
                rule,
            });
        }

        let transform = Self {
            target_feature: schema.target_feature().to_string(),
            target_index: target_idx,
            encoding: stats.target_encoding().clone(),
            rules,
        };
        info!(
            linear = transform.count_rules(|r| matches!(r, Rule::Linear { .. })),
            categorical = transform.count_rules(|r| matches!(r, Rule::CategoricalToContinuous { .. })),
            ignored = transform.count_rules(|r| matches!(r, Rule::Ignore)),
            "derived feature transform"
        );
        Ok(transform)
    }

    fn count_rules(&self, pred: impl Fn(&Rule) -> bool) -> usize {
        self.rules.iter().filter(|r| pred(&r.rule)).count()
    }

    pub fn target_feature(&self) -> &str {
        &self.target_feature
    }

    pub fn rules(&self) -> &[FeatureRule] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().rev().find(|r| r.name == name).map(|r| &r.rule)
    }

    /// Transform one data row. Missing values stay `?`.
    pub fn apply(&self, row: &str) -> Result<String> {
        let row = normalize_data_line(row);
        let fields = split_fields(&row);
        if fields.len() != self.rules.len() {
            return Err(FeatureError::mismatch(
                None,
                None,
                format!("expected {} columns, got {}", self.rules.len(), fields.len()),
            ));
        }

        let out = fields
            .iter()
            .zip(&self.rules)
            .map(|(&raw, feature)| self.apply_value(raw, feature))
            .collect::<Result<Vec<_>>>()?;
        Ok(out.join(","))
    }

    fn apply_value(&self, raw: &str, feature: &FeatureRule) -> Result<String> {
        if raw == MISSING {
            return Ok(MISSING.to_string());
        }
        let mismatch = |detail: String| FeatureError::mismatch(None, Some(feature.name.as_str()), detail);
        match &feature.rule {
            Rule::Target => self
                .encoding
                .encode(raw)
                .map(|code| code.to_string())
                .ok_or_else(|| mismatch(format!("target label '{}' is not encoded", raw))),
            Rule::Linear { a, b } => {
                let value: f64 = raw
                    .parse()
                    .map_err(|_| mismatch(format!("'{}' is not a number", raw)))?;
                Ok(format_value(a * value + b))
            }
            Rule::CategoricalToContinuous { mapping } => mapping
                .get(raw)
                .map(|&goodness| format_value(goodness))
                .ok_or_else(|| mismatch(format!("'{}' is not a declared category", raw))),
            Rule::Ignore => Ok(raw.to_string()),
        }
    }

    /// Transform every non-blank row of `reader` into `sink`. Returns the
    /// number of rows written.
    pub fn apply_lines<R: BufRead, W: Write>(&self, reader: R, sink: &mut W) -> Result<u64> {
        let mut written = 0;
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if normalize_data_line(&line).is_empty() {
                continue;
            }
            let out = self.apply(&line).map_err(|e| e.at_line(idx + 1))?;
            writeln!(sink, "{}", out)?;
            written += 1;
        }
        sink.flush()?;
        Ok(written)
    }

    /// Transform the data file at `input` into `output`. On error `output`
    /// is left as it was.
    pub fn apply_file(&self, input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<u64> {
        let staged = self.stage_file(input, output)?;
        let rows = staged.rows();
        staged.commit()?;
        Ok(rows)
    }

    /// Transform `input` into a temporary file next to `output`. Nothing
    /// becomes visible at `output` until [`StagedOutput::commit`].
    pub fn stage_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<StagedOutput> {
        let (input, output) = (input.as_ref(), output.as_ref());
        let reader = BufReader::new(File::open(input)?);
        let mut file = staging_file(output)?;
        let rows = self.apply_lines(reader, &mut BufWriter::new(&mut file))?;
        debug!(
            input = %input.display(),
            output = %output.display(),
            rows,
            "staged transformed data"
        );
        Ok(StagedOutput {
            file,
            destination: output.to_path_buf(),
            rows,
        })
    }

    /// Schema of the transformed data: target restated as `0, 1`, modeled
    /// columns continuous, the rest ignored.
    pub fn output_schema(&self) -> Result<Schema> {
        let features = self
            .rules
            .iter()
            .map(|r| match r.rule.output_type() {
                FeatureType::Categorical => Feature::categorical(r.name.clone(), ["0", "1"]),
                kind => Feature::typed(r.name.clone(), kind),
            })
            .collect();
        Schema::new(self.target_feature.clone(), features)
    }

    /// Write the transformed names description to `sink`.
    pub fn write_names<W: Write>(&self, sink: &mut W) -> Result<()> {
        self.output_schema()?.write_names(sink)?;
        Ok(())
    }

    /// Write the transformed names description to a file.
    pub fn write_names_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.stage_names_file(path)?.commit()
    }

    /// Write the transformed names description to a temporary file next to
    /// `path`, published by [`StagedOutput::commit`].
    pub fn stage_names_file(&self, path: impl AsRef<Path>) -> Result<StagedOutput> {
        let path = path.as_ref();
        let mut file = staging_file(path)?;
        {
            let mut writer = BufWriter::new(&mut file);
            self.write_names(&mut writer)?;
            writer.flush()?;
        }
        Ok(StagedOutput {
            file,
            destination: path.to_path_buf(),
            rows: 0,
        })
    }
}

/// Output written to a temporary file beside its destination. Dropping it
/// without [`StagedOutput::commit`] removes the temporary file.
#[derive(Debug)]
pub struct StagedOutput {
    file: NamedTempFile,
    destination: PathBuf,
    rows: u64,
}

impl StagedOutput {
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Data rows written; 0 for a names description.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Atomically move the output into place.
    pub fn commit(self) -> Result<()> {
        let StagedOutput {
            file,
            destination,
            rows,
        } = self;
        file.persist(&destination).map_err(|err| FeatureError::Io(err.error))?;
        info!(output = %destination.display(), rows, "wrote transformed output");
        Ok(())
    }
}

fn staging_file(destination: &Path) -> Result<NamedTempFile> {
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file = tempfile::Builder::new()
        .prefix(".tmc-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    Ok(file)
}

fn linear_rule(name: &str, correlation: f64, options: &TransformOptions) -> Rule {
    if let Some(threshold) = options.ignore_below {
        if correlation.abs() <= threshold {
            warn!(
                feature = %name,
                correlation,
                threshold,
                "correlation below threshold, ignoring feature"
            );
            return Rule::Ignore;
        }
    }
    let a = if correlation >= 0.0 { 1.0 } else { -1.0 };
    Rule::Linear { a, b: 0.0 }
}

/// Render a transformed value: integral results as integer literals,
/// everything else in shortest round-trip float form.
pub fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
