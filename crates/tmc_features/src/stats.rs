//! One-pass feature statistics
//!
//! An [`Accumulator`] walks a data file once, row by row, keeping only raw
//! moments (sum, sum of squares, sum of products with the target) and
//! per-category target counts. [`Accumulator::finish`] derives mean, sigma,
//! Pearson correlation and per-category goodness from those sums, so rows
//! are never buffered.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{FeatureError, Result};
use crate::line::{normalize_data_line, split_fields, MISSING};
use crate::names::{FeatureType, Schema};

/// Mapping of the target's two declared labels onto `0` and `1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEncoding {
    labels: BTreeMap<String, u8>,
}

impl TargetEncoding {
    /// Encode `negative` as 0 and `positive` as 1.
    pub fn new(negative: impl Into<String>, positive: impl Into<String>) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(negative.into(), 0);
        labels.insert(positive.into(), 1);
        Self { labels }
    }

    /// Arbitrary caller-supplied mapping; checked by [`TargetEncoding::validate`].
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u8)>,
        S: Into<String>,
    {
        Self {
            labels: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// First declared target label encodes as 0, second as 1.
    pub fn from_declared(schema: &Schema) -> Result<Self> {
        let target = schema.target();
        match target.values.as_slice() {
            [negative, positive] => {
                let encoding = Self::new(negative.clone(), positive.clone());
                encoding.validate(schema)?;
                Ok(encoding)
            }
            values => Err(FeatureError::InvalidTargetEncoding {
                target: target.name.clone(),
                reason: format!("target declares {} labels, expected 2", values.len()),
            }),
        }
    }

    /// Check that the mapping covers exactly the target's two declared
    /// labels and sends them onto `{0, 1}`.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        let target = schema.target();
        let invalid = |reason: String| FeatureError::InvalidTargetEncoding {
            target: target.name.clone(),
            reason,
        };

        let declared = &target.values;
        if declared.len() != 2 || declared[0] == declared[1] {
            return Err(invalid(format!(
                "target must declare 2 distinct labels, found [{}]",
                declared.join(", ")
            )));
        }
        if self.labels.len() != 2 || !declared.iter().all(|v| self.labels.contains_key(v)) {
            return Err(invalid(format!(
                "encoding covers [{}], declared labels are [{}]",
                self.labels.keys().cloned().collect::<Vec<_>>().join(", "),
                declared.join(", ")
            )));
        }
        let mut codes: Vec<u8> = self.labels.values().copied().collect();
        codes.sort_unstable();
        if codes != [0, 1] {
            return Err(invalid(format!("labels must map onto 0 and 1, got {:?}", codes)));
        }
        Ok(())
    }

    pub fn encode(&self, label: &str) -> Option<u8> {
        self.labels.get(label).copied()
    }

    pub fn labels(&self) -> impl Iterator<Item = (&str, u8)> + '_ {
        self.labels.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Raw moments of a numeric column against the encoded target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    pub sum: f64,
    pub sum_of_squares: f64,
    pub sum_of_products: f64,
}

impl Moments {
    fn add(&mut self, value: f64, target: f64) {
        self.sum += value;
        self.sum_of_squares += value * value;
        self.sum_of_products += value * target;
    }
}

/// Parsed value of one cell, before any sum is touched.
enum Observation<'r> {
    Missing,
    Number(f64),
    Category(&'r str),
    Present,
}

#[derive(Debug)]
enum Tally {
    Numeric(Moments),
    Categorical(HashMap<String, [u64; 2]>),
    Counted,
}

#[derive(Debug)]
struct ColumnTally {
    count: u64,
    tally: Tally,
}

/// Mutable state of a single pass over a data file.
#[derive(Debug)]
pub struct Accumulator<'s> {
    schema: &'s Schema,
    encoding: TargetEncoding,
    columns: Vec<ColumnTally>,
    line_no: usize,
    rows_read: u64,
    rows_skipped: u64,
}

impl<'s> Accumulator<'s> {
    pub fn new(schema: &'s Schema, encoding: TargetEncoding) -> Result<Self> {
        encoding.validate(schema)?;

        let target_idx = schema.target_index();
        let columns = schema
            .features()
            .iter()
            .enumerate()
            .map(|(i, feature)| {
                let tally = if i == target_idx || feature.is_continuous() {
                    Tally::Numeric(Moments::default())
                } else if feature.is_categorical() {
                    Tally::Categorical(
                        feature.values.iter().map(|v| (v.clone(), [0, 0])).collect(),
                    )
                } else {
                    Tally::Counted
                };
                ColumnTally { count: 0, tally }
            })
            .collect();

        Ok(Self {
            schema,
            encoding,
            columns,
            line_no: 0,
            rows_read: 0,
            rows_skipped: 0,
        })
    }

    /// Feed one raw data line.
    pub fn push_line(&mut self, raw: &str) -> Result<()> {
        self.line_no += 1;
        let line_no = self.line_no;
        self.push_row(raw).map_err(|e| e.at_line(line_no))
    }

    fn push_row(&mut self, raw: &str) -> Result<()> {
        let row = normalize_data_line(raw);
        if row.is_empty() {
            debug!(line = self.line_no, "skipping blank row");
            return Ok(());
        }

        let fields = split_fields(&row);
        if fields.len() != self.schema.size() {
            return Err(FeatureError::mismatch(
                None,
                None,
                format!(
                    "expected {} columns, got {}",
                    self.schema.size(),
                    fields.len()
                ),
            ));
        }

        let target_idx = self.schema.target_index();
        let target_raw = fields[target_idx];
        if target_raw == MISSING {
            debug!(line = self.line_no, "skipping row with missing target");
            self.rows_skipped += 1;
            return Ok(());
        }
        let target = self.encoding.encode(target_raw).ok_or_else(|| {
            FeatureError::mismatch(
                None,
                Some(self.schema.target_feature()),
                format!("target label '{}' is not encoded", target_raw),
            )
        })?;
        let target_numeric = f64::from(target);

        let observations = fields
            .iter()
            .zip(self.schema.features())
            .enumerate()
            .map(|(i, (&raw, feature))| {
                if raw == MISSING {
                    return Ok(Observation::Missing);
                }
                if i == target_idx {
                    return Ok(Observation::Number(target_numeric));
                }
                match feature.kind {
                    Some(FeatureType::Continuous) => raw
                        .parse::<f64>()
                        .map(Observation::Number)
                        .map_err(|_| {
                            FeatureError::mismatch(
                                None,
                                Some(feature.name.as_str()),
                                format!("'{}' is not a number", raw),
                            )
                        }),
                    Some(FeatureType::Categorical) if feature.values.iter().any(|v| v == raw) => {
                        Ok(Observation::Category(raw))
                    }
                    Some(FeatureType::Categorical) => Err(FeatureError::mismatch(
                        None,
                        Some(feature.name.as_str()),
                        format!("'{}' is not a declared category", raw),
                    )),
                    _ => Ok(Observation::Present),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        // Every cell is valid past this point; the row is applied whole.
        for (column, observation) in self.columns.iter_mut().zip(&observations) {
            match (observation, &mut column.tally) {
                (Observation::Missing, _) => continue,
                (Observation::Number(value), Tally::Numeric(moments)) => {
                    moments.add(*value, target_numeric);
                }
                (Observation::Category(value), Tally::Categorical(counts)) => {
                    if let Some(slot) = counts.get_mut(*value) {
                        slot[usize::from(target)] += 1;
                    }
                }
                _ => {}
            }
            column.count += 1;
        }

        self.rows_read += 1;
        Ok(())
    }

    /// Derive the final statistics.
    pub fn finish(self) -> Result<Statistics> {
        let target_idx = self.schema.target_index();
        let target_name = self.schema.target_feature().to_string();

        let target_column = &self.columns[target_idx];
        let target_moments = match &target_column.tally {
            Tally::Numeric(moments) => *moments,
            _ => Moments::default(),
        };
        let (target_mean, target_sigma) =
            mean_sigma(&target_name, target_column.count, &target_moments)?;

        let mut features = Vec::with_capacity(self.columns.len());
        for (column, feature) in self.columns.into_iter().zip(self.schema.features()) {
            let summary = match column.tally {
                Tally::Numeric(moments) => {
                    let (mean, sigma) = mean_sigma(&feature.name, column.count, &moments)?;
                    let n = column.count as f64;
                    let denominator = sigma * target_sigma;
                    let correlation = (denominator.is_finite() && denominator > 0.0)
                        .then(|| (moments.sum_of_products / n - mean * target_mean) / denominator);
                    Summary::Numeric(NumericSummary {
                        moments,
                        mean,
                        sigma,
                        correlation,
                    })
                }
                Tally::Categorical(counts) => {
                    let mut categories: Vec<CategoryStats> = Vec::new();
                    for value in &feature.values {
                        if categories.iter().any(|c| &c.value == value) {
                            continue;
                        }
                        let [negatives, positives] = counts[value];
                        categories.push(CategoryStats::new(value.clone(), negatives, positives));
                    }
                    Summary::Categorical(CategoricalSummary { categories })
                }
                Tally::Counted => Summary::Untracked,
            };
            features.push(FeatureStats {
                name: feature.name.clone(),
                count: column.count,
                summary,
            });
        }

        info!(
            rows = self.rows_read,
            skipped = self.rows_skipped,
            features = features.len(),
            "accumulated feature statistics"
        );

        Ok(Statistics {
            target_feature: target_name,
            target_index: target_idx,
            encoding: self.encoding,
            rows_read: self.rows_read,
            rows_skipped: self.rows_skipped,
            features,
        })
    }
}

/// Population mean and sigma from raw moments. Sigma is NaN when round-off
/// pushes the variance below zero.
fn mean_sigma(feature: &str, count: u64, moments: &Moments) -> Result<(f64, f64)> {
    if count == 0 {
        return Err(FeatureError::DegenerateStatistics {
            feature: feature.to_string(),
        });
    }
    let n = count as f64;
    let mean = moments.sum / n;
    let sigma = (moments.sum_of_squares / n - mean * mean).sqrt();
    Ok((mean, sigma))
}

/// Run one pass over `reader`.
pub fn accumulate<R: BufRead>(
    schema: &Schema,
    encoding: TargetEncoding,
    reader: R,
) -> Result<Statistics> {
    let mut acc = Accumulator::new(schema, encoding)?;
    for line in reader.lines() {
        acc.push_line(&line?)?;
    }
    acc.finish()
}

/// Run one pass over the data file at `path`.
pub fn accumulate_path(
    schema: &Schema,
    encoding: TargetEncoding,
    path: impl AsRef<Path>,
) -> Result<Statistics> {
    let path = path.as_ref();
    debug!(path = %path.display(), "accumulating statistics");
    let file = File::open(path)?;
    accumulate(schema, encoding, BufReader::new(file))
}

/// Target counts and goodness of one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub value: String,
    /// Observations with target 0
    pub negatives: u64,
    /// Observations with target 1
    pub positives: u64,
    /// Target rate; 0 for a category never observed
    pub goodness: f64,
}

impl CategoryStats {
    fn new(value: String, negatives: u64, positives: u64) -> Self {
        let total = negatives + positives;
        let goodness = if total > 0 {
            positives as f64 / total as f64
        } else {
            0.0
        };
        Self {
            value,
            negatives,
            positives,
            goodness,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub moments: Moments,
    pub mean: f64,
    pub sigma: f64,
    /// `None` when the feature or the target has zero variance
    pub correlation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalSummary {
    /// One entry per distinct declared value, in declaration order
    pub categories: Vec<CategoryStats>,
}

impl CategoricalSummary {
    pub fn category(&self, value: &str) -> Option<&CategoryStats> {
        self.categories.iter().find(|c| c.value == value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Summary {
    Numeric(NumericSummary),
    Categorical(CategoricalSummary),
    /// Ignored, label and untyped columns only count observations
    Untracked,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureStats {
    pub name: String,
    /// Non-missing observations
    pub count: u64,
    #[serde(flatten)]
    pub summary: Summary,
}

impl FeatureStats {
    pub fn numeric(&self) -> Option<&NumericSummary> {
        match &self.summary {
            Summary::Numeric(summary) => Some(summary),
            _ => None,
        }
    }

    pub fn categorical(&self) -> Option<&CategoricalSummary> {
        match &self.summary {
            Summary::Categorical(summary) => Some(summary),
            _ => None,
        }
    }
}

/// Finalized statistics of one schema over one data file. Columns are kept
/// in schema order.
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    target_feature: String,
    target_index: usize,
    encoding: TargetEncoding,
    rows_read: u64,
    rows_skipped: u64,
    features: Vec<FeatureStats>,
}

impl Statistics {
    pub fn target_feature(&self) -> &str {
        &self.target_feature
    }

    pub fn target_encoding(&self) -> &TargetEncoding {
        &self.encoding
    }

    /// Rows that contributed to the statistics.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Rows dropped because their target was missing.
    pub fn rows_skipped(&self) -> u64 {
        self.rows_skipped
    }

    pub fn features(&self) -> &[FeatureStats] {
        &self.features
    }

    pub fn column(&self, index: usize) -> Option<&FeatureStats> {
        self.features.get(index)
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureStats> {
        self.features.iter().rev().find(|f| f.name == name)
    }

    pub fn count(&self, name: &str) -> Option<u64> {
        self.feature(name).map(|f| f.count)
    }

    pub fn mean(&self, name: &str) -> Option<f64> {
        self.feature(name)?.numeric().map(|s| s.mean)
    }

    pub fn sigma(&self, name: &str) -> Option<f64> {
        self.feature(name)?.numeric().map(|s| s.sigma)
    }

    /// Pearson correlation of a numeric column with the target.
    pub fn correlation(&self, name: &str) -> Result<f64> {
        let stats = self.feature(name).ok_or_else(|| {
            FeatureError::mismatch(None, Some(name), "feature not present in statistics")
        })?;
        self.column_correlation(stats)
    }

    pub(crate) fn column_correlation(&self, stats: &FeatureStats) -> Result<f64> {
        let undefined = |reason: &str| FeatureError::UndefinedCorrelation {
            feature: stats.name.clone(),
            reason: reason.to_string(),
        };
        let summary = stats
            .numeric()
            .ok_or_else(|| undefined("feature is not continuous"))?;
        if let Some(correlation) = summary.correlation {
            return Ok(correlation);
        }
        if summary.sigma.is_finite() && summary.sigma > 0.0 {
            Err(undefined("target has zero variance"))
        } else {
            Err(undefined("feature has zero variance"))
        }
    }

    /// Target rate of a category.
    pub fn goodness(&self, name: &str, value: &str) -> Option<f64> {
        self.feature(name)?
            .categorical()?
            .category(value)
            .map(|c| c.goodness)
    }
}
