//! Stats command - one accumulation pass over a labeled data file

use crate::cli::config::{TargetConfig, TmcConfig};
use crate::cli::error::HelpfulError;
use crate::cli::names::load_schema;
use crate::cli::output::{format_number, format_optional, print_json, print_table};
use anyhow::Result;
use std::path::{Path, PathBuf};
use tmc_features::{accumulate_path, FeatureError, Schema, Statistics, Summary, TargetEncoding};
use tracing::info;

/// Arguments for the stats command
#[derive(Debug)]
pub struct StatsArgs {
    pub names: PathBuf,
    pub data: PathBuf,
    pub negative: Option<String>,
    pub positive: Option<String>,
    pub json: bool,
}

/// Pick the 0/1 encoding of the target.
///
/// Flags override the config file. With one side given the other is the
/// remaining declared label; with neither, declaration order decides.
pub fn resolve_encoding(
    schema: &Schema,
    negative: Option<String>,
    positive: Option<String>,
    config: &TargetConfig,
) -> std::result::Result<TargetEncoding, FeatureError> {
    let negative = negative.or_else(|| config.negative.clone());
    let positive = positive.or_else(|| config.positive.clone());

    let other = |given: &str| -> std::result::Result<String, FeatureError> {
        schema
            .target()
            .values
            .iter()
            .find(|v| v.as_str() != given)
            .cloned()
            .ok_or_else(|| FeatureError::InvalidTargetEncoding {
                target: schema.target_feature().to_string(),
                reason: format!("no declared label other than '{}'", given),
            })
    };

    let encoding = match (negative, positive) {
        (None, None) => return TargetEncoding::from_declared(schema),
        (Some(negative), Some(positive)) => TargetEncoding::new(negative, positive),
        (Some(negative), None) => {
            let positive = other(&negative)?;
            TargetEncoding::new(negative, positive)
        }
        (None, Some(positive)) => TargetEncoding::new(other(&positive)?, positive),
    };
    encoding.validate(schema)?;
    Ok(encoding)
}

/// Load the schema, resolve the encoding and accumulate `data`.
pub fn collect(
    names: &Path,
    data: &Path,
    negative: Option<String>,
    positive: Option<String>,
    config: &TmcConfig,
) -> Result<(Schema, Statistics)> {
    let schema = load_schema(names)?;
    let encoding = resolve_encoding(&schema, negative, positive, &config.target)
        .map_err(|err| HelpfulError::encoding_error(names, &err))?;
    let stats = accumulate_path(&schema, encoding, data)
        .map_err(|err| HelpfulError::data_error(data, names, &err))?;
    info!(
        data = %data.display(),
        rows = stats.rows_read(),
        skipped = stats.rows_skipped(),
        "statistics collected"
    );
    Ok((schema, stats))
}

pub fn run(args: StatsArgs, config: &TmcConfig) -> Result<()> {
    let (_, stats) = collect(&args.names, &args.data, args.negative, args.positive, config)?;

    if args.json {
        return print_json(&stats);
    }

    let encoding = stats
        .target_encoding()
        .labels()
        .map(|(label, code)| format!("{}={}", label, code))
        .collect::<Vec<_>>()
        .join(", ");
    println!(
        "Target: {} ({})    rows read: {}    rows skipped: {}",
        stats.target_feature(),
        encoding,
        stats.rows_read(),
        stats.rows_skipped()
    );
    print_table(
        &["Feature", "Kind", "Count", "Mean", "Sigma", "Correlation"],
        numeric_rows(&stats),
    );

    let categories = category_rows(&stats);
    if !categories.is_empty() {
        println!();
        print_table(
            &["Feature", "Value", "Negatives", "Positives", "Goodness"],
            categories,
        );
    }
    Ok(())
}

fn numeric_rows(stats: &Statistics) -> Vec<Vec<String>> {
    stats
        .features()
        .iter()
        .map(|feature| {
            let mut name = feature.name.clone();
            if feature.name == stats.target_feature() {
                name.push_str(" (target)");
            }
            match &feature.summary {
                Summary::Numeric(summary) => vec![
                    name,
                    "numeric".to_string(),
                    feature.count.to_string(),
                    format_number(summary.mean),
                    format_number(summary.sigma),
                    format_optional(summary.correlation),
                ],
                Summary::Categorical(summary) => vec![
                    name,
                    format!("categorical ({})", summary.categories.len()),
                    feature.count.to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    "-".to_string(),
                ],
                Summary::Untracked => vec![
                    name,
                    "untracked".to_string(),
                    feature.count.to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    "-".to_string(),
                ],
            }
        })
        .collect()
}

fn category_rows(stats: &Statistics) -> Vec<Vec<String>> {
    stats
        .features()
        .iter()
        .filter(|feature| feature.name != stats.target_feature())
        .filter_map(|feature| feature.categorical().map(|summary| (feature, summary)))
        .flat_map(|(feature, summary)| {
            summary.categories.iter().map(move |category| {
                vec![
                    feature.name.clone(),
                    category.value.clone(),
                    category.negatives.to_string(),
                    category.positives.to_string(),
                    format_number(category.goodness),
                ]
            })
        })
        .collect()
}
