//! Transform command - derive rules from training data and rewrite files
//!
//! Writes `<names-stem>.<suffix>.names` plus one `<stem>.<suffix>.<ext>`
//! per data file, next to the training file unless `--out-dir` is given.

use crate::cli::config::{check_suffix, TmcConfig};
use crate::cli::error::HelpfulError;
use crate::cli::output::{format_number, print_json, print_table};
use crate::cli::stats::collect;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tmc_features::{FeatureRule, Rule, Transform};
use tracing::info;

/// Arguments for the transform command
#[derive(Debug)]
pub struct TransformArgs {
    pub names: PathBuf,
    pub train: PathBuf,
    pub apply: Vec<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub ignore_below: Option<f64>,
    pub suffix: Option<String>,
    pub negative: Option<String>,
    pub positive: Option<String>,
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct OutputFile {
    input: String,
    output: String,
    rows: u64,
}

#[derive(Debug, Serialize)]
struct TransformReport<'a> {
    names: String,
    rows_read: u64,
    rows_skipped: u64,
    rules: &'a [FeatureRule],
    outputs: Vec<OutputFile>,
}

/// `adult.data` -> `adult.<suffix>.data`; `adult` -> `adult.<suffix>`
pub fn output_path(input: &Path, out_dir: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let file_name = match input.extension() {
        Some(ext) => format!("{}.{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}.{}", stem, suffix),
    };
    out_dir.join(file_name)
}

pub fn run(args: TransformArgs, config: &TmcConfig) -> Result<()> {
    if let Some(threshold) = args.ignore_below {
        anyhow::ensure!(
            threshold.is_finite() && threshold >= 0.0,
            HelpfulError::new(format!("Invalid --ignore-below value: {}", threshold))
                .with_suggestion("TRY: Use a non-negative correlation magnitude such as 0.05")
        );
    }
    let suffix = match &args.suffix {
        Some(suffix) => {
            check_suffix(suffix).map_err(|err| {
                HelpfulError::new(format!("Invalid --suffix value: {:#}", err))
                    .with_suggestion("TRY: Use a plain word such as --suffix numeric")
            })?;
            suffix.clone()
        }
        None => config.transform.suffix.clone(),
    };
    let mut options = config.transform.options();
    if args.ignore_below.is_some() {
        options.ignore_below = args.ignore_below;
    }

    let (schema, stats) = collect(
        &args.names,
        &args.train,
        args.negative.clone(),
        args.positive.clone(),
        config,
    )?;
    let transform = Transform::derive_with(&schema, &stats, &options)
        .map_err(|err| HelpfulError::data_error(&args.train, &args.names, &err))?;

    let out_dir = match &args.out_dir {
        Some(dir) => dir.clone(),
        None => args
            .train
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    if !out_dir.as_os_str().is_empty() {
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;
    }

    // Stage every output first so a failing file publishes nothing.
    let names_out = output_path(&args.names, &out_dir, &suffix);
    let mut staged = vec![transform
        .stage_names_file(&names_out)
        .with_context(|| format!("Failed to write {}", names_out.display()))?];

    let mut outputs = Vec::with_capacity(1 + args.apply.len());
    for input in std::iter::once(&args.train).chain(&args.apply) {
        let output = output_path(input, &out_dir, &suffix);
        let stage = transform
            .stage_file(input, &output)
            .map_err(|err| HelpfulError::data_error(input, &args.names, &err))?;
        outputs.push(OutputFile {
            input: input.display().to_string(),
            output: output.display().to_string(),
            rows: stage.rows(),
        });
        staged.push(stage);
    }

    for stage in staged {
        let destination = stage.destination().to_path_buf();
        stage
            .commit()
            .with_context(|| format!("Failed to write {}", destination.display()))?;
    }
    info!(files = outputs.len() + 1, "transform outputs written");

    if args.json {
        return print_json(&TransformReport {
            names: names_out.display().to_string(),
            rows_read: stats.rows_read(),
            rows_skipped: stats.rows_skipped(),
            rules: transform.rules(),
            outputs,
        });
    }

    print_table(&["Feature", "Rule", "Detail"], rule_rows(transform.rules()));
    println!();
    println!("Names: {}", names_out.display());
    for output in &outputs {
        println!("Data:  {} ({} rows)", output.output, output.rows);
    }
    Ok(())
}

fn rule_rows(rules: &[FeatureRule]) -> Vec<Vec<String>> {
    rules
        .iter()
        .map(|feature| {
            let (rule, detail) = match &feature.rule {
                Rule::Target => ("target", "0/1 encoded".to_string()),
                Rule::Linear { a, b } => ("linear", format!("{} * x + {}", a, b)),
                Rule::CategoricalToContinuous { mapping } => (
                    "goodness",
                    mapping
                        .iter()
                        .map(|(value, goodness)| format!("{}={}", value, format_number(*goodness)))
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
                Rule::Ignore => ("ignore", "passed through".to_string()),
            };
            vec![feature.name.clone(), rule.to_string(), detail]
        })
        .collect()
}
