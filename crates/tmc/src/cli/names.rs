//! Names command - parse a names file and show the schema it describes

use crate::cli::error::HelpfulError;
use crate::cli::output::{print_json, print_table};
use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tmc_features::{Feature, Schema};

/// Arguments for the names command
#[derive(Debug)]
pub struct NamesArgs {
    pub names: PathBuf,
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct NamesReport<'a> {
    path: String,
    target_feature: &'a str,
    target_index: usize,
    size: usize,
    features: &'a [Feature],
    names: String,
}

/// Parse a names file, attaching path-specific help on failure.
pub fn load_schema(path: &Path) -> Result<Schema> {
    Schema::from_path(path).map_err(|err| HelpfulError::names_error(path, &err).into())
}

pub fn run(args: NamesArgs) -> Result<()> {
    let schema = load_schema(&args.names)?;

    if args.json {
        let report = NamesReport {
            path: args.names.display().to_string(),
            target_feature: schema.target_feature(),
            target_index: schema.target_index(),
            size: schema.size(),
            features: schema.features(),
            names: schema.to_names_string(),
        };
        return print_json(&report);
    }

    let rows = feature_rows(&schema);
    print_table(&["#", "Feature", "Type", "Values"], rows);
    println!();
    print!("{}", schema.to_names_string());
    Ok(())
}

fn feature_rows(schema: &Schema) -> Vec<Vec<String>> {
    schema
        .features()
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            let name = if index == schema.target_index() {
                format!("{} (target)", feature.name)
            } else {
                feature.name.clone()
            };
            let kind = feature
                .kind
                .map(|k| k.to_string())
                .unwrap_or_else(|| "-".to_string());
            vec![index.to_string(), name, kind, feature.values.join(", ")]
        })
        .collect()
}
