//! Reweight command - turn weighted stock rows into balanced example pairs
//!
//! Every row ending in `weight,label` becomes two rows with the same
//! prefix: one labeled 0 and one labeled 1, each carrying its share of the
//! signed weight mapped onto `[0, 1]`.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

/// Arguments for the reweight command
#[derive(Debug)]
pub struct ReweightArgs {
    pub data: PathBuf,
}

/// Split one row. Returns `None` for blank rows.
pub fn reweight_row(row: &str) -> Result<Option<[String; 2]>> {
    let row = row.trim();
    if row.is_empty() {
        return Ok(None);
    }

    let fields: Vec<&str> = row.split(',').collect();
    anyhow::ensure!(
        fields.len() >= 2,
        "expected at least 2 fields (weight,label), got {}",
        fields.len()
    );
    let (prefix, tail) = fields.split_at(fields.len() - 2);
    let weight: f64 = tail[0]
        .trim()
        .parse()
        .with_context(|| format!("weight '{}' is not a number", tail[0]))?;

    let signed = if tail[1].trim() == "0" { -weight } else { weight };
    let shifted = signed / 2.0 + 0.5;
    let positive = shifted.clamp(0.0, 1.0);
    let negative = (1.0 - shifted).clamp(0.0, 1.0);

    let prefix = prefix.join(",");
    Ok(Some([
        format!("{},{:?},0", prefix, negative),
        format!("{},{:?},1", prefix, positive),
    ]))
}

/// Reweight every row of `reader` into `sink`. Returns input rows consumed.
pub fn reweight_lines<R: BufRead, W: Write>(reader: R, sink: &mut W) -> Result<u64> {
    let mut rows = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let pair = reweight_row(&line).with_context(|| format!("line {}", index + 1))?;
        if let Some([negative, positive]) = pair {
            writeln!(sink, "{}", negative)?;
            writeln!(sink, "{}", positive)?;
            rows += 1;
        }
    }
    sink.flush()?;
    Ok(rows)
}

pub fn run(args: ReweightArgs) -> Result<()> {
    let file = File::open(&args.data)
        .with_context(|| format!("Failed to open data file: {}", args.data.display()))?;
    let stdout = io::stdout();
    let mut sink = BufWriter::new(stdout.lock());
    let rows = reweight_lines(BufReader::new(file), &mut sink)
        .with_context(|| format!("Failed to reweight {}", args.data.display()))?;
    info!(data = %args.data.display(), rows, "reweighted rows");
    Ok(())
}
