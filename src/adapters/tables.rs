//! CSV tables exchanged with the verifier, the sampler, and the partition generator.
//!
//! Columns are looked up by header name, so extra columns are ignored and
//! column order does not matter. The state columns are named by the
//! [`Benchmark`] in use (`y,h` or `pos,vel`); the robustness column is
//! `result`.

use std::collections::BTreeMap;
use std::path::Path;

use csv::StringRecord;

use crate::domain::errors::{RepairError, RepairResult};
use crate::domain::models::{Benchmark, Interval, Region, RegionId, SampledState, Verdict};

const REGION: &str = "region";
const RESULT: &str = "result";
const VERDICT: &str = "verdict";

fn malformed(path: &Path, reason: impl Into<String>) -> RepairError {
    RepairError::MalformedInput {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

fn open(path: &Path) -> RepairResult<(csv::Reader<std::fs::File>, StringRecord)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| malformed(path, e.to_string()))?;
    let headers = reader
        .headers()
        .map_err(|e| malformed(path, e.to_string()))?
        .clone();
    Ok((reader, headers))
}

fn column(path: &Path, headers: &StringRecord, name: &str) -> RepairResult<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| malformed(path, format!("missing column '{name}'")))
}

fn field<'a>(path: &Path, row: &'a StringRecord, idx: usize, line: usize) -> RepairResult<&'a str> {
    row.get(idx)
        .ok_or_else(|| malformed(path, format!("row {line}: missing field {idx}")))
}

fn parse_f64(path: &Path, raw: &str, line: usize) -> RepairResult<f64> {
    raw.parse()
        .map_err(|_| malformed(path, format!("row {line}: '{raw}' is not a number")))
}

fn parse_region(path: &Path, raw: &str, line: usize) -> RepairResult<RegionId> {
    // pandas writes integer columns with a trailing ".0" once a NaN has been seen
    let trimmed = raw.strip_suffix(".0").unwrap_or(raw);
    trimmed
        .parse()
        .map(RegionId)
        .map_err(|_| malformed(path, format!("row {line}: '{raw}' is not a region id")))
}

/// Read a sampling table: `region,<state columns>,result`.
pub fn read_samples(path: &Path, benchmark: Benchmark) -> RepairResult<Vec<SampledState>> {
    let (mut reader, headers) = open(path)?;
    let region_col = column(path, &headers, REGION)?;
    let result_col = column(path, &headers, RESULT)?;
    let state_cols = benchmark
        .state_columns()
        .iter()
        .map(|name| column(path, &headers, name))
        .collect::<RepairResult<Vec<_>>>()?;

    let mut samples = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let line = i + 2;
        let row = row.map_err(|e| malformed(path, e.to_string()))?;
        let region = parse_region(path, field(path, &row, region_col, line)?, line)?;
        let state = state_cols
            .iter()
            .map(|idx| parse_f64(path, field(path, &row, *idx, line)?, line))
            .collect::<RepairResult<Vec<_>>>()?;
        let robustness = parse_f64(path, field(path, &row, result_col, line)?, line)?;
        samples.push(SampledState::new(region, state, robustness));
    }
    Ok(samples)
}

/// Write a sampling table in the same layout [`read_samples`] accepts.
pub fn write_samples(
    path: &Path,
    benchmark: Benchmark,
    samples: &[SampledState],
) -> RepairResult<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| malformed(path, e.to_string()))?;
    let [c0, c1] = benchmark.state_columns();
    writer
        .write_record([REGION, c0, c1, RESULT])
        .map_err(|e| malformed(path, e.to_string()))?;

    for sample in samples {
        let mut record = vec![sample.region.to_string()];
        record.extend(sample.state.iter().map(f64::to_string));
        record.push(sample.robustness.to_string());
        writer
            .write_record(&record)
            .map_err(|e| malformed(path, e.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a verifier output table: `region,verdict`.
pub fn read_verdicts(path: &Path) -> RepairResult<BTreeMap<RegionId, Verdict>> {
    let (mut reader, headers) = open(path)?;
    let region_col = column(path, &headers, REGION)?;
    let verdict_col = column(path, &headers, VERDICT)?;

    let mut verdicts = BTreeMap::new();
    for (i, row) in reader.records().enumerate() {
        let line = i + 2;
        let row = row.map_err(|e| malformed(path, e.to_string()))?;
        let region = parse_region(path, field(path, &row, region_col, line)?, line)?;
        let raw = field(path, &row, verdict_col, line)?;
        let verdict = raw
            .parse::<Verdict>()
            .map_err(|_| malformed(path, format!("row {line}: unknown verdict '{raw}'")))?;
        verdicts.insert(region, verdict);
    }
    Ok(verdicts)
}

/// Read a partition table: `<d0>_lo,<d0>_hi,<d1>_lo,<d1>_hi`, one region per row.
///
/// The row index is the region id.
pub fn read_partition(path: &Path, benchmark: Benchmark) -> RepairResult<Vec<Region>> {
    let (mut reader, headers) = open(path)?;
    let bounds_cols = benchmark
        .state_columns()
        .iter()
        .map(|name| {
            Ok((
                column(path, &headers, &format!("{name}_lo"))?,
                column(path, &headers, &format!("{name}_hi"))?,
            ))
        })
        .collect::<RepairResult<Vec<_>>>()?;

    let mut regions = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let line = i + 2;
        let row = row.map_err(|e| malformed(path, e.to_string()))?;
        let bounds = bounds_cols
            .iter()
            .map(|(lo, hi)| {
                Ok(Interval {
                    lo: parse_f64(path, field(path, &row, *lo, line)?, line)?,
                    hi: parse_f64(path, field(path, &row, *hi, line)?, line)?,
                })
            })
            .collect::<RepairResult<Vec<_>>>()?;
        let id = u32::try_from(i).map_err(|_| malformed(path, "too many regions"))?;
        regions.push(Region {
            id: RegionId(id),
            bounds,
        });
    }
    Ok(regions)
}
