//! Load population snapshots from CSV exports
//!
//! Fixed columns are `id,captured_at,cadence,scope,is_test,total`; every
//! additional column named `type:<label>` contributes to the type breakdown.

use super::{Snapshot, SnapshotCadence, SnapshotScope};
use chrono::{NaiveDate, NaiveDateTime};
use csv::{Reader, StringRecord};
use std::collections::BTreeMap;
use std::error::Error;
use std::path::Path;

const TYPE_COLUMN_PREFIX: &str = "type:";

/// Column positions resolved from the header row
struct Columns {
    id: usize,
    captured_at: usize,
    cadence: usize,
    scope: usize,
    is_test: Option<usize>,
    total: usize,
    types: Vec<(usize, String)>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self, Box<dyn Error>> {
        let find = |name: &str| -> Result<usize, Box<dyn Error>> {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| format!("Missing snapshot column: {}", name).into())
        };

        let types = headers
            .iter()
            .enumerate()
            .filter_map(|(idx, h)| {
                h.trim()
                    .strip_prefix(TYPE_COLUMN_PREFIX)
                    .map(|label| (idx, label.trim().to_string()))
            })
            .collect();

        Ok(Self {
            id: find("id")?,
            captured_at: find("captured_at")?,
            cadence: find("cadence")?,
            scope: find("scope")?,
            is_test: headers.iter().position(|h| h.trim() == "is_test"),
            total: find("total")?,
            types,
        })
    }
}

fn parse_captured_at(raw: &str) -> Result<NaiveDateTime, Box<dyn Error>> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(parsed);
        }
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("Unparseable captured_at: {}", raw))?;
    Ok(date.and_hms_opt(0, 0, 0).ok_or("Invalid midnight")?)
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y")
}

fn to_snapshot(record: &StringRecord, columns: &Columns) -> Result<Snapshot, Box<dyn Error>> {
    let field = |idx: usize| record.get(idx).unwrap_or("").trim();

    let scope: SnapshotScope = field(columns.scope).parse()?;
    let by_type = if scope == SnapshotScope::ByType {
        let mut counts = BTreeMap::new();
        for (idx, label) in &columns.types {
            let raw = field(*idx);
            if raw.is_empty() {
                continue;
            }
            counts.insert(label.clone(), raw.parse::<u64>()?);
        }
        Some(counts)
    } else {
        None
    };

    Ok(Snapshot {
        id: field(columns.id).parse()?,
        captured_at: parse_captured_at(field(columns.captured_at))?,
        cadence: field(columns.cadence).parse::<SnapshotCadence>()?,
        scope,
        is_test: columns.is_test.map(|idx| parse_flag(field(idx))).unwrap_or(false),
        total: field(columns.total).parse()?,
        by_type,
    })
}

/// Load snapshots from any reader
pub fn load_snapshots_from_reader<R: std::io::Read>(reader: R) -> Result<Vec<Snapshot>, Box<dyn Error>> {
    let mut csv_reader = Reader::from_reader(reader);
    let columns = Columns::from_headers(csv_reader.headers()?)?;
    let mut snapshots = Vec::new();

    for result in csv_reader.records() {
        let record = result?;
        snapshots.push(to_snapshot(&record, &columns)?);
    }

    Ok(snapshots)
}

/// Load all snapshots from a CSV file
pub fn load_snapshots<P: AsRef<Path>>(path: P) -> Result<Vec<Snapshot>, Box<dyn Error>> {
    let file = std::fs::File::open(path)?;
    load_snapshots_from_reader(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_snapshots_with_type_columns() {
        let csv = "\
id,captured_at,cadence,scope,is_test,total,type:Individual,type:Family
1,2024-01-31,monthly,totals,0,120,,
2,2024-02-29 23:00:00,monthly,by_type,0,131,90,40
3,2024-02-29T23:30:00,manual,by_type,true,999,1,1
";
        let snapshots = load_snapshots_from_reader(csv.as_bytes()).expect("Failed to load snapshots");
        assert_eq!(snapshots.len(), 3);

        assert_eq!(snapshots[0].scope, SnapshotScope::Totals);
        assert!(snapshots[0].by_type.is_none());

        let types = snapshots[1].by_type.as_ref().unwrap();
        assert_eq!(types["Individual"], 90);
        assert_eq!(types["Family"], 40);
        assert_eq!(snapshots[1].total, 131);

        assert!(snapshots[2].is_test);
        assert_eq!(snapshots[2].cadence, SnapshotCadence::Manual);
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let csv = "id,captured_at,scope,total\n1,2024-01-31,totals,5\n";
        assert!(load_snapshots_from_reader(csv.as_bytes()).is_err());
    }
}
