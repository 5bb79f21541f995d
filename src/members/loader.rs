//! Load membership records and milestones from CSV exports

use super::{MemberRecord, Milestone};
use chrono::NaiveDate;
use csv::Reader;
use std::collections::HashMap;
use std::error::Error;
use std::path::Path;

/// Raw CSV row matching members.csv columns
#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    id: u64,
    join_date: NaiveDate,
    end_date: Option<NaiveDate>,
    end_reason: Option<String>,
    membership_type: Option<String>,
    /// `dimension=value` pairs separated by `;`
    tags: Option<String>,
}

impl CsvRow {
    fn to_member(self) -> Result<MemberRecord, Box<dyn Error>> {
        let membership_type = self
            .membership_type
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Unknown".to_string());

        let mut member = MemberRecord::new(self.id, self.join_date, membership_type);

        for pair in self.tags.as_deref().unwrap_or("").split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (dimension, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("Malformed tag \"{}\" on member {}", pair, self.id))?;
            member = member.with_tag(dimension.trim(), value.trim());
        }

        if let Some(end_date) = self.end_date {
            member.end(end_date, self.end_reason)?;
        }

        Ok(member)
    }
}

/// Raw CSV row matching milestones.csv columns
#[derive(Debug, serde::Deserialize)]
struct MilestoneRow {
    member_id: u64,
    kind: String,
    achieved_on: NaiveDate,
}

/// Load all members from a CSV file
pub fn load_members<P: AsRef<Path>>(path: P) -> Result<Vec<MemberRecord>, Box<dyn Error>> {
    let mut reader = Reader::from_path(path)?;
    let mut members = Vec::new();

    for result in reader.deserialize() {
        let row: CsvRow = result?;
        members.push(row.to_member()?);
    }

    Ok(members)
}

/// Load members from any reader (e.g., string buffer, network stream)
pub fn load_members_from_reader<R: std::io::Read>(reader: R) -> Result<Vec<MemberRecord>, Box<dyn Error>> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut members = Vec::new();

    for result in csv_reader.deserialize() {
        let row: CsvRow = result?;
        members.push(row.to_member()?);
    }

    Ok(members)
}

/// Load milestones keyed by member id
pub fn load_milestones_from_reader<R: std::io::Read>(
    reader: R,
) -> Result<HashMap<u64, Vec<Milestone>>, Box<dyn Error>> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut milestones: HashMap<u64, Vec<Milestone>> = HashMap::new();

    for result in csv_reader.deserialize() {
        let row: MilestoneRow = result?;
        milestones.entry(row.member_id).or_default().push(Milestone {
            kind: row.kind.trim().to_string(),
            achieved_on: row.achieved_on,
        });
    }

    Ok(milestones)
}

/// Load milestones from a CSV file and attach them to their members
///
/// Milestones for unknown member ids are dropped.
pub fn attach_milestones<P: AsRef<Path>>(members: &mut [MemberRecord], path: P) -> Result<usize, Box<dyn Error>> {
    let file = std::fs::File::open(path)?;
    let mut by_member = load_milestones_from_reader(file)?;
    let mut attached = 0;

    for member in members.iter_mut() {
        if let Some(milestones) = by_member.remove(&member.id) {
            attached += milestones.len();
            member.milestones.extend(milestones);
        }
    }

    if !by_member.is_empty() {
        log::warn!("{} members in the milestone export have no membership record", by_member.len());
    }

    Ok(attached)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMBERS_CSV: &str = "\
id,join_date,end_date,end_reason,membership_type,tags
1,2023-03-04,,,Individual,gender=female;ethnicity=asian
2,2023-03-18,2023-06-02,moved,Family,
3,2024-01-09,,,,gender=male
";

    #[test]
    fn test_load_members_from_reader() {
        let members = load_members_from_reader(MEMBERS_CSV.as_bytes()).expect("Failed to load members");
        assert_eq!(members.len(), 3);

        assert_eq!(members[0].dimension_value("ethnicity"), Some("asian"));
        assert_eq!(members[0].end_date(), None);

        assert_eq!(members[1].end_date(), NaiveDate::from_ymd_opt(2023, 6, 2));
        assert_eq!(members[1].end_reason_label(), "moved");

        assert_eq!(members[2].membership_type, "Unknown");
    }

    #[test]
    fn test_end_before_join_fails_load() {
        let csv = "id,join_date,end_date,end_reason,membership_type,tags\n1,2023-03-04,2023-01-01,,Individual,\n";
        assert!(load_members_from_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_malformed_tag_fails_load() {
        let csv = "id,join_date,end_date,end_reason,membership_type,tags\n1,2023-03-04,,,Individual,gender\n";
        assert!(load_members_from_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_load_milestones_groups_by_member() {
        let csv = "member_id,kind,achieved_on\n1,orientation,2023-03-05\n1,first_badge,2023-03-20\n2,orientation,2023-04-01\n";
        let milestones = load_milestones_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(milestones[&1].len(), 2);
        assert_eq!(milestones[&2][0].kind, "orientation");
    }
}
