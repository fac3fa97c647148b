use serde::Serialize;

use crate::matcher::{MatchedRecord, ResultSet};

/// Records sharing one phenotype, in sorted-pass order.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PhenotypeGroup {
    pub phenotype: String,
    pub records: Vec<MatchedRecord>,
}

/// Phenotype groups in lexicographic phenotype order.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PhenotypeGroups {
    groups: Vec<PhenotypeGroup>,
}

impl PhenotypeGroups {
    pub fn iter(&self) -> std::slice::Iter<'_, PhenotypeGroup> {
        self.groups.iter()
    }

    pub fn get(&self, phenotype: &str) -> Option<&[MatchedRecord]> {
        self.groups
            .binary_search_by(|g| g.phenotype.as_str().cmp(phenotype))
            .ok()
            .map(|idx| self.groups[idx].records.as_slice())
    }

    pub fn phenotypes(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.phenotype.as_str())
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.groups.iter().map(|g| g.records.len()).sum()
    }
}

impl<'a> IntoIterator for &'a PhenotypeGroups {
    type Item = &'a PhenotypeGroup;
    type IntoIter = std::slice::Iter<'a, PhenotypeGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

/// Stable-sort by phenotype and partition into groups.
pub fn group_by_phenotype(results: ResultSet) -> PhenotypeGroups {
    let (records, _) = results.into_parts();
    group_records(records)
}

pub fn group_records(mut records: Vec<MatchedRecord>) -> PhenotypeGroups {
    records.sort_by(|a, b| a.phenotype.cmp(&b.phenotype));

    let mut groups: Vec<PhenotypeGroup> = Vec::new();
    for record in records {
        match groups.last_mut() {
            Some(group) if group.phenotype == record.phenotype => group.records.push(record),
            _ => groups.push(PhenotypeGroup {
                phenotype: record.phenotype.clone(),
                records: vec![record],
            }),
        }
    }
    PhenotypeGroups { groups }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(rsid: &str, phenotype: &str) -> MatchedRecord {
        MatchedRecord {
            rsid: rsid.into(),
            chromosome: "1".into(),
            position: "1".into(),
            genotype: "AA".into(),
            phenotype: phenotype.into(),
            broken_genotype: String::new(),
            gene: String::new(),
        }
    }

    #[test]
    fn groups_sorted_and_ties_keep_discovery_order() {
        let groups = group_records(vec![
            record("rs1", "Migraine"),
            record("rs2", "Anxiety"),
            record("rs3", "Migraine"),
            record("rs4", "Anxiety"),
            record("rs5", "Cholesterol"),
        ]);
        let names: Vec<_> = groups.phenotypes().collect();
        assert_eq!(names, ["Anxiety", "Cholesterol", "Migraine"]);

        let anxiety: Vec<_> = groups
            .get("Anxiety")
            .unwrap()
            .iter()
            .map(|r| r.rsid.as_str())
            .collect();
        assert_eq!(anxiety, ["rs2", "rs4"]);
        let migraine: Vec<_> = groups
            .get("Migraine")
            .unwrap()
            .iter()
            .map(|r| r.rsid.as_str())
            .collect();
        assert_eq!(migraine, ["rs1", "rs3"]);
        assert_eq!(groups.record_count(), 5);
        assert!(groups.get("Unknown").is_none());
    }

    #[test]
    fn comparison_is_bytewise() {
        let groups = group_records(vec![
            record("rs1", "b"),
            record("rs2", "B"),
            record("rs3", "a"),
        ]);
        let names: Vec<_> = groups.phenotypes().collect();
        assert_eq!(names, ["B", "a", "b"]);
    }

    #[test]
    fn empty_results_have_no_groups() {
        let groups = group_by_phenotype(ResultSet::new());
        assert!(groups.is_empty());
        assert_eq!(groups.record_count(), 0);
    }

    #[test]
    fn serializes_as_list_of_groups() {
        let groups = group_records(vec![record("rs1", "P1")]);
        let json = serde_json::to_value(&groups).unwrap();
        assert_eq!(json[0]["phenotype"], "P1");
        assert_eq!(json[0]["records"][0]["broken_geno"], "");
    }
}
