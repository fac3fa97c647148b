use std::fmt;

use serde::Serialize;

use crate::{
    chunk::{FieldValue, RawRow},
    format::{FormatLayout, InputFormat},
};

/// Format-independent view of one genotype row.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CanonicalVariant {
    pub rsid: String,
    pub chromosome: String,
    pub position: String,
    pub genotype: String,
}

impl fmt::Display for CanonicalVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.rsid, self.chromosome, self.position, self.genotype
        )
    }
}

/// Map a row to a [`CanonicalVariant`], or `None` when the row is skipped.
///
/// Rows are skipped when they have fewer fields than the format needs, or when
/// the format uses comment lines and the first field is text starting with the
/// comment marker. Never fails.
pub fn extract(format: InputFormat, row: &RawRow) -> Option<CanonicalVariant> {
    extract_with_layout(format.layout(), row)
}

pub fn extract_with_layout(layout: &FormatLayout, row: &RawRow) -> Option<CanonicalVariant> {
    if row.len() < layout.min_fields {
        return None;
    }
    if let Some(marker) = layout.comment_marker
        && is_comment(row, marker)
    {
        return None;
    }

    let text = |index: usize| row.get(index).map(|f| f.as_str().to_string());
    Some(CanonicalVariant {
        rsid: text(layout.rsid)?,
        chromosome: text(layout.chromosome)?,
        position: text(layout.position)?,
        genotype: text(layout.genotype)?,
    })
}

fn is_comment(row: &RawRow, marker: char) -> bool {
    match row.get(0).map(|f| f.value()) {
        Some(FieldValue::Text(text)) => text.starts_with(marker),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(line: &str, delimiter: u8) -> RawRow {
        RawRow::parse(line, delimiter).unwrap()
    }

    #[test]
    fn twenty_three_and_me_row() {
        let variant = extract(InputFormat::TwentyThreeAndMe, &row("rs123\tchr1\t100\tAA", b'\t'))
            .expect("extracted");
        assert_eq!(
            variant,
            CanonicalVariant {
                rsid: "rs123".into(),
                chromosome: "chr1".into(),
                position: "100".into(),
                genotype: "AA".into(),
            }
        );
        assert_eq!(variant.to_string(), "rs123\tchr1\t100\tAA");
    }

    #[test]
    fn ancestry_row_has_no_comment_convention() {
        let variant = extract(InputFormat::Ancestry, &row("#rs9,1,5,GG", b',')).unwrap();
        assert_eq!(variant.rsid, "#rs9");
        assert!(extract(InputFormat::Ancestry, &row("rs9,1,5", b',')).is_none());
    }

    #[test]
    fn vcf_row_uses_id_column() {
        let variant =
            extract(InputFormat::Vcf, &row("1\t752566\trs3094315\tG\tA\t.\tPASS", b'\t')).unwrap();
        assert_eq!(variant.rsid, "rs3094315");
        assert_eq!(variant.chromosome, "1");
        assert_eq!(variant.position, "752566");
        assert_eq!(variant.genotype, "A");
    }

    #[test]
    fn vcf_comment_row_is_skipped() {
        assert!(extract(InputFormat::Vcf, &row("#comment\tx\tx\tx\tx", b'\t')).is_none());
        assert!(extract(InputFormat::Vcf, &row("##fileformat=VCFv4.2", b'\t')).is_none());
    }

    #[test]
    fn short_rows_are_skipped() {
        assert!(extract(InputFormat::Vcf, &row("1\t2\trs1\tA", b'\t')).is_none());
        assert!(extract(InputFormat::TwentyThreeAndMe, &row("rs1\t1\t2", b'\t')).is_none());
        assert!(extract(InputFormat::TwentyThreeAndMe, &RawRow::default()).is_none());
    }

    #[test]
    fn extraction_keeps_exact_text() {
        let variant =
            extract(InputFormat::TwentyThreeAndMe, &row("123\t01\t0100\t--", b'\t')).unwrap();
        assert_eq!(variant.rsid, "123");
        assert_eq!(variant.chromosome, "01");
        assert_eq!(variant.position, "0100");
    }
}
