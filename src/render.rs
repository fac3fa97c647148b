use std::{
    fmt::Write as _,
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::{grouping::PhenotypeGroups, matcher::MatchedRecord};

const SNPEDIA_BASE: &str = "https://www.snpedia.com/index.php/";

/// Columns shown per phenotype table, with their display headings.
const COLUMNS: [(&str, &str); 6] = [
    ("rsid", "RSID"),
    ("genotype", "Genotype"),
    ("broken_geno", "Broken"),
    ("chromosome", "Chromosome"),
    ("position", "Position"),
    ("gene", "Gene"),
];

#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// One HTML table per phenotype
    Html,
    /// Tab-separated values with a phenotype column
    Tsv,
    /// JSON array of phenotype groups
    Json,
}

fn column<'a>(record: &'a MatchedRecord, key: &str) -> &'a str {
    match key {
        "rsid" => &record.rsid,
        "genotype" => &record.genotype,
        "broken_geno" => &record.broken_genotype,
        "chromosome" => &record.chromosome,
        "position" => &record.position,
        "gene" => &record.gene,
        _ => "",
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

fn snpedia_link(escaped_rsid: &str) -> String {
    format!("<a href=\"{SNPEDIA_BASE}{escaped_rsid}\">{escaped_rsid}</a>")
}

pub fn render_html(groups: &PhenotypeGroups) -> String {
    let mut html = String::new();
    for group in groups {
        let _ = writeln!(html, "<h3>{}</h3>", escape_html(&group.phenotype));
        html.push_str("<table style=\"width: 100%\" border=\"1\">\n<tr>");
        for (_, heading) in COLUMNS {
            let _ = write!(html, "<th>{heading}</th>");
        }
        html.push_str("</tr>\n");
        for record in &group.records {
            html.push_str("<tr>");
            for (key, _) in COLUMNS {
                let content = escape_html(column(record, key));
                let cell = if key == "rsid" {
                    snpedia_link(&content)
                } else {
                    content
                };
                let _ = write!(html, "<td>{cell}</td>");
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</table>\n");
    }
    html
}

pub fn render_tsv(groups: &PhenotypeGroups) -> String {
    let mut tsv = String::from("phenotype");
    for (key, _) in COLUMNS {
        tsv.push('\t');
        tsv.push_str(key);
    }
    tsv.push('\n');
    for group in groups {
        for record in &group.records {
            tsv.push_str(&group.phenotype);
            for (key, _) in COLUMNS {
                tsv.push('\t');
                tsv.push_str(column(record, key));
            }
            tsv.push('\n');
        }
    }
    tsv
}

pub fn render_json(groups: &PhenotypeGroups) -> serde_json::Result<String> {
    serde_json::to_string_pretty(groups)
}

pub fn render(groups: &PhenotypeGroups, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Html => render_html(groups),
        OutputFormat::Tsv => render_tsv(groups),
        OutputFormat::Json => render_json(groups).context("failed to serialize groups")?,
    })
}

/// Render to `path`, or to stdout when `path` is `None`.
pub fn write_groups(
    path: Option<&Path>,
    format: OutputFormat,
    groups: &PhenotypeGroups,
) -> Result<()> {
    let rendered = render(groups, format)?;
    match path {
        Some(path) => {
            let mut writer = File::create(path)
                .map(BufWriter::new)
                .with_context(|| format!("failed to create output {}", path.display()))?;
            writer
                .write_all(rendered.as_bytes())
                .and_then(|_| writer.flush())
                .with_context(|| format!("failed to write output {}", path.display()))?;
            tracing::info!(output = %path.display(), groups = groups.len(), "wrote results");
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            lock.write_all(rendered.as_bytes())
                .context("failed to write results to stdout")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::group_records;

    fn sample() -> PhenotypeGroups {
        group_records(vec![
            MatchedRecord {
                rsid: "rs1".into(),
                chromosome: "1".into(),
                position: "10".into(),
                genotype: "AG".into(),
                phenotype: "Sleep <quality>".into(),
                broken_genotype: "G".into(),
                gene: "PER3".into(),
            },
            MatchedRecord {
                rsid: "rs2".into(),
                chromosome: "2".into(),
                position: "20".into(),
                genotype: "TT".into(),
                phenotype: "Caffeine".into(),
                broken_genotype: String::new(),
                gene: "CYP1A2".into(),
            },
        ])
    }

    #[test]
    fn escapes_all_special_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#039;s&lt;/a&gt;"
        );
    }

    #[test]
    fn html_has_table_per_phenotype_with_links() {
        let html = render_html(&sample());
        assert_eq!(html.matches("<table").count(), 2);
        assert!(html.find("<h3>Caffeine</h3>").unwrap() < html.find("<h3>Sleep").unwrap());
        assert!(html.contains("<h3>Sleep &lt;quality&gt;</h3>"));
        assert!(html.contains("<a href=\"https://www.snpedia.com/index.php/rs1\">rs1</a>"));
        assert!(html.contains(
            "<th>RSID</th><th>Genotype</th><th>Broken</th><th>Chromosome</th><th>Position</th><th>Gene</th>"
        ));
    }

    #[test]
    fn tsv_lists_every_record() {
        let tsv = render_tsv(&sample());
        let lines: Vec<_> = tsv.lines().collect();
        assert_eq!(lines[0], "phenotype\trsid\tgenotype\tbroken_geno\tchromosome\tposition\tgene");
        assert_eq!(lines[1], "Caffeine\trs2\tTT\t\t2\t20\tCYP1A2");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn writes_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_groups(Some(&path), OutputFormat::Json, &sample()).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
        assert_eq!(value[1]["records"][0]["gene"], "PER3");
    }
}
