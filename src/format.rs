use std::{fmt, path::Path};

use clap::ValueEnum;

use crate::error::PipelineError;

const TWENTY_THREE_AND_ME_MARKER: &str = "generated by 23andMe";
const ANCESTRY_MARKER: &str = "==> filename.txt <===";
const VCF_MARKER: &str = "##fileformat=VCF";

/// Supported consumer export formats.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, ValueEnum)]
pub enum InputFormat {
    /// 23andMe raw data (tab separated, `#` comments)
    #[value(name = "23andme")]
    TwentyThreeAndMe,
    /// Ancestry-style export (comma separated)
    Ancestry,
    /// Variant Call Format text
    Vcf,
}

/// Positional layout of one export format.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FormatLayout {
    pub delimiter: u8,
    pub min_fields: usize,
    pub rsid: usize,
    pub chromosome: usize,
    pub position: usize,
    pub genotype: usize,
    pub comment_marker: Option<char>,
}

const TWENTY_THREE_AND_ME_LAYOUT: FormatLayout = FormatLayout {
    delimiter: b'\t',
    min_fields: 4,
    rsid: 0,
    chromosome: 1,
    position: 2,
    genotype: 3,
    comment_marker: Some('#'),
};

const ANCESTRY_LAYOUT: FormatLayout = FormatLayout {
    delimiter: b',',
    min_fields: 4,
    rsid: 0,
    chromosome: 1,
    position: 2,
    genotype: 3,
    comment_marker: None,
};

// The genotype column is the fifth VCF field (ALT), as the reference data expects.
const VCF_LAYOUT: FormatLayout = FormatLayout {
    delimiter: b'\t',
    min_fields: 5,
    rsid: 2,
    chromosome: 0,
    position: 1,
    genotype: 4,
    comment_marker: Some('#'),
};

impl InputFormat {
    pub const fn layout(self) -> &'static FormatLayout {
        match self {
            Self::TwentyThreeAndMe => &TWENTY_THREE_AND_ME_LAYOUT,
            Self::Ancestry => &ANCESTRY_LAYOUT,
            Self::Vcf => &VCF_LAYOUT,
        }
    }

    pub const fn delimiter(self) -> u8 {
        self.layout().delimiter
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::TwentyThreeAndMe => "23andme",
            Self::Ancestry => "ancestry",
            Self::Vcf => "vcf",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify an export from its first line.
pub fn detect(first_line: &str) -> Result<InputFormat, PipelineError> {
    if first_line.contains(TWENTY_THREE_AND_ME_MARKER) {
        tracing::debug!("detected 23andMe data");
        Ok(InputFormat::TwentyThreeAndMe)
    } else if first_line.contains(ANCESTRY_MARKER) {
        tracing::debug!("detected Ancestry data");
        Ok(InputFormat::Ancestry)
    } else if first_line.starts_with(VCF_MARKER) {
        tracing::debug!("detected VCF header");
        Ok(InputFormat::Vcf)
    } else {
        Err(PipelineError::UnknownFormat)
    }
}

/// Sniff the header, falling back to the file name for VCF inputs.
pub fn detect_with_name(first_line: &str, name: &str) -> Result<InputFormat, PipelineError> {
    match detect(first_line) {
        Err(PipelineError::UnknownFormat) if has_vcf_extension(name) => {
            tracing::debug!(name, "no header marker, using .vcf extension");
            Ok(InputFormat::Vcf)
        }
        other => other,
    }
}

/// True for `.vcf` and `.vcf.gz` names, ignoring case.
pub fn has_vcf_extension(name: &str) -> bool {
    let file_name = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    file_name.ends_with(".vcf") || file_name.ends_with(".vcf.gz")
}
