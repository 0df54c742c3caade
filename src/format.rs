//! File formats understood by the indexer

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, IndexError};

/// A sequence file format
///
/// Formats are usually named by string (as in `"fastq"` or `"gb"`); [`Format::from_str`]
/// accepts every historical name and alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Binary Standard Flowgram Format, untrimmed reads
    Sff,
    /// Binary Standard Flowgram Format, reads trimmed to the quality clip window
    SffTrim,
    Fasta,
    /// FASTA-like files of space separated PHRED scores
    Qual,
    /// ACE assembly contigs (`CO ` records)
    Ace,
    /// PHRED output (`BEGIN_SEQUENCE` records)
    Phd,
    /// NBRF/PIR (`>P1;` style records)
    Pir,
    GenBank,
    Embl,
    Imgt,
    /// UniProt/SwissProt flat files
    Swiss,
    /// IntelliGenetics (`;` comment blocks)
    Ig,
    /// Tab separated identifier and sequence, one record per line
    Tab,
    /// FASTQ in any quality encoding
    Fastq,
}
impl Format {
    /// Canonical name of the format
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sff => "sff",
            Self::SffTrim => "sff-trim",
            Self::Fasta => "fasta",
            Self::Qual => "qual",
            Self::Ace => "ace",
            Self::Phd => "phd",
            Self::Pir => "pir",
            Self::GenBank => "genbank",
            Self::Embl => "embl",
            Self::Imgt => "imgt",
            Self::Swiss => "swiss",
            Self::Ig => "ig",
            Self::Tab => "tab",
            Self::Fastq => "fastq",
        }
    }

    /// Whether the format is the binary SFF format
    #[must_use]
    pub fn is_sff(self) -> bool {
        matches!(self, Self::Sff | Self::SffTrim)
    }
}
impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.to_ascii_lowercase().as_str() {
            "sff" => Self::Sff,
            "sff-trim" => Self::SffTrim,
            "fasta" => Self::Fasta,
            "qual" => Self::Qual,
            "ace" => Self::Ace,
            "phd" => Self::Phd,
            "pir" => Self::Pir,
            "genbank" | "gb" => Self::GenBank,
            "embl" => Self::Embl,
            "imgt" => Self::Imgt,
            "swiss" => Self::Swiss,
            "ig" => Self::Ig,
            "tab" => Self::Tab,
            "fastq" | "fastq-sanger" | "fastq-solexa" | "fastq-illumina" => Self::Fastq,
            _ => return Err(IndexError::UnsupportedFormat(s.to_string()).into()),
        };
        Ok(format)
    }
}
impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
