use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Settings understood by the `edentity` command line. Declaration order is
/// the order the flags appear on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineParam {
    RawDataDir,
    DataType,
    WorkDir,
    ForwardPrimer,
    ReversePrimer,
    MakeJsonReports,
    DiscardUntrimmed,
    Anchoring,
    NBaseLimit,
    AverageQual,
    LengthRequired,
    MaxDiffPct,
    MinOverlap,
    MaxDiffs,
    MinLength,
    MaxLength,
    MaxExpectedErrors,
    FastaWidth,
    Alpha,
    MinSize,
}

impl PipelineParam {
    pub const ALL: [PipelineParam; 20] = [
        PipelineParam::RawDataDir,
        PipelineParam::DataType,
        PipelineParam::WorkDir,
        PipelineParam::ForwardPrimer,
        PipelineParam::ReversePrimer,
        PipelineParam::MakeJsonReports,
        PipelineParam::DiscardUntrimmed,
        PipelineParam::Anchoring,
        PipelineParam::NBaseLimit,
        PipelineParam::AverageQual,
        PipelineParam::LengthRequired,
        PipelineParam::MaxDiffPct,
        PipelineParam::MinOverlap,
        PipelineParam::MaxDiffs,
        PipelineParam::MinLength,
        PipelineParam::MaxLength,
        PipelineParam::MaxExpectedErrors,
        PipelineParam::FastaWidth,
        PipelineParam::Alpha,
        PipelineParam::MinSize,
    ];

    pub fn flag(self) -> &'static str {
        match self {
            PipelineParam::RawDataDir => "--raw_data_dir",
            PipelineParam::DataType => "--dataType",
            PipelineParam::WorkDir => "--work_dir",
            PipelineParam::ForwardPrimer => "--forward_primer",
            PipelineParam::ReversePrimer => "--reverse_primer",
            PipelineParam::MakeJsonReports => "--make_json_reports",
            PipelineParam::DiscardUntrimmed => "--discard_untrimmed",
            PipelineParam::Anchoring => "--anchoring",
            PipelineParam::NBaseLimit => "--n_base_limit",
            PipelineParam::AverageQual => "--average_qual",
            PipelineParam::LengthRequired => "--length_required",
            PipelineParam::MaxDiffPct => "--maxdiffpct",
            PipelineParam::MinOverlap => "--minovlen",
            PipelineParam::MaxDiffs => "--maxdiffs",
            PipelineParam::MinLength => "--min_length",
            PipelineParam::MaxLength => "--max_length",
            PipelineParam::MaxExpectedErrors => "--maxEE",
            PipelineParam::FastaWidth => "--fasta_width",
            PipelineParam::Alpha => "--alpha",
            PipelineParam::MinSize => "--minsize",
        }
    }

    /// Switches take no value and are emitted only when truthy.
    pub fn is_switch(self) -> bool {
        matches!(
            self,
            PipelineParam::MakeJsonReports | PipelineParam::DiscardUntrimmed | PipelineParam::Anchoring
        )
    }
}

impl fmt::Display for PipelineParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag().trim_start_matches("--"))
    }
}

/// `"true"` and `"1"` in any case are truthy; everything else is not,
/// including padded values such as `" true"`.
pub fn is_truthy(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

/// Values for one pipeline run, keyed by setting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineJobSpec {
    values: BTreeMap<PipelineParam, String>,
}

impl PipelineJobSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<V: ToString>(mut self, param: PipelineParam, value: V) -> Self {
        self.set(param, value);
        self
    }

    pub fn set<V: ToString>(&mut self, param: PipelineParam, value: V) {
        self.values.insert(param, value.to_string());
    }

    pub fn get(&self, param: PipelineParam) -> Option<&str> {
        self.values.get(&param).map(String::as_str)
    }

    /// Command-line tokens in contract order. Absent settings and falsy
    /// switches contribute nothing.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.values.len() * 2);

        for param in PipelineParam::ALL {
            let Some(value) = self.values.get(&param) else {
                continue;
            };

            if param.is_switch() {
                if is_truthy(value) {
                    args.push(param.flag().to_string());
                }
            } else {
                args.push(param.flag().to_string());
                args.push(value.clone());
            }
        }

        args
    }
}
