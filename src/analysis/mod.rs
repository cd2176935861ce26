//! Byte-level structure inference over labelled command samples.
//!
//! Offsets that never change across samples of one label are reported as
//! fixed (likely framing or opcode), the rest as variable (likely
//! parameters). This is a discovery aid: the classes say what the samples
//! show, nothing more.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub mod correlate;

pub use correlate::{ActionMark, correlate, load_marks};

/// Label -> samples in the order they were added. Append-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSampleSet {
    samples: BTreeMap<String, Vec<Vec<u8>>>,
}

impl CommandSampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sample(&mut self, label: &str, data: impl Into<Vec<u8>>) {
        self.samples
            .entry(label.to_string())
            .or_default()
            .push(data.into());
    }

    pub fn add_hex_sample(&mut self, label: &str, hex_data: &str) -> Result<(), hex::FromHexError> {
        let data = hex::decode(hex_data.trim())?;
        self.add_sample(label, data);
        Ok(())
    }

    pub fn samples(&self, label: &str) -> &[Vec<u8>] {
        self.samples.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ByteClass {
    Fixed(u8),
    Variable(BTreeSet<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteClassification {
    pub offset: usize,
    pub class: ByteClass,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Structure {
    /// Two or more samples: one entry per offset below the shortest length.
    Classified(Vec<ByteClassification>),
    /// A single sample is not evidence of anything; shown raw.
    Insufficient(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStructure {
    pub label: String,
    pub samples: usize,
    pub structure: Structure,
}

impl CommandStructure {
    pub fn fixed(&self) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.classified().iter().filter_map(|c| match c.class {
            ByteClass::Fixed(v) => Some((c.offset, v)),
            ByteClass::Variable(_) => None,
        })
    }

    pub fn variable(&self) -> impl Iterator<Item = (usize, &BTreeSet<u8>)> + '_ {
        self.classified().iter().filter_map(|c| match &c.class {
            ByteClass::Variable(vs) => Some((c.offset, vs)),
            ByteClass::Fixed(_) => None,
        })
    }

    fn classified(&self) -> &[ByteClassification] {
        match &self.structure {
            Structure::Classified(c) => c,
            Structure::Insufficient(_) => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisReport {
    pub commands: Vec<CommandStructure>,
}

impl AnalysisReport {
    pub fn get(&self, label: &str) -> Option<&CommandStructure> {
        self.commands.iter().find(|c| c.label == label)
    }
}

/// Classify every offset of every label. Pure; computes from scratch.
pub fn analyze(set: &CommandSampleSet) -> AnalysisReport {
    let commands = set
        .samples
        .iter()
        .filter(|(_, samples)| !samples.is_empty())
        .map(|(label, samples)| CommandStructure {
            label: label.clone(),
            samples: samples.len(),
            structure: classify(samples),
        })
        .collect();
    AnalysisReport { commands }
}

fn classify(samples: &[Vec<u8>]) -> Structure {
    if let [only] = samples {
        return Structure::Insufficient(only.clone());
    }
    // Bytes past the shortest sample are left out on purpose.
    let min_len = samples.iter().map(Vec::len).min().unwrap_or(0);
    let offsets = (0..min_len)
        .map(|offset| {
            let seen: BTreeSet<u8> = samples.iter().map(|s| s[offset]).collect();
            let class = match (seen.len(), seen.first().copied()) {
                (1, Some(v)) => ByteClass::Fixed(v),
                _ => ByteClass::Variable(seen),
            };
            ByteClassification { offset, class }
        })
        .collect();
    Structure::Classified(offsets)
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.commands.is_empty() {
            return writeln!(f, "no labelled samples");
        }
        for cmd in &self.commands {
            writeln!(f, "{} ({} samples)", cmd.label.to_uppercase(), cmd.samples)?;
            match &cmd.structure {
                Structure::Insufficient(data) => {
                    writeln!(f, "  data: {}", hex::encode(data))?;
                }
                Structure::Classified(_) => {
                    let fixed: Vec<String> = cmd
                        .fixed()
                        .map(|(o, v)| format!("{o}={v:02x}"))
                        .collect();
                    let variable: Vec<String> = cmd
                        .variable()
                        .map(|(o, vs)| {
                            let vals: Vec<String> = vs.iter().map(|v| format!("{v:02x}")).collect();
                            format!("{o}={{{}}}", vals.join(","))
                        })
                        .collect();
                    writeln!(f, "  fixed:    {}", fixed.join(" "))?;
                    writeln!(f, "  variable: {}", variable.join(" "))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_header_variable_tail() {
        let mut set = CommandSampleSet::new();
        for s in ["AABBCC", "AABBDD", "AABBEE"] {
            set.add_hex_sample("takeoff", s).unwrap();
        }
        let report = analyze(&set);
        let cmd = report.get("takeoff").unwrap();
        assert_eq!(cmd.samples, 3);
        assert_eq!(
            cmd.structure,
            Structure::Classified(vec![
                ByteClassification {
                    offset: 0,
                    class: ByteClass::Fixed(0xAA)
                },
                ByteClassification {
                    offset: 1,
                    class: ByteClass::Fixed(0xBB)
                },
                ByteClassification {
                    offset: 2,
                    class: ByteClass::Variable([0xCC, 0xDD, 0xEE].into_iter().collect())
                },
            ])
        );
    }

    #[test]
    fn unequal_lengths_truncate_to_shortest() {
        let mut set = CommandSampleSet::new();
        set.add_sample("move_forward", vec![0x66, 0x80, 0x01, 0x99, 0x42]);
        set.add_sample("move_forward", vec![0x66, 0x81]);
        set.add_sample("move_forward", vec![0x66, 0x80, 0x07]);
        let report = analyze(&set);
        let cmd = report.get("move_forward").unwrap();
        let Structure::Classified(offsets) = &cmd.structure else {
            panic!("expected classification");
        };
        assert_eq!(offsets.len(), 2);
        assert!(offsets.iter().all(|c| c.offset < 2));
        assert_eq!(cmd.fixed().collect::<Vec<_>>(), vec![(0usize, 0x66u8)]);
        assert_eq!(cmd.variable().count(), 1);
    }

    #[test]
    fn single_sample_is_reported_raw() {
        let mut set = CommandSampleSet::new();
        set.add_sample("land", vec![1, 2, 3]);
        let report = analyze(&set);
        assert_eq!(
            report.get("land").unwrap().structure,
            Structure::Insufficient(vec![1, 2, 3])
        );
        assert!(report.to_string().contains("data: 010203"));
    }

    #[test]
    fn analysis_has_no_memory() {
        let mut set = CommandSampleSet::new();
        set.add_sample("x", vec![1]);
        set.add_sample("x", vec![1]);
        let first = analyze(&set);
        set.add_sample("x", vec![2]);
        let second = analyze(&set);
        assert_eq!(first.get("x").unwrap().fixed().count(), 1);
        assert_eq!(second.get("x").unwrap().variable().count(), 1);
        assert_eq!(analyze(&set), second);
    }

    #[test]
    fn bad_hex_is_rejected() {
        let mut set = CommandSampleSet::new();
        assert!(set.add_hex_sample("x", "abc").is_err());
        assert!(set.is_empty());
    }
}
