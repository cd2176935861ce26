use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::capture::packet::CapturedPacket;

pub const DEFAULT_TOP_PREFIXES: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    pub packets: usize,
    /// packet size in bytes -> count
    pub sizes: BTreeMap<usize, u64>,
    /// source address -> count
    pub sources: BTreeMap<String, u64>,
    /// most frequent first-4-byte prefixes, most common first
    pub top_prefixes: Vec<(String, u64)>,
}

impl CaptureSummary {
    pub fn new(packets: &[CapturedPacket], top: usize) -> Self {
        let mut sizes = BTreeMap::new();
        let mut sources = BTreeMap::new();
        let mut prefixes: HashMap<&str, u64> = HashMap::new();
        for p in packets {
            *sizes.entry(p.data_length).or_insert(0) += 1;
            *sources.entry(p.source.clone()).or_insert(0) += 1;
            if let Some(prefix) = p.prefix() {
                *prefixes.entry(prefix).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, u64)> = prefixes
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(top);

        Self {
            packets: packets.len(),
            sizes,
            sources,
            top_prefixes: ranked,
        }
    }
}

impl fmt::Display for CaptureSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} packets ===", self.packets)?;
        writeln!(f, "by size:")?;
        for (size, n) in &self.sizes {
            writeln!(f, "  {size} bytes: {n}")?;
        }
        writeln!(f, "by source:")?;
        for (src, n) in &self.sources {
            writeln!(f, "  {src}: {n}")?;
        }
        writeln!(f, "top prefixes:")?;
        for (prefix, n) in &self.top_prefixes {
            writeln!(f, "  {prefix}: {n}")?;
        }
        Ok(())
    }
}
