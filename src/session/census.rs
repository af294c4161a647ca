//! Block census: tallies what `testforblock ... air` probes found, per block name and
//! relative layer, and persists the tally once a sweep has drained.

use crate::codec::envelope::Acknowledgement;
use crate::error::{Context, Result};
use regex_lite::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn found_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"is (.*?) \(expected:").expect("census pattern compiles"))
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CensusCounts(BTreeMap<String, BTreeMap<i64, u64>>);

impl CensusCounts {
    pub fn get(&self, block: &str, layer: i64) -> u64 {
        self.0
            .get(block)
            .and_then(|layers| layers.get(&layer))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().flat_map(BTreeMap::values).sum()
    }

    fn increment(&mut self, block: &str, layer: i64) {
        *self
            .0
            .entry(block.to_string())
            .or_default()
            .entry(layer)
            .or_insert(0) += 1;
    }
}

#[derive(Debug)]
pub struct BlockCensus {
    counts: CensusCounts,
    output_path: PathBuf,
    dirty: bool,
}

impl BlockCensus {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            counts: CensusCounts::default(),
            output_path: output_path.into(),
            dirty: false,
        }
    }

    /// Counts the block named in a probe's status message. Returns `false` when the
    /// acknowledgement carries no block name or no position.
    pub fn record(&mut self, ack: &Acknowledgement) -> bool {
        let Some(position) = ack.position else {
            return false;
        };
        let Some(block) = found_block_pattern()
            .captures(&ack.status_message)
            .and_then(|captures| captures.get(1))
        else {
            return false;
        };

        self.counts.increment(block.as_str(), position.y);
        self.dirty = true;
        true
    }

    pub fn counts(&self) -> &CensusCounts {
        &self.counts
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.counts)?)
    }

    /// Writes the tally if anything changed since the last write.
    pub async fn flush(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        let payload = self.to_json()?;
        tokio::fs::write(&self.output_path, payload)
            .await
            .with_context(|| {
                format!("failed to write census to {}", self.output_path.display())
            })?;
        self.dirty = false;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::envelope::BlockPosition;

    fn probe(message: &str, y: i64) -> Acknowledgement {
        Acknowledgement {
            request_id: uuid::Uuid::new_v4().to_string(),
            status_code: Some(-2147352576),
            status_message: message.to_string(),
            position: Some(BlockPosition { x: 4, y, z: -2 }),
        }
    }

    #[test]
    fn counts_blocks_per_layer() {
        let mut census = BlockCensus::new("unused.json");
        assert!(census.record(&probe("The block at 4,63,-2 is Stone (expected: Air).", 63)));
        assert!(census.record(&probe("The block at 5,63,-2 is Stone (expected: Air).", 63)));
        assert!(census.record(&probe("The block at 5,62,-2 is Dirt (expected: Air).", 62)));

        assert_eq!(census.counts().get("Stone", 63), 2);
        assert_eq!(census.counts().get("Dirt", 62), 1);
        assert_eq!(census.counts().total(), 3);
        assert!(census.is_dirty());
    }

    #[test]
    fn ignores_air_and_positionless_acks() {
        let mut census = BlockCensus::new("unused.json");
        let mut air = probe("Successfully found the block at 4,63,-2.", 63);
        air.status_code = Some(0);
        assert!(!census.record(&air));

        let mut no_position = probe("The block at 4,63,-2 is Stone (expected: Air).", 63);
        no_position.position = None;
        assert!(!census.record(&no_position));
        assert!(!census.is_dirty());
    }

    #[tokio::test]
    async fn flush_writes_once_per_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blockcount.json");
        let mut census = BlockCensus::new(&path);

        assert!(!census.flush().await.unwrap());
        census.record(&probe("The block at 0,1,0 is Sand (expected: Air).", 1));
        assert!(census.flush().await.unwrap());
        assert!(!census.flush().await.unwrap());

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, serde_json::json!({ "Sand": { "1": 1 } }));
    }
}
