//! Per-type LSA sequence counters, persisted so a restarted router never
//! reissues a sequence number its peers may still hold.

use log::{debug, error, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::lsa::LsaType;

pub const SEQ_FILE_NAME: &str = "nlsrSeqNo.txt";

/// Margin added to every loaded counter.
pub const RESTART_INCREMENT: u64 = 10;

#[derive(Debug, Error)]
pub enum SeqFileError {
    #[error("sequence file I/O: {0}")]
    Io(#[from] io::Error),
    #[error("malformed sequence file line {line}: {content:?}")]
    Malformed { line: usize, content: String },
}

#[derive(Debug)]
pub struct SequencingManager {
    name_lsa_seq: u64,
    adj_lsa_seq: u64,
    cor_lsa_seq: u64,
    path: PathBuf,
}

impl SequencingManager {
    /// Loads the counters from `<dir>/nlsrSeqNo.txt` and advances them past
    /// anything a previous run may have published. Only a missing or
    /// unreadable file starts the counters from zero.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let mut manager = Self {
            name_lsa_seq: 0,
            adj_lsa_seq: 0,
            cor_lsa_seq: 0,
            path: dir.as_ref().join(SEQ_FILE_NAME),
        };
        manager.initiate_seq_no_from_file();
        manager
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, lsa_type: LsaType) -> u64 {
        match lsa_type {
            LsaType::Name => self.name_lsa_seq,
            LsaType::Adjacency => self.adj_lsa_seq,
            LsaType::Coordinate => self.cor_lsa_seq,
        }
    }

    pub fn set(&mut self, lsa_type: LsaType, seq_no: u64) {
        match lsa_type {
            LsaType::Name => self.name_lsa_seq = seq_no,
            LsaType::Adjacency => self.adj_lsa_seq = seq_no,
            LsaType::Coordinate => self.cor_lsa_seq = seq_no,
        }
        self.write_to_file();
    }

    /// Advances the counter of `lsa_type`, persists it and returns the new value.
    pub fn increase(&mut self, lsa_type: LsaType) -> u64 {
        let next = self.get(lsa_type) + 1;
        self.set(lsa_type, next);
        next
    }

    pub fn name_lsa_seq(&self) -> u64 {
        self.name_lsa_seq
    }

    pub fn adj_lsa_seq(&self) -> u64 {
        self.adj_lsa_seq
    }

    pub fn cor_lsa_seq(&self) -> u64 {
        self.cor_lsa_seq
    }

    pub fn increase_name_lsa_seq(&mut self) -> u64 {
        self.increase(LsaType::Name)
    }

    pub fn increase_adj_lsa_seq(&mut self) -> u64 {
        self.increase(LsaType::Adjacency)
    }

    pub fn increase_cor_lsa_seq(&mut self) -> u64 {
        self.increase(LsaType::Coordinate)
    }

    /// Rewrites the whole file through a temporary sibling. Failures are
    /// logged only.
    pub fn write_to_file(&self) {
        if let Err(e) = self.try_write() {
            error!("Failed to persist sequence numbers to {}: {}", self.path.display(), e);
        }
    }

    fn try_write(&self) -> Result<(), SeqFileError> {
        let content = format!(
            "NameLsaSeq {}\nAdjLsaSeq {}\nCorLsaSeq {}\n",
            self.name_lsa_seq, self.adj_lsa_seq, self.cor_lsa_seq
        );
        let tmp = self.path.with_extension("txt.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn initiate_seq_no_from_file(&mut self) {
        let (counters, bad_lines) = match read_seq_file(&self.path) {
            Ok(parsed) => parsed,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No sequence file at {}, starting from zero", self.path.display());
                return;
            }
            Err(e) => {
                error!("Cannot read sequence file {}: {}", self.path.display(), e);
                return;
            }
        };
        for bad_line in &bad_lines {
            warn!("Skipping line of {}: {}", self.path.display(), bad_line);
        }

        // Types the current hyperbolic state does not originate are bumped too.
        self.name_lsa_seq = counters.name.saturating_add(RESTART_INCREMENT);
        self.adj_lsa_seq = counters.adj.saturating_add(RESTART_INCREMENT);
        self.cor_lsa_seq = counters.cor.saturating_add(RESTART_INCREMENT);

        debug!(
            "Loaded sequence numbers name={} adj={} cor={}",
            self.name_lsa_seq, self.adj_lsa_seq, self.cor_lsa_seq
        );
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct SeqCounters {
    name: u64,
    adj: u64,
    cor: u64,
}

/// Parses what it can. Unreadable lines are returned next to the counters
/// instead of discarding the whole file.
fn read_seq_file(path: &Path) -> io::Result<(SeqCounters, Vec<SeqFileError>)> {
    let content = fs::read_to_string(path)?;
    let mut counters = SeqCounters::default();
    let mut bad_lines = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let slot = match parts.next() {
            Some("NameLsaSeq") => Some(&mut counters.name),
            Some("AdjLsaSeq") => Some(&mut counters.adj),
            Some("CorLsaSeq") => Some(&mut counters.cor),
            _ => None,
        };
        let value = parts.next().and_then(|v| v.parse::<u64>().ok());
        match (slot, value, parts.next()) {
            (Some(slot), Some(value), None) => *slot = (*slot).max(value),
            _ => bad_lines.push(SeqFileError::Malformed {
                line: index + 1,
                content: line.to_string(),
            }),
        }
    }
    Ok((counters, bad_lines))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(dir: &Path, name: u64, adj: u64, cor: u64) {
        fs::write(
            dir.join(SEQ_FILE_NAME),
            format!("NameLsaSeq {}\nAdjLsaSeq {}\nCorLsaSeq {}\n", name, adj, cor),
        )
        .unwrap();
    }

    #[test]
    fn test_missing_file_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SequencingManager::new(dir.path());
        assert_eq!((manager.name_lsa_seq(), manager.adj_lsa_seq(), manager.cor_lsa_seq()), (0, 0, 0));
    }

    #[test]
    fn test_restart_bumps_every_counter() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), 5, 7, 3);
        let manager = SequencingManager::new(dir.path());
        assert_eq!((manager.name_lsa_seq(), manager.adj_lsa_seq(), manager.cor_lsa_seq()), (15, 17, 13));
    }

    #[test]
    fn test_restart_never_reissues_adjacency_seq() {
        // A router that ran with link-state routing and restarts with
        // hyperbolic routing on must still move past its old adjacency LSAs.
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), 5, 7, 3);
        let mut manager = SequencingManager::new(dir.path());
        assert!(manager.increase_adj_lsa_seq() > 7);
        assert!(manager.increase_cor_lsa_seq() > 3);
    }

    #[test]
    fn test_increase_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = SequencingManager::new(dir.path());
        assert_eq!(manager.increase_name_lsa_seq(), 1);
        assert_eq!(manager.increase_adj_lsa_seq(), 1);
        assert_eq!(manager.increase_adj_lsa_seq(), 2);

        let content = fs::read_to_string(manager.path()).unwrap();
        assert_eq!(content, "NameLsaSeq 1\nAdjLsaSeq 2\nCorLsaSeq 0\n");

        let reloaded = SequencingManager::new(dir.path());
        assert_eq!(reloaded.name_lsa_seq(), 11);
        assert_eq!(reloaded.adj_lsa_seq(), 12);
        assert_eq!(reloaded.cor_lsa_seq(), 10);
    }

    #[test]
    fn test_corrupted_line_keeps_other_counters() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SEQ_FILE_NAME), "NameLsaSeq 50\nAdjLsaSeq 70\ngarbage\n").unwrap();
        let mut manager = SequencingManager::new(dir.path());
        assert_eq!((manager.name_lsa_seq(), manager.adj_lsa_seq(), manager.cor_lsa_seq()), (60, 80, 10));
        assert!(manager.increase_name_lsa_seq() > 50);
    }

    #[test]
    fn test_unparsable_value_still_gets_margin() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SEQ_FILE_NAME), "NameLsaSeq lots\nAdjLsaSeq 4 5\n").unwrap();
        let manager = SequencingManager::new(dir.path());
        assert_eq!((manager.name_lsa_seq(), manager.adj_lsa_seq(), manager.cor_lsa_seq()), (10, 10, 10));
    }

    #[test]
    fn test_read_seq_file_reports_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SEQ_FILE_NAME);
        fs::write(&path, "CorLsaSeq 9\n\nbogus 1\nNameLsaSeq 2\n").unwrap();
        let (counters, bad_lines) = read_seq_file(&path).unwrap();
        assert_eq!(counters, SeqCounters { name: 2, adj: 0, cor: 9 });
        assert_eq!(bad_lines.len(), 1);
        assert!(matches!(bad_lines[0], SeqFileError::Malformed { line: 3, .. }));
    }

    #[test]
    fn test_unwritable_dir_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = SequencingManager::new(dir.path().join("missing"));
        assert_eq!(manager.increase_name_lsa_seq(), 1);
    }
}
