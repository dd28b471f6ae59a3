//! Grouping of recordings whose start times lie close together.

use std::fmt;
use std::path::{Path, PathBuf};
use chrono::{Duration, NaiveDateTime};
use tracing::info;

use crate::error::Result;
use crate::recording::Recording;
use crate::scanner::{FolderScanner, Outcome, ScanReport};

/// Recordings that started within the tolerance of the cluster's first member.
#[derive(Debug, Clone, PartialEq)]
pub struct StartTimeCluster {
    pub anchor: NaiveDateTime,
    pub members: Vec<(PathBuf, NaiveDateTime)>,
}

impl StartTimeCluster {
    pub fn span(&self) -> Duration {
        self.members.last().map(|(_, t)| *t - self.anchor).unwrap_or_else(Duration::zero)
    }
}

impl fmt::Display for StartTimeCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} recordings starting {}", self.members.len(), self.anchor.format("%Y-%m-%d %H:%M:%S"))?;
        for (path, start) in &self.members {
            let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            write!(f, "\n    {}  {}", start.format("%H:%M:%S"), name)?;
        }
        Ok(())
    }
}

/// Sort-then-sweep clustering.
///
/// The first recording of a cluster is its anchor; a later recording joins
/// while `start - anchor <= tolerance`, so membership never chains through
/// intermediate recordings. Ties keep their input order. Every input appears
/// in exactly one cluster, singletons included.
pub fn cluster_start_times(starts: &[(PathBuf, NaiveDateTime)], tolerance: Duration) -> Vec<StartTimeCluster> {
    let mut sorted: Vec<&(PathBuf, NaiveDateTime)> = starts.iter().collect();
    sorted.sort_by_key(|(_, start)| *start);

    let mut clusters: Vec<StartTimeCluster> = Vec::new();
    for (path, start) in sorted {
        match clusters.last_mut() {
            Some(cluster) if *start - cluster.anchor <= tolerance => {
                cluster.members.push((path.clone(), *start));
            }
            _ => clusters.push(StartTimeCluster {
                anchor: *start,
                members: vec![(path.clone(), *start)],
            }),
        }
    }
    clusters
}

/// Reads every recording's start time and reports the clusters with more
/// than one member. Unreadable files are failed entries of the returned scan.
pub fn find_similar_start_times(
    scanner: &FolderScanner,
    tolerance: Duration,
) -> Result<(ScanReport<NaiveDateTime>, Vec<StartTimeCluster>)> {
    let report = scanner.scan("Start time scan", |path: &Path| {
        Ok(Outcome::Done(Recording::open(path)?.start))
    })?;

    let starts: Vec<(PathBuf, NaiveDateTime)> = report.done()
        .map(|(path, start)| (path.to_path_buf(), *start))
        .collect();

    let similar: Vec<StartTimeCluster> = cluster_start_times(&starts, tolerance)
        .into_iter()
        .filter(|c| c.members.len() > 1)
        .collect();
    info!(groups = similar.len(), "similar start times");
    Ok((report, similar))
}
