//! Expansion of detectors × surfaces × sources into independent work items.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::detector::{DetectingSurface, Detector};
use crate::shapes::Source;

/// Which partial weight a work item produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub det_num: u32,
    pub run_num: u32,
    pub surface_index: usize,
    pub source_name: String,
}

impl Identity {
    /// Aggregation order: detector, run, source, then surface last so all
    /// surfaces of one group sit next to each other.
    pub fn sort_key(&self) -> (u32, u32, &str, usize) {
        (
            self.det_num,
            self.run_num,
            self.source_name.as_str(),
            self.surface_index,
        )
    }

    /// Key shared by every surface of one `(detector, run, source)` group.
    pub fn group_key(&self) -> (u32, u32, &str) {
        (self.det_num, self.run_num, self.source_name.as_str())
    }
}

impl PartialOrd for Identity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "det {} run {} side {} source {}",
            self.det_num, self.run_num, self.surface_index, self.source_name
        )
    }
}

/// One self-contained surface/source evaluation. Owns its own copies of
/// both geometries, so items can be moved to any worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub identity: Identity,
    pub surface: DetectingSurface,
    pub source: Source,
}

/// Every (detector, surface, source) combination, exactly once.
pub fn enumerate_work_items(detectors: &[Detector], sources: &[Source]) -> Vec<WorkItem> {
    let total: usize = detectors.iter().map(|d| d.surfaces().len()).sum::<usize>() * sources.len();
    let mut items = Vec::with_capacity(total);
    for det in detectors {
        for (surface_index, surface) in det.surfaces().iter().enumerate() {
            for source in sources {
                items.push(WorkItem {
                    identity: Identity {
                        det_num: det.det_num,
                        run_num: det.run_num,
                        surface_index,
                        source_name: source.name.clone(),
                    },
                    surface: surface.clone(),
                    source: source.clone(),
                });
            }
        }
    }
    items
}
