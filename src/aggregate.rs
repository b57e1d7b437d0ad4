//! Fan-in of partial weights into response rows and the response matrix.

use std::collections::{BTreeSet, HashMap};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::workitem::Identity;

/// Weight of one surface/source pair, before summing over surfaces.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialWeight {
    pub identity: Identity,
    pub weight: f64,
}

/// Summed weight of one source for one detector position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRow {
    pub det_num: u32,
    pub run_num: u32,
    pub source_name: String,
    pub weight: f64,
}

/// Sort by `(det, run, source, surface)` and sum each `(det, run, source)`
/// run of the sorted sequence into one row.
///
/// Summation always proceeds in surface order, so the result does not depend
/// on the order the partial weights arrived in.
pub fn sort_and_sum(mut partials: Vec<PartialWeight>) -> Vec<ResponseRow> {
    partials.sort_by(|a, b| a.identity.cmp(&b.identity));

    let mut rows: Vec<ResponseRow> = Vec::new();
    let mut iter = partials.into_iter();
    let Some(first) = iter.next() else {
        return rows;
    };
    let mut current = first.identity;
    let mut sum = first.weight;
    for pw in iter {
        if pw.identity.group_key() == current.group_key() {
            sum += pw.weight;
        } else {
            rows.push(row_for(current, sum));
            current = pw.identity;
            sum = pw.weight;
        }
    }
    rows.push(row_for(current, sum));
    rows
}

fn row_for(identity: Identity, weight: f64) -> ResponseRow {
    ResponseRow {
        det_num: identity.det_num,
        run_num: identity.run_num,
        source_name: identity.source_name,
        weight,
    }
}

/// Dense response matrix: one row per source, one column per detector position.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMatrix {
    pub sources: Vec<String>,
    /// `(det_num, run_num)` per column, ascending.
    pub positions: Vec<(u32, u32)>,
    pub weights: Array2<f64>,
}

impl ResponseMatrix {
    /// Rows follow `source_order`; sources missing from it are appended in
    /// name order. Absent (position, source) pairs are 0.
    pub fn from_rows(rows: &[ResponseRow], source_order: &[String]) -> Self {
        let mut sources: Vec<String> = Vec::new();
        for name in source_order {
            if !sources.contains(name) {
                sources.push(name.clone());
            }
        }
        let extra: BTreeSet<&String> = rows
            .iter()
            .map(|r| &r.source_name)
            .filter(|n| !sources.contains(n))
            .collect();
        sources.extend(extra.into_iter().cloned());

        let positions: Vec<(u32, u32)> = rows
            .iter()
            .map(|r| (r.det_num, r.run_num))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let row_of: HashMap<&str, usize> = sources
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();
        let col_of: HashMap<(u32, u32), usize> =
            positions.iter().enumerate().map(|(i, p)| (*p, i)).collect();

        let mut weights = Array2::<f64>::zeros((sources.len(), positions.len()));
        for r in rows {
            let i = row_of[r.source_name.as_str()];
            let j = col_of[&(r.det_num, r.run_num)];
            weights[[i, j]] += r.weight;
        }
        Self {
            sources,
            positions,
            weights,
        }
    }

    pub fn get(&self, source: &str, det_num: u32, run_num: u32) -> Option<f64> {
        let i = self.sources.iter().position(|s| s == source)?;
        let j = self.positions.iter().position(|p| *p == (det_num, run_num))?;
        Some(self.weights[[i, j]])
    }
}
