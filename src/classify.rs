//! Retention-time chain classification.
//!
//! Each injection is matched independently: for every chain in the
//! reference table the peak closest to the reference retention time gets the
//! label. Peaks within `threshold` (relative) of the closest difference are a
//! near-tie and go to a [`CandidateResolver`]; the algorithm itself never
//! renders or prompts.

use std::collections::BTreeSet;

use crate::data::model::{ChainLength, GroupKey, ReferenceTable, RunTable};
use crate::error::PromptError;

/// Relative tolerance band around the closest retention-time difference.
pub const DEFAULT_THRESHOLD: f64 = 0.05;

/// Smallest tie window, in retention-time units. An exact hit would
/// otherwise collapse the relative band to zero width.
pub const DEFAULT_MIN_WINDOW: f64 = 0.05;

/// How far from the closest peak another peak may sit and still tie.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchBand {
    /// Relative widening of the smallest difference.
    pub threshold: f64,
    /// Absolute floor of the band.
    pub min_window: f64,
}

impl Default for MatchBand {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_window: DEFAULT_MIN_WINDOW,
        }
    }
}

impl MatchBand {
    /// Largest difference that still counts as a candidate.
    pub fn limit(&self, min_diff: f64) -> f64 {
        (min_diff * (1.0 + self.threshold)).max(self.min_window)
    }
}

// ---------------------------------------------------------------------------
// Near-tie resolution seam
// ---------------------------------------------------------------------------

/// One peak offered to the operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Index into the classified table.
    pub index: usize,
    pub rt: f64,
    pub area: Option<f64>,
}

/// Two or more peaks equally plausible for one chain in one injection.
#[derive(Debug, Clone)]
pub struct NearTie {
    pub sample_id: String,
    pub group: GroupKey,
    pub chain: ChainLength,
    pub target_rt: f64,
    /// The injection's (retention time, area) trace, ordered by retention time.
    pub trace: Vec<(f64, f64)>,
    /// Candidates ordered by retention time; `Resolution::Pick` indexes this.
    pub candidates: Vec<Candidate>,
}

/// Operator decision on a near-tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// 0-based position in [`NearTie::candidates`].
    Pick(usize),
    /// Leave the chain unassigned for this injection.
    Skip,
}

/// Something that can adjudicate near-ties, usually a human at a terminal.
pub trait CandidateResolver {
    fn resolve(&mut self, tie: &NearTie) -> Result<Resolution, PromptError>;
}

/// Declines every near-tie. Used for unattended runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclineTies;

impl CandidateResolver for DeclineTies {
    fn resolve(&mut self, tie: &NearTie) -> Result<Resolution, PromptError> {
        log::warn!(
            "{} candidates for {} in '{}' ({}), left unassigned",
            tie.candidates.len(),
            tie.chain,
            tie.sample_id,
            tie.group
        );
        Ok(Resolution::Skip)
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub group: GroupKey,
    pub chain: ChainLength,
    /// Source row of the labelled peak.
    pub row: usize,
    pub rt: f64,
    /// True when the operator picked the peak out of a near-tie.
    pub manual: bool,
}

/// A peak that a later chain took over from an earlier one in the same pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Relabel {
    pub group: GroupKey,
    pub row: usize,
    pub from: ChainLength,
    pub to: ChainLength,
}

/// What a classification pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationReport {
    pub assignments: Vec<Assignment>,
    pub near_ties: usize,
    pub declined: usize,
    /// (injection, chain) pairs with no usable retention time at all.
    pub unmatched: Vec<(GroupKey, ChainLength)>,
    /// Labels overwritten by a later chain; the last assignment wins.
    pub relabels: Vec<Relabel>,
    /// Distinct labels present after filtering.
    pub identified: BTreeSet<ChainLength>,
}

impl ClassificationReport {
    pub fn identified_labels(&self) -> String {
        let labels: Vec<&str> = self.identified.iter().map(|c| c.label()).collect();
        format!("[{}]", labels.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Algorithm
// ---------------------------------------------------------------------------

/// Indices (into `table.peaks`) of the members of `group` closest to
/// `target_rt`, widened to every peak within `(1 + threshold)` of the
/// smallest difference (never narrower than `min_window`). Peaks without a
/// retention time are ignored.
pub fn closest_rt(
    table: &RunTable,
    group: &[usize],
    target_rt: f64,
    band: MatchBand,
) -> Vec<usize> {
    let diffs: Vec<(usize, f64)> = group
        .iter()
        .filter_map(|&i| table.peaks[i].rt.map(|rt| (i, (rt - target_rt).abs())))
        .collect();
    let Some(min_diff) = diffs.iter().map(|(_, d)| *d).min_by(f64::total_cmp) else {
        return Vec::new();
    };
    let limit = band.limit(min_diff);
    diffs
        .into_iter()
        .filter(|(_, d)| *d <= limit)
        .map(|(i, _)| i)
        .collect()
}

/// Label every peak of `table` from `reference`, then keep only labelled
/// peaks. Existing labels are cleared first, so classifying twice with the
/// same inputs gives the same labels.
pub fn classify(
    mut table: RunTable,
    reference: &ReferenceTable,
    band: MatchBand,
    resolver: &mut dyn CandidateResolver,
) -> Result<(RunTable, ClassificationReport), PromptError> {
    let mut report = ClassificationReport::default();
    for peak in &mut table.peaks {
        peak.chain = None;
    }

    for (group, members) in table.groups() {
        for (chain, target_rt) in reference.active() {
            let closest = closest_rt(&table, &members, target_rt, band);
            let chosen = match closest.as_slice() {
                [] => {
                    log::warn!(
                        "No retention time near {target_rt} for {chain} in injection {group}"
                    );
                    report.unmatched.push((group.clone(), chain));
                    None
                }
                [only] => Some((*only, false)),
                _ => {
                    report.near_ties += 1;
                    let tie = near_tie(&table, &group, &members, &closest, chain, target_rt);
                    match resolver.resolve(&tie)? {
                        Resolution::Pick(i) => match tie.candidates.get(i) {
                            Some(c) => Some((c.index, true)),
                            None => {
                                log::warn!(
                                    "Candidate {} out of range for {chain} in {group}",
                                    i + 1
                                );
                                report.declined += 1;
                                None
                            }
                        },
                        Resolution::Skip => {
                            report.declined += 1;
                            None
                        }
                    }
                }
            };

            if let Some((index, manual)) = chosen {
                let peak = &mut table.peaks[index];
                if let Some(previous) = peak.chain.replace(chain).filter(|&c| c != chain) {
                    log::warn!(
                        "Row {} in injection {group} relabelled {previous} -> {chain}",
                        peak.row
                    );
                    report.relabels.push(Relabel {
                        group: group.clone(),
                        row: peak.row,
                        from: previous,
                        to: chain,
                    });
                }
                report.assignments.push(Assignment {
                    group: group.clone(),
                    chain,
                    row: peak.row,
                    rt: peak.rt.unwrap_or(target_rt),
                    manual,
                });
            }
        }
    }

    let unlabelled = whitelist(&mut table);
    log::debug!("Dropped {unlabelled} unlabelled peaks after classification");
    report.identified = table.peaks.iter().filter_map(|p| p.chain).collect();
    Ok((table, report))
}

/// Keep peaks whose label is an accepted chain length; returns how many
/// were dropped.
pub fn whitelist(table: &mut RunTable) -> usize {
    let before = table.len();
    table.retain(|p| p.chain.is_some());
    before - table.len()
}

fn near_tie(
    table: &RunTable,
    group: &GroupKey,
    members: &[usize],
    closest: &[usize],
    chain: ChainLength,
    target_rt: f64,
) -> NearTie {
    let mut trace: Vec<(f64, f64)> = members
        .iter()
        .filter_map(|&i| {
            let p = &table.peaks[i];
            Some((p.rt?, p.area.unwrap_or(0.0)))
        })
        .collect();
    trace.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut candidates: Vec<Candidate> = closest
        .iter()
        .filter_map(|&index| {
            let p = &table.peaks[index];
            Some(Candidate {
                index,
                rt: p.rt?,
                area: p.area,
            })
        })
        .collect();
    candidates.sort_by(|a, b| a.rt.total_cmp(&b.rt));

    NearTie {
        sample_id: table.peaks[members[0]].identifier.clone(),
        group: group.clone(),
        chain,
        target_rt,
        trace,
        candidates,
    }
}
