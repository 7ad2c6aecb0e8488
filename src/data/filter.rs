use super::model::{ChainLength, PeakRecord, RunTable};

// ---------------------------------------------------------------------------
// Identifier markers
// ---------------------------------------------------------------------------

/// Identifier markers of the linearity standard mix.
pub const LINEARITY_MARKERS: (ChainLength, ChainLength) = (ChainLength::C20, ChainLength::C28);

/// Identifier markers of the drift standard mix.
pub const DRIFT_MARKERS: (ChainLength, ChainLength) = (ChainLength::C18, ChainLength::C24);

/// Identifier marker of H3+ factor calibration injections.
pub const CALIBRATION_MARKER: &str = "H3+";

/// Number of leading drift injections discarded as stabilization runs.
pub const DRIFT_WARMUP_INJECTIONS: usize = 2;

fn has_markers(peak: &PeakRecord, (a, b): (ChainLength, ChainLength)) -> bool {
    peak.identifier.contains(a.label()) && peak.identifier.contains(b.label())
}

/// A peak passes a standard filter when its label is unset or one of the
/// standard's two compounds.
fn label_in(peak: &PeakRecord, (a, b): (ChainLength, ChainLength)) -> bool {
    match peak.chain {
        None => true,
        Some(chain) => chain == a || chain == b,
    }
}

// ---------------------------------------------------------------------------
// Segregation
// ---------------------------------------------------------------------------

/// What happened to the drift warm-up injections.
#[derive(Debug, Clone, PartialEq)]
pub enum DriftExclusion {
    /// Rows carrying these numeric timestamps were removed.
    Removed { timestamps: Vec<f64>, rows: usize },
    /// Not enough distinct drift injections to drop any.
    Skipped { distinct: usize },
}

/// Linearity standards, drift standards and unknown samples of one run.
#[derive(Debug, Clone)]
pub struct Segregation {
    pub linearity: RunTable,
    pub drift: RunTable,
    pub unknown: RunTable,
    /// C28-labelled linearity peaks, before classification.
    pub linearity_count: usize,
    /// C24-labelled drift peaks, before warm-up removal.
    pub drift_count: usize,
    pub drift_exclusion: DriftExclusion,
}

/// Split a normalized run into its three row-disjoint subsets, preserving
/// source order in each.
pub fn segregate(table: &RunTable) -> Segregation {
    let subset = |pred: &dyn Fn(&PeakRecord) -> bool| {
        RunTable::new(table.peaks.iter().filter(|p| pred(p)).cloned().collect())
    };

    let linearity =
        subset(&|p| has_markers(p, LINEARITY_MARKERS) && label_in(p, LINEARITY_MARKERS));
    let linearity_count = linearity.count_chain(LINEARITY_MARKERS.1);
    log::info!("Linearity standards analyzed: {linearity_count}");

    let mut drift = subset(&|p| has_markers(p, DRIFT_MARKERS) && label_in(p, DRIFT_MARKERS));
    let drift_count = drift.count_chain(DRIFT_MARKERS.1);
    log::info!("Drift standards analyzed: {drift_count}");
    let drift_exclusion = drop_warmup_injections(&mut drift);

    let unknown = subset(&|p| {
        !has_markers(p, DRIFT_MARKERS)
            && !has_markers(p, LINEARITY_MARKERS)
            && !p.identifier.contains(CALIBRATION_MARKER)
    });
    log::info!("Unknown sample peaks: {}", unknown.len());

    Segregation {
        linearity,
        drift,
        unknown,
        linearity_count,
        drift_count,
        drift_exclusion,
    }
}

/// Remove the drift rows of the [`DRIFT_WARMUP_INJECTIONS`] earliest distinct
/// timestamps. Skipped when fewer injections than that exist; rows without a
/// timestamp are never removed.
pub fn drop_warmup_injections(drift: &mut RunTable) -> DriftExclusion {
    let mut stamps: Vec<f64> = drift.peaks.iter().filter_map(|p| p.date_num).collect();
    stamps.sort_by(f64::total_cmp);
    stamps.dedup();

    if stamps.len() < DRIFT_WARMUP_INJECTIONS {
        log::warn!(
            "Only {} distinct drift injection(s); keeping all of them",
            stamps.len()
        );
        return DriftExclusion::Skipped {
            distinct: stamps.len(),
        };
    }

    stamps.truncate(DRIFT_WARMUP_INJECTIONS);
    let before = drift.len();
    drift.retain(|p| !p.date_num.is_some_and(|t| stamps.contains(&t)));
    let rows = before - drift.len();
    log::info!("Dropped {rows} drift peaks from the first {DRIFT_WARMUP_INJECTIONS} injections");
    DriftExclusion::Removed {
        timestamps: stamps,
        rows,
    }
}
