use crate::classify::{classify, whitelist, CandidateResolver, ClassificationReport, MatchBand};
use crate::data::filter::{segregate, DriftExclusion, Segregation};
use crate::data::model::{
    ChainLength, CorrectionLog, IsotopeMode, RawTable, ReferenceTable, RunTable,
};
use crate::data::schema::{normalize, SchemaWarning};
use crate::error::{PromptError, Result};
use crate::runlog::RunLog;

// ---------------------------------------------------------------------------
// Operator seam
// ---------------------------------------------------------------------------

/// Everything the pipeline needs from a human: whether (and with which
/// reference times) to classify, and near-tie decisions.
pub trait Operator: CandidateResolver {
    /// `None` turns retention-time classification off for this run.
    fn reference_table(
        &mut self,
        chains: &[ChainLength],
    ) -> std::result::Result<Option<ReferenceTable>, PromptError>;

    fn as_resolver(&mut self) -> &mut dyn CandidateResolver;
}

// ---------------------------------------------------------------------------
// Run output
// ---------------------------------------------------------------------------

/// Classification reports per subset; all `None` when classification was
/// declined.
#[derive(Debug, Clone, Default)]
pub struct RunReports {
    pub linearity: Option<ClassificationReport>,
    pub drift: Option<ClassificationReport>,
    pub unknown: Option<ClassificationReport>,
}

/// The classified run handed to downstream correction steps.
#[derive(Debug, Clone)]
pub struct ClassifiedRun {
    pub linearity: RunTable,
    pub drift: RunTable,
    pub unknown: RunTable,
    pub corrections: CorrectionLog,
    pub warnings: Vec<SchemaWarning>,
    pub reports: RunReports,
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Normalize, segregate and classify one run export.
pub fn process_run(
    raw: &RawTable,
    mode: IsotopeMode,
    band: MatchBand,
    operator: &mut dyn Operator,
    log: &mut dyn RunLog,
) -> Result<ClassifiedRun> {
    let normalized = normalize(raw, mode)?;
    for warning in &normalized.warnings {
        log.append(&format!("Warning: {warning}"))?;
    }

    let Segregation {
        mut linearity,
        mut drift,
        mut unknown,
        linearity_count,
        drift_count,
        drift_exclusion,
    } = segregate(&normalized.table);
    log.append(&format!("Number of linearity standards analyzed: {linearity_count}"))?;
    log.append(&format!("Number of Drift standards analyzed: {drift_count}"))?;
    match drift_exclusion {
        DriftExclusion::Removed { .. } => log.append("First two drift standards ignored.")?,
        DriftExclusion::Skipped { distinct } => log.append(&format!(
            "Only {distinct} drift standard injection(s); none ignored."
        ))?,
    }

    let mut reports = RunReports::default();
    match operator.reference_table(&ChainLength::ALL)? {
        Some(reference) => {
            log.append("User opted to identify chains.")?;
            let resolver = operator.as_resolver();
            let (table, report) = classify(unknown, &reference, band, resolver)?;
            log_identified(log, "samples", &report)?;
            unknown = table;
            reports.unknown = Some(report);

            let (table, report) = classify(linearity, &reference, band, resolver)?;
            log_identified(log, "linearity standards", &report)?;
            linearity = table;
            reports.linearity = Some(report);

            let (table, report) = classify(drift, &reference, band, resolver)?;
            log_identified(log, "drift standards", &report)?;
            drift = table;
            reports.drift = Some(report);
        }
        None => {
            log.append("User opted not to identify chains.")?;
            let dropped = whitelist(&mut unknown);
            log::info!("Kept {} labelled sample peaks, dropped {dropped}", unknown.len());
        }
    }

    for table in [&mut linearity, &mut drift, &mut unknown] {
        whitelist(table);
    }
    log::info!(
        "Classified run: {} linearity, {} drift, {} sample peaks",
        linearity.len(),
        drift.len(),
        unknown.len()
    );

    Ok(ClassifiedRun {
        linearity,
        drift,
        unknown,
        corrections: CorrectionLog::new(),
        warnings: normalized.warnings,
        reports,
    })
}

fn log_identified(log: &mut dyn RunLog, subset: &str, report: &ClassificationReport) -> Result<()> {
    log.append(&format!(
        "Chain lengths identified by user in {subset}: {}",
        report.identified_labels()
    ))?;
    let manual = report.assignments.iter().filter(|a| a.manual).count();
    if manual > 0 || report.declined > 0 {
        log.append(&format!(
            "{subset}: {manual} near-tie(s) resolved by user, {} declined",
            report.declined
        ))?;
    }
    for relabel in &report.relabels {
        log.append(&format!(
            "{subset}: row {} in injection {} relabelled {} -> {}",
            relabel.row, relabel.group, relabel.from, relabel.to
        ))?;
    }
    for (group, chain) in &report.unmatched {
        log.append(&format!("{subset}: no retention time for {chain} in injection {group}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{NearTie, Resolution};
    use crate::data::model::{CellValue, CorrectionKind};

    /// Answers from fixed data instead of a terminal.
    struct ScriptedOperator {
        reference: Option<ReferenceTable>,
        picks: Vec<Resolution>,
        ties: usize,
    }

    impl CandidateResolver for ScriptedOperator {
        fn resolve(&mut self, _tie: &NearTie) -> std::result::Result<Resolution, PromptError> {
            self.ties += 1;
            Ok(if self.picks.is_empty() { Resolution::Skip } else { self.picks.remove(0) })
        }
    }

    impl Operator for ScriptedOperator {
        fn reference_table(
            &mut self,
            _chains: &[ChainLength],
        ) -> std::result::Result<Option<ReferenceTable>, PromptError> {
            Ok(self.reference.clone())
        }

        fn as_resolver(&mut self) -> &mut dyn CandidateResolver {
            self
        }
    }

    fn row(id: &str, date: &str, time: &str, rt: f64, component: &str) -> Vec<CellValue> {
        let text = |s: &str| {
            if s.is_empty() {
                CellValue::Null
            } else {
                CellValue::String(s.to_string())
            }
        };
        vec![
            text(id),
            text(date),
            text(time),
            CellValue::Float(rt),
            CellValue::Float(10.0),
            CellValue::Float(-160.0),
            text(component),
        ]
    }

    /// Ten peaks: four two-peak drift injections (two early, two late), one
    /// H3+ injection and one labelled sample peak.
    fn run() -> RawTable {
        RawTable {
            headers: ["Identifier 1", "Date", "Time", "Rt", "Area All", "d 2H/1H", "Component"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            rows: vec![
                row("C18/C24 drift", "01/05/2024", "08:00:00", 500.3, ""),
                row("C18/C24 drift", "01/05/2024", "08:00:00", 510.2, ""),
                row("C18/C24 drift", "01/05/2024", "09:00:00", 499.8, ""),
                row("C18/C24 drift", "01/05/2024", "09:00:00", 509.9, ""),
                row("H3+ factor", "01/05/2024", "09:30:00", 300.0, ""),
                row("Lake 4cm", "01/05/2024", "10:00:00", 500.1, "C18"),
                row("C18/C24 drift", "01/05/2024", "11:00:00", 500.4, ""),
                row("C18/C24 drift", "01/05/2024", "11:00:00", 510.3, ""),
                row("C18/C24 drift", "01/05/2024", "12:00:00", 499.6, ""),
                row("C18/C24 drift", "01/05/2024", "12:00:00", 509.5, ""),
            ],
        }
    }

    fn reference() -> ReferenceTable {
        ChainLength::ALL
            .into_iter()
            .map(|c| match c {
                ChainLength::C18 => (c, Some(500.0)),
                ChainLength::C24 => (c, Some(510.0)),
                _ => (c, None),
            })
            .collect()
    }

    #[test]
    fn end_to_end_drops_early_drift_injections() {
        let mut operator = ScriptedOperator {
            reference: Some(reference()),
            picks: vec![],
            ties: 0,
        };
        let mut log: Vec<String> = Vec::new();
        let out = process_run(
            &run(),
            IsotopeMode::Deuterium,
            MatchBand::default(),
            &mut operator,
            &mut log,
        )
        .unwrap();

        assert_eq!(operator.ties, 0);
        let drift: Vec<_> = out
            .drift
            .peaks
            .iter()
            .map(|p| (p.time.as_str(), p.chain.unwrap()))
            .collect();
        assert_eq!(
            drift,
            vec![
                ("11:00:00", ChainLength::C18),
                ("11:00:00", ChainLength::C24),
                ("12:00:00", ChainLength::C18),
                ("12:00:00", ChainLength::C24),
            ]
        );
        // The lone sample peak is the closest to both references; C24 is
        // matched last and wins.
        assert_eq!(out.unknown.len(), 1);
        assert_eq!(out.unknown.peaks[0].identifier, "Lake 4cm");
        assert!(out.linearity.is_empty());
        assert!(out.unknown.peaks.iter().all(|p| !p.identifier.contains("H3+")));

        assert_eq!(out.corrections.entries.len(), 4);
        assert_eq!(out.corrections.entries[&CorrectionKind::Drift], 0.0);
        assert!(log.contains(&"First two drift standards ignored.".to_string()));
        assert!(log.contains(&"User opted to identify chains.".to_string()));
        assert!(log
            .iter()
            .any(|l| l == "Chain lengths identified by user in drift standards: [C18, C24]"));
        assert!(log
            .iter()
            .any(|l| l == "samples: row 5 in injection 01/05/2024 10:00:00 relabelled C18 -> C24"));
        assert_eq!(out.reports.unknown.as_ref().map(|r| r.relabels.len()), Some(1));
    }

    #[test]
    fn declining_classification_whitelists_existing_labels() {
        let mut operator = ScriptedOperator {
            reference: None,
            picks: vec![],
            ties: 0,
        };
        let mut log: Vec<String> = Vec::new();
        let out = process_run(
            &run(),
            IsotopeMode::Deuterium,
            MatchBand::default(),
            &mut operator,
            &mut log,
        )
        .unwrap();

        assert_eq!(out.unknown.len(), 1);
        assert_eq!(out.unknown.peaks[0].chain, Some(ChainLength::C18));
        // Drift rows carried no component label, so none survive.
        assert!(out.drift.is_empty());
        assert!(out.reports.unknown.is_none());
        assert!(log.contains(&"User opted not to identify chains.".to_string()));
    }

    #[test]
    fn near_ties_reach_the_operator() {
        let mut raw = run();
        // A second sample peak as close to C18 as the first one.
        raw.rows.push(row("Lake 4cm", "01/05/2024", "10:00:00", 499.9, ""));
        let mut operator = ScriptedOperator {
            reference: Some(reference()),
            picks: vec![Resolution::Pick(0)],
            ties: 0,
        };
        let mut log: Vec<String> = Vec::new();
        let out = process_run(
            &raw,
            IsotopeMode::Deuterium,
            MatchBand::default(),
            &mut operator,
            &mut log,
        )
        .unwrap();
        // Both peaks are also ~10 away from C24, which ties as well and is
        // declined.
        assert_eq!(operator.ties, 2);
        let report = out.reports.unknown.unwrap();
        assert_eq!(report.near_ties, 2);
        assert_eq!(report.declined, 1);
        assert!(report
            .assignments
            .iter()
            .any(|a| a.manual && a.chain == ChainLength::C18 && a.rt == 499.9));
        assert_eq!(out.unknown.len(), 1);
        assert_eq!(out.unknown.peaks[0].rt, Some(499.9));
        assert!(log.iter().any(|l| l == "samples: 1 near-tie(s) resolved by user, 1 declined"));
    }

    #[test]
    fn schema_warnings_reach_the_run_log() {
        let mut raw = run();
        raw.rows[0][1] = CellValue::String("not a date".into());
        let mut operator = ScriptedOperator {
            reference: None,
            picks: vec![],
            ties: 0,
        };
        let mut log: Vec<String> = Vec::new();
        let out = process_run(
            &raw,
            IsotopeMode::Carbon,
            MatchBand::default(),
            &mut operator,
            &mut log,
        )
        .unwrap();
        assert_eq!(out.warnings.len(), 2);
        assert!(log[0].starts_with("Warning: No column matching d 13C/12C"));
        assert!(log[1].starts_with("Warning: 1 row(s) with unparseable date/time"));
    }
}
