use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CellValue – a single cell of a loaded export
// ---------------------------------------------------------------------------

/// A dynamically-typed cell, as read from CSV/JSON/Parquet before the schema
/// is known.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    /// Interpret the cell as a number. Numeric strings (e.g. a CSV column the
    /// instrument quoted) are accepted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) if v.is_finite() => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    /// Textual form of the cell; `None` for nulls.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

// ---------------------------------------------------------------------------
// RawTable – the export as loaded
// ---------------------------------------------------------------------------

/// Header plus rows, in file order. Rows shorter than the header read as null.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Locate a column: exact header match first, then the first header
    /// containing `pattern`.
    pub fn find_column(&self, pattern: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim() == pattern)
            .or_else(|| self.headers.iter().position(|h| h.contains(pattern)))
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&CellValue::Null)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ChainLength
// ---------------------------------------------------------------------------

/// Even-numbered carbon-chain class, C16 through C32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChainLength {
    C16,
    C18,
    C20,
    C22,
    C24,
    C26,
    C28,
    C30,
    C32,
}

impl ChainLength {
    /// The nine accepted chain-length labels, shortest first.
    pub const ALL: [ChainLength; 9] = [
        ChainLength::C16,
        ChainLength::C18,
        ChainLength::C20,
        ChainLength::C22,
        ChainLength::C24,
        ChainLength::C26,
        ChainLength::C28,
        ChainLength::C30,
        ChainLength::C32,
    ];

    /// Number of carbons.
    pub fn carbons(self) -> u8 {
        match self {
            ChainLength::C16 => 16,
            ChainLength::C18 => 18,
            ChainLength::C20 => 20,
            ChainLength::C22 => 22,
            ChainLength::C24 => 24,
            ChainLength::C26 => 26,
            ChainLength::C28 => 28,
            ChainLength::C30 => 30,
            ChainLength::C32 => 32,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ChainLength::C16 => "C16",
            ChainLength::C18 => "C18",
            ChainLength::C20 => "C20",
            ChainLength::C22 => "C22",
            ChainLength::C24 => "C24",
            ChainLength::C26 => "C26",
            ChainLength::C28 => "C28",
            ChainLength::C30 => "C30",
            ChainLength::C32 => "C32",
        }
    }
}

impl fmt::Display for ChainLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ChainLength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        ChainLength::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(t))
            .ok_or_else(|| format!("'{t}' is not a chain length (expected C16..C32)"))
    }
}

// ---------------------------------------------------------------------------
// IsotopeMode
// ---------------------------------------------------------------------------

/// Which isotope ratio the run measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsotopeMode {
    /// δ2H/1H, token `dD`
    Deuterium,
    /// δ13C/12C, token `dC`
    Carbon,
}

impl IsotopeMode {
    /// Canonical column token, also the CLI spelling.
    pub fn token(self) -> &'static str {
        match self {
            IsotopeMode::Deuterium => "dD",
            IsotopeMode::Carbon => "dC",
        }
    }

    /// Label written to the run log.
    pub fn display_name(self) -> &'static str {
        match self {
            IsotopeMode::Deuterium => "δD",
            IsotopeMode::Carbon => "δC",
        }
    }

    /// Instrument header fragments that identify the ratio column.
    pub fn ratio_patterns(self) -> &'static [&'static str] {
        match self {
            IsotopeMode::Deuterium => &["d 2H/1H"],
            IsotopeMode::Carbon => &["d 13C/12C"],
        }
    }
}

impl FromStr for IsotopeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "dD" => Ok(IsotopeMode::Deuterium),
            "dC" => Ok(IsotopeMode::Carbon),
            other => Err(format!("unknown isotope '{other}' (expected dD or dC)")),
        }
    }
}

// ---------------------------------------------------------------------------
// PeakRecord / RunTable
// ---------------------------------------------------------------------------

/// One detected peak of one injection.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakRecord {
    /// 0-based row in the source export.
    pub row: usize,
    /// Acquisition identifier ("Identifier 1").
    pub identifier: String,
    pub date: String,
    pub time: String,
    /// Parsed date + time; `None` when no accepted format matched.
    pub acquired_at: Option<NaiveDateTime>,
    /// Fractional days since 1970-01-01.
    pub date_num: Option<f64>,
    /// `date_num` minus the latest `date_num` of the run (≤ 0).
    pub time_rel: Option<f64>,
    /// Retention time.
    pub rt: Option<f64>,
    pub area: Option<f64>,
    /// δ value of the run's isotope mode.
    pub ratio: Option<f64>,
    pub chain: Option<ChainLength>,
}

impl PeakRecord {
    /// Key of the injection this peak belongs to.
    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            date: self.date.clone(),
            time: self.time.clone(),
        }
    }
}

/// Identifies one acquisition group (injection).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub date: String,
    pub time: String,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.time)
    }
}

/// Ordered peaks of one run, or of a subset of one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunTable {
    pub peaks: Vec<PeakRecord>,
}

impl RunTable {
    pub fn new(peaks: Vec<PeakRecord>) -> Self {
        Self { peaks }
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// Keep peaks matching `pred`, preserving order.
    pub fn retain(&mut self, pred: impl FnMut(&PeakRecord) -> bool) {
        self.peaks.retain(pred);
    }

    /// Number of peaks carrying `chain`.
    pub fn count_chain(&self, chain: ChainLength) -> usize {
        self.peaks.iter().filter(|p| p.chain == Some(chain)).count()
    }

    /// Peak indices grouped by injection, groups in first-appearance order.
    pub fn groups(&self) -> Vec<(GroupKey, Vec<usize>)> {
        let mut groups: Vec<(GroupKey, Vec<usize>)> = Vec::new();
        for (i, peak) in self.peaks.iter().enumerate() {
            let key = peak.group_key();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(i),
                None => groups.push((key, vec![i])),
            }
        }
        groups
    }
}

// ---------------------------------------------------------------------------
// Reference retention times
// ---------------------------------------------------------------------------

/// Expected retention time per chain for one run; `None` leaves the chain
/// out of classification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceTable {
    entries: BTreeMap<ChainLength, Option<f64>>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, chain: ChainLength, rt: Option<f64>) {
        self.entries.insert(chain, rt);
    }

    pub fn get(&self, chain: ChainLength) -> Option<f64> {
        self.entries.get(&chain).copied().flatten()
    }

    /// Chains with a usable retention time, shortest chain first.
    pub fn active(&self) -> impl Iterator<Item = (ChainLength, f64)> + '_ {
        self.entries
            .iter()
            .filter_map(|(chain, rt)| rt.map(|rt| (*chain, rt)))
    }

    pub fn is_empty(&self) -> bool {
        self.active().next().is_none()
    }
}

impl FromIterator<(ChainLength, Option<f64>)> for ReferenceTable {
    fn from_iter<I: IntoIterator<Item = (ChainLength, Option<f64>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// CorrectionLog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CorrectionKind {
    Drift,
    Linearity,
    #[serde(rename = "VSMOW")]
    Vsmow,
    Methylation,
}

impl CorrectionKind {
    pub const ALL: [CorrectionKind; 4] = [
        CorrectionKind::Drift,
        CorrectionKind::Linearity,
        CorrectionKind::Vsmow,
        CorrectionKind::Methylation,
    ];
}

/// Placeholder per correction step, filled in by downstream correction code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionLog {
    pub entries: BTreeMap<CorrectionKind, f64>,
}

impl Default for CorrectionLog {
    fn default() -> Self {
        Self {
            entries: CorrectionKind::ALL.into_iter().map(|k| (k, 0.0)).collect(),
        }
    }
}

impl CorrectionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_length_parses_case_insensitively() {
        assert_eq!("c24".parse::<ChainLength>().unwrap(), ChainLength::C24);
        assert_eq!(" C32 ".parse::<ChainLength>().unwrap(), ChainLength::C32);
        assert!("C25".parse::<ChainLength>().is_err());
        assert!("H3+".parse::<ChainLength>().is_err());
    }

    #[test]
    fn groups_keep_first_appearance_order() {
        let peak = |row: usize, time: &str| PeakRecord {
            row,
            identifier: "S".into(),
            date: "01/05/2024".into(),
            time: time.into(),
            acquired_at: None,
            date_num: None,
            time_rel: None,
            rt: None,
            area: None,
            ratio: None,
            chain: None,
        };
        let table = RunTable::new(vec![
            peak(0, "10:00:00"),
            peak(1, "09:00:00"),
            peak(2, "10:00:00"),
        ]);
        let groups = table.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0.time, "10:00:00");
        assert_eq!(groups[0].1, vec![0, 2]);
        assert_eq!(groups[1].1, vec![1]);
    }

    #[test]
    fn correction_log_scaffold_is_zeroed() {
        let log = CorrectionLog::new();
        assert_eq!(log.entries.len(), 4);
        assert!(log.entries.values().all(|v| *v == 0.0));
        let json = log.to_json().unwrap();
        assert!(json.contains("\"VSMOW\""));
        assert!(json.contains("\"Methylation\""));
    }

    #[test]
    fn reference_table_skips_unused_chains() {
        let table: ReferenceTable = [
            (ChainLength::C18, Some(500.0)),
            (ChainLength::C20, None),
            (ChainLength::C24, Some(510.0)),
        ]
        .into_iter()
        .collect();
        let active: Vec<_> = table.active().collect();
        assert_eq!(
            active,
            vec![(ChainLength::C18, 500.0), (ChainLength::C24, 510.0)]
        );
        assert_eq!(table.get(ChainLength::C20), None);
        assert!(!table.is_empty());
    }
}
