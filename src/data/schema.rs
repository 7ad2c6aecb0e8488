//! Schema normalization: instrument headers → canonical peak records.
//!
//! Column detection is a declarative table ([`field_mappings`]) checked once
//! on entry. Required fields abort the run when absent; optional ones are
//! filled with missing values and reported as [`SchemaWarning`]s.

use std::fmt;

use chrono::{Datelike, NaiveDateTime};

use super::model::{ChainLength, IsotopeMode, PeakRecord, RawTable, RunTable};
use crate::error::{Error, Result};

/// Accepted date + time layouts, tried in order.
pub const TIMESTAMP_FORMATS: [&str; 4] = [
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

const SECONDS_PER_DAY: f64 = 86_400.0;

// ---------------------------------------------------------------------------
// Field mapping
// ---------------------------------------------------------------------------

/// Canonical peak-record fields sourced from the export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalField {
    Identifier,
    Date,
    Time,
    RetentionTime,
    Ratio,
    Area,
    Chain,
}

impl CanonicalField {
    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::Identifier => "identifier",
            CanonicalField::Date => "date",
            CanonicalField::Time => "time",
            CanonicalField::RetentionTime => "rt",
            CanonicalField::Ratio => "ratio",
            CanonicalField::Area => "area",
            CanonicalField::Chain => "chain",
        }
    }
}

/// Source headers accepted for one canonical field.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    pub field: CanonicalField,
    pub patterns: &'static [&'static str],
    pub required: bool,
}

/// The header table for `mode`.
pub fn field_mappings(mode: IsotopeMode) -> [FieldMapping; 7] {
    [
        FieldMapping {
            field: CanonicalField::Identifier,
            patterns: &["Identifier 1"],
            required: true,
        },
        FieldMapping {
            field: CanonicalField::Date,
            patterns: &["Date"],
            required: true,
        },
        FieldMapping {
            field: CanonicalField::Time,
            patterns: &["Time"],
            required: true,
        },
        FieldMapping {
            field: CanonicalField::RetentionTime,
            patterns: &["Rt"],
            required: true,
        },
        FieldMapping {
            field: CanonicalField::Ratio,
            patterns: mode.ratio_patterns(),
            required: false,
        },
        FieldMapping {
            field: CanonicalField::Area,
            patterns: &["Area All"],
            required: false,
        },
        FieldMapping {
            field: CanonicalField::Chain,
            patterns: &["Component"],
            required: false,
        },
    ]
}

/// Non-fatal findings of normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaWarning {
    /// Optional column absent; the field is missing on every row.
    MissingColumn {
        field: CanonicalField,
        patterns: Vec<String>,
    },
    /// Rows (0-based) whose date + time matched no accepted format.
    UnparsedTimestamps { rows: Vec<usize> },
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaWarning::MissingColumn { field, patterns } => write!(
                f,
                "No column matching {} found; '{}' left empty",
                patterns.join(" / "),
                field.name()
            ),
            SchemaWarning::UnparsedTimestamps { rows } => write!(
                f,
                "{} row(s) with unparseable date/time (first: row {})",
                rows.len(),
                rows.first().copied().unwrap_or_default()
            ),
        }
    }
}

/// Normalized run plus everything that was tolerated along the way.
#[derive(Debug, Clone)]
pub struct NormalizedRun {
    pub table: RunTable,
    pub warnings: Vec<SchemaWarning>,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

struct ResolvedColumns {
    identifier: usize,
    date: usize,
    time: usize,
    rt: usize,
    ratio: Option<usize>,
    area: Option<usize>,
    chain: Option<usize>,
}

fn resolve_columns(
    raw: &RawTable,
    mode: IsotopeMode,
    warnings: &mut Vec<SchemaWarning>,
) -> Result<ResolvedColumns> {
    let mut found: [Option<usize>; 7] = [None; 7];
    for (slot, mapping) in found.iter_mut().zip(field_mappings(mode)) {
        *slot = mapping.patterns.iter().find_map(|p| raw.find_column(p));
        match *slot {
            Some(col) => log::debug!(
                "Column '{}' mapped to '{}'",
                raw.headers[col],
                mapping.field.name()
            ),
            None if mapping.required => {
                return Err(Error::MissingColumn(mapping.patterns.join(" / ")));
            }
            None => warnings.push(SchemaWarning::MissingColumn {
                field: mapping.field,
                patterns: mapping.patterns.iter().map(|p| p.to_string()).collect(),
            }),
        }
    }
    let [identifier, date, time, rt, ratio, area, chain] = found;
    // Required slots were checked in the loop.
    match (identifier, date, time, rt) {
        (Some(identifier), Some(date), Some(time), Some(rt)) => Ok(ResolvedColumns {
            identifier,
            date,
            time,
            rt,
            ratio,
            area,
            chain,
        }),
        _ => Err(Error::MissingColumn("Identifier 1 / Date / Time / Rt".into())),
    }
}

/// Map an export onto canonical peak records. Never drops a row.
pub fn normalize(raw: &RawTable, mode: IsotopeMode) -> Result<NormalizedRun> {
    let mut warnings = Vec::new();
    let cols = resolve_columns(raw, mode, &mut warnings)?;

    let mut unparsed = Vec::new();
    let mut peaks: Vec<PeakRecord> = (0..raw.len())
        .map(|row| {
            let text = |col: usize| raw.cell(row, col).as_text().unwrap_or_default();
            let number = |col: Option<usize>| col.and_then(|c| raw.cell(row, c).as_f64());

            let date = text(cols.date);
            let time = text(cols.time);
            let acquired_at = parse_timestamp(&date, &time);
            if acquired_at.is_none() {
                unparsed.push(row);
            }
            let chain = cols
                .chain
                .and_then(|c| raw.cell(row, c).as_text())
                .and_then(|s| s.parse::<ChainLength>().ok());

            PeakRecord {
                row,
                identifier: text(cols.identifier),
                date,
                time,
                acquired_at,
                date_num: acquired_at.map(date_num),
                time_rel: None,
                rt: number(Some(cols.rt)),
                area: number(cols.area),
                ratio: number(cols.ratio),
                chain,
            }
        })
        .collect();

    let latest = peaks
        .iter()
        .filter_map(|p| p.date_num)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));
    if let Some(latest) = latest {
        for peak in &mut peaks {
            peak.time_rel = peak.date_num.map(|v| v - latest);
        }
    }

    if !unparsed.is_empty() {
        warnings.push(SchemaWarning::UnparsedTimestamps { rows: unparsed });
    }
    for warning in &warnings {
        log::warn!("{warning}");
    }
    log::info!(
        "Normalized {} peaks for {} analysis",
        peaks.len(),
        mode.display_name()
    );

    Ok(NormalizedRun {
        table: RunTable::new(peaks),
        warnings,
    })
}

/// Parse a date and a time field under [`TIMESTAMP_FORMATS`]; first match
/// wins. Four-digit-year layouts reject years below 1000 so a two-digit year
/// reaches the `%y` layout.
pub fn parse_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    let joined = format!("{} {}", date.trim(), time.trim());
    TIMESTAMP_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(&joined, fmt)
            .ok()
            .filter(|ts| !fmt.contains("%Y") || ts.year() >= 1000)
    })
}

/// Fractional days since 1970-01-01T00:00:00.
pub fn date_num(ts: NaiveDateTime) -> f64 {
    let utc = ts.and_utc();
    let seconds = utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_nanos()) * 1e-9;
    seconds / SECONDS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::CellValue;
    use chrono::NaiveDate;

    fn s(v: &str) -> CellValue {
        CellValue::String(v.to_string())
    }

    fn f(v: f64) -> CellValue {
        CellValue::Float(v)
    }

    fn raw(headers: &[&str], rows: Vec<Vec<CellValue>>) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    #[test]
    fn parses_formats_in_order() {
        let expect = |y, m, d| {
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap()
        };
        assert_eq!(parse_timestamp("01/05/2024", "10:30:00"), Some(expect(2024, 1, 5)));
        assert_eq!(parse_timestamp("01/05/24", "10:30:00"), Some(expect(2024, 1, 5)));
        assert_eq!(parse_timestamp("2024-01-05", "10:30:00"), Some(expect(2024, 1, 5)));
        // Day > 12 only fits the day-first layout.
        assert_eq!(parse_timestamp("25/12/2023", "10:30:00"), Some(expect(2023, 12, 25)));
        assert_eq!(parse_timestamp("yesterday", "10:30:00"), None);
        assert_eq!(parse_timestamp("01/05/2024", ""), None);
    }

    #[test]
    fn every_row_survives_normalization() {
        let table = raw(
            &["Identifier 1", "Date", "Time", "Rt", "Area All", "d 2H/1H [permil]", "Component"],
            vec![
                vec![
                    s("A"),
                    s("01/05/2024"),
                    s("10:00:00"),
                    f(500.0),
                    f(3.0),
                    f(-150.0),
                    s("C18"),
                ],
                vec![
                    s("A"),
                    s("garbage"),
                    s("10:00:00"),
                    f(510.0),
                    CellValue::Null,
                    CellValue::Null,
                    s("Unknown"),
                ],
                vec![
                    s("B"),
                    s("01/05/2024"),
                    s("11:00:00"),
                    CellValue::Integer(600),
                    f(2.0),
                    f(-140.0),
                    CellValue::Null,
                ],
            ],
        );
        let run = normalize(&table, IsotopeMode::Deuterium).unwrap();
        assert_eq!(run.table.len(), 3);
        for peak in &run.table.peaks {
            assert_eq!(peak.acquired_at.is_some(), peak.date_num.is_some());
        }
        assert!(run.table.peaks[1].acquired_at.is_none());
        assert_eq!(run.table.peaks[0].chain, Some(ChainLength::C18));
        assert_eq!(run.table.peaks[1].chain, None);
        assert_eq!(run.table.peaks[0].ratio, Some(-150.0));
        assert_eq!(run.table.peaks[2].rt, Some(600.0));
        assert_eq!(
            run.warnings,
            vec![SchemaWarning::UnparsedTimestamps { rows: vec![1] }]
        );
    }

    #[test]
    fn time_rel_is_offset_from_last_injection() {
        let table = raw(
            &["Identifier 1", "Date", "Time", "Rt"],
            vec![
                vec![s("A"), s("01/05/2024"), s("12:00:00"), f(1.0)],
                vec![s("B"), s("01/06/2024"), s("00:00:00"), f(1.0)],
            ],
        );
        let run = normalize(&table, IsotopeMode::Carbon).unwrap();
        let rel: Vec<_> = run.table.peaks.iter().map(|p| p.time_rel.unwrap()).collect();
        assert!((rel[0] + 0.5).abs() < 1e-9);
        assert_eq!(rel[1], 0.0);
    }

    #[test]
    fn missing_optional_columns_are_warnings() {
        let table = raw(
            &["Identifier 1", "Date", "Time", "Rt", "d 2H/1H"],
            vec![vec![
                s("A"),
                s("01/05/2024"),
                s("10:00:00"),
                f(500.0),
                f(-1.0),
            ]],
        );
        // Carbon mode: the deuterium column does not count.
        let run = normalize(&table, IsotopeMode::Carbon).unwrap();
        let missing: Vec<_> = run
            .warnings
            .iter()
            .filter_map(|w| match w {
                SchemaWarning::MissingColumn { field, .. } => Some(*field),
                _ => None,
            })
            .collect();
        assert_eq!(
            missing,
            vec![CanonicalField::Ratio, CanonicalField::Area, CanonicalField::Chain]
        );
        assert_eq!(run.table.peaks[0].ratio, None);
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let table = raw(&["Identifier 1", "Date", "Time"], vec![]);
        let err = normalize(&table, IsotopeMode::Deuterium).unwrap_err();
        assert!(matches!(err, Error::MissingColumn(c) if c == "Rt"));
    }
}
