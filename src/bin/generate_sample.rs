use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use clap::Parser;
use parquet::arrow::ArrowWriter;

use irms_sort::data::model::{ChainLength, IsotopeMode};

/// Typical retention times (s) on a 30 m DB-5 column.
const RETENTION: [(ChainLength, f64); 9] = [
    (ChainLength::C16, 450.0),
    (ChainLength::C18, 500.0),
    (ChainLength::C20, 545.0),
    (ChainLength::C22, 588.0),
    (ChainLength::C24, 628.0),
    (ChainLength::C26, 666.0),
    (ChainLength::C28, 702.0),
    (ChainLength::C30, 736.0),
    (ChainLength::C32, 768.0),
];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Write a synthetic GC-IRMS run export for trying out irms-sort
#[derive(Parser)]
#[command(name = "generate_sample")]
struct Args {
    /// Output file (.csv or .parquet)
    #[arg(default_value = "sample_run.csv")]
    output: PathBuf,

    /// Isotope column to emit (dD or dC)
    #[arg(short, long, default_value = "dD", value_parser = |s: &str| s.parse::<IsotopeMode>())]
    isotope: IsotopeMode,

    /// Number of sample injections
    #[arg(short, long, default_value = "6")]
    samples: usize,

    #[arg(long, default_value = "42")]
    seed: u64,
}

struct Row {
    identifier: String,
    at: NaiveDateTime,
    rt: f64,
    area: f64,
    ratio: f64,
    component: String,
}

fn injection(
    rows: &mut Vec<Row>,
    rng: &mut SimpleRng,
    identifier: &str,
    at: NaiveDateTime,
    chains: &[ChainLength],
    area_scale: f64,
    labelled: bool,
) {
    for &chain in chains {
        let (_, rt) = RETENTION.iter().find(|(c, _)| *c == chain).copied().unwrap_or((chain, 0.0));
        rows.push(Row {
            identifier: identifier.to_string(),
            at,
            rt: rng.gauss(rt, 0.4),
            area: (rng.gauss(20.0, 6.0) * area_scale).max(0.5),
            ratio: rng.gauss(-180.0 + chain.carbons() as f64, 2.0),
            component: if labelled { chain.to_string() } else { String::new() },
        });
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);

    let mut at = NaiveDate::from_ymd_opt(2024, 1, 5)
        .and_then(|d| d.and_hms_opt(8, 0, 0))
        .context("invalid start time")?;
    let step = Duration::minutes(55);
    let drift = [ChainLength::C18, ChainLength::C24];
    let linearity = [ChainLength::C20, ChainLength::C28];

    let mut rows = Vec::new();
    for i in 0..3 {
        rows.push(Row {
            identifier: "H3+ factor".into(),
            at,
            rt: rng.gauss(60.0, 1.0),
            area: 5.0 + i as f64,
            ratio: 0.0,
            component: String::new(),
        });
        at += step;
    }
    for _ in 0..2 {
        injection(&mut rows, &mut rng, "C18/C24 drift std", at, &drift, 1.0, true);
        at += step;
    }
    for scale in [0.25, 0.5, 1.0, 2.0] {
        injection(&mut rows, &mut rng, "C20 C28 linearity", at, &linearity, scale, true);
        at += step;
    }
    for s in 0..args.samples {
        let id = format!("Core {} {}cm", s / 3 + 1, (s % 3) * 4 + 2);
        let chains: Vec<ChainLength> = ChainLength::ALL
            .into_iter()
            .filter(|c| c.carbons() >= 22 || rng.next_f64() < 0.5)
            .collect();
        injection(&mut rows, &mut rng, &id, at, &chains, 1.0, false);
        // Every other sample gets a co-eluting peak next to C26.
        if s % 2 == 1 {
            rows.push(Row {
                identifier: id.clone(),
                at,
                rt: 666.0 + rng.gauss(0.0, 0.05),
                area: 3.0,
                ratio: -120.0,
                component: String::new(),
            });
        }
        at += step;
        if s % 3 == 2 {
            injection(&mut rows, &mut rng, "C18/C24 drift std", at, &drift, 1.0, true);
            at += step;
        }
    }

    let ratio_header = match args.isotope {
        IsotopeMode::Deuterium => "d 2H/1H",
        IsotopeMode::Carbon => "d 13C/12C",
    };
    let headers = ["Identifier 1", "Date", "Time", "Rt", "Area All", ratio_header, "Component"];

    let ext = args
        .output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "csv" => write_csv(&args.output, &headers, &rows)?,
        "parquet" | "pq" => write_parquet(&args.output, &headers, &rows)?,
        other => bail!("Unsupported output extension: .{other}"),
    }

    println!("Wrote {} peaks to {}", rows.len(), args.output.display());
    Ok(())
}

fn write_csv(path: &Path, headers: &[&str], rows: &[Row]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    writer.write_record(headers)?;
    for r in rows {
        writer.write_record([
            r.identifier.clone(),
            r.at.format("%m/%d/%Y").to_string(),
            r.at.format("%H:%M:%S").to_string(),
            format!("{:.1}", r.rt),
            format!("{:.3}", r.area),
            format!("{:.2}", r.ratio),
            r.component.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &Path, headers: &[&str], rows: &[Row]) -> Result<()> {
    let text = |f: &dyn Fn(&Row) -> String| -> ArrayRef {
        Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>()))
    };
    let number = |f: &dyn Fn(&Row) -> f64| -> ArrayRef {
        Arc::new(Float64Array::from(rows.iter().map(f).collect::<Vec<_>>()))
    };
    let columns = vec![
        text(&|r| r.identifier.clone()),
        text(&|r| r.at.format("%m/%d/%Y").to_string()),
        text(&|r| r.at.format("%H:%M:%S").to_string()),
        number(&|r| r.rt),
        number(&|r| r.area),
        number(&|r| r.ratio),
        text(&|r| r.component.clone()),
    ];
    let fields: Vec<Field> = headers
        .iter()
        .zip(&columns)
        .map(|(h, c)| Field::new(*h, c.data_type().clone(), false))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;
    let file = std::fs::File::create(path).context("creating output file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}
