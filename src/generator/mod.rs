pub mod remote;

use std::{str::FromStr, time::Duration};

use anyhow::{bail, Context, Result};
use rand::Rng;
use serde_json::{json, Value};
use tokio::time::{self, Instant};
use tracing::{error, info};

use crate::{readings::Fields, store::ReadingStore};

pub use remote::RemoteSink;

// ---------------------------------------------------------------------------
// Field specs
// ---------------------------------------------------------------------------

/// How a synthetic value is drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRange {
    /// Uniform float in `min..=max`, rounded to `decimals` places.
    Float { min: f64, max: f64, decimals: u32 },
    /// Uniform integer in `min..=max`.
    Integer { min: i64, max: i64 },
}

/// One synthetic sensor field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    name: String,
    range: FieldRange,
}

impl FieldSpec {
    pub(crate) fn float(name: &str, min: f64, max: f64, decimals: u32) -> Self {
        Self {
            name: name.to_owned(),
            range: FieldRange::Float { min, max, decimals },
        }
    }

    pub(crate) fn integer(name: &str, min: i64, max: i64) -> Self {
        Self {
            name: name.to_owned(),
            range: FieldRange::Integer { min, max },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn range(&self) -> &FieldRange {
        &self.range
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Value {
        match self.range {
            FieldRange::Float { min, max, decimals } => {
                let scale = 10f64.powi(decimals as i32);
                let v = rng.random_range(min..=max);
                json!((v * scale).round() / scale)
            }
            FieldRange::Integer { min, max } => json!(rng.random_range(min..=max)),
        }
    }
}

/// Parses `name:min:max[:decimals]`. Without `decimals` the field is an
/// integer field and both bounds must be integers.
impl FromStr for FieldSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        let (name, min, max, decimals) = match parts.as_slice() {
            [name, min, max] => (*name, *min, *max, None),
            [name, min, max, decimals] => (*name, *min, *max, Some(*decimals)),
            _ => bail!("field spec must be 'name:min:max[:decimals]', got: {s:?}"),
        };

        if name.is_empty() {
            bail!("field spec has an empty name: {s:?}");
        }

        let spec = match decimals {
            Some(decimals) => {
                let decimals = decimals
                    .parse::<u32>()
                    .with_context(|| format!("decimals must be a small integer in {s:?}"))?;
                if decimals > 9 {
                    bail!("at most 9 decimals are supported, got {decimals} in {s:?}");
                }
                let min = min
                    .parse::<f64>()
                    .with_context(|| format!("min must be a number in {s:?}"))?;
                let max = max
                    .parse::<f64>()
                    .with_context(|| format!("max must be a number in {s:?}"))?;
                if !(min.is_finite() && max.is_finite() && min <= max) {
                    bail!("field range must satisfy min <= max in {s:?}");
                }
                Self::float(name, min, max, decimals)
            }
            None => {
                let min = min
                    .parse::<i64>()
                    .with_context(|| format!("min must be an integer in {s:?}"))?;
                let max = max
                    .parse::<i64>()
                    .with_context(|| format!("max must be an integer in {s:?}"))?;
                if min > max {
                    bail!("field range must satisfy min <= max in {s:?}");
                }
                Self::integer(name, min, max)
            }
        };

        Ok(spec)
    }
}

/// The environmental station's sensor set: gases, particulates, UV,
/// temperature, humidity and noise.
pub fn default_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::float("co", 0.1, 5.0, 2),
        FieldSpec::float("no2", 0.05, 1.0, 2),
        FieldSpec::integer("voc", 500, 2000),
        FieldSpec::float("o3", 20.0, 100.0, 2),
        FieldSpec::integer("co2", 300, 1000),
        FieldSpec::integer("pm25", 0, 100),
        FieldSpec::integer("pm10", 0, 150),
        FieldSpec::integer("uv", 0, 12),
        FieldSpec::float("temperatura", 15.0, 35.0, 1),
        FieldSpec::float("umidade", 30.0, 90.0, 1),
        FieldSpec::float("ruido", 30.0, 100.0, 2),
    ]
}

/// Parse a comma-separated list of field specs. An empty string yields the
/// default field set.
pub fn parse_field_specs(raw: &str) -> Result<Vec<FieldSpec>> {
    let specs = raw
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|entry| entry.parse::<FieldSpec>())
        .collect::<Result<Vec<_>>>()?;

    if specs.is_empty() {
        Ok(default_fields())
    } else {
        Ok(specs)
    }
}

/// Draw one synthetic reading.
pub fn synthesize<R: Rng + ?Sized>(specs: &[FieldSpec], rng: &mut R) -> Fields {
    specs
        .iter()
        .map(|spec| (spec.name.clone(), spec.sample(rng)))
        .collect()
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Where synthetic readings go.
#[derive(Debug, Clone)]
pub enum ReadingSink {
    /// Straight into an in-process store.
    Store(ReadingStore),
    /// POSTed to a running service.
    Remote(RemoteSink),
}

impl ReadingSink {
    pub async fn submit(&self, fields: Fields) -> Result<()> {
        match self {
            Self::Store(store) => {
                store.put(fields).await?;
                Ok(())
            }
            Self::Remote(remote) => remote.submit(&fields).await,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Store(_) => "local store".to_owned(),
            Self::Remote(remote) => remote.url().to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Periodic producer of synthetic readings.
pub struct Generator {
    sink: ReadingSink,
    fields: Vec<FieldSpec>,
    interval: Duration,
}

impl Generator {
    pub fn new(sink: ReadingSink, fields: Vec<FieldSpec>, interval: Duration) -> Self {
        Self {
            sink,
            fields,
            interval,
        }
    }

    /// Produces one reading per interval, forever. The first reading is
    /// produced one full interval after start. A failed cycle is logged and
    /// the next one runs on schedule.
    /// Spawn this via `tokio::spawn`.
    pub async fn run(self) {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            fields = self.fields.len(),
            sink = %self.sink.describe(),
            "Synthetic reading generator started"
        );
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);

        loop {
            ticker.tick().await;
            match self.run_once().await {
                Ok(fields) => {
                    let reading = serde_json::Value::Object(fields);
                    info!(fields = %reading, "Synthetic reading submitted")
                }
                Err(e) => error!(error = %e, "Synthetic reading cycle failed"),
            }
        }
    }

    /// Generate and submit a single reading.
    pub async fn run_once(&self) -> Result<Fields> {
        let fields = synthesize(&self.fields, &mut rand::rng());
        self.sink
            .submit(fields.clone())
            .await
            .context("failed to submit synthetic reading")?;
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroUsize, path::PathBuf};

    use uuid::Uuid;

    use super::*;
    use crate::store::{JsonFiles, Persistence, DEFAULT_CAPACITY};

    #[test]
    fn parse_field_specs_empty_gives_defaults() {
        assert_eq!(parse_field_specs("").unwrap(), default_fields());
        assert_eq!(parse_field_specs(" , ").unwrap(), default_fields());
    }

    #[test]
    fn parse_field_specs_float_and_integer() {
        let specs = parse_field_specs("co:0.1:5.0:2, pm25:0:100").unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name(), "co");
        assert_eq!(
            specs[0].range(),
            &FieldRange::Float { min: 0.1, max: 5.0, decimals: 2 }
        );
        assert_eq!(specs[1].range(), &FieldRange::Integer { min: 0, max: 100 });
    }

    #[test]
    fn parse_field_specs_accepts_negative_bounds() {
        let specs = parse_field_specs("temp:-10:40:1").unwrap();
        assert_eq!(
            specs[0].range(),
            &FieldRange::Float { min: -10.0, max: 40.0, decimals: 1 }
        );
    }

    #[test]
    fn parse_field_specs_missing_bounds_errors() {
        let err = parse_field_specs("co:1").unwrap_err();
        assert!(err.to_string().contains("name:min:max"));
    }

    #[test]
    fn parse_field_specs_inverted_range_errors() {
        let err = parse_field_specs("co:5:1").unwrap_err();
        assert!(err.to_string().contains("min <= max"));
    }

    #[test]
    fn parse_field_specs_integer_bounds_must_be_integers() {
        let err = parse_field_specs("pm25:0.5:10").unwrap_err();
        assert!(err.to_string().contains("must be an integer"));
    }

    #[test]
    fn synthesize_respects_ranges_and_rounding() {
        let specs = default_fields();
        let mut rng = rand::rng();

        for _ in 0..200 {
            let fields = synthesize(&specs, &mut rng);
            assert_eq!(fields.len(), specs.len());

            for spec in &specs {
                let value = &fields[spec.name()];
                match *spec.range() {
                    FieldRange::Float { min, max, decimals } => {
                        let v = value.as_f64().unwrap();
                        assert!(v >= min && v <= max, "{} = {v}", spec.name());
                        let scaled = v * 10f64.powi(decimals as i32);
                        assert!((scaled - scaled.round()).abs() < 1e-6);
                    }
                    FieldRange::Integer { min, max } => {
                        let v = value.as_i64().unwrap();
                        assert!((min..=max).contains(&v), "{} = {v}", spec.name());
                    }
                }
            }
        }
    }

    #[test]
    fn synthesize_keeps_spec_order() {
        let specs = default_fields();
        let fields = synthesize(&specs, &mut rand::rng());
        let names: Vec<&str> = fields.keys().map(String::as_str).collect();
        let expected: Vec<&str> = specs.iter().map(FieldSpec::name).collect();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn run_once_feeds_the_store() {
        let store = ReadingStore::in_memory(DEFAULT_CAPACITY);
        let generator = Generator::new(
            ReadingSink::Store(store.clone()),
            default_fields(),
            Duration::from_secs(10),
        );

        let produced = generator.run_once().await.unwrap();

        let current = store.current().await.unwrap();
        assert_eq!(current.fields(), &produced);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_produces_one_reading_per_interval() {
        let store = ReadingStore::in_memory(NonZeroUsize::new(5).unwrap());
        let generator = Generator::new(
            ReadingSink::Store(store.clone()),
            default_fields(),
            Duration::from_secs(10),
        );
        let task = tokio::spawn(generator.run());

        // Nothing before the first full interval.
        time::sleep(Duration::from_secs(9)).await;
        assert!(store.is_empty().await);

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.len().await, 1);

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.len().await, 4);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn run_keeps_going_after_a_failed_cycle() {
        let dir: PathBuf =
            std::env::temp_dir().join(format!("air-station-generator-{}", Uuid::new_v4()));
        let store = ReadingStore::open(
            DEFAULT_CAPACITY,
            Persistence::JsonFiles(JsonFiles::new(&dir)),
        )
        .await
        .unwrap();
        tokio::fs::remove_dir_all(&dir).await.unwrap();

        let generator = Generator::new(
            ReadingSink::Store(store.clone()),
            default_fields(),
            Duration::from_secs(10),
        );
        let task = tokio::spawn(generator.run());

        // First tick fails: the data directory is gone.
        time::sleep(Duration::from_secs(11)).await;
        assert!(store.is_empty().await);
        assert!(!task.is_finished());

        tokio::fs::create_dir_all(&dir).await.unwrap();

        // Following ticks land on schedule.
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.len().await, 1);
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.len().await, 2);

        task.abort();
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn failing_cycle_reports_error() {
        let dir: PathBuf =
            std::env::temp_dir().join(format!("air-station-generator-{}", Uuid::new_v4()));
        let store = ReadingStore::open(
            DEFAULT_CAPACITY,
            Persistence::JsonFiles(JsonFiles::new(&dir)),
        )
        .await
        .unwrap();
        tokio::fs::remove_dir_all(&dir).await.unwrap();

        let generator = Generator::new(
            ReadingSink::Store(store.clone()),
            default_fields(),
            Duration::from_secs(10),
        );

        let err = generator.run_once().await.unwrap_err();
        assert!(err.to_string().contains("failed to submit synthetic reading"));
        assert!(err
            .chain()
            .any(|cause| cause.to_string().contains("storage fault")));
        assert!(store.is_empty().await);
    }
}
