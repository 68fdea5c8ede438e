use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use moves_dashboard::data::model::{City, Direction, Factor, YEAR_DOMAIN};
use parquet::arrow::ArrowWriter;
use serde_json::{Map, Value as JsonValue};

/// (code, name, lat, lon, population 2016, average price 2016)
const MUNICIPALITIES: [(&str, &str, f64, f64, f64, f64); 18] = [
    ("GM0034", "Almere", 52.37, 5.22, 199_000.0, 215_000.0),
    ("GM0363", "Amsterdam", 52.37, 4.90, 844_000.0, 339_000.0),
    ("GM0758", "Breda", 51.59, 4.78, 183_000.0, 242_000.0),
    ("GM0518", "'s-Gravenhage", 52.08, 4.30, 520_000.0, 229_000.0),
    ("GM0772", "Eindhoven", 51.44, 5.47, 226_000.0, 228_000.0),
    ("GM0014", "Groningen", 53.22, 6.57, 200_000.0, 183_000.0),
    ("GM0268", "Nijmegen", 51.84, 5.86, 173_000.0, 215_000.0),
    ("GM0599", "Rotterdam", 51.92, 4.48, 630_000.0, 180_000.0),
    ("GM0855", "Tilburg", 51.56, 5.09, 212_000.0, 205_000.0),
    ("GM0344", "Utrecht", 52.09, 5.12, 339_000.0, 285_000.0),
    ("GM0307", "Amersfoort", 52.16, 5.39, 154_000.0, 259_000.0),
    ("GM0392", "Haarlem", 52.38, 4.64, 159_000.0, 296_000.0),
    ("GM0546", "Leiden", 52.16, 4.49, 123_000.0, 247_000.0),
    ("GM0503", "Delft", 52.01, 4.36, 102_000.0, 227_000.0),
    ("GM0202", "Arnhem", 51.99, 5.91, 153_000.0, 196_000.0),
    ("GM0153", "Enschede", 52.22, 6.89, 158_000.0, 170_000.0),
    ("GM0193", "Zwolle", 52.52, 6.08, 126_000.0, 225_000.0),
    ("GM0935", "Maastricht", 50.85, 5.69, 122_000.0, 225_000.0),
];

/// Index into [`MUNICIPALITIES`] of each subject city.
fn subject_index(city: City) -> usize {
    match city {
        City::Almere => 0,
        City::Amsterdam => 1,
        City::Breda => 2,
        City::DenHaag => 3,
        City::Eindhoven => 4,
        City::Groningen => 5,
        City::Nijmegen => 6,
        City::Rotterdam => 7,
        City::Tilburg => 8,
        City::Utrecht => 9,
    }
}

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

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

/// Factor values of one municipality in one year.
#[derive(Clone, Copy)]
struct Measures {
    availability: Option<f64>,
    prices: f64,
    population: f64,
}

fn measures(index: usize, year: u16, rng: &mut SimpleRng) -> Measures {
    let (_, _, _, _, population, price) = MUNICIPALITIES[index];
    let age = f64::from(year - YEAR_DOMAIN[0]);
    // Availability was not published for every municipality in 2016.
    let availability = if year == YEAR_DOMAIN[0] && rng.next_f64() < 0.2 {
        None
    } else {
        Some((rng.uniform(0.5, 4.0) * 10.0).round() / 10.0)
    };
    Measures {
        availability,
        prices: (price * 1.07f64.powf(age) * rng.uniform(0.98, 1.02)).round(),
        population: (population * 1.008f64.powf(age)).round(),
    }
}

fn distance(a: usize, b: usize) -> f64 {
    let (_, _, lat_a, lon_a, _, _) = MUNICIPALITIES[a];
    let (_, _, lat_b, lon_b, _, _) = MUNICIPALITIES[b];
    ((lat_a - lat_b).powi(2) + (lon_a - lon_b).powi(2)).sqrt()
}

fn build_batch(city: City, rng: &mut SimpleRng) -> Result<RecordBatch> {
    let subject = subject_index(city);

    let mut codes = Vec::new();
    let mut names = Vec::new();
    let mut years = Vec::new();
    let mut moves = Vec::new();
    let mut factor_other: [Vec<Option<f64>>; 3] = Default::default();
    let mut factor_subject: [Vec<Option<f64>>; 3] = Default::default();

    for year in YEAR_DOMAIN {
        let subject_measures = measures(subject, year, rng);
        for (i, (code, name, ..)) in MUNICIPALITIES.iter().enumerate() {
            if i == subject {
                continue;
            }
            let other = measures(i, year, rng);
            let gravity = 2_000.0 / (1.0 + 8.0 * distance(subject, i));

            codes.push(*code);
            names.push(*name);
            years.push(i64::from(year));
            moves.push((gravity * rng.uniform(0.7, 1.3)).round());

            for (slot, m) in [(&mut factor_other, other), (&mut factor_subject, subject_measures)] {
                slot[0].push(m.availability);
                slot[1].push(Some(m.prices));
                slot[2].push(Some(m.population));
            }
        }
    }

    let mut fields = vec![
        Field::new("gemeente_code", DataType::Utf8, false),
        Field::new("gemeente_naam", DataType::Utf8, false),
        Field::new("year", DataType::Int64, false),
        Field::new("moves", DataType::Float64, false),
    ];
    let mut columns: Vec<Arc<dyn arrow::array::Array>> = vec![
        Arc::new(StringArray::from(codes)),
        Arc::new(StringArray::from(names)),
        Arc::new(Int64Array::from(years)),
        Arc::new(Float64Array::from(moves)),
    ];
    for (i, factor) in Factor::ALL.into_iter().enumerate() {
        fields.push(Field::new(factor.column(), DataType::Float64, true));
        fields.push(Field::new(factor.subject_column(), DataType::Float64, true));
        columns.push(Arc::new(Float64Array::from(std::mem::take(&mut factor_other[i]))));
        columns.push(Arc::new(Float64Array::from(std::mem::take(&mut factor_subject[i]))));
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).context("building record batch")
}

fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

/// A small square around each municipality centre.
fn boundaries() -> GeoJson {
    const HALF: f64 = 0.06;
    let features = MUNICIPALITIES
        .iter()
        .map(|&(code, name, lat, lon, ..)| {
            let ring = vec![
                vec![lon - HALF, lat - HALF],
                vec![lon + HALF, lat - HALF],
                vec![lon + HALF, lat + HALF],
                vec![lon - HALF, lat + HALF],
                vec![lon - HALF, lat - HALF],
            ];
            let mut properties = Map::new();
            properties.insert("statcode".into(), JsonValue::from(code));
            properties.insert("statnaam".into(), JsonValue::from(name));
            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Polygon(vec![ring]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args_os().skip(1);
    let data_dir = args.next().map_or_else(|| PathBuf::from("QueryDFs"), PathBuf::from);
    let geojson_path = args.next().map_or_else(|| PathBuf::from("new.geojson"), PathBuf::from);

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let mut written = 0;
    for direction in Direction::ALL {
        for city in City::ALL {
            let batch = build_batch(city, &mut rng)?;
            let path = data_dir.join(format!("{direction}_{city}.parquet"));
            write_parquet(&path, &batch)?;
            log::debug!("Wrote {} rows to {}", batch.num_rows(), path.display());

            if written == 0 {
                let preview = batch.slice(0, batch.num_rows().min(5));
                log::info!("Preview of {}:\n{}", path.display(), pretty_format_batches(&[preview])?);
            }
            written += 1;
        }
    }

    let geojson = serde_json::to_string(&boundaries()).context("serializing boundaries")?;
    std::fs::write(&geojson_path, geojson)
        .with_context(|| format!("writing {}", geojson_path.display()))?;

    println!(
        "Wrote {written} datasets to {} and {} boundaries to {}",
        data_dir.display(),
        MUNICIPALITIES.len(),
        geojson_path.display()
    );
    Ok(())
}
