use bench_core::Rng;
use store_api::{Record, Value};

// ═══════════════════════════════════════════════════════════════
//  Regions
// ═══════════════════════════════════════════════════════════════

pub const REGIONS: &[&str] = &[
    "10", "11", "12", "13", "14", "15", "16", "17", "18", "19", "20", "21", "22", "23", "24", "25", "26", "27", "28",
    "29", "30", "31", "32", "33", "34", "35", "36", "37", "38", "39", "40", "41", "42", "43", "44", "45", "46", "47",
    "48", "49", "50", ".7", "90", "C3", "g6", "H9", "L1", "l2", "n4", "O5", "q8",
];

const CATEGORIES: &[&str] = &["Hotels & Motels", "Bed & Breakfast", "Resorts", "Hostels"];
const LOCALITIES: &[&str] = &["New York", "Boston", "Chicago", "San Francisco", "Seattle", "Austin"];
const STREETS: &[&str] = &["Main St", "Broadway", "Park Ave", "Elm St", "Ocean Dr", "Lake Shore Dr"];

// ═══════════════════════════════════════════════════════════════
//  Synthetic hotels
// ═══════════════════════════════════════════════════════════════

/// Запись отеля с тем же набором полей, что даёт CSV-загрузчик.
pub fn synthetic_hotel(i: u64, rng: &mut Rng) -> Record {
    let region = REGIONS[(i % REGIONS.len() as u64) as usize];
    let lowest = 40 + rng.next_below(160) as i64;
    let highest = lowest + 20 + rng.next_below(400) as i64;
    let street = STREETS[rng.next_intn(STREETS.len())];
    Record::new()
        .with("name", format!("Hotel {i}"))
        .with("category", CATEGORIES[rng.next_intn(CATEGORIES.len())])
        .with("lowest_price", lowest)
        .with("highest_price", highest)
        .with("ratings", (rng.next_f64() * 50.0).round() / 10.0)
        .with("status", "open")
        .with("stars", 1 + rng.next_below(5) as i64)
        .with("tel", phone(rng))
        .with("region", region)
        .with("locality", LOCALITIES[rng.next_intn(LOCALITIES.len())])
        .with("postcode", format!("{:05}", rng.next_below(100_000)))
        .with("longitude", -124.0 + rng.next_f64() * 57.0)
        .with("latitude", 25.0 + rng.next_f64() * 24.0)
        .with("address", format!("{} {street}", 1 + rng.next_below(999)))
}

fn phone(rng: &mut Rng) -> String {
    format!(
        "({:03}) {:03}-{:04}",
        200 + rng.next_below(800),
        rng.next_below(1000),
        rng.next_below(10_000)
    )
}

// ═══════════════════════════════════════════════════════════════
//  Input rows
// ═══════════════════════════════════════════════════════════════

pub const CSV_COLUMNS: usize = 15;

/// Одна принятая строка CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct HotelRow {
    pub factual_id: String,
    pub region: String,
    pub record: Record,
}

impl HotelRow {
    /// Копия для `repeats`: регион получает суффикс `j`.
    pub fn repeat(&self, j: usize) -> (String, Record) {
        let mut record = self.record.clone();
        record.insert("region", format!("{}{j}", self.region));
        (format!("{}{j}", self.factual_id), record)
    }
}

/// `factual_id,name,category,lowest_price,highest_price,ratings,status,
/// stars,tel,region,locality,postcode,longitude,latitude,address`
pub fn parse_csv_line(line: &str) -> Result<HotelRow, String> {
    let cols: Vec<&str> = line.split(',').map(str::trim).collect();
    if cols.len() < CSV_COLUMNS {
        return Err(format!("expected {CSV_COLUMNS} columns, got {}", cols.len()));
    }
    let int = |idx: usize, name: &str| -> Result<i64, String> {
        cols[idx].parse::<i64>().map_err(|e| format!("{name} '{}': {e}", cols[idx]))
    };
    let float = |idx: usize, name: &str| -> Result<f64, String> {
        cols[idx].parse::<f64>().map_err(|e| format!("{name} '{}': {e}", cols[idx]))
    };

    let region = cols[9].to_string();
    let record = Record::new()
        .with("name", cols[1])
        .with("category", cols[2])
        .with("lowest_price", int(3, "lowest_price")?)
        .with("highest_price", int(4, "highest_price")?)
        .with("ratings", float(5, "ratings")?)
        .with("status", cols[6])
        .with("stars", int(7, "stars")?)
        .with("tel", cols[8])
        .with("region", region.as_str())
        .with("locality", cols[10])
        .with("postcode", cols[11])
        .with("longitude", float(12, "longitude")?)
        .with("latitude", float(13, "latitude")?)
        .with("address", cols[14]);

    Ok(HotelRow { factual_id: cols[0].to_string(), region, record })
}

/// `{"key": "...", <fields>}`: ключ вынимается, остальное становится записью.
pub fn parse_json_line(line: &str) -> Result<(String, Record), String> {
    let obj: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(line).map_err(|e| format!("bad json: {e}"))?;
    let mut key = None;
    let mut record = Record::new();
    for (name, raw) in obj {
        if name == "key" {
            key = Some(match raw {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                other => return Err(format!("key must be a string or number, got {other}")),
            });
            continue;
        }
        let value = Value::from_json(raw).map_err(|e| format!("field '{name}': {e}"))?;
        record.insert(name, value);
    }
    let key = key.ok_or_else(|| "missing 'key'".to_string())?;
    Ok((key, record))
}
