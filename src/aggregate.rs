//! Per-country temperature aggregation.
//!
//! Raw per-country temperature tables are monthly readings — individually
//! poor embedding material. Before per-row normalization, rows are grouped
//! by country and replaced with three synthetic narrative records per
//! country: an overall summary, a long-term trend comparison, and a
//! recent-decade comparison. These narratives are the richest text the
//! embedder sees and dominate answer quality for temperature questions.

use chrono::NaiveDate;

use crate::models::{FieldValue, Record};

/// At most this many distinct countries are aggregated, in order of first
/// appearance.
const MAX_COUNTRIES: usize = 50;
/// Minimum rows a country needs before a trend narrative is derived.
const TREND_MIN_ROWS: usize = 20;
/// Absolute mean change (°C) below which the trend reads as stable.
const TREND_STABLE_BAND: f64 = 0.5;
/// The recent window is the last ten years of the series.
const RECENT_WINDOW_DAYS: i64 = 365 * 10;

/// True when the rows look like a per-country temperature table.
pub fn is_country_temperature_schema(records: &[Record]) -> bool {
    records.iter().any(|r| {
        r.contains_key("Country") && r.contains_key("AverageTemperature") && r.contains_key("dt")
    })
}

struct Reading {
    date: NaiveDate,
    temperature: f64,
}

/// Expand per-country temperature rows into synthetic narrative records.
///
/// Rows with a missing temperature or an unparseable `dt` date are dropped.
/// For each of the first [`MAX_COUNTRIES`] distinct countries this produces
/// up to three records carrying `text`, `Country`, `AverageTemperature`,
/// and `data_type` (`temperature` / `trend` / `recent`).
pub fn expand_country_records(records: &[Record]) -> Vec<Record> {
    let mut order: Vec<String> = Vec::new();
    let mut by_country: std::collections::HashMap<String, Vec<Reading>> =
        std::collections::HashMap::new();

    for record in records {
        let Some(country) = record.get("Country").and_then(|v| v.as_str()) else {
            continue;
        };
        let Some(temperature) = record
            .get("AverageTemperature")
            .filter(|v| !v.is_missing())
            .and_then(|v| v.as_f64())
        else {
            continue;
        };
        let Some(date) = record
            .get("dt")
            .and_then(|v| v.as_str())
            .and_then(parse_date)
        else {
            continue;
        };

        if !by_country.contains_key(country) {
            if order.len() >= MAX_COUNTRIES {
                continue;
            }
            order.push(country.to_string());
        }
        by_country
            .entry(country.to_string())
            .or_default()
            .push(Reading { date, temperature });
    }

    let mut out = Vec::new();
    for country in &order {
        let mut readings = match by_country.remove(country) {
            Some(r) if !r.is_empty() => r,
            _ => continue,
        };
        readings.sort_by_key(|r| r.date);
        out.extend(narratives_for_country(country, &readings));
    }
    out
}

fn narratives_for_country(country: &str, readings: &[Reading]) -> Vec<Record> {
    let mut records = Vec::new();

    let temps: Vec<f64> = readings.iter().map(|r| r.temperature).collect();
    let avg = mean(&temps);
    let min = temps.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = temps.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let date_min = readings[0].date;
    let date_max = readings[readings.len() - 1].date;
    let years_span = (date_max - date_min).num_days() as f64 / 365.25;

    let summary = format!(
        "Climate and temperature data for {country}: The average temperature is {avg:.2}°C, \
         with a range from {min:.2}°C to {max:.2}°C. Historical data spans from {} to {}, \
         covering approximately {years_span:.1} years.",
        date_min.format("%Y-%m-%d"),
        date_max.format("%Y-%m-%d"),
    );
    records.push(narrative_record(country, avg, summary, "temperature"));

    if readings.len() > TREND_MIN_ROWS {
        let split = readings.len() / 3;
        let early = &readings[..split];
        let late = &readings[readings.len() - split..];
        let early_avg = mean(&early.iter().map(|r| r.temperature).collect::<Vec<_>>());
        let late_avg = mean(&late.iter().map(|r| r.temperature).collect::<Vec<_>>());
        let change = late_avg - early_avg;

        let trend = if change.abs() < TREND_STABLE_BAND {
            format!(
                "Temperature trend analysis for {country}: Temperatures have remained relatively \
                 stable, with an average change of {change:.2}°C between the early period \
                 (average {early_avg:.2}°C) and late period (average {late_avg:.2}°C)."
            )
        } else {
            let direction = if change > 0.0 { "increased" } else { "decreased" };
            format!(
                "Temperature trend analysis for {country}: Temperatures have {direction} by \
                 {:.2}°C over the recorded period, from an early average of {early_avg:.2}°C to \
                 a later average of {late_avg:.2}°C. This change occurred between {} and {}.",
                change.abs(),
                early[0].date.format("%Y"),
                late[late.len() - 1].date.format("%Y"),
            )
        };
        records.push(narrative_record(country, late_avg, trend, "trend"));
    }

    let cutoff = date_max - chrono::Duration::days(RECENT_WINDOW_DAYS);
    let recent: Vec<f64> = readings
        .iter()
        .filter(|r| r.date >= cutoff)
        .map(|r| r.temperature)
        .collect();
    if !recent.is_empty() {
        let recent_avg = mean(&recent);
        let mut text = format!(
            "Recent temperature data for {country} (last 10 years): The average temperature \
             was {recent_avg:.2}°C."
        );
        if recent_avg > avg {
            text.push_str(&format!(
                " This is {:.2}°C warmer than the historical average of {avg:.2}°C.",
                recent_avg - avg
            ));
        } else if recent_avg < avg {
            text.push_str(&format!(
                " This is {:.2}°C cooler than the historical average of {avg:.2}°C.",
                avg - recent_avg
            ));
        }
        records.push(narrative_record(country, recent_avg, text, "recent"));
    }

    records
}

fn narrative_record(country: &str, temperature: f64, text: String, data_type: &str) -> Record {
    let mut record = Record::new();
    record.insert("Country".to_string(), FieldValue::Str(country.to_string()));
    record.insert("AverageTemperature".to_string(), FieldValue::Num(temperature));
    record.insert("text".to_string(), FieldValue::Str(text));
    record.insert("data_type".to_string(), FieldValue::Str(data_type.to_string()));
    record
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d"))
        .ok()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(country: &str, date: &str, temp: Option<f64>) -> Record {
        let mut r = Record::new();
        r.insert("Country".to_string(), FieldValue::Str(country.to_string()));
        r.insert("dt".to_string(), FieldValue::Str(date.to_string()));
        r.insert(
            "AverageTemperature".to_string(),
            temp.map(FieldValue::Num).unwrap_or(FieldValue::Null),
        );
        r
    }

    /// Monthly series with a linear warming ramp across `years` years.
    fn warming_series(country: &str, start_year: i32, years: i32, base: f64, ramp: f64) -> Vec<Record> {
        let mut rows = Vec::new();
        for y in 0..years {
            for m in 1..=12 {
                let date = format!("{:04}-{:02}-01", start_year + y, m);
                let temp = base + ramp * y as f64;
                rows.push(row(country, &date, Some(temp)));
            }
        }
        rows
    }

    #[test]
    fn schema_detection() {
        assert!(is_country_temperature_schema(&[row("France", "1900-01-01", Some(1.0))]));
        let mut other = Record::new();
        other.insert("Headline".to_string(), FieldValue::Str("x".to_string()));
        assert!(!is_country_temperature_schema(&[other]));
    }

    #[test]
    fn summary_record_covers_span_and_range() {
        let rows = vec![
            row("France", "1900-01-01", Some(10.0)),
            row("France", "1950-01-01", Some(12.0)),
            row("France", "2000-01-01", Some(14.0)),
        ];
        let out = expand_country_records(&rows);
        let summary = out
            .iter()
            .find(|r| r.get("data_type").and_then(|v| v.as_str()) == Some("temperature"))
            .expect("summary record");
        let text = summary.get("text").and_then(|v| v.as_str()).unwrap();
        assert!(text.contains("Climate and temperature data for France"));
        assert!(text.contains("12.00°C"));
        assert!(text.contains("from 10.00°C to 14.00°C"));
        assert!(text.contains("1900-01-01"));
        assert!(text.contains("2000-01-01"));
        assert!(text.contains("100.0 years"));
    }

    #[test]
    fn short_series_has_no_trend_record() {
        let rows = vec![
            row("France", "1900-01-01", Some(10.0)),
            row("France", "1950-01-01", Some(12.0)),
        ];
        let out = expand_country_records(&rows);
        assert!(out
            .iter()
            .all(|r| r.get("data_type").and_then(|v| v.as_str()) != Some("trend")));
    }

    #[test]
    fn warming_series_reads_increased() {
        let rows = warming_series("France", 1950, 30, 10.0, 0.1); // +2.9°C total
        let out = expand_country_records(&rows);
        let trend = out
            .iter()
            .find(|r| r.get("data_type").and_then(|v| v.as_str()) == Some("trend"))
            .expect("trend record");
        let text = trend.get("text").and_then(|v| v.as_str()).unwrap();
        assert!(text.contains("have increased by"), "got: {text}");
        assert!(text.contains("1950") || text.contains("1959"));
    }

    #[test]
    fn flat_series_reads_stable() {
        let rows = warming_series("France", 1950, 30, 10.0, 0.0);
        let out = expand_country_records(&rows);
        let trend = out
            .iter()
            .find(|r| r.get("data_type").and_then(|v| v.as_str()) == Some("trend"))
            .expect("trend record");
        let text = trend.get("text").and_then(|v| v.as_str()).unwrap();
        assert!(text.contains("remained relatively stable"), "got: {text}");
    }

    #[test]
    fn recent_window_reads_warmer_for_warming_series() {
        let rows = warming_series("France", 1950, 30, 10.0, 0.1);
        let out = expand_country_records(&rows);
        let recent = out
            .iter()
            .find(|r| r.get("data_type").and_then(|v| v.as_str()) == Some("recent"))
            .expect("recent record");
        let text = recent.get("text").and_then(|v| v.as_str()).unwrap();
        assert!(text.contains("last 10 years"));
        assert!(text.contains("warmer than the historical average"), "got: {text}");
    }

    #[test]
    fn rows_with_missing_temperature_or_bad_dates_are_dropped() {
        let rows = vec![
            row("France", "1900-01-01", Some(10.0)),
            row("France", "not-a-date", Some(99.0)),
            row("France", "1950-01-01", None),
        ];
        let out = expand_country_records(&rows);
        let summary = &out[0];
        let text = summary.get("text").and_then(|v| v.as_str()).unwrap();
        // Only the single valid reading contributes.
        assert!(text.contains("10.00°C"));
        assert!(!text.contains("99.00"));
    }

    #[test]
    fn country_cap_preserves_first_seen_order() {
        let mut rows = Vec::new();
        for i in 0..60 {
            rows.push(row(&format!("Country{i:02}"), "2000-01-01", Some(10.0)));
        }
        let out = expand_country_records(&rows);
        let countries: Vec<&str> = out
            .iter()
            .filter(|r| r.get("data_type").and_then(|v| v.as_str()) == Some("temperature"))
            .map(|r| r.get("Country").and_then(|v| v.as_str()).unwrap())
            .collect();
        assert_eq!(countries.len(), 50);
        assert_eq!(countries[0], "Country00");
        assert_eq!(countries[49], "Country49");
    }

    #[test]
    fn month_precision_dates_parse() {
        assert!(parse_date("1743-11").is_some());
        assert!(parse_date("1743-11-01").is_some());
        assert!(parse_date("garbage").is_none());
    }
}
