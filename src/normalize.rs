//! Record normalization: heterogeneous dataset rows → descriptive text +
//! metadata.
//!
//! Climate datasets share no common schema. A row may carry a ready-made
//! narrative, a news headline with sentiment annotations, or bare
//! temperature columns. Text synthesis is a prioritized chain of
//! [`TextExtractor`] strategies, tried in order until one produces text;
//! new record shapes slot in as new extractors rather than deeper
//! conditionals.
//!
//! The same module derives `lesson_id` scoping keys when the dataset has no
//! explicit lesson column, using field-based heuristics (country, date,
//! headline).

use crate::models::{FieldValue, Metadata, Record, DEFAULT_DATASET, DEFAULT_PERSON};

/// Field holding pre-aggregated narrative text (produced by the
/// per-country aggregation pass).
pub const NARRATIVE_FIELD: &str = "text";

/// Schema hints for one dataset, as configured by the caller.
#[derive(Debug, Clone)]
pub struct DatasetOptions {
    pub dataset_name: String,
    pub text_field: String,
    pub lesson_id_field: Option<String>,
    pub person_id_field: Option<String>,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            dataset_name: DEFAULT_DATASET.to_string(),
            text_field: NARRATIVE_FIELD.to_string(),
            lesson_id_field: None,
            person_id_field: None,
        }
    }
}

/// A strategy that can produce embeddable text from some record shapes.
trait TextExtractor {
    fn extract(&self, record: &Record) -> Option<String>;
}

/// Pre-aggregated narrative rows: use the `text` field verbatim.
struct NarrativeExtractor;

impl TextExtractor for NarrativeExtractor {
    fn extract(&self, record: &Record) -> Option<String> {
        field_text(record, NARRATIVE_FIELD)
    }
}

/// News-style rows: headline, content, sentiment, justification.
struct HeadlineExtractor;

impl TextExtractor for HeadlineExtractor {
    fn extract(&self, record: &Record) -> Option<String> {
        let headline = field_text(record, "Headline");
        let content = field_text(record, "Content");
        if headline.is_none() && content.is_none() {
            return None;
        }

        let mut parts = Vec::new();
        if let Some(ref h) = headline {
            parts.push(format!("Climate news headline: {}", h));
        }
        // Content is the main text; fall back to the headline alone.
        if let Some(c) = content {
            parts.push(c);
        } else if let Some(h) = headline {
            parts.push(h);
        }
        if let Some(s) = field_text(record, "Sentiment") {
            parts.push(format!("Sentiment analysis: {}", s));
        }
        if let Some(j) = field_text(record, "Justification") {
            parts.push(format!("Context: {}", j));
        }

        Some(parts.join(" "))
    }
}

/// Generic climate rows: build one sentence per recognized field.
struct ClimateFieldsExtractor;

impl TextExtractor for ClimateFieldsExtractor {
    fn extract(&self, record: &Record) -> Option<String> {
        let mut parts = Vec::new();

        if let Some(country) = field_text(record, "Country") {
            parts.push(format!("Climate data for {}:", country));
        }
        if let Some(temp) = field_number(record, "AverageTemperature") {
            parts.push(format!("Average temperature: {:.2}°C.", temp));
        }
        if let Some(date) = field_text(record, "dt") {
            parts.push(format!("Date: {}.", date));
        }
        if let Some(unc) = field_number(record, "AverageTemperatureUncertainty") {
            parts.push(format!("Temperature uncertainty: {:.2}°C.", unc));
        }
        // Global series have no Country column.
        if let Some(temp) = field_number(record, "LandAverageTemperature") {
            parts.push(format!("Global land average temperature: {:.2}°C.", temp));
        }
        if let Some(temp) = field_number(record, "LandAndOceanAverageTemperature") {
            parts.push(format!(
                "Global land and ocean average temperature: {:.2}°C.",
                temp
            ));
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// Produce the text to embed for one record.
///
/// The designated text field wins when present and non-empty; otherwise the
/// extractor chain runs in priority order. Returns an empty string when no
/// strategy matches — callers skip such records, they are never indexed.
pub fn synthesize_text(record: &Record, text_field: &str) -> String {
    if let Some(text) = field_text(record, text_field) {
        return text;
    }

    let extractors: [&dyn TextExtractor; 3] = [
        &NarrativeExtractor,
        &HeadlineExtractor,
        &ClimateFieldsExtractor,
    ];
    extractors
        .iter()
        .find_map(|e| e.extract(record))
        .unwrap_or_default()
}

/// Derive the `lesson_id` for a record.
///
/// Precedence: explicit lesson column → `Country` → `dt` date → `Headline`.
/// Country and headline slugs are prefixed by the dataset name when it is
/// not the default. Returns `None` when no heuristic applies.
pub fn derive_lesson_id(record: &Record, opts: &DatasetOptions) -> Option<String> {
    let prefix = |slug: String, fallback: &str| -> String {
        if opts.dataset_name != DEFAULT_DATASET {
            format!("{}_{}", opts.dataset_name, slug)
        } else {
            format!("{}_{}", fallback, slug)
        }
    };

    if let Some(ref column) = opts.lesson_id_field {
        if let Some(value) = record.get(column).filter(|v| !v.is_missing()) {
            let slug = slugify(&value.render());
            return Some(if opts.dataset_name != DEFAULT_DATASET {
                format!("{}_{}", opts.dataset_name, slug)
            } else {
                slug
            });
        }
    }

    if let Some(country) = field_text(record, "Country") {
        return Some(prefix(slugify(&country), "climate"));
    }

    if let Some(date) = record.get("dt").filter(|v| !v.is_missing()) {
        return Some(format!("global_temp_{}", date.render()));
    }

    if let Some(headline) = field_text(record, "Headline") {
        return Some(prefix(headline_slug(&headline), "headline"));
    }

    None
}

/// Assemble the metadata entry for one record.
///
/// Reserved keys first (`dataset_name`, derived `lesson_id`, `person_id`),
/// then every source field except the text field is copied through. A
/// passthrough field that collides with a reserved key overwrites it (last
/// write wins).
pub fn build_metadata(record: &Record, opts: &DatasetOptions) -> Metadata {
    let mut meta = Metadata::new(opts.dataset_name.clone());
    meta.lesson_id = derive_lesson_id(record, opts);

    if let Some(ref column) = opts.person_id_field {
        if let Some(value) = record.get(column).filter(|v| !v.is_missing()) {
            meta.person_id = value.render();
        }
    }

    for (key, value) in record {
        if key == &opts.text_field {
            continue;
        }
        match key.as_str() {
            "dataset_name" => meta.dataset_name = value.render(),
            "lesson_id" => meta.lesson_id = Some(value.render()),
            "person_id" => meta.person_id = value.render(),
            _ => {
                meta.extra.insert(key.clone(), value.clone());
            }
        }
    }

    meta
}

/// Lowercase, spaces to underscores, punctuation stripped.
pub fn slugify(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .replace(' ', "_")
        .replace([',', '\'', '"', '-'], "")
}

/// Slug from the first three words of a headline, capped at 50 characters.
pub fn headline_slug(headline: &str) -> String {
    let slug = headline
        .to_lowercase()
        .split_whitespace()
        .take(3)
        .collect::<Vec<_>>()
        .join("_")
        .replace([',', '\'', '"'], "")
        .replace('-', "_");
    slug.chars().take(50).collect()
}

fn field_text(record: &Record, key: &str) -> Option<String> {
    record
        .get(key)
        .filter(|v| !v.is_missing())
        .map(|v| v.render().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn field_number(record: &Record, key: &str) -> Option<f64> {
    let value = record.get(key).filter(|v| !v.is_missing())?;
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[(&str, FieldValue)]) -> Record {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn country_record(name: &str, temp: f64) -> Record {
        record(&[
            ("Country", FieldValue::Str(name.to_string())),
            ("AverageTemperature", FieldValue::Num(temp)),
        ])
    }

    #[test]
    fn designated_text_field_wins() {
        let r = record(&[
            ("body", FieldValue::Str("Prepared narrative.".to_string())),
            ("Country", FieldValue::Str("France".to_string())),
        ]);
        assert_eq!(synthesize_text(&r, "body"), "Prepared narrative.");
    }

    #[test]
    fn nan_text_field_falls_through_to_extractors() {
        let r = record(&[
            ("text", FieldValue::Str("nan".to_string())),
            ("Country", FieldValue::Str("France".to_string())),
            ("AverageTemperature", FieldValue::Num(12.5)),
        ]);
        let text = synthesize_text(&r, "text");
        assert!(text.contains("France"));
        assert!(text.contains("12.50°C"));
    }

    #[test]
    fn climate_fields_synthesis() {
        let text = synthesize_text(&country_record("France", 12.5), "text");
        assert_eq!(text, "Climate data for France: Average temperature: 12.50°C.");

        let text = synthesize_text(&country_record("Germany", 9.0), "text");
        assert!(text.contains("Germany"));
        assert!(text.contains("9.00°C"));
    }

    #[test]
    fn global_temperature_fields_synthesis() {
        let r = record(&[
            ("dt", FieldValue::Str("1950-01-01".to_string())),
            ("LandAverageTemperature", FieldValue::Num(8.52)),
            ("LandAndOceanAverageTemperature", FieldValue::Num(15.1)),
        ]);
        let text = synthesize_text(&r, "text");
        assert!(text.contains("Date: 1950-01-01."));
        assert!(text.contains("Global land average temperature: 8.52°C."));
        assert!(text.contains("Global land and ocean average temperature: 15.10°C."));
    }

    #[test]
    fn headline_synthesis_prefers_content() {
        let r = record(&[
            ("Headline", FieldValue::Str("Seas are rising".to_string())),
            ("Content", FieldValue::Str("Full article body.".to_string())),
            ("Sentiment", FieldValue::Str("negative".to_string())),
            ("Justification", FieldValue::Str("cites new data".to_string())),
        ]);
        let text = synthesize_text(&r, "Content");
        // Content is the designated text field here, so it is used directly.
        assert_eq!(text, "Full article body.");

        // Without a usable text field the news extractor assembles everything.
        let text = synthesize_text(&r, "text");
        assert_eq!(
            text,
            "Climate news headline: Seas are rising Full article body. \
             Sentiment analysis: negative Context: cites new data"
        );
    }

    #[test]
    fn headline_without_content_uses_headline_twice() {
        let r = record(&[("Headline", FieldValue::Str("Seas are rising".to_string()))]);
        let text = synthesize_text(&r, "text");
        assert_eq!(
            text,
            "Climate news headline: Seas are rising Seas are rising"
        );
    }

    #[test]
    fn unrecognized_record_yields_empty_text() {
        let r = record(&[("mystery", FieldValue::Num(1.0))]);
        assert_eq!(synthesize_text(&r, "text"), "");
    }

    #[test]
    fn missing_temperature_is_skipped_not_formatted() {
        let r = record(&[
            ("Country", FieldValue::Str("France".to_string())),
            ("AverageTemperature", FieldValue::Num(f64::NAN)),
        ]);
        let text = synthesize_text(&r, "text");
        assert_eq!(text, "Climate data for France:");
    }

    #[test]
    fn lesson_id_from_country_default_dataset() {
        let opts = DatasetOptions::default();
        let id = derive_lesson_id(&country_record("France", 12.5), &opts);
        assert_eq!(id.as_deref(), Some("climate_france"));
    }

    #[test]
    fn lesson_id_from_country_named_dataset() {
        let opts = DatasetOptions {
            dataset_name: "temperature_by_country".to_string(),
            ..Default::default()
        };
        let id = derive_lesson_id(&country_record("New Zealand", 11.0), &opts);
        assert_eq!(id.as_deref(), Some("temperature_by_country_new_zealand"));
    }

    #[test]
    fn lesson_id_from_date() {
        let opts = DatasetOptions::default();
        let r = record(&[("dt", FieldValue::Str("1880-05-01".to_string()))]);
        assert_eq!(
            derive_lesson_id(&r, &opts).as_deref(),
            Some("global_temp_1880-05-01")
        );
    }

    #[test]
    fn lesson_id_from_headline_first_three_words() {
        let opts = DatasetOptions::default();
        let r = record(&[(
            "Headline",
            FieldValue::Str("Arctic ice hits record low again".to_string()),
        )]);
        assert_eq!(
            derive_lesson_id(&r, &opts).as_deref(),
            Some("headline_arctic_ice_hits")
        );
    }

    #[test]
    fn lesson_id_explicit_column_takes_precedence() {
        let opts = DatasetOptions {
            lesson_id_field: Some("unit".to_string()),
            ..Default::default()
        };
        let r = record(&[
            ("unit", FieldValue::Str("Ocean Currents".to_string())),
            ("Country", FieldValue::Str("France".to_string())),
        ]);
        assert_eq!(derive_lesson_id(&r, &opts).as_deref(), Some("ocean_currents"));
    }

    #[test]
    fn no_heuristic_yields_no_lesson_id() {
        let opts = DatasetOptions::default();
        let r = record(&[("mystery", FieldValue::Num(1.0))]);
        assert_eq!(derive_lesson_id(&r, &opts), None);
    }

    #[test]
    fn headline_slug_is_truncated() {
        let slug = headline_slug(
            "Extraordinarily-long headline, with 'quotes' and punctuation everywhere roaming",
        );
        assert!(slug.len() <= 50);
        assert!(!slug.contains(','));
        assert!(!slug.contains('\''));
        assert!(!slug.contains('-'));
    }

    #[test]
    fn metadata_copies_passthrough_fields() {
        let opts = DatasetOptions {
            dataset_name: "temps".to_string(),
            ..Default::default()
        };
        let mut r = country_record("France", 12.5);
        r.insert("text".to_string(), FieldValue::Str("narrative".to_string()));
        let meta = build_metadata(&r, &opts);

        assert_eq!(meta.dataset_name, "temps");
        assert_eq!(meta.lesson_id.as_deref(), Some("temps_france"));
        assert_eq!(meta.person_id, DEFAULT_PERSON);
        // Text field excluded; everything else passes through.
        assert!(!meta.extra.contains_key("text"));
        assert_eq!(
            meta.extra.get("Country"),
            Some(&FieldValue::Str("France".to_string()))
        );
        assert_eq!(meta.extra.get("AverageTemperature"), Some(&FieldValue::Num(12.5)));
    }

    #[test]
    fn metadata_person_column_is_honored() {
        let opts = DatasetOptions {
            person_id_field: Some("student".to_string()),
            ..Default::default()
        };
        let r = record(&[("student", FieldValue::Str("student_42".to_string()))]);
        let meta = build_metadata(&r, &opts);
        assert_eq!(meta.person_id, "student_42");
    }

    #[test]
    fn reserved_key_collision_last_write_wins() {
        let opts = DatasetOptions::default();
        let r = record(&[(
            "dataset_name",
            FieldValue::Str("from_record".to_string()),
        )]);
        let meta = build_metadata(&r, &opts);
        assert_eq!(meta.dataset_name, "from_record");
    }
}
