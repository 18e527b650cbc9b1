//! Prompt composition: base prompt plus an optional holiday-of-the-day
//! clause looked up from a CSV table.
//!
//! The holiday table is externally maintained and re-read every cycle. The
//! composed prompt is also written to a file purely so an operator can see
//! what was sent; the in-memory value is what the cycle uses.
use chrono::{Datelike, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::config;

#[derive(Debug, Error)]
pub enum PromptError {
    /// Configuration-fatal: the process should exit rather than retry.
    #[error("base prompt file not found: {0}")]
    MissingBasePrompt(PathBuf),
    /// Configuration-fatal: the process should exit rather than retry.
    #[error("holiday table not found: {0}")]
    MissingHolidayTable(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("holiday table parse error: {0}")]
    Csv(#[from] csv::Error),
}

/// One row of the holiday table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HolidayRecord {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    pub text: String,
    /// Name of the matched holiday, if any; surfaced into the status and
    /// email texts.
    pub holiday: Option<String>,
}

/// Render a date as `M/D/YYYY` without zero padding, matching the holiday
/// table's `Date` column.
pub fn table_date(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.month(), date.day(), date.year())
}

/// Load every row of the holiday table.
pub fn load_holidays(path: &Path) -> Result<Vec<HolidayRecord>, PromptError> {
    if !path.exists() {
        return Err(PromptError::MissingHolidayTable(path.to_path_buf()));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

/// Compose today's prompt. When several table rows share today's date, one
/// is chosen uniformly at random. Always overwrites the prompt output file
/// with the final text plus a trailing newline.
pub fn compose(
    cfg: &config::Prompt,
    today: NaiveDate,
    rng: &mut impl Rng,
) -> Result<ComposedPrompt, PromptError> {
    let base_path = Path::new(&cfg.base_file);
    if !base_path.exists() {
        return Err(PromptError::MissingBasePrompt(base_path.to_path_buf()));
    }
    let base = fs::read_to_string(base_path)?.trim().to_string();

    let holidays = load_holidays(Path::new(&cfg.holidays_file))?;
    let today_key = table_date(today);
    let matches: Vec<&HolidayRecord> = holidays
        .iter()
        .filter(|record| record.date == today_key)
        .collect();

    let (text, holiday) = match matches.choose(rng) {
        Some(chosen) => {
            info!(
                candidates = matches.len(),
                holiday = %chosen.name,
                "holiday match for today"
            );
            let clause = format!(
                " The bird is celebrating the \"{}\" {} with various decorations and apparel.",
                chosen.name,
                chosen.kind.to_lowercase()
            );
            (format!("{base}{clause}"), Some(chosen.name.clone()))
        }
        None => {
            info!(date = %today_key, "no holiday match for today; using base prompt");
            (base, None)
        }
    };

    fs::write(&cfg.output_file, format!("{text}\n"))?;
    info!(path = %cfg.output_file, "updated prompt written");

    Ok(ComposedPrompt { text, holiday })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::{tempdir, TempDir};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()
    }

    fn setup(base: &str, holiday_rows: &[&str]) -> (TempDir, config::Prompt) {
        let td = tempdir().unwrap();
        let cfg = config::Prompt {
            base_file: td.path().join("prompt_base.txt").to_string_lossy().into_owned(),
            holidays_file: td.path().join("holidays.txt").to_string_lossy().into_owned(),
            output_file: td.path().join("prompt.txt").to_string_lossy().into_owned(),
        };
        fs::write(&cfg.base_file, base).unwrap();
        let mut table = String::from("Date,Name,Type\n");
        for row in holiday_rows {
            table.push_str(row);
            table.push('\n');
        }
        fs::write(&cfg.holidays_file, table).unwrap();
        (td, cfg)
    }

    #[test]
    fn table_date_has_no_zero_padding() {
        assert_eq!(table_date(today()), "3/4/2025");
        assert_eq!(
            table_date(NaiveDate::from_ymd_opt(2025, 12, 25).unwrap()),
            "12/25/2025"
        );
    }

    #[test]
    fn matching_holiday_appends_clause() {
        let (_td, cfg) = setup("A bird.", &["3/4/2025,Hat Day,Holiday"]);
        let mut rng = StdRng::seed_from_u64(7);
        let composed = compose(&cfg, today(), &mut rng).unwrap();
        assert_eq!(
            composed.text,
            "A bird. The bird is celebrating the \"Hat Day\" holiday with various decorations and apparel."
        );
        assert_eq!(composed.holiday.as_deref(), Some("Hat Day"));
    }

    #[test]
    fn no_match_uses_base_prompt_verbatim() {
        let (_td, cfg) = setup("A bird.", &["7/20/2025,Moon Day,Observance"]);
        let mut rng = StdRng::seed_from_u64(7);
        let composed = compose(&cfg, today(), &mut rng).unwrap();
        assert_eq!(composed.text, "A bird.");
        assert_eq!(composed.holiday, None);
    }

    #[test]
    fn multiple_matches_pick_one_of_them() {
        let (_td, cfg) = setup(
            "A bird.",
            &["3/4/2025,Hat Day,Holiday", "3/4/2025,Pancake Day,Observance"],
        );
        for seed in 0..16 {
            let mut rng = StdRng::seed_from_u64(seed);
            let composed = compose(&cfg, today(), &mut rng).unwrap();
            let name = composed.holiday.expect("a holiday must be chosen");
            assert!(name == "Hat Day" || name == "Pancake Day", "chose {name}");
            assert!(composed.text.contains(&format!("\"{name}\"")));
        }
    }

    #[test]
    fn prompt_file_side_effect_matches_returned_text() {
        let (_td, cfg) = setup("A bird.", &["3/4/2025,Hat Day,Holiday"]);
        let mut rng = StdRng::seed_from_u64(1);
        let composed = compose(&cfg, today(), &mut rng).unwrap();
        let written = fs::read_to_string(&cfg.output_file).unwrap();
        assert_eq!(written, format!("{}\n", composed.text));
    }

    #[test]
    fn type_is_lowercased_in_clause() {
        let (_td, cfg) = setup("A bird.", &["3/4/2025,Tau Day,OBSERVANCE"]);
        let mut rng = StdRng::seed_from_u64(1);
        let composed = compose(&cfg, today(), &mut rng).unwrap();
        assert!(composed.text.contains("\"Tau Day\" observance"));
    }

    #[test]
    fn missing_base_prompt_is_fatal_variant() {
        let (_td, mut cfg) = setup("A bird.", &[]);
        cfg.base_file = "/nonexistent/prompt_base.txt".into();
        let mut rng = StdRng::seed_from_u64(1);
        let err = compose(&cfg, today(), &mut rng).unwrap_err();
        assert!(matches!(err, PromptError::MissingBasePrompt(_)));
    }

    #[test]
    fn missing_holiday_table_is_fatal_variant() {
        let (_td, mut cfg) = setup("A bird.", &[]);
        cfg.holidays_file = "/nonexistent/holidays.txt".into();
        let mut rng = StdRng::seed_from_u64(1);
        let err = compose(&cfg, today(), &mut rng).unwrap_err();
        assert!(matches!(err, PromptError::MissingHolidayTable(_)));
    }

    #[test]
    fn quoted_names_with_commas_parse() {
        let (_td, cfg) = setup("A bird.", &["3/4/2025,\"Hats, Scarves and Mittens Day\",Holiday"]);
        let mut rng = StdRng::seed_from_u64(1);
        let composed = compose(&cfg, today(), &mut rng).unwrap();
        assert_eq!(
            composed.holiday.as_deref(),
            Some("Hats, Scarves and Mittens Day")
        );
    }
}
