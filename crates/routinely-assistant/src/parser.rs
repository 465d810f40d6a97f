//! Natural-language task parsing: AI prompt construction, JSON extraction,
//! validation, and the regex fallback used when the model is unavailable.

use chrono::{Days, NaiveDate, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

use routinely_types::{Category, ParsedTask, Priority};

static JSON_OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^{}]*\}").unwrap());
static TIME_COLON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2}):(\d{2})\s*(am|pm)?\b").unwrap());
static TIME_MERIDIEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})\s*(am|pm)\b").unwrap());
static HHMM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").unwrap());
static TITLE_NOISE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bat\s+\d{1,2}:\d{2}\s*(am|pm)?\b",
        r"(?i)\bat\s+\d{1,2}\s*(am|pm)\b",
        r"(?i)\b\d{1,2}:\d{2}\s*(am|pm)?\b",
        r"(?i)\b\d{1,2}\s*(am|pm)\b",
        r"(?i)\btomorrow\b",
        r"(?i)\btoday\b",
        r"(?i)\bnext week\b",
        r"(?i)\bmorning\b",
        r"(?i)\bafternoon\b",
        r"(?i)\bevening\b",
        r"(?i)\bnight\b",
        r"(?i)\burgent\b",
        r"(?i)\bhigh priority\b",
        r"(?i)\blow priority\b",
        r"(?i)\bimportant\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Work,
        &["meeting", "work", "office", "project", "presentation", "email"],
    ),
    (
        Category::Health,
        &["gym", "exercise", "workout", "run", "yoga", "doctor"],
    ),
    (
        Category::Shopping,
        &["buy", "shop", "purchase", "groceries", "store"],
    ),
    (
        Category::Study,
        &["study", "read", "learn", "course", "homework", "assignment"],
    ),
    (
        Category::Personal,
        &["call", "family", "friend", "birthday", "dinner", "movie"],
    ),
];

/// Prompt asking the model for strict-JSON task extraction.
pub fn build_parse_prompt(text: &str, today: NaiveDate) -> String {
    let tomorrow = today + Days::new(1);
    let next_week = today + Days::new(7);
    format!(
        "Extract task information from natural language and return ONLY valid JSON.\n\
         \n\
         Input: \"{text}\"\n\
         \n\
         Extract:\n\
         1. task: The main task description (remove time/date mentions)\n\
         2. time: 24-hour format HH:MM\n\
         3. date: YYYY-MM-DD format (use today if not specified)\n\
         4. priority: \"high\", \"medium\", or \"low\" (default: medium)\n\
         5. category: \"work\", \"personal\", \"health\", \"study\", \"shopping\", or \"other\"\n\
         \n\
         Time keywords:\n\
         - morning -> 09:00\n\
         - afternoon -> 14:00\n\
         - evening -> 18:00\n\
         - night -> 20:00\n\
         \n\
         Date keywords:\n\
         - today -> {today}\n\
         - tomorrow -> {tomorrow}\n\
         - next week -> {next_week}\n\
         \n\
         Priority keywords: urgent, important, high priority -> \"high\"\n\
         \n\
         Return ONLY this JSON structure with no additional text:\n\
         {{\"task\": \"...\", \"time\": \"HH:MM\", \"date\": \"YYYY-MM-DD\", \"priority\": \"medium\", \"category\": \"other\"}}"
    )
}

/// Pull the first `{...}` object out of model output.
pub fn extract_json(output: &str) -> Option<serde_json::Value> {
    let matched = JSON_OBJECT_RE.find(output)?;
    serde_json::from_str(matched.as_str()).ok()
}

/// Validate and repair model-extracted fields.
///
/// Every field degrades independently: a bad time becomes 09:00, a bad date
/// becomes today, bad priority/category become their defaults. The title
/// falls back to the cleaned original command.
pub fn validate_parsed(parsed: &serde_json::Value, original: &str, today: NaiveDate) -> ParsedTask {
    let title = parsed
        .get("task")
        .and_then(|v| v.as_str())
        .unwrap_or(original);

    let time = parsed
        .get("time")
        .and_then(|v| v.as_str())
        .and_then(validate_time)
        .unwrap_or_else(|| "09:00".to_string());

    let date = parsed
        .get("date")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<NaiveDate>().ok())
        .unwrap_or(today);

    let priority = parsed
        .get("priority")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<Priority>().ok())
        .unwrap_or_default();

    let category = parsed
        .get("category")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<Category>().ok())
        .unwrap_or_default();

    ParsedTask {
        title: clean_title(title),
        time,
        date,
        priority,
        category,
    }
}

fn validate_time(s: &str) -> Option<String> {
    let caps = HHMM_RE.captures(s)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(format!("{hour:02}:{minute:02}"))
}

/// Regex-only parser used when the AI path fails.
pub fn fallback_parse(text: &str, now: NaiveDateTime) -> ParsedTask {
    let lower = text.to_lowercase();
    let today = now.date();

    let time = extract_time(text);

    let date = if lower.contains("tomorrow") {
        today + Days::new(1)
    } else if lower.contains("next week") {
        today + Days::new(7)
    } else {
        today
    };

    let priority = if ["urgent", "important", "asap", "critical"]
        .iter()
        .any(|w| lower.contains(w))
    {
        Priority::High
    } else if ["low priority", "optional", "maybe"]
        .iter()
        .any(|w| lower.contains(w))
    {
        Priority::Low
    } else {
        Priority::Medium
    };

    let category = CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or_default();

    // When no time was given, pick a sensible default for the time of day
    let time = time.unwrap_or_else(|| match now.hour() {
        0..=11 => "09:00".to_string(),
        12..=16 => "14:00".to_string(),
        _ => "18:00".to_string(),
    });

    ParsedTask {
        title: clean_title(text),
        time,
        date,
        priority,
        category,
    }
}

/// Extract a `HH:MM` time from free text, handling 12-hour meridiems.
pub fn extract_time(text: &str) -> Option<String> {
    if let Some(caps) = TIME_COLON_RE.captures(text) {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps[2].parse().ok()?;
        let period = caps.get(3).map(|m| m.as_str().to_lowercase());
        return to_24h(hour, minute, period.as_deref());
    }
    if let Some(caps) = TIME_MERIDIEM_RE.captures(text) {
        let hour: u32 = caps[1].parse().ok()?;
        let period = caps[2].to_lowercase();
        return to_24h(hour, 0, Some(&period));
    }
    None
}

fn to_24h(hour: u32, minute: u32, period: Option<&str>) -> Option<String> {
    let hour = match period {
        Some("pm") if hour != 12 => hour + 12,
        Some("am") if hour == 12 => 0,
        _ => hour,
    };
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(format!("{hour:02}:{minute:02}"))
}

/// Strip time/date/priority mentions from a task description.
pub fn clean_title(text: &str) -> String {
    let mut title = text.to_string();
    for noise in TITLE_NOISE_RES.iter() {
        title = noise.replace_all(&title, "").into_owned();
    }
    let title = WHITESPACE_RE.replace_all(&title, " ");
    let title = title.trim().trim_matches(|c: char| ".,!?;:- ".contains(c));

    let mut chars = title.chars();
    let cleaned = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    };

    if cleaned.is_empty() {
        "New Task".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        date(2026, 3, 15).and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_extract_time_formats() {
        assert_eq!(extract_time("call mom at 3:30pm"), Some("15:30".into()));
        assert_eq!(extract_time("call mom at 3pm"), Some("15:00".into()));
        assert_eq!(extract_time("standup at 09:15"), Some("09:15".into()));
        assert_eq!(extract_time("midnight snack 12am"), Some("00:00".into()));
        assert_eq!(extract_time("lunch at 12pm"), Some("12:00".into()));
        assert_eq!(extract_time("no time here"), None);
    }

    #[test]
    fn test_fallback_parse_full_command() {
        let parsed = fallback_parse("Call mom at 3pm tomorrow", at(10, 0));
        assert_eq!(parsed.title, "Call mom");
        assert_eq!(parsed.time, "15:00");
        assert_eq!(parsed.date, date(2026, 3, 16));
        assert_eq!(parsed.category, Category::Personal);
        assert_eq!(parsed.priority, Priority::Medium);
    }

    #[test]
    fn test_fallback_parse_priority_and_category() {
        let parsed = fallback_parse("urgent meeting at 10am", at(8, 0));
        assert_eq!(parsed.priority, Priority::High);
        assert_eq!(parsed.category, Category::Work);
        assert_eq!(parsed.time, "10:00");

        let parsed = fallback_parse("maybe buy groceries", at(8, 0));
        assert_eq!(parsed.priority, Priority::Low);
        assert_eq!(parsed.category, Category::Shopping);
    }

    #[test]
    fn test_fallback_parse_default_time_by_hour() {
        assert_eq!(fallback_parse("read a book", at(8, 0)).time, "09:00");
        assert_eq!(fallback_parse("read a book", at(13, 0)).time, "14:00");
        assert_eq!(fallback_parse("read a book", at(19, 0)).time, "18:00");
    }

    #[test]
    fn test_fallback_parse_next_week() {
        let parsed = fallback_parse("dentist next week", at(9, 0));
        assert_eq!(parsed.date, date(2026, 3, 22));
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("call mom at 3:00 pm tomorrow"), "Call mom");
        assert_eq!(clean_title("urgent: finish report"), "Finish report");
        assert_eq!(clean_title("  "), "New Task");
        assert_eq!(clean_title("3pm"), "New Task");
    }

    #[test]
    fn test_extract_json_from_noisy_output() {
        let output = "Sure! Here is the JSON:\n{\"task\": \"Gym\", \"time\": \"07:00\"}\nHope that helps.";
        let value = extract_json(output).unwrap();
        assert_eq!(value["task"], "Gym");
        assert!(extract_json("no json here").is_none());
    }

    #[test]
    fn test_validate_parsed_happy_path() {
        let value = json!({
            "task": "Gym session",
            "time": "7:05",
            "date": "2026-04-01",
            "priority": "high",
            "category": "health"
        });
        let parsed = validate_parsed(&value, "gym session at 7:05", date(2026, 3, 15));
        assert_eq!(parsed.title, "Gym session");
        assert_eq!(parsed.time, "07:05");
        assert_eq!(parsed.date, date(2026, 4, 1));
        assert_eq!(parsed.priority, Priority::High);
        assert_eq!(parsed.category, Category::Health);
    }

    #[test]
    fn test_validate_parsed_repairs_bad_fields() {
        let value = json!({
            "time": "25:99",
            "date": "not-a-date",
            "priority": "extreme",
            "category": "sports"
        });
        let today = date(2026, 3, 15);
        let parsed = validate_parsed(&value, "do the thing", today);
        assert_eq!(parsed.title, "Do the thing");
        assert_eq!(parsed.time, "09:00");
        assert_eq!(parsed.date, today);
        assert_eq!(parsed.priority, Priority::Medium);
        assert_eq!(parsed.category, Category::Other);
    }

    #[test]
    fn test_build_parse_prompt_resolves_keyword_dates() {
        let prompt = build_parse_prompt("dinner tomorrow", date(2026, 3, 15));
        assert!(prompt.contains("tomorrow -> 2026-03-16"));
        assert!(prompt.contains("next week -> 2026-03-22"));
        assert!(prompt.contains("\"dinner tomorrow\""));
    }
}
