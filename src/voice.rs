//! Voice transcript parser.
//!
//! Turns the final output of speech recognition into a structured
//! [`TaskDraft`] without any network call: date, time, urgency and full-day
//! markers are detected and stripped, the remainder becomes name + details.
//! French input is handled by a lexical substitution pass over a fixed
//! vocabulary; detection then runs on the translated working copy while the
//! original text is kept for name extraction.
//!
//! Nothing in here can fail: sub-patterns that do not parse are treated as
//! "no match" and the whole utterance degrades to the task name.

use chrono::{Datelike, Duration, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::TaskDraft;

/// Name used when extraction yields nothing.
pub const DEFAULT_TASK_NAME: &str = "New Task";

/// Supported transcript locales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    En,
    Fr,
}

impl Language {
    /// Lenient tag parsing: `fr`, `fr-FR`, `fr_CA`... map to French,
    /// everything else to English.
    pub fn from_tag(tag: &str) -> Self {
        if tag.trim().to_lowercase().starts_with("fr") {
            Language::Fr
        } else {
            Language::En
        }
    }
}

impl std::str::FromStr for Language {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Language::from_tag(s))
    }
}

/// FR→EN substitution vocabulary. Multi-word phrases come first so they are
/// rewritten before their component words are.
const FRENCH_EN: &[(&str, &str)] = &[
    ("journée complète", "all day"),
    ("toute la journée", "all day"),
    ("aujourd'hui", "today"),
    ("ce soir", "tonight"),
    ("et demi", "thirty"),
    ("pour", "for"),
    ("à", "at"),
    ("le", "on"),
    ("la", "on"),
    ("les", "on"),
    ("demain", "tomorrow"),
    ("matin", "morning"),
    ("midi", "noon"),
    ("soir", "evening"),
    ("nuit", "night"),
    ("urgent", "urgent"),
    ("urgence", "urgent"),
    ("important", "urgent"),
    ("journée", "day"),
    ("complète", "full"),
    ("lundi", "monday"),
    ("mardi", "tuesday"),
    ("mercredi", "wednesday"),
    ("jeudi", "thursday"),
    ("vendredi", "friday"),
    ("samedi", "saturday"),
    ("dimanche", "sunday"),
    ("janvier", "january"),
    ("février", "february"),
    ("fevrier", "february"),
    ("mars", "march"),
    ("avril", "april"),
    ("mai", "may"),
    ("juin", "june"),
    ("juillet", "july"),
    ("août", "august"),
    ("aout", "august"),
    ("septembre", "september"),
    ("octobre", "october"),
    ("novembre", "november"),
    ("décembre", "december"),
    ("decembre", "december"),
    ("heure", "hour"),
    ("heures", "hours"),
];

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const WEEKDAYS: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

/// Connectives eaten together with a removed token so the name does not end
/// up as "Buy milk at".
const CONNECTIVES: &str = "at|on|for|le|la|les|pour|à";

static FRENCH_EN_RES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    FRENCH_EN
        .iter()
        .filter_map(|(fr, en)| {
            Regex::new(&format!(r"(?i)\b{}\b", regex::escape(fr)))
                .ok()
                .map(|re| (re, *en))
        })
        .collect()
});

static URGENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(urgent|important|priority)\b").unwrap());
static FULL_DAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(all day|whole day|all-day)\b").unwrap());
static FR_MARKERS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(journée complète|toute la journée|urgent|urgence|important)\b").unwrap()
});

static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap());
static NUMERIC_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})[/-](\d{1,2})(?:[/-](\d{2,4}))?\b").unwrap());
static KEYWORD_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(today|tomorrow|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
        .unwrap()
});
static MONTH_DAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{1,2})\b",
    )
    .unwrap()
});
static IN_DAYS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bin\s+(\d+)\s+days?\b").unwrap());

static COLON_TIME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2}):(\d{2})\b").unwrap());
static AMPM_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})\s?(am|pm)\b").unwrap());
static HOUR_TIME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2})h(\d{1,2})?\b").unwrap());

static SQUEEZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

fn squeeze(text: &str) -> String {
    SQUEEZE_RE.replace_all(text, " ").trim().to_string()
}

/// Lowercase + whole-word FR→EN rewrite, used only for pattern detection.
fn translate_french(text: &str) -> String {
    let mut working = text.to_lowercase();
    for (re, en) in FRENCH_EN_RES.iter() {
        working = re.replace_all(&working, *en).into_owned();
    }
    working
}

/// French words whose translation is the given English keyword.
fn french_sources(en: &str) -> Vec<&'static str> {
    FRENCH_EN
        .iter()
        .filter(|(_, e)| *e == en)
        .map(|(f, _)| *f)
        .collect()
}

/// Remove one whole-word occurrence of any alternative, along with an
/// immediately preceding connective, then collapse the hole.
fn remove_any(text: &str, alternatives: &[&str]) -> String {
    if alternatives.is_empty() {
        return text.to_string();
    }
    let alts = alternatives
        .iter()
        .map(|a| regex::escape(a))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r"(?i)(?:\b(?:{CONNECTIVES})\s+)?\b(?:{alts})\b");
    match Regex::new(&pattern) {
        Ok(re) => squeeze(&re.replace(text, " ")),
        Err(_) => text.to_string(),
    }
}

fn remove_token(text: &str, token: &str) -> String {
    remove_any(text, &[token])
}

/// A detected date and how to scrub it from the untranslated text.
struct DateMatch {
    date: NaiveDate,
    /// Matched text in the working copy.
    token: String,
    /// Alternatives to remove from the original-language copy.
    raw_alternatives: Vec<String>,
}

fn next_weekday(today: NaiveDate, target: u32) -> NaiveDate {
    let base = today.weekday().num_days_from_sunday() as i64;
    let mut diff = target as i64 - base;
    if diff <= 0 {
        diff += 7;
    }
    today + Duration::days(diff)
}

fn resolve_keyword(keyword: &str, today: NaiveDate) -> Option<NaiveDate> {
    match keyword {
        "today" => Some(today),
        "tomorrow" => Some(today + Duration::days(1)),
        other => WEEKDAYS
            .iter()
            .position(|d| *d == other)
            .map(|idx| next_weekday(today, idx as u32)),
    }
}

/// Raw-copy alternatives for a keyword: the keyword itself plus, in French,
/// every vocabulary word that translates to it.
fn keyword_alternatives(keyword: &str, language: Language) -> Vec<String> {
    let mut alts = vec![keyword.to_string()];
    if language == Language::Fr {
        alts.extend(french_sources(keyword).into_iter().map(str::to_string));
    }
    alts
}

fn detect_date(working: &str, language: Language, today: NaiveDate) -> Option<DateMatch> {
    if let Some(caps) = ISO_DATE_RE.captures(working) {
        let token = caps[1].to_string();
        if let Ok(date) = NaiveDate::parse_from_str(&token, "%Y-%m-%d") {
            return Some(DateMatch {
                date,
                raw_alternatives: vec![token.clone()],
                token,
            });
        }
    }

    if let Some(caps) = NUMERIC_DATE_RE.captures(working) {
        let token = caps[0].to_string();
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year = match caps.get(3) {
            Some(y) if y.as_str().len() == 2 => 2000 + y.as_str().parse::<i32>().ok()?,
            Some(y) => y.as_str().parse().ok()?,
            None => today.year(),
        };
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(DateMatch {
                date,
                raw_alternatives: vec![token.clone()],
                token,
            });
        }
    }

    if let Some(caps) = KEYWORD_DATE_RE.captures(working) {
        let keyword = caps[1].to_string();
        if let Some(date) = resolve_keyword(&keyword, today) {
            return Some(DateMatch {
                date,
                raw_alternatives: keyword_alternatives(&keyword, language),
                token: keyword,
            });
        }
    }

    if let Some(caps) = MONTH_DAY_RE.captures(working) {
        let month_word = caps[1].to_string();
        let day: u32 = caps[2].parse().ok()?;
        let month = MONTHS.iter().position(|m| *m == month_word)? as u32 + 1;
        if let Some(date) = NaiveDate::from_ymd_opt(today.year(), month, day) {
            let raw_alternatives = keyword_alternatives(&month_word, language)
                .into_iter()
                .map(|m| format!("{} {}", m, day))
                .collect();
            return Some(DateMatch {
                date,
                raw_alternatives,
                token: caps[0].to_string(),
            });
        }
    }

    None
}

fn detect_relative_days(working: &str, today: NaiveDate) -> Option<DateMatch> {
    let caps = IN_DAYS_RE.captures(working)?;
    let days: i64 = caps[1].parse().ok()?;
    let date = today.checked_add_signed(Duration::days(days))?;
    let token = caps[0].to_string();
    Some(DateMatch {
        date,
        raw_alternatives: vec![token.clone()],
        token,
    })
}

fn format_time(hours: u32, minutes: u32) -> Option<String> {
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(format!("{:02}:{:02}", hours, minutes))
}

/// A detected time; time tokens look the same in both languages, so one
/// token serves both copies.
struct TimeMatch {
    time: String,
    token: String,
}

fn detect_time(working: &str) -> Option<TimeMatch> {
    if let Some(caps) = COLON_TIME_RE.captures(working) {
        let hours: u32 = caps[1].parse().ok()?;
        let minutes: u32 = caps[2].parse().ok()?;
        if let Some(time) = format_time(hours, minutes) {
            return Some(TimeMatch {
                time,
                token: caps[0].to_string(),
            });
        }
    }

    if let Some(caps) = AMPM_TIME_RE.captures(working) {
        let mut hours: u32 = caps[1].parse().ok()?;
        match &caps[2] {
            "pm" if hours < 12 => hours += 12,
            "am" if hours == 12 => hours = 0,
            _ => {}
        }
        if let Some(time) = format_time(hours, 0) {
            return Some(TimeMatch {
                time,
                token: caps[0].to_string(),
            });
        }
    }

    // "18h" / "14h30" shorthand; a single minute digit means tens ("14h3" = 14:30).
    if let Some(caps) = HOUR_TIME_RE.captures(working) {
        let hours: u32 = caps[1].parse().ok()?;
        let minutes = match caps.get(2) {
            Some(m) if m.as_str().len() == 1 => m.as_str().parse::<u32>().ok()? * 10,
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        if let Some(time) = format_time(hours, minutes) {
            return Some(TimeMatch {
                time,
                token: caps[0].to_string(),
            });
        }
    }

    None
}

/// Strip urgency and full-day marker words from the original-language text.
fn strip_markers(text: &str, language: Language) -> String {
    let mut out = URGENT_RE.replace_all(text, " ").into_owned();
    out = FULL_DAY_RE.replace_all(&out, " ").into_owned();
    if language == Language::Fr {
        out = FR_MARKERS_RE.replace_all(&out, " ").into_owned();
    }
    squeeze(&out)
}

static DETAILS_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(details?|notes?|description)[:\-]?\s*(.+)$").unwrap());

/// Split the cleaned text into (name, details) on the first matching
/// separator: an explicit label, " - ", ":", then ". ".
fn split_name_details(text: &str) -> (String, String) {
    if let Some(caps) = DETAILS_LABEL_RE.captures(text) {
        let label_start = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let details = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        return (text[..label_start].trim().to_string(), details.trim().to_string());
    }

    for sep in [" - ", ":", ". "] {
        if let Some((name, details)) = text.split_once(sep) {
            return (name.trim().to_string(), details.trim().to_string());
        }
    }

    (text.trim().to_string(), String::new())
}

/// Parse a transcript relative to the current local date.
pub fn parse_transcript(transcript: &str, language: Language) -> TaskDraft {
    parse_transcript_at(transcript, language, Local::now().date_naive())
}

/// Deterministic variant of [`parse_transcript`]; `today` anchors relative
/// dates ("tomorrow", weekday names, "in N days", month + day).
pub fn parse_transcript_at(transcript: &str, language: Language, today: NaiveDate) -> TaskDraft {
    let original = transcript.trim();
    if original.is_empty() {
        return TaskDraft {
            name: DEFAULT_TASK_NAME.to_string(),
            ..TaskDraft::default()
        };
    }

    let mut working = match language {
        Language::Fr => translate_french(original),
        Language::En => original.to_lowercase(),
    };
    let mut raw = original.to_string();

    let is_urgent = URGENT_RE.is_match(&working);
    let is_full_day = FULL_DAY_RE.is_match(&working);

    let mut date = String::new();
    let detected = detect_date(&working, language, today)
        .or_else(|| detect_relative_days(&working, today));
    if let Some(found) = detected {
        date = found.date.format("%Y-%m-%d").to_string();
        working = remove_token(&working, &found.token);
        let raw_alts: Vec<&str> = found.raw_alternatives.iter().map(String::as_str).collect();
        raw = remove_any(&raw, &raw_alts);
    }

    let mut time = String::new();
    if let Some(found) = detect_time(&working) {
        time = found.time;
        raw = remove_token(&raw, &found.token);
    }

    let cleaned = strip_markers(&raw, language);
    let (name, details) = split_name_details(&cleaned);

    TaskDraft {
        name: if name.is_empty() {
            DEFAULT_TASK_NAME.to_string()
        } else {
            name
        },
        details,
        date,
        time: if is_full_day { String::new() } else { time },
        is_full_day,
        is_urgent,
        tags: String::new(),
        priority: Default::default(),
    }
}
