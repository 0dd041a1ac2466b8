//! Front-matter parsing

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::error::ContentError;

/// Custom deserializer that handles both a single string and a list of strings
fn string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, SeqAccess, Visitor};
    use std::fmt;

    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value])
        }

        fn visit_seq<S>(self, mut seq: S) -> Result<Self::Value, S::Error>
        where
            S: SeqAccess<'de>,
        {
            let mut vec = Vec::new();
            while let Some(item) = seq.next_element::<String>()? {
                vec.push(item);
            }
            Ok(vec)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

/// Front-matter data from a post or page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub date: Option<String>,
    #[serde(alias = "lastmod")]
    pub updated: Option<String>,
    pub draft: bool,
    /// Inverse of `draft`
    pub published: Option<bool>,
    pub slug: Option<String>,
    pub summary: Option<String>,
    pub layout: Option<String>,
    #[serde(deserialize_with = "string_or_vec", default)]
    pub tags: Vec<String>,

    /// Additional custom fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl FrontMatter {
    /// Parse front-matter from content string
    /// Returns (front_matter, remaining_content)
    pub fn parse(content: &str) -> Result<(Self, &str), ContentError> {
        let content = content.trim_start_matches('\u{feff}').trim_start();

        if content.starts_with("---") {
            return Self::parse_yaml(content);
        }

        if content.starts_with("+++") {
            return Self::parse_toml(content);
        }

        if content.starts_with(";;;") || content.starts_with('{') {
            return Self::parse_json(content);
        }

        Ok((FrontMatter::default(), content))
    }

    /// Whether this content is excluded from published listings
    pub fn is_draft(&self) -> bool {
        self.draft || self.published == Some(false)
    }

    fn parse_yaml(content: &str) -> Result<(Self, &str), ContentError> {
        let Some(rest) = opening_line(content, "---") else {
            // `----` and friends are horizontal rules, not delimiters
            return Ok((FrontMatter::default(), content));
        };

        match split_closing(rest, "---") {
            Some((yaml_content, remaining)) => {
                if yaml_content.trim().is_empty() {
                    return Ok((FrontMatter::default(), remaining));
                }

                // A leading `---` can just as well be a Markdown thematic break
                // followed by prose; only treat it as metadata when it has keys.
                if !yaml_content.lines().any(is_yaml_key_line) {
                    return Ok((FrontMatter::default(), content));
                }

                let fm = serde_yaml::from_str::<FrontMatter>(yaml_content)?;
                Ok((fm, remaining))
            }
            None => {
                let first = rest.lines().find(|l| !l.trim().is_empty());
                if first.map(is_yaml_key_line).unwrap_or(false) {
                    Err(ContentError::Unterminated { delimiter: "---" })
                } else {
                    Ok((FrontMatter::default(), content))
                }
            }
        }
    }

    fn parse_toml(content: &str) -> Result<(Self, &str), ContentError> {
        let rest = opening_line(content, "+++")
            .ok_or(ContentError::Unterminated { delimiter: "+++" })?;
        let (toml_content, remaining) =
            split_closing(rest, "+++").ok_or(ContentError::Unterminated { delimiter: "+++" })?;

        let mut table = toml_content.parse::<toml::Table>()?;
        // TOML has a native datetime type; dates are handled as strings downstream
        table
            .iter_mut()
            .for_each(|(_, value)| stringify_datetimes(value));
        let fm: FrontMatter = toml::Value::Table(table).try_into()?;
        Ok((fm, remaining))
    }

    fn parse_json(content: &str) -> Result<(Self, &str), ContentError> {
        // JSON front-matter wrapped in ;;; lines
        if content.starts_with(";;;") {
            let rest = opening_line(content, ";;;")
                .ok_or(ContentError::Unterminated { delimiter: ";;;" })?;
            let (json_content, remaining) = split_closing(rest, ";;;")
                .ok_or(ContentError::Unterminated { delimiter: ";;;" })?;
            let fm: FrontMatter = serde_json::from_str(json_content)?;
            return Ok((fm, remaining));
        }

        let end_pos =
            json_object_end(content).ok_or(ContentError::Unterminated { delimiter: "{" })?;
        let fm: FrontMatter = serde_json::from_str(&content[..end_pos])?;
        let remaining = content[end_pos..].trim_start_matches(['\n', '\r']);
        Ok((fm, remaining))
    }

    /// Parse the publication date, interpreting offset-less values in `tz`
    pub fn parse_date(&self, tz: &Tz) -> Result<Option<DateTime<FixedOffset>>, ContentError> {
        parse_optional_date(self.date.as_deref(), tz)
    }

    /// Parse the updated date, interpreting offset-less values in `tz`
    pub fn parse_updated(&self, tz: &Tz) -> Result<Option<DateTime<FixedOffset>>, ContentError> {
        parse_optional_date(self.updated.as_deref(), tz)
    }
}

/// Returns what follows the opening delimiter line, if the first line is exactly `delim`
fn opening_line<'a>(content: &'a str, delim: &str) -> Option<&'a str> {
    let (first, rest) = match content.find('\n') {
        Some(pos) => (&content[..pos], &content[pos + 1..]),
        None => (content, ""),
    };
    (first.trim_end() == delim).then_some(rest)
}

/// Split `rest` at the first line consisting of `delim` alone
fn split_closing<'a>(rest: &'a str, delim: &str) -> Option<(&'a str, &'a str)> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == delim {
            let remaining = &rest[offset + line.len()..];
            return Some((
                &rest[..offset],
                remaining.trim_start_matches(['\n', '\r']),
            ));
        }
        offset += line.len();
    }
    None
}

/// Whether a line reads as `key: value` (or `key:`), as opposed to prose or a URL
fn is_yaml_key_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return false;
    }
    let Some(colon_pos) = trimmed.find(':') else {
        return false;
    };
    let key = &trimmed[..colon_pos];
    let is_valid_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !matches!(key, "http" | "https" | "ftp");
    let after_colon = &trimmed[colon_pos + 1..];
    is_valid_key && (after_colon.is_empty() || after_colon.starts_with(' '))
}

/// Byte offset just past the `}` closing the object that opens `content`
fn json_object_end(content: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in content.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn stringify_datetimes(value: &mut toml::Value) {
    match value {
        toml::Value::Datetime(dt) => *value = toml::Value::String(dt.to_string()),
        toml::Value::Array(items) => items.iter_mut().for_each(stringify_datetimes),
        toml::Value::Table(table) => table
            .iter_mut()
            .for_each(|(_, v)| stringify_datetimes(v)),
        _ => {}
    }
}

fn parse_optional_date(
    value: Option<&str>,
    tz: &Tz,
) -> Result<Option<DateTime<FixedOffset>>, ContentError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_date_string(s, tz)
            .map(Some)
            .ok_or_else(|| ContentError::InvalidDate {
                value: s.to_string(),
            }),
    }
}

/// Parse a date string in various formats
pub fn parse_date_string(s: &str, tz: &Tz) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }

    let offset_formats = ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S %z", "%Y-%m-%dT%H:%M:%S%z"];
    for fmt in offset_formats {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in datetime_formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return localize(naive, tz);
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return localize(d.and_hms_opt(0, 0, 0)?, tz);
        }
    }

    None
}

fn localize(naive: NaiveDateTime, tz: &Tz) -> Option<DateTime<FixedOffset>> {
    // Ambiguous local times (DST fold) resolve to the earlier instant
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}
