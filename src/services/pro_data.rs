// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Heuristic parser for pasted "professional data".
//!
//! Input is whatever a user copied out of a watch app or spreadsheet: a
//! comma/tab separated lap table, or loose `label: value` lines, often in a
//! mix of English and Chinese. [`parse`] never fails; text it cannot read
//! yields an empty `simple` result.

use crate::models::{ProData, SportType};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Fewer matched columns than this and a block is not treated as a table.
pub const MIN_TABLE_COLUMNS: usize = 3;

/// Canonical key and the header/label spellings that map onto it.
type FieldDef = (&'static str, &'static [&'static str]);

static RUNNING_COLUMNS: &[FieldDef] = &[
    ("time", &["time", "duration", "lap time", "moving time", "历时", "时间", "用时"]),
    ("distance", &["distance", "dist", "km", "距离"]),
    ("pace", &["pace", "avg pace", "配速", "平均配速"]),
    ("avgHr", &["avg hr", "avghr", "average heart rate", "heart rate", "hr", "平均心率", "心率"]),
    ("maxHr", &["max hr", "maxhr", "max heart rate", "最大心率"]),
    ("cadence", &["cadence", "avg cadence", "spm", "平均踏频", "踏频", "步频", "平均步频"]),
    ("strideLength", &["stride length", "stride", "步幅", "平均步幅"]),
    ("power", &["power", "avg power", "watts", "功率", "平均功率"]),
    ("elevation", &["elevation", "elev gain", "ascent", "爬升", "累计爬升", "海拔"]),
];

static CYCLING_COLUMNS: &[FieldDef] = &[
    ("time", &["time", "duration", "lap time", "moving time", "历时", "时间", "用时"]),
    ("distance", &["distance", "dist", "km", "距离"]),
    ("speed", &["speed", "avg speed", "kmh", "速度", "平均速度"]),
    ("avgHr", &["avg hr", "avghr", "average heart rate", "heart rate", "hr", "平均心率", "心率"]),
    ("maxHr", &["max hr", "maxhr", "max heart rate", "最大心率"]),
    ("cadence", &["cadence", "avg cadence", "rpm", "踏频", "平均踏频"]),
    ("power", &["power", "avg power", "watts", "功率", "平均功率"]),
    ("normalizedPower", &["normalized power", "np", "标准化功率"]),
    ("elevation", &["elevation", "elev gain", "ascent", "爬升", "累计爬升", "海拔"]),
];

// Key-value vocabularies are matched by containment in declaration order,
// so the more specific labels come first (max before average).

static RUNNING_FIELDS: &[FieldDef] = &[
    ("maxHr", &["max hr", "max heart rate", "最大心率"]),
    ("avgHr", &["avg hr", "average heart rate", "heart rate", "平均心率", "心率"]),
    ("pace", &["pace", "配速"]),
    ("distance", &["distance", "距离"]),
    ("time", &["duration", "time", "用时", "时长", "历时"]),
    ("cadence", &["cadence", "步频", "踏频"]),
    ("strideLength", &["stride", "步幅"]),
    ("power", &["power", "功率"]),
    ("elevation", &["elevation", "ascent", "爬升"]),
    ("calories", &["calories", "卡路里", "热量"]),
    ("vo2max", &["vo2max", "vo2 max", "最大摄氧量"]),
];

static CYCLING_FIELDS: &[FieldDef] = &[
    ("maxHr", &["max hr", "max heart rate", "最大心率"]),
    ("avgHr", &["avg hr", "average heart rate", "heart rate", "平均心率", "心率"]),
    ("normalizedPower", &["normalized power", "标准化功率"]),
    ("maxPower", &["max power", "最大功率"]),
    ("power", &["power", "功率"]),
    ("speed", &["speed", "速度"]),
    ("distance", &["distance", "距离"]),
    ("time", &["duration", "time", "用时", "时长", "历时"]),
    ("cadence", &["cadence", "踏频"]),
    ("tss", &["tss", "training stress"]),
    ("elevation", &["elevation", "ascent", "爬升"]),
    ("calories", &["calories", "卡路里", "热量"]),
];

static SWIMMING_FIELDS: &[FieldDef] = &[
    ("maxHr", &["max hr", "max heart rate", "最大心率"]),
    ("avgHr", &["avg hr", "average heart rate", "heart rate", "平均心率", "心率"]),
    ("pace", &["pace", "配速"]),
    ("distance", &["distance", "距离"]),
    ("time", &["duration", "time", "用时", "时长", "历时"]),
    ("strokeRate", &["stroke rate", "划频"]),
    ("swolf", &["swolf"]),
    ("calories", &["calories", "卡路里", "热量"]),
];

/// Table vocabulary; `None` for sports without lap tables.
fn column_defs(sport: SportType) -> Option<&'static [FieldDef]> {
    match sport {
        SportType::Running | SportType::Walking | SportType::Hiking => Some(RUNNING_COLUMNS),
        SportType::Cycling => Some(CYCLING_COLUMNS),
        _ => None,
    }
}

fn field_defs(sport: SportType) -> Option<&'static [FieldDef]> {
    match sport {
        SportType::Running | SportType::Walking | SportType::Hiking => Some(RUNNING_FIELDS),
        SportType::Cycling => Some(CYCLING_FIELDS),
        SportType::Swimming => Some(SWIMMING_FIELDS),
        _ => None,
    }
}

/// Short ASCII aliases ("hr", "km", "np") only ever match exactly.
fn substring_eligible(alias: &str) -> bool {
    !alias.is_ascii() || alias.len() >= 3
}

/// Lowercase, drop unit decorations and collapse whitespace.
pub fn normalize_header(header: &str) -> String {
    header
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '(' | ')' | '[' | ']' | '（' | '）' | '/' | '%' | '#' | '*' | ':' | '：' | '"'
            | '_' | '-' | '.' => ' ',
            c => c,
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split one line on `delimiter`, ignoring delimiters inside double quotes.
pub fn split_line(line: &str, delimiter: char) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == delimiter && !in_quotes {
            cells.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }
    cells.push(current.trim().to_string());
    cells
}

/// Header index → canonical column key.
fn match_columns(headers: &[String], defs: &[FieldDef]) -> Vec<Option<&'static str>> {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let mut mapping: Vec<Option<&'static str>> = vec![None; headers.len()];
    let mut used = vec![false; defs.len()];

    // Exact matches first, so a loose match never steals a column from an
    // exact one further right.
    for (i, header) in normalized.iter().enumerate() {
        if header.is_empty() {
            continue;
        }
        let found = defs.iter().enumerate().find(|(d, (_, aliases))| {
            !used[*d] && aliases.iter().any(|a| normalize_header(a) == *header)
        });
        if let Some((d, (key, _))) = found {
            used[d] = true;
            mapping[i] = Some(*key);
        }
    }

    for (i, header) in normalized.iter().enumerate() {
        if mapping[i].is_some() || header.chars().count() < 2 {
            continue;
        }

        // Longest containing alias wins ("max heart rate" over "heart rate").
        let mut best: Option<(usize, usize)> = None;
        for (d, (_, aliases)) in defs.iter().enumerate() {
            if used[d] {
                continue;
            }
            for alias in aliases.iter().copied().filter(|a| substring_eligible(a)) {
                let alias = normalize_header(alias);
                if header.contains(&alias) || alias.contains(header.as_str()) {
                    let len = alias.chars().count();
                    if best.map_or(true, |(_, best_len)| len > best_len) {
                        best = Some((d, len));
                    }
                }
            }
        }
        if let Some((d, _)) = best {
            used[d] = true;
            mapping[i] = Some(defs[d].0);
        }
    }

    mapping
}

/// Try to read `lines` as a table; `None` means "not tabular".
fn parse_table(lines: &[&str], defs: &[FieldDef]) -> Option<ProData> {
    let (header_line, data_lines) = lines.split_first()?;
    let delimiter = if header_line.contains(',') { ',' } else { '\t' };

    let headers = split_line(header_line, delimiter);
    let mapping = match_columns(&headers, defs);
    let matched = mapping.iter().flatten().count();
    if matched < MIN_TABLE_COLUMNS {
        return None;
    }

    let mut rows = Vec::new();
    for line in data_lines {
        let cells = split_line(line, delimiter);
        if cells.len() < 2 {
            continue;
        }
        let row: BTreeMap<String, String> = mapping
            .iter()
            .zip(cells)
            .filter_map(|(key, cell)| Some(((*key)?.to_string(), cell)))
            .filter(|(_, cell)| !cell.is_empty())
            .collect();
        if !row.is_empty() {
            rows.push(row);
        }
    }
    if rows.is_empty() {
        return None;
    }

    // Columns in header order.
    let columns = mapping.iter().flatten().map(|k| k.to_string()).collect();
    Some(ProData::Intervals {
        columns,
        rows,
        summary: BTreeMap::new(),
    })
}

fn label_value_regex() -> Option<&'static Regex> {
    static LABEL_VALUE: OnceLock<Option<Regex>> = OnceLock::new();
    LABEL_VALUE
        .get_or_init(|| Regex::new(r"^(\D+?)\s*(\d.*)$").ok())
        .as_ref()
}

const SEPARATORS: [char; 5] = [':', '：', '|', '=', '\t'];

/// Split a line into `(label, value)`.
fn split_label_value(line: &str) -> Option<(String, String)> {
    for separator in SEPARATORS {
        if let Some((label, value)) = line.split_once(separator) {
            let label = label.trim();
            let value = value.trim();
            // "Pace 5:00" splits inside the time, not after the label.
            let inside_value = label.chars().last().is_some_and(|c| c.is_ascii_digit());
            if !label.is_empty() && !value.is_empty() && !inside_value {
                return Some((label.to_string(), value.to_string()));
            }
        }
    }

    let caps = label_value_regex()?.captures(line.trim())?;
    let label = caps.get(1)?.as_str().trim().trim_end_matches(['-', '–']).trim();
    let value = caps.get(2)?.as_str().trim();
    (!label.is_empty()).then(|| (label.to_string(), value.to_string()))
}

/// Drop trailing unit text: `"150 bpm"` → `"150"`, `"4:30/km"` → `"4:30"`.
pub fn strip_units(value: &str) -> String {
    let trimmed = value.trim();
    let stripped =
        trimmed.trim_end_matches(|c: char| c.is_alphabetic() || c == '/' || c == '%' || c.is_whitespace());
    if stripped.is_empty() {
        trimmed.to_string()
    } else {
        stripped.to_string()
    }
}

fn match_field(label: &str, defs: &[FieldDef]) -> Option<&'static str> {
    let label = label.to_lowercase();
    defs.iter()
        .find(|(_, aliases)| {
            aliases
                .iter()
                .any(|alias| label == *alias || (substring_eligible(alias) && label.contains(*alias)))
        })
        .map(|(key, _)| *key)
}

fn parse_key_values(lines: &[&str], sport: SportType) -> ProData {
    let mut fields = BTreeMap::new();

    if let Some(defs) = field_defs(sport) {
        for line in lines {
            let Some((label, value)) = split_label_value(line) else {
                continue;
            };
            if let Some(key) = match_field(&label, defs) {
                fields
                    .entry(key.to_string())
                    .or_insert_with(|| strip_units(&value));
            }
        }
    }

    ProData::Simple { fields }
}

/// Parse pasted professional data for `sport`.
pub fn parse(raw_text: &str, sport: SportType) -> ProData {
    let lines: Vec<&str> = raw_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if let Some(defs) = column_defs(sport) {
        if let Some(table) = parse_table(&lines, defs) {
            return table;
        }
    }

    parse_key_values(&lines, sport)
}
