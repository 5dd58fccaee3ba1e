use crate::webapi::Cohort;
use anyhow::Context;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static QUOTES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'+").unwrap());
static DIGIT_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d),(\d)").unwrap());
static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Turns a cohort name into a lowercase, dash-separated file name component.
///
/// Non-ASCII text is transliterated first (`Straße` becomes `strasse`). Anything
/// still outside `[a-z0-9]` separates words, so distinct names may share a slug.
pub fn slugify(name: &str) -> String {
    let lower = deunicode::deunicode(name).to_lowercase();
    let unquoted = QUOTES.replace_all(&lower, "");
    // Matches can't overlap, so `1,2,3` needs a second pass.
    let once = DIGIT_COMMA.replace_all(&unquoted, "$1$2");
    let ungrouped = DIGIT_COMMA.replace_all(&once, "$1$2");
    DISALLOWED
        .replace_all(&ungrouped, "-")
        .trim_matches('-')
        .to_string()
}

pub fn cohort_file_name(prefix: &str, name: &str) -> String {
    format!("{prefix}{}.json", slugify(name))
}

/// Re-encodes a JSON document with 4-space indentation, keeping key order and
/// escaping non-ASCII characters.
pub fn pretty_expression(expression: &str) -> anyhow::Result<String> {
    let value: serde_json::Value =
        serde_json::from_str(expression).context("cohort expression is not valid JSON")?;
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    let pretty = String::from_utf8(out).context("serialized JSON is not UTF-8")?;
    Ok(escape_non_ascii(&pretty))
}

/// Non-ASCII characters only occur inside string literals in serialized JSON, so
/// they can be escaped after the fact.
fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut units = [0u16; 2];
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}

/// Writes the expression of `cohort` to `<dir>/<prefix><slug>.json`, replacing any
/// existing file. Nothing is written when the expression is malformed.
pub fn write_cohort(dir: &Path, prefix: &str, cohort: &Cohort) -> anyhow::Result<PathBuf> {
    let content = pretty_expression(&cohort.expression)
        .with_context(|| format!("cannot read expression of cohort {}", cohort.id))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create directory {}", dir.display()))?;
    let path = dir.join(cohort_file_name(prefix, &cohort.name));
    log::info!(
        "Saving cohort expression for '{}' to '{}'",
        cohort.id,
        path.display()
    );
    std::fs::write(&path, content).with_context(|| format!("cannot write {}", path.display()))?;
    Ok(path)
}

/// Writes all cohorts in order. Cohorts sharing a slug overwrite each other, so
/// the last one wins.
pub fn write_cohorts(dir: &Path, prefix: &str, cohorts: &[Cohort]) -> anyhow::Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(cohorts.len());
    for cohort in cohorts {
        let path = write_cohort(dir, prefix, cohort)?;
        if !written.contains(&path) {
            written.push(path);
        }
    }
    Ok(written)
}
