//! Timestamp-prefixed lyrics text and the line map served to clients.

use std::fmt::Write;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Placeholder rendered for timed entries that carry no text.
pub const INSTRUMENTAL_MARKER: &str = "♪";

/// Whitespace directly followed by a `[mm:ss.hh]` timestamp.
///
/// The whitespace character is the line separator; the bracket belongs to the
/// next line.
#[allow(clippy::unwrap_used)] // pattern is a literal
static LINE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s\[\d{2}:\d{2}\.\d{2}\]").unwrap());

/// Ordered mapping from `mm:ss.hh` timestamp to line text.
///
/// Keys keep the order in which they first appeared in the source text. A
/// repeated timestamp replaces the earlier text in place. A `None` value marks
/// a segment whose text could not be separated from its timestamp; it
/// serializes as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LyricsLineMap(IndexMap<String, Option<String>>);

impl LyricsLineMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse text made of `[mm:ss.hh] text` segments separated by whitespace.
    ///
    /// Each segment is split once on its first `"] "`: the part before it,
    /// minus the opening bracket, becomes the key and the remainder the value.
    /// Segments without `"] "` are kept with a missing value.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let mut map = Self::new();
        let mut start = 0;

        for boundary in LINE_BOUNDARY.find_iter(input) {
            map.insert_segment(&input[start..boundary.start()]);
            // Skip the separating whitespace character, keep the bracket.
            let separator_len = input[boundary.start()..]
                .chars()
                .next()
                .map_or(1, char::len_utf8);
            start = boundary.start() + separator_len;
        }
        map.insert_segment(&input[start..]);

        map
    }

    fn insert_segment(&mut self, segment: &str) {
        if segment.is_empty() {
            return;
        }

        let (stamp, text) = match segment.split_once("] ") {
            Some((stamp, text)) => (stamp, Some(text.to_string())),
            None => (segment, None),
        };

        // The first character is the opening bracket in well-formed input.
        let key = stamp.chars().skip(1).collect::<String>();
        self.0.insert(key, text);
    }

    /// Look up the text for a timestamp.
    ///
    /// Returns `None` when the key is absent and `Some(None)` when the key is
    /// present without text.
    #[must_use]
    pub fn get(&self, timestamp: &str) -> Option<Option<&str>> {
        self.0.get(timestamp).map(Option::as_deref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(timestamp, text)` pairs in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

impl FromIterator<(String, Option<String>)> for LyricsLineMap {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Position of a timed entry, as delivered by the provider's rich format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct EntryTime {
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub seconds: u32,
    #[serde(default)]
    pub hundredths: u32,
}

/// One line of the provider's structured subtitle list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TimedEntry {
    #[serde(default)]
    pub time: EntryTime,
    #[serde(default)]
    pub text: Option<String>,
}

/// Render structured entries as `[mm:ss.hh]text` lines, each ending in `\n`.
///
/// Absent or empty text is replaced with [`INSTRUMENTAL_MARKER`].
#[must_use]
pub fn render_timed_entries(entries: &[TimedEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let text = entry
            .text
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(INSTRUMENTAL_MARKER);
        let _ = writeln!(
            out,
            "[{:02}:{:02}.{:02}]{text}",
            entry.time.minutes, entry.time.seconds, entry.time.hundredths
        );
    }
    out
}
