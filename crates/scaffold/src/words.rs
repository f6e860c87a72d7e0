//! Random `adjective_noun` suffixes and database name assembly.

use rand::seq::SliceRandom;
use regex::Regex;
use std::sync::LazyLock;

/// Names longer than this are truncated unless the engine says otherwise.
pub const DEFAULT_MAX_NAME_LEN: usize = 63;

/// Prefix used when the site name sanitizes to nothing.
pub const FALLBACK_PREFIX: &str = "app";

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-z0-9]+").expect("static pattern"));

pub const ADJECTIVES: &[&str] = &[
    "able", "amber", "ancient", "azure", "bold", "brave", "bright", "brisk", "calm", "clever",
    "cosmic", "crimson", "curious", "daring", "dusty", "eager", "early", "electric", "fancy",
    "fierce", "fluffy", "frosty", "gentle", "giant", "golden", "grand", "happy", "hidden",
    "humble", "icy", "jolly", "keen", "lively", "lucky", "mellow", "mighty", "misty", "noble",
    "odd", "polite", "proud", "quick", "quiet", "rapid", "rustic", "shiny", "silent", "silver",
    "sleepy", "smooth", "sunny", "swift", "tidy", "tiny", "vivid", "warm", "wild", "witty",
    "young", "zesty",
];

pub const NOUNS: &[&str] = &[
    "badger", "bear", "beaver", "bison", "canyon", "cedar", "cliff", "comet", "coral", "crane",
    "creek", "dolphin", "eagle", "falcon", "fern", "finch", "forest", "fox", "glacier", "hawk",
    "heron", "island", "jaguar", "koala", "lagoon", "lake", "lemur", "lynx", "maple", "meadow",
    "meteor", "moose", "moth", "nebula", "otter", "owl", "panda", "panther", "pebble", "pine",
    "planet", "quartz", "rabbit", "raven", "reef", "river", "robin", "salmon", "sparrow",
    "spruce", "storm", "summit", "tiger", "tundra", "valley", "walrus", "willow", "wolf",
    "wren", "zebra",
];

/// Lower-case `name`, collapse runs of anything non-alphanumeric into `_`,
/// and trim underscores from both ends.
pub fn sanitize(name: &str) -> String {
    NON_ALNUM
        .replace_all(&name.to_lowercase(), "_")
        .trim_matches('_')
        .to_string()
}

/// Pick a random `adjective_noun` pair.
pub fn generate_suffix() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("quick");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("otter");
    format!("{adjective}_{noun}")
}

/// Sanitize `prefix` and append a freshly generated suffix.
pub fn generate_database_name(prefix: &str, max_len: usize) -> String {
    database_name(prefix, &generate_suffix(), max_len)
}

/// Join a sanitized `prefix` and `suffix`, truncating only the prefix so the
/// result fits in `max_len`.
///
/// A prefix that sanitizes to nothing becomes [`FALLBACK_PREFIX`]. If even a
/// one-character prefix cannot fit, the suffix alone is returned, cut to
/// `max_len` bytes when it is longer.
pub fn database_name(prefix: &str, suffix: &str, max_len: usize) -> String {
    let mut prefix = sanitize(prefix);
    if prefix.is_empty() {
        prefix = FALLBACK_PREFIX.to_string();
    }

    let full = format!("{prefix}_{suffix}");
    if full.len() <= max_len {
        return full;
    }

    // Sanitized prefixes are ASCII, so byte slicing is safe
    let room = max_len.saturating_sub(suffix.len() + 1);
    let truncated = prefix[..room.min(prefix.len())].trim_end_matches('_');
    if truncated.is_empty() {
        let end = (0..=max_len.min(suffix.len()))
            .rev()
            .find(|&i| suffix.is_char_boundary(i))
            .unwrap_or(0);
        return suffix[..end].to_string();
    }
    format!("{truncated}_{suffix}")
}
