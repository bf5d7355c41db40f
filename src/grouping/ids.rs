use super::session::ClusterId;
use chrono::Utc;
use uuid::Uuid;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the random suffix appended to generated identifiers
const RANDOM_SUFFIX_LEN: usize = 6;

/// Source of fresh cluster identifiers.
///
/// Every call must return an identifier never returned before by the same
/// generator.
pub trait ClusterIdGenerator: Send {
    fn next_cluster_id(&mut self) -> ClusterId;
}

/// Encode an unsigned integer in lowercase base 36
pub fn encode_base36(mut value: u128) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();

    // Only ASCII digits were pushed
    digits.into_iter().map(char::from).collect()
}

fn random_suffix() -> String {
    let mut suffix = encode_base36(Uuid::new_v4().as_u128());
    suffix.truncate(RANDOM_SUFFIX_LEN);
    suffix
}

/// `<prefix>-<base36 millis>-<random>`
fn compose_id(prefix: &str, millis: u128) -> String {
    format!("{}-{}-{}", prefix, encode_base36(millis), random_suffix())
}

/// Identifier for a report whose producer did not supply one
pub fn new_report_id(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u128;
    compose_id(prefix, millis)
}

/// Default generator: wall-clock milliseconds plus a random suffix.
///
/// The timestamp component is forced to be strictly increasing, so two ids
/// from one generator differ even if minted within the same millisecond.
#[derive(Debug, Clone)]
pub struct TimestampIdGenerator {
    prefix: String,
    last_millis: u128,
}

impl TimestampIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            last_millis: 0,
        }
    }
}

impl Default for TimestampIdGenerator {
    fn default() -> Self {
        Self::new("crime")
    }
}

impl ClusterIdGenerator for TimestampIdGenerator {
    fn next_cluster_id(&mut self) -> ClusterId {
        let now = Utc::now().timestamp_millis().max(0) as u128;
        let millis = now.max(self.last_millis + 1);
        self.last_millis = millis;
        ClusterId::new(compose_id(&self.prefix, millis))
    }
}

/// Deterministic generator producing `<prefix>-1`, `<prefix>-2`, ...
#[derive(Debug, Clone)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: u64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl ClusterIdGenerator for SequentialIdGenerator {
    fn next_cluster_id(&mut self) -> ClusterId {
        let id = ClusterId::new(format!("{}-{}", self.prefix, self.next));
        self.next += 1;
        id
    }
}
