//! Atomic cache scripts.
//!
//! Each script has a Lua body for Redis and a pure evaluator with the same
//! semantics, which in-process caches run while holding their write lock.
//! Both operate on a single key (`KEYS[1]`).

use super::{CacheError, Result};

/// Reply of [`CacheScript::DecrementIfSufficient`] and
/// [`CacheScript::IncrementIfPresent`] when the key is absent.
pub const MIRROR_MISSING: i64 = -1;

/// Reply of [`CacheScript::DecrementIfSufficient`] when the amount exceeds the value.
pub const MIRROR_INSUFFICIENT: i64 = -2;

const RELEASE_IF_OWNER_LUA: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end
"#;

const DECREMENT_IF_SUFFICIENT_LUA: &str = r#"
local current = tonumber(redis.call('get', KEYS[1]))
if current == nil then
    return -1
end
if current >= tonumber(ARGV[1]) then
    return redis.call('decrby', KEYS[1], ARGV[1])
else
    return -2
end
"#;

const INCREMENT_IF_PRESENT_LUA: &str = r#"
local current = tonumber(redis.call('get', KEYS[1]))
if current == nil then
    return -1
end
return redis.call('incrby', KEYS[1], ARGV[1])
"#;

/// The closed set of scripts the cache adapter can run atomically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScript {
    /// Deletes `KEYS[1]` only if its value equals `ARGV[1]` (the holder token).
    /// Replies `1` when deleted and `0` otherwise.
    ReleaseIfOwner,
    /// Decrements the integer at `KEYS[1]` by `ARGV[1]` if it is large enough.
    /// Replies with the new value, [`MIRROR_MISSING`] or [`MIRROR_INSUFFICIENT`].
    DecrementIfSufficient,
    /// Adds `ARGV[1]` to the integer at `KEYS[1]` only if the key exists.
    /// Replies with the new value or [`MIRROR_MISSING`].
    IncrementIfPresent,
}

impl CacheScript {
    /// Returns the Lua source of the script.
    pub const fn lua(self) -> &'static str {
        match self {
            CacheScript::ReleaseIfOwner => RELEASE_IF_OWNER_LUA,
            CacheScript::DecrementIfSufficient => DECREMENT_IF_SUFFICIENT_LUA,
            CacheScript::IncrementIfPresent => INCREMENT_IF_PRESENT_LUA,
        }
    }

    /// Returns a short name for logs.
    pub const fn name(self) -> &'static str {
        match self {
            CacheScript::ReleaseIfOwner => "release_if_owner",
            CacheScript::DecrementIfSufficient => "decrement_if_sufficient",
            CacheScript::IncrementIfPresent => "increment_if_present",
        }
    }
}

/// The write a script performs on its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptWrite {
    Unchanged,
    Delete,
    /// Replaces the value, keeping any existing expiry.
    Set(String),
}

/// Result of evaluating a script against the current value of its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutcome {
    pub reply: i64,
    pub write: ScriptWrite,
}

impl ScriptOutcome {
    fn unchanged(reply: i64) -> Self {
        Self {
            reply,
            write: ScriptWrite::Unchanged,
        }
    }
}

/// Evaluates a script against the current value of `KEYS[1]`.
///
/// The caller is responsible for holding whatever lock makes the read of
/// `current` and the application of the returned write indivisible.
///
/// # Examples
///
/// ```
/// use stocklock_core::cache::{evaluate_script, CacheScript, ScriptWrite};
///
/// let outcome = evaluate_script(CacheScript::DecrementIfSufficient, Some("10"), &["3"]).unwrap();
/// assert_eq!(outcome.reply, 7);
/// assert_eq!(outcome.write, ScriptWrite::Set("7".to_string()));
/// ```
pub fn evaluate_script(
    script: CacheScript,
    current: Option<&str>,
    args: &[&str],
) -> Result<ScriptOutcome> {
    let arg = args.first().copied().ok_or_else(|| {
        CacheError::OperationFailed(format!("{} expects one argument", script.name()))
    })?;

    match script {
        CacheScript::ReleaseIfOwner => {
            if current == Some(arg) {
                Ok(ScriptOutcome {
                    reply: 1,
                    write: ScriptWrite::Delete,
                })
            } else {
                Ok(ScriptOutcome::unchanged(0))
            }
        }
        CacheScript::DecrementIfSufficient => {
            let amount: i64 = arg
                .parse()
                .map_err(|_| CacheError::InvalidValue(format!("amount {arg:?} is not an integer")))?;

            // Mirrors Lua's tonumber(): anything unparsable counts as absent.
            let Some(value) = current.and_then(|v| v.parse::<i64>().ok()) else {
                return Ok(ScriptOutcome::unchanged(MIRROR_MISSING));
            };

            if value >= amount {
                let remaining = value - amount;
                Ok(ScriptOutcome {
                    reply: remaining,
                    write: ScriptWrite::Set(remaining.to_string()),
                })
            } else {
                Ok(ScriptOutcome::unchanged(MIRROR_INSUFFICIENT))
            }
        }
        CacheScript::IncrementIfPresent => {
            let delta: i64 = arg
                .parse()
                .map_err(|_| CacheError::InvalidValue(format!("delta {arg:?} is not an integer")))?;

            let Some(value) = current.and_then(|v| v.parse::<i64>().ok()) else {
                return Ok(ScriptOutcome::unchanged(MIRROR_MISSING));
            };

            let next = value
                .checked_add(delta)
                .ok_or_else(|| CacheError::InvalidValue(format!("{value} + {delta} overflows")))?;
            Ok(ScriptOutcome {
                reply: next,
                write: ScriptWrite::Set(next.to_string()),
            })
        }
    }
}

/// Decoded reply of [`CacheScript::DecrementIfSufficient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementReply {
    Missing,
    Insufficient,
    Remaining(i64),
}

/// Decodes the sentinel-encoded reply of the decrement script.
pub fn decode_decrement_reply(reply: i64) -> Result<DecrementReply> {
    match reply {
        MIRROR_MISSING => Ok(DecrementReply::Missing),
        MIRROR_INSUFFICIENT => Ok(DecrementReply::Insufficient),
        n if n >= 0 => Ok(DecrementReply::Remaining(n)),
        n => Err(CacheError::InvalidValue(format!(
            "unexpected decrement script reply {n}"
        ))),
    }
}
