//! Declared Atomic Scripts
//!
//! Check-and-act sequences that must execute without interleaving from other
//! clients. Each variant ships the Lua source a Redis-compatible backend runs;
//! [`Keyspace`](super::Keyspace) executes the same semantics under its lock.

/// A declared check-and-act script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    /// `KEYS[1]`, `ARGV[1]` = owner token. Deletes the key iff its value is the
    /// token. Replies `1` when deleted, `0` otherwise.
    CompareAndDelete,
    /// `KEYS[1]`, `ARGV[1]` = window seconds, `ARGV[2]` = limit. Increments the
    /// counter, starts the window on the first hit, replies `0` when the
    /// post-increment count exceeds the limit and the count otherwise.
    FixedWindowIncrement,
    /// `KEYS[1]` written, `KEYS[2]` evicted, `ARGV[1]` = value, `ARGV[2]` = ttl.
    /// Replies `1`.
    SetAndEvict,
    /// `KEYS[1..=n]` written, `KEYS[n+1..=2n]` evicted pairwise, `ARGV[1..=n]` =
    /// values, `ARGV[n+1]` = ttl. Replies `n`.
    MultiSetAndEvict,
}

const COMPARE_AND_DELETE: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

const FIXED_WINDOW_INCREMENT: &str = r#"
local current = redis.call("incr", KEYS[1])
if current == 1 then
    redis.call("expire", KEYS[1], ARGV[1])
end
if current > tonumber(ARGV[2]) then
    return 0
else
    return current
end
"#;

const SET_AND_EVICT: &str = r#"
redis.call("set", KEYS[1], ARGV[1], "EX", ARGV[2])
redis.call("del", KEYS[2])
return 1
"#;

const MULTI_SET_AND_EVICT: &str = r#"
local n = #KEYS / 2
local ttl = ARGV[n + 1]
for i = 1, n do
    redis.call("set", KEYS[i], ARGV[i], "EX", ttl)
    redis.call("del", KEYS[n + i])
end
return n
"#;

impl Script {
    /// Lua source for Redis-compatible backends.
    pub fn source(&self) -> &'static str {
        match self {
            Script::CompareAndDelete => COMPARE_AND_DELETE,
            Script::FixedWindowIncrement => FIXED_WINDOW_INCREMENT,
            Script::SetAndEvict => SET_AND_EVICT,
            Script::MultiSetAndEvict => MULTI_SET_AND_EVICT,
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Script::CompareAndDelete => "compare_and_delete",
            Script::FixedWindowIncrement => "fixed_window_increment",
            Script::SetAndEvict => "set_and_evict",
            Script::MultiSetAndEvict => "multi_set_and_evict",
        }
    }

    /// Whether a call with `keys` KEYS and `args` ARGV entries matches the script.
    pub fn accepts(&self, keys: usize, args: usize) -> bool {
        match self {
            Script::CompareAndDelete => keys == 1 && args == 1,
            Script::FixedWindowIncrement => keys == 1 && args == 2,
            Script::SetAndEvict => keys == 2 && args == 2,
            Script::MultiSetAndEvict => keys > 0 && keys % 2 == 0 && args == keys / 2 + 1,
        }
    }

    /// Expected shape of the call, for error messages.
    pub fn arity(&self) -> &'static str {
        match self {
            Script::CompareAndDelete => "1 key and 1 arg",
            Script::FixedWindowIncrement => "1 key and 2 args",
            Script::SetAndEvict => "2 keys and 2 args",
            Script::MultiSetAndEvict => "2n keys and n+1 args",
        }
    }
}
