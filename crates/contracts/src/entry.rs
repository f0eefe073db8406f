//! Entry - one mutation decoded from the source stream
//!
//! Readers create entries with only `db` and `argv` filled in; `parse()`
//! derives the command name, group and keys exactly once before the entry
//! is handed to a writer.

use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Group reported for commands missing from the command table
pub const UNKNOWN_GROUP: &str = "unknown";

/// A single source-side command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Logical database the command applies to
    #[serde(default)]
    pub db: i32,

    /// Command and its operands, in wire order
    pub argv: Vec<String>,

    /// Upper-cased `argv[0]`, filled by `parse()`
    #[serde(skip)]
    pub cmd_name: String,

    /// Command group, filled by `parse()`
    #[serde(skip)]
    pub group: &'static str,

    /// Key operands, filled by `parse()`
    #[serde(skip)]
    pub keys: Vec<String>,
}

impl Entry {
    /// Create an unparsed entry on db 0
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            ..Default::default()
        }
    }

    /// Create an unparsed entry from anything string-like
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(args.into_iter().map(Into::into).collect())
    }

    /// Set the logical database
    pub fn with_db(mut self, db: i32) -> Self {
        self.db = db;
        self
    }

    /// Fill the derived fields
    ///
    /// # Errors
    /// Returns `EntryParse` when `argv` is empty.
    pub fn parse(&mut self) -> Result<(), ContractError> {
        let Some(first) = self.argv.first() else {
            return Err(ContractError::EntryParse {
                message: "empty argv".to_string(),
            });
        };

        self.cmd_name = first.to_ascii_uppercase();

        match find_spec(&self.cmd_name) {
            Some(spec) => {
                self.group = spec.group;
                self.keys = spec.keys(&self.argv);
            }
            None => {
                self.group = UNKNOWN_GROUP;
                self.keys = self.argv.get(1).cloned().into_iter().collect();
            }
        }

        Ok(())
    }

    /// Whether `parse()` already ran
    pub fn is_parsed(&self) -> bool {
        !self.cmd_name.is_empty()
    }

    /// Arguments joined by a single space
    pub fn to_text(&self) -> String {
        self.argv.join(" ")
    }
}

/// Key position spec for one command
///
/// `last_key` counts from the end when negative (-1 = last argument).
/// `first_key == 0` means the command has no keys.
#[derive(Debug, Clone, Copy)]
struct CommandSpec {
    name: &'static str,
    group: &'static str,
    first_key: usize,
    last_key: i32,
    step: usize,
}

impl CommandSpec {
    const fn new(
        name: &'static str,
        group: &'static str,
        first_key: usize,
        last_key: i32,
        step: usize,
    ) -> Self {
        Self {
            name,
            group,
            first_key,
            last_key,
            step,
        }
    }

    fn keys(&self, argv: &[String]) -> Vec<String> {
        if self.first_key == 0 || self.first_key >= argv.len() {
            return Vec::new();
        }

        let last = if self.last_key < 0 {
            argv.len() as i64 + self.last_key as i64
        } else {
            self.last_key as i64
        };
        let last = last.min(argv.len() as i64 - 1);
        if last < self.first_key as i64 {
            return Vec::new();
        }

        (self.first_key..=last as usize)
            .step_by(self.step.max(1))
            .map(|i| argv[i].clone())
            .collect()
    }
}

const COMMAND_SPECS: &[CommandSpec] = &[
    // string
    CommandSpec::new("APPEND", "string", 1, 1, 1),
    CommandSpec::new("DECR", "string", 1, 1, 1),
    CommandSpec::new("DECRBY", "string", 1, 1, 1),
    CommandSpec::new("GETSET", "string", 1, 1, 1),
    CommandSpec::new("INCR", "string", 1, 1, 1),
    CommandSpec::new("INCRBY", "string", 1, 1, 1),
    CommandSpec::new("INCRBYFLOAT", "string", 1, 1, 1),
    CommandSpec::new("MSET", "string", 1, -1, 2),
    CommandSpec::new("MSETNX", "string", 1, -1, 2),
    CommandSpec::new("PSETEX", "string", 1, 1, 1),
    CommandSpec::new("SET", "string", 1, 1, 1),
    CommandSpec::new("SETEX", "string", 1, 1, 1),
    CommandSpec::new("SETNX", "string", 1, 1, 1),
    CommandSpec::new("SETRANGE", "string", 1, 1, 1),
    // generic
    CommandSpec::new("COPY", "generic", 1, 2, 1),
    CommandSpec::new("DEL", "generic", 1, -1, 1),
    CommandSpec::new("EXPIRE", "generic", 1, 1, 1),
    CommandSpec::new("EXPIREAT", "generic", 1, 1, 1),
    CommandSpec::new("PERSIST", "generic", 1, 1, 1),
    CommandSpec::new("PEXPIRE", "generic", 1, 1, 1),
    CommandSpec::new("PEXPIREAT", "generic", 1, 1, 1),
    CommandSpec::new("RENAME", "generic", 1, 2, 1),
    CommandSpec::new("RENAMENX", "generic", 1, 2, 1),
    CommandSpec::new("RESTORE", "generic", 1, 1, 1),
    CommandSpec::new("UNLINK", "generic", 1, -1, 1),
    // hash
    CommandSpec::new("HDEL", "hash", 1, 1, 1),
    CommandSpec::new("HINCRBY", "hash", 1, 1, 1),
    CommandSpec::new("HINCRBYFLOAT", "hash", 1, 1, 1),
    CommandSpec::new("HMSET", "hash", 1, 1, 1),
    CommandSpec::new("HSET", "hash", 1, 1, 1),
    CommandSpec::new("HSETNX", "hash", 1, 1, 1),
    // list
    CommandSpec::new("LINSERT", "list", 1, 1, 1),
    CommandSpec::new("LPOP", "list", 1, 1, 1),
    CommandSpec::new("LPUSH", "list", 1, 1, 1),
    CommandSpec::new("LREM", "list", 1, 1, 1),
    CommandSpec::new("LSET", "list", 1, 1, 1),
    CommandSpec::new("LTRIM", "list", 1, 1, 1),
    CommandSpec::new("RPOP", "list", 1, 1, 1),
    CommandSpec::new("RPUSH", "list", 1, 1, 1),
    // set
    CommandSpec::new("SADD", "set", 1, 1, 1),
    CommandSpec::new("SMOVE", "set", 1, 2, 1),
    CommandSpec::new("SREM", "set", 1, 1, 1),
    // sorted set
    CommandSpec::new("ZADD", "sorted_set", 1, 1, 1),
    CommandSpec::new("ZINCRBY", "sorted_set", 1, 1, 1),
    CommandSpec::new("ZREM", "sorted_set", 1, 1, 1),
    CommandSpec::new("ZREMRANGEBYSCORE", "sorted_set", 1, 1, 1),
    // stream / hyperloglog
    CommandSpec::new("PFADD", "hyperloglog", 1, 1, 1),
    CommandSpec::new("PFMERGE", "hyperloglog", 1, -1, 1),
    CommandSpec::new("XADD", "stream", 1, 1, 1),
    CommandSpec::new("XDEL", "stream", 1, 1, 1),
    CommandSpec::new("XTRIM", "stream", 1, 1, 1),
    // keyless
    CommandSpec::new("EXEC", "transactions", 0, 0, 0),
    CommandSpec::new("FLUSHALL", "server", 0, 0, 0),
    CommandSpec::new("FLUSHDB", "server", 0, 0, 0),
    CommandSpec::new("MULTI", "transactions", 0, 0, 0),
    CommandSpec::new("PING", "connection", 0, 0, 0),
    CommandSpec::new("PUBLISH", "pubsub", 0, 0, 0),
    CommandSpec::new("SELECT", "connection", 0, 0, 0),
    CommandSpec::new("SWAPDB", "server", 0, 0, 0),
];

fn find_spec(cmd_name: &str) -> Option<&'static CommandSpec> {
    COMMAND_SPECS.iter().find(|spec| spec.name == cmd_name)
}
