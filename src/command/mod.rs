pub mod hash;
pub mod server_cmd;
pub mod string;

use crate::error::RespiteError;
use crate::persistence::aof::SharedAof;
use crate::resp::RespValue;
use crate::store::SharedStore;
use std::sync::Arc;
use tracing::{debug, error};

/// Every command the server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ping,
    Set,
    Get,
    HSet,
    HGet,
}

/// Number of arguments a command accepts, not counting its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exact(want) => n == want,
            Arity::Range(min, max) => (min..=max).contains(&n),
        }
    }
}

impl Command {
    pub const ALL: [Command; 5] = [
        Command::Ping,
        Command::Set,
        Command::Get,
        Command::HSet,
        Command::HGet,
    ];

    /// Case-insensitive lookup in the command table.
    pub fn lookup(name: &str) -> Option<Command> {
        match name.to_ascii_uppercase().as_str() {
            "PING" => Some(Command::Ping),
            "SET" => Some(Command::Set),
            "GET" => Some(Command::Get),
            "HSET" => Some(Command::HSet),
            "HGET" => Some(Command::HGet),
            _ => None,
        }
    }

    /// Lower-case name, as used in error replies.
    pub fn name(self) -> &'static str {
        match self {
            Command::Ping => "ping",
            Command::Set => "set",
            Command::Get => "get",
            Command::HSet => "hset",
            Command::HGet => "hget",
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            Command::Ping => Arity::Range(0, 1),
            Command::Set => Arity::Exact(2),
            Command::Get => Arity::Exact(1),
            Command::HSet => Arity::Exact(3),
            Command::HGet => Arity::Exact(2),
        }
    }

    /// Whether the command mutates the store and must reach the AOF.
    pub fn is_write(self) -> bool {
        matches!(self, Command::Set | Command::HSet)
    }
}

/// Interprets requests against the store and, when attached, records writes
/// in the append-only file.
pub struct Engine {
    store: SharedStore,
    aof: Option<SharedAof>,
}

pub type SharedEngine = Arc<Engine>;

impl Engine {
    pub fn new(store: SharedStore) -> Self {
        Engine { store, aof: None }
    }

    /// Log every accepted write to `aof` from now on.
    pub fn with_aof(mut self, aof: SharedAof) -> Self {
        self.aof = Some(aof);
        self
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn aof(&self) -> Option<&SharedAof> {
        self.aof.as_ref()
    }

    /// Execute a decoded client request: an array whose first element is the
    /// command name.
    pub async fn handle(&self, request: RespValue) -> RespValue {
        self.handle_inner(request, true).await
    }

    /// Execute a request read back from the AOF. Writes are not logged again.
    pub async fn replay(&self, request: RespValue) -> RespValue {
        self.handle_inner(request, false).await
    }

    /// Execute `cmd_name` with `args`.
    pub async fn execute(&self, cmd_name: &str, args: &[RespValue]) -> RespValue {
        self.execute_inner(cmd_name, args, true).await
    }

    async fn handle_inner(&self, request: RespValue, log: bool) -> RespValue {
        let items = match request {
            RespValue::Array(items) if !items.is_empty() => items,
            _ => return RespiteError::InvalidRequest.to_resp(),
        };

        let cmd_name = match items[0].to_string_lossy() {
            Some(name) => name,
            None => return RespiteError::InvalidCommandName.to_resp(),
        };

        self.execute_inner(&cmd_name, &items[1..], log).await
    }

    async fn execute_inner(&self, cmd_name: &str, args: &[RespValue], log: bool) -> RespValue {
        let Some(cmd) = Command::lookup(cmd_name) else {
            debug!("Unknown command {cmd_name:?}");
            return RespiteError::UnknownCommand(single_line(cmd_name), args_preview(args))
                .to_resp();
        };

        if !cmd.arity().accepts(args.len()) {
            return wrong_arg_count(cmd.name());
        }

        if args.iter().any(|arg| arg.as_bytes().is_none()) {
            return RespiteError::InvalidArgument.to_resp();
        }

        // Log write commands to AOF before executing
        if log
            && cmd.is_write()
            && let Some(aof) = &self.aof
            && let Err(e) = aof.log_command(cmd_name, args).await
        {
            error!("AOF append failed for {}: {e}", cmd.name());
            return RespiteError::Persistence(e).to_resp();
        }

        dispatch(cmd, args, &self.store).await
    }
}

/// Route a validated command to its handler.
pub async fn dispatch(cmd: Command, args: &[RespValue], store: &SharedStore) -> RespValue {
    match cmd {
        Command::Ping => server_cmd::cmd_ping(args),
        Command::Set => string::cmd_set(args, store).await,
        Command::Get => string::cmd_get(args, store).await,
        Command::HSet => hash::cmd_hset(args, store).await,
        Command::HGet => hash::cmd_hget(args, store).await,
    }
}

/// Error replies are single-line; client text echoed into one must not
/// carry line breaks.
fn single_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

fn args_preview(args: &[RespValue]) -> String {
    args.iter()
        .take(3)
        .filter_map(|a| a.to_string_lossy())
        .map(|s| format!("'{}'", single_line(&s)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Payload of an argument that `Engine` has already checked is a bulk string.
pub(crate) fn bulk(arg: &RespValue) -> &[u8] {
    arg.as_bytes().unwrap_or_default()
}

pub fn wrong_arg_count(cmd: &str) -> RespValue {
    RespiteError::WrongArgCount(cmd.to_string()).to_resp()
}
