/*!
`rpc.rs`

Lowstate-style request surface for job-execution clients.

Request shape (one object, or a list processed in order):
{
  "fun":   "modify_keys.gen_accept" | "modify_keys.delete"   (prefix optional)
  "arg":   "web-1" | ["web-1"] | [["web-1","web-2"]]         (positional)
  "kwarg": { "minion": "web-1" | ["web-1","web-2"] }
  ...      (client / token / anything else is ignored)
}

Positional handling mirrors the runner client: a bare string is a single
positional value, a list is the positional list. Only one positional
(`minion`) is accepted. Keys starting with `__` inside `kwarg` are
publisher metadata and skipped.
*/

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::io::Write;
use tracing::debug;

use crate::cmd::dispatch::Dispatcher;
use crate::cmd::minion::MinionArg;
use crate::wheel::WheelClient;

const MODULE_PREFIX: &str = "modify_keys.";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RpcError {
    #[error("unknown function '{0}' (expected gen_accept or delete)")]
    UnknownFunction(String),
    #[error("{0}() takes at most 1 positional argument ({1} given)")]
    TooManyPositional(RpcFunction, usize),
    #[error("{0}() got multiple values for argument 'minion'")]
    DuplicateMinion(RpcFunction),
    #[error("{0}() got an unexpected keyword argument '{1}'")]
    UnexpectedKwarg(RpcFunction, String),
    #[error("invalid minion argument: {0}")]
    InvalidMinion(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcFunction {
    GenAccept,
    Delete,
}

impl RpcFunction {
    pub fn parse(fun: &str) -> Result<Self, RpcError> {
        let name = fun.trim();
        match name.strip_prefix(MODULE_PREFIX).unwrap_or(name) {
            "gen_accept" => Ok(RpcFunction::GenAccept),
            "delete" => Ok(RpcFunction::Delete),
            _ => Err(RpcError::UnknownFunction(fun.to_string())),
        }
    }
}

impl fmt::Display for RpcFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RpcFunction::GenAccept => "gen_accept",
            RpcFunction::Delete => "delete",
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub fun: String,
    #[serde(default)]
    pub arg: Option<Value>,
    #[serde(default)]
    pub kwarg: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Lowstate {
    Batch(Vec<RpcRequest>),
    One(RpcRequest),
}

impl RpcRequest {
    pub fn function(&self) -> Result<RpcFunction, RpcError> {
        RpcFunction::parse(&self.fun)
    }

    /// Bind `arg` / `kwarg` to the single `minion` parameter.
    pub fn minion(&self, fun: RpcFunction) -> Result<Option<MinionArg>, RpcError> {
        let positional: Vec<&Value> = match &self.arg {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().collect(),
            Some(other) => vec![other],
        };
        if positional.len() > 1 {
            return Err(RpcError::TooManyPositional(fun, positional.len()));
        }

        let mut keyword = None;
        for (key, value) in &self.kwarg {
            if key.starts_with("__") {
                continue;
            }
            if key != "minion" {
                return Err(RpcError::UnexpectedKwarg(fun, key.clone()));
            }
            keyword = Some(value);
        }

        let value = match (positional.first().copied(), keyword) {
            (Some(_), Some(_)) => return Err(RpcError::DuplicateMinion(fun)),
            (Some(v), None) | (None, Some(v)) => v,
            (None, None) => return Ok(None),
        };
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value::<MinionArg>(value.clone())
            .map(|m| Some(m).filter(|m| !m.is_empty()))
            .map_err(|e| RpcError::InvalidMinion(e.to_string()))
    }
}

/// Parse one request (or a list) from `input`, dispatch each in order and
/// write one JSON line per request to `out`.
///
/// A batch is rejected as a whole if any entry is malformed.
pub fn execute_request<C: WheelClient>(
    dispatcher: &Dispatcher<C>,
    input: &str,
    out: &mut impl Write,
) -> Result<()> {
    let lowstate: Lowstate = serde_json::from_str(input).context("Failed to parse RPC request")?;
    let requests = match lowstate {
        Lowstate::Batch(reqs) => reqs,
        Lowstate::One(req) => vec![req],
    };

    // Bind every request before the first one reaches the backend.
    let bound = requests
        .iter()
        .map(|req| {
            let fun = req.function()?;
            Ok((fun, req.minion(fun)?))
        })
        .collect::<Result<Vec<_>, RpcError>>()?;

    for (idx, (fun, minion)) in bound.iter().enumerate() {
        let count = minion.as_ref().map_or(0, MinionArg::len);
        debug!(index = idx, %fun, count, "dispatching request");
        match fun {
            RpcFunction::GenAccept => dispatcher.emit_gen_accept(minion.as_ref(), out)?,
            RpcFunction::Delete => dispatcher.emit_delete(minion.as_ref(), out)?,
        }
    }
    Ok(())
}
