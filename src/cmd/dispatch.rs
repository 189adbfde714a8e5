/*!
`dispatch.rs`

The two key operations, shared by the CLI flags and the RPC request path.

  gen_accept(minion) -> Vec<Value>
      Single      : one `gen_accept([id])` call, wrapped in a one-element list
      Multiple    : one call per id, sequential, results in input order
      absent      : empty list, no calls

  delete(minion) -> Value
      Single      : one async `delete_by_match(id)` submission
      Multiple    : one async `delete_by_set(ids)` submission
      absent      : `{}`, no calls

`delete` hands back the job acknowledgement only. The deletion may still be
running (or fail) after the process exits; poll the master's job cache with
the returned jid if confirmation is needed.

`emit_*` write exactly one JSON line per invocation.
*/

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::Write;
use tracing::debug;

use crate::cmd::minion::MinionArg;
use crate::wheel::WheelClient;

pub struct Dispatcher<C> {
    client: C,
}

impl<C: WheelClient> Dispatcher<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn gen_accept(&self, minion: Option<&MinionArg>) -> Result<Vec<Value>> {
        let Some(minion) = minion else {
            return Ok(Vec::new());
        };
        let mut results = Vec::with_capacity(minion.len());
        for id in minion.ids() {
            debug!(minion = %id, "generating and accepting key");
            let res = self
                .client
                .gen_accept(std::slice::from_ref(id))
                .with_context(|| format!("key.gen_accept failed for minion '{id}'"))?;
            results.push(res);
        }
        Ok(results)
    }

    pub fn delete(&self, minion: Option<&MinionArg>) -> Result<Value> {
        match minion {
            None => Ok(Value::Object(Default::default())),
            Some(MinionArg::Single(id)) => self
                .client
                .delete_by_match(id.as_str())
                .with_context(|| format!("key.delete submission failed for '{id}'")),
            Some(MinionArg::Multiple(ids)) => self
                .client
                .delete_by_set(ids)
                .with_context(|| {
                    format!("key.delete_dict submission failed for {} minions", ids.len())
                }),
        }
    }

    /// Run `gen_accept` and write its JSON line to `out`.
    pub fn emit_gen_accept(&self, minion: Option<&MinionArg>, out: &mut impl Write) -> Result<()> {
        let res = self.gen_accept(minion)?;
        write_json_line(out, &res)
    }

    /// Run `delete` and write its JSON line to `out`.
    pub fn emit_delete(&self, minion: Option<&MinionArg>, out: &mut impl Write) -> Result<()> {
        let res = self.delete(minion)?;
        write_json_line(out, &res)
    }
}

fn write_json_line<T: serde::Serialize + ?Sized>(out: &mut impl Write, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value).context("Failed to serialize result")?;
    writeln!(out).context("Failed to write result")?;
    out.flush().context("Failed to flush output")
}
