/*!
Command modules.

Layout:
  src/cmd/
    mod.rs        (this file)
    minion.rs     (MinionId / MinionArg + CLI binding)
    dispatch.rs   (Dispatcher: gen_accept / delete + JSON line output)
    rpc.rs        (lowstate request parsing + execute_request)

Conventions:
  - The CLI flags and the RPC path both end in `Dispatcher::emit_*`, so the
    JSON written to stdout is identical whichever surface was used.
  - Everything returns `anyhow::Result`; backend errors are never swallowed.
*/

pub mod dispatch;
pub mod minion;
pub mod rpc;

pub use dispatch::Dispatcher;
pub use minion::MinionArg;
pub use rpc::execute_request;
