use tokio::sync::oneshot;

use crate::config::RowShape;
use crate::error::BridgeError;
use crate::events::SharedEventSink;
use crate::params::Params;
use crate::types::{ExecOutcome, StepOutcome};

pub(super) type Responder<T> = oneshot::Sender<Result<T, BridgeError>>;

/// Where `exec` sends each row while the statement runs.
pub(crate) struct RowEmitter {
    pub(crate) event: String,
    pub(crate) sink: SharedEventSink,
    pub(crate) shape: RowShape,
}

pub(super) enum Command {
    Exec {
        sql: String,
        params: Params,
        emitter: Option<RowEmitter>,
        respond_to: Responder<ExecOutcome>,
    },
    Prepare {
        statement_id: String,
        sql: String,
        params: Params,
        respond_to: Responder<()>,
    },
    Step {
        statement_id: String,
        respond_to: Responder<StepOutcome>,
    },
    Finalize {
        statement_id: String,
        respond_to: Responder<()>,
    },
    Close {
        finalize_statements: bool,
        respond_to: Responder<()>,
    },
    Shutdown,
}
