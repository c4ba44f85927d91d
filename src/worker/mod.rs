// Database worker - one thread per open database
//
// - channel: command enum sent to the worker
// - manager: async handle that sends commands and awaits replies
// - dispatcher: the worker loop that owns the connection and its statements

mod channel;
mod dispatcher;
mod manager;

pub(crate) use channel::RowEmitter;
pub(crate) use manager::DatabaseWorker;
