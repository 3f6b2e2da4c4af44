mod actions;
pub(crate) mod args;

pub(crate) use actions::{handle_cert, handle_check, handle_reconcile, handle_request, handle_watch};
