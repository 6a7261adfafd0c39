//! Action handlers and the registry that maps action names to them.

mod builtin;
mod codec;
mod handler;
mod registry;

pub use builtin::{
    API_CALL, BUILTIN_ACTIONS, CODE_EXECUTION, CONTENT_GENERATION, Collaborators, DATA_ANALYSIS,
    DATA_EXTRACTION, FILE_OPERATION, PROCESS_FILE, SCHEDULE_REMINDER, SEND_MESSAGE,
    SEND_NOTIFICATION, SYSTEM_COMMAND, WEB_SEARCH, register_builtins,
};
pub use codec::{decode_params, encode_output};
pub use handler::{ActionHandler, FnHandler, HandlerError, TaskRef, handler_fn};
pub use registry::{HandlerRegistry, RegistryError};
