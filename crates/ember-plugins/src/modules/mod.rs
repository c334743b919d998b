//! The concrete capability modules.

mod clients;
mod console;
mod keyvalue;
mod plugin;
mod socket;

pub use clients::ClientsModule;
pub use console::{ConsoleBuffer, ConsoleModule};
pub use keyvalue::{KeyValueError, KeyValueModule, parse_keyvalues};
pub use plugin::PluginModule;
pub use socket::{ScriptSocket, SocketModule};
