/// Actor catalogue
///
/// Sources produce tokens, transformers turn one token into another, sinks
/// consume tokens. Control actors live in `control`, clustering actors in
/// `crate::clustering`.

pub mod command;
pub mod control;
pub mod sink;
pub mod source;
pub mod transformer;

pub use command::Command;
pub use sink::{DumpFile, Null};
pub use source::{Constants, ForLoop};
pub use transformer::{ContainerValuePicker, PassThrough};
