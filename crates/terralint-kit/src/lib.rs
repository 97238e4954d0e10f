#[macro_use]
extern crate serde_derive;

#[macro_use]
mod macros;

pub use hcl_edit as hcl;
pub use indexmap;
pub use indoc::formatdoc;
pub use indoc::indoc;
pub use serde;
pub use serde_json;

pub mod helpers;
pub mod types;
