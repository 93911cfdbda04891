mod checksum;
mod disp;
mod error;
mod ls_type;
mod lsa;
mod parser;
mod typ;
mod util;

pub use checksum::*;
pub use error::OspfParseError;
pub use ls_type::{FloodScope, OspfLsType};
pub use lsa::*;
pub use parser::*;
pub use typ::OspfType;
pub use util::{Emit, ParseBe};
