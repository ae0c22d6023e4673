//! The rotation-fair queue engine.
//!
//! Everything in here is storage agnostic: the rotators that decide whose turn
//! it is, the linked-list queue every member of a room owns, and the rules for
//! vetoing what was just played. Persistence lives in `radiotation-collab`.

mod config;
mod history;
mod queuing;
mod room;
mod rotation;
mod track;
mod util;

pub use config::*;
pub use history::*;
pub use queuing::*;
pub use room::*;
pub use rotation::*;
pub use track::*;
pub use util::*;
