//! Output side: binary containers, text listings and the opcode include.
pub mod bin;
pub mod c;
pub mod drama;
pub mod listing;
pub mod plop;
