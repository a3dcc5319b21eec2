//! Core primitives shared by the game and network layers.

pub mod code;

pub use code::SessionCode;
