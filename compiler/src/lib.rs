#![allow(clippy::new_without_default)]
#![allow(clippy::too_many_arguments)]

mod llvm;

#[cfg(test)]
mod test;

pub mod compiler;
pub mod config;
pub mod hash;
pub mod layout;
pub mod target;
