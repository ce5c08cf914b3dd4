pub mod common;
pub mod deobfuscate;
