//! Oracle DDL/DCL script generation.
//!
//! [`builder`] turns table descriptors into structured [`Statement`]s and
//! [`render`] serializes them; [`generator`] wires both to a live source.

pub mod builder;
pub mod generator;
pub mod identifiers;
pub mod render;
pub mod roles;
pub mod statements;

pub use generator::{generate_from_source, generate_scripts, ScriptGenerationResult, ScriptRequest};
pub use statements::{Script, Section, Statement};
