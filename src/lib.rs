//! Builds the CloudFormation template for a Plex media server stack.
//!
//! Declarations go into a [`Template`]; references between them stay as
//! placeholders until [`Template::render`] resolves them, so resources can be
//! declared in any order.

pub mod bootstrap;
pub mod config;
pub mod expr;
pub mod resources;
pub mod stack;
pub mod template;
pub mod writer;

pub use expr::{Expr, Pseudo};
pub use template::{Format, ParameterType, Template};
