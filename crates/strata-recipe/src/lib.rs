//! # strata-recipe
//!
//! The `.stra` deployment recipe language: lexing, parsing, and static
//! validation. A recipe declares, per service, every build-time value the
//! image builder and process launcher need — base image, working directory,
//! dependency manifest, source tree, exposed port, and startup command.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod validator;

pub use ast::{RecipeFile, ServiceDecl, ServiceRecipe};
pub use parser::parse_recipe;
