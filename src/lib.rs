//! # mongoqs
//!
//! Compiles URL-style query parameters into document database query
//! descriptors: a filter plus a nested populate directive.
//!
//! ## Quick Example
//!
//! ```rust
//! let populate = mongoqs::compile_populate("createdBy:friends.name,createdBy.name,likedBy").unwrap();
//!
//! assert_eq!(populate.len(), 2);
//! assert_eq!(populate[0].path, "createdBy");
//! assert_eq!(populate[0].select.as_deref(), Some("name"));
//! ```
//!
//! ## Populate Grammar
//!
//! | Symbol | Meaning                                 |
//! |--------|-----------------------------------------|
//! | `,`    | Separates independent expressions       |
//! | `:`    | Descends into a nested relation         |
//! | `.`    | Selects a field (last segment only)     |

pub mod config;
pub mod engine;
pub mod error;
pub mod parser;
pub mod populate;

pub mod prelude {
    pub use crate::config::ParserOptions;
    pub use crate::engine::{
        DocumentFetcher, EqualityFilter, FilterCompiler, QueryDescriptor, QueryParser,
    };
    pub use crate::error::*;
    pub use crate::parser::{PathExpression, Segment};
    pub use crate::populate::{PopulateForest, PopulateNode, PopulateOptions, ToPopulate};
}

/// Compile a populate value into its descriptor array.
///
/// # Example
///
/// ```
/// let populate = mongoqs::compile_populate("a:b.c,a:b.d").unwrap();
/// let child = &populate[0].populate.as_ref().unwrap()[0];
/// assert_eq!(child.path, "b");
/// assert_eq!(child.select.as_deref(), Some("c d"));
/// ```
pub fn compile_populate(
    value: &str,
) -> Result<Vec<populate::PopulateOptions>, error::QueryError> {
    populate::compile(value).map(|forest| forest.to_options())
}
