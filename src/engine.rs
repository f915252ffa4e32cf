//! Query compilation engine.
//!
//! Routes already-split query parameters: the populate parameter goes to the
//! populate compiler, everything else to a [`FilterCompiler`]. The resulting
//! [`QueryDescriptor`] is handed to a [`DocumentFetcher`], which owns the
//! actual database access.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::ParserOptions;
use crate::error::{QueryError, QueryResult};
use crate::parser;
use crate::populate::{PopulateForest, PopulateOptions, ToPopulate};

/// Compiles a single `key=value` pair into a filter entry.
///
/// Returning `Ok(None)` skips the pair.
pub trait FilterCompiler {
    fn compile(&self, key: &str, value: &str) -> QueryResult<Option<(String, Value)>>;
}

/// Plain string equality: `status=active` becomes `{"status": "active"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualityFilter;

impl FilterCompiler for EqualityFilter {
    fn compile(&self, key: &str, value: &str) -> QueryResult<Option<(String, Value)>> {
        if key.is_empty() {
            return Ok(None);
        }
        Ok(Some((key.to_string(), Value::String(value.to_string()))))
    }
}

/// Fetches root documents matching a filter, hydrated per the populate list.
pub trait DocumentFetcher {
    fn fetch(&self, collection: &str, query: &QueryDescriptor) -> QueryResult<Vec<Value>>;
}

/// A compiled query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryDescriptor {
    pub filter: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub populate: Vec<PopulateOptions>,
}

/// Compiles query parameters into a [`QueryDescriptor`].
#[derive(Debug, Clone, Default)]
pub struct QueryParser<F = EqualityFilter> {
    options: ParserOptions,
    filter: F,
}

impl QueryParser<EqualityFilter> {
    pub fn new(options: ParserOptions) -> Self {
        Self::with_filter(options, EqualityFilter)
    }
}

impl<F: FilterCompiler> QueryParser<F> {
    pub fn with_filter(options: ParserOptions, filter: F) -> Self {
        Self { options, filter }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Compile `(key, value)` pairs in order.
    ///
    /// Repeated populate parameters are joined with `,` before compiling.
    pub fn parse_pairs<I, K, V>(&self, pairs: I) -> QueryResult<QueryDescriptor>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut descriptor = QueryDescriptor::default();
        let mut populate_values: Vec<String> = Vec::new();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            if key == self.options.populate_key {
                populate_values.push(value.to_string());
                continue;
            }
            if let Some((field, condition)) = self.filter.compile(key, value)? {
                if descriptor.filter.insert(field.clone(), condition).is_some() {
                    tracing::warn!("Filter on '{}' given more than once, keeping the last", field);
                }
            }
        }

        if !populate_values.is_empty() {
            let forest = self.compile_populate(&populate_values.join(","))?;
            descriptor.populate = forest.to_populate();
        }

        Ok(descriptor)
    }

    /// Compile a populate value, enforcing the blacklist and depth limit.
    pub fn compile_populate(&self, value: &str) -> QueryResult<PopulateForest> {
        let exprs = parser::split_expressions(value)?;

        for expr in &exprs {
            if let Some(max) = self.options.max_depth {
                if expr.len() > max {
                    return Err(QueryError::malformed(
                        expr.source(),
                        format!("nests {} relations, limit is {}", expr.len(), max),
                    ));
                }
            }
            if let Some(segment) = expr
                .segments()
                .iter()
                .find(|s| self.options.is_blacklisted(s.relation()))
            {
                return Err(QueryError::Forbidden(segment.relation().to_string()));
            }
        }

        Ok(PopulateForest::from_expressions(&exprs))
    }

    /// Compile the pairs and run the query through `fetcher`.
    pub fn find<D, I, K, V>(&self, fetcher: &D, collection: &str, pairs: I) -> QueryResult<Vec<Value>>
    where
        D: DocumentFetcher,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let query = self.parse_pairs(pairs)?;
        fetcher.fetch(collection, &query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::RefCell;

    #[test]
    fn test_routes_populate_and_filter() {
        let parser = QueryParser::new(ParserOptions::default());
        let query = parser
            .parse_pairs([
                ("title", "Post 1"),
                ("populate", "createdBy.name,createdBy.email,likedBy"),
            ])
            .unwrap();

        assert_eq!(query.filter.get("title"), Some(&json!("Post 1")));
        assert_eq!(query.populate.len(), 2);
        assert_eq!(query.populate[0].path, "createdBy");
        assert_eq!(query.populate[0].select.as_deref(), Some("name email"));
        assert_eq!(query.populate[1].path, "likedBy");
        assert_eq!(query.populate[1].select, None);
    }

    #[test]
    fn test_repeated_populate_params_merge() {
        let parser = QueryParser::new(ParserOptions::default());
        let query = parser
            .parse_pairs([("populate", "a.x"), ("populate", "b,a.y")])
            .unwrap();
        let paths: Vec<&str> = query.populate.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "b"]);
        assert_eq!(query.populate[0].select.as_deref(), Some("x y"));
    }

    #[test]
    fn test_custom_populate_key() {
        let options = ParserOptions::builder().populate_key("expand").build();
        let parser = QueryParser::new(options);
        let query = parser
            .parse_pairs([("expand", "author"), ("populate", "x")])
            .unwrap();
        assert_eq!(query.populate[0].path, "author");
        assert_eq!(query.filter.get("populate"), Some(&json!("x")));
    }

    #[test]
    fn test_no_populate_param() {
        let parser = QueryParser::new(ParserOptions::default());
        let query = parser.parse_pairs([("title", "x")]).unwrap();
        assert!(query.populate.is_empty());
        assert_eq!(serde_json::to_value(&query).unwrap(), json!({ "filter": { "title": "x" } }));
    }

    #[test]
    fn test_blacklist_applies_at_any_depth() {
        let options = ParserOptions::builder().blacklist("secrets").build();
        let parser = QueryParser::new(options);
        match parser.compile_populate("createdBy:secrets.key") {
            Err(QueryError::Forbidden(name)) => assert_eq!(name, "secrets"),
            other => panic!("expected forbidden, got {:?}", other),
        }
    }

    #[test]
    fn test_matches_plain_compile_without_restrictions() {
        let parser = QueryParser::new(ParserOptions::default());
        let value = "createdBy:friends.name,createdBy.email,attachments:link";
        assert_eq!(
            parser.compile_populate(value).unwrap(),
            crate::populate::compile(value).unwrap()
        );
    }

    #[test]
    fn test_max_depth() {
        let options = ParserOptions::builder().max_depth(2).build();
        let parser = QueryParser::new(options);
        assert!(parser.compile_populate("a:b.c").is_ok());
        assert!(matches!(
            parser.compile_populate("a:b:c"),
            Err(QueryError::MalformedExpression { .. })
        ));
    }

    #[test]
    fn test_malformed_populate_rejects_query() {
        let parser = QueryParser::new(ParserOptions::default());
        assert!(matches!(
            parser.parse_pairs([("title", "x"), ("populate", "a.b:c")]),
            Err(QueryError::MisplacedLeafSegment { .. })
        ));
    }

    struct RejectingFilter;

    impl FilterCompiler for RejectingFilter {
        fn compile(&self, key: &str, _value: &str) -> QueryResult<Option<(String, Value)>> {
            Err(QueryError::Filter(format!("unknown field '{}'", key)))
        }
    }

    #[test]
    fn test_filter_errors_propagate() {
        let parser = QueryParser::with_filter(ParserOptions::default(), RejectingFilter);
        assert!(matches!(
            parser.parse_pairs([("bogus", "1")]),
            Err(QueryError::Filter(_))
        ));
    }

    #[derive(Default)]
    struct RecordingFetcher {
        seen: RefCell<Vec<(String, QueryDescriptor)>>,
    }

    impl DocumentFetcher for RecordingFetcher {
        fn fetch(&self, collection: &str, query: &QueryDescriptor) -> QueryResult<Vec<Value>> {
            self.seen
                .borrow_mut()
                .push((collection.to_string(), query.clone()));
            Ok(vec![json!({ "title": "Post 1" })])
        }
    }

    #[test]
    fn test_find_hands_descriptor_to_fetcher() {
        let parser = QueryParser::new(ParserOptions::default());
        let fetcher = RecordingFetcher::default();
        let docs = parser
            .find(&fetcher, "posts", [("populate", "likedBy")])
            .unwrap();

        assert_eq!(docs.len(), 1);
        let seen = fetcher.seen.borrow();
        assert_eq!(seen[0].0, "posts");
        assert_eq!(seen[0].1.populate[0].path, "likedBy");
    }
}
