//! Variable resolution engine.

use super::collection::{Collection, TxCollection};
use super::store::VariableStore;
use super::target::{Selection, Target, Variable};

/// Resolves targets against a store snapshot and the TX collection.
pub struct VariableResolver<'a> {
    store: &'a VariableStore,
    tx: &'a TxCollection,
}

impl<'a> VariableResolver<'a> {
    /// Create a new resolver.
    pub fn new(store: &'a VariableStore, tx: &'a TxCollection) -> Self {
        Self { store, tx }
    }

    /// Resolve a target to `(qualified name, value)` pairs.
    pub fn resolve(&self, target: &Target) -> Vec<(String, String)> {
        let mut values = self.resolve_variable(target.variable, target.selection.as_ref());

        if !target.exclusions.is_empty() {
            values.retain(|(name, _)| {
                let key = name.split_once(':').map(|(_, k)| k).unwrap_or(name.as_str());
                !target.exclusions.iter().any(|e| e.eq_ignore_ascii_case(key))
            });
        }

        if target.count {
            return vec![(format!("&{}", target.variable.name()), values.len().to_string())];
        }

        values
    }

    fn resolve_variable(
        &self,
        variable: Variable,
        selection: Option<&Selection>,
    ) -> Vec<(String, String)> {
        let name = variable.name();
        match variable {
            Variable::RequestBody => {
                if self.store.request_body().is_empty() {
                    vec![]
                } else {
                    vec![(name.to_string(), lossy(self.store.request_body()))]
                }
            }
            Variable::RequestBodyLength => {
                vec![(name.to_string(), self.store.request_body().len().to_string())]
            }
            Variable::ResponseBody => {
                if self.store.response_body().is_empty() {
                    vec![]
                } else {
                    vec![(name.to_string(), lossy(self.store.response_body()))]
                }
            }
            Variable::ArgsPost => select(&self.store.form_args(), name, selection),
            Variable::Args => {
                let mut result = self.stored(Variable::ArgsGet, "ARGS", selection);
                result.extend(select(&self.store.form_args(), "ARGS", selection));
                result
            }
            Variable::ArgsNames => {
                let post = self.store.form_args();
                let mut names = self.stored(Variable::ArgsGet, name, selection);
                names.extend(select(&post, name, selection));
                names
                    .into_iter()
                    .map(|(qualified, _)| {
                        let key = qualified[name.len() + 1..].to_string();
                        (qualified, key)
                    })
                    .collect()
            }
            Variable::RequestHeadersNames => self
                .store
                .collection(Variable::RequestHeaders)
                .map(|headers| {
                    headers
                        .keys()
                        .into_iter()
                        .map(|k| (format!("{}:{}", name, k), k.to_string()))
                        .collect()
                })
                .unwrap_or_default(),
            Variable::Tx => select(self.tx, name, selection),
            Variable::ArgsGet
            | Variable::RequestHeaders
            | Variable::RequestCookies
            | Variable::ResponseHeaders => self.stored(variable, name, selection),
            Variable::RemoteAddr
            | Variable::RemotePort
            | Variable::ServerAddr
            | Variable::ServerPort
            | Variable::RequestUri
            | Variable::RequestMethod
            | Variable::RequestProtocol
            | Variable::RequestLine
            | Variable::RequestFilename
            | Variable::QueryString
            | Variable::ResponseStatus
            | Variable::ResponseProtocol
            | Variable::ResponseContentType => self
                .store
                .values(variable)
                .into_iter()
                .map(|v| (name.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Resolve a stored collection under a display prefix.
    fn stored(
        &self,
        variable: Variable,
        prefix: &str,
        selection: Option<&Selection>,
    ) -> Vec<(String, String)> {
        match self.store.collection(variable) {
            Some(collection) => select(collection, prefix, selection),
            None => vec![],
        }
    }
}

/// Resolve a collection with optional selection.
fn select<C: Collection>(
    collection: &C,
    prefix: &str,
    selection: Option<&Selection>,
) -> Vec<(String, String)> {
    match selection {
        Some(Selection::Key(key)) => collection
            .get(key)
            .into_iter()
            .map(|v| (format!("{}:{}", prefix, key), v.to_string()))
            .collect(),
        Some(Selection::Regex(re)) => collection
            .get_regex(re)
            .into_iter()
            .map(|(k, v)| (format!("{}:{}", prefix, k), v.to_string()))
            .collect(),
        None => collection
            .all()
            .into_iter()
            .map(|(k, v)| (format!("{}:{}", prefix, k), v.to_string()))
            .collect(),
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Phase;
    use crate::variables::{MutableCollection, PhaseData};

    fn store() -> VariableStore {
        let mut store = VariableStore::new();
        store
            .merge(Phase::Uri, PhaseData::uri("/login?user=admin&pass=x", "POST", "HTTP/1.1"))
            .unwrap();
        store
            .merge(
                Phase::RequestHeaders,
                PhaseData::request_headers([
                    ("Host", "example.com"),
                    ("Content-Type", "application/x-www-form-urlencoded"),
                ]),
            )
            .unwrap();
        store
            .merge(Phase::RequestBody, PhaseData::RequestBody(b"comment=hi".to_vec()))
            .unwrap();
        store
    }

    #[test]
    fn test_scalar() {
        let store = store();
        let tx = TxCollection::new();
        let resolver = VariableResolver::new(&store, &tx);
        let values = resolver.resolve(&Target::new(Variable::RequestMethod));
        assert_eq!(values, vec![("REQUEST_METHOD".to_string(), "POST".to_string())]);
    }

    #[test]
    fn test_args_combines_query_and_form() {
        let store = store();
        let tx = TxCollection::new();
        let resolver = VariableResolver::new(&store, &tx);
        let names: Vec<String> = resolver
            .resolve(&Target::new(Variable::Args))
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(names, vec!["ARGS:user", "ARGS:pass", "ARGS:comment"]);

        let arg_names: Vec<String> = resolver
            .resolve(&Target::new(Variable::ArgsNames))
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        assert_eq!(arg_names, vec!["user", "pass", "comment"]);
    }

    #[test]
    fn test_key_selection_and_exclusion() {
        let store = store();
        let tx = TxCollection::new();
        let resolver = VariableResolver::new(&store, &tx);

        let host = resolver.resolve(&Target::key(Variable::RequestHeaders, "HOST"));
        assert_eq!(host.len(), 1);
        assert_eq!(host[0].1, "example.com");

        let without_pass = resolver.resolve(&Target::new(Variable::ArgsGet).exclude("pass"));
        assert_eq!(without_pass.len(), 1);
    }

    #[test]
    fn test_count_mode() {
        let store = store();
        let tx = TxCollection::new();
        let resolver = VariableResolver::new(&store, &tx);
        let count = resolver.resolve(&Target::key(Variable::RequestHeaders, "x-missing").counted());
        assert_eq!(count, vec![("&REQUEST_HEADERS".to_string(), "0".to_string())]);
    }

    #[test]
    fn test_tx() {
        let store = VariableStore::new();
        let mut tx = TxCollection::new();
        tx.set("anomaly_score", "7".to_string());
        let resolver = VariableResolver::new(&store, &tx);
        let values = resolver.resolve(&Target::key(Variable::Tx, "anomaly_score"));
        assert_eq!(values, vec![("TX:anomaly_score".to_string(), "7".to_string())]);
    }
}
