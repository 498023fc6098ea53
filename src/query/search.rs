// Thu Oct 15 2026 - Alex

use crate::driver::TypeGraph;
use crate::parser::CFormatter;
use crate::query::QueryError;
use crate::types::DeclKind;
use regex::{Regex, RegexBuilder};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchMatch {
    pub kind: DeclKind,
    pub name: String,
    /// The C text of the declaration matched, not only its name.
    pub value_matched: bool,
}

/// Regex search over declaration names and their C formatting.
pub struct Searcher {
    regex: Regex,
}

impl Searcher {
    pub fn new(pattern: &str, ignore_case: bool) -> Result<Self, QueryError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(ignore_case)
            .multi_line(true)
            .build()?;
        Ok(Self { regex })
    }

    pub fn search(&self, graph: &TypeGraph) -> Vec<SearchMatch> {
        let formatter = CFormatter::new().with_table(graph.table());
        graph
            .declarations()
            .filter_map(|decl| {
                let name_matched = self.regex.is_match(decl.name());
                let value_matched = self.regex.is_match(&formatter.format(decl));
                (name_matched || value_matched).then(|| SearchMatch {
                    kind: decl.kind(),
                    name: decl.name().to_string(),
                    value_matched,
                })
            })
            .collect()
    }
}

pub fn search(graph: &TypeGraph, pattern: &str, ignore_case: bool) -> Result<Vec<SearchMatch>, QueryError> {
    Ok(Searcher::new(pattern, ignore_case)?.search(graph))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::driver::{Session, SourceUnit};

    const SRC: &str = r#"
#define MAX_NAME 32
typedef struct _mystruct {
    char name[MAX_NAME];
    unsigned long flags;
} mystruct;
int process(mystruct *s, unsigned long mode);
"#;

    fn graph() -> TypeGraph {
        Session::new(Config::new())
            .unwrap()
            .run(&[SourceUnit::new("s.h", SRC)])
    }

    #[test]
    fn test_search_names_and_values() {
        let g = graph();
        let found = search(&g, "^mystruct$", false).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, DeclKind::Typedef);

        let found = search(&g, "unsigned long", false).unwrap();
        let names: Vec<&str> = found.iter().map(|m| m.name.as_str()).collect();
        assert!(names.contains(&"_mystruct"));
        assert!(names.contains(&"process"));
        assert!(found.iter().all(|m| m.value_matched));
    }

    #[test]
    fn test_search_ignore_case() {
        let g = graph();
        assert!(search(&g, "PROCESS", false).unwrap().is_empty());
        assert_eq!(search(&g, "PROCESS", true).unwrap().len(), 1);
        assert!(search(&g, "(", false).is_err());
    }
}
