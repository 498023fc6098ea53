// Thu Oct 15 2026 - Alex

use crate::config::Config;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::driver::graph::TypeGraph;
use crate::driver::unit::{process_unit, SourceUnit, UnitContext, UnitResult};
use crate::layout::{AbiConfig, LayoutCache, LayoutError, LayoutResolver};
use crate::lexer::{IncludeResolver, MacroTable, PreprocessorOptions};
use crate::template::InstanceCache;
use crate::types::{is_anonymous_name, SharedTypeCache, TypeTable};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::time::Instant;

/// Runs translation units and merges them into a `TypeGraph`.
///
/// Units are independent apart from the `SharedTypeCache`; each gets its
/// own copy of the seed macro table. Results are merged in the order the
/// units were given, whatever order the workers finish in.
pub struct Session<'r> {
    config: Config,
    abi: AbiConfig,
    seed: MacroTable,
    options: PreprocessorOptions,
    cache: SharedTypeCache,
    resolver: Option<&'r dyn IncludeResolver>,
}

impl<'r> Session<'r> {
    pub fn new(config: Config) -> crate::Result<Self> {
        config.validate().map_err(crate::Error::Config)?;
        let seed = config.seed_macros()?;
        Ok(Self {
            abi: config.abi(),
            options: config.preprocessor_options(),
            seed,
            config,
            cache: SharedTypeCache::new(),
            resolver: None,
        })
    }

    pub fn with_resolver(mut self, resolver: &'r dyn IncludeResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &SharedTypeCache {
        &self.cache
    }

    pub fn process_unit(&self, unit: &SourceUnit) -> UnitResult {
        let ctx = UnitContext {
            seed: &self.seed,
            options: &self.options,
            abi: &self.abi,
            cache: &self.cache,
            resolver: self.resolver,
        };
        process_unit(unit, self.config.language_for(&unit.name), &ctx)
    }

    pub fn run(&self, units: &[SourceUnit]) -> TypeGraph {
        let start = Instant::now();
        let results = self.process_all(units);

        let mut table = TypeTable::seeded(self.abi.size_type(), self.abi.diff_type());
        let mut diagnostics = Vec::new();
        let mut summaries = Vec::with_capacity(results.len());
        for result in results {
            for err in table.merge(&result.table) {
                warn!("{}: {}", result.summary.name, err);
                diagnostics.push(
                    Diagnostic::warning(DiagnosticKind::Type, err.to_string(), None).with_unit(&result.summary.name),
                );
            }
            diagnostics.extend(result.diagnostics);
            summaries.push(result.summary);
        }

        let unresolved = table.resolve_incomplete();
        if !unresolved.is_empty() {
            debug!("unresolved type names: {}", unresolved.join(", "));
        }

        let layouts = LayoutCache::new();
        let instances = InstanceCache::new();
        diagnostics.extend(self.compute_layouts(&table, &layouts, &instances));

        let graph = TypeGraph::new(
            table,
            self.abi.clone(),
            self.config.specialization_ordering,
            layouts,
            instances,
            diagnostics,
            summaries,
        );
        info!(
            "processed {} units in {:.2}s: {} declarations, {} layouts, {} diagnostics",
            units.len(),
            start.elapsed().as_secs_f64(),
            graph.table().len(),
            graph.layout_count(),
            graph.diagnostics().len()
        );
        graph
    }

    fn process_all(&self, units: &[SourceUnit]) -> Vec<UnitResult> {
        if units.len() < 2 || self.config.threads < 2 {
            return units.iter().map(|u| self.process_unit(u)).collect();
        }
        match rayon::ThreadPoolBuilder::new().num_threads(self.config.threads).build() {
            Ok(pool) => pool.install(|| units.par_iter().map(|u| self.process_unit(u)).collect()),
            Err(e) => {
                warn!("cannot start worker pool, running units sequentially: {}", e);
                units.iter().map(|u| self.process_unit(u)).collect()
            }
        }
    }

    /// Lays out every complete record. Failures become diagnostics; an
    /// incomplete type is only an error here, once all units are merged.
    fn compute_layouts(&self, table: &TypeTable, layouts: &LayoutCache, instances: &InstanceCache) -> Vec<Diagnostic> {
        let resolver = LayoutResolver::new(table, &self.abi, layouts, instances)
            .with_ordering(self.config.specialization_ordering);
        let names: Vec<&str> = table
            .records()
            .filter(|r| !is_anonymous_name(&r.name))
            .map(|r| r.name.as_str())
            .collect();
        let failures: Vec<(String, LayoutError)> = names
            .par_iter()
            .filter_map(|name| resolver.layout(name).err().map(|e| (name.to_string(), e)))
            .collect();
        failures
            .into_iter()
            .map(|(name, err)| {
                warn!("layout of {} failed: {}", name, err);
                let mut diag = err.to_diagnostic();
                diag.message = format!("{}: {}", name, diag.message);
                diag.position = table.tag(&name).and_then(|d| d.pos()).cloned();
                diag
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::BitfieldPolicy;
    use crate::lexer::MemoryIncludes;

    const SHARED: &str = r#"
#pragma once
struct node;
struct list { struct node *head; int count; };
"#;

    #[test]
    fn test_units_merge_in_order() {
        let includes = MemoryIncludes::new().with_file("shared.h", SHARED);
        let session = Session::new(Config::new().with_threads(4)).unwrap().with_resolver(&includes);
        let units = vec![
            SourceUnit::new("a.c", "#include \"shared.h\"\nstruct node { int value; struct node *next; };\n"),
            SourceUnit::new("b.c", "#include \"shared.h\"\nint total(struct list *l);\n"),
            SourceUnit::new("c.c", "typedef struct list list_t;\n"),
        ];
        let graph = session.run(&units);
        let names: Vec<&str> = graph.units().iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["a.c", "b.c", "c.c"]);
        assert!(graph.table().record("node").is_some());
        assert_eq!(graph.layout("list").unwrap().size, 16);
        assert_eq!(graph.layout("node").unwrap().size, 16);
        assert!(graph.declaration("total").is_some());
    }

    #[test]
    fn test_incomplete_member_reported_after_merge() {
        let session = Session::new(Config::new()).unwrap();
        let units = vec![SourceUnit::new("x.c", "struct opaque;\nstruct holder { struct opaque inner; };\n")];
        let graph = session.run(&units);
        assert!(graph.layout("holder").is_err());
        assert!(graph
            .diagnostics()
            .iter()
            .any(|d| d.kind == DiagnosticKind::IncompleteType && d.message.starts_with("holder")));
    }

    #[test]
    fn test_bitfield_policy_from_config() {
        let src = "struct bits { unsigned char b3 : 3; unsigned char b4 : 4; unsigned char b6 : 6; };";
        let packed = Session::new(Config::new().with_bitfield_policy(BitfieldPolicy::Packed)).unwrap();
        let sysv = Session::new(Config::new()).unwrap();
        let unit = [SourceUnit::new("b.c", src)];
        assert_eq!(sysv.run(&unit).layout("bits").unwrap().size, 2);
        assert_eq!(packed.run(&unit).layout("bits").unwrap().size, 2);
        let plan = packed.run(&unit).layout("bits").unwrap();
        let (offset, field) = plan.field("b6").unwrap();
        assert_eq!(offset, 0);
        assert_eq!(field.bitfield.as_ref().unwrap().bit_offset, 7);
    }

    #[test]
    fn test_oversized_record_is_reported() {
        let session = Session::new(Config::new()).unwrap();
        let src = "struct Big { int a[0x4000000000000000]; };\nstruct Small { int x; };\n";
        let graph = session.run(&[SourceUnit::new("big.c", src)]);
        assert!(matches!(graph.layout("Big"), Err(LayoutError::ObjectTooLarge(_))));
        assert_eq!(graph.layout("Small").unwrap().size, 4);
        assert!(graph
            .diagnostics()
            .iter()
            .any(|d| d.kind == DiagnosticKind::Layout && d.message.starts_with("Big")));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(Session::new(Config::new().with_threads(0)).is_err());
    }
}
