// Thu Oct 15 2026 - Alex

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::layout::AbiConfig;
use crate::lexer::{evaluate, EvalError, Expander, IncludeResolver, MacroDefinition, MacroTable, Preprocessor, PreprocessorOptions};
use crate::parser::{Language, Parser};
use crate::types::{Declaration, MacroDecl, SharedTypeCache, TypeTable, UnitTypeView};
use log::{debug, info, warn};
use serde::Serialize;

/// Text of one translation unit.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub name: String,
    pub text: String,
}

impl SourceUnit {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Everything needed to run a unit besides its text. Borrowed by every
/// worker of a session.
pub struct UnitContext<'a> {
    pub seed: &'a MacroTable,
    pub options: &'a PreprocessorOptions,
    pub abi: &'a AbiConfig,
    pub cache: &'a SharedTypeCache,
    pub resolver: Option<&'a dyn IncludeResolver>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitSummary {
    pub name: String,
    pub language: Language,
    pub declarations: usize,
    pub macros: usize,
    pub included: Vec<String>,
    pub adopted: usize,
    pub errors: usize,
    pub warnings: usize,
    /// Preprocessing stopped early on a fatal error.
    pub truncated: bool,
}

pub struct UnitResult {
    pub summary: UnitSummary,
    /// Declarations in source order, macros last.
    pub declarations: Vec<Declaration>,
    pub table: TypeTable,
    pub diagnostics: Vec<Diagnostic>,
}

/// Preprocesses, parses and registers one unit. Never fails: every problem
/// ends up as a diagnostic next to whatever could still be recovered.
pub fn process_unit(unit: &SourceUnit, language: Language, ctx: &UnitContext<'_>) -> UnitResult {
    let mut diagnostics = Vec::new();
    let mut truncated = false;

    let mut pp = Preprocessor::new(&unit.name, &unit.text, ctx.seed.clone(), ctx.options.clone());
    if let Some(resolver) = ctx.resolver {
        pp = pp.with_resolver(resolver);
    }
    let mut tokens = Vec::new();
    for item in pp.by_ref() {
        match item {
            Ok(tok) => tokens.push(tok),
            Err(e) => {
                warn!("{}", e);
                truncated |= e.is_fatal();
                diagnostics.push(e.to_diagnostic());
            }
        }
    }
    let included = pp.included_files().to_vec();
    let (macros, warnings) = pp.into_parts();
    diagnostics.extend(warnings);

    let macro_decls = macro_declarations(&macros, ctx.options.max_expansion_depth);
    let constants: Vec<(String, i64)> = macro_decls
        .iter()
        .filter_map(|m| m.value.map(|v| (m.name.clone(), v)))
        .collect();

    let parsed = Parser::new(tokens, language).with_constants(constants).parse();
    diagnostics.extend(parsed.errors.iter().map(|e| e.to_diagnostic()));

    let mut declarations = parsed.declarations;
    let macro_count = macro_decls.len();
    declarations.extend(macro_decls.into_iter().map(Declaration::Macro));

    let mut table = TypeTable::seeded(ctx.abi.size_type(), ctx.abi.diff_type());
    for err in table.register(declarations.iter().cloned()) {
        warn!("{}: {}", unit.name, err);
        diagnostics.push(Diagnostic::warning(DiagnosticKind::Type, err.to_string(), None));
    }

    let (table, adopted) = UnitTypeView::new(ctx.cache, table).finish();
    if adopted > 0 {
        debug!("{}: adopted {} definitions from the shared cache", unit.name, adopted);
    }

    let diagnostics: Vec<Diagnostic> = diagnostics.into_iter().map(|d| d.with_unit(&unit.name)).collect();
    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    let summary = UnitSummary {
        name: unit.name.clone(),
        language,
        declarations: declarations.len(),
        macros: macro_count,
        included,
        adopted,
        errors,
        warnings: diagnostics.len() - errors,
        truncated,
    };
    info!(
        "{} ({}): {} declarations, {} macros, {} errors",
        unit.name, language, summary.declarations, summary.macros, errors
    );

    UnitResult {
        summary,
        declarations,
        table,
        diagnostics,
    }
}

/// Macros defined by the unit itself; command line seeds carry no position
/// and are left out.
fn macro_declarations(macros: &MacroTable, max_depth: usize) -> Vec<MacroDecl> {
    macros
        .iter()
        .filter(|def| def.pos.is_some())
        .map(|def| MacroDecl {
            name: def.name.clone(),
            params: def.params.clone(),
            text: def.replacement_text(),
            value: macro_value(def, macros, max_depth),
            pos: def.pos.clone(),
        })
        .collect()
}

fn macro_value(def: &MacroDefinition, macros: &MacroTable, max_depth: usize) -> Option<i64> {
    if def.is_function_like() || def.body.is_empty() {
        return None;
    }
    let expanded = Expander::new(macros, max_depth).expand(def.body.clone()).ok()?;
    evaluate(&expanded, |name, pos| {
        Err(EvalError::Unresolved {
            name: name.to_string(),
            pos: pos.clone(),
        })
    })
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::MemoryIncludes;

    struct Harness {
        seed: MacroTable,
        options: PreprocessorOptions,
        abi: AbiConfig,
        cache: SharedTypeCache,
    }

    impl Harness {
        fn new(defines: &[&str]) -> Self {
            let defines: Vec<String> = defines.iter().map(|d| d.to_string()).collect();
            Self {
                seed: MacroTable::from_defines(&defines).unwrap(),
                options: PreprocessorOptions::default(),
                abi: AbiConfig::lp64(),
                cache: SharedTypeCache::new(),
            }
        }

        fn run(&self, name: &str, text: &str, resolver: Option<&dyn IncludeResolver>) -> UnitResult {
            let ctx = UnitContext {
                seed: &self.seed,
                options: &self.options,
                abi: &self.abi,
                cache: &self.cache,
                resolver,
            };
            process_unit(&SourceUnit::new(name, text), Language::from_path(std::path::Path::new(name)), &ctx)
        }
    }

    const MACRO_DEPENDENT: &str = r#"
typedef unsigned int sometype;
#ifdef CONDITION
typedef unsigned int zzz;
#endif
struct guarded {
    int a;
#if CONDITION == 1
    int b;
#endif
};
"#;

    #[test]
    fn test_condition_controls_declarations() {
        let off = Harness::new(&[]).run("m.h", MACRO_DEPENDENT, None);
        assert!(off.table.typedef("zzz").is_none());
        assert_eq!(off.table.record("guarded").unwrap().members.len(), 1);

        let on = Harness::new(&["CONDITION=1"]).run("m.h", MACRO_DEPENDENT, None);
        assert!(on.table.typedef("zzz").is_some());
        assert_eq!(on.table.record("guarded").unwrap().members.len(), 2);
        assert!(on.diagnostics.is_empty());
    }

    #[test]
    fn test_macros_become_declarations() {
        let src = "#define BASE 0x10\n#define NEXT (BASE + 1)\n#define CALL(x) ((x) * 2)\nint v;\n";
        let result = Harness::new(&["SEEDED"]).run("d.c", src, None);
        assert_eq!(result.summary.macros, 3);
        assert_eq!(result.table.constant("BASE"), Some(16));
        assert_eq!(result.table.constant("NEXT"), Some(17));
        assert!(result.table.constant("CALL").is_none());
        assert!(result.table.lookup("SEEDED").is_none());
    }

    #[test]
    fn test_missing_include_is_recovered() {
        let includes = MemoryIncludes::new().with_file("inc/a.h", "typedef int from_a;");
        let src = "#include \"a.h\"\n#include \"missing.h\"\nfrom_a x;\n";
        let result = Harness::new(&[]).run("inc/main.c", src, Some(&includes));
        assert_eq!(result.summary.included, vec!["inc/a.h".to_string()]);
        assert!(result.table.lookup("x").is_some());
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::IncludeNotFound && d.unit.as_deref() == Some("inc/main.c")));
    }

    #[test]
    fn test_recursion_truncates_unit() {
        let src = "int before;\n#define A B\n#define B A\nA;\nint after;\n";
        let result = Harness::new(&[]).run("r.c", src, None);
        assert!(result.summary.truncated);
        assert!(result.table.lookup("before").is_some());
        assert!(result.table.lookup("after").is_none());
        assert!(result.diagnostics.iter().any(|d| d.kind == DiagnosticKind::MacroRecursion));
    }
}
