// Thu Oct 15 2026 - Alex

use crate::driver::TypeGraph;
use crate::layout::LayoutPlan;
use crate::query::QueryError;
use serde_json::{json, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportSection {
    Declarations,
    Layouts,
    Diagnostics,
    All,
}

/// JSON documents over a `TypeGraph`.
pub struct JsonExporter {
    pretty_print: bool,
    include_builtins: bool,
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonExporter {
    pub fn new() -> Self {
        Self {
            pretty_print: true,
            include_builtins: false,
        }
    }

    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    pub fn with_builtins(mut self, include: bool) -> Self {
        self.include_builtins = include;
        self
    }

    pub fn export(&self, graph: &TypeGraph, section: ExportSection) -> Result<String, QueryError> {
        let value = match section {
            ExportSection::Declarations => self.export_declarations(graph)?,
            ExportSection::Layouts => self.export_layouts(graph)?,
            ExportSection::Diagnostics => self.export_diagnostics(graph)?,
            ExportSection::All => json!({
                "units": serde_json::to_value(graph.units())?,
                "stats": serde_json::to_value(graph.stats())?,
                "declarations": self.export_declarations(graph)?,
                "layouts": self.export_layouts(graph)?,
                "diagnostics": self.export_diagnostics(graph)?,
            }),
        };
        self.render(&value)
    }

    pub fn export_to_file(&self, graph: &TypeGraph, section: ExportSection, path: &Path) -> Result<(), QueryError> {
        let content = self.export(graph, section)?;
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        Ok(())
    }

    pub fn render(&self, value: &Value) -> Result<String, QueryError> {
        let text = if self.pretty_print {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(text)
    }

    fn export_declarations(&self, graph: &TypeGraph) -> Result<Value, QueryError> {
        let mut map = serde_json::Map::new();
        for decl in graph.table().iter() {
            if decl.is_builtin() && !self.include_builtins {
                continue;
            }
            map.insert(decl.name().to_string(), serde_json::to_value(decl)?);
        }
        Ok(Value::Object(map))
    }

    fn export_layouts(&self, graph: &TypeGraph) -> Result<Value, QueryError> {
        let mut map = serde_json::Map::new();
        for plan in graph.layouts() {
            map.insert(plan.name.clone(), serde_json::to_value(plan.as_ref())?);
        }
        Ok(Value::Object(map))
    }

    fn export_diagnostics(&self, graph: &TypeGraph) -> Result<Value, QueryError> {
        Ok(serde_json::to_value(graph.diagnostics())?)
    }
}

/// Human readable layout: one line per base and field.
pub fn render_layout(plan: &LayoutPlan) -> String {
    let mut text = format!(
        "{} {} (size {}, align {}, data size {})\n",
        plan.kind.keyword(),
        plan.name,
        plan.size,
        plan.align,
        plan.data_size
    );
    if let Some(offset) = plan.vptr_offset {
        text.push_str(&format!("  +{:<4} <vptr>\n", offset));
    }
    for base in &plan.bases {
        let mut tags = Vec::new();
        if base.is_virtual {
            tags.push("virtual");
        }
        if base.is_primary {
            tags.push("primary");
        }
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" ({})", tags.join(", "))
        };
        text.push_str(&format!("  +{:<4} <base {}>{}\n", base.offset, base.name, tags));
    }
    for field in &plan.fields {
        text.push_str(&format!("  {}\n", field));
    }
    if let Some(vtable) = &plan.vtable {
        for slot in &vtable.slots {
            text.push_str(&format!("  vtable{}\n", slot));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::driver::{Session, SourceUnit};

    const SRC: &str = r#"
struct Base { virtual ~Base(); virtual int run(); int id; };
struct Derived : Base { int run() override; char tag; };
struct broken { struct missing m; };
"#;

    fn graph() -> TypeGraph {
        Session::new(Config::new())
            .unwrap()
            .run(&[SourceUnit::new("e.hpp", SRC)])
    }

    #[test]
    fn test_export_all_document() {
        let g = graph();
        let text = JsonExporter::new().with_pretty_print(false).export(&g, ExportSection::All).unwrap();
        let doc: Value = serde_json::from_str(&text).unwrap();
        assert!(doc["declarations"]["Derived"].is_object());
        assert!(doc["declarations"].get("size_t").is_none());
        assert_eq!(doc["layouts"]["Derived"]["size"], json!(16));
        assert!(doc["layouts"].get("broken").is_none());
        assert!(!doc["diagnostics"].as_array().unwrap().is_empty());
        assert_eq!(doc["units"][0]["name"], json!("e.hpp"));
    }

    #[test]
    fn test_builtins_on_request() {
        let g = graph();
        let text = JsonExporter::new().with_builtins(true).export(&g, ExportSection::Declarations).unwrap();
        let doc: Value = serde_json::from_str(&text).unwrap();
        assert!(doc.get("size_t").is_some());
    }

    #[test]
    fn test_render_layout() {
        let g = graph();
        let plan = g.layout("Derived").unwrap();
        let text = render_layout(&plan);
        assert!(text.starts_with("struct Derived (size 16, align 8"), "{text}");
        assert!(text.contains("<base Base> (primary)"), "{text}");
        assert!(text.contains("char tag"), "{text}");
    }
}
