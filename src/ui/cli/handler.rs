// Fri Oct 16 2026 - Alex

use super::args::{
    Args, CollectArgs, Command, InputArgs, LayoutArgs, SearchArgs, SelectCommand, SelectConstantArgs,
    SelectPrototypeArgs, SelectStructArgs, ShowArgs, StatsArgs,
};
use crate::config::Config;
use crate::driver::{Session, SourceUnit, TypeGraph};
use crate::lexer::SearchPathIncludes;
use crate::parser::CFormatter;
use crate::query::{
    dependencies, mask_expression, parse_number, render_layout, search, select_constants, select_prototypes, select_structs,
    ExportSection, JsonExporter, PrototypeConstraint, StructConstraint,
};
use crate::ui::{print_info, print_success, print_warning};
use anyhow::Context;
use colored::Colorize;
use serde_json::json;
use std::fs;

pub struct CommandHandler {
    json: bool,
}

impl CommandHandler {
    pub fn new() -> Self {
        Self { json: false }
    }

    pub fn execute(mut self, args: Args) -> anyhow::Result<()> {
        self.setup_logging(&args)?;
        self.json = args.json;
        if args.no_color {
            colored::control::set_override(false);
        }

        match args.command {
            Command::Collect(collect_args) => self.handle_collect(collect_args),
            Command::Show(show_args) => self.handle_show(show_args),
            Command::Layout(layout_args) => self.handle_layout(layout_args),
            Command::Search(search_args) => self.handle_search(search_args),
            Command::Select(SelectCommand::Struct(select_args)) => self.handle_select_struct(select_args),
            Command::Select(SelectCommand::Constant(select_args)) => self.handle_select_constant(select_args),
            Command::Select(SelectCommand::Prototype(select_args)) => self.handle_select_prototype(select_args),
            Command::Stats(stats_args) => self.handle_stats(stats_args),
        }
    }

    fn setup_logging(&self, args: &Args) -> anyhow::Result<()> {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            "off" => log::LevelFilter::Off,
            _ => log::LevelFilter::Warn,
        };

        env_logger::Builder::new()
            .filter_level(level)
            .format_timestamp(None)
            .init();

        Ok(())
    }

    /// Config file first, then command line options on top of it.
    fn build_config(&self, input: &InputArgs) -> anyhow::Result<Config> {
        let mut config = match &input.config {
            Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
            None => Config::new(),
        };
        config.include_paths.extend(input.include_paths.iter().cloned());
        config.defines.extend(input.defines.iter().cloned());
        if let Some(language) = input.lang {
            config = config.with_language(language);
        }
        if let Some(threads) = input.threads {
            config = config.with_threads(threads);
        }
        config.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(config)
    }

    fn load_graph(&self, input: &InputArgs) -> anyhow::Result<TypeGraph> {
        input.validate().map_err(|e| anyhow::anyhow!(e))?;
        let config = self.build_config(input)?;
        let includes = SearchPathIncludes::new(config.include_paths.clone());

        let mut units = Vec::with_capacity(input.files.len());
        for path in &input.files {
            let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            units.push(SourceUnit::new(path.to_string_lossy(), text));
        }

        let session = Session::new(config)?.with_resolver(&includes);
        let graph = session.run(&units);
        if !self.json {
            self.report_diagnostics(&graph);
        }
        Ok(graph)
    }

    fn report_diagnostics(&self, graph: &TypeGraph) {
        for diag in graph.diagnostics() {
            match &diag.position {
                Some(pos) => print_warning(&format!("{}: {}", pos, diag)),
                None => print_warning(&diag.to_string()),
            }
        }
    }

    fn handle_collect(&self, args: CollectArgs) -> anyhow::Result<()> {
        let graph = self.load_graph(&args.input)?;
        let exporter = JsonExporter::new().with_builtins(args.builtins);

        if let Some(output) = &args.output {
            exporter.export_to_file(&graph, ExportSection::All, output)?;
            if !self.json {
                print_success(&format!("Results saved to: {}", output.display()));
            }
            return Ok(());
        }
        if self.json {
            println!("{}", exporter.export(&graph, ExportSection::All)?);
            return Ok(());
        }

        for unit in graph.units() {
            let mut line = format!(
                "{} ({}): {} declarations, {} macros, {} errors, {} warnings",
                unit.name.cyan(),
                unit.language,
                unit.declarations,
                unit.macros,
                unit.errors,
                unit.warnings
            );
            if unit.truncated {
                line.push_str(&format!(" {}", "(truncated)".red()));
            }
            print_info(&line);
        }
        print_success(&format!(
            "{} declarations, {} layouts",
            graph.declarations().count(),
            graph.layout_count()
        ));
        Ok(())
    }

    fn handle_show(&self, args: ShowArgs) -> anyhow::Result<()> {
        let graph = self.load_graph(&args.input)?;
        let formatter = CFormatter::new().with_table(graph.table()).with_comments(args.comments);

        if args.name.is_empty() {
            let text = formatter.format_all(graph.declarations());
            if self.json {
                println!("{}", JsonExporter::new().render(&json!({ "source": text }))?);
            } else {
                println!("{}", text);
            }
            return Ok(());
        }

        let mut shown = serde_json::Map::new();
        for name in &args.name {
            let text = if args.recursive {
                let Some(deps) = dependencies(&graph, name) else {
                    print_warning(&format!("{} not found", name));
                    continue;
                };
                if !self.json {
                    for missing in &deps.missing {
                        print_warning(&format!("{} needs {} which was not declared", name, missing));
                    }
                }
                formatter.format_all(deps.declarations.iter().copied())
            } else {
                let Some(decl) = graph.declaration(name) else {
                    print_warning(&format!("{} not found", name));
                    continue;
                };
                formatter.format(decl)
            };
            if self.json {
                shown.insert(name.clone(), json!(text));
            } else {
                println!("{}", text);
            }
        }
        if self.json {
            println!("{}", JsonExporter::new().render(&serde_json::Value::Object(shown))?);
        }
        Ok(())
    }

    fn handle_layout(&self, args: LayoutArgs) -> anyhow::Result<()> {
        let graph = self.load_graph(&args.input)?;
        let mut plans = serde_json::Map::new();
        for name in &args.name {
            let plan = graph.layout_by_name(name).with_context(|| format!("layout of {}", name))?;
            if self.json {
                plans.insert(name.clone(), serde_json::to_value(plan.as_ref())?);
            } else {
                print!("{}", render_layout(&plan));
            }
        }
        if self.json {
            println!("{}", JsonExporter::new().render(&serde_json::Value::Object(plans))?);
        }
        Ok(())
    }

    fn handle_search(&self, args: SearchArgs) -> anyhow::Result<()> {
        let graph = self.load_graph(&args.input)?;
        let found = search(&graph, &args.pattern, args.ignore_case)?;
        if self.json {
            println!("{}", JsonExporter::new().render(&serde_json::to_value(&found)?)?);
            return Ok(());
        }
        for hit in &found {
            let via = if hit.value_matched { "" } else { " (name)" };
            println!("{} {}{}", format!("{:<10}", hit.kind).yellow(), hit.name.cyan(), via);
        }
        print_success(&format!("{} matches", found.len()));
        Ok(())
    }

    fn handle_select_struct(&self, args: SelectStructArgs) -> anyhow::Result<()> {
        let constraints = args
            .constraints
            .iter()
            .map(|c| c.parse::<StructConstraint>())
            .collect::<Result<Vec<_>, _>>()?;
        let graph = self.load_graph(&args.input)?;
        let names = select_structs(&graph, &constraints);
        self.print_names(&names)
    }

    fn handle_select_constant(&self, args: SelectConstantArgs) -> anyhow::Result<()> {
        let value = parse_number(&args.value)?;
        let graph = self.load_graph(&args.input)?;
        let matches = select_constants(&graph, value, args.mask, &args.symbol);
        if self.json {
            let doc = json!({ "matches": matches, "expression": mask_expression(&matches) });
            println!("{}", JsonExporter::new().render(&doc)?);
            return Ok(());
        }
        for m in &matches {
            let tag = if m.partial { " (partial)" } else { "" };
            println!("{} = {:#x}{}", m.name.cyan(), m.value, tag);
        }
        if args.mask && !matches.is_empty() {
            print_success(&mask_expression(&matches));
        }
        Ok(())
    }

    fn handle_select_prototype(&self, args: SelectPrototypeArgs) -> anyhow::Result<()> {
        let constraints = args
            .constraints
            .iter()
            .map(|c| c.parse::<PrototypeConstraint>())
            .collect::<Result<Vec<_>, _>>()?;
        let graph = self.load_graph(&args.input)?;
        let names: Vec<String> = select_prototypes(&graph, &constraints)
            .into_iter()
            .map(|f| f.name.clone())
            .collect();
        self.print_names(&names)
    }

    fn handle_stats(&self, args: StatsArgs) -> anyhow::Result<()> {
        let graph = self.load_graph(&args.input)?;
        let stats = graph.stats();
        if self.json {
            let mut doc = serde_json::to_value(&stats)?;
            if args.detailed {
                doc["hierarchy"] = serde_json::to_value(graph.hierarchy().stats())?;
            }
            println!("{}", JsonExporter::new().render(&doc)?);
            return Ok(());
        }

        println!("{}", "Statistics".cyan().bold());
        println!("{}", "-".repeat(40).cyan());
        println!("  Units: {}", stats.units.to_string().green());
        println!("  Declarations: {}", stats.declarations.total.to_string().green());
        for (kind, count) in &stats.declarations.by_kind {
            println!("    {}: {}", kind, count);
        }
        println!("  Incomplete references: {}", stats.declarations.incomplete_references);
        println!("  Layouts: {}", stats.layouts.to_string().green());
        println!("  Template instances: {}", stats.instances);
        println!("  Errors: {}", stats.errors.to_string().red());
        println!("  Warnings: {}", stats.warnings.to_string().yellow());
        if args.detailed {
            let hierarchy = graph.hierarchy().stats();
            println!("  Classes: {}", hierarchy.classes);
            println!("  Root classes: {}", hierarchy.roots);
            println!("  Max depth: {}", hierarchy.max_depth);
            println!("  Multiple inheritance: {}", hierarchy.multiple_inheritance);
            println!("  Virtual inheritance: {}", hierarchy.virtual_inheritance);
            println!("  Dynamic classes: {}", hierarchy.dynamic);
            println!("  Abstract classes: {}", hierarchy.abstract_classes);
        }
        Ok(())
    }

    fn print_names(&self, names: &[String]) -> anyhow::Result<()> {
        if self.json {
            println!("{}", JsonExporter::new().render(&json!(names))?);
            return Ok(());
        }
        for name in names {
            println!("{}", name.cyan());
        }
        print_success(&format!("{} matches", names.len()));
        Ok(())
    }
}

impl Default for CommandHandler {
    fn default() -> Self {
        Self::new()
    }
}
