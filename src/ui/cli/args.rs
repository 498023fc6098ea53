// Fri Oct 16 2026 - Alex

use crate::parser::Language;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cdecl-layout")]
#[command(author = "Alex")]
#[command(version = "1.0.0")]
#[command(about = "C/C++ declaration collector and class layout resolver", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true, default_value = "warn")]
    pub log_level: String,

    #[arg(long, global = true)]
    pub json: bool,

    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse the inputs and report what was collected.
    Collect(CollectArgs),
    /// Print declarations back as C.
    Show(ShowArgs),
    /// Print the layout of a class or template-id.
    Layout(LayoutArgs),
    /// Regex search over names and declarations.
    Search(SearchArgs),
    #[command(subcommand)]
    Select(SelectCommand),
    Stats(StatsArgs),
}

/// Source files and the preprocessor setup shared by every command.
#[derive(ClapArgs, Debug, Clone)]
pub struct InputArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    #[arg(short = 'I', long = "include")]
    pub include_paths: Vec<PathBuf>,

    #[arg(short = 'D', long = "define")]
    pub defines: Vec<String>,

    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// `c` or `c++`; by default taken from each file's extension.
    #[arg(long, value_parser = parse_language)]
    pub lang: Option<Language>,

    #[arg(long)]
    pub threads: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct CollectArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub builtins: bool,
}

#[derive(Parser, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Declarations to print; all of them when omitted.
    #[arg(short, long)]
    pub name: Vec<String>,

    /// Also print every type the named declarations depend on.
    #[arg(short, long, requires = "name")]
    pub recursive: bool,

    #[arg(long)]
    pub comments: bool,
}

#[derive(Parser, Debug)]
pub struct LayoutArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[arg(short, long, required = true)]
    pub name: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct SearchArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[arg(short, long)]
    pub pattern: String,

    #[arg(short, long)]
    pub ignore_case: bool,
}

#[derive(Subcommand, Debug)]
pub enum SelectCommand {
    /// Records matching `offset:type`, `offset:+size`, `offset:?`,
    /// `offset:*` or `*:size` constraints.
    Struct(SelectStructArgs),
    /// Macros and enumerators with a given value.
    Constant(SelectConstantArgs),
    /// Functions matching `position:type` constraints, 0 being the return
    /// type.
    Prototype(SelectPrototypeArgs),
}

#[derive(Parser, Debug)]
pub struct SelectStructArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[arg(short = 'k', long = "constraint", required = true)]
    pub constraints: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct SelectConstantArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[arg(short, long, allow_hyphen_values = true)]
    pub value: String,

    #[arg(short, long)]
    pub mask: bool,

    #[arg(short, long, default_value = "")]
    pub symbol: String,
}

#[derive(Parser, Debug)]
pub struct SelectPrototypeArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[arg(short = 'k', long = "constraint", required = true)]
    pub constraints: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct StatsArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[arg(long)]
    pub detailed: bool,
}

fn parse_language(text: &str) -> Result<Language, String> {
    match text.to_lowercase().as_str() {
        "c" => Ok(Language::C),
        "c++" | "cxx" | "cpp" => Ok(Language::Cxx),
        other => Err(format!("unknown language '{}', expected c or c++", other)),
    }
}

impl InputArgs {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(missing) = self.files.iter().find(|f| !f.is_file()) {
            return Err(format!("Input file does not exist: {:?}", missing));
        }
        if self.threads == Some(0) {
            return Err("Thread count must be at least 1".to_string());
        }
        Ok(())
    }
}
