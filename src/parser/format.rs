// Thu Oct 15 2026 - Alex

use crate::parser::declarator::simple_name;
use crate::template::{PartialSpecialization, TemplateBody, TemplateDeclaration, TemplateParam, TemplateParamKind};
use crate::types::{
    is_anonymous_name, scope_of, template_id, AccessSpecifier, Declaration, EnumDef, FunctionDecl, LanguageLinkage,
    MacroDecl, MemberDescriptor, MethodDecl, MethodFlags, MethodKind, QualType, RecordDef, StorageLinkage, TypeDescriptor,
    TypeTable, TypedefDecl, VariableDecl,
};
use itertools::Itertools;

const ANONYMOUS: &str = "\u{1}anonymous\u{1}";

/// Re-serializes declarations as C/C++ source. Parsing the output again
/// gives structurally equal types.
pub struct CFormatter<'t> {
    table: Option<&'t TypeTable>,
    include_comments: bool,
    indent: String,
}

impl Default for CFormatter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'t> CFormatter<'t> {
    pub fn new() -> Self {
        Self {
            table: None,
            include_comments: false,
            indent: "    ".to_string(),
        }
    }

    /// With a table, anonymous aggregates and nested types are printed
    /// inline inside the record that owns them.
    pub fn with_table(mut self, table: &'t TypeTable) -> Self {
        self.table = Some(table);
        self
    }

    pub fn with_comments(mut self, include: bool) -> Self {
        self.include_comments = include;
        self
    }

    pub fn with_indent(mut self, width: usize) -> Self {
        self.indent = " ".repeat(width);
        self
    }

    pub fn format(&self, decl: &Declaration) -> String {
        let body = self.format_at(decl, 0);
        let scope = scope_of(decl.name());
        if scope.is_empty() || !self.is_namespace(scope) || matches!(decl, Declaration::Macro(_)) {
            return body;
        }
        let namespaces: Vec<&str> = scope.split("::").collect();
        let mut code = String::new();
        for ns in &namespaces {
            code.push_str(&format!("namespace {} {{\n", ns));
        }
        code.push_str(&body);
        code.push('\n');
        code.push_str(&"}".repeat(namespaces.len()));
        code
    }

    /// Formats a whole unit, skipping declarations a record prints inline.
    pub fn format_all<'d>(&self, decls: impl IntoIterator<Item = &'d Declaration>) -> String {
        let mut code = String::new();
        for decl in decls {
            if decl.is_builtin() || self.printed_inline(decl) {
                continue;
            }
            code.push_str(&self.format(decl));
            code.push('\n');
        }
        code
    }

    fn printed_inline(&self, decl: &Declaration) -> bool {
        let Some(table) = self.table else { return false };
        if matches!(decl, Declaration::Record(_)) && is_anonymous_name(decl.name()) {
            return true;
        }
        if matches!(decl, Declaration::Enumerator(_)) {
            return true;
        }
        let scope = scope_of(decl.name());
        !scope.is_empty() && table.record(scope).is_some()
    }

    fn is_namespace(&self, scope: &str) -> bool {
        match self.table {
            Some(table) => table.record(scope).is_none() && table.template(scope).is_none() && table.enum_def(scope).is_none(),
            None => true,
        }
    }

    fn pad(&self, depth: usize) -> String {
        self.indent.repeat(depth)
    }

    fn format_at(&self, decl: &Declaration, depth: usize) -> String {
        match decl {
            Declaration::Typedef(t) => self.format_typedef(t, depth),
            Declaration::Record(r) => format!("{};", self.format_record(r, &[], depth)),
            Declaration::ForwardRecord { name, kind, .. } => format!("{} {};", kind.keyword(), simple_name(name)),
            Declaration::Enum(e) => format!("{};", self.format_enum(e, depth)),
            Declaration::Function(f) => self.format_function(f),
            Declaration::Variable(v) => self.format_variable(v),
            Declaration::Template(t) => self.format_template(t, depth),
            Declaration::Macro(m) => self.format_macro(m),
            Declaration::Enumerator(e) => {
                if self.include_comments {
                    format!("/* enum {} */ {} = {}", e.enum_name, e.name, e.value)
                } else {
                    format!("{} = {}", e.name, e.value)
                }
            }
        }
    }

    /// Spells `ty` declaring `name`, writing anonymous aggregates out in
    /// full when the table knows them.
    fn declare(&self, ty: &QualType, name: &str, depth: usize) -> String {
        let mut inline: Option<String> = None;
        let mut placeholder = ty.clone();
        if let Some(table) = self.table {
            placeholder.walk_mut(&mut |d| {
                if inline.is_some() {
                    return;
                }
                let body = match d {
                    TypeDescriptor::Record { name, .. } if is_anonymous_name(name) => {
                        table.record(name).map(|r| self.format_record(r, &[], depth))
                    }
                    TypeDescriptor::Enum(name) if is_anonymous_name(name) => {
                        table.enum_def(name).map(|e| self.format_enum(e, depth))
                    }
                    _ => None,
                };
                if let Some(body) = body {
                    inline = Some(body);
                    *d = TypeDescriptor::Typedef(ANONYMOUS.to_string());
                }
            });
        }
        let spelled = placeholder.declare(name);
        match inline {
            Some(body) => spelled.replacen(ANONYMOUS, &body, 1),
            None => spelled,
        }
    }

    fn format_typedef(&self, t: &TypedefDecl, depth: usize) -> String {
        format!("typedef {};", self.declare(&t.ty, simple_name(&t.name), depth))
    }

    fn format_record(&self, def: &RecordDef, nested: &[Declaration], depth: usize) -> String {
        let mut code = String::new();
        code.push_str(def.kind.keyword());
        if !def.is_anonymous() {
            code.push(' ');
            code.push_str(simple_name(&def.name));
        } else if self.include_comments {
            code.push_str(&format!(" /* {} */", def.name));
        }
        if !def.bases.is_empty() {
            let bases = def
                .bases
                .iter()
                .map(|b| {
                    let virt = if b.is_virtual { "virtual " } else { "" };
                    format!("{}{} {}", virt, b.access.keyword(), type_name(&b.base))
                })
                .join(", ");
            code.push_str(" : ");
            code.push_str(&bases);
        }
        code.push_str(" {\n");

        let inner = self.pad(depth + 1);
        for decl in nested {
            code.push_str(&inner);
            code.push_str(&self.format_at(decl, depth + 1));
            code.push('\n');
        }
        if let Some(table) = self.table {
            for name in &def.nested {
                if let Some(decl) = table.lookup(name).filter(|d| !is_anonymous_name(d.name())) {
                    code.push_str(&inner);
                    code.push_str(&self.format_at(decl, depth + 1));
                    code.push('\n');
                }
            }
        }

        let default_access = AccessSpecifier::default_for(def.kind);
        let mut access = default_access;
        for member in &def.members {
            self.access_label(&mut code, &mut access, member.access, depth);
            code.push_str(&inner);
            code.push_str(&self.format_member(member, depth + 1));
            code.push('\n');
        }
        for method in &def.methods {
            self.access_label(&mut code, &mut access, method.access, depth);
            code.push_str(&inner);
            code.push_str(&self.format_method(method));
            code.push('\n');
        }
        code.push_str(&self.pad(depth));
        code.push('}');
        code
    }

    fn access_label(&self, code: &mut String, current: &mut AccessSpecifier, wanted: AccessSpecifier, depth: usize) {
        if *current != wanted {
            code.push_str(&format!("{}{}:\n", self.pad(depth), wanted.keyword()));
            *current = wanted;
        }
    }

    fn format_member(&self, m: &MemberDescriptor, depth: usize) -> String {
        let mut line = String::new();
        if m.is_static {
            line.push_str("static ");
        }
        if m.is_mutable {
            line.push_str("mutable ");
        }
        line.push_str(&self.declare(&m.ty, m.name.as_deref().unwrap_or(""), depth));
        if let Some(width) = m.bit_width {
            line.push_str(&format!(" : {}", width));
        }
        if let Some(init) = &m.default_init {
            line.push_str(" = ");
            line.push_str(init);
        }
        line.push(';');
        line
    }

    fn format_method(&self, m: &MethodDecl) -> String {
        let mut line = String::new();
        for (flag, word) in [
            (MethodFlags::STATIC, "static "),
            (MethodFlags::VIRTUAL, "virtual "),
            (MethodFlags::EXPLICIT, "explicit "),
        ] {
            if m.flags.contains(flag) {
                line.push_str(word);
            }
        }
        match m.kind {
            MethodKind::Constructor | MethodKind::Destructor | MethodKind::Conversion => {
                line.push_str(&m.name);
                line.push_str(&m.ty.params_spelling());
            }
            MethodKind::Normal | MethodKind::Operator => {
                let ty = m.ty.ret.clone().function_returning(m.ty.params.clone(), m.ty.variadic, m.ty.linkage);
                line.push_str(&ty.declare(&m.name));
            }
        }
        for (flag, word) in [
            (MethodFlags::CONST, " const"),
            (MethodFlags::OVERRIDE, " override"),
            (MethodFlags::FINAL, " final"),
            (MethodFlags::PURE, " = 0"),
            (MethodFlags::DEFAULTED, " = default"),
            (MethodFlags::DELETED, " = delete"),
        ] {
            if m.flags.contains(flag) {
                line.push_str(word);
            }
        }
        line.push(';');
        line
    }

    fn format_enum(&self, e: &EnumDef, depth: usize) -> String {
        let mut code = String::from("enum ");
        if e.scoped {
            code.push_str("class ");
        }
        if !is_anonymous_name(&e.name) {
            code.push_str(simple_name(&e.name));
            code.push(' ');
        }
        if let Some(underlying) = &e.underlying {
            code.push_str(&format!(": {} ", underlying));
        }
        if e.enumerators.is_empty() && e.underlying.is_some() {
            return code.trim_end().to_string();
        }
        code.push_str("{\n");
        let inner = self.pad(depth + 1);
        let body = e
            .enumerators
            .iter()
            .map(|en| format!("{}{} = {}", inner, en.name, en.value))
            .join(",\n");
        code.push_str(&body);
        code.push('\n');
        code.push_str(&self.pad(depth));
        code.push('}');
        code
    }

    fn format_function(&self, f: &FunctionDecl) -> String {
        let mut line = linkage_prefix(f.linkage.storage, f.linkage.language);
        line.push_str(&f.ty.declare(self.function_name(&f.name)));
        line.push(';');
        line
    }

    // Out-of-class member definitions keep their class qualification.
    fn function_name<'n>(&self, name: &'n str) -> &'n str {
        let scope = scope_of(name);
        if scope.is_empty() || self.is_namespace(scope) {
            simple_name(name)
        } else {
            name
        }
    }

    fn format_variable(&self, v: &VariableDecl) -> String {
        let mut line = linkage_prefix(v.linkage.storage, v.linkage.language);
        line.push_str(&self.declare(&v.ty, simple_name(&v.name), 0));
        line.push(';');
        line
    }

    fn format_macro(&self, m: &MacroDecl) -> String {
        let mut line = format!("#define {}", m.name);
        if let Some(params) = &m.params {
            line.push_str(&format!("({})", params.join(", ")));
        }
        if !m.text.is_empty() {
            line.push(' ');
            line.push_str(&m.text);
        }
        if self.include_comments {
            if let Some(value) = m.value {
                line.push_str(&format!(" /* = {} */", value));
            }
        }
        line
    }

    fn format_template(&self, t: &TemplateDeclaration, depth: usize) -> String {
        let name = simple_name(&t.name);
        let mut parts = Vec::new();
        match &t.primary {
            Some(body) => parts.push(format!(
                "{}\n{}",
                template_header(&t.params),
                self.format_template_body(name, body, depth)
            )),
            None if t.specializations.is_empty() => {
                parts.push(format!("{}\nstruct {};", template_header(&t.params), name));
            }
            None => {}
        }
        for spec in &t.specializations {
            parts.push(self.format_specialization(name, spec, depth));
        }
        parts.join("\n")
    }

    fn format_specialization(&self, name: &str, spec: &PartialSpecialization, depth: usize) -> String {
        let id = template_id(name, &spec.pattern);
        format!(
            "{}\n{}",
            template_header(&spec.params),
            self.format_template_body(&id, &spec.body, depth)
        )
    }

    fn format_template_body(&self, name: &str, body: &TemplateBody, depth: usize) -> String {
        match body {
            TemplateBody::Record { def, nested } => {
                let mut def = def.clone();
                def.name = name.to_string();
                def.nested.clear();
                let mut text = self.format_record(&def, nested, depth);
                text.push(';');
                text
            }
            TemplateBody::Function(f) => {
                let mut f = f.clone();
                f.name = name.to_string();
                self.format_function(&f)
            }
            TemplateBody::Alias(ty) => format!("using {} = {};", name, ty),
        }
    }
}

fn template_header(params: &[TemplateParam]) -> String {
    let list = params
        .iter()
        .map(|p| {
            let mut text = match &p.kind {
                TemplateParamKind::Type => format!("typename {}", p.name),
                TemplateParamKind::NonType(ty) => ty.declare(&p.name),
            };
            if let Some(default) = &p.default {
                text.push_str(&format!(" = {}", default));
            }
            text
        })
        .join(", ");
    format!("template<{}>", list)
}

fn linkage_prefix(storage: StorageLinkage, language: Option<LanguageLinkage>) -> String {
    match (storage, language) {
        (StorageLinkage::Internal, _) => "static ".to_string(),
        (_, Some(LanguageLinkage::C)) => "extern \"C\" ".to_string(),
        _ => String::new(),
    }
}

/// Name of a type as written in a base clause.
fn type_name(ty: &QualType) -> String {
    match &ty.ty {
        TypeDescriptor::Record { name, .. }
        | TypeDescriptor::Enum(name)
        | TypeDescriptor::Typedef(name)
        | TypeDescriptor::Incomplete(name) => name.clone(),
        TypeDescriptor::TemplateId { name, args } => template_id(name, args),
        _ => ty.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_source, parse_type, Language};

    #[test]
    fn test_declarator_round_trip() {
        for text in [
            "int (*(*foo1)(void))[3]",
            "char *(*(**foo2[][8])())[]",
            "unsigned char *const constp",
            "void (*signal(int, void (*)(int)))(int)",
            "const char *const (*table[4])(long double, ...)",
        ] {
            let (name, ty) = parse_type(text).unwrap();
            let name = name.unwrap();
            let spelled = ty.declare(&name);
            let (again_name, again) = parse_type(&spelled).unwrap();
            assert_eq!(again_name.as_deref(), Some(name.as_str()));
            assert_eq!(again, ty, "{text} -> {spelled}");
        }
    }

    #[test]
    fn test_record_round_trip() {
        let src = r#"
struct packet : public header {
    unsigned flags : 3;
    unsigned : 0;
    char *names[4];
    union { int i; float f; } u;
protected:
    static const int limit = 8;
    virtual int size() const = 0;
};
"#;
        let first = parse_source("p.hpp", src, Language::Cxx).unwrap();
        assert!(first.errors.is_empty(), "{:?}", first.errors);
        let mut table = TypeTable::new();
        table.register(first.declarations.clone());
        let formatter = CFormatter::new().with_table(&table);
        let text = formatter.format_all(&first.declarations);
        assert!(text.contains("union {"), "{text}");
        assert!(text.contains("protected:"), "{text}");
        let second = parse_source("p2.hpp", &text, Language::Cxx).unwrap();
        assert!(second.errors.is_empty(), "{:?}\n{text}", second.errors);
        let a = first.declarations.iter().find_map(|d| d.as_record().filter(|r| r.name == "packet")).unwrap();
        let b = second.declarations.iter().find_map(|d| d.as_record().filter(|r| r.name == "packet")).unwrap();
        let shape = |r: &RecordDef| -> Vec<(Option<String>, Option<u32>, bool)> {
            r.members.iter().map(|m| (m.name.clone(), m.bit_width, m.is_static)).collect()
        };
        assert_eq!(shape(a), shape(b));
        assert_eq!(a.members[2].ty, b.members[2].ty);
        assert_eq!(a.methods[0].flags, b.methods[0].flags);
        assert_eq!(a.bases, b.bases);
    }

    #[test]
    fn test_function_linkage_and_enum() {
        let src = r#"
extern "C" { static void f4(); int f5(int); }
enum class level : short { low, high = 4 };
"#;
        let out = parse_source("l.hpp", src, Language::Cxx).unwrap();
        let formatter = CFormatter::new();
        let text: Vec<String> = out.declarations.iter().map(|d| formatter.format(d)).collect();
        assert_eq!(text[0], "static void f4(void);");
        assert_eq!(text[1], "extern \"C\" int f5(int);");
        assert_eq!(text[2], "enum class level : short {\n    low = 0,\n    high = 4\n};");
    }

    #[test]
    fn test_template_formatting() {
        let src = r#"
template<typename T, int N = 4>
struct buffer { T data[N]; };
template<typename T>
struct buffer<T *, 1> { T *single; };
"#;
        let out = parse_source("t.hpp", src, Language::Cxx).unwrap();
        let formatter = CFormatter::new();
        let text = formatter.format(&out.declarations[0]);
        assert!(text.starts_with("template<typename T, int N = 4>\nstruct buffer {"), "{text}");
        assert!(text.contains("T data[N];"), "{text}");
        let spec = formatter.format(&out.declarations[1]);
        assert!(spec.starts_with("template<typename T>\nstruct buffer<T *, 1> {"), "{spec}");
    }
}
