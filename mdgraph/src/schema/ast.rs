//! Structural form of a GraphQL SDL document, and its renderer.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub definitions: Vec<Definition>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Schema(SchemaDefinition),
    Type(TypeDefinition),
}

/// `schema { query: Query }`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaDefinition {
    pub directives: Vec<Directive>,
    pub operations: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Object,
    Interface,
    Input,
    Enum,
    Scalar,
    Union,
}

impl TypeKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            TypeKind::Object => "type",
            TypeKind::Interface => "interface",
            TypeKind::Input => "input",
            TypeKind::Enum => "enum",
            TypeKind::Scalar => "scalar",
            TypeKind::Union => "union",
        }
    }

    /// Kinds whose body is a list of fields.
    pub fn has_fields(&self) -> bool {
        matches!(self, TypeKind::Object | TypeKind::Interface | TypeKind::Input)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinition {
    pub kind: TypeKind,
    pub description: Option<String>,
    pub name: String,
    pub interfaces: Vec<String>,
    pub directives: Vec<Directive>,
    pub fields: Vec<FieldDefinition>,
    pub values: Vec<EnumValue>,
    pub members: Vec<String>,
}

impl TypeDefinition {
    pub fn new(kind: TypeKind, name: impl Into<String>) -> Self {
        TypeDefinition {
            kind,
            description: None,
            name: name.into(),
            interfaces: Vec::new(),
            directives: Vec::new(),
            fields: Vec::new(),
            values: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A field of an object, interface or input type, or an argument of a field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub description: Option<String>,
    pub name: String,
    pub arguments: Vec<FieldDefinition>,
    pub ty: TypeRef,
    pub default_value: Option<ConstValue>,
    pub directives: Vec<Directive>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        FieldDefinition {
            description: None,
            name: name.into(),
            arguments: Vec::new(),
            ty,
            default_value: None,
            directives: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub description: Option<String>,
    pub name: String,
    pub directives: Vec<Directive>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn list_of(inner: TypeRef) -> Self {
        TypeRef::List(Box::new(inner))
    }

    pub fn non_null(inner: TypeRef) -> Self {
        TypeRef::NonNull(Box::new(inner))
    }

    /// The named type at the bottom of list/non-null wrappers.
    pub fn base_name(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.base_name(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{name}"),
            TypeRef::List(inner) => write!(f, "[{inner}]"),
            TypeRef::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub arguments: Vec<(String, ConstValue)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Null,
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Enum(String),
    List(Vec<ConstValue>),
    Object(Vec<(String, ConstValue)>),
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Null => write!(f, "null"),
            ConstValue::Int(n) => write!(f, "{n}"),
            ConstValue::Float(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{n:.1}")
                } else {
                    write!(f, "{n}")
                }
            }
            ConstValue::String(s) => write!(f, "{}", quote_string(s)),
            ConstValue::Boolean(b) => write!(f, "{b}"),
            ConstValue::Enum(name) => write!(f, "{name}"),
            ConstValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            ConstValue::Object(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

// ── Rendering ───────────────────────────────────────────────────

fn write_description(out: &mut String, description: &Option<String>, indent: &str) {
    if let Some(text) = description {
        if text.contains('\n') || text.contains('"') {
            out.push_str(indent);
            out.push_str("\"\"\"\n");
            for line in text.replace("\"\"\"", "\\\"\"\"").lines() {
                if !line.is_empty() {
                    out.push_str(indent);
                }
                out.push_str(line);
                out.push('\n');
            }
            out.push_str(indent);
            out.push_str("\"\"\"\n");
        } else {
            out.push_str(indent);
            out.push_str(&quote_string(text));
            out.push('\n');
        }
    }
}

fn write_directives(out: &mut String, directives: &[Directive]) {
    for directive in directives {
        out.push_str(" @");
        out.push_str(&directive.name);
        if !directive.arguments.is_empty() {
            let args: Vec<String> = directive
                .arguments
                .iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .collect();
            out.push('(');
            out.push_str(&args.join(", "));
            out.push(')');
        }
    }
}

fn write_input_value(out: &mut String, value: &FieldDefinition) {
    out.push_str(&value.name);
    out.push_str(": ");
    out.push_str(&value.ty.to_string());
    if let Some(default) = &value.default_value {
        out.push_str(" = ");
        out.push_str(&default.to_string());
    }
    write_directives(out, &value.directives);
}

fn write_field(out: &mut String, field: &FieldDefinition) {
    write_description(out, &field.description, "  ");
    out.push_str("  ");
    out.push_str(&field.name);
    if !field.arguments.is_empty() {
        out.push('(');
        for (i, arg) in field.arguments.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            write_input_value(out, arg);
        }
        out.push(')');
    }
    out.push_str(": ");
    out.push_str(&field.ty.to_string());
    if let Some(default) = &field.default_value {
        out.push_str(" = ");
        out.push_str(&default.to_string());
    }
    write_directives(out, &field.directives);
    out.push('\n');
}

fn write_type(out: &mut String, def: &TypeDefinition) {
    write_description(out, &def.description, "");
    out.push_str(def.kind.keyword());
    out.push(' ');
    out.push_str(&def.name);
    if !def.interfaces.is_empty() {
        out.push_str(" implements ");
        out.push_str(&def.interfaces.join(" & "));
    }
    write_directives(out, &def.directives);

    match def.kind {
        TypeKind::Scalar => {}
        TypeKind::Union => {
            if !def.members.is_empty() {
                out.push_str(" = ");
                out.push_str(&def.members.join(" | "));
            }
        }
        TypeKind::Enum => {
            out.push_str(" {\n");
            for value in &def.values {
                write_description(out, &value.description, "  ");
                out.push_str("  ");
                out.push_str(&value.name);
                write_directives(out, &value.directives);
                out.push('\n');
            }
            out.push('}');
        }
        TypeKind::Object | TypeKind::Interface | TypeKind::Input => {
            out.push_str(" {\n");
            for field in &def.fields {
                write_field(out, field);
            }
            out.push('}');
        }
    }
    out.push('\n');
}

impl Document {
    pub fn type_definition(&self, name: &str) -> Option<&TypeDefinition> {
        self.definitions.iter().find_map(|def| match def {
            Definition::Type(t) if t.name == name => Some(t),
            _ => None,
        })
    }

    pub fn type_definition_mut(&mut self, name: &str) -> Option<&mut TypeDefinition> {
        self.definitions.iter_mut().find_map(|def| match def {
            Definition::Type(t) if t.name == name => Some(t),
            _ => None,
        })
    }

    /// Render the document as SDL text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, def) in self.definitions.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            match def {
                Definition::Schema(schema) => {
                    out.push_str("schema");
                    write_directives(&mut out, &schema.directives);
                    out.push_str(" {\n");
                    for (operation, ty) in &schema.operations {
                        out.push_str(&format!("  {operation}: {ty}\n"));
                    }
                    out.push_str("}\n");
                }
                Definition::Type(t) => write_type(&mut out, t),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ref_display() {
        let ty = TypeRef::non_null(TypeRef::list_of(TypeRef::named("String")));
        assert_eq!(ty.to_string(), "[String]!");
        assert_eq!(ty.base_name(), "String");
    }

    #[test]
    fn test_render_object_type() {
        let mut def = TypeDefinition::new(TypeKind::Object, "ContentItem");
        def.fields
            .push(FieldDefinition::new("id", TypeRef::non_null(TypeRef::named("ID"))));
        def.fields.push(FieldDefinition::new(
            "tags",
            TypeRef::list_of(TypeRef::named("String")),
        ));
        let doc = Document {
            definitions: vec![Definition::Type(def)],
        };
        assert_eq!(
            doc.render(),
            "type ContentItem {\n  id: ID!\n  tags: [String]\n}\n"
        );
    }

    #[test]
    fn test_render_directive_and_default() {
        let mut field = FieldDefinition::new("old", TypeRef::named("Int"));
        field.directives.push(Directive {
            name: "deprecated".into(),
            arguments: vec![("reason".into(), ConstValue::String("Use new".into()))],
        });
        let mut arg = FieldDefinition::new("order", TypeRef::named("OrderBy"));
        arg.default_value = Some(ConstValue::Enum("ASCENDING".into()));
        field.arguments.push(arg);

        let mut out = String::new();
        write_field(&mut out, &field);
        assert_eq!(
            out,
            "  old(order: OrderBy = ASCENDING): Int @deprecated(reason: \"Use new\")\n"
        );
    }
}
