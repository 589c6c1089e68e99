use super::diag::Pos;

/// A parsed schema file: one package, then imports, options, enums,
/// entities, and services in source order. The file owns every child node;
/// nothing in the tree is shared or mutated after parsing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaFile {
    pub package: Option<PackageDecl>,
    pub imports: Vec<ImportDecl>,
    pub options: Vec<OptionDecl>,
    pub enums: Vec<EnumDecl>,
    pub entities: Vec<EntityDecl>,
    pub services: Vec<ServiceDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageDecl {
    pub pos: Pos,
    /// Dotted name, e.g. `acos.calendar`.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub pos: Pos,
    /// Imports are recorded but not resolved; a file is checked against its
    /// own declarations only.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionDecl {
    pub pos: Pos,
    pub name: String,
    pub value: Option<Value>,
}

/// A literal-ish value appearing in annotations, options, and parameter
/// defaults.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Ident(String),
    List(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub pos: Pos,
    pub name: String,
    pub values: Vec<EnumValue>,
}

/// One `NAME = number;` entry. Numbers need not be contiguous or ordered.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub pos: Pos,
    pub name: String,
    pub number: i32,
}

/// An entity maps to one storage table and one wire message. Field order is
/// significant: it fixes generated column and argument order downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDecl {
    pub pos: Pos,
    pub annotations: Vec<Annotation>,
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub queries: Vec<QueryDecl>,
}

impl EntityDecl {
    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.name == name)
    }

    /// The SQL table name from `@table`, when present and well-formed.
    pub fn table_name(&self) -> Option<&str> {
        self.annotation("table")?
            .args
            .first()?
            .value
            .as_ref()?
            .as_str()
    }

    /// Backend names listed in `@backends`.
    pub fn backends(&self) -> Vec<&str> {
        match self.annotation("backends") {
            Some(ann) => ann
                .args
                .iter()
                .filter_map(|arg| arg.value.as_ref().and_then(Value::as_str))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn primary_key(&self) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.is_primary_key())
    }
}

/// A `@name(args)` decoration on an entity or field.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub pos: Pos,
    pub name: String,
    pub args: Vec<AnnotationArg>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationArg {
    pub pos: Pos,
    /// Set for named arguments (`max: 100`), absent for positional ones.
    pub name: Option<String>,
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub pos: Pos,
    pub annotations: Vec<Annotation>,
    pub name: String,
    pub ty: TypeRef,
}

impl FieldDecl {
    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.name == name)
    }

    pub fn has_annotation(&self, name: &str) -> bool {
        self.annotation(name).is_some()
    }

    pub fn is_primary_key(&self) -> bool {
        self.has_annotation("pk")
    }

    pub fn is_required(&self) -> bool {
        self.has_annotation("required")
    }

    pub fn is_indexed(&self) -> bool {
        self.has_annotation("indexed")
    }

    pub fn is_unique(&self) -> bool {
        self.has_annotation("unique")
    }
}

/// A reference to a built-in scalar, a declared enum, or a declared entity,
/// with an optional `?` marker.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypeRef {
    pub pos: Pos,
    pub name: String,
    pub optional: bool,
}

/// A named read operation declared inside an entity, compiled to
/// backend-specific SQL.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDecl {
    pub pos: Pos,
    pub name: String,
    pub params: Vec<QueryParam>,
    pub where_clause: Option<Expr>,
    pub order_by: Vec<OrderByField>,
    pub limit: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryParam {
    pub pos: Pos,
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByField {
    pub pos: Pos,
    pub field: String,
    pub descending: bool,
}

/// Query expressions form a closed variant set; the checker's identifier
/// walk and the SQL lowering both match on it exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Binary {
        pos: Pos,
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        pos: Pos,
        op: UnaryOp,
        operand: Box<Expr>,
    },
    IsNull {
        pos: Pos,
        operand: Box<Expr>,
        negated: bool,
    },
    Ident {
        pos: Pos,
        name: String,
    },
    Literal {
        pos: Pos,
        value: Literal,
    },
    Call {
        pos: Pos,
        name: String,
        args: Vec<Expr>,
    },
    Paren {
        pos: Pos,
        inner: Box<Expr>,
    },
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Binary { pos, .. }
            | Expr::Unary { pos, .. }
            | Expr::IsNull { pos, .. }
            | Expr::Ident { pos, .. }
            | Expr::Literal { pos, .. }
            | Expr::Call { pos, .. }
            | Expr::Paren { pos, .. } => *pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Placeholder produced only by parser error recovery; lowers as `NULL`.
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    In,
    Add,
    Sub,
    Concat,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    /// The operator's SQL spelling, passed through to every dialect.
    pub fn as_sql(self) -> &'static str {
        match self {
            BinOp::Or => "OR",
            BinOp::And => "AND",
            BinOp::Eq => "=",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
            BinOp::Like => "LIKE",
            BinOp::In => "IN",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Concat => "||",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            UnaryOp::Not => "NOT",
            UnaryOp::Neg => "-",
        }
    }
}

/// A gRPC-style service; carried through checking for reference validation
/// only.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDecl {
    pub pos: Pos,
    pub name: String,
    pub methods: Vec<RpcDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcDecl {
    pub pos: Pos,
    pub name: String,
    /// `None` when parsing bailed out before reaching the type; the parse
    /// diagnostic already covers the defect.
    pub request: Option<RpcType>,
    pub response: Option<RpcType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcType {
    pub pos: Pos,
    pub stream: bool,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, annotations: Vec<Annotation>) -> FieldDecl {
        FieldDecl {
            pos: Pos::default(),
            annotations,
            name: name.to_string(),
            ty: TypeRef {
                pos: Pos::default(),
                name: "string".to_string(),
                optional: false,
            },
        }
    }

    fn annotation(name: &str, args: Vec<AnnotationArg>) -> Annotation {
        Annotation {
            pos: Pos::default(),
            name: name.to_string(),
            args,
        }
    }

    fn string_arg(value: &str) -> AnnotationArg {
        AnnotationArg {
            pos: Pos::default(),
            name: None,
            value: Some(Value::Str(value.to_string())),
        }
    }

    #[test]
    fn test_entity_accessors() {
        let entity = EntityDecl {
            pos: Pos::default(),
            annotations: vec![
                annotation("table", vec![string_arg("events")]),
                annotation("backends", vec![string_arg("sqlite"), string_arg("postgres")]),
            ],
            name: "Event".to_string(),
            fields: vec![
                field("id", vec![annotation("pk", Vec::new())]),
                field("title", Vec::new()),
            ],
            queries: Vec::new(),
        };

        assert_eq!(entity.table_name(), Some("events"));
        assert_eq!(entity.backends(), vec!["sqlite", "postgres"]);
        assert_eq!(entity.primary_key().map(|f| f.name.as_str()), Some("id"));
    }

    #[test]
    fn test_field_annotation_predicates() {
        let f = field("id", vec![annotation("pk", Vec::new())]);
        assert!(f.is_primary_key());
        assert!(!f.is_required());
        assert!(!f.is_indexed());
        assert!(!f.is_unique());
        assert!(!f.has_annotation("fk"));
    }
}
