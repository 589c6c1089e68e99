use std::collections::{HashMap, HashSet};

use super::ast::*;
use super::diag::{Diagnostic, Pos};

/// The 8 built-in scalar type names.
pub const BUILTIN_TYPES: [&str; 8] = [
    "string",
    "int32",
    "int64",
    "float",
    "double",
    "bool",
    "bytes",
    "timestamp",
];

/// SQL functions allowed as identifiers in query expressions.
const BUILTIN_FUNCTIONS: [&str; 7] = ["NOW", "COUNT", "SUM", "AVG", "MIN", "MAX", "COALESCE"];

/// Backends accepted by `@backends`.
const KNOWN_BACKENDS: [&str; 4] = ["sqlite", "postgres", "ceramic", "mysql"];

/// Message names that RPC types may reference without a matching entity.
const STANDARD_RPC_TYPES: [&str; 3] = ["PushResult", "Result", "Empty"];

/// Runs semantic analysis over a parsed file and returns every violation
/// found. All phases run to completion; diagnostics from one entity or
/// query never suppress another's. Re-checking the same file always yields
/// the same list.
pub fn check(file: &SchemaFile) -> Vec<Diagnostic> {
    let mut checker = Checker::new(file);
    checker.run();
    checker.diagnostics
}

/// Semantic checker. Symbol tables are name → index maps over the
/// declaration vectors owned by the file; on a duplicate name the first
/// declaration wins for lookups and the duplicate is reported.
struct Checker<'a> {
    file: &'a SchemaFile,
    diagnostics: Vec<Diagnostic>,
    enums: HashMap<&'a str, usize>,
    entities: HashMap<&'a str, usize>,
    services: HashMap<&'a str, usize>,
}

impl<'a> Checker<'a> {
    fn new(file: &'a SchemaFile) -> Self {
        Self {
            file,
            diagnostics: Vec::new(),
            enums: HashMap::new(),
            entities: HashMap::new(),
            services: HashMap::new(),
        }
    }

    fn run(&mut self) {
        let file = self.file;
        self.build_symbol_tables();

        for entity in &file.entities {
            self.check_entity(entity);
        }

        for service in &file.services {
            self.check_service(service);
        }
    }

    fn error(&mut self, pos: Pos, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(pos, message));
    }

    fn build_symbol_tables(&mut self) {
        let file = self.file;

        for (index, decl) in file.enums.iter().enumerate() {
            if self.enums.contains_key(decl.name.as_str()) {
                self.error(decl.pos, format!("duplicate enum: {}", decl.name));
            } else {
                self.enums.insert(&decl.name, index);
            }
        }

        for (index, decl) in file.entities.iter().enumerate() {
            if self.entities.contains_key(decl.name.as_str()) {
                self.error(decl.pos, format!("duplicate entity: {}", decl.name));
            } else {
                self.entities.insert(&decl.name, index);
            }
        }

        for (index, decl) in file.services.iter().enumerate() {
            if self.services.contains_key(decl.name.as_str()) {
                self.error(decl.pos, format!("duplicate service: {}", decl.name));
            } else {
                self.services.insert(&decl.name, index);
            }
        }
    }

    fn check_entity(&mut self, entity: &EntityDecl) {
        self.check_entity_annotations(entity);

        let mut field_names: HashSet<&str> = HashSet::new();
        let mut has_primary_key = false;

        for field in &entity.fields {
            if !field_names.insert(&field.name) {
                self.error(field.pos, format!("duplicate field: {}", field.name));
            }

            self.check_type(&field.ty);
            self.check_field_annotations(field);

            if field.is_primary_key() {
                if has_primary_key {
                    self.error(
                        field.pos,
                        format!("entity {} has multiple primary keys", entity.name),
                    );
                }
                has_primary_key = true;
            }
        }

        // Advisory: generation can still proceed without a primary key.
        if !has_primary_key && !entity.fields.is_empty() {
            self.error(
                entity.pos,
                format!("entity {} has no primary key (@pk)", entity.name),
            );
        }

        for query in &entity.queries {
            self.check_query(entity, query);
        }
    }

    fn check_entity_annotations(&mut self, entity: &EntityDecl) {
        for ann in &entity.annotations {
            match ann.name.as_str() {
                "table" => {
                    if ann.args.is_empty() {
                        self.error(ann.pos, "@table requires a table name");
                    } else if !matches!(ann.args[0].value, Some(Value::Str(_))) {
                        self.error(ann.pos, "@table argument must be a string");
                    }
                }
                "backends" => {
                    for arg in &ann.args {
                        if let Some(Value::Str(backend)) = &arg.value {
                            if !KNOWN_BACKENDS.contains(&backend.as_str()) {
                                self.error(ann.pos, format!("unknown backend: {}", backend));
                            }
                        }
                    }
                }
                _ => {
                    self.error(ann.pos, format!("unknown entity annotation: @{}", ann.name));
                }
            }
        }
    }

    fn check_field_annotations(&mut self, field: &FieldDecl) {
        for ann in &field.annotations {
            match ann.name.as_str() {
                // Marker annotations take no arguments.
                "pk" | "required" | "indexed" | "unique" => {}

                "default" => {
                    if ann.args.is_empty() {
                        self.error(ann.pos, "@default requires a value");
                    }
                }
                "length" => {
                    if ann.args.is_empty() {
                        self.error(ann.pos, "@length requires arguments");
                    }
                }
                "pattern" => {
                    if ann.args.is_empty() {
                        self.error(ann.pos, "@pattern requires a regex string");
                    }
                }
                "range" => {
                    if ann.args.len() < 2 {
                        self.error(ann.pos, "@range requires min and max values");
                    }
                }
                "fk" => self.check_fk_annotation(ann),
                "ondelete" => {
                    if ann.args.is_empty() {
                        self.error(ann.pos, "@ondelete requires action (cascade, setnull, restrict)");
                    }
                }
                _ => {
                    self.error(ann.pos, format!("unknown field annotation: @{}", ann.name));
                }
            }
        }

        if field.is_primary_key() && field.ty.optional {
            self.error(field.pos, "primary key cannot be optional");
        }
    }

    fn check_fk_annotation(&mut self, ann: &Annotation) {
        let Some(arg) = ann.args.first() else {
            self.error(ann.pos, "@fk requires Entity.field reference");
            return;
        };

        if let Some(Value::Str(reference)) = &arg.value {
            let parts: Vec<&str> = reference.split('.').collect();
            if parts.len() != 2 {
                self.error(ann.pos, "@fk must be in format Entity.field");
            } else if !self.entities.contains_key(parts[0]) {
                self.error(ann.pos, format!("unknown entity in @fk: {}", parts[0]));
            }
        }
    }

    fn check_type(&mut self, ty: &TypeRef) {
        if BUILTIN_TYPES.contains(&ty.name.as_str()) {
            return;
        }
        if self.enums.contains_key(ty.name.as_str()) {
            return;
        }
        if self.entities.contains_key(ty.name.as_str()) {
            return;
        }
        self.error(ty.pos, format!("unknown type: {}", ty.name));
    }

    fn check_query(&mut self, entity: &EntityDecl, query: &QueryDecl) {
        // The query scope: entity fields plus this query's parameters.
        let mut scope: HashSet<&str> = entity.fields.iter().map(|f| f.name.as_str()).collect();
        for param in &query.params {
            scope.insert(&param.name);
            self.check_type(&param.ty);
        }

        if let Some(where_clause) = &query.where_clause {
            self.check_expr(where_clause, &scope);
        }

        for order_by in &query.order_by {
            if !scope.contains(order_by.field.as_str()) {
                self.error(
                    order_by.pos,
                    format!("unknown field in ORDER BY: {}", order_by.field),
                );
            }
        }

        if let Some(limit) = &query.limit {
            self.check_expr(limit, &scope);
        }
    }

    fn check_expr(&mut self, expr: &Expr, scope: &HashSet<&str>) {
        match expr {
            Expr::Binary { left, right, .. } => {
                self.check_expr(left, scope);
                self.check_expr(right, scope);
            }
            Expr::Unary { operand, .. } => self.check_expr(operand, scope),
            Expr::IsNull { operand, .. } => self.check_expr(operand, scope),
            Expr::Ident { pos, name } => {
                if !scope.contains(name.as_str()) && !BUILTIN_FUNCTIONS.contains(&name.as_str()) {
                    self.error(*pos, format!("unknown identifier: {}", name));
                }
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    self.check_expr(arg, scope);
                }
            }
            Expr::Paren { inner, .. } => self.check_expr(inner, scope),
            Expr::Literal { .. } => {}
        }
    }

    fn check_service(&mut self, service: &ServiceDecl) {
        for rpc in &service.methods {
            if let Some(request) = &rpc.request {
                self.check_rpc_type(request);
            }
            if let Some(response) = &rpc.response {
                self.check_rpc_type(response);
            }
        }
    }

    fn check_rpc_type(&mut self, rpc_type: &RpcType) {
        if self.entities.contains_key(rpc_type.name.as_str()) {
            return;
        }
        if STANDARD_RPC_TYPES.contains(&rpc_type.name.as_str()) {
            return;
        }
        // Request/Response-suffixed messages are conventionally generated
        // alongside the service and not declared in the schema.
        if rpc_type.name.ends_with("Request") || rpc_type.name.ends_with("Response") {
            return;
        }
        // A message embedding an entity name (e.g. EventBatch) resolves too.
        if self.entities.keys().any(|name| rpc_type.name.contains(*name)) {
            return;
        }
        self.error(
            rpc_type.pos,
            format!("unknown RPC type: {}", rpc_type.name),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parser::parse;

    fn check_source(source: &str) -> Vec<Diagnostic> {
        let (file, diagnostics) = parse(source);
        assert!(diagnostics.is_empty(), "parse diagnostics: {:?}", diagnostics);
        check(&file)
    }

    const VALID_SCHEMA: &str = r#"
        package acos.calendar;

        enum Visibility {
            PUBLIC = 0;
            PRIVATE = 1;
        }

        @table("events")
        @backends("sqlite", "postgres")
        entity Event {
            @pk id: string;
            @required title: string;
            start_date: timestamp;
            visibility: Visibility;
            parent: Event?;

            query upcoming(after: timestamp, before: timestamp) {
                where start_date >= after AND start_date < before
                order_by start_date ASC
            }
        }

        service CalendarSync {
            rpc Push(Event) returns (PushResult);
            rpc Pull(PullRequest) returns (stream Event);
        }
    "#;

    #[test]
    fn test_valid_schema_is_clean() {
        assert!(check_source(VALID_SCHEMA).is_empty());
    }

    #[test]
    fn test_check_is_deterministic() {
        let (file, _) = parse(VALID_SCHEMA);
        assert_eq!(check(&file), check(&file));
    }

    #[test]
    fn test_duplicate_entity() {
        let diagnostics =
            check_source("entity E { @pk id: int64; }\nentity E { @pk id: int64; }");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "duplicate entity: E");
        assert_eq!(diagnostics[0].pos.line, 2);
    }

    #[test]
    fn test_unknown_type() {
        let diagnostics = check_source("entity E { @pk id: int64; owner: User; }");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "unknown type: User");
    }

    #[test]
    fn test_duplicate_field_reported_once_and_count_preserved() {
        let (file, _) = parse("entity E { @pk id: int64; name: string; name: string; }");
        let diagnostics = check(&file);

        let dupes: Vec<&Diagnostic> = diagnostics
            .iter()
            .filter(|d| d.message == "duplicate field: name")
            .collect();
        assert_eq!(dupes.len(), 1);
        // The diagnostic points at the later occurrence.
        assert_eq!(dupes[0].pos.line, 1);
        assert_eq!(file.entities[0].fields.len(), 3);
    }

    #[test]
    fn test_multiple_primary_keys() {
        let diagnostics = check_source("entity E { @pk id: int64; @pk other: int64; }");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "entity E has multiple primary keys");
    }

    #[test]
    fn test_optional_primary_key() {
        let diagnostics = check_source("entity E { @pk id: string?; }");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "primary key cannot be optional");
    }

    #[test]
    fn test_missing_primary_key_is_advisory() {
        let diagnostics = check_source("entity E { name: string; }");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "entity E has no primary key (@pk)");
    }

    #[test]
    fn test_entity_without_fields_needs_no_primary_key() {
        assert!(check_source("entity Marker { }").is_empty());
    }

    #[test]
    fn test_table_annotation_requires_string() {
        let diagnostics = check_source(r#"@table entity E { @pk id: int64; }"#);
        assert_eq!(diagnostics[0].message, "@table requires a table name");

        let diagnostics = check_source("@table(42) entity E { @pk id: int64; }");
        assert_eq!(diagnostics[0].message, "@table argument must be a string");
    }

    #[test]
    fn test_unknown_backend() {
        let diagnostics =
            check_source(r#"@backends("sqlite", "oracle") entity E { @pk id: int64; }"#);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "unknown backend: oracle");
    }

    #[test]
    fn test_unknown_annotations() {
        let diagnostics = check_source("@shiny entity E { @pk @sparkly id: int64; }");
        let messages: Vec<&str> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert!(messages.contains(&"unknown entity annotation: @shiny"));
        assert!(messages.contains(&"unknown field annotation: @sparkly"));
    }

    #[test]
    fn test_annotation_arity() {
        let diagnostics = check_source(
            "entity E { @pk id: int64; @default score: int32; @range(1) level: int32; }",
        );
        let messages: Vec<&str> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert!(messages.contains(&"@default requires a value"));
        assert!(messages.contains(&"@range requires min and max values"));
    }

    #[test]
    fn test_fk_checks() {
        let diagnostics = check_source(
            r#"entity E { @pk id: int64; @fk("Missing.id") other: int64; }"#,
        );
        assert_eq!(diagnostics[0].message, "unknown entity in @fk: Missing");

        let diagnostics =
            check_source(r#"entity E { @pk id: int64; @fk("broken") other: int64; }"#);
        assert_eq!(diagnostics[0].message, "@fk must be in format Entity.field");

        let clean = check_source(
            r#"
            entity User { @pk id: int64; }
            entity Post { @pk id: int64; @fk("User.id") author: int64; }
            "#,
        );
        assert!(clean.is_empty());
    }

    #[test]
    fn test_unknown_identifier_in_where() {
        let diagnostics = check_source(
            r#"
            entity Event {
                @pk id: string;
                start_date: timestamp;
                query q(after: timestamp) {
                    where sttart_date >= after
                }
            }
            "#,
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "unknown identifier: sttart_date");
    }

    #[test]
    fn test_builtin_function_names_allowed() {
        let clean = check_source(
            "entity E { @pk id: int64; start_date: timestamp; query q() { where start_date >= NOW() } }",
        );
        assert!(clean.is_empty());
    }

    #[test]
    fn test_unknown_order_by_field() {
        let diagnostics = check_source(
            "entity E { @pk id: int64; query q() { order_by created DESC } }",
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "unknown field in ORDER BY: created");
    }

    #[test]
    fn test_limit_checked_against_scope() {
        let diagnostics =
            check_source("entity E { @pk id: int64; query q() { limit max_rows } }");
        assert_eq!(diagnostics[0].message, "unknown identifier: max_rows");

        let clean =
            check_source("entity E { @pk id: int64; query q(max_rows: int32) { limit max_rows } }");
        assert!(clean.is_empty());
    }

    #[test]
    fn test_query_parameter_types_are_resolved() {
        let diagnostics =
            check_source("entity E { @pk id: int64; query q(flag: Mystery) { } }");
        assert_eq!(diagnostics[0].message, "unknown type: Mystery");
    }

    #[test]
    fn test_duplicate_query_names_are_permitted() {
        let clean = check_source(
            "entity E { @pk id: int64; query q() { } query q() { } }",
        );
        assert!(clean.is_empty());
    }

    #[test]
    fn test_rpc_type_resolution() {
        let diagnostics = check_source(
            r#"
            entity Event { @pk id: string; }
            service S {
                rpc A(Event) returns (Result);
                rpc B(GetRequest) returns (GetResponse);
                rpc C(EventBatch) returns (Empty);
                rpc D(Bogus) returns (Empty);
            }
            "#,
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "unknown RPC type: Bogus");
    }
}
