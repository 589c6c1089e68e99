use super::ast::*;
use super::diag::{Diagnostic, Pos};
use super::lexer::{Lexer, Token, TokenKind};

/// Parses a schema source string into a [`SchemaFile`] plus every
/// diagnostic encountered along the way.
///
/// The parser never fails outright: on an unexpected token it records a
/// diagnostic, skips the offender, and keeps going, so one run can surface
/// many independent syntax errors. A nonempty diagnostic list means the
/// returned tree may be structurally incomplete and must not be fed to
/// code generation.
pub fn parse(source: &str) -> (SchemaFile, Vec<Diagnostic>) {
    let mut parser = Parser::new(source);
    let file = parser.parse_file();
    (file, parser.into_diagnostics())
}

/// Recursive-descent parser with one token of lookahead.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    cur: Token,
    peek: Token,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut parser = Parser {
            lexer: Lexer::new(source),
            cur: Token::new(TokenKind::Eof, Pos::new(1, 1)),
            peek: Token::new(TokenKind::Eof, Pos::new(1, 1)),
            diagnostics: Vec::new(),
        };
        parser.bump();
        parser.bump();
        parser
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn bump(&mut self) {
        let next = self.read_token();
        self.cur = std::mem::replace(&mut self.peek, next);
    }

    /// Pulls the next token from the lexer, converting error tokens into
    /// diagnostics and skipping past them.
    fn read_token(&mut self) -> Token {
        loop {
            let token = self.lexer.next_token();
            match token.kind {
                TokenKind::Error(message) => {
                    self.diagnostics.push(Diagnostic::new(token.pos, message));
                }
                _ => return token,
            }
        }
    }

    fn pos(&self) -> Pos {
        self.cur.pos
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.cur.kind == *kind
    }

    fn at_peek(&self, kind: &TokenKind) -> bool {
        self.peek.kind == *kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error_expected(&mut self, expected: &str) {
        let message = format!("expected {}, found {}", expected, self.cur.kind);
        self.diagnostics.push(Diagnostic::new(self.cur.pos, message));
    }

    fn cur_ident(&self) -> Option<String> {
        match &self.cur.kind {
            TokenKind::Ident(name) => Some(name.clone()),
            _ => None,
        }
    }

    /// Identifier text of the current token, also accepting the keywords
    /// the grammar allows in identifier position.
    fn cur_ident_or_keyword(&self) -> Option<String> {
        self.cur_ident()
            .or_else(|| self.cur.kind.ident_spelling().map(str::to_string))
    }

    pub fn parse_file(&mut self) -> SchemaFile {
        let mut file = SchemaFile::default();

        while !self.at(&TokenKind::Eof) {
            match &self.cur.kind {
                TokenKind::Package => file.package = Some(self.parse_package()),
                TokenKind::Import => file.imports.push(self.parse_import()),
                TokenKind::Option => file.options.push(self.parse_option()),
                TokenKind::Enum => file.enums.push(self.parse_enum()),
                TokenKind::At => {
                    let annotations = self.parse_annotations();
                    if self.at(&TokenKind::Entity) {
                        let mut entity = self.parse_entity();
                        entity.annotations = annotations;
                        file.entities.push(entity);
                    } else {
                        self.error_expected("entity after annotations");
                        self.bump();
                    }
                }
                TokenKind::Entity => file.entities.push(self.parse_entity()),
                TokenKind::Service => file.services.push(self.parse_service()),
                _ => {
                    self.error_expected("package, import, option, enum, entity, or service");
                    self.bump();
                }
            }
        }

        file
    }

    /// `package name.space;`
    fn parse_package(&mut self) -> PackageDecl {
        let pos = self.pos();
        self.bump(); // 'package'

        let mut decl = PackageDecl {
            pos,
            name: String::new(),
        };
        let Some(name) = self.cur_ident() else {
            self.error_expected("package name");
            return decl;
        };
        decl.name = name;
        self.bump();

        while self.eat(&TokenKind::Dot) {
            match self.cur_ident() {
                Some(part) => {
                    decl.name.push('.');
                    decl.name.push_str(&part);
                    self.bump();
                }
                None => {
                    self.error_expected("identifier after '.'");
                    break;
                }
            }
        }

        self.eat(&TokenKind::Semicolon);
        decl
    }

    /// `import "path";`
    fn parse_import(&mut self) -> ImportDecl {
        let pos = self.pos();
        self.bump(); // 'import'

        let mut decl = ImportDecl {
            pos,
            path: String::new(),
        };
        if let TokenKind::Str(path) = &self.cur.kind {
            decl.path = path.clone();
            self.bump();
            self.eat(&TokenKind::Semicolon);
        } else {
            self.error_expected("import path string");
        }
        decl
    }

    /// `option name = value;`
    fn parse_option(&mut self) -> OptionDecl {
        let pos = self.pos();
        self.bump(); // 'option'

        let mut decl = OptionDecl {
            pos,
            name: String::new(),
            value: None,
        };
        let Some(name) = self.cur_ident() else {
            self.error_expected("option name");
            return decl;
        };
        decl.name = name;
        self.bump();

        if !self.eat(&TokenKind::Eq) {
            self.error_expected("'='");
            return decl;
        }

        decl.value = self.parse_value();
        self.bump();
        self.eat(&TokenKind::Semicolon);
        decl
    }

    /// `enum Name { VALUE = 0; ... }`
    fn parse_enum(&mut self) -> EnumDecl {
        let pos = self.pos();
        self.bump(); // 'enum'

        let mut decl = EnumDecl {
            pos,
            name: String::new(),
            values: Vec::new(),
        };
        let Some(name) = self.cur_ident() else {
            self.error_expected("enum name");
            return decl;
        };
        decl.name = name;
        self.bump();

        if !self.eat(&TokenKind::LBrace) {
            self.error_expected("'{'");
            return decl;
        }

        while !self.at(&TokenKind::RBrace) && !self.at(&TokenKind::Eof) {
            if let Some(value_name) = self.cur_ident() {
                let value_pos = self.pos();
                self.bump();

                let mut value = EnumValue {
                    pos: value_pos,
                    name: value_name,
                    number: 0,
                };
                if self.eat(&TokenKind::Eq) {
                    if let TokenKind::Int(number) = self.cur.kind {
                        value.number = number as i32;
                        self.bump();
                    }
                }
                self.eat(&TokenKind::Semicolon);
                decl.values.push(value);
            } else {
                self.error_expected("enum value name");
                self.bump();
            }
        }

        self.eat(&TokenKind::RBrace);
        decl
    }

    /// `entity Name { fields... queries... }`
    fn parse_entity(&mut self) -> EntityDecl {
        let pos = self.pos();
        self.bump(); // 'entity'

        let mut decl = EntityDecl {
            pos,
            annotations: Vec::new(),
            name: String::new(),
            fields: Vec::new(),
            queries: Vec::new(),
        };
        let Some(name) = self.cur_ident() else {
            self.error_expected("entity name");
            return decl;
        };
        decl.name = name;
        self.bump();

        if !self.eat(&TokenKind::LBrace) {
            self.error_expected("'{'");
            return decl;
        }

        while !self.at(&TokenKind::RBrace) && !self.at(&TokenKind::Eof) {
            match &self.cur.kind {
                TokenKind::At => {
                    let annotations = self.parse_annotations();
                    if matches!(self.cur.kind, TokenKind::Ident(_)) {
                        let mut field = self.parse_field();
                        field.annotations = annotations;
                        decl.fields.push(field);
                    }
                }
                TokenKind::Ident(_) => decl.fields.push(self.parse_field()),
                TokenKind::Query => decl.queries.push(self.parse_query()),
                _ => {
                    self.error_expected("field, query, or '}'");
                    self.bump();
                }
            }
        }

        self.eat(&TokenKind::RBrace);
        decl
    }

    fn parse_annotations(&mut self) -> Vec<Annotation> {
        let mut annotations = Vec::new();
        while self.at(&TokenKind::At) {
            annotations.push(self.parse_annotation());
        }
        annotations
    }

    /// `@name` or `@name(arg, name2: arg2, ...)`
    fn parse_annotation(&mut self) -> Annotation {
        let pos = self.pos();
        self.bump(); // '@'

        let mut ann = Annotation {
            pos,
            name: String::new(),
            args: Vec::new(),
        };
        let Some(name) = self.cur_ident() else {
            self.error_expected("annotation name");
            return ann;
        };
        ann.name = name;
        self.bump();

        if self.eat(&TokenKind::LParen) {
            while !self.at(&TokenKind::RParen) && !self.at(&TokenKind::Eof) {
                ann.args.push(self.parse_annotation_arg());
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.eat(&TokenKind::RParen);
        }

        ann
    }

    fn parse_annotation_arg(&mut self) -> AnnotationArg {
        let mut arg = AnnotationArg {
            pos: self.pos(),
            name: None,
            value: None,
        };

        // Named argument: `name = value` or `name: value`.
        if matches!(self.cur.kind, TokenKind::Ident(_))
            && (self.at_peek(&TokenKind::Eq) || self.at_peek(&TokenKind::Colon))
        {
            arg.name = self.cur_ident();
            self.bump(); // name
            self.bump(); // '=' or ':'
        }

        arg.value = self.parse_annotation_value();
        arg
    }

    fn parse_annotation_value(&mut self) -> Option<Value> {
        match &self.cur.kind {
            TokenKind::Str(s) => {
                let value = Value::Str(s.clone());
                self.bump();
                Some(value)
            }
            TokenKind::Int(v) => {
                let value = Value::Int(*v);
                self.bump();
                Some(value)
            }
            TokenKind::Float(v) => {
                let value = Value::Float(*v);
                self.bump();
                Some(value)
            }
            TokenKind::True => {
                self.bump();
                Some(Value::Bool(true))
            }
            TokenKind::False => {
                self.bump();
                Some(Value::Bool(false))
            }
            TokenKind::Ident(name) => {
                let value = Value::Ident(name.clone());
                self.bump();
                Some(value)
            }
            TokenKind::LBracket => Some(Value::List(self.parse_annotation_list())),
            _ => {
                self.bump();
                None
            }
        }
    }

    /// `[value, value, ...]`
    fn parse_annotation_list(&mut self) -> Vec<Value> {
        self.bump(); // '['
        let mut values = Vec::new();

        while !self.at(&TokenKind::RBracket) && !self.at(&TokenKind::Eof) {
            if let Some(value) = self.parse_annotation_value() {
                values.push(value);
            }
            self.eat(&TokenKind::Comma);
        }

        self.eat(&TokenKind::RBracket);
        values
    }

    /// `name: Type;`
    fn parse_field(&mut self) -> FieldDecl {
        let mut field = FieldDecl {
            pos: self.pos(),
            annotations: Vec::new(),
            name: String::new(),
            ty: TypeRef::default(),
        };

        let Some(name) = self.cur_ident() else {
            self.error_expected("field name");
            return field;
        };
        field.name = name;
        self.bump();

        if !self.eat(&TokenKind::Colon) {
            self.error_expected("':'");
            return field;
        }

        field.ty = self.parse_type_ref();
        self.eat(&TokenKind::Semicolon);
        field
    }

    fn parse_type_ref(&mut self) -> TypeRef {
        let mut ty = TypeRef {
            pos: self.pos(),
            ..TypeRef::default()
        };

        ty.name = match &self.cur.kind {
            TokenKind::TypeString => "string".to_string(),
            TokenKind::TypeInt32 => "int32".to_string(),
            TokenKind::TypeInt64 => "int64".to_string(),
            TokenKind::TypeFloat => "float".to_string(),
            TokenKind::TypeDouble => "double".to_string(),
            TokenKind::TypeBool => "bool".to_string(),
            TokenKind::TypeBytes => "bytes".to_string(),
            TokenKind::TypeTimestamp => "timestamp".to_string(),
            TokenKind::Ident(name) => name.clone(),
            _ => {
                self.error_expected("type name");
                return ty;
            }
        };
        self.bump();

        if self.eat(&TokenKind::Question) {
            ty.optional = true;
        }

        ty
    }

    /// `query name(params) { where ... order_by ... limit ... }`
    fn parse_query(&mut self) -> QueryDecl {
        let pos = self.pos();
        self.bump(); // 'query'

        let mut query = QueryDecl {
            pos,
            name: String::new(),
            params: Vec::new(),
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
        };
        let Some(name) = self.cur_ident() else {
            self.error_expected("query name");
            return query;
        };
        query.name = name;
        self.bump();

        if !self.eat(&TokenKind::LParen) {
            self.error_expected("'('");
            return query;
        }
        while !self.at(&TokenKind::RParen) && !self.at(&TokenKind::Eof) {
            query.params.push(self.parse_query_param());
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.eat(&TokenKind::RParen);

        if !self.eat(&TokenKind::LBrace) {
            self.error_expected("'{'");
            return query;
        }

        while !self.at(&TokenKind::RBrace) && !self.at(&TokenKind::Eof) {
            match &self.cur.kind {
                TokenKind::Where => {
                    self.bump();
                    query.where_clause = Some(self.parse_expr());
                }
                TokenKind::OrderBy => {
                    self.bump();
                    query.order_by = self.parse_order_by();
                }
                TokenKind::Limit => {
                    self.bump();
                    query.limit = Some(self.parse_primary_expr());
                }
                _ => {
                    self.error_expected("where, order_by, limit, or '}'");
                    self.bump();
                }
            }
        }

        self.eat(&TokenKind::RBrace);
        query
    }

    /// `name: Type` with an optional `= default`. Keywords such as `limit`
    /// are valid parameter names.
    fn parse_query_param(&mut self) -> QueryParam {
        let mut param = QueryParam {
            pos: self.pos(),
            name: String::new(),
            ty: TypeRef::default(),
            default: None,
        };

        let Some(name) = self.cur_ident_or_keyword() else {
            self.error_expected("parameter name");
            return param;
        };
        param.name = name;
        self.bump();

        if !self.eat(&TokenKind::Colon) {
            self.error_expected("':'");
            return param;
        }
        param.ty = self.parse_type_ref();

        if self.eat(&TokenKind::Eq) {
            param.default = self.parse_value();
            self.bump();
        }

        param
    }

    /// `field ASC, field2 DESC, ...`
    fn parse_order_by(&mut self) -> Vec<OrderByField> {
        let mut fields = Vec::new();

        loop {
            let Some(name) = self.cur_ident() else { break };
            let mut field = OrderByField {
                pos: self.pos(),
                field: name,
                descending: false,
            };
            self.bump();

            if self.at(&TokenKind::Asc) {
                self.bump();
            } else if self.at(&TokenKind::Desc) {
                field.descending = true;
                self.bump();
            }

            fields.push(field);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        fields
    }

    fn parse_expr(&mut self) -> Expr {
        self.parse_or_expr()
    }

    fn parse_or_expr(&mut self) -> Expr {
        let mut left = self.parse_and_expr();

        while self.at(&TokenKind::Or) {
            let pos = self.pos();
            self.bump();
            let right = self.parse_and_expr();
            left = Expr::Binary {
                pos,
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        left
    }

    fn parse_and_expr(&mut self) -> Expr {
        let mut left = self.parse_compare_expr();

        while self.at(&TokenKind::And) {
            let pos = self.pos();
            self.bump();
            let right = self.parse_compare_expr();
            left = Expr::Binary {
                pos,
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        left
    }

    /// Comparisons do not chain; `IS [NOT] NULL` is handled here as a
    /// postfix form since it has no right-hand expression.
    fn parse_compare_expr(&mut self) -> Expr {
        let left = self.parse_add_expr();

        let op = match &self.cur.kind {
            TokenKind::Eq => Some(BinOp::Eq),
            TokenKind::NotEq => Some(BinOp::NotEq),
            TokenKind::Lt => Some(BinOp::Lt),
            TokenKind::LtEq => Some(BinOp::LtEq),
            TokenKind::Gt => Some(BinOp::Gt),
            TokenKind::GtEq => Some(BinOp::GtEq),
            TokenKind::Like => Some(BinOp::Like),
            TokenKind::In => Some(BinOp::In),
            TokenKind::Is => {
                let pos = self.pos();
                self.bump();
                let negated = self.eat(&TokenKind::Not);
                self.eat(&TokenKind::Null);
                return Expr::IsNull {
                    pos,
                    operand: Box::new(left),
                    negated,
                };
            }
            _ => None,
        };

        if let Some(op) = op {
            let pos = self.pos();
            self.bump();
            let right = self.parse_add_expr();
            return Expr::Binary {
                pos,
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        left
    }

    fn parse_add_expr(&mut self) -> Expr {
        let mut left = self.parse_mul_expr();

        loop {
            let op = match &self.cur.kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                TokenKind::Concat => BinOp::Concat,
                _ => break,
            };
            let pos = self.pos();
            self.bump();
            let right = self.parse_mul_expr();
            left = Expr::Binary {
                pos,
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        left
    }

    fn parse_mul_expr(&mut self) -> Expr {
        let mut left = self.parse_unary_expr();

        loop {
            let op = match &self.cur.kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            let pos = self.pos();
            self.bump();
            let right = self.parse_unary_expr();
            left = Expr::Binary {
                pos,
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        left
    }

    fn parse_unary_expr(&mut self) -> Expr {
        if self.at(&TokenKind::Not) {
            let pos = self.pos();
            self.bump();
            return Expr::Unary {
                pos,
                op: UnaryOp::Not,
                operand: Box::new(self.parse_unary_expr()),
            };
        }

        if self.at(&TokenKind::Minus) {
            let pos = self.pos();
            self.bump();
            return Expr::Unary {
                pos,
                op: UnaryOp::Neg,
                operand: Box::new(self.parse_unary_expr()),
            };
        }

        self.parse_primary_expr()
    }

    fn parse_primary_expr(&mut self) -> Expr {
        let pos = self.pos();

        // Keywords usable as identifiers in expression position, e.g. a
        // parameter named `limit`.
        if let Some(name) = self.cur.kind.ident_spelling() {
            let name = name.to_string();
            self.bump();
            return Expr::Ident { pos, name };
        }

        match &self.cur.kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.bump();
                if self.at(&TokenKind::LParen) {
                    return self.parse_call_expr(name, pos);
                }
                Expr::Ident { pos, name }
            }
            TokenKind::Int(v) => {
                let value = Literal::Int(*v);
                self.bump();
                Expr::Literal { pos, value }
            }
            TokenKind::Float(v) => {
                let value = Literal::Float(*v);
                self.bump();
                Expr::Literal { pos, value }
            }
            TokenKind::Str(s) => {
                let value = Literal::Str(s.clone());
                self.bump();
                Expr::Literal { pos, value }
            }
            TokenKind::True => {
                self.bump();
                Expr::Literal {
                    pos,
                    value: Literal::Bool(true),
                }
            }
            TokenKind::False => {
                self.bump();
                Expr::Literal {
                    pos,
                    value: Literal::Bool(false),
                }
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr();
                self.eat(&TokenKind::RParen);
                Expr::Paren {
                    pos,
                    inner: Box::new(inner),
                }
            }
            _ => {
                self.error_expected("expression");
                self.bump();
                Expr::Literal {
                    pos,
                    value: Literal::Null,
                }
            }
        }
    }

    /// `name(arg, arg, ...)` — the name has already been consumed.
    fn parse_call_expr(&mut self, name: String, pos: Pos) -> Expr {
        self.bump(); // '('
        let mut args = Vec::new();

        while !self.at(&TokenKind::RParen) && !self.at(&TokenKind::Eof) {
            args.push(self.parse_expr());
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        self.eat(&TokenKind::RParen);
        Expr::Call { pos, name, args }
    }

    /// `service Name { rpc methods... }`
    fn parse_service(&mut self) -> ServiceDecl {
        let pos = self.pos();
        self.bump(); // 'service'

        let mut svc = ServiceDecl {
            pos,
            name: String::new(),
            methods: Vec::new(),
        };
        let Some(name) = self.cur_ident() else {
            self.error_expected("service name");
            return svc;
        };
        svc.name = name;
        self.bump();

        if !self.eat(&TokenKind::LBrace) {
            self.error_expected("'{'");
            return svc;
        }

        while !self.at(&TokenKind::RBrace) && !self.at(&TokenKind::Eof) {
            if self.at(&TokenKind::Rpc) {
                svc.methods.push(self.parse_rpc());
            } else {
                self.error_expected("rpc or '}'");
                self.bump();
            }
        }

        self.eat(&TokenKind::RBrace);
        svc
    }

    /// `rpc Name([stream] Type) returns ([stream] Type);`
    fn parse_rpc(&mut self) -> RpcDecl {
        let pos = self.pos();
        self.bump(); // 'rpc'

        let mut rpc = RpcDecl {
            pos,
            name: String::new(),
            request: None,
            response: None,
        };
        let Some(name) = self.cur_ident() else {
            self.error_expected("rpc name");
            return rpc;
        };
        rpc.name = name;
        self.bump();

        if !self.eat(&TokenKind::LParen) {
            self.error_expected("'('");
            return rpc;
        }
        rpc.request = self.parse_rpc_type();
        if !self.eat(&TokenKind::RParen) {
            self.error_expected("')'");
            return rpc;
        }

        if !self.eat(&TokenKind::Returns) {
            self.error_expected("'returns'");
            return rpc;
        }

        if !self.eat(&TokenKind::LParen) {
            self.error_expected("'('");
            return rpc;
        }
        rpc.response = self.parse_rpc_type();
        if !self.eat(&TokenKind::RParen) {
            self.error_expected("')'");
            return rpc;
        }

        self.eat(&TokenKind::Semicolon);
        rpc
    }

    fn parse_rpc_type(&mut self) -> Option<RpcType> {
        let pos = self.pos();
        let stream = self.eat(&TokenKind::Stream);

        match self.cur_ident() {
            Some(name) => {
                self.bump();
                Some(RpcType { pos, stream, name })
            }
            None => {
                self.error_expected("type name");
                None
            }
        }
    }

    /// A bare literal value in `option` declarations and parameter
    /// defaults. Does not advance; callers consume the token afterwards.
    fn parse_value(&self) -> Option<Value> {
        match &self.cur.kind {
            TokenKind::Str(s) => Some(Value::Str(s.clone())),
            TokenKind::Int(v) => Some(Value::Int(*v)),
            TokenKind::Float(v) => Some(Value::Float(*v)),
            TokenKind::True => Some(Value::Bool(true)),
            TokenKind::False => Some(Value::Bool(false)),
            TokenKind::Ident(name) => Some(Value::Ident(name.clone())),
            _ => None,
        }
    }
}
