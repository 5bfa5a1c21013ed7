use std::collections::VecDeque;
use std::rc::Rc;

use logos::Logos;

use mgc_ast::{
    BinaryOp, Block, Chain, ChainSegment, EventDef, EventKind, ExprKind, Expression, Formal,
    Function, FunctionDef, GlobalDef, InnerNamespace, MemberDef, Namespace, NamespaceId,
    NamespaceRef, ObjectDef, Program, Statement, TypePath, TypeSpec, TypeSpecKind, UnaryOp,
    UsingImport,
};
use mgc_common::{Ident, Span};
use mgc_error::ParseError;

use crate::token::{Token, TokenKind};

pub type ParseResult<T> = Result<T, ParseError>;

/// Parses one source file into the program arena and returns the id of
/// its root namespace.
///
/// `offset` is the global span offset of this file, obtained from
/// [`mgc_common::InputFiles::get_offset`].
pub fn parse_file(program: &mut Program, source: &str, offset: usize) -> ParseResult<NamespaceId> {
    let mut parser = Parser::new(program, source, offset);
    let namespace = parser.parse_namespace_items(TokenKind::EndOfInput)?;
    Ok(parser.program.alloc(namespace))
}

pub struct Parser<'a, 'p> {
    source: &'a str,
    offset: usize,
    lexer: logos::Lexer<'a, TokenKind>,
    peeked: VecDeque<Token>,
    current: Token,
    pub program: &'p mut Program,
}

impl<'a, 'p> Parser<'a, 'p> {
    pub fn new(program: &'p mut Program, source: &'a str, offset: usize) -> Self {
        let lexer = TokenKind::lexer(source);
        let mut parser = Parser {
            source,
            offset,
            lexer,
            peeked: VecDeque::new(),
            current: Token {
                kind: TokenKind::Error,
                span: Span::EMPTY,
            },
            program,
        };
        parser.current = parser.next_raw();
        parser
    }

    fn next_raw(&mut self) -> Token {
        match self.lexer.next() {
            Some(kind) => {
                let range = self.lexer.span();
                Token {
                    kind,
                    span: Span::new(self.offset + range.start, range.len()),
                }
            }
            None => Token {
                kind: TokenKind::EndOfInput,
                span: Span::new(self.offset + self.source.len(), 0),
            },
        }
    }

    /// Consumes the current token
    fn bump(&mut self) -> Token {
        let token = self.current;
        self.current = match self.peeked.pop_front() {
            Some(token) => token,
            None => self.next_raw(),
        };
        token
    }

    /// Peeks `n` tokens ahead; `nth(0)` is the current token
    fn nth(&mut self, n: usize) -> Token {
        if n == 0 {
            return self.current;
        }
        while self.peeked.len() < n {
            let token = self.next_raw();
            self.peeked.push_back(token);
        }
        self.peeked[n - 1]
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        self.at(kind).then(|| self.bump())
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.error_expected(&[kind.describe()]))
        }
    }

    fn error_expected(&self, expected: &[&str]) -> ParseError {
        if self.current.kind == TokenKind::Error {
            ParseError::UnexpectedCharacter {
                span: self.current.span,
            }
        } else {
            ParseError::UnexpectedToken {
                span: self.current.span,
                expected: expected.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    fn text(&self, token: Token) -> &'a str {
        &self.source[token.span.start() - self.offset..token.span.end() - self.offset]
    }

    fn ident(&mut self) -> ParseResult<(Ident, Span)> {
        let token = self.expect(TokenKind::Ident)?;
        Ok((Ident::new(self.text(token)), token.span))
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    /// Parses namespace items until `terminator` is consumed
    fn parse_namespace_items(&mut self, terminator: TokenKind) -> ParseResult<Namespace> {
        let mut namespace = Namespace::default();
        loop {
            if self.eat(terminator).is_some() {
                return Ok(namespace);
            }
            if self.at(TokenKind::EndOfInput) {
                return Err(self.error_expected(&[terminator.describe()]));
            }
            self.parse_item(&mut namespace)?;
        }
    }

    fn parse_item(&mut self, namespace: &mut Namespace) -> ParseResult<()> {
        match self.current.kind {
            TokenKind::KwPublic | TokenKind::KwPrivate => {
                let is_private = self.current.kind == TokenKind::KwPrivate;
                self.bump();
                match self.current.kind {
                    TokenKind::KwNamespace => self.parse_namespace_decl(namespace, is_private),
                    TokenKind::KwUsing => self.parse_using(namespace, is_private),
                    _ => Err(self.error_expected(&["'namespace'", "'using'"])),
                }
            }
            TokenKind::KwNamespace => self.parse_namespace_decl(namespace, false),
            TokenKind::KwUsing => self.parse_using(namespace, false),
            TokenKind::KwExtern => {
                let start = self.bump().span;
                let (name, function) = self.parse_extern_signature(start)?;
                namespace.functions.push(FunctionDef {
                    span: function.span,
                    name,
                    function,
                });
                Ok(())
            }
            TokenKind::KwObject => self.parse_object(namespace),
            kind if kind.starts_type() => self.parse_global_or_function(namespace),
            _ => Err(self.error_expected(&["a declaration"])),
        }
    }

    /// `extern T name(formals);` with the `extern` keyword already
    /// consumed
    fn parse_extern_signature(&mut self, start: Span) -> ParseResult<(Ident, Function)> {
        let return_type = self.parse_type()?;
        let (name, _) = self.ident()?;
        let formals = self.parse_formals()?;
        let end = self.expect(TokenKind::Semicolon)?.span;
        let function = Function {
            return_type,
            formals,
            block: None,
            span: start.until(end),
        };
        Ok((name, function))
    }

    fn parse_namespace_decl(
        &mut self,
        namespace: &mut Namespace,
        is_private: bool,
    ) -> ParseResult<()> {
        let start = self.expect(TokenKind::KwNamespace)?.span;
        let (name, name_span) = self.ident()?;

        let (target, end) = match self.current.kind {
            TokenKind::BraceOpen => {
                self.bump();
                let inner = self.parse_namespace_items(TokenKind::BraceClose)?;
                let id = self.program.alloc(inner);
                (NamespaceRef::Concrete(id), name_span)
            }
            TokenKind::Assign => {
                self.bump();
                if self.eat(TokenKind::KwOpen).is_some() {
                    let token = self.expect(TokenKind::String)?;
                    let path = self.unescape_string(token);
                    let end = self.expect(TokenKind::Semicolon)?.span;
                    (NamespaceRef::File(path.as_ref().into()), end)
                } else {
                    let chain = self.parse_chain()?;
                    let end = self.expect(TokenKind::Semicolon)?.span;
                    (NamespaceRef::Alias(chain), end)
                }
            }
            _ => return Err(self.error_expected(&["'{'", "'='"])),
        };

        namespace.inner.push(InnerNamespace {
            name,
            is_private,
            target,
            span: start.until(end),
        });
        Ok(())
    }

    fn parse_using(&mut self, namespace: &mut Namespace, is_private: bool) -> ParseResult<()> {
        let start = self.expect(TokenKind::KwUsing)?.span;
        let chain = self.parse_chain()?;
        let end = self.expect(TokenKind::Semicolon)?.span;
        namespace.usings.push(UsingImport {
            is_private,
            chain,
            span: start.until(end),
        });
        Ok(())
    }

    fn parse_global_or_function(&mut self, namespace: &mut Namespace) -> ParseResult<()> {
        let typ = self.parse_type()?;
        let start = typ.span;
        let (name, _) = self.ident()?;

        match self.current.kind {
            TokenKind::ParenOpen => {
                let formals = self.parse_formals()?;
                let block = self.parse_block()?;
                let span = start.until(block.span);
                namespace.functions.push(FunctionDef {
                    name,
                    function: Function {
                        return_type: typ,
                        formals,
                        block: Some(block),
                        span,
                    },
                    span,
                });
                Ok(())
            }
            TokenKind::Assign => {
                self.bump();
                let init = self.parse_expr()?;
                let end = self.expect(TokenKind::Semicolon)?.span;
                namespace.globals.push(GlobalDef {
                    name,
                    typ,
                    init: Some(init),
                    span: start.until(end),
                });
                Ok(())
            }
            TokenKind::Semicolon => {
                let end = self.bump().span;
                namespace.globals.push(GlobalDef {
                    name,
                    typ,
                    init: None,
                    span: start.until(end),
                });
                Ok(())
            }
            _ => Err(self.error_expected(&["'('", "'='", "';'"])),
        }
    }

    fn parse_object(&mut self, namespace: &mut Namespace) -> ParseResult<()> {
        let start = self.expect(TokenKind::KwObject)?.span;
        let (name, _) = self.ident()?;

        let parent = if self.eat(TokenKind::Colon).is_some() {
            Some(self.parse_type_path()?)
        } else {
            None
        };

        self.expect(TokenKind::BraceOpen)?;

        let mut members = Vec::new();
        let mut methods = Vec::new();
        let mut events = Vec::new();
        let end = loop {
            if let Some(close) = self.eat(TokenKind::BraceClose) {
                break close.span;
            }
            match self.current.kind {
                TokenKind::KwEvent => events.push(self.parse_event()?),
                TokenKind::KwExtern => {
                    // Accepted here so the analyzer can reject it with
                    // a proper diagnostic
                    let extern_start = self.bump().span;
                    let (name, function) = self.parse_extern_signature(extern_start)?;
                    methods.push(FunctionDef {
                        span: function.span,
                        name,
                        function,
                    });
                }
                kind if kind.starts_type() => {
                    let typ = self.parse_type()?;
                    let member_start = typ.span;
                    let (name, _) = self.ident()?;
                    match self.current.kind {
                        TokenKind::Semicolon => {
                            let end = self.bump().span;
                            members.push(MemberDef {
                                name,
                                typ,
                                span: member_start.until(end),
                            });
                        }
                        TokenKind::ParenOpen => {
                            let formals = self.parse_formals()?;
                            let block = self.parse_block()?;
                            let span = member_start.until(block.span);
                            methods.push(FunctionDef {
                                name,
                                function: Function {
                                    return_type: typ,
                                    formals,
                                    block: Some(block),
                                    span,
                                },
                                span,
                            });
                        }
                        _ => return Err(self.error_expected(&["';'", "'('"])),
                    }
                }
                _ => {
                    return Err(self.error_expected(&["a member", "a method", "an event", "'}'"]))
                }
            }
        };

        namespace.objects.push(ObjectDef {
            name,
            parent,
            members,
            methods,
            events,
            span: start.until(end),
        });
        Ok(())
    }

    fn parse_event(&mut self) -> ParseResult<EventDef> {
        let start = self.expect(TokenKind::KwEvent)?.span;
        let kind = match self.current.kind {
            TokenKind::KwCreate => {
                self.bump();
                EventKind::Create
            }
            TokenKind::KwDestroy => {
                self.bump();
                EventKind::Destroy
            }
            TokenKind::Ident if self.text(self.current) == "step" => {
                self.bump();
                EventKind::Step
            }
            TokenKind::Ident if self.text(self.current) == "draw" => {
                self.bump();
                EventKind::Draw
            }
            _ => {
                return Err(
                    self.error_expected(&["'create'", "'step'", "'draw'", "'destroy'"])
                )
            }
        };

        let formals = if self.at(TokenKind::ParenOpen) {
            self.parse_formals()?
        } else {
            Vec::new()
        };
        let block = self.parse_block()?;
        let span = start.until(block.span);

        Ok(EventDef {
            kind,
            function: Function {
                return_type: TypeSpec {
                    kind: TypeSpecKind::Void,
                    span: start,
                },
                formals,
                block: Some(block),
                span,
            },
            span,
        })
    }

    fn parse_formals(&mut self) -> ParseResult<Vec<Formal>> {
        self.expect(TokenKind::ParenOpen)?;
        let mut formals = Vec::new();
        if !self.at(TokenKind::ParenClose) {
            loop {
                let typ = self.parse_type()?;
                let (name, name_span) = self.ident()?;
                formals.push(Formal {
                    span: typ.span.until(name_span),
                    name,
                    typ,
                });
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        self.expect(TokenKind::ParenClose)?;
        Ok(formals)
    }

    // ------------------------------------------------------------------
    // Types and chains
    // ------------------------------------------------------------------

    fn parse_chain(&mut self) -> ParseResult<Chain> {
        let (name, span) = self.ident()?;
        let mut segments = vec![ChainSegment { name, span }];
        while self.eat(TokenKind::PathSep).is_some() {
            let (name, span) = self.ident()?;
            segments.push(ChainSegment { name, span });
        }
        Ok(Chain { segments })
    }

    fn parse_type_path(&mut self) -> ParseResult<TypePath> {
        let chain = self.parse_chain()?;
        let span = chain.span();
        let mut segments = chain.segments;
        let last = segments.pop().expect("Chains are never empty");
        Ok(TypePath {
            chain: Chain { segments },
            name: last.name,
            span,
        })
    }

    fn parse_type(&mut self) -> ParseResult<TypeSpec> {
        let start = self.current.span;
        let (kind, end) = match self.current.kind {
            TokenKind::KwInt => (TypeSpecKind::Int, self.bump().span),
            TokenKind::KwBool => (TypeSpecKind::Bool, self.bump().span),
            TokenKind::KwFloat => (TypeSpecKind::Float, self.bump().span),
            TokenKind::KwString => (TypeSpecKind::Str, self.bump().span),
            TokenKind::KwVoid => (TypeSpecKind::Void, self.bump().span),
            TokenKind::KwSprite => (TypeSpecKind::Sprite, self.bump().span),
            TokenKind::KwSound => (TypeSpecKind::Sound, self.bump().span),
            TokenKind::Ident => {
                let path = self.parse_type_path()?;
                let end = path.span;
                (
                    TypeSpecKind::Object {
                        chain: path.chain,
                        name: path.name,
                    },
                    end,
                )
            }
            _ => return Err(self.error_expected(&["a type"])),
        };

        let mut typ = TypeSpec {
            kind,
            span: start.until(end),
        };
        while self.at(TokenKind::BracketOpen) {
            self.bump();
            let len_token = self.expect(TokenKind::Int)?;
            let len: u32 = self
                .text(len_token)
                .parse()
                .map_err(|_| ParseError::InvalidIntLiteral {
                    span: len_token.span,
                })?;
            let close = self.expect(TokenKind::BracketClose)?;
            typ = TypeSpec {
                span: start.until(close.span),
                kind: TypeSpecKind::Array {
                    elem: Box::new(typ),
                    len,
                },
            };
        }
        Ok(typ)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_block(&mut self) -> ParseResult<Block> {
        let open = self.expect(TokenKind::BraceOpen)?;
        let mut statements = Vec::new();
        let close = loop {
            if let Some(close) = self.eat(TokenKind::BraceClose) {
                break close;
            }
            if self.at(TokenKind::EndOfInput) {
                return Err(self.error_expected(&["'}'"]));
            }
            statements.push(self.parse_statement()?);
        };
        Ok(Block {
            statements,
            span: open.span.until(close.span),
        })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let current_kind = self.current.kind;
        match current_kind {
            TokenKind::BraceOpen => Ok(Statement::Block(self.parse_block()?)),
            TokenKind::KwReturn => {
                let start = self.bump().span;
                if let Some(end) = self.eat(TokenKind::Semicolon) {
                    return Ok(Statement::Return {
                        value: None,
                        span: start.until(end.span),
                    });
                }
                let value = self.parse_expr()?;
                let end = self.expect(TokenKind::Semicolon)?.span;
                Ok(Statement::Return {
                    value: Some(value),
                    span: start.until(end),
                })
            }
            TokenKind::KwBreak => {
                let start = self.bump().span;
                let end = self.expect(TokenKind::Semicolon)?.span;
                Ok(Statement::Break {
                    span: start.until(end),
                })
            }
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwWhile => {
                let start = self.bump().span;
                self.expect(TokenKind::ParenOpen)?;
                let condition = self.parse_expr()?;
                self.expect(TokenKind::ParenClose)?;
                let body = self.parse_block()?;
                let span = start.until(body.span);
                Ok(Statement::While {
                    condition,
                    body,
                    span,
                })
            }
            TokenKind::KwFor => {
                let start = self.bump().span;
                self.expect(TokenKind::ParenOpen)?;
                let init = Box::new(self.parse_simple_statement()?);
                let condition = self.parse_expr()?;
                self.expect(TokenKind::Semicolon)?;
                let step = self.parse_expr()?;
                self.expect(TokenKind::ParenClose)?;
                let body = self.parse_block()?;
                let span = start.until(body.span);
                Ok(Statement::For {
                    init,
                    condition,
                    step,
                    body,
                    span,
                })
            }
            TokenKind::KwForeach => {
                let start = self.bump().span;
                self.expect(TokenKind::ParenOpen)?;
                let typ = self.parse_type_path()?;
                let (name, name_span) = self.ident()?;
                self.expect(TokenKind::ParenClose)?;
                let body = self.parse_block()?;
                let span = start.until(body.span);
                Ok(Statement::Foreach {
                    typ,
                    name,
                    name_span,
                    body,
                    span,
                })
            }
            _ if self.at_declaration() => self.parse_simple_statement(),
            _ => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Statement::Expr(expr))
            }
        }
    }

    /// A declaration or expression statement, as allowed in `for`
    /// initializers. Consumes the trailing semicolon.
    fn parse_simple_statement(&mut self) -> ParseResult<Statement> {
        if self.at_declaration() {
            let typ = self.parse_type()?;
            let start = typ.span;
            let (name, _) = self.ident()?;
            let init = if self.eat(TokenKind::Assign).is_some() {
                Some(self.parse_expr()?)
            } else {
                None
            };
            let end = self.expect(TokenKind::Semicolon)?.span;
            Ok(Statement::VarDecl {
                name,
                typ,
                init,
                span: start.until(end),
            })
        } else {
            let expr = self.parse_expr()?;
            self.expect(TokenKind::Semicolon)?;
            Ok(Statement::Expr(expr))
        }
    }

    fn parse_if(&mut self) -> ParseResult<Statement> {
        let start = self.expect(TokenKind::KwIf)?.span;
        self.expect(TokenKind::ParenOpen)?;
        let condition = self.parse_expr()?;
        self.expect(TokenKind::ParenClose)?;
        let then_block = self.parse_block()?;
        let mut span = start.until(then_block.span);

        let else_block = if self.eat(TokenKind::KwElse).is_some() {
            let else_statement = match self.current.kind {
                TokenKind::KwIf => self.parse_if()?,
                TokenKind::BraceOpen => Statement::Block(self.parse_block()?),
                _ => return Err(self.error_expected(&["'if'", "'{'"])),
            };
            span = start.until(statement_span(&else_statement));
            Some(Box::new(else_statement))
        } else {
            None
        };

        Ok(Statement::If {
            condition,
            then_block,
            else_block,
            span,
        })
    }

    /// Decides whether the upcoming tokens form a variable declaration
    /// rather than an expression. Needed because both can start with an
    /// identifier chain (`a::b c;` vs `a::b();`).
    fn at_declaration(&mut self) -> bool {
        match self.current.kind {
            kind if kind.starts_type() && kind != TokenKind::Ident => true,
            TokenKind::Ident => {
                let mut i = 0;
                while self.nth(i + 1).kind == TokenKind::PathSep
                    && self.nth(i + 2).kind == TokenKind::Ident
                {
                    i += 2;
                }
                let mut j = i + 1;
                while self.nth(j).kind == TokenKind::BracketOpen
                    && self.nth(j + 1).kind == TokenKind::Int
                    && self.nth(j + 2).kind == TokenKind::BracketClose
                {
                    j += 3;
                }
                self.nth(j).kind == TokenKind::Ident
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub fn parse_expr(&mut self) -> ParseResult<Expression> {
        let lhs = self.parse_or()?;

        let compound = match self.current.kind {
            TokenKind::Assign => None,
            TokenKind::AssignPlus => Some(BinaryOp::Add),
            TokenKind::AssignMinus => Some(BinaryOp::Sub),
            TokenKind::AssignTimes => Some(BinaryOp::Mul),
            TokenKind::AssignDivide => Some(BinaryOp::Div),
            _ => return Ok(lhs),
        };
        self.bump();

        // Assignments associate to the right
        let value = self.parse_expr()?;
        let span = lhs.span.until(value.span);
        let kind = match compound {
            None => ExprKind::Assign {
                target: Box::new(lhs),
                value: Box::new(value),
            },
            Some(op) => ExprKind::CompoundAssign {
                op,
                target: Box::new(lhs),
                value: Box::new(value),
            },
        };
        Ok(Expression { kind, span })
    }

    fn binary(lhs: Expression, op: BinaryOp, rhs: Expression) -> Expression {
        Expression {
            span: lhs.span.until(rhs.span),
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        }
    }

    fn parse_or(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_and()?;
        while self.eat(TokenKind::OrOr).is_some() {
            let rhs = self.parse_and()?;
            lhs = Self::binary(lhs, BinaryOp::Or, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_equality()?;
        while self.eat(TokenKind::AndAnd).is_some() {
            let rhs = self.parse_equality()?;
            lhs = Self::binary(lhs, BinaryOp::And, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.current.kind {
                TokenKind::CmpEq => BinaryOp::Eq,
                TokenKind::CmpNe => BinaryOp::Ne,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.parse_relational()?;
            lhs = Self::binary(lhs, op, rhs);
        }
    }

    fn parse_relational(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.current.kind {
                TokenKind::CmpLt => BinaryOp::Lt,
                TokenKind::CmpLe => BinaryOp::Le,
                TokenKind::CmpGt => BinaryOp::Gt,
                TokenKind::CmpGe => BinaryOp::Ge,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.parse_additive()?;
            lhs = Self::binary(lhs, op, rhs);
        }
    }

    fn parse_additive(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.parse_multiplicative()?;
            lhs = Self::binary(lhs, op, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Self::binary(lhs, op, rhs);
        }
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        match self.current.kind {
            TokenKind::Minus => {
                let start = self.bump().span;
                let value = self.parse_unary()?;
                Ok(Expression {
                    span: start.until(value.span),
                    kind: ExprKind::Unary {
                        op: UnaryOp::Neg,
                        value: Box::new(value),
                    },
                })
            }
            TokenKind::Not => {
                let start = self.bump().span;
                let value = self.parse_unary()?;
                Ok(Expression {
                    span: start.until(value.span),
                    kind: ExprKind::Unary {
                        op: UnaryOp::Not,
                        value: Box::new(value),
                    },
                })
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let delta = if self.current.kind == TokenKind::PlusPlus {
                    1
                } else {
                    -1
                };
                let start = self.bump().span;
                let target = self.parse_unary()?;
                Ok(Expression {
                    span: start.until(target.span),
                    kind: ExprKind::Incr {
                        target: Box::new(target),
                        delta,
                        post: false,
                    },
                })
            }
            TokenKind::KwCreate => {
                let start = self.bump().span;
                let typ = self.parse_type_path()?;
                let (args, close) = self.parse_args()?;
                Ok(Expression {
                    span: start.until(close),
                    kind: ExprKind::Create { typ, args },
                })
            }
            TokenKind::KwDestroy | TokenKind::KwDelete => {
                let start = self.bump().span;
                let value = self.parse_unary()?;
                Ok(Expression {
                    span: start.until(value.span),
                    kind: ExprKind::Destroy {
                        value: Box::new(value),
                    },
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current.kind {
                TokenKind::Dot => {
                    self.bump();
                    let (name, name_span) = self.ident()?;
                    if self.at(TokenKind::ParenOpen) {
                        let (args, close) = self.parse_args()?;
                        expr = Expression {
                            span: expr.span.until(close),
                            kind: ExprKind::MethodCall {
                                base: Box::new(expr),
                                name,
                                name_span,
                                args,
                            },
                        };
                    } else {
                        expr = Expression {
                            span: expr.span.until(name_span),
                            kind: ExprKind::Member {
                                base: Box::new(expr),
                                name,
                                name_span,
                            },
                        };
                    }
                }
                TokenKind::BracketOpen => {
                    self.bump();
                    let index = self.parse_expr()?;
                    let close = self.expect(TokenKind::BracketClose)?;
                    expr = Expression {
                        span: expr.span.until(close.span),
                        kind: ExprKind::Index {
                            base: Box::new(expr),
                            index: Box::new(index),
                        },
                    };
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let delta = if self.current.kind == TokenKind::PlusPlus {
                        1
                    } else {
                        -1
                    };
                    let token = self.bump();
                    expr = Expression {
                        span: expr.span.until(token.span),
                        kind: ExprKind::Incr {
                            target: Box::new(expr),
                            delta,
                            post: true,
                        },
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_args(&mut self) -> ParseResult<(Vec<Expression>, Span)> {
        self.expect(TokenKind::ParenOpen)?;
        let mut args = Vec::new();
        if !self.at(TokenKind::ParenClose) {
            loop {
                args.push(self.parse_expr()?);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        let close = self.expect(TokenKind::ParenClose)?;
        Ok((args, close.span))
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        match self.current.kind {
            TokenKind::Int => {
                let token = self.bump();
                let value: i32 =
                    self.text(token)
                        .parse()
                        .map_err(|_| ParseError::InvalidIntLiteral { span: token.span })?;
                Ok(Expression {
                    kind: ExprKind::IntLit(value),
                    span: token.span,
                })
            }
            TokenKind::Float => {
                let token = self.bump();
                let value: f64 = self.text(token).parse().map_err(|_| {
                    ParseError::InvalidFloatLiteral { span: token.span }
                })?;
                Ok(Expression {
                    kind: ExprKind::FloatLit(value),
                    span: token.span,
                })
            }
            TokenKind::String => {
                let token = self.bump();
                let value = self.unescape_string(token);
                Ok(Expression {
                    kind: ExprKind::StringLit(value),
                    span: token.span,
                })
            }
            TokenKind::KwTrue | TokenKind::KwFalse => {
                let value = self.current.kind == TokenKind::KwTrue;
                let token = self.bump();
                Ok(Expression {
                    kind: ExprKind::BoolLit(value),
                    span: token.span,
                })
            }
            TokenKind::KwNone => {
                let token = self.bump();
                Ok(Expression {
                    kind: ExprKind::NoneLit,
                    span: token.span,
                })
            }
            TokenKind::ParenOpen => {
                self.bump();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::ParenClose)?;
                Ok(expr)
            }
            TokenKind::BracketOpen => {
                let open = self.bump();
                let mut elements = Vec::new();
                if !self.at(TokenKind::BracketClose) {
                    loop {
                        elements.push(self.parse_expr()?);
                        if self.eat(TokenKind::Comma).is_none() {
                            break;
                        }
                    }
                }
                let close = self.expect(TokenKind::BracketClose)?;
                Ok(Expression {
                    kind: ExprKind::ArrayLit(elements),
                    span: open.span.until(close.span),
                })
            }
            TokenKind::Ident => {
                let chain = self.parse_chain()?;
                if self.at(TokenKind::ParenOpen) {
                    let start = chain.span();
                    let (args, close) = self.parse_args()?;
                    Ok(Expression {
                        span: start.until(close),
                        kind: ExprKind::Call { chain, args },
                    })
                } else {
                    Ok(Expression {
                        span: chain.span(),
                        kind: ExprKind::Path(chain),
                    })
                }
            }
            _ => Err(self.error_expected(&["an expression"])),
        }
    }

    fn unescape_string(&self, token: Token) -> Rc<str> {
        let raw = self.text(token);
        let inner = &raw[1..raw.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                None => break,
            }
        }
        Rc::from(out)
    }
}

fn statement_span(statement: &Statement) -> Span {
    match statement {
        Statement::Block(block) => block.span,
        Statement::VarDecl { span, .. }
        | Statement::Return { span, .. }
        | Statement::Break { span }
        | Statement::If { span, .. }
        | Statement::While { span, .. }
        | Statement::For { span, .. }
        | Statement::Foreach { span, .. } => *span,
        Statement::Expr(expr) => expr.span,
    }
}
