//! Human-readable rendering of a parsed program, used by the `-a`
//! compiler mode

use std::fmt;

use itertools::Itertools;

use crate::ast_nodes::*;

/// Wraps a [`Program`] for display; obtained via [`Program::display`]
pub struct ProgramDisplay<'a> {
    program: &'a Program,
}

impl Program {
    pub fn display(&self) -> ProgramDisplay<'_> {
        ProgramDisplay { program: self }
    }
}

impl fmt::Display for ProgramDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = Printer {
            program: self.program,
            f,
            indent: 0,
        };
        printer.namespace(self.program.root)?;
        for (path, id) in &self.program.files {
            writeln!(printer.f, "file {path:?}:")?;
            printer.namespace(*id)?;
        }
        Ok(())
    }
}

struct Printer<'a, 'f, 'g> {
    program: &'a Program,
    f: &'f mut fmt::Formatter<'g>,
    indent: usize,
}

impl Printer<'_, '_, '_> {
    fn line(&mut self, text: impl fmt::Display) -> fmt::Result {
        writeln!(self.f, "{:indent$}{text}", "", indent = self.indent * 2)
    }

    fn nested(&mut self, body: impl FnOnce(&mut Self) -> fmt::Result) -> fmt::Result {
        self.indent += 1;
        body(self)?;
        self.indent -= 1;
        Ok(())
    }

    fn namespace(&mut self, id: NamespaceId) -> fmt::Result {
        let namespace = &self.program[id];
        for using in &namespace.usings {
            let vis = if using.is_private { "private " } else { "" };
            self.line(format_args!("{vis}using {}", using.chain.display()))?;
        }
        for global in &namespace.globals {
            let init = match &global.init {
                Some(expr) => format!(" = {}", expr_str(expr)),
                None => String::new(),
            };
            self.line(format_args!(
                "global {}: {}{init}",
                global.name,
                type_str(&global.typ)
            ))?;
        }
        for function in &namespace.functions {
            self.function(&function.name, &function.function)?;
        }
        for object in &namespace.objects {
            self.object(object)?;
        }
        for inner in &namespace.inner {
            let vis = if inner.is_private { "private " } else { "" };
            match &inner.target {
                NamespaceRef::Concrete(inner_id) => {
                    self.line(format_args!("{vis}namespace {}:", inner.name))?;
                    let inner_id = *inner_id;
                    self.nested(|printer| printer.namespace(inner_id))?;
                }
                NamespaceRef::Alias(chain) => {
                    self.line(format_args!(
                        "{vis}namespace {} = {}",
                        inner.name,
                        chain.display()
                    ))?;
                }
                NamespaceRef::File(path) => {
                    self.line(format_args!("{vis}namespace {} = open {path:?}", inner.name))?;
                }
            }
        }
        Ok(())
    }

    fn object(&mut self, object: &ObjectDef) -> fmt::Result {
        let parent = match &object.parent {
            Some(path) => format!(" : {}", type_path_str(path)),
            None => String::new(),
        };
        self.line(format_args!("object {}{parent}:", object.name))?;
        self.nested(|printer| {
            for member in &object.members {
                printer.line(format_args!(
                    "member {}: {}",
                    member.name,
                    type_str(&member.typ)
                ))?;
            }
            for method in &object.methods {
                printer.function(&method.name, &method.function)?;
            }
            for event in &object.events {
                printer.event(event)?;
            }
            Ok(())
        })
    }

    fn function(&mut self, name: &mgc_common::Ident, function: &Function) -> fmt::Result {
        let formals = function
            .formals
            .iter()
            .map(|formal| format!("{}: {}", formal.name, type_str(&formal.typ)))
            .join(", ");
        match &function.block {
            None => self.line(format_args!(
                "extern fn {name}({formals}) -> {}",
                type_str(&function.return_type)
            )),
            Some(block) => {
                self.line(format_args!(
                    "fn {name}({formals}) -> {}:",
                    type_str(&function.return_type)
                ))?;
                self.nested(|printer| printer.block(block))
            }
        }
    }

    fn event(&mut self, event: &EventDef) -> fmt::Result {
        let formals = event
            .function
            .formals
            .iter()
            .map(|formal| format!("{}: {}", formal.name, type_str(&formal.typ)))
            .join(", ");
        self.line(format_args!("event {}({formals}):", event.kind))?;
        match &event.function.block {
            Some(block) => self.nested(|printer| printer.block(block)),
            None => Ok(()),
        }
    }

    fn block(&mut self, block: &Block) -> fmt::Result {
        for statement in &block.statements {
            self.statement(statement)?;
        }
        Ok(())
    }

    fn statement(&mut self, statement: &Statement) -> fmt::Result {
        match statement {
            Statement::Block(block) => {
                self.line("block:")?;
                self.nested(|printer| printer.block(block))
            }
            Statement::VarDecl {
                name, typ, init, ..
            } => {
                let init = match init {
                    Some(expr) => format!(" = {}", expr_str(expr)),
                    None => String::new(),
                };
                self.line(format_args!("let {name}: {}{init}", type_str(typ)))
            }
            Statement::Expr(expr) => self.line(expr_str(expr)),
            Statement::Return { value, .. } => match value {
                Some(expr) => self.line(format_args!("return {}", expr_str(expr))),
                None => self.line("return"),
            },
            Statement::Break { .. } => self.line("break"),
            Statement::If {
                condition,
                then_block,
                else_block,
                ..
            } => {
                self.line(format_args!("if {}:", expr_str(condition)))?;
                self.nested(|printer| printer.block(then_block))?;
                if let Some(else_block) = else_block {
                    self.line("else:")?;
                    self.nested(|printer| printer.statement(else_block))?;
                }
                Ok(())
            }
            Statement::While {
                condition, body, ..
            } => {
                self.line(format_args!("while {}:", expr_str(condition)))?;
                self.nested(|printer| printer.block(body))
            }
            Statement::For {
                init,
                condition,
                step,
                body,
                ..
            } => {
                self.line("for:")?;
                self.nested(|printer| {
                    printer.statement(init)?;
                    printer.line(format_args!("while {}:", expr_str(condition)))?;
                    printer.nested(|printer| {
                        printer.block(body)?;
                        printer.line(expr_str(step))
                    })
                })
            }
            Statement::Foreach {
                typ, name, body, ..
            } => {
                self.line(format_args!("foreach {name}: {}:", type_path_str(typ)))?;
                self.nested(|printer| printer.block(body))
            }
        }
    }
}

fn type_path_str(path: &TypePath) -> String {
    if path.chain.segments.is_empty() {
        path.name.to_string()
    } else {
        format!("{}::{}", path.chain.display(), path.name)
    }
}

fn type_str(typ: &TypeSpec) -> String {
    match &typ.kind {
        TypeSpecKind::Int => "int".to_string(),
        TypeSpecKind::Bool => "bool".to_string(),
        TypeSpecKind::Float => "float".to_string(),
        TypeSpecKind::Str => "string".to_string(),
        TypeSpecKind::Void => "void".to_string(),
        TypeSpecKind::Sprite => "sprite".to_string(),
        TypeSpecKind::Sound => "sound".to_string(),
        TypeSpecKind::Object { chain, name } => {
            if chain.segments.is_empty() {
                name.to_string()
            } else {
                format!("{}::{name}", chain.display())
            }
        }
        TypeSpecKind::Array { elem, len } => format!("{}[{len}]", type_str(elem)),
    }
}

fn expr_str(expr: &Expression) -> String {
    match &expr.kind {
        ExprKind::IntLit(value) => value.to_string(),
        ExprKind::BoolLit(value) => value.to_string(),
        ExprKind::FloatLit(value) => format!("{value:?}"),
        ExprKind::StringLit(value) => format!("{value:?}"),
        ExprKind::NoneLit => "none".to_string(),
        ExprKind::Path(chain) => chain.display(),
        ExprKind::Member { base, name, .. } => format!("{}.{name}", expr_str(base)),
        ExprKind::Call { chain, args } => {
            format!("{}({})", chain.display(), args.iter().map(expr_str).join(", "))
        }
        ExprKind::MethodCall {
            base, name, args, ..
        } => format!(
            "{}.{name}({})",
            expr_str(base),
            args.iter().map(expr_str).join(", ")
        ),
        ExprKind::Index { base, index } => {
            format!("{}[{}]", expr_str(base), expr_str(index))
        }
        ExprKind::ArrayLit(elements) => {
            format!("[{}]", elements.iter().map(expr_str).join(", "))
        }
        ExprKind::Create { typ, args } => format!(
            "create {}({})",
            type_path_str(typ),
            args.iter().map(expr_str).join(", ")
        ),
        ExprKind::Destroy { value } => format!("destroy {}", expr_str(value)),
        ExprKind::Unary { op, value } => {
            let symbol = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Not => "!",
            };
            format!("{symbol}{}", expr_str(value))
        }
        ExprKind::Binary { op, lhs, rhs } => {
            format!("({} {op} {})", expr_str(lhs), expr_str(rhs))
        }
        ExprKind::Assign { target, value } => {
            format!("{} = {}", expr_str(target), expr_str(value))
        }
        ExprKind::CompoundAssign { op, target, value } => {
            format!("{} {op}= {}", expr_str(target), expr_str(value))
        }
        ExprKind::Incr {
            target,
            delta,
            post,
        } => {
            let symbol = if *delta > 0 { "++" } else { "--" };
            if *post {
                format!("{}{symbol}", expr_str(target))
            } else {
                format!("{symbol}{}", expr_str(target))
            }
        }
    }
}
