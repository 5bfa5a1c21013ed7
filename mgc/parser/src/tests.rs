use mgc_ast::{
    ExprKind, NamespaceRef, Program, Statement, TypeSpecKind,
};
use mgc_error::ParseError;

use crate::parse_file;

fn parse(source: &str) -> Program {
    let mut program = Program::default();
    let root = parse_file(&mut program, source, 0).expect("Expected a valid program");
    program.root = root;
    program
}

fn parse_err(source: &str) -> ParseError {
    let mut program = Program::default();
    parse_file(&mut program, source, 0).expect_err("Expected a parse error")
}

#[test]
fn parses_globals() {
    let program = parse("int x; float y = 1.5; int[3] values = [1, 2, 3];");
    let root = &program[program.root];
    assert_eq!(root.globals.len(), 3);
    assert_eq!(root.globals[0].name, "x");
    assert!(root.globals[0].init.is_none());
    assert!(matches!(
        root.globals[2].typ.kind,
        TypeSpecKind::Array { len: 3, .. }
    ));
}

#[test]
fn parses_functions_and_externs() {
    let program = parse(
        "extern void print(int x);
         int add(int a, int b) { return a + b; }",
    );
    let root = &program[program.root];
    assert_eq!(root.functions.len(), 2);
    assert!(root.functions[0].function.block.is_none());
    assert!(root.functions[1].function.block.is_some());
    assert_eq!(root.functions[1].function.formals.len(), 2);
}

#[test]
fn parses_namespace_forms() {
    let program = parse(
        "namespace a { int x; }
         private namespace b = a;
         namespace c = open \"lib.mg\";
         using a;",
    );
    let root = &program[program.root];
    assert_eq!(root.inner.len(), 3);
    assert!(matches!(root.inner[0].target, NamespaceRef::Concrete(_)));
    assert!(root.inner[1].is_private);
    assert!(matches!(root.inner[1].target, NamespaceRef::Alias(_)));
    match &root.inner[2].target {
        NamespaceRef::File(path) => assert_eq!(&**path, "lib.mg"),
        other => panic!("Expected a file namespace, got {other:?}"),
    }
    assert_eq!(root.usings.len(), 1);
}

#[test]
fn parses_objects() {
    let program = parse(
        "object helper : base {
            int lives;
            void hit(int damage) { lives = lives - damage; }
            event create(int start) { lives = start; }
            event step { }
            event destroy { }
         }",
    );
    let root = &program[program.root];
    let object = &root.objects[0];
    assert_eq!(object.name, "helper");
    assert_eq!(object.parent.as_ref().unwrap().name, "base");
    assert_eq!(object.members.len(), 1);
    assert_eq!(object.methods.len(), 1);
    assert_eq!(object.events.len(), 3);
    assert_eq!(object.events[0].function.formals.len(), 1);
}

#[test]
fn declaration_versus_expression() {
    // `a::b c;` declares, `a::b();` calls
    let program = parse(
        "void f() {
            a::b c;
            a::b();
            x[0] = 1;
         }",
    );
    let root = &program[program.root];
    let block = root.functions[0].function.block.as_ref().unwrap();
    assert!(matches!(block.statements[0], Statement::VarDecl { .. }));
    match &block.statements[1] {
        Statement::Expr(expr) => assert!(matches!(expr.kind, ExprKind::Call { .. })),
        other => panic!("Expected a call, got {other:?}"),
    }
    match &block.statements[2] {
        Statement::Expr(expr) => assert!(matches!(expr.kind, ExprKind::Assign { .. })),
        other => panic!("Expected an assignment, got {other:?}"),
    }
}

#[test]
fn expression_precedence() {
    let program = parse("int x = 1 + 2 * 3 == 7 && true || false;");
    let root = &program[program.root];
    let init = root.globals[0].init.as_ref().unwrap();
    // (((1 + (2 * 3)) == 7) && true) || false
    let ExprKind::Binary { op, lhs, .. } = &init.kind else {
        panic!("Expected a binary expression");
    };
    assert_eq!(*op, mgc_ast::BinaryOp::Or);
    let ExprKind::Binary { op, .. } = &lhs.kind else {
        panic!("Expected a nested && expression");
    };
    assert_eq!(*op, mgc_ast::BinaryOp::And);
}

#[test]
fn parses_object_expressions() {
    let program = parse(
        "void f() {
            other o = create a::other(1, none);
            o.hit(3);
            destroy o;
            delete o;
            o.lives++;
            --o.lives;
            foreach(other x) { break; }
         }",
    );
    let root = &program[program.root];
    let block = root.functions[0].function.block.as_ref().unwrap();
    assert_eq!(block.statements.len(), 7);
    assert!(matches!(block.statements[6], Statement::Foreach { .. }));
}

#[test]
fn rejects_bad_input() {
    assert!(matches!(
        parse_err("int x = ;"),
        ParseError::UnexpectedToken { .. }
    ));
    assert!(matches!(
        parse_err("int x = 99999999999999999999;"),
        ParseError::InvalidIntLiteral { .. }
    ));
    assert!(matches!(
        parse_err("int § = 1;"),
        ParseError::UnexpectedCharacter { .. }
    ));
    assert!(matches!(
        parse_err("namespace a {"),
        ParseError::UnexpectedToken { .. }
    ));
}
