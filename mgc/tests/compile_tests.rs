use mgc_lang::common::file_provider::MemoryFileProvider;
use mgc_lang::common::Code;
use mgc_lang::error::{AsAnnotationSnippet, CompileError, LangErrorKind, Result};
use mgc_lang::ir::Module;
use mgc_lang::CompileConfig;

fn compile_with_files(source: &str, files: &[(&str, &str)]) -> (Result<Module>, CompileConfig) {
    let mut provider = MemoryFileProvider::default();
    for (path, content) in files {
        provider.add_file(*path, *content);
    }
    let mut config = CompileConfig::new(Box::new(provider));
    let input = config.add_source(Code {
        path: None,
        source: source.into(),
    });
    let result: Result<Module> = (|| {
        let program = config.compute_ast(input)?;
        let analysis = config.compute_analysis(&program)?;
        Ok(config.compute_ir(&analysis))
    })();
    (result, config)
}

fn compile(source: &str) -> (Result<Module>, CompileConfig) {
    compile_with_files(source, &[])
}

fn compile_ok(source: &str) -> Module {
    let (result, config) = compile(source);
    match result {
        Ok(module) => module,
        Err(error) => panic!(
            "Expected the program to compile:\n{}",
            error.format(&config.compile_context)
        ),
    }
}

macro_rules! expect_error {
    ($source:expr, $error:pat) => {{
        let (result, config) = compile($source);
        match result {
            Ok(_) => panic!("Expected {} but compiled successfully", stringify!($error)),
            Err(CompileError::LangError(lang_error)) => {
                if !matches!(lang_error.kind, $error) {
                    panic!(
                        "Expected {} but got:\n{}",
                        stringify!($error),
                        AsAnnotationSnippet::to_string(&lang_error, &config.compile_context)
                    );
                }
            }
            Err(other) => panic!("{}", other.format(&config.compile_context)),
        }
    }};
}

const EMPTY_MAIN: &str = "object main { event create { } }";

#[test]
fn missing_main() {
    expect_error!("int x;", LangErrorKind::MissingMain);
    expect_error!(
        "namespace inner { object main { } }",
        LangErrorKind::MissingMain
    );
}

#[test]
fn illegal_assignment() {
    expect_error!(
        "object main { event create { int x; x = true; } }",
        LangErrorKind::IllegalAssignment { .. }
    );
    expect_error!(
        "object main { event create { bool b; b = 1.5; } }",
        LangErrorKind::IllegalAssignment { .. }
    );
}

#[test]
fn duplicate_definitions() {
    expect_error!(
        "int x; float x; object main { event create { } }",
        LangErrorKind::DuplicateDefinition { .. }
    );
    expect_error!(
        "object a { } object a { } object main { event create { } }",
        LangErrorKind::DuplicateDefinition { .. }
    );
    expect_error!(
        "object main { int x; bool x; event create { } }",
        LangErrorKind::DuplicateDefinition { .. }
    );
    expect_error!(
        "object main { event create { } event create { } }",
        LangErrorKind::DuplicateDefinition { .. }
    );
    expect_error!(
        "void f(int a, bool a) { } object main { event create { } }",
        LangErrorKind::DuplicateDefinition { .. }
    );
    expect_error!(
        "object main { event create { int x; int x; } }",
        LangErrorKind::DuplicateDefinition { .. }
    );
}

#[test]
fn inner_blocks_may_shadow() {
    compile_ok("object main { event create { int x; { bool x; } } }");
}

#[test]
fn void_bindings() {
    expect_error!("void x; object main { event create { } }", LangErrorKind::VoidBinding { .. });
    expect_error!(
        "object main { event create { void x; } }",
        LangErrorKind::VoidBinding { .. }
    );
    expect_error!(
        "void f(void a) { } object main { event create { } }",
        LangErrorKind::VoidBinding { .. }
    );
}

#[test]
fn reserved_names() {
    expect_error!(
        "object main { event create { int this; } }",
        LangErrorKind::ReservedIdent { .. }
    );
    expect_error!(
        "int super; object main { event create { } }",
        LangErrorKind::ReservedIdent { .. }
    );
}

#[test]
fn this_is_not_assignable() {
    expect_error!(
        "object main { event create { this = none; } }",
        LangErrorKind::ExpectedLvalue
    );
}

#[test]
fn break_needs_a_loop() {
    expect_error!(
        "object main { event create { break; } }",
        LangErrorKind::BreakOutsideLoop
    );
    compile_ok("object main { event create { while (true) { break; } } }");
    compile_ok("object helper { } object main { event create { foreach (helper h) { break; } } }");
}

#[test]
fn lvalue_discipline() {
    expect_error!(
        "object main { event create { 1 = 2; } }",
        LangErrorKind::ExpectedLvalue
    );
    expect_error!(
        "object main { event create { 1++; } }",
        LangErrorKind::ExpectedLvalue
    );
}

#[test]
fn argument_counts() {
    expect_error!(
        "void f(int a) { } object main { event create { f(); } }",
        LangErrorKind::ArgumentCountMismatch { .. }
    );
    expect_error!(
        "object helper { event create(int a) { } }
         object main { event create { create helper(1, 2); } }",
        LangErrorKind::ArgumentCountMismatch { .. }
    );
}

#[test]
fn main_create_takes_no_formals() {
    expect_error!(
        "object main { event create(int x) { } }",
        LangErrorKind::ArgumentCountMismatch { .. }
    );
}

#[test]
fn array_literals() {
    expect_error!(
        "object main { event create { int[3] a = [1, true, 3]; } }",
        LangErrorKind::MixedArrayLiteral { .. }
    );
    expect_error!(
        "object main { event create { int[3] a = [1, 1.5, 3]; } }",
        LangErrorKind::MixedArrayLiteral { .. }
    );
    compile_ok("object main { event create { int[2] a = [1, 2]; a[0] = a[1] + 1; } }");
}

#[test]
fn global_initializers() {
    expect_error!(
        "int x = 1 + 2; object main { event create { } }",
        LangErrorKind::IllegalGlobalInitializer
    );
    expect_error!(
        "string s = \"hi\"; object main { event create { } }",
        LangErrorKind::IllegalGlobalInitializer
    );
    // Constant int literals fold into float globals
    compile_ok("float x = 1; float y = -2.5; int[2] a = [1, 2]; object main { event create { } }");
}

#[test]
fn inheritance_cycle() {
    expect_error!(
        "object a : b { } object b : a { } object main { event create { } }",
        LangErrorKind::InheritanceCycle { .. }
    );
}

#[test]
fn unknown_parent() {
    expect_error!(
        "object a : nowhere { } object main { event create { } }",
        LangErrorKind::UnknownParent { .. }
    );
}

/// Homonymous objects in nested namespaces are distinct declarations,
/// not a cycle
#[test]
fn deep_homonymous_nesting() {
    compile_ok(
        "object a : s::a { }
         namespace s {
            object a : s::a { }
            namespace s {
                object a : s::a { }
                namespace s {
                    object a { }
                }
            }
         }
         object main { event create { create a(); } }",
    );
}

#[test]
fn event_shapes() {
    expect_error!(
        "object main { event step(int x) { } event create { } }",
        LangErrorKind::IllegalEventSignature { .. }
    );
    compile_ok("object main { event create(  ) { } event step { } event draw { } event destroy { } }");
}

#[test]
fn extern_methods_are_rejected() {
    expect_error!(
        "object main { extern void f(int x); event create { } }",
        LangErrorKind::ExternMethod { .. }
    );
}

#[test]
fn conditions_must_be_bool() {
    expect_error!(
        "object main { event create { if (1) { } } }",
        LangErrorKind::UnexpectedType { .. }
    );
    expect_error!(
        "object main { event create { while (1.5) { } } }",
        LangErrorKind::UnexpectedType { .. }
    );
}

#[test]
fn operators() {
    expect_error!(
        "object main { event create { bool b; b = true == false; } }",
        LangErrorKind::InvalidOperands { .. }
    );
    expect_error!(
        "object main { event create { float f; f = 1.5 % 2.0; } }",
        LangErrorKind::InvalidOperands { .. }
    );
    compile_ok(
        "object main { event create {
            int i; i = 7 % 3;
            bool b; b = 1 < 2 && !(2.5 >= 2.0) || 1 == 1;
            float f; f = 1 + 2.5; f += 1; f++;
         } }",
    );
}

#[test]
fn namespace_privacy() {
    expect_error!(
        "namespace outer { private namespace secret { void f() { } } }
         object main { event create { outer::secret::f(); } }",
        LangErrorKind::PrivateNamespace { .. }
    );
    // A namespace may enter its own private children, and a public
    // alias crosses the privacy wall once
    compile_ok(
        "private namespace secret { void f() { } }
         namespace outer {
            private namespace secret { void f() { } }
            namespace door = secret;
         }
         object main { event create { secret::f(); outer::door::f(); } }",
    );
}

#[test]
fn alias_loops_never_resolve() {
    expect_error!(
        "namespace a = b; namespace b = a; using a;
         object main { event create { } }",
        LangErrorKind::UnresolvedNamespace { .. }
    );
}

#[test]
fn unknown_namespace() {
    expect_error!(
        "object main { event create { nowhere::f(); } }",
        LangErrorKind::UnknownNamespace { .. }
    );
}

#[test]
fn using_imports() {
    compile_ok(
        "namespace lib { int shared; void helper() { } }
         using lib;
         object main { event create { shared = 1; helper(); } }",
    );
    // Imports of imports are followed; a `using` resolves relative to
    // the namespace that declares it
    compile_ok(
        "namespace a { using inner; namespace inner { void f() { } } }
         using a;
         object main { event create { f(); } }",
    );
}

#[test]
fn circular_file_imports() {
    let (result, config) = compile_with_files(
        "namespace a = open \"a.mg\"; object main { event create { } }",
        &[
            ("a.mg", "namespace b = open \"b.mg\"; int x;"),
            ("b.mg", "namespace a = open \"a.mg\"; int y;"),
        ],
    );
    match result {
        Err(CompileError::LangError(error)) => {
            assert!(
                matches!(error.kind, LangErrorKind::CircularFileDependency { .. }),
                "Expected a circular dependency, got:\n{}",
                AsAnnotationSnippet::to_string(&error, &config.compile_context)
            );
        }
        Err(other) => panic!("{}", other.format(&config.compile_context)),
        Ok(_) => panic!("Expected a circular dependency"),
    }
}

#[test]
fn diamond_file_imports_are_fine() {
    let (result, config) = compile_with_files(
        "namespace a = open \"a.mg\"; namespace b = open \"b.mg\";
         object main { event create { a::lib::f(); b::lib::f(); } }",
        &[
            ("a.mg", "namespace lib = open \"lib.mg\";"),
            ("b.mg", "namespace lib = open \"lib.mg\";"),
            ("lib.mg", "void f() { }"),
        ],
    );
    if let Err(error) = result {
        panic!("{}", error.format(&config.compile_context));
    }
}

#[test]
fn std_is_injected_everywhere() {
    let module = compile_ok(
        "object main { event create {
            std::print::s(\"success\");
            std::game::end();
         } }",
    );
    // The wrappers resolve to the std file and the externs pass
    // through unmangled
    assert!(module.function_by_name("std.print.s").is_some());
    assert!(module.function_by_name("printstr").is_some());
    assert!(module.function_by_name("end_game").is_some());
}

#[test]
fn methods_and_members_are_inherited() {
    let module = compile_ok(
        "extern void print(int x);
         object parent { int x; void compute() { print(x); } }
         object child : parent { event create { x = 3; compute(); } }
         object main { event create { child c = create child(); } }",
    );
    assert!(module.function_by_name("parent.compute").is_some());
    assert!(module.function_by_name("child.create").is_some());
    assert!(module.function_by_name("child.new").is_some());
    // The child has no compute of its own
    assert!(module.function_by_name("child.compute").is_none());
}

#[test]
fn method_override_uses_static_chain() {
    let module = compile_ok(
        "extern void print(int x);
         object parent { int x; void compute() { print(x); } }
         object child2 : parent { void compute() { print(10); } event create { compute(); } }
         object main { event create { create child2(); } }",
    );
    assert!(module.function_by_name("parent.compute").is_some());
    assert!(module.function_by_name("child2.compute").is_some());
    let text = module.to_string();
    // child2's create dispatches to its own override
    assert!(text.contains("call child2.compute"));
}

#[test]
fn super_calls_the_parent_event() {
    compile_ok(
        "object parent { event create { } }
         object child : parent { event create { super(); } }
         object main { event create { create child(); } }",
    );
}

#[test]
fn conversions_are_explicit() {
    let module = compile_ok(
        "object main { event create { float y; y = 1 + 2.5; int i; i = 0.5; } }",
    );
    let text = module.to_string();
    assert!(text.contains("int_to_float"));
    assert!(text.contains("float_to_int"));
}

#[test]
fn object_equality_is_id_equality() {
    let module = compile_ok(
        "object helper { }
         object tracker : helper { }
         object main { event create {
            helper a; tracker b;
            bool same; same = a == b;
            bool gone; gone = a == none;
         } }",
    );
    let text = module.to_string();
    assert!(text.contains("cmp eq i64"));
}

#[test]
fn foreach_and_lazy_destruction() {
    let module = compile_ok(
        "extern void printstr(string x);
         extern void end_game();
         object helper { }
         object main {
            event create {
                for (int i = 0; i < 5; i++) { create helper(); }
                foreach (helper x) {
                    printstr(\"outer\");
                    foreach (helper y) { printstr(\"inner\"); destroy y; }
                }
                end_game();
            }
         }",
    );
    let text = module.to_string();
    // The type list sentinels and the two-cursor walk
    assert!(text.contains("global @helper.list.head"));
    assert!(text.contains("global @helper.list.tail"));
    assert!(text.contains("container_of helper"));
    // destroy dispatches through the vtable, then zeroes the id
    assert!(text.contains("call node.unlink"));
    // the synthesized destroy chains to the root handler
    assert!(text.contains("call object.destroy"));
    mgc_lang::ir::validate(&module).expect("The lowered module is structurally valid");
}

#[test]
fn runtime_contract_surface() {
    let module = compile_ok(EMPTY_MAIN);
    for name in ["global_create", "global_step", "global_draw"] {
        let function = module
            .function_by_name(name)
            .unwrap_or_else(|| panic!("{name} must be exported"));
        assert_eq!(function.linkage, mgc_lang::ir::Linkage::Export);
    }
    assert!(module.function_by_name("main.new").is_some());
    mgc_lang::ir::validate(&module).expect("The lowered module is structurally valid");
}

#[test]
fn mangling_reflects_namespaces() {
    let module = compile_ok(
        "namespace a { namespace b { void f() { } } }
         object main { event create { a::b::f(); } }",
    );
    assert!(module.function_by_name("a.b.f").is_some());
}

#[test]
fn foreach_needs_an_object_type() {
    expect_error!(
        "object main { event create { foreach (nothing x) { } } }",
        LangErrorKind::MissingObject { .. }
    );
}

#[test]
fn destroy_needs_an_object() {
    expect_error!(
        "object main { event create { destroy 1; } }",
        LangErrorKind::UnexpectedType { .. }
    );
    expect_error!(
        "object main { event create { destroy none; } }",
        LangErrorKind::UnexpectedType { .. }
    );
}

#[test]
fn member_access_needs_an_object() {
    expect_error!(
        "object main { event create { int x; bool b; b = x.alive; } }",
        LangErrorKind::UnexpectedType { .. }
    );
    expect_error!(
        "object helper { } object main { event create { helper h; h.missing = 1; } }",
        LangErrorKind::MissingMember { .. }
    );
}

#[test]
fn delete_is_destroy() {
    compile_ok(
        "object helper { }
         object main { event create { helper h; h = create helper(); delete h; } }",
    );
}
