//! The compiler driver: file loading, standard library injection and
//! the parse → analyze → lower pipeline

// Public exports
pub use mgc_ast as ast;
pub use mgc_common as common;
pub use mgc_error as error;
pub use mgc_ir as ir;
pub use mgc_sema as sema;

use mgc_ast::{InnerNamespace, NamespaceId, NamespaceRef, Program};
use mgc_common::file_provider::FileProvider;
use mgc_common::{Code, CodeId, CompileContext, Ident, Span};
use mgc_error::{LangError, LangErrorKind, Result};
use mgc_ir::Module;
use mgc_sema::Analysis;

/// The embedded standard library source
pub const STD_SOURCE: &str = include_str!("../std.mg");
/// The path under which the standard library is injected
pub const STD_PATH: &str = "std.mg";

/// Falls back to the embedded standard library when the wrapped
/// provider has no `std.mg` of its own
struct StdFileProvider {
    inner: Box<dyn FileProvider>,
}

impl FileProvider for StdFileProvider {
    fn read_file(&self, name: &str) -> Option<Box<str>> {
        self.inner
            .read_file(name)
            .or_else(|| (name == STD_PATH).then(|| STD_SOURCE.into()))
    }
}

pub struct CompileConfig {
    pub compile_context: CompileContext,
    pub file_provider: Box<dyn FileProvider>,
}

impl CompileConfig {
    pub fn new(file_provider: Box<dyn FileProvider>) -> Self {
        CompileConfig {
            compile_context: CompileContext::new(),
            file_provider: Box::new(StdFileProvider {
                inner: file_provider,
            }),
        }
    }

    pub fn add_source(&mut self, code: Code) -> CodeId {
        self.compile_context.add_input_file(code)
    }

    /// Parses the main input and recursively loads every file it
    /// `open`s, carrying the set of in-progress paths to detect
    /// circular dependencies
    pub fn compute_ast(&mut self, input_id: CodeId) -> Result<Program> {
        let mut program = Program::default();

        let offset = self.compile_context.input_files.get_offset(input_id);
        let input = self.compile_context.get_input_file(input_id);
        let source = input.source.clone();
        let mut loading: Vec<Box<str>> = input.path.iter().cloned().collect();

        let root = mgc_parser::parse_file(&mut program, &source, offset)?;
        program.root = root;

        let count = program.namespace_count();
        if !loading.iter().any(|path| &**path == STD_PATH) {
            inject_std(&mut program, 0..count);
        }
        self.load_imports(&mut program, 0..count, &mut loading)?;

        Ok(program)
    }

    pub fn compute_analysis(&self, program: &Program) -> Result<Analysis> {
        mgc_sema::analyze(program)
    }

    pub fn compute_ir(&self, analysis: &Analysis) -> Module {
        mgc_ir::lower(analysis)
    }

    /// Loads the `open` targets of every namespace in the given arena
    /// range
    fn load_imports(
        &mut self,
        program: &mut Program,
        range: std::ops::Range<usize>,
        loading: &mut Vec<Box<str>>,
    ) -> Result<()> {
        for index in range {
            let id = NamespaceId(index as u32);
            let imports: Vec<(Box<str>, Span)> = program[id]
                .inner
                .iter()
                .filter_map(|inner| match &inner.target {
                    NamespaceRef::File(path) => Some((path.clone(), inner.span)),
                    _ => None,
                })
                .collect();
            for (path, span) in imports {
                self.load_file(program, &path, span, loading)?;
            }
        }
        Ok(())
    }

    fn load_file(
        &mut self,
        program: &mut Program,
        path: &str,
        span: Span,
        loading: &mut Vec<Box<str>>,
    ) -> Result<NamespaceId> {
        if let Some(existing) = program.files.get(path) {
            return Ok(*existing);
        }
        if loading.iter().any(|loaded| &**loaded == path) {
            return Err(LangError::new(
                LangErrorKind::CircularFileDependency {
                    path: path.to_string(),
                },
                span,
            )
            .into());
        }

        let Some(content) = self.file_provider.read_file(path) else {
            return Err(LangError::new(
                LangErrorKind::MissingFile {
                    path: path.to_string(),
                },
                span,
            )
            .into());
        };
        let code_id = self.compile_context.add_input_file(Code {
            path: Some(path.into()),
            source: content,
        });
        let offset = self.compile_context.input_files.get_offset(code_id);
        let source = self.compile_context.get_input_file(code_id).source.clone();

        loading.push(path.into());
        let start = program.namespace_count();
        let root = mgc_parser::parse_file(program, &source, offset)?;
        let end = program.namespace_count();

        if !loading.iter().any(|loaded| &**loaded == STD_PATH) {
            inject_std(program, start..end);
        }
        self.load_imports(program, start..end, loading)?;
        loading.pop();

        program.files.insert(path.into(), root);
        Ok(root)
    }
}

/// Appends the private `std` file namespace to every namespace of a
/// freshly parsed file, unless it declares its own `std`
fn inject_std(program: &mut Program, range: std::ops::Range<usize>) {
    for index in range {
        let id = NamespaceId(index as u32);
        let namespace = &mut program[id];
        if namespace.inner.iter().any(|inner| inner.name == "std") {
            continue;
        }
        namespace.inner.push(InnerNamespace {
            name: Ident::new("std"),
            is_private: true,
            target: NamespaceRef::File(STD_PATH.into()),
            span: Span::EMPTY,
        });
    }
}
