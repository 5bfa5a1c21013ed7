use crate::{Code, CodeId, InputFiles};

/// Shared state of a compilation run.
///
/// Most importantly this owns the loaded source files, which every
/// diagnostic needs in order to render its snippet.
#[derive(Debug, Default)]
pub struct CompileContext {
    pub input_files: InputFiles,
}

impl CompileContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_input_file(&mut self, code: Code) -> CodeId {
        self.input_files.add_input(code)
    }

    pub fn get_input_file(&self, id: CodeId) -> &Code {
        self.input_files.get_input(id)
    }
}
