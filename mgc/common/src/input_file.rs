use crate::Span;

pub type CodeId = usize;

/// A single unit of input source
#[derive(Debug, Eq, PartialEq, Hash)]
pub struct Code {
    /// The path this code was loaded from, if any.
    /// The main input read from stdin has no path.
    pub path: Option<Box<str>>,
    pub source: Box<str>,
}

/// All code files which take part in a compilation run.
///
/// Every file occupies a distinct, contiguous range of the global span
/// space, so any [`Span`] can be mapped back to its file without
/// further bookkeeping. A one-byte gap separates consecutive files so
/// an empty span at the end of one file cannot be attributed to the
/// next.
#[derive(Debug, Default)]
pub struct InputFiles {
    files: Vec<Code>,
    offsets: Vec<usize>,
    next_offset: usize,
}

impl InputFiles {
    pub fn add_input(&mut self, code: Code) -> CodeId {
        let id = self.files.len();
        self.offsets.push(self.next_offset);
        self.next_offset += code.source.len() + 1;
        self.files.push(code);
        id
    }

    pub fn get_input(&self, id: CodeId) -> &Code {
        &self.files[id]
    }

    /// The global offset at which the given file's spans start
    pub fn get_offset(&self, id: CodeId) -> usize {
        self.offsets[id]
    }

    pub fn find_by_path(&self, path: &str) -> Option<CodeId> {
        self.files
            .iter()
            .position(|code| code.path.as_deref() == Some(path))
    }

    /// Returns the id of the file which contains this span
    pub fn get_code_id(&self, span: Span) -> CodeId {
        assert!(!self.files.is_empty(), "No input files were added");
        self.offsets
            .partition_point(|&offset| offset <= span.start())
            .saturating_sub(1)
    }

    pub fn get_span_code(&self, span: Span) -> &Code {
        self.get_input(self.get_code_id(span))
    }

    /// Rebases a global span onto the file which contains it
    pub fn get_relative_span(&self, span: Span) -> Span {
        let offset = self.get_offset(self.get_code_id(span));
        Span::new(span.start() - offset, span.len())
    }

    pub fn get_span_str(&self, span: Span) -> &str {
        let code = self.get_span_code(span);
        self.get_relative_span(span).as_str(&code.source)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Code, InputFiles};
    use crate::Span;

    fn code(source: &str) -> Code {
        Code {
            path: None,
            source: source.into(),
        }
    }

    #[test]
    fn spans_map_to_files() {
        let mut files = InputFiles::default();
        let first = files.add_input(code("abc"));
        let second = files.add_input(code("defgh"));

        assert_eq!(files.get_offset(first), 0);
        assert_eq!(files.get_offset(second), 4);

        let span = Span::new(5, 2);
        assert_eq!(files.get_code_id(span), second);
        assert_eq!(files.get_span_str(span), "ef");
        assert_eq!(files.get_relative_span(span), Span::new(1, 2));
    }
}
