//! The namespace resolver
//!
//! Walks a chain of segments through the namespace graph, crossing
//! aliases and file imports. Aliases cross privacy walls once (so a
//! public alias to a private namespace resolves from outside);
//! concrete and file namespaces do not.

use mgc_ast::{ChainSegment, NamespaceId, NamespaceRef, Program};
use mgc_common::Ident;
use mgc_error::{LangError, LangErrorKind, Result};

/// Resolves `chain` relative to `top`.
///
/// `allow_private` permits the first step to enter a private inner
/// namespace; it is true when a namespace resolves a chain of its own
/// and after alias redirects.
pub fn resolve(
    program: &Program,
    top: NamespaceId,
    chain: &[ChainSegment],
    allow_private: bool,
) -> Result<NamespaceId> {
    Resolver {
        program,
        seen: Vec::new(),
    }
    .resolve(top, chain, allow_private)
}

struct Resolver<'a> {
    program: &'a Program,
    /// Ordered record of `(namespace identity, residual chain)` pairs
    /// encountered during this resolution; a repeated pair means the
    /// chain expands forever
    seen: Vec<(NamespaceId, Vec<Ident>)>,
}

impl Resolver<'_> {
    fn resolve(
        &mut self,
        top: NamespaceId,
        chain: &[ChainSegment],
        allow_private: bool,
    ) -> Result<NamespaceId> {
        let [first, rest @ ..] = chain else {
            return Ok(top);
        };

        let names: Vec<Ident> = chain.iter().map(|segment| segment.name.clone()).collect();
        if self.seen.contains(&(top, names.clone())) {
            let display = names
                .iter()
                .map(Ident::as_str)
                .collect::<Vec<_>>()
                .join("::");
            return Err(LangError::new(
                LangErrorKind::UnresolvedNamespace { chain: display },
                first.span,
            )
            .into());
        }
        self.seen.push((top, names));

        let inner = self.program[top]
            .inner
            .iter()
            .find(|inner| inner.name == first.name)
            .ok_or_else(|| {
                LangError::new(
                    LangErrorKind::UnknownNamespace {
                        name: first.name.clone(),
                    },
                    first.span,
                )
            })?;

        if inner.is_private && !allow_private {
            return Err(LangError::new(
                LangErrorKind::PrivateNamespace {
                    name: first.name.clone(),
                },
                first.span,
            )
            .into());
        }

        match &inner.target {
            NamespaceRef::Concrete(id) => self.resolve(*id, rest, false),
            NamespaceRef::Alias(alias) => {
                let mut combined = alias.segments.clone();
                combined.extend_from_slice(rest);
                // Aliases restart from the namespace they were found in
                self.resolve(top, &combined, true)
            }
            NamespaceRef::File(path) => {
                let file_root = self.program.files.get(path).copied().ok_or_else(|| {
                    LangError::new(
                        LangErrorKind::MissingFile {
                            path: path.to_string(),
                        },
                        first.span,
                    )
                })?;
                self.resolve(file_root, rest, false)
            }
        }
    }
}
