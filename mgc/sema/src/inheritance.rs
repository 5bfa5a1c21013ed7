//! Inheritance cycle detection

use rustc_hash::FxHashSet;

use mgc_error::{LangError, LangErrorKind, Result};

use crate::{ObjectId, ObjectInfo};

/// Verifies that no inheritance chain revisits an object declaration.
///
/// Identity is the [`ObjectId`], so homonymous objects in nested
/// namespaces never alias each other.
pub fn check_cycles(objects: &[ObjectInfo]) -> Result<()> {
    let mut visited = FxHashSet::default();
    for (index, object) in objects.iter().enumerate() {
        visited.clear();
        let mut current = ObjectId(index as u32);
        visited.insert(current);
        while let Some(parent) = objects[current.index()].parent {
            if !visited.insert(parent) {
                return Err(LangError::new(
                    LangErrorKind::InheritanceCycle {
                        name: object.name.clone(),
                    },
                    object.span,
                )
                .into());
            }
            current = parent;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use mgc_common::{Ident, Span};

    use super::check_cycles;
    use crate::{EventSet, ObjectId, ObjectInfo};

    fn object(name: &str, parent: Option<ObjectId>) -> ObjectInfo {
        ObjectInfo {
            name: Ident::new(name),
            mangled: name.to_string(),
            parent,
            members: Vec::new(),
            methods: Vec::new(),
            events: EventSet::default(),
            span: Span::EMPTY,
        }
    }

    #[test]
    fn linear_chain_is_fine() {
        let objects = vec![
            object("object", None),
            object("a", Some(ObjectId(0))),
            object("b", Some(ObjectId(1))),
        ];
        assert!(check_cycles(&objects).is_ok());
    }

    #[test]
    fn detects_cycle() {
        let objects = vec![
            object("object", None),
            object("a", Some(ObjectId(2))),
            object("b", Some(ObjectId(1))),
        ];
        assert!(check_cycles(&objects).is_err());
    }
}
