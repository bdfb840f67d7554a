//! Folding several primitives of one variant into one.
//!
//! When consecutive building blocks each emit, say, an `environment`
//! primitive, the stage assembler can merge them into a single `ENV`
//! instruction so the image gets one layer instead of several.

use std::collections::BTreeMap;

use tracing::warn;

use super::{Arg, Comment, Copy, CopyEntry, Environment, Label, Primitive, Runscript, Shell};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
  #[error("cannot merge an empty list of primitives")]
  Empty,

  #[error("{0} primitives cannot be merged")]
  NotMergeable(&'static str),
}

/// Whether primitives of this kind can be passed to [`merge`].
pub fn is_mergeable(primitive: &Primitive) -> bool {
  matches!(
    primitive,
    Primitive::Shell(_)
      | Primitive::Copy(_)
      | Primitive::Environment(_)
      | Primitive::Label(_)
      | Primitive::Comment(_)
      | Primitive::Arg(_)
      | Primitive::Runscript(_)
  )
}

/// Merge a non-empty list of same-variant primitives into one.
///
/// The first item fixes the variant. Items of any other variant are logged
/// and skipped. Map-valued variants take the last value written for a key;
/// list-valued variants keep first-seen order and drop exact repeats (shell
/// commands are kept as-is). The result is scoped to `app`.
pub fn merge(primitives: &[Primitive], app: Option<&str>) -> Result<Primitive, MergeError> {
  let first = primitives.first().ok_or(MergeError::Empty)?;
  let app = app.map(str::to_string);

  let merged = match first {
    Primitive::Environment(_) => {
      let mut variables = BTreeMap::new();
      let mut export = false;
      for item in same_kind(primitives, first) {
        if let Primitive::Environment(env) = item {
          variables.extend(env.variables.clone());
          export |= env.export;
        }
      }
      Primitive::Environment(Environment { variables, export, app })
    }

    Primitive::Label(_) => {
      let mut labels = BTreeMap::new();
      for item in same_kind(primitives, first) {
        if let Primitive::Label(label) = item {
          labels.extend(label.labels.clone());
        }
      }
      Primitive::Label(Label { labels, app })
    }

    Primitive::Arg(_) => {
      let mut variables = BTreeMap::new();
      for item in same_kind(primitives, first) {
        if let Primitive::Arg(arg) = item {
          variables.extend(arg.variables.clone());
        }
      }
      Primitive::Arg(Arg { variables })
    }

    Primitive::Comment(_) => {
      let mut texts: Vec<String> = Vec::new();
      for item in same_kind(primitives, first) {
        if let Primitive::Comment(comment) = item {
          push_unique(&mut texts, comment.text.clone());
        }
      }
      Primitive::Comment(Comment {
        text: texts.join("\n"),
        reformat: false,
        app,
      })
    }

    Primitive::Copy(head) => {
      let mut entries: Vec<CopyEntry> = Vec::new();
      let mut exclude: Vec<String> = Vec::new();
      for item in same_kind(primitives, first) {
        let Primitive::Copy(copy) = item else { continue };
        if copy.from != head.from {
          warn!(
            expected = ?head.from,
            found = ?copy.from,
            "skipping copy from a different stage while merging"
          );
          continue;
        }
        if copy.chown != head.chown {
          warn!(
            expected = ?head.chown,
            found = ?copy.chown,
            "skipping copy with a different owner while merging"
          );
          continue;
        }
        for entry in &copy.entries {
          push_unique(&mut entries, entry.clone());
        }
        for pattern in &copy.exclude {
          push_unique(&mut exclude, pattern.clone());
        }
      }
      Primitive::Copy(Copy {
        entries,
        from: head.from.clone(),
        chown: head.chown.clone(),
        exclude,
        app,
      })
    }

    Primitive::Runscript(head) => {
      let mut commands: Vec<String> = Vec::new();
      for item in same_kind(primitives, first) {
        if let Primitive::Runscript(runscript) = item {
          for command in &runscript.commands {
            push_unique(&mut commands, command.clone());
          }
        }
      }
      Primitive::Runscript(Runscript {
        commands,
        exec: head.exec,
        app,
      })
    }

    Primitive::Shell(head) => {
      let commands = same_kind(primitives, first)
        .filter_map(|item| match item {
          Primitive::Shell(shell) => Some(shell.commands.iter().cloned()),
          _ => None,
        })
        .flatten()
        .collect();
      Primitive::Shell(Shell {
        commands,
        chdir: head.chdir,
        app,
      })
    }

    other => return Err(MergeError::NotMergeable(other.kind())),
  };

  Ok(merged)
}

/// Items of the same variant as `first`, logging every item that is not.
fn same_kind<'a>(primitives: &'a [Primitive], first: &'a Primitive) -> impl Iterator<Item = &'a Primitive> {
  let kind = first.kind();
  primitives.iter().filter(move |item| {
    if item.kind() == kind {
      true
    } else {
      warn!(expected = kind, found = item.kind(), "skipping mismatched primitive while merging");
      false
    }
  })
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
  if !items.contains(&item) {
    items.push(item);
  }
}
