//! Small text helpers shared by the renderers.

/// Column limit for reformatted comments, prefix included.
pub const COMMENT_WIDTH: usize = 70;

/// Render comment text as `# `-prefixed lines.
///
/// With `reformat`, the text is treated as one paragraph and greedily wrapped
/// to [`COMMENT_WIDTH`]. Without it, every existing line gets the prefix.
pub fn comment(text: &str, reformat: bool) -> String {
  if text.trim().is_empty() {
    return String::new();
  }
  if reformat {
    wrap(text, COMMENT_WIDTH, "# ").join("\n")
  } else {
    text
      .lines()
      .map(|line| if line.is_empty() { "#".to_string() } else { format!("# {line}") })
      .collect::<Vec<_>>()
      .join("\n")
  }
}

/// Greedy word wrap. Words longer than the width get a line of their own.
pub fn wrap(text: &str, width: usize, prefix: &str) -> Vec<String> {
  let mut lines = Vec::new();
  let mut line = String::new();

  for word in text.split_whitespace() {
    if line.is_empty() {
      line = format!("{prefix}{word}");
    } else if line.len() + 1 + word.len() <= width {
      line.push(' ');
      line.push_str(word);
    } else {
      lines.push(std::mem::replace(&mut line, format!("{prefix}{word}")));
    }
  }
  if !line.is_empty() {
    lines.push(line);
  }
  lines
}

/// Split a command line into words the way a POSIX shell would, without
/// expanding anything. Returns `None` on an unterminated quote or a trailing
/// backslash.
pub fn shell_split(command: &str) -> Option<Vec<String>> {
  let mut words = Vec::new();
  let mut word = String::new();
  let mut in_word = false;
  let mut chars = command.chars();

  while let Some(c) = chars.next() {
    match c {
      c if c.is_whitespace() => {
        if in_word {
          words.push(std::mem::take(&mut word));
          in_word = false;
        }
      }
      '\'' => {
        in_word = true;
        loop {
          match chars.next()? {
            '\'' => break,
            c => word.push(c),
          }
        }
      }
      '"' => {
        in_word = true;
        loop {
          match chars.next()? {
            '"' => break,
            '\\' => match chars.next()? {
              c @ ('"' | '\\' | '$' | '`') => word.push(c),
              '\n' => {}
              c => {
                word.push('\\');
                word.push(c);
              }
            },
            c => word.push(c),
          }
        }
      }
      '\\' => {
        in_word = true;
        match chars.next()? {
          '\n' => {}
          c => word.push(c),
        }
      }
      c => {
        in_word = true;
        word.push(c);
      }
    }
  }
  if in_word {
    words.push(word);
  }
  Some(words)
}

/// Quote `word` for a POSIX shell. Words made only of characters the shell
/// treats literally are returned as they are.
pub fn shell_quote(word: &str) -> String {
  let literal = |c: char| c.is_ascii_alphanumeric() || "_-+=./,:@%^".contains(c);
  if !word.is_empty() && word.chars().all(literal) {
    return word.to_string();
  }
  format!("'{}'", word.replace('\'', r"'\''"))
}

/// Prefix every line of `text` with `indent`.
pub fn indent(text: &str, indent: &str) -> String {
  text
    .lines()
    .map(|line| format!("{indent}{line}"))
    .collect::<Vec<_>>()
    .join("\n")
}
