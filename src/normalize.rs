//! Freeform template text → markup where every line is either tagged markup or
//! a wrapped prose paragraph.

const EMPTY_PARAGRAPH: &str = "<p></p>";

#[derive(Debug, Default)]
struct OpenBlock {
    text: String,
    opens: usize,
    closes: usize,
}

impl OpenBlock {
    fn start(line: &str) -> Self {
        let mut block = OpenBlock::default();
        block.push_line(line);
        block
    }

    fn push_line(&mut self, line: &str) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(line);
        let (opens, closes) = bracket_counts(line);
        self.opens += opens;
        self.closes += closes;
    }

    fn balanced(&self) -> bool {
        self.opens == self.closes
    }
}

/// Classifies each line of `raw` and returns the normalized markup.
///
/// `#` comment lines are dropped first. A line with equal `<`/`>` counts is
/// emitted verbatim; an unequal count opens a block that swallows following
/// lines until the counts balance (or input ends). Bracket-free lines become
/// `<p>` paragraphs, and blank lines become empty paragraphs outside a block.
pub fn normalize(raw: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut block: Option<OpenBlock> = None;

    for line in raw.lines() {
        let stripped = line.trim();
        if stripped.starts_with('#') {
            continue;
        }

        if let Some(open) = block.as_mut() {
            open.push_line(line);
            if open.balanced() {
                if let Some(done) = block.take() {
                    out.push(done.text);
                }
            }
            continue;
        }

        if stripped.is_empty() {
            out.push(EMPTY_PARAGRAPH.to_string());
            continue;
        }

        let (opens, closes) = bracket_counts(line);
        if opens == 0 && closes == 0 {
            out.push(format!("<p>{stripped}</p>"));
        } else if opens == closes {
            out.push(line.to_string());
        } else {
            block = Some(OpenBlock::start(line));
        }
    }

    // An unbalanced block at end of input is flushed as-is.
    if let Some(open) = block {
        out.push(open.text);
    }

    out.join("\n")
}

fn bracket_counts(line: &str) -> (usize, usize) {
    line.chars().fold((0, 0), |(opens, closes), ch| match ch {
        '<' => (opens + 1, closes),
        '>' => (opens, closes + 1),
        _ => (opens, closes),
    })
}
