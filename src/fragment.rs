use crate::error::NodeError;
use crate::inline::InlineStyle;
use crate::types::{Alignment, Color, FontSpec, Margins};
use base64::Engine;
use serde::{Serialize, Serializer};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    /// Points; `None` inherits the document font size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::styled(text, InlineStyle::default())
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self::styled(
            text,
            InlineStyle {
                bold: true,
                ..InlineStyle::default()
            },
        )
    }

    pub fn styled(text: impl Into<String>, style: InlineStyle) -> Self {
        Self {
            text: text.into(),
            bold: style.bold,
            italic: style.italic,
            underline: style.underline,
            size: None,
            font: None,
            color: None,
        }
    }

    /// A run in the configured error font.
    pub fn error(text: impl Into<String>, font: &FontSpec) -> Self {
        Self {
            text: text.into(),
            bold: font.style.is_bold(),
            italic: font.style.is_italic(),
            underline: false,
            size: Some(font.size),
            font: Some(font.name.clone()),
            color: Some(font.color),
        }
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = Some(size);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParagraphKind {
    #[default]
    Normal,
    Bullet,
    Numbered,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Paragraph {
    pub runs: Vec<Run>,
    pub align: Alignment,
    pub kind: ParagraphKind,
    /// List nesting depth, 0 for top-level items and plain paragraphs.
    pub level: u8,
}

impl Paragraph {
    pub fn new(runs: Vec<Run>, align: Alignment) -> Self {
        Self {
            runs,
            align,
            ..Self::default()
        }
    }

    pub fn list_item(runs: Vec<Run>, kind: ParagraphKind, level: u8) -> Self {
        Self {
            runs,
            align: Alignment::Left,
            kind,
            level,
        }
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PictureSource {
    File(PathBuf),
    Embedded(Vec<u8>),
}

impl Serialize for PictureSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PictureSource::File(path) => serializer.serialize_str(&path.to_string_lossy()),
            PictureSource::Embedded(bytes) => serializer.serialize_str(&format!(
                "base64:{}",
                base64::engine::general_purpose::STANDARD.encode(bytes)
            )),
        }
    }
}

/// A picture sized in inches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Picture {
    pub source: PictureSource,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TableCell {
    pub runs: Vec<Run>,
    pub align: Alignment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<Picture>,
}

impl TableCell {
    pub fn text(text: impl Into<String>) -> Self {
        Self::with_runs(vec![Run::plain(text)])
    }

    pub fn header(text: impl Into<String>) -> Self {
        Self::with_runs(vec![Run::bold(text)])
    }

    pub fn with_runs(runs: Vec<Run>) -> Self {
        Self {
            runs,
            ..Self::default()
        }
    }

    pub fn plain_text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

impl TableRow {
    pub fn new(cells: Vec<TableCell>) -> Self {
        Self { cells }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Table {
    pub style: String,
    pub columns: usize,
    pub rows: Vec<TableRow>,
    /// Inches; `None` lets the backend autofit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub column_widths: Vec<f32>,
}

impl Table {
    pub fn new(style: impl Into<String>, columns: usize) -> Self {
        Self {
            style: style.into(),
            columns,
            ..Self::default()
        }
    }

    pub fn push_row(&mut self, row: TableRow) {
        self.rows.push(row);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionPart {
    Header,
    Footer,
}

/// One append-only output primitive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph(Paragraph),
    Heading {
        level: u8,
        text: String,
        align: Alignment,
    },
    Table(Table),
    Picture {
        picture: Picture,
        align: Alignment,
    },
    SectionBreak {
        margins: Margins,
    },
    PageBreak {
        margins: Margins,
    },
    SectionPart {
        part: SectionPart,
        table: Table,
    },
}

/// Self-contained result of one handler invocation, not yet committed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment {
    pub blocks: Vec<Block>,
    pub error: Option<NodeError>,
}

impl Fragment {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(block: Block) -> Self {
        Self {
            blocks: vec![block],
            error: None,
        }
    }

    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            error: None,
        }
    }

    /// One paragraph holding `text` in the error font, recording `error`.
    pub fn error_marker(error: NodeError, text: impl Into<String>, font: &FontSpec) -> Self {
        Self {
            blocks: vec![Block::Paragraph(Paragraph::new(
                vec![Run::error(text, font)],
                Alignment::Left,
            ))],
            error: Some(error),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
