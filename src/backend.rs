use crate::config::RenderConfig;
use crate::error::DocweaveError;
use crate::fragment::{Block, Fragment, Paragraph, Picture, SectionPart, Table};
use crate::types::{Alignment, FontSpec, Margins, Orientation, Size};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::Path;

/// Append-only document-building primitives.
///
/// Handlers never see this trait: only the dispatcher's ordered commit step
/// calls it, one fragment at a time, in template order.
pub trait OutputBackend {
    fn add_paragraph(&mut self, paragraph: Paragraph);
    fn add_heading(&mut self, level: u8, text: String, align: Alignment);
    fn add_table(&mut self, table: Table);
    fn add_picture(&mut self, picture: Picture, align: Alignment);
    fn add_section(&mut self);
    /// Page break; `margins` apply from the new page on.
    fn add_page_break(&mut self, margins: Margins);
    /// Margins of the current (last) section.
    fn set_margins(&mut self, margins: Margins);
    /// Header or footer table of the current section.
    fn set_section_part(&mut self, part: SectionPart, table: Table);
}

/// Applies every block of `fragment` to `backend`, in order.
pub fn commit_fragment(backend: &mut dyn OutputBackend, fragment: Fragment) {
    for block in fragment.blocks {
        match block {
            Block::Paragraph(paragraph) => backend.add_paragraph(paragraph),
            Block::Heading { level, text, align } => backend.add_heading(level, text, align),
            Block::Table(table) => backend.add_table(table),
            Block::Picture { picture, align } => backend.add_picture(picture, align),
            Block::SectionBreak { margins } => {
                backend.add_section();
                backend.set_margins(margins);
            }
            Block::PageBreak { margins } => {
                backend.add_page_break(margins);
                backend.set_margins(margins);
            }
            Block::SectionPart { part, table } => backend.set_section_part(part, table),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub margins: Margins,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<Table>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<Table>,
    pub blocks: Vec<Block>,
}

impl Section {
    fn new(margins: Margins) -> Self {
        Self {
            margins,
            header: None,
            footer: None,
            blocks: Vec::new(),
        }
    }
}

/// In-memory reference backend. Sealed once, as JSON, at the end of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentModel {
    pub page_size: Size,
    pub orientation: Orientation,
    pub default_font: FontSpec,
    pub sections: Vec<Section>,
}

impl DocumentModel {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            page_size: config.page_layout.dimensions(),
            orientation: config.page_layout.orientation,
            default_font: config.font.clone(),
            sections: vec![Section::new(config.margins)],
        }
    }

    /// Every body block across sections, in document order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.sections.iter().flat_map(|section| section.blocks.iter())
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.blocks().filter_map(|block| match block {
            Block::Paragraph(paragraph) => Some(paragraph),
            _ => None,
        })
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks().filter_map(|block| match block {
            Block::Table(table) => Some(table),
            _ => None,
        })
    }

    fn current(&mut self) -> &mut Section {
        if self.sections.is_empty() {
            self.sections.push(Section::new(Margins::all(1.0)));
        }
        let last = self.sections.len() - 1;
        &mut self.sections[last]
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, DocweaveError> {
        serde_json::to_vec_pretty(self).map_err(|err| DocweaveError::Seal(err.to_string()))
    }

    /// SHA-256 of the sealed bytes, hex encoded.
    pub fn fingerprint(&self) -> Result<String, DocweaveError> {
        Ok(hex_sha256(&self.to_json_bytes()?))
    }

    pub fn seal_to_writer<W: Write>(&self, writer: &mut W) -> Result<usize, DocweaveError> {
        let bytes = self.to_json_bytes()?;
        writer
            .write_all(&bytes)
            .and_then(|_| writer.flush())
            .map_err(|err| DocweaveError::Seal(err.to_string()))?;
        Ok(bytes.len())
    }

    pub fn seal_to_file(&self, path: impl AsRef<Path>) -> Result<usize, DocweaveError> {
        let path = path.as_ref();
        let mut file = std::fs::File::create(path)
            .map_err(|err| DocweaveError::Seal(format!("{}: {err}", path.display())))?;
        self.seal_to_writer(&mut file)
    }
}

impl OutputBackend for DocumentModel {
    fn add_paragraph(&mut self, paragraph: Paragraph) {
        self.current().blocks.push(Block::Paragraph(paragraph));
    }

    fn add_heading(&mut self, level: u8, text: String, align: Alignment) {
        self.current()
            .blocks
            .push(Block::Heading { level, text, align });
    }

    fn add_table(&mut self, table: Table) {
        self.current().blocks.push(Block::Table(table));
    }

    fn add_picture(&mut self, picture: Picture, align: Alignment) {
        self.current()
            .blocks
            .push(Block::Picture { picture, align });
    }

    fn add_section(&mut self) {
        let margins = self.current().margins;
        self.sections.push(Section::new(margins));
    }

    fn add_page_break(&mut self, margins: Margins) {
        self.current().blocks.push(Block::PageBreak { margins });
    }

    fn set_margins(&mut self, margins: Margins) {
        self.current().margins = margins;
    }

    fn set_section_part(&mut self, part: SectionPart, table: Table) {
        let section = self.current();
        match part {
            SectionPart::Header => section.header = Some(table),
            SectionPart::Footer => section.footer = Some(table),
        }
    }
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{Run, TableCell, TableRow};

    #[test]
    fn commit_applies_blocks_in_order() {
        let config = RenderConfig::default();
        let mut doc = DocumentModel::new(&config);
        let fragment = Fragment::from_blocks(vec![
            Block::Heading {
                level: 1,
                text: "Intro".to_string(),
                align: Alignment::Left,
            },
            Block::Paragraph(Paragraph::new(vec![Run::plain("body")], Alignment::Left)),
            Block::SectionBreak {
                margins: Margins::all(0.5),
            },
            Block::Paragraph(Paragraph::new(vec![Run::plain("next")], Alignment::Left)),
        ]);
        commit_fragment(&mut doc, fragment);

        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[0].blocks.len(), 2);
        assert_eq!(doc.sections[1].margins, Margins::all(0.5));
        let texts: Vec<String> = doc.paragraphs().map(Paragraph::text).collect();
        assert_eq!(texts, vec!["body", "next"]);
    }

    #[test]
    fn page_break_carries_the_new_page_margins() {
        let mut doc = DocumentModel::new(&RenderConfig::default());
        assert_eq!(doc.sections[0].margins, Margins::all(1.0));
        commit_fragment(
            &mut doc,
            Fragment::single(Block::PageBreak {
                margins: Margins::all(0.25),
            }),
        );
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(
            doc.sections[0].blocks,
            vec![Block::PageBreak {
                margins: Margins::all(0.25)
            }]
        );
        assert_eq!(doc.sections[0].margins, Margins::all(0.25));
    }

    #[test]
    fn header_and_footer_attach_to_current_section() {
        let mut doc = DocumentModel::new(&RenderConfig::default());
        let mut table = Table::new("Table Grid", 1);
        table.push_row(TableRow::new(vec![TableCell::text("Page footer")]));
        doc.set_section_part(SectionPart::Footer, table.clone());
        assert_eq!(doc.sections[0].footer, Some(table));
        assert!(doc.sections[0].header.is_none());
    }

    #[test]
    fn sealing_writes_json_and_fingerprint_is_stable() {
        let mut doc = DocumentModel::new(&RenderConfig::default());
        doc.add_paragraph(Paragraph::new(vec![Run::plain("x")], Alignment::Center));
        let mut buffer = Vec::new();
        let written = doc.seal_to_writer(&mut buffer).expect("seal");
        assert_eq!(written, buffer.len());
        let json: serde_json::Value = serde_json::from_slice(&buffer).expect("json");
        assert_eq!(json["sections"][0]["blocks"][0]["type"], "paragraph");
        assert_eq!(
            doc.fingerprint().expect("fp"),
            doc.fingerprint().expect("fp")
        );
    }
}
