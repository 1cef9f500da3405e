// Word document assembly.
//
// Reports are first collected as a flat list of `Block`s so their content
// can be inspected without unpacking a .docx, then written with docx-rs.
use crate::charts::Png;
use crate::error::{ReportError, Result};
use docx_rs::{Docx, Paragraph, Pic, Run, Style, StyleType, Table, TableCell, TableRow};
use std::io::Cursor;

pub const RED: &str = "FF0000";
pub const GREEN: &str = "008000";

const EMU_PER_INCH: f64 = 914_400.0;

#[derive(Debug, Clone)]
pub enum Block {
    Title(String),
    Heading(String),
    Paragraph(String),
    Table(TableBlock),
    Image { png: Png, width_in: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableBlock {
    pub headers: Vec<String>,
    pub rows: Vec<RowBlock>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowBlock {
    pub cells: Vec<String>,
    /// Font color for every cell of the row, as `RRGGBB`.
    pub color: Option<&'static str>,
}

impl TableBlock {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        TableBlock {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, cells: Vec<String>, color: Option<&'static str>) {
        self.rows.push(RowBlock { cells, color });
    }

    pub fn columns(&self) -> usize {
        self.headers.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportDocument {
    pub blocks: Vec<Block>,
}

impl ReportDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&mut self, text: impl Into<String>) {
        self.blocks.push(Block::Title(text.into()));
    }

    pub fn heading(&mut self, text: impl Into<String>) {
        self.blocks.push(Block::Heading(text.into()));
    }

    pub fn paragraph(&mut self, text: impl Into<String>) {
        self.blocks.push(Block::Paragraph(text.into()));
    }

    pub fn table(&mut self, table: TableBlock) {
        self.blocks.push(Block::Table(table));
    }

    pub fn image(&mut self, png: Png, width_in: f64) {
        self.blocks.push(Block::Image { png, width_in });
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Paragraph(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn headings(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Heading(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableBlock> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Table(t) => Some(t),
            _ => None,
        })
    }

    pub fn image_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b, Block::Image { .. }))
            .count()
    }

    pub fn to_docx(&self) -> Result<Vec<u8>> {
        let mut docx = Docx::new()
            .add_style(
                Style::new("Title", StyleType::Paragraph)
                    .name("Title")
                    .size(40)
                    .bold(),
            )
            .add_style(
                Style::new("Heading1", StyleType::Paragraph)
                    .name("Heading 1")
                    .size(28)
                    .bold(),
            );

        for block in &self.blocks {
            docx = match block {
                Block::Title(text) => {
                    docx.add_paragraph(Paragraph::new().style("Title").add_run(Run::new().add_text(text)))
                }
                Block::Heading(text) => docx
                    .add_paragraph(Paragraph::new().style("Heading1").add_run(Run::new().add_text(text))),
                Block::Paragraph(text) => docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(text))),
                Block::Table(table) => docx.add_table(docx_table(table)),
                Block::Image { png, width_in } => {
                    let (w, h) = image_emu(png, *width_in);
                    let pic = Pic::new(&png.bytes).size(w, h);
                    docx.add_paragraph(Paragraph::new().add_run(Run::new().add_image(pic)))
                }
            };
        }

        let mut out = Cursor::new(Vec::new());
        docx.build().pack(&mut out).map_err(ReportError::render)?;
        Ok(out.into_inner())
    }
}

/// Width and height in EMU for a picture `width_in` inches wide, keeping the
/// image's aspect ratio.
fn image_emu(png: &Png, width_in: f64) -> (u32, u32) {
    let w = width_in * EMU_PER_INCH;
    let h = if png.width == 0 {
        0.0
    } else {
        w * png.height as f64 / png.width as f64
    };
    (w.round() as u32, h.round() as u32)
}

fn docx_table(table: &TableBlock) -> Table {
    let mut rows = Vec::with_capacity(table.rows.len() + 1);
    rows.push(TableRow::new(
        table.headers.iter().map(|h| text_cell(h, None, true)).collect(),
    ));
    for row in &table.rows {
        rows.push(TableRow::new(
            row.cells.iter().map(|c| text_cell(c, row.color, false)).collect(),
        ));
    }
    Table::new(rows)
}

/// A cell with one run of text. Empty text gets no run at all, so there is
/// nothing to color.
fn text_cell(text: &str, color: Option<&str>, bold: bool) -> TableCell {
    let mut paragraph = Paragraph::new();
    if !text.is_empty() {
        let mut run = Run::new().add_text(text);
        if let Some(color) = color {
            run = run.color(color);
        }
        if bold {
            run = run.bold();
        }
        paragraph = paragraph.add_run(run);
    }
    TableCell::new().add_paragraph(paragraph)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Png {
        let img = image::RgbImage::from_pixel(4, 2, image::Rgb([10, 20, 30]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        Png {
            bytes: out.into_inner(),
            width: 4,
            height: 2,
        }
    }

    #[test]
    fn image_keeps_aspect_ratio() {
        assert_eq!(image_emu(&tiny_png(), 6.0), (5_486_400, 2_743_200));
    }

    #[test]
    fn document_packs_to_docx_zip() {
        let mut doc = ReportDocument::new();
        doc.title("Report");
        doc.heading("I. Table");
        let mut table = TableBlock::new(["A", "B"]);
        table.push(vec!["x".into(), "".into()], Some(RED));
        table.push(vec!["".into(), "y".into()], None);
        doc.table(table);
        doc.image(tiny_png(), 6.0);
        doc.paragraph("done");

        let bytes = doc.to_docx().unwrap();
        assert_eq!(&bytes[..2], b"PK");
        assert_eq!(doc.image_count(), 1);
        assert_eq!(doc.paragraphs().collect::<Vec<_>>(), ["done"]);
        assert_eq!(doc.headings().collect::<Vec<_>>(), ["I. Table"]);
        assert_eq!(doc.tables().next().unwrap().columns(), 2);
    }

    #[test]
    fn empty_colored_cells_are_safe() {
        let mut table = TableBlock::new(["A"]);
        table.push(vec![String::new()], Some(GREEN));
        let mut doc = ReportDocument::new();
        doc.table(table);
        assert!(doc.to_docx().is_ok());
    }
}
