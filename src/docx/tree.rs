//! Span tree over `word/document.xml`.
//!
//! ## Why spans instead of a DOM?
//!
//! The tree never owns the XML. Every paragraph, run, and table records the
//! byte range of its raw markup in the source string, plus just enough
//! decoded content (run text, image relationship ids) for the pipeline to
//! reason about. Mutation happens elsewhere, as byte-range splices against
//! the original string, so any markup this parser does not model — section
//! properties, bookmarks, tracked-change wrappers, smart tags — survives
//! untouched simply because nobody ever re-serialises it.
//!
//! The parser leans on one quick-xml property: with `trim_text(false)`,
//! consecutive events tile the input, so the reader's `buffer_position`
//! sampled before and after an event brackets exactly that event's bytes.
//!
//! Runs are opaque below their direct children. A `w:drawing` can carry a
//! whole text box with nested paragraphs; those belong to the run's raw
//! bytes, not to the document flow, and are skipped by depth tracking.

use crate::error::DocxProofError;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use std::ops::Range;

/// Byte range of a piece of markup within the document XML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn range(self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(self) -> bool {
        self.start == self.end
    }
}

/// What a run contributes to the document flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunContent {
    /// Decoded visible text: `w:t` content plus `w:tab` → `\t` and
    /// `w:br`/`w:cr` → `\n`.
    Text(String),
    /// An embedded picture (`w:drawing` with `a:blip`, or legacy `w:pict`
    /// with `v:imagedata`). `rel_id` is the `r:embed`/`r:id` attribute
    /// pointing into the relationship table, when present.
    Image { rel_id: Option<String> },
}

/// One `w:r` element.
#[derive(Debug, Clone)]
pub struct Run {
    pub span: Span,
    /// Raw `<w:rPr>…</w:rPr>` block, when the run carries properties.
    pub rpr: Option<Span>,
    pub content: RunContent,
}

impl Run {
    pub fn is_image(&self) -> bool {
        matches!(self.content, RunContent::Image { .. })
    }
}

/// One `w:p` element.
#[derive(Debug, Clone)]
pub struct Paragraph {
    pub span: Span,
    pub runs: Vec<Run>,
}

impl Paragraph {
    /// Concatenated text of the paragraph's text runs.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for run in &self.runs {
            if let RunContent::Text(t) = &run.content {
                out.push_str(t);
            }
        }
        out
    }

    /// Runs carrying an embedded picture, in document order.
    pub fn image_runs(&self) -> impl Iterator<Item = &Run> {
        self.runs.iter().filter(|r| r.is_image())
    }

    pub fn has_image(&self) -> bool {
        self.image_runs().next().is_some()
    }
}

/// One `w:tc` element. Cells hold full blocks: paragraphs and nested tables.
#[derive(Debug, Clone)]
pub struct Cell {
    pub span: Span,
    pub blocks: Vec<Block>,
}

/// One `w:tr` element.
#[derive(Debug, Clone)]
pub struct Row {
    pub span: Span,
    pub cells: Vec<Cell>,
}

/// One `w:tbl` element.
#[derive(Debug, Clone)]
pub struct Table {
    pub span: Span,
    pub rows: Vec<Row>,
}

/// Body-level content: WordprocessingML interleaves paragraphs and tables.
#[derive(Debug, Clone)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

/// The parsed document body.
#[derive(Debug, Clone, Default)]
pub struct DocumentTree {
    pub body: Vec<Block>,
}

impl DocumentTree {
    /// Parse the document XML into a span tree.
    pub fn parse(xml: &str) -> Result<Self, DocxProofError> {
        let mut reader = Reader::from_str(xml);
        // Spans rely on events tiling the input byte-for-byte.
        reader.config_mut().trim_text(false);
        let mut buf = Vec::new();
        let mut parser = Parser::default();

        loop {
            let start = reader.buffer_position() as usize;
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => parser.handle_start(&e, start),
                Ok(Event::Empty(e)) => {
                    let end = reader.buffer_position() as usize;
                    parser.handle_empty(&e, start, end);
                }
                Ok(Event::End(e)) => {
                    let end = reader.buffer_position() as usize;
                    parser.handle_end(e.name().as_ref(), end);
                }
                Ok(Event::Text(e)) => parser.handle_text(&e)?,
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(DocxProofError::MalformedXml {
                        detail: format!("at byte {}: {e}", reader.buffer_position()),
                    });
                }
            }
            buf.clear();
        }

        Ok(DocumentTree { body: parser.body })
    }

    /// Number of tables at any nesting depth.
    pub fn table_count(&self) -> usize {
        fn count(blocks: &[Block]) -> usize {
            blocks
                .iter()
                .map(|block| match block {
                    Block::Paragraph(_) => 0,
                    Block::Table(t) => {
                        1 + t
                            .rows
                            .iter()
                            .flat_map(|r| &r.cells)
                            .map(|c| count(&c.blocks))
                            .sum::<usize>()
                    }
                })
                .sum()
        }
        count(&self.body)
    }
}

// ── Parser state ─────────────────────────────────────────────────────────────

struct RunBuilder {
    start: usize,
    /// Nesting depth below the run element itself.
    depth: usize,
    rpr_start: Option<usize>,
    rpr: Option<Span>,
    text: String,
    capture_text: bool,
    has_image: bool,
    image_rel: Option<String>,
}

impl RunBuilder {
    fn new(start: usize) -> Self {
        Self {
            start,
            depth: 0,
            rpr_start: None,
            rpr: None,
            text: String::new(),
            capture_text: false,
            has_image: false,
            image_rel: None,
        }
    }

    fn record_image(&mut self, e: &BytesStart<'_>) {
        self.has_image = true;
        if self.image_rel.is_none() {
            for attr in e.attributes().flatten() {
                if matches!(attr.key.as_ref(), b"r:embed" | b"r:id" | b"r:link") {
                    self.image_rel = Some(String::from_utf8_lossy(&attr.value).into_owned());
                    break;
                }
            }
        }
    }

    fn finish(self, end: usize) -> Run {
        let content = if self.has_image {
            RunContent::Image {
                rel_id: self.image_rel,
            }
        } else {
            RunContent::Text(self.text)
        };
        Run {
            span: Span {
                start: self.start,
                end,
            },
            rpr: self.rpr,
            content,
        }
    }
}

struct ParagraphBuilder {
    start: usize,
    runs: Vec<Run>,
}

struct TableBuilder {
    start: usize,
    rows: Vec<Row>,
}

struct RowBuilder {
    start: usize,
    cells: Vec<Cell>,
}

struct CellBuilder {
    start: usize,
    blocks: Vec<Block>,
}

#[derive(Default)]
struct Parser {
    body: Vec<Block>,
    paragraph: Option<ParagraphBuilder>,
    run: Option<RunBuilder>,
    tables: Vec<TableBuilder>,
    rows: Vec<RowBuilder>,
    cells: Vec<CellBuilder>,
}

impl Parser {
    /// Finished blocks attach to the innermost open cell, or to the body.
    fn push_block(&mut self, block: Block) {
        match self.cells.last_mut() {
            Some(cell) => cell.blocks.push(block),
            None => self.body.push(block),
        }
    }

    fn handle_start(&mut self, e: &BytesStart<'_>, start: usize) {
        if let Some(run) = &mut self.run {
            if run.depth == 0 {
                match e.name().as_ref() {
                    b"w:rPr" => run.rpr_start = Some(start),
                    b"w:t" => run.capture_text = true,
                    _ => {}
                }
            }
            if matches!(e.name().as_ref(), b"a:blip" | b"v:imagedata") {
                run.record_image(e);
            }
            run.depth += 1;
            return;
        }

        match e.name().as_ref() {
            b"w:p" => {
                self.paragraph = Some(ParagraphBuilder {
                    start,
                    runs: Vec::new(),
                });
            }
            b"w:r" => {
                if self.paragraph.is_some() {
                    self.run = Some(RunBuilder::new(start));
                }
            }
            b"w:tbl" => self.tables.push(TableBuilder {
                start,
                rows: Vec::new(),
            }),
            b"w:tr" => {
                if !self.tables.is_empty() {
                    self.rows.push(RowBuilder {
                        start,
                        cells: Vec::new(),
                    });
                }
            }
            b"w:tc" => {
                if !self.rows.is_empty() {
                    self.cells.push(CellBuilder {
                        start,
                        blocks: Vec::new(),
                    });
                }
            }
            _ => {}
        }
    }

    fn handle_empty(&mut self, e: &BytesStart<'_>, start: usize, end: usize) {
        if let Some(run) = &mut self.run {
            if run.depth == 0 {
                match e.name().as_ref() {
                    b"w:tab" => run.text.push('\t'),
                    b"w:br" | b"w:cr" => run.text.push('\n'),
                    b"w:rPr" => run.rpr = Some(Span { start, end }),
                    _ => {}
                }
            }
            if matches!(e.name().as_ref(), b"a:blip" | b"v:imagedata") {
                run.record_image(e);
            }
            return;
        }

        match e.name().as_ref() {
            b"w:p" => self.push_block(Block::Paragraph(Paragraph {
                span: Span { start, end },
                runs: Vec::new(),
            })),
            b"w:r" => {
                if let Some(paragraph) = &mut self.paragraph {
                    paragraph.runs.push(Run {
                        span: Span { start, end },
                        rpr: None,
                        content: RunContent::Text(String::new()),
                    });
                }
            }
            _ => {}
        }
    }

    fn handle_text(&mut self, e: &BytesText<'_>) -> Result<(), DocxProofError> {
        if let Some(run) = &mut self.run {
            if run.capture_text {
                let text = e.unescape().map_err(|err| DocxProofError::MalformedXml {
                    detail: err.to_string(),
                })?;
                run.text.push_str(&text);
            }
        }
        Ok(())
    }

    fn handle_end(&mut self, name: &[u8], end: usize) {
        if let Some(run) = &mut self.run {
            if run.depth > 0 {
                run.depth -= 1;
                if run.depth == 0 {
                    match name {
                        b"w:rPr" => {
                            if let Some(start) = run.rpr_start.take() {
                                run.rpr = Some(Span { start, end });
                            }
                        }
                        b"w:t" => run.capture_text = false,
                        _ => {}
                    }
                }
                return;
            }
        }
        if self.run.is_some() {
            // Depth zero: this end closes the run itself.
            if let Some(run) = self.run.take() {
                let finished = run.finish(end);
                if let Some(paragraph) = &mut self.paragraph {
                    paragraph.runs.push(finished);
                }
            }
            return;
        }

        match name {
            b"w:p" => {
                if let Some(p) = self.paragraph.take() {
                    self.push_block(Block::Paragraph(Paragraph {
                        span: Span {
                            start: p.start,
                            end,
                        },
                        runs: p.runs,
                    }));
                }
            }
            b"w:tc" => {
                if let Some(c) = self.cells.pop() {
                    if let Some(row) = self.rows.last_mut() {
                        row.cells.push(Cell {
                            span: Span {
                                start: c.start,
                                end,
                            },
                            blocks: c.blocks,
                        });
                    }
                }
            }
            b"w:tr" => {
                if let Some(r) = self.rows.pop() {
                    if let Some(table) = self.tables.last_mut() {
                        table.rows.push(Row {
                            span: Span {
                                start: r.start,
                                end,
                            },
                            cells: r.cells,
                        });
                    }
                }
            }
            b"w:tbl" => {
                if let Some(t) = self.tables.pop() {
                    self.push_block(Block::Table(Table {
                        span: Span {
                            start: t.start,
                            end,
                        },
                        rows: t.rows,
                    }));
                }
            }
            _ => {}
        }
    }
}
