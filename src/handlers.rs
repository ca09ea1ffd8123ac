use crate::assets::{self, AssetError, ImageAsset};
use crate::bulk;
use crate::config::RenderConfig;
use crate::context::Context;
use crate::datasource::DataSource;
use crate::error::NodeError;
use crate::fragment::{
    Block, Fragment, Paragraph, ParagraphKind, Picture, Run, SectionPart, Table, TableCell,
    TableRow,
};
use crate::geometry::{SizeRequest, parse_inches, resolve_size};
use crate::inline::{resolve_runs, resolve_runs_skipping};
use crate::markup::{Element, MarkupNode};
use crate::types::{Alignment, Size};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

const LIST_TAGS: [&str; 2] = ["ul", "ol"];
const INLINE_TAGS: [&str; 4] = ["b", "i", "u", "li"];

/// Render logic bound to a tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Title,
    Heading(u8),
    SectionPart(SectionPart),
    Image,
    Base64Image,
    DataFrame,
    BlankTable,
    SessionBreak,
    PageBreak,
    Paragraph,
    List(ParagraphKind),
}

/// Read-only inputs every handler may consult. Handlers never touch the output.
pub struct RenderEnv<'a> {
    pub config: &'a RenderConfig,
    pub context: &'a Context,
    pub data_source: &'a dyn DataSource,
    /// Oriented page size in inches.
    pub page: Size,
}

impl<'a> RenderEnv<'a> {
    pub fn new(
        config: &'a RenderConfig,
        context: &'a Context,
        data_source: &'a dyn DataSource,
    ) -> Self {
        Self {
            config,
            context,
            data_source,
            page: config.page_layout.dimensions(),
        }
    }

    fn marker(&self, error: NodeError, text: impl Into<String>) -> Fragment {
        Fragment::error_marker(error, text, &self.config.error_font)
    }
}

/// Tag name → handler, built once per session.
#[derive(Debug, Clone)]
pub struct HandlerRegistry {
    handlers: BTreeMap<String, Handler>,
}

impl HandlerRegistry {
    pub fn from_config(config: &RenderConfig) -> Self {
        let mut handlers = BTreeMap::new();
        handlers.insert("title".to_string(), Handler::Title);
        for level in 1..=config.heading_levels {
            handlers.insert(format!("h{level}"), Handler::Heading(level));
        }
        handlers.insert(
            "header".to_string(),
            Handler::SectionPart(SectionPart::Header),
        );
        handlers.insert(
            "footer".to_string(),
            Handler::SectionPart(SectionPart::Footer),
        );
        handlers.insert("image".to_string(), Handler::Image);
        handlers.insert("base64-image".to_string(), Handler::Base64Image);
        handlers.insert("dataframe".to_string(), Handler::DataFrame);
        handlers.insert("blank_table".to_string(), Handler::BlankTable);
        handlers.insert("session_break".to_string(), Handler::SessionBreak);
        handlers.insert("page_break".to_string(), Handler::PageBreak);
        handlers.insert("p".to_string(), Handler::Paragraph);
        handlers.insert("ul".to_string(), Handler::List(ParagraphKind::Bullet));
        handlers.insert("ol".to_string(), Handler::List(ParagraphKind::Numbered));
        Self { handlers }
    }

    pub fn lookup(&self, tag: &str) -> Option<Handler> {
        self.handlers.get(tag).copied()
    }

    /// Every tag name the template language understands, including inline tags.
    pub fn vocabulary(&self) -> BTreeSet<String> {
        self.handlers
            .keys()
            .cloned()
            .chain(INLINE_TAGS.iter().map(|tag| tag.to_string()))
            .collect()
    }

    /// Renders one top-level node into a fragment. Unregistered tags and text
    /// leaves take the generic paragraph path.
    pub fn render(&self, node: &MarkupNode, env: &RenderEnv<'_>) -> Result<Fragment, NodeError> {
        let MarkupNode::Element(el) = node else {
            return Ok(render_text_leaf(node));
        };
        match self.lookup(&el.tag) {
            Some(handler) => handler.render(el, env),
            None => Ok(render_fallback(node)),
        }
    }
}

impl Handler {
    pub fn render(self, el: &Element, env: &RenderEnv<'_>) -> Result<Fragment, NodeError> {
        match self {
            Handler::Title => Ok(render_title(el, env)),
            Handler::Heading(level) => Ok(render_heading(el, level)),
            Handler::SectionPart(part) => Ok(render_section_part(el, part, env)),
            Handler::Image => Ok(render_image(el, env)),
            Handler::Base64Image => Ok(render_base64_image(el, env)),
            Handler::DataFrame => Ok(render_dataframe(el, env)),
            Handler::BlankTable => Ok(render_blank_table(el, env)),
            Handler::SessionBreak => Ok(Fragment::single(Block::SectionBreak {
                margins: env.config.margins,
            })),
            Handler::PageBreak => Ok(Fragment::single(Block::PageBreak {
                margins: env.config.margins,
            })),
            Handler::Paragraph => Ok(render_paragraph(el)),
            Handler::List(kind) => Ok(render_list(el, kind)),
        }
    }
}

fn render_text_leaf(node: &MarkupNode) -> Fragment {
    let text = node.text_content();
    let text = text.trim();
    if text.is_empty() {
        return Fragment::empty();
    }
    Fragment::single(Block::Paragraph(Paragraph::new(
        vec![Run::plain(text)],
        Alignment::Left,
    )))
}

fn render_fallback(node: &MarkupNode) -> Fragment {
    let runs = resolve_runs(std::slice::from_ref(node));
    if runs.is_empty() {
        return Fragment::empty();
    }
    Fragment::single(Block::Paragraph(Paragraph::new(runs, Alignment::Left)))
}

fn render_title(el: &Element, env: &RenderEnv<'_>) -> Fragment {
    let text = el.display_text().trim().to_uppercase();
    let run = Run::bold(text).with_size(env.config.title_font_size);
    Fragment::single(Block::Paragraph(Paragraph::new(
        vec![run],
        Alignment::Center,
    )))
}

fn render_heading(el: &Element, level: u8) -> Fragment {
    Fragment::single(Block::Heading {
        level: level.max(1),
        text: el.display_text().trim().to_string(),
        align: Alignment::Left,
    })
}

fn paragraph_align(el: &Element) -> Alignment {
    el.attr("align")
        .and_then(Alignment::from_str)
        .unwrap_or_default()
}

fn render_paragraph(el: &Element) -> Fragment {
    let runs = resolve_runs(&el.children);
    Fragment::single(Block::Paragraph(Paragraph::new(runs, paragraph_align(el))))
}

fn render_list(el: &Element, kind: ParagraphKind) -> Fragment {
    let mut blocks = Vec::new();
    push_list_items(el, kind, 0, &mut blocks);
    Fragment::from_blocks(blocks)
}

fn push_list_items(list: &Element, kind: ParagraphKind, level: u8, blocks: &mut Vec<Block>) {
    for item in list.children.iter().filter_map(MarkupNode::as_element) {
        if item.tag != "li" {
            continue;
        }
        let runs = resolve_runs_skipping(&item.children, &LIST_TAGS);
        blocks.push(Block::Paragraph(Paragraph::list_item(runs, kind, level)));
        for nested in item.children.iter().filter_map(MarkupNode::as_element) {
            let nested_kind = match nested.tag.as_str() {
                "ul" => ParagraphKind::Bullet,
                "ol" => ParagraphKind::Numbered,
                _ => continue,
            };
            push_list_items(nested, nested_kind, level.saturating_add(1), blocks);
        }
    }
}

fn size_request(el: &Element) -> SizeRequest {
    SizeRequest {
        width: parse_inches(el.attr("width")),
        height: parse_inches(el.attr("height")),
        target_height: None,
    }
}

fn picture_for(asset: ImageAsset, request: &SizeRequest, page: Size) -> Picture {
    let size = resolve_size(asset.pixel_width, asset.pixel_height, request, page);
    Picture {
        source: asset.source,
        width: size.width,
        height: size.height,
    }
}

fn image_error_fragment(err: &AssetError, env: &RenderEnv<'_>) -> Fragment {
    env.marker(NodeError::Image(err.to_string()), err.marker_text())
}

fn render_image(el: &Element, env: &RenderEnv<'_>) -> Fragment {
    let Some(src) = el.attr("src").map(str::trim).filter(|src| !src.is_empty()) else {
        return env.marker(
            NodeError::Image("image tag without src".to_string()),
            "[Missing image source]",
        );
    };
    let align = el
        .attr("align")
        .and_then(Alignment::from_str)
        .unwrap_or(Alignment::Center);
    match assets::load_image_file(src) {
        Ok(asset) => Fragment::single(Block::Picture {
            picture: picture_for(asset, &size_request(el), env.page),
            align,
        }),
        Err(err) => image_error_fragment(&err, env),
    }
}

fn render_base64_image(el: &Element, env: &RenderEnv<'_>) -> Fragment {
    match assets::decode_data_uri(&el.text_content()) {
        Ok(asset) => {
            let aspect = if asset.pixel_height == 0 {
                1.0
            } else {
                asset.pixel_width as f32 / asset.pixel_height as f32
            };
            let width = env.config.base64_image_width;
            Fragment::single(Block::Picture {
                picture: Picture {
                    source: asset.source,
                    width,
                    height: width / aspect,
                },
                align: Alignment::Left,
            })
        }
        Err(err) => image_error_fragment(&err, env),
    }
}

fn render_section_part(el: &Element, part: SectionPart, env: &RenderEnv<'_>) -> Fragment {
    let columns = match part {
        SectionPart::Header => 3,
        SectionPart::Footer => 1,
    };
    let mut table = Table::new(env.config.table_style.clone(), columns);
    table.width = Some(env.page.width);
    table.column_widths = vec![env.page.width / columns as f32; columns];

    let mut cells: Vec<TableCell> = (0..columns).map(|_| TableCell::default()).collect();
    let text = el.display_text().trim().to_string();
    if !text.is_empty() {
        cells[0].runs.push(Run::plain(text));
    }

    let mut error = None;
    if let Some(src) = el.find("image").and_then(|image| image.attr("src")) {
        let last = columns - 1;
        cells[last].align = Alignment::Right;
        let request = SizeRequest::with_target_height(env.config.header_logo_height);
        match assets::load_image_file(src) {
            Ok(asset) => cells[last].picture = Some(picture_for(asset, &request, env.page)),
            Err(err) => {
                cells[last]
                    .runs
                    .push(Run::error(err.marker_text(), &env.config.error_font));
                error = Some(NodeError::Image(err.to_string()));
            }
        }
    }

    table.push_row(TableRow::new(cells));
    Fragment {
        blocks: vec![Block::SectionPart { part, table }],
        error,
    }
}

fn render_dataframe(el: &Element, env: &RenderEnv<'_>) -> Fragment {
    let loaded = if let Some(src) = el.attr("src") {
        env.data_source.load_csv(Path::new(src.trim()))
    } else if let Some(url) = el.attr("api") {
        let url = url.trim();
        env.data_source
            .load_api(url, &env.context.api_params(url), &env.context.api_headers())
    } else {
        Err(NodeError::DataSource(
            "dataframe needs a src or api attribute".to_string(),
        ))
    };

    let mut data = match loaded {
        Ok(data) => data,
        Err(err) => {
            let text = format!("[Data source error: {}]", error_detail(&err));
            return env.marker(err, text);
        }
    };
    if let Some(max_rows) = el.attr("max_rows").and_then(|raw| raw.trim().parse::<usize>().ok()) {
        data.truncate(max_rows);
    }
    if data.is_empty() {
        let label = el.display_text();
        let label = label.trim();
        let text = if label.is_empty() {
            "No data available.".to_string()
        } else {
            format!("{label} No data available.")
        };
        return env.marker(NodeError::DataSource("no data".to_string()), text);
    }

    let style = el
        .attr("style")
        .map(str::trim)
        .filter(|style| !style.is_empty())
        .unwrap_or(env.config.table_style.as_str());
    Fragment::single(Block::Table(bulk::render_data_table(
        &data,
        style,
        env.config.chunk_size,
    )))
}

fn error_detail(err: &NodeError) -> &str {
    match err {
        NodeError::DataSource(detail) | NodeError::Image(detail) | NodeError::Handler(detail) => {
            detail
        }
    }
}

fn render_blank_table(el: &Element, env: &RenderEnv<'_>) -> Fragment {
    let rows = positive_count(el.attr("rows"));
    let names: Vec<String> = el
        .attr("columns_name")
        .map(|raw| {
            raw.split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default();
    let columns = positive_count(el.attr("columns")).max(names.len());

    let mut table = Table::new(env.config.table_style.clone(), columns);
    let header = (0..columns)
        .map(|idx| match names.get(idx) {
            Some(name) => TableCell::header(name.as_str()),
            None => TableCell::header(format!("Column {}", idx + 1)),
        })
        .collect();
    table.push_row(TableRow::new(header));
    for _ in 0..rows {
        table.push_row(TableRow::new(
            (0..columns).map(|_| TableCell::text("")).collect(),
        ));
    }
    Fragment::single(Block::Table(table))
}

/// Non-numeric or zero counts are treated as 1.
fn positive_count(raw: Option<&str>) -> usize {
    raw.and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|count| *count > 0)
        .unwrap_or(1)
}
