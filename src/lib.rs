mod assets;
mod backend;
mod bind;
mod bulk;
mod config;
mod context;
mod datasource;
mod dispatch;
mod error;
mod fragment;
mod geometry;
mod handlers;
mod inline;
mod markup;
mod normalize;
mod perf;
mod types;
mod validate;

pub use assets::{AssetError, ImageAsset, decode_data_uri, load_image_file};
pub use backend::{DocumentModel, OutputBackend, Section, commit_fragment};
pub use bind::{bind, placeholder_names};
pub use bulk::{render_chunked, render_data_table};
pub use config::{
    DEFAULT_API_TIMEOUT, DEFAULT_CHUNK_SIZE, DEFAULT_TABLE_STYLE, ENV_CHUNK_SIZE, ENV_MAX_WORKERS,
    ENV_PERF_LOG, RenderConfig,
};
pub use context::{API_HEADERS_KEY, APIS_KEY, Context, render_value};
pub use datasource::{DataSource, DataTable, DefaultDataSource};
pub use dispatch::{NodeOutcome, OrderedCommit, dispatch_ordered};
pub use error::{DocweaveError, NodeError, ParseError};
pub use fragment::{
    Block, Fragment, Paragraph, ParagraphKind, Picture, PictureSource, Run, SectionPart, Table,
    TableCell, TableRow,
};
pub use geometry::{SizeRequest, parse_inches, resolve_size};
pub use handlers::{Handler, HandlerRegistry, RenderEnv};
pub use inline::{InlineStyle, resolve_runs};
pub use markup::{Element, MarkupNode, MarkupTree, parse};
pub use normalize::normalize;
pub use perf::PerfLogger;
pub use types::{
    Alignment, Color, FontSpec, FontStyle, Margins, Orientation, PageLayout, PageSize, Size,
};
pub use validate::{ValidationIssue, ValidationReport, validate_template};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Template renderer. Holds the session configuration, the handler registry
/// and the worker pool; every render call is an independent session.
pub struct Renderer {
    config: RenderConfig,
    registry: HandlerRegistry,
    pool: rayon::ThreadPool,
    data_source: Arc<dyn DataSource>,
    perf: Option<PerfLogger>,
}

#[derive(Clone)]
pub struct RendererBuilder {
    config: RenderConfig,
    data_source: Option<Arc<dyn DataSource>>,
}

impl Default for RendererBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RendererBuilder {
    pub fn new() -> Self {
        Self {
            config: RenderConfig::default(),
            data_source: None,
        }
    }

    /// Defaults overridden by `DOCWEAVE_MAX_WORKERS`, `DOCWEAVE_CHUNK_SIZE`
    /// and `DOCWEAVE_PERF_LOG`.
    pub fn from_env() -> Result<Self, DocweaveError> {
        let mut builder = Self::new();
        builder.config.apply_env()?;
        Ok(builder)
    }

    pub fn config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn page_layout(mut self, orientation: Orientation, size: PageSize) -> Self {
        self.config.page_layout = PageLayout::new(orientation, size);
        self
    }

    pub fn font(mut self, font: FontSpec) -> Self {
        self.config.font = font;
        self
    }

    pub fn error_font(mut self, font: FontSpec) -> Self {
        self.config.error_font = font;
        self
    }

    pub fn table_style(mut self, style: impl Into<String>) -> Self {
        self.config.table_style = style.into();
        self
    }

    pub fn heading_levels(mut self, levels: u8) -> Self {
        self.config.heading_levels = levels;
        self
    }

    pub fn max_workers(mut self, workers: usize) -> Self {
        self.config.max_workers = workers;
        self
    }

    pub fn chunk_size(mut self, rows: usize) -> Self {
        self.config.chunk_size = rows;
        self
    }

    pub fn api_timeout(mut self, timeout: Duration) -> Self {
        self.config.api_timeout = timeout;
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.config.margins = margins;
        self
    }

    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.perf_log = Some(path.into());
        self
    }

    /// Replaces the CSV/HTTP loader used by `dataframe` tags.
    pub fn data_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.data_source = Some(source);
        self
    }

    pub fn build(self) -> Result<Renderer, DocweaveError> {
        self.config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers)
            .thread_name(|idx| format!("docweave-worker-{idx}"))
            .build()
            .map_err(|err| DocweaveError::InvalidConfiguration(err.to_string()))?;
        let perf = match &self.config.perf_log {
            Some(path) => Some(PerfLogger::new(path)?),
            None => None,
        };
        let data_source = self
            .data_source
            .unwrap_or_else(|| Arc::new(DefaultDataSource::new(self.config.api_timeout)));
        Ok(Renderer {
            registry: HandlerRegistry::from_config(&self.config),
            config: self.config,
            pool,
            data_source,
            perf,
        })
    }
}

/// Per-session summary, one outcome per top-level node in template order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderReport {
    pub nodes: Vec<NodeOutcome>,
    pub total_ms: f64,
    /// Set once the document has been sealed to a destination.
    pub bytes_written: Option<usize>,
}

impl RenderReport {
    pub fn error_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.error.is_some()).count()
    }

    pub fn block_count(&self) -> usize {
        self.nodes.iter().map(|node| node.blocks).sum()
    }
}

/// A completed, not yet sealed document. Sealing consumes it.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub document: DocumentModel,
    pub report: RenderReport,
}

impl RenderedDocument {
    pub fn seal_to_file(self, path: impl AsRef<Path>) -> Result<RenderReport, DocweaveError> {
        let written = self.document.seal_to_file(path)?;
        Ok(RenderReport {
            bytes_written: Some(written),
            ..self.report
        })
    }

    pub fn seal_to_writer<W: std::io::Write>(
        self,
        writer: &mut W,
    ) -> Result<RenderReport, DocweaveError> {
        let written = self.document.seal_to_writer(writer)?;
        Ok(RenderReport {
            bytes_written: Some(written),
            ..self.report
        })
    }
}

impl Renderer {
    pub fn builder() -> RendererBuilder {
        RendererBuilder::new()
    }

    pub fn new(config: RenderConfig) -> Result<Self, DocweaveError> {
        RendererBuilder::new().config(config).build()
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Reads `template_path`, renders it and seals the result to `output_path`.
    pub fn render_file(
        &self,
        template_path: impl AsRef<Path>,
        context: &Context,
        output_path: impl AsRef<Path>,
    ) -> Result<RenderReport, DocweaveError> {
        let template = read_template(template_path.as_ref())?;
        let rendered = self.render_str(&template, context)?;
        let started = Instant::now();
        let report = rendered.seal_to_file(output_path)?;
        self.log_span("seal", started);
        if let Some(perf) = &self.perf {
            perf.flush();
        }
        Ok(report)
    }

    /// Renders into the in-memory reference document.
    pub fn render_str(
        &self,
        template: &str,
        context: &Context,
    ) -> Result<RenderedDocument, DocweaveError> {
        let mut document = DocumentModel::new(&self.config);
        let report = self.render_to_backend(template, context, &mut document)?;
        Ok(RenderedDocument { document, report })
    }

    /// Normalize → bind → parse → ordered concurrent dispatch into `backend`.
    /// Sealing the backend is left to the caller.
    pub fn render_to_backend(
        &self,
        template: &str,
        context: &Context,
        backend: &mut dyn OutputBackend,
    ) -> Result<RenderReport, DocweaveError> {
        let started = Instant::now();
        let tree = self.prepare(template, context)?;
        tracing::debug!(nodes = tree.nodes.len(), workers = self.config.max_workers, "dispatching template");

        let dispatch_started = Instant::now();
        let env = RenderEnv::new(&self.config, context, self.data_source.as_ref());
        let registry = &self.registry;
        let error_font = &self.config.error_font;
        let nodes = dispatch_ordered(
            &self.pool,
            &tree.nodes,
            |_, node| registry.render(node, &env),
            |node, error| {
                let text = format!(
                    "[Error rendering {}: {error}]",
                    node.tag().unwrap_or("text")
                );
                Fragment::error_marker(error, text, error_font)
            },
            backend,
            self.perf.as_ref(),
        );
        self.log_span("dispatch", dispatch_started);

        let report = RenderReport {
            nodes,
            total_ms: started.elapsed().as_secs_f64() * 1000.0,
            bytes_written: None,
        };
        if let Some(perf) = &self.perf {
            perf.log_counts(
                "render",
                &[
                    ("nodes", report.nodes.len() as u64),
                    ("blocks", report.block_count() as u64),
                    ("errors", report.error_count() as u64),
                ],
            );
        }
        tracing::debug!(
            nodes = report.nodes.len(),
            errors = report.error_count(),
            ms = report.total_ms,
            "render complete"
        );
        Ok(report)
    }

    /// Builds the node tree once: normalize, bind, then parse.
    pub fn prepare(&self, template: &str, context: &Context) -> Result<MarkupTree, DocweaveError> {
        let t = Instant::now();
        let normalized = normalize(template);
        self.log_span("normalize", t);

        let t = Instant::now();
        let bound = bind(&normalized, context);
        self.log_span("bind", t);

        let t = Instant::now();
        let tree = parse(&bound)?;
        self.log_span("parse", t);
        Ok(tree)
    }

    pub fn validate(&self, template: &str, context: &Context) -> ValidationReport {
        validate_template(template, context, &self.registry)
    }

    pub fn validate_file(
        &self,
        template_path: impl AsRef<Path>,
        context: &Context,
    ) -> Result<ValidationReport, DocweaveError> {
        let template = read_template(template_path.as_ref())?;
        Ok(self.validate(&template, context))
    }

    fn log_span(&self, name: &str, started: Instant) {
        if let Some(perf) = &self.perf {
            perf.log_span_ms(name, None, started.elapsed().as_secs_f64() * 1000.0);
        }
    }
}

fn read_template(path: &Path) -> Result<String, DocweaveError> {
    if !path.is_file() {
        return Err(DocweaveError::TemplateNotFound(path.to_path_buf()));
    }
    Ok(std::fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_zero_chunk_size() {
        let err = Renderer::builder()
            .chunk_size(0)
            .build()
            .err()
            .expect("should fail");
        assert!(matches!(err, DocweaveError::InvalidConfiguration(_)));
    }

    #[test]
    fn missing_template_is_fatal_before_rendering() {
        let renderer = Renderer::builder().max_workers(2).build().expect("renderer");
        let err = renderer
            .render_file("no/such/template.txt", &Context::new(), "unused.json")
            .expect_err("missing template");
        assert!(matches!(err, DocweaveError::TemplateNotFound(_)));
    }

    #[test]
    fn malformed_markup_is_fatal_parse_error() {
        let renderer = Renderer::builder().max_workers(2).build().expect("renderer");
        let err = renderer
            .render_str("<h1>never closed\n<p>x</p>", &Context::new())
            .expect_err("parse error");
        assert!(matches!(err, DocweaveError::Parse(_)));
    }

    #[test]
    fn report_counts_blocks_and_errors() {
        let renderer = Renderer::builder().max_workers(2).build().expect("renderer");
        let rendered = renderer
            .render_str("<h1>Intro</h1>\n<image src=\"nope.png\"/>", &Context::new())
            .expect("render");
        assert_eq!(rendered.report.error_count(), 1);
        // h1, newline text leaf, image marker
        assert_eq!(rendered.report.nodes.len(), 3);
        assert_eq!(rendered.report.block_count(), 2);
    }
}
