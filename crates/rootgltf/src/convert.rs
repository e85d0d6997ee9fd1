//! The conversion pipeline and the collaborator traits it drives.
//!
//! A [`Converter`] reads the geometry once, then for every subpart in
//! declaration order prunes the tree, recomputes visibility and builds one
//! scene. All scenes are exported into a single document which is
//! deduplicated, serialized, validated and written once. Nothing is written
//! when any step fails.

use std::sync::Arc;

use rootgltf_geom::Geometry;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dedup::{deduplicate, DedupStats};
use crate::document::InterchangeDocument;
use crate::error::{BuildError, ConvertError, ExportError};
use crate::matcher::MatchList;
use crate::prune::prune;
use crate::scene::{NamedScene, SceneObject};
use crate::subpart::SubpartSpec;
use crate::visibility::show_subpart;

/// Reads a geometry tree.
pub trait GeometrySource {
    /// Read the object named `object` from `locator`.
    fn read(&self, locator: &str, object: &str) -> rootgltf_geom::Result<Geometry>;
}

/// Turns the currently visible part of a geometry into a scene tree.
pub trait GeometryBuilder {
    /// Build the visible tree. Returns `None` when nothing is drawn.
    fn build(
        &mut self,
        geometry: &Geometry,
        options: &BuildOptions,
    ) -> Result<Option<SceneObject>, BuildError>;
}

/// Exports built scenes into one interchange document.
pub trait SceneExporter {
    /// Export all scenes, in order, into one document.
    fn export(&mut self, scenes: &[NamedScene]) -> Result<InterchangeDocument, ExportError>;

    /// Check serialized output before it is written. Accepts everything by default.
    fn validate(&self, _bytes: &[u8]) -> Result<(), ExportError> {
        Ok(())
    }
}

/// Stores the final artifact.
pub trait ArtifactWriter {
    /// Write `bytes` under `name`.
    fn write(&mut self, name: &str, bytes: &[u8]) -> std::io::Result<()>;
}

/// Builder settings shared by all subparts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildOptions {
    /// Color volumes without an explicit color by material.
    pub default_colors: bool,
    /// Deepest level whose daughters are still visited.
    pub vis_level: usize,
    /// Triangle budget per scene.
    pub max_faces: usize,
    /// Mesh budget per scene.
    pub max_nodes: usize,
    /// Segments of a full circle. Not read from configs; the converter
    /// sets it from [`ConvertRequest::faces_per_circle`].
    #[serde(skip)]
    pub faces_per_circle: u32,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            default_colors: true,
            vis_level: 10,
            max_faces: 10_000_000,
            max_nodes: 500_000,
            faces_per_circle: DEFAULT_FACES_PER_CIRCLE,
        }
    }
}

/// Segments of a full circle unless configured otherwise.
pub const DEFAULT_FACES_PER_CIRCLE: u32 = 24;
/// Object read from the input unless configured otherwise.
pub const DEFAULT_OBJECT: &str = "Default";
/// Depth limit unless configured otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 999;

/// Everything one conversion needs.
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    /// Geometry locator handed to the source.
    pub input: String,
    /// Artifact name handed to the writer.
    pub output: String,
    /// Object to read from the input.
    pub object: String,
    /// Placements at this depth or deeper are removed.
    pub max_depth: usize,
    /// Segments of a full circle, overrides [`BuildOptions::faces_per_circle`].
    pub faces_per_circle: u32,
    /// Placements removed before any subpart is built.
    pub hide: MatchList,
    /// Subparts, in menu order.
    pub subparts: Vec<SubpartSpec>,
    /// Builder settings.
    pub build: BuildOptions,
}

impl ConvertRequest {
    /// Request with default object, depth, segmentation and build options.
    pub fn new(input: impl Into<String>, output: impl Into<String>, subparts: Vec<SubpartSpec>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            object: DEFAULT_OBJECT.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            faces_per_circle: DEFAULT_FACES_PER_CIRCLE,
            hide: MatchList::new(),
            subparts,
            build: BuildOptions::default(),
        }
    }

    /// Replace the hide list.
    pub fn with_hide(mut self, hide: MatchList) -> Self {
        self.hide = hide;
        self
    }

    /// Replace the depth limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Summary of a successful conversion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertReport {
    /// Name the artifact was written under.
    pub output: String,
    /// Scenes in the document.
    pub scenes: usize,
    /// Menu names of subparts that selected nothing.
    pub empty_subparts: Vec<String>,
    /// Placements removed by pruning.
    pub pruned: usize,
    /// Deduplication counts.
    pub dedup: DedupStats,
    /// Size of the written artifact.
    pub bytes: usize,
}

/// Phase reached by a running conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Reading the input geometry.
    ReadingInput,
    /// Building one subpart.
    Subpart {
        /// Zero-based position in the request.
        index: usize,
        /// Number of subparts.
        total: usize,
        /// Menu name.
        name: String,
    },
    /// Exporting all scenes.
    Exporting,
    /// Deduplicating the document.
    Deduplicating,
    /// Handing the artifact to the writer.
    Writing,
    /// Finished successfully.
    Done,
}

/// Receiver of [`ProgressEvent`]s.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Runs the pipeline over one set of collaborators.
pub struct Converter<S, B, E, W> {
    source: S,
    builder: B,
    exporter: E,
    writer: W,
    progress: Option<ProgressSink>,
}

impl<S, B, E, W> Converter<S, B, E, W>
where
    S: GeometrySource,
    B: GeometryBuilder,
    E: SceneExporter,
    W: ArtifactWriter,
{
    /// Create a converter.
    pub fn new(source: S, builder: B, exporter: E, writer: W) -> Self {
        Self {
            source,
            builder,
            exporter,
            writer,
            progress: None,
        }
    }

    /// Report phases to `sink`.
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// The artifact writer.
    pub fn writer(&self) -> &W {
        &self.writer
    }

    fn report(&self, event: ProgressEvent) {
        if let Some(sink) = &self.progress {
            sink(event);
        }
    }

    /// Run the whole conversion. The writer is called exactly once on
    /// success and never on failure.
    pub fn convert(&mut self, request: &ConvertRequest) -> Result<ConvertReport, ConvertError> {
        self.report(ProgressEvent::ReadingInput);
        info!(input = %request.input, object = %request.object, "reading geometry");
        let mut geometry = self.source.read(&request.input, &request.object)?;
        let stats = geometry.stats();
        info!(
            volumes = stats.volumes,
            placements = stats.placements,
            depth = stats.depth,
            "geometry loaded"
        );

        let options = BuildOptions {
            faces_per_circle: request.faces_per_circle,
            ..request.build
        };
        let mut report = ConvertReport::default();
        let mut scenes = Vec::with_capacity(request.subparts.len());
        let total = request.subparts.len();

        for (index, subpart) in request.subparts.iter().enumerate() {
            let name = subpart.menu.to_string();
            self.report(ProgressEvent::Subpart {
                index,
                total,
                name: name.clone(),
            });
            info!(subpart = %name, "{}/{}", index + 1, total);

            let pruned = prune(&mut geometry, &request.hide, request.max_depth);
            let dropped = geometry.retain_reachable();
            debug!(removed = pruned.removed, dropped, "pruned geometry");
            report.pruned += pruned.removed;

            if !show_subpart(&mut geometry, &subpart.paths) {
                warn!(subpart = %name, "no node matches the subpart paths");
                report.empty_subparts.push(name.clone());
            }
            let root = self.builder.build(&geometry, &options)?;
            scenes.push(NamedScene {
                name,
                visibility: subpart.visibility,
                root,
            });
        }
        drop(geometry);

        self.report(ProgressEvent::Exporting);
        let document = self.exporter.export(&scenes)?;
        info!(scenes = document.scenes.len(), "exported scenes");
        report.scenes = document.scenes.len();

        self.report(ProgressEvent::Deduplicating);
        let (document, dedup) = deduplicate(document)?;
        report.dedup = dedup;

        let bytes = document.to_vec()?;
        self.exporter.validate(&bytes)?;

        self.report(ProgressEvent::Writing);
        self.writer
            .write(&request.output, &bytes)
            .map_err(|source| ConvertError::Write {
                name: request.output.clone(),
                source,
            })?;
        info!(output = %request.output, bytes = bytes.len(), "wrote document");
        report.output = request.output.clone();
        report.bytes = bytes.len();

        self.report(ProgressEvent::Done);
        Ok(report)
    }
}
