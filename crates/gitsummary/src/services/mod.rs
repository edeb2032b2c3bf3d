pub mod analyzer;
pub mod config;
pub mod pipeline;
pub mod report;
pub mod types;

pub use analyzer::{AnalysisRunResult, AnalyzeOptions, AnalyzerService, FailedCommit, SkippedCommit};
pub use config::{ConfigService, ProjectConfig};
pub use pipeline::ExtractionPipeline;
pub use report::{
    build_changelog, build_impact, build_release_notes, ChangelogReport, ImpactReport,
    ReleaseNotesReport,
};
pub use types::{
    AnalysisMeta, Artifact, ArtifactDraft, Category, ExtractionMode, ImpactScope, InputMetrics,
    QualitativeScores, QualitativeSignal, TokenUsage, SCHEMA_VERSION,
};
