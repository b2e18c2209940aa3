//! Executes a [`MergePlan`] into a stored output artifact.
//!
//! # Lifecycle
//!
//! An [`AssemblyJob`] moves `Pending -> Running -> Succeeded | Failed`, once.
//! Each source document is opened and imported at most once per job; every
//! plan entry then copies one page from its imported source.
//!
//! # Failure
//!
//! The first failing entry aborts the job with `AssemblyFailed`, naming the
//! entry. The output is only persisted after the whole document serialized,
//! so a failed job never leaves an artifact behind.

use serde::Serialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::artifacts::ArtifactStore;
use crate::error::{Error, Result};
use crate::pdf::{ImportedSource, OutputDocument};
use crate::plan::{MergePlan, PlanEntry};
use crate::registry::DocumentRegistry;
use crate::storage::{ArtifactId, DocumentId};
use crate::util::size_kb;

/// Progress callback: `(entries done, total entries)`.
pub type ProgressFn<'a> = dyn Fn(usize, usize) + Send + Sync + 'a;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssemblyState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Outcome of a successful assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyResult {
    pub artifact_id: ArtifactId,
    pub size_bytes: u64,
    pub page_count: usize,
}

impl AssemblyResult {
    pub const fn file_size_kb(&self) -> u64 {
        size_kb(self.size_bytes)
    }
}

/// One execution of a plan.
#[derive(Debug)]
pub struct AssemblyJob {
    plan: Option<MergePlan>,
    state: AssemblyState,
}

impl AssemblyJob {
    pub const fn new(plan: MergePlan) -> Self {
        Self {
            plan: Some(plan),
            state: AssemblyState::Pending,
        }
    }

    pub const fn state(&self) -> AssemblyState {
        self.state
    }
}

/// Optional hooks for a single assembly.
#[derive(Default)]
pub struct AssemblyOptions<'a> {
    pub progress: Option<&'a ProgressFn<'a>>,
    /// Checked before each entry; setting it fails the job
    pub cancel: Option<&'a AtomicBool>,
}

pub struct AssemblyEngine<'a> {
    registry: &'a DocumentRegistry,
    artifacts: &'a ArtifactStore,
}

impl<'a> AssemblyEngine<'a> {
    pub const fn new(registry: &'a DocumentRegistry, artifacts: &'a ArtifactStore) -> Self {
        Self { registry, artifacts }
    }

    /// Assemble `plan` with no progress reporting.
    pub fn assemble(&self, plan: MergePlan) -> Result<AssemblyResult> {
        let mut job = AssemblyJob::new(plan);
        self.run(&mut job, &AssemblyOptions::default())
    }

    /// Assemble `plan`, failing early once `cancel` is set.
    pub fn assemble_with_cancel(&self, plan: MergePlan, cancel: &AtomicBool) -> Result<AssemblyResult> {
        let mut job = AssemblyJob::new(plan);
        let options = AssemblyOptions {
            progress: None,
            cancel: Some(cancel),
        };
        self.run(&mut job, &options)
    }

    /// Drive `job` to completion. A job runs at most once.
    pub fn run(&self, job: &mut AssemblyJob, options: &AssemblyOptions<'_>) -> Result<AssemblyResult> {
        let Some(plan) = job.plan.take().filter(|_| job.state == AssemblyState::Pending) else {
            return Err(Error::AssemblyFailed("assembly already ran".to_string()));
        };

        job.state = AssemblyState::Running;
        info!(
            "Assembling {} ({} pages)",
            plan.output_name(),
            plan.len()
        );

        match self.execute(&plan, options) {
            Ok(result) => {
                job.state = AssemblyState::Succeeded;
                info!(
                    "Assembled {} as {} ({} KB)",
                    plan.output_name(),
                    result.artifact_id,
                    result.file_size_kb()
                );
                Ok(result)
            }
            Err(e) => {
                job.state = AssemblyState::Failed;
                warn!("Assembly of {} failed: {}", plan.output_name(), e);
                Err(e)
            }
        }
    }

    fn execute(&self, plan: &MergePlan, options: &AssemblyOptions<'_>) -> Result<AssemblyResult> {
        let total = plan.len();
        let mut output = OutputDocument::new();
        let mut sources: HashMap<DocumentId, ImportedSource> = HashMap::new();

        for (position, entry) in plan.entries().iter().enumerate() {
            if options.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(Error::AssemblyFailed(format!(
                    "cancelled before entry {}",
                    position + 1
                )));
            }

            let source = match sources.entry(entry.document_id.clone()) {
                Entry::Occupied(slot) => slot.into_mut(),
                Entry::Vacant(slot) => {
                    let imported = self
                        .registry
                        .load(&entry.document_id)
                        .and_then(|pdf| output.import(&pdf))
                        .map_err(|e| entry_failure(position, entry, &e))?;
                    debug!("Opened source {} for assembly", entry.document_id);
                    slot.insert(imported)
                }
            };

            output
                .append_page(source, entry.page_index, entry.rotation)
                .map_err(|e| entry_failure(position, entry, &e))?;

            if let Some(progress) = options.progress {
                progress(position + 1, total);
            }
        }

        let page_count = output.page_count();
        let bytes = output.finish(plan.output_name())?;
        let stored = self.artifacts.persist(plan.output_name(), &bytes)?;

        Ok(AssemblyResult {
            artifact_id: stored.id,
            size_bytes: stored.size_bytes,
            page_count,
        })
    }
}

fn entry_failure(position: usize, entry: &PlanEntry, cause: &Error) -> Error {
    let reason = match cause {
        Error::AssemblyFailed(reason) => reason.clone(),
        Error::NotFound(_) => "source document is no longer available".to_string(),
        other => other.detail(),
    };
    Error::AssemblyFailed(format!(
        "entry {} (document {}, page {}): {}",
        position + 1,
        entry.document_id,
        entry.page_index.page_number(),
        reason
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetentionConfig;
    use crate::manifest::Rotation;
    use crate::pdf::PageIndex;
    use crate::pdf::test_support::{page_rotation, page_text, sample_pdf};
    use lopdf::Document;
    use std::sync::Mutex;

    struct Fixture {
        _dir: tempfile::TempDir,
        registry: DocumentRegistry,
        artifacts: ArtifactStore,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let registry = DocumentRegistry::open(dir.path().join("uploads")).unwrap();
        let artifacts =
            ArtifactStore::open(dir.path().join("outputs"), &RetentionConfig::default()).unwrap();
        Fixture {
            _dir: dir,
            registry,
            artifacts,
        }
    }

    fn entry(id: &DocumentId, index: usize, rotation: Rotation) -> PlanEntry {
        PlanEntry {
            document_id: id.clone(),
            page_index: PageIndex::new(index),
            rotation,
        }
    }

    #[test]
    fn test_assembles_in_plan_order_with_absolute_rotation() {
        let f = fixture();
        let a = f.registry.register("a.pdf", sample_pdf("A", 3)).unwrap();
        let b = f.registry.register("b.pdf", sample_pdf("B", 2)).unwrap();

        let plan = MergePlan::new(
            "out.pdf",
            vec![
                entry(&a.id, 0, Rotation::R90),
                entry(&b.id, 1, Rotation::R0),
                entry(&a.id, 2, Rotation::R180),
            ],
        )
        .unwrap();

        let result = AssemblyEngine::new(&f.registry, &f.artifacts).assemble(plan).unwrap();
        assert_eq!(result.page_count, 3);

        let bytes = f.artifacts.retrieve(result.artifact_id.as_str()).unwrap().bytes;
        let merged = Document::load_mem(&bytes).unwrap();
        let pages = merged.get_pages();
        assert_eq!(pages.len(), 3);

        let expected = [("A-Page-1", 90), ("B-Page-2", 0), ("A-Page-3", 180)];
        for (n, (text, rotation)) in expected.iter().enumerate() {
            let page_id = pages[&u32::try_from(n + 1).unwrap()];
            assert!(page_text(&merged, page_id).contains(text));
            assert_eq!(page_rotation(&merged, page_id), *rotation);
        }
    }

    #[test]
    fn test_failure_leaves_no_artifact() {
        let f = fixture();
        let a = f.registry.register("a.pdf", sample_pdf("A", 2)).unwrap();
        let plan = MergePlan::new(
            "out.pdf",
            vec![entry(&a.id, 0, Rotation::R0), entry(&a.id, 7, Rotation::R0)],
        )
        .unwrap();

        let mut job = AssemblyJob::new(plan);
        let err = AssemblyEngine::new(&f.registry, &f.artifacts)
            .run(&mut job, &AssemblyOptions::default())
            .unwrap_err();

        assert_eq!(job.state(), AssemblyState::Failed);
        assert!(matches!(err, Error::AssemblyFailed(ref m) if m.starts_with("entry 2")));
        assert!(f.artifacts.is_empty());
        assert!(f.artifacts.storage().keys().unwrap().is_empty());
    }

    #[test]
    fn test_job_runs_once() {
        let f = fixture();
        let a = f.registry.register("a.pdf", sample_pdf("A", 1)).unwrap();
        let plan = MergePlan::new("out.pdf", vec![entry(&a.id, 0, Rotation::R0)]).unwrap();

        let engine = AssemblyEngine::new(&f.registry, &f.artifacts);
        let mut job = AssemblyJob::new(plan);
        assert_eq!(job.state(), AssemblyState::Pending);
        engine.run(&mut job, &AssemblyOptions::default()).unwrap();
        assert_eq!(job.state(), AssemblyState::Succeeded);

        assert!(engine.run(&mut job, &AssemblyOptions::default()).is_err());
        assert_eq!(f.artifacts.len(), 1);
    }

    #[test]
    fn test_removed_source_fails_assembly() {
        let f = fixture();
        let a = f.registry.register("a.pdf", sample_pdf("A", 1)).unwrap();
        let plan = MergePlan::new("out.pdf", vec![entry(&a.id, 0, Rotation::R0)]).unwrap();
        f.registry.remove(&a.id).unwrap();

        let err = AssemblyEngine::new(&f.registry, &f.artifacts).assemble(plan).unwrap_err();
        assert!(matches!(err, Error::AssemblyFailed(ref m) if m.contains("no longer available")));
        assert!(f.artifacts.is_empty());
    }

    #[test]
    fn test_progress_and_cancel() {
        let f = fixture();
        let a = f.registry.register("a.pdf", sample_pdf("A", 3)).unwrap();
        let entries: Vec<_> = (0..3).map(|i| entry(&a.id, i, Rotation::R0)).collect();
        let engine = AssemblyEngine::new(&f.registry, &f.artifacts);

        let seen = Mutex::new(Vec::new());
        let progress = |done: usize, total: usize| seen.lock().unwrap().push((done, total));
        let options = AssemblyOptions {
            progress: Some(&progress),
            cancel: None,
        };
        let mut job = AssemblyJob::new(MergePlan::new("out.pdf", entries.clone()).unwrap());
        engine.run(&mut job, &options).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);

        let cancel = AtomicBool::new(true);
        let err = engine
            .assemble_with_cancel(MergePlan::new("out.pdf", entries).unwrap(), &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::AssemblyFailed(ref m) if m.contains("cancelled")));
        assert_eq!(f.artifacts.len(), 1);
    }

    #[test]
    fn test_duplicate_pages() {
        let f = fixture();
        let a = f.registry.register("a.pdf", sample_pdf("A", 1)).unwrap();
        let plan = MergePlan::new(
            "dup.pdf",
            vec![entry(&a.id, 0, Rotation::R0), entry(&a.id, 0, Rotation::R270)],
        )
        .unwrap();

        let result = AssemblyEngine::new(&f.registry, &f.artifacts).assemble(plan).unwrap();
        assert_eq!(result.page_count, 2);
        assert!(result.artifact_id.as_str().ends_with("-dup.pdf"));
    }

    #[test]
    fn test_long_multibyte_output_name_is_stored() {
        let f = fixture();
        let a = f.registry.register("a.pdf", sample_pdf("A", 1)).unwrap();
        let plan = MergePlan::new(&"é".repeat(120), vec![entry(&a.id, 0, Rotation::R0)]).unwrap();

        let result = AssemblyEngine::new(&f.registry, &f.artifacts).assemble(plan).unwrap();
        let download = f.artifacts.retrieve(result.artifact_id.as_str()).unwrap();
        assert!(download.file_name.starts_with("éé"));
        assert!(download.file_name.ends_with(".pdf"));
    }

    #[test]
    fn test_concurrent_assemblies_share_a_source() {
        let f = fixture();
        let a = f.registry.register("a.pdf", sample_pdf("A", 3)).unwrap();
        let engine = AssemblyEngine::new(&f.registry, &f.artifacts);

        let results: Vec<Result<AssemblyResult>> = std::thread::scope(|scope| {
            let handles: Vec<_> = [Rotation::R0, Rotation::R90]
                .into_iter()
                .map(|rotation| {
                    let entries = (0..3).map(|i| entry(&a.id, i, rotation)).collect();
                    let plan = MergePlan::new("shared.pdf", entries).unwrap();
                    let engine = &engine;
                    scope.spawn(move || engine.assemble(plan))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let ids: Vec<ArtifactId> = results
            .into_iter()
            .map(|r| r.unwrap().artifact_id)
            .collect();
        assert_ne!(ids[0], ids[1]);
        assert_eq!(f.artifacts.len(), 2);
        for id in &ids {
            let bytes = f.artifacts.retrieve(id.as_str()).unwrap().bytes;
            assert_eq!(Document::load_mem(&bytes).unwrap().get_pages().len(), 3);
        }
        assert!(f.registry.contains(&a.id));
    }
}
