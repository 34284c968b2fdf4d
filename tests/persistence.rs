//! End-to-end test: build an index through the orchestration layer, save it,
//! reload it in a fresh manager, and verify searches and incremental updates
//! behave identically across the round trip.

use sidx::build::artifact::{ArtifactStatus, IndexArtifact};
use sidx::utils::hash64;
use sidx::{
    ArtifactProducer, ChangeSet, DocumentSpec, IndexManager, IndexState, SearchContext,
    SearchIndexer,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Synchronous producer over an in-memory catalog of (name words, ext, size).
struct CatalogProducer {
    catalog: Mutex<HashMap<String, (String, String, f64)>>,
}

impl CatalogProducer {
    fn new(entries: &[(&str, &str, &str, f64)]) -> Self {
        Self {
            catalog: Mutex::new(
                entries
                    .iter()
                    .map(|(id, words, ext, size)| {
                        (id.to_string(), (words.to_string(), ext.to_string(), *size))
                    })
                    .collect(),
            ),
        }
    }

    fn set(&self, id: &str, words: &str, ext: &str, size: f64) {
        self.catalog.lock().unwrap().insert(
            id.to_string(),
            (words.to_string(), ext.to_string(), size),
        );
    }
}

impl ArtifactProducer for CatalogProducer {
    fn start(&self, _doc: &DocumentSpec) {}

    fn poll(&self, doc: &DocumentSpec) -> ArtifactStatus {
        let catalog = self.catalog.lock().unwrap();
        let Some((words, ext, size)) = catalog.get(&doc.id) else {
            return ArtifactStatus::Failed("not in catalog".into());
        };
        let mut index = SearchIndexer::new(&doc.id);
        index.start(true);
        let slot = index.add_document(&doc.id, None, None, true).unwrap();
        for word in words.split_whitespace() {
            index.add_word(word, 2, 16, 10, slot);
        }
        index.add_property("ext", ext, 1, 8, 0, slot, true, true);
        index.add_number("size", *size, 0, slot);
        index.finish(&[]);
        ArtifactStatus::Ready(Box::new(IndexArtifact {
            doc: doc.clone(),
            index,
            content_hash: hash64(&format!("{words}:{ext}:{size}")) as u64,
        }))
    }
}

fn catalog() -> Arc<CatalogProducer> {
    Arc::new(CatalogProducer::new(&[
        ("textures/rock_albedo.png", "rock albedo", "png", 4096.0),
        ("textures/rock_normal.png", "rock normal", "png", 8192.0),
        ("materials/rock.mat", "rock", "mat", 512.0),
        ("meshes/cliff.fbx", "cliff", "fbx", 65536.0),
    ]))
}

fn manager_for(producer: Arc<CatalogProducer>) -> IndexManager {
    IndexManager::new(
        "catalog",
        SearchContext::default(),
        producer as Arc<dyn ArtifactProducer>,
    )
}

fn doc_specs(producer: &CatalogProducer) -> Vec<DocumentSpec> {
    producer
        .catalog
        .lock()
        .unwrap()
        .keys()
        .map(|id| DocumentSpec::new(id.clone()))
        .collect()
}

fn result_ids(manager: &IndexManager, query: &str) -> Vec<String> {
    manager
        .search(query, i32::MAX, 50)
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect()
}

#[test]
fn saved_index_answers_queries_identically_after_reload() {
    let producer = catalog();
    let manager = manager_for(Arc::clone(&producer));
    manager.build(doc_specs(&producer)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.sidx");
    manager.save(&path).unwrap();

    let restored = manager_for(catalog());
    assert!(restored.load(&path).unwrap());
    assert_eq!(restored.state(), IndexState::Ready);

    for query in [
        "rock",
        "alb",
        "rock ext:png",
        "size>1000",
        "rock -ext:mat",
        "cliff | albedo",
    ] {
        assert_eq!(
            result_ids(&manager, query),
            result_ids(&restored, query),
            "query {query:?} must survive the round trip"
        );
    }
    restored.with_index(|index| {
        assert!(index.check_sort_invariant());
        assert!(index.keywords().any(|k| k == "ext:png"));
    });
}

#[test]
fn incremental_update_after_reload() {
    let producer = catalog();
    let manager = manager_for(Arc::clone(&producer));
    manager.build(doc_specs(&producer)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.sidx");
    manager.save(&path).unwrap();

    let producer = catalog();
    let restored = manager_for(Arc::clone(&producer));
    assert!(restored.load(&path).unwrap());

    producer.set("textures/rock_albedo.png", "rock roughness", "png", 4096.0);
    restored
        .update(ChangeSet {
            updated: vec!["textures/rock_albedo.png".into()],
            removed: vec!["meshes/cliff.fbx".into()],
        })
        .unwrap();

    assert!(result_ids(&restored, "cliff").is_empty());
    assert_eq!(
        result_ids(&restored, "roughness"),
        vec!["textures/rock_albedo.png".to_string()]
    );
    assert!(
        result_ids(&restored, "albedo").is_empty(),
        "stale words of the updated document must not match"
    );

    // The updated generation persists too.
    restored.save(&path).unwrap();
    let second = manager_for(catalog());
    assert!(second.load(&path).unwrap());
    assert!(result_ids(&second, "cliff").is_empty());
    assert_eq!(result_ids(&second, "roughness").len(), 1);
}
