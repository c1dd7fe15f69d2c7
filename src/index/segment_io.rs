//! Reading and writing segment files
//!
//! A compound segment is one `.cfs` record holding metadata and documents.
//! A non-compound segment splits them into `.si` and `.dat`. Deletions and
//! doc-values updates live in a per-generation `.upd` sidecar.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::commit::SegmentRef;
use crate::compat::{Compatibility, ReadWindow};
use crate::error::{IndexError, Result};
use crate::schema::SchemaRegistry;
use crate::segment::{
    compound_file, data_file, info_file, updates_file, FieldValue, Segment, SegmentInfo, SegmentInfoRecord,
    SegmentUpdates, StoredFields,
};
use crate::storage::{decode_record, encode_record, RecordKind, Store};

#[derive(Serialize, Deserialize)]
struct CompoundRecord {
    info: SegmentInfoRecord,
    docs: Vec<StoredFields>,
}

#[derive(Serialize, Deserialize)]
struct UpdatesRecord {
    generation: u64,
    hard_deletes: BTreeSet<u32>,
    doc_values: BTreeMap<u32, BTreeMap<u32, FieldValue>>,
    /// Registry after the updates, since updates can add fields.
    registry: SchemaRegistry,
}

/// Write the base files of `segment`. Returns the names written. On
/// failure nothing written by this call is left behind.
pub fn write_segment(store: &dyn Store, segment: &Segment) -> Result<Vec<String>> {
    let info = segment.info().to_record();
    let docs = segment.docs().to_vec();

    if segment.info().compound {
        let name = compound_file(segment.name());
        let bytes = encode_record(RecordKind::CompoundSegment, &CompoundRecord { info, docs }, &store.resource(&name))?;
        store.write_atomic(&name, &bytes)?;
        Ok(vec![name])
    } else {
        let si = info_file(segment.name());
        let dat = data_file(segment.name());
        let info_bytes = encode_record(RecordKind::SegmentInfo, &info, &store.resource(&si))?;
        let data_bytes = encode_record(RecordKind::SegmentData, &docs, &store.resource(&dat))?;
        store.write_atomic(&dat, &data_bytes)?;
        if let Err(e) = store.write_atomic(&si, &info_bytes) {
            if let Err(cleanup) = store.delete(&dat) {
                warn!(file = dat.as_str(), error = %cleanup, "could not remove partial segment");
            }
            return Err(e.into());
        }
        Ok(vec![si, dat])
    }
}

/// Write the current update state of `segment` as `generation`.
pub fn write_updates(store: &dyn Store, segment: &Segment, generation: u64) -> Result<String> {
    let name = updates_file(segment.name(), generation);
    let record = UpdatesRecord {
        generation,
        hard_deletes: segment.updates().hard_deletes.clone(),
        doc_values: segment.updates().doc_values.clone(),
        registry: segment.registry().clone(),
    };
    let bytes = encode_record(RecordKind::SegmentUpdates, &record, &store.resource(&name))?;
    store.write_atomic(&name, &bytes)?;
    Ok(name)
}

/// Load a committed segment, admitting its stamp through `window` before
/// any document is interpreted.
pub fn read_segment(store: &dyn Store, seg: &SegmentRef, window: &ReadWindow) -> Result<(Segment, Compatibility)> {
    let cfs = compound_file(&seg.name);
    let (info, docs, resource) = if store.exists(&cfs)? {
        let resource = store.resource(&cfs);
        let record: CompoundRecord = decode_record(&store.read(&cfs)?, RecordKind::CompoundSegment, &resource)?;
        let info = SegmentInfo::from_record(record.info, &resource)?;
        (info, Some(record.docs), resource)
    } else {
        let si = info_file(&seg.name);
        let resource = store.resource(&si);
        let record: SegmentInfoRecord = decode_record(&store.read(&si)?, RecordKind::SegmentInfo, &resource)?;
        (SegmentInfo::from_record(record, &resource)?, None, resource)
    };

    if info.name != seg.name {
        return Err(IndexError::corrupt(
            resource,
            format!("segment file belongs to \"{}\", expected \"{}\"", info.name, seg.name),
        ));
    }
    let verdict = window.admit_segment(&info.stamp, &resource)?;

    let docs = match docs {
        Some(docs) => docs,
        None => {
            let dat = data_file(&seg.name);
            decode_record(&store.read(&dat)?, RecordKind::SegmentData, &store.resource(&dat))?
        }
    };

    let segment = match seg.update_generation {
        None => Segment::new(info, docs)?,
        Some(generation) => {
            let upd = updates_file(&seg.name, generation);
            let resource = store.resource(&upd);
            let record: UpdatesRecord = decode_record(&store.read(&upd)?, RecordKind::SegmentUpdates, &resource)?;
            if record.generation != generation {
                return Err(IndexError::corrupt(
                    resource,
                    format!("update file records generation {}", record.generation),
                ));
            }
            let updates = SegmentUpdates {
                generation,
                hard_deletes: record.hard_deletes,
                doc_values: record.doc_values,
            };
            Segment::with_updates(info, docs, record.registry, updates)?
        }
    };
    Ok((segment, verdict))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldNumbers, FieldSchemaSpec};
    use crate::segment::{Diagnostics, SegmentSource, SegmentVersionStamp};
    use crate::storage::{MemoryStore, StorageError, StorageResult};
    use crate::version::Version;

    /// Memory store that refuses to write one file name.
    #[derive(Debug)]
    struct RefusingStore {
        inner: MemoryStore,
        refuse: &'static str,
    }

    impl Store for RefusingStore {
        fn describe(&self) -> String {
            self.inner.describe()
        }
        fn list(&self) -> StorageResult<Vec<String>> {
            self.inner.list()
        }
        fn exists(&self, name: &str) -> StorageResult<bool> {
            self.inner.exists(name)
        }
        fn read(&self, name: &str) -> StorageResult<Vec<u8>> {
            self.inner.read(name)
        }
        fn write_atomic(&self, name: &str, bytes: &[u8]) -> StorageResult<()> {
            if name == self.refuse {
                let e = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
                return Err(StorageError::write_failed(self.resource(name), e));
            }
            self.inner.write_atomic(name, bytes)
        }
        fn delete(&self, name: &str) -> StorageResult<()> {
            self.inner.delete(name)
        }
        fn try_lock(&self, name: &str) -> StorageResult<()> {
            self.inner.try_lock(name)
        }
        fn unlock(&self, name: &str) -> StorageResult<()> {
            self.inner.unlock(name)
        }
    }

    fn segment(name: &str, compound: bool, engine: Version) -> Segment {
        let mut numbers = FieldNumbers::new(None);
        let mut registry = SchemaRegistry::new();
        let id = registry.declare("id", &FieldSchemaSpec::keyword(), &mut numbers).unwrap();
        let docs = (0..3).map(|i| vec![(id, FieldValue::Keyword(i.to_string()))]).collect();
        let info = SegmentInfo {
            name: name.into(),
            codec: engine.codec_name(),
            max_doc: 3,
            compound,
            created_index_major_version: engine.major,
            stamp: SegmentVersionStamp::fresh(engine, engine),
            diagnostics: Diagnostics::now(SegmentSource::Flush),
            registry,
            index_sort: None,
        };
        Segment::new(info, docs).unwrap()
    }

    fn seg_ref(name: &str) -> SegmentRef {
        SegmentRef {
            name: name.into(),
            update_generation: None,
        }
    }

    #[test]
    fn test_compound_and_split_layouts() {
        let store = MemoryStore::new();
        let window = ReadWindow::default_for(Version::LATEST);

        assert_eq!(write_segment(&store, &segment("_0", true, Version::LATEST)).unwrap(), vec!["_0.cfs"]);
        assert_eq!(
            write_segment(&store, &segment("_1", false, Version::LATEST)).unwrap(),
            vec!["_1.si", "_1.dat"]
        );

        for name in ["_0", "_1"] {
            let (seg, verdict) = read_segment(&store, &seg_ref(name), &window).unwrap();
            assert_eq!(seg.max_doc(), 3);
            assert_eq!(verdict, Compatibility::ReadWrite);
            assert_eq!(seg.document(2).unwrap().get_str("id"), Some("2"));
        }
    }

    #[test]
    fn test_failed_split_write_leaves_no_files() {
        let store = RefusingStore {
            inner: MemoryStore::new(),
            refuse: "_0.si",
        };
        let err = write_segment(&store, &segment("_0", false, Version::LATEST)).unwrap_err();
        assert!(matches!(err, IndexError::Storage(_)));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_updates_sidecar_round_trip() {
        let store = MemoryStore::new();
        let mut seg = segment("_0", true, Version::LATEST);
        write_segment(&store, &seg).unwrap();
        assert!(seg.delete_doc(1));
        let generation = seg.next_generation();
        write_updates(&store, &seg, generation).unwrap();
        seg.seal_pending();

        let (loaded, _) = read_segment(&store, &SegmentRef::of(&seg), &ReadWindow::default_for(Version::LATEST)).unwrap();
        assert_eq!(loaded.update_generation(), Some(1));
        assert!(loaded.is_deleted(1));
        assert_eq!(loaded.num_docs(), 2);
    }

    #[test]
    fn test_old_segment_refused_before_documents() {
        let store = MemoryStore::new();
        let old = Version::new(8, 11, 2);
        write_segment(&store, &segment("_0", false, old)).unwrap();
        // Documents are unreadable, but the stamp is refused first.
        store.delete("_0.dat").unwrap();

        let err = read_segment(&store, &seg_ref("_0"), &ReadWindow::default_for(Version::LATEST)).unwrap_err();
        assert!(matches!(err, IndexError::FormatTooOld { .. }));

        let window = ReadWindow::with_min_major(Version::LATEST, 8).unwrap();
        let err = read_segment(&store, &seg_ref("_0"), &window).unwrap_err();
        assert!(matches!(err, IndexError::Storage(ref e) if e.is_not_found()));
    }
}
