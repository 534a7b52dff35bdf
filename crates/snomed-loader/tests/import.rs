//! End-to-end import of a minimal fake RF2 release directory.

use std::fs;
use std::path::Path;

use snomed_loader::{import_release, Rf2Config};
use snomed_store::{Store, StoreConfig};

fn write_file(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

fn build_release(root: &Path) {
    let terminology = root.join("Snapshot").join("Terminology");
    fs::create_dir_all(&terminology).unwrap();

    write_file(
        &terminology,
        "sct2_Concept_Snapshot_INT_20250101.txt",
        "id\teffectiveTime\tactive\tmoduleId\tdefinitionStatusId\n\
         73211009\t20020131\t1\t900000000000207008\t900000000000074008\n\
         64572001\t20020131\t1\t900000000000207008\t900000000000074008\n\
         bogus-row-not-a-number\t20020131\t1\t900000000000207008\t900000000000074008\n",
    );

    write_file(
        &terminology,
        "sct2_Description_Snapshot-en_INT_20250101.txt",
        "id\teffectiveTime\tactive\tmoduleId\tconceptId\tlanguageCode\ttypeId\tterm\tcaseSignificanceId\n\
         1\t20020131\t1\t900000000000207008\t73211009\ten\t900000000000003001\tDiabetes mellitus (disorder)\t900000000000448009\n",
    );

    write_file(
        &terminology,
        "sct2_Relationship_Snapshot_INT_20250101.txt",
        "id\teffectiveTime\tactive\tmoduleId\tsourceId\tdestinationId\trelationshipGroup\ttypeId\tcharacteristicTypeId\tmodifierId\n\
         1\t20020131\t1\t900000000000207008\t73211009\t64572001\t0\t116680003\t900000000000011006\t900000000000451002\n",
    );

    let refset_content = root.join("Snapshot").join("Refset").join("Content");
    fs::create_dir_all(&refset_content).unwrap();
    write_file(
        &refset_content,
        "der2_Refset_SimpleSnapshot_INT_20250101.txt",
        "id\teffectiveTime\tactive\tmoduleId\trefsetId\treferencedComponentId\n\
         11111111-1111-1111-1111-111111111111\t20020131\t1\t900000000000207008\t447562003\t73211009\n",
    );
}

#[test]
fn import_release_populates_store_and_skips_malformed_rows() {
    let release_dir = tempfile::tempdir().unwrap();
    build_release(release_dir.path());

    let store_dir = tempfile::tempdir().unwrap();
    let store = Store::open(StoreConfig {
        core_db_path: store_dir.path().join("core.db"),
        refsets_db_path: store_dir.path().join("refsets.db"),
        ..StoreConfig::default()
    })
    .unwrap();

    let stats = import_release(release_dir.path(), &store, &Rf2Config::default()).unwrap();

    assert_eq!(stats.parse_errors, 1, "the bogus concept row should be logged and skipped");
    assert!(stats.written >= 4);

    assert!(store.concept(73211009).unwrap().is_some());
    assert!(store.concept(64572001).unwrap().is_some());
    assert_eq!(store.all_parents(73211009, None).unwrap().len(), 2);

    let refset_ids = store.component_refset_ids(73211009).unwrap();
    assert!(refset_ids.contains(&447562003));
}
