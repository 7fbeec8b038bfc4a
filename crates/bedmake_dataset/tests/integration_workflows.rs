//! Integration tests for end-to-end bedmake_dataset workflows.
//!
//! These tests verify that the major workflows work correctly together:
//! 1. Batch files → materialized image-folder tree + summary
//! 2. Materialized tree → ImageFolder index → recomputed statistics
//! 3. Fail-fast preconditions (existing target, invalid labels, no batches)

use bedmake_dataset::{
    materialize, BatchFormat, BedmakeDatasetError, DepthImage, ImageFolder, MaterializeConfig,
    MaterializedDataset, PixelHistogram, SampleClass, SampleRecord, Split, SUMMARY_FILE,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Replicated 3-channel depth image whose values depend on `seed`.
fn depth_image(seed: u8, rows: usize, cols: usize) -> DepthImage {
    DepthImage::Stacked(
        (0..rows)
            .map(|r| {
                (0..cols)
                    .map(|c| {
                        let v = seed.wrapping_mul(31).wrapping_add((r * cols + c) as u8 * 7);
                        vec![v, v, v]
                    })
                    .collect()
            })
            .collect(),
    )
}

fn records(classes: &[i64], seed: u8) -> Vec<SampleRecord> {
    classes
        .iter()
        .enumerate()
        .map(|(i, class)| SampleRecord {
            class: *class,
            d_img: depth_image(seed.wrapping_add(i as u8), 3, 4),
        })
        .collect()
}

fn write_pickle_batch(head: &Path, name: &str, records: &[SampleRecord]) -> anyhow::Result<()> {
    let bytes = serde_pickle::to_vec(&records, serde_pickle::SerOptions::new())?;
    fs::write(head.join(name), bytes)?;
    Ok(())
}

fn write_json_batch(head: &Path, name: &str, records: &[SampleRecord]) -> anyhow::Result<()> {
    fs::write(head.join(name), serde_json::to_vec(records)?)?;
    Ok(())
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

fn count_files(root: &Path) -> usize {
    let mut n = 0;
    let mut stack: Vec<PathBuf> = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                n += 1;
            }
        }
    }
    n
}

#[test]
fn two_batch_example_splits_by_position() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let head = tmp.path().join("cache");
    fs::create_dir_all(&head)?;
    // Written out of order on purpose; processing is by sorted name.
    write_pickle_batch(&head, "b.pkl", &records(&[1, 0], 50))?;
    write_pickle_batch(&head, "a.pkl", &records(&[0, 1, 0], 10))?;
    let target = tmp.path().join("pytorch");

    let summary = materialize(MaterializeConfig::new(&head, &target))?;

    assert_eq!(summary.totals.success, 3);
    assert_eq!(summary.totals.failure, 2);
    assert_eq!(summary.total_samples(), 5);
    assert_eq!((summary.train.success, summary.train.failure), (2, 1));
    assert_eq!((summary.valid.success, summary.valid.failure), (1, 1));
    assert_eq!(summary.batches.len(), 2);
    assert!(summary.batches[0].path.ends_with("a.pkl"));
    assert_eq!(summary.batches[0].split, Split::Train);
    assert_eq!(summary.batches[1].split, Split::Valid);

    // Per-label counters continue across the split boundary.
    assert_eq!(
        files_in(&target.join("train/success")),
        vec!["d_00000.png", "d_00001.png"]
    );
    assert_eq!(files_in(&target.join("train/failure")), vec!["d_00000.png"]);
    assert_eq!(files_in(&target.join("valid/failure")), vec!["d_00001.png"]);
    assert_eq!(files_in(&target.join("valid/success")), vec!["d_00002.png"]);
    assert!(target.join(SUMMARY_FILE).exists());
    Ok(())
}

#[test]
fn every_sample_lands_once_and_last_batch_is_valid() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let head = tmp.path().join("head");
    fs::create_dir_all(&head)?;
    write_json_batch(&head, "cv_0.json", &records(&[0, 0, 1, 1, 0], 1))?;
    write_json_batch(&head, "cv_1.json", &records(&[1, 1, 1], 2))?;
    write_json_batch(&head, "cv_2.json", &records(&[0, 1], 3))?;
    let target = tmp.path().join("out");

    let summary = materialize(MaterializeConfig::new(&head, &target).with_format(BatchFormat::Json))?;

    let dataset = MaterializedDataset::open(&target)?;
    assert_eq!(dataset.len(), 10);
    assert_eq!(dataset.len(), summary.total_samples());
    assert_eq!(dataset.valid.len(), 2);
    assert_eq!(dataset.train.len(), 8);
    assert_eq!(dataset.valid.count_for("success"), 1);
    assert_eq!(dataset.valid.count_for("failure"), 1);

    // No gaps or reuse in either label's numbering across the whole run.
    for class in SampleClass::ALL {
        let mut names: Vec<String> = Split::ALL
            .iter()
            .flat_map(|split| files_in(&target.join(split.as_str()).join(class.as_str())))
            .collect();
        names.sort();
        let expected: Vec<String> = (0..summary.totals.get(class))
            .map(|i| format!("d_{i:05}.png"))
            .collect();
        assert_eq!(names, expected, "counter sequence for {class}");
    }
    Ok(())
}

#[test]
fn stats_round_trip_through_written_images() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let head = tmp.path().join("head");
    fs::create_dir_all(&head)?;
    let first = records(&[0, 1, 1], 7);
    let second = records(&[0, 0], 99);
    write_pickle_batch(&head, "x_0.pkl", &first)?;
    write_pickle_batch(&head, "x_1.pkl", &second)?;
    let target = tmp.path().join("out");

    let summary = materialize(MaterializeConfig::new(&head, &target))?;

    let expected: PixelHistogram = first
        .iter()
        .chain(second.iter())
        .flat_map(|r| r.d_img.first_channel())
        .collect();
    assert_eq!(summary.pixel_count, 5 * 12);
    assert_eq!(summary.pixel_stats, expected.stats());

    let check = MaterializedDataset::open(&target)?.check_stats()?;
    assert_eq!(check.recomputed_pixels, summary.pixel_count);
    assert!(check.matches(1e-9), "{check:?}");
    Ok(())
}

#[test]
fn plane_and_stacked_images_keep_their_pixels() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let head = tmp.path().join("head");
    fs::create_dir_all(&head)?;
    let samples = vec![
        SampleRecord::new(
            SampleClass::Success,
            DepthImage::Plane(vec![vec![0, 128], vec![255, 3]]),
        ),
        SampleRecord::new(
            SampleClass::Failure,
            DepthImage::Stacked(vec![vec![vec![10, 20, 30], vec![40, 50, 60]]]),
        ),
    ];
    write_json_batch(&head, "only.json", &samples)?;
    let target = tmp.path().join("out");

    let summary = materialize(MaterializeConfig::new(&head, &target).with_format(BatchFormat::Json))?;
    // A single batch file is the last one, so everything is valid.
    assert_eq!(summary.valid.total(), 2);
    assert_eq!(summary.train.total(), 0);

    let gray = image::open(target.join("valid/success/d_00000.png"))?.to_luma8();
    assert_eq!(gray.dimensions(), (2, 2));
    assert_eq!(gray.into_raw(), vec![0, 128, 255, 3]);

    let rgb = image::open(target.join("valid/failure/d_00000.png"))?.to_rgb8();
    assert_eq!(rgb.dimensions(), (2, 1));
    assert_eq!(rgb.get_pixel(1, 0).0, [40, 50, 60]);

    // Only the first channel of the stacked image counts.
    assert_eq!(summary.pixel_count, 4 + 2);
    Ok(())
}

#[test]
fn invalid_label_aborts_before_writing_that_sample() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let head = tmp.path().join("head");
    fs::create_dir_all(&head)?;
    write_pickle_batch(&head, "a.pkl", &records(&[0, 2, 1], 5))?;
    write_pickle_batch(&head, "b.pkl", &records(&[0], 6))?;
    let target = tmp.path().join("out");

    let err = materialize(MaterializeConfig::new(&head, &target)).unwrap_err();
    assert_eq!(err.invalid_label(), Some(2));
    assert!(matches!(err, BedmakeDatasetError::InvalidSample { index: 1, .. }));

    assert_eq!(files_in(&target.join("train/success")), vec!["d_00000.png"]);
    assert!(files_in(&target.join("train/failure")).is_empty());
    assert!(!target.join(SUMMARY_FILE).exists());
    Ok(())
}

#[test]
fn existing_target_is_never_overwritten() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let head = tmp.path().join("head");
    fs::create_dir_all(&head)?;
    write_pickle_batch(&head, "a.pkl", &records(&[0, 1], 1))?;
    write_pickle_batch(&head, "b.pkl", &records(&[1], 2))?;
    let target = tmp.path().join("out");

    materialize(MaterializeConfig::new(&head, &target))?;
    let before = count_files(&target);

    let err = materialize(MaterializeConfig::new(&head, &target)).unwrap_err();
    assert!(matches!(err, BedmakeDatasetError::TargetExists { .. }));
    assert_eq!(count_files(&target), before);
    Ok(())
}

#[test]
fn lossy_image_extension_is_rejected_before_target_creation() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let head = tmp.path().join("head");
    fs::create_dir_all(&head)?;
    write_pickle_batch(&head, "a.pkl", &records(&[0, 1], 1))?;
    let target = tmp.path().join("out");

    let mut cfg = MaterializeConfig::new(&head, &target);
    cfg.image_extension = "jpg".to_string();
    let err = materialize(cfg).unwrap_err();
    assert!(matches!(
        err,
        BedmakeDatasetError::UnsupportedImageExtension { ref extension } if extension == "jpg"
    ));
    assert!(!target.exists());

    // The same target is still usable once the extension is fixed.
    let summary = materialize(MaterializeConfig::new(&head, &target))?;
    assert_eq!(summary.total_samples(), 2);
    Ok(())
}

#[test]
fn head_without_batches_is_rejected_before_target_creation() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let head = tmp.path().join("head");
    fs::create_dir_all(&head)?;
    fs::write(head.join("notes.txt"), b"not a batch")?;
    write_json_batch(&head, "wrong_format.json", &records(&[0], 1))?;
    let target = tmp.path().join("out");

    let err = materialize(MaterializeConfig::new(&head, &target)).unwrap_err();
    assert!(matches!(err, BedmakeDatasetError::NoBatchFiles { .. }));
    assert!(!target.exists());
    Ok(())
}

#[test]
fn corrupt_batch_is_fatal() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let head = tmp.path().join("head");
    fs::create_dir_all(&head)?;
    write_pickle_batch(&head, "a.pkl", &records(&[0], 1))?;
    fs::write(head.join("b.pkl"), [0xffu8, 0xfe, 0x00])?;
    let target = tmp.path().join("out");

    let err = materialize(MaterializeConfig::new(&head, &target)).unwrap_err();
    match err {
        BedmakeDatasetError::Pickle { path, .. } => assert!(path.ends_with("b.pkl")),
        other => panic!("expected pickle error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn image_folder_orders_classes_by_name() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let head = tmp.path().join("head");
    fs::create_dir_all(&head)?;
    write_pickle_batch(&head, "a.pkl", &records(&[0, 0, 1], 1))?;
    write_pickle_batch(&head, "b.pkl", &records(&[1], 2))?;
    let target = tmp.path().join("out");
    materialize(MaterializeConfig::new(&head, &target))?;

    let train = ImageFolder::scan(target.join("train"))?;
    assert_eq!(train.class_names(), ["failure", "success"]);
    assert_eq!(train.len(), 3);
    assert_eq!(train.entries()[0].1, 0);
    assert!(train.entries()[0].0.starts_with(target.join("train/failure")));
    assert_eq!(train.count_for("success"), 2);
    assert_eq!(train.count_for("missing"), 0);

    let err = ImageFolder::scan(target.join("nope")).unwrap_err();
    assert!(matches!(err, BedmakeDatasetError::NotADirectory(_)));
    Ok(())
}
