use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

mod common;

#[test]
fn runs() {
    let mut cmd = Command::cargo_bin("labelship").unwrap();
    cmd.assert().success();
}

#[test]
fn outputs_tool_name() {
    let mut cmd = Command::cargo_bin("labelship").unwrap();
    cmd.arg("-V");
    cmd.assert().success().stdout("labelship 0.1.0\n");
}

// Plan subcommand tests

#[test]
fn plan_prints_split_counts() {
    let tmp = tempfile::tempdir().unwrap();
    let input = common::write_jsonl_dataset(tmp.path(), 10, "car");

    let mut cmd = Command::cargo_bin("labelship").unwrap();
    cmd.arg("plan")
        .arg(&input)
        .args(["--dataset", "coco", "--classes", "car,bus"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Plan for 'coco'"))
        .stdout(predicate::str::contains("Manifest rows: 10"))
        .stdout(predicate::str::is_match(r"car\s+7\s+2\s+1").unwrap())
        .stdout(predicate::str::is_match(r"bus\s+0\s+0\s+0").unwrap());
}

#[test]
fn plan_writes_manifest_csv() {
    let tmp = tempfile::tempdir().unwrap();
    let input = common::write_jsonl_dataset(tmp.path(), 10, "car");
    let output = tmp.path().join("labels.csv");

    let mut cmd = Command::cargo_bin("labelship").unwrap();
    cmd.arg("plan")
        .arg(&input)
        .args(["--dataset", "coco", "--classes", "car", "--output"])
        .arg(&output);
    cmd.assert().success();

    let csv = fs::read_to_string(&output).unwrap();
    let rows = common::manifest_triples(&csv);
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0], ("TEST".into(), "img000.jpg".into(), "car".into()));
    assert_eq!(rows[1].0, "VALIDATE");
    assert_eq!(rows[2].0, "VALIDATE");
    assert!(rows[3..].iter().all(|r| r.0 == "TRAIN"));
}

#[test]
fn plan_total_samples_overrides_sample_count() {
    let tmp = tempfile::tempdir().unwrap();
    let input = common::write_jsonl_dataset(tmp.path(), 4, "car");

    // Quotas against 100 samples: 10 TEST, 20 VALIDATE; four boxes all go to TEST.
    let mut cmd = Command::cargo_bin("labelship").unwrap();
    cmd.arg("plan")
        .arg(&input)
        .args(["--dataset", "d", "--classes", "car", "--total-samples", "100"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("quotas against 100 samples"))
        .stdout(predicate::str::is_match(r"car\s+0\s+0\s+4").unwrap());
}

#[test]
fn plan_reads_tfod_csv() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("annotations.csv");
    fs::write(
        &input,
        "filename,width,height,class,xmin,ymin,xmax,ymax\n\
         a.jpg,640,480,person,0.1,0.2,0.5,0.8\n\
         a.jpg,640,480,dog,0.2,0.3,0.6,0.9\n\
         b.jpg,640,480,person,0.3,0.1,0.7,0.4\n",
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("labelship").unwrap();
    cmd.arg("plan")
        .arg(&input)
        .args(["--input-format", "tfod", "--dataset", "d", "--classes", "person"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Samples:       2"))
        .stdout(predicate::str::contains("Manifest rows: 2"));
}

#[test]
fn plan_rejects_bad_distribution() {
    let tmp = tempfile::tempdir().unwrap();
    let input = common::write_jsonl_dataset(tmp.path(), 1, "car");

    let mut cmd = Command::cargo_bin("labelship").unwrap();
    cmd.arg("plan").arg(&input).args([
        "--dataset",
        "d",
        "--classes",
        "car",
        "--tvt-distribution",
        "0.7,0.3",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("exactly 3 values"));
}

#[test]
fn plan_rejects_unknown_input_format() {
    let tmp = tempfile::tempdir().unwrap();
    let input = common::write_jsonl_dataset(tmp.path(), 1, "car");

    let mut cmd = Command::cargo_bin("labelship").unwrap();
    cmd.arg("plan")
        .arg(&input)
        .args(["--input-format", "coco", "--dataset", "d", "--classes", "car"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported format"));
}

#[test]
fn plan_nonexistent_file_fails() {
    let mut cmd = Command::cargo_bin("labelship").unwrap();
    cmd.args(["plan", "nonexistent.jsonl", "--dataset", "d", "--classes", "car"]);
    cmd.assert().failure();
}

// Export subcommand tests

#[test]
fn export_to_directory_bucket() {
    let tmp = tempfile::tempdir().unwrap();
    let input = common::write_jsonl_dataset(tmp.path(), 10, "car");
    let root = tmp.path().join("buckets");
    fs::create_dir(&root).unwrap();

    let mut cmd = Command::cargo_bin("labelship").unwrap();
    cmd.arg("export")
        .arg(&input)
        .args([
            "--dataset",
            "coco",
            "--classes",
            "car",
            "--backend",
            "dir",
            "--bucket",
            "training",
            "--bucket-root",
        ])
        .arg(&root);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Export of 'coco' complete"))
        .stdout(predicate::str::contains("Uploaded:        10"))
        .stdout(predicate::str::contains("labels.csv"));

    let dataset_dir = root.join("training").join("coco");
    assert!(dataset_dir.join("img000.jpg").is_file());
    assert!(dataset_dir.join("img009.jpg").is_file());

    let csv = fs::read_to_string(dataset_dir.join("labels.csv")).unwrap();
    let rows = common::manifest_triples(&csv);
    assert_eq!(rows.len(), 10);
    let images: Vec<&str> = rows.iter().map(|r| r.1.as_str()).collect();
    let expected: Vec<String> = (0..10).map(|i| format!("img{i:03}.jpg")).collect();
    assert_eq!(images, expected);
}

#[test]
fn export_twice_skips_existing_objects() {
    let tmp = tempfile::tempdir().unwrap();
    let input = common::write_jsonl_dataset(tmp.path(), 3, "car");
    let root = tmp.path().join("buckets");
    fs::create_dir(&root).unwrap();

    let run = || {
        let mut cmd = Command::cargo_bin("labelship").unwrap();
        cmd.arg("export")
            .arg(&input)
            .args([
                "--dataset",
                "d",
                "--classes",
                "car",
                "--backend",
                "dir",
                "--bucket",
                "b",
                "--bucket-root",
            ])
            .arg(&root);
        cmd.assert().success()
    };

    run().stdout(predicate::str::contains("Uploaded:        3"));
    run()
        .stdout(predicate::str::contains("Uploaded:        0"))
        .stdout(predicate::str::contains("Already present: 3"));
}

#[test]
fn export_with_missing_image_publishes_no_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("samples.jsonl");
    common::write_jpeg(&tmp.path().join("a.jpg"), 8, 8, 1);
    fs::write(
        &input,
        "{\"image\": \"a.jpg\", \"detections\": [{\"label\": \"car\", \"bbox\": [0,0,1,1]}]}\n\
         {\"image\": \"missing.jpg\", \"detections\": [{\"label\": \"car\", \"bbox\": [0,0,1,1]}]}\n",
    )
    .unwrap();
    let root = tmp.path().join("buckets");
    fs::create_dir(&root).unwrap();

    let mut cmd = Command::cargo_bin("labelship").unwrap();
    cmd.arg("export")
        .arg(&input)
        .args([
            "--dataset",
            "d",
            "--classes",
            "car",
            "--backend",
            "dir",
            "--bucket",
            "b",
            "--bucket-root",
        ])
        .arg(&root);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("manifest not published"));

    assert!(!root.join("b").join("d").join("labels.csv").exists());
}

#[test]
fn export_dir_backend_requires_bucket_root() {
    let tmp = tempfile::tempdir().unwrap();
    let input = common::write_jsonl_dataset(tmp.path(), 1, "car");

    let mut cmd = Command::cargo_bin("labelship").unwrap();
    cmd.arg("export").arg(&input).args([
        "--dataset",
        "d",
        "--classes",
        "car",
        "--backend",
        "dir",
        "--bucket",
        "b",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--bucket-root"));
}

#[test]
fn export_missing_bucket_root_dir_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let input = common::write_jsonl_dataset(tmp.path(), 1, "car");

    let mut cmd = Command::cargo_bin("labelship").unwrap();
    cmd.arg("export")
        .arg(&input)
        .args([
            "--dataset",
            "d",
            "--classes",
            "car",
            "--backend",
            "dir",
            "--bucket",
            "b",
            "--bucket-root",
        ])
        .arg(tmp.path().join("nope"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn export_rejects_zero_workers() {
    let tmp = tempfile::tempdir().unwrap();
    let input = common::write_jsonl_dataset(tmp.path(), 1, "car");

    let mut cmd = Command::cargo_bin("labelship").unwrap();
    cmd.arg("export")
        .arg(&input)
        .args([
            "--dataset",
            "d",
            "--classes",
            "car",
            "--workers",
            "0",
            "--backend",
            "dir",
            "--bucket",
            "b",
            "--bucket-root",
        ])
        .arg(tmp.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("at least 1 worker"));

    assert!(!tmp.path().join("b").exists());
}

#[test]
fn export_warns_once_about_uneven_distribution() {
    let tmp = tempfile::tempdir().unwrap();
    let input = common::write_jsonl_dataset(tmp.path(), 2, "car");
    let root = tmp.path().join("buckets");
    fs::create_dir(&root).unwrap();

    let mut cmd = Command::cargo_bin("labelship").unwrap();
    cmd.env_remove("RUST_LOG")
        .arg("export")
        .arg(&input)
        .args([
            "--dataset",
            "d",
            "--classes",
            "car",
            "--tvt-distribution",
            "0.5,0.2,0.1",
            "--backend",
            "dir",
            "--bucket",
            "b",
            "--bucket-root",
        ])
        .arg(&root);
    let output = cmd.output().unwrap();

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("do not sum to 1.0").count(), 1, "{stderr}");
}
