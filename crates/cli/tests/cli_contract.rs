use assert_cmd::cargo::cargo_bin_cmd;
use pdf_engine::testing::blank_pdf;
use predicates::prelude::*;
use serde_json::Value;
use std::io::Cursor;
use std::path::{Path, PathBuf};

fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("fixture should be written");
    path
}

fn two_page_pdf(dir: &Path) -> PathBuf {
    write_fixture(dir, "two-pages.pdf", &blank_pdf(&[(200.0, 100.0), (612.0, 792.0)]))
}

#[test]
fn info_emits_page_count_and_first_page_size() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = two_page_pdf(temp.path());

    let output = cargo_bin_cmd!("pdf-annotator")
        .arg("info")
        .arg(&pdf)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    assert_eq!(value["page_count"], 2);
    assert_eq!(value["first_page_size_pt"]["width"], 200.0);
    assert_eq!(value["first_page_size_pt"]["height"], 100.0);
}

#[test]
fn render_writes_png_at_zoomed_size() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = two_page_pdf(temp.path());
    let output_path = temp.path().join("page.png");

    cargo_bin_cmd!("pdf-annotator")
        .arg("render")
        .arg(&pdf)
        .arg("--page")
        .arg("1")
        .arg("--zoom")
        .arg("2")
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("page.png"));

    let image = image::open(&output_path).expect("render output should be readable image");
    assert_eq!((image.width(), image.height()), (600, 300));
}

#[test]
fn render_rejects_page_out_of_range() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = two_page_pdf(temp.path());

    cargo_bin_cmd!("pdf-annotator")
        .arg("render")
        .arg(&pdf)
        .arg("--page")
        .arg("5")
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn annotate_exports_flattened_pdf_next_to_input() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = two_page_pdf(temp.path());

    let mut logo = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        40,
        20,
        image::Rgba([0, 0, 255, 255]),
    ))
    .write_to(&mut logo, image::ImageFormat::Png)
    .expect("png should encode");
    write_fixture(temp.path(), "logo.png", &logo.into_inner());

    let script = write_fixture(
        temp.path(),
        "script.json",
        br##"[
            {"action": "tool", "tool": "text"},
            {"action": "click", "page": 1, "x": 10, "y": 10},
            {"action": "apply", "update": {"content": "Approved", "fill": "#ff0000"}},
            {"action": "tool", "tool": "draw"},
            {"action": "drag", "page": 2, "points": [[10, 10], [50, 60], [90, 20]]},
            {"action": "upload_image", "path": "logo.png"},
            {"action": "apply", "target": "last", "update": {"opacity": 0.5}},
            {"action": "tool", "tool": "eraser"},
            {"action": "click", "page": 2, "x": 50, "y": 60}
        ]"##,
    );

    cargo_bin_cmd!("pdf-annotator")
        .arg("annotate")
        .arg(&pdf)
        .arg("--script")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("edited-document.pdf"));

    let output = temp.path().join("edited-document.pdf");
    let doc = lopdf::Document::load(&output).expect("exported PDF should parse");
    assert_eq!(doc.get_pages().len(), 2);
}

#[test]
fn annotate_honours_config_file_name_and_output() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = two_page_pdf(temp.path());
    let script = write_fixture(temp.path(), "script.json", b"[]");
    let config = write_fixture(
        temp.path(),
        "config.json",
        br#"{"export_scale": 1.0, "export_file_name": "flat.pdf"}"#,
    );

    cargo_bin_cmd!("pdf-annotator")
        .arg("annotate")
        .arg(&pdf)
        .arg("--script")
        .arg(&script)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("flat.pdf"));

    let doc =
        lopdf::Document::load(temp.path().join("flat.pdf")).expect("exported PDF should parse");
    let pages = doc.get_pages();
    let first = *pages.values().next().expect("first page");
    let media_box = doc
        .get_dictionary(first)
        .and_then(|dict| dict.get(b"MediaBox"))
        .and_then(lopdf::Object::as_array)
        .expect("media box");
    assert_eq!(media_box[2].as_float().expect("width"), 200.0);
    assert_eq!(media_box[3].as_float().expect("height"), 100.0);
}

#[test]
fn annotate_rejects_invalid_script() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = two_page_pdf(temp.path());
    let script =
        write_fixture(temp.path(), "script.json", br#"[{"action": "tool", "tool": "lasso"}]"#);

    cargo_bin_cmd!("pdf-annotator")
        .arg("annotate")
        .arg(&pdf)
        .arg("--script")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid script"));
}

#[test]
fn annotate_rejects_non_pdf_input() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let notes = write_fixture(temp.path(), "notes.txt", b"plain text");
    let script = write_fixture(temp.path(), "script.json", b"[]");

    cargo_bin_cmd!("pdf-annotator")
        .arg("annotate")
        .arg(&notes)
        .arg("--script")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Please upload a valid PDF file"));
}

#[test]
fn info_fails_for_missing_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    cargo_bin_cmd!("pdf-annotator")
        .arg("info")
        .arg(temp.path().join("missing.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn info_fails_for_invalid_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_fixture(temp.path(), "invalid.pdf", b"this is not a pdf");

    cargo_bin_cmd!("pdf-annotator")
        .arg("info")
        .arg(&pdf)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open PDF"));
}

#[test]
fn info_fails_for_encrypted_marker_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let mut bytes = blank_pdf(&[(100.0, 100.0)]);
    bytes.extend_from_slice(b"\n% /Encrypt marker\n");
    let pdf = write_fixture(temp.path(), "encrypted-marker.pdf", &bytes);

    cargo_bin_cmd!("pdf-annotator")
        .arg("info")
        .arg(&pdf)
        .assert()
        .failure()
        .stderr(predicate::str::contains("encrypted PDFs are not supported"));
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("pdf-annotator")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
