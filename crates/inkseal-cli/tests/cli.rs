use std::path::{Path, PathBuf};

use assert_cmd::Command;
use image::{Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use predicates::prelude::*;
use tempfile::TempDir;

fn inkseal(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("inkseal").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.join("config"))
        .env("HOME", home);
    cmd
}

fn write_png(dir: &Path, name: &str, width: u32, height: u32, color: [u8; 4]) -> PathBuf {
    let path = dir.join(name);
    RgbaImage::from_pixel(width, height, Rgba(color))
        .save(&path)
        .unwrap();
    path
}

fn write_pdf(dir: &Path, name: &str, pages: usize) -> PathBuf {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for i in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Page {}", i + 1))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            lopdf::Dictionary::new(),
            content.encode().unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let path = dir.join(name);
    doc.save(&path).unwrap();
    path
}

fn has_xobject(doc: &Document, page_id: lopdf::ObjectId) -> bool {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return false;
    };
    let resources = match page.get(b"Resources") {
        Ok(Object::Dictionary(dict)) => Some(dict),
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok(),
        _ => None,
    };
    resources.is_some_and(|r| r.has(b"XObject"))
}

fn page_count(path: &Path) -> usize {
    Document::load(path).unwrap().get_pages().len()
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    inkseal(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("signature"))
        .stdout(predicate::str::contains("watermark"))
        .stdout(predicate::str::contains("merge"));
}

#[test]
fn test_info_png_as_json() {
    let dir = TempDir::new().unwrap();
    let png = write_png(dir.path(), "page.png", 120, 80, [255, 255, 255, 255]);

    inkseal(dir.path())
        .args(["info", "--json"])
        .arg(&png)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"kind\": \"raster\""))
        .stdout(predicate::str::contains("\"pageCount\": 1"))
        .stdout(predicate::str::contains("\"width\": 120.0"));
}

#[test]
fn test_info_rejects_unknown_extension() {
    let dir = TempDir::new().unwrap();
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, "hello").unwrap();

    inkseal(dir.path())
        .arg("info")
        .arg(&notes)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported file format"));
}

#[test]
fn test_apply_overlay_to_png() {
    let dir = TempDir::new().unwrap();
    let target = write_png(dir.path(), "target.png", 100, 100, [255, 255, 255, 255]);
    let overlay = write_png(dir.path(), "stamp.png", 10, 10, [255, 0, 0, 255]);
    let output = dir.path().join("out").join("stamped.png");

    inkseal(dir.path())
        .arg("apply")
        .arg(&target)
        .arg("--overlay")
        .arg(&overlay)
        .args(["-x", "10", "-y", "20", "-W", "30", "-H", "30", "-o"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Output written"));

    let result = image::open(&output).unwrap().to_rgba8();
    assert_eq!(result.dimensions(), (100, 100));
    assert_eq!(result.get_pixel(20, 30).0, [255, 0, 0, 255]);
    assert_eq!(result.get_pixel(5, 5).0, [255, 255, 255, 255]);
}

#[test]
fn test_apply_overlay_to_selected_pdf_pages() {
    let dir = TempDir::new().unwrap();
    let pdf = write_pdf(dir.path(), "contract.pdf", 3);
    let overlay = write_png(dir.path(), "stamp.png", 8, 8, [0, 0, 255, 200]);
    let output = dir.path().join("signed.pdf");

    inkseal(dir.path())
        .arg("apply")
        .arg(&pdf)
        .arg("--overlay")
        .arg(&overlay)
        .args(["-x", "50", "-y", "50", "-W", "100", "-H", "40", "-p", "2", "-o"])
        .arg(&output)
        .assert()
        .success();

    let doc = Document::load(&output).unwrap();
    let pages = doc.get_pages();
    assert_eq!(pages.len(), 3);
    let stamped: Vec<u32> = pages
        .iter()
        .filter(|(_, id)| has_xobject(&doc, **id))
        .map(|(n, _)| *n)
        .collect();
    assert_eq!(stamped, vec![2]);
}

#[test]
fn test_merge_then_split() {
    let dir = TempDir::new().unwrap();
    let first = write_pdf(dir.path(), "a.pdf", 1);
    let second = write_pdf(dir.path(), "b.pdf", 2);
    let merged = dir.path().join("merged.pdf");

    inkseal(dir.path())
        .arg("merge")
        .arg(&first)
        .arg(&second)
        .arg("-o")
        .arg(&merged)
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged 2 documents"));
    assert_eq!(page_count(&merged), 3);

    let parts = dir.path().join("parts");
    inkseal(dir.path())
        .arg("split")
        .arg(&merged)
        .args(["-r", "1-2", "-r", "3", "-d"])
        .arg(&parts)
        .assert()
        .success();

    assert_eq!(page_count(&parts.join("merged_pages_1-2.pdf")), 2);
    assert_eq!(page_count(&parts.join("merged_pages_3-3.pdf")), 1);
}

#[test]
fn test_merge_rejects_raster_input() {
    let dir = TempDir::new().unwrap();
    let pdf = write_pdf(dir.path(), "a.pdf", 1);
    let png = write_png(dir.path(), "b.png", 4, 4, [0, 0, 0, 255]);

    inkseal(dir.path())
        .arg("merge")
        .arg(&pdf)
        .arg(&png)
        .arg("-o")
        .arg(dir.path().join("merged.pdf"))
        .assert()
        .failure();
}

#[test]
fn test_image_watermark_written() {
    let dir = TempDir::new().unwrap();
    let logo = write_png(dir.path(), "logo.png", 400, 200, [10, 20, 30, 255]);
    let output = dir.path().join("wm.png");

    inkseal(dir.path())
        .args(["watermark", "-o"])
        .arg(&output)
        .arg("image")
        .arg(&logo)
        .args(["--opacity", "0.5", "--max-width", "100"])
        .assert()
        .success();

    let watermark = image::open(&output).unwrap().to_rgba8();
    assert_eq!(watermark.dimensions(), (100, 50));
    assert_eq!(watermark.get_pixel(50, 25).0[3], 127);
}

#[test]
fn test_image_watermark_rejects_bad_opacity() {
    let dir = TempDir::new().unwrap();
    let logo = write_png(dir.path(), "logo.png", 20, 20, [10, 20, 30, 255]);

    inkseal(dir.path())
        .args(["watermark", "image"])
        .arg(&logo)
        .args(["--opacity", "1.5"])
        .assert()
        .failure();
}

#[test]
fn test_signature_produces_transparent_png() {
    let dir = TempDir::new().unwrap();
    let mut photo = RgbaImage::from_pixel(200, 100, Rgba([250, 250, 250, 255]));
    for x in 40..160 {
        for y in 45..55 {
            photo.put_pixel(x, y, Rgba([10, 10, 10, 255]));
        }
    }
    let input = dir.path().join("sig.png");
    photo.save(&input).unwrap();

    inkseal(dir.path())
        .arg("signature")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("sig_signature.png"));

    let output = image::open(dir.path().join("sig_signature.png"))
        .unwrap()
        .to_rgba8();
    assert!(output.width() < 200);
    assert_eq!(output.get_pixel(0, 0).0[3], 0);
}

#[test]
fn test_config_set_and_get() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("inkseal.json");

    inkseal(dir.path())
        .arg("-c")
        .arg(&config)
        .args(["config", "set", "watermark.default_color", "#336699"])
        .assert()
        .success();
    assert!(config.exists());

    inkseal(dir.path())
        .arg("-c")
        .arg(&config)
        .args(["config", "get", "watermark.default_color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#336699"));

    inkseal(dir.path())
        .arg("-c")
        .arg(&config)
        .args(["config", "set", "watermark.nonexistent", "1"])
        .assert()
        .failure();
}

#[test]
fn test_config_path_uses_config_dir() {
    let dir = TempDir::new().unwrap();
    inkseal(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("inkseal"))
        .stdout(predicate::str::contains("not created"));
}
