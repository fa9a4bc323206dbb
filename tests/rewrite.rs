//! End-to-end rewrites with the real `image`-crate codec.
//!
//! Every test builds a throwaway source root with synthetic images, rewrites
//! a small HTML snippet, and inspects both the rewritten text and the
//! artifacts written to the temp directory.

use htmlimg::config::Config;
use htmlimg::pipeline::{Pipeline, PipelineEvent, PipelineStats, Rewrite};
use htmlimg::plan::OperatingMode;
use htmlimg::session::Session;
use image::{GenericImageView, ImageFormat, RgbImage, RgbaImage};
use rayon::prelude::*;
use std::path::Path;
use std::sync::mpsc;
use tempfile::TempDir;

fn source_tree() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let img = tmp.path().join("img");
    std::fs::create_dir_all(&img).unwrap();
    RgbImage::from_fn(400, 300, |x, y| image::Rgb([(x % 256) as u8, (y % 256) as u8, 90]))
        .save_with_format(img.join("photo.jpg"), ImageFormat::Jpeg)
        .unwrap();
    RgbaImage::from_pixel(16, 16, image::Rgba([0, 0, 255, 0]))
        .save_with_format(img.join("clear.png"), ImageFormat::Png)
        .unwrap();
    tmp
}

fn pipeline(root: &Path, config: &Config, interactive: bool) -> Pipeline {
    let session = Session::open(root, &config.temp_dir, interactive).unwrap();
    Pipeline::new(session, config).unwrap()
}

fn rewrite(p: &Pipeline, html: &str) -> (String, PipelineStats) {
    match p.rewrite(html, None).unwrap() {
        Rewrite::Rewritten { html, stats } => (html, stats),
        Rewrite::Unchanged => panic!("expected a rewrite for {html}"),
    }
}

fn sniff(path: &Path) -> ImageFormat {
    image::ImageReader::open(path)
        .unwrap()
        .with_guessed_format()
        .unwrap()
        .format()
        .unwrap()
}

// =========================================================================
// Resize
// =========================================================================

#[test]
fn width_produces_resized_artifact() {
    let tmp = source_tree();
    let p = pipeline(tmp.path(), &Config::default(), false);

    let (html, stats) = rewrite(&p, r#"<img src="img/photo.jpg?width=100">"#);

    assert_eq!(html, r#"<img src=".img/photo.w100.jpg">"#);
    assert_eq!(stats.generated, 1);
    let out = tmp.path().join(".img/photo.w100.jpg");
    assert_eq!(image::open(&out).unwrap().dimensions(), (100, 75));
    assert_eq!(sniff(&out), ImageFormat::Jpeg);
}

#[test]
fn width_and_height_crop_to_fill() {
    let tmp = source_tree();
    let p = pipeline(tmp.path(), &Config::default(), false);

    let (html, _) = rewrite(&p, r#"<img src="/img/photo.jpg?width=50&height=50">"#);

    assert_eq!(html, r#"<img src=".img/photo.w50.h50.jpg">"#);
    let out = tmp.path().join(".img/photo.w50.h50.jpg");
    assert_eq!(image::open(out).unwrap().dimensions(), (50, 50));
}

#[test]
fn reference_without_parameters_is_untouched() {
    let tmp = source_tree();
    let p = pipeline(tmp.path(), &Config::default(), false);
    let input = r#"<img src="img/photo.jpg" alt="photo">"#;

    let (html, stats) = rewrite(&p, input);

    assert_eq!(html, input);
    assert_eq!(stats.generated, 0);
    assert_eq!(std::fs::read_dir(tmp.path().join(".img")).unwrap().count(), 0);
}

#[test]
fn text_without_references_is_unchanged() {
    let tmp = source_tree();
    let p = pipeline(tmp.path(), &Config::default(), false);
    assert_eq!(
        p.rewrite("<p>plain</p>", None).unwrap(),
        Rewrite::Unchanged
    );
}

// =========================================================================
// Format, quality, background
// =========================================================================

#[test]
fn format_conversion_to_webp() {
    let tmp = source_tree();
    let p = pipeline(tmp.path(), &Config::default(), false);

    let (html, _) = rewrite(&p, r#"<img src="img/photo.jpg?format=webp&width=40">"#);

    assert_eq!(html, r#"<img src=".img/photo.w40.webp">"#);
    assert_eq!(sniff(&tmp.path().join(".img/photo.w40.webp")), ImageFormat::WebP);
}

#[test]
fn jpeg_quality_fragments() {
    let tmp = source_tree();
    let p = pipeline(tmp.path(), &Config::default(), false);

    let (html, _) = rewrite(
        &p,
        concat!(
            r#"<img src="img/photo.jpg?quality=60">"#,
            r#"<img src="img/photo.jpg?format=jpeg">"#,
            r#"<img src="img/photo.jpg?quality=75&width=20">"#,
        ),
    );

    assert_eq!(
        html,
        concat!(
            r#"<img src=".img/photo.q60.jpg">"#,
            r#"<img src=".img/photo.q81.jpeg">"#,
            r#"<img src=".img/photo.w20.jpg">"#,
        )
    );
}

#[test]
fn jpg_alias_keeps_extension() {
    let tmp = source_tree();
    let p = pipeline(tmp.path(), &Config::default(), false);

    let (html, _) = rewrite(&p, r#"<img src="img/clear.png?format=jpg">"#);

    assert_eq!(html, r#"<img src=".img/clear.q81.jpg">"#);
    assert_eq!(sniff(&tmp.path().join(".img/clear.q81.jpg")), ImageFormat::Jpeg);
}

#[test]
fn background_flattens_transparency() {
    let tmp = source_tree();
    let p = pipeline(tmp.path(), &Config::default(), false);

    let (html, _) = rewrite(&p, r#"<img src="img/clear.png?background=f00">"#);

    assert_eq!(html, r#"<img src=".img/clear.xff0000.png">"#);
    let out = image::open(tmp.path().join(".img/clear.xff0000.png")).unwrap();
    let pixel = out.get_pixel(8, 8);
    assert_eq!(pixel.0[..3], [255, 0, 0]);
    assert_eq!(pixel.0[3], 255);
}

#[test]
fn background_on_opaque_source_keeps_pixels() {
    let tmp = source_tree();
    let p = pipeline(tmp.path(), &Config::default(), false);

    let (html, stats) = rewrite(&p, r#"<img src="img/photo.jpg?background=fff&format=png">"#);

    assert_eq!(html, r#"<img src=".img/photo.xffffff.png">"#);
    assert_eq!(stats.generated, 1);
    let source = image::open(tmp.path().join("img/photo.jpg")).unwrap();
    let out = image::open(tmp.path().join(".img/photo.xffffff.png")).unwrap();
    assert_eq!(out.dimensions(), (400, 300));
    assert_eq!(out.to_rgb8().get_pixel(10, 10), source.to_rgb8().get_pixel(10, 10));
}

#[test]
fn encoded_separator_cannot_leave_source_root() {
    let outer = TempDir::new().unwrap();
    let root = outer.path().join("site");
    std::fs::create_dir_all(root.join("img")).unwrap();
    RgbImage::from_pixel(20, 20, image::Rgb([1, 2, 3]))
        .save_with_format(outer.path().join("secret.jpg"), ImageFormat::Jpeg)
        .unwrap();
    let p = pipeline(&root, &Config::default(), false);
    let input = r#"<img src="img/..%2F..%2Fsecret.jpg?width=10">"#;
    let (tx, rx) = mpsc::channel();

    let result = p.rewrite(input, Some(&tx)).unwrap();
    drop(tx);

    let Rewrite::Rewritten { html, stats } = result else {
        panic!("expected a rewrite");
    };
    assert_eq!(html, input);
    assert_eq!(stats.generated, 0);
    assert!(rx.into_iter().any(|e| matches!(e, PipelineEvent::Malformed(_))));
    assert!(!root.join(".img/secret.w10.jpg").exists());
}

#[test]
fn invalid_parameters_are_reported() {
    let tmp = source_tree();
    let p = pipeline(tmp.path(), &Config::default(), false);
    let (tx, rx) = mpsc::channel();

    let result = p
        .rewrite(r#"<img src="img/photo.jpg?width=big&format=bmp&height=30">"#, Some(&tx))
        .unwrap();
    drop(tx);
    let warnings = rx
        .into_iter()
        .filter(|e| matches!(e, PipelineEvent::Warning { .. }))
        .count();

    let Rewrite::Rewritten { html, .. } = result else {
        panic!("expected a rewrite");
    };
    assert_eq!(html, r#"<img src=".img/photo.h30.q81.jpg">"#);
    assert_eq!(warnings, 2);
}

// =========================================================================
// Caching
// =========================================================================

#[test]
fn existing_artifact_is_reused() {
    let tmp = source_tree();
    std::fs::create_dir_all(tmp.path().join(".img")).unwrap();
    std::fs::write(tmp.path().join(".img/photo.w100.jpg"), b"stale bytes").unwrap();
    let p = pipeline(tmp.path(), &Config::default(), false);

    let (html, stats) = rewrite(&p, r#"<img src="img/photo.jpg?width=100">"#);

    assert_eq!(html, r#"<img src=".img/photo.w100.jpg">"#);
    assert_eq!(stats.generated, 0);
    assert_eq!(
        std::fs::read(tmp.path().join(".img/photo.w100.jpg")).unwrap(),
        b"stale bytes"
    );
}

#[test]
fn concurrent_documents_generate_once() {
    let tmp = source_tree();
    let p = pipeline(tmp.path(), &Config::default(), false);
    let docs: Vec<String> = (0..8)
        .map(|i| format!("<h1>{i}</h1><img src=\"img/photo.jpg?width=64&format=png\">"))
        .collect();

    let outputs: Vec<(String, PipelineStats)> = docs.par_iter().map(|d| rewrite(&p, d)).collect();

    let generated: usize = outputs.iter().map(|(_, s)| s.generated).sum();
    assert_eq!(generated, 1);
    for (html, _) in &outputs {
        assert!(html.contains(r#"src=".img/photo.w64.png""#));
    }
    assert_eq!(p.cache().len(), 1);
}

#[test]
fn undecodable_source_leaves_reference() {
    let tmp = source_tree();
    std::fs::write(tmp.path().join("img/broken.jpg"), b"not an image").unwrap();
    let p = pipeline(tmp.path(), &Config::default(), false);
    let input = r#"<img src="img/broken.jpg?width=10">"#;
    let (tx, rx) = mpsc::channel();

    let result = p.rewrite(input, Some(&tx)).unwrap();
    drop(tx);

    let Rewrite::Rewritten { html, stats } = result else {
        panic!("expected a rewrite");
    };
    assert_eq!(html, input);
    assert_eq!(stats.generated, 0);
    assert!(rx.into_iter().any(|e| matches!(e, PipelineEvent::Failed { .. })));
    assert_eq!(std::fs::read_dir(tmp.path().join(".img")).unwrap().count(), 0);
}

// =========================================================================
// Session and modes
// =========================================================================

#[test]
fn skip_mode_in_dev_points_at_originals() {
    let tmp = source_tree();
    let config = Config {
        mode: OperatingMode::Skip,
        ..Config::default()
    };
    let p = pipeline(tmp.path(), &config, true);

    let (html, stats) = rewrite(&p, r#"<img src="/img/photo.jpg?width=100">"#);

    assert_eq!(html, r#"<img src="/img/photo.jpg">"#);
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.generated, 0);
}

#[test]
fn custom_temp_dir_prefixes_references() {
    let tmp = source_tree();
    let config = Config {
        temp_dir: "build/images".into(),
        ..Config::default()
    };
    let p = pipeline(tmp.path(), &config, false);

    let (html, _) = rewrite(&p, r#"<img src="img/photo.jpg?height=30">"#);

    assert_eq!(html, r#"<img src="build/images/photo.h30.jpg">"#);
    assert!(tmp.path().join("build/images/photo.h30.jpg").exists());
}

#[test]
fn closing_session_removes_artifacts() {
    let tmp = source_tree();
    let p = pipeline(tmp.path(), &Config::default(), true);
    rewrite(&p, r#"<img src="img/photo.jpg?width=10">"#);
    assert!(tmp.path().join(".img/photo.w10.jpg").exists());

    assert!(p.session().close().unwrap());
    assert!(!tmp.path().join(".img").exists());
    assert!(tmp.path().join("img/photo.jpg").exists());
}
