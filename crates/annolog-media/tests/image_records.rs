//! End-to-end behavior of image records, batches and reconstruction

use annolog_artifact::{Artifact, ContentHash, DirStore, MediaStore, StoreError};
use annolog_media::{
    AnnotationInput, ClassTable, ColorMode, ColumnSerializer, Image, ImageLoader, ImageMeta, ImageSource,
    MediaConfig, MediaError,
};
use annolog_test_utils::{
    encoded_rgb, gradient, memory_artifact, memory_run, png_bytes, raw_box_layer, raw_mask_layer,
    raw_unlabeled_box_layer, zeros,
};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn loader() -> ImageLoader {
    ImageLoader::new(MediaConfig::new()).unwrap()
}

fn annotated(loader: &ImageLoader) -> Image {
    let classes = [(1, "cat"), (2, "dog")];
    let input = AnnotationInput::new()
        .with_raw_box_layer("predictions", raw_box_layer(&classes))
        .with_raw_mask_layer("segmentation", raw_mask_layer(3, 3, &classes))
        .with_classes(ClassTable::new().with_class(0, "background"));
    loader
        .load_with(gradient(&[6, 8, 3]), ImageMeta::new().with_caption("scene").with_annotations(input))
        .unwrap()
}

#[test]
fn copy_carries_pixels_but_no_annotations() {
    let loader = loader();
    let original = annotated(&loader);
    assert_eq!(original.classes().map(ClassTable::len), Some(3));

    let copy = loader.load(&original).unwrap();
    assert!(copy.annotations().boxes().is_empty());
    assert!(copy.annotations().masks().is_empty());
    assert!(copy.classes().is_none());
    assert_eq!((copy.width(), copy.height()), (8, 6));
    assert_eq!(copy.to_data_array().unwrap(), original.to_data_array().unwrap());
}

#[test]
fn copy_can_be_given_new_annotations() {
    let loader = loader();
    let original = annotated(&loader);
    let meta = ImageMeta::new()
        .with_grouping("pair")
        .with_annotations(AnnotationInput::new().with_raw_box_layer("other", raw_unlabeled_box_layer(9)));
    let copy = loader.load_with(&original, meta).unwrap();
    assert_eq!(copy.grouping(), Some("pair"));
    assert_eq!(copy.caption(), Some("scene"));
    let layers: Vec<_> = copy.annotations().boxes().keys().cloned().collect();
    assert_eq!(layers, vec!["other".to_string()]);
}

#[test]
fn one_caption_in_three_keeps_all_positions() {
    let loader = loader();
    let images = vec![
        loader.load(zeros(&[4, 4])).unwrap(),
        loader.load_with(zeros(&[4, 4]), ImageMeta::new().with_caption("middle")).unwrap(),
        loader.load(zeros(&[4, 4])).unwrap(),
    ];
    let (run, _) = memory_run("run");
    let batch = ColumnSerializer::default()
        .serialize(&images, &run.step("frames", 5))
        .unwrap();

    assert_eq!(
        batch.payload.captions,
        Some(vec![None, Some("middle".to_string()), None])
    );
    let value = serde_json::to_value(&batch.payload).unwrap();
    assert_eq!(value["captions"], json!([null, "middle", null]));
    assert_eq!(value["_type"], json!("images/separated"));
    assert_eq!(value["count"], json!(3));
    assert!(value.get("all_boxes").is_none());
}

#[test]
fn size_mismatch_is_a_warning() {
    let loader = loader();
    let images = vec![
        loader.load(zeros(&[4, 4, 3])).unwrap(),
        loader.load(zeros(&[2, 3, 3])).unwrap(),
    ];
    let (run, _) = memory_run("run");
    let batch = ColumnSerializer::default()
        .serialize(&images, &run.step("frames", 0))
        .unwrap();
    assert_eq!((batch.payload.width, batch.payload.height), (4, 4));
    assert_eq!(batch.payload.count, 2);
    assert_eq!(batch.warnings.len(), 1);
}

#[test]
fn foreign_media_dir_breaks_layout() {
    let loader = loader();
    let images = vec![loader.load(zeros(&[2, 2])).unwrap()];
    let (run, _) = memory_run("run");
    let run = run.with_media_dir("exports".parse().unwrap());

    let err = ColumnSerializer::default()
        .serialize(&images, &run.step("frames", 0))
        .unwrap_err();
    match err {
        MediaError::InvalidLayout { expected, actual } => {
            assert_eq!(expected, "media/images");
            assert!(actual.starts_with("exports/images/frames_0_"), "{actual}");
        }
        other => panic!("expected InvalidLayout, got {other:?}"),
    }
}

#[test]
fn media_root_follows_the_destination() {
    let loader = loader();
    let images = vec![loader.load(zeros(&[2, 2])).unwrap(), loader.load(zeros(&[2, 2])).unwrap()];
    let serializer = ColumnSerializer::new(MediaConfig::new().with_media_root("assets"));

    let artifact = memory_artifact("dataset").with_media_dir("assets".parse().unwrap());
    let batch = serializer.serialize(&images, &artifact).unwrap();
    assert_eq!(batch.payload.count, 2);
    assert!(!artifact.is_empty());
    assert!(artifact
        .entries()
        .iter()
        .all(|e| e.path.to_string().starts_with("assets/images/")));

    assert!(matches!(
        serializer.serialize(&images, &memory_artifact("dataset")),
        Err(MediaError::InvalidLayout { .. })
    ));
}

#[test]
fn artifacts_need_classes_runs_do_not() {
    let loader = loader();
    let image = loader
        .load_with(
            zeros(&[3, 3]),
            ImageMeta::new().with_annotations(AnnotationInput::new().with_raw_box_layer("b", raw_unlabeled_box_layer(1))),
        )
        .unwrap();
    assert!(image.classes().is_none());

    let artifact = memory_artifact("dataset");
    assert!(matches!(
        image.to_payload(&artifact),
        Err(MediaError::MissingClassTable)
    ));
    assert!(artifact.is_empty());

    let (run, _) = memory_run("run");
    let payload = image.to_payload(&run.step("k", 0)).unwrap();
    let value = serde_json::to_value(&payload).unwrap();
    assert!(value.get("classes").is_none());
    assert_eq!(value["boxes"]["b"]["_type"], json!("boxes2D-file"));
}

#[test]
fn artifact_payload_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = Artifact::new("dataset", Arc::new(DirStore::new(dir.path())));
    let loader = loader();
    let image = annotated(&loader);

    let payload = image.to_payload(&artifact).unwrap();
    let classes = payload.classes.as_ref().unwrap();
    assert_eq!(classes.kind, "classes-file");
    assert!(classes.path.to_string().starts_with("media/classes/"));
    assert!(classes.path.to_string().ends_with("_cls"));
    assert_eq!(payload.masks.as_ref().unwrap()["segmentation"].format, "png");

    let back = loader.reconstruct(&payload, &artifact).unwrap();
    assert_eq!(back, image);
    assert_eq!(back.caption(), Some("scene"));
    assert_eq!(back.describe().box_layers, image.describe().box_layers);
    assert_eq!(back.describe().class_map, image.describe().class_map);
    let mask = &back.annotations().masks()["segmentation"];
    assert_eq!(mask.key(), "segmentation");
    assert!(mask.class_labels().is_none());
    assert_eq!(
        mask.mask_data(),
        image.annotations().masks()["segmentation"].mask_data()
    );
}

#[test]
fn altered_content_is_detected_on_reconstruction() {
    let loader = loader();
    let (run, store) = memory_run("run");
    let mut payload = loader.load(zeros(&[2, 2])).unwrap().to_payload(&run.step("k", 1)).unwrap();
    payload.digest = ContentHash::compute(b"something else");

    let err = loader.reconstruct(&payload, store.as_ref()).unwrap_err();
    assert!(matches!(
        err,
        MediaError::Store(StoreError::DigestMismatch { .. })
    ));
}

#[test]
fn missing_content_is_reported() {
    let loader = loader();
    let (run, _) = memory_run("run");
    let payload = loader.load(zeros(&[2, 2])).unwrap().to_payload(&run.step("k", 1)).unwrap();
    let (_, empty) = memory_run("other");
    assert!(!empty.contains(&payload.path));
    assert!(matches!(
        loader.reconstruct(&payload, empty.as_ref()),
        Err(MediaError::Store(StoreError::NotFound(_)))
    ));
}

#[test]
fn mode_follows_array_shape() {
    let loader = loader();
    for (shape, channels) in [(vec![10, 10], 1), (vec![10, 10, 3], 3), (vec![10, 10, 4], 4)] {
        let image = loader.load(zeros(&shape)).unwrap();
        assert_eq!(image.pixels().unwrap().color().channel_count(), channels);
    }
    match loader.load(zeros(&[10, 10, 5])) {
        Err(MediaError::UnsupportedShape { shape }) => assert_eq!(shape, vec![10, 10, 5]),
        other => panic!("expected UnsupportedShape, got {other:?}"),
    }
}

#[test]
fn explicit_mode_must_fit_the_channels() {
    let loader = loader();
    let image = loader
        .load(ImageSource::array_with_mode(gradient(&[2, 3, 4]), ColorMode::Rgba))
        .unwrap();
    assert_eq!(image.pixels().unwrap().color().channel_count(), 4);
    assert_eq!(image.to_data_array().unwrap()[1][2].len(), 4);

    match loader.load(ImageSource::array_with_mode(zeros(&[2, 3, 4]), ColorMode::Rgb)) {
        Err(MediaError::UnsupportedShape { shape }) => assert_eq!(shape, vec![2, 3, 4]),
        other => panic!("expected UnsupportedShape, got {other:?}"),
    }
}

#[test]
fn oversized_images_still_load() {
    let loader = ImageLoader::new(MediaConfig::new().with_max_dimension(4)).unwrap();
    let image = loader.load(zeros(&[3, 9])).unwrap();
    assert_eq!((image.width(), image.height()), (9, 3));
}

#[test]
fn degenerate_axes_are_squeezed() {
    let image = loader().load(zeros(&[1, 5, 7, 1])).unwrap();
    assert_eq!((image.width(), image.height()), (7, 5));
}

#[test]
fn file_path_keeps_its_own_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    std::fs::write(&path, png_bytes(5, 3, [10, 20, 30])).unwrap();

    let image = loader().load(path.as_path()).unwrap();
    assert_eq!(image.format(), "png");
    assert!(!image.file().is_tmp);
    assert_eq!((image.width(), image.height()), (5, 3));
    let rows = image.to_data_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row.len() == 5));
    assert_eq!(rows[2][4], vec![10, 20, 30]);

    let jpeg = dir.path().join("frame.JPG");
    std::fs::write(&jpeg, encoded_rgb(4, 4, [200, 200, 200], ImageFormat::Jpeg)).unwrap();
    let image = loader().load(jpeg).unwrap();
    assert_eq!(image.format(), "jpg");
    assert_eq!((image.width(), image.height()), (4, 4));
}

#[test]
fn unknown_codecs_are_missing_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["frame.xyz", "frame.tiff"] {
        let path = dir.path().join(name);
        std::fs::write(&path, png_bytes(2, 2, [0, 0, 0])).unwrap();
        assert!(
            matches!(loader().load(path), Err(MediaError::MissingDependency(_))),
            "{name} should need a missing codec"
        );
    }
}

#[test]
fn encoded_and_decoded_sources_become_png() {
    let loader = loader();
    let encoded = ImageSource::Encoded {
        bytes: encoded_rgb(6, 2, [1, 2, 3], ImageFormat::Jpeg),
        extension: "jpg".to_string(),
    };
    let image = loader.load(encoded).unwrap();
    assert_eq!(image.format(), "png");
    assert!(image.file().is_tmp);
    assert_eq!((image.width(), image.height()), (6, 2));

    let wide = DynamicImage::ImageRgb16(ImageBuffer::from_pixel(2, 2, Rgb([u16::MAX, 0, 0])));
    let image = loader.load(wide).unwrap();
    assert_eq!(image.to_data_array().unwrap(), vec![vec![vec![255, 0, 0]; 2]; 2]);
}

#[test]
fn scratch_dir_from_config_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let loader = ImageLoader::new(MediaConfig::new().with_scratch_dir(dir.path())).unwrap();
    let image = loader.load(zeros(&[2, 2])).unwrap();
    assert!(image.file().path.starts_with(dir.path()));
}

#[test]
fn images_outlive_their_loader() {
    let image = {
        let loader = loader();
        loader.load(gradient(&[3, 3])).unwrap()
    };
    assert!(!image.is_loaded());
    let rows = image.to_data_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].len(), 3);
}

#[test]
fn empty_caption_is_not_serialized() {
    let image = loader()
        .load_with(zeros(&[2, 2]), ImageMeta::new().with_caption("").with_grouping(""))
        .unwrap();
    let (run, store) = memory_run("run");
    let payload = image.to_payload(&run.step("k", 2)).unwrap();
    assert!(payload.caption.is_none());
    assert!(payload.grouping.is_none());
    assert!(store.contains(&payload.path));
    assert_eq!(payload.size, image.file().size);
}
