//! Background removal: area gate and the single-mask cut-out path

mod common;

use cutout::{
    backends::MockSaliencyModel,
    error::{CutoutError, Result},
    BackgroundRemover, PipelineConfig, PipelineVariant, SaliencyModel,
};
use image::RgbImage;
use tempfile::TempDir;

#[test]
fn test_area_gate_boundary() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = common::write_test_image(temp_dir.path(), "square.png", 320, 320);
    let mut remover = BackgroundRemover::default();
    remover.preprocess(&input)?;

    let rejected = temp_dir.path().join("rejected.png");
    let err = remover
        .postprocess(&common::leading_foreground_mask(320, 5000), &rejected)
        .unwrap_err();
    assert!(matches!(
        err,
        CutoutError::BelowAreaThreshold {
            foreground: 5000,
            threshold: 5120
        }
    ));
    assert!(!rejected.exists());

    let accepted = temp_dir.path().join("accepted.png");
    remover.postprocess(&common::leading_foreground_mask(320, 5200), &accepted)?;
    assert!(accepted.exists());
    Ok(())
}

#[test]
fn test_gate_ignores_padding_rows() -> Result<()> {
    let mut remover = BackgroundRemover::default();
    // 640x320 resizes to 320x160: rows 160.. of the model mask are padding
    let tensor = remover.preprocess_image(RgbImage::from_pixel(640, 320, image::Rgb([5, 5, 5])))?;
    assert_eq!(tensor.resized_size().dimensions(), (320, 160));

    let mut raw = vec![0.0f32; 320 * 320];
    for value in raw.iter_mut().skip(200 * 320) {
        *value = 1.0;
    }
    let err = remover.mask(&raw).unwrap_err();
    assert!(matches!(
        err,
        CutoutError::BelowAreaThreshold { foreground: 0, .. }
    ));
    Ok(())
}

#[test]
fn test_flat_mask_is_rejected() -> Result<()> {
    let mut remover = BackgroundRemover::default();
    remover.preprocess_image(RgbImage::new(100, 100))?;
    let err = remover.mask(&vec![0.7; 320 * 320]).unwrap_err();
    assert!(err.is_no_content());
    Ok(())
}

#[test]
fn test_small_object_is_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = common::write_test_image(temp_dir.path(), "photo.png", 500, 500);
    let output = temp_dir.path().join("cutout.png");

    let mut remover = BackgroundRemover::default();
    // pi * 20^2 is far below the gate
    let mut model = MockSaliencyModel::new(320, 20.0);
    let err = remover.remove_with(&mut model, &input, &output).unwrap_err();
    assert!(err.is_no_content());
    assert!(!output.exists());
    Ok(())
}

#[test]
fn test_remove_with_landscape_image() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = common::write_test_image(temp_dir.path(), "wide.png", 900, 600);
    let output = temp_dir.path().join("nested").join("cutout.png");

    let mut remover = BackgroundRemover::default();
    let mut model = MockSaliencyModel::new(320, 60.0);
    remover.remove_with(&mut model, &input, &output)?;

    let written = image::open(&output)?.to_rgba8();
    // 120 model pixels across, scaled by 900 / 320
    assert!(
        written.width() > 325 && written.width() < 350,
        "width {}",
        written.width()
    );
    assert!(written.pixels().any(|p| p[3] == 0));
    assert!(written.pixels().any(|p| p[3] == 255));
    Ok(())
}

#[test]
fn test_model_size_must_match_config() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = common::write_test_image(temp_dir.path(), "photo.png", 64, 64);
    let output = temp_dir.path().join("cutout.png");

    let mut remover = BackgroundRemover::new(PipelineConfig::for_variant(
        PipelineVariant::BackgroundRemoval,
    ))?;
    let mut model = MockSaliencyModel::new(160, 40.0);
    assert_eq!(model.mask_size(), 160);
    let err = remover.remove_with(&mut model, &input, &output).unwrap_err();
    assert!(matches!(err, CutoutError::InvalidConfig(_)));
    assert!(!remover.has_image());
    Ok(())
}
