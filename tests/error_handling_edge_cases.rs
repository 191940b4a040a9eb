//! Error paths: state violations, malformed buffers and bad inputs

mod common;

use cutout::{
    backends::{MockDecoder, MockEncoder},
    error::{CutoutError, Result},
    BackgroundRemover, FeatureTensor, PipelineConfig, PromptLabel, PromptPoint, SegmentSession,
    SessionPhase,
};
use image::RgbImage;
use ndarray::Array4;
use tempfile::TempDir;

fn session_with_features() -> Result<SegmentSession> {
    let mut session = SegmentSession::default();
    let tensor = session.preprocess_image(RgbImage::from_pixel(80, 60, image::Rgb([9, 9, 9])))?;
    session.encode_with(&mut MockEncoder::new(1024), &tensor)?;
    Ok(session)
}

#[test]
fn test_operations_before_preprocess_are_state_violations() {
    let mut session = SegmentSession::default();

    let features = FeatureTensor::new(Array4::zeros(FeatureTensor::SHAPE)).unwrap();
    assert!(session.set_features(features).unwrap_err().is_state_violation());
    assert!(session
        .add_prompt(PromptPoint::new(1, 1), PromptLabel::FOREGROUND)
        .unwrap_err()
        .is_state_violation());
    assert!(session.pop_prompt().unwrap_err().is_state_violation());
    assert!(session.transform_prompts().unwrap_err().is_state_violation());
    assert!(session.postprocess(&[0.5], &vec![1.0; 256 * 256]).unwrap_err().is_state_violation());
    assert!(session.mask().unwrap_err().is_state_violation());
    assert!(session.sticker().unwrap_err().is_state_violation());
    assert_eq!(session.phase(), SessionPhase::Empty);
}

#[test]
fn test_postprocess_requires_features() -> Result<()> {
    let mut session = SegmentSession::default();
    session.preprocess_image(RgbImage::new(32, 32))?;
    session.add_prompt(PromptPoint::new(4, 4), PromptLabel::FOREGROUND)?;

    let err = session.postprocess(&[0.5], &vec![1.0; 256 * 256]).unwrap_err();
    assert!(matches!(
        err,
        CutoutError::InvalidState {
            phase: "image-set",
            ..
        }
    ));
    assert_eq!(session.phase(), SessionPhase::ImageSet);
    Ok(())
}

#[test]
fn test_pop_on_empty_prompt_list() -> Result<()> {
    let mut session = session_with_features()?;
    assert!(matches!(session.pop_prompt(), Err(CutoutError::EmptyPrompts)));
    assert_eq!(session.count_prompts(), 0);
    Ok(())
}

#[test]
fn test_mismatched_mask_buffer_keeps_phase() -> Result<()> {
    let mut session = session_with_features()?;

    // Two scores but a single plane
    let err = session
        .postprocess(&[0.4, 0.6], &vec![1.0; 256 * 256])
        .unwrap_err();
    assert!(matches!(err, CutoutError::InvalidTensor(_)));
    assert_eq!(session.phase(), SessionPhase::FeaturesReady);

    let err = session.postprocess(&[], &[]).unwrap_err();
    assert!(matches!(err, CutoutError::InvalidTensor(_)));
    assert_eq!(session.phase(), SessionPhase::FeaturesReady);
    Ok(())
}

#[test]
fn test_engine_size_mismatch_is_config_error() -> Result<()> {
    let mut session = SegmentSession::default();
    let tensor = session.preprocess_image(RgbImage::new(16, 16))?;

    let err = session
        .encode_with(&mut MockEncoder::new(512), &tensor)
        .unwrap_err();
    assert!(matches!(err, CutoutError::InvalidConfig(_)));
    assert_eq!(session.phase(), SessionPhase::ImageSet);

    session.encode_with(&mut MockEncoder::new(1024), &tensor)?;
    session.add_prompt(PromptPoint::new(8, 8), PromptLabel::FOREGROUND)?;
    let mut decoder =
        MockDecoder::with_candidates(1024, 128, vec![10.0], vec![1.0]);
    let err = session.decode_with(&mut decoder).unwrap_err();
    assert!(matches!(err, CutoutError::InvalidConfig(_)));
    assert_eq!(session.phase(), SessionPhase::FeaturesReady);
    Ok(())
}

#[test]
fn test_new_features_discard_previous_mask() -> Result<()> {
    let mut session = session_with_features()?;
    session.add_prompt(PromptPoint::new(40, 30), PromptLabel::FOREGROUND)?;
    session.decode_with(&mut MockDecoder::new(1024))?;
    assert_eq!(session.phase(), SessionPhase::MaskAvailable);

    session.set_features(FeatureTensor::new(Array4::zeros(FeatureTensor::SHAPE))?)?;
    assert_eq!(session.phase(), SessionPhase::FeaturesReady);
    assert!(session.mask().is_err());
    // Prompts survive a feature refresh
    assert_eq!(session.count_prompts(), 1);
    Ok(())
}

#[test]
fn test_failed_preprocess_leaves_session_empty() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut session = session_with_features()?;

    let err = session
        .preprocess(temp_dir.path().join("missing.jpg"))
        .unwrap_err();
    assert!(matches!(err, CutoutError::Io(_)));
    assert_eq!(session.phase(), SessionPhase::Empty);
    assert!(!session.has_image());

    let garbage = temp_dir.path().join("garbage.png");
    std::fs::write(&garbage, b"definitely not an image")?;
    let err = session.preprocess(&garbage).unwrap_err();
    assert!(matches!(err, CutoutError::Image(_)));
    assert_eq!(session.phase(), SessionPhase::Empty);
    Ok(())
}

#[test]
fn test_image_with_wrong_extension_still_loads() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let png = common::write_test_image(temp_dir.path(), "photo.png", 20, 10);
    let renamed = temp_dir.path().join("photo.jpg");
    std::fs::rename(&png, &renamed)?;

    let mut session = SegmentSession::default();
    let tensor = session.preprocess(&renamed)?;
    assert_eq!(tensor.original_size().dimensions(), (20, 10));
    Ok(())
}

#[test]
fn test_invalid_config_files() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let malformed = temp_dir.path().join("malformed.json");
    std::fs::write(&malformed, "{ not json")?;
    assert!(matches!(
        PipelineConfig::from_json_file(&malformed),
        Err(CutoutError::InvalidConfig(_))
    ));

    let mut config = PipelineConfig::segment_anything();
    config.cleanup.blur_size = 4;
    let even_kernel = temp_dir.path().join("even.json");
    std::fs::write(&even_kernel, config.to_json_string()?)?;
    assert!(matches!(
        PipelineConfig::from_json_file(&even_kernel),
        Err(CutoutError::InvalidConfig(_))
    ));
    assert!(SegmentSession::new(config).is_err());

    assert!(matches!(
        PipelineConfig::from_json_file(temp_dir.path().join("absent.json")),
        Err(CutoutError::Io(_))
    ));
    Ok(())
}

#[test]
fn test_config_round_trips_through_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("u2net.json");
    let config = PipelineConfig::background_removal();
    std::fs::write(&path, config.to_json_string()?)?;
    assert_eq!(PipelineConfig::from_json_file(&path)?, config);
    Ok(())
}

#[test]
fn test_thin_image_fails_before_any_state_change() {
    let mut session = SegmentSession::default();
    let err = session
        .preprocess_image(RgbImage::new(3000, 1))
        .unwrap_err();
    assert!(matches!(err, CutoutError::InvalidConfig(_)));
    assert_eq!(session.phase(), SessionPhase::Empty);

    let mut remover = BackgroundRemover::default();
    assert!(remover.preprocess_image(RgbImage::new(1, 2000)).is_err());
    assert!(!remover.has_image());
}
