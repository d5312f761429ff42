//! Tests for the single-image flow and the frame loop

use image::{ImageOutputFormat, Rgb, RgbImage};
use mockall::mock;
use padi_eye::source::FrameReader;
use padi_eye::{
    process_image, run_stream, BoundingBox, DetectionModel, DetectionRecord, DetectionStore,
    DetectorAdapter, Frame, FrameSink, FrameStream, HistoryReader, ImageInput, NewRecord,
    RawDetection, RecordStore, ResultRecorder, StopSignal, VisionError,
};
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;

mock! {
    pub Model {}

    impl DetectionModel for Model {
        fn labels(&self) -> Vec<String>;
        fn predict(&mut self, frame: &Frame, confidence: f32) -> padi_eye::Result<Vec<RawDetection>>;
    }
}

mock! {
    pub Store {}

    impl DetectionStore for Store {
        fn insert(&self, record: NewRecord) -> padi_eye::Result<DetectionRecord>;
        fn list_all(&self) -> padi_eye::Result<Vec<DetectionRecord>>;
    }
}

fn model_with_labels() -> MockModel {
    let mut model = MockModel::new();
    model
        .expect_labels()
        .return_const(vec!["leaf_blast".to_string(), "brown_spot".to_string()]);
    model
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    RgbImage::from_pixel(width, height, Rgb([40, 160, 40]))
        .write_to(&mut buf, ImageOutputFormat::Png)
        .unwrap();
    buf.into_inner()
}

#[derive(Default)]
struct CollectingSink {
    shown: Vec<(u32, u32)>,
    captions: Vec<String>,
    stop_after: Option<(usize, StopSignal)>,
}

impl FrameSink for CollectingSink {
    fn show(&mut self, frame: &Frame, caption: &str) -> padi_eye::Result<()> {
        self.shown.push(frame.dimensions());
        self.captions.push(caption.to_string());
        if let Some((count, signal)) = &self.stop_after {
            if self.shown.len() >= *count {
                signal.stop();
            }
        }
        Ok(())
    }
}

#[test]
fn test_single_image_is_recorded_and_listed_last() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(RecordStore::open(dir.path().join("detections.db")).unwrap());
    let recorder = ResultRecorder::new(store.clone(), 90);

    let mut model = model_with_labels();
    model
        .expect_predict()
        .times(1)
        .returning(|_, _| {
            Ok(vec![RawDetection {
                class_id: 0,
                confidence: 0.9,
                bbox: BoundingBox::new(4.0, 4.0, 20.0, 20.0),
            }])
        });
    let mut adapter = DetectorAdapter::new(Box::new(model));

    let outcome = process_image(
        ImageInput::Bytes(png_bytes(64, 48)),
        &mut adapter,
        &recorder,
        0.25,
        300,
    )
    .unwrap();

    assert_eq!(outcome.detections.len(), 1);
    assert_eq!(outcome.detections[0].label, "leaf_blast");
    assert_eq!(outcome.uploaded.dimensions(), (400, 300));
    assert_eq!(outcome.result.dimensions(), (400, 300));

    let record = outcome.record.unwrap();
    assert_eq!(record.object_name, "leaf_blast");
    assert_eq!(record.confidence, "0.25");
    assert!(!record.image_base64.is_empty());

    let history = HistoryReader::new(store).list_all().unwrap();
    assert_eq!(history.last(), Some(&record));
}

#[test]
fn test_invalid_threshold_has_no_side_effects() {
    let store = Arc::new(RecordStore::open_temporary().unwrap());
    let recorder = ResultRecorder::new(store.clone(), 90);

    let mut model = model_with_labels();
    model.expect_predict().times(0);
    let mut adapter = DetectorAdapter::new(Box::new(model));

    for threshold in [1.5, -0.1, f32::NAN] {
        let err = process_image(
            ImageInput::Bytes(png_bytes(8, 8)),
            &mut adapter,
            &recorder,
            threshold,
            300,
        )
        .unwrap_err();
        assert!(matches!(err, VisionError::InvalidParameter(_)));
    }

    assert!(store.is_empty());
}

#[test]
fn test_missing_image_is_source_unavailable() {
    let store = Arc::new(RecordStore::open_temporary().unwrap());
    let recorder = ResultRecorder::new(store.clone(), 90);
    let mut model = model_with_labels();
    model.expect_predict().times(0);
    let mut adapter = DetectorAdapter::new(Box::new(model));

    let err = process_image(
        ImageInput::Path("/nonexistent/leaf.jpg".into()),
        &mut adapter,
        &recorder,
        0.5,
        300,
    )
    .unwrap_err();
    assert!(matches!(err, VisionError::SourceUnavailable(_)));
    assert!(store.is_empty());
}

#[test]
fn test_record_failure_keeps_display_output() {
    let mut store = MockStore::new();
    store
        .expect_insert()
        .times(1)
        .returning(|_| Err(VisionError::Persistence("disk full".to_string())));
    let recorder = ResultRecorder::new(Arc::new(store), 90);

    let mut model = model_with_labels();
    model.expect_predict().returning(|_, _| Ok(Vec::new()));
    let mut adapter = DetectorAdapter::new(Box::new(model));

    let outcome = process_image(
        ImageInput::Bytes(png_bytes(30, 10)),
        &mut adapter,
        &recorder,
        0.4,
        20,
    )
    .unwrap();

    assert_eq!(outcome.result.dimensions(), (60, 20));
    assert!(matches!(outcome.record, Err(VisionError::Persistence(_))));
}

#[test]
fn test_no_detections_records_empty_name() {
    let store = Arc::new(RecordStore::open_temporary().unwrap());
    let recorder = ResultRecorder::new(store.clone(), 90);

    let mut model = model_with_labels();
    model.expect_predict().returning(|_, _| Ok(Vec::new()));
    let mut adapter = DetectorAdapter::new(Box::new(model));

    let outcome = process_image(
        ImageInput::Bytes(png_bytes(16, 16)),
        &mut adapter,
        &recorder,
        0.9,
        16,
    )
    .unwrap();
    assert!(outcome.detections.is_empty());
    assert_eq!(outcome.record.unwrap().object_name, "");
}

#[test]
fn test_zero_frame_stream_never_calls_detector() {
    let mut model = model_with_labels();
    model.expect_predict().times(0);
    let mut adapter = DetectorAdapter::new(Box::new(model));
    let mut sink = CollectingSink::default();

    let summary = run_stream(
        FrameStream::from_frames(Vec::new()),
        &mut adapter,
        0.5,
        300,
        &mut sink,
        &StopSignal::new(),
    )
    .unwrap();

    assert_eq!(summary.frames, 0);
    assert!(!summary.stopped);
    assert!(sink.shown.is_empty());
}

#[test]
fn test_stream_displays_every_frame_at_display_height() {
    let mut model = model_with_labels();
    model.expect_predict().times(3).returning(|_, _| {
        Ok(vec![RawDetection {
            class_id: 1,
            confidence: 0.8,
            bbox: BoundingBox::new(1.0, 1.0, 5.0, 5.0),
        }])
    });
    let mut adapter = DetectorAdapter::new(Box::new(model));
    let mut sink = CollectingSink::default();

    let frames = vec![RgbImage::new(640, 480); 3];
    let summary = run_stream(
        FrameStream::from_frames(frames),
        &mut adapter,
        0.25,
        300,
        &mut sink,
        &StopSignal::new(),
    )
    .unwrap();

    assert_eq!(summary.frames, 3);
    assert_eq!(summary.detections, 3);
    assert_eq!(sink.shown, vec![(400, 300); 3]);
    assert!(sink.captions[0].contains("1 detections"));
}

#[test]
fn test_stop_signal_ends_stream_before_next_frame() {
    let mut model = model_with_labels();
    model.expect_predict().times(2).returning(|_, _| Ok(Vec::new()));
    let mut adapter = DetectorAdapter::new(Box::new(model));

    let stop = StopSignal::new();
    let mut sink = CollectingSink {
        stop_after: Some((2, stop.clone())),
        ..Default::default()
    };

    let summary = run_stream(
        FrameStream::from_frames(vec![RgbImage::new(8, 8); 10]),
        &mut adapter,
        0.5,
        8,
        &mut sink,
        &stop,
    )
    .unwrap();

    assert!(summary.stopped);
    assert_eq!(summary.frames, 2);
    assert_eq!(sink.shown.len(), 2);
}

#[test]
fn test_already_stopped_stream_processes_nothing() {
    let mut model = model_with_labels();
    model.expect_predict().times(0);
    let mut adapter = DetectorAdapter::new(Box::new(model));
    let stop = StopSignal::new();
    stop.stop();

    let summary = run_stream(
        FrameStream::from_frames(vec![RgbImage::new(8, 8)]),
        &mut adapter,
        0.5,
        8,
        &mut CollectingSink::default(),
        &stop,
    )
    .unwrap();
    assert!(summary.stopped);
    assert_eq!(summary.frames, 0);
}

struct DyingReader {
    remaining: u32,
}

impl FrameReader for DyingReader {
    fn next_frame(&mut self) -> padi_eye::Result<Option<Frame>> {
        if self.remaining == 0 {
            return Err(VisionError::SourceUnavailable("camera unplugged".to_string()));
        }
        self.remaining -= 1;
        Ok(Some(RgbImage::new(4, 4)))
    }
}

#[test]
fn test_source_failure_aborts_stream() {
    let mut model = model_with_labels();
    model.expect_predict().times(1).returning(|_, _| Ok(Vec::new()));
    let mut adapter = DetectorAdapter::new(Box::new(model));
    let mut sink = CollectingSink::default();

    let err = run_stream(
        FrameStream::from_reader(Box::new(DyingReader { remaining: 1 })),
        &mut adapter,
        0.5,
        4,
        &mut sink,
        &StopSignal::new(),
    )
    .unwrap_err();

    assert!(matches!(err, VisionError::SourceUnavailable(_)));
    assert_eq!(sink.shown.len(), 1);
}

#[test]
fn test_model_failure_is_inference_error() {
    let mut model = model_with_labels();
    model
        .expect_predict()
        .times(1)
        .returning(|_, _| Err(VisionError::Config("session closed".to_string())));
    let mut adapter = DetectorAdapter::new(Box::new(model));

    let err = run_stream(
        FrameStream::from_frames(vec![RgbImage::new(4, 4); 2]),
        &mut adapter,
        0.5,
        4,
        &mut CollectingSink::default(),
        &StopSignal::new(),
    )
    .unwrap_err();
    assert!(matches!(err, VisionError::ModelInference(_)));
}

#[test]
fn test_stream_rejects_bad_parameters_up_front() {
    let mut model = model_with_labels();
    model.expect_predict().times(0);
    let mut adapter = DetectorAdapter::new(Box::new(model));

    let err = run_stream(
        FrameStream::from_frames(vec![RgbImage::new(4, 4)]),
        &mut adapter,
        2.0,
        300,
        &mut CollectingSink::default(),
        &StopSignal::new(),
    )
    .unwrap_err();
    assert!(matches!(err, VisionError::InvalidParameter(_)));

    let err = run_stream(
        FrameStream::from_frames(vec![RgbImage::new(4, 4)]),
        &mut adapter,
        0.5,
        0,
        &mut CollectingSink::default(),
        &StopSignal::new(),
    )
    .unwrap_err();
    assert!(matches!(err, VisionError::InvalidDimensions(_)));
}

#[test]
fn test_detector_passes_threshold_through() {
    let mut model = model_with_labels();
    model
        .expect_predict()
        .withf(|_, confidence| (*confidence - 0.42).abs() < f32::EPSILON)
        .times(1)
        .returning(|_, _| Ok(Vec::new()));
    let mut adapter = DetectorAdapter::new(Box::new(model));

    let frame = RgbImage::from_pixel(6, 6, Rgb([9, 9, 9]));
    let outcome = adapter.detect(&frame, 0.42).unwrap();
    assert_eq!(outcome.annotated_frame, frame);
}
